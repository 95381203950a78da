/// Values interpolated into every message body.
#[derive(Debug, Clone)]
pub struct TemplateData {
    pub user_name: String,
    pub task_url: String,
}

/// Closed set of message templates, compiled into the binary. Resolution
/// from a `type_id` is a total function: ids outside the catalog (0,
/// unknown, negative) render the default template instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    TaskDueSoon,
    TaskAssigned,
    TaskUpdated,
    TaskComment,
    TaskCompleted,
    ProjectUpdate,
    Default,
}

impl Template {
    pub fn for_type_id(type_id: i32) -> Self {
        match type_id {
            1 => Template::TaskDueSoon,
            2 => Template::TaskAssigned,
            3 => Template::TaskUpdated,
            4 => Template::TaskComment,
            5 => Template::TaskCompleted,
            6 => Template::ProjectUpdate,
            _ => Template::Default,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Template::TaskDueSoon => "taskDueSoon",
            Template::TaskAssigned => "taskAssigned",
            Template::TaskUpdated => "taskUpdated",
            Template::TaskComment => "taskComment",
            Template::TaskCompleted => "taskCompleted",
            Template::ProjectUpdate => "projectUpdate",
            Template::Default => "default",
        }
    }

    pub fn render(&self, data: &TemplateData) -> String {
        let (heading, accent, message) = match self {
            Template::TaskDueSoon => (
                "Task due soon",
                "#ff9800",
                format!("Hi {}, one of your tasks is due soon.", data.user_name),
            ),
            Template::TaskAssigned => (
                "Task assigned",
                "#2196f3",
                format!("Hi {}, a task has been assigned to you.", data.user_name),
            ),
            Template::TaskUpdated => (
                "Task updated",
                "#03a9f4",
                format!("Hi {}, a task you are watching was updated.", data.user_name),
            ),
            Template::TaskComment => (
                "New comment",
                "#9c27b0",
                format!(
                    "Hi {}, someone commented on a task you are watching.",
                    data.user_name
                ),
            ),
            Template::TaskCompleted => (
                "Task completed",
                "#4caf50",
                format!("Hi {}, a task you are watching was completed.", data.user_name),
            ),
            Template::ProjectUpdate => (
                "Project update",
                "#3f51b5",
                format!("Hi {}, there is news in one of your projects.", data.user_name),
            ),
            Template::Default => (
                "Notification",
                "#607d8b",
                format!("Hi {}, you have a new notification.", data.user_name),
            ),
        };

        let link = if data.task_url.is_empty() {
            String::new()
        } else {
            format!(r#"<p><a href="{}">View task</a></p>"#, data.task_url)
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        .header {{ background-color: {accent}; color: white; padding: 15px; border-radius: 5px; }}
        .content {{ padding: 20px; background-color: #f9f9f9; border-radius: 5px; margin-top: 10px; }}
    </style>
</head>
<body>
    <div class="header">
        <h2>{heading}</h2>
    </div>
    <div class="content">
        <p>{message}</p>
        {link}
    </div>
</body>
</html>"#
        )
    }
}
