use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

/// Closed catalog of notification kinds. Adding a kind means adding a
/// variant here and a row to the `notification_types` seed; the compiler
/// flags every match that needs updating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    TaskDueSoon,
    TaskAssigned,
    TaskUpdated,
    TaskComment,
    TaskCompleted,
    ProjectUpdate,
}

impl NotificationType {
    pub const ALL: [NotificationType; 6] = [
        NotificationType::TaskDueSoon,
        NotificationType::TaskAssigned,
        NotificationType::TaskUpdated,
        NotificationType::TaskComment,
        NotificationType::TaskCompleted,
        NotificationType::ProjectUpdate,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Task Due Soon" => Some(NotificationType::TaskDueSoon),
            "Task Assigned" => Some(NotificationType::TaskAssigned),
            "Task Updated" => Some(NotificationType::TaskUpdated),
            "Task Comment" => Some(NotificationType::TaskComment),
            "Task Completed" => Some(NotificationType::TaskCompleted),
            "Project Update" => Some(NotificationType::ProjectUpdate),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NotificationType::TaskDueSoon => "Task Due Soon",
            NotificationType::TaskAssigned => "Task Assigned",
            NotificationType::TaskUpdated => "Task Updated",
            NotificationType::TaskComment => "Task Comment",
            NotificationType::TaskCompleted => "Task Completed",
            NotificationType::ProjectUpdate => "Project Update",
        }
    }

    pub fn type_id(&self) -> i32 {
        match self {
            NotificationType::TaskDueSoon => 1,
            NotificationType::TaskAssigned => 2,
            NotificationType::TaskUpdated => 3,
            NotificationType::TaskComment => 4,
            NotificationType::TaskCompleted => 5,
            NotificationType::ProjectUpdate => 6,
        }
    }
}

/// Identity fields returned by the generator after a successful insert.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedNotification {
    pub id: i64,
    pub type_id: i32,
    pub user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_on: OffsetDateTime,
}

/// A notification row enriched with its catalog entry, as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct UserNotification {
    pub id: i64,
    pub user_id: i64,
    pub type_id: i32,
    pub title: String,
    pub link: String,
    pub data: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_on: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_on: Option<OffsetDateTime>,
    #[serde(rename = "type")]
    pub type_name: String,
    pub icon: String,
    pub color: String,
}

/// A claimed row joined with its recipient's contact fields, ready to send.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub id: i64,
    pub user_id: i64,
    pub type_id: i32,
    pub title: String,
    pub link: String,
    pub data: Value,
    pub email: String,
    pub login: String,
}
