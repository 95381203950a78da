use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::app::metrics::MetricsSnapshot;
use crate::app::notifications::NotificationService;
use crate::domain::notification::{CreatedNotification, NotificationType, UserNotification};
use crate::http::AppError;
use crate::AppState;

#[derive(Serialize)]
struct HealthyResponse {
    status: &'static str,
    database: &'static str,
    email: &'static str,
    metrics: MetricsSnapshot,
    timestamp: String,
}

#[derive(Serialize)]
struct UnhealthyResponse {
    status: &'static str,
    error: String,
}

pub(crate) async fn health(State(state): State<AppState>) -> Response {
    let failure = if let Err(err) = state.db.ping().await {
        Some(format!("database unavailable: {}", err))
    } else if let Err(err) = state.email.check().await {
        Some(format!("mail gateway unavailable: {}", err))
    } else {
        None
    };

    match failure {
        None => {
            let timestamp = OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default();
            (
                StatusCode::OK,
                Json(HealthyResponse {
                    status: "healthy",
                    database: "connected",
                    email: "connected",
                    metrics: state.metrics.snapshot(),
                    timestamp,
                }),
            )
                .into_response()
        }
        Some(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(UnhealthyResponse {
                status: "unhealthy",
                error,
            }),
        )
            .into_response(),
    }
}

pub async fn list_notifications(
    Path(user_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserNotification>>, AppError> {
    let service = NotificationService::new(state.db.clone());
    let notifications = service.list_for_user(user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id, "failed to list notifications");
        AppError::internal("failed to list notifications")
    })?;

    Ok(Json(notifications))
}

#[derive(Deserialize)]
pub struct CreateNotificationRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub data: Option<Value>,
}

pub async fn create_notification(
    State(state): State<AppState>,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<CreatedNotification>), AppError> {
    let kind_name = payload.kind.as_deref().unwrap_or("").trim();
    let user_id_raw = payload.user_id.as_deref().unwrap_or("").trim();
    let data = match payload.data {
        Some(Value::Null) | None => None,
        Some(value) => Some(value),
    };

    let Some(data) = data else {
        return Err(AppError::bad_request("Invalid notification data"));
    };
    if kind_name.is_empty() || user_id_raw.is_empty() {
        return Err(AppError::bad_request("Invalid notification data"));
    }
    let Some(kind) = NotificationType::from_name(kind_name) else {
        return Err(AppError::bad_request("Invalid notification type"));
    };
    let user_id = match user_id_raw.parse::<i64>() {
        Ok(id) if id > 0 => id,
        _ => return Err(AppError::bad_request("Invalid user id")),
    };

    let service = NotificationService::new(state.db.clone());
    let created = service.generate(kind, user_id, &data).await.map_err(|err| {
        tracing::error!(error = ?err, user_id, kind = kind.name(), "failed to generate notification");
        AppError::internal("failed to generate notification")
    })?;

    Ok((StatusCode::CREATED, Json(created)))
}
