use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    quota: Option<(u32, u32)>,
}

/// Fixed envelope every request-path error is rendered into, regardless of
/// which component raised it.
#[derive(Serialize)]
struct ErrorEnvelope {
    id: String,
    type_id: i32,
    user_id: String,
    created_on: String,
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            quota: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            quota: None,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: message.into(),
            quota: None,
        }
    }

    /// Attaches quota indicators reported as rate-limit response headers.
    pub fn with_quota(mut self, limit: u32, remaining: u32) -> Self {
        self.quota = Some((limit, remaining));
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let created_on = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let body = Json(ErrorEnvelope {
            id: String::new(),
            type_id: 0,
            user_id: String::new(),
            created_on,
            error: self.message,
        });

        let mut response = (self.status, body).into_response();
        if let Some((limit, remaining)) = self.quota {
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                headers.insert("x-ratelimit-limit", value);
            }
            if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
                headers.insert("x-ratelimit-remaining", value);
            }
        }
        response
    }
}
