use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use crate::http::AppError;
use crate::AppState;

/// Per-address rate limiting for the notification creation endpoint. All
/// other routes pass through untouched.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let guarded =
        request.method() == Method::POST && request.uri().path() == "/api/notifications";
    if !guarded {
        return Ok(next.run(request).await);
    }

    let decision = state.rate_limiter.check(addr.ip());
    if decision.limited {
        tracing::warn!(ip = %addr.ip(), "notification rate limit exceeded");
        return Err(AppError::rate_limited(
            "Too many notification requests, please try again later",
        )
        .with_quota(decision.limit, 0));
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", value);
    }
    Ok(response)
}
