pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use crate::app::email::EmailService;
use crate::app::metrics::Metrics;
use crate::app::rate_limiter::RateLimiter;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub email: EmailService,
    pub metrics: Metrics,
    pub rate_limiter: RateLimiter,
}
