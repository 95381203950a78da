#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::connect_info::ConnectInfo;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::PgConnectOptions;
use sqlx::{PgPool, Row};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tower::ServiceExt;

use herald::app::email::{EmailService, MailTransport, OutgoingEmail};
use herald::app::metrics::Metrics;
use herald::app::rate_limiter::RateLimiter;
use herald::config::AppConfig;
use herald::infra::db::Db;
use herald::AppState;

// ---------------------------------------------------------------------------
// Test mail transports
// ---------------------------------------------------------------------------

/// Records every delivered message instead of talking to a gateway.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|email| email.to == to)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        Ok(())
    }
}

/// Fails every delivery and connectivity check, counting attempts.
#[derive(Clone, Default)]
pub struct FailingMailer {
    attempts: Arc<AtomicU32>,
}

impl FailingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for FailingMailer {
    async fn deliver(&self, _email: &OutgoingEmail) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("gateway refused connection"))
    }

    async fn check(&self) -> Result<()> {
        Err(anyhow!("gateway refused connection"))
    }
}

// ---------------------------------------------------------------------------
// TestApp — shared, lazily initialized once per test binary
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub mailer: RecordingMailer,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body_bytes: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }
}

static TEST_APP: OnceCell<TestApp> = OnceCell::const_new();

/// Get (or lazily create) the shared TestApp instance.
pub async fn app() -> &'static TestApp {
    TEST_APP
        .get_or_init(|| async { TestApp::setup().await })
        .await
}

impl TestApp {
    // ------------------------------------------------------------------
    // Setup — runs once per test binary
    // ------------------------------------------------------------------
    async fn setup() -> Self {
        // Env vars that control test infra (override with env for CI)
        let db_host = env_or("TEST_DB_HOST", "localhost");
        let db_port = env_or("TEST_DB_PORT", "5432");
        let db_user = env_or("TEST_DB_USER", "postgres");
        let db_password = env_or("TEST_DB_PASSWORD", "postgres");
        let test_db = env_or("TEST_DB_NAME", "herald_test");

        // ---- Create test database if needed ----
        let admin_options = PgConnectOptions::new()
            .host(&db_host)
            .port(db_port.parse().expect("invalid TEST_DB_PORT"))
            .username(&db_user)
            .password(&db_password)
            .database("postgres");
        let admin_pool = PgPool::connect_with(admin_options)
            .await
            .expect("cannot connect to postgres admin database");

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
                .bind(&test_db)
                .fetch_one(&admin_pool)
                .await
                .expect("failed to check test db existence");

        if !exists {
            // CREATE DATABASE cannot run inside a transaction
            sqlx::query(&format!("CREATE DATABASE \"{}\"", test_db))
                .execute(&admin_pool)
                .await
                .expect("failed to create test database");
        }
        admin_pool.close().await;

        // ---- Connect to test database and run migrations ----
        let test_options = PgConnectOptions::new()
            .host(&db_host)
            .port(db_port.parse().expect("invalid TEST_DB_PORT"))
            .username(&db_user)
            .password(&db_password)
            .database(&test_db);
        let db_pool = PgPool::connect_with(test_options)
            .await
            .expect("cannot connect to test database");

        let mut migration_files: Vec<_> = std::fs::read_dir("migrations")
            .expect("cannot read migrations/")
            .filter_map(|entry| entry.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "sql"))
            .collect();
        migration_files.sort_by_key(|e| e.file_name());

        for entry in &migration_files {
            let sql = std::fs::read_to_string(entry.path())
                .unwrap_or_else(|_| panic!("cannot read {:?}", entry.path()));
            sqlx::raw_sql(&sql)
                .execute(&db_pool)
                .await
                .unwrap_or_else(|e| panic!("migration {:?} failed: {}", entry.file_name(), e));
        }

        // ---- Reset mutable tables for clean test state ----
        // The notification_types seed is static and stays in place.
        sqlx::raw_sql("TRUNCATE TABLE notifications, users RESTART IDENTITY CASCADE")
            .execute(&db_pool)
            .await
            .expect("failed to truncate tables");

        db_pool.close().await;

        // ---- Build AppState via AppConfig (same code path as production) ----
        std::env::set_var("DB_HOST", &db_host);
        std::env::set_var("DB_PORT", &db_port);
        std::env::set_var("DB_USER", &db_user);
        std::env::set_var("DB_PASSWORD", &db_password);
        std::env::set_var("DB_NAME", &test_db);
        std::env::set_var("DB_MAX_CONNECTIONS", "10");
        std::env::set_var("DB_CONNECT_TIMEOUT_SECONDS", "30");
        // Each #[tokio::test] creates a separate tokio runtime, but the pool
        // is shared via OnceCell.  Connections created in one runtime become
        // stale when that runtime is dropped.  Setting idle_timeout to 0 forces
        // the pool to discard all idle connections on acquire and create fresh
        // ones in the current runtime.
        std::env::set_var("DB_IDLE_TIMEOUT_SECONDS", "0");
        std::env::set_var("EMAIL_ENABLED", "true");
        std::env::set_var("METRICS_ENABLED", "false");
        std::env::set_var("NOTIFICATION_RATE_LIMIT", "100");

        let config = AppConfig::from_env().expect("failed to build AppConfig");

        let db = Db::connect(&config).await.expect("Db::connect failed");
        let mailer = RecordingMailer::new();
        let email = EmailService::new(Arc::new(mailer.clone()), config.email_enabled);
        let metrics = Metrics::new(config.metrics_enabled);
        let rate_limiter = RateLimiter::new(config.notification_rate_limit);

        let state = AppState {
            db,
            email,
            metrics,
            rate_limiter,
        };

        let router = herald::http::router(state.clone());

        TestApp {
            router,
            state,
            mailer,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request_from(
        &self,
        ip: IpAddr,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> TestResponse {
        let builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        // Inject ConnectInfo so the rate-limit middleware can extract it.
        let mut request = request;
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::new(ip, 0)));

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body_bytes,
        }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request_from(localhost(), Method::GET, path, None).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        self.request_from(localhost(), Method::POST, path, Some(body))
            .await
    }

    pub async fn post_json_from(&self, ip: IpAddr, path: &str, body: Value) -> TestResponse {
        self.request_from(ip, Method::POST, path, Some(body)).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Return the pool for direct DB assertions.
    pub fn pool(&self) -> &PgPool {
        self.state.db.pool()
    }

    /// Insert a recipient directly in the DB. Pass `None` for a user that
    /// must never be eligible for delivery.
    pub async fn create_user(&self, login: &str, email: Option<&str>) -> i64 {
        sqlx::query_scalar("INSERT INTO users (login, email) VALUES ($1, $2) RETURNING id")
            .bind(login)
            .bind(email)
            .fetch_one(self.pool())
            .await
            .expect("insert test user failed")
    }

    /// Insert an unread notification directly in the DB. Returns its id.
    pub async fn seed_notification(&self, user_id: i64, type_id: i32, title: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO notifications (user_id, type_id, title, link, data) \
             VALUES ($1, $2, $3, '/tasks/42', '{}') RETURNING id",
        )
        .bind(user_id)
        .bind(type_id)
        .bind(title)
        .fetch_one(self.pool())
        .await
        .expect("insert test notification failed")
    }

    /// Insert a notification with an aged `created_on` (and `read_on`, when
    /// read) directly in the DB. Returns its id.
    pub async fn seed_notification_aged(
        &self,
        user_id: i64,
        type_id: i32,
        age_days: i32,
        read: bool,
    ) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO notifications (user_id, type_id, title, link, data, created_on, read_on) \
             VALUES ($1, $2, 'aged notification', '', '{}', \
                     now() - make_interval(days => $3), \
                     CASE WHEN $4 THEN now() - make_interval(days => $3) ELSE NULL END) \
             RETURNING id",
        )
        .bind(user_id)
        .bind(type_id)
        .bind(age_days)
        .bind(read)
        .fetch_one(self.pool())
        .await
        .expect("insert aged test notification failed")
    }

    pub async fn notification_row(&self, id: i64) -> NotificationRow {
        let row = sqlx::query(
            "SELECT read_on IS NOT NULL AS read, active, claimed_by FROM notifications WHERE id = $1",
        )
        .bind(id)
        .fetch_one(self.pool())
        .await
        .expect("fetch test notification failed");

        NotificationRow {
            read: row.get("read"),
            active: row.get("active"),
            claimed_by: row.get("claimed_by"),
        }
    }

    pub async fn notification_count(&self, user_id: i64) -> i64 {
        sqlx::query_scalar("SELECT count(*) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
            .expect("count test notifications failed")
    }
}

pub struct NotificationRow {
    pub read: bool,
    pub active: bool,
    pub claimed_by: Option<String>,
}

pub fn localhost() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
