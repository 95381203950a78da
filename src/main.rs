use anyhow::anyhow;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::JobScheduler;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use herald::app::email::{EmailService, SmtpMailer};
use herald::app::metrics::Metrics;
use herald::app::rate_limiter::RateLimiter;
use herald::config::AppConfig;
use herald::infra::db::Db;
use herald::{http, jobs, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    let mailer = SmtpMailer::new(&config)?;
    let email = EmailService::new(Arc::new(mailer), config.email_enabled);
    let metrics = Metrics::new(config.metrics_enabled);
    let rate_limiter = RateLimiter::new(config.notification_rate_limit);

    let state = AppState {
        db: db.clone(),
        email,
        metrics,
        rate_limiter,
    };

    let mut scheduler = JobScheduler::new()
        .await
        .map_err(|err| anyhow!("failed to create job scheduler: {}", err))?;
    jobs::retention_cleanup::register(&scheduler, db.clone()).await?;
    scheduler
        .start()
        .await
        .map_err(|err| anyhow!("failed to start job scheduler: {}", err))?;

    tokio::spawn(jobs::delivery_processor::run(
        state.clone(),
        Duration::from_secs(config.poll_interval_seconds),
    ));

    let app: Router = http::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("listening on {}", config.http_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The listener has drained; stop the scheduled jobs, then release the
    // connection pool.
    if let Err(err) = scheduler.shutdown().await {
        tracing::warn!(error = %err, "job scheduler shutdown failed");
    }
    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
