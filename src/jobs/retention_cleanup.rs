use anyhow::{anyhow, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::app::notifications::NotificationService;
use crate::infra::db::Db;

/// Delivered notifications older than this are soft-deleted.
pub const RETENTION_DAYS: i32 = 30;

/// Daily at 2 AM.
const SCHEDULE: &str = "0 0 2 * * *";

pub async fn register(scheduler: &JobScheduler, db: Db) -> Result<()> {
    let job = Job::new_async(SCHEDULE, move |_uuid, _lock| {
        let db = db.clone();
        Box::pin(async move {
            run_once(&db).await;
        })
    })
    .map_err(|err| anyhow!("failed to create retention cleanup schedule: {}", err))?;

    scheduler
        .add(job)
        .await
        .map_err(|err| anyhow!("failed to add retention cleanup schedule: {}", err))?;

    info!("registered retention cleanup (daily at 2AM)");
    Ok(())
}

/// One cleanup pass. Failures are logged and dropped; the job simply runs
/// again at its next firing.
pub async fn run_once(db: &Db) {
    let service = NotificationService::new(db.clone());
    match service.deactivate_old_read(RETENTION_DAYS).await {
        Ok(count) => info!(rows = count, "cleaned up old notifications"),
        Err(err) => error!(error = ?err, "error cleaning up notifications"),
    }
}
