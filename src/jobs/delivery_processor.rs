use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::app::metrics::Counter;
use crate::app::notifications::NotificationService;
use crate::app::templates::{Template, TemplateData};
use crate::domain::notification::PendingDelivery;
use crate::AppState;

/// Upper bound on rows claimed per cycle.
pub const BATCH_LIMIT: i64 = 100;

/// Attempts the transport makes per notification before the row is left
/// for the next cycle.
pub const MAX_SEND_ATTEMPTS: u32 = 3;

/// Claims older than this are treated as abandoned by a dead worker and
/// become reclaimable.
const STALE_CLAIM: Duration = Duration::from_secs(600);

pub async fn run(state: AppState, poll_interval: Duration) {
    let worker_id = Uuid::new_v4().to_string();
    info!(worker_id = %worker_id, "delivery processor started");

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        run_cycle(&state, &worker_id).await;
    }
}

/// One polling cycle: claim eligible rows, deliver them sequentially, mark
/// delivered. A failed claim aborts the cycle without crashing the host;
/// the next scheduled firing starts fresh.
pub async fn run_cycle(state: &AppState, worker_id: &str) {
    let service = NotificationService::new(state.db.clone());

    let claimed = match service.claim_pending(worker_id, STALE_CLAIM, BATCH_LIMIT).await {
        Ok(rows) => rows,
        Err(err) => {
            error!(error = ?err, "failed to claim pending notifications");
            state.metrics.increment(Counter::NotificationErrors);
            return;
        }
    };

    // Sequential on purpose: bounds concurrent load on the mail gateway.
    for notification in &claimed {
        deliver(state, &service, notification).await;
    }

    state.metrics.set_processing_time();
}

async fn deliver(state: &AppState, service: &NotificationService, notification: &PendingDelivery) {
    let template = Template::for_type_id(notification.type_id);
    let data = TemplateData {
        user_name: notification.login.clone(),
        task_url: notification.link.clone(),
    };

    if let Err(err) = state
        .email
        .send_with_retry(
            &notification.email,
            &notification.title,
            template,
            &data,
            MAX_SEND_ATTEMPTS,
        )
        .await
    {
        error!(
            error = ?err,
            notification_id = notification.id,
            "failed to send notification email"
        );
        state.metrics.increment(Counter::EmailErrors);
        // Back into the backlog; the next cycle retries it.
        if let Err(err) = service.release_claim(notification.id).await {
            error!(
                error = ?err,
                notification_id = notification.id,
                "failed to release delivery claim"
            );
        }
        return;
    }

    match service.mark_delivered(notification.id).await {
        Ok(true) => state.metrics.increment(Counter::NotificationsSent),
        Ok(false) => {}
        Err(err) => {
            error!(
                error = ?err,
                notification_id = notification.id,
                "failed to mark notification delivered"
            );
            state.metrics.increment(Counter::NotificationErrors);
        }
    }
}
