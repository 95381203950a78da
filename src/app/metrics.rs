use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Delay between the first mutation after an idle period and the flush that
/// logs the snapshot. Mutations landing inside the window are coalesced.
pub const FLUSH_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub enum Counter {
    NotificationsSent,
    EmailErrors,
    NotificationErrors,
}

/// Process-wide dispatch counters. Cloning shares the same underlying
/// state; every component receives a handle through `AppState` rather than
/// reaching for a global.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    enabled: bool,
    flush_delay: Duration,
    notifications_sent: AtomicU64,
    email_errors: AtomicU64,
    notification_errors: AtomicU64,
    last_processing_time: RwLock<Option<OffsetDateTime>>,
    flush_scheduled: AtomicBool,
    flushes: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub notifications_sent: u64,
    pub email_errors: u64,
    pub notification_errors: u64,
    pub last_processing_time: Option<String>,
}

impl Metrics {
    pub fn new(enabled: bool) -> Self {
        Self::with_flush_delay(enabled, FLUSH_DELAY)
    }

    pub fn with_flush_delay(enabled: bool, flush_delay: Duration) -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                enabled,
                flush_delay,
                notifications_sent: AtomicU64::new(0),
                email_errors: AtomicU64::new(0),
                notification_errors: AtomicU64::new(0),
                last_processing_time: RwLock::new(None),
                flush_scheduled: AtomicBool::new(false),
                flushes: AtomicU64::new(0),
            }),
        }
    }

    pub fn increment(&self, counter: Counter) {
        let slot = match counter {
            Counter::NotificationsSent => &self.inner.notifications_sent,
            Counter::EmailErrors => &self.inner.email_errors,
            Counter::NotificationErrors => &self.inner.notification_errors,
        };
        slot.fetch_add(1, Ordering::Relaxed);
        self.schedule_flush();
    }

    pub fn set_processing_time(&self) {
        if let Ok(mut guard) = self.inner.last_processing_time.write() {
            *guard = Some(OffsetDateTime::now_utc());
        }
        self.schedule_flush();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            notifications_sent: self.inner.notifications_sent.load(Ordering::Relaxed),
            email_errors: self.inner.email_errors.load(Ordering::Relaxed),
            notification_errors: self.inner.notification_errors.load(Ordering::Relaxed),
            last_processing_time: self.last_processing_time_rfc3339(),
        }
    }

    fn last_processing_time_rfc3339(&self) -> Option<String> {
        self.inner
            .last_processing_time
            .read()
            .ok()
            .and_then(|guard| *guard)
            .and_then(|at| at.format(&Rfc3339).ok())
    }

    /// Schedules the debounced snapshot log. The first mutation after an
    /// idle period spawns one flush task; mutations before it fires are
    /// absorbed into the same snapshot.
    fn schedule_flush(&self) {
        if !self.inner.enabled {
            return;
        }
        if self.inner.flush_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.flush_delay).await;
            inner.flush_scheduled.store(false, Ordering::SeqCst);
            inner.flushes.fetch_add(1, Ordering::SeqCst);

            let last_processing_time = inner
                .last_processing_time
                .read()
                .ok()
                .and_then(|guard| *guard)
                .and_then(|at| at.format(&Rfc3339).ok());
            tracing::info!(
                notifications_sent = inner.notifications_sent.load(Ordering::Relaxed),
                email_errors = inner.email_errors.load(Ordering::Relaxed),
                notification_errors = inner.notification_errors.load(Ordering::Relaxed),
                last_processing_time = last_processing_time.as_deref().unwrap_or("never"),
                "metrics snapshot"
            );
        });
    }
}
