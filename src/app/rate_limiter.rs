use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};

/// Ingestion window length. The limit applies per client address per
/// 15-minute window.
pub const WINDOW_SECONDS: u64 = 900;

/// Stale entries are swept once the table grows past this many addresses.
const PURGE_THRESHOLD: usize = 10_000;

pub struct RateLimitDecision {
    pub limited: bool,
    pub limit: u32,
    pub remaining: u32,
}

struct WindowSlot {
    window: u64,
    count: u32,
}

/// Fixed-window counter per client address. State is process-local; there
/// is no coordination across replicas.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    slots: Arc<Mutex<HashMap<IpAddr, WindowSlot>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32) -> Self {
        Self {
            max_requests,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Checks the caller against the current window and consumes one unit
    /// of quota when allowed.
    pub fn check(&self, ip: IpAddr) -> RateLimitDecision {
        let window = current_window(WINDOW_SECONDS);
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        if slots.len() > PURGE_THRESHOLD {
            slots.retain(|_, slot| slot.window == window);
        }

        let slot = slots.entry(ip).or_insert(WindowSlot { window, count: 0 });
        if slot.window != window {
            slot.window = window;
            slot.count = 0;
        }

        if slot.count >= self.max_requests {
            tracing::debug!(
                ip = %ip,
                count = slot.count,
                limit = self.max_requests,
                "notification rate limit exceeded"
            );
            return RateLimitDecision {
                limited: true,
                limit: self.max_requests,
                remaining: 0,
            };
        }

        slot.count += 1;
        RateLimitDecision {
            limited: false,
            limit: self.max_requests,
            remaining: self.max_requests - slot.count,
        }
    }
}

/// Index of the current fixed window.
fn current_window(window_seconds: u64) -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now / window_seconds
}
