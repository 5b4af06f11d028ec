//! Fixed-delay dispatch pacing for calls to the translation service.
//!
//! The pacer enforces a minimum interval between two consecutive events,
//! where an event is a dispatch ([`Pacer::wait_turn`]) or a completion
//! ([`Pacer::finished`]). With one batch in flight this is "wait `interval`
//! after each call before sending the next"; with several in flight it also
//! spaces out the dispatches themselves.

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Duration, Instant};

pub struct Pacer {
    interval: Duration,
    last_event: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_event: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until a dispatch is allowed, then record it.
    ///
    /// The first call never waits.
    pub async fn wait_turn(&self) {
        let mut last = self.last_event.lock().await;
        if let Some(t) = *last {
            sleep_until(t + self.interval).await;
        }
        *last = Some(Instant::now());
    }

    /// Record that a dispatched call has completed.
    pub async fn finished(&self) {
        *self.last_event.lock().await = Some(Instant::now());
    }
}
