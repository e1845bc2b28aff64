use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Periodic refresh of the time-anchored views. Each tick re-resolves the
/// current label against "now", so a predefined range slides forward.
pub struct AutoRefresh {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl AutoRefresh {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start ticking, replacing any earlier loop. The first tick fires one
    /// full period after start.
    pub fn start<F>(&mut self, mut on_tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();
        if self.period.is_zero() {
            debug!("auto refresh disabled");
            return;
        }
        let period = self.period;
        info!(secs = period.as_secs(), "auto refresh started");
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                on_tick();
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("auto refresh stopped");
        }
    }

    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.stop();
    }
}
