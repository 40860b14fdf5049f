//! Cooperative stop signal for live tasks

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// One-shot stop flag that async code can wait on.
///
/// Once triggered it stays triggered.
#[derive(Debug, Default)]
pub struct StopSignal {
    triggered: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolves once the signal has been triggered
    pub async fn stopped(&self) {
        loop {
            // register before checking the flag so a concurrent trigger is not missed
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}
