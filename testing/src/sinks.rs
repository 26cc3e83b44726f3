//! Sinks that remember what they were given.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use marketplace_core::ports::{
    AuditEntry, AuditLog, Notification, NotificationDispatcher, SinkError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Notification dispatcher that records every notification.
///
/// In failing mode it still records the attempt, then returns an error.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    /// Create a working notifier
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose channel is down.
    #[must_use]
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }

    /// Every notification dispatched so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<(), SinkError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError("notification channel down".to_string()));
        }
        Ok(())
    }
}

/// Audit log that keeps entries in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingAuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl RecordingAuditLog {
    /// Create an empty audit log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry written so far.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries with the given action.
    #[must_use]
    pub fn actions(&self, action: &str) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.action == action)
            .collect()
    }
}

#[async_trait]
impl AuditLog for RecordingAuditLog {
    async fn record(&self, entry: &AuditEntry) -> Result<(), SinkError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
