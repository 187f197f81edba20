use serde::{Deserialize, Serialize};
use std::{
    mem,
    sync::{Arc, Mutex},
};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Error,
}

/// A pending user-facing alert.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub cause: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Alert {
    pub fn new(level: AlertLevel, cause: &str) -> Self {
        Alert {
            level,
            cause: cause.to_string(),
            text: None,
        }
    }
}

/// Ordered queue of alerts waiting to be shown to the user. Cheap to clone;
/// all clones share one queue.
#[derive(Clone, Default)]
pub struct AlertQueue {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl AlertQueue {
    /// Queue an alert unless an identical one is already pending.
    pub fn push(&self, alert: Alert) {
        let mut alerts = self.alerts.lock().unwrap();
        if !alerts.contains(&alert) {
            alerts.push(alert);
        }
    }

    /// Drain the queue. The read is destructive and atomic: an alert is
    /// returned exactly once even with concurrent producers.
    pub fn fetch_and_clear(&self) -> Vec<Alert> {
        mem::take(&mut *self.alerts.lock().unwrap())
    }
}
