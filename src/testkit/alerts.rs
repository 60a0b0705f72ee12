//! Alert capture for monitor tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::monitor::Alert;

/// Records every alert dispatched to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingAlertSink {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingAlertSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback suitable for `DriftMonitor::add_alert_callback`.
    #[must_use]
    pub fn callback(&self) -> impl Fn(&Alert) + Send + Sync + 'static {
        let alerts = Arc::clone(&self.alerts);
        move |alert: &Alert| alerts.lock().push(alert.clone())
    }

    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.alerts.lock().len()
    }
}
