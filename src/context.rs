use crate::{
    alert_queue::AlertQueue,
    cloud_client::{CloudServiceClient, LinkedPrinter},
    error_stats::ErrorStats,
    reporter::ErrorReporter,
    settings::Settings,
};
use std::sync::{
    Arc, RwLock,
    atomic::{AtomicI64, Ordering},
};

/// Connection state of the persistent cloud session. Owned by the session
/// worker, read by the status aggregator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionState {
    pub connected: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CameraKind {
    /// Embedded CSI camera on the controller board.
    Pi,
    Usb,
}

/// State of the webcam streamer, owned by the streaming manager.
#[derive(Clone, Copy, Debug)]
pub struct StreamerState {
    pub camera: CameraKind,
    pub shutting_down: bool,
}

/// All process-wide agent state, owned in one place and passed explicitly to
/// command handlers. Collaborators (session worker, streaming manager)
/// mutate their slices through the accessors below; no handler holds any of
/// these locks across a network call.
pub struct AgentContext<C: CloudServiceClient> {
    settings: Settings,
    cloud: Option<C>,
    reporter: Arc<dyn ErrorReporter>,
    error_stats: ErrorStats,
    alerts: AlertQueue,
    linked_printer: RwLock<Option<LinkedPrinter>>,
    session: RwLock<Option<SessionState>>,
    streamer: RwLock<Option<StreamerState>>,
    // Epoch seconds of the last status update from the session, 0 = never.
    last_status_update: AtomicI64,
}

impl<C: CloudServiceClient> AgentContext<C> {
    pub fn new(
        settings: Settings,
        cloud: Option<C>,
        reporter: Arc<dyn ErrorReporter>,
        error_stats: ErrorStats,
    ) -> Self {
        AgentContext {
            settings,
            cloud,
            reporter,
            error_stats,
            alerts: AlertQueue::default(),
            linked_printer: RwLock::new(None),
            session: RwLock::new(None),
            streamer: RwLock::new(None),
            last_status_update: AtomicI64::new(0),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cloud(&self) -> Option<&C> {
        self.cloud.as_ref()
    }

    pub fn reporter(&self) -> &dyn ErrorReporter {
        self.reporter.as_ref()
    }

    pub fn error_stats(&self) -> &ErrorStats {
        &self.error_stats
    }

    pub fn alerts(&self) -> &AlertQueue {
        &self.alerts
    }

    pub fn linked_printer(&self) -> Option<LinkedPrinter> {
        self.linked_printer.read().unwrap().clone()
    }

    pub fn set_linked_printer(&self, printer: LinkedPrinter) {
        *self.linked_printer.write().unwrap() = Some(printer);
    }

    pub fn session(&self) -> Option<SessionState> {
        *self.session.read().unwrap()
    }

    pub fn set_session(&self, session: Option<SessionState>) {
        *self.session.write().unwrap() = session;
    }

    pub fn streamer(&self) -> Option<StreamerState> {
        *self.streamer.read().unwrap()
    }

    pub fn set_streamer(&self, streamer: Option<StreamerState>) {
        *self.streamer.write().unwrap() = streamer;
    }

    pub fn last_status_update_ts(&self) -> Option<i64> {
        match self.last_status_update.load(Ordering::Relaxed) {
            0 => None,
            ts => Some(ts),
        }
    }

    pub fn record_status_update(&self, ts: i64) {
        self.last_status_update.store(ts, Ordering::Relaxed);
    }
}
