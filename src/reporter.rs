use log::error;

/// Fire-and-forget sink for unexpected command failures.
///
/// The concrete upload transport lives outside this crate; reporting never
/// blocks and never alters control flow.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &anyhow::Error);
}

/// Default sink that records failures in the agent log.
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &anyhow::Error) {
        error!("reported command failure: {error:#}");
    }
}
