use snafu::Snafu;

/// Ingestor error types.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestorError {
    /// The circuit breaker is open: a previous bulk request failed
    /// terminally and nobody re-enabled the front end.
    #[snafu(display("submission disabled after terminal bulk failure"))]
    Disabled,
    /// The processor task is gone.
    #[snafu(display("bulk channel closed"))]
    ChannelClosed,
}

pub type Result<T, E = IngestorError> = std::result::Result<T, E>;
