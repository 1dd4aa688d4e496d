use snafu::Snafu;

/// Store error types.
///
/// An error returned by [`RemoteStore::bulk`](crate::RemoteStore::bulk) is
/// terminal for the whole batch: no per-item outcome was produced. Errors are
/// clonable so a single failure can fan out to accounting and later caller
/// inspection.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// The store could not be reached, or the request was aborted at the
    /// transport or cluster level.
    #[snafu(display("store unavailable: {message}"))]
    Unavailable { message: String },
    /// The bulk request itself was malformed.
    #[snafu(display("malformed bulk request: {message}"))]
    InvalidRequest { message: String },
}

pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;
