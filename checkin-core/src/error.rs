use thiserror::Error;

use crate::outcome::RecordId;

/// Everything that can go wrong during a check-in attempt.
///
/// The first group describes why an attempt ended in failure; those are
/// logged with their cause and collapsed into a generic notification. The
/// second group is returned to the caller when a transition is requested in
/// a state that does not allow it.
#[derive(Debug, Error)]
pub enum CheckinError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("capture failed: {0}")]
    Acquisition(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server responded with HTTP {status}")]
    Server { status: u16 },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("recognition rejected (status {code})")]
    Rejected { code: i64 },

    #[error("a check-in is already in progress")]
    Busy,

    #[error("a match is waiting for confirmation")]
    ConfirmationPending,

    #[error("no match is waiting for confirmation")]
    NothingPending,

    #[error("record {actual} does not match pending record {expected}")]
    RecordMismatch { expected: RecordId, actual: RecordId },
}

impl CheckinError {
    /// True for errors raised before any network activity because the
    /// controller was not in a state that accepts the request.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CheckinError::Busy
                | CheckinError::ConfirmationPending
                | CheckinError::NothingPending
                | CheckinError::RecordMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CheckinError>;
