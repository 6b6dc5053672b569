//! Maps the status codes of the success endpoint to protocol outcomes.

use crate::error::EidError;

/// What a poll of the success endpoint tells about a mobile flow.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    /// The operation completed.
    Success,
    /// The operation failed.
    Failed(EidError),
}

/// Classifies a status code returned by the success endpoint.
#[must_use]
pub fn classify(status: u16) -> PollStatus {
    match status {
        200 => PollStatus::Success,
        status => PollStatus::Failed(error_for_status(status)),
    }
}

/// Maps a non-success status code to the error the request settles with.
#[must_use]
pub fn error_for_status(status: u16) -> EidError {
    match status {
        400 => EidError::MissingParameter("server reported a missing parameter".to_string()),
        403 => EidError::ServerRejected(format!("request error with bad status code {status}")),
        408 => EidError::ServerTimeout,
        444 => EidError::UserCancelled,
        449 => EidError::UserPin,
        status => EidError::Unknown(format!("unexpected status code {status}")),
    }
}
