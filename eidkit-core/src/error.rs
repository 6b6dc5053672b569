use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::message::Message;

/// Error outputs from `eidkit`.
///
/// Every failure of a request surfaces as one of these values; none of them are fatal to the
/// client, each is scoped to the request that produced it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EidError {
    /// A request for the same base action is already outstanding
    #[error("action_pending: {0}")]
    ActionPending(String),
    /// The caller's deadline elapsed before the peer answered
    #[error("action_timeout: {0}")]
    ActionTimeout(String),
    /// The hosting page is not a secure (HTTPS) context
    #[error("context_insecure")]
    ContextInsecure,
    /// The browser extension did not acknowledge the request in time
    #[error("extension_unavailable")]
    ExtensionUnavailable,
    /// The mobile authenticator app did not acknowledge the request in time
    #[error("auth_app_not_installed")]
    AuthAppNotInstalled,
    /// A URL that must use HTTPS does not
    #[error("protocol_insecure: {0}")]
    ProtocolInsecure(String),
    /// A required request parameter is absent
    #[error("missing_parameter: {0}")]
    MissingParameter(String),
    /// The server refused the request or could not be reached
    #[error("server_rejected: {0}")]
    ServerRejected(String),
    /// The server did not answer in time
    #[error("server_timeout")]
    ServerTimeout,
    /// The user cancelled the operation
    #[error("user_cancelled")]
    UserCancelled,
    /// PIN entry failed on the authenticator
    #[error("user_pin")]
    UserPin,
    /// Unclassified failure with details
    #[error("unknown_error: {0}")]
    Unknown(String),
    /// The peer reported a failure without an error descriptor; the raw message is kept
    #[error("failure_message: {}", .0.action)]
    FailureMessage(Box<Message>),
}

/// Stable wire codes of [`EidError`] kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ErrorCode {
    /// See [`EidError::ActionPending`].
    #[strum(serialize = "ERR_WEBEID_ACTION_PENDING")]
    ActionPending,
    /// See [`EidError::ActionTimeout`].
    #[strum(serialize = "ERR_WEBEID_ACTION_TIMEOUT")]
    ActionTimeout,
    /// See [`EidError::ContextInsecure`].
    #[strum(serialize = "ERR_WEBEID_CONTEXT_INSECURE")]
    ContextInsecure,
    /// See [`EidError::ExtensionUnavailable`].
    #[strum(serialize = "ERR_WEBEID_EXTENSION_UNAVAILABLE")]
    ExtensionUnavailable,
    /// See [`EidError::AuthAppNotInstalled`].
    #[strum(serialize = "ERR_WEBEID_AUTH_APP_NOT_INSTALLED")]
    AuthAppNotInstalled,
    /// See [`EidError::ProtocolInsecure`].
    #[strum(serialize = "ERR_WEBEID_PROTOCOL_INSECURE")]
    ProtocolInsecure,
    /// See [`EidError::MissingParameter`].
    #[strum(serialize = "ERR_WEBEID_MISSING_PARAMETER")]
    MissingParameter,
    /// See [`EidError::ServerRejected`].
    #[strum(serialize = "ERR_WEBEID_SERVER_REJECTED")]
    ServerRejected,
    /// See [`EidError::ServerTimeout`].
    #[strum(serialize = "ERR_WEBEID_SERVER_TIMEOUT")]
    ServerTimeout,
    /// See [`EidError::UserCancelled`].
    #[strum(serialize = "ERR_WEBEID_USER_CANCELLED")]
    UserCancelled,
    /// See [`EidError::UserPin`].
    #[strum(serialize = "ERR_WEBEID_USER_PIN")]
    UserPin,
    /// See [`EidError::Unknown`] and [`EidError::FailureMessage`].
    #[strum(serialize = "ERR_WEBEID_UNKNOWN_ERROR")]
    Unknown,
}

/// Error descriptor as carried in the `error` field of a bus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedError {
    /// Wire code, e.g. `ERR_WEBEID_USER_CANCELLED`.
    pub code: String,
    /// Human readable detail.
    #[serde(default)]
    pub message: String,
    /// Any further properties sent by the peer.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl EidError {
    /// Returns the wire code of this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ActionPending(_) => ErrorCode::ActionPending,
            Self::ActionTimeout(_) => ErrorCode::ActionTimeout,
            Self::ContextInsecure => ErrorCode::ContextInsecure,
            Self::ExtensionUnavailable => ErrorCode::ExtensionUnavailable,
            Self::AuthAppNotInstalled => ErrorCode::AuthAppNotInstalled,
            Self::ProtocolInsecure(_) => ErrorCode::ProtocolInsecure,
            Self::MissingParameter(_) => ErrorCode::MissingParameter,
            Self::ServerRejected(_) => ErrorCode::ServerRejected,
            Self::ServerTimeout => ErrorCode::ServerTimeout,
            Self::UserCancelled => ErrorCode::UserCancelled,
            Self::UserPin => ErrorCode::UserPin,
            Self::Unknown(_) | Self::FailureMessage(_) => ErrorCode::Unknown,
        }
    }

    /// Serializes the error into the descriptor sent over the bus.
    #[must_use]
    pub fn to_serialized(&self) -> SerializedError {
        let message = match self {
            Self::ActionPending(detail)
            | Self::ActionTimeout(detail)
            | Self::ProtocolInsecure(detail)
            | Self::MissingParameter(detail)
            | Self::ServerRejected(detail)
            | Self::Unknown(detail) => detail.clone(),
            _ => self.to_string(),
        };
        SerializedError {
            code: self.code().to_string(),
            message,
            details: Map::new(),
        }
    }
}

impl From<SerializedError> for EidError {
    fn from(error: SerializedError) -> Self {
        let Ok(code) = ErrorCode::from_str(&error.code) else {
            return Self::Unknown(format!("{}: {}", error.code, error.message));
        };
        let detail = error.message;
        match code {
            ErrorCode::ActionPending => Self::ActionPending(detail),
            ErrorCode::ActionTimeout => Self::ActionTimeout(detail),
            ErrorCode::ContextInsecure => Self::ContextInsecure,
            ErrorCode::ExtensionUnavailable => Self::ExtensionUnavailable,
            ErrorCode::AuthAppNotInstalled => Self::AuthAppNotInstalled,
            ErrorCode::ProtocolInsecure => Self::ProtocolInsecure(detail),
            ErrorCode::MissingParameter => Self::MissingParameter(detail),
            ErrorCode::ServerRejected => Self::ServerRejected(detail),
            ErrorCode::ServerTimeout => Self::ServerTimeout,
            ErrorCode::UserCancelled => Self::UserCancelled,
            ErrorCode::UserPin => Self::UserPin,
            ErrorCode::Unknown => Self::Unknown(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_use_wire_names() {
        assert_eq!(
            EidError::UserPin.code().to_string(),
            "ERR_WEBEID_USER_PIN"
        );
        assert_eq!(
            ErrorCode::from_str("ERR_WEBEID_ACTION_PENDING").unwrap(),
            ErrorCode::ActionPending
        );
    }

    #[test]
    fn test_serialized_error_keeps_detail() {
        let error = EidError::MissingParameter("postAuthTokenUrl".to_string());
        let serialized = error.to_serialized();
        assert_eq!(serialized.code, "ERR_WEBEID_MISSING_PARAMETER");
        assert_eq!(serialized.message, "postAuthTokenUrl");
        assert_eq!(EidError::from(serialized), error);
    }

    #[test]
    fn test_deserializes_peer_error_json() {
        let json = r#"{"code":"ERR_WEBEID_USER_CANCELLED","message":"User cancelled","name":"UserCancelledError"}"#;
        let serialized: SerializedError = serde_json::from_str(json).unwrap();
        assert_eq!(
            serialized.details.get("name"),
            Some(&Value::from("UserCancelledError"))
        );
        assert_eq!(EidError::from(serialized), EidError::UserCancelled);
    }

    #[test]
    fn test_unknown_code_becomes_unknown_error() {
        let serialized = SerializedError {
            code: "ERR_WEBEID_NATIVE_FATAL".to_string(),
            message: "boom".to_string(),
            details: Map::new(),
        };
        assert_eq!(
            EidError::from(serialized),
            EidError::Unknown("ERR_WEBEID_NATIVE_FATAL: boom".to_string())
        );
    }

    #[test]
    fn test_failure_message_serializes_as_unknown() {
        let message = Message::new(crate::Action::Sign.tag(crate::Phase::Failure));
        let error = EidError::FailureMessage(Box::new(message));
        let serialized = error.to_serialized();
        assert_eq!(serialized.code, "ERR_WEBEID_UNKNOWN_ERROR");
        assert_eq!(serialized.message, "failure_message: web-eid:sign-failure");
    }
}
