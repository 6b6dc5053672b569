//! The envelope exchanged on the message bus and returned to the caller.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::{ActionTag, UnknownAction};
use crate::error::{EidError, SerializedError};

/// A protocol message.
///
/// Only `action` is always present. The transport fields are needed by the mobile flow and are
/// ignored by the extension transport; anything else the peer sends travels in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Namespaced action, e.g. `web-eid:authenticate-ack`.
    pub action: String,
    /// Error descriptor of a `-failure` message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SerializedError>,
    /// Route the request to the mobile authenticator app instead of the extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_auth_app: Option<bool>,
    /// Where the authenticator fetches the authentication challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_auth_challenge_url: Option<String>,
    /// Where the authenticator posts the authentication token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_auth_token_url: Option<String>,
    /// Where the authenticator fetches the data to sign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepare_signing_url: Option<String>,
    /// Where the authenticator posts the signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalize_signing_url: Option<String>,
    /// Polled by the page to learn the outcome of a mobile flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_auth_success_url: Option<String>,
    /// Extra HTTP headers for server requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    /// How long the user may take to interact with the authenticator, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_interaction_timeout: Option<u64>,
    /// Per-request server timeout, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_request_timeout: Option<u64>,
    /// Preferred UI language of the authenticator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Action-specific fields, e.g. the authentication token of a `-success` message.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Creates an empty message for the given action.
    #[must_use]
    pub fn new(tag: ActionTag) -> Self {
        Self {
            action: tag.to_string(),
            ..Self::default()
        }
    }

    /// Creates a `-failure` message carrying `error`.
    #[must_use]
    pub fn failure(tag: ActionTag, error: &EidError) -> Self {
        Self {
            error: Some(error.to_serialized()),
            ..Self::new(tag)
        }
    }

    /// Decodes the action string.
    ///
    /// # Errors
    /// Returns an error if the action is not a namespaced protocol action.
    pub fn tag(&self) -> Result<ActionTag, UnknownAction> {
        self.action.parse()
    }

    /// Whether the request targets the mobile authenticator app.
    #[must_use]
    pub fn uses_auth_app(&self) -> bool {
        self.use_auth_app.unwrap_or(false)
    }

    /// Deserializes a `Message` from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the JSON is invalid or cannot be parsed.
    pub fn from_json(json: &str) -> Result<Self, EidError> {
        serde_json::from_str(json)
            .map_err(|e| EidError::Unknown(format!("invalid message json: {e}")))
    }

    /// Serializes the message to a JSON string.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, EidError> {
        serde_json::to_string(self).map_err(|e| {
            EidError::Unknown(format!("critical unexpected error serializing to json: {e}"))
        })
    }
}
