//! Injected configuration: handshake timeouts, defaults for operation timeouts, the deep-link
//! base and QR rendering options.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::error::EidError;
use crate::qr::ErrorCorrectionLevel;

/// Deep-link base registered by the authenticator app.
pub const DEFAULT_DEEP_LINK_BASE_URL: &str = "web-eid://auth";

/// Client configuration.
///
/// Deserializes from camelCase JSON with durations in milliseconds; missing keys take their
/// defaults.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// How long the browser extension has to acknowledge a request.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub handshake_timeout: Duration,
    /// How long the authenticator app has to acknowledge a request (app launch or QR display).
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub auth_app_handshake_timeout: Duration,
    /// Default time the user has to complete the interaction.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub user_interaction_timeout: Duration,
    /// Default timeout of a single server request.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub server_request_timeout: Duration,
    /// Base of the deep link that launches the authenticator app.
    pub deep_link_base_url: String,
    /// QR code options for the non-mobile flow.
    pub qr: QrOptions,
}

/// QR code options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QrOptions {
    /// Error correction level used when encoding the deep link.
    pub error_correction: ErrorCorrectionLevel,
    /// Quiet zone around the code, in modules.
    pub border: usize,
    /// Color of light modules.
    pub light_color: String,
    /// Color of dark modules.
    pub dark_color: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(1),
            auth_app_handshake_timeout: Duration::from_secs(5),
            user_interaction_timeout: Duration::from_secs(120),
            server_request_timeout: Duration::from_secs(20),
            deep_link_base_url: DEFAULT_DEEP_LINK_BASE_URL.to_string(),
            qr: QrOptions::default(),
        }
    }
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            error_correction: ErrorCorrectionLevel::Medium,
            border: 4,
            light_color: "#ffffff".to_string(),
            dark_color: "#000000".to_string(),
        }
    }
}

impl Config {
    /// Deserializes a `Config` from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the JSON is invalid or cannot be parsed.
    pub fn from_json(json: &str) -> Result<Self, EidError> {
        serde_json::from_str(json)
            .map_err(|e| EidError::Unknown(format!("invalid config json: {e}")))
    }

    /// Returns the handshake timeout of the transport selected by `use_auth_app`.
    #[must_use]
    pub const fn handshake_timeout_for(&self, use_auth_app: bool) -> Duration {
        if use_auth_app {
            self.auth_app_handshake_timeout
        } else {
            self.handshake_timeout
        }
    }

    /// Sets both handshake timeouts.
    #[must_use]
    pub const fn with_handshake_timeouts(
        mut self,
        extension: Duration,
        auth_app: Duration,
    ) -> Self {
        self.handshake_timeout = extension;
        self.auth_app_handshake_timeout = auth_app;
        self
    }

    /// Sets the deep-link base.
    #[must_use]
    pub fn with_deep_link_base_url(mut self, base: impl Into<String>) -> Self {
        self.deep_link_base_url = base.into();
        self
    }
}
