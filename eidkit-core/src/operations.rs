//! The operations offered to relying-party pages.
//!
//! Each operation builds its request message and derives the overall deadline from the handshake
//! of the chosen transport, the user interaction time and two server round trips (fetching the
//! challenge or data to sign, and posting the result).

use std::collections::HashMap;
use std::time::Duration;

use crate::action::{Action, Phase};
use crate::client::EidClient;
use crate::config::Config;
use crate::error::EidError;
use crate::message::Message;

/// Options shared by the operations that involve the relying party's server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Polled for the outcome when the authenticator app is used.
    pub get_auth_success_url: Option<String>,
    /// Extra HTTP headers for server requests.
    pub headers: Option<HashMap<String, String>>,
    /// Overrides the configured user interaction timeout.
    pub user_interaction_timeout: Option<Duration>,
    /// Overrides the configured server request timeout.
    pub server_request_timeout: Option<Duration>,
    /// Preferred UI language.
    pub lang: Option<String>,
    /// Use the mobile authenticator app instead of the browser extension.
    pub use_auth_app: bool,
}

/// Options of [`EidClient::authenticate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticateOptions {
    /// Where the authenticator fetches the challenge nonce.
    pub get_auth_challenge_url: String,
    /// Where the authenticator posts the authentication token.
    pub post_auth_token_url: String,
    /// Transport options.
    pub transport: TransportOptions,
}

/// Options of [`EidClient::sign`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignOptions {
    /// Where the authenticator fetches the hash to sign.
    pub prepare_signing_url: String,
    /// Where the authenticator posts the signature.
    pub finalize_signing_url: String,
    /// Transport options.
    pub transport: TransportOptions,
}

impl TransportOptions {
    fn user_interaction_timeout(&self, config: &Config) -> Duration {
        self.user_interaction_timeout
            .unwrap_or(config.user_interaction_timeout)
    }

    fn server_request_timeout(&self, config: &Config) -> Duration {
        self.server_request_timeout
            .unwrap_or(config.server_request_timeout)
    }

    /// Overall deadline of an operation using these options.
    fn deadline(&self, config: &Config) -> Duration {
        config.handshake_timeout_for(self.use_auth_app)
            + self.user_interaction_timeout(config)
            + self.server_request_timeout(config) * 2
    }

    fn request(&self, action: Action, config: &Config) -> Message {
        Message {
            get_auth_success_url: self.get_auth_success_url.clone(),
            headers: self.headers.clone(),
            user_interaction_timeout: Some(millis(self.user_interaction_timeout(config))),
            server_request_timeout: Some(millis(self.server_request_timeout(config))),
            lang: self.lang.clone(),
            use_auth_app: Some(self.use_auth_app),
            ..Message::new(action.tag(Phase::Request))
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl AuthenticateOptions {
    fn request(&self, config: &Config) -> Message {
        Message {
            get_auth_challenge_url: Some(self.get_auth_challenge_url.clone()),
            post_auth_token_url: Some(self.post_auth_token_url.clone()),
            ..self.transport.request(Action::Authenticate, config)
        }
    }
}

impl SignOptions {
    fn request(&self, config: &Config) -> Message {
        Message {
            prepare_signing_url: Some(self.prepare_signing_url.clone()),
            finalize_signing_url: Some(self.finalize_signing_url.clone()),
            ..self.transport.request(Action::Sign, config)
        }
    }
}

impl EidClient {
    /// Authenticates the user.
    ///
    /// Resolves with the `web-eid:authenticate-success` message.
    ///
    /// # Errors
    /// See [`EidClient::send`].
    pub async fn authenticate(
        &self,
        options: &AuthenticateOptions,
    ) -> Result<Message, EidError> {
        let config = self.config();
        let deadline = options.transport.deadline(config);
        self.send(options.request(config), deadline).await
    }

    /// Signs with the user's signing key.
    ///
    /// Resolves with the `web-eid:sign-success` message.
    ///
    /// # Errors
    /// See [`EidClient::send`].
    pub async fn sign(&self, options: &SignOptions) -> Result<Message, EidError> {
        let config = self.config();
        let deadline = options.transport.deadline(config);
        self.send(options.request(config), deadline).await
    }

    /// Asks the extension for the versions of its components.
    ///
    /// # Errors
    /// See [`EidClient::send`].
    pub async fn status(&self) -> Result<Message, EidError> {
        let deadline = self.config().handshake_timeout * 2;
        self.send(Message::new(Action::Status.tag(Phase::Request)), deadline)
            .await
    }
}
