//! Deep links that launch the mobile authenticator app.
//!
//! The link carries every parameter as `name="value"`: the double quotes are literal characters of
//! the query value and the authenticator app expects them verbatim.

use crate::action::{Action, Phase};
use crate::error::EidError;
use crate::message::Message;

/// Snapshot of the message fields that go into a deep link.
///
/// Either the authentication URL pair or the signing URL pair is complete; any other combination
/// is rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLinkFields {
    action: Action,
    get_auth_challenge_url: Option<String>,
    post_auth_token_url: Option<String>,
    prepare_signing_url: Option<String>,
    finalize_signing_url: Option<String>,
    get_auth_success_url: Option<String>,
    user_interaction_timeout: Option<u64>,
    server_request_timeout: Option<u64>,
    lang: Option<String>,
}

impl DeepLinkFields {
    /// Takes the deep-link fields from a request message.
    ///
    /// # Errors
    /// Returns [`EidError::MissingParameter`] if the action is not a request action or if neither
    /// `getAuthChallengeUrl` + `postAuthTokenUrl` nor `prepareSigningUrl` + `finalizeSigningUrl`
    /// are both present.
    pub fn from_message(message: &Message) -> Result<Self, EidError> {
        let action = match message.tag() {
            Ok(tag) if tag.phase == Phase::Request => tag.action,
            _ => return Err(EidError::MissingParameter("action".to_string())),
        };

        let auth = complete_pair(
            ("getAuthChallengeUrl", &message.get_auth_challenge_url),
            ("postAuthTokenUrl", &message.post_auth_token_url),
        );
        let signing = complete_pair(
            ("prepareSigningUrl", &message.prepare_signing_url),
            ("finalizeSigningUrl", &message.finalize_signing_url),
        );
        if let (Err(auth), Err(signing)) = (auth, signing) {
            // Name the half-filled pair when there is one.
            let missing = match (auth, signing) {
                (PairError::Partial(name), _) | (_, PairError::Partial(name)) => name,
                (PairError::Empty(name), PairError::Empty(_)) => name,
            };
            return Err(EidError::MissingParameter(missing.to_string()));
        }

        Ok(Self {
            action,
            get_auth_challenge_url: message.get_auth_challenge_url.clone(),
            post_auth_token_url: message.post_auth_token_url.clone(),
            prepare_signing_url: message.prepare_signing_url.clone(),
            finalize_signing_url: message.finalize_signing_url.clone(),
            get_auth_success_url: message.get_auth_success_url.clone(),
            user_interaction_timeout: message.user_interaction_timeout,
            server_request_timeout: message.server_request_timeout,
            lang: message.lang.clone(),
        })
    }

    /// The base action the link requests.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.action
    }

    /// Builds the deep link on top of `base`.
    ///
    /// Format: `<base>?action="<base-action>"&<field>="<percent-encoded-value>"...`, fields in a
    /// fixed order, absent fields omitted.
    #[must_use]
    pub fn to_deep_link(&self, base: &str) -> String {
        let user_interaction_timeout = self.user_interaction_timeout.map(|ms| ms.to_string());
        let server_request_timeout = self.server_request_timeout.map(|ms| ms.to_string());

        let fields = [
            ("getAuthChallengeUrl", &self.get_auth_challenge_url),
            ("postAuthTokenUrl", &self.post_auth_token_url),
            ("prepareSigningUrl", &self.prepare_signing_url),
            ("finalizeSigningUrl", &self.finalize_signing_url),
            ("getAuthSuccessUrl", &self.get_auth_success_url),
            ("userInteractionTimeout", &user_interaction_timeout),
            ("serverRequestTimeout", &server_request_timeout),
            ("lang", &self.lang),
        ];

        let separator = if base.contains('?') { '&' } else { '?' };
        let mut link = format!(
            "{base}{separator}action=\"{}\"",
            self.action.request_tag()
        );
        for (name, value) in fields {
            if let Some(value) = value {
                link.push('&');
                link.push_str(name);
                link.push_str("=\"");
                link.push_str(&encode_uri_component(value));
                link.push('"');
            }
        }
        link
    }
}

/// Builds the deep link for a request message.
///
/// # Errors
/// See [`DeepLinkFields::from_message`].
pub fn build_deep_link(base: &str, message: &Message) -> Result<String, EidError> {
    DeepLinkFields::from_message(message).map(|fields| fields.to_deep_link(base))
}

enum PairError {
    Empty(&'static str),
    Partial(&'static str),
}

fn complete_pair(
    first: (&'static str, &Option<String>),
    second: (&'static str, &Option<String>),
) -> Result<(), PairError> {
    match (first.1, second.1) {
        (Some(_), Some(_)) => Ok(()),
        (Some(_), None) => Err(PairError::Partial(second.0)),
        (None, Some(_)) => Err(PairError::Partial(first.0)),
        (None, None) => Err(PairError::Empty(first.0)),
    }
}

/// Percent-encodes everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`, byte by byte over UTF-8.
fn encode_uri_component(value: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut encoded = String::with_capacity(value.len());
    for &byte in value.as_bytes() {
        if byte.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            encoded.push('%');
            encoded.push(char::from(HEX[usize::from(byte >> 4)]));
            encoded.push(char::from(HEX[usize::from(byte & 0x0f)]));
        }
    }
    encoded
}
