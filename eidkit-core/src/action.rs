use std::fmt;
use std::str::FromStr;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Namespace prefix carried by every protocol action on the message bus.
pub const NAMESPACE: &str = "web-eid:";

/// The operations a page can request from the extension or the authenticator app.
///
/// The base action (without any suffix) is the correlation key of the protocol: at most one
/// request per `Action` may be outstanding at any time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Action {
    /// Authenticate the user with their eID.
    Authenticate,
    /// Sign a document hash with the eID signing key.
    Sign,
    /// Query the versions of the installed extension and native components.
    Status,
}

impl Action {
    /// Returns the namespaced tag of this action for the given phase.
    #[must_use]
    pub const fn tag(self, phase: Phase) -> ActionTag {
        ActionTag {
            action: self,
            phase,
        }
    }

    /// Returns the namespaced base action, e.g. `web-eid:authenticate`.
    #[must_use]
    pub fn request_tag(self) -> String {
        self.tag(Phase::Request).to_string()
    }
}

/// Position of a message in the request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The outgoing request itself, `web-eid:<action>`.
    Request,
    /// The peer received the request, `web-eid:<action>-ack`.
    Ack,
    /// The operation completed, `web-eid:<action>-success`.
    Success,
    /// The operation failed, `web-eid:<action>-failure`.
    Failure,
}

impl Phase {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Request => "",
            Self::Ack => "-ack",
            Self::Success => "-success",
            Self::Failure => "-failure",
        }
    }
}

/// A fully decoded action string: base action plus phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionTag {
    /// The base action, used for correlation.
    pub action: Action,
    /// The phase encoded by the suffix.
    pub phase: Phase,
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.action.into();
        write!(f, "{NAMESPACE}{name}{}", self.phase.suffix())
    }
}

/// Error returned when a string is not a namespaced protocol action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a protocol action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for ActionTag {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownAction(s.to_string());
        let name = s.strip_prefix(NAMESPACE).ok_or_else(unknown)?;

        let (base, phase) = [Phase::Ack, Phase::Success, Phase::Failure]
            .into_iter()
            .find_map(|phase| name.strip_suffix(phase.suffix()).map(|base| (base, phase)))
            .unwrap_or((name, Phase::Request));

        let action = Action::from_str(base).map_err(|_| unknown())?;
        Ok(action.tag(phase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_tag_formatting() {
        assert_eq!(
            Action::Authenticate.tag(Phase::Request).to_string(),
            "web-eid:authenticate"
        );
        assert_eq!(Action::Sign.tag(Phase::Ack).to_string(), "web-eid:sign-ack");
        assert_eq!(
            Action::Status.tag(Phase::Failure).to_string(),
            "web-eid:status-failure"
        );
    }

    #[test]
    fn test_tag_parsing_recovers_base_action() {
        let tag: ActionTag = "web-eid:authenticate-success".parse().unwrap();
        assert_eq!(tag, Action::Authenticate.tag(Phase::Success));

        let tag: ActionTag = "web-eid:sign".parse().unwrap();
        assert_eq!(tag, Action::Sign.tag(Phase::Request));

        for action in Action::iter() {
            for phase in [Phase::Request, Phase::Ack, Phase::Success, Phase::Failure] {
                let tag = action.tag(phase);
                assert_eq!(tag.to_string().parse::<ActionTag>().unwrap(), tag);
            }
        }
    }

    #[test]
    fn test_foreign_actions_are_rejected() {
        assert!("authenticate".parse::<ActionTag>().is_err());
        assert!("other-lib:authenticate-ack".parse::<ActionTag>().is_err());
        assert!("web-eid:warning".parse::<ActionTag>().is_err());
        assert!("web-eid:sign-done".parse::<ActionTag>().is_err());
        assert!("web-eid:".parse::<ActionTag>().is_err());
    }
}
