//! Mobile-flow orchestrator.
//!
//! Hands a request to the authenticator app (deep link on mobile devices, QR code elsewhere), then
//! polls the relying party for the outcome. The flow never settles a request itself: every result
//! is posted on the bus as a synthesized `-ack`, `-success` or `-failure` message and goes through
//! the same settlement path as messages from the extension.

use std::sync::Arc;

use reqwest::Url;
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;

use crate::action::{Action, Phase};
use crate::bus::MessageBus;
use crate::config::Config;
use crate::deep_link::build_deep_link;
use crate::error::EidError;
use crate::host::{Host, Visibility};
use crate::http_request::{PollUrlPolicy, Request};
use crate::message::Message;
use crate::qr::{QrEncoder, QrRenderer};
use crate::status::{classify, PollStatus};

/// Everything one mobile flow needs; owned by the spawned flow task.
pub(crate) struct MobileFlow {
    pub(crate) action: Action,
    pub(crate) message: Message,
    pub(crate) config: Config,
    pub(crate) bus: MessageBus,
    pub(crate) host: Arc<dyn Host>,
    pub(crate) encoder: Arc<dyn QrEncoder>,
    pub(crate) renderer: Arc<dyn QrRenderer>,
    pub(crate) http: Request,
    pub(crate) poll_url_policy: PollUrlPolicy,
}

impl MobileFlow {
    pub(crate) async fn run(self) {
        let link = match build_deep_link(&self.config.deep_link_base_url, &self.message) {
            Ok(link) => link,
            Err(error) => return self.fail(&error),
        };

        if self.host.is_mobile_device() {
            if !self.launch_app(&link).await {
                log::debug!("no sign of the authenticator app for {}", self.action);
                return;
            }
        } else if let Err(error) = self.show_qr_code(&link) {
            return self.fail(&error);
        }
        self.bus.post(Message::new(self.action.tag(Phase::Ack)));

        match poll_auth_success(&self.http, &self.message, self.poll_url_policy).await {
            Ok(payload) => {
                self.bus.post(Message {
                    extra: payload,
                    ..Message::new(self.action.tag(Phase::Success))
                });
            }
            Err(error) => self.fail(&error),
        }
    }

    /// Opens the deep link and waits, within the handshake window, for the page to be hidden.
    async fn launch_app(&self, link: &str) -> bool {
        let mut visibility = self.host.visibility();
        self.host.navigate(link);

        let hidden = async {
            loop {
                match visibility.recv().await {
                    Ok(Visibility::Hidden) => return true,
                    Ok(Visibility::Visible) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return false,
                }
            }
        };
        tokio::time::timeout(self.config.auth_app_handshake_timeout, hidden)
            .await
            .unwrap_or(false)
    }

    fn show_qr_code(&self, link: &str) -> Result<(), EidError> {
        let qr = &self.config.qr;
        let matrix = self.encoder.encode(link, qr.error_correction)?;
        let svg = self
            .renderer
            .render(&matrix, qr.border, &qr.light_color, &qr.dark_color);
        self.host.display_qr_code(&svg);
        Ok(())
    }

    fn fail(&self, error: &EidError) {
        log::debug!("mobile flow for {} failed: {error}", self.action);
        self.bus
            .post(Message::failure(self.action.tag(Phase::Failure), error));
    }
}

/// Fetches the outcome of the flow from `getAuthSuccessUrl` with a single GET request.
///
/// Returns the JSON object body of the successful response (empty if the body is not an object).
pub(crate) async fn poll_auth_success(
    http: &Request,
    message: &Message,
    policy: PollUrlPolicy,
) -> Result<Map<String, Value>, EidError> {
    let url = poll_target(message.get_auth_success_url.as_deref(), policy)?;
    let response = http
        .handle(http.get(url, message.headers.as_ref()))
        .await?;

    match classify(response.status().as_u16()) {
        PollStatus::Success => {
            let mut payload = match response.json::<Value>().await {
                Ok(Value::Object(payload)) => payload,
                _ => Map::new(),
            };
            payload.remove("action");
            payload.remove("error");
            Ok(payload)
        }
        PollStatus::Failed(error) => Err(error),
    }
}

fn poll_target(url: Option<&str>, policy: PollUrlPolicy) -> Result<Url, EidError> {
    let url = url.ok_or_else(|| EidError::MissingParameter("getAuthSuccessUrl".to_string()))?;
    match Url::parse(url) {
        Ok(parsed) if policy.permits(&parsed) => Ok(parsed),
        _ => Err(EidError::ProtocolInsecure(url.to_string())),
    }
}
