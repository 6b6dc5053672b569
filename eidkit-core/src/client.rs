//! The protocol state machine.
//!
//! [`EidClient`] turns one logical call into a tracked exchange: it enforces single-flight per base
//! action, arms the ack and reply timers, dispatches over the bus or the mobile flow, and settles
//! the caller's future exactly once from whichever terminal event comes first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::action::{Action, Phase};
use crate::bus::{EventKind, InboundEvent, MessageBus};
use crate::config::Config;
use crate::error::EidError;
use crate::host::Host;
use crate::http_request::{PollUrlPolicy, Request};
use crate::message::Message;
use crate::mobile::MobileFlow;
use crate::qr::{QrEncoder, QrRenderer, SvgRenderer};
use crate::registry::{Registry, ScopedTask};

/// The collaborators a client talks to besides the bus.
#[derive(Clone)]
pub struct Collaborators {
    /// The hosting page.
    pub host: Arc<dyn Host>,
    /// Encodes deep links into QR codes for the non-mobile flow.
    pub qr_encoder: Arc<dyn QrEncoder>,
    /// Renders encoded QR codes for display.
    pub qr_renderer: Arc<dyn QrRenderer>,
    /// Schemes accepted for `getAuthSuccessUrl`.
    pub poll_url_policy: PollUrlPolicy,
}

impl Collaborators {
    /// Uses [`SvgRenderer`] to render QR codes and only polls `https` URLs.
    #[must_use]
    pub fn new(host: Arc<dyn Host>, qr_encoder: Arc<dyn QrEncoder>) -> Self {
        Self {
            host,
            qr_encoder,
            qr_renderer: Arc::new(SvgRenderer),
            poll_url_policy: PollUrlPolicy::default(),
        }
    }

    /// Replaces the QR renderer.
    #[must_use]
    pub fn with_renderer(mut self, qr_renderer: Arc<dyn QrRenderer>) -> Self {
        self.qr_renderer = qr_renderer;
        self
    }

    /// Replaces the policy for `getAuthSuccessUrl` schemes.
    #[must_use]
    pub const fn with_poll_url_policy(mut self, poll_url_policy: PollUrlPolicy) -> Self {
        self.poll_url_policy = poll_url_policy;
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum TimerKind {
    Ack,
    Reply,
}

struct Inner {
    config: Config,
    bus: MessageBus,
    collaborators: Collaborators,
    http: Request,
    registry: Mutex<Registry>,
}

/// Web eID client.
///
/// Call [`EidClient::start`] before sending; requests are only answered while the bus listener
/// runs.
pub struct EidClient {
    inner: Arc<Inner>,
    listener: Mutex<Option<ScopedTask>>,
}

impl EidClient {
    /// Creates a stopped client.
    #[must_use]
    pub fn new(config: Config, bus: MessageBus, collaborators: Collaborators) -> Self {
        let http = Request::new(config.server_request_timeout);
        Self {
            inner: Arc::new(Inner {
                config,
                bus,
                collaborators,
                http,
                registry: Mutex::new(Registry::default()),
            }),
            listener: Mutex::new(None),
        }
    }

    /// The configuration the client was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Subscribes to the bus and starts dispatching inbound events. Idempotent.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut listener = lock(&self.listener);
        if listener.is_some() {
            return;
        }

        let mut receiver = self.inner.bus.subscribe();
        let inner = Arc::downgrade(&self.inner);
        *listener = Some(ScopedTask::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        let Some(event) = InboundEvent::decode(message) else {
                            continue;
                        };
                        let Some(inner) = inner.upgrade() else {
                            break;
                        };
                        inner.handle(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("bus listener lagged, {skipped} messages skipped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
        log::debug!("eidkit client started");
    }

    /// Stops the bus listener and rejects every outstanding request.
    pub fn stop(&self) {
        lock(&self.listener).take();
        let abandoned = self.inner.registry().drain();
        for entry in abandoned {
            entry.settle(Err(EidError::Unknown("client stopped".to_string())));
        }
        log::debug!("eidkit client stopped");
    }

    /// Whether the bus listener is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.listener).is_some()
    }

    /// Whether a request for `action` is outstanding.
    #[must_use]
    pub fn is_pending(&self, action: Action) -> bool {
        self.inner.registry().lookup(action).is_some()
    }

    /// Sends a request and waits for its single outcome.
    ///
    /// `timeout` bounds the whole exchange. The peer must acknowledge within the handshake
    /// timeout of the selected transport.
    ///
    /// # Errors
    /// - [`EidError::ActionPending`] if a request for the same action is outstanding.
    /// - [`EidError::ContextInsecure`] if the host is not a secure context.
    /// - [`EidError::ExtensionUnavailable`] / [`EidError::AuthAppNotInstalled`] if no ack arrives
    ///   in time.
    /// - [`EidError::ActionTimeout`] if no outcome arrives within `timeout`.
    /// - Any error reported by the peer or the mobile flow.
    pub async fn send(&self, message: Message, timeout: Duration) -> Result<Message, EidError> {
        let outcome = self.dispatch(message, timeout)?;
        outcome.await.unwrap_or_else(|_| {
            Err(EidError::Unknown(
                "request was abandoned before it settled".to_string(),
            ))
        })
    }

    fn dispatch(
        &self,
        message: Message,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<Result<Message, EidError>>, EidError> {
        let action = match message.tag() {
            Ok(tag) if tag.phase == Phase::Request => tag.action,
            Ok(_) => {
                return Err(EidError::Unknown(format!(
                    "{} is not a request action",
                    message.action
                )))
            }
            Err(e) => return Err(EidError::Unknown(e.to_string())),
        };
        if !self.is_running() {
            return Err(EidError::Unknown("client is not running".to_string()));
        }

        let inner = &self.inner;
        let mut registry = inner.registry();
        if registry.lookup(action).is_some() {
            return Err(EidError::ActionPending(action.request_tag()));
        }
        if !inner.collaborators.host.is_secure_context() {
            return Err(EidError::ContextInsecure);
        }

        let use_auth_app = message.uses_auth_app();
        let handshake = inner.config.handshake_timeout_for(use_auth_app);
        let (settlement, outcome) = oneshot::channel();
        let entry = registry.register(action, message.clone(), settlement)?;
        let id = entry.id();
        entry.arm(
            inner.schedule(id, action, TimerKind::Ack, handshake),
            inner.schedule(id, action, TimerKind::Reply, timeout),
        );

        if use_auth_app {
            let flow = MobileFlow {
                action,
                message,
                config: inner.config.clone(),
                bus: inner.bus.clone(),
                host: Arc::clone(&inner.collaborators.host),
                encoder: Arc::clone(&inner.collaborators.qr_encoder),
                renderer: Arc::clone(&inner.collaborators.qr_renderer),
                http: inner.http.clone(),
                poll_url_policy: inner.collaborators.poll_url_policy,
            };
            entry.attach_flow(ScopedTask::spawn(flow.run()));
            log::debug!("{action} handed to the authenticator app");
        } else {
            drop(registry);
            inner.bus.post(message);
            log::debug!("{action} posted to the extension");
        }
        Ok(outcome)
    }
}

impl Drop for EidClient {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        lock(&self.registry)
    }

    /// Arms a timer for request `id`. The timer only acts if `id` is still the registered request
    /// for `action` when it fires.
    fn schedule(
        self: &Arc<Self>,
        id: Uuid,
        action: Action,
        kind: TimerKind,
        after: Duration,
    ) -> ScopedTask {
        let inner: Weak<Self> = Arc::downgrade(self);
        ScopedTask::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(inner) = inner.upgrade() {
                inner.expire(id, action, kind);
            }
        })
    }

    fn expire(&self, id: Uuid, action: Action, kind: TimerKind) {
        let entry = {
            let mut registry = self.registry();
            match registry.lookup(action) {
                Some(entry) if entry.id() == id => registry.remove(action),
                _ => None,
            }
        };
        let Some(entry) = entry else {
            return;
        };

        let error = match kind {
            TimerKind::Ack if entry.uses_auth_app() => EidError::AuthAppNotInstalled,
            TimerKind::Ack => EidError::ExtensionUnavailable,
            TimerKind::Reply => EidError::ActionTimeout(action.request_tag()),
        };
        log::warn!("{action} timed out: {error}");
        entry.settle(Err(error));
    }

    fn handle(&self, event: InboundEvent) {
        let InboundEvent {
            action,
            kind,
            message,
        } = event;

        if kind == EventKind::Ack {
            match self.registry().lookup_mut(action) {
                Some(entry) => {
                    if entry.acknowledge() {
                        log::debug!("{action} acknowledged");
                    }
                }
                None => log::debug!("dropping ack for {action}: no pending request"),
            }
            return;
        }

        let Some(entry) = self.registry().remove(action) else {
            log::debug!("dropping {}: no pending request", message.action);
            return;
        };
        let result = match kind {
            EventKind::Failure => Err(message.error.clone().map_or_else(
                || EidError::FailureMessage(Box::new(message)),
                EidError::from,
            )),
            _ => Ok(message),
        };
        log::debug!("{action} settled");
        entry.settle(result);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast;

    use super::*;
    use crate::host::Visibility;
    use crate::qr::{ErrorCorrectionLevel, ModuleMatrix};

    struct PageHost {
        secure: bool,
        visibility: broadcast::Sender<Visibility>,
    }

    impl Host for PageHost {
        fn is_secure_context(&self) -> bool {
            self.secure
        }
        fn is_mobile_device(&self) -> bool {
            false
        }
        fn navigate(&self, _url: &str) {}
        fn visibility(&self) -> broadcast::Receiver<Visibility> {
            self.visibility.subscribe()
        }
        fn display_qr_code(&self, _svg: &str) {}
    }

    struct NoEncoder;

    impl QrEncoder for NoEncoder {
        fn encode(
            &self,
            _text: &str,
            _level: ErrorCorrectionLevel,
        ) -> Result<ModuleMatrix, EidError> {
            Err(EidError::Unknown("no encoder".to_string()))
        }
    }

    fn client(secure: bool) -> (EidClient, MessageBus) {
        let bus = MessageBus::new();
        let host = Arc::new(PageHost {
            secure,
            visibility: broadcast::channel(4).0,
        });
        let config = Config::default()
            .with_handshake_timeouts(Duration::from_secs(1), Duration::from_secs(5));
        let client = EidClient::new(
            config,
            bus.clone(),
            Collaborators::new(host, Arc::new(NoEncoder)),
        );
        (client, bus)
    }

    fn request(action: Action) -> Message {
        Message::new(action.tag(Phase::Request))
    }

    #[tokio::test]
    async fn test_send_requires_running_client() {
        let (client, _bus) = client(true);
        let result = client.send(request(Action::Status), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(EidError::Unknown(_))));
        assert!(!client.is_pending(Action::Status));
    }

    #[tokio::test]
    async fn test_send_rejects_non_request_actions() {
        let (client, _bus) = client(true);
        client.start();
        let message = Message::new(Action::Status.tag(Phase::Ack));
        let result = client.send(message, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(EidError::Unknown(_))));
    }

    #[tokio::test]
    async fn test_insecure_context_is_rejected_without_side_effects() {
        let (client, bus) = client(false);
        client.start();
        let mut peer = bus.subscribe();

        let result = client.send(request(Action::Sign), Duration::from_secs(1)).await;

        assert_eq!(result, Err(EidError::ContextInsecure));
        assert!(!client.is_pending(Action::Sign));
        assert!(peer.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_timeout_without_extension() {
        let (client, _bus) = client(true);
        client.start();

        let result = client.send(request(Action::Status), Duration::from_secs(30)).await;

        assert_eq!(result, Err(EidError::ExtensionUnavailable));
        assert!(!client.is_pending(Action::Status));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_rejects_outstanding_requests() {
        let (client, _bus) = client(true);
        let client = Arc::new(client);
        client.start();

        let sender = Arc::clone(&client);
        let pending = tokio::spawn(async move {
            sender
                .send(request(Action::Authenticate), Duration::from_secs(30))
                .await
        });
        tokio::task::yield_now().await;
        assert!(client.is_pending(Action::Authenticate));

        client.stop();

        assert_eq!(
            pending.await.unwrap(),
            Err(EidError::Unknown("client stopped".to_string()))
        );
        assert!(!client.is_running());
    }
}
