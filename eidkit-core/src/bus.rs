//! The page-local message bus.
//!
//! Every participant (the client, the extension, the mobile-flow orchestrator) posts to and
//! listens on the same broadcast channel. Inbound messages are decoded once into
//! [`InboundEvent`]s; everything that is not an `-ack`, `-success` or `-failure` of a known action
//! is ignored.

use tokio::sync::broadcast;

use crate::action::{Action, Phase};
use crate::message::Message;

/// Default number of messages a lagging listener may fall behind.
pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// In-memory message bus backed by `tokio::sync::broadcast`.
#[derive(Debug, Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<Message>,
}

impl MessageBus {
    /// Creates a bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    /// Creates a bus with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Posts a message to every current subscriber and returns how many received it.
    pub fn post(&self, message: Message) -> usize {
        let action = message.action.clone();
        if let Ok(receivers) = self.sender.send(message) {
            log::trace!("posted {action} to {receivers} listeners");
            receivers
        } else {
            log::debug!("no listeners for {action}");
            0
        }
    }

    /// Subscribes to every message posted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// How an inbound message moves its request forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The peer received the request.
    Ack,
    /// The request completed.
    Success,
    /// The request failed.
    Failure,
}

/// A decoded inbound protocol event, correlated by its base action.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// The base action the event belongs to.
    pub action: Action,
    /// The kind of event.
    pub kind: EventKind,
    /// The message as it was received.
    pub message: Message,
}

impl InboundEvent {
    /// Decodes a bus message. Returns `None` for foreign messages and outgoing requests.
    #[must_use]
    pub fn decode(message: Message) -> Option<Self> {
        let tag = message.tag().ok()?;
        let kind = match tag.phase {
            Phase::Request => return None,
            Phase::Ack => EventKind::Ack,
            Phase::Success => EventKind::Success,
            Phase::Failure => EventKind::Failure,
        };
        Some(Self {
            action: tag.action,
            kind,
            message,
        })
    }
}
