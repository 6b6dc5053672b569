//! Pending-request registry.
//!
//! Holds at most one in-flight request per base action. Each entry owns the tasks scheduled on its
//! behalf (ack timer, reply timer, mobile flow); removing the entry aborts all of them, and removal
//! is the only way an entry leaves the table.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::action::Action;
use crate::error::EidError;
use crate::message::Message;

/// Receives the single outcome of a request.
pub(crate) type Settlement = oneshot::Sender<Result<Message, EidError>>;

/// A spawned task that is aborted when the handle is dropped.
#[derive(Debug)]
pub(crate) struct ScopedTask(JoinHandle<()>);

impl ScopedTask {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(future))
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Non-terminal states of a request. Terminal states are represented by removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestState {
    Dispatched,
    Acked,
}

/// One outstanding request.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    id: Uuid,
    message: Message,
    settlement: Settlement,
    state: RequestState,
    ack_timer: Option<ScopedTask>,
    reply_timer: Option<ScopedTask>,
    flow: Option<ScopedTask>,
}

impl PendingRequest {
    fn new(message: Message, settlement: Settlement) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            settlement,
            state: RequestState::Dispatched,
            ack_timer: None,
            reply_timer: None,
            flow: None,
        }
    }

    /// Identifies this request instance; a later request for the same action gets a new id.
    pub(crate) const fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn uses_auth_app(&self) -> bool {
        self.message.uses_auth_app()
    }

    pub(crate) fn arm(&mut self, ack_timer: ScopedTask, reply_timer: ScopedTask) {
        self.ack_timer = Some(ack_timer);
        self.reply_timer = Some(reply_timer);
    }

    pub(crate) fn attach_flow(&mut self, flow: ScopedTask) {
        self.flow = Some(flow);
    }

    /// Moves the request to `Acked` and cancels the ack timer. Returns `false` for a repeated ack.
    pub(crate) fn acknowledge(&mut self) -> bool {
        if self.state == RequestState::Acked {
            return false;
        }
        self.state = RequestState::Acked;
        self.ack_timer = None;
        true
    }

    fn clear_timers(&mut self) {
        self.ack_timer = None;
        self.reply_timer = None;
        self.flow = None;
    }

    /// Hands the outcome to the caller.
    pub(crate) fn settle(self, result: Result<Message, EidError>) {
        if self.settlement.send(result).is_err() {
            log::debug!("caller stopped waiting for {}", self.message.action);
        }
    }
}

/// In-flight requests keyed by base action.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: HashMap<Action, PendingRequest>,
}

impl Registry {
    /// Stores a new request for `action`.
    ///
    /// # Errors
    /// Returns [`EidError::ActionPending`] if a request for `action` is already outstanding; the
    /// registry is left untouched.
    pub(crate) fn register(
        &mut self,
        action: Action,
        message: Message,
        settlement: Settlement,
    ) -> Result<&mut PendingRequest, EidError> {
        match self.entries.entry(action) {
            Entry::Occupied(_) => Err(EidError::ActionPending(action.request_tag())),
            Entry::Vacant(slot) => Ok(slot.insert(PendingRequest::new(message, settlement))),
        }
    }

    pub(crate) fn lookup(&self, action: Action) -> Option<&PendingRequest> {
        self.entries.get(&action)
    }

    pub(crate) fn lookup_mut(&mut self, action: Action) -> Option<&mut PendingRequest> {
        self.entries.get_mut(&action)
    }

    /// Removes the request for `action`, aborting its timers. Absent actions are a no-op.
    pub(crate) fn remove(&mut self, action: Action) -> Option<PendingRequest> {
        let mut entry = self.entries.remove(&action)?;
        entry.clear_timers();
        Some(entry)
    }

    /// Removes every request, aborting their timers.
    pub(crate) fn drain(&mut self) -> Vec<PendingRequest> {
        self.entries
            .drain()
            .map(|(_, mut entry)| {
                entry.clear_timers();
                entry
            })
            .collect()
    }
}
