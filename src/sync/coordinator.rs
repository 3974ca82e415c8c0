use futures::future::AbortHandle;
use tokio::sync::watch;

use crate::app::CoordinatorError;
use crate::domain::RefreshStatus;
use crate::sync::{OpKind, RefreshOutcome, SharedOutcome};

struct InFlight {
    op: u64,
    kind: OpKind,
    outcome: SharedOutcome,
    abort: AbortHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub op: u64,
    pub kind: OpKind,
}

pub(crate) enum Admission {
    /// Run a new operation under this ticket.
    Start(Ticket),
    /// Attach to the operation already in flight.
    Join(SharedOutcome),
    /// Wait for the operation in flight to settle, then ask again.
    After(SharedOutcome),
}

/// Per-section state machine deciding which refresh and pagination
/// requests run, which join an operation already in flight, and which are
/// turned away.
///
/// ```text
/// Idle | Failed --refresh--> Refreshing
/// LoadingMore   --refresh--> Refreshing   (pagination is aborted)
/// Idle          --loadMore-> LoadingMore
/// Refreshing | LoadingMore --success--> Idle
/// Refreshing | LoadingMore --failure--> Failed
/// ```
///
/// It is the only writer of the section's [`RefreshStatus`].
pub struct RefreshCoordinator {
    status: watch::Sender<RefreshStatus>,
    refresh: Option<InFlight>,
    load_more: Option<InFlight>,
    next_op: u64,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        let (status, _) = watch::channel(RefreshStatus::Idle);
        Self {
            status,
            refresh: None,
            load_more: None,
            next_op: 0,
        }
    }

    pub fn status(&self) -> RefreshStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshStatus> {
        self.status.subscribe()
    }

    /// Admit a refresh or reload. Joins a head operation already running and
    /// preempts any pagination in flight. A reload never settles for a
    /// running refresh: it queues behind it instead.
    pub(crate) fn admit_refresh(&mut self, kind: OpKind) -> Admission {
        if let Some(running) = &self.refresh {
            if kind == OpKind::Reload && running.kind == OpKind::Refresh {
                tracing::debug!(op = running.op, "Reload queued behind refresh in flight");
                return Admission::After(running.outcome.clone());
            }
            return Admission::Join(running.outcome.clone());
        }

        if let Some(preempted) = self.load_more.take() {
            tracing::debug!(op = preempted.op, "Refresh preempts pagination in flight");
            preempted.abort.abort();
        }

        self.status.send_replace(RefreshStatus::Refreshing);
        Admission::Start(self.ticket(kind))
    }

    /// Admit a pagination request. `has_cursor` is false when the section has
    /// nothing more to load.
    pub(crate) fn admit_load_more(
        &mut self,
        has_cursor: bool,
    ) -> Result<Admission, CoordinatorError> {
        if let Some(running) = &self.load_more {
            return Ok(Admission::Join(running.outcome.clone()));
        }
        if *self.status.borrow() != RefreshStatus::Idle {
            return Err(CoordinatorError::AlreadyInFlight);
        }
        if !has_cursor {
            return Err(CoordinatorError::AlreadyAtEnd);
        }

        self.status.send_replace(RefreshStatus::LoadingMore);
        Ok(Admission::Start(self.ticket(OpKind::LoadMore)))
    }

    pub(crate) fn register(&mut self, ticket: Ticket, outcome: SharedOutcome, abort: AbortHandle) {
        let running = InFlight {
            op: ticket.op,
            kind: ticket.kind,
            outcome,
            abort,
        };
        match ticket.kind {
            OpKind::Refresh | OpKind::Reload => self.refresh = Some(running),
            OpKind::LoadMore => self.load_more = Some(running),
        }
    }

    /// Settle the operation behind `ticket`. Returns false, changing nothing,
    /// when the operation was preempted in the meantime.
    pub(crate) fn complete(&mut self, ticket: Ticket, outcome: &RefreshOutcome) -> bool {
        let slot = match ticket.kind {
            OpKind::Refresh | OpKind::Reload => &mut self.refresh,
            OpKind::LoadMore => &mut self.load_more,
        };
        if slot.as_ref().map(|running| running.op) != Some(ticket.op) {
            return false;
        }
        *slot = None;

        let next = match outcome {
            RefreshOutcome::Failed(reason) => RefreshStatus::Failed(reason.clone()),
            _ => RefreshStatus::Idle,
        };
        self.status.send_replace(next);
        true
    }

    fn ticket(&mut self, kind: OpKind) -> Ticket {
        self.next_op += 1;
        Ticket {
            op: self.next_op,
            kind,
        }
    }
}
