pub mod coordinator;
pub mod engine;

use futures::future::{BoxFuture, Shared};

use crate::app::{CoordinatorError, FailureReason};
use crate::cache::MergeResult;

pub use coordinator::RefreshCoordinator;
pub use engine::{SectionWatch, SyncEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Fetch the first page and merge it over the head of the feed.
    Refresh,
    /// Fetch the first page and replace the whole feed with it.
    Reload,
    /// Fetch the page after the stored cursor and append it.
    LoadMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated(MergeResult),
    AlreadyAtEnd,
    /// Pagination was asked for while the section was refreshing or failed.
    AlreadyInFlight,
    /// A refresh overtook this pagination; its page was discarded.
    Superseded,
    Failed(FailureReason),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshOutcome::Updated(_))
    }

    pub fn merge(&self) -> Option<&MergeResult> {
        match self {
            RefreshOutcome::Updated(result) => Some(result),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            RefreshOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<CoordinatorError> for RefreshOutcome {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::AlreadyInFlight => RefreshOutcome::AlreadyInFlight,
            CoordinatorError::AlreadyAtEnd => RefreshOutcome::AlreadyAtEnd,
        }
    }
}

pub(crate) type SharedOutcome = Shared<BoxFuture<'static, RefreshOutcome>>;
