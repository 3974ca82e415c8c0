use chrono::{DateTime, Utc};

use crate::app::FailureReason;
use crate::domain::{Article, Cursor};

/// Per-section aggregate of everything fetched so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    pub section: String,
    /// Unique by id, kept in feed order.
    pub articles: Vec<Article>,
    pub cursor: Option<Cursor>,
    /// Bumped on every merge that changes the state; never decreases.
    pub version: u64,
    /// Bumped on every refresh or reload merge. Pagination started under an
    /// older generation is stale.
    pub generation: u64,
    pub synced_at: Option<DateTime<Utc>>,
}

impl FeedState {
    pub fn empty(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            articles: Vec::new(),
            cursor: None,
            version: 0,
            generation: 0,
            synced_at: None,
        }
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.id == id)
    }

    /// True once at least one page arrived and the source reported no more.
    pub fn is_exhausted(&self) -> bool {
        self.version > 0 && self.cursor.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RefreshStatus {
    #[default]
    Idle,
    Refreshing,
    LoadingMore,
    Failed(FailureReason),
}

impl RefreshStatus {
    pub fn can_refresh(&self) -> bool {
        !matches!(self, RefreshStatus::Refreshing)
    }

    pub fn can_load_more(&self) -> bool {
        matches!(self, RefreshStatus::Idle)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, RefreshStatus::Refreshing | RefreshStatus::LoadingMore)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            RefreshStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}
