use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Stable identity, unique across the lifetime of the feed.
    pub id: String,
    pub title: String,
    pub summary: String,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub section: String,
    /// Position in the remote feed; the primary sort key.
    pub ordinal: u64,
    pub read_count: Option<u64>,
}

impl Article {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        section: impl Into<String>,
        ordinal: u64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            summary: String::new(),
            thumbnail_url: None,
            published_at: None,
            section: section.into(),
            ordinal,
            read_count: None,
        }
    }

    /// Feed order: ordinal ascending, then newest first, undated last.
    pub fn feed_order(&self, other: &Self) -> Ordering {
        self.ordinal
            .cmp(&other.ordinal)
            .then_with(|| newest_first(self.published_at, other.published_at))
            .then_with(|| self.id.cmp(&other.id))
    }

    pub fn display_summary(&self) -> &str {
        if self.summary.is_empty() {
            &self.title
        } else {
            &self.summary
        }
    }
}

pub(crate) fn newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
