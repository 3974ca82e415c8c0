use serde::{Deserialize, Serialize};

use crate::domain::Article;

/// Opaque pagination token handed out by the feed source.
///
/// Only the endpoint and the decoder look inside; everything else stores
/// and passes it along unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

/// Where a requested page starts in the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    /// Set when the source pages by offset: a response carrying this many
    /// articles implies another page may follow.
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub section: String,
    pub articles: Vec<Article>,
    /// `None` marks the end of the feed.
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn new(
        section: impl Into<String>,
        articles: Vec<Article>,
        next_cursor: Option<Cursor>,
    ) -> Self {
        Self {
            section: section.into(),
            articles,
            next_cursor,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}
