mod merge;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::app::lock;
use crate::domain::article::newest_first;
use crate::domain::{Article, FeedState, Page};

pub use merge::MergeResult;

/// A pagination merge lost the race against a refresh of the same section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stale write: section was refreshed after this page was requested")]
pub(crate) struct StaleWrite;

struct SectionEntry {
    state: Mutex<FeedState>,
    published: watch::Sender<Arc<FeedState>>,
}

impl SectionEntry {
    fn new(section: &str) -> Self {
        let state = FeedState::empty(section);
        let (published, _) = watch::channel(Arc::new(state.clone()));
        Self {
            state: Mutex::new(state),
            published,
        }
    }

    /// Run `f` against the live state and publish a snapshot if the version moved.
    fn update<T>(&self, f: impl FnOnce(&mut FeedState) -> T) -> T {
        let mut state = lock(&self.state);
        let before = state.version;
        let out = f(&mut state);
        if state.version != before {
            self.published.send_replace(Arc::new(state.clone()));
        }
        out
    }
}

/// In-memory article store, one entry per section.
///
/// Merges into a section are serialized by that section's lock; sections
/// never wait on each other. Readers only ever see published snapshots.
#[derive(Default)]
pub struct ArticleCache {
    sections: Mutex<HashMap<String, Arc<SectionEntry>>>,
}

impl ArticleCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, section: &str) -> Arc<SectionEntry> {
        lock(&self.sections)
            .entry(section.to_string())
            .or_insert_with(|| Arc::new(SectionEntry::new(section)))
            .clone()
    }

    fn existing(&self, section: &str) -> Option<Arc<SectionEntry>> {
        lock(&self.sections).get(section).cloned()
    }

    /// Merge a fetched page. `is_refresh` selects head replacement over
    /// pagination append.
    pub fn merge(&self, section: &str, page: Page, is_refresh: bool) -> MergeResult {
        let result = self.entry(section).update(|state| {
            if is_refresh {
                merge::apply_refresh(state, page)
            } else {
                merge::apply_append(state, page)
            }
        });
        tracing::debug!(
            section,
            is_refresh,
            added = result.added,
            updated = result.updated,
            version = result.version,
            "Merged page"
        );
        result
    }

    /// Replace the section's whole article list with `page`.
    pub fn replace(&self, section: &str, page: Page) -> MergeResult {
        let result = self
            .entry(section)
            .update(|state| merge::apply_replace(state, page));
        tracing::debug!(section, version = result.version, "Replaced section");
        result
    }

    /// Append `page` only if no refresh landed since `generation` was read.
    pub(crate) fn append_if_current(
        &self,
        section: &str,
        page: Page,
        generation: u64,
    ) -> Result<MergeResult, StaleWrite> {
        let result = self.entry(section).update(|state| {
            if state.generation != generation {
                return Err(StaleWrite);
            }
            Ok(merge::apply_append(state, page))
        });

        match &result {
            Ok(merged) => tracing::debug!(
                section,
                added = merged.added,
                updated = merged.updated,
                version = merged.version,
                "Merged next page"
            ),
            Err(_) => tracing::debug!(section, generation, "Discarded stale page"),
        }
        result
    }

    /// Latest published state. Unknown sections read as empty.
    pub fn snapshot(&self, section: &str) -> Arc<FeedState> {
        let Some(entry) = self.existing(section) else {
            return Arc::new(FeedState::empty(section));
        };
        let snapshot = entry.published.borrow().clone();
        snapshot
    }

    pub fn subscribe(&self, section: &str) -> watch::Receiver<Arc<FeedState>> {
        self.entry(section).published.subscribe()
    }

    pub fn sections(&self) -> Vec<String> {
        let mut tags: Vec<String> = lock(&self.sections).keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Articles of several sections interleaved newest first, each id once.
    pub fn combined<S: AsRef<str>>(&self, sections: &[S]) -> Vec<Article> {
        let mut seen = HashSet::new();
        let mut articles: Vec<Article> = sections
            .iter()
            .flat_map(|s| self.snapshot(s.as_ref()).articles.clone())
            .filter(|a| seen.insert(a.id.clone()))
            .collect();

        articles.sort_by(|a, b| {
            newest_first(a.published_at, b.published_at).then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        articles
    }
}
