//! Merge rules applied to a section's state. Pure functions; locking and
//! publication live in [`ArticleCache`](super::ArticleCache).

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use crate::domain::{Article, FeedState, Page};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub added: usize,
    pub updated: usize,
    /// Section version after the merge.
    pub version: u64,
}

impl MergeResult {
    pub fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0
    }

    fn with_counts(self, added: usize, updated: usize) -> Self {
        Self {
            added,
            updated,
            ..self
        }
    }
}

/// Refresh: the page becomes the head of the feed. Articles positioned after
/// the refreshed window survive unless the page says the feed ends inside it.
pub(crate) fn apply_refresh(state: &mut FeedState, page: Page) -> MergeResult {
    let incoming = dedup(page.articles);
    let window_end = incoming.iter().map(|a| a.ordinal).max();
    let previous = std::mem::take(&mut state.articles);

    let (added, updated) = count_changes(&previous, &incoming);

    let mut articles = incoming;
    if page.next_cursor.is_some() {
        let fresh: HashSet<String> = articles.iter().map(|a| a.id.clone()).collect();
        articles.extend(previous.into_iter().filter(|a| {
            !fresh.contains(&a.id) && window_end.is_none_or(|end| a.ordinal > end)
        }));
    }
    articles.sort_by(Article::feed_order);

    state.articles = articles;
    state.cursor = page.next_cursor;
    bump_generation(state).with_counts(added, updated)
}

/// Reload: the page replaces everything.
pub(crate) fn apply_replace(state: &mut FeedState, page: Page) -> MergeResult {
    let mut incoming = dedup(page.articles);
    let (added, updated) = count_changes(&state.articles, &incoming);
    incoming.sort_by(Article::feed_order);

    state.articles = incoming;
    state.cursor = page.next_cursor;
    bump_generation(state).with_counts(added, updated)
}

/// Pagination: new ids are appended, known ids are updated in place. A page
/// that changes nothing leaves the state untouched, version included.
pub(crate) fn apply_append(state: &mut FeedState, page: Page) -> MergeResult {
    let mut index: HashMap<String, usize> = state
        .articles
        .iter()
        .enumerate()
        .map(|(i, a)| (a.id.clone(), i))
        .collect();

    let mut added = 0;
    let mut updated = 0;
    for article in dedup(page.articles) {
        match index.get(&article.id) {
            Some(&i) => {
                if state.articles[i] != article {
                    state.articles[i] = article;
                    updated += 1;
                }
            }
            None => {
                index.insert(article.id.clone(), state.articles.len());
                state.articles.push(article);
                added += 1;
            }
        }
    }

    let cursor_changed = state.cursor != page.next_cursor;
    state.cursor = page.next_cursor;

    if added > 0 || updated > 0 || cursor_changed {
        state.articles.sort_by(Article::feed_order);
        state.version += 1;
        state.synced_at = Some(Utc::now());
    }

    MergeResult {
        added,
        updated,
        version: state.version,
    }
}

fn bump_generation(state: &mut FeedState) -> MergeResult {
    state.version += 1;
    state.generation += 1;
    state.synced_at = Some(Utc::now());
    MergeResult {
        version: state.version,
        ..MergeResult::default()
    }
}

fn count_changes(previous: &[Article], incoming: &[Article]) -> (usize, usize) {
    let known: HashMap<&str, &Article> = previous.iter().map(|a| (a.id.as_str(), a)).collect();
    incoming
        .iter()
        .fold((0, 0), |(added, updated), article| match known.get(article.id.as_str()) {
            None => (added + 1, updated),
            Some(old) if *old != article => (added, updated + 1),
            Some(_) => (added, updated),
        })
}

/// First occurrence of an id wins.
fn dedup(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .collect()
}
