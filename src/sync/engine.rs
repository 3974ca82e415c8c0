use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::future::{join_all, AbortHandle, Abortable, Aborted};
use futures::FutureExt;
use tokio::sync::{watch, Semaphore};

use crate::app::{lock, FailureReason};
use crate::cache::{ArticleCache, StaleWrite};
use crate::config::SyncConfig;
use crate::decoder::Decoder;
use crate::domain::{Cursor, FeedState, Page, RefreshStatus};
use crate::sync::coordinator::{Admission, Ticket};
use crate::sync::{OpKind, RefreshCoordinator, RefreshOutcome, SharedOutcome};
use crate::transport::{FeedEndpoint, Transport};

/// Receivers a list view subscribes to for one section.
pub struct SectionWatch {
    pub feed: watch::Receiver<Arc<FeedState>>,
    pub status: watch::Receiver<RefreshStatus>,
}

/// Drives refresh and pagination for every section.
///
/// Each operation runs as its own task: fetch through the [`Transport`],
/// decode, merge into the [`ArticleCache`], then settle the section's
/// [`RefreshCoordinator`]. Callers arriving while an equivalent operation
/// is in flight get that operation's outcome instead of a second fetch.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    transport: Arc<dyn Transport + Send + Sync>,
    endpoint: FeedEndpoint,
    decoder: Decoder,
    cache: Arc<ArticleCache>,
    coordinators: Mutex<HashMap<String, Arc<Mutex<RefreshCoordinator>>>>,
    fetch_permits: Semaphore,
    decode_offload_bytes: usize,
}

impl SyncEngine {
    pub fn new(
        transport: Arc<dyn Transport + Send + Sync>,
        endpoint: FeedEndpoint,
        cache: Arc<ArticleCache>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                transport,
                endpoint,
                decoder: Decoder::new(),
                cache,
                coordinators: Mutex::new(HashMap::new()),
                fetch_permits: Semaphore::new(config.max_concurrent_fetches.max(1)),
                decode_offload_bytes: config.decode_offload_bytes,
            }),
        }
    }

    pub fn cache(&self) -> &Arc<ArticleCache> {
        &self.inner.cache
    }

    /// Fetch the first page of `section` and merge it over the head of the feed.
    pub async fn refresh(&self, section: &str) -> RefreshOutcome {
        self.dispatch(section, OpKind::Refresh).await
    }

    /// Fetch the first page of `section` and replace everything cached for it.
    pub async fn reload(&self, section: &str) -> RefreshOutcome {
        self.dispatch(section, OpKind::Reload).await
    }

    /// Fetch the page after the section's stored cursor and append it.
    pub async fn load_more(&self, section: &str) -> RefreshOutcome {
        self.dispatch(section, OpKind::LoadMore).await
    }

    /// Refresh several sections concurrently, reporting each outcome in input order.
    pub async fn refresh_many<S: AsRef<str>>(
        &self,
        sections: &[S],
    ) -> Vec<(String, RefreshOutcome)> {
        let refreshes = sections.iter().map(|section| {
            let section = section.as_ref().to_string();
            async move {
                let outcome = self.refresh(&section).await;
                (section, outcome)
            }
        });
        join_all(refreshes).await
    }

    pub fn snapshot(&self, section: &str) -> Arc<FeedState> {
        self.inner.cache.snapshot(section)
    }

    /// Current status. Sections nothing has touched yet read as idle.
    pub fn status(&self, section: &str) -> RefreshStatus {
        let existing = lock(&self.inner.coordinators).get(section).cloned();
        existing
            .map(|coordinator| lock(&coordinator).status())
            .unwrap_or_default()
    }

    pub fn watch(&self, section: &str) -> SectionWatch {
        SectionWatch {
            feed: self.inner.cache.subscribe(section),
            status: lock(&self.inner.coordinator(section)).subscribe(),
        }
    }

    async fn dispatch(&self, section: &str, kind: OpKind) -> RefreshOutcome {
        let coordinator = self.inner.coordinator(section);

        loop {
            let (pending, queued) = self.admit(section, kind, &coordinator);
            let outcome = pending.await;
            if !queued {
                return outcome;
            }
        }
    }

    /// Admit one request. The flag is set when the caller has to wait for
    /// the returned operation and then try again.
    fn admit(
        &self,
        section: &str,
        kind: OpKind,
        coordinator: &Arc<Mutex<RefreshCoordinator>>,
    ) -> (SharedOutcome, bool) {
        let mut guard = lock(coordinator);
        let snapshot = self.inner.cache.snapshot(section);

        let admission = match kind {
            OpKind::Refresh | OpKind::Reload => guard.admit_refresh(kind),
            OpKind::LoadMore => match guard.admit_load_more(snapshot.cursor.is_some()) {
                Ok(admission) => admission,
                Err(rejected) => {
                    tracing::debug!(section, reason = %rejected, "Load more skipped");
                    let outcome = RefreshOutcome::from(rejected);
                    return (futures::future::ready(outcome).boxed().shared(), false);
                }
            },
        };

        match admission {
            Admission::Join(outcome) => {
                tracing::debug!(section, ?kind, "Joining operation in flight");
                (outcome, false)
            }
            Admission::After(outcome) => (outcome, true),
            Admission::Start(ticket) => {
                let cursor = match kind {
                    OpKind::LoadMore => snapshot.cursor.clone(),
                    OpKind::Refresh | OpKind::Reload => None,
                };
                let (outcome, abort) =
                    self.spawn(section, ticket, cursor, snapshot.generation, coordinator);
                guard.register(ticket, outcome.clone(), abort);
                (outcome, false)
            }
        }
    }

    fn spawn(
        &self,
        section: &str,
        ticket: Ticket,
        cursor: Option<Cursor>,
        generation: u64,
        coordinator: &Arc<Mutex<RefreshCoordinator>>,
    ) -> (SharedOutcome, AbortHandle) {
        let (abort, registration) = AbortHandle::new_pair();
        let work = self.inner.clone().execute(
            section.to_string(),
            ticket,
            cursor,
            generation,
            coordinator.clone(),
        );

        // Settle inside the task so a panic is recorded even when every
        // caller has dropped its future.
        let settle = coordinator.clone();
        let section = section.to_string();
        let guarded = AssertUnwindSafe(work).catch_unwind().map(move |result| match result {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(
                    section = %section,
                    op = ticket.op,
                    "Sync task panicked: {}",
                    message
                );
                let outcome = RefreshOutcome::Failed(FailureReason::Interrupted(message));
                lock(&settle).complete(ticket, &outcome);
                outcome
            }
        });
        let handle = tokio::spawn(Abortable::new(guarded, registration));

        let coordinator = coordinator.clone();
        let outcome = async move {
            match handle.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(Aborted)) => RefreshOutcome::Superseded,
                Err(e) => {
                    tracing::error!("Sync task join error: {}", e);
                    let outcome = RefreshOutcome::Failed(FailureReason::Interrupted(e.to_string()));
                    lock(&coordinator).complete(ticket, &outcome);
                    outcome
                }
            }
        }
        .boxed()
        .shared();

        (outcome, abort)
    }
}

impl EngineInner {
    fn coordinator(&self, section: &str) -> Arc<Mutex<RefreshCoordinator>> {
        lock(&self.coordinators)
            .entry(section.to_string())
            .or_default()
            .clone()
    }

    async fn execute(
        self: Arc<Self>,
        section: String,
        ticket: Ticket,
        cursor: Option<Cursor>,
        generation: u64,
        coordinator: Arc<Mutex<RefreshCoordinator>>,
    ) -> RefreshOutcome {
        let outcome = match self.fetch_page(&section, cursor.as_ref()).await {
            Ok(page) => self.apply(&section, ticket.kind, page, generation),
            Err(reason) => {
                tracing::warn!(section, kind = ?ticket.kind, error = %reason, "Sync failed");
                RefreshOutcome::Failed(reason)
            }
        };

        if !lock(&coordinator).complete(ticket, &outcome) {
            tracing::debug!(section, op = ticket.op, "Operation settled after being preempted");
        }
        outcome
    }

    async fn fetch_page(
        &self,
        section: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Page, FailureReason> {
        let url = self.endpoint.page_url(section, cursor);
        let window = self.endpoint.window(cursor);

        let body = {
            let _permit = self
                .fetch_permits
                .acquire()
                .await
                .map_err(|e| FailureReason::Interrupted(e.to_string()))?;
            tracing::debug!(section, url = %url, "Fetching page");
            self.transport.fetch(&url).await?
        };

        if body.len() < self.decode_offload_bytes {
            return Ok(self.decoder.decode_at(&body, section, window)?);
        }

        let decoder = self.decoder.clone();
        let section = section.to_string();
        let page = tokio::task::spawn_blocking(move || decoder.decode_at(&body, &section, window))
            .await
            .map_err(|e| FailureReason::Interrupted(e.to_string()))??;
        Ok(page)
    }

    fn apply(&self, section: &str, kind: OpKind, page: Page, generation: u64) -> RefreshOutcome {
        let merged = match kind {
            OpKind::Refresh => self.cache.merge(section, page, true),
            OpKind::Reload => self.cache.replace(section, page),
            OpKind::LoadMore => match self.cache.append_if_current(section, page, generation) {
                Ok(merged) => merged,
                Err(StaleWrite) => return RefreshOutcome::Superseded,
            },
        };

        tracing::info!(
            section,
            kind = ?kind,
            added = merged.added,
            updated = merged.updated,
            version = merged.version,
            "Section synced"
        );
        RefreshOutcome::Updated(merged)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "sync task panicked".to_string()
    }
}
