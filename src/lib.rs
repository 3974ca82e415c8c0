//! # Tidings
//!
//! Feed synchronization core for a sectioned news reader.
//!
//! ## Architecture
//!
//! ```text
//! Transport → Decoder → ArticleCache → watch channels → list UI
//!                ↑
//!           SyncEngine + RefreshCoordinator
//! ```
//!
//! - [`transport`]: fetches raw page bodies (reqwest by default)
//! - [`decoder`]: turns bodies into [`Page`](domain::Page)s
//! - [`cache`]: per-section, deduplicated, ordered article store
//! - [`sync`]: refresh / load-more orchestration with coalescing and
//!   stale-write protection
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tidings::app::SyncContext;
//! use tidings::config::Config;
//!
//! let ctx = SyncContext::new(Config::load()?)?;
//! let mut watch = ctx.engine.watch("tech");
//!
//! ctx.engine.refresh("tech").await;
//! ctx.engine.load_more("tech").await;
//!
//! let state = watch.feed.borrow_and_update().clone();
//! ```

/// Context wiring, error types and logging setup.
///
/// The [`SyncContext`](app::SyncContext) struct wires together transport,
/// cache and engine from a [`Config`](config::Config).
pub mod app;

/// Per-section article store.
///
/// - [`ArticleCache`](cache::ArticleCache): merge pages, publish snapshots
/// - [`MergeResult`](cache::MergeResult): what a merge changed
pub mod cache;

/// Configuration management.
///
/// Loads from `~/.config/tidings/config.toml`: endpoint, transport
/// timeouts, fetch concurrency and the section list.
pub mod config;

/// Response body decoding.
///
/// Handles the JSON news API (envelope or bare array) and RSS/Atom feeds.
pub mod decoder;

/// Core domain models.
///
/// - [`Article`](domain::Article): one card in the list
/// - [`Page`](domain::Page): one fetched page plus its opaque cursor
/// - [`FeedState`](domain::FeedState): everything known about a section
/// - [`RefreshStatus`](domain::RefreshStatus): what the section is doing
pub mod domain;

/// Refresh and pagination orchestration.
pub mod sync;

/// Page fetching.
///
/// - [`Transport`](transport::Transport): async trait for fetching bodies
/// - [`HttpTransport`](transport::HttpTransport): reqwest-based implementation
/// - [`FeedEndpoint`](transport::FeedEndpoint): page URL construction
pub mod transport;
