//! # Threadwatch
//!
//! Keeps imageboard threads and board catalogs in sync with the site,
//! polling on a backoff schedule and merging every response into an
//! immutable snapshot for subscribers.
//!
//! ## Architecture
//!
//! ```text
//! Registry → Site adapter → Transport → Loader → Subscribers
//!                                         ↑
//!                                       Store
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Register 4chan
//! threadwatch sites add 4chan
//!
//! # Follow a thread
//! threadwatch watch https://boards.4chan.org/g/thread/123
//!
//! # Reply to it
//! threadwatch post https://boards.4chan.org/g/thread/123 --comment "hi" --captcha TOKEN
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, transport, site registry, loaders.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration file at `~/.config/threadwatch/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`Loadable`](domain::Loadable): a catalog or thread identity
/// - [`Post`](domain::Post): one immutable post
/// - [`ThreadSnapshot`](domain::ThreadSnapshot): merged posts of a loadable
pub mod domain;

/// HTTP transport.
///
/// - [`HttpTransport`](fetcher::HttpTransport): async trait executing a request
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
/// - [`ParallelTransport`](fetcher::ParallelTransport): caps requests in flight
pub mod fetcher;

/// Live loading of threads and catalogs.
pub mod loader;

/// Comment markup to plain text, quotes and links.
pub mod normalizer;

/// Registered sites and their persisted boards.
pub mod registry;

/// Site adapters: request building and response parsing per imageboard.
pub mod site;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
