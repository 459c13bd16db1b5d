//! Live loading of threads and catalogs.
//!
//! A [`ThreadLoader`] owns one resource: it fetches through the site
//! adapter, merges results into a [`ThreadSnapshot`] with [`reconcile`],
//! and re-polls threads on the [`PollScheduler`]'s backoff ladder.
//! [`LoaderPool`] hands out one loader per [`Loadable`](crate::domain::Loadable).

pub mod coordinator;
pub mod pool;
pub mod reconcile;
pub mod scheduler;
pub mod thread_loader;

use std::sync::Arc;

use thiserror::Error;

use crate::domain::ThreadSnapshot;
use crate::fetcher::TransportError;
use crate::site::ParseError;

pub use coordinator::{Completion, FetchCoordinator};
pub use pool::LoaderPool;
pub use reconcile::reconcile;
pub use scheduler::{BackoffLadder, LoaderState, PollScheduler, DEFAULT_WATCH_TIMEOUTS};
pub use thread_loader::{Subscription, ThreadLoader};

/// Why a fetch cycle produced no snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Malformed response: {0}")]
    Parse(#[from] ParseError),

    #[error("The site returned no posts")]
    EmptyResource,
}

impl LoaderError {
    /// The resource is gone, e.g. a pruned thread.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoaderError::Transport(e) if e.is_not_found())
    }
}

/// Delivered to every subscriber once per completed fetch.
#[derive(Debug, Clone)]
pub enum LoaderEvent {
    Data(Arc<ThreadSnapshot>),
    Error(LoaderError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderStatus {
    pub state: LoaderState,
    pub current_step: usize,
    /// Milliseconds until the next poll; zero or less means due now.
    pub time_until_load_more_ms: i64,
    pub is_loading: bool,
    pub post_count: usize,
    pub subscribers: usize,
}
