use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{Result, WatchError};
use crate::config::Config;
use crate::fetcher::{HttpFetcher, HttpTransport, ParallelTransport};
use crate::loader::{BackoffLadder, LoaderPool};
use crate::registry::{BoardManager, SiteRegistry};
use crate::site::SiteActions;
use crate::store::{SqliteStore, Store};

pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub transport: Arc<dyn HttpTransport>,
    pub registry: Arc<SiteRegistry>,
    pub boards: BoardManager,
    pub actions: SiteActions,
    pub pool: LoaderPool,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match &config.store.database_path {
            Some(p) => p.clone(),
            None => Self::default_db_path()?,
        };

        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(&db_path)?);
        let fetcher: Arc<dyn HttpTransport> = Arc::new(HttpFetcher::new(&config.http)?);
        Self::with_parts(config, store, fetcher)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory()?);
        let fetcher: Arc<dyn HttpTransport> = Arc::new(HttpFetcher::new(&config.http)?);
        Self::with_parts(config, store, fetcher)
    }

    /// Wire the components around an existing store and transport.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn Store>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ParallelTransport::with_workers(
            transport,
            config.http.max_concurrent_requests,
        ));

        let registry = Arc::new(SiteRegistry::new(store.clone()));
        registry.initialize()?;

        let boards = BoardManager::new(store.clone());
        let actions = SiteActions::new(transport.clone());
        let pool = LoaderPool::new(
            transport.clone(),
            BackoffLadder::from_secs(&config.loader.watch_timeouts),
        );

        Ok(Self {
            config,
            store,
            transport,
            registry,
            boards,
            actions,
            pool,
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| WatchError::Config("Could not find data directory".into()))?;
        let app_dir = data_dir.join("threadwatch");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("threadwatch.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteKind;

    #[test]
    fn test_in_memory_context_starts_empty() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        assert!(ctx.registry.all().is_empty());
    }

    #[test]
    fn test_context_reloads_persisted_sites() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.database_path = Some(dir.path().join("threadwatch.db"));

        let id = {
            let ctx = AppContext::new(config.clone()).unwrap();
            ctx.registry.add_site(SiteKind::Chan4).unwrap().id()
        };

        let ctx = AppContext::new(config).unwrap();
        assert_eq!(ctx.registry.for_id(id).unwrap().kind(), SiteKind::Chan4);
    }
}
