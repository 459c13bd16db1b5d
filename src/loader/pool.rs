use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::app::{Result, WatchError};
use crate::domain::Loadable;
use crate::fetcher::HttpTransport;
use crate::loader::{BackoffLadder, Subscription, ThreadLoader};
use crate::site::SiteAdapter;

/// One [`ThreadLoader`] per loadable, shared by everyone watching it.
pub struct LoaderPool {
    transport: Arc<dyn HttpTransport>,
    ladder: BackoffLadder,
    loaders: Mutex<HashMap<Loadable, ThreadLoader>>,
}

impl LoaderPool {
    pub fn new(transport: Arc<dyn HttpTransport>, ladder: BackoffLadder) -> Self {
        Self {
            transport,
            ladder,
            loaders: Mutex::new(HashMap::new()),
        }
    }

    /// The loader for `loadable`, spawning one if needed.
    pub async fn obtain(&self, loadable: &Loadable, site: Arc<dyn SiteAdapter>) -> ThreadLoader {
        let mut loaders = self.loaders.lock().await;
        self.obtain_locked(&mut loaders, loadable, site)
    }

    fn obtain_locked(
        &self,
        loaders: &mut HashMap<Loadable, ThreadLoader>,
        loadable: &Loadable,
        site: Arc<dyn SiteAdapter>,
    ) -> ThreadLoader {
        if loaders.get(loadable).is_some_and(ThreadLoader::is_closed) {
            debug!("Replacing stopped loader for {}", loadable);
            loaders.remove(loadable);
        }

        loaders
            .entry(loadable.clone())
            .or_insert_with(|| {
                debug!("Creating loader for {}", loadable);
                ThreadLoader::spawn(
                    loadable.clone(),
                    site,
                    self.transport.clone(),
                    self.ladder.clone(),
                )
            })
            .clone()
    }

    /// Subscribe to `loadable`, starting its loader for the first subscriber.
    pub async fn watch(
        &self,
        loadable: &Loadable,
        site: Arc<dyn SiteAdapter>,
    ) -> Result<(ThreadLoader, Subscription)> {
        let mut loaders = self.loaders.lock().await;
        let loader = self.obtain_locked(&mut loaders, loadable, site);

        let subscription = loader.subscribe().await?;
        if loader.status().await?.subscribers == 1 {
            loader.start()?;
        }
        Ok((loader, subscription))
    }

    /// Drop a subscription; the loader is shut down with its last subscriber.
    pub async fn release(&self, loadable: &Loadable, subscription: u64) -> Result<()> {
        let mut loaders = self.loaders.lock().await;
        let Some(loader) = loaders.get(loadable).cloned() else {
            return Ok(());
        };

        match loader.unsubscribe(subscription).await {
            Ok(false) => Ok(()),
            Ok(true) => {
                // The task may exit before it reads the shutdown.
                let _ = loader.shutdown();
                loaders.remove(loadable);
                debug!("Released loader for {}", loadable);
                Ok(())
            }
            Err(WatchError::LoaderClosed) => {
                loaders.remove(loadable);
                debug!("Dropped stopped loader for {}", loadable);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, loadable: &Loadable) -> Option<ThreadLoader> {
        self.loaders.lock().await.get(loadable).cloned()
    }

    pub async fn len(&self) -> usize {
        self.loaders.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.loaders.lock().await.is_empty()
    }
}
