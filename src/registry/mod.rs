//! Registered sites and their boards.

pub mod boards;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{info, warn};
use url::Url;

use crate::app::{Result, WatchError};
use crate::domain::{Loadable, SiteId, SiteRecord};
use crate::site::{self, SiteAdapter, SiteKind};
use crate::store::Store;

pub use boards::BoardManager;

/// An immutable set of instantiated sites.
#[derive(Default)]
pub struct Sites {
    sites: Vec<Arc<dyn SiteAdapter>>,
    by_id: HashMap<SiteId, usize>,
    ordering: Vec<SiteId>,
}

impl Sites {
    fn new(sites: Vec<Arc<dyn SiteAdapter>>, ordering: Vec<SiteId>) -> Self {
        let by_id = sites
            .iter()
            .enumerate()
            .map(|(i, site)| (site.id(), i))
            .collect();
        Self {
            sites,
            by_id,
            ordering,
        }
    }

    pub fn get(&self, id: SiteId) -> Option<&Arc<dyn SiteAdapter>> {
        self.by_id.get(&id).map(|&i| &self.sites[i])
    }

    /// Sites in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SiteAdapter>> {
        self.sites.iter()
    }

    /// Sites sorted by the user's ordering; unordered sites come last.
    pub fn in_order(&self) -> Vec<Arc<dyn SiteAdapter>> {
        let position: HashMap<SiteId, usize> = self
            .ordering
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        let mut sites = self.sites.clone();
        sites.sort_by_key(|site| position.get(&site.id()).copied().unwrap_or(usize::MAX));
        sites
    }

    pub fn ordering(&self) -> &[SiteId] {
        &self.ordering
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// The live site set.
///
/// Readers take a snapshot `Arc<Sites>`; writers are serialized and publish
/// a new set by swapping the pointer, so a reader sees either the old or
/// the new set, never a mix.
pub struct SiteRegistry {
    store: Arc<dyn Store>,
    sites: RwLock<Arc<Sites>>,
    writer: Mutex<()>,
}

impl SiteRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            sites: RwLock::new(Arc::new(Sites::default())),
            writer: Mutex::new(()),
        }
    }

    /// Load every persisted site. Records of unknown kinds are skipped.
    pub fn initialize(&self) -> Result<usize> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut sites = Vec::new();
        for record in self.store.get_all_sites()? {
            match site::instantiate(&record) {
                Some(site) => sites.push(site),
                None => warn!(
                    "Skipping site {} with unknown class id {}",
                    record.id, record.config.class_id
                ),
            }
        }

        let ordering = self.store.get_ordering()?;
        let count = sites.len();
        self.publish(Sites::new(sites, ordering));
        info!("Loaded {} sites", count);
        Ok(count)
    }

    pub fn add_site(&self, kind: SiteKind) -> Result<Arc<dyn SiteAdapter>> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();

        let mut record = SiteRecord::new(kind.class_id());
        record.id = self.store.add_site(&record)?;
        let site = kind.instantiate(&record);

        let mut ordering = current.ordering.clone();
        ordering.push(record.id);
        self.store.update_ordering(&ordering)?;

        let mut sites = current.sites.clone();
        sites.push(site.clone());
        self.publish(Sites::new(sites, ordering));

        info!("Added site {} ({})", record.id, kind);
        Ok(site)
    }

    /// Unregister a site, deleting its record and boards.
    pub fn remove_site(&self, id: SiteId) -> Result<()> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();

        self.store.delete_site(id)?;

        let sites = current
            .sites
            .iter()
            .filter(|s| s.id() != id)
            .cloned()
            .collect();
        let ordering = current
            .ordering
            .iter()
            .copied()
            .filter(|o| *o != id)
            .collect();
        self.publish(Sites::new(sites, ordering));

        info!("Removed site {}", id);
        Ok(())
    }

    pub fn update_ordering(&self, ids: &[SiteId]) -> Result<()> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();

        if let Some(unknown) = ids.iter().find(|id| current.get(**id).is_none()) {
            return Err(WatchError::SiteNotFound(*unknown));
        }

        self.store.update_ordering(ids)?;
        self.publish(Sites::new(current.sites.clone(), ids.to_vec()));
        Ok(())
    }

    /// Persist new adapter settings and re-instantiate the adapter with them.
    pub fn update_user_settings(
        &self,
        id: SiteId,
        settings: serde_json::Value,
    ) -> Result<Arc<dyn SiteAdapter>> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();

        self.store.update_site_user_settings(id, &settings)?;
        let record = self
            .store
            .get_site(id)?
            .ok_or(WatchError::SiteNotFound(id))?;
        let site = site::instantiate(&record).ok_or_else(|| {
            WatchError::Other(format!("Unknown site class id {}", record.config.class_id))
        })?;

        let sites = current
            .sites
            .iter()
            .map(|s| if s.id() == id { site.clone() } else { s.clone() })
            .collect();
        self.publish(Sites::new(sites, current.ordering.clone()));
        Ok(site)
    }

    pub fn snapshot(&self) -> Arc<Sites> {
        self.sites
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, sites: Sites) {
        *self.sites.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(sites);
    }

    pub fn for_id(&self, id: SiteId) -> Option<Arc<dyn SiteAdapter>> {
        self.snapshot().get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn SiteAdapter>> {
        self.snapshot().iter().cloned().collect()
    }

    pub fn all_in_order(&self) -> Vec<Arc<dyn SiteAdapter>> {
        self.snapshot().in_order()
    }

    /// Map a URL to a loadable, asking each site in registration order.
    pub fn resolve(&self, url: &str) -> Option<Loadable> {
        let url = Url::parse(url.trim()).ok()?;
        self.snapshot().iter().find_map(|site| site.resolve(&url))
    }
}
