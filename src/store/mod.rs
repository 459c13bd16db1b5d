pub mod sqlite;

use crate::app::Result;
use crate::domain::{Board, SiteId, SiteRecord};

pub use sqlite::SqliteStore;

pub trait Store: Send + Sync {
    // Site operations
    fn add_site(&self, record: &SiteRecord) -> Result<SiteId>;
    fn get_site(&self, id: SiteId) -> Result<Option<SiteRecord>>;
    fn get_all_sites(&self) -> Result<Vec<SiteRecord>>;
    fn update_site_user_settings(&self, id: SiteId, settings: &serde_json::Value) -> Result<()>;
    /// Deletes the site together with its boards and ordering entry.
    fn delete_site(&self, id: SiteId) -> Result<()>;

    // Ordering operations
    fn get_ordering(&self) -> Result<Vec<SiteId>>;
    fn update_ordering(&self, ids: &[SiteId]) -> Result<()>;

    // Board operations
    /// Insert or update boards by `(site_id, code)`.
    fn upsert_boards(&self, boards: &[Board]) -> Result<usize>;
    fn get_boards(&self, site_id: SiteId) -> Result<Vec<Board>>;
    fn get_board(&self, site_id: SiteId, code: &str) -> Result<Option<Board>>;
}
