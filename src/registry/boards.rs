use std::sync::Arc;

use tracing::info;

use crate::app::Result;
use crate::domain::{Board, SiteId};
use crate::store::Store;

/// Persisted boards of every site.
pub struct BoardManager {
    store: Arc<dyn Store>,
}

impl BoardManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn boards(&self, site_id: SiteId) -> Result<Vec<Board>> {
        self.store.get_boards(site_id)
    }

    pub fn board(&self, site_id: SiteId, code: &str) -> Result<Option<Board>> {
        self.store.get_board(site_id, code)
    }

    /// Save an enumeration result, updating boards that already exist.
    pub fn update_available_boards(&self, site_id: SiteId, boards: &[Board]) -> Result<usize> {
        let boards: Vec<Board> = boards
            .iter()
            .cloned()
            .map(|mut board| {
                board.site_id = site_id;
                board
            })
            .collect();

        let count = self.store.upsert_boards(&boards)?;
        info!("Saved {} boards for site {}", count, site_id);
        Ok(count)
    }

    /// Add a board to a site that cannot list its boards. An existing board
    /// with the same code is returned unchanged.
    pub fn create_board(&self, site_id: SiteId, name: &str, code: &str) -> Result<Board> {
        if let Some(existing) = self.store.get_board(site_id, code)? {
            return Ok(existing);
        }

        let mut board = Board::new(site_id, name, code);
        board.order = self.store.get_boards(site_id)?.len() as i64;
        self.store.upsert_boards(std::slice::from_ref(&board))?;
        info!("Created board {} on site {}", board.display_code(), site_id);
        Ok(board)
    }
}
