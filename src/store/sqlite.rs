use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, WatchError};
use crate::domain::{Board, SiteConfig, SiteId, SiteRecord};
use crate::store::Store;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| WatchError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            WatchError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn site_from_row(row: &Row<'_>) -> rusqlite::Result<SiteRecord> {
        let settings: String = row.get(3)?;
        Ok(SiteRecord {
            id: SiteId(row.get(0)?),
            config: SiteConfig {
                class_id: row.get(1)?,
                external: row.get(2)?,
            },
            // A corrupt settings blob resets to defaults rather than hiding the site.
            user_settings: serde_json::from_str(&settings)
                .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
        })
    }

    fn board_from_row(row: &Row<'_>) -> rusqlite::Result<Board> {
        Ok(Board {
            site_id: SiteId(row.get(0)?),
            code: row.get(1)?,
            name: row.get(2)?,
            work_safe: row.get(3)?,
            spoilers: row.get(4)?,
            archive: row.get(5)?,
            custom_spoilers: row.get(6)?,
            order: row.get(7)?,
        })
    }
}

const BOARD_COLUMNS: &str =
    "site_id, code, name, work_safe, spoilers, archive, custom_spoilers, sort_order";

impl Store for SqliteStore {
    fn add_site(&self, record: &SiteRecord) -> Result<SiteId> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO sites (class_id, external, user_settings, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.config.class_id,
                record.config.external,
                serde_json::to_string(&record.user_settings)?,
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(SiteId(conn.last_insert_rowid()))
    }

    fn get_site(&self, id: SiteId) -> Result<Option<SiteRecord>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT id, class_id, external, user_settings FROM sites WHERE id = ?1",
                params![id.0],
                Self::site_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn get_all_sites(&self) -> Result<Vec<SiteRecord>> {
        let conn = self.conn()?;

        let mut stmt =
            conn.prepare("SELECT id, class_id, external, user_settings FROM sites ORDER BY id")?;
        let sites = stmt
            .query_map([], Self::site_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sites)
    }

    fn update_site_user_settings(&self, id: SiteId, settings: &serde_json::Value) -> Result<()> {
        let conn = self.conn()?;

        let updated = conn.execute(
            "UPDATE sites SET user_settings = ?1 WHERE id = ?2",
            params![serde_json::to_string(settings)?, id.0],
        )?;

        if updated == 0 {
            return Err(WatchError::SiteNotFound(id));
        }
        Ok(())
    }

    fn delete_site(&self, id: SiteId) -> Result<()> {
        let conn = self.conn()?;

        let deleted = conn.execute("DELETE FROM sites WHERE id = ?1", params![id.0])?;
        if deleted == 0 {
            return Err(WatchError::SiteNotFound(id));
        }
        Ok(())
    }

    fn get_ordering(&self) -> Result<Vec<SiteId>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT site_id FROM site_order ORDER BY position")?;
        let ids = stmt
            .query_map([], |row| Ok(SiteId(row.get(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ids)
    }

    fn update_ordering(&self, ids: &[SiteId]) -> Result<()> {
        let mut conn = self.conn()?;

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM site_order", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO site_order (site_id, position)
                 SELECT id, ?2 FROM sites WHERE id = ?1",
            )?;
            for (position, id) in ids.iter().enumerate() {
                stmt.execute(params![id.0, position as i64])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn upsert_boards(&self, boards: &[Board]) -> Result<usize> {
        let mut conn = self.conn()?;

        let tx = conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO boards (site_id, code, name, work_safe, spoilers, archive, custom_spoilers, sort_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (site_id, code) DO UPDATE SET
                    name = excluded.name,
                    work_safe = excluded.work_safe,
                    spoilers = excluded.spoilers,
                    archive = excluded.archive,
                    custom_spoilers = excluded.custom_spoilers,
                    sort_order = excluded.sort_order",
            )?;

            for board in boards {
                count += stmt.execute(params![
                    board.site_id.0,
                    board.code,
                    board.name,
                    board.work_safe,
                    board.spoilers,
                    board.archive,
                    board.custom_spoilers,
                    board.order
                ])?;
            }
        }
        tx.commit()?;

        Ok(count)
    }

    fn get_boards(&self, site_id: SiteId) -> Result<Vec<Board>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM boards WHERE site_id = ?1 ORDER BY sort_order, code",
            BOARD_COLUMNS
        ))?;
        let boards = stmt
            .query_map(params![site_id.0], Self::board_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(boards)
    }

    fn get_board(&self, site_id: SiteId, code: &str) -> Result<Option<Board>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!(
                    "SELECT {} FROM boards WHERE site_id = ?1 AND code = ?2",
                    BOARD_COLUMNS
                ),
                params![site_id.0, code],
                Self::board_from_row,
            )
            .optional()?;

        Ok(result)
    }
}
