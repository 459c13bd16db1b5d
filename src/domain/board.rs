use serde::{Deserialize, Serialize};

use crate::domain::SiteId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub site_id: SiteId,
    pub code: String,
    pub name: String,
    pub work_safe: bool,
    pub spoilers: bool,
    pub archive: bool,
    /// Number of custom spoiler images, when the board has them.
    pub custom_spoilers: Option<u32>,
    pub order: i64,
}

impl Board {
    pub fn new(site_id: SiteId, name: &str, code: &str) -> Self {
        Self {
            site_id,
            code: code.to_string(),
            name: name.to_string(),
            work_safe: false,
            spoilers: false,
            archive: false,
            custom_spoilers: None,
            order: 0,
        }
    }

    /// Board code wrapped in slashes, e.g. `/g/`.
    pub fn display_code(&self) -> String {
        format!("/{}/", self.code)
    }
}
