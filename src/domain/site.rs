use std::fmt;

use serde::{Deserialize, Serialize};

/// Positive integer that uniquely identifies a registered site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(pub i64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteFeature {
    /// The site accepts new posts and replies.
    Posting,
    /// Posts can be deleted with the password saved when posting.
    PostDelete,
    /// Posts can be reported through a site endpoint.
    PostReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardFeature {
    PostingImage,
    PostingSpoiler,
    /// The board keeps an archive of expired threads.
    Archive,
}

/// How the boards of a site can be enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardsType {
    /// Boards are fixed, there is no extra info for a board in the api.
    Static,
    /// A boards endpoint lists the available boards.
    Dynamic,
    /// Boards cannot be listed, existence must be checked per board.
    Infinite,
}

impl BoardsType {
    pub fn can_list(self) -> bool {
        !matches!(self, BoardsType::Infinite)
    }
}

/// Persisted adapter selection for a site record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub class_id: i64,
    #[serde(default)]
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: SiteId,
    pub config: SiteConfig,
    pub user_settings: serde_json::Value,
}

impl SiteRecord {
    pub fn new(class_id: i64) -> Self {
        Self {
            id: SiteId(0),
            config: SiteConfig {
                class_id,
                external: false,
            },
            user_settings: serde_json::Value::Object(Default::default()),
        }
    }

    /// Read a string user setting, if present.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.user_settings.get(key).and_then(|v| v.as_str())
    }
}
