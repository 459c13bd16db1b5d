use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::domain::SiteId;

/// Scroll position of a view showing a loadable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCursor {
    pub index: usize,
    pub top: i32,
}

/// A trackable remote resource: the catalog of a board or a single thread.
///
/// Identity is `(site_id, board_code, no)`, where `no == 0` means catalog.
/// The other fields are mutable state carried along with the identity and
/// are ignored by `PartialEq` and `Hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loadable {
    pub site_id: SiteId,
    pub board_code: String,
    pub no: u64,
    /// Post targeted by a deep link, e.g. the `#p123` fragment.
    pub marked_no: Option<u64>,
    pub title: Option<String>,
    pub cursor: ViewCursor,
}

impl Loadable {
    pub fn for_catalog(site_id: SiteId, board_code: &str) -> Self {
        Self::new(site_id, board_code, 0)
    }

    pub fn for_thread(site_id: SiteId, board_code: &str, no: u64) -> Self {
        Self::new(site_id, board_code, no)
    }

    fn new(site_id: SiteId, board_code: &str, no: u64) -> Self {
        Self {
            site_id,
            board_code: board_code.to_string(),
            no,
            marked_no: None,
            title: None,
            cursor: ViewCursor::default(),
        }
    }

    pub fn is_catalog(&self) -> bool {
        self.no == 0
    }

    pub fn is_thread(&self) -> bool {
        self.no != 0
    }
}

impl PartialEq for Loadable {
    fn eq(&self, other: &Self) -> bool {
        self.site_id == other.site_id && self.board_code == other.board_code && self.no == other.no
    }
}

impl Eq for Loadable {}

impl Hash for Loadable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.site_id.hash(state);
        self.board_code.hash(state);
        self.no.hash(state);
    }
}

impl fmt::Display for Loadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_catalog() {
            write!(f, "site {} /{}/ catalog", self.site_id, self.board_code)
        } else {
            write!(f, "site {} /{}/{}", self.site_id, self.board_code, self.no)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_catalog_and_thread_modes() {
        let catalog = Loadable::for_catalog(SiteId(1), "g");
        let thread = Loadable::for_thread(SiteId(1), "g", 123);

        assert!(catalog.is_catalog());
        assert!(!catalog.is_thread());
        assert!(thread.is_thread());
        assert_ne!(catalog, thread);
    }

    #[test]
    fn test_identity_ignores_cursor_and_marked_post() {
        let a = Loadable::for_thread(SiteId(1), "g", 123);
        let mut b = a.clone();
        b.cursor = ViewCursor { index: 40, top: -12 };
        b.marked_no = Some(130);
        b.title = Some("title".into());

        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Loadable::for_thread(SiteId(2), "b", 5).to_string(),
            "site 2 /b/5"
        );
        assert_eq!(
            Loadable::for_catalog(SiteId(2), "b").to_string(),
            "site 2 /b/ catalog"
        );
    }
}
