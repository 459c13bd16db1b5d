//! Site adapters.
//!
//! A [`SiteAdapter`] encapsulates one remote source: its identity, URL
//! handling, endpoint construction, wire-format parsing and the requests
//! for posting and deleting. The loader and registry only ever talk to the
//! trait, so adding a source means adding an implementation and a
//! [`SiteKind`] variant.
//!
//! Adapters build [`RequestSpec`]s and parse bytes; they never perform I/O.
//! Network calls for board enumeration, posting and deletion go through
//! [`SiteActions`].

pub mod actions;
pub mod chan4;
pub mod common;
pub mod dvach;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::domain::{
    Board, BoardFeature, BoardsType, DeleteRequest, DeleteResponse, Loadable, OpUpdate, PostBuilder,
    PostIndex, Reply, ReplyResponse, SiteAuthentication, SiteFeature, SiteId, SiteRecord,
};
use crate::fetcher::RequestSpec;
use crate::normalizer::CommentParser;

pub use actions::{PostedReply, SiteActions};
pub use chan4::Chan4;
pub use dvach::Dvach;

/// A payload that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ParseError {
    pub reason: String,
}

impl ParseError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("Malformed JSON: {}", e))
    }
}

#[derive(Debug, Clone)]
pub struct ParsedPost {
    pub builder: PostBuilder,
    /// The post was already present in the previous snapshot.
    pub unchanged: bool,
}

/// Posts read from one response, in the order the site listed them.
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    pub posts: Vec<ParsedPost>,
    /// Fresh moderation and aggregate fields of the thread's first post.
    pub op: Option<OpUpdate>,
}

impl ParsedBatch {
    /// Queue a builder, marking it unchanged when `previous` already has its id.
    pub fn push(&mut self, builder: PostBuilder, previous: &PostIndex) {
        let unchanged = previous.contains_key(&builder.no);
        self.posts.push(ParsedPost { builder, unchanged });
    }

    /// Queue a builder that must always be rebuilt.
    pub fn push_fresh(&mut self, builder: PostBuilder) {
        self.posts.push(ParsedPost {
            builder,
            unchanged: false,
        });
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

pub trait SiteAdapter: Send + Sync {
    fn id(&self) -> SiteId;

    fn kind(&self) -> SiteKind;

    fn name(&self) -> &str;

    fn boards_type(&self) -> BoardsType;

    fn feature(&self, feature: SiteFeature) -> bool;

    fn board_feature(&self, feature: BoardFeature, board: &Board) -> bool;

    /// Comment parser configured with this site's internal domains.
    fn comment_parser(&self) -> &CommentParser;

    /// Request for a catalog or thread. Pure in `(site, loadable)`.
    fn build_fetch_request(&self, loadable: &Loadable) -> Result<RequestSpec, url::ParseError>;

    fn parse_response(
        &self,
        loadable: &Loadable,
        body: &[u8],
        previous: &PostIndex,
    ) -> Result<ParsedBatch, ParseError>;

    /// `None` for sites whose boards cannot be listed.
    fn build_boards_request(&self) -> Result<Option<RequestSpec>, url::ParseError>;

    fn parse_boards(&self, body: &[u8]) -> Result<Vec<Board>, ParseError>;

    /// Boards to fall back on when enumeration fails.
    fn default_boards(&self) -> Vec<Board> {
        Vec::new()
    }

    fn build_post_request(&self, reply: &Reply) -> Result<RequestSpec, url::ParseError>;

    fn parse_post_response(&self, body: &[u8]) -> ReplyResponse;

    /// Whether posting needs authentication even before the site asks for it.
    fn post_requires_authentication(&self) -> bool;

    fn post_authenticate(&self) -> SiteAuthentication;

    /// `None` when the site does not support deleting posts.
    fn build_delete_request(
        &self,
        request: &DeleteRequest,
    ) -> Result<Option<RequestSpec>, url::ParseError>;

    fn parse_delete_response(&self, body: &[u8]) -> DeleteResponse;

    fn matches(&self, url: &Url) -> bool;

    /// Loadable a browser URL points at. Never fails, returns `None` instead.
    fn resolve(&self, url: &Url) -> Option<Loadable>;

    fn desktop_url(&self, loadable: &Loadable, post_no: Option<u64>) -> String;

    /// Applied to every request for this site before it is executed.
    fn modify_request(&self, _request: &mut RequestSpec) {}
}

/// Adapter implementations, keyed by the class id persisted with a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    Chan4,
    Dvach,
}

impl SiteKind {
    pub const ALL: [SiteKind; 2] = [SiteKind::Chan4, SiteKind::Dvach];

    pub fn class_id(self) -> i64 {
        match self {
            SiteKind::Chan4 => 0,
            SiteKind::Dvach => 1,
        }
    }

    pub fn from_class_id(class_id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.class_id() == class_id)
    }

    pub fn name(self) -> &'static str {
        match self {
            SiteKind::Chan4 => chan4::NAME,
            SiteKind::Dvach => dvach::NAME,
        }
    }

    /// Create the adapter for a persisted site record.
    pub fn instantiate(self, record: &SiteRecord) -> Arc<dyn SiteAdapter> {
        match self {
            SiteKind::Chan4 => Arc::new(Chan4::new(record)),
            SiteKind::Dvach => Arc::new(Dvach::new(record)),
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SiteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "4chan" | "chan4" => Ok(SiteKind::Chan4),
            "2ch" | "2ch.hk" | "dvach" => Ok(SiteKind::Dvach),
            other => Err(format!("Unknown site kind: {}. Use '4chan' or '2ch'", other)),
        }
    }
}

/// Instantiate the adapter for a record, `None` when its class id is unknown.
pub fn instantiate(record: &SiteRecord) -> Option<Arc<dyn SiteAdapter>> {
    SiteKind::from_class_id(record.config.class_id).map(|kind| kind.instantiate(record))
}
