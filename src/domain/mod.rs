pub mod board;
pub mod loadable;
pub mod post;
pub mod reply;
pub mod site;
pub mod thread;

pub use board::Board;
pub use loadable::{Loadable, ViewCursor};
pub use post::{OpUpdate, Post, PostBuilder, PostImage};
pub use reply::{DeleteRequest, DeleteResponse, Reply, ReplyFile, ReplyResponse, SiteAuthentication};
pub use site::{BoardFeature, BoardsType, SiteConfig, SiteFeature, SiteId, SiteRecord};
pub use thread::{PostIndex, ThreadSnapshot};
