use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::normalizer::CommentParser;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostImage {
    pub original_name: String,
    pub filename: String,
    pub extension: String,
    pub image_url: String,
    pub thumbnail_url: String,
    pub spoiler_thumbnail_url: Option<String>,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub spoiler: bool,
}

/// Moderation and aggregate fields of a thread's first post.
///
/// These are refreshed on every successful fetch and applied onto the
/// first post of the merged snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpUpdate {
    pub closed: bool,
    pub archived: bool,
    pub sticky: bool,
    pub replies: u32,
    pub images: u32,
    pub unique_ips: u32,
    pub last_modified: Option<i64>,
}

/// Raw post fields as read from a site payload.
#[derive(Debug, Clone, Default)]
pub struct PostBuilder {
    pub board_code: String,
    pub no: u64,
    pub op: bool,
    /// Number of the thread this post belongs to.
    pub op_id: u64,
    pub name: String,
    pub tripcode: Option<String>,
    pub subject: Option<String>,
    pub comment: String,
    pub unix_time: i64,
    pub files: Vec<PostImage>,
    pub sticky: bool,
    pub closed: bool,
    pub archived: bool,
    pub replies: u32,
    pub images: u32,
    pub unique_ips: u32,
    pub last_modified: Option<i64>,
}

impl PostBuilder {
    pub fn new(board_code: &str, no: u64) -> Self {
        Self {
            board_code: board_code.to_string(),
            no,
            ..Default::default()
        }
    }

    pub fn op_update(&self) -> OpUpdate {
        OpUpdate {
            closed: self.closed,
            archived: self.archived,
            sticky: self.sticky,
            replies: self.replies,
            images: self.images,
            unique_ips: self.unique_ips,
            last_modified: self.last_modified,
        }
    }

    /// Construct the post, computing the derived comment fields.
    pub fn build(&self, parser: &CommentParser) -> Post {
        let parsed = parser.parse(&self.comment);

        Post {
            board_code: self.board_code.clone(),
            no: self.no,
            op: self.op,
            op_id: if self.op { self.no } else { self.op_id },
            name: self.name.clone(),
            tripcode: self.tripcode.clone(),
            subject: self.subject.clone(),
            comment: self.comment.clone(),
            text: parsed.text,
            quotes: parsed.quotes,
            links: parsed.links,
            time: Utc
                .timestamp_opt(self.unix_time, 0)
                .single()
                .unwrap_or(DateTime::UNIX_EPOCH),
            files: self.files.clone(),
            sticky: self.sticky,
            closed: self.closed,
            archived: self.archived,
            replies: self.replies,
            images: self.images,
            unique_ips: self.unique_ips,
            last_modified: self.last_modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub board_code: String,
    pub no: u64,
    pub op: bool,
    pub op_id: u64,
    pub name: String,
    pub tripcode: Option<String>,
    pub subject: Option<String>,
    /// Comment as received from the site.
    pub comment: String,
    /// Plain text rendering of the comment.
    pub text: String,
    /// Post numbers referenced by this post.
    pub quotes: Vec<u64>,
    /// External links found in the comment.
    pub links: Vec<String>,
    pub time: DateTime<Utc>,
    pub files: Vec<PostImage>,
    pub sticky: bool,
    pub closed: bool,
    pub archived: bool,
    pub replies: u32,
    pub images: u32,
    pub unique_ips: u32,
    pub last_modified: Option<i64>,
}

impl Post {
    pub fn op_update(&self) -> OpUpdate {
        OpUpdate {
            closed: self.closed,
            archived: self.archived,
            sticky: self.sticky,
            replies: self.replies,
            images: self.images,
            unique_ips: self.unique_ips,
            last_modified: self.last_modified,
        }
    }

    /// A copy of this post with the first-post fields replaced.
    pub fn with_op_update(&self, update: &OpUpdate) -> Post {
        Post {
            closed: update.closed,
            archived: update.archived,
            sticky: update.sticky,
            replies: update.replies,
            images: update.images,
            unique_ips: update.unique_ips,
            last_modified: update.last_modified,
            ..self.clone()
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Anonymous"
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PostBuilder {
        let mut builder = PostBuilder::new("g", 101);
        builder.op_id = 100;
        builder.comment = "<a href=\"#p100\" class=\"quotelink\">&gt;&gt;100</a><br>agreed".into();
        builder.unix_time = 1_700_000_000;
        builder
    }

    #[test]
    fn test_build_computes_derived_fields() {
        let post = builder().build(&CommentParser::new());

        assert_eq!(post.no, 101);
        assert_eq!(post.op_id, 100);
        assert_eq!(post.text, ">>100\nagreed");
        assert_eq!(post.quotes, vec![100]);
        assert_eq!(post.time.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_op_id_of_first_post_is_its_own_number() {
        let mut builder = PostBuilder::new("g", 100);
        builder.op = true;
        let post = builder.build(&CommentParser::new());
        assert_eq!(post.op_id, 100);
    }

    #[test]
    fn test_with_op_update_only_touches_op_fields() {
        let post = builder().build(&CommentParser::new());
        let update = OpUpdate {
            closed: true,
            replies: 42,
            ..Default::default()
        };

        let updated = post.with_op_update(&update);
        assert!(updated.closed);
        assert_eq!(updated.replies, 42);
        assert_eq!(updated.text, post.text);
        assert_eq!(updated.op_update(), update);
    }

    #[test]
    fn test_display_name_defaults_to_anonymous() {
        let mut post = builder().build(&CommentParser::new());
        assert_eq!(post.display_name(), "Anonymous");
        post.name = "moot".into();
        assert_eq!(post.display_name(), "moot");
    }
}
