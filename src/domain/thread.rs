use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Loadable, Post};

/// Previously constructed posts of a snapshot, keyed by post number.
pub type PostIndex = HashMap<u64, Arc<Post>>;

/// Merged view of a thread (or catalog) at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadSnapshot {
    pub loadable: Loadable,
    pub posts: Vec<Arc<Post>>,
    /// Position of the first post in `posts`, if one was found.
    pub op_index: Option<usize>,
    pub closed: bool,
    pub archived: bool,
}

impl ThreadSnapshot {
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn op(&self) -> Option<&Arc<Post>> {
        self.op_index.and_then(|i| self.posts.get(i))
    }

    pub fn post(&self, no: u64) -> Option<&Arc<Post>> {
        self.posts.iter().find(|p| p.no == no)
    }

    pub fn index(&self) -> PostIndex {
        self.posts.iter().map(|p| (p.no, p.clone())).collect()
    }

    /// Title for display: the first post's subject, else the start of its text.
    pub fn title(&self) -> Option<String> {
        let op = self.op()?;
        if let Some(subject) = op.subject.as_deref().filter(|s| !s.is_empty()) {
            return Some(subject.to_string());
        }
        let text: String = op.text.chars().take(50).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}
