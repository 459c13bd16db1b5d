use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::domain::{Loadable, Post, ThreadSnapshot};
use crate::loader::LoaderError;
use crate::normalizer::CommentParser;
use crate::site::ParsedBatch;

/// Merge a freshly parsed batch into the previous snapshot.
///
/// Posts the adapter flagged as unchanged are taken over from `previous`
/// as-is; everything else is built from its builder. Thread snapshots never
/// lose a post once seen: posts missing from the batch are kept at the
/// position their number puts them in. `previous` is never modified.
pub fn reconcile(
    loadable: &Loadable,
    previous: Option<&ThreadSnapshot>,
    batch: ParsedBatch,
    parser: &CommentParser,
) -> Result<ThreadSnapshot, LoaderError> {
    if batch.is_empty() {
        return Err(LoaderError::EmptyResource);
    }

    let cached = previous.map(ThreadSnapshot::index).unwrap_or_default();
    let mut seen = HashSet::with_capacity(batch.len());
    let mut posts: Vec<Arc<Post>> = Vec::with_capacity(batch.len());

    for parsed in batch.posts {
        let no = parsed.builder.no;
        if !seen.insert(no) {
            continue;
        }

        let post = match cached.get(&no) {
            Some(post) if parsed.unchanged => Arc::clone(post),
            _ => Arc::new(parsed.builder.build(parser)),
        };
        posts.push(post);
    }

    if loadable.is_catalog() {
        return Ok(ThreadSnapshot {
            loadable: loadable.clone(),
            posts,
            op_index: None,
            closed: false,
            archived: false,
        });
    }

    if let Some(previous) = previous {
        for post in previous.posts.iter().filter(|p| !seen.contains(&p.no)) {
            let at = posts
                .iter()
                .position(|p| p.no > post.no)
                .unwrap_or(posts.len());
            posts.insert(at, Arc::clone(post));
        }
    }

    let op_index = posts.iter().position(|p| p.op);

    if let (Some(i), Some(update)) = (op_index, batch.op) {
        if posts[i].op_update() != update {
            posts[i] = Arc::new(posts[i].with_op_update(&update));
        }
    }

    let (closed, archived) = match op_index.map(|i| &posts[i]) {
        Some(op) => (op.closed, op.archived),
        None => {
            warn!("No first post in {}, keeping previous thread flags", loadable);
            previous.map_or((false, false), |p| (p.closed, p.archived))
        }
    };

    Ok(ThreadSnapshot {
        loadable: loadable.clone(),
        posts,
        op_index,
        closed,
        archived,
    })
}
