//! Document Store Gateway
//!
//! The feed engine only reads from the store. Every component receives an
//! `Arc<dyn DocumentStore>` at construction time; there is no shared global handle.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::error::StoreError;
use crate::models::{InteractionEvent, InteractionKind, PostDocument, UserDocument};

pub use memory::InMemoryDocumentStore;
pub use postgres::PgDocumentStore;

/// Author/tag affinity: a post matches when its owner is a favored author
/// OR any of its tags is a favored tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Affinity {
    pub authors: Vec<String>,
    pub tags: Vec<String>,
}

impl Affinity {
    pub fn matches(&self, post: &PostDocument) -> bool {
        self.authors.iter().any(|a| a == &post.openid)
            || post.tags.iter().any(|t| self.tags.contains(t))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    pub is_original: Option<bool>,
    pub is_poem: Option<bool>,
    pub exclude_ids: Vec<String>,
    pub affinity: Option<Affinity>,
    /// Case-insensitive substring over title, content and tags
    pub keyword: Option<String>,
}

impl PostFilter {
    pub fn matches(&self, post: &PostDocument) -> bool {
        if self.is_original.is_some_and(|v| v != post.is_original) {
            return false;
        }
        if self.is_poem.is_some_and(|v| v != post.is_poem) {
            return false;
        }
        if self.exclude_ids.iter().any(|id| id == &post.id) {
            return false;
        }
        if let Some(affinity) = &self.affinity {
            if !affinity.matches(post) {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword {
            let needle = keyword.to_lowercase();
            let hit = |s: &str| s.to_lowercase().contains(&needle);
            let found = post.title.as_deref().is_some_and(hit)
                || post.content.as_deref().is_some_and(hit)
                || post.tags.iter().any(|t| hit(t.as_str()));
            if !found {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSort {
    /// Creation time descending
    Newest,
    /// `like_weight × votes + comment_weight × comment count` descending,
    /// ties by creation time descending
    Engagement { like_weight: i64, comment_weight: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostQuery {
    pub filter: PostFilter,
    pub sort: PostSort,
    pub skip: usize,
    pub limit: usize,
}

impl PostQuery {
    pub fn newest(filter: PostFilter, limit: usize) -> Self {
        Self {
            filter,
            sort: PostSort::Newest,
            skip: 0,
            limit,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Filter / sort / skip / limit over `posts`
    async fn find_posts(&self, query: &PostQuery) -> Result<Vec<PostDocument>, StoreError>;

    /// Fetch posts by id, at most `limit` of them, in no particular order
    async fn find_posts_by_ids(
        &self,
        ids: &[String],
        limit: usize,
    ) -> Result<Vec<PostDocument>, StoreError>;

    /// Batched author join keyed by `openid`
    async fn find_users(&self, openids: &[String]) -> Result<Vec<UserDocument>, StoreError>;

    /// Comment counts (top-level and replies) per post id. Posts without
    /// comments may be absent from the map.
    async fn count_comments(&self, post_ids: &[String])
        -> Result<HashMap<String, u64>, StoreError>;

    /// Subset of `post_ids` the viewer has a vote event for
    async fn find_voted_posts(
        &self,
        viewer_id: &str,
        post_ids: &[String],
    ) -> Result<HashSet<String>, StoreError>;

    /// Most recent events of one kind, newest first
    async fn recent_interactions(
        &self,
        viewer_id: &str,
        kind: InteractionKind,
        limit: usize,
    ) -> Result<Vec<InteractionEvent>, StoreError>;
}
