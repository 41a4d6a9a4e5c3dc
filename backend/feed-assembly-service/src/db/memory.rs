//! In-memory document store for local runs and tests.
//!
//! Follows the same query semantics as the PostgreSQL gateway and counts the
//! calls made against it so batching behaviour can be asserted.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::{DocumentStore, PostQuery, PostSort};
use crate::error::StoreError;
use crate::models::{
    CommentDocument, InteractionEvent, InteractionKind, PostDocument, UserDocument,
};

#[derive(Debug, Default)]
struct Collections {
    posts: Vec<PostDocument>,
    users: Vec<UserDocument>,
    comments: Vec<CommentDocument>,
    interactions: Vec<InteractionEvent>,
}

#[derive(Debug, Default)]
pub struct StoreCallCounts {
    pub find_posts: AtomicUsize,
    pub find_posts_by_ids: AtomicUsize,
    pub find_users: AtomicUsize,
    pub count_comments: AtomicUsize,
    pub find_voted_posts: AtomicUsize,
    pub recent_interactions: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    data: RwLock<Collections>,
    calls: StoreCallCounts,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_post(&self, post: PostDocument) {
        self.write().posts.push(post);
    }

    pub fn insert_user(&self, user: UserDocument) {
        self.write().users.push(user);
    }

    pub fn insert_comment(&self, comment: CommentDocument) {
        self.write().comments.push(comment);
    }

    pub fn insert_interaction(&self, event: InteractionEvent) {
        self.write().interactions.push(event);
    }

    pub fn calls(&self) -> &StoreCallCounts {
        &self.calls
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Collections> {
        // A poisoned lock only means a writer panicked mid-insert in a test
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Collections> {
        self.data.write().unwrap_or_else(|e| e.into_inner())
    }

    fn comment_count(data: &Collections, post_id: &str) -> u64 {
        data.comments.iter().filter(|c| c.post_id == post_id).count() as u64
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_posts(&self, query: &PostQuery) -> Result<Vec<PostDocument>, StoreError> {
        self.calls.find_posts.fetch_add(1, Ordering::Relaxed);
        let data = self.read();

        let mut matched: Vec<(i64, &PostDocument)> = data
            .posts
            .iter()
            .filter(|p| query.filter.matches(p))
            .map(|p| {
                let score = match query.sort {
                    PostSort::Newest => 0,
                    PostSort::Engagement {
                        like_weight,
                        comment_weight,
                    } => {
                        like_weight * p.votes
                            + comment_weight * Self::comment_count(&data, &p.id) as i64
                    }
                };
                (score, p)
            })
            .collect();

        matched.sort_by(|(sa, a), (sb, b)| {
            sb.cmp(sa).then_with(|| b.create_time.cmp(&a.create_time))
        });

        Ok(matched
            .into_iter()
            .skip(query.skip)
            .take(query.limit)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn find_posts_by_ids(
        &self,
        ids: &[String],
        limit: usize,
    ) -> Result<Vec<PostDocument>, StoreError> {
        self.calls.find_posts_by_ids.fetch_add(1, Ordering::Relaxed);
        let data = self.read();

        Ok(data
            .posts
            .iter()
            .filter(|p| ids.contains(&p.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_users(&self, openids: &[String]) -> Result<Vec<UserDocument>, StoreError> {
        self.calls.find_users.fetch_add(1, Ordering::Relaxed);
        let data = self.read();

        Ok(data
            .users
            .iter()
            .filter(|u| openids.contains(&u.openid))
            .cloned()
            .collect())
    }

    async fn count_comments(
        &self,
        post_ids: &[String],
    ) -> Result<HashMap<String, u64>, StoreError> {
        self.calls.count_comments.fetch_add(1, Ordering::Relaxed);
        let data = self.read();

        let mut counts = HashMap::new();
        for comment in data.comments.iter().filter(|c| post_ids.contains(&c.post_id)) {
            *counts.entry(comment.post_id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn find_voted_posts(
        &self,
        viewer_id: &str,
        post_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        self.calls.find_voted_posts.fetch_add(1, Ordering::Relaxed);
        let data = self.read();

        Ok(data
            .interactions
            .iter()
            .filter(|e| {
                e.kind == InteractionKind::Vote
                    && e.openid == viewer_id
                    && post_ids.contains(&e.post_id)
            })
            .map(|e| e.post_id.clone())
            .collect())
    }

    async fn recent_interactions(
        &self,
        viewer_id: &str,
        kind: InteractionKind,
        limit: usize,
    ) -> Result<Vec<InteractionEvent>, StoreError> {
        self.calls.recent_interactions.fetch_add(1, Ordering::Relaxed);
        let data = self.read();

        let mut events: Vec<InteractionEvent> = data
            .interactions
            .iter()
            .filter(|e| e.kind == kind && e.openid == viewer_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.create_time.cmp(&a.create_time));
        events.truncate(limit);
        Ok(events)
    }
}
