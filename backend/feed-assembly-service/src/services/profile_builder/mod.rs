// ============================================
// Interaction Profile Builder (互動畫像構建器)
// ============================================
//
// Derives a short-term interest signal from the viewer's recent history:
// 1. Most recent vote events and most recent view events (bounded per kind)
// 2. Merged and ordered newest first
// 3. The posts behind the most recent distinct ids (bounded)
//
// Outputs:
// - Favored authors (owners of those posts)
// - Favored tags (union of their tags)
// - Every interacted post id, so personalized recall can skip seen posts

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::db::DocumentStore;
use crate::error::StoreError;
use crate::models::{InteractionEvent, InteractionKind};

#[derive(Debug, Clone)]
pub struct ProfileBuilderConfig {
    /// Events fetched per kind
    pub events_per_kind: usize,
    /// Posts inspected for authors/tags
    pub max_profile_posts: usize,
}

impl Default for ProfileBuilderConfig {
    fn default() -> Self {
        Self {
            events_per_kind: 30,
            max_profile_posts: 20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterestProfile {
    pub favored_authors: HashSet<String>,
    pub favored_tags: HashSet<String>,
    pub interacted_post_ids: HashSet<String>,
}

impl InterestProfile {
    /// No personalization signal
    pub fn is_empty(&self) -> bool {
        self.favored_authors.is_empty() && self.favored_tags.is_empty()
    }
}

pub struct InteractionProfileBuilder {
    store: Arc<dyn DocumentStore>,
    config: ProfileBuilderConfig,
}

impl InteractionProfileBuilder {
    pub fn new(store: Arc<dyn DocumentStore>, config: ProfileBuilderConfig) -> Self {
        Self { store, config }
    }

    pub async fn build(&self, viewer_id: &str) -> Result<InterestProfile, StoreError> {
        let limit = self.config.events_per_kind;
        let (votes, views) = tokio::try_join!(
            self.store
                .recent_interactions(viewer_id, InteractionKind::Vote, limit),
            self.store
                .recent_interactions(viewer_id, InteractionKind::View, limit),
        )?;

        let mut events: Vec<InteractionEvent> = votes.into_iter().chain(views).collect();
        if events.is_empty() {
            debug!(viewer_id, "No interaction history, empty profile");
            return Ok(InterestProfile::default());
        }
        events.sort_by(|a, b| b.create_time.cmp(&a.create_time));

        // Distinct ids, most recent first
        let mut interacted_post_ids = HashSet::new();
        let mut recent_ids = Vec::new();
        for event in &events {
            if interacted_post_ids.insert(event.post_id.clone()) {
                recent_ids.push(event.post_id.clone());
            }
        }
        recent_ids.truncate(self.config.max_profile_posts);

        let posts = self
            .store
            .find_posts_by_ids(&recent_ids, self.config.max_profile_posts)
            .await?;

        let mut profile = InterestProfile {
            interacted_post_ids,
            ..Default::default()
        };
        for post in posts {
            profile.favored_authors.insert(post.openid);
            profile.favored_tags.extend(post.tags);
        }

        debug!(
            viewer_id,
            events = events.len(),
            authors = profile.favored_authors.len(),
            tags = profile.favored_tags.len(),
            "Built interest profile"
        );

        Ok(profile)
    }
}
