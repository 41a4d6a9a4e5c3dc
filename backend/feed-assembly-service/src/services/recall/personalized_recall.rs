use super::{RecallContext, RecallStrategy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::db::{Affinity, DocumentStore, PostFilter, PostQuery};
use crate::models::{PostView, RecommendationType};
use crate::services::materializer::PostViewMaterializer;

/// Personalized Recall Strategy - 個性化召回
/// Original posts by favored authors OR carrying a favored tag, newest first.
/// Posts the viewer already interacted with are skipped.
pub struct PersonalizedRecallStrategy {
    store: Arc<dyn DocumentStore>,
    materializer: Arc<PostViewMaterializer>,
}

impl PersonalizedRecallStrategy {
    pub fn new(store: Arc<dyn DocumentStore>, materializer: Arc<PostViewMaterializer>) -> Self {
        Self {
            store,
            materializer,
        }
    }
}

#[async_trait]
impl RecallStrategy for PersonalizedRecallStrategy {
    async fn recall(&self, ctx: &RecallContext<'_>, limit: usize) -> Result<Vec<PostView>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        if ctx.profile.is_empty() {
            debug!(
                viewer_id = ctx.viewer_id,
                "Empty interest profile, personalized recall returns empty"
            );
            return Ok(Vec::new());
        }

        let mut exclude_ids = ctx.excluded_ids();
        exclude_ids.extend(
            ctx.profile
                .interacted_post_ids
                .iter()
                .filter(|id| !ctx.excluded.contains(*id))
                .cloned(),
        );

        let filter = PostFilter {
            is_original: Some(true),
            exclude_ids,
            affinity: Some(Affinity {
                authors: ctx.profile.favored_authors.iter().cloned().collect(),
                tags: ctx.profile.favored_tags.iter().cloned().collect(),
            }),
            ..Default::default()
        };

        let posts = self
            .store
            .find_posts(&PostQuery::newest(filter, limit))
            .await
            .context("Failed to query personalized candidates")?;

        let mut media = ctx.media.lock().await;
        let views = self
            .materializer
            .materialize_with_media(Some(ctx.viewer_id), posts, &mut media)
            .await
            .into_iter()
            .map(|v| v.with_provenance(RecommendationType::Personalized))
            .collect();

        Ok(views)
    }

    fn source(&self) -> RecommendationType {
        RecommendationType::Personalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDocumentStore;
    use crate::services::profile_builder::InterestProfile;
    use crate::services::recall::test_support::{materializer, original_post};
    use std::collections::HashSet;

    fn seeded_store() -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.insert_post(original_post("by_fav_author", "alice", 1));
        let mut tagged = original_post("by_fav_tag", "bob", 2);
        tagged.tags = vec!["haiku".to_string()];
        store.insert_post(tagged);
        store.insert_post(original_post("unrelated", "carol", 3));
        let mut repost = original_post("not_original", "alice", 4);
        repost.is_original = false;
        store.insert_post(repost);
        store.insert_post(original_post("already_seen", "alice", 5));
        store
    }

    fn profile() -> InterestProfile {
        InterestProfile {
            favored_authors: HashSet::from(["alice".to_string()]),
            favored_tags: HashSet::from(["haiku".to_string()]),
            interacted_post_ids: HashSet::from(["already_seen".to_string()]),
        }
    }

    #[tokio::test]
    async fn test_author_or_tag_match() {
        let store = seeded_store();
        let strategy = PersonalizedRecallStrategy::new(store.clone(), materializer(store));
        let profile = profile();
        let excluded = HashSet::new();
        let ctx = RecallContext {
            viewer_id: "viewer",
            profile: &profile,
            excluded: &excluded,
            media: &Default::default(),
        };

        let views = strategy.recall(&ctx, 10).await.unwrap();
        let ids: HashSet<&str> = views.iter().map(|v| v.id.as_str()).collect();

        assert_eq!(ids, HashSet::from(["by_fav_author", "by_fav_tag"]));
        // Newest first
        assert_eq!(views[0].id, "by_fav_tag");
        assert!(views
            .iter()
            .all(|v| v.recommendation_type == Some(RecommendationType::Personalized)));
        assert_eq!(
            views[0].recommendation_reason.as_deref(),
            Some("based on your interests")
        );
    }

    #[tokio::test]
    async fn test_respects_exclusion_set() {
        let store = seeded_store();
        let strategy = PersonalizedRecallStrategy::new(store.clone(), materializer(store));
        let profile = profile();
        let excluded = HashSet::from(["by_fav_tag".to_string()]);
        let ctx = RecallContext {
            viewer_id: "viewer",
            profile: &profile,
            excluded: &excluded,
            media: &Default::default(),
        };

        let views = strategy.recall(&ctx, 10).await.unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].id, "by_fav_author");
    }

    #[tokio::test]
    async fn test_empty_profile_returns_nothing() {
        let store = seeded_store();
        let strategy = PersonalizedRecallStrategy::new(store.clone(), materializer(store.clone()));
        let profile = InterestProfile::default();
        let excluded = HashSet::new();
        let ctx = RecallContext {
            viewer_id: "viewer",
            profile: &profile,
            excluded: &excluded,
            media: &Default::default(),
        };

        let views = strategy.recall(&ctx, 10).await.unwrap();

        assert!(views.is_empty());
        assert_eq!(
            store
                .calls()
                .find_posts
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
    }
}
