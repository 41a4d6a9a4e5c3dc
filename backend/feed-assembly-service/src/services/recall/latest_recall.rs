use super::{RecallContext, RecallStrategy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::db::{DocumentStore, PostFilter, PostQuery};
use crate::models::{PostView, RecommendationType};
use crate::services::materializer::PostViewMaterializer;

/// Latest Recall Strategy - 最新召回
/// Last-resort backfill: original posts, newest first.
pub struct LatestRecallStrategy {
    store: Arc<dyn DocumentStore>,
    materializer: Arc<PostViewMaterializer>,
}

impl LatestRecallStrategy {
    pub fn new(store: Arc<dyn DocumentStore>, materializer: Arc<PostViewMaterializer>) -> Self {
        Self {
            store,
            materializer,
        }
    }
}

#[async_trait]
impl RecallStrategy for LatestRecallStrategy {
    async fn recall(&self, ctx: &RecallContext<'_>, limit: usize) -> Result<Vec<PostView>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let filter = PostFilter {
            is_original: Some(true),
            exclude_ids: ctx.excluded_ids(),
            ..Default::default()
        };
        let posts = self
            .store
            .find_posts(&PostQuery::newest(filter, limit))
            .await
            .context("Failed to query latest posts")?;

        let mut media = ctx.media.lock().await;
        Ok(self
            .materializer
            .materialize_with_media(Some(ctx.viewer_id), posts, &mut media)
            .await
            .into_iter()
            .map(|v| v.with_provenance(RecommendationType::Latest))
            .collect())
    }

    fn source(&self) -> RecommendationType {
        RecommendationType::Latest
    }
}
