use super::{RecallContext, RecallStrategy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::db::{DocumentStore, PostFilter, PostQuery, PostSort};
use crate::models::{PostView, RecommendationType};
use crate::services::materializer::PostViewMaterializer;

/// Engagement weights. Comments outweigh likes so discussion surfaces first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotWeights {
    pub like: i64,
    pub comment: i64,
}

impl Default for HotWeights {
    fn default() -> Self {
        Self {
            like: 2,
            comment: 5,
        }
    }
}

impl HotWeights {
    pub fn score(&self, like_count: i64, comment_count: u64) -> i64 {
        self.like * like_count + self.comment * comment_count as i64
    }

    fn as_sort(&self) -> PostSort {
        PostSort::Engagement {
            like_weight: self.like,
            comment_weight: self.comment,
        }
    }
}

/// Hot Recall Strategy - 熱門召回
/// Original posts ranked by weighted engagement, ties newest first.
pub struct HotRecallStrategy {
    store: Arc<dyn DocumentStore>,
    materializer: Arc<PostViewMaterializer>,
    weights: HotWeights,
}

impl HotRecallStrategy {
    pub fn new(store: Arc<dyn DocumentStore>, materializer: Arc<PostViewMaterializer>) -> Self {
        Self::with_weights(store, materializer, HotWeights::default())
    }

    pub fn with_weights(
        store: Arc<dyn DocumentStore>,
        materializer: Arc<PostViewMaterializer>,
        weights: HotWeights,
    ) -> Self {
        Self {
            store,
            materializer,
            weights,
        }
    }
}

#[async_trait]
impl RecallStrategy for HotRecallStrategy {
    async fn recall(&self, ctx: &RecallContext<'_>, limit: usize) -> Result<Vec<PostView>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = PostQuery {
            filter: PostFilter {
                is_original: Some(true),
                exclude_ids: ctx.excluded_ids(),
                ..Default::default()
            },
            sort: self.weights.as_sort(),
            skip: 0,
            limit,
        };

        let posts = self
            .store
            .find_posts(&query)
            .await
            .context("Failed to query hot candidates")?;

        let mut media = ctx.media.lock().await;
        Ok(self
            .materializer
            .materialize_with_media(Some(ctx.viewer_id), posts, &mut media)
            .await
            .into_iter()
            .map(|v| v.with_provenance(RecommendationType::Hot))
            .collect())
    }

    fn source(&self) -> RecommendationType {
        RecommendationType::Hot
    }
}
