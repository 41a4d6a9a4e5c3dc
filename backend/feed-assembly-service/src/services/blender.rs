//! Feed Blender
//!
//! Runs Personalized → Hot → Latest in sequence against a growing exclusion
//! set, shuffles the accumulated page and reports per-source counts.
//!
//! Stages are sequential because each one must see the picks of the stages
//! before it. A failing stage contributes zero posts; only a broken assembly
//! (e.g. a duplicate surviving to the final page) is reported as an error.

use rand::seq::SliceRandom;
use rand::Rng;
use resilience::RequestBudget;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::db::DocumentStore;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{PostView, RecommendationType};
use crate::services::materializer::PostViewMaterializer;
use crate::services::media::ResolvedMedia;
use crate::services::profile_builder::{
    InteractionProfileBuilder, InterestProfile, ProfileBuilderConfig,
};
use crate::services::recall::{
    HotRecallStrategy, LatestRecallStrategy, PersonalizedRecallStrategy, RecallContext,
    RecallStrategy,
};

#[derive(Debug, Clone)]
pub struct BlenderConfig {
    /// Wall-clock budget for one assembly
    pub request_budget: Duration,
    /// Cap on personalized + hot
    pub max_feed_size: usize,
}

impl Default for BlenderConfig {
    fn default() -> Self {
        Self {
            request_budget: resilience::feed_request_config().duration,
            max_feed_size: 50,
        }
    }
}

/// One feed request after validation
#[derive(Debug, Clone, Default)]
pub struct FeedPlan {
    pub personalized_target: usize,
    pub hot_target: usize,
    /// Post ids already shown on earlier pages
    pub excluded: HashSet<String>,
}

impl FeedPlan {
    pub fn total(&self) -> usize {
        self.personalized_target + self.hot_target
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlendedFeed {
    pub posts: Vec<PostView>,
    pub personalized_count: usize,
    pub hot_count: usize,
    pub latest_count: usize,
    /// Budget ran out before every stage finished
    pub degraded: bool,
}

pub struct FeedBlender {
    profile_builder: Arc<InteractionProfileBuilder>,
    personalized: Arc<dyn RecallStrategy>,
    hot: Arc<dyn RecallStrategy>,
    latest: Arc<dyn RecallStrategy>,
    config: BlenderConfig,
}

impl FeedBlender {
    pub fn new(
        profile_builder: Arc<InteractionProfileBuilder>,
        personalized: Arc<dyn RecallStrategy>,
        hot: Arc<dyn RecallStrategy>,
        latest: Arc<dyn RecallStrategy>,
        config: BlenderConfig,
    ) -> Self {
        Self {
            profile_builder,
            personalized,
            hot,
            latest,
            config,
        }
    }

    /// Standard wiring: the three store-backed strategies sharing one materializer
    pub fn from_store(
        store: Arc<dyn DocumentStore>,
        materializer: Arc<PostViewMaterializer>,
        config: BlenderConfig,
    ) -> Self {
        Self::new(
            Arc::new(InteractionProfileBuilder::new(
                store.clone(),
                ProfileBuilderConfig::default(),
            )),
            Arc::new(PersonalizedRecallStrategy::new(
                store.clone(),
                materializer.clone(),
            )),
            Arc::new(HotRecallStrategy::new(store.clone(), materializer.clone())),
            Arc::new(LatestRecallStrategy::new(store, materializer)),
            config,
        )
    }

    pub async fn assemble(&self, viewer_id: &str, plan: FeedPlan) -> Result<BlendedFeed> {
        let budget = RequestBudget::start(self.config.request_budget);
        let plan = self.clamp(plan);
        let total = plan.total();
        let mut excluded = plan.excluded;
        let mut output: Vec<PostView> = Vec::with_capacity(total);
        let mut degraded = false;
        // One media map across all stages
        let media = Mutex::new(ResolvedMedia::default());

        if total == 0 {
            return Ok(BlendedFeed::default());
        }

        let profile = if plan.personalized_target == 0 {
            InterestProfile::default()
        } else {
            match budget.run(self.profile_builder.build(viewer_id)).await {
                Ok(Ok(profile)) => profile,
                Ok(Err(e)) => {
                    metrics::record_recall_failure("profile");
                    warn!(
                        viewer_id,
                        error = %e,
                        "Profile build failed, continuing without personalization"
                    );
                    InterestProfile::default()
                }
                Err(e) => {
                    degraded = true;
                    warn!(viewer_id, error = %e, "Profile build exceeded request budget");
                    InterestProfile::default()
                }
            }
        };

        let stages: [(&Arc<dyn RecallStrategy>, usize); 2] = [
            (&self.personalized, plan.personalized_target),
            (&self.hot, plan.hot_target),
        ];
        for (strategy, target) in stages {
            degraded |= self
                .run_stage(
                    &**strategy,
                    viewer_id,
                    &profile,
                    target,
                    &budget,
                    &media,
                    &mut excluded,
                    &mut output,
                )
                .await;
        }

        let shortfall = total.saturating_sub(output.len());
        if shortfall > 0 {
            degraded |= self
                .run_stage(
                    self.latest.as_ref(),
                    viewer_id,
                    &profile,
                    shortfall,
                    &budget,
                    &media,
                    &mut excluded,
                    &mut output,
                )
                .await;
        }

        let feed = finalize(output, total, degraded, &mut rand::thread_rng())?;

        metrics::record_assembly_duration(budget.elapsed());
        for (source, count) in [
            (RecommendationType::Personalized, feed.personalized_count),
            (RecommendationType::Hot, feed.hot_count),
            (RecommendationType::Latest, feed.latest_count),
        ] {
            metrics::record_posts_served(source.as_str(), count);
        }

        info!(
            viewer_id,
            total = feed.posts.len(),
            personalized = feed.personalized_count,
            hot = feed.hot_count,
            latest = feed.latest_count,
            degraded = feed.degraded,
            elapsed_ms = budget.elapsed().as_millis() as u64,
            "Feed assembled"
        );

        Ok(feed)
    }

    fn clamp(&self, mut plan: FeedPlan) -> FeedPlan {
        let max = self.config.max_feed_size;
        if plan.total() > max {
            warn!(
                requested = plan.total(),
                max, "Feed size above limit, clamping"
            );
            plan.personalized_target = plan.personalized_target.min(max);
            plan.hot_target = plan.hot_target.min(max - plan.personalized_target);
        }
        plan
    }

    /// Run one strategy and accept its non-excluded posts up to `target`.
    /// Returns true when the stage was cut short by the request budget.
    #[allow(clippy::too_many_arguments)]
    async fn run_stage(
        &self,
        strategy: &dyn RecallStrategy,
        viewer_id: &str,
        profile: &InterestProfile,
        target: usize,
        budget: &RequestBudget,
        media: &Mutex<ResolvedMedia>,
        excluded: &mut HashSet<String>,
        output: &mut Vec<PostView>,
    ) -> bool {
        if target == 0 {
            return false;
        }
        let source = strategy.source();

        let ctx = RecallContext {
            viewer_id,
            profile,
            excluded: &*excluded,
            media,
        };
        let candidates = match budget.run(strategy.recall(&ctx, target)).await {
            Ok(Ok(views)) => views,
            Ok(Err(e)) => {
                metrics::record_recall_failure(source.as_str());
                warn!("Recall strategy {} failed: {:#}", source.as_str(), e);
                return false;
            }
            Err(e) => {
                warn!(source = source.as_str(), error = %e, "Recall stage skipped");
                return true;
            }
        };

        let mut accepted = 0;
        for view in candidates {
            if accepted == target {
                break;
            }
            if excluded.insert(view.id.clone()) {
                output.push(view);
                accepted += 1;
            }
        }
        false
    }
}

/// Shuffle, truncate and count. Fails only if a duplicate slipped through.
fn finalize<R: Rng + ?Sized>(
    mut posts: Vec<PostView>,
    total: usize,
    degraded: bool,
    rng: &mut R,
) -> Result<BlendedFeed> {
    shuffle_feed(&mut posts, rng);
    posts.truncate(total);

    let mut seen = HashSet::with_capacity(posts.len());
    if let Some(dup) = posts.iter().find(|p| !seen.insert(p.id.as_str())) {
        return Err(AppError::Internal(format!(
            "duplicate post {} in assembled feed",
            dup.id
        )));
    }

    let count = |kind: RecommendationType| {
        posts
            .iter()
            .filter(|p| p.recommendation_type == Some(kind))
            .count()
    };

    Ok(BlendedFeed {
        personalized_count: count(RecommendationType::Personalized),
        hot_count: count(RecommendationType::Hot),
        latest_count: count(RecommendationType::Latest),
        posts,
        degraded,
    })
}

/// Uniform Fisher–Yates shuffle
pub fn shuffle_feed<R: Rng + ?Sized>(posts: &mut [PostView], rng: &mut R) {
    posts.shuffle(rng);
}
