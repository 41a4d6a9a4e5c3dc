mod hot_recall;
mod latest_recall;
mod personalized_recall;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::models::{PostView, RecommendationType};
use crate::services::media::ResolvedMedia;
use crate::services::profile_builder::InterestProfile;

pub use hot_recall::{HotRecallStrategy, HotWeights};
pub use latest_recall::LatestRecallStrategy;
pub use personalized_recall::PersonalizedRecallStrategy;

/// Everything a strategy may look at for one request
#[derive(Debug, Clone, Copy)]
pub struct RecallContext<'a> {
    pub viewer_id: &'a str,
    pub profile: &'a InterestProfile,
    /// Posts already selected or already shown
    pub excluded: &'a HashSet<String>,
    /// URLs resolved by earlier stages of the same request
    pub media: &'a Mutex<ResolvedMedia>,
}

impl<'a> RecallContext<'a> {
    pub fn excluded_ids(&self) -> Vec<String> {
        self.excluded.iter().cloned().collect()
    }
}

/// Recall 策略特徵
///
/// Implementations return at most `limit` materialized posts, already tagged
/// with their provenance. Only the final page is materialized.
#[async_trait]
pub trait RecallStrategy: Send + Sync {
    async fn recall(&self, ctx: &RecallContext<'_>, limit: usize) -> Result<Vec<PostView>>;
    fn source(&self) -> RecommendationType;
}
