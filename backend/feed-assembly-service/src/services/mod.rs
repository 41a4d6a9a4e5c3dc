//! Service layer for feed-assembly-service
//!
//! Active modules:
//! - media: content-addressed reference → temp URL resolution
//! - materializer: raw post → display-ready PostView
//! - profile_builder: short-term interest profile from vote/view history
//! - recall: personalized / hot / latest candidate retrievers
//! - blender: sequential blending, shuffle and per-source counts

pub mod blender;
pub mod materializer;
pub mod media;
pub mod profile_builder;
pub mod recall;

pub use blender::{BlendedFeed, BlenderConfig, FeedBlender, FeedPlan};
pub use materializer::{normalize_images, PostViewMaterializer, ANONYMOUS_AUTHOR};
pub use media::{HttpTempUrlProvider, MediaResolver, TempUrlProvider};
pub use profile_builder::{InteractionProfileBuilder, InterestProfile, ProfileBuilderConfig};
pub use recall::{
    HotRecallStrategy, HotWeights, LatestRecallStrategy, PersonalizedRecallStrategy,
    RecallContext, RecallStrategy,
};
