use actix_web::{post, web, HttpResponse};
use tracing::{debug, error};

use super::AppState;
use crate::error::Result;
use crate::metrics;
use crate::middleware::ViewerId;
use crate::models::{FeedRequest, FeedResponse};
use crate::services::FeedPlan;

/// POST /api/v1/feed/recommendations
/// Blended personalized / hot / latest page for the calling viewer
#[post("/api/v1/feed/recommendations")]
pub async fn get_recommendation_feed(
    viewer: ViewerId,
    body: web::Json<FeedRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let request = body.into_inner();

    debug!(
        "Assembling feed: viewer={} personalized={} hot={} skip={} excluded={}",
        viewer.as_str(),
        request.personalized_count,
        request.hot_count,
        request.skip,
        request.exclude_post_ids.len()
    );

    let plan = FeedPlan {
        personalized_target: request.personalized_count as usize,
        hot_target: request.hot_count as usize,
        excluded: request.exclude_post_ids.into_iter().collect(),
    };

    let feed = match state.blender.assemble(viewer.as_str(), plan).await {
        Ok(feed) => feed,
        Err(err) => {
            metrics::record_feed_request("error");
            error!("Feed assembly failed for viewer {}: {}", viewer.as_str(), err);
            return Err(err);
        }
    };

    metrics::record_feed_request(if feed.degraded { "degraded" } else { "success" });

    Ok(HttpResponse::Ok().json(FeedResponse {
        success: true,
        total: feed.posts.len(),
        personalized_count: feed.personalized_count,
        hot_count: feed.hot_count,
        latest_count: feed.latest_count,
        degraded: feed.degraded,
        posts: feed.posts,
    }))
}
