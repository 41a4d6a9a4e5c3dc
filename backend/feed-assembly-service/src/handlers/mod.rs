pub mod feed;
pub mod posts;

use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::error;

use crate::db::DocumentStore;
use crate::error::AppError;
use crate::metrics;
use crate::services::{FeedBlender, PostViewMaterializer};

pub use feed::get_recommendation_feed;
pub use posts::{list_posts, search_posts};

/// Shared handler state, built once in `main`
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub materializer: Arc<PostViewMaterializer>,
    pub blender: Arc<FeedBlender>,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

pub async fn serve_metrics() -> HttpResponse {
    match metrics::render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

/// Malformed JSON bodies get the same `{success:false, message}` shape as other failures
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid request body: {}", err)).into()
}

/// Routes for the HTTP server and for handler tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(serve_metrics))
        .service(get_recommendation_feed)
        .service(search_posts)
        .service(list_posts);
}
