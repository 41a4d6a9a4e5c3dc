use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_assembly::config::Config;
use feed_assembly::db::{DocumentStore, PgDocumentStore};
use feed_assembly::handlers::{self, AppState};
use feed_assembly::services::{
    BlenderConfig, FeedBlender, HttpTempUrlProvider, MediaResolver, PostViewMaterializer,
};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Starting feed-assembly-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Environment: {}", config.app.env);

    let db_pool = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database pool creation failed: {:#}", e);
            eprintln!("ERROR: Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(
        db_pool,
        resilience::document_store_config().duration,
    ));

    let provider = match HttpTempUrlProvider::new(&config.media.service_url, config.media.timeout())
    {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!("Media client creation failed: {}", e);
            eprintln!("ERROR: Failed to create media client: {}", e);
            std::process::exit(1);
        }
    };
    let media = Arc::new(MediaResolver::new(
        Arc::new(provider),
        config.media.scheme_prefix.clone(),
        config.media.max_concurrent_chunks,
    ));
    tracing::info!(
        "Media resolver initialized: service={} prefix={}",
        config.media.service_url,
        config.media.scheme_prefix
    );

    let materializer = Arc::new(PostViewMaterializer::new(store.clone(), media));
    let blender = Arc::new(FeedBlender::from_store(
        store.clone(),
        materializer.clone(),
        BlenderConfig {
            request_budget: config.feed.request_budget(),
            max_feed_size: config.feed.max_size,
        },
    ));

    let state = web::Data::new(AppState {
        store,
        materializer,
        blender,
    });

    let port = config.app.port;
    tracing::info!("HTTP server listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await
}
