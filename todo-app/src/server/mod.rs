// Server module - HTTP server setup and routing
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

pub use self::error::ApiError;
pub use self::state::AppState;

/// Create the Axum application router with all routes and middleware
pub fn create_app(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/items", get(handlers::list_items).post(handlers::create_item))
        .route("/items/first", get(handlers::first_item))
        .route(
            "/items/:id",
            get(handlers::get_item)
                .put(handlers::replace_item)
                .delete(handlers::delete_item),
        )
        .route("/items/:id/complete", post(handlers::complete_item))
        .route("/search", get(handlers::search_items))
        .route("/suggest", get(handlers::suggest_titles))
        .route("/admin/sync", post(handlers::trigger_sync))
        .route("/admin/reset", post(handlers::reset_search))
        .layer(create_cors_layer(cors_origins))
        .with_state(state)
}

/// Create the CORS layer for the configured browser origins.
///
/// Origins that are not valid header values are skipped.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
}

/// Run the server on the specified address until `shutdown` resolves
pub async fn run_server(
    app: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("Server listening on {}", addr);
    info!("- Items endpoint: http://{}/items", addr);
    info!("- Search endpoint: http://{}/search", addr);
    info!("- Health endpoint: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
