//! Web application router and middleware setup.

use crate::web::config::WebConfig;
use crate::web::{handlers, AppState};
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::debug;

/// Create the axum application with all routes and middleware.
///
/// `/metrics` is only routed when `state` carries a metrics registry.
pub fn create_app(state: AppState, config: &WebConfig) -> Router {
    let mut app = Router::new()
        .route("/", get(handlers::index))
        .route("/api", get(handlers::api))
        .route("/pioled", get(handlers::pioled))
        .route("/healthz", get(handlers::health_check));

    if state.metrics.is_some() {
        app = app.route("/metrics", get(handlers::metrics));
    } else {
        debug!("No metrics registry, /metrics disabled");
    }

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
