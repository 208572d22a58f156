//! Route definitions for the medicine cabinet API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - items, batches, movements, alerts
        .nest("/items", item_routes(state.clone()))
        // Protected routes - storage locations
        .nest("/locations", location_routes(state.clone()))
        // Protected routes - manual alert scan
        .nest("/alerts", alert_routes(state))
}

/// Item routes (protected)
fn item_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route(
            "/:id",
            get(handlers::get_item)
                .patch(handlers::update_item)
                .delete(handlers::archive_item),
        )
        .route(
            "/:id/batches",
            get(handlers::list_batches).post(handlers::add_batch),
        )
        .route("/:id/txns", get(handlers::list_transactions))
        .route("/:id/txns/in", post(handlers::receive_in))
        .route("/:id/txns/out", post(handlers::use_out))
        .route("/:id/txns/adjust", post(handlers::adjust))
        .route(
            "/:id/alert",
            get(handlers::get_alert).put(handlers::set_alert),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Location routes (protected)
fn location_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_locations).post(handlers::create_location),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Alert routes (protected)
fn alert_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/scan", post(handlers::scan_alerts))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
