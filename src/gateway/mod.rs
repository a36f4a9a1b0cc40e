//! HTTP surface: router assembly rooted at `/api/user`.

pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use state::AppState;
use tower_http::{
    compression::CompressionLayer, decompression::RequestDecompressionLayer, trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/register", post(handlers::users::register))
        .route("/login", post(handlers::users::login))
        .route(
            "/orders",
            post(handlers::orders::submit_order).get(handlers::orders::list_orders),
        )
        .route("/balance", get(handlers::balance::get_balance))
        .route("/balance/withdraw", post(handlers::balance::withdraw))
        .route("/withdrawals", get(handlers::balance::withdrawals));

    Router::new()
        .route("/api/health", get(handlers::health::health_check))
        .nest("/api/user", user_routes)
        .layer(from_fn_with_state(state.clone(), middleware::session_auth))
        .layer(TraceLayer::new_for_http())
        .layer(RequestDecompressionLayer::new().gzip(true))
        .layer(CompressionLayer::new().gzip(true))
        .with_state(state)
}
