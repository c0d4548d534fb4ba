//! API routes

pub mod auth;
pub mod billing;
pub mod health;
pub mod history;
pub mod recommend;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::require_auth;
use crate::state::AppState;

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/google", post(auth::google_sign_in))
        .route("/billing/plans", get(billing::plans))
        // Payment settlement entrypoints: the gateway authenticates with
        // signatures, not bearer tokens
        .route("/billing/verify", post(billing::verify))
        .route("/billing/webhook", post(billing::webhook));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/billing/me/subscription", get(billing::my_subscription))
        .route("/billing/create-order", post(billing::create_order))
        .route("/recommend", post(recommend::recommend))
        .route("/history", get(history::list))
        .route("/history/:id", get(history::get))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
