//! HTTP transport: routes, bodies and error mapping

pub mod dto;
pub mod error;
pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::app::AppState;
use crate::auth::require_auth;
use crate::rate_limit::rate_limit_middleware;
use handlers::*;

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login));

    let protected = Router::new()
        .route("/users", get(list_users))
        .route("/users/:user_id", get(get_user))
        .route("/wallet/deposit", post(deposit))
        .route("/wallet/withdraw", post(withdraw))
        .route("/wallet/balance/:user_id", get(get_balance))
        .route("/wallet/history/:user_id", get(get_history))
        .route("/stocks", post(create_stock).get(list_stocks))
        .route("/stocks/:symbol", get(get_stock))
        .route("/orders/buy", post(buy))
        .route("/orders/sell", post(sell))
        .route("/orders/:user_id", get(list_orders))
        .route("/portfolio/:user_id", get(get_portfolio))
        .route_layer(middleware::from_fn_with_state(
            state.api_keys.clone(),
            require_auth,
        ));

    // Outermost first: trace, bound the body, then spend rate budget.
    // The body bound is enforced by the extractors and answers 413.
    let global = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(global)
        .with_state(state)
}
