use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::dto::*;
use super::error::ApiError;
use crate::app::AppState;
use crate::domain::entities::{
    parse_user_id, Order, PortfolioView, Stock, User, WalletTransaction,
};

type ApiResult<T> = Result<T, ApiError>;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ----------------------------------------------------------------------------
// Users
// ----------------------------------------------------------------------------

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state
        .directory
        .register(&req.name, &req.email, &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.directory.login(&req.email, &req.password).await?))
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.directory.list_users().await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<User>> {
    let user_id = parse_user_id(&user_id)?;
    Ok(Json(state.directory.get_user(user_id).await?))
}

// ----------------------------------------------------------------------------
// Wallet
// ----------------------------------------------------------------------------

pub async fn deposit(
    State(state): State<AppState>,
    Json(req): Json<WalletRequest>,
) -> ApiResult<Json<NewBalanceResponse>> {
    let user_id = parse_user_id(&req.user_id)?;
    let new_balance = state.wallet.deposit(user_id, req.amount).await?;
    Ok(Json(NewBalanceResponse { new_balance }))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Json(req): Json<WalletRequest>,
) -> ApiResult<Json<NewBalanceResponse>> {
    let user_id = parse_user_id(&req.user_id)?;
    let new_balance = state.wallet.withdraw(user_id, req.amount).await?;
    Ok(Json(NewBalanceResponse { new_balance }))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<BalanceResponse>> {
    let user_id = parse_user_id(&user_id)?;
    let balance = state.wallet.get_balance(user_id).await?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<WalletTransaction>>> {
    let user_id = parse_user_id(&user_id)?;
    Ok(Json(state.wallet.get_history(user_id).await?))
}

// ----------------------------------------------------------------------------
// Stocks
// ----------------------------------------------------------------------------

pub async fn create_stock(
    State(state): State<AppState>,
    Json(req): Json<CreateStockRequest>,
) -> ApiResult<(StatusCode, Json<Stock>)> {
    let stock = state
        .catalog
        .create(&req.symbol, &req.name, req.price)
        .await?;
    Ok((StatusCode::CREATED, Json(stock)))
}

pub async fn list_stocks(State(state): State<AppState>) -> ApiResult<Json<Vec<Stock>>> {
    Ok(Json(state.catalog.list().await?))
}

pub async fn get_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Stock>> {
    Ok(Json(state.catalog.get_by_symbol(&symbol).await?))
}

// ----------------------------------------------------------------------------
// Orders and portfolio
// ----------------------------------------------------------------------------

pub async fn buy(
    State(state): State<AppState>,
    Json(req): Json<TradeRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let user_id = parse_user_id(&req.user_id)?;
    let order = state.executor.buy(user_id, &req.symbol, req.quantity).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn sell(
    State(state): State<AppState>,
    Json(req): Json<TradeRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let user_id = parse_user_id(&req.user_id)?;
    let order = state.executor.sell(user_id, &req.symbol, req.quantity).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Order>>> {
    let user_id = parse_user_id(&user_id)?;
    Ok(Json(state.executor.orders(user_id).await?))
}

pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<PortfolioView>> {
    let user_id = parse_user_id(&user_id)?;
    Ok(Json(state.portfolio.valuation(user_id, &state.catalog).await?))
}
