//! Order route handlers.
//!
//! Thin adapters between the HTTP surface and the checkout workflow: they
//! extract the auth context, parse client parameters, and translate
//! `CheckoutError` into the JSON error envelope via `AppError`.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use greenbasket_core::{Money, OrderId, OrderStatus, PaymentMode};

use crate::checkout::PaymentRequest;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::state::AppState;

/// Query parameters for placing an order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderParams {
    /// Shipping address; must belong to the caller.
    pub shipping_address_id: i32,
    /// Payment mode; defaults to cash on delivery.
    pub payment_method: Option<String>,
}

/// Query parameters for the admin order listing.
#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Body for the admin status update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusBody {
    pub status: String,
}

/// Body for recording a payment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBody {
    pub payment_method: String,
    pub payment_amount: i64,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// `POST /orders` - Convert the caller's cart into an order.
#[instrument(skip(state))]
pub async fn place_order(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Query(params): Query<PlaceOrderParams>,
) -> Result<impl IntoResponse> {
    let payment_mode = match params.payment_method.as_deref() {
        None | Some("") => PaymentMode::default(),
        Some(raw) => {
            PaymentMode::from_str(raw).map_err(|e| AppError::BadRequest(e.to_string()))?
        }
    };

    let order = state
        .checkout()
        .place_order(ctx.user_id, params.shipping_address_id.into(), payment_mode)
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /orders` - List all orders (admin only).
#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(params): Query<ListOrdersParams>,
) -> Result<impl IntoResponse> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let offset = params.offset.unwrap_or(0).max(0);
    let orders = state.checkout().list_orders(limit, offset).await?;
    Ok(Json(orders))
}

/// `GET /orders/mine` - The caller's order history.
#[instrument(skip(state))]
pub async fn my_orders(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
) -> Result<impl IntoResponse> {
    let orders = state.checkout().list_orders_for_user(ctx.user_id).await?;
    Ok(Json(orders))
}

/// `GET /orders/{id}` - Fetch one of the caller's orders.
#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse> {
    let order = state.checkout().order(ctx.user_id, OrderId::new(id)).await?;
    Ok(Json(order))
}

/// `POST /orders/{id}/cancel` - Cancel a pending or confirmed order.
#[instrument(skip(state))]
pub async fn cancel_order(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse> {
    let order = state
        .checkout()
        .cancel_order(ctx.user_id, OrderId::new(id))
        .await?;
    Ok(Json(order))
}

/// `PATCH /orders/{id}/status` - Set an order's status (admin only).
#[instrument(skip(state))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<impl IntoResponse> {
    let status = OrderStatus::from_str(&body.status.to_lowercase())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let order = state
        .checkout()
        .update_status(OrderId::new(id), status)
        .await?;
    Ok(Json(order))
}

/// `POST /orders/{id}/payment` - Record a payment against an order.
#[instrument(skip(state, body))]
pub async fn process_payment(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(id): Path<i32>,
    Json(body): Json<PaymentBody>,
) -> Result<impl IntoResponse> {
    let mode = PaymentMode::from_str(&body.payment_method)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let payment = PaymentRequest {
        mode,
        amount: Money::from_minor_units(body.payment_amount),
        transaction_id: body.transaction_id,
    };
    let order = state
        .checkout()
        .process_payment(ctx.user_id, OrderId::new(id), payment)
        .await?;
    Ok(Json(order))
}
