use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use shopkit::auth::Jwt;
use shopkit::error::ApiResponse;
use validator::Validate;

use super::extract::{AuthUser, ValidatedJson};
use crate::error::{Error, Result};
use crate::notifications::{self, OrderConfirmationEmail};
use crate::orders::{NewOrder, OrderView};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderReq {
    #[serde(rename = "totalAmount")]
    #[validate(range(exclusive_min = 0.0, message = "Total amount must be greater than 0"))]
    pub total_amount: f64,
    #[serde(rename = "paymentMethod")]
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
}

pub async fn place_order(
    auth_user: Jwt<AuthUser>,
    state: State<AppState>,
    ValidatedJson(req): ValidatedJson<PlaceOrderReq>,
) -> Result<ApiResponse<OrderView>> {
    let user = state
        .users
        .find_by_id(auth_user.id)
        .await?
        .ok_or(Error::UserNotFound(Vec::new()))?;

    let order = state
        .orders
        .create(NewOrder {
            user_id: user.id,
            total_amount: req.total_amount,
            payment_method: req.payment_method,
        })
        .await?;
    tracing::info!(order_id = %order.id, user_id = %user.id, "order placed");

    let confirmation = OrderConfirmationEmail::for_order(&order, &user.email, &user.name);
    if let Err(e) = notifications::enqueue_order_confirmation(state.queue.as_ref(), confirmation).await {
        tracing::error!(order_id = %order.id, error = %e, "failed to enqueue order confirmation");
    }

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        OrderView::from(&order),
        "Order placed",
    ))
}

pub async fn list_orders(
    auth_user: Jwt<AuthUser>,
    state: State<AppState>,
) -> Result<ApiResponse<Vec<OrderView>>> {
    let orders = state.orders.list_for_user(auth_user.id).await?;
    let views = orders.iter().map(OrderView::from).collect();
    Ok(ApiResponse::ok(views, "orders fetched successfully"))
}
