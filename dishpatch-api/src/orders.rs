use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use dishpatch_core::{
    ActorRole, DeliveryAddress, Order, OrderItem, OrderStatus, StatusHistoryEntry, Topic,
};
use dishpatch_order::{CreateOrder, OrderWithHistory};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{auth::AuthActor, error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub restaurant_id: Uuid,
    pub items: Vec<NewOrderItem>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: String,
    pub promo_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewOrderItem {
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub status_history: Vec<StatusHistoryEntry>,
}

impl From<OrderWithHistory> for OrderResponse {
    fn from(value: OrderWithHistory) -> Self {
        Self { order: value.order, status_history: value.history }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order).get(list_orders))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/status", post(update_status))
        .route("/v1/orders/{id}/stream", get(stream_order))
}

/// POST /v1/orders
async fn create_order(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    crate::auth::require_role(actor, ActorRole::Customer)?;

    let items = req
        .items
        .into_iter()
        .map(|i| OrderItem::new(i.menu_item_id, i.quantity, i.unit_price, i.notes))
        .collect();

    let created = state
        .manager
        .create(CreateOrder {
            customer_id: actor.id,
            restaurant_id: req.restaurant_id,
            items,
            delivery_address: req.delivery_address,
            payment_method: req.payment_method,
            promo_code: req.promo_code,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// POST /v1/orders/{id}/status
async fn update_status(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let updated = state.manager.transition(order_id, req.status, actor, req.reason).await?;
    Ok(Json(updated.into()))
}

/// Customers may only see their own orders; other roles see any.
fn ensure_viewable(actor: dishpatch_core::Actor, order: &Order) -> Result<(), ApiError> {
    if actor.role == ActorRole::Customer && order.customer_id != actor.id {
        return Err(ApiError::Forbidden("not your order".into()));
    }
    Ok(())
}

/// GET /v1/orders/{id}
async fn get_order(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let result = state.manager.get_order(order_id).await?;
    ensure_viewable(actor, &result.order)?;
    Ok(Json(result.into()))
}

/// GET /v1/orders — a customer's own orders; admins may list any
/// customer's via the query parameter.
async fn list_orders(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let customer_id = match actor.role {
        ActorRole::Customer => actor.id,
        ActorRole::Admin => params
            .customer_id
            .ok_or_else(|| ApiError::Unauthorized("customer_id query parameter required".into()))?,
        _ => return Err(ApiError::Forbidden("customer or admin access required".into())),
    };
    let orders = state.manager.list_orders(customer_id).await?;
    Ok(Json(orders))
}

/// GET /v1/orders/{id}/stream — live lifecycle events for one order, as
/// server-sent events. Gated like the detail read: the order must exist
/// and be visible to the caller. A lagged subscriber silently drops the
/// missed events and recovers by re-fetching the order.
async fn stream_order(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(order_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let result = state.manager.get_order(order_id).await?;
    ensure_viewable(actor, &result.order)?;
    Ok(sse_from(state.broadcaster.subscribe(Topic::Order(order_id))))
}

pub(crate) fn sse_from(
    rx: tokio::sync::broadcast::Receiver<dishpatch_core::OrderEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(event) => Event::default().json_data(&event).ok().map(Ok),
            Err(_) => None,
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
