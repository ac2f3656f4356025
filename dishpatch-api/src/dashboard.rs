use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Json, Router,
};
use dishpatch_core::{ActorRole, OrderStatus, Topic};
use futures_util::Stream;
use std::collections::HashMap;
use std::convert::Infallible;

use crate::{auth::AuthActor, error::ApiError, orders::sse_from, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/dashboard/counts", get(active_counts))
        .route("/v1/dashboard/stream", get(stream_dashboard))
}

/// GET /v1/dashboard/counts — live orders per non-terminal status.
async fn active_counts(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> Result<Json<HashMap<OrderStatus, i64>>, ApiError> {
    crate::auth::require_role(actor, ActorRole::Admin)?;
    Ok(Json(state.manager.active_counts().await?))
}

/// GET /v1/dashboard/stream — count-changing events (creations and
/// terminal transitions) across all orders.
async fn stream_dashboard(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    crate::auth::require_role(actor, ActorRole::Admin)?;
    Ok(sse_from(state.broadcaster.subscribe(Topic::Dashboard)))
}
