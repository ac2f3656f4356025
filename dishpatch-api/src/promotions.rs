use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use dishpatch_core::{ActorRole, DiscountType, Promotion};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth::AuthActor, error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ValidatePromotionRequest {
    pub code: String,
    pub order_total: i64,
    pub restaurant_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ValidatePromotionResponse {
    pub valid: bool,
    pub promotion_id: Uuid,
    pub discount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePromotionRequest {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: i64,
    pub max_discount: Option<i64>,
    pub min_order: Option<i64>,
    pub restaurant_ids: Option<Vec<Uuid>>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: Option<i64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/promotions/validate", post(validate_promotion))
        .route("/v1/promotions", post(create_promotion))
        .route("/v1/promotions/{code}", delete(deactivate_promotion))
}

/// POST /v1/promotions/validate — pre-checkout check against the cart
/// total. Rejections come back as 422 with the specific reason; checkout
/// itself never fails on a bad code.
async fn validate_promotion(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<ValidatePromotionRequest>,
) -> Result<Json<ValidatePromotionResponse>, ApiError> {
    crate::auth::require_role(actor, ActorRole::Customer)?;

    let validated = state
        .promotions
        .validate(&req.code, req.order_total, req.restaurant_id, actor.id)
        .await?
        .map_err(ApiError::Promo)?;

    Ok(Json(ValidatePromotionResponse {
        valid: true,
        promotion_id: validated.promotion_id,
        discount: validated.discount,
    }))
}

/// POST /v1/promotions
async fn create_promotion(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<CreatePromotionRequest>,
) -> Result<(StatusCode, Json<Promotion>), ApiError> {
    crate::auth::require_role(actor, ActorRole::Admin)?;

    if req.value <= 0 {
        return Err(ApiError::Order(dishpatch_core::OrderError::Validation(
            "discount value must be positive".into(),
        )));
    }

    let promotion = Promotion {
        id: Uuid::new_v4(),
        code: req.code,
        discount_type: req.discount_type,
        value: req.value,
        max_discount: req.max_discount,
        min_order: req.min_order,
        restaurant_ids: req.restaurant_ids,
        valid_from: req.valid_from,
        valid_until: req.valid_until,
        usage_limit: req.usage_limit,
        used_count: 0,
        is_active: true,
        created_at: Utc::now(),
    };
    state.promotions.create(&promotion).await?;

    Ok((StatusCode::CREATED, Json(promotion)))
}

/// DELETE /v1/promotions/{code}
async fn deactivate_promotion(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(code): Path<String>,
) -> Result<StatusCode, ApiError> {
    crate::auth::require_role(actor, ActorRole::Admin)?;

    if state.promotions.deactivate(&code).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}
