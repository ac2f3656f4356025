use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use dishpatch_core::{Actor, ActorRole};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState, AuthConfig};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: ActorRole,
    pub exp: usize,
}

/// Authenticated party, pulled from the `Authorization: Bearer` header.
/// Handlers take this as an extractor; requests without a valid token are
/// rejected before the handler runs.
#[derive(Debug, Clone, Copy)]
pub struct AuthActor(pub Actor);

impl FromRequestParts<AppState> for AuthActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected a Bearer token".into()))?;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.auth.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::Unauthorized("invalid token".into()))?;

        Ok(AuthActor(Actor::new(data.claims.sub, data.claims.role)))
    }
}

/// Reject unless the actor holds `role`. Finer per-transition permissions
/// live in the lifecycle manager; this only gates whole endpoints.
pub fn require_role(actor: Actor, role: ActorRole) -> Result<(), ApiError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("{} access required", role)))
    }
}

pub fn issue_token(actor: Actor, auth: &AuthConfig) -> Result<String, ApiError> {
    let claims = Claims {
        sub: actor.id,
        role: actor.role,
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| ApiError::Unauthorized(format!("token encoding failed: {e}")))
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/guest", post(login_guest))
}

/// Issue a fresh customer identity. Restaurant, driver and admin tokens
/// come from the identity service, not from here.
async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, ApiError> {
    let actor = Actor::new(Uuid::new_v4(), ActorRole::Customer);
    let token = issue_token(actor, &state.auth)?;
    Ok(Json(AuthResponse { token, user_id: actor.id }))
}
