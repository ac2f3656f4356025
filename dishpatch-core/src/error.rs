use crate::status::OrderStatus;
use uuid::Uuid;

/// Storage-backend failures. Domain rejections never travel through this
/// type; a conditional update that matched zero rows is reported as `false`
/// by the store, not as an error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("stored value could not be decoded: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Promotion-specific rejections, in validation order.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PromoError {
    #[error("promotion code not found or inactive")]
    CodeNotFound,

    #[error("promotion is outside its validity window")]
    Expired,

    #[error("promotion usage limit reached")]
    LimitReached,

    #[error("order total is below the promotion minimum of {minimum}")]
    BelowMinimum { minimum: i64 },

    #[error("promotion does not apply to this restaurant")]
    NotApplicable,

    #[error("promotion already redeemed by this user")]
    AlreadyUsed,
}

/// Order lifecycle rejections and failures.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("actor not permitted: {0}")]
    Forbidden(String),

    #[error("lost concurrent update race: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
