pub mod actor;
pub mod error;
pub mod events;
pub mod order;
pub mod promotion;
pub mod status;
pub mod store;

pub use actor::{Actor, ActorRole};
pub use error::{OrderError, PromoError, StoreError};
pub use events::{EventKind, OrderEvent, Topic};
pub use order::{Cancellation, DeliveryAddress, Order, OrderItem, PaymentStatus, StatusHistoryEntry};
pub use promotion::{DiscountType, Promotion, PromotionRedemption};
pub use status::OrderStatus;
pub use store::{DeliveryFees, DriverChange, FixedDeliveryFee, OrderStore, PromotionStore, RedeemOutcome, StatusUpdate};
