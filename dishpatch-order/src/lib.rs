pub mod manager;
pub mod permissions;

pub use manager::{CreateOrder, LifecycleManager, OrderWithHistory};
