pub mod app_config;
pub mod memory;
pub mod postgres;

pub use app_config::{BusinessRules, Config};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
