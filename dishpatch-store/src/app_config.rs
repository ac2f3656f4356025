use dishpatch_core::DeliveryFees;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Current delivery fee in minor units. Read once per order creation
    /// and stamped onto the order; changing it never touches past orders.
    pub delivery_fee: i64,
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,
}

fn default_event_capacity() -> usize {
    100
}

impl DeliveryFees for BusinessRules {
    fn delivery_fee(&self) -> i64 {
        self.delivery_fee
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // `DISHPATCH__SERVER__PORT=8080` style environment overrides
            .add_source(config::Environment::with_prefix("DISHPATCH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
