use dishpatch_events::Broadcaster;
use dishpatch_order::LifecycleManager;
use dishpatch_promo::PromotionEngine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<LifecycleManager>,
    pub promotions: PromotionEngine,
    pub broadcaster: Arc<Broadcaster>,
    pub auth: AuthConfig,
}
