use dishpatch_api::{app, AppState, AuthConfig};
use dishpatch_events::Broadcaster;
use dishpatch_order::LifecycleManager;
use dishpatch_promo::PromotionEngine;
use dishpatch_store::{Config, PostgresStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dishpatch_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting Dishpatch API on port {}", config.server.port);

    let store = Arc::new(PostgresStore::connect(&config.database.url).await?);
    store.migrate().await?;

    let broadcaster = Arc::new(Broadcaster::new(config.business_rules.event_channel_capacity));
    let promotions = PromotionEngine::new(store.clone());
    let manager = Arc::new(LifecycleManager::new(
        store.clone(),
        promotions.clone(),
        broadcaster.clone(),
        Arc::new(config.business_rules.clone()),
    ));

    let state = AppState {
        manager,
        promotions,
        broadcaster,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
