//! Karma API Server

use std::sync::Arc;

use common::config::StorageBackend;
use db::{KarmaStore, MemoryStore, PgStore};
use tracing::{info, warn};

use api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api=debug".parse()?)
                .add_directive("processor=info".parse()?)
                .add_directive("db=info".parse()?),
        )
        .init();

    info!("⭐ Starting karma API");

    let config = common::Config::from_env()?;
    if config.operator_api_key.is_none() {
        warn!("OPERATOR_API_KEY not set; internal and operator endpoints will refuse requests");
    }

    let store: Arc<dyn KarmaStore> = match config.storage {
        StorageBackend::Postgres => {
            let pool = db::create_pool(&config.database_url).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState::new(config.clone(), store));

    let seeded = state.catalog.seed_defaults().await?;
    if seeded > 0 {
        info!("🏅 Seeded {} default badges", seeded);
    }

    if config.reconcile_interval_secs > 0 {
        let reconciler = state.background_reconciler();
        tokio::spawn(async move {
            reconciler.run().await;
        });
        info!(
            "🔁 Badge reconciliation every {} seconds",
            config.reconcile_interval_secs
        );
    } else {
        info!("🔁 Background reconciliation disabled (RECONCILE_INTERVAL_SECS=0)");
    }

    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("🚀 Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
