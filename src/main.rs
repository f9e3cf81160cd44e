use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use ideaforge::{
    config::Config,
    db::{create_pool, IdeasStore, MemoryIdeasStore, PgIdeasStore},
    llm::OpenRouterAdapter,
    routes::create_router,
    settings::SettingsStorage,
    utils::init_tracing,
    AppState, Gateway,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    let ideas: Arc<dyn IdeasStore> = match &config.database {
        Some(db) => {
            let pool = create_pool(db).await?;

            info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;
            info!("Database migrations completed");

            Arc::new(PgIdeasStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, saved ideas are kept in memory only");
            Arc::new(MemoryIdeasStore::new())
        }
    };

    let settings = Arc::new(match &config.settings_dir {
        Some(dir) => SettingsStorage::with_path(dir.clone(), config.tiers.clone()),
        None => SettingsStorage::new(config.tiers.clone()),
    });
    if !settings.has_any_key().await {
        warn!("No API key configured yet; analyses will fail until one is set via /api/settings");
    }

    let adapter = Arc::new(OpenRouterAdapter::new(&config.llm).context("Failed to build HTTP client")?);
    let gateway = Arc::new(Gateway::new(settings.clone(), adapter, &config.llm));

    let state = AppState {
        config: config.clone(),
        gateway,
        ideas,
        settings,
    };
    let app = create_router(state);

    let host: std::net::IpAddr = config.server.host.parse().context("Invalid HOST")?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
