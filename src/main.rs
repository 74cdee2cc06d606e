//! Zinnia - weblog editorial server

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zinnia::{
    api::{self, AppState},
    config::Config,
    db,
    permissions::{resolve_handler, HandlerRegistry},
    templates::TemplateEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zinnia=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Zinnia...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Resolve the permission handler before touching anything else; a bad
    // path stops the process here.
    let registry = HandlerRegistry::with_builtins();
    let permissions = resolve_handler(config.permissions.handler.as_deref(), &registry)
        .context("Invalid permissions.handler setting")?;
    tracing::info!(
        handler = config.permissions.handler.as_deref().unwrap_or("default"),
        "Permission handler ready"
    );

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    // Templates
    let templates = TemplateEngine::with_overrides(config.templates.path.as_deref())?;
    tracing::info!("Templates loaded: {}", templates.template_names().join(", "));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(pool, config, permissions, templates);

    // Expired session cleanup (hourly)
    {
        let users = state.user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match users.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!("Removed {} expired sessions", removed),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
