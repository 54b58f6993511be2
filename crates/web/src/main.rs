use std::path::Path;

use anyhow::Context;
use storage::{Database, dto::competitor::NewCompetitor};
use web::{
    config::Config,
    features::leaderboard::{LeaderboardService, services::seed_competitors},
    live::{ConnectionRegistry, RegistryConfig},
    routes,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting event timing server");

    tracing::info!(
        "Connecting to database at: {}",
        config
            .database_url
            .split('@')
            .next_back()
            .unwrap_or("unknown")
    );
    let db = Database::new(&config.database_url)
        .await
        .context("Failed to initialize database")?;

    db.run_migrations()
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations completed successfully");

    if let Some(seed_file) = &config.seed_file {
        let roster = read_roster(seed_file)?;
        let inserted = seed_competitors(db.pool(), &roster)
            .await
            .context("Failed to seed competitors")?;
        tracing::info!(inserted, total = roster.len(), "Competitor roster seeded");
    }

    let registry = ConnectionRegistry::new(RegistryConfig {
        queue_capacity: config.session_queue_capacity,
    });
    let service = LeaderboardService::load(db.pool(), registry)
        .await
        .context("Failed to initialize leaderboard")?;

    // the roster is only read once
    db.close().await;

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    tracing::info!("Listening on http://{}", bind_address);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", bind_address);

    axum::serve(listener, routes::app(service)).await?;

    Ok(())
}

fn read_roster(path: &Path) -> anyhow::Result<Vec<NewCompetitor>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))
}
