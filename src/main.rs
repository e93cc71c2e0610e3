use anyhow::Context;
use tracing_subscriber::EnvFilter;

use registro_api::{config::Config, database, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL and friends.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "registro_api=info,tower_http=info".into()),
        )
        .init();

    // Refuse to start on a missing or malformed secret rather than limp along.
    let config = Config::from_env().context("invalid configuration")?;

    let pool = database::manager::connect(&config.database)
        .await
        .context("failed to connect to PostgreSQL")?;
    database::manager::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;
    tracing::info!("connected to PostgreSQL, migrations applied");

    let state = AppState::new(pool, &config.security);
    let app = registro_api::router(state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    println!("🔒 Registro API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
