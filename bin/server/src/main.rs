use defi_flow_server::{
    app::{AppState, router},
    config::ServerConfig,
    db::{InMemoryWorkflowStore, PgWorkflowStore, WorkflowStore},
};
use defi_flow_workflow::WorkflowEngine;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env()?;
    tracing::info!("Loaded configuration");

    let store: Arc<dyn WorkflowStore> = match &config.database_url {
        Some(url) => {
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&db_pool).await?;
            Arc::new(PgWorkflowStore::new(db_pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, workflows are kept in memory");
            Arc::new(InMemoryWorkflowStore::new())
        }
    };

    let engine = WorkflowEngine::simulated(config.engine.clone());
    let app_state = Arc::new(AppState::new(store, engine, config.default_owner.clone()));
    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
