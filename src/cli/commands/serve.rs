use anyhow::Result;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

use crate::cli::commands::initdb::migrate;
use crate::config::{build_app_state, Settings};
use crate::router::create_router;

pub async fn serve(settings: &Settings, database_url: &str, bind_address: &str) -> Result<()> {
    trace!("Entering serve function");
    info!("useradmin starting up");
    debug!("Database URL: {}", database_url);
    debug!("Bind address: {}", bind_address);

    let db = migrate(database_url).await?;

    let state = match build_app_state(settings, db) {
        Ok(state) => {
            debug!("Application state initialized successfully");
            state
        }
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    let app = create_router(state, Duration::from_secs(settings.request_timeout_secs));
    debug!("Router created successfully");

    info!("Starting server on {}", bind_address);
    let listener = match TcpListener::bind(bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", bind_address, e);
            return Err(e.into());
        }
    };

    info!("useradmin API server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}
