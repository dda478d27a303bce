use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::services::ForecastService;

/// Running HTTP server
///
/// The service keeps no background work; the server task is the whole
/// application.
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
    pub local_addr: std::net::SocketAddr,
}

impl Application {
    /// Build the forecast service and start serving on the configured address
    pub async fn build(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");
        info!(
            "Expecting columns '{}' (timestamp) and '{}' (value), encoding {}",
            config.timestamp_column,
            config.value_column,
            config.input_encoding.name()
        );

        let addr = config.server_addr();
        let forecast_service = ForecastService::from_config(config);

        let app_state = AppState { forecast_service };
        let app = create_router(app_state).layer(TraceLayer::new_for_http());

        info!("Starting HTTP server on {}", addr);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

        info!("Application initialized successfully, listening on {}", local_addr);

        Ok(Self {
            server_handle,
            local_addr,
        })
    }

    /// Run until the server stops
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}
