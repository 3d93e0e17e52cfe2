use dispensary_core::{CoreConfig, FileStore, HttpDeviceClient};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the dispensary service
///
/// Serves the REST API, backed by the file store under `PATIENT_DATA_DIR` and the dispensing
/// device at `DISPENSARY_DEVICE_URL`.
///
/// # Environment Variables
/// - `DISPENSARY_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `PATIENT_DATA_DIR`: Directory for record storage (default: "patient_data")
/// - `DISPENSARY_DEVICE_URL`: Device base URL, `http://host:port` or bare `host:port`
///   (default: "http://192.168.1.100:80")
/// - `DISPENSARY_DEVICE_TIMEOUT_SECS`: Round-trip bound for device calls (default: 10)
///
/// # Errors
/// Returns an error if the configuration is invalid, the data directory cannot be created, the
/// address cannot be bound, or the server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dispensary=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = CoreConfig::from_env_values(
        std::env::var("PATIENT_DATA_DIR").ok(),
        std::env::var("DISPENSARY_DEVICE_URL").ok(),
        std::env::var("DISPENSARY_DEVICE_TIMEOUT_SECS").ok(),
    )?;
    let rest_addr =
        std::env::var("DISPENSARY_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tokio::fs::create_dir_all(cfg.patient_data_dir()).await?;
    let store = Arc::new(FileStore::new(cfg.patient_data_dir()));
    let device = Arc::new(HttpDeviceClient::new(cfg.device())?);

    tracing::info!(
        "++ Record store at {}, device at {} (timeout {:?})",
        cfg.patient_data_dir().display(),
        cfg.device().base_url(),
        cfg.device().timeout()
    );
    tracing::info!("++ Starting dispensary REST on {}", rest_addr);

    let app = api_rest::router(api_rest::AppState::new(store, device));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("-- Shutting down dispensary REST");
        })
        .await?;

    Ok(())
}
