//! Workspace entry point: loads `.env`, configures logging and runs the REST API.
//!
//! # Environment Variables
//! - `PATHLAB_REST_ADDR`: listen address (default `0.0.0.0:5001`)
//! - `PATHLAB_DATA_DIR`: lab data repository (default `lab_data`)
//! - `PATHLAB_LAB_NAME`: lab name recorded on every commit (default `pathlab`)
//! - `PATHLAB_ADMIN_KEY`: shared key for admin routes (required)
//! - `PATHLAB_REQUEST_TIMEOUT_SECS`: per-request timeout (default 30)

use api_rest::RestConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pathlab=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("pathlab_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = RestConfig::from_env()?;
    tracing::info!(
        lab = cfg.core.lab_name(),
        data_dir = %cfg.core.data_dir().display(),
        "-- Starting pathlab"
    );

    api_rest::serve(cfg).await
}
