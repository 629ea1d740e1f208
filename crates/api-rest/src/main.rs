//! Standalone REST API server binary.
//!
//! Reads `PATHLAB_*` settings from the environment (and `.env` when present), opens the lab
//! store and serves the REST API with Swagger UI at `/swagger-ui`.

use api_rest::RestConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("pathlab_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = RestConfig::from_env()?;
    tracing::info!(data_dir = %cfg.core.data_dir().display(), "lab data directory");
    api_rest::serve(cfg).await
}
