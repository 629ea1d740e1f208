//! Shared handler state and server configuration.

use crate::error::ApiError;
use pathlab_core::{
    BookingService, CatalogService, ConversionService, CoreConfig, LabResult, LabStore,
    PrescriptionService, UserService,
};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:5001";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Server settings resolved once at startup from the environment.
#[derive(Clone, Debug)]
pub struct RestConfig {
    pub addr: String,
    pub core: CoreConfig,
    pub admin_key: String,
    pub request_timeout: Duration,
}

impl RestConfig {
    /// Read `PATHLAB_*` variables.
    ///
    /// # Errors
    ///
    /// Fails if `PATHLAB_ADMIN_KEY` is unset or blank, the timeout is not a positive integer, or
    /// the core configuration is invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        let addr = std::env::var("PATHLAB_REST_ADDR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REST_ADDR.into());

        let core = CoreConfig::from_values(
            std::env::var("PATHLAB_DATA_DIR").ok(),
            std::env::var("PATHLAB_LAB_NAME").ok(),
        )?;

        let admin_key = std::env::var("PATHLAB_ADMIN_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow::anyhow!("PATHLAB_ADMIN_KEY must be set"))?;

        let request_timeout = match std::env::var("PATHLAB_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| {
                    anyhow::anyhow!("PATHLAB_REQUEST_TIMEOUT_SECS '{raw}' is invalid: {e}")
                })?;
                if secs == 0 {
                    anyhow::bail!("PATHLAB_REQUEST_TIMEOUT_SECS must be at least 1");
                }
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            addr,
            core,
            admin_key,
            request_timeout,
        })
    }
}

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub users: UserService,
    pub prescriptions: PrescriptionService,
    pub bookings: BookingService,
    pub conversion: ConversionService,
    pub admin_key: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<LabStore>, admin_key: &str) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            users: UserService::new(store.clone()),
            prescriptions: PrescriptionService::new(store.clone()),
            bookings: BookingService::new(store.clone()),
            conversion: ConversionService::new(store),
            admin_key: Arc::from(admin_key),
        }
    }
}

/// Run a store operation on the blocking pool.
///
/// Git I/O never runs on the async executor. Once started the operation runs to completion even
/// if the request times out, so a committed change is never cut off halfway.
pub async fn blocking<T, F>(op: F) -> Result<T, ApiError>
where
    F: FnOnce() -> LabResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
        .map_err(ApiError::from)
}
