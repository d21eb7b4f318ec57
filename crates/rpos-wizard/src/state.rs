//! Shared runtime state for rpos-wizard.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum; this module owns
//! nothing async itself beyond the session store's lock.

use anyhow::Result;
use rpos_client::ApiClient;
use rpos_config::WizardConfig;

use crate::session::SessionStore;

/// Static build metadata included in the health response.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Shared across all Axum handlers via `Arc`.
pub struct AppState {
    pub build: BuildInfo,
    pub config: WizardConfig,
    pub client: ApiClient,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: WizardConfig) -> Result<Self> {
        let client = ApiClient::new(&config)?;
        Ok(Self {
            build: BuildInfo {
                service: "rpos-wizard",
                version: env!("CARGO_PKG_VERSION"),
            },
            config,
            client,
            sessions: SessionStore::new(),
        })
    }
}
