use crate::cache::EmployeeCache;
use crate::clock::LocalClock;
use crate::config::{Backend, Config};
use crate::notify::{Notifier, NotifyError};
use crate::query::Adapter;
use crate::rest::RestClient;
use crate::storage::MemoryStore;
use crate::store::DataStore;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] crate::errors::StoreError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Everything handlers share, built once per process.
#[derive(Clone)]
pub struct AppState {
    pub db: Adapter,
    pub notifier: Notifier,
    pub employees: EmployeeCache,
    pub clock: LocalClock,
}

impl AppState {
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let store: Arc<dyn DataStore> = match &config.backend {
            Backend::Rest { url, api_key } => {
                Arc::new(RestClient::new(url, api_key, config.http_timeout)?)
            }
            Backend::Memory { path } => {
                info!(path = %path.display(), "using in-process data store");
                Arc::new(MemoryStore::open(path.clone()).await?)
            }
        };
        Self::new(store, config)
    }

    pub fn new(store: Arc<dyn DataStore>, config: &Config) -> Result<Self, StartupError> {
        let clock = LocalClock::from_minutes(config.time_offset_minutes);
        let db = Adapter::new(store, clock);
        let notifier = Notifier::new(&config.telegram_api_base, config.http_timeout, db.clone())?;
        Ok(Self {
            db,
            notifier,
            employees: EmployeeCache::new(config.employee_cache_ttl),
            clock,
        })
    }
}
