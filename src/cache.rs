use crate::errors::StoreError;
use crate::query::{Adapter, Query, Select};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// `[full_name, emp_code]`
pub type EmployeePair = (String, String);

struct CacheEntry {
    pairs: Arc<Vec<EmployeePair>>,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct EmployeeCache {
    entry: Arc<RwLock<Option<CacheEntry>>>,
    ttl: Duration,
}

#[derive(Deserialize)]
struct NameRow {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    emp_code: String,
}

impl EmployeeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entry: Arc::new(RwLock::new(None)),
            ttl,
        }
    }

    pub async fn get(&self, db: &Adapter) -> Result<Arc<Vec<EmployeePair>>, StoreError> {
        {
            let entry = self.entry.read().await;
            if let Some(entry) = entry.as_ref()
                && entry.expires_at > Instant::now()
            {
                return Ok(Arc::clone(&entry.pairs));
            }
        }

        debug!("refreshing employee cache");
        let rows: Vec<NameRow> = db
            .execute(Query::Select(Select::EmployeeNamesByStatus("active".to_string())))
            .await?
            .decode()?;
        let pairs = Arc::new(
            rows.into_iter()
                .map(|row| (row.full_name, row.emp_code))
                .collect::<Vec<_>>(),
        );

        let mut entry = self.entry.write().await;
        *entry = Some(CacheEntry {
            pairs: Arc::clone(&pairs),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(pairs)
    }

    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }
}
