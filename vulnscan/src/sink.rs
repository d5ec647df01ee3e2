use anyhow::{anyhow, Result};
use async_trait::async_trait;
use results_sqlite::{Db, NewScan};
use std::sync::{Arc, Mutex};
use vulnscan_core::{AuditRecord, PersistenceSink};

pub type SharedDb = Arc<Mutex<Db>>;

/// Run a blocking closure against the audit store off the async workers.
pub async fn with_db<T, F>(db: SharedDb, f: F) -> Result<T>
where
    F: FnOnce(&Db) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let guard = db.lock().map_err(|_| anyhow!("audit store lock poisoned"))?;
        f(&guard)
    })
    .await?
}

pub struct SqliteSink {
    db: SharedDb,
}

impl SqliteSink {
    pub fn new(db: SharedDb) -> Self {
        SqliteSink { db }
    }
}

#[async_trait]
impl PersistenceSink for SqliteSink {
    async fn store(&self, record: &AuditRecord) -> Result<()> {
        let scan = NewScan::now(record.url.clone(), record.vulnerabilities.clone(), serde_json::to_value(&record.results)?);
        let id = with_db(self.db.clone(), move |db| db.insert_scan(&scan)).await?;
        tracing::debug!(scan_id = %id, url = %record.url, "scan saved");
        Ok(())
    }
}
