use crate::domain::integration::{IntegrationJob, IntegrationLog, JobId, LogId, Timestamp};
use crate::domain::ports::IntegrationStore;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Column Family for integration logs.
pub const CF_LOGS: &str = "logs";
/// Column Family for scheduled retry jobs.
pub const CF_JOBS: &str = "jobs";
/// Column Family for bookkeeping such as the id counter.
pub const CF_META: &str = "meta";

const LAST_ID_KEY: &[u8] = b"last_id";

/// A persistent store implementation using RocksDB.
///
/// Logs and jobs live in separate Column Families keyed by big-endian id,
/// so iteration follows creation order.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    id_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "logs", "jobs" and "meta" column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_LOGS, CF_JOBS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            id_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| EngineError::internal(format!("{name} column family not found")))
    }

    fn put<T: Serialize>(&self, cf: &str, id: u64, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, id.to_be_bytes(), bytes)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, id: u64) -> Result<Option<T>> {
        match self.db.get_pinned_cf(self.cf(cf)?, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl IntegrationStore for RocksDBStore {
    async fn next_id(&self) -> Result<u64> {
        let _lock = self.id_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let meta = self.cf(CF_META)?;
        let last = match self.db.get_pinned_cf(meta, LAST_ID_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| EngineError::internal("corrupt id counter"))?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = last + 1;
        self.db.put_cf(meta, LAST_ID_KEY, next.to_be_bytes())?;
        Ok(next)
    }

    async fn store_log(&self, log: IntegrationLog) -> Result<()> {
        self.put(CF_LOGS, log.id, &log)
    }

    async fn get_log(&self, log_id: LogId) -> Result<Option<IntegrationLog>> {
        self.get(CF_LOGS, log_id)
    }

    async fn all_logs(&self) -> Result<Vec<IntegrationLog>> {
        self.scan(CF_LOGS)
    }

    async fn store_job(&self, job: IntegrationJob) -> Result<()> {
        self.put(CF_JOBS, job.id, &job)
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<IntegrationJob>> {
        self.get(CF_JOBS, job_id)
    }

    async fn remove_job(&self, job_id: JobId) -> Result<()> {
        self.db.delete_cf(self.cf(CF_JOBS)?, job_id.to_be_bytes())?;
        Ok(())
    }

    async fn due_jobs(&self, now: Timestamp) -> Result<Vec<IntegrationJob>> {
        let mut due: Vec<IntegrationJob> = self
            .scan::<IntegrationJob>(CF_JOBS)?
            .into_iter()
            .filter(|j| j.is_due(now))
            .collect();
        due.sort_by_key(|j| (j.scheduled_for, j.id));
        Ok(due)
    }
}
