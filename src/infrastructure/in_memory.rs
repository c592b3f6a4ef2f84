use crate::domain::integration::{IntegrationJob, IntegrationLog, JobId, LogId, Timestamp};
use crate::domain::ports::IntegrationStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A thread-safe in-memory store for integration logs and retry jobs.
///
/// Uses `Arc<RwLock<HashMap<..>>>` so clones share state. Nothing survives
/// the process; use it for tests and one-shot runs.
#[derive(Default, Clone)]
pub struct InMemoryIntegrationStore {
    logs: Arc<RwLock<HashMap<LogId, IntegrationLog>>>,
    jobs: Arc<RwLock<HashMap<JobId, IntegrationJob>>>,
    last_id: Arc<AtomicU64>,
}

impl InMemoryIntegrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntegrationStore for InMemoryIntegrationStore {
    async fn next_id(&self) -> Result<u64> {
        Ok(self.last_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn store_log(&self, log: IntegrationLog) -> Result<()> {
        let mut logs = self.logs.write().await;
        logs.insert(log.id, log);
        Ok(())
    }

    async fn get_log(&self, log_id: LogId) -> Result<Option<IntegrationLog>> {
        let logs = self.logs.read().await;
        Ok(logs.get(&log_id).cloned())
    }

    async fn all_logs(&self) -> Result<Vec<IntegrationLog>> {
        let logs = self.logs.read().await;
        let mut all: Vec<_> = logs.values().cloned().collect();
        all.sort_by_key(|log| log.id);
        Ok(all)
    }

    async fn store_job(&self, job: IntegrationJob) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<IntegrationJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(&job_id).cloned())
    }

    async fn remove_job(&self, job_id: JobId) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(&job_id);
        Ok(())
    }

    async fn due_jobs(&self, now: Timestamp) -> Result<Vec<IntegrationJob>> {
        let jobs = self.jobs.read().await;
        let mut due: Vec<_> = jobs.values().filter(|j| j.is_due(now)).cloned().collect();
        due.sort_by_key(|j| (j.scheduled_for, j.id));
        Ok(due)
    }
}
