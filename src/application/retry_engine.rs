use crate::domain::integration::{
    InstitutoUserData, IntegrationError, IntegrationJob, IntegrationLog, IntegrationResult,
    IntegrationStats, IntegrationStatus, JobId, LogId, Timestamp,
};
use crate::domain::ports::{Clock, IntegrationStoreBox, PartnerClientBox, SystemClock};
use crate::domain::retry::RetryConfig;
use crate::domain::validation::{mask_email, sanitize_user_data};
use crate::error::{EngineError, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

const CANCELLED: &str = "cancelled";
/// How far a job is pushed back after a store error interrupted its attempt.
const STORE_FAILURE_BACKOFF_MS: u64 = 60_000;

/// What a single attempt did to a job.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    pub job_id: JobId,
    pub log_id: LogId,
    pub status: IntegrationStatus,
    pub attempt_count: u32,
    pub response: Option<Value>,
    pub error: Option<IntegrationError>,
}

/// Delivers registrations to the partner API and keeps retrying transient
/// failures on a backoff schedule.
///
/// The engine owns no timer. Callers drive it by invoking
/// [`process_retries`](Self::process_retries) periodically; overlapping
/// sweeps are tolerated because every attempt runs under a per-job guard.
pub struct IntegrationRetryEngine {
    store: IntegrationStoreBox,
    partner: PartnerClientBox,
    retry: RetryConfig,
    clock: Box<dyn Clock>,
    in_flight: Mutex<HashSet<JobId>>,
    /// Cancellations that arrived while the job was in flight.
    cancel_requests: Mutex<HashSet<JobId>>,
}

/// Releases the job id from the in-flight set when dropped.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<JobId>>,
    job_id: JobId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}

impl IntegrationRetryEngine {
    pub fn new(store: IntegrationStoreBox, partner: PartnerClientBox, retry: RetryConfig) -> Self {
        Self {
            store,
            partner,
            retry,
            clock: Box::new(SystemClock),
            in_flight: Mutex::new(HashSet::new()),
            cancel_requests: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Logs a registration and attempts to deliver it right away.
    ///
    /// Delivery failures never surface as `Err`: they come back as an
    /// unsuccessful [`IntegrationResult`], with a retry scheduled when the
    /// failure is transient. `Err` is reserved for store failures.
    pub async fn submit(&self, user_id: &str, data: &InstitutoUserData) -> Result<IntegrationResult> {
        if let Err(e) = self
            .partner
            .check_ready()
            .and_then(|()| self.retry.validate())
        {
            warn!(user_id, error = %e, "Integration not configured, registration rejected");
            return Ok(IntegrationResult::failed(&e, None));
        }

        let sanitized = match sanitize_user_data(data) {
            Ok(sanitized) => sanitized,
            Err(e) => {
                warn!(
                    user_id,
                    email = %mask_email(&data.email),
                    error = %e,
                    "Registration rejected before delivery"
                );
                return Ok(IntegrationResult::failed(&e, None));
            }
        };

        let now = self.clock.now();
        let log_id = self.store.next_id().await?;
        let job_id = self.store.next_id().await?;

        // Claimed before the job becomes visible so a concurrent sweep skips it.
        let Some(_guard) = self.claim(job_id) else {
            return Err(EngineError::internal(format!("job {job_id} already in flight")));
        };

        let log = IntegrationLog::new(log_id, user_id.to_string(), sanitized.clone(), now);
        let job = IntegrationJob {
            id: job_id,
            log_id,
            user_id: user_id.to_string(),
            user_data: sanitized,
            scheduled_for: now,
            attempts: 0,
            max_attempts: self.retry.max_attempts,
            cancelled: false,
        };
        self.store.store_log(log.clone()).await?;
        self.store.store_job(job.clone()).await?;

        info!(
            user_id,
            log_id,
            job_id,
            email = %mask_email(&job.user_data.email),
            "Registration queued for delivery"
        );

        let outcome = self.attempt(job, log, now).await?;
        Ok(match (&outcome.response, &outcome.error) {
            (Some(response), _) => IntegrationResult::delivered(response.clone(), log_id),
            (None, Some(error)) => IntegrationResult::failed(error, Some(log_id)),
            (None, None) => {
                IntegrationResult::failed(&IntegrationError::config(CANCELLED), Some(log_id))
            }
        })
    }

    /// Attempts every job due at `now`.
    ///
    /// Each job is attempted at most once per call. Jobs held by another
    /// sweep are skipped, and a claimed job is re-read so one that was
    /// finished or rescheduled in the meantime is left alone. A store failure
    /// on one job pushes that job back and the sweep carries on; only failing
    /// to list the due jobs is returned as `Err`.
    pub async fn process_retries(&self, now: Timestamp) -> Result<Vec<RetryOutcome>> {
        let due = self.store.due_jobs(now).await?;
        debug!(now, due = due.len(), "Retry sweep started");

        let mut outcomes = Vec::with_capacity(due.len());
        for candidate in due {
            let Some(_guard) = self.claim(candidate.id) else {
                debug!(job_id = candidate.id, "Job in flight elsewhere, skipped");
                continue;
            };
            match self.retry_claimed(candidate.id, now).await {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {}
                Err(e) => {
                    warn!(job_id = candidate.id, error = %e, "Retry attempt aborted by store error");
                    self.push_back(candidate.id, now).await;
                }
            }
        }

        info!(now, attempted = outcomes.len(), "Retry sweep finished");
        Ok(outcomes)
    }

    /// Marks a job cancelled. The next attempt fails it without delivering.
    ///
    /// Returns `false` when no such job is scheduled.
    pub async fn cancel(&self, job_id: JobId) -> Result<bool> {
        match self.claim(job_id) {
            Some(_guard) => {
                let Some(mut job) = self.store.get_job(job_id).await? else {
                    return Ok(false);
                };
                job.cancelled = true;
                self.store.store_job(job).await?;
            }
            None => {
                // The running attempt applies it when it reschedules.
                self.cancel_requests
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(job_id);
            }
        }
        info!(job_id, "Job cancellation requested");
        Ok(true)
    }

    pub async fn stats(&self) -> Result<IntegrationStats> {
        let logs = self.store.all_logs().await?;
        Ok(IntegrationStats::from_logs(&logs))
    }

    pub async fn log(&self, log_id: LogId) -> Result<Option<IntegrationLog>> {
        self.store.get_log(log_id).await
    }

    fn claim(&self, job_id: JobId) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        in_flight.insert(job_id).then(|| InFlightGuard {
            in_flight: &self.in_flight,
            job_id,
        })
    }

    fn take_cancel_request(&self, job_id: JobId) -> bool {
        self.cancel_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id)
    }

    /// Re-reads a claimed job and attempts it if it is still due.
    async fn retry_claimed(&self, job_id: JobId, now: Timestamp) -> Result<Option<RetryOutcome>> {
        let Some(job) = self.store.get_job(job_id).await? else {
            return Ok(None);
        };
        if !job.is_due(now) {
            return Ok(None);
        }
        let Some(log) = self.store.get_log(job.log_id).await? else {
            warn!(job_id, log_id = job.log_id, "Job has no log, removed");
            self.store.remove_job(job_id).await?;
            self.take_cancel_request(job_id);
            return Ok(None);
        };
        self.attempt(job, log, now).await.map(Some)
    }

    /// Reschedules a job whose attempt hit a store error.
    async fn push_back(&self, job_id: JobId, now: Timestamp) {
        let pushed = async {
            if let Some(mut job) = self.store.get_job(job_id).await? {
                job.scheduled_for = now.saturating_add(STORE_FAILURE_BACKOFF_MS);
                self.store.store_job(job).await?;
            }
            Ok::<_, EngineError>(())
        };
        if let Err(e) = pushed.await {
            warn!(job_id, error = %e, "Job could not be rescheduled");
        }
    }

    /// One delivery attempt. The caller must hold the job's guard.
    async fn attempt(
        &self,
        mut job: IntegrationJob,
        mut log: IntegrationLog,
        now: Timestamp,
    ) -> Result<RetryOutcome> {
        if job.cancelled || self.take_cancel_request(job.id) {
            log.mark_failed(CANCELLED.to_string(), now);
            self.finish(&job, &log).await?;
            info!(job_id = job.id, log_id = log.id, "Cancelled job failed without delivery");
            return Ok(outcome(&job, &log, None));
        }

        job.attempts += 1;
        log.attempt_count = job.attempts;
        log.updated_at = now;
        self.store.store_job(job.clone()).await?;
        self.store.store_log(log.clone()).await?;

        match self.partner.deliver(&job.user_data).await {
            Ok(response) => {
                log.mark_success(response, now);
                self.finish(&job, &log).await?;
                info!(
                    job_id = job.id,
                    log_id = log.id,
                    attempt = job.attempts,
                    "Registration delivered"
                );
                Ok(outcome(&job, &log, None))
            }
            Err(error) if error.is_retryable() && job.has_budget() => {
                let next = self.retry.next_retry_at(now, job.attempts - 1);
                log.mark_retry(&error, next, now);
                job.scheduled_for = next;
                if self.take_cancel_request(job.id) {
                    job.cancelled = true;
                }
                self.store.store_job(job.clone()).await?;
                self.store.store_log(log.clone()).await?;
                warn!(
                    job_id = job.id,
                    log_id = log.id,
                    attempt = job.attempts,
                    next_retry_at = next,
                    error = %error,
                    "Delivery failed, retry scheduled"
                );
                Ok(outcome(&job, &log, Some(error)))
            }
            Err(error) => {
                log.mark_failed(error.message.clone(), now);
                self.finish(&job, &log).await?;
                warn!(
                    job_id = job.id,
                    log_id = log.id,
                    attempt = job.attempts,
                    error = %error,
                    "Delivery failed permanently"
                );
                Ok(outcome(&job, &log, Some(error)))
            }
        }
    }

    async fn finish(&self, job: &IntegrationJob, log: &IntegrationLog) -> Result<()> {
        self.store.store_log(log.clone()).await?;
        self.store.remove_job(job.id).await?;
        self.take_cancel_request(job.id);
        Ok(())
    }
}

fn outcome(job: &IntegrationJob, log: &IntegrationLog, error: Option<IntegrationError>) -> RetryOutcome {
    RetryOutcome {
        job_id: job.id,
        log_id: log.id,
        status: log.status,
        attempt_count: log.attempt_count,
        response: log.response.clone(),
        error,
    }
}
