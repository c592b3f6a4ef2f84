use super::integration::{
    InstitutoUserData, IntegrationError, IntegrationJob, IntegrationLog, JobId, LogId, Timestamp,
};
use super::payment::{Customer, CustomerPayload, PaymentPayload, PaymentResponse, SubscriptionPayload};
use super::wallet::WalletId;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Persistence of integration logs and their retry schedule.
///
/// Writes to one log or job are serialized by the engine's per-job guard, so
/// implementations only need per-key atomicity.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// Allocates a fresh identifier for a log or a job.
    async fn next_id(&self) -> Result<u64>;
    async fn store_log(&self, log: IntegrationLog) -> Result<()>;
    async fn get_log(&self, log_id: LogId) -> Result<Option<IntegrationLog>>;
    async fn all_logs(&self) -> Result<Vec<IntegrationLog>>;
    async fn store_job(&self, job: IntegrationJob) -> Result<()>;
    async fn get_job(&self, job_id: JobId) -> Result<Option<IntegrationJob>>;
    async fn remove_job(&self, job_id: JobId) -> Result<()>;
    /// Jobs scheduled at or before `now`, plus cancelled ones, oldest first.
    async fn due_jobs(&self, now: Timestamp) -> Result<Vec<IntegrationJob>>;
}

/// The partner registration API.
#[async_trait]
pub trait PartnerClient: Send + Sync {
    /// Configuration check run before anything is logged for a submission.
    fn check_ready(&self) -> std::result::Result<(), IntegrationError> {
        Ok(())
    }

    async fn deliver(&self, payload: &InstitutoUserData) -> std::result::Result<Value, IntegrationError>;
}

/// The hosted payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_customer(&self, customer: &CustomerPayload) -> Result<Customer>;
    async fn create_payment(&self, payment: &PaymentPayload) -> Result<PaymentResponse>;
    async fn create_subscription(&self, subscription: &SubscriptionPayload) -> Result<PaymentResponse>;
}

/// Resolves ambassador referral codes to their payout wallets.
#[async_trait]
pub trait AmbassadorDirectory: Send + Sync {
    async fn wallet_for(&self, ambassador_code: &str) -> Result<Option<WalletId>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

pub type IntegrationStoreBox = Box<dyn IntegrationStore>;
pub type PartnerClientBox = Box<dyn PartnerClient>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
pub type AmbassadorDirectoryBox = Box<dyn AmbassadorDirectory>;
