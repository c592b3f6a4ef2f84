//! Entities owned by the integration retry engine.
//!
//! An [`IntegrationLog`] is the audit record of one registration's delivery and
//! lives forever; an [`IntegrationJob`] is the schedule entry that drives the
//! next attempt and is removed once the log reaches a terminal status.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Unix timestamp in milliseconds.
pub type Timestamp = u64;
pub type LogId = u64;
pub type JobId = u64;

/// Source tag the partner expects on every registration.
pub const ORIGEM_CADASTRO: &str = "visao_itinerante";

/// Registration payload forwarded to the partner API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutoUserData {
    pub nome: String,
    pub email: String,
    pub telefone: String,
    pub cpf: String,
    pub origem_cadastro: String,
    pub consentimento_data_sharing: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Pending,
    Success,
    Failed,
    Retry,
}

impl IntegrationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Retry => "retry",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationLog {
    pub id: LogId,
    pub user_id: String,
    pub status: IntegrationStatus,
    pub payload: InstitutoUserData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub attempt_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl IntegrationLog {
    pub fn new(id: LogId, user_id: String, payload: InstitutoUserData, now: Timestamp) -> Self {
        Self {
            id,
            user_id,
            status: IntegrationStatus::Pending,
            payload,
            response: None,
            error_message: None,
            attempt_count: 0,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_success(&mut self, response: Value, now: Timestamp) {
        self.status = IntegrationStatus::Success;
        self.response = Some(response);
        self.error_message = None;
        self.next_retry_at = None;
        self.updated_at = now;
    }

    pub fn mark_retry(&mut self, error: &IntegrationError, next_retry_at: Timestamp, now: Timestamp) {
        self.status = IntegrationStatus::Retry;
        self.error_message = Some(error.message.clone());
        self.next_retry_at = Some(next_retry_at);
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, message: String, now: Timestamp) {
        self.status = IntegrationStatus::Failed;
        self.error_message = Some(message);
        self.next_retry_at = None;
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationJob {
    pub id: JobId,
    pub log_id: LogId,
    pub user_id: String,
    pub user_data: InstitutoUserData,
    pub scheduled_for: Timestamp,
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(default)]
    pub cancelled: bool,
}

impl IntegrationJob {
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.cancelled || self.scheduled_for <= now
    }

    pub fn has_budget(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Caller-facing outcome of [`submit`](crate::application::retry_engine::IntegrationRetryEngine::submit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<IntegrationErrorType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<LogId>,
}

impl IntegrationResult {
    pub fn delivered(data: Value, log_id: LogId) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_type: None,
            log_id: Some(log_id),
        }
    }

    pub fn failed(error: &IntegrationError, log_id: Option<LogId>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.message.clone()),
            error_type: Some(error.kind),
            log_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationErrorType {
    NetworkError,
    AuthError,
    ValidationError,
    RateLimit,
    ServerError,
    ConfigError,
    ConsentError,
}

impl IntegrationErrorType {
    /// Transient kinds are worth another attempt; the rest fail the job.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::ServerError | Self::RateLimit
        )
    }

    /// Maps a non-success HTTP status from the partner API.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::AuthError,
            400 | 422 => Self::ValidationError,
            429 => Self::RateLimit,
            s if s >= 500 => Self::ServerError,
            _ => Self::NetworkError,
        }
    }
}

impl fmt::Display for IntegrationErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::AuthError => "AUTH_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RateLimit => "RATE_LIMIT",
            Self::ServerError => "SERVER_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::ConsentError => "CONSENT_ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct IntegrationError {
    pub kind: IntegrationErrorType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Defaults to the kind's retryability; HTTP failures narrow it by status.
    #[serde(default)]
    pub retryable: bool,
}

impl IntegrationError {
    pub fn new(kind: IntegrationErrorType, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            retryable: kind.is_retryable(),
        }
    }

    /// A non-success partner response. Only 5xx and 429 are retried,
    /// whatever kind the status classifies as.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            retryable: status_code >= 500 || status_code == 429,
            ..Self::new(IntegrationErrorType::from_status(status_code), message)
        }
        .with_status(status_code)
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(IntegrationErrorType::NetworkError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(IntegrationErrorType::ValidationError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(IntegrationErrorType::ConfigError, message)
    }
}

/// Aggregate counters over the integration log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub total_attempts: u64,
    pub successful_sends: u64,
    pub failed_sends: u64,
    pub pending_retries: u64,
    /// Percentage of terminal logs that ended in success.
    pub success_rate: f64,
}

impl IntegrationStats {
    pub fn from_logs<'a>(logs: impl IntoIterator<Item = &'a IntegrationLog>) -> Self {
        let mut stats = Self::default();
        for log in logs {
            stats.total_attempts += u64::from(log.attempt_count);
            match log.status {
                IntegrationStatus::Success => stats.successful_sends += 1,
                IntegrationStatus::Failed => stats.failed_sends += 1,
                IntegrationStatus::Retry | IntegrationStatus::Pending => {
                    stats.pending_retries += 1
                }
            }
        }
        let finished = stats.successful_sends + stats.failed_sends;
        if finished > 0 {
            stats.success_rate = stats.successful_sends as f64 * 100.0 / finished as f64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> InstitutoUserData {
        InstitutoUserData {
            nome: "Maria Silva".to_string(),
            email: "maria@example.com".to_string(),
            telefone: "11987654321".to_string(),
            cpf: "52998224725".to_string(),
            origem_cadastro: ORIGEM_CADASTRO.to_string(),
            consentimento_data_sharing: true,
            created_at: "2026-01-10T12:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_error_classification_from_status() {
        assert_eq!(IntegrationErrorType::from_status(401), IntegrationErrorType::AuthError);
        assert_eq!(IntegrationErrorType::from_status(403), IntegrationErrorType::AuthError);
        assert_eq!(IntegrationErrorType::from_status(422), IntegrationErrorType::ValidationError);
        assert_eq!(IntegrationErrorType::from_status(429), IntegrationErrorType::RateLimit);
        assert_eq!(IntegrationErrorType::from_status(503), IntegrationErrorType::ServerError);
        assert_eq!(IntegrationErrorType::from_status(404), IntegrationErrorType::NetworkError);
    }

    #[test]
    fn test_status_errors_retry_only_5xx_and_429() {
        for status in [500, 502, 503, 429] {
            assert!(IntegrationError::from_status(status, "x").is_retryable(), "{status}");
        }
        for status in [301, 400, 401, 404, 405, 409, 422] {
            let err = IntegrationError::from_status(status, "x");
            assert!(!err.is_retryable(), "{status}");
            assert_eq!(err.status_code, Some(status));
        }
        // unlisted statuses keep the network kind without being retried
        let err = IntegrationError::from_status(404, "HTTP 404");
        assert_eq!(err.kind, IntegrationErrorType::NetworkError);
        assert!(IntegrationError::network("timeout").is_retryable());
    }

    #[test]
    fn test_retryable_kinds() {
        use IntegrationErrorType::*;
        for kind in [NetworkError, ServerError, RateLimit] {
            assert!(kind.is_retryable(), "{kind} should be retryable");
        }
        for kind in [AuthError, ValidationError, ConfigError, ConsentError] {
            assert!(!kind.is_retryable(), "{kind} should not be retryable");
        }
    }

    #[test]
    fn test_error_type_wire_names() {
        let json = serde_json::to_string(&IntegrationErrorType::RateLimit).unwrap();
        assert_eq!(json, "\"RATE_LIMIT\"");
        let status = serde_json::to_string(&IntegrationStatus::Retry).unwrap();
        assert_eq!(status, "\"retry\"");
    }

    #[test]
    fn test_stats_from_logs() {
        let mut ok = IntegrationLog::new(1, "u1".into(), payload(), 0);
        ok.attempt_count = 2;
        ok.mark_success(Value::Null, 1);
        let mut failed = IntegrationLog::new(2, "u2".into(), payload(), 0);
        failed.attempt_count = 3;
        failed.mark_failed("boom".into(), 1);
        let mut retry = IntegrationLog::new(3, "u3".into(), payload(), 0);
        retry.attempt_count = 1;
        retry.status = IntegrationStatus::Retry;

        let stats = IntegrationStats::from_logs([&ok, &failed, &retry]);
        assert_eq!(stats.total_attempts, 6);
        assert_eq!(stats.successful_sends, 1);
        assert_eq!(stats.failed_sends, 1);
        assert_eq!(stats.pending_retries, 1);
        assert_eq!(stats.success_rate, 50.0);
    }

    #[test]
    fn test_cancelled_job_is_due() {
        let mut job = IntegrationJob {
            id: 1,
            log_id: 1,
            user_id: "u1".into(),
            user_data: payload(),
            scheduled_for: 1_000,
            attempts: 1,
            max_attempts: 3,
            cancelled: false,
        };
        assert!(!job.is_due(999));
        assert!(job.is_due(1_000));
        job.cancelled = true;
        assert!(job.is_due(0));
    }
}
