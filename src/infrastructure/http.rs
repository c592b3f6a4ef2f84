//! HTTP adapters for the partner registration API and the payment gateway.

use crate::config::{GatewayConfig, HttpMethod, PartnerAuth, PartnerConfig};
use crate::domain::integration::{InstitutoUserData, IntegrationError, IntegrationErrorType};
use crate::domain::payment::{
    Customer, CustomerPayload, PaymentPayload, PaymentResponse, SubscriptionPayload,
};
use crate::domain::ports::{PartnerClient, PaymentGateway};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EngineError::Config(format!("HTTP client: {e}")))
}

/// Sends registrations to the partner API configured in `[partner]`.
pub struct HttpPartnerClient {
    client: reqwest::Client,
    config: PartnerConfig,
}

impl HttpPartnerClient {
    pub fn new(config: PartnerConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
        })
    }

    fn authorization(&self) -> std::result::Result<Option<HeaderValue>, IntegrationError> {
        let raw = match &self.config.auth {
            PartnerAuth::ApiKey { .. } => return Ok(None),
            PartnerAuth::Bearer { bearer_token } => format!("Bearer {bearer_token}"),
            PartnerAuth::Basic {
                basic_username,
                basic_password,
            } => format!(
                "Basic {}",
                STANDARD.encode(format!("{basic_username}:{basic_password}"))
            ),
        };
        HeaderValue::from_str(&raw)
            .map(Some)
            .map_err(|e| IntegrationError::config(format!("invalid auth header: {e}")))
    }
}

/// Maps a transport failure (no HTTP status) onto the error taxonomy.
fn transport_error(e: reqwest::Error) -> IntegrationError {
    if e.is_timeout() {
        IntegrationError::network("Timeout connecting to the partner API")
    } else if e.is_connect() {
        IntegrationError::network("Connection to the partner API failed")
    } else if e.is_builder() {
        IntegrationError::config(format!("Invalid partner request: {e}"))
    } else {
        IntegrationError::new(
            IntegrationErrorType::ServerError,
            format!("Unexpected error: {e}"),
        )
    }
}

/// Error message carried in a non-success body, falling back to the status.
fn body_message(body: &Value, status: u16) -> String {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

#[async_trait]
impl PartnerClient for HttpPartnerClient {
    fn check_ready(&self) -> std::result::Result<(), IntegrationError> {
        self.config.validate()
    }

    #[instrument(skip_all)]
    async fn deliver(
        &self,
        payload: &InstitutoUserData,
    ) -> std::result::Result<Value, IntegrationError> {
        let endpoint = self.config.effective_endpoint();
        let mut request = match self.config.method {
            HttpMethod::Post => self.client.post(endpoint),
            HttpMethod::Put => self.client.put(endpoint),
        };
        if let PartnerAuth::ApiKey { api_key } = &self.config.auth {
            request = request.header("X-API-Key", api_key);
        }
        if let Some(value) = self.authorization()? {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request.json(payload).send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .unwrap_or_else(|_| Value::Object(Default::default()));

        if !status.is_success() {
            let code = status.as_u16();
            return Err(IntegrationError::from_status(code, body_message(&body, code)));
        }
        debug!(status = status.as_u16(), "Partner API accepted registration");
        Ok(body)
    }
}

/// Client for the hosted payment gateway REST API.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(serde::Deserialize)]
struct Created {
    id: String,
}

#[derive(serde::Deserialize)]
struct PaymentList {
    #[serde(default)]
    data: Vec<PaymentResponse>,
}

impl HttpPaymentGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(EngineError::Config("gateway api_key is not set".to_string()));
        }
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read<R: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<R> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::gateway(
                format!("{path}: HTTP {} - {text}", status.as_u16()),
                Some(status.as_u16()),
            ));
        }
        response
            .json::<R>()
            .await
            .map_err(|e| EngineError::gateway(format!("{path}: invalid response: {e}"), None))
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let response = self
            .client
            .post(self.url(path))
            .header("access_token", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::gateway(format!("{path}: {e}"), None))?;
        Self::read(path, response).await
    }

    async fn first_subscription_charge(&self, subscription_id: &str) -> Result<Option<PaymentResponse>> {
        let response = self
            .client
            .get(self.url("/payments"))
            .query(&[("subscription", subscription_id)])
            .header("access_token", &self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::gateway(format!("/payments: {e}"), None))?;
        let list: PaymentList = Self::read("/payments", response).await?;
        Ok(list.data.into_iter().next())
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip_all)]
    async fn create_customer(&self, customer: &CustomerPayload) -> Result<Customer> {
        self.post("/customers", customer).await
    }

    #[instrument(skip_all, fields(value = %payment.value))]
    async fn create_payment(&self, payment: &PaymentPayload) -> Result<PaymentResponse> {
        self.post("/payments", payment).await
    }

    /// Creates the subscription, then looks up its first charge so the
    /// receipt carries checkout links.
    #[instrument(skip_all, fields(value = %subscription.value))]
    async fn create_subscription(&self, subscription: &SubscriptionPayload) -> Result<PaymentResponse> {
        let created: Created = self.post("/subscriptions", subscription).await?;
        match self.first_subscription_charge(&created.id).await {
            Ok(Some(charge)) => Ok(PaymentResponse {
                id: created.id,
                ..charge
            }),
            Ok(None) => Ok(PaymentResponse {
                id: created.id,
                ..PaymentResponse::default()
            }),
            Err(e) => {
                warn!(subscription_id = %created.id, error = %e, "First charge lookup failed");
                Ok(PaymentResponse {
                    id: created.id,
                    ..PaymentResponse::default()
                })
            }
        }
    }
}
