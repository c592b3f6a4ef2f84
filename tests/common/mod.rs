#![allow(dead_code)]

use async_trait::async_trait;
use donation_engine::domain::integration::{
    InstitutoUserData, IntegrationError, IntegrationErrorType, ORIGEM_CADASTRO, Timestamp,
};
use donation_engine::domain::payment::{
    Customer, CustomerPayload, PaymentPayload, PaymentResponse, SubscriptionPayload,
};
use donation_engine::domain::ports::{Clock, PartnerClient, PaymentGateway};
use donation_engine::error::{EngineError, Result};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const AMBASSADOR_WALLET: &str = "0b7a1c2e-3d4f-4a5b-8c6d-7e8f9a0b1c2d";
pub const PLATFORM_WALLET: &str = "f9c7d1dd-9e52-4e81-8194-8b666f276405";

pub fn user() -> InstitutoUserData {
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

pub fn server_error() -> IntegrationError {
    IntegrationError::new(IntegrationErrorType::ServerError, "HTTP 502").with_status(502)
}

#[derive(Clone, Default)]
pub struct ManualClock(pub Arc<AtomicU64>);

impl ManualClock {
    pub fn at(now: Timestamp) -> Self {
        Self(Arc::new(AtomicU64::new(now)))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

/// Partner double: replays a script of results (then succeeds), optionally
/// after a delay, and counts deliveries.
#[derive(Clone, Default)]
pub struct ScriptedPartner {
    script: Arc<Mutex<VecDeque<std::result::Result<Value, IntegrationError>>>>,
    pub calls: Arc<AtomicUsize>,
    latency: Duration,
}

impl ScriptedPartner {
    pub fn new(script: Vec<std::result::Result<Value, IntegrationError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PartnerClient for ScriptedPartner {
    async fn deliver(
        &self,
        _payload: &InstitutoUserData,
    ) -> std::result::Result<Value, IntegrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(json!({"status": "created"})))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Customer(CustomerPayload),
    Payment(PaymentPayload),
    Subscription(SubscriptionPayload),
}

/// Gateway double that records every request.
#[derive(Clone, Default)]
pub struct RecordingGateway {
    pub calls: Arc<Mutex<Vec<GatewayCall>>>,
    pub fail_payments: bool,
}

impl RecordingGateway {
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_customer(&self, customer: &CustomerPayload) -> Result<Customer> {
        self.calls
            .lock()
            .unwrap()
            .push(GatewayCall::Customer(customer.clone()));
        Ok(Customer {
            id: "cus_000001".to_string(),
        })
    }

    async fn create_payment(&self, payment: &PaymentPayload) -> Result<PaymentResponse> {
        if self.fail_payments {
            return Err(EngineError::gateway("/payments: HTTP 400 - invalid split", Some(400)));
        }
        self.calls
            .lock()
            .unwrap()
            .push(GatewayCall::Payment(payment.clone()));
        Ok(PaymentResponse {
            id: "pay_000001".to_string(),
            status: Some("PENDING".to_string()),
            invoice_url: Some("https://checkout.example/pay_000001".to_string()),
            ..PaymentResponse::default()
        })
    }

    async fn create_subscription(&self, subscription: &SubscriptionPayload) -> Result<PaymentResponse> {
        self.calls
            .lock()
            .unwrap()
            .push(GatewayCall::Subscription(subscription.clone()));
        Ok(PaymentResponse {
            id: "sub_000001".to_string(),
            ..PaymentResponse::default()
        })
    }
}
