use crate::application::retry_engine::IntegrationRetryEngine;
use crate::config::WalletConfig;
use crate::domain::integration::{IntegrationResult, Timestamp};
use crate::domain::payment::{
    CustomerPayload, DonationKind, DonationRequest, PaymentPayload, PaymentResponse,
    SubscriptionPayload, split_entries,
};
use crate::domain::ports::{AmbassadorDirectoryBox, Clock, PaymentGatewayBox, SystemClock};
use crate::domain::split::{SplitPolicy, SplitResult, compute_split};
use crate::domain::validation::mask_email;
use crate::domain::wallet::{WalletId, validate_wallet_id};
use crate::error::{EngineError, Result};
use chrono::{TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonationReceipt {
    pub payment: PaymentResponse,
    pub split: SplitResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambassador_wallet: Option<WalletId>,
    /// Outcome of forwarding the attached registration, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<IntegrationResult>,
}

/// Turns a donation request into a gateway charge carrying the split.
pub struct DonationService {
    gateway: PaymentGatewayBox,
    directory: AmbassadorDirectoryBox,
    policy: SplitPolicy,
    wallets: WalletConfig,
    registrations: Option<Arc<IntegrationRetryEngine>>,
    clock: Box<dyn Clock>,
}

impl DonationService {
    /// Fails if the policy ratios are inconsistent or the platform wallet is
    /// malformed, so no charge is ever built from a bad configuration.
    pub fn new(
        gateway: PaymentGatewayBox,
        directory: AmbassadorDirectoryBox,
        policy: SplitPolicy,
        wallets: WalletConfig,
    ) -> Result<Self> {
        policy.validate()?;
        validate_wallet_id(&wallets.platform, &[])?;
        Ok(Self {
            gateway,
            directory,
            policy,
            wallets,
            registrations: None,
            clock: Box::new(SystemClock),
        })
    }

    /// Forwards attached registrations through `engine` after the charge.
    pub fn with_registrations(mut self, engine: Arc<IntegrationRetryEngine>) -> Self {
        self.registrations = Some(engine);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn process(&self, request: &DonationRequest) -> Result<DonationReceipt> {
        let ambassador_wallet = match &request.ambassador_code {
            Some(code) => self.resolve_ambassador(code).await?,
            None => None,
        };
        let split = compute_split(request.amount, ambassador_wallet.is_some(), &self.policy)?;
        let entries = split_entries(&split, ambassador_wallet.as_ref(), &self.wallets.platform);

        let customer = self
            .gateway
            .create_customer(&CustomerPayload::from(&request.donor))
            .await?;

        let now = self.clock.now();
        let today = civil_date(now)?;
        let payment = match request.kind {
            DonationKind::Donation => {
                let payload =
                    PaymentPayload::new(&customer, request, today, format!("DONATION_{now}"), entries);
                self.gateway.create_payment(&payload).await?
            }
            DonationKind::Subscription(cycle) => {
                let payload = SubscriptionPayload::new(
                    &customer,
                    request,
                    cycle,
                    today,
                    format!("SUBSCRIPTION_{now}"),
                    entries,
                );
                self.gateway.create_subscription(&payload).await?
            }
        };

        info!(
            payment_id = %payment.id,
            amount = %request.amount,
            institute = %split.institute_share,
            ambassador = %split.ambassador_share,
            platform = %split.platform_share,
            donor = %mask_email(&request.donor.email),
            "Donation charge created"
        );

        let registration = match (&request.registration, &self.registrations) {
            (Some(data), Some(engine)) => match engine.submit(&customer.id, data).await {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!(payment_id = %payment.id, error = %e, "Registration could not be queued");
                    None
                }
            },
            _ => None,
        };

        Ok(DonationReceipt {
            payment,
            split,
            ambassador_wallet,
            registration,
        })
    }

    /// Unknown codes and unusable wallets fall back to no ambassador.
    async fn resolve_ambassador(&self, code: &str) -> Result<Option<WalletId>> {
        let Some(wallet) = self.directory.wallet_for(code).await? else {
            warn!(ambassador_code = code, "Unknown ambassador code, split without ambassador");
            return Ok(None);
        };
        match validate_wallet_id(&wallet, &self.wallets.reserved_wallets()) {
            Ok(()) => Ok(Some(wallet)),
            Err(EngineError::ValidationError(reason)) => {
                warn!(ambassador_code = code, reason = %reason, "Ambassador wallet rejected");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// `YYYY-MM-DD` (UTC) for a Unix millisecond timestamp.
fn civil_date(ts: Timestamp) -> Result<String> {
    let out_of_range = || EngineError::internal(format!("timestamp {ts} out of range"));
    let millis = i64::try_from(ts).map_err(|_| out_of_range())?;
    let date = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(out_of_range)?;
    Ok(date.format("%Y-%m-%d").to_string())
}
