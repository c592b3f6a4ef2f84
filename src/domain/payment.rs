//! Request and response shapes of the hosted payment gateway.

use crate::domain::integration::InstitutoUserData;
use crate::domain::money::Amount;
use crate::domain::split::SplitResult;
use crate::domain::wallet::WalletId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingType {
    Boleto,
    CreditCard,
    Pix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cycle {
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "cycle")]
pub enum DonationKind {
    /// Single charge.
    Donation,
    /// Recurring charge.
    Subscription(Cycle),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donor {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// CPF or CNPJ.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationRequest {
    pub amount: Amount,
    pub kind: DonationKind,
    pub billing_type: BillingType,
    pub donor: Donor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambassador_code: Option<String>,
    /// Registration to forward to the partner once the charge is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<InstitutoUserData>,
}

/// One recipient of a split. The institute is paid implicitly through the
/// account that owns the API key, so it never appears here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitEntry {
    pub wallet_id: WalletId,
    #[serde(with = "rust_decimal::serde::float")]
    pub fixed_value: Decimal,
}

/// Maps a computed split onto the gateway's `split` array.
///
/// Zero shares are omitted. The ambassador share is only routed when a
/// wallet is known for the ambassador.
pub fn split_entries(
    split: &SplitResult,
    ambassador_wallet: Option<&WalletId>,
    platform_wallet: &WalletId,
) -> Vec<SplitEntry> {
    let mut entries = Vec::with_capacity(2);
    if let Some(wallet) = ambassador_wallet
        && split.ambassador_share > Amount::ZERO
    {
        entries.push(SplitEntry {
            wallet_id: wallet.clone(),
            fixed_value: split.ambassador_share.to_reais(),
        });
    }
    if split.platform_share > Amount::ZERO {
        entries.push(SplitEntry {
            wallet_id: platform_wallet.clone(),
            fixed_value: split.platform_share.to_reais(),
        });
    }
    entries
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf_cnpj: Option<String>,
}

impl From<&Donor> for CustomerPayload {
    fn from(donor: &Donor) -> Self {
        Self {
            name: donor.name.clone(),
            email: donor.email.clone(),
            phone: donor.phone.clone(),
            cpf_cnpj: donor.document.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub customer: String,
    pub billing_type: BillingType,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    /// `YYYY-MM-DD`.
    pub due_date: String,
    pub description: String,
    pub external_reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<Vec<SplitEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPayload {
    pub customer: String,
    pub billing_type: BillingType,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub cycle: Cycle,
    pub next_due_date: String,
    pub description: String,
    pub external_reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<Vec<SplitEntry>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub invoice_url: Option<String>,
    #[serde(default, rename = "pixQrCodeBase64")]
    pub pix_qr_code: Option<String>,
    #[serde(default)]
    pub bank_slip_url: Option<String>,
}

fn non_empty(entries: Vec<SplitEntry>) -> Option<Vec<SplitEntry>> {
    (!entries.is_empty()).then_some(entries)
}

impl PaymentPayload {
    pub fn new(
        customer: &Customer,
        request: &DonationRequest,
        due_date: String,
        external_reference: String,
        split: Vec<SplitEntry>,
    ) -> Self {
        Self {
            customer: customer.id.clone(),
            billing_type: request.billing_type,
            value: request.amount.to_reais(),
            due_date,
            description: "Doação - Instituto Coração Valente".to_string(),
            external_reference,
            split: non_empty(split),
        }
    }
}

impl SubscriptionPayload {
    pub fn new(
        customer: &Customer,
        request: &DonationRequest,
        cycle: Cycle,
        next_due_date: String,
        external_reference: String,
        split: Vec<SplitEntry>,
    ) -> Self {
        let period = match cycle {
            Cycle::Monthly => "Mensal",
            Cycle::Yearly => "Anual",
        };
        Self {
            customer: customer.id.clone(),
            billing_type: request.billing_type,
            value: request.amount.to_reais(),
            cycle,
            next_due_date,
            description: format!("Apoio {period} - Instituto Coração Valente"),
            external_reference,
            split: non_empty(split),
        }
    }
}
