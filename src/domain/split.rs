//! Division of a donation among the institute, an optional ambassador and the
//! platform maintenance wallet.

use crate::domain::money::Amount;
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Smallest donation accepted by the gateway flow (R$ 5,00).
pub const DEFAULT_MINIMUM_AMOUNT: Amount = Amount::from_cents(500);

/// Percentage policy applied to every donation or subscription charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitPolicy {
    /// Requests below this amount are rejected.
    pub minimum_amount: Amount,
    pub institute_share_ratio: Decimal,
    /// Only applied when the donation is attributed to an ambassador.
    pub ambassador_share_ratio: Decimal,
    /// Platform share when there is no ambassador.
    pub platform_share_ratio: Decimal,
    /// Platform share when an ambassador takes their commission.
    pub platform_share_ratio_with_ambassador: Decimal,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            minimum_amount: DEFAULT_MINIMUM_AMOUNT,
            institute_share_ratio: dec!(0.70),
            ambassador_share_ratio: dec!(0.20),
            platform_share_ratio: dec!(0.30),
            platform_share_ratio_with_ambassador: dec!(0.10),
        }
    }
}

impl SplitPolicy {
    /// Checks that both active ratio sets sum to exactly one.
    pub fn validate(&self) -> Result<()> {
        let ratios = [
            self.institute_share_ratio,
            self.ambassador_share_ratio,
            self.platform_share_ratio,
            self.platform_share_ratio_with_ambassador,
        ];
        if ratios.iter().any(|r| *r < Decimal::ZERO || *r > Decimal::ONE) {
            return Err(EngineError::ValidationError(
                "Split ratios must be between 0 and 1".to_string(),
            ));
        }

        let (institute, ambassador, platform) = self.ratios(true);
        if institute + ambassador + platform != Decimal::ONE {
            return Err(EngineError::ValidationError(
                "Split ratios with ambassador must sum to 1".to_string(),
            ));
        }
        let (institute, ambassador, platform) = self.ratios(false);
        if institute + ambassador + platform != Decimal::ONE {
            return Err(EngineError::ValidationError(
                "Split ratios without ambassador must sum to 1".to_string(),
            ));
        }
        Ok(())
    }

    fn ratios(&self, has_ambassador: bool) -> (Decimal, Decimal, Decimal) {
        if has_ambassador {
            (
                self.institute_share_ratio,
                self.ambassador_share_ratio,
                self.platform_share_ratio_with_ambassador,
            )
        } else {
            (
                self.institute_share_ratio,
                Decimal::ZERO,
                self.platform_share_ratio,
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResult {
    pub institute_share: Amount,
    pub ambassador_share: Amount,
    pub platform_share: Amount,
}

impl SplitResult {
    pub fn total(&self) -> Amount {
        self.institute_share + self.ambassador_share + self.platform_share
    }
}

/// Computes the per-party shares of `total`.
///
/// Every share is truncated to whole cents and the cents lost to truncation
/// are credited to the institute, so the shares always add up to `total`.
pub fn compute_split(
    total: Amount,
    has_ambassador: bool,
    policy: &SplitPolicy,
) -> Result<SplitResult> {
    if total < policy.minimum_amount {
        return Err(EngineError::ValidationError(format!(
            "Amount below minimum: {} < {}",
            total, policy.minimum_amount
        )));
    }

    let (institute_ratio, ambassador_ratio, platform_ratio) = policy.ratios(has_ambassador);
    let overflow = || EngineError::ValidationError("Split amount out of range".to_string());

    let institute = total.scale_truncated(institute_ratio).ok_or_else(overflow)?;
    let ambassador = total.scale_truncated(ambassador_ratio).ok_or_else(overflow)?;
    let platform = total.scale_truncated(platform_ratio).ok_or_else(overflow)?;

    let exceeded = || EngineError::ValidationError("Split ratios exceed 100%".to_string());
    let remainder = institute
        .checked_add(ambassador)
        .and_then(|sum| sum.checked_add(platform))
        .and_then(|sum| total.checked_sub(sum))
        .ok_or_else(exceeded)?;

    Ok(SplitResult {
        institute_share: institute + remainder,
        ambassador_share: ambassador,
        platform_share: platform,
    })
}
