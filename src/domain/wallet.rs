use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a gateway wallet that can receive a split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(String);

impl WalletId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gateway wallets are always written in 8-4-4-4-12 hyphenated form.
fn parse_hyphenated(id: &str) -> Option<Uuid> {
    if id.len() != uuid::fmt::Hyphenated::LENGTH {
        return None;
    }
    Uuid::try_parse(id).ok()
}

/// Validates a wallet supplied by an ambassador.
///
/// Reserved wallets (the institute's and the platform's own) can never be
/// registered as an ambassador wallet.
pub fn validate_wallet_id(id: &WalletId, reserved: &[WalletId]) -> Result<()> {
    let Some(wallet) = parse_hyphenated(id.as_str()) else {
        return Err(EngineError::ValidationError(format!(
            "Invalid wallet format: {id}"
        )));
    };
    if reserved
        .iter()
        .any(|r| parse_hyphenated(r.as_str()) == Some(wallet))
    {
        return Err(EngineError::ValidationError(format!(
            "Wallet {id} is reserved"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLATFORM: &str = "f9c7d1dd-9e52-4e81-8194-8b666f276405";

    #[test]
    fn test_valid_wallet() {
        let id = WalletId::new("0b7a1c2e-3d4f-4a5b-8c6d-7e8f9a0b1c2d");
        assert!(validate_wallet_id(&id, &[WalletId::new(PLATFORM)]).is_ok());
    }

    #[test]
    fn test_malformed_wallet() {
        for bad in [
            "",
            "not-a-wallet",
            "f9c7d1dd9e524e8181948b666f276405",
            "g9c7d1dd-9e52-4e81-8194-8b666f276405",
            "{f9c7d1dd-9e52-4e81-8194-8b666f276405}",
            "urn:uuid:f9c7d1dd-9e52-4e81-8194-8b666f276405",
        ] {
            assert!(matches!(
                validate_wallet_id(&WalletId::new(bad), &[]),
                Err(EngineError::ValidationError(_))
            ));
        }
    }

    #[test]
    fn test_reserved_wallet_case_insensitive() {
        let id = WalletId::new(PLATFORM.to_uppercase());
        assert!(matches!(
            validate_wallet_id(&id, &[WalletId::new(PLATFORM)]),
            Err(EngineError::ValidationError(_))
        ));
    }
}
