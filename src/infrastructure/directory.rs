use crate::domain::ports::AmbassadorDirectory;
use crate::domain::wallet::WalletId;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Ambassador lookup backed by the `[ambassadors]` config table.
///
/// Codes are matched case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct StaticAmbassadorDirectory {
    wallets: HashMap<String, WalletId>,
}

impl StaticAmbassadorDirectory {
    pub fn new(wallets: HashMap<String, WalletId>) -> Self {
        Self {
            wallets: wallets
                .into_iter()
                .map(|(code, wallet)| (code.trim().to_ascii_uppercase(), wallet))
                .collect(),
        }
    }
}

#[async_trait]
impl AmbassadorDirectory for StaticAmbassadorDirectory {
    async fn wallet_for(&self, ambassador_code: &str) -> Result<Option<WalletId>> {
        Ok(self
            .wallets
            .get(&ambassador_code.trim().to_ascii_uppercase())
            .cloned())
    }
}
