use alloy::primitives::{utils::format_units, U256};
use tracing::debug;

use crate::{chain::FeeQuoter, error::Result, types::Account};

use super::transaction::TransactionManager;

impl TransactionManager {
    /// Native fee the bridge charges to relay `amount` to the account's own
    /// address on `destination_chain_id`. Read-only, so it is retried like
    /// any other read.
    pub async fn estimate_fee(
        &self,
        account: &Account,
        destination_chain_id: u16,
        amount: U256,
    ) -> Result<U256> {
        let bridge = self.config.contracts.bridge;
        let fee = self
            .with_retry("Fee estimation", || {
                self.chain
                    .estimate_send_fee(bridge, destination_chain_id, account.address(), amount)
            })
            .await?;

        debug!(
            account = %account,
            destination_chain_id,
            %amount,
            native_fee = %format_units(fee, "ether").unwrap_or_default(),
            "Estimated bridge fee"
        );
        Ok(fee)
    }
}
