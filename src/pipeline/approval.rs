use alloy::primitives::{Address, U256};

use crate::{
    chain::TokenReader,
    error::Result,
    types::{Account, ContractCall, NonceCursor, StepKind, SubmittedTx},
};

use super::transaction::TransactionManager;

impl TransactionManager {
    /// Makes sure `spender` may move `token` on behalf of `account`.
    ///
    /// Reads the allowance fresh. Only an allowance of exactly zero triggers
    /// an unlimited approval, which takes the cursor's nonce and advances it.
    /// Any non-zero allowance, even one too small for the coming transfer,
    /// counts as approved and leaves the cursor untouched.
    pub async fn ensure_approval(
        &self,
        account: &Account,
        token: Address,
        spender: Address,
        step: StepKind,
        cursor: NonceCursor,
        ledger: &mut Vec<SubmittedTx>,
    ) -> Result<NonceCursor> {
        let allowance = self
            .with_retry("Allowance read", || {
                self.chain.allowance(token, account.address(), spender)
            })
            .await?;

        if !allowance.is_zero() {
            self.journal.record(&format!(
                "[{}] {} approval: {} already approved for {} (allowance {}), skipping",
                account, step, token, spender, allowance
            ));
            return Ok(cursor);
        }

        let intent = self
            .build_intent(
                account,
                token,
                ContractCall::Approve {
                    spender,
                    amount: U256::MAX,
                },
                U256::ZERO,
                cursor,
            )
            .await?;

        self.send_and_confirm(account, step, intent, ledger).await?;
        Ok(cursor.advance())
    }
}
