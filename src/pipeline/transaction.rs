use alloy::primitives::{utils::format_units, Address, U256};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::warn;

use crate::{
    chain::{Chain, ChainRpc, TokenReader},
    error::{PipelineError, Result},
    journal::Journal,
    types::{
        Account, Confirmation, ContractCall, NonceCursor, StepKind, SubmittedTx,
        TransactionIntent,
    },
};

use super::Config;

/// Builds, submits and confirms transactions, and wraps chain reads in the
/// retry policy.
#[derive(Clone)]
pub struct TransactionManager {
    pub(crate) chain: Arc<dyn Chain>,
    pub(crate) config: Arc<Config>,
    pub(crate) journal: Journal,
}

impl TransactionManager {
    /// Creates a new TransactionManager
    pub fn new(chain: Arc<dyn Chain>, config: Arc<Config>, journal: Journal) -> Self {
        Self {
            chain,
            config,
            journal,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Repeats `op` while it fails with a retryable error, backing off by a
    /// factor of 1.5 per attempt. Never use this for submissions.
    pub async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry_count = 0;
        let max_retries = self.config.max_retries;
        let base_delay = Duration::from_millis(self.config.retry_base_delay_ms);

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry_count < max_retries => {
                    retry_count += 1;
                    let delay = base_delay.mul_f32(1.5f32.powi(retry_count as i32));
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        what, retry_count, max_retries, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn transaction_count(&self, address: Address) -> Result<u64> {
        self.with_retry("Transaction count", || self.chain.transaction_count(address))
            .await
    }

    pub async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        self.with_retry("Balance read", || self.chain.balance_of(token, owner))
            .await
    }

    /// Builds an intent for `call` with the current gas price and the
    /// cursor's nonce.
    pub async fn build_intent(
        &self,
        account: &Account,
        to: Address,
        call: ContractCall,
        value: U256,
        cursor: NonceCursor,
    ) -> Result<TransactionIntent> {
        let gas_price = self
            .with_retry("Gas price", || self.chain.gas_price())
            .await?;

        Ok(TransactionIntent {
            from: account.address(),
            to,
            call,
            value,
            gas_price,
            gas_limit: self.config.gas_limit,
            nonce: cursor.value(),
        })
    }

    /// Submits the intent and waits until it is mined.
    ///
    /// The transaction is pushed to `ledger` as soon as the node accepts it,
    /// since its nonce is spent from then on whatever happens next. A
    /// reverted receipt is returned as a rejection carrying the hash.
    pub async fn send_and_confirm(
        &self,
        account: &Account,
        step: StepKind,
        intent: TransactionIntent,
        ledger: &mut Vec<SubmittedTx>,
    ) -> Result<Confirmation> {
        let call = intent.call.name();
        self.journal.record(&format!(
            "[{}] {} {}: sending... Nonce: {}, Value: {} ETH, Gas Price: {} wei, Gas Limit: {}",
            account,
            step,
            call,
            intent.nonce,
            format_units(intent.value, "ether").unwrap_or_default(),
            intent.gas_price,
            intent.gas_limit
        ));

        let start = tokio::time::Instant::now();
        let hash = match self.chain.submit(account, &intent).await {
            Ok(hash) => hash,
            Err(e) => {
                self.journal.record(&format!(
                    "[{}] {} {}: submission failed: {}",
                    account, step, call, e
                ));
                return Err(e);
            }
        };

        ledger.push(SubmittedTx {
            step,
            call,
            nonce: intent.nonce,
            confirmation: None,
        });
        self.journal.record(&format!(
            "[{}] {} {}: submitted, waiting for confirmation. TX Hash: {}",
            account, step, call, hash
        ));

        // Waiting is a read: the transaction is already in the pool, so a
        // dropped lookup is retried instead of failing the step.
        let confirmation = match self
            .with_retry("Receipt lookup", || self.chain.wait_for_confirmation(hash))
            .await
        {
            Ok(confirmation) => confirmation,
            Err(e) => {
                self.journal.record(&format!(
                    "[{}] {} {}: confirmation failed for {}: {}",
                    account, step, call, hash, e
                ));
                return Err(e);
            }
        };

        if let Some(entry) = ledger.last_mut() {
            entry.confirmation = Some(confirmation.clone());
        }

        if !confirmation.success {
            self.journal.record(&format!(
                "[{}] {} {}: reverted in block {:?}. TX Hash: {}",
                account, step, call, confirmation.block_number, hash
            ));
            return Err(PipelineError::ChainRejection(
                format!("{} {} reverted on-chain", step, call),
                Some(hash),
            ));
        }

        self.journal.record(&format!(
            "[{}] {} {}: landed! Time elapsed: {:?} | Block: {:?} | TX Hash: {}",
            account,
            step,
            call,
            start.elapsed(),
            confirmation.block_number,
            hash
        ));
        Ok(confirmation)
    }
}
