//! The per-account deposit, swap and bridge sequence.
//!
//! Every step waits for its transactions to be mined before returning, so
//! the balance read by the next step already includes the previous step's
//! effect. The nonce cursor is threaded through the steps by value.

use alloy::primitives::{aliases::U160, Address, Bytes, U256};
use std::sync::Arc;
use tracing::warn;

use crate::{
    chain::PoolReader,
    error::Result,
    jitter::Jitter,
    types::{
        Account, AccountReport, BridgeTransfer, Confirmation, ContractCall, NonceCursor,
        PipelineStage, PoolInfo, StepError, StepKind, SubmittedTx, SwapParams,
    },
};

use super::transaction::TransactionManager;

/// Execution context of one account's run.
struct PipelineRun<'a> {
    account: &'a Account,
    start: NonceCursor,
    cursor: NonceCursor,
    stage: PipelineStage,
    transactions: Vec<SubmittedTx>,
}

impl<'a> PipelineRun<'a> {
    fn new(account: &'a Account, start: NonceCursor) -> Self {
        Self {
            account,
            start,
            cursor: start,
            stage: PipelineStage::Start,
            transactions: Vec::new(),
        }
    }

    /// The cursor implied by what was actually accepted by the node.
    fn submitted_cursor(&self) -> NonceCursor {
        NonceCursor::new(self.start.value() + self.transactions.len() as u64)
    }

    fn into_report(self, failure: Option<StepError>) -> AccountReport {
        let next_nonce = self.submitted_cursor().value();
        AccountReport {
            account: self.account.address(),
            start_nonce: Some(self.start.value()),
            next_nonce: Some(next_nonce),
            stage: self.stage,
            transactions: self.transactions,
            failure,
        }
    }
}

/// Runs the deposit, swap and bridge steps for one account.
#[derive(Clone)]
pub struct AccountPipeline {
    transactions: TransactionManager,
    jitter: Arc<Jitter>,
}

impl AccountPipeline {
    pub fn new(transactions: TransactionManager, jitter: Arc<Jitter>) -> Self {
        Self {
            transactions,
            jitter,
        }
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Runs the whole sequence starting from `start`. Never fails: the first
    /// failing step is journaled and recorded in the report, and the steps
    /// after it are skipped.
    pub async fn run(&self, account: &Account, start: NonceCursor) -> AccountReport {
        let mut run = PipelineRun::new(account, start);

        match self.run_steps(&mut run).await {
            Ok(()) => {
                run.stage = PipelineStage::Done;
                run.into_report(None)
            }
            Err(failure) => {
                self.transactions.journal().record(&format!(
                    "[{}] {} step failed, skipping remaining steps: {}",
                    account, failure.step, failure.error
                ));
                warn!(
                    account = %account,
                    step = %failure.step,
                    error = %failure.error,
                    "Account pipeline stopped early"
                );
                run.into_report(Some(failure))
            }
        }
    }

    async fn run_steps(&self, run: &mut PipelineRun<'_>) -> std::result::Result<(), StepError> {
        let account = run.account;

        run.stage = PipelineStage::DepositAttempted;
        run.cursor = self
            .deposit_stage(account, run.cursor, &mut run.transactions)
            .await
            .map_err(|error| StepError {
                step: StepKind::Deposit,
                error,
            })?;
        debug_assert_eq!(run.cursor, run.submitted_cursor());

        run.stage = PipelineStage::SwapAttempted;
        run.cursor = self
            .swap_stage(account, run.cursor, &mut run.transactions)
            .await
            .map_err(|error| StepError {
                step: StepKind::Swap,
                error,
            })?;
        debug_assert_eq!(run.cursor, run.submitted_cursor());

        run.stage = PipelineStage::BridgeAttempted;
        run.cursor = self
            .bridge_stage(account, run.cursor, &mut run.transactions)
            .await
            .map_err(|error| StepError {
                step: StepKind::Bridge,
                error,
            })?;
        debug_assert_eq!(run.cursor, run.submitted_cursor());

        Ok(())
    }

    async fn deposit_stage(
        &self,
        account: &Account,
        mut cursor: NonceCursor,
        ledger: &mut Vec<SubmittedTx>,
    ) -> Result<NonceCursor> {
        let config = self.transactions.config();

        if let Some(spender) = config.deposit_approval_spender {
            cursor = self
                .transactions
                .ensure_approval(
                    account,
                    config.contracts.wrapped_token,
                    spender,
                    StepKind::Deposit,
                    cursor,
                    ledger,
                )
                .await?;
        }

        let amount = self.jitter.deposit_amount(&config.deposit);
        self.deposit(account, amount, cursor, ledger).await?;
        Ok(cursor.advance())
    }

    async fn swap_stage(
        &self,
        account: &Account,
        cursor: NonceCursor,
        ledger: &mut Vec<SubmittedTx>,
    ) -> Result<NonceCursor> {
        let contracts = self.transactions.config().contracts;

        let cursor = self
            .transactions
            .ensure_approval(
                account,
                contracts.wrapped_token,
                contracts.router,
                StepKind::Swap,
                cursor,
                ledger,
            )
            .await?;

        let pool = self.read_pool().await?;
        if pool.immutables.token0 != contracts.wrapped_token {
            warn!(
                token0 = %pool.immutables.token0,
                wrapped_token = %contracts.wrapped_token,
                "Pool token0 is not the configured wrapped token"
            );
        }

        let balance = self
            .transactions
            .balance_of(pool.immutables.token0, account.address())
            .await?;

        self.swap(account, &pool, balance, cursor, ledger).await?;
        Ok(cursor.advance())
    }

    async fn bridge_stage(
        &self,
        account: &Account,
        cursor: NonceCursor,
        ledger: &mut Vec<SubmittedTx>,
    ) -> Result<NonceCursor> {
        let contracts = self.transactions.config().contracts;

        let cursor = self
            .transactions
            .ensure_approval(
                account,
                contracts.bridged_token,
                contracts.bridge,
                StepKind::Bridge,
                cursor,
                ledger,
            )
            .await?;

        let balance = self
            .transactions
            .balance_of(contracts.bridged_token, account.address())
            .await?;

        self.bridge(account, balance, cursor, ledger).await?;
        Ok(cursor.advance())
    }

    /// Wraps `amount` of native currency into the wrapped token.
    pub async fn deposit(
        &self,
        account: &Account,
        amount: U256,
        cursor: NonceCursor,
        ledger: &mut Vec<SubmittedTx>,
    ) -> Result<Confirmation> {
        let wrapped_token = self.transactions.config().contracts.wrapped_token;
        let intent = self
            .transactions
            .build_intent(account, wrapped_token, ContractCall::Deposit, amount, cursor)
            .await?;

        self.transactions
            .send_and_confirm(account, StepKind::Deposit, intent, ledger)
            .await
    }

    /// Reads the pool's immutables and its current price and liquidity.
    pub async fn read_pool(&self) -> Result<PoolInfo> {
        let pool = self.transactions.config().contracts.pool;
        let chain = &self.transactions.chain;

        let immutables = self
            .transactions
            .with_retry("Pool immutables", || chain.pool_immutables(pool))
            .await?;
        let state = self
            .transactions
            .with_retry("Pool state", || chain.pool_state(pool))
            .await?;

        Ok(PoolInfo { immutables, state })
    }

    /// Exact-input parameters swapping all of `balance` from token0 to
    /// token1, with no minimum output and no price limit.
    pub fn swap_params(
        &self,
        recipient: Address,
        pool: &PoolInfo,
        balance: U256,
        now_unix: u64,
    ) -> SwapParams {
        let deadline = now_unix + self.transactions.config().swap_deadline.as_secs();
        SwapParams {
            token_in: pool.immutables.token0,
            token_out: pool.immutables.token1,
            fee: pool.immutables.fee,
            recipient,
            deadline: U256::from(deadline),
            amount_in: balance,
            amount_out_minimum: U256::ZERO,
            sqrt_price_limit_x96: U160::ZERO,
        }
    }

    /// Swaps the whole `balance` of the pool's token0 into token1.
    pub async fn swap(
        &self,
        account: &Account,
        pool: &PoolInfo,
        balance: U256,
        cursor: NonceCursor,
        ledger: &mut Vec<SubmittedTx>,
    ) -> Result<Confirmation> {
        if balance.is_zero() {
            self.transactions.journal().record(&format!(
                "[{}] swap: token0 balance is zero, submitting anyway",
                account
            ));
        }

        let now_unix = chrono::Utc::now().timestamp().max(0) as u64;
        let params = self.swap_params(account.address(), pool, balance, now_unix);
        let router = self.transactions.config().contracts.router;

        self.transactions.journal().record(&format!(
            "[{}] swap: {} {} -> {} (fee {}, pool liquidity {}, tick {})",
            account,
            balance,
            params.token_in,
            params.token_out,
            params.fee,
            pool.state.liquidity,
            pool.state.tick
        ));

        let intent = self
            .transactions
            .build_intent(
                account,
                router,
                ContractCall::ExactInputSingle(params),
                U256::ZERO,
                cursor,
            )
            .await?;

        self.transactions
            .send_and_confirm(account, StepKind::Swap, intent, ledger)
            .await
    }

    /// Sends the whole `balance` to the same address on the destination
    /// chain, attaching the estimated relay fee as value.
    pub async fn bridge(
        &self,
        account: &Account,
        balance: U256,
        cursor: NonceCursor,
        ledger: &mut Vec<SubmittedTx>,
    ) -> Result<Confirmation> {
        let config = self.transactions.config();

        if balance.is_zero() {
            self.transactions.journal().record(&format!(
                "[{}] bridge: token balance is zero, submitting anyway",
                account
            ));
        }

        let native_fee = self
            .transactions
            .estimate_fee(account, config.destination_chain_id, balance)
            .await?;

        let transfer = BridgeTransfer {
            from: account.address(),
            destination_chain_id: config.destination_chain_id,
            to: account.address(),
            amount: balance,
            refund_address: account.address(),
            zro_payment_address: Address::ZERO,
            adapter_params: Bytes::new(),
        };

        let intent = self
            .transactions
            .build_intent(
                account,
                config.contracts.bridge,
                ContractCall::SendFrom(transfer),
                native_fee,
                cursor,
            )
            .await?;

        self.transactions
            .send_and_confirm(account, StepKind::Bridge, intent, ledger)
            .await
    }
}
