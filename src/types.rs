//! Core type definitions for the per-account pipeline.
//!
//! This module contains the accounts, nonce cursor, transaction intents and
//! the reports produced by one account's run and by a whole batch.

use alloy::{
    network::EthereumWallet,
    primitives::{
        aliases::{U160, U24},
        Address, Bytes, TxHash, U256,
    },
    signers::local::PrivateKeySigner,
};
use core::fmt;
use std::fmt::{Debug, Display};
use tokio::time::Duration;

use crate::error::{PipelineError, Result};

/// A wallet credential and its address. Loaded once at start-up and never
/// mutated afterwards.
#[derive(Clone)]
pub struct Account {
    wallet: EthereumWallet,
    address: Address,
}

impl Account {
    pub fn from_private_key(key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = key
            .trim()
            .parse()
            .map_err(|_| PipelineError::Configuration("Malformed private key".to_string()))?;
        Ok(Self::from_signer(signer))
    }

    pub fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self {
            wallet: EthereumWallet::new(signer),
            address,
        }
    }

    /// Generates an account with a random private key.
    pub fn random() -> Self {
        Self::from_signer(PrivateKeySigner::random())
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }
}

// Key material must never reach a log line.
impl Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Next unused nonce for one account.
///
/// Created from the chain's transaction count when the account's run starts
/// and advanced by exactly one for every transaction that was accepted by
/// the node. Steps take the cursor by value and hand back the advanced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NonceCursor(u64);

impl NonceCursor {
    pub fn new(start: u64) -> Self {
        Self(start)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn advance(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for NonceCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arguments of a single-hop exact-input swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParams {
    pub token_in: Address,
    pub token_out: Address,
    pub fee: U24,
    pub recipient: Address,
    /// Unix timestamp in seconds
    pub deadline: U256,
    pub amount_in: U256,
    pub amount_out_minimum: U256,
    pub sqrt_price_limit_x96: U160,
}

/// Arguments of an OFT `sendFrom`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeTransfer {
    pub from: Address,
    pub destination_chain_id: u16,
    pub to: Address,
    pub amount: U256,
    pub refund_address: Address,
    pub zro_payment_address: Address,
    pub adapter_params: Bytes,
}

/// The state-changing contract calls the pipeline knows how to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    Approve { spender: Address, amount: U256 },
    Deposit,
    ExactInputSingle(SwapParams),
    SendFrom(BridgeTransfer),
}

impl ContractCall {
    pub fn name(&self) -> &'static str {
        match self {
            ContractCall::Approve { .. } => "approve",
            ContractCall::Deposit => "deposit",
            ContractCall::ExactInputSingle(_) => "exactInputSingle",
            ContractCall::SendFrom(_) => "sendFrom",
        }
    }
}

/// Everything needed to sign and submit one contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub from: Address,
    pub to: Address,
    pub call: ContractCall,
    pub value: U256,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub nonce: u64,
}

/// Receipt summary of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

impl Confirmation {
    /// Native currency paid for gas, in wei.
    pub fn gas_cost(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// Immutable pool parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolImmutables {
    pub token0: Address,
    pub token1: Address,
    pub fee: U24,
}

/// Current pool price and liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    pub liquidity: u128,
    pub sqrt_price_x96: U160,
    pub tick: i32,
}

/// Immutable and live pool data read right before a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolInfo {
    pub immutables: PoolImmutables,
    pub state: PoolState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Fetching the starting nonce, before any step runs
    StartingNonce,
    Deposit,
    Swap,
    Bridge,
}

impl Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::StartingNonce => write!(f, "starting nonce"),
            StepKind::Deposit => write!(f, "deposit"),
            StepKind::Swap => write!(f, "swap"),
            StepKind::Bridge => write!(f, "bridge"),
        }
    }
}

/// How far one account's run got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Start,
    DepositAttempted,
    SwapAttempted,
    BridgeAttempted,
    Done,
}

/// A transaction this run submitted, in submission order.
#[derive(Debug, Clone)]
pub struct SubmittedTx {
    pub step: StepKind,
    pub call: &'static str,
    pub nonce: u64,
    pub confirmation: Option<Confirmation>,
}

/// The error that ended an account's run early, along with the step it
/// happened in.
#[derive(Debug)]
pub struct StepError {
    pub step: StepKind,
    pub error: PipelineError,
}

/// Outcome of one account's pipeline run.
#[derive(Debug)]
pub struct AccountReport {
    pub account: Address,
    pub start_nonce: Option<u64>,
    /// The cursor after the last accepted submission
    pub next_nonce: Option<u64>,
    pub stage: PipelineStage,
    pub transactions: Vec<SubmittedTx>,
    /// None when every step went through
    pub failure: Option<StepError>,
}

impl AccountReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.stage == PipelineStage::Done
    }

    pub fn gas_cost(&self) -> U256 {
        self.transactions
            .iter()
            .filter_map(|tx| tx.confirmation.as_ref())
            .map(Confirmation::gas_cost)
            .fold(U256::ZERO, |acc, cost| acc + cost)
    }
}

/// Result of running the whole account list.
#[derive(Debug)]
pub struct BatchSummary {
    pub reports: Vec<AccountReport>,
    pub time_elapsed: Duration,
}

impl BatchSummary {
    pub fn successful_accounts(&self) -> usize {
        self.reports.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed_accounts(&self) -> impl Iterator<Item = &AccountReport> {
        self.reports.iter().filter(|r| !r.succeeded())
    }

    pub fn transactions_submitted(&self) -> usize {
        self.reports.iter().map(|r| r.transactions.len()).sum()
    }

    pub fn total_gas_cost(&self) -> U256 {
        self.reports
            .iter()
            .map(AccountReport::gas_cost)
            .fold(U256::ZERO, |acc, cost| acc + cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_advances_by_one() {
        let cursor = NonceCursor::new(7);
        assert_eq!(cursor.advance().value(), 8);
        assert_eq!(cursor.value(), 7);
    }

    #[test]
    fn account_debug_hides_key() {
        let key = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
        let account = Account::from_private_key(key).unwrap();
        let rendered = format!("{:?}", account);
        assert!(rendered.contains(&account.address().to_string()));
        assert!(!rendered.contains("4c0883a6"));
    }

    #[test]
    fn malformed_key_is_a_configuration_error() {
        let err = Account::from_private_key("not-a-key").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn report_sums_gas_of_confirmed_transactions() {
        let confirmed = |gas_used| SubmittedTx {
            step: StepKind::Deposit,
            call: "deposit",
            nonce: 0,
            confirmation: Some(Confirmation {
                hash: TxHash::ZERO,
                block_number: Some(1),
                success: true,
                gas_used,
                effective_gas_price: 10,
            }),
        };
        let report = AccountReport {
            account: Address::ZERO,
            start_nonce: Some(0),
            next_nonce: Some(3),
            stage: PipelineStage::Done,
            transactions: vec![
                confirmed(100),
                confirmed(50),
                SubmittedTx {
                    step: StepKind::Swap,
                    call: "exactInputSingle",
                    nonce: 2,
                    confirmation: None,
                },
            ],
            failure: None,
        };
        assert_eq!(report.gas_cost(), U256::from(1500));
        assert!(report.succeeded());
    }
}
