#![allow(dead_code)]

use alloy::primitives::{aliases::U24, Address, TxHash, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use wrap_swap_bridge::{
    chain::{ChainRpc, ConfirmationPolicy, FeeQuoter, PoolReader, TokenReader},
    error::{PipelineError, Result},
    jitter::{DelayWindow, DepositAmount},
    journal::MemorySink,
    pipeline::{Config, Contracts},
    types::{
        Account, Confirmation, ContractCall, PoolImmutables, PoolState, TransactionIntent,
    },
    Journal,
};

pub const WRAPPED: Address = Address::repeat_byte(0x0a);
pub const BRIDGED: Address = Address::repeat_byte(0x0b);
pub const POOL: Address = Address::repeat_byte(0x0c);
pub const ROUTER: Address = Address::repeat_byte(0x0d);
pub const BRIDGE: Address = Address::repeat_byte(0x0e);
pub const DEPOSIT_SPENDER: Address = Address::repeat_byte(0x0f);

/// 0.00009 with 18 decimals
pub const DEPOSIT_BASE: u128 = 90_000_000_000_000;
/// 0.00001 with 18 decimals
pub const DEPOSIT_SPREAD: u128 = 10_000_000_000_000;
pub const POOL_FEE: u32 = 3000;
pub const SWAP_RATE: u64 = 2;

pub fn test_config() -> Config {
    Config {
        contracts: Contracts {
            wrapped_token: WRAPPED,
            bridged_token: BRIDGED,
            pool: POOL,
            router: ROUTER,
            bridge: BRIDGE,
        },
        destination_chain_id: 154,
        deposit: DepositAmount {
            base: DEPOSIT_BASE,
            jitter_min: 0,
            jitter_max: DEPOSIT_SPREAD as i128,
        },
        deposit_approval_spender: None,
        gas_limit: 10_000_000,
        swap_deadline: Duration::from_secs(600),
        account_delay: DelayWindow {
            min: Duration::from_secs(3),
            max: Duration::from_secs(11),
        },
        max_retries: 2,
        retry_base_delay_ms: 10,
        confirmation: ConfirmationPolicy {
            required_confirmations: 1,
            timeout: Duration::from_secs(60),
        },
        max_parallel_accounts: 1,
        rng_seed: Some(42),
    }
}

pub fn memory_journal() -> (Journal, Arc<MemorySink>) {
    Journal::in_memory()
}

#[derive(Default)]
pub struct FakeState {
    /// Mined transaction count per account
    pub mined_nonces: HashMap<Address, u64>,
    /// Next nonce the mempool accepts per account
    pub pending_nonces: HashMap<Address, u64>,
    /// (token, owner) -> balance
    pub balances: HashMap<(Address, Address), U256>,
    /// (token, owner, spender) -> allowance
    pub allowances: HashMap<(Address, Address, Address), U256>,
    pub pending: HashMap<TxHash, TransactionIntent>,
    /// Every intent the node accepted, in order
    pub submitted: Vec<TransactionIntent>,
    /// (token, owner, observed balance), in order
    pub balance_reads: Vec<(Address, Address, U256)>,
    pub native_fee: U256,
    pub fail_fee_estimate: bool,
    pub fail_nonce_for: HashSet<Address>,
    pub reject_submissions_from: HashSet<Address>,
    /// Approvals from these accounts are refused by the node
    pub reject_approvals_from: HashSet<Address>,
    /// Approvals from these accounts are mined but revert
    pub revert_approvals_from: HashSet<Address>,
    /// Receipt lookups that fail before the node answers again
    pub receipt_outages: u32,
    next_hash: u64,
}

/// In-memory chain. Transaction effects only land when the transaction is
/// confirmed, which can be delayed to expose steps that read too early.
pub struct FakeChain {
    pub state: Mutex<FakeState>,
    confirmation_delay: Duration,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Self::with_confirmation_delay(Duration::ZERO)
    }

    pub fn with_confirmation_delay(confirmation_delay: Duration) -> Arc<Self> {
        let state = FakeState {
            native_fee: U256::from(1_000_000_000_000u64),
            ..Default::default()
        };
        Arc::new(Self {
            state: Mutex::new(state),
            confirmation_delay,
        })
    }

    pub fn set_nonce(&self, account: Address, nonce: u64) {
        let mut state = self.state.lock();
        state.mined_nonces.insert(account, nonce);
        state.pending_nonces.insert(account, nonce);
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state.lock().balances.insert((token, owner), amount);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state
            .lock()
            .allowances
            .insert((token, owner, spender), amount);
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        self.state
            .lock()
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn submitted(&self) -> Vec<TransactionIntent> {
        self.state.lock().submitted.clone()
    }

    pub fn submitted_by(&self, account: Address) -> Vec<TransactionIntent> {
        self.submitted()
            .into_iter()
            .filter(|intent| intent.from == account)
            .collect()
    }

    /// Applies the intent's effect. Returns false when it reverts.
    fn execute(state: &mut FakeState, intent: &TransactionIntent) -> bool {
        match &intent.call {
            ContractCall::Approve { spender, amount } => {
                if state.revert_approvals_from.contains(&intent.from) {
                    return false;
                }
                state
                    .allowances
                    .insert((intent.to, intent.from, *spender), *amount);
                true
            }
            ContractCall::Deposit => {
                let balance = state.balances.entry((intent.to, intent.from)).or_default();
                *balance += intent.value;
                true
            }
            ContractCall::ExactInputSingle(params) => {
                let approved = state
                    .allowances
                    .get(&(params.token_in, intent.from, intent.to))
                    .copied()
                    .unwrap_or_default();
                let balance_in = state
                    .balances
                    .get(&(params.token_in, intent.from))
                    .copied()
                    .unwrap_or_default();
                if params.amount_in.is_zero()
                    || balance_in < params.amount_in
                    || approved < params.amount_in
                {
                    return false;
                }
                state
                    .balances
                    .insert((params.token_in, intent.from), balance_in - params.amount_in);
                *state
                    .balances
                    .entry((params.token_out, params.recipient))
                    .or_default() += params.amount_in * U256::from(SWAP_RATE);
                true
            }
            ContractCall::SendFrom(transfer) => {
                let approved = state
                    .allowances
                    .get(&(BRIDGED, transfer.from, intent.to))
                    .copied()
                    .unwrap_or_default();
                let balance = state
                    .balances
                    .get(&(BRIDGED, transfer.from))
                    .copied()
                    .unwrap_or_default();
                if transfer.amount.is_zero()
                    || balance < transfer.amount
                    || approved.is_zero()
                    || intent.value < state.native_fee
                {
                    return false;
                }
                state
                    .balances
                    .insert((BRIDGED, transfer.from), balance - transfer.amount);
                true
            }
        }
    }
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn transaction_count(&self, address: Address) -> Result<u64> {
        let state = self.state.lock();
        if state.fail_nonce_for.contains(&address) {
            return Err(PipelineError::Network("connection refused".to_string()));
        }
        Ok(state.mined_nonces.get(&address).copied().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(100_000_000)
    }

    async fn submit(&self, account: &Account, intent: &TransactionIntent) -> Result<TxHash> {
        let mut state = self.state.lock();
        if state.reject_submissions_from.contains(&account.address()) {
            return Err(PipelineError::ChainRejection(
                "insufficient funds for gas * price + value".to_string(),
                None,
            ));
        }

        if matches!(intent.call, ContractCall::Approve { .. })
            && state.reject_approvals_from.contains(&intent.from)
        {
            return Err(PipelineError::ChainRejection(
                "execution reverted: approvals paused".to_string(),
                None,
            ));
        }

        let expected = state
            .pending_nonces
            .get(&intent.from)
            .copied()
            .unwrap_or_default();
        if intent.nonce != expected {
            return Err(PipelineError::ChainRejection(
                format!("nonce mismatch: expected {}, got {}", expected, intent.nonce),
                None,
            ));
        }

        state.next_hash += 1;
        let hash = B256::from(U256::from(state.next_hash));
        state.pending_nonces.insert(intent.from, expected + 1);
        state.pending.insert(hash, intent.clone());
        state.submitted.push(intent.clone());
        Ok(hash)
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<Confirmation> {
        if !self.confirmation_delay.is_zero() {
            tokio::time::sleep(self.confirmation_delay).await;
        }

        let mut state = self.state.lock();
        if state.receipt_outages > 0 {
            state.receipt_outages -= 1;
            return Err(PipelineError::Network("502 Bad Gateway".to_string()));
        }
        let intent = state
            .pending
            .remove(&hash)
            .ok_or_else(|| PipelineError::Network(format!("unknown transaction {}", hash)))?;

        let success = Self::execute(&mut state, &intent);
        let mined = state.mined_nonces.entry(intent.from).or_default();
        *mined += 1;
        let block_number = *mined;

        Ok(Confirmation {
            hash,
            block_number: Some(block_number),
            success,
            gas_used: 50_000,
            effective_gas_price: intent.gas_price,
        })
    }
}

#[async_trait]
impl TokenReader for FakeChain {
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let mut state = self.state.lock();
        let balance = state
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default();
        state.balance_reads.push((token, owner, balance));
        Ok(balance)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }
}

#[async_trait]
impl PoolReader for FakeChain {
    async fn pool_immutables(&self, _pool: Address) -> Result<PoolImmutables> {
        Ok(PoolImmutables {
            token0: WRAPPED,
            token1: BRIDGED,
            fee: U24::from(POOL_FEE),
        })
    }

    async fn pool_state(&self, _pool: Address) -> Result<PoolState> {
        Ok(PoolState {
            liquidity: 1_000_000_000_000_000_000,
            sqrt_price_x96: Default::default(),
            tick: 0,
        })
    }
}

#[async_trait]
impl FeeQuoter for FakeChain {
    async fn estimate_send_fee(
        &self,
        _bridge: Address,
        _destination_chain_id: u16,
        _to: Address,
        _amount: U256,
    ) -> Result<U256> {
        let state = self.state.lock();
        if state.fail_fee_estimate {
            return Err(PipelineError::Network("execution reverted".to_string()));
        }
        Ok(state.native_fee)
    }
}
