//! Chain capabilities consumed by the pipeline and their RPC implementation.
//!
//! The pipeline never talks to a provider directly. It sees one small
//! capability per contract kind plus the account-level RPC calls, which
//! keeps the orchestration testable against an in-memory chain.

use alloy::{
    consensus::TxEnvelope,
    network::{Ethereum, EthereumWallet, ReceiptResponse, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{PendingTransactionBuilder, Provider},
};
use alloy_rpc_types::TransactionRequest;
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::debug;

use crate::{
    contracts::{IUniswapV3Pool, IERC20, IOFT},
    error::{PipelineError, Result},
    types::{Account, Confirmation, PoolImmutables, PoolState, TransactionIntent},
};

/// Account-level RPC: nonces, gas price, submission and confirmation.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn transaction_count(&self, address: Address) -> Result<u64>;

    async fn gas_price(&self) -> Result<u128>;

    /// Signs and submits the intent. Returns once the node accepted it into
    /// the pending pool.
    async fn submit(&self, account: &Account, intent: &TransactionIntent) -> Result<TxHash>;

    /// Waits until the transaction is mined and returns its receipt summary.
    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<Confirmation>;
}

#[async_trait]
pub trait TokenReader: Send + Sync {
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;
}

#[async_trait]
pub trait PoolReader: Send + Sync {
    async fn pool_immutables(&self, pool: Address) -> Result<PoolImmutables>;

    async fn pool_state(&self, pool: Address) -> Result<PoolState>;
}

#[async_trait]
pub trait FeeQuoter: Send + Sync {
    /// Native fee the bridge asks for relaying `amount` to `to` on the
    /// destination chain, without ZRO payment or adapter parameters.
    async fn estimate_send_fee(
        &self,
        bridge: Address,
        destination_chain_id: u16,
        to: Address,
        amount: U256,
    ) -> Result<U256>;
}

/// Everything the pipeline needs from a chain.
pub trait Chain: ChainRpc + TokenReader + PoolReader + FeeQuoter {}

impl<T> Chain for T where T: ChainRpc + TokenReader + PoolReader + FeeQuoter {}

/// How long to wait for receipts, and how deep they must be.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    pub required_confirmations: u64,
    pub timeout: Duration,
}

/// [`Chain`] backed by an alloy provider.
pub struct RpcChain {
    provider: Arc<dyn Provider<Ethereum>>,
    chain_id: u64,
    confirmation: ConfirmationPolicy,
}

impl RpcChain {
    pub async fn new(
        provider: Arc<dyn Provider<Ethereum>>,
        confirmation: ConfirmationPolicy,
    ) -> Result<Self> {
        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| PipelineError::Network(format!("Failed to get chain ID: {}", e)))?;

        Ok(Self {
            provider,
            chain_id,
            confirmation,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn build_request(&self, intent: &TransactionIntent) -> TransactionRequest {
        build_request(intent, self.chain_id)
    }
}

/// Legacy-priced request for `intent` on `chain_id`.
pub fn build_request(intent: &TransactionIntent, chain_id: u64) -> TransactionRequest {
    TransactionRequest::default()
        .with_from(intent.from)
        .with_to(intent.to)
        .with_input(intent.call.encode())
        .with_value(intent.value)
        .with_gas_limit(intent.gas_limit)
        .with_gas_price(intent.gas_price)
        .with_nonce(intent.nonce)
        .with_chain_id(chain_id)
}

/// Signs `request` locally. Fails without touching the network when the
/// wallet holds no key for the sender or a required field is missing.
pub async fn sign_request(
    request: TransactionRequest,
    wallet: &EthereumWallet,
) -> Result<TxEnvelope> {
    request
        .build(wallet)
        .await
        .map_err(|e| PipelineError::Signing(format!("Failed to sign transaction: {}", e)))
}

#[async_trait]
impl ChainRpc for RpcChain {
    async fn transaction_count(&self, address: Address) -> Result<u64> {
        self.provider
            .get_transaction_count(address)
            .await
            .map_err(|e| PipelineError::Network(format!("Failed to get transaction count: {}", e)))
    }

    async fn gas_price(&self) -> Result<u128> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| PipelineError::Network(format!("Failed to get gas price: {}", e)))
    }

    async fn submit(&self, account: &Account, intent: &TransactionIntent) -> Result<TxHash> {
        let tx_envelope = sign_request(self.build_request(intent), account.wallet()).await?;

        let pending = self
            .provider
            .send_tx_envelope(tx_envelope)
            .await
            .map_err(|e| PipelineError::from_submission("Failed to send transaction", e))?;

        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<Confirmation> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), hash)
            .with_required_confirmations(self.confirmation.required_confirmations)
            .with_timeout(Some(self.confirmation.timeout))
            .get_receipt()
            .await
            .map_err(|e| {
                PipelineError::Network(format!("Failed to get transaction receipt: {}", e))
            })?;

        debug!(%hash, block = ?receipt.block_number(), "Receipt received");
        Ok(Confirmation {
            hash,
            block_number: receipt.block_number(),
            success: receipt.status(),
            gas_used: receipt.gas_used(),
            effective_gas_price: receipt.effective_gas_price(),
        })
    }
}

#[async_trait]
impl TokenReader for RpcChain {
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let token = IERC20::new(token, self.provider.root());
        token
            .balanceOf(owner)
            .call()
            .await
            .map(|r| r._0)
            .map_err(|e| PipelineError::Network(format!("Failed to get token balance: {}", e)))
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let token = IERC20::new(token, self.provider.root());
        token
            .allowance(owner, spender)
            .call()
            .await
            .map(|r| r._0)
            .map_err(|e| PipelineError::Network(format!("Failed to get allowance: {}", e)))
    }
}

#[async_trait]
impl PoolReader for RpcChain {
    async fn pool_immutables(&self, pool: Address) -> Result<PoolImmutables> {
        let pool = IUniswapV3Pool::new(pool, self.provider.root());
        let read_err = |e: alloy::contract::Error| {
            PipelineError::Network(format!("Failed to read pool immutables: {}", e))
        };

        let token0 = pool.token0().call().await.map_err(read_err)?._0;
        let token1 = pool.token1().call().await.map_err(read_err)?._0;
        let fee = pool.fee().call().await.map_err(read_err)?._0;

        Ok(PoolImmutables {
            token0,
            token1,
            fee,
        })
    }

    async fn pool_state(&self, pool: Address) -> Result<PoolState> {
        let pool = IUniswapV3Pool::new(pool, self.provider.root());
        let read_err = |e: alloy::contract::Error| {
            PipelineError::Network(format!("Failed to read pool state: {}", e))
        };

        let liquidity = pool.liquidity().call().await.map_err(read_err)?._0;
        let slot0 = pool.slot0().call().await.map_err(read_err)?;

        Ok(PoolState {
            liquidity,
            sqrt_price_x96: slot0.sqrtPriceX96,
            tick: slot0.tick.as_i32(),
        })
    }
}

#[async_trait]
impl FeeQuoter for RpcChain {
    async fn estimate_send_fee(
        &self,
        bridge: Address,
        destination_chain_id: u16,
        to: Address,
        amount: U256,
    ) -> Result<U256> {
        let bridge = IOFT::new(bridge, self.provider.root());
        bridge
            .estimateSendFee(
                destination_chain_id,
                Bytes::copy_from_slice(to.as_slice()),
                amount,
                false,
                Bytes::new(),
            )
            .call()
            .await
            .map(|fees| fees.nativeFee)
            .map_err(|e| PipelineError::Network(format!("Failed to estimate send fee: {}", e)))
    }
}
