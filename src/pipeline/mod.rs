pub mod approval;
pub mod execution;
pub mod fees;
pub mod progress;
pub mod steps;
pub mod transaction;

use alloy::primitives::Address;
use std::{collections::HashSet, sync::Arc, time::Duration};

use crate::{
    chain::{Chain, ConfirmationPolicy},
    error::{PipelineError, Result},
    jitter::{DelayWindow, DepositAmount, Jitter},
    journal::Journal,
    types::{Account, BatchSummary},
    utils::{env_address, env_duration, env_or, parse_address, parse_amount, parse_offset},
};

use self::{
    execution::ExecutionManager, progress::ProgressManager, steps::AccountPipeline,
    transaction::TransactionManager,
};

/// Addresses of the contracts the pipeline touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contracts {
    /// Wrapped native token, the deposit target and the swap input
    pub wrapped_token: Address,
    /// Token received from the swap and sent over the bridge
    pub bridged_token: Address,
    pub pool: Address,
    pub router: Address,
    pub bridge: Address,
}

/// Configuration for a batch run. Built once at start-up and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub contracts: Contracts,
    /// Bridge-level id of the destination chain
    pub destination_chain_id: u16,
    pub deposit: DepositAmount,
    /// When set, the deposit is preceded by an approval of the wrapped token
    /// for this spender
    pub deposit_approval_spender: Option<Address>,
    pub gas_limit: u64,
    pub swap_deadline: Duration,
    pub account_delay: DelayWindow,
    /// Maximum number of retry attempts for failed reads
    pub max_retries: u32,
    /// Base delay in milliseconds between retry attempts
    pub retry_base_delay_ms: u64,
    pub confirmation: ConfirmationPolicy,
    /// Accounts processed at the same time. 1 keeps the strict one-by-one order.
    pub max_parallel_accounts: usize,
    pub rng_seed: Option<u64>,
}

impl Config {
    /// Creates a new Config instance by loading values from environment variables.
    /// This should be called only once during startup.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let contracts = Contracts {
            wrapped_token: env_address("WRAPPED_TOKEN_ADDRESS")?,
            bridged_token: env_address("BRIDGED_TOKEN_ADDRESS")?,
            pool: env_address("POOL_ADDRESS")?,
            router: env_address("SWAP_ROUTER_ADDRESS")?,
            bridge: env_address("BRIDGE_ADDRESS")?,
        };

        let decimals: u8 = env_or("TOKEN_DECIMALS", 18)?;
        let deposit = DepositAmount {
            base: parse_amount(&env_or("DEPOSIT_BASE", "0.0001".to_string())?, decimals)?,
            jitter_min: parse_offset(&env_or("DEPOSIT_JITTER_MIN", "0".to_string())?, decimals)?,
            jitter_max: parse_offset(&env_or("DEPOSIT_JITTER_MAX", "0".to_string())?, decimals)?,
        };

        let deposit_approval_spender = match dotenv::var("DEPOSIT_APPROVAL_SPENDER") {
            Ok(value) if !value.trim().is_empty() => {
                Some(parse_address("DEPOSIT_APPROVAL_SPENDER", &value)?)
            }
            _ => None,
        };

        let rng_seed = match dotenv::var("RNG_SEED") {
            Ok(value) => Some(value.trim().parse().map_err(|_| {
                PipelineError::InvalidEnvVar("RNG_SEED must be an unsigned integer".to_string())
            })?),
            Err(_) => None,
        };

        let config = Self {
            contracts,
            destination_chain_id: env_or("DESTINATION_CHAIN_ID", 154)?,
            deposit,
            deposit_approval_spender,
            gas_limit: env_or("GAS_LIMIT", 10_000_000)?,
            swap_deadline: env_duration("SWAP_DEADLINE", Duration::from_secs(600))?,
            account_delay: DelayWindow {
                min: env_duration("ACCOUNT_DELAY_MIN", Duration::from_secs(3))?,
                max: env_duration("ACCOUNT_DELAY_MAX", Duration::from_secs(11))?,
            },
            max_retries: env_or("MAX_RETRIES", 3)?,
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", 1000)?,
            confirmation: ConfirmationPolicy {
                required_confirmations: env_or("RECEIPT_CONFIRMATIONS", 1)?,
                timeout: env_duration("RECEIPT_TIMEOUT", Duration::from_secs(180))?,
            },
            max_parallel_accounts: env_or("MAX_PARALLEL_ACCOUNTS", 1)?,
            rng_seed,
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot produce a sane run.
    pub fn validate(&self) -> Result<()> {
        let addresses = [
            ("WRAPPED_TOKEN_ADDRESS", self.contracts.wrapped_token),
            ("BRIDGED_TOKEN_ADDRESS", self.contracts.bridged_token),
            ("POOL_ADDRESS", self.contracts.pool),
            ("SWAP_ROUTER_ADDRESS", self.contracts.router),
            ("BRIDGE_ADDRESS", self.contracts.bridge),
        ];
        for (name, address) in addresses {
            if address.is_zero() {
                return Err(PipelineError::Configuration(format!(
                    "{} must not be the zero address",
                    name
                )));
            }
        }

        if self.deposit.jitter_min > self.deposit.jitter_max {
            return Err(PipelineError::Configuration(
                "Deposit jitter minimum is above its maximum".to_string(),
            ));
        }
        if self.deposit.bounds().is_none() {
            return Err(PipelineError::Configuration(
                "Deposit amount overflows or drops below zero".to_string(),
            ));
        }
        if self.account_delay.min > self.account_delay.max {
            return Err(PipelineError::Configuration(
                "Account delay minimum is above its maximum".to_string(),
            ));
        }
        if self.gas_limit == 0 {
            return Err(PipelineError::Configuration(
                "Gas limit must be positive".to_string(),
            ));
        }
        if self.max_parallel_accounts == 0 {
            return Err(PipelineError::Configuration(
                "MAX_PARALLEL_ACCOUNTS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Runs the deposit, swap and bridge sequence over a list of accounts.
pub struct BatchOrchestrator {
    pub config: Arc<Config>,
    journal: Journal,
    progress_manager: ProgressManager,
    execution_manager: ExecutionManager,
}

impl BatchOrchestrator {
    /// Creates a new orchestrator. Fails on an invalid configuration.
    pub fn new(chain: Arc<dyn Chain>, config: Config, journal: Journal) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let jitter = Arc::new(Jitter::new(config.rng_seed));

        let transaction_manager =
            TransactionManager::new(chain, config.clone(), journal.clone());
        let pipeline = AccountPipeline::new(transaction_manager, jitter.clone());
        let progress_manager = ProgressManager::new();
        let execution_manager = ExecutionManager::new(
            pipeline,
            progress_manager.clone(),
            jitter,
            config.clone(),
            journal.clone(),
        );

        Ok(Self {
            config,
            journal,
            progress_manager,
            execution_manager,
        })
    }

    /// Runs every account's pipeline. Only configuration problems make this
    /// fail; per-account failures end up in the summary.
    pub async fn run_batch(&self, accounts: &[Account]) -> Result<BatchSummary> {
        if accounts.is_empty() {
            return Err(PipelineError::Configuration(
                "No accounts to process".to_string(),
            ));
        }

        if self.config.max_parallel_accounts > 1 {
            let mut seen = HashSet::new();
            if let Some(duplicate) = accounts.iter().find(|a| !seen.insert(a.address())) {
                return Err(PipelineError::Configuration(format!(
                    "Account {} is listed twice; parallel runs need distinct accounts",
                    duplicate
                )));
            }
        }

        self.journal.record(&format!(
            "Starting batch of {} account(s)",
            accounts.len()
        ));
        self.execution_manager.run(accounts).await
    }

    /// Prints execution statistics including time, success rate and gas spent
    pub fn print_statistics(&self, summary: &BatchSummary) {
        self.progress_manager.print_statistics(summary, &self.journal);
    }
}
