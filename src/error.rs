use alloy::primitives::TxHash;
use alloy_json_rpc::RpcError;
use alloy_transport::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid environment variable value: {0}")]
    InvalidEnvVar(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// RPC unreachable, timed out, or a read call failed. Safe to repeat.
    #[error("Network error: {0}")]
    Network(String),

    /// The transaction could not be built or signed locally. Never reached
    /// the node.
    #[error("Signing error: {0}")]
    Signing(String),

    /// The node refused the transaction or it reverted on-chain.
    #[error("Transaction rejected: {0}")]
    ChainRejection(String, Option<TxHash>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    /// Only network failures are worth repeating; a rejected transaction
    /// would fail again with the same nonce.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Network(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration(_)
                | PipelineError::EnvVarNotFound(_)
                | PipelineError::InvalidEnvVar(_)
        )
    }

    /// Classifies a failed `eth_sendRawTransaction`. A JSON-RPC error
    /// response means the node looked at the transaction and refused it
    /// (nonce too low, insufficient funds...); anything else is transport.
    pub fn from_submission(context: &str, err: TransportError) -> Self {
        match &err {
            RpcError::ErrorResp(payload) => {
                PipelineError::ChainRejection(format!("{}: {}", context, payload), None)
            }
            _ => PipelineError::Network(format!("{}: {}", context, err)),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
