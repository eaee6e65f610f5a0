pub mod chain;
pub mod contracts;
pub mod error;
pub mod jitter;
pub mod journal;
pub mod pipeline;
pub mod types;
pub mod utils;

pub use chain::{Chain, RpcChain};
pub use error::{PipelineError, Result};
pub use journal::Journal;
pub use pipeline::{BatchOrchestrator, Config};
pub use types::{Account, AccountReport, BatchSummary, NonceCursor};
