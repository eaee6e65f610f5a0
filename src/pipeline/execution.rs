use futures::{stream, StreamExt};
use std::sync::Arc;

use crate::{
    error::Result,
    jitter::Jitter,
    journal::Journal,
    types::{
        Account, AccountReport, BatchSummary, NonceCursor, PipelineStage, StepError, StepKind,
    },
};

use super::{progress::ProgressManager, steps::AccountPipeline, Config};

/// Walks the account list, one pipeline per account, pausing in between.
pub struct ExecutionManager {
    pipeline: AccountPipeline,
    progress: ProgressManager,
    jitter: Arc<Jitter>,
    config: Arc<Config>,
    journal: Journal,
}

impl ExecutionManager {
    /// Creates a new ExecutionManager
    pub fn new(
        pipeline: AccountPipeline,
        progress: ProgressManager,
        jitter: Arc<Jitter>,
        config: Arc<Config>,
        journal: Journal,
    ) -> Self {
        Self {
            pipeline,
            progress,
            jitter,
            config,
            journal,
        }
    }

    /// Runs every account and collects the reports in list order.
    pub async fn run(&self, accounts: &[Account]) -> Result<BatchSummary> {
        let start_time = tokio::time::Instant::now();
        self.progress.reset(accounts.len());

        let reports = if self.config.max_parallel_accounts <= 1 {
            self.run_sequential(accounts).await
        } else {
            self.run_parallel(accounts).await
        };

        Ok(BatchSummary {
            reports,
            time_elapsed: start_time.elapsed(),
        })
    }

    async fn run_sequential(&self, accounts: &[Account]) -> Vec<AccountReport> {
        let mut reports = Vec::with_capacity(accounts.len());

        for (index, account) in accounts.iter().enumerate() {
            reports.push(self.process_account(index, accounts.len(), account).await);

            if index + 1 < accounts.len() {
                self.pause().await;
            }
        }

        reports
    }

    /// Runs up to `max_parallel_accounts` distinct accounts at once. Steps
    /// inside one account stay strictly sequential.
    async fn run_parallel(&self, accounts: &[Account]) -> Vec<AccountReport> {
        let total = accounts.len();

        let mut indexed: Vec<(usize, AccountReport)> = stream::iter(accounts.iter().enumerate())
            .map(|(index, account)| async move {
                let report = self.process_account(index, total, account).await;
                if index + 1 < total {
                    self.pause().await;
                }
                (index, report)
            })
            .buffer_unordered(self.config.max_parallel_accounts)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, report)| report).collect()
    }

    async fn process_account(
        &self,
        index: usize,
        total: usize,
        account: &Account,
    ) -> AccountReport {
        self.journal.record(&format!(
            "[{}/{}] Starting account {}",
            index + 1,
            total,
            account
        ));

        let report = match self
            .pipeline
            .transactions()
            .transaction_count(account.address())
            .await
        {
            Ok(start_nonce) => {
                self.pipeline
                    .run(account, NonceCursor::new(start_nonce))
                    .await
            }
            Err(error) => {
                self.journal.record(&format!(
                    "[{}] Failed to fetch starting nonce, skipping account: {}",
                    account, error
                ));
                AccountReport {
                    account: account.address(),
                    start_nonce: None,
                    next_nonce: None,
                    stage: PipelineStage::Start,
                    transactions: Vec::new(),
                    failure: Some(StepError {
                        step: StepKind::StartingNonce,
                        error,
                    }),
                }
            }
        };

        match &report.failure {
            None => self.journal.record(&format!(
                "[{}/{}] Account {} completed: {} transaction(s), next nonce {}",
                index + 1,
                total,
                account,
                report.transactions.len(),
                report.next_nonce.unwrap_or_default()
            )),
            Some(failure) => self.journal.record(&format!(
                "[{}/{}] Account {} finished with failure in {} step after {} transaction(s)",
                index + 1,
                total,
                account,
                failure.step,
                report.transactions.len()
            )),
        }

        self.progress.update_progress(&report);
        report
    }

    async fn pause(&self) {
        let delay = self.jitter.account_delay(&self.config.account_delay);
        self.journal
            .record(&format!("Waiting {:?} before the next account", delay));
        tokio::time::sleep(delay).await;
    }
}
