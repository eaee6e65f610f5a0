use alloy::primitives::utils::format_units;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{info, info_span, warn};

use crate::{
    journal::Journal,
    types::{AccountReport, BatchSummary},
};

/// Running counters for the current batch.
#[derive(Debug, Clone)]
pub struct ProgressStats {
    pub total_accounts: usize,
    pub completed_accounts: usize,
    pub successful_accounts: usize,
    pub transactions_submitted: usize,
    pub start_time: Instant,
}

impl ProgressStats {
    pub fn new(total_accounts: usize) -> Self {
        Self {
            total_accounts,
            completed_accounts: 0,
            successful_accounts: 0,
            transactions_submitted: 0,
            start_time: Instant::now(),
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.completed_accounts == 0 {
            return 0.0;
        }
        self.successful_accounts as f64 / self.completed_accounts as f64 * 100.0
    }

    pub fn accounts_per_minute(&self) -> f64 {
        let minutes = self.start_time.elapsed().as_secs_f64() / 60.0;
        if minutes == 0.0 {
            return 0.0;
        }
        self.completed_accounts as f64 / minutes
    }

    pub fn estimated_time_remaining(&self) -> Option<Duration> {
        if self.completed_accounts == 0 {
            return None;
        }
        let per_account = self.start_time.elapsed() / self.completed_accounts as u32;
        let remaining = self.total_accounts.saturating_sub(self.completed_accounts);
        Some(per_account * remaining as u32)
    }
}

/// Manages progress tracking and reporting
#[derive(Clone)]
pub struct ProgressManager {
    progress: Arc<Mutex<ProgressStats>>,
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressManager {
    /// Creates a new ProgressManager
    pub fn new() -> Self {
        Self {
            progress: Arc::new(Mutex::new(ProgressStats::new(0))),
        }
    }

    pub fn reset(&self, total_accounts: usize) {
        *self.progress.lock() = ProgressStats::new(total_accounts);
    }

    pub fn snapshot(&self) -> ProgressStats {
        self.progress.lock().clone()
    }

    /// Updates progress statistics and prints current status
    pub fn update_progress(&self, report: &AccountReport) {
        let mut progress = self.progress.lock();
        progress.completed_accounts += 1;
        if report.succeeded() {
            progress.successful_accounts += 1;
        }
        progress.transactions_submitted += report.transactions.len();

        let progress_percent = if progress.total_accounts == 0 {
            100.0
        } else {
            progress.completed_accounts as f64 / progress.total_accounts as f64 * 100.0
        };
        let time_remaining = progress
            .estimated_time_remaining()
            .map(|d| format!("{:.1} minutes", d.as_secs_f64() / 60.0))
            .unwrap_or_else(|| "calculating...".to_string());

        info!(
            completed = progress.completed_accounts,
            total = progress.total_accounts,
            progress_percent = %format!("{:.1}%", progress_percent),
            success_rate = %format!("{:.1}%", progress.success_rate()),
            transactions = progress.transactions_submitted,
            accounts_per_minute = %format!("{:.1}", progress.accounts_per_minute()),
            %time_remaining,
            "Progress update"
        );
    }

    /// Prints execution statistics including time, success rate and gas spent
    pub fn print_statistics(&self, summary: &BatchSummary, journal: &Journal) {
        let stats_span = info_span!("execution_statistics");
        let _guard = stats_span.enter();

        let total = summary.reports.len();
        let gas_cost = format_units(summary.total_gas_cost(), "ether").unwrap_or_default();

        info!(
            duration = ?summary.time_elapsed,
            accounts = total,
            successful = summary.successful_accounts(),
            transactions = summary.transactions_submitted(),
            gas_cost_eth = %gas_cost,
            "Execution completed"
        );
        journal.record(&format!(
            "Batch complete: {}/{} account(s) succeeded, {} transaction(s), {} ETH gas, {:?} elapsed",
            summary.successful_accounts(),
            total,
            summary.transactions_submitted(),
            gas_cost,
            summary.time_elapsed
        ));

        let failures: Vec<_> = summary.failed_accounts().collect();
        if failures.is_empty() {
            return;
        }

        let error_span = info_span!("error_summary");
        let _error_guard = error_span.enter();

        warn!(error_count = failures.len(), "Errors occurred during execution");
        for report in failures {
            if let Some(failure) = &report.failure {
                warn!(
                    account = %report.account,
                    step = %failure.step,
                    error = %failure.error,
                    transactions = report.transactions.len(),
                    "Account failed"
                );
            }
        }
    }
}
