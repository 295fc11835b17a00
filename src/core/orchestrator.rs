use crate::core::client::ResilientDownstreamClient;
use crate::core::exporter::ReportingExporter;
use crate::core::factory::SyntheticRecordFactory;
use crate::core::pipeline::BoundedBatchPipeline;
use crate::core::registry::Registries;
use crate::domain::model::{
    AccountRequest, Accounts, BatchOutcome, CleanupSummary, Customers, DatasetRun,
    DatasetSummary,
};
use crate::utils::error::{Result, SeederError};
use crate::utils::monitor::SystemMonitor;
use crate::utils::validation::{validate_account_range, validate_customer_count};
use parking_lot::Mutex;
use rand::Rng;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    GeneratingCustomers,
    GeneratingAccounts,
    Done,
}

/// Sequences customer generation before account generation so every account
/// references a customer id that was created by an already completed batch.
pub struct DatasetOrchestrator {
    customers: ResilientDownstreamClient<Customers>,
    accounts: ResilientDownstreamClient<Accounts>,
    customer_pipeline: BoundedBatchPipeline,
    account_pipeline: BoundedBatchPipeline,
    factory: SyntheticRecordFactory,
    cancel: Mutex<CancellationToken>,
    phase: Mutex<RunPhase>,
    monitor: SystemMonitor,
}

impl DatasetOrchestrator {
    pub fn new(
        customers: ResilientDownstreamClient<Customers>,
        accounts: ResilientDownstreamClient<Accounts>,
        customer_pipeline: BoundedBatchPipeline,
        account_pipeline: BoundedBatchPipeline,
    ) -> Self {
        Self {
            customers,
            accounts,
            customer_pipeline,
            account_pipeline,
            factory: SyntheticRecordFactory::new(Registries::new()),
            cancel: Mutex::new(CancellationToken::new()),
            phase: Mutex::new(RunPhase::Idle),
            monitor: SystemMonitor::default(),
        }
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    pub fn registries(&self) -> &Registries {
        self.factory.registries()
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.lock()
    }

    /// Token observed between batches by the active (or next) run. Once a
    /// cancelled run ends, later runs get a fresh token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    pub fn exporter(&self) -> ReportingExporter {
        ReportingExporter::new(
            self.customers.clone(),
            self.accounts.clone(),
            self.registries().clone(),
        )
        .with_fallback_keys(self.factory.fallback_count())
    }

    pub async fn generate_customers(&self, count: usize) -> Result<DatasetRun> {
        validate_customer_count(count)?;
        tracing::info!("Starting generation of {} customers via API", count);
        let started = Instant::now();
        let cancel = self.cancellation_token();

        let outcome = self.customer_phase(count, &cancel).await;
        self.finish_run();

        let (customers, failures) = outcome.into_parts();
        let summary =
            DatasetSummary::new(customers.len(), 0, failures.len(), started.elapsed());
        tracing::info!("Successfully generated {} customers via API", customers.len());

        Ok(DatasetRun {
            summary,
            customers,
            accounts: Vec::new(),
            failures,
        })
    }

    /// Phase two on its own, for explicitly supplied customer ids.
    pub async fn generate_accounts_for_customers(
        &self,
        customer_ids: &[i64],
        min_per_customer: usize,
        max_per_customer: usize,
    ) -> Result<DatasetRun> {
        validate_account_range(min_per_customer, max_per_customer)?;
        let started = Instant::now();
        let cancel = self.cancellation_token();

        let (accounts, failures) = self
            .account_phase(customer_ids, min_per_customer, max_per_customer, &cancel)
            .await
            .into_parts();
        self.finish_run();

        let summary = DatasetSummary::new(0, accounts.len(), failures.len(), started.elapsed())
            .with_customers_processed(customer_ids.len());

        Ok(DatasetRun {
            summary,
            customers: Vec::new(),
            accounts,
            failures,
        })
    }

    pub async fn generate_accounts_for_existing_customers(
        &self,
        min_per_customer: usize,
        max_per_customer: usize,
    ) -> Result<DatasetRun> {
        validate_account_range(min_per_customer, max_per_customer)?;
        tracing::info!(
            "Starting generation of accounts for existing customers: {}-{} accounts per customer",
            min_per_customer,
            max_per_customer
        );
        let started = Instant::now();

        let customer_ids: Vec<i64> = self
            .customers
            .list_all()
            .await?
            .iter()
            .map(|customer| customer.id)
            .collect();

        if customer_ids.is_empty() {
            tracing::info!("No existing customers found, nothing to generate");
            let summary = DatasetSummary::new(0, 0, 0, started.elapsed())
                .with_customers_processed(0)
                .with_message("No existing customers found");
            return Ok(DatasetRun {
                summary,
                customers: Vec::new(),
                accounts: Vec::new(),
                failures: Vec::new(),
            });
        }

        let mut run = self
            .generate_accounts_for_customers(&customer_ids, min_per_customer, max_per_customer)
            .await?;
        run.summary = DatasetSummary::new(
            0,
            run.accounts.len(),
            run.failures.len(),
            started.elapsed(),
        )
        .with_customers_processed(customer_ids.len());

        tracing::info!(
            "Successfully generated accounts for existing customers: {} customers, {} accounts",
            customer_ids.len(),
            run.accounts.len()
        );
        Ok(run)
    }

    /// Customers first, then accounts for whichever customers were created.
    /// Fails only when no customer at all could be created.
    pub async fn generate_full_dataset(
        &self,
        customer_count: usize,
        min_per_customer: usize,
        max_per_customer: usize,
    ) -> Result<DatasetRun> {
        validate_customer_count(customer_count)?;
        validate_account_range(min_per_customer, max_per_customer)?;
        tracing::info!(
            "Starting full dataset generation: {} customers, {}-{} accounts per customer",
            customer_count,
            min_per_customer,
            max_per_customer
        );
        let started = Instant::now();
        let cancel = self.cancellation_token();

        let customer_outcome = self.customer_phase(customer_count, &cancel).await;
        let customer_ids = customer_outcome.succeeded_ids();
        let customers_cancelled = customer_outcome.cancelled;
        let (customers, mut failures) = customer_outcome.into_parts();

        if customer_ids.is_empty() {
            self.finish_run();
            let err = if customers_cancelled {
                SeederError::Cancelled
            } else {
                SeederError::NoCustomersCreated {
                    requested: customer_count,
                }
            };
            tracing::error!("Full dataset generation aborted: {}", err);
            return Err(err);
        }

        let (accounts, account_failures) = if cancel.is_cancelled() {
            tracing::warn!("Run cancelled after customer phase, skipping accounts");
            (Vec::new(), Vec::new())
        } else {
            self.account_phase(&customer_ids, min_per_customer, max_per_customer, &cancel)
                .await
                .into_parts()
        };
        failures.extend(account_failures);
        self.finish_run();
        self.monitor.log_final_stats();

        let summary = DatasetSummary::new(
            customers.len(),
            accounts.len(),
            failures.len(),
            started.elapsed(),
        )
        .with_customers_processed(customer_ids.len());
        tracing::info!(
            "Successfully generated full dataset: {} customers, {} accounts",
            customers.len(),
            accounts.len()
        );

        Ok(DatasetRun {
            summary,
            customers,
            accounts,
            failures,
        })
    }

    /// Deletes every downstream account and forgets the reserved account numbers.
    pub async fn delete_all_accounts(&self) -> Result<usize> {
        let deleted = self.accounts.delete_all().await?;
        self.registries().account_numbers.clear();
        Ok(deleted)
    }

    /// Deletes every downstream customer and forgets the reserved emails.
    /// Accounts still referencing them are left to the account service.
    pub async fn delete_all_customers(&self) -> Result<usize> {
        let deleted = self.customers.delete_all().await?;
        self.registries().emails.clear();
        Ok(deleted)
    }

    /// Accounts before customers, then both registries are reset.
    pub async fn clear_all_data(&self) -> Result<CleanupSummary> {
        tracing::info!("Clearing all test data via APIs");
        let started = Instant::now();

        let accounts_deleted = self.delete_all_accounts().await?;
        let customers_deleted = self.delete_all_customers().await?;

        tracing::info!(
            "Successfully cleared all test data: {} accounts, {} customers",
            accounts_deleted,
            customers_deleted
        );
        Ok(CleanupSummary {
            accounts_deleted,
            customers_deleted,
            execution_time_ms: started.elapsed().as_millis(),
            message: "All test data cleared successfully via APIs".to_string(),
        })
    }

    async fn customer_phase(
        &self,
        count: usize,
        cancel: &CancellationToken,
    ) -> BatchOutcome<Customers> {
        self.set_phase(RunPhase::GeneratingCustomers);
        self.monitor.log_stats("Generating customers");

        let requests = (0..count).map(|_| self.factory.next_customer()).collect();
        self.customer_pipeline
            .run(&self.customers, requests, cancel)
            .await
    }

    async fn account_phase(
        &self,
        customer_ids: &[i64],
        min_per_customer: usize,
        max_per_customer: usize,
        cancel: &CancellationToken,
    ) -> BatchOutcome<Accounts> {
        self.set_phase(RunPhase::GeneratingAccounts);
        self.monitor.log_stats("Generating accounts");
        tracing::info!(
            "Starting generation of accounts for {} customers via API",
            customer_ids.len()
        );

        let requests = self.account_requests(customer_ids, min_per_customer, max_per_customer);
        self.account_pipeline
            .run(&self.accounts, requests, cancel)
            .await
    }

    fn account_requests(
        &self,
        customer_ids: &[i64],
        min_per_customer: usize,
        max_per_customer: usize,
    ) -> Vec<AccountRequest> {
        let mut rng = rand::thread_rng();
        let mut requests = Vec::new();
        for &customer_id in customer_ids {
            let count = rng.gen_range(min_per_customer..=max_per_customer);
            for _ in 0..count {
                requests.push(self.factory.next_account(customer_id));
            }
        }
        requests
    }

    fn finish_run(&self) {
        self.set_phase(RunPhase::Done);
        let mut cancel = self.cancel.lock();
        if cancel.is_cancelled() {
            tracing::debug!("Cancelled run ended, arming a fresh cancellation token");
            *cancel = CancellationToken::new();
        }
    }

    fn set_phase(&self, phase: RunPhase) {
        let mut current = self.phase.lock();
        if *current != phase {
            tracing::debug!("Run phase {:?} -> {:?}", *current, phase);
            *current = phase;
        }
    }
}
