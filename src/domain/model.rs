use crate::utils::error::SeederError;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

/// A downstream collection the seeder can populate.
pub trait Resource: Send + Sync + 'static {
    type Request: Serialize + Clone + Debug + Send + Sync + Into<GenerationRequest> + 'static;
    type Record: DeserializeOwned + Clone + Debug + Send + Sync + 'static;

    /// Path segment of the collection, e.g. `POST /customer`.
    const PATH: &'static str;

    fn record_id(record: &Self::Record) -> i64;
}

#[derive(Debug)]
pub struct Customers;

#[derive(Debug)]
pub struct Accounts;

impl Resource for Customers {
    type Request = CustomerRequest;
    type Record = CustomerRecord;

    const PATH: &'static str = "customer";

    fn record_id(record: &CustomerRecord) -> i64 {
        record.id
    }
}

impl Resource for Accounts {
    type Request = AccountRequest;
    type Record = AccountRecord;

    const PATH: &'static str = "account";

    fn record_id(record: &AccountRecord) -> i64 {
        record.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest {
    pub account_number: String,
    pub account_type: AccountType,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub customer_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationRequest {
    Customer(CustomerRequest),
    Account(AccountRequest),
}

impl From<CustomerRequest> for GenerationRequest {
    fn from(request: CustomerRequest) -> Self {
        GenerationRequest::Customer(request)
    }
}

impl From<AccountRequest> for GenerationRequest {
    fn from(request: AccountRequest) -> Self {
        GenerationRequest::Account(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Savings,
    Current,
    FixedDeposit,
    Salary,
    Business,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Savings,
        AccountType::Current,
        AccountType::FixedDeposit,
        AccountType::Salary,
        AccountType::Business,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "SAVINGS",
            AccountType::Current => "CURRENT",
            AccountType::FixedDeposit => "FIXED_DEPOSIT",
            AccountType::Salary => "SALARY",
            AccountType::Business => "BUSINESS",
        }
    }

    /// Inclusive balance bounds in whole currency units.
    pub fn balance_range(&self) -> (i64, i64) {
        balance_range_for(self.as_str())
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Balance bounds by type name; names outside the known set get `100..=10000`.
pub fn balance_range_for(account_type: &str) -> (i64, i64) {
    match account_type {
        "SAVINGS" => (100, 75_000),
        "CURRENT" => (1_000, 150_000),
        "FIXED_DEPOSIT" => (10_000, 1_000_000),
        "SALARY" => (500, 50_000),
        "BUSINESS" => (5_000, 500_000),
        _ => (100, 10_000),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: i64,
    pub account_number: String,
    pub account_type: String,
    pub balance: Decimal,
    pub customer_id: i64,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug)]
pub struct FailedRequest<Req> {
    pub request: Req,
    pub error: SeederError,
}

/// Result of driving one request sequence through the batch pipeline.
#[derive(Debug)]
pub struct BatchOutcome<R: Resource> {
    pub requested: usize,
    pub succeeded: Vec<R::Record>,
    pub failed: Vec<FailedRequest<R::Request>>,
    /// Set when cancellation stopped the pipeline before every chunk was admitted.
    pub cancelled: bool,
}

impl<R: Resource> BatchOutcome<R> {
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            succeeded: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
        }
    }

    /// Requests never admitted because of cancellation.
    pub fn skipped(&self) -> usize {
        self.requested
            .saturating_sub(self.succeeded.len() + self.failed.len())
    }

    pub fn succeeded_ids(&self) -> Vec<i64> {
        self.succeeded.iter().map(R::record_id).collect()
    }

    /// Flattens per-record failures into their serializable form.
    pub fn into_parts(self) -> (Vec<R::Record>, Vec<FailedGeneration>) {
        let failures = self
            .failed
            .into_iter()
            .map(|failed| FailedGeneration {
                request: failed.request.into(),
                error: failed.error.to_string(),
            })
            .collect();
        (self.succeeded, failures)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedGeneration {
    pub request: GenerationRequest,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub customers_generated: usize,
    pub accounts_generated: usize,
    pub total_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customers_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_accounts_per_customer: Option<f64>,
    pub failed_records: usize,
    pub execution_time_ms: u128,
    pub execution_time_minutes: f64,
    pub records_per_second: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DatasetSummary {
    pub fn new(
        customers_generated: usize,
        accounts_generated: usize,
        failed_records: usize,
        elapsed: Duration,
    ) -> Self {
        let total_records = customers_generated + accounts_generated;
        let seconds = elapsed.as_secs_f64();
        let records_per_second = if seconds > 0.0 {
            total_records as f64 / seconds
        } else {
            0.0
        };

        Self {
            customers_generated,
            accounts_generated,
            total_records,
            customers_processed: None,
            average_accounts_per_customer: None,
            failed_records,
            execution_time_ms: elapsed.as_millis(),
            execution_time_minutes: seconds / 60.0,
            records_per_second,
            message: None,
        }
    }

    pub fn with_customers_processed(mut self, customers_processed: usize) -> Self {
        self.customers_processed = Some(customers_processed);
        self.average_accounts_per_customer = if customers_processed > 0 {
            Some(self.accounts_generated as f64 / customers_processed as f64)
        } else {
            Some(0.0)
        };
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRun {
    pub summary: DatasetSummary,
    pub customers: Vec<CustomerRecord>,
    pub accounts: Vec<AccountRecord>,
    pub failures: Vec<FailedGeneration>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_customers: usize,
    pub total_accounts: usize,
    pub unique_emails: usize,
    pub unique_account_numbers: usize,
    pub fallback_keys: usize,
    pub customer_service_circuit: String,
    pub account_service_circuit: String,
    pub last_generated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    pub accounts_deleted: usize,
    pub customers_deleted: usize,
    pub execution_time_ms: u128,
    pub message: String,
}
