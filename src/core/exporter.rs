use crate::core::client::ResilientDownstreamClient;
use crate::core::registry::Registries;
use crate::domain::model::{AccountRecord, Accounts, CustomerRecord, Customers, Statistics};
use crate::domain::ports::Storage;
use crate::utils::error::{Result, SeederError};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const CUSTOMERS_FILE: &str = "customers.csv";
pub const ACCOUNTS_FILE: &str = "accounts.csv";
pub const JOINED_FILE: &str = "jmeter_testdata.csv";
pub const BUNDLE_FILE: &str = "seed_export.zip";

const CUSTOMER_HEADER: [&str; 4] = ["id", "name", "email", "phone"];
const ACCOUNT_HEADER: [&str; 5] = ["id", "accountNumber", "accountType", "balance", "customerId"];
const JOINED_HEADER: [&str; 8] = [
    "customerId",
    "customerName",
    "customerEmail",
    "customerPhone",
    "accountId",
    "accountNumber",
    "accountType",
    "balance",
];

#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub customers_csv: String,
    pub accounts_csv: String,
    pub joined_csv: String,
}

/// CSV and statistics views over the live downstream collections.
pub struct ReportingExporter {
    customers: ResilientDownstreamClient<Customers>,
    accounts: ResilientDownstreamClient<Accounts>,
    registries: Registries,
    fallback_keys: usize,
}

impl ReportingExporter {
    pub fn new(
        customers: ResilientDownstreamClient<Customers>,
        accounts: ResilientDownstreamClient<Accounts>,
        registries: Registries,
    ) -> Self {
        Self {
            customers,
            accounts,
            registries,
            fallback_keys: 0,
        }
    }

    pub fn with_fallback_keys(mut self, fallback_keys: usize) -> Self {
        self.fallback_keys = fallback_keys;
        self
    }

    pub async fn export_customers_csv(&self) -> Result<String> {
        tracing::info!("Exporting customers CSV");
        let customers = self.customers.list_all().await?;
        let csv = customers_csv(&customers)?;
        tracing::info!("Exported {} customers", customers.len());
        Ok(csv)
    }

    pub async fn export_accounts_csv(&self) -> Result<String> {
        tracing::info!("Exporting accounts CSV");
        let accounts = self.accounts.list_all().await?;
        let csv = accounts_csv(&accounts)?;
        tracing::info!("Exported {} accounts", accounts.len());
        Ok(csv)
    }

    /// One row per account whose customer still exists.
    pub async fn export_joined_csv(&self) -> Result<String> {
        tracing::info!("Exporting joined load-test data CSV");
        let (customers, accounts) =
            tokio::try_join!(self.customers.list_all(), self.accounts.list_all())?;
        joined_csv(&customers, &accounts)
    }

    /// All three views from a single scan of each collection.
    pub async fn export_all(&self) -> Result<ExportBundle> {
        let (customers, accounts) =
            tokio::try_join!(self.customers.list_all(), self.accounts.list_all())?;

        let bundle = ExportBundle {
            customers_csv: customers_csv(&customers)?,
            accounts_csv: accounts_csv(&accounts)?,
            joined_csv: joined_csv(&customers, &accounts)?,
        };
        tracing::info!(
            "Exported {} customers and {} accounts",
            customers.len(),
            accounts.len()
        );
        Ok(bundle)
    }

    /// Writes the three files, or a single zip holding them, and returns the
    /// names written.
    pub async fn write_bundle<S: Storage>(
        &self,
        storage: &S,
        bundle: &ExportBundle,
        zip: bool,
    ) -> Result<Vec<String>> {
        let files = [
            (CUSTOMERS_FILE, &bundle.customers_csv),
            (ACCOUNTS_FILE, &bundle.accounts_csv),
            (JOINED_FILE, &bundle.joined_csv),
        ];

        if zip {
            let zip_data = {
                let mut archive = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for (name, content) in files {
                    archive.start_file(name, SimpleFileOptions::default())?;
                    archive.write_all(content.as_bytes())?;
                }
                archive.finish()?.into_inner()
            };

            tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
            storage.write_file(BUNDLE_FILE, &zip_data).await?;
            return Ok(vec![BUNDLE_FILE.to_string()]);
        }

        let mut written = Vec::with_capacity(files.len());
        for (name, content) in files {
            storage.write_file(name, content.as_bytes()).await?;
            written.push(name.to_string());
        }
        Ok(written)
    }

    /// Live counts plus registry sizes; independent of the join.
    pub async fn statistics(&self) -> Result<Statistics> {
        let (total_customers, total_accounts) =
            tokio::try_join!(self.customers.count(), self.accounts.count())?;

        Ok(Statistics {
            total_customers,
            total_accounts,
            unique_emails: self.registries.emails.len(),
            unique_account_numbers: self.registries.account_numbers.len(),
            fallback_keys: self.fallback_keys,
            customer_service_circuit: self.customers.circuit_state().to_string(),
            account_service_circuit: self.accounts.circuit_state().to_string(),
            last_generated: chrono::Utc::now(),
        })
    }
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().map_err(|e| SeederError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| SeederError::Io(std::io::Error::other(e)))
}

fn money(balance: &Decimal) -> String {
    format!("{:.2}", balance)
}

pub fn customers_csv(customers: &[CustomerRecord]) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record(CUSTOMER_HEADER)?;
    for customer in customers {
        let id = customer.id.to_string();
        writer.write_record([
            id.as_str(),
            customer.name.as_str(),
            customer.email.as_str(),
            customer.phone.as_str(),
        ])?;
    }
    finish(writer)
}

pub fn accounts_csv(accounts: &[AccountRecord]) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record(ACCOUNT_HEADER)?;
    for account in accounts {
        let (id, balance, customer_id) = (
            account.id.to_string(),
            money(&account.balance),
            account.customer_id.to_string(),
        );
        writer.write_record([
            id.as_str(),
            account.account_number.as_str(),
            account.account_type.as_str(),
            balance.as_str(),
            customer_id.as_str(),
        ])?;
    }
    finish(writer)
}

pub fn joined_csv(customers: &[CustomerRecord], accounts: &[AccountRecord]) -> Result<String> {
    let by_id: HashMap<i64, &CustomerRecord> =
        customers.iter().map(|customer| (customer.id, customer)).collect();

    let mut writer = csv_writer();
    writer.write_record(JOINED_HEADER)?;
    let mut orphans = 0;
    for account in accounts {
        let Some(customer) = by_id.get(&account.customer_id) else {
            orphans += 1;
            continue;
        };
        let (customer_id, account_id, balance) = (
            customer.id.to_string(),
            account.id.to_string(),
            money(&account.balance),
        );
        writer.write_record([
            customer_id.as_str(),
            customer.name.as_str(),
            customer.email.as_str(),
            customer.phone.as_str(),
            account_id.as_str(),
            account.account_number.as_str(),
            account.account_type.as_str(),
            balance.as_str(),
        ])?;
    }

    if orphans > 0 {
        tracing::warn!("Skipped {} accounts whose customer no longer exists", orphans);
    }
    finish(writer)
}
