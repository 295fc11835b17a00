use crate::config::toml_config::SeederConfig;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "data-seeder")]
#[command(about = "Seeds customer and account services with synthetic test data")]
pub struct CliConfig {
    /// TOML settings file; defaults apply when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub customer_url: Option<String>,

    #[arg(long, global = true)]
    pub account_url: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, global = true, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create COUNT customers
    Customers { count: usize },

    /// Create accounts for every customer already stored downstream
    Accounts {
        #[arg(long, default_value_t = 1)]
        min: usize,
        #[arg(long, default_value_t = 4)]
        max: usize,
    },

    /// Create customers, then accounts for each created customer
    FullDataset {
        #[arg(long, default_value_t = 1000)]
        customers: usize,
        #[arg(long, default_value_t = 1)]
        min: usize,
        #[arg(long, default_value_t = 4)]
        max: usize,
    },

    /// Write customers.csv, accounts.csv and jmeter_testdata.csv
    Export {
        #[arg(long)]
        output: Option<String>,
        #[arg(long)]
        zip: bool,
    },

    /// Print live record counts and circuit states
    ///
    /// Uniqueness registries only cover runs made by this process, so
    /// uniqueEmails and uniqueAccountNumbers read 0 from a fresh invocation.
    Stats,

    /// Delete every account and customer through the services
    ///
    /// Registries are per process; a later run starts empty regardless.
    Cleanup,
}

impl CliConfig {
    /// Settings file (or defaults) with command-line overrides applied, validated.
    pub fn load_settings(&self) -> Result<SeederConfig> {
        let mut settings = match &self.config {
            Some(path) => {
                tracing::debug!("Loading settings from {}", path.display());
                SeederConfig::from_file(path)?
            }
            None => SeederConfig::default(),
        };

        if let Some(url) = &self.customer_url {
            settings.services.customer.base_url = url.clone();
        }
        if let Some(url) = &self.account_url {
            settings.services.account.base_url = url.clone();
        }
        if let Command::Export { output, zip } = &self.command {
            if let Some(output) = output {
                settings.export.output_path = output.clone();
            }
            settings.export.zip |= *zip;
        }

        settings.validate()?;
        Ok(settings)
    }
}
