pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};
pub use config::SeederConfig;

pub use adapters::{HttpSettings, HttpTransport, LocalStorage};
pub use core::{
    BoundedBatchPipeline, ClientPolicy, DatasetOrchestrator, PipelineSettings, ReportingExporter,
    ResilientDownstreamClient, SyntheticRecordFactory,
};
pub use domain::model::{Accounts, Customers};
pub use utils::error::{Result, SeederError};
