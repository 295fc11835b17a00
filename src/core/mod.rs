pub mod client;
pub mod exporter;
pub mod factory;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod resilience;

pub use crate::domain::model::{Resource, Statistics};
pub use crate::domain::ports::{DownstreamTransport, Storage};
pub use crate::utils::error::Result;
pub use client::{ClientPolicy, ResilientDownstreamClient};
pub use exporter::{ExportBundle, ReportingExporter};
pub use factory::SyntheticRecordFactory;
pub use orchestrator::{DatasetOrchestrator, RunPhase};
pub use pipeline::{BoundedBatchPipeline, PipelineSettings};
pub use registry::{Registries, UniquenessRegistry};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryPolicy};
