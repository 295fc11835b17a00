use crate::adapters::http::{HttpSettings, HttpTransport};
use crate::core::client::{ClientPolicy, ResilientDownstreamClient};
use crate::core::orchestrator::DatasetOrchestrator;
use crate::core::pipeline::{BoundedBatchPipeline, PipelineSettings};
use crate::core::resilience::{CircuitBreakerConfig, RetryPolicy};
use crate::utils::error::{Result, SeederError};
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const CUSTOMER_SERVICE: &str = "customer-service";
pub const ACCOUNT_SERVICE: &str = "account-service";

const DEFAULT_CUSTOMER_CONCURRENCY: usize = 10;
const DEFAULT_ACCOUNT_CONCURRENCY: usize = 15;

/// Settings file for the seeder. Every section is optional; an empty file
/// yields the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeederConfig {
    pub services: ServicesConfig,
    pub seeding: SeedingConfig,
    pub http: HttpConfig,
    pub resilience: ResilienceConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ServicesSection")]
pub struct ServicesConfig {
    pub customer: ServiceConfig,
    pub account: ServiceConfig,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            customer: ServiceConfig::customer(),
            account: ServiceConfig::account(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceConfig {
    pub base_url: String,
    /// In-flight creates for this service; falls back to the per-service default.
    pub max_concurrency: Option<usize>,
}

impl ServiceConfig {
    fn customer() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            max_concurrency: Some(DEFAULT_CUSTOMER_CONCURRENCY),
        }
    }

    fn account() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            max_concurrency: Some(DEFAULT_ACCOUNT_CONCURRENCY),
        }
    }
}

/// `[services]` as written on disk; absent keys take that service's default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServicesSection {
    customer: ServiceSection,
    account: ServiceSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceSection {
    base_url: Option<String>,
    max_concurrency: Option<usize>,
}

impl ServiceSection {
    fn or_defaults(self, defaults: ServiceConfig) -> ServiceConfig {
        ServiceConfig {
            base_url: self.base_url.unwrap_or(defaults.base_url),
            max_concurrency: self.max_concurrency.or(defaults.max_concurrency),
        }
    }
}

impl From<ServicesSection> for ServicesConfig {
    fn from(section: ServicesSection) -> Self {
        Self {
            customer: section.customer.or_defaults(ServiceConfig::customer()),
            account: section.account.or_defaults(ServiceConfig::account()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedingConfig {
    pub batch_size: usize,
    /// Ceiling for any service's concurrency.
    pub max_concurrent_requests: usize,
    pub request_delay_ms: u64,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_concurrent_requests: 50,
            request_delay_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub max_idle_connections: usize,
    pub call_deadline_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            read_timeout_ms: 30000,
            max_idle_connections: 200,
            call_deadline_ms: 120000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 30000,
            jitter: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSection {
    pub window_size: usize,
    pub minimum_calls: usize,
    pub failure_rate_threshold: f64,
    pub open_duration_ms: u64,
    pub half_open_probes: u32,
}

impl Default for CircuitBreakerSection {
    fn default() -> Self {
        Self {
            window_size: 100,
            minimum_calls: 10,
            failure_rate_threshold: 50.0,
            open_duration_ms: 60000,
            half_open_probes: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_path: String,
    pub zip: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: "./output".to_string(),
            zip: false,
        }
    }
}

impl SeederConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SeederError::Config {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            connect_timeout: Duration::from_millis(self.http.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.http.read_timeout_ms),
            max_idle_connections: self.http.max_idle_connections,
        }
    }

    pub fn client_policy(&self) -> ClientPolicy {
        let retry = &self.resilience.retry;
        let breaker = &self.resilience.circuit_breaker;

        ClientPolicy {
            retry: RetryPolicy {
                max_retries: retry.max_retries,
                base_delay: Duration::from_millis(retry.base_delay_ms),
                multiplier: retry.multiplier,
                max_delay: Duration::from_millis(retry.max_delay_ms),
                jitter: retry.jitter,
            },
            circuit_breaker: CircuitBreakerConfig {
                window_size: breaker.window_size,
                minimum_calls: breaker.minimum_calls,
                failure_rate_threshold: breaker.failure_rate_threshold,
                open_duration: Duration::from_millis(breaker.open_duration_ms),
                half_open_probes: breaker.half_open_probes,
            },
            call_deadline: Duration::from_millis(self.http.call_deadline_ms),
            ..ClientPolicy::default()
        }
    }

    pub fn customer_pipeline_settings(&self) -> PipelineSettings {
        self.pipeline_settings(
            self.services
                .customer
                .max_concurrency
                .unwrap_or(DEFAULT_CUSTOMER_CONCURRENCY),
        )
    }

    pub fn account_pipeline_settings(&self) -> PipelineSettings {
        self.pipeline_settings(
            self.services
                .account
                .max_concurrency
                .unwrap_or(DEFAULT_ACCOUNT_CONCURRENCY),
        )
    }

    fn pipeline_settings(&self, service_concurrency: usize) -> PipelineSettings {
        PipelineSettings {
            batch_size: self.seeding.batch_size,
            max_concurrency: service_concurrency.min(self.seeding.max_concurrent_requests),
            inter_batch_delay: Duration::from_millis(self.seeding.request_delay_ms),
        }
    }

    pub fn customer_transport(&self) -> Result<HttpTransport> {
        HttpTransport::new(
            CUSTOMER_SERVICE,
            &self.services.customer.base_url,
            &self.http_settings(),
        )
    }

    pub fn account_transport(&self) -> Result<HttpTransport> {
        HttpTransport::new(
            ACCOUNT_SERVICE,
            &self.services.account.base_url,
            &self.http_settings(),
        )
    }

    /// Wires HTTP transports, resilient clients and pipelines for both services.
    pub fn orchestrator(&self) -> Result<DatasetOrchestrator> {
        let policy = self.client_policy();
        let customers = ResilientDownstreamClient::new(
            Arc::new(self.customer_transport()?),
            policy.clone(),
        );
        let accounts =
            ResilientDownstreamClient::new(Arc::new(self.account_transport()?), policy);

        Ok(DatasetOrchestrator::new(
            customers,
            accounts,
            BoundedBatchPipeline::new(self.customer_pipeline_settings()),
            BoundedBatchPipeline::new(self.account_pipeline_settings()),
        ))
    }
}

impl Validate for SeederConfig {
    fn validate(&self) -> Result<()> {
        validate_url("services.customer.base_url", &self.services.customer.base_url)?;
        validate_url("services.account.base_url", &self.services.account.base_url)?;
        if let Some(concurrency) = self.services.customer.max_concurrency {
            validate_positive_number("services.customer.max_concurrency", concurrency, 1)?;
        }
        if let Some(concurrency) = self.services.account.max_concurrency {
            validate_positive_number("services.account.max_concurrency", concurrency, 1)?;
        }

        validate_positive_number("seeding.batch_size", self.seeding.batch_size, 1)?;
        validate_positive_number(
            "seeding.max_concurrent_requests",
            self.seeding.max_concurrent_requests,
            1,
        )?;

        validate_positive_number(
            "http.connect_timeout_ms",
            self.http.connect_timeout_ms as usize,
            1,
        )?;
        validate_positive_number("http.read_timeout_ms", self.http.read_timeout_ms as usize, 1)?;
        validate_positive_number("http.call_deadline_ms", self.http.call_deadline_ms as usize, 1)?;

        let retry = &self.resilience.retry;
        validate_range("resilience.retry.jitter", retry.jitter, 0.0, 1.0)?;
        if retry.multiplier < 1.0 {
            return Err(SeederError::validation(
                "resilience.retry.multiplier",
                retry.multiplier,
                "Multiplier must be at least 1.0",
            ));
        }

        let breaker = &self.resilience.circuit_breaker;
        validate_positive_number("resilience.circuit_breaker.window_size", breaker.window_size, 1)?;
        validate_range(
            "resilience.circuit_breaker.minimum_calls",
            breaker.minimum_calls,
            1,
            breaker.window_size,
        )?;
        if breaker.failure_rate_threshold <= 0.0 || breaker.failure_rate_threshold > 100.0 {
            return Err(SeederError::validation(
                "resilience.circuit_breaker.failure_rate_threshold",
                breaker.failure_rate_threshold,
                "Threshold must be greater than 0 and at most 100",
            ));
        }
        validate_positive_number(
            "resilience.circuit_breaker.half_open_probes",
            breaker.half_open_probes as usize,
            1,
        )?;

        validate_path("export.output_path", &self.export.output_path)
    }
}
