#![allow(dead_code)]

use async_trait::async_trait;
use data_seeder::core::resilience::{CircuitBreakerConfig, RetryPolicy};
use data_seeder::domain::ports::DownstreamTransport;
use data_seeder::utils::error::{Result, SeederError};
use data_seeder::{
    BoundedBatchPipeline, ClientPolicy, DatasetOrchestrator, PipelineSettings,
    ResilientDownstreamClient,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Customer and account collections shared by both stub services, so account
/// creation can enforce the customer foreign key like the real services do.
#[derive(Default)]
pub struct Backend {
    customers: Mutex<BTreeMap<i64, Value>>,
    accounts: Mutex<BTreeMap<i64, Value>>,
    next_id: AtomicI64,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub posts: AtomicUsize,
    /// Every n-th customer POST is rejected with 400; zero disables.
    pub reject_every_nth_customer: AtomicUsize,
    /// Every call answers 503 while set.
    pub unavailable: AtomicBool,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn customers(&self) -> Vec<Value> {
        self.customers.lock().values().cloned().collect()
    }

    pub fn accounts(&self) -> Vec<Value> {
        self.accounts.lock().values().cloned().collect()
    }

    pub fn transport(self: &Arc<Self>, service: &'static str) -> Arc<StubService> {
        Arc::new(StubService {
            service,
            backend: Arc::clone(self),
        })
    }

    fn collection(&self, name: &str) -> Option<&Mutex<BTreeMap<i64, Value>>> {
        match name {
            "customer" => Some(&self.customers),
            "account" => Some(&self.accounts),
            _ => None,
        }
    }
}

pub struct StubService {
    service: &'static str,
    backend: Arc<Backend>,
}

impl StubService {
    fn reject(&self, status: u16, body: &str) -> SeederError {
        SeederError::DownstreamRejected {
            service: self.service.to_string(),
            status,
            body: body.to_string(),
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.backend.unavailable.load(Ordering::SeqCst) {
            return Err(self.reject(503, "service unavailable"));
        }
        Ok(())
    }

    fn insert(&self, path: &str, mut body: Value, post_number: usize) -> Result<Value> {
        let backend = &self.backend;
        match path {
            "customer" => {
                let nth = backend.reject_every_nth_customer.load(Ordering::SeqCst);
                if nth > 0 && post_number % nth == 0 {
                    return Err(self.reject(400, "customer rejected"));
                }
            }
            "account" => {
                let customer_id = body["customerId"].as_i64().unwrap_or_default();
                if !backend.customers.lock().contains_key(&customer_id) {
                    return Err(self.reject(400, "unknown customer"));
                }
            }
            _ => return Err(self.reject(404, "no such collection")),
        }

        let id = backend.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        body["id"] = Value::from(id);
        body["createdAt"] = Value::from("2024-05-01T12:00:00");
        if let Some(collection) = backend.collection(path) {
            collection.lock().insert(id, body.clone());
        }
        Ok(body)
    }
}

#[async_trait]
impl DownstreamTransport for StubService {
    fn service(&self) -> &str {
        self.service
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value> {
        self.check_available()?;
        let backend = &self.backend;
        let post_number = backend.posts.fetch_add(1, Ordering::SeqCst) + 1;
        let now = backend.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        backend.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        backend.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.insert(path, body, post_number)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        self.check_available()?;
        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["account", "customer", id] => {
                let id: i64 = id.parse().map_err(|_| self.reject(400, "bad id"))?;
                let accounts = self
                    .backend
                    .accounts()
                    .into_iter()
                    .filter(|account| account["customerId"].as_i64() == Some(id))
                    .collect();
                Ok(Value::Array(accounts))
            }
            [name] => match self.backend.collection(name) {
                Some(collection) => Ok(Value::Array(collection.lock().values().cloned().collect())),
                None => Err(self.reject(404, "no such collection")),
            },
            _ => Err(self.reject(404, "no such path")),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.check_available()?;
        let (name, id) = path
            .split_once('/')
            .ok_or_else(|| self.reject(404, "no such path"))?;
        let id: i64 = id.parse().map_err(|_| self.reject(400, "bad id"))?;
        let collection = self
            .backend
            .collection(name)
            .ok_or_else(|| self.reject(404, "no such collection"))?;

        match collection.lock().remove(&id) {
            Some(_) => Ok(()),
            None => Err(self.reject(404, "not found")),
        }
    }
}

/// Client policy with no retries so failure tests stay fast.
pub fn fast_policy() -> ClientPolicy {
    ClientPolicy {
        retry: RetryPolicy::none(),
        circuit_breaker: CircuitBreakerConfig::default(),
        call_deadline: Duration::from_secs(5),
        delete_concurrency: 8,
    }
}

pub fn pipeline(batch_size: usize, max_concurrency: usize) -> BoundedBatchPipeline {
    BoundedBatchPipeline::new(PipelineSettings {
        batch_size,
        max_concurrency,
        inter_batch_delay: Duration::from_millis(1),
    })
}

pub fn orchestrator(backend: &Arc<Backend>) -> DatasetOrchestrator {
    orchestrator_with(backend, fast_policy(), 4)
}

pub fn orchestrator_with(
    backend: &Arc<Backend>,
    policy: ClientPolicy,
    max_concurrency: usize,
) -> DatasetOrchestrator {
    let customers =
        ResilientDownstreamClient::new(backend.transport("customer-service"), policy.clone());
    let accounts = ResilientDownstreamClient::new(backend.transport("account-service"), policy);

    DatasetOrchestrator::new(
        customers,
        accounts,
        pipeline(5, max_concurrency),
        pipeline(7, max_concurrency),
    )
}
