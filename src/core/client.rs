use crate::core::resilience::{
    with_retry, with_timeout, CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryPolicy,
};
use crate::domain::model::{AccountRecord, Accounts, Resource};
use crate::domain::ports::DownstreamTransport;
use crate::utils::error::{Result, SeederError};
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct ClientPolicy {
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Deadline for one logical call including every retry.
    pub call_deadline: Duration,
    /// Concurrent deletes issued by `delete_all`.
    pub delete_concurrency: usize,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            call_deadline: Duration::from_secs(120),
            delete_concurrency: 16,
        }
    }
}

struct ClientInner {
    transport: Arc<dyn DownstreamTransport>,
    breaker: CircuitBreaker,
    policy: ClientPolicy,
}

/// The only component that talks to a downstream service.
///
/// Cloning is cheap and clones share one circuit breaker.
pub struct ResilientDownstreamClient<R: Resource> {
    inner: Arc<ClientInner>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Clone for ResilientDownstreamClient<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> ResilientDownstreamClient<R> {
    pub fn new(transport: Arc<dyn DownstreamTransport>, policy: ClientPolicy) -> Self {
        let breaker = CircuitBreaker::new(transport.service(), policy.circuit_breaker.clone());
        Self {
            inner: Arc::new(ClientInner {
                transport,
                breaker,
                policy,
            }),
            _resource: PhantomData,
        }
    }

    pub fn service(&self) -> &str {
        self.inner.transport.service()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.inner.breaker.state()
    }

    pub async fn create(&self, request: &R::Request) -> Result<R::Record> {
        let body = serde_json::to_value(request)?;
        let transport = &self.inner.transport;

        let created = self
            .execute("create", || {
                let body = body.clone();
                async move { transport.post_json(R::PATH, body).await }
            })
            .await?;

        let record: R::Record = serde_json::from_value(created)?;
        tracing::debug!("{} created record {}", self.service(), R::record_id(&record));
        Ok(record)
    }

    /// Full collection. The service answers with one JSON array, so the
    /// records are materialized in a single pass.
    pub async fn list_all(&self) -> Result<Vec<R::Record>> {
        self.list_path("list", R::PATH.to_string()).await
    }

    pub async fn count(&self) -> Result<usize> {
        let count = self.list_all().await?.len();
        tracing::debug!("{} holds {} records", self.service(), count);
        Ok(count)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let path = format!("{}/{}", R::PATH, id);
        let transport = &self.inner.transport;

        self.execute("delete", || transport.delete(&path)).await?;
        tracing::debug!("{} deleted record {}", self.service(), id);
        Ok(())
    }

    /// Lists the collection and deletes every record with bounded concurrency.
    /// Every delete is attempted; the first failure is reported afterwards.
    pub async fn delete_all(&self) -> Result<usize> {
        let ids: Vec<i64> = self.list_all().await?.iter().map(R::record_id).collect();
        let semaphore = Arc::new(Semaphore::new(self.inner.policy.delete_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for id in ids {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let client = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                client.delete(id).await
            });
        }

        let mut deleted = 0;
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => deleted += 1,
                Ok(Err(e)) => {
                    tracing::warn!("{} delete failed: {}", self.service(), e);
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(SeederError::Task {
                        message: e.to_string(),
                    });
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!("All {} records deleted from {}", deleted, self.service());
                Ok(deleted)
            }
        }
    }

    async fn list_path(&self, operation: &str, path: String) -> Result<Vec<R::Record>> {
        let transport = &self.inner.transport;
        let body = self.execute(operation, || transport.get_json(&path)).await?;

        match body {
            Value::Array(_) => Ok(serde_json::from_value(body)?),
            Value::Null => Ok(Vec::new()),
            other => Err(SeederError::DownstreamRejected {
                service: self.service().to_string(),
                status: 200,
                body: format!("expected a JSON array, got {}", other),
            }),
        }
    }

    async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let service = self.inner.transport.service();
        let breaker = &self.inner.breaker;
        let policy = &self.inner.policy;

        let result = with_timeout(
            service,
            operation,
            policy.call_deadline,
            with_retry(service, operation, &policy.retry, || breaker.call(op())),
        )
        .await;

        if let Err(e) = &result {
            tracing::debug!("{} {} failed: {}", service, operation, e);
        }
        result
    }
}

impl ResilientDownstreamClient<Accounts> {
    /// `GET /account/customer/{customerId}`
    pub async fn list_by_customer(&self, customer_id: i64) -> Result<Vec<AccountRecord>> {
        self.list_path(
            "list_by_customer",
            format!("{}/customer/{}", Accounts::PATH, customer_id),
        )
        .await
    }
}
