use crate::core::client::ResilientDownstreamClient;
use crate::domain::model::{BatchOutcome, FailedRequest, Resource};
use crate::utils::error::{Result, SeederError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub inter_batch_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_concurrency: 50,
            inter_batch_delay: Duration::from_millis(10),
        }
    }
}

/// Pushes requests downstream in contiguous chunks.
///
/// Within a chunk at most `max_concurrency` creates are in flight and results
/// arrive in completion order. Chunk N+1 is admitted only after every call of
/// chunk N has resolved and the inter-batch delay has passed. A failed record
/// never aborts its siblings.
#[derive(Debug, Clone)]
pub struct BoundedBatchPipeline {
    settings: PipelineSettings,
}

impl BoundedBatchPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Cancellation stops admitting chunks; calls already in flight finish and
    /// are recorded.
    pub async fn run<R: Resource>(
        &self,
        client: &ResilientDownstreamClient<R>,
        requests: Vec<R::Request>,
        cancel: &CancellationToken,
    ) -> BatchOutcome<R> {
        let batch_size = self.settings.batch_size.max(1);
        let mut outcome = BatchOutcome::new(requests.len());
        let total_chunks = requests.len().div_ceil(batch_size);

        tracing::info!(
            "Sending {} requests to {} in {} batches of up to {} ({} concurrent)",
            requests.len(),
            client.service(),
            total_chunks,
            batch_size,
            self.settings.max_concurrency
        );

        for (index, chunk) in requests.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                tracing::warn!(
                    "Cancelled before batch {}/{}, {} requests not sent",
                    index + 1,
                    total_chunks,
                    outcome.skipped()
                );
                break;
            }

            self.run_chunk(client, chunk, &mut outcome).await;
            tracing::debug!(
                "Batch {}/{} for {} done: {} succeeded, {} failed so far",
                index + 1,
                total_chunks,
                client.service(),
                outcome.succeeded.len(),
                outcome.failed.len()
            );

            let more_chunks = index + 1 < total_chunks;
            if more_chunks && !self.settings.inter_batch_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.inter_batch_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        if outcome.cancelled {
            tracing::warn!(
                "{} run cancelled: {} created, {} failed, {} skipped",
                client.service(),
                outcome.succeeded.len(),
                outcome.failed.len(),
                outcome.skipped()
            );
        } else {
            tracing::info!(
                "{} run finished: {} created, {} failed",
                client.service(),
                outcome.succeeded.len(),
                outcome.failed.len()
            );
        }
        outcome
    }

    async fn run_chunk<R: Resource>(
        &self,
        client: &ResilientDownstreamClient<R>,
        chunk: &[R::Request],
        outcome: &mut BatchOutcome<R>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut in_flight: Vec<(R::Request, JoinHandle<Result<R::Record>>)> =
            Vec::with_capacity(chunk.len());

        for request in chunk {
            // The semaphore lives only for this chunk and is never closed.
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let client = client.clone();
            let task_request = request.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                client.create(&task_request).await
            });
            in_flight.push((request.clone(), handle));
        }

        for (request, handle) in in_flight {
            match handle.await {
                Ok(Ok(record)) => outcome.succeeded.push(record),
                Ok(Err(error)) => {
                    tracing::warn!("Failed to create {:?}: {}", request, error);
                    outcome.failed.push(FailedRequest { request, error });
                }
                Err(join_error) => {
                    let error = SeederError::Task {
                        message: join_error.to_string(),
                    };
                    tracing::error!("Create task for {:?} aborted: {}", request, error);
                    outcome.failed.push(FailedRequest { request, error });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::ClientPolicy;
    use crate::core::resilience::RetryPolicy;
    use crate::domain::model::{CustomerRequest, Customers};
    use crate::domain::ports::DownstreamTransport;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tracks in-flight creates and rejects emails containing "reject".
    #[derive(Default)]
    struct CountingTransport {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        next_id: AtomicUsize,
        /// Cancelled as soon as the first create arrives.
        cancel_on_first_call: Option<CancellationToken>,
    }

    #[async_trait]
    impl DownstreamTransport for CountingTransport {
        fn service(&self) -> &str {
            "customer-service"
        }

        async fn post_json(&self, _path: &str, body: Value) -> crate::utils::error::Result<Value> {
            if let Some(cancel) = &self.cancel_on_first_call {
                cancel.cancel();
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let rejected = body["email"]
                .as_str()
                .map(|email| email.contains("reject"))
                .unwrap_or(false);
            if rejected {
                return Err(SeederError::DownstreamRejected {
                    service: "customer-service".to_string(),
                    status: 400,
                    body: "invalid email".to_string(),
                });
            }

            let mut created = body;
            created["id"] = Value::from(self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1);
            Ok(created)
        }

        async fn get_json(&self, _path: &str) -> crate::utils::error::Result<Value> {
            Ok(Value::Array(Vec::new()))
        }

        async fn delete(&self, _path: &str) -> crate::utils::error::Result<()> {
            Ok(())
        }
    }

    fn client(transport: Arc<CountingTransport>) -> ResilientDownstreamClient<Customers> {
        let policy = ClientPolicy {
            retry: RetryPolicy::none(),
            ..ClientPolicy::default()
        };
        ResilientDownstreamClient::new(transport, policy)
    }

    fn requests(count: usize) -> Vec<CustomerRequest> {
        (0..count)
            .map(|i| CustomerRequest {
                name: format!("Customer {}", i),
                email: format!("customer{}@example.com", i),
                phone: "555-555-5555".to_string(),
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_limit() {
        let transport = Arc::new(CountingTransport::default());
        let pipeline = BoundedBatchPipeline::new(PipelineSettings {
            batch_size: 20,
            max_concurrency: 4,
            inter_batch_delay: Duration::from_millis(1),
        });

        let outcome = pipeline
            .run(&client(transport.clone()), requests(57), &CancellationToken::new())
            .await;

        assert_eq!(outcome.requested, 57);
        assert_eq!(outcome.succeeded.len(), 57);
        assert!(transport.max_in_flight.load(Ordering::SeqCst) <= 4);
        assert!(transport.max_in_flight.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_chunk_waits_for_previous_chunk() {
        let transport = Arc::new(CountingTransport::default());
        let pipeline = BoundedBatchPipeline::new(PipelineSettings {
            batch_size: 3,
            max_concurrency: 10,
            inter_batch_delay: Duration::ZERO,
        });

        let outcome = pipeline
            .run(&client(transport.clone()), requests(12), &CancellationToken::new())
            .await;

        assert_eq!(outcome.succeeded.len(), 12);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_chunks() {
        let transport = Arc::new(CountingTransport::default());
        let pipeline = BoundedBatchPipeline::new(PipelineSettings {
            batch_size: 5,
            max_concurrency: 5,
            inter_batch_delay: Duration::from_millis(100),
        });
        let started = tokio::time::Instant::now();

        let outcome = pipeline
            .run(&client(transport), requests(15), &CancellationToken::new())
            .await;

        // Two pauses between three chunks, none after the last
        let elapsed = started.elapsed();
        assert_eq!(outcome.succeeded.len(), 15);
        assert!(elapsed >= Duration::from_millis(200), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(300), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_chunk_keeps_its_results() {
        let cancel = CancellationToken::new();
        let transport = Arc::new(CountingTransport {
            cancel_on_first_call: Some(cancel.clone()),
            ..CountingTransport::default()
        });
        let pipeline = BoundedBatchPipeline::new(PipelineSettings {
            batch_size: 4,
            max_concurrency: 4,
            inter_batch_delay: Duration::from_millis(50),
        });

        let outcome = pipeline
            .run(&client(transport.clone()), requests(12), &cancel)
            .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.succeeded.len(), 4);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.skipped(), 8);
        assert_eq!(transport.next_id.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failures_do_not_abort_chunk() {
        let transport = Arc::new(CountingTransport::default());
        let pipeline = BoundedBatchPipeline::new(PipelineSettings {
            batch_size: 5,
            max_concurrency: 5,
            inter_batch_delay: Duration::ZERO,
        });
        let mut input = requests(10);
        input[3].email = "reject-me@example.com".to_string();
        input[8].email = "reject-me-too@example.com".to_string();

        let outcome = pipeline
            .run(&client(transport), input, &CancellationToken::new())
            .await;

        assert_eq!(outcome.succeeded.len(), 8);
        assert_eq!(outcome.failed.len(), 2);
        assert!(outcome
            .failed
            .iter()
            .all(|f| f.request.email.starts_with("reject")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_admits_no_chunks() {
        let transport = Arc::new(CountingTransport::default());
        let pipeline = BoundedBatchPipeline::new(PipelineSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = pipeline
            .run(&client(transport.clone()), requests(10), &cancel)
            .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.skipped(), 10);
        assert_eq!(transport.next_id.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_input_is_a_no_op() {
        let pipeline = BoundedBatchPipeline::new(PipelineSettings::default());
        let outcome = pipeline
            .run(
                &client(Arc::new(CountingTransport::default())),
                Vec::new(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.requested, 0);
        assert!(outcome.succeeded.is_empty());
        assert!(!outcome.cancelled);
    }
}
