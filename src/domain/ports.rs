use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Raw request/response boundary to one downstream service.
///
/// Implementations only map the wire to `SeederError`: non-2xx responses become
/// `DownstreamRejected`, elapsed timeouts `DownstreamTimeout`, and connection
/// failures `DownstreamTransport`. Retries and circuit breaking are layered on
/// top by `ResilientDownstreamClient`.
#[async_trait]
pub trait DownstreamTransport: Send + Sync {
    /// Logical service name used in logs and errors, e.g. `customer-service`.
    fn service(&self) -> &str;

    async fn post_json(&self, path: &str, body: Value) -> Result<Value>;

    async fn get_json(&self, path: &str) -> Result<Value>;

    async fn delete(&self, path: &str) -> Result<()>;
}
