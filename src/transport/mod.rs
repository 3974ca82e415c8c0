pub mod endpoint;
pub mod http_transport;

use async_trait::async_trait;

use crate::app::TransportError;

pub use endpoint::FeedEndpoint;
pub use http_transport::HttpTransport;

/// Fetches raw response bodies. Retries and timeouts are the
/// implementation's business; the engine never retries.
#[async_trait]
pub trait Transport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}
