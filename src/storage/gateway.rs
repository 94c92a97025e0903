//! Gateway retrieval with static failover
//!
//! Gateways are tried strictly in the configured order. The first HTTP 200
//! wins and no later gateway is contacted. Any other status or a transport
//! error moves on to the next entry. Ordering is fixed so retrieval is
//! reproducible given the same gateway availability.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument, warn};

use super::types::{RetrievalMetadata, RetrievedContent};
use crate::config::RetrievalConfig;
use crate::error::{Error, Result};

/// One source able to return content for a CID
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Human-readable identity used in logs and aggregate errors
    fn name(&self) -> &str;

    async fn fetch(&self, cid: &str) -> Result<RetrievedContent>;
}

/// A public IPFS HTTP gateway serving `<base>/ipfs/<cid>`
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ConfigError(format!("HTTP client error: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Share one connection pool across several gateways
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn content_url(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.base_url, cid)
    }
}

fn header_string(
    headers: &reqwest::header::HeaderMap,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl ContentFetcher for HttpGateway {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, cid: &str) -> Result<RetrievedContent> {
        let url = self.content_url(cid);
        debug!("Attempting retrieval from: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::GatewayStatus {
                gateway: url,
                status: status.as_u16(),
            });
        }

        let content_type = header_string(response.headers(), CONTENT_TYPE);
        let content_length = header_string(response.headers(), CONTENT_LENGTH);
        let data = response.bytes().await?.to_vec();

        Ok(RetrievedContent {
            data,
            metadata: RetrievalMetadata {
                content_type,
                content_length,
                gateway: url,
            },
        })
    }
}

/// Ordered list of fetchers, iterated until the first success
pub struct GatewayRetriever {
    fetchers: Vec<Box<dyn ContentFetcher>>,
}

impl GatewayRetriever {
    pub fn new(fetchers: Vec<Box<dyn ContentFetcher>>) -> Self {
        Self { fetchers }
    }

    /// Build HTTP gateways from configuration, sharing one client
    pub fn from_config(config: &RetrievalConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::ConfigError(format!("HTTP client error: {e}")))?;

        let fetchers = config
            .gateways
            .iter()
            .map(|base| {
                Box::new(HttpGateway::with_client(client.clone(), base)) as Box<dyn ContentFetcher>
            })
            .collect();
        Ok(Self::new(fetchers))
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    /// Fetch `uri` (an `ipfs://` URI or bare CID) from the first gateway that answers 200
    #[instrument(skip(self), fields(gateways = self.fetchers.len()))]
    pub async fn get(&self, uri: &str) -> Result<RetrievedContent> {
        let cid = super::strip_ipfs_prefix(uri);
        let mut attempts = Vec::with_capacity(self.fetchers.len());

        for fetcher in &self.fetchers {
            match fetcher.fetch(cid).await {
                Ok(content) => {
                    info!(
                        "Retrieved {} bytes from {}",
                        content.data.len(),
                        content.metadata.gateway
                    );
                    return Ok(content);
                }
                Err(e) => {
                    warn!("Failed to retrieve {} from {}: {}", cid, fetcher.name(), e);
                    attempts.push(format!("{}: {}", fetcher.name(), e));
                }
            }
        }

        Err(Error::RetrievalFailed {
            cid: cid.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubFetcher {
        name: String,
        body: Option<Vec<u8>>,
        calls: Arc<AtomicUsize>,
    }

    impl StubFetcher {
        fn boxed(
            name: &str,
            body: Option<&[u8]>,
            calls: Arc<AtomicUsize>,
        ) -> Box<dyn ContentFetcher> {
            Box::new(Self {
                name: name.to_string(),
                body: body.map(<[u8]>::to_vec),
                calls,
            })
        }
    }

    #[async_trait]
    impl ContentFetcher for StubFetcher {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, cid: &str) -> Result<RetrievedContent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.body {
                Some(body) => Ok(RetrievedContent {
                    data: body.clone(),
                    metadata: RetrievalMetadata {
                        content_type: None,
                        content_length: Some(body.len().to_string()),
                        gateway: format!("{}/ipfs/{}", self.name, cid),
                    },
                }),
                None => Err(Error::GatewayStatus {
                    gateway: self.name.clone(),
                    status: 504,
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_first_success_stops_iteration() {
        let calls: Vec<_> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
        let retriever = GatewayRetriever::new(vec![
            StubFetcher::boxed("g1", None, calls[0].clone()),
            StubFetcher::boxed("g2", Some(b"payload"), calls[1].clone()),
            StubFetcher::boxed("g3", Some(b"other"), calls[2].clone()),
        ]);

        let content = retriever.get("ipfs://bafyroot").await.unwrap();
        assert_eq!(content.data, b"payload");
        assert_eq!(content.metadata.gateway, "g2/ipfs/bafyroot");
        assert_eq!(calls[0].load(Ordering::SeqCst), 1);
        assert_eq!(calls[1].load(Ordering::SeqCst), 1);
        assert_eq!(calls[2].load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_is_aggregate_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let retriever = GatewayRetriever::new(vec![
            StubFetcher::boxed("g1", None, calls.clone()),
            StubFetcher::boxed("g2", None, calls.clone()),
        ]);

        match retriever.get("bafyroot").await {
            Err(Error::RetrievalFailed { cid, attempts }) => {
                assert_eq!(cid, "bafyroot");
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].starts_with("g1"));
            }
            other => panic!("expected RetrievalFailed, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_gateways_fails() {
        let retriever = GatewayRetriever::new(Vec::new());
        assert!(retriever.is_empty());
        assert!(retriever.get("bafyroot").await.is_err());
    }

    #[test]
    fn test_content_url_trims_trailing_slash() {
        let gateway = HttpGateway::new("https://dweb.link/", Duration::from_secs(30)).unwrap();
        assert_eq!(gateway.content_url("bafyroot"), "https://dweb.link/ipfs/bafyroot");
        assert_eq!(gateway.name(), "https://dweb.link");
    }

    #[test]
    fn test_from_config_keeps_order() {
        let retriever = GatewayRetriever::from_config(&RetrievalConfig::default()).unwrap();
        assert_eq!(retriever.len(), 4);
        assert_eq!(retriever.fetchers[0].name(), "https://ipfs.io");
        assert_eq!(retriever.fetchers[3].name(), "https://dweb.link");
    }
}
