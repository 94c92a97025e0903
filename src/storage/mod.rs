//! Content-addressed storage providers
//!
//! A provider stores payloads on IPFS/Filecoin and hands back an `ipfs://`
//! URI, then reads content back through public gateways.

pub mod filecoin_pin;
pub mod gateway;
pub mod output;
mod types;


use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;

pub use filecoin_pin::FilecoinPinProvider;
pub use gateway::{ContentFetcher, GatewayRetriever, HttpGateway};
pub use output::{FilecoinPinOutputParser, OutputParser, PinOutput};
pub use types::{RetrievalMetadata, RetrievedContent, StorageResult};

pub const IPFS_SCHEME: &str = "ipfs://";

/// Strip the `ipfs://` prefix, leaving a bare CID. Bare CIDs pass through.
pub fn strip_ipfs_prefix(uri: &str) -> &str {
    uri.strip_prefix(IPFS_SCHEME).unwrap_or(uri)
}

/// Canonical `ipfs://<cid>` form
pub fn ipfs_uri(cid: &str) -> String {
    format!("{IPFS_SCHEME}{cid}")
}

#[async_trait]
pub trait StorageProviderTrait: Send + Sync {
    /// Store a payload. Failures are reported in the returned result, never as an error.
    async fn put(
        &self,
        payload: &[u8],
        mime: Option<&str>,
        tags: Option<BTreeMap<String, String>>,
    ) -> StorageResult;

    /// Fetch content by `ipfs://` URI or bare CID
    async fn get(&self, uri: &str) -> Result<RetrievedContent>;

    /// Check that `uri` addresses the content identified by `expected_hash`
    fn verify(&self, uri: &str, expected_hash: &str) -> bool;

    /// Remove stored content. Returns whether anything was removed.
    async fn delete(&self, uri: &str) -> bool;

    /// Store a JSON document and return its CID, or `None` if the upload failed
    async fn upload_json(
        &self,
        data: &serde_json::Value,
        filename: Option<&str>,
    ) -> Option<String> {
        let payload = match serde_json::to_vec_pretty(&sorted_keys(data)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize JSON payload: {}", e);
                return None;
            }
        };

        let tags = BTreeMap::from([(
            "filename".to_string(),
            filename.unwrap_or("data.json").to_string(),
        )]);

        let result = self
            .put(&payload, Some("application/json"), Some(tags))
            .await;
        if result.success {
            Some(result.cid)
        } else {
            warn!("Failed to upload JSON document: {}", result.error_message);
            None
        }
    }
}

/// Copy of `value` with every object's keys in lexicographic order, so the
/// serialized bytes do not depend on how the document was built.
pub fn sorted_keys(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted_keys).collect()),
        other => other.clone(),
    }
}

/// Identifier equality with the scheme ignored on both sides.
///
/// The CID is derived from the content, so equal CIDs address equal content.
/// The bytes themselves are not re-hashed.
pub fn cids_match(uri: &str, expected: &str) -> bool {
    strip_ipfs_prefix(uri) == strip_ipfs_prefix(expected)
}
