use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a store operation.
///
/// Exactly one of two states holds: stored (`success`, non-empty `cid`, empty
/// `error_message`) or failed (no `cid`, non-empty `error_message`). Build
/// values with [`StorageResult::stored`] or [`StorageResult::failed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageResult {
    pub success: bool,
    pub uri: String,
    pub cid: String,
    pub provider_name: String,
    pub view_url: String,
    pub size_bytes: u64,
    pub metadata: BTreeMap<String, Value>,
    pub error_message: String,
}

impl StorageResult {
    pub fn stored(
        provider_name: &str,
        cid: String,
        view_url: String,
        size_bytes: u64,
        metadata: BTreeMap<String, Value>,
    ) -> Self {
        debug_assert!(!cid.is_empty(), "stored result requires a CID");
        Self {
            success: true,
            uri: super::ipfs_uri(&cid),
            cid,
            provider_name: provider_name.to_string(),
            view_url,
            size_bytes,
            metadata,
            error_message: String::new(),
        }
    }

    pub fn failed(provider_name: &str, error_message: impl Into<String>) -> Self {
        let mut error_message = error_message.into();
        if error_message.trim().is_empty() {
            error_message = format!("{provider_name} storage failed");
        }
        Self {
            success: false,
            uri: String::new(),
            cid: String::new(),
            provider_name: provider_name.to_string(),
            view_url: String::new(),
            size_bytes: 0,
            metadata: BTreeMap::new(),
            error_message,
        }
    }
}

/// Headers and origin of a successful gateway response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalMetadata {
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    /// URL that answered the request
    pub gateway: String,
}

/// Bytes fetched from a gateway, never cached
#[derive(Debug, Clone)]
pub struct RetrievedContent {
    pub data: Vec<u8>,
    pub metadata: RetrievalMetadata,
}
