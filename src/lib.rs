//! Content-addressed storage on IPFS/Filecoin via the filecoin-pin CLI
//!
//! Uploads are delegated to `filecoin-pin add`, reads go through an ordered
//! list of public IPFS gateways. Every store call resolves to a
//! [`StorageResult`], whichever step failed.
//!
//! ```no_run
//! use filecoin_pin_provider::{FilecoinPinProvider, ProviderConfig, StorageProviderTrait};
//!
//! # async fn run() -> filecoin_pin_provider::Result<()> {
//! let provider = FilecoinPinProvider::new(ProviderConfig::default()).await?;
//! let stored = provider.put(b"hello", Some("text/plain"), None).await;
//! if stored.success {
//!     let content = provider.get(&stored.uri).await?;
//!     assert_eq!(content.data, b"hello");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod storage;

#[cfg(feature = "otel")]
pub mod telemetry;

pub use config::{ProviderConfig, RetrievalConfig};
pub use error::{Error, Result};
pub use storage::{
    ContentFetcher, FilecoinPinProvider, GatewayRetriever, HttpGateway, RetrievalMetadata,
    RetrievedContent, StorageProviderTrait, StorageResult,
};
