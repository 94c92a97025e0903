//! Storage provider that shells out to the filecoin-pin CLI
//!
//! The CLI handles IPFS encoding, CAR creation, the Filecoin upload and
//! optional funding. This provider only stages the payload, runs
//! `filecoin-pin add` and reads the resulting identifiers from its output.
//! Reads go through public gateways, see [`super::gateway`].

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::gateway::GatewayRetriever;
use super::output::{FilecoinPinOutputParser, OutputParser, PinOutput};
use super::types::{RetrievedContent, StorageResult};
use super::{cids_match, StorageProviderTrait};
use crate::config::ProviderConfig;
use crate::error::{describe_duration, Error, Result};

pub const PROVIDER_NAME: &str = "filecoin-pin";

const JSON_FILENAME: &str = "chaoschain_proof.json";
const TEXT_FILENAME: &str = "chaoschain_payload.txt";
const BINARY_FILENAME: &str = "chaoschain_payload.bin";
const TEMP_DIR_PREFIX: &str = "filecoin_pin_";

/// Display filename for a payload. Only used for the staged file and view URL.
pub fn filename_for_mime(mime: Option<&str>) -> &'static str {
    match mime {
        Some("application/json") => JSON_FILENAME,
        Some(m) if m.starts_with("text/") => TEXT_FILENAME,
        _ => BINARY_FILENAME,
    }
}

/// Public dweb.link URL for browsing a stored payload
pub fn view_url(cid: &str, filename: &str) -> String {
    format!("https://{cid}.ipfs.dweb.link/{filename}")
}

pub struct FilecoinPinProvider {
    config: ProviderConfig,
    parser: Box<dyn OutputParser>,
    retriever: GatewayRetriever,
}

impl std::fmt::Debug for FilecoinPinProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilecoinPinProvider")
            .field("config", &self.config)
            .field("gateways", &self.retriever.len())
            .finish()
    }
}

impl FilecoinPinProvider {
    /// Validate the configuration and probe `<executable> --version`.
    ///
    /// Fails if the executable is missing, not executable, exits non-zero or
    /// does not answer within the version timeout.
    #[instrument(skip(config), fields(executable = %config.executable_path.display()))]
    pub async fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let retriever = GatewayRetriever::from_config(&config.retrieval)?;
        let version = probe_version(&config.executable_path, config.version_timeout()).await?;
        info!("filecoin-pin detected: {}", version);

        Ok(Self {
            config,
            parser: Box::new(FilecoinPinOutputParser),
            retriever,
        })
    }

    /// Replace the gateway list, e.g. to point retrieval at a private gateway
    pub fn with_retriever(mut self, retriever: GatewayRetriever) -> Self {
        self.retriever = retriever;
        self
    }

    /// Replace the output parser when the CLI output format changes
    pub fn with_parser(mut self, parser: Box<dyn OutputParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Arguments for `filecoin-pin add`, in a fixed order
    pub fn build_args(&self, file: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["add".into(), file.as_os_str().to_owned()];

        if self.config.auto_fund {
            args.push("--auto-fund".into());
        }
        if self.config.bare {
            args.push("--bare".into());
        }
        if self.config.verbose {
            args.push("--verbose".into());
        }
        if let Some(key) = &self.config.credential {
            args.push("--private-key".into());
            args.push(key.into());
        }

        args
    }

    /// The argument list as it may appear in logs
    fn redacted_args(&self, args: &[OsString]) -> Vec<String> {
        let mut redact_next = false;
        args.iter()
            .map(|arg| {
                if redact_next {
                    redact_next = false;
                    return "[REDACTED]".to_string();
                }
                if arg == "--private-key" {
                    redact_next = true;
                }
                arg.to_string_lossy().into_owned()
            })
            .collect()
    }

    /// Stage the payload, run the CLI and parse its output.
    ///
    /// The staging directory is owned by this call and removed when `staging`
    /// drops, whichever way the function exits.
    async fn upload(&self, payload: &[u8], filename: &str) -> Result<PinOutput> {
        let staging = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()?;
        let path = staging.path().join(filename);
        tokio::fs::write(&path, payload).await?;

        let args = self.build_args(&path);
        debug!(args = ?self.redacted_args(&args), "Running filecoin-pin");
        info!("Uploading {} bytes via filecoin-pin...", payload.len());

        let output = run_with_timeout(
            &self.config.executable_path,
            &args,
            self.config.upload_timeout(),
        )
        .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            warn!(
                status = ?output.status.code(),
                "filecoin-pin returned a non-zero exit code.\nstdout:\n{}\nstderr:\n{}",
                stdout,
                stderr
            );
            let trimmed = stderr.trim();
            let message = if trimmed.is_empty() {
                "filecoin-pin command failed".to_string()
            } else {
                trimmed.to_string()
            };
            return Err(Error::ToolFailed {
                message,
                status: output.status.code(),
                stdout,
                stderr,
            });
        }

        let parsed = self.parser.parse(&stdout);
        if parsed.root_cid.is_none() {
            warn!(
                "filecoin-pin completed but no Root CID was found in the output.\n\
                 stdout:\n{}\nstderr:\n{}",
                stdout,
                stderr
            );
            return Err(Error::MissingRootCid { stdout, stderr });
        }

        Ok(parsed)
    }
}

/// Spawn `program args...` without a shell, capture both streams and bound the wait.
/// On timeout the child is killed when its future is dropped.
async fn run_with_timeout(program: &Path, args: &[OsString], timeout: Duration) -> Result<Output> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(Error::Timeout {
            command: PROVIDER_NAME.to_string(),
            after: describe_duration(timeout),
        }),
    }
}

async fn probe_version(program: &Path, timeout: Duration) -> Result<String> {
    let output = match run_with_timeout(program, &[OsString::from("--version")], timeout).await {
        Ok(output) => output,
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ConfigError(format!(
                "filecoin-pin not found at path: {}",
                program.display()
            )));
        }
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Error::ConfigError(format!(
                "filecoin-pin at {} is not executable",
                program.display()
            )));
        }
        Err(Error::Timeout { .. }) => {
            return Err(Error::ConfigError(
                "filecoin-pin version command timed out".to_string(),
            ));
        }
        Err(e) => {
            return Err(Error::ConfigError(format!(
                "Failed to run {} --version: {e}",
                program.display()
            )));
        }
    };

    if !output.status.success() {
        return Err(Error::ConfigError(format!(
            "filecoin-pin CLI returned non-zero exit code: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn optional(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

#[async_trait]
impl StorageProviderTrait for FilecoinPinProvider {
    #[instrument(skip(self, payload, tags), fields(size = payload.len()))]
    async fn put(
        &self,
        payload: &[u8],
        mime: Option<&str>,
        tags: Option<BTreeMap<String, String>>,
    ) -> StorageResult {
        let filename = filename_for_mime(mime);

        let parsed = match self.upload(payload, filename).await {
            Ok(parsed) => parsed,
            Err(
                e @ (Error::Timeout { .. }
                | Error::ToolFailed { .. }
                | Error::MissingRootCid { .. }),
            ) => {
                return StorageResult::failed(PROVIDER_NAME, e.to_string());
            }
            Err(e) => {
                warn!("filecoin-pin upload failed: {}", e);
                return StorageResult::failed(PROVIDER_NAME, format!("Storage error: {e}"));
            }
        };

        let PinOutput {
            root_cid,
            piece_cid,
            data_set_id,
            transaction_hash,
            file_size_display,
        } = parsed;
        // upload() rejects output without a root CID
        let cid = root_cid.unwrap_or_default();
        let view = view_url(&cid, filename);
        info!("Upload successful. Root CID: {}", cid);

        let metadata = BTreeMap::from([
            ("piece_cid".to_string(), optional(piece_cid)),
            ("data_set_id".to_string(), optional(data_set_id)),
            ("transaction_hash".to_string(), optional(transaction_hash)),
            ("file_size_display".to_string(), optional(file_size_display)),
            ("mime_type".to_string(), optional(mime.map(str::to_string))),
            ("tags".to_string(), json!(tags.unwrap_or_default())),
            ("filecoin_pin".to_string(), Value::Bool(true)),
            ("payload_filename".to_string(), json!(filename)),
            ("dweb_gateway_url".to_string(), json!(view)),
        ]);

        StorageResult::stored(PROVIDER_NAME, cid, view, payload.len() as u64, metadata)
    }

    async fn get(&self, uri: &str) -> Result<RetrievedContent> {
        self.retriever.get(uri).await
    }

    fn verify(&self, uri: &str, expected_hash: &str) -> bool {
        cids_match(uri, expected_hash)
    }

    /// Filecoin offers no way to remove content once stored, so this is always `false`.
    async fn delete(&self, uri: &str) -> bool {
        info!(
            "Delete not supported for {}: Filecoin data cannot be removed once stored",
            uri
        );
        false
    }
}
