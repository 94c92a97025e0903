//! filecoin-pin-provider command line
//!
//! Stores files through the filecoin-pin CLI and reads them back through
//! public IPFS gateways.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use filecoin_pin_provider::{FilecoinPinProvider, ProviderConfig, StorageProviderTrait};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", built ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(
    name = "filecoin-pin-provider",
    version,
    long_version = LONG_VERSION,
    about = "Store and retrieve content on IPFS/Filecoin via filecoin-pin"
)]
struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(long, env = "FILECOIN_PIN_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the filecoin-pin executable
    #[arg(long, env = "FILECOIN_PIN_PATH")]
    executable: Option<PathBuf>,

    /// Private key passed to filecoin-pin
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Do not pass --auto-fund to filecoin-pin
    #[arg(long)]
    no_auto_fund: bool,

    /// Add files without a directory wrapper
    #[arg(long)]
    bare: bool,

    /// Pass --verbose to filecoin-pin
    #[arg(long)]
    tool_verbose: bool,

    /// Gateway base URLs to try in order (replaces the configured list)
    #[arg(long = "gateway", value_delimiter = ',')]
    gateways: Vec<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a file and print the storage result as JSON
    Put {
        file: PathBuf,
        /// MIME type; guessed from the file extension when omitted
        #[arg(long)]
        mime: Option<String>,
        /// Metadata tag as key=value, may be repeated
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },
    /// Fetch content by ipfs:// URI or CID
    Get {
        uri: String,
        /// Write content here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check that a URI addresses the expected CID
    Verify { uri: String, expected: String },
    /// Request removal of stored content (not supported by Filecoin)
    Delete { uri: String },
    /// Store a JSON document and print its CID
    UploadJson {
        file: PathBuf,
        /// Filename recorded in the upload tags
        #[arg(long)]
        filename: Option<String>,
    },
    /// Store a sample document, read it back through the gateways and verify the CID
    Diagnose,
}

fn parse_tag(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "json" => Some("application/json"),
        "txt" | "md" | "csv" => Some("text/plain"),
        "html" | "htm" => Some("text/html"),
        _ => None,
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    // Logs go to stderr so `get` can stream content on stdout
    let (text_layer, json_layer) = match format {
        LogFormat::Text => (
            Some(fmt::layer().with_target(true).with_writer(std::io::stderr)),
            None,
        ),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(std::io::stderr))),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer);

    #[cfg(feature = "otel")]
    {
        if std::env::var(filecoin_pin_provider::telemetry::OTLP_ENDPOINT_ENV).is_ok() {
            match filecoin_pin_provider::telemetry::init_telemetry(&registry) {
                Ok(otel_layer) => {
                    registry.with(otel_layer).init();
                    info!("OpenTelemetry tracing initialized");
                    return;
                }
                Err(e) => eprintln!("OpenTelemetry disabled: {e}"),
            }
        }
    }

    registry.init();
}

fn load_config(cli: &Cli) -> Result<ProviderConfig> {
    let mut config = match &cli.config {
        Some(path) => ProviderConfig::from_toml_file(path)?,
        None => ProviderConfig::default(),
    };

    if let Some(executable) = &cli.executable {
        config.executable_path = executable.clone();
    }
    if let Some(key) = &cli.private_key {
        config.credential = Some(key.clone());
    }
    if cli.no_auto_fund {
        config.auto_fund = false;
    }
    if cli.bare {
        config.bare = true;
    }
    if cli.tool_verbose {
        config.verbose = true;
    }
    if !cli.gateways.is_empty() {
        config.retrieval.gateways = cli.gateways.clone();
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!("Starting filecoin-pin-provider v{}", LONG_VERSION);

    let config = load_config(&cli)?;
    let provider = FilecoinPinProvider::new(config)
        .await
        .context("Failed to initialise filecoin-pin provider")?;

    let result = run(&provider, cli.command).await;

    #[cfg(feature = "otel")]
    filecoin_pin_provider::telemetry::shutdown_telemetry();

    result
}

async fn run(provider: &FilecoinPinProvider, command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Put { file, mime, tags } => {
            let payload = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mime = mime.or_else(|| guess_mime(&file).map(str::to_string));
            let tags: BTreeMap<String, String> = tags.into_iter().collect();
            let tags = (!tags.is_empty()).then_some(tags);

            let result = provider.put(&payload, mime.as_deref(), tags).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                error!("Upload failed: {}", result.error_message);
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Get { uri, output } => {
            let content = provider.get(&uri).await?;
            info!(
                gateway = %content.metadata.gateway,
                content_type = ?content.metadata.content_type,
                "Retrieved {} bytes",
                content.data.len()
            );
            match output {
                Some(path) => tokio::fs::write(&path, &content.data)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&content.data)?;
                    stdout.flush()?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify { uri, expected } => {
            let verified = provider.verify(&uri, &expected);
            println!("{verified}");
            Ok(if verified {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Delete { uri } => {
            let deleted = provider.delete(&uri).await;
            println!("{deleted}");
            Ok(if deleted {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::UploadJson { file, filename } => {
            let raw = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let document: serde_json::Value = serde_json::from_slice(&raw)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            let filename = filename.or_else(|| {
                file.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            });

            match provider.upload_json(&document, filename.as_deref()).await {
                Some(cid) => {
                    println!("{cid}");
                    Ok(ExitCode::SUCCESS)
                }
                None => bail!("JSON upload failed"),
            }
        }
        Commands::Diagnose => diagnose(provider).await,
    }
}

/// Round trip a sample payload: store, retrieve, compare, verify
async fn diagnose(provider: &FilecoinPinProvider) -> Result<ExitCode> {
    let sample = serde_json::json!({
        "test": "filecoin-pin storage provider",
        "message": "Verification payload for filecoin-pin CLI",
        "source": "filecoin-pin-provider diagnose",
    });
    let payload = serde_json::to_vec(&sample)?;
    let tags = BTreeMap::from([("test".to_string(), "true".to_string())]);

    info!("Uploading sample payload...");
    let result = provider
        .put(&payload, Some("application/json"), Some(tags))
        .await;
    if !result.success {
        error!("Upload failed: {}", result.error_message);
        return Ok(ExitCode::FAILURE);
    }
    info!(cid = %result.cid, view_url = %result.view_url, "Upload succeeded");

    info!("Retrieving content through public gateways...");
    let content = provider.get(&result.uri).await?;
    let matches = content.data == payload;
    info!(
        "Retrieved {} bytes via {}. Content matches original: {}",
        content.data.len(),
        content.metadata.gateway,
        matches
    );

    let verified = provider.verify(&result.uri, &result.cid);
    info!("Verification result: {}", verified);

    Ok(if verified && matches {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
