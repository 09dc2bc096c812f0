//! turbosign - run TurboSign operations over a batch of records
//!
//! Records are read from a JSON file shaped like
//! `[{"json": {...params}, "binary": {"data": {"path": "contract.pdf"}}}]`.
//! Output records are printed as JSON; downloaded documents are written to
//! the download directory.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turbosign::api::client::TurboSignClient;
use turbosign::api::credentials::DEFAULT_PROFILE;
use turbosign::api::http::HttpOptions;
use turbosign::sign::{BinaryData, DispatchOptions, InputRecord, Operation, OutputRecord};

const DEFAULT_DOWNLOAD_NAME: &str = "document.pdf";

/// TurboSign command-line client.
#[derive(Debug, Parser)]
#[command(name = "turbosign")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Credentials profile.
    #[arg(long, env = "TURBODOCX_PROFILE", default_value = DEFAULT_PROFILE)]
    profile: String,

    /// Override the API base URL of the profile.
    #[arg(long)]
    base_url: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run an operation over a batch of records.
    Run(RunArgs),
    /// Check the stored credentials against the API.
    Verify,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Operation (prepareForReview, prepareForSigning, getStatus,
    /// downloadDocument, voidDocument, resendEmail).
    operation: Operation,

    /// JSON file holding the input records.
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Write output records here instead of stdout.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Directory for downloaded documents.
    #[arg(long, default_value = ".")]
    download_dir: PathBuf,

    /// Emit an error record for a failing item instead of stopping.
    #[arg(long)]
    continue_on_fail: bool,
}

/// Input record as written in the records file
#[derive(Debug, Deserialize)]
struct RecordFileEntry {
    #[serde(default)]
    json: Value,
    #[serde(default)]
    binary: HashMap<String, BinaryRef>,
}

/// Binary attachment referenced by path
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinaryRef {
    path: PathBuf,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let options = HttpOptions {
        timeout: Duration::from_secs(cli.timeout_secs),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let client = TurboSignClient::from_profile(&cli.profile, cli.base_url.as_deref(), &options)?;
        match cli.command {
            Command::Run(args) => run(&client, args).await,
            Command::Verify => verify(&client).await,
        }
    })
}

async fn verify(client: &TurboSignClient) -> Result<()> {
    match client.verify_credentials().await {
        Ok(_) => {
            println!("Credentials OK ({})", client.http.base_url());
            Ok(())
        }
        Err(report) => bail!("Credential check failed: {}", report),
    }
}

async fn run(client: &TurboSignClient, args: RunArgs) -> Result<()> {
    let records = load_records(&args.input).await?;
    info!(
        "Running {} over {} record(s) from {:?}",
        args.operation,
        records.len(),
        args.input
    );

    let output = client
        .run_batch(
            args.operation,
            &records,
            DispatchOptions {
                continue_on_fail: args.continue_on_fail,
            },
        )
        .await
        .map_err(|err| anyhow!("{}\n\n{}", err, err.hint()))?;

    let rendered = serde_json::to_string_pretty(&output)?;
    match &args.output {
        Some(path) => tokio::fs::write(path, rendered)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?,
        None => println!("{}", rendered),
    }

    write_downloads(&output, &args.download_dir).await
}

async fn load_records(path: &Path) -> Result<Vec<InputRecord>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read records file {:?}", path))?;
    let entries: Vec<RecordFileEntry> = serde_json::from_str(&content)
        .with_context(|| format!("Records file {:?} is not a JSON array of records", path))?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut record = InputRecord::new(entry.json);
        for (property, binary) in entry.binary {
            let file_path = base_dir.join(&binary.path);
            let data = tokio::fs::read(&file_path)
                .await
                .with_context(|| format!("Failed to read binary '{}' from {:?}", property, file_path))?;
            let file_name = binary.file_name.or_else(|| {
                binary
                    .path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            });
            debug!("Attached {:?} as binary '{}' ({} bytes)", file_path, property, data.len());
            record = record.with_binary(property, BinaryData::new(data, file_name, binary.mime_type));
        }
        records.push(record);
    }
    Ok(records)
}

async fn write_downloads(output: &[OutputRecord], dir: &Path) -> Result<()> {
    for record in output {
        let Some(binary) = &record.binary else {
            continue;
        };
        // final path component only
        let file_name = binary
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).file_name())
            .unwrap_or_else(|| OsStr::new(DEFAULT_DOWNLOAD_NAME));
        let path = dir.join(file_name);
        tokio::fs::write(&path, &binary.data)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        info!("Saved {:?} ({} bytes)", path, binary.data.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("turbosign-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn download(file_name: &str) -> OutputRecord {
        OutputRecord::binary(
            json!({"documentId": "doc"}),
            BinaryData::new(b"%PDF".to_vec(), Some(file_name.to_string()), None),
            0,
        )
    }

    #[tokio::test]
    async fn test_load_records_resolves_binary_paths_relative_to_file() {
        let dir = scratch_dir("records");
        std::fs::write(dir.join("contract.pdf"), b"%PDF-1.7").unwrap();
        std::fs::write(dir.join("scan.bin"), b"raw").unwrap();
        let records_file = dir.join("records.json");
        std::fs::write(
            &records_file,
            json!([
                {"json": {"recipients": "[]"}, "binary": {"data": {"path": "contract.pdf"}}},
                {"binary": {"data": {"path": "scan.bin", "fileName": "scan.pdf", "mimeType": "application/pdf"}}}
            ])
            .to_string(),
        )
        .unwrap();

        let records = load_records(&records_file).await.unwrap();

        assert_eq!(records.len(), 2);
        let first = &records[0].binary["data"];
        assert_eq!(first.data, b"%PDF-1.7");
        assert_eq!(first.file_name.as_deref(), Some("contract.pdf"));
        assert_eq!(first.mime_type, None);
        assert_eq!(records[1].json, Value::Null);
        let second = &records[1].binary["data"];
        assert_eq!(second.file_name.as_deref(), Some("scan.pdf"));
        assert_eq!(second.mime_type.as_deref(), Some("application/pdf"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_load_records_missing_binary_file() {
        let dir = scratch_dir("records-missing");
        let records_file = dir.join("records.json");
        std::fs::write(
            &records_file,
            json!([{"binary": {"data": {"path": "absent.pdf"}}}]).to_string(),
        )
        .unwrap();

        let err = load_records(&records_file).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read binary 'data'"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_write_downloads_stays_inside_dir() {
        let root = scratch_dir("downloads");
        let dir = root.join("out");
        std::fs::create_dir_all(&dir).unwrap();

        let output = [
            download("signed-document-a_b.pdf"),
            download("../../escaped.pdf"),
            download(".."),
        ];
        write_downloads(&output, &dir).await.unwrap();

        assert!(dir.join("signed-document-a_b.pdf").exists());
        assert!(dir.join("escaped.pdf").exists());
        assert!(dir.join(DEFAULT_DOWNLOAD_NAME).exists());
        assert!(!root.join("escaped.pdf").exists());

        std::fs::remove_dir_all(&root).ok();
    }
}
