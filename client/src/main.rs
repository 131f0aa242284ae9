//! Tallyflow CLI - Send a CSV statement for processing and fetch the result
//!
//! # Commands
//!
//! ```bash
//! tallyflow process statement.csv -o out/   # Upload, wait, download
//! tallyflow upload statement.csv            # Upload only, print the result reference
//! tallyflow download processed_x.csv        # Fetch a result by reference
//! tallyflow health                          # Ping the processing service
//! tallyflow check statement.csv             # Validate locally, no network
//! ```
//!
//! The service address comes from `--url`, else `TALLYFLOW_API_URL`
//! (a `.env` file is honoured), else `http://localhost:5000`.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tallyflow::{
    CandidateFile, ClientConfig, DownloadAgent, DownloadTarget, HttpProcessingService, LogEntry,
    ProcessingService, ResultReference, SubmitOutcome, WorkflowController, MAX_FILE_SIZE,
};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "tallyflow")]
#[command(about = "Upload CSV statements for processing and download the result", long_about = None)]
struct Cli {
    /// Processing service base URL (overrides TALLYFLOW_API_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Request timeout in seconds (default: none)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a CSV, wait for processing and download the result
    Process {
        /// Input CSV file
        input: PathBuf,

        /// Directory for the downloaded result
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Upload a CSV and print the result reference
    Upload {
        /// Input CSV file
        input: PathBuf,
    },

    /// Download a processed file by its reference
    Download {
        /// Result reference returned by `upload`
        reference: String,

        /// Directory for the downloaded result
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Check that the processing service is reachable
    Health,

    /// Validate a file locally without uploading it
    Check {
        /// Input file
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match resolve_config(cli.url.as_deref(), cli.timeout) {
        Ok(config) => match cli.command {
            Commands::Process { input, output } => cmd_process(config, &input, &output).await,
            Commands::Upload { input } => cmd_upload(config, &input).await,
            Commands::Download { reference, output } => {
                cmd_download(config, &reference, &output).await
            }
            Commands::Health => cmd_health(config).await,
            Commands::Check { input } => cmd_check(&input),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn resolve_config(url: Option<&str>, timeout: Option<u64>) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let config = match url {
        Some(url) => ClientConfig::new(url)?,
        None => ClientConfig::from_env()?,
    };

    Ok(match timeout {
        Some(secs) => config.with_timeout(Duration::from_secs(secs)),
        None => config,
    })
}

/// Print controller events as they arrive; ends when the controller is dropped.
fn spawn_printer(controller: &WorkflowController<HttpProcessingService>) -> JoinHandle<()> {
    let mut stream = Box::pin(controller.events().stream());

    tokio::spawn(async move {
        while let Some(entry) = stream.next().await {
            print_entry(&entry);
        }
    })
}

fn print_entry(entry: &LogEntry) {
    eprintln!(
        "[{}] {}  {}",
        entry.timestamp.format("%H:%M:%S"),
        entry.level.emoji(),
        entry.message
    );
}

/// Select and upload `input`, returning the result reference.
async fn select_and_submit(
    controller: &WorkflowController<HttpProcessingService>,
    input: &Path,
) -> Result<ResultReference, Box<dyn std::error::Error>> {
    let candidate = CandidateFile::from_path(input)?;
    controller.accept_candidate(Some(candidate))?;

    match controller.submit().await? {
        SubmitOutcome::Succeeded(reference) => Ok(reference),
        other => Err(format!("Upload did not complete: {:?}", other).into()),
    }
}

async fn cmd_process(config: ClientConfig, input: &Path, output: &Path) -> CliResult {
    eprintln!("📄 Processing: {}", input.display());
    eprintln!("   Service: {}", config.base_url);

    let controller = WorkflowController::from_config(config)?;
    let printer = spawn_printer(&controller);

    let result = async {
        select_and_submit(&controller, input).await?;

        let target = controller
            .request_download()
            .ok_or("No result to download")?;

        let agent = DownloadAgent::for_service(controller.service(), output);
        let saved = agent.follow(&target).await?;
        eprintln!("💾 Saved to: {}", saved.display());

        controller.reset();
        Ok::<(), Box<dyn std::error::Error>>(())
    }
    .await;

    drop(controller);
    printer.await.ok();

    if result.is_ok() {
        eprintln!("\n✨ Done!");
    }
    result
}

async fn cmd_upload(config: ClientConfig, input: &Path) -> CliResult {
    eprintln!("📄 Uploading: {}", input.display());

    let controller = WorkflowController::from_config(config)?;
    let printer = spawn_printer(&controller);

    let result = async {
        let reference = select_and_submit(&controller, input).await?;
        let url = controller
            .request_download()
            .map(|target| target.url)
            .unwrap_or_default();

        println!("{}", reference);
        eprintln!("   Download URL: {}", url);
        Ok::<(), Box<dyn std::error::Error>>(())
    }
    .await;

    drop(controller);
    printer.await.ok();
    result
}

async fn cmd_download(config: ClientConfig, reference: &str, output: &Path) -> CliResult {
    let service = HttpProcessingService::new(config)?;
    let reference = ResultReference::new(reference);
    let target = DownloadTarget {
        url: service.download_url(&reference),
        reference,
    };

    eprintln!("📥 Downloading: {}", target.url);

    let agent = DownloadAgent::for_service(&service, output);
    let saved = agent.follow(&target).await?;
    eprintln!("💾 Saved to: {}", saved.display());

    Ok(())
}

async fn cmd_health(config: ClientConfig) -> CliResult {
    let service = HttpProcessingService::new(config)?;
    eprintln!("🩺 Checking: {}", service.config().health_url());

    let health = service.health().await?;
    if !health.is_ok() {
        return Err(format!("Service reports status '{}'", health.status).into());
    }

    eprintln!("✅ Service is up");
    Ok(())
}

fn cmd_check(input: &Path) -> CliResult {
    let candidate = CandidateFile::from_path(input)?;

    eprintln!("📄 {}", candidate.name);
    eprintln!("   Media type: {}", candidate.media_type);
    eprintln!("   Size: {} bytes", candidate.size_bytes);

    if !candidate.is_csv() {
        return Err(tallyflow::error::INVALID_FILE_TYPE.into());
    }

    if candidate.size_bytes > MAX_FILE_SIZE {
        eprintln!(
            "   ⚠️  Larger than the advertised {} MB limit; the service may refuse it",
            MAX_FILE_SIZE / (1024 * 1024)
        );
    }

    eprintln!("✅ Ready to upload");
    Ok(())
}
