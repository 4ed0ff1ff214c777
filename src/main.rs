use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use endpoint_scan_rs::classify::TestConfig;
use endpoint_scan_rs::config::{self, Settings};
use endpoint_scan_rs::controller::ScanController;
use endpoint_scan_rs::http_scan::{HttpScanRequest, HttpScanner};
use endpoint_scan_rs::port_scan::{PortScanRequest, PortScanner};
use endpoint_scan_rs::server::{self, AppState};
use endpoint_scan_rs::sink::LogRecord;
use endpoint_scan_rs::store::{FileStore, MemoryStore, SharedStore};
use endpoint_scan_rs::types::{PortProbeResult, PortStatus, RunSummary, ScanResult};
use endpoint_scan_rs::worklist::PortSelection;

/// endpoint-scan-rs: sequential HTTP endpoint and TCP port scanner with pause/resume/stop.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "endpoint-scan-rs",
    version,
    about = "Sequential HTTP endpoint and TCP port scanner with pause/resume/stop and a small JSON API.",
    long_about = None
)]
struct Cli {
    /// Settings file (TOML). Defaults to ./endpoint-scan.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of the persistent store (overrides the settings file).
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Serve the JSON control API (and a static UI directory, if present).
    Serve {
        /// Bind address, e.g. 127.0.0.1:8080.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Scan every endpoint of one project.
    Http {
        /// Project id; defaults to the selected project.
        #[arg(long)]
        project: Option<String>,

        /// Fail endpoints whose body lacks this text.
        #[arg(long = "expect-content")]
        expect_content: Option<String>,

        /// Skip the missing-security-header checks.
        #[arg(long = "no-header-checks", default_value_t = false)]
        no_header_checks: bool,

        /// Write results as pretty JSON to this path (optional).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Probe TCP ports on one host (well-known ports unless --range/--custom).
    Ports {
        #[arg(long)]
        host: String,

        /// Inclusive range, e.g. 8000-8010.
        #[arg(long, conflicts_with = "custom")]
        range: Option<String>,

        /// Comma-separated list, e.g. 22,80,443.
        #[arg(long)]
        custom: Option<String>,

        /// Connect timeout in milliseconds.
        #[arg(long = "timeout-ms")]
        timeout_ms: Option<u64>,

        /// Write results as pretty JSON to this path (optional).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "endpoint_scan_rs=debug,tower_http=debug"
    } else {
        "endpoint_scan_rs=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut settings = config::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir.clone() {
        settings.data_dir = dir;
    }
    info!(data_dir = %settings.data_dir.display(), "using persistent store");

    let store: SharedStore = Arc::new(FileStore::new(&settings.data_dir));
    let session_store: SharedStore = Arc::new(MemoryStore::new());

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                settings.bind = bind;
            }
            serve(&settings, store, session_store).await
        }
        Command::Http {
            project,
            expect_content,
            no_header_checks,
            output,
        } => {
            let scanner = HttpScanner::new(store, session_store, &settings)?;
            let test = TestConfig {
                check_content: expect_content.is_some(),
                expected_content: expect_content.unwrap_or_default(),
                check_headers: !no_header_checks,
                ..TestConfig::default()
            };
            let handle = scanner
                .start(HttpScanRequest {
                    project_id: project,
                    test,
                })
                .await?;
            let summary = run_to_end(scanner.controller(), handle).await?;
            let results = scanner.controller().session_results().await;
            print_http_table(&results, &summary);
            write_output(output.as_deref(), &results);
            Ok(())
        }
        Command::Ports {
            host,
            range,
            custom,
            timeout_ms,
            output,
        } => {
            let scanner = PortScanner::new(store, session_store, &settings);
            let ports = match (range, custom) {
                (Some(r), _) => PortSelection::Range(r),
                (None, Some(c)) => PortSelection::Custom(c),
                (None, None) => PortSelection::Common,
            };
            let handle = scanner
                .start(PortScanRequest {
                    host: host.clone(),
                    ports,
                    timeout_ms,
                })
                .await?;
            let summary = run_to_end(scanner.controller(), handle).await?;
            let results = scanner.controller().session_results().await;
            print_port_table(&host, &results, &summary);
            write_output(output.as_deref(), &results);
            Ok(())
        }
    }
}

async fn serve(settings: &Settings, store: SharedStore, session_store: SharedStore) -> Result<()> {
    let state = AppState {
        http: Arc::new(HttpScanner::new(store.clone(), session_store.clone(), settings)?),
        ports: Arc::new(PortScanner::new(store, session_store, settings)),
    };
    println!("Press Ctrl+C to stop the server...");
    tokio::select! {
        res = server::spawn_server(&settings.bind, state, &settings.ui_dir) => res,
        _ = tokio::signal::ctrl_c() => Ok(()),
    }
}

/// Await a run, turning Ctrl-C into a cooperative stop.
async fn run_to_end<R: LogRecord>(
    controller: &ScanController<R>,
    handle: tokio::task::JoinHandle<RunSummary>,
) -> Result<RunSummary> {
    let stopper = controller.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stopper.stop().await;
        }
    });
    let summary = handle.await.context("scan task failed")?;
    ctrl_c.abort();
    Ok(summary)
}

fn print_http_table(results: &[ScanResult], summary: &RunSummary) {
    let name_w = results
        .iter()
        .map(|r| r.endpoint_name.len())
        .max()
        .unwrap_or(0)
        .max("endpoint".len());
    let url_w = results
        .iter()
        .map(|r| r.url.len().min(60))
        .max()
        .unwrap_or(0)
        .max("url".len());

    println!(
        "\n{} of {} endpoints scanned: {} passed, {} failed or errored{}",
        summary.completed,
        summary.total,
        summary.passed,
        summary.failed,
        if summary.stopped { " (stopped)" } else { "" }
    );
    println!(
        "{:<name_w$}  {:<7}  {:<url_w$}  {:>6}  {:>4}  {:>8}  findings",
        "endpoint", "method", "url", "status", "code", "time_ms",
    );
    println!(
        "{:-<name_w$}  {:-<7}  {:-<url_w$}  {:-<6}  {:-<4}  {:-<8}  {:-<8}",
        "", "", "", "", "", "", "",
    );
    for r in results {
        let url: String = r.url.chars().take(60).collect();
        println!(
            "{:<name_w$}  {:<7}  {:<url_w$}  {:>6}  {:>4}  {:>8}  {}",
            r.endpoint_name,
            r.method.as_str(),
            url,
            r.status.to_string(),
            r.status_code,
            r.response_time_ms,
            r.vulnerabilities.len(),
        );
        for finding in &r.vulnerabilities {
            println!("{:>name_w$}  - {}", "", finding);
        }
    }
}

fn print_port_table(host: &str, results: &[PortProbeResult], summary: &RunSummary) {
    let service_w = results
        .iter()
        .map(|r| r.service.len())
        .max()
        .unwrap_or(0)
        .max("service".len());
    let open = results.iter().filter(|r| r.status == PortStatus::Open).count();

    println!(
        "\n{host}: {open} open of {} probed ({} in worklist){}",
        summary.completed,
        summary.total,
        if summary.stopped { " (stopped)" } else { "" }
    );
    println!(
        "{:>5}  {:<8}  {:<service_w$}  {:>10}  banner",
        "port", "status", "service", "latency_ms",
    );
    println!(
        "{:-<5}  {:-<8}  {:-<service_w$}  {:-<10}  {:-<6}",
        "", "", "", "", "",
    );
    for r in results {
        let bsnip: String = r.banner.as_deref().unwrap_or("").chars().take(60).collect();
        println!(
            "{:>5}  {:<8}  {:<service_w$}  {:>10}  {}",
            r.port,
            r.status.to_string(),
            r.service,
            r.latency_ms,
            bsnip,
        );
    }
}

fn write_output<T: Serialize>(path: Option<&Path>, results: &T) {
    let Some(path) = path else {
        return;
    };
    match write_results_json(path, results) {
        Ok(()) => info!("wrote JSON results to {}", path.display()),
        Err(e) => warn!("failed to write JSON to {}: {}", path.display(), e),
    }
}

fn write_results_json<T: Serialize>(path: &Path, results: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}
