mod config;

use advgrid_core::catalog::{default_catalog, fill_values};
use advgrid_core::host::InterruptFlag;
use advgrid_core::{GenerationRequest, JobOutcome};
use advgrid_pipeline::{Host, TracingProgress};
use advgrid_webui::{InterruptHandle, WebUiApi, WebUiHost};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Cli, Commands, RunArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "advgrid=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(cli.api_url, args).await,
        Commands::Axes => list_axes(cli.api_url).await,
    }
}

async fn run(api_url: String, args: RunArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.request)
        .with_context(|| format!("Cannot read request file {}", args.request.display()))?;
    let request: GenerationRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid request in {}", args.request.display()))?;
    let options = args.grid_options();

    let interrupt = InterruptFlag::new();
    let signal_flag = interrupt.clone();
    let handle = InterruptHandle::new(&api_url);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("Received SIGINT (Ctrl-C), interrupting grid");
        signal_flag.interrupt();
        if let Err(e) = handle.interrupt().await {
            tracing::warn!(error = %e, "Failed to interrupt the running render");
        }
    });

    let result = tokio::task::spawn_blocking(move || {
        let host = WebUiHost::new(WebUiApi::new(api_url));
        let progress = TracingProgress::new();
        advgrid_pipeline::run_grid(
            Host {
                registry: &host,
                settings: &host,
                renderer: &host,
            },
            &request,
            &args.axes,
            &default_catalog(),
            &options,
            &progress,
            interrupt,
        )
    })
    .await
    .context("Grid task panicked")??;

    tracing::info!(
        grid = %result.grid_path.display(),
        succeeded = result.count(JobOutcome::Succeeded),
        skipped = result.count(JobOutcome::Skipped),
        failed = result.count(JobOutcome::Failed),
        pending = result.count(JobOutcome::Pending),
        interrupted = result.interrupted,
        "Grid finished"
    );
    Ok(())
}

async fn list_axes(api_url: String) -> anyhow::Result<()> {
    let lines = tokio::task::spawn_blocking(move || {
        let host = WebUiHost::new(WebUiApi::new(api_url));
        default_catalog()
            .iter()
            .enumerate()
            .map(|(index, option)| match fill_values(option, &host) {
                Some(values) => format!("{index:>2}  {}: {values}", option.label),
                None => format!("{index:>2}  {}", option.label),
            })
            .collect::<Vec<_>>()
    })
    .await
    .context("Catalog task panicked")?;

    for line in lines {
        println!("{line}");
    }
    Ok(())
}
