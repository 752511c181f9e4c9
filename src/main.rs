mod board;
mod cli;
mod config;
mod error;
mod llm;
mod pipeline;
mod state_machine;
mod storage;
mod text;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use board::JobBoardClient;
use cli::Cli;
use config::ScribeConfig;
use llm::RateLimitedCaller;
use storage::PgVacancyStore;
use ui::ProcessProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current step");
            signal.cancel();
        }
    });

    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id, command = ?cli.command);
    run(cli, shutdown).instrument(span).await
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info,sqlx=warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli, shutdown: CancellationToken) -> Result<()> {
    let mut config =
        ScribeConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if !cli.command.queries().is_empty() {
        config.queries = cli.command.queries().to_vec();
    }
    if cli.command.fetches() {
        config
            .validate_fetch()
            .context("fetch is not configured")?;
    }
    if cli.command.processes() {
        config
            .validate_process()
            .context("process is not configured")?;
    }

    let store = PgVacancyStore::connect(&config.database_url, config.max_connections)
        .await
        .context("failed to connect to the database")?;
    store
        .migrate()
        .await
        .context("failed to apply database migrations")?;

    if cli.command.fetches() {
        let board = JobBoardClient::new(
            config.job_api_url.clone(),
            config.job_api_key.clone(),
            config.experience.clone(),
        )
        .context("failed to build the job board client")?;

        let report =
            pipeline::fetch(&board, &store, &config.queries, config.per_page, &shutdown).await;
        info!(
            stored = report.stored,
            already_stored = report.already_stored,
            failed = report.failed_listings,
            "fetch finished"
        );
        ui::print_fetch_report(&report);
    }

    if cli.command.processes() && !shutdown.is_cancelled() {
        let caller = RateLimitedCaller::new(
            config.llm_api_url.clone(),
            config.llm_api_key.clone(),
            config.retry_policy(),
            config.http_timeout(),
        )
        .context("failed to build the enrichment client")?;

        let progress = ProcessProgress::new();
        let result = pipeline::process(
            &caller,
            &store,
            &config.model,
            &config.system_prompt,
            &shutdown,
            &progress,
        )
        .await;
        progress.finish();

        let report = result.context("processing pass failed")?;
        info!(
            enriched = report.enriched,
            failed = report.failed,
            cancelled = report.cancelled,
            "process finished"
        );
        ui::print_process_report(&report);
    }

    store.close().await;
    Ok(())
}
