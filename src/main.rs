//! Binary entry point: tracing setup, configuration, dependency wiring,
//! and subcommand dispatch.
//!
//! All external collaborators (search provider, chat model, event store,
//! article fetcher) are constructed here, once, and handed to the
//! orchestrator as explicit dependencies.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use event_dossier::cli::{Cli, Command};
use event_dossier::config::AppConfig;
use event_dossier::fetch::HttpFetcher;
use event_dossier::llm::{OpenAiChat, RetryChat};
use event_dossier::models::EventRecord;
use event_dossier::pipeline::{PipelineDeps, run_research, run_update_check};
use event_dossier::search::GoogleSearch;
use event_dossier::server::{AppState, build_router};
use event_dossier::store::JsonFileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    let config = AppConfig::from_env();

    let store = Arc::new(JsonFileStore::new(&args.data_dir));

    match args.command {
        Command::AddEvent { event_id, query, title } => {
            let record = EventRecord {
                id: event_id.clone(),
                title: title.unwrap_or_else(|| query.clone()),
                query,
                last_updated_at: None,
            };
            store.create_event(&record).await?;
            println!("created event {event_id}");
        }

        Command::Research { event_id } => {
            let deps = build_deps(&config, store)?;
            let summary = run_research(&deps, &event_id).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Update { event_id } => {
            let deps = build_deps(&config, store)?;
            match run_update_check(&deps, &event_id).await? {
                Some(update) => println!("{}", serde_json::to_string_pretty(&update)?),
                None => println!("no new coverage for {event_id}"),
            }
        }

        Command::Serve { port } => {
            let shared_secret = config
                .api_shared_secret
                .clone()
                .context("PIPELINE_API_KEY must be set to serve the HTTP surface")?;
            let deps = build_deps(&config, store)?;
            let state = AppState::new(Arc::new(deps), shared_secret);
            let router = build_router(state);

            let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
                .await
                .with_context(|| format!("failed to bind port {port}"))?;
            info!(port, "Serving HTTP surface");
            axum::serve(listener, router).await?;
        }
    }

    Ok(())
}

/// Assemble the dependency container for a pipeline run.
fn build_deps(config: &AppConfig, store: Arc<JsonFileStore>) -> anyhow::Result<PipelineDeps> {
    let search = GoogleSearch::new(config)?;
    // Retry is applied here, at the composition root, so the synthesis
    // code itself never re-bills a failed call.
    let model = RetryChat::new(
        OpenAiChat::new(config)?,
        config.pipeline.model_retries,
        Duration::from_secs(1),
    );
    let fetcher = HttpFetcher::new(&config.pipeline)?;

    Ok(PipelineDeps {
        search: Arc::new(search),
        model: Arc::new(model),
        store,
        fetcher: Arc::new(fetcher),
        config: config.pipeline.clone(),
    })
}
