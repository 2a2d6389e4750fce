//! ethos-engine CLI: run scenario pipelines or benchmark suites through the
//! job queue, under one shared concurrency limiter.
//!
//! Logging: set `RUST_LOG=ethos_engine=info` (or `warn`, `debug`) to see
//! engine logs on stderr.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ethos_engine::{
    AgentInvoker, ConcurrencyLimiter, EngineRunner, JobKind, JobQueueManager, JsonResultSink,
    JudgeParams, LlmBackend, ReasoningBackend, RunParams, ScenarioPipelines, load_benchmarks,
    load_scenarios, load_settings, load_trait_map, spawn_limiter_monitor,
};

use crate::cli::{Cli, Command, ItemCollection};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ethos_engine=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let settings = load_settings(&cli.settings);
    let limiter = ConcurrencyLimiter::new(settings.concurrency);
    let backend: Arc<dyn ReasoningBackend> = Arc::new(LlmBackend::new(
        settings.backend.inference_url.clone(),
        settings.backend.model.clone(),
        settings.backend.api_key.clone(),
    ));
    let invoker = Arc::new(AgentInvoker::new(
        backend,
        Arc::clone(&limiter),
        Duration::from_secs(settings.agent_timeout_secs),
    ));
    let personas = load_trait_map(&cli.data_dir.join("personas.json"))?;
    let frameworks = load_trait_map(&cli.data_dir.join("frameworks.json"))?;
    let pipelines = Arc::new(ScenarioPipelines::new(
        invoker,
        personas,
        frameworks,
        settings.depth_specs.clone(),
    ));

    let mut judge = None;
    let (kind, scenarios, benchmarks) = match &cli.command {
        Command::Scenarios {
            scenarios_file,
            judge_persona,
            judge_framework,
        } => {
            judge = judge_persona
                .as_ref()
                .zip(judge_framework.as_ref())
                .map(|(persona, framework)| JudgeParams {
                    persona: persona.clone(),
                    framework: framework.clone(),
                });
            (JobKind::AllScenarios, load_scenarios(scenarios_file)?, Vec::new())
        }
        Command::Benchmarks { bench_file } => {
            (JobKind::AllBenchmarks, Vec::new(), load_benchmarks(bench_file)?)
        }
        Command::Item {
            collection,
            id,
            scenarios_file,
            bench_file,
        } => match collection {
            ItemCollection::Scenarios => {
                let item = load_scenarios(scenarios_file)?
                    .into_iter()
                    .find(|item| item.id == *id)
                    .ok_or_else(|| anyhow!("scenario '{id}' not found"))?;
                (JobKind::SingleScenario(item), Vec::new(), Vec::new())
            }
            ItemCollection::Benchmarks => {
                let item = load_benchmarks(bench_file)?
                    .into_iter()
                    .find(|item| item.question_id == *id)
                    .ok_or_else(|| anyhow!("benchmark '{id}' not found"))?;
                (JobKind::SingleBenchmark(item), Vec::new(), Vec::new())
            }
        },
    };

    let params = RunParams {
        persona: cli.persona.clone(),
        framework: cli.framework.clone(),
        depth: cli.depth,
        judge,
    };
    let sink = Arc::new(JsonResultSink::new(cli.results_dir.clone()));
    let runner = Arc::new(EngineRunner::new(pipelines, sink, scenarios, benchmarks));
    let (queue, mut events) = JobQueueManager::new(runner);

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let detail = event
                .message
                .map(|message| format!(" ({message})"))
                .unwrap_or_default();
            tracing::info!("job {} -> {:?}{detail}", event.job_id, event.status);
        }
    });
    let monitor = spawn_limiter_monitor(Arc::clone(&limiter), Duration::from_secs(2));

    queue.enqueue(kind, params).await;
    let summary = queue.start_drain().await?;

    monitor.abort();
    event_logger.abort();

    for job in queue.jobs().await {
        tracing::warn!(
            "job {} still visible after drain: {:?} ({})",
            job.id,
            job.status,
            job.message.unwrap_or_default()
        );
    }
    println!(
        "drain finished: {} dispatched, {} completed, {} errored, {} warned",
        summary.dispatched, summary.completed, summary.errored, summary.warned
    );
    if summary.errored > 0 {
        anyhow::bail!("{} job(s) failed", summary.errored);
    }
    Ok(())
}
