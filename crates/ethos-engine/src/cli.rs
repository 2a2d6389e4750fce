use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use ethos_engine::Depth;

#[derive(Parser)]
#[command(name = "ethos-engine")]
#[command(about = "Run reasoning pipelines (planner -> executor -> judge) over scenario and benchmark collections.")]
pub(crate) struct Cli {
    /// Path to settings.json.
    #[arg(long, global = true, default_value = "config/settings.json")]
    pub(crate) settings: PathBuf,

    /// Data directory containing personas.json and frameworks.json.
    #[arg(long, global = true, default_value = "data")]
    pub(crate) data_dir: PathBuf,

    /// Directory results are written to.
    #[arg(long, global = true, default_value = "results")]
    pub(crate) results_dir: PathBuf,

    /// Persona name (must exist in personas.json).
    #[arg(long, global = true, default_value = "Neutral")]
    pub(crate) persona: String,

    /// Framework name (must exist in frameworks.json).
    #[arg(long, global = true, default_value = "Agentic")]
    pub(crate) framework: String,

    /// Reasoning detail level.
    #[arg(long, global = true, value_enum, default_value_t = Depth::Low)]
    pub(crate) depth: Depth,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum ItemCollection {
    Scenarios,
    Benchmarks,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline for every scenario in the scenarios file.
    Scenarios {
        /// Path to the scenarios JSON list.
        #[arg(long, default_value = "data/scenarios.json")]
        scenarios_file: PathBuf,

        /// Append a judge stage, run under this persona.
        #[arg(long, requires = "judge_framework")]
        judge_persona: Option<String>,

        /// Framework for the judge stage.
        #[arg(long, requires = "judge_persona")]
        judge_framework: Option<String>,
    },
    /// Run every benchmark item in the benchmark file.
    Benchmarks {
        /// Path to the benchmark JSON file ({"eval_data": [...]}).
        #[arg(long, default_value = "data/benchmarks.json")]
        bench_file: PathBuf,
    },
    /// Run a single item from one collection.
    Item {
        /// Which collection the item belongs to.
        #[arg(long, value_enum)]
        collection: ItemCollection,

        /// Item id within the collection.
        #[arg(long)]
        id: String,

        /// Path to the scenarios JSON list.
        #[arg(long, default_value = "data/scenarios.json")]
        scenarios_file: PathBuf,

        /// Path to the benchmark JSON file.
        #[arg(long, default_value = "data/benchmarks.json")]
        bench_file: PathBuf,
    },
}
