//! Arbor binary.
//!
//! Loads a control declaration and a units file, evaluates every unit and
//! writes the terminal payloads per unit as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arbor_engine::preprocessing::{preprocess_units, simple_processable_chain};
use arbor_engine::result_ext::ResultExt;
use arbor_engine::{ControlDeclaration, EvaluationStrategy, FormationStrategy, Simulation};
use arbor_worker_pool::input::load_units;
use arbor_worker_pool::{default_catalog, Dispatcher, RunReport, WorkerConfig};

#[derive(Parser)]
#[command(name = "arbor")]
#[command(version, about = "Evaluate every admissible treatment schedule for a set of units", long_about = None)]
struct Cli {
    /// Control declaration (YAML, or JSON with a .json extension)
    #[arg(short, long, value_name = "FILE")]
    control: PathBuf,

    /// Units to simulate (YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    units: PathBuf,

    /// Where to write the run report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Tree formation strategy: full or partial
    #[arg(long)]
    formation_strategy: Option<FormationStrategy>,

    /// Evaluation strategy: depth or chains
    #[arg(long)]
    evaluation_strategy: Option<EvaluationStrategy>,

    /// Evaluate units on the worker pool
    #[arg(short, long)]
    multiprocessing: bool,

    /// Maximum concurrent units (overrides ARBOR_WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,arbor_engine=info,arbor_worker_pool=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("ARBOR_LOG_FORMAT").is_ok_and(|format| format == "json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let cli = Cli::parse();
    let started_at = chrono::Utc::now();

    let declaration = ControlDeclaration::from_file(&cli.control)
        .log("loading control declaration")
        .with_context(|| format!("Invalid control declaration {}", cli.control.display()))?;

    let mut app = declaration.app_configuration.clone();
    if let Some(formation) = cli.formation_strategy {
        app.formation_strategy = formation;
    }
    if let Some(evaluation) = cli.evaluation_strategy {
        app.evaluation_strategy = evaluation;
    }
    app.multiprocessing |= cli.multiprocessing;

    let mut config = WorkerConfig::from_env()?;
    if app.multiprocessing {
        config = config.with_multiprocessing(true);
    }
    if let Some(workers) = cli.workers {
        config = config.with_max_workers(workers);
    }
    tracing::info!(
        worker_id = %config.worker_id,
        max_workers = config.max_workers,
        formation_strategy = %app.formation_strategy,
        evaluation_strategy = %app.evaluation_strategy,
        "Configuration loaded"
    );

    let catalog = default_catalog();
    let preprocessing = simple_processable_chain(
        &declaration.preprocessing_operations,
        &declaration.preprocessing_params,
        &catalog,
    )?;
    let simulation = Simulation::from_declaration(declaration, catalog).log("preparing simulation")?;

    let units = load_units(&cli.units)?;
    let units = preprocess_units(units, &preprocessing)?;

    let dispatcher = Dispatcher::new(
        simulation,
        app.formation_strategy,
        app.evaluation_strategy,
        config,
    );
    let results = dispatcher.run(units).await.log("dispatching units")?;

    let report = RunReport::new(
        started_at,
        app.formation_strategy,
        app.evaluation_strategy,
        results,
    );
    tracing::info!(
        run_id = %report.run_id,
        units = report.units.len(),
        results = report.result_count(),
        "Run finished"
    );
    report.write(cli.output.as_deref())?;

    Ok(())
}
