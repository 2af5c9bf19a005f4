use chrono::Local;
use clap::Parser;
use pirl::experiments::{run_experiment, Registry, GROUND_TRUTH};
use pirl::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const ISO_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

/// Plan experts, sample demonstrations, infer rewards from them and score
/// the re-optimised policies.
#[derive(Parser, Debug)]
#[command(name = "pirl", version)]
struct Cli {
    /// Directory receiving one sub-directory per experiment run.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    #[arg(long, default_value_t = 1234)]
    seed: u64,

    /// Worker threads; all cores by default.
    #[arg(long)]
    num_workers: Option<usize>,

    /// JSON file of experiments and algorithms layered over the built-ins.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(required = true)]
    experiments: Vec<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pirl=info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn writable_dir(path: &Path) -> Result<()> {
    let unwritable = |source| Error::Unwritable {
        path: path.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(path).map_err(unwritable)?;
    tempfile::tempfile_in(path).map_err(unwritable)?;
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let registry = match &cli.config {
        Some(path) => Registry::load(path)?,
        None => Registry::builtin(),
    };
    registry.validate()?;
    let experiments = cli
        .experiments
        .iter()
        .map(|name| registry.experiment(name))
        .collect::<Result<Vec<_>>>()?;
    writable_dir(&cli.data_dir)?;
    tracing::info!(?cli, "starting");

    for experiment in &experiments {
        let timestamp = Local::now().format(ISO_TIMESTAMP);
        let dir = cli.data_dir.join(format!(
            "{}-{timestamp}-{}",
            experiment.name,
            env!("CARGO_PKG_VERSION")
        ));
        std::fs::create_dir_all(&dir)?;

        let result = run_experiment(experiment, cli.seed, cli.num_workers)?;
        for sweep in &result.sweeps {
            for (algorithm, values) in &sweep.values {
                tracing::info!(
                    experiment = %experiment.name,
                    n = sweep.num_trajectories,
                    baseline = algorithm == GROUND_TRUTH,
                    "{algorithm}: {values:?}"
                );
            }
            for failure in &sweep.failures {
                tracing::warn!(?failure, "unit failed");
            }
        }

        let path = dir.join("results.json");
        std::fs::write(&path, serde_json::to_string_pretty(&result)?)?;
        tracing::info!(experiment = %experiment.name, path = %path.display(), "saved results");
    }

    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    match run(&Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
