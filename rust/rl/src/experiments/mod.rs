//! Experiment orchestration: plan experts, sample demonstrations, infer rewards,
//! re-plan under them and score the result against the true reward.

pub mod config;
mod tasks;

pub use config::{Experiment, ExperimentConfig, IrlAlgorithm, Registry, RlAlgorithm};

use crate::algos::model_free::gradient_free::on_policy::monte_carlo::mean_return;
use crate::irl::IrlDiagnostics;
use crate::{synthetic_data, Error, Policy, Result, Trajectory};
use indexmap::IndexMap;
use pirl_gym::{Environment, Mdp, RewardTable, TabularEnv};
use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tasks::{guarded, infer, reoptimize, Context, InferenceTask};

pub const GROUND_TRUTH: &str = "ground_truth";

/// Stages of one experiment run. The inference and evaluation stages repeat
/// once per trajectory count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Configured,
    EnvironmentsBuilt,
    GroundTruthPoliciesPlanned,
    TrajectoriesSampled,
    RewardInferred,
    PolicyReoptimized,
    ValueEvaluated,
    ResultAssembled,
}

impl Stage {
    pub fn follows(self, prev: Stage) -> bool {
        use Stage::*;
        matches!(
            (prev, self),
            (Configured, EnvironmentsBuilt)
                | (EnvironmentsBuilt, GroundTruthPoliciesPlanned)
                | (GroundTruthPoliciesPlanned, TrajectoriesSampled)
                | (TrajectoriesSampled, RewardInferred)
                | (RewardInferred, PolicyReoptimized)
                | (PolicyReoptimized, ValueEvaluated)
                | (ValueEvaluated, RewardInferred)
                | (ValueEvaluated, ResultAssembled)
        )
    }
}

struct Progress<'a> {
    experiment: &'a str,
    stage: Stage,
}

impl Progress<'_> {
    fn advance(&mut self, next: Stage) {
        debug_assert!(next.follows(self.stage), "{:?} -> {next:?}", self.stage);
        self.stage = next;
        tracing::info!(experiment = self.experiment, stage = ?next, "stage complete");
    }
}

/// One (environment, algorithm) unit that could not be completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub environment: String,
    pub algorithm: String,
    pub reason: String,
}

/// Outcome for one trajectory count. Maps are keyed by algorithm, then
/// environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub num_trajectories: usize,
    pub rewards: IndexMap<String, IndexMap<String, RewardTable>>,
    pub diagnostics: IndexMap<String, IndexMap<String, IrlDiagnostics>>,
    /// Includes the expert's own value under [`GROUND_TRUTH`].
    pub values: IndexMap<String, IndexMap<String, f64>>,
    pub failures: Vec<UnitFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub experiment: String,
    pub seed: u64,
    /// Expert demonstrations per environment, as many as the largest count.
    pub trajectories: IndexMap<String, Vec<Trajectory>>,
    /// Sample estimate of each expert's value from its demonstrations.
    pub expert_mean_returns: IndexMap<String, f64>,
    pub sweeps: Vec<SweepResult>,
}

/// Runs one experiment on a pool of `num_workers` threads (all cores when
/// `None`). The outcome depends only on the experiment and `seed`.
pub fn run_experiment(
    experiment: &Experiment,
    seed: u64,
    num_workers: Option<usize>,
) -> Result<ExperimentResult> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers.unwrap_or(0))
        .build()
        .map_err(|e| Error::Worker(e.to_string()))?;
    pool.install(|| run(experiment, seed))
}

fn run(experiment: &Experiment, seed: u64) -> Result<ExperimentResult> {
    let mut progress = Progress {
        experiment: &experiment.name,
        stage: Stage::Configured,
    };
    let names = &experiment.environments;
    let max_trajectories = experiment.num_trajectories.iter().copied().max().unwrap_or(0);

    let mut envs = names
        .iter()
        .map(|name| {
            let mut env = pirl_gym::make(name)?;
            env.seed(seed);
            Ok(env)
        })
        .collect::<Result<Vec<TabularEnv>>>()?;
    progress.advance(Stage::EnvironmentsBuilt);

    let rl = &experiment.rl;
    let experts = envs
        .par_iter()
        .map(|env| rl.plan(env, env.reward_source()))
        .collect::<Result<Vec<Policy>>>()?;
    let ground_truth = envs
        .par_iter()
        .zip(&experts)
        .map(|(env, policy)| rl.value(env, env.reward_source(), policy))
        .collect::<Result<Vec<f64>>>()?;
    progress.advance(Stage::GroundTruthPoliciesPlanned);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut trajectories = IndexMap::new();
    let mut expert_mean_returns = IndexMap::new();
    for ((name, env), policy) in names.iter().zip(&mut envs).zip(&experts) {
        let data = synthetic_data(env, policy, max_trajectories, &mut rng)?;
        if let Some(r) = mean_return(&data, env.gamma()) {
            expert_mean_returns.insert(name.clone(), r);
        }
        trajectories.insert(name.clone(), data);
    }
    progress.advance(Stage::TrajectoriesSampled);

    let mut sweeps = vec![];
    for &n in &experiment.num_trajectories {
        let ctx = Context {
            envs: &envs,
            rl,
            algorithms: &experiment.irl,
            data: trajectories.values().map(|t| &t[..n]).collect(),
        };
        let mut result = sweep(&ctx, names, n, &mut progress);
        let expert_values = names.iter().cloned().zip(ground_truth.iter().copied());
        result.values.insert(GROUND_TRUTH.into(), expert_values.collect());
        sweeps.push(result);
    }
    progress.advance(Stage::ResultAssembled);

    Ok(ExperimentResult {
        experiment: experiment.name.clone(),
        seed,
        trajectories,
        expert_mean_returns,
        sweeps,
    })
}

fn sweep(ctx: &Context, names: &[String], n: usize, progress: &mut Progress) -> SweepResult {
    let algorithm_name = |a: usize| ctx.algorithms[a].0.clone();
    let mut result = SweepResult {
        num_trajectories: n,
        rewards: IndexMap::new(),
        diagnostics: IndexMap::new(),
        values: IndexMap::new(),
        failures: vec![],
    };

    let tasks = InferenceTask::plan(ctx.algorithms, ctx.envs.len());
    let outcomes: Vec<_> = tasks
        .par_iter()
        .map(|&task| guarded(|| infer(ctx, task)))
        .collect();

    // (environment, algorithm) -> inferred reward
    let mut inferred: IndexMap<(usize, usize), RewardTable> = IndexMap::new();
    for (task, outcome) in tasks.iter().zip(outcomes) {
        let a = task.algorithm();
        match outcome {
            Ok(units) => {
                for unit in units {
                    let env = names[unit.environment].clone();
                    result
                        .diagnostics
                        .entry(algorithm_name(a))
                        .or_default()
                        .insert(env.clone(), unit.diagnostics);
                    result
                        .rewards
                        .entry(algorithm_name(a))
                        .or_default()
                        .insert(env, unit.reward.clone());
                    inferred.insert((unit.environment, a), unit.reward);
                }
            }
            Err(reason) => {
                tracing::warn!(algorithm = %algorithm_name(a), n, %reason, "reward inference failed");
                for e in task.environments(names.len()) {
                    result.failures.push(UnitFailure {
                        environment: names[e].clone(),
                        algorithm: algorithm_name(a),
                        reason: reason.clone(),
                    });
                }
            }
        }
    }
    progress.advance(Stage::RewardInferred);

    // Evaluation units are ordered by environment, then algorithm.
    inferred.sort_keys();
    let units: Vec<_> = inferred.iter().map(|(&(e, a), r)| (e, a, r)).collect();
    let evaluations: Vec<_> = units
        .par_iter()
        .map(|&(e, _, reward)| guarded(|| reoptimize(ctx, e, reward)))
        .collect();
    progress.advance(Stage::PolicyReoptimized);

    let mut values: IndexMap<usize, IndexMap<String, f64>> = IndexMap::new();
    for (&(e, a, _), outcome) in units.iter().zip(evaluations) {
        match outcome {
            Ok(value) => {
                values.entry(a).or_default().insert(names[e].clone(), value);
            }
            Err(reason) => {
                tracing::warn!(
                    algorithm = %algorithm_name(a),
                    environment = %names[e],
                    %reason,
                    "evaluation failed"
                );
                result.failures.push(UnitFailure {
                    environment: names[e].clone(),
                    algorithm: algorithm_name(a),
                    reason,
                });
            }
        }
    }
    values.sort_keys();
    result.values = values
        .into_iter()
        .map(|(a, by_env)| (algorithm_name(a), by_env))
        .collect();
    progress.advance(Stage::ValueEvaluated);

    result
}
