use super::config::{IrlAlgorithm, RlAlgorithm};
use crate::irl::{
    maxent_concat, maxent_irl, maxent_population_irl, Demonstrations, IrlDiagnostics,
};
use crate::{Result, Trajectory};
use pirl_gym::{Mdp, RewardTable, TabularEnv};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Read-only state every worker sees for one trajectory count.
pub(super) struct Context<'a> {
    pub envs: &'a [TabularEnv],
    pub rl: &'a RlAlgorithm,
    pub algorithms: &'a [(String, IrlAlgorithm)],
    /// Demonstrations per environment.
    pub data: Vec<&'a [Trajectory]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InferenceTask {
    /// Fit one environment on its own.
    PerEnvironment { algorithm: usize, environment: usize },
    /// Fit all environments in one call.
    Joint { algorithm: usize },
}

impl InferenceTask {
    pub fn plan(algorithms: &[(String, IrlAlgorithm)], n_env: usize) -> Vec<Self> {
        let mut tasks = vec![];
        for (algorithm, (_, algo)) in algorithms.iter().enumerate() {
            match algo {
                IrlAlgorithm::MaxEntSingle(_) => tasks.extend(
                    (0..n_env).map(|environment| Self::PerEnvironment {
                        algorithm,
                        environment,
                    }),
                ),
                IrlAlgorithm::MaxEntConcat(_) | IrlAlgorithm::MaxEntPopulation(_) => {
                    tasks.push(Self::Joint { algorithm })
                }
            }
        }
        tasks
    }

    pub fn algorithm(&self) -> usize {
        match *self {
            Self::PerEnvironment { algorithm, .. } | Self::Joint { algorithm } => algorithm,
        }
    }

    pub fn environments(&self, n_env: usize) -> Vec<usize> {
        match *self {
            Self::PerEnvironment { environment, .. } => vec![environment],
            Self::Joint { .. } => (0..n_env).collect(),
        }
    }
}

/// Inferred reward for one environment.
pub(super) struct Inferred {
    pub environment: usize,
    pub reward: RewardTable,
    pub diagnostics: IrlDiagnostics,
}

pub(super) fn infer(ctx: &Context, task: InferenceTask) -> Result<Vec<Inferred>> {
    let (_, algo) = &ctx.algorithms[task.algorithm()];
    match (task, algo) {
        (InferenceTask::PerEnvironment { environment, .. }, IrlAlgorithm::MaxEntSingle(cfg)) => {
            let env = &ctx.envs[environment];
            let (reward, diagnostics) = maxent_irl(env, ctx.data[environment], cfg)?;
            Ok(vec![Inferred {
                environment,
                reward,
                diagnostics,
            }])
        }
        (InferenceTask::Joint { .. }, IrlAlgorithm::MaxEntConcat(cfg)) => {
            let (rewards, diagnostics) = maxent_concat(&demonstrations(ctx), cfg)?;
            Ok(replicate(rewards, diagnostics))
        }
        (InferenceTask::Joint { .. }, IrlAlgorithm::MaxEntPopulation(cfg)) => {
            let (reward, diagnostics) = maxent_population_irl(&demonstrations(ctx), cfg)?;
            Ok(replicate(reward.rewards(), diagnostics))
        }
        (task, _) => unreachable!("{task:?} does not match its algorithm"),
    }
}

fn demonstrations<'a>(ctx: &'a Context) -> Vec<Demonstrations<'a>> {
    ctx.envs
        .iter()
        .zip(&ctx.data)
        .map(|(env, &trajectories)| Demonstrations {
            mdp: env as &dyn Mdp,
            trajectories,
        })
        .collect()
}

/// Joint fits report one reward per environment, in environment order.
fn replicate(rewards: Vec<RewardTable>, diagnostics: IrlDiagnostics) -> Vec<Inferred> {
    rewards
        .into_iter()
        .enumerate()
        .map(|(environment, reward)| Inferred {
            environment,
            reward,
            diagnostics,
        })
        .collect()
}

/// Re-plans `environment` under `reward` and scores that policy against the
/// environment's true reward.
pub(super) fn reoptimize(ctx: &Context, environment: usize, reward: &RewardTable) -> Result<f64> {
    let env = &ctx.envs[environment];
    let learned = env.with_reward(reward.clone());
    let policy = ctx.rl.plan(&learned, learned.reward_source())?;
    ctx.rl.value(env, env.reward_source(), &policy)
}

/// Runs one unit of work, turning both errors and panics into a message.
pub(super) fn guarded<T>(f: impl FnOnce() -> Result<T>) -> std::result::Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(res) => res.map_err(|e| e.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irl::{MaxEntConfig, PopulationConfig};
    use crate::Error;

    #[test]
    fn single_fans_out_per_environment() {
        let algorithms = vec![
            ("a".to_string(), IrlAlgorithm::MaxEntPopulation(PopulationConfig::default())),
            ("b".to_string(), IrlAlgorithm::MaxEntSingle(MaxEntConfig::default())),
            ("c".to_string(), IrlAlgorithm::MaxEntConcat(MaxEntConfig::default())),
        ];
        let tasks = InferenceTask::plan(&algorithms, 2);
        assert_eq!(
            tasks,
            vec![
                InferenceTask::Joint { algorithm: 0 },
                InferenceTask::PerEnvironment {
                    algorithm: 1,
                    environment: 0
                },
                InferenceTask::PerEnvironment {
                    algorithm: 1,
                    environment: 1
                },
                InferenceTask::Joint { algorithm: 2 },
            ]
        );
        assert_eq!(tasks[0].environments(2), vec![0, 1]);
        assert_eq!(tasks[2].environments(2), vec![1]);
    }

    #[test]
    fn guarded_reports_errors_and_panics() {
        assert_eq!(guarded(|| Ok(3)), Ok(3));
        assert_eq!(
            guarded::<()>(|| Err(Error::Singular)),
            Err("singular linear system".to_string())
        );
        let res = guarded::<()>(|| panic!("boom {}", 7));
        assert_eq!(res, Err("panicked: boom 7".to_string()));
    }
}
