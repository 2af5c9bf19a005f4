//! Maximum entropy inverse reinforcement learning over tabular MDPs.
//!
//! Rewards are state-only. Every solver ascends the gap between demonstrated
//! and expected discounted state visitation, re-planning softly each step.

pub mod maxent;
pub mod optim;
pub mod population;
pub mod visitation;

pub use maxent::{maxent_concat, maxent_irl, maxent_irl_from_visitation, MaxEntConfig};
pub use optim::{Optimizer, OptimizerConfig};
pub use population::{
    maxent_population_irl, maxent_population_irl_from_visitation, PopulationConfig,
    PopulationReward,
};
pub use visitation::{empirical_visitation, exact_visitation, VisitationFrequency};

use crate::{Error, Result, Trajectory};
use ndarray::Array1;
use pirl_gym::Mdp;
use serde::{Deserialize, Serialize};

/// Expert trajectories together with the dynamics they were recorded in.
#[derive(Clone, Copy)]
pub struct Demonstrations<'a> {
    pub mdp: &'a dyn Mdp,
    pub trajectories: &'a [Trajectory],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrlDiagnostics {
    pub iterations: usize,
    pub gradient_norm: f64,
    pub converged: bool,
}

impl IrlDiagnostics {
    fn start() -> Self {
        Self {
            iterations: 0,
            gradient_norm: f64::INFINITY,
            converged: false,
        }
    }

    fn check(self, strict: bool) -> Result<Self> {
        if !self.converged {
            if strict {
                return Err(Error::NotConverged {
                    iterations: self.iterations,
                    residual: self.gradient_norm,
                });
            }
            tracing::warn!(
                iterations = self.iterations,
                gradient_norm = self.gradient_norm,
                "IRL did not converge, returning last reward"
            );
        }
        Ok(self)
    }
}

fn check_gradient(iteration: usize, norm: f64) -> Result<()> {
    if norm.is_finite() {
        Ok(())
    } else {
        Err(Error::Divergence {
            iteration,
            reason: "non-finite gradient".into(),
        })
    }
}

fn check_reward(iteration: usize, reward: &Array1<f64>, bound: f64) -> Result<()> {
    let magnitude = reward.fold(0., |m: f64, x| m.max(x.abs()));
    if magnitude.is_finite() && magnitude <= bound {
        Ok(())
    } else {
        Err(Error::Divergence {
            iteration,
            reason: format!("reward magnitude {magnitude:e} exceeds {bound:e}"),
        })
    }
}

fn check_states(mdps: &[&dyn Mdp]) -> Result<usize> {
    let n_s = mdps.first().ok_or(Error::EmptyDemonstrations)?.n_s();
    match mdps.iter().find(|m| m.n_s() != n_s) {
        Some(other) => Err(Error::Dimension(format!(
            "environments disagree on state count: {n_s} and {}",
            other.n_s()
        ))),
        None => Ok(n_s),
    }
}
