pub mod evaluation;
pub mod vi;

pub use evaluation::{evaluate, policy_values};
pub use vi::{soft_value_iteration, value_iteration};

use crate::{Error, Result};
use ndarray::{Array1, Array2};
use pirl_gym::{Discrete, Mdp, RewardSource};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub type ValueFunction = Array1<f64>;

/// Mapping from state to an action distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    Deterministic(Vec<Discrete>),
    /// `(n_s, n_a)` matrix, each row sums to one.
    Stochastic(Array2<f64>),
}

impl Policy {
    pub fn n_s(&self) -> usize {
        match self {
            Self::Deterministic(actions) => actions.len(),
            Self::Stochastic(p) => p.nrows(),
        }
    }

    pub fn probability(&self, s: Discrete, a: Discrete) -> f64 {
        match self {
            Self::Deterministic(actions) => f64::from(u8::from(actions[s] == a)),
            Self::Stochastic(p) => p[[s, a]],
        }
    }

    pub fn to_matrix(&self, n_a: usize) -> Array2<f64> {
        match self {
            Self::Deterministic(actions) => {
                Array2::from_shape_fn((actions.len(), n_a), |(s, a)| self.probability(s, a))
            }
            Self::Stochastic(p) => p.clone(),
        }
    }

    /// Draws an action for `s`. A deterministic policy consumes no randomness.
    pub fn sample<R: Rng + ?Sized>(&self, s: Discrete, rng: &mut R) -> Discrete {
        match self {
            Self::Deterministic(actions) => actions[s],
            Self::Stochastic(p) => pirl_gym::tabular::pick_next(rng, p.row(s).iter().copied()),
        }
    }

    /// Most likely action per state, ties to the lowest index.
    pub fn greedy(&self) -> Vec<Discrete> {
        match self {
            Self::Deterministic(actions) => actions.clone(),
            Self::Stochastic(p) => p.rows().into_iter().map(|row| argmax(row.iter())).collect(),
        }
    }

    pub(crate) fn check(&self, n_s: usize, n_a: usize) -> Result<()> {
        let ok = match self {
            Self::Deterministic(actions) => actions.len() == n_s && actions.iter().all(|&a| a < n_a),
            Self::Stochastic(p) => p.dim() == (n_s, n_a),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::Dimension(format!(
                "policy does not fit {n_s} states and {n_a} actions"
            )))
        }
    }
}

pub(crate) fn argmax<'a>(xs: impl Iterator<Item = &'a f64>) -> Discrete {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, &x) in xs.enumerate() {
        if x > best.1 {
            best = (i, x);
        }
    }
    best.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerOptions {
    /// Sup-norm change between successive value estimates at which to stop.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Fail instead of returning the best estimate when the budget runs out.
    pub strict: bool,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 10_000,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanMode {
    /// Bellman optimality backup, deterministic arg-max policy.
    Hard,
    /// Entropy regularised backup, Boltzmann policy.
    Soft { temperature: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanDiagnostics {
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
}

impl PlanDiagnostics {
    pub(crate) fn check(self, options: &PlannerOptions) -> Result<Self> {
        if !self.converged {
            if options.strict {
                return Err(Error::NotConverged {
                    iterations: self.iterations,
                    residual: self.residual,
                });
            }
            tracing::warn!(
                iterations = self.iterations,
                residual = self.residual,
                "value iteration did not converge, using best estimate"
            );
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub policy: Policy,
    pub values: ValueFunction,
    pub q: Array2<f64>,
    pub diagnostics: PlanDiagnostics,
}

impl Plan {
    pub fn v_star(&self, s: Discrete) -> f64 {
        self.values[s]
    }

    pub fn q_star(&self, s: Discrete, a: Discrete) -> Option<f64> {
        self.q.get([s, a]).copied()
    }

    pub fn pi_star(&self, s: Discrete) -> Option<Discrete> {
        (s < self.policy.n_s()).then(|| self.policy.greedy()[s])
    }
}

/// Plans under `reward` with the MDP's own discount.
pub fn plan(
    mdp: &dyn Mdp,
    reward: &dyn RewardSource,
    mode: PlanMode,
    options: &PlannerOptions,
) -> Result<Plan> {
    let r = reward.to_matrix(mdp.n_s(), mdp.n_a());
    match mode {
        PlanMode::Hard => value_iteration(mdp, &r, mdp.gamma(), options),
        PlanMode::Soft { temperature } => {
            soft_value_iteration(mdp, &r, mdp.gamma(), temperature, options, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::prelude::*;

    #[test]
    fn deterministic_policy_consumes_no_randomness() {
        let policy = Policy::Deterministic(vec![1, 0]);
        let mut rng = StdRng::seed_from_u64(7);
        let before = rng.clone().gen::<u64>();
        assert_eq!(policy.sample(0, &mut rng), 1);
        assert_eq!(rng.gen::<u64>(), before);
    }

    #[test]
    fn greedy_breaks_ties_low() {
        let policy = Policy::Stochastic(array![[0.5, 0.5], [0.2, 0.8]]);
        assert_eq!(policy.greedy(), vec![0, 1]);
        assert_eq!(Policy::Deterministic(vec![1]).to_matrix(3), array![[0., 1., 0.]]);
    }

    #[test]
    fn check_rejects_out_of_range_actions() {
        assert!(Policy::Deterministic(vec![2]).check(1, 2).is_err());
        assert!(Policy::Stochastic(array![[1., 0.]]).check(1, 2).is_ok());
    }
}
