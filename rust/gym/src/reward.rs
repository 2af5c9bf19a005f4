use super::*;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Reward as a function of state, or of state and action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTable {
    State(Array1<f64>),
    StateAction(Array2<f64>),
}

impl RewardTable {
    pub fn n_s(&self) -> usize {
        match self {
            Self::State(r) => r.len(),
            Self::StateAction(r) => r.nrows(),
        }
    }

    pub fn get(&self, s: Discrete, a: Discrete) -> f64 {
        match self {
            Self::State(r) => r[s],
            Self::StateAction(r) => r[[s, a]],
        }
    }

    /// Expands to a `(n_s, n_a)` matrix; state rewards are shared by every action.
    pub fn to_matrix(&self, n_a: usize) -> Array2<f64> {
        match self {
            Self::State(r) => Array2::from_shape_fn((r.len(), n_a), |(s, _)| r[s]),
            Self::StateAction(r) => r.clone(),
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            Self::State(r) => r.iter().all(|x| x.is_finite()),
            Self::StateAction(r) => r.iter().all(|x| x.is_finite()),
        }
    }
}

/// Capability an environment delegates its emitted reward to.
pub trait RewardSource {
    fn reward(&self, s: Discrete, a: Discrete) -> f64;

    fn to_matrix(&self, n_s: usize, n_a: usize) -> Array2<f64> {
        Array2::from_shape_fn((n_s, n_a), |(s, a)| self.reward(s, a))
    }
}

impl RewardSource for RewardTable {
    fn reward(&self, s: Discrete, a: Discrete) -> f64 {
        self.get(s, a)
    }

    fn to_matrix(&self, _n_s: usize, n_a: usize) -> Array2<f64> {
        RewardTable::to_matrix(self, n_a)
    }
}
