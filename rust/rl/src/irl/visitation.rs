use crate::math::solve;
use crate::{Error, Policy, Result, Trajectory};
use ndarray::{Array1, Array2, Axis};
use pirl_gym::Mdp;
use serde::{Deserialize, Serialize};

/// Expected discounted occupancy of `(state, action)` pairs.
///
/// Only states where an action is taken are counted, so the total mass is
/// `E[sum_{t < L} discount^t]` for episode length `L`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitationFrequency {
    pub state_action: Array2<f64>,
}

impl VisitationFrequency {
    pub fn states(&self) -> Array1<f64> {
        self.state_action.sum_axis(Axis(1))
    }

    pub fn total(&self) -> f64 {
        self.state_action.sum()
    }
}

/// Discounted counts averaged over trajectories: the pair at step `t`
/// contributes `discount^t`.
pub fn empirical_visitation(
    trajectories: &[Trajectory],
    n_s: usize,
    n_a: usize,
    discount: f64,
) -> Result<VisitationFrequency> {
    if trajectories.is_empty() {
        return Err(Error::EmptyDemonstrations);
    }

    let mut counts = Array2::<f64>::zeros((n_s, n_a));
    for t in trajectories {
        let mut weight = 1.;
        for (&s, &a) in t.states.iter().zip(&t.actions) {
            let cell = counts.get_mut([s, a]).ok_or_else(|| {
                Error::Dimension(format!("({s}, {a}) outside {n_s} states and {n_a} actions"))
            })?;
            *cell += weight;
            weight *= discount;
        }
    }
    counts /= trajectories.len() as f64;

    Ok(VisitationFrequency {
        state_action: counts,
    })
}

/// Occupancy of `policy` in closed form. Without a horizon this solves
/// `(I - discount M^T) d = d0`, where `M` is the state-to-state kernel under the
/// policy restricted to non-terminal states. With a horizon the same recursion
/// is unrolled for that many steps, matching truncated episodes.
pub fn exact_visitation(
    mdp: &dyn Mdp,
    policy: &Policy,
    discount: f64,
) -> Result<VisitationFrequency> {
    let (n_s, n_a) = (mdp.n_s(), mdp.n_a());
    policy.check(n_s, n_a)?;
    let pi = policy.to_matrix(n_a);
    let p = mdp.transition();
    let terminal = mdp.terminal();

    let m = Array2::from_shape_fn((n_s, n_s), |(s, k)| {
        if terminal[s] || terminal[k] {
            0.
        } else {
            (0..n_a).map(|a| pi[[s, a]] * p[[s, a, k]]).sum()
        }
    });
    let d0 = Array1::from_shape_fn(n_s, |s| {
        if terminal[s] {
            0.
        } else {
            mdp.initial_states()[s]
        }
    });

    let d = match mdp.horizon() {
        None => solve(Array2::eye(n_s) - discount * &m.t(), d0)?,
        Some(horizon) => {
            let mut d_t = d0;
            let mut total = d_t.clone();
            for _ in 1..horizon {
                d_t = discount * m.t().dot(&d_t);
                total += &d_t;
            }
            total
        }
    };

    Ok(VisitationFrequency {
        state_action: Array2::from_shape_fn((n_s, n_a), |(s, a)| d[s] * pi[[s, a]]),
    })
}
