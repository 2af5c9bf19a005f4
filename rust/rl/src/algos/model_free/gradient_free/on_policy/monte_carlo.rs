use crate::sampling::Trajectory;
use pirl_gym::{Continous, Discrete};
use std::iter::zip;

/// Ref: https://youtu.be/P0ZvxeQqv0A?si=RLKdOUTNEfKXE63C
pub fn mc_first_visit(trajectories: &[Trajectory], gamma: Continous, n_s: usize) -> Vec<Continous> {
    mc_core(trajectories, gamma, n_s, is_first_visit)
}

/// Ref: https://youtu.be/P0ZvxeQqv0A?si=RLKdOUTNEfKXE63C
pub fn mc_every_visit(trajectories: &[Trajectory], gamma: Continous, n_s: usize) -> Vec<Continous> {
    mc_core(trajectories, gamma, n_s, |_, _| true)
}

fn mc_core(
    trajectories: &[Trajectory],
    gamma: Continous,
    n_s: usize,
    is_first_visit: fn(&Trajectory, usize) -> bool,
) -> Vec<Continous> {
    let returns = &mut vec![0 as Continous; n_s];
    let visits = &mut vec![0usize; n_s];

    for ep in trajectories {
        let mut g = 0.;
        for t in (0..ep.len()).rev() {
            g = gamma * g + ep.rewards[t];
            if is_first_visit(ep, t) {
                returns[ep.states[t]] += g;
                visits[ep.states[t]] += 1;
            }
        }
    }

    zip(returns, visits)
        .map(|(&mut r, &mut v)| if v == 0 { 0. } else { r / (v as Continous) })
        .collect()
}

fn is_first_visit(ep: &Trajectory, t: usize) -> bool {
    let s: Discrete = ep.states[t];
    !ep.states.iter().take(t).any(|&x| x == s)
}

/// Mean discounted return of the trajectories, a sample estimate of the
/// policy value from the initial distribution.
pub fn mean_return(trajectories: &[Trajectory], gamma: Continous) -> Option<Continous> {
    if trajectories.is_empty() {
        return None;
    }
    let total: Continous = trajectories
        .iter()
        .map(|ep| ep.rewards.iter().rev().fold(0., |g, r| gamma * g + r))
        .sum();
    Some(total / trajectories.len() as Continous)
}
