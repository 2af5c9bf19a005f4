use crate::{Policy, Result};
use pirl_gym::{Discrete, Environment};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One episode: `states` has one more entry than `actions`, and `rewards[t]`
/// is what the environment emitted for `actions[t]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub states: Vec<Discrete>,
    pub actions: Vec<Discrete>,
    pub rewards: Vec<f64>,
}

impl Trajectory {
    /// Number of steps taken.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Rolls `policy` forward from a reset until the environment reports the episode
/// finished. Randomness comes only from the environment and from `rng`, which
/// the policy draws its actions with.
pub fn sample<E, R>(env: &mut E, policy: &Policy, rng: &mut R) -> Result<Trajectory>
where
    E: Environment + ?Sized,
    R: Rng + ?Sized,
{
    let mut state = env.reset();
    let mut trajectory = Trajectory {
        states: vec![state],
        actions: vec![],
        rewards: vec![],
    };

    loop {
        let action = policy.sample(state, rng);
        let si = env.step(action)?;
        trajectory.actions.push(action);
        trajectory.rewards.push(si.reward);
        trajectory.states.push(si.observation);
        if si.done() {
            break;
        }
        state = si.observation;
    }

    Ok(trajectory)
}

/// `n` independent episodes under the same policy.
pub fn synthetic_data<E, R>(
    env: &mut E,
    policy: &Policy,
    n: usize,
    rng: &mut R,
) -> Result<Vec<Trajectory>>
where
    E: Environment + ?Sized,
    R: Rng + ?Sized,
{
    (0..n).map(|_| sample(&mut *env, policy, &mut *rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertor::*;
    use pirl_gym::{gridworld, make, Mdp};
    use rand::prelude::*;

    #[test]
    fn episodes_end_exactly_on_completion() {
        let mut env = make("pirl/GridWorld-Simple-v0").unwrap();
        env.seed(11);
        let terminal = env.terminal().to_vec();
        let horizon = env.horizon().unwrap();
        let policy = Policy::Stochastic(ndarray::Array2::from_elem((env.n_s(), env.n_a()), 0.25));
        let rng = &mut StdRng::seed_from_u64(3);

        let trajectories = synthetic_data(&mut env, &policy, 200, rng).unwrap();

        assert_that!(trajectories).has_length(200);
        for t in &trajectories {
            assert_eq!(t.states.len(), t.actions.len() + 1);
            assert_eq!(t.rewards.len(), t.actions.len());
            let last = *t.states.last().unwrap();
            let reached_terminal = terminal[last];
            assert!(reached_terminal || t.len() == horizon);
            // No terminal state before the end.
            assert!(t.states[..t.len()].iter().all(|&s| !terminal[s]));
        }
    }

    #[test]
    fn same_seeds_give_same_episodes() {
        let policy = Policy::Deterministic(vec![gridworld::RIGHT; 10]);
        let run = || {
            let mut env = make("pirl/GridWorld-Simple-v0").unwrap();
            env.seed(5);
            synthetic_data(&mut env, &policy, 20, &mut StdRng::seed_from_u64(9)).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn deterministic_world_follows_policy() {
        let mut env = make("pirl/GridWorld-Simple-Deterministic-v0").unwrap();
        // Right along the top row, then down the right column into the goal.
        let mut actions = vec![gridworld::RIGHT; 10];
        actions[2] = gridworld::DOWN;
        actions[5] = gridworld::DOWN;
        let policy = Policy::Deterministic(actions);

        let t = sample(&mut env, &policy, &mut StdRng::seed_from_u64(0)).unwrap();

        assert_eq!(t.states, vec![0, 1, 2, 5, 8, 9]);
        assert_eq!(t.rewards, vec![-0.1, -0.1, -0.1, -0.1, 1.]);
    }
}
