use super::*;
use ndarray::{Array1, Array3, ArrayView2};
use rand::prelude::*;
use serde_json::json;
use std::sync::Arc;

/// Draws an index with the given probabilities using one uniform sample.
pub fn pick_next<I, R>(rng: &mut R, probabilities: I) -> Discrete
where
    I: IntoIterator<Item = f64>,
    R: Rng + ?Sized,
{
    let u: f64 = rng.gen();
    let mut acc = 0.;
    let mut last = 0;
    for (i, p) in probabilities.into_iter().enumerate() {
        if p <= 0. {
            continue;
        }
        acc += p;
        last = i;
        if u < acc {
            return i;
        }
    }

    last
}

/// Simulator over shared tabular dynamics. The emitted reward is delegated to `R`,
/// so the same dynamics can be re-run under a learned reward.
#[derive(Debug, Clone)]
pub struct TabularEnv<R = RewardTable> {
    name: String,
    spec: Arc<MdpSpec>,
    reward: R,
    rng: StdRng,
    state: Discrete,
    elapsed: usize,
    finished: bool,
}

impl<R: RewardSource> TabularEnv<R> {
    pub fn new(name: &str, spec: Arc<MdpSpec>, reward: R) -> Self {
        Self {
            name: name.to_string(),
            spec,
            reward,
            rng: StdRng::seed_from_u64(0),
            state: 0,
            elapsed: 0,
            finished: true,
        }
    }

    /// Same dynamics, different reward source.
    pub fn with_reward<S: RewardSource>(&self, reward: S) -> TabularEnv<S> {
        TabularEnv {
            name: self.name.clone(),
            spec: Arc::clone(&self.spec),
            reward,
            rng: self.rng.clone(),
            state: self.state,
            elapsed: self.elapsed,
            finished: self.finished,
        }
    }

    pub fn spec(&self) -> Arc<MdpSpec> {
        Arc::clone(&self.spec)
    }

    pub fn reward_source(&self) -> &R {
        &self.reward
    }

    pub fn state(&self) -> Discrete {
        self.state
    }
}

impl<R: RewardSource> Environment for TabularEnv<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self) -> Discrete {
        self.state = pick_next(&mut self.rng, self.spec.initial_states().iter().copied());
        self.elapsed = 0;
        self.finished = false;
        self.state
    }

    fn step(&mut self, action: Discrete) -> Result<StepInfo> {
        if self.finished {
            return Err(Error::EpisodeFinished);
        }
        let n_a = self.spec.n_a();
        if action >= n_a {
            return Err(Error::InvalidAction { action, n_a });
        }

        let s = self.state;
        let reward = self.reward.reward(s, action);
        let next = pick_next(
            &mut self.rng,
            self.spec.transition_rows().row(s * n_a + action).iter().copied(),
        );

        self.state = next;
        self.elapsed += 1;
        let terminated = self.spec.terminal()[next];
        let truncated = !terminated && self.spec.horizon().is_some_and(|h| self.elapsed >= h);
        self.finished = terminated || truncated;

        Ok(StepInfo {
            observation: next,
            reward,
            truncated,
            terminated,
            info: json!({ "elapsed": self.elapsed }),
        })
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

impl<R> Mdp for TabularEnv<R> {
    fn n_s(&self) -> usize {
        self.spec.n_s()
    }

    fn n_a(&self) -> usize {
        self.spec.n_a()
    }

    fn transition(&self) -> &Array3<f64> {
        self.spec.transition()
    }

    fn transition_rows(&self) -> ArrayView2<'_, f64> {
        self.spec.transition_rows()
    }

    fn initial_states(&self) -> &Array1<f64> {
        self.spec.initial_states()
    }

    fn terminal(&self) -> &[bool] {
        self.spec.terminal()
    }

    fn gamma(&self) -> f64 {
        self.spec.gamma()
    }

    fn horizon(&self) -> Option<usize> {
        self.spec.horizon()
    }
}
