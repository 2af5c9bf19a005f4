extern crate rand;
extern crate serde;
extern crate serde_json;

pub mod error;
pub mod gridworld;
pub mod mdps;
pub mod registry;
pub mod reward;
pub mod tabular;

pub use error::{Error, Result};
pub use gridworld::GridWorld;
pub use mdps::{Mdp, MdpSpec};
pub use registry::{make, registered_names};
pub use reward::{RewardSource, RewardTable};
pub use tabular::TabularEnv;

use serde_json::Value;
use std::collections::HashMap;

pub type Discrete = usize;
pub type Continous = f64;

/// One possible outcome of taking an action in a state.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next_state: Discrete,
    pub probability: Continous,
    pub reward: f64,
    pub done: bool,
}

/// Sparse outcome lists keyed by `(state, action)`.
pub type Transitions = HashMap<(Discrete, Discrete), Vec<Transition>>;

#[derive(Debug, Clone)]
pub struct StepInfo {
    pub observation: Discrete,
    pub reward: f64,
    pub truncated: bool,
    pub terminated: bool,
    pub info: Value,
}

impl StepInfo {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Gym style environment contract over discrete observation and action spaces.
///
/// Refer: https://gymnasium.farama.org/api/env/
pub trait Environment {
    fn name(&self) -> &str;

    /// Resets the environment to an initial state drawn from its start distribution.
    fn reset(&mut self) -> Discrete;

    /// Run one timestep of the environment's dynamics using `action`.
    fn step(&mut self, action: Discrete) -> Result<StepInfo>;

    fn seed(&mut self, seed: u64);
}
