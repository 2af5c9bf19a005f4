//! Empirical evaluation of maximum entropy inverse reinforcement learning on
//! tabular MDPs: plan an expert, sample demonstrations, infer a reward (per
//! environment or jointly across a population), re-plan under it and score
//! the result against the true reward.

pub mod algos;
pub mod error;
pub mod experiments;
pub mod irl;
pub mod math;
pub mod sampling;

pub use algos::model_based::mdp::{
    evaluate, plan, Plan, PlanDiagnostics, PlanMode, PlannerOptions, Policy,
};
pub use error::{Error, Result};
pub use sampling::{sample, synthetic_data, Trajectory};
