use pirl::experiments::{ExperimentConfig, IrlAlgorithm, Registry};

pub const SIMPLE: &str = "pirl/GridWorld-Simple-v0";
pub const SIMPLE_DETERMINISTIC: &str = "pirl/GridWorld-Simple-Deterministic-v0";

/// Built-in registry with short IRL budgets and a two environment experiment
/// named `smoke`.
#[allow(dead_code)]
pub fn quick_registry(irl: &[&str]) -> Registry {
    let mut registry = Registry::builtin();
    for algo in registry.irl.values_mut() {
        match algo {
            IrlAlgorithm::MaxEntSingle(cfg) | IrlAlgorithm::MaxEntConcat(cfg) => {
                cfg.max_iterations = 20
            }
            IrlAlgorithm::MaxEntPopulation(cfg) => cfg.maxent.max_iterations = 20,
        }
    }
    registry.experiments.insert(
        "smoke".into(),
        ExperimentConfig {
            environments: vec![SIMPLE.into(), SIMPLE_DETERMINISTIC.into()],
            rl: "value_iteration".into(),
            irl: irl.iter().map(|s| s.to_string()).collect(),
            num_trajectories: vec![20, 5],
        },
    );
    registry
}
