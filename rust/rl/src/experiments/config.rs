use crate::irl::{MaxEntConfig, PopulationConfig};
use crate::{evaluate, plan, Error, PlanMode, PlannerOptions, Policy, Result};
use indexmap::IndexMap;
use pirl_gym::{Mdp, RewardSource};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A named experiment: which environments, how the expert is planned, which
/// IRL algorithms to compare and how many demonstrations to give them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub environments: Vec<String>,
    pub rl: String,
    pub irl: Vec<String>,
    pub num_trajectories: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RlAlgorithm {
    ValueIteration(PlannerOptions),
    SoftValueIteration {
        #[serde(default)]
        planner: PlannerOptions,
        temperature: f64,
    },
}

impl RlAlgorithm {
    pub fn validate(&self) -> Result<()> {
        let (planner, temperature) = match *self {
            Self::ValueIteration(planner) => (planner, None),
            Self::SoftValueIteration {
                planner,
                temperature,
            } => (planner, Some(temperature)),
        };
        if !(planner.tolerance.is_finite() && planner.tolerance > 0.) {
            return Err(Error::Config(format!(
                "planner tolerance must be positive, got {}",
                planner.tolerance
            )));
        }
        match temperature {
            Some(t) if !(t.is_finite() && t > 0.) => Err(Error::Config(format!(
                "temperature must be positive, got {t}"
            ))),
            _ => Ok(()),
        }
    }

    /// Optimal policy under `reward` in the dynamics of `mdp`.
    pub fn plan(&self, mdp: &dyn Mdp, reward: &dyn RewardSource) -> Result<Policy> {
        let (mode, options) = match *self {
            Self::ValueIteration(options) => (PlanMode::Hard, options),
            Self::SoftValueIteration {
                planner,
                temperature,
            } => (PlanMode::Soft { temperature }, planner),
        };
        Ok(plan(mdp, reward, mode, &options)?.policy)
    }

    /// Expected discounted return of `policy` under `reward`.
    pub fn value(&self, mdp: &dyn Mdp, reward: &dyn RewardSource, policy: &Policy) -> Result<f64> {
        evaluate(mdp, reward, policy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IrlAlgorithm {
    /// One independent fit per environment.
    MaxEntSingle(MaxEntConfig),
    /// One fit on all environments' trajectories pooled together.
    MaxEntConcat(MaxEntConfig),
    MaxEntPopulation(PopulationConfig),
}

impl IrlAlgorithm {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::MaxEntSingle(cfg) | Self::MaxEntConcat(cfg) => cfg.validate(),
            Self::MaxEntPopulation(cfg) => cfg.validate(),
        }
    }
}

/// An experiment with every identifier resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    pub name: String,
    pub environments: Vec<String>,
    pub rl: RlAlgorithm,
    pub irl: Vec<(String, IrlAlgorithm)>,
    pub num_trajectories: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Registry {
    pub experiments: IndexMap<String, ExperimentConfig>,
    pub rl: IndexMap<String, RlAlgorithm>,
    pub irl: IndexMap<String, IrlAlgorithm>,
}

fn experiment(environments: &[&str], irl: &[&str], num_trajectories: &[usize]) -> ExperimentConfig {
    ExperimentConfig {
        environments: environments.iter().map(|s| s.to_string()).collect(),
        rl: "value_iteration".into(),
        irl: irl.iter().map(|s| s.to_string()).collect(),
        num_trajectories: num_trajectories.to_vec(),
    }
}

const JUNGLE_SWEEP: [usize; 6] = [200, 100, 50, 30, 20, 10];

impl Registry {
    pub fn builtin() -> Self {
        let mut experiments = IndexMap::new();
        // Smoke tests for the pipeline rather than real experiments.
        experiments.insert(
            "dummy-test".into(),
            experiment(
                &["pirl/GridWorld-Simple-v0"],
                &["max_ent_single", "max_ent_population"],
                &[100, 10],
            ),
        );
        experiments.insert(
            "dummy-test-deterministic".into(),
            experiment(
                &["pirl/GridWorld-Simple-Deterministic-v0"],
                &["max_ent_single", "max_ent_population"],
                &[100, 10],
            ),
        );
        experiments.insert(
            "jungle".into(),
            experiment(
                &[
                    "pirl/GridWorld-Jungle-9x9-Soda-v0",
                    "pirl/GridWorld-Jungle-9x9-Water-v0",
                    "pirl/GridWorld-Jungle-9x9-Liquid-v0",
                ],
                &[
                    "max_ent_single",
                    "max_ent_population_reg0",
                    "max_ent_population_reg0.001",
                    "max_ent_population_reg0.01",
                    "max_ent_population_reg0.1",
                ],
                &JUNGLE_SWEEP,
            ),
        );
        experiments.insert(
            "jungle-fussy".into(),
            experiment(
                &[
                    "pirl/GridWorld-Jungle-Soda-v0",
                    "pirl/GridWorld-Jungle-Water-v0",
                ],
                &["max_ent_single", "max_ent_population"],
                &JUNGLE_SWEEP,
            ),
        );

        let mut rl = IndexMap::new();
        rl.insert(
            "value_iteration".into(),
            RlAlgorithm::ValueIteration(PlannerOptions::default()),
        );
        rl.insert(
            "max_causal_ent".into(),
            RlAlgorithm::SoftValueIteration {
                planner: PlannerOptions::default(),
                temperature: 1.,
            },
        );

        let maxent = MaxEntConfig::default();
        let population = |individual_reg: f64| PopulationConfig {
            maxent: maxent.clone(),
            individual_reg,
            ..Default::default()
        };
        let mut irl = IndexMap::new();
        irl.insert("max_ent_single".into(), IrlAlgorithm::MaxEntSingle(maxent.clone()));
        irl.insert("max_ent_concat".into(), IrlAlgorithm::MaxEntConcat(maxent.clone()));
        irl.insert(
            "max_ent_population".into(),
            IrlAlgorithm::MaxEntPopulation(population(0.)),
        );
        for reg in [0., 1e-3, 1e-2, 1e-1] {
            irl.insert(
                format!("max_ent_population_reg{reg}"),
                IrlAlgorithm::MaxEntPopulation(population(reg)),
            );
        }
        irl.insert(
            "max_ent_population_demean".into(),
            IrlAlgorithm::MaxEntPopulation(PopulationConfig {
                demean: true,
                ..population(1e-2)
            }),
        );

        Self {
            experiments,
            rl,
            irl,
        }
    }

    /// Built-in registry with the entries of a JSON file layered on top.
    /// Entries with an existing name replace the built-in one.
    pub fn load(path: &Path) -> Result<Self> {
        let overrides: Registry = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let mut registry = Self::builtin();
        registry.experiments.extend(overrides.experiments);
        registry.rl.extend(overrides.rl);
        registry.irl.extend(overrides.irl);
        tracing::debug!(path = %path.display(), "loaded registry overrides");
        Ok(registry)
    }

    /// Checks every experiment refers to known environments and algorithms,
    /// and that every algorithm configuration is usable.
    pub fn validate(&self) -> Result<()> {
        for cfg in self.rl.values() {
            cfg.validate()?;
        }
        for cfg in self.irl.values() {
            cfg.validate()?;
        }
        let environments = pirl_gym::registered_names();
        for (name, exp) in &self.experiments {
            if let Some(env) = exp.environments.iter().find(|e| !environments.contains(e)) {
                return Err(Error::Config(format!(
                    "experiment '{name}' uses unknown environment '{env}'"
                )));
            }
            if exp.environments.is_empty() {
                return Err(Error::Config(format!("experiment '{name}' has no environments")));
            }
            if !self.rl.contains_key(&exp.rl) {
                return Err(Error::UnknownRlAlgorithm(exp.rl.clone()));
            }
            if let Some(irl) = exp.irl.iter().find(|i| !self.irl.contains_key(*i)) {
                return Err(Error::UnknownIrlAlgorithm(irl.clone()));
            }
            if exp.num_trajectories.is_empty() || exp.num_trajectories.contains(&0) {
                return Err(Error::Config(format!(
                    "experiment '{name}' needs positive trajectory counts"
                )));
            }
        }
        Ok(())
    }

    pub fn experiment(&self, name: &str) -> Result<Experiment> {
        let cfg = self
            .experiments
            .get(name)
            .ok_or_else(|| Error::UnknownExperiment(name.to_string()))?;
        let rl = *self
            .rl
            .get(&cfg.rl)
            .ok_or_else(|| Error::UnknownRlAlgorithm(cfg.rl.clone()))?;
        let irl = cfg
            .irl
            .iter()
            .map(|id| {
                self.irl
                    .get(id)
                    .map(|algo| (id.clone(), algo.clone()))
                    .ok_or_else(|| Error::UnknownIrlAlgorithm(id.clone()))
            })
            .collect::<Result<_>>()?;

        Ok(Experiment {
            name: name.to_string(),
            environments: cfg.environments.clone(),
            rl,
            irl,
            num_trajectories: cfg.num_trajectories.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irl::OptimizerConfig;
    use assertor::*;
    use rstest::*;
    use std::io::Write;

    #[test]
    fn builtin_registry_is_consistent() {
        let registry = Registry::builtin();
        registry.validate().unwrap();
        assert_that!(registry.irl.keys().cloned().collect::<Vec<_>>()).contains_exactly_in_order(vec![
            "max_ent_single".to_string(),
            "max_ent_concat".into(),
            "max_ent_population".into(),
            "max_ent_population_reg0".into(),
            "max_ent_population_reg0.001".into(),
            "max_ent_population_reg0.01".into(),
            "max_ent_population_reg0.1".into(),
            "max_ent_population_demean".into(),
        ]);
    }

    #[test]
    fn resolves_experiment_in_order() {
        let exp = Registry::builtin().experiment("jungle").unwrap();
        assert_eq!(exp.rl, RlAlgorithm::ValueIteration(PlannerOptions::default()));
        assert_eq!(exp.irl[1].0, "max_ent_population_reg0");
        assert_eq!(exp.num_trajectories, JUNGLE_SWEEP.to_vec());
        assert_that!(exp.environments).has_length(3);
    }

    #[test]
    fn unknown_names_fail_fast() {
        let registry = Registry::builtin();
        assert!(matches!(
            registry.experiment("nope"),
            Err(Error::UnknownExperiment(_))
        ));

        let mut broken = registry.clone();
        broken.experiments["dummy-test"].irl.push("max_ent_magic".into());
        assert!(matches!(broken.validate(), Err(Error::UnknownIrlAlgorithm(_))));

        let mut broken = registry.clone();
        broken.experiments["dummy-test"].rl = "q_learning".into();
        assert!(matches!(broken.validate(), Err(Error::UnknownRlAlgorithm(_))));

        let mut broken = registry;
        broken.experiments["dummy-test"].environments = vec!["CartPole-v1".into()];
        assert!(matches!(broken.validate(), Err(Error::Config(_))));
    }

    #[rstest]
    #[case(0.)]
    #[case(-1.)]
    #[case(f64::NAN)]
    fn soft_planner_needs_positive_temperature(#[case] temperature: f64) {
        let mut registry = Registry::builtin();
        registry.rl.insert(
            "frozen".into(),
            RlAlgorithm::SoftValueIteration {
                planner: PlannerOptions::default(),
                temperature,
            },
        );
        assert!(matches!(registry.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn planner_needs_positive_tolerance() {
        let algo = RlAlgorithm::ValueIteration(PlannerOptions {
            tolerance: 0.,
            ..Default::default()
        });
        assert!(matches!(algo.validate(), Err(Error::Config(_))));
        assert!(RlAlgorithm::ValueIteration(PlannerOptions::default()).validate().is_ok());
    }

    #[test]
    fn file_entries_extend_builtins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "experiments": {{
                    "tiny": {{
                        "environments": ["pirl/GridWorld-Simple-v0"],
                        "rl": "max_causal_ent",
                        "irl": ["fast_sgd"],
                        "num_trajectories": [5]
                    }}
                }},
                "irl": {{
                    "fast_sgd": {{
                        "kind": "max_ent_single",
                        "max_iterations": 10,
                        "optimizer": {{"kind": "sgd", "learning_rate": 0.5}}
                    }}
                }}
            }}"#
        )
        .unwrap();

        let registry = Registry::load(file.path()).unwrap();
        registry.validate().unwrap();
        let exp = registry.experiment("tiny").unwrap();

        assert!(registry.experiments.contains_key("jungle"));
        let IrlAlgorithm::MaxEntSingle(cfg) = &exp.irl[0].1 else {
            panic!("expected a single-environment algorithm");
        };
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.optimizer, OptimizerConfig::sgd(0.5));
        assert_eq!(cfg.discount, MaxEntConfig::default().discount);
    }
}
