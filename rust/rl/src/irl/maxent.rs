use super::*;
use crate::algos::model_based::mdp::soft_value_iteration;
use crate::math::l2_norm;
use crate::PlannerOptions;
use ndarray::Array2;
use pirl_gym::RewardTable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxEntConfig {
    /// Discount used for both visitation accounting and soft planning.
    pub discount: f64,
    pub temperature: f64,
    pub optimizer: OptimizerConfig,
    pub max_iterations: usize,
    pub gradient_tolerance: f64,
    /// Any reward entry beyond this magnitude counts as divergence.
    pub max_reward: f64,
    pub planner: PlannerOptions,
    pub strict: bool,
}

impl Default for MaxEntConfig {
    fn default() -> Self {
        Self {
            discount: 0.99,
            temperature: 1.,
            optimizer: OptimizerConfig::default(),
            max_iterations: 200,
            gradient_tolerance: 1e-4,
            max_reward: 1e6,
            planner: PlannerOptions::default(),
            strict: false,
        }
    }
}

impl MaxEntConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.discount) {
            return Err(Error::Config(format!(
                "discount {} not in [0, 1)",
                self.discount
            )));
        }
        if !(self.temperature.is_finite() && self.temperature > 0.) {
            return Err(Error::Config(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        if self.max_reward.is_nan() || self.max_reward <= 0. {
            return Err(Error::Config("max_reward must be positive".into()));
        }
        self.optimizer.validate()
    }
}

/// Soft planning under a state reward with the previous values as warm start.
pub(super) struct SoftModel<'a> {
    mdp: &'a dyn Mdp,
    config: &'a MaxEntConfig,
    warm_start: Option<Array1<f64>>,
}

impl<'a> SoftModel<'a> {
    pub(super) fn new(mdp: &'a dyn Mdp, config: &'a MaxEntConfig) -> Self {
        Self {
            mdp,
            config,
            warm_start: None,
        }
    }

    /// Discounted state visitation of the soft-optimal policy for `reward`.
    pub(super) fn expected_visitation(&mut self, reward: &Array1<f64>) -> Result<Array1<f64>> {
        let r = Array2::from_shape_fn((self.mdp.n_s(), self.mdp.n_a()), |(s, _)| reward[s]);
        let plan = soft_value_iteration(
            self.mdp,
            &r,
            self.config.discount,
            self.config.temperature,
            &self.config.planner,
            self.warm_start.as_ref(),
        )?;
        let visitation = exact_visitation(self.mdp, &plan.policy, self.config.discount)?;
        self.warm_start = Some(plan.values);
        Ok(visitation.states())
    }
}

/// Single environment maximum entropy IRL.
pub fn maxent_irl(
    mdp: &dyn Mdp,
    trajectories: &[Trajectory],
    config: &MaxEntConfig,
) -> Result<(RewardTable, IrlDiagnostics)> {
    let demo = empirical_visitation(trajectories, mdp.n_s(), mdp.n_a(), config.discount)?;
    maxent_irl_from_visitation(mdp, &demo.states(), config)
}

/// Fits a state reward whose soft-optimal policy reproduces the discounted
/// state visitation `demo`.
pub fn maxent_irl_from_visitation(
    mdp: &dyn Mdp,
    demo: &Array1<f64>,
    config: &MaxEntConfig,
) -> Result<(RewardTable, IrlDiagnostics)> {
    config.validate()?;
    let n_s = mdp.n_s();
    if demo.len() != n_s {
        return Err(Error::Dimension(format!(
            "visitation over {} states, MDP has {n_s}",
            demo.len()
        )));
    }

    let mut reward = Array1::<f64>::zeros(n_s);
    let mut optimizer = config.optimizer.build(n_s);
    let mut model = SoftModel::new(mdp, config);
    let mut diagnostics = IrlDiagnostics::start();

    while diagnostics.iterations < config.max_iterations {
        let grad = demo - &model.expected_visitation(&reward)?;
        diagnostics.gradient_norm = l2_norm(&grad);
        check_gradient(diagnostics.iterations, diagnostics.gradient_norm)?;
        if diagnostics.gradient_norm < config.gradient_tolerance {
            diagnostics.converged = true;
            break;
        }

        optimizer.ascend(&mut reward, &grad);
        diagnostics.iterations += 1;
        check_reward(diagnostics.iterations, &reward, config.max_reward)?;
        tracing::trace!(
            iteration = diagnostics.iterations,
            gradient_norm = diagnostics.gradient_norm
        );
    }

    let diagnostics = diagnostics.check(config.strict)?;
    tracing::debug!(
        iterations = diagnostics.iterations,
        converged = diagnostics.converged,
        "max-ent IRL finished"
    );
    Ok((RewardTable::State(reward), diagnostics))
}

/// Pools every environment's trajectories into one dataset and fits a single
/// reward in the first environment's dynamics. The result is repeated once
/// per input, in input order.
pub fn maxent_concat(
    demos: &[Demonstrations],
    config: &MaxEntConfig,
) -> Result<(Vec<RewardTable>, IrlDiagnostics)> {
    let mdps: Vec<&dyn Mdp> = demos.iter().map(|d| d.mdp).collect();
    check_states(&mdps)?;
    let pooled: Vec<Trajectory> = demos
        .iter()
        .flat_map(|d| d.trajectories.iter().cloned())
        .collect();

    let (reward, diagnostics) = maxent_irl(demos[0].mdp, &pooled, config)?;
    Ok((vec![reward; demos.len()], diagnostics))
}
