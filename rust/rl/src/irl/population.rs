use super::maxent::SoftModel;
use super::*;
use crate::math::l2_norm;
use pirl_gym::RewardTable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub maxent: MaxEntConfig,
    /// Strength of the L2 penalty on each individual component. May be
    /// infinite, which pins every environment to the common reward.
    pub individual_reg: f64,
    pub common_scale: f64,
    pub demean: bool,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            maxent: MaxEntConfig::default(),
            individual_reg: 0.,
            common_scale: 1.,
            demean: false,
        }
    }
}

impl PopulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.individual_reg.is_nan() || self.individual_reg < 0. {
            return Err(Error::Config(format!(
                "individual_reg must be non-negative, got {}",
                self.individual_reg
            )));
        }
        if !self.common_scale.is_finite() {
            return Err(Error::Config("common_scale must be finite".into()));
        }
        self.maxent.validate()
    }
}

/// Reward of environment `e` is `common_scale * common + individual[e]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationReward {
    pub common_scale: f64,
    pub common: Array1<f64>,
    pub individual: Vec<Array1<f64>>,
}

impl PopulationReward {
    fn zeros(n_s: usize, n_env: usize, common_scale: f64) -> Self {
        Self {
            common_scale,
            common: Array1::zeros(n_s),
            individual: vec![Array1::zeros(n_s); n_env],
        }
    }

    pub fn reward(&self, e: usize) -> Array1<f64> {
        self.common_scale * &self.common + &self.individual[e]
    }

    pub fn rewards(&self) -> Vec<RewardTable> {
        (0..self.individual.len())
            .map(|e| RewardTable::State(self.reward(e)))
            .collect()
    }

    /// Moves the mean individual component into the common one, leaving
    /// every environment's reward as it was. Skipped when the common
    /// component has no weight.
    pub fn demean(&mut self) {
        if self.individual.is_empty() {
            return;
        }
        if self.common_scale == 0. {
            tracing::warn!("common_scale is zero, cannot demean individual rewards");
            return;
        }

        let mut mean = Array1::<f64>::zeros(self.common.len());
        for ind in &self.individual {
            mean += ind;
        }
        mean /= self.individual.len() as f64;

        for ind in &mut self.individual {
            *ind -= &mean;
        }
        self.common.scaled_add(1. / self.common_scale, &mean);
    }
}

/// Joint maximum entropy IRL over several environments sharing a state space.
pub fn maxent_population_irl(
    demos: &[Demonstrations],
    config: &PopulationConfig,
) -> Result<(PopulationReward, IrlDiagnostics)> {
    let discount = config.maxent.discount;
    let visitations = demos
        .iter()
        .map(|d| {
            empirical_visitation(d.trajectories, d.mdp.n_s(), d.mdp.n_a(), discount)
                .map(|v| v.states())
        })
        .collect::<Result<Vec<_>>>()?;
    let mdps: Vec<&dyn Mdp> = demos.iter().map(|d| d.mdp).collect();

    maxent_population_irl_from_visitation(&mdps, &visitations, config)
}

/// Gradient ascent on `sum_e loglik_e - individual_reg * sum_e |individual_e|^2`.
///
/// Under plain gradient ascent the penalty is an exact proximal step after
/// each update, stable for any strength. Rules that rescale the gradient get
/// the penalised gradient instead, so their fixed point is still
/// `g_e = 2 * individual_reg * individual_e`. An infinite strength pins every
/// individual component to zero.
pub fn maxent_population_irl_from_visitation(
    mdps: &[&dyn Mdp],
    demos: &[Array1<f64>],
    config: &PopulationConfig,
) -> Result<(PopulationReward, IrlDiagnostics)> {
    config.validate()?;
    let n_s = check_states(mdps)?;
    if demos.len() != mdps.len() || demos.iter().any(|d| d.len() != n_s) {
        return Err(Error::Dimension(format!(
            "{} visitation vectors for {} environments of {n_s} states",
            demos.len(),
            mdps.len()
        )));
    }

    let maxent = &config.maxent;
    let (reg, c) = (config.individual_reg, config.common_scale);
    let mut params = PopulationReward::zeros(n_s, mdps.len(), c);
    let mut common_opt = maxent.optimizer.build(n_s);
    let mut individual_opt: Vec<_> = mdps.iter().map(|_| maxent.optimizer.build(n_s)).collect();
    let mut models: Vec<_> = mdps.iter().map(|&m| SoftModel::new(m, maxent)).collect();
    let mut diagnostics = IrlDiagnostics::start();

    while diagnostics.iterations < maxent.max_iterations {
        let grads = models
            .iter_mut()
            .zip(demos)
            .enumerate()
            .map(|(e, (model, demo))| Ok(demo - &model.expected_visitation(&params.reward(e))?))
            .collect::<Result<Vec<_>>>()?;

        let mut common_grad = Array1::<f64>::zeros(n_s);
        for g in &grads {
            common_grad.scaled_add(c, g);
        }
        let mut norm_sq = common_grad.dot(&common_grad);
        if reg.is_finite() {
            for (g, ind) in grads.iter().zip(&params.individual) {
                norm_sq += l2_norm(&(g - 2. * reg * ind)).powi(2);
            }
        }
        diagnostics.gradient_norm = norm_sq.sqrt();
        check_gradient(diagnostics.iterations, diagnostics.gradient_norm)?;
        if diagnostics.gradient_norm < maxent.gradient_tolerance {
            diagnostics.converged = true;
            break;
        }

        common_opt.ascend(&mut params.common, &common_grad);
        for ((ind, opt), g) in params.individual.iter_mut().zip(&mut individual_opt).zip(&grads) {
            if reg.is_infinite() {
                ind.fill(0.);
                continue;
            }
            match opt.fixed_step() {
                Some(lr) => {
                    opt.ascend(ind, g);
                    ind.mapv_inplace(|x| x / (1. + 2. * lr * reg));
                }
                None => {
                    let penalised = g - &(2. * reg * &*ind);
                    opt.ascend(ind, &penalised);
                }
            }
        }

        diagnostics.iterations += 1;
        for e in 0..mdps.len() {
            check_reward(diagnostics.iterations, &params.reward(e), maxent.max_reward)?;
        }
    }

    let diagnostics = diagnostics.check(maxent.strict)?;
    if config.demean {
        params.demean();
    }
    tracing::debug!(
        environments = mdps.len(),
        iterations = diagnostics.iterations,
        converged = diagnostics.converged,
        "population max-ent IRL finished"
    );
    Ok((params, diagnostics))
}
