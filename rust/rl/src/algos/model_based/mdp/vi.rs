use super::*;
use crate::math::{logsumexp, sup_norm};

fn check_reward(mdp: &dyn Mdp, reward: &Array2<f64>) -> Result<()> {
    if reward.dim() != (mdp.n_s(), mdp.n_a()) {
        return Err(Error::Dimension(format!(
            "reward is {:?}, MDP has {} states and {} actions",
            reward.dim(),
            mdp.n_s(),
            mdp.n_a()
        )));
    }
    Ok(())
}

/// `Q(s, a) = r(s, a) + gamma * sum_s' P(s' | s, a) V(s')`.
fn backup(mdp: &dyn Mdp, reward: &Array2<f64>, v: &Array1<f64>, gamma: f64) -> Array2<f64> {
    let n_a = mdp.n_a();
    let next = mdp.transition_rows().dot(v);
    Array2::from_shape_fn(reward.dim(), |(s, a)| reward[[s, a]] + gamma * next[s * n_a + a])
}

/// Iterates `update` until successive estimates are within `options.tolerance`.
fn fixed_point<F>(
    mdp: &dyn Mdp,
    reward: &Array2<f64>,
    gamma: f64,
    options: &PlannerOptions,
    init: Array1<f64>,
    update: F,
) -> Result<(Array1<f64>, PlanDiagnostics)>
where
    F: Fn(&Array2<f64>, Discrete) -> f64,
{
    let terminal = mdp.terminal();
    let mut v = init;
    let mut diagnostics = PlanDiagnostics {
        iterations: 0,
        residual: f64::INFINITY,
        converged: false,
    };

    while diagnostics.iterations < options.max_iterations {
        let q = backup(mdp, reward, &v, gamma);
        let next = Array1::from_shape_fn(mdp.n_s(), |s| if terminal[s] { 0. } else { update(&q, s) });
        diagnostics.iterations += 1;
        diagnostics.residual = sup_norm(&next, &v);
        if !diagnostics.residual.is_finite() {
            return Err(Error::Divergence {
                iteration: diagnostics.iterations,
                reason: "non-finite value estimate".into(),
            });
        }
        v = next;
        if diagnostics.residual < options.tolerance {
            diagnostics.converged = true;
            break;
        }
    }

    Ok((v, diagnostics.check(options)?))
}

/// Hard value iteration.
pub fn value_iteration(
    mdp: &dyn Mdp,
    reward: &Array2<f64>,
    gamma: f64,
    options: &PlannerOptions,
) -> Result<Plan> {
    check_reward(mdp, reward)?;
    let init = Array1::zeros(mdp.n_s());
    let (values, diagnostics) = fixed_point(mdp, reward, gamma, options, init, |q, s| {
        q.row(s).fold(f64::NEG_INFINITY, |m, &x| m.max(x))
    })?;

    let q = backup(mdp, reward, &values, gamma);
    let actions = q.rows().into_iter().map(|row| argmax(row.iter())).collect();

    Ok(Plan {
        policy: Policy::Deterministic(actions),
        values,
        q,
        diagnostics,
    })
}

/// Entropy regularised value iteration:
/// `V(s) = t * log sum_a exp(Q(s, a) / t)`, `pi(a | s) = exp((Q(s, a) - V(s)) / t)`.
///
/// `warm_start` seeds the iteration, which matters inside IRL loops where the
/// reward changes little between calls.
pub fn soft_value_iteration(
    mdp: &dyn Mdp,
    reward: &Array2<f64>,
    gamma: f64,
    temperature: f64,
    options: &PlannerOptions,
    warm_start: Option<&Array1<f64>>,
) -> Result<Plan> {
    check_reward(mdp, reward)?;
    if !(temperature.is_finite() && temperature > 0.) {
        return Err(Error::Config(format!(
            "temperature must be positive, got {temperature}"
        )));
    }

    let init = match warm_start {
        Some(v) if v.len() == mdp.n_s() => v.clone(),
        _ => Array1::zeros(mdp.n_s()),
    };
    let (values, diagnostics) = fixed_point(mdp, reward, gamma, options, init, |q, s| {
        temperature * logsumexp(q.row(s).mapv(|x| x / temperature).view())
    })?;

    let q = backup(mdp, reward, &values, gamma);
    let n_a = mdp.n_a();
    let terminal = mdp.terminal();
    let policy = Array2::from_shape_fn(q.dim(), |(s, a)| {
        if terminal[s] {
            1. / n_a as f64
        } else {
            ((q[[s, a]] - values[s]) / temperature).exp()
        }
    });

    Ok(Plan {
        policy: Policy::Stochastic(normalize_rows(policy)),
        values,
        q,
        diagnostics,
    })
}

/// Removes the rounding left over from the last backup.
fn normalize_rows(mut p: Array2<f64>) -> Array2<f64> {
    for mut row in p.rows_mut() {
        let total = row.sum();
        row.mapv_inplace(|x| x / total);
    }
    p
}
