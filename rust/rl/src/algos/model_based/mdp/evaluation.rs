use super::*;
use crate::math::solve;
use itertools::iproduct;

/// Value of a fixed `policy` under `reward`, which need not be the reward it
/// was planned for. Solves `(I - gamma P_pi) V = r_pi` exactly; terminal
/// states are pinned to zero.
pub fn policy_values(
    mdp: &dyn Mdp,
    reward: &dyn RewardSource,
    policy: &Policy,
) -> Result<ValueFunction> {
    let (n_s, n_a) = (mdp.n_s(), mdp.n_a());
    policy.check(n_s, n_a)?;

    let gamma = mdp.gamma();
    let p = mdp.transition();
    let terminal = mdp.terminal();
    let mut a = Array2::<f64>::eye(n_s);
    let mut b = Array1::<f64>::zeros(n_s);
    for (s, act) in iproduct!(0..n_s, 0..n_a).filter(|&(s, _)| !terminal[s]) {
        let pi = policy.probability(s, act);
        if pi == 0. {
            continue;
        }
        b[s] += pi * reward.reward(s, act);
        for k in 0..n_s {
            a[[s, k]] -= gamma * pi * p[[s, act, k]];
        }
    }

    solve(a, b)
}

/// Expected discounted return of `policy` from the initial state distribution.
pub fn evaluate(mdp: &dyn Mdp, reward: &dyn RewardSource, policy: &Policy) -> Result<f64> {
    Ok(mdp.initial_states().dot(&policy_values(mdp, reward, policy)?))
}
