use super::*;
use itertools::iproduct;
use ndarray::{Array1, Array2, Array3, ArrayView2};

const PROBABILITY_TOLERANCE: f64 = 1e-8;

/// Markov Decision Process - Sutton & Barto 2018.
///
/// Terminal states are absorbing and never act: they carry no value and
/// episodes end on entering one.
pub trait Mdp {
    fn n_s(&self) -> usize;

    fn n_a(&self) -> usize;

    /// `P[s, a, s']`.
    fn transition(&self) -> &Array3<f64>;

    /// Same kernel viewed as a `(n_s * n_a, n_s)` matrix, row `s * n_a + a`.
    fn transition_rows(&self) -> ArrayView2<'_, f64>;

    /// Initial state distribution `d0`.
    fn initial_states(&self) -> &Array1<f64>;

    fn terminal(&self) -> &[bool];

    fn gamma(&self) -> f64;

    /// Maximum number of steps in an episode, if episodes are truncated.
    fn horizon(&self) -> Option<usize>;
}

/// Dense, validated finite MDP.
#[derive(Debug, Clone, PartialEq)]
pub struct MdpSpec {
    transition: Array3<f64>,
    rows: Array2<f64>,
    initial_states: Array1<f64>,
    terminal: Vec<bool>,
    gamma: f64,
    horizon: Option<usize>,
}

impl MdpSpec {
    pub fn new(
        transition: Array3<f64>,
        initial_states: Array1<f64>,
        terminal: Vec<bool>,
        gamma: f64,
        horizon: Option<usize>,
    ) -> Result<Self> {
        let (n_s, n_a, n_next) = transition.dim();
        if n_s == 0 || n_a == 0 {
            return Err(Error::InvalidSpec("empty state or action space".into()));
        }
        if n_next != n_s || initial_states.len() != n_s || terminal.len() != n_s {
            return Err(Error::InvalidSpec(format!(
                "shape mismatch: P is {n_s}x{n_a}x{n_next}, d0 has {}, terminal has {}",
                initial_states.len(),
                terminal.len()
            )));
        }
        if !(0.0..1.0).contains(&gamma) {
            return Err(Error::InvalidSpec(format!("discount {gamma} not in [0, 1)")));
        }
        if transition.iter().any(|p| !p.is_finite() || *p < 0.) {
            return Err(Error::InvalidSpec("negative or non-finite probability".into()));
        }
        for (s, a) in iproduct!(0..n_s, 0..n_a) {
            if terminal[s] {
                continue;
            }
            let total = transition.slice(ndarray::s![s, a, ..]).sum();
            if (total - 1.).abs() > PROBABILITY_TOLERANCE {
                return Err(Error::InvalidSpec(format!(
                    "P[{s}, {a}, .] sums to {total}"
                )));
            }
        }
        let d0_total = initial_states.sum();
        if initial_states.iter().any(|p| *p < 0.) || (d0_total - 1.).abs() > PROBABILITY_TOLERANCE {
            return Err(Error::InvalidSpec(format!(
                "initial distribution sums to {d0_total}"
            )));
        }

        if initial_states.iter().zip(&terminal).any(|(p, t)| *t && *p > 0.) {
            return Err(Error::InvalidSpec(
                "initial distribution places mass on a terminal state".into(),
            ));
        }
        if horizon == Some(0) {
            return Err(Error::InvalidSpec("horizon must be at least one step".into()));
        }

        let rows = Array2::from_shape_fn((n_s * n_a, n_s), |(i, k)| {
            transition[[i / n_a, i % n_a, k]]
        });

        Ok(Self {
            transition,
            rows,
            initial_states,
            terminal,
            gamma,
            horizon,
        })
    }

    /// Builds the dense kernel and expected reward table from sparse outcome lists.
    ///
    /// A state reached through a `done` transition is terminal. `(s, a)` pairs
    /// with no listed outcome stay in place with zero reward.
    pub fn from_transitions(
        n_s: usize,
        n_a: usize,
        gamma: f64,
        transitions: &Transitions,
        initial_states: Array1<f64>,
        horizon: Option<usize>,
    ) -> Result<(Self, RewardTable)> {
        let mut terminal = vec![false; n_s];
        for t in transitions.values().flatten() {
            if t.next_state >= n_s {
                return Err(Error::InvalidSpec(format!(
                    "next state {} out of range",
                    t.next_state
                )));
            }
            if t.done {
                terminal[t.next_state] = true;
            }
        }

        let mut p = Array3::<f64>::zeros((n_s, n_a, n_s));
        let mut r = Array2::<f64>::zeros((n_s, n_a));
        for (s, a) in iproduct!(0..n_s, 0..n_a) {
            match transitions.get(&(s, a)) {
                Some(ts) if !terminal[s] => {
                    for t in ts {
                        p[[s, a, t.next_state]] += t.probability;
                        r[[s, a]] += t.probability * t.reward;
                    }
                }
                _ => p[[s, a, s]] = 1.,
            }
        }

        let spec = Self::new(p, initial_states, terminal, gamma, horizon)?;
        Ok((spec, RewardTable::StateAction(r)))
    }

    pub fn with_gamma(&self, gamma: f64) -> Result<Self> {
        Self::new(
            self.transition.clone(),
            self.initial_states.clone(),
            self.terminal.clone(),
            gamma,
            self.horizon,
        )
    }
}

impl Mdp for MdpSpec {
    fn n_s(&self) -> usize {
        self.transition.dim().0
    }

    fn n_a(&self) -> usize {
        self.transition.dim().1
    }

    fn transition(&self) -> &Array3<f64> {
        &self.transition
    }

    fn transition_rows(&self) -> ArrayView2<'_, f64> {
        self.rows.view()
    }

    fn initial_states(&self) -> &Array1<f64> {
        &self.initial_states
    }

    fn terminal(&self) -> &[bool] {
        &self.terminal
    }

    fn gamma(&self) -> f64 {
        self.gamma
    }

    fn horizon(&self) -> Option<usize> {
        self.horizon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;
    use ndarray::array;

    /// https://towardsdatascience.com/reinforcement-learning-an-easy-introduction-to-value-iteration-e4cfe0731fd5
    fn simple_golf() -> Transitions {
        Transitions::from([
            (
                (0, 0),
                vec![
                    Transition {
                        next_state: 1,
                        probability: 0.9,
                        reward: 0.,
                        done: false,
                    },
                    Transition {
                        next_state: 0,
                        probability: 0.1,
                        reward: 0.,
                        done: false,
                    },
                ],
            ),
            (
                (1, 1),
                vec![
                    Transition {
                        next_state: 0,
                        probability: 0.9,
                        reward: 0.,
                        done: false,
                    },
                    Transition {
                        next_state: 1,
                        probability: 0.1,
                        reward: 0.,
                        done: false,
                    },
                ],
            ),
            (
                (1, 2),
                vec![
                    Transition {
                        next_state: 2,
                        probability: 0.9,
                        reward: 10.,
                        done: true,
                    },
                    Transition {
                        next_state: 1,
                        probability: 0.1,
                        reward: 0.,
                        done: false,
                    },
                ],
            ),
        ])
    }

    #[test]
    fn from_transitions_simple_golf() {
        let (spec, reward) =
            MdpSpec::from_transitions(3, 3, 0.9, &simple_golf(), array![1., 0., 0.], None)
                .unwrap();

        assert_eq!(spec.n_s(), 3);
        assert_eq!(spec.n_a(), 3);
        assert_eq!(spec.terminal(), &[false, false, true]);
        assert_float_eq!(spec.transition()[[1, 2, 2]], 0.9, abs <= 1e-12);
        // Unlisted pairs stay put.
        assert_float_eq!(spec.transition()[[0, 1, 0]], 1., abs <= 1e-12);
        assert_float_eq!(reward.get(1, 2), 9., abs <= 1e-12);
        assert_float_eq!(
            spec.transition_rows().row(4).to_vec(),
            vec![0.9, 0.1, 0.],
            abs_all <= 1e-12
        );
    }

    #[test]
    fn new_rejects_bad_rows() {
        let p = Array3::from_shape_fn((2, 1, 2), |(s, _, k)| if s == k { 0.5 } else { 0. });
        let res = MdpSpec::new(p, array![1., 0.], vec![false, false], 0.9, None);
        assert!(matches!(res, Err(Error::InvalidSpec(_))));
    }

    #[test]
    fn new_rejects_discount_of_one() {
        let p = Array3::from_elem((1, 1, 1), 1.);
        let res = MdpSpec::new(p, array![1.], vec![false], 1.0, None);
        assert!(matches!(res, Err(Error::InvalidSpec(_))));
    }
}
