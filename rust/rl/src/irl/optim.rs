use crate::{Error, Result};
use ndarray::{Array1, Zip};
use serde::{Deserialize, Serialize};

/// First order update rules for gradient ascent on reward parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd {
        learning_rate: f64,
    },
    Momentum {
        learning_rate: f64,
        momentum: f64,
    },
    Adam {
        learning_rate: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_epsilon")]
        epsilon: f64,
    },
}

fn default_beta1() -> f64 {
    0.9
}

fn default_beta2() -> f64 {
    0.999
}

fn default_epsilon() -> f64 {
    1e-8
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::adam(0.1)
    }
}

impl OptimizerConfig {
    pub fn sgd(learning_rate: f64) -> Self {
        Self::Sgd { learning_rate }
    }

    pub fn adam(learning_rate: f64) -> Self {
        Self::Adam {
            learning_rate,
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match *self {
            Self::Sgd { learning_rate }
            | Self::Momentum { learning_rate, .. }
            | Self::Adam { learning_rate, .. } => learning_rate,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let lr = self.learning_rate();
        if !(lr.is_finite() && lr > 0.) {
            return Err(Error::Config(format!("learning rate must be positive, got {lr}")));
        }
        let in_unit = |x: f64| (0.0..1.0).contains(&x);
        match *self {
            Self::Momentum { momentum, .. } if !in_unit(momentum) => Err(Error::Config(format!(
                "momentum {momentum} not in [0, 1)"
            ))),
            Self::Adam {
                beta1,
                beta2,
                epsilon,
                ..
            } if !in_unit(beta1) || !in_unit(beta2) || epsilon <= 0. => Err(Error::Config(
                format!("invalid Adam parameters beta1={beta1} beta2={beta2} epsilon={epsilon}"),
            )),
            _ => Ok(()),
        }
    }

    /// Fresh optimizer state for `dim` parameters.
    pub fn build(&self, dim: usize) -> Optimizer {
        match *self {
            Self::Sgd { learning_rate } => Optimizer::Sgd { learning_rate },
            Self::Momentum {
                learning_rate,
                momentum,
            } => Optimizer::Momentum {
                learning_rate,
                momentum,
                velocity: Array1::zeros(dim),
            },
            Self::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => Optimizer::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
                m: Array1::zeros(dim),
                v: Array1::zeros(dim),
                t: 0,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum Optimizer {
    Sgd {
        learning_rate: f64,
    },
    Momentum {
        learning_rate: f64,
        momentum: f64,
        velocity: Array1<f64>,
    },
    Adam {
        learning_rate: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
        m: Array1<f64>,
        v: Array1<f64>,
        t: i32,
    },
}

impl Optimizer {
    /// Step size when the update is plain gradient ascent. Momentum and Adam
    /// rescale the gradient, so they have none.
    pub fn fixed_step(&self) -> Option<f64> {
        match *self {
            Self::Sgd { learning_rate } => Some(learning_rate),
            Self::Momentum { .. } | Self::Adam { .. } => None,
        }
    }

    /// Moves `params` uphill along `grad`.
    pub fn ascend(&mut self, params: &mut Array1<f64>, grad: &Array1<f64>) {
        match self {
            Self::Sgd { learning_rate } => params.scaled_add(*learning_rate, grad),
            Self::Momentum {
                learning_rate,
                momentum,
                velocity,
            } => {
                velocity.mapv_inplace(|x| x * *momentum);
                *velocity += grad;
                params.scaled_add(*learning_rate, velocity);
            }
            Self::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
                m,
                v,
                t,
            } => {
                *t += 1;
                let (b1, b2) = (*beta1, *beta2);
                Zip::from(&mut *m).and(&mut *v).and(grad).for_each(|m, v, &g| {
                    *m = b1 * *m + (1. - b1) * g;
                    *v = b2 * *v + (1. - b2) * g * g;
                });
                let c1 = 1. - b1.powi(*t);
                let c2 = 1. - b2.powi(*t);
                let (lr, eps) = (*learning_rate, *epsilon);
                Zip::from(params).and(&*m).and(&*v).for_each(|p, &m, &v| {
                    *p += lr * (m / c1) / ((v / c2).sqrt() + eps);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;
    use ndarray::array;
    use rstest::*;

    #[test]
    fn sgd_steps_along_gradient() {
        let mut opt = OptimizerConfig::sgd(0.5).build(2);
        let mut x = array![1., 1.];
        opt.ascend(&mut x, &array![2., -4.]);
        assert_eq!(x, array![2., -1.]);
    }

    #[test]
    fn momentum_accumulates() {
        let cfg = OptimizerConfig::Momentum {
            learning_rate: 1.,
            momentum: 0.5,
        };
        let mut opt = cfg.build(1);
        let mut x = array![0.];
        opt.ascend(&mut x, &array![1.]);
        opt.ascend(&mut x, &array![1.]);
        assert_eq!(x, array![2.5]);
    }

    #[test]
    fn adam_first_step_is_learning_rate() {
        let mut opt = OptimizerConfig::adam(0.1).build(2);
        let mut x = array![0., 0.];
        opt.ascend(&mut x, &array![3., -0.01]);
        assert_float_eq!(x.to_vec(), vec![0.1, -0.1], abs_all <= 1e-6);
    }

    #[test]
    fn only_plain_ascent_has_a_fixed_step() {
        assert_eq!(OptimizerConfig::sgd(0.3).build(1).fixed_step(), Some(0.3));
        assert_eq!(OptimizerConfig::adam(0.3).build(1).fixed_step(), None);
    }

    #[rstest]
    #[case(OptimizerConfig::sgd(0.1))]
    #[case(OptimizerConfig::adam(0.05))]
    #[case(OptimizerConfig::Momentum { learning_rate: 0.05, momentum: 0.9 })]
    fn maximises_a_concave_quadratic(#[case] cfg: OptimizerConfig) {
        let target = array![1., -2., 0.5];
        let mut opt = cfg.build(3);
        let mut x = Array1::zeros(3);
        for _ in 0..2000 {
            let grad = &target - &x;
            opt.ascend(&mut x, &grad);
        }
        assert_float_eq!(x.to_vec(), target.to_vec(), abs_all <= 1e-3);
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg: OptimizerConfig =
            serde_json::from_str(r#"{"kind": "adam", "learning_rate": 0.2}"#).unwrap();
        assert_eq!(cfg, OptimizerConfig::adam(0.2));
        assert!(OptimizerConfig::sgd(0.).validate().is_err());
        assert!(OptimizerConfig::Momentum {
            learning_rate: 0.1,
            momentum: 1.
        }
        .validate()
        .is_err());
    }
}
