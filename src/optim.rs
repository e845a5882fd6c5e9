//! Weight update rules.
//!
//! An [`Optimizer`] is the configuration; [`OptimizerState`] owns the
//! per-weight buffers it needs and lives inside the propagation engine for
//! the whole training run.
//!
//! All rules consume gradients in the sign convention of the gradient
//! workers (positive gradient: increasing the weight lowers the error).

use crate::resilient::{
    DEFAULT_INITIAL_UPDATE, DEFAULT_MAX_STEP, DEFAULT_ZERO_TOLERANCE, ResilientState,
};
use crate::train::{LearningRate, Momentum};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
/// Update rule used by [`crate::Propagation`].
pub enum Optimizer {
    /// Resilient propagation (RPROP+).
    Resilient {
        initial_update: f64,
        max_step: f64,
        zero_tolerance: f64,
    },
    /// Classic backpropagation: `dw = learning_rate * g + momentum * dw_prev`.
    Backprop { learning_rate: f64, momentum: f64 },
    /// Manhattan update: `dw = learning_rate * sign(g)`.
    Manhattan {
        learning_rate: f64,
        zero_tolerance: f64,
    },
}

impl Default for Optimizer {
    fn default() -> Self {
        Optimizer::Resilient {
            initial_update: DEFAULT_INITIAL_UPDATE,
            max_step: DEFAULT_MAX_STEP,
            zero_tolerance: DEFAULT_ZERO_TOLERANCE,
        }
    }
}

impl Optimizer {
    pub fn name(self) -> &'static str {
        match self {
            Optimizer::Resilient { .. } => "rprop",
            Optimizer::Backprop { .. } => "backprop",
            Optimizer::Manhattan { .. } => "manhattan",
        }
    }

    /// Validate hyperparameters.
    pub fn validate(self) -> Result<()> {
        match self {
            Optimizer::Resilient {
                initial_update,
                max_step,
                zero_tolerance,
            } => {
                if !(initial_update.is_finite() && initial_update > 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "initial update must be finite and > 0, got {initial_update}"
                    )));
                }
                if !(max_step.is_finite() && max_step >= initial_update) {
                    return Err(Error::InvalidConfig(format!(
                        "max step must be finite and >= initial update, got {max_step}"
                    )));
                }
                check_tolerance(zero_tolerance)
            }
            Optimizer::Backprop {
                learning_rate,
                momentum,
            } => {
                check_learning_rate(learning_rate)?;
                if !(momentum.is_finite() && (0.0..1.0).contains(&momentum)) {
                    return Err(Error::InvalidConfig(format!(
                        "momentum must be finite and in [0,1), got {momentum}"
                    )));
                }
                Ok(())
            }
            Optimizer::Manhattan {
                learning_rate,
                zero_tolerance,
            } => {
                check_learning_rate(learning_rate)?;
                check_tolerance(zero_tolerance)
            }
        }
    }

    /// Allocate state for `weight_count` weights.
    pub fn state(self, weight_count: usize) -> Result<OptimizerState> {
        self.validate()?;

        Ok(match self {
            Optimizer::Resilient {
                initial_update,
                max_step,
                zero_tolerance,
            } => OptimizerState::Resilient(ResilientState::new(
                weight_count,
                initial_update,
                max_step,
                zero_tolerance,
            )),
            Optimizer::Backprop {
                learning_rate,
                momentum,
            } => OptimizerState::Backprop(BackpropState {
                learning_rate,
                momentum,
                last_delta: vec![0.0; weight_count],
            }),
            Optimizer::Manhattan {
                learning_rate,
                zero_tolerance,
            } => OptimizerState::Manhattan(ManhattanState {
                learning_rate,
                zero_tolerance,
            }),
        })
    }
}

fn check_learning_rate(learning_rate: f64) -> Result<()> {
    if !(learning_rate.is_finite() && learning_rate > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "learning rate must be finite and > 0, got {learning_rate}"
        )));
    }
    Ok(())
}

fn check_tolerance(zero_tolerance: f64) -> Result<()> {
    if !(zero_tolerance.is_finite() && zero_tolerance >= 0.0) {
        return Err(Error::InvalidConfig(format!(
            "zero tolerance must be finite and >= 0, got {zero_tolerance}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
/// Owned optimizer state.
pub enum OptimizerState {
    Resilient(ResilientState),
    Backprop(BackpropState),
    Manhattan(ManhattanState),
}

impl OptimizerState {
    /// Apply one update to `weights`.
    pub fn step(&mut self, weights: &mut [f64], gradients: &[f64]) {
        match self {
            OptimizerState::Resilient(s) => s.step(weights, gradients),
            OptimizerState::Backprop(s) => s.step(weights, gradients),
            OptimizerState::Manhattan(s) => s.step(weights, gradients),
        }
    }

    pub fn as_resilient(&self) -> Option<&ResilientState> {
        match self {
            OptimizerState::Resilient(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn learning_rate_mut(&mut self) -> Option<&mut dyn LearningRate> {
        match self {
            OptimizerState::Resilient(_) => None,
            OptimizerState::Backprop(s) => Some(s),
            OptimizerState::Manhattan(s) => Some(s),
        }
    }

    pub(crate) fn momentum_mut(&mut self) -> Option<&mut dyn Momentum> {
        match self {
            OptimizerState::Backprop(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackpropState {
    learning_rate: f64,
    momentum: f64,
    last_delta: Vec<f64>,
}

impl BackpropState {
    pub fn step(&mut self, weights: &mut [f64], gradients: &[f64]) {
        assert_eq!(weights.len(), self.last_delta.len());
        assert_eq!(gradients.len(), weights.len());

        for ((w, &g), last) in weights.iter_mut().zip(gradients).zip(&mut self.last_delta) {
            let delta = self.learning_rate.mul_add(g, self.momentum * *last);
            *last = delta;
            *w += delta;
        }
    }
}

impl LearningRate for BackpropState {
    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, rate: f64) {
        self.learning_rate = rate;
    }
}

impl Momentum for BackpropState {
    fn momentum(&self) -> f64 {
        self.momentum
    }

    fn set_momentum(&mut self, momentum: f64) {
        self.momentum = momentum;
    }
}

#[derive(Debug, Clone)]
pub struct ManhattanState {
    learning_rate: f64,
    zero_tolerance: f64,
}

impl ManhattanState {
    pub fn step(&mut self, weights: &mut [f64], gradients: &[f64]) {
        assert_eq!(gradients.len(), weights.len());

        for (w, &g) in weights.iter_mut().zip(gradients) {
            if g.abs() < self.zero_tolerance {
                continue;
            }
            if g > 0.0 {
                *w += self.learning_rate;
            } else if g < 0.0 {
                *w -= self.learning_rate;
            }
        }
    }
}

impl LearningRate for ManhattanState {
    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, rate: f64) {
        self.learning_rate = rate;
    }
}
