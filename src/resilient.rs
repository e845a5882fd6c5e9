//! Resilient propagation (RPROP).
//!
//! RPROP ignores the magnitude of each weight's gradient and keeps a separate
//! step size (`update value`) per weight instead:
//!
//! - gradient sign unchanged since the last iteration: grow the step by
//!   [`POSITIVE_ETA`] (capped at `max_step`) and move along the gradient;
//! - sign flipped: the last step overshot a minimum. Shrink the step by
//!   [`NEGATIVE_ETA`] (floored at [`DELTA_MIN`]), undo the previous weight
//!   change and forget the gradient so the next iteration does not shrink
//!   again;
//! - either gradient (numerically) zero: move by the current step without
//!   adapting it.
//!
//! Gradients follow the convention of the gradient workers: a positive
//! gradient means increasing the weight reduces the error.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Gradients smaller than this are treated as zero.
pub const DEFAULT_ZERO_TOLERANCE: f64 = 1e-17;
/// Step growth factor while the gradient sign is stable.
pub const POSITIVE_ETA: f64 = 1.2;
/// Step shrink factor after a sign change.
pub const NEGATIVE_ETA: f64 = 0.5;
/// Smallest step size.
pub const DELTA_MIN: f64 = 1e-6;
/// Step size every weight starts with.
pub const DEFAULT_INITIAL_UPDATE: f64 = 0.1;
/// Largest step size.
pub const DEFAULT_MAX_STEP: f64 = 50.0;

/// Snapshot of RPROP state for pausing and resuming training.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ResilientContinuation {
    pub last_gradient: Vec<f64>,
    pub update_values: Vec<f64>,
    pub last_weight_change: Vec<f64>,
}

/// Per-weight RPROP state.
#[derive(Debug, Clone)]
pub struct ResilientState {
    zero_tolerance: f64,
    max_step: f64,
    update_values: Vec<f64>,
    last_gradient: Vec<f64>,
    last_weight_change: Vec<f64>,
}

impl ResilientState {
    pub fn new(weight_count: usize, initial_update: f64, max_step: f64, zero_tolerance: f64) -> Self {
        Self {
            zero_tolerance,
            max_step,
            update_values: vec![initial_update; weight_count],
            last_gradient: vec![0.0; weight_count],
            last_weight_change: vec![0.0; weight_count],
        }
    }

    #[inline]
    pub fn update_values(&self) -> &[f64] {
        &self.update_values
    }

    #[inline]
    pub fn last_gradient(&self) -> &[f64] {
        &self.last_gradient
    }

    #[inline]
    pub fn last_weight_change(&self) -> &[f64] {
        &self.last_weight_change
    }

    #[inline]
    pub fn max_step(&self) -> f64 {
        self.max_step
    }

    #[inline]
    pub fn zero_tolerance(&self) -> f64 {
        self.zero_tolerance
    }

    /// Apply one RPROP update to every weight.
    pub fn step(&mut self, weights: &mut [f64], gradients: &[f64]) {
        assert_eq!(
            weights.len(),
            self.update_values.len(),
            "weights len {} does not match rprop state len {}",
            weights.len(),
            self.update_values.len()
        );
        assert_eq!(
            gradients.len(),
            weights.len(),
            "gradients len {} does not match weights len {}",
            gradients.len(),
            weights.len()
        );

        for (i, w) in weights.iter_mut().enumerate() {
            *w += self.update_weight(i, gradients[i]);
        }
    }

    /// Returns the change to apply to weight `i`.
    #[inline]
    fn update_weight(&mut self, i: usize, gradient: f64) -> f64 {
        let change = self.sign(gradient * self.last_gradient[i]);

        let weight_change = if change > 0.0 {
            let delta = (self.update_values[i] * POSITIVE_ETA).min(self.max_step);
            self.update_values[i] = delta;
            self.last_gradient[i] = gradient;
            self.sign(gradient) * delta
        } else if change < 0.0 {
            self.update_values[i] = (self.update_values[i] * NEGATIVE_ETA).max(DELTA_MIN);
            self.last_gradient[i] = 0.0;
            -self.last_weight_change[i]
        } else {
            self.last_gradient[i] = gradient;
            self.sign(gradient) * self.update_values[i]
        };

        self.last_weight_change[i] = weight_change;
        weight_change
    }

    #[inline]
    fn sign(&self, value: f64) -> f64 {
        if value.abs() < self.zero_tolerance {
            0.0
        } else if value > 0.0 {
            1.0
        } else if value < 0.0 {
            -1.0
        } else {
            // NaN: no direction.
            0.0
        }
    }

    pub fn pause(&self) -> ResilientContinuation {
        ResilientContinuation {
            last_gradient: self.last_gradient.clone(),
            update_values: self.update_values.clone(),
            last_weight_change: self.last_weight_change.clone(),
        }
    }

    /// True when `state` was taken from RPROP state for the same number of weights.
    pub fn is_valid_resume(&self, state: &ResilientContinuation) -> bool {
        let n = self.update_values.len();
        state.last_gradient.len() == n
            && state.update_values.len() == n
            && state.last_weight_change.len() == n
    }

    pub fn resume(&mut self, state: &ResilientContinuation) -> Result<()> {
        if !self.is_valid_resume(state) {
            return Err(Error::InvalidData(format!(
                "continuation does not match {} weights",
                self.update_values.len()
            )));
        }
        if state
            .update_values
            .iter()
            .any(|&u| !(u.is_finite() && u > 0.0))
        {
            return Err(Error::InvalidData(
                "continuation update values must be finite and > 0".to_owned(),
            ));
        }
        self.last_gradient.copy_from_slice(&state.last_gradient);
        self.update_values.copy_from_slice(&state.update_values);
        self.last_weight_change
            .copy_from_slice(&state.last_weight_change);
        Ok(())
    }
}
