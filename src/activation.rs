//! Activation functions.
//!
//! A flat network stores, per neuron, both the weighted sum `x` and the
//! activated value `y = f(x)`. Derivatives take both, so each variant can use
//! whichever is cheaper: sigmoid and tanh are expressed through `y`, SIN and the
//! Gaussian through `x`.
//!
//! BiPolar has no derivative. Gradient-based training checks
//! [`Activation::has_derivative`] when it is set up and refuses such networks.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Element-wise activation function.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Linear,
    Sigmoid,
    Tanh,
    /// `1` for positive input, `-1` otherwise.
    BiPolar,
    Sin,
    /// Gaussian radial basis function `peak * exp(-(x - center)^2 / (2 * width^2))`.
    Gaussian { center: f64, width: f64, peak: f64 },
}

impl Activation {
    /// Validate activation parameters.
    pub fn validate(self) -> Result<()> {
        if let Activation::Gaussian {
            center,
            width,
            peak,
        } = self
        {
            if !(center.is_finite() && peak.is_finite()) {
                return Err(Error::InvalidConfig(format!(
                    "gaussian center and peak must be finite, got center={center} peak={peak}"
                )));
            }
            if !(width.is_finite() && width > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "gaussian width must be finite and > 0, got {width}"
                )));
            }
        }
        Ok(())
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::BiPolar => "bipolar",
            Activation::Sin => "sin",
            Activation::Gaussian { .. } => "gaussian",
        }
    }

    #[inline]
    pub fn has_derivative(self) -> bool {
        !matches!(self, Activation::BiPolar)
    }

    #[inline]
    pub fn forward(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
            Activation::BiPolar => {
                if x > 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            Activation::Sin => x.sin(),
            Activation::Gaussian {
                center,
                width,
                peak,
            } => {
                let d = x - center;
                peak * (-(d * d) / (2.0 * width * width)).exp()
            }
        }
    }

    /// Activate `values` in place.
    pub fn apply(self, values: &mut [f64]) {
        if self == Activation::Linear {
            return;
        }
        for v in values {
            *v = self.forward(*v);
        }
    }

    /// Derivative at a neuron whose weighted sum was `before` and whose output is `after`.
    pub fn derivative(self, before: f64, after: f64) -> Result<f64> {
        if !self.has_derivative() {
            return Err(Error::NonDifferentiableActivation(self.name().to_owned()));
        }
        Ok(self.derivative_unchecked(before, after))
    }

    /// Slice form of [`Activation::derivative`]; writes `f'` into `out`.
    pub fn derivative_slice(self, before: &[f64], after: &[f64], out: &mut [f64]) -> Result<()> {
        if !self.has_derivative() {
            return Err(Error::NonDifferentiableActivation(self.name().to_owned()));
        }
        if before.len() != after.len() || before.len() != out.len() {
            return Err(Error::Dimension(format!(
                "derivative slices differ in length: {}, {}, {}",
                before.len(),
                after.len(),
                out.len()
            )));
        }
        for ((o, &x), &y) in out.iter_mut().zip(before).zip(after) {
            *o = self.derivative_unchecked(x, y);
        }
        Ok(())
    }

    /// Hot-path derivative; callers have already checked `has_derivative`.
    #[inline]
    pub(crate) fn derivative_unchecked(self, before: f64, after: f64) -> f64 {
        match self {
            Activation::Linear => 1.0,
            Activation::Sigmoid => after * (1.0 - after),
            Activation::Tanh => 1.0 - after * after,
            Activation::BiPolar => {
                debug_assert!(false, "bipolar has no derivative");
                0.0
            }
            Activation::Sin => before.cos(),
            Activation::Gaussian { center, width, .. } => {
                -(before - center) / (width * width) * after
            }
        }
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}
