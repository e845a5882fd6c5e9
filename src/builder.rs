//! Network builder.
//!
//! `NetworkBuilder` is the topology descriptor: input size, then each layer's
//! size, activation and bias flag, listed from the input towards the output.
//! `build_*` turns it into a [`FlatNetwork`] once; the topology is fixed after
//! that.
//!
//! A bias flag on a layer adds a bias neuron feeding the *next* layer, so the
//! flag on the final (output) layer is ignored.

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Activation, Error, FlatNetwork, Result};

/// Bias neuron output used unless overridden.
pub const DEFAULT_BIAS_ACTIVATION: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Weight initialisation.
pub enum Init {
    /// Uniform in `[low, high)`.
    Range { low: f64, high: f64 },
    /// Xavier/Glorot uniform, scaled per weight block.
    Xavier,
}

impl Default for Init {
    fn default() -> Self {
        Init::Range {
            low: -1.0,
            high: 1.0,
        }
    }
}

impl Init {
    pub fn validate(self) -> Result<()> {
        if let Init::Range { low, high } = self {
            if !(low.is_finite() && high.is_finite() && low < high) {
                return Err(Error::InvalidConfig(format!(
                    "init range must be finite with low < high, got [{low}, {high})"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn fill<R: Rng + ?Sized>(
        self,
        weights: &mut [f64],
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) {
        let dist = match self {
            Init::Range { low, high } => Uniform::new(low, high),
            Init::Xavier => {
                let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
                Uniform::new_inclusive(-limit, limit)
            }
        };
        for w in weights {
            *w = dist.sample(rng);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LayerSpec {
    neurons: usize,
    activation: Activation,
    bias: bool,
}

#[derive(Debug, Clone)]
/// Builder for a [`FlatNetwork`].
///
/// ```rust
/// use rprop_net::{Activation, NetworkBuilder};
///
/// # fn main() -> rprop_net::Result<()> {
/// let net = NetworkBuilder::new(2)?
///     .add_layer(3, Activation::Sigmoid)?
///     .add_layer(1, Activation::Sigmoid)?
///     .build_with_seed(0)?;
/// assert_eq!(net.layer_count(), 3);
/// # Ok(())
/// # }
/// ```
pub struct NetworkBuilder {
    input: LayerSpec,
    layers: Vec<LayerSpec>,
    bias_activation: f64,
    init: Init,
}

impl NetworkBuilder {
    /// Start a network with `input_dim` inputs and a bias neuron on the input layer.
    pub fn new(input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidConfig("input_dim must be > 0".to_owned()));
        }
        Ok(Self {
            input: LayerSpec {
                neurons: input_dim,
                activation: Activation::Linear,
                bias: true,
            },
            layers: Vec::new(),
            bias_activation: DEFAULT_BIAS_ACTIVATION,
            init: Init::default(),
        })
    }

    /// Convenience constructor from a sizes list + activations.
    ///
    /// `sizes` includes input and output dimensions; `activations` has
    /// `sizes.len() - 1` entries. Every non-output layer gets a bias neuron.
    pub fn from_sizes(sizes: &[usize], activations: &[Activation]) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(Error::InvalidConfig(
                "sizes must include input and output dims".to_owned(),
            ));
        }
        if activations.len() != sizes.len() - 1 {
            return Err(Error::InvalidConfig(format!(
                "activations length {} does not match sizes.len() - 1 ({})",
                activations.len(),
                sizes.len() - 1
            )));
        }

        let mut b = Self::new(sizes[0])?;
        for (&neurons, &act) in sizes[1..].iter().zip(activations) {
            b = b.add_layer(neurons, act)?;
        }
        Ok(b)
    }

    /// Whether the input layer carries a bias neuron (default: yes).
    pub fn input_bias(mut self, bias: bool) -> Self {
        self.input.bias = bias;
        self
    }

    /// Output value of every bias neuron.
    pub fn bias_activation(mut self, value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "bias activation must be finite, got {value}"
            )));
        }
        self.bias_activation = value;
        Ok(self)
    }

    pub fn init(mut self, init: Init) -> Result<Self> {
        init.validate()?;
        self.init = init;
        Ok(self)
    }

    /// Add a layer with a bias neuron.
    pub fn add_layer(self, neurons: usize, activation: Activation) -> Result<Self> {
        self.add_layer_with_bias(neurons, activation, true)
    }

    pub fn add_layer_with_bias(
        mut self,
        neurons: usize,
        activation: Activation,
        bias: bool,
    ) -> Result<Self> {
        if neurons == 0 {
            return Err(Error::InvalidConfig("layer size must be > 0".to_owned()));
        }
        activation.validate()?;

        self.layers.push(LayerSpec {
            neurons,
            activation,
            bias,
        });
        Ok(self)
    }

    /// Build using a deterministic seed.
    pub fn build_with_seed(self, seed: u64) -> Result<FlatNetwork> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.build_with_rng(&mut rng)
    }

    /// Build using the provided RNG.
    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<FlatNetwork> {
        if self.layers.is_empty() {
            return Err(Error::InvalidConfig(
                "network must have at least one layer after the input".to_owned(),
            ));
        }

        // The flat layout is ordered output first.
        let specs: Vec<LayerSpec> = std::iter::once(self.input)
            .chain(self.layers)
            .rev()
            .collect();
        let feed = specs.iter().map(|s| s.neurons).collect();
        let bias = specs
            .iter()
            .enumerate()
            .map(|(i, s)| i > 0 && s.bias)
            .collect();
        let activations = specs.iter().map(|s| s.activation).collect();

        let mut net = FlatNetwork::from_layout(feed, bias, activations, self.bias_activation)?;
        net.randomize(self.init, rng)?;
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_build_is_deterministic() {
        let build = || {
            NetworkBuilder::from_sizes(&[2, 3, 1], &[Activation::Tanh, Activation::Linear])
                .unwrap()
                .build_with_seed(123)
                .unwrap()
        };
        assert_eq!(build().weights(), build().weights());
    }

    #[test]
    fn rejects_bad_topology() {
        assert!(NetworkBuilder::new(0).is_err());
        assert!(NetworkBuilder::new(2).unwrap().build_with_seed(0).is_err());
        assert!(
            NetworkBuilder::new(2)
                .unwrap()
                .add_layer(0, Activation::Sigmoid)
                .is_err()
        );
        assert!(NetworkBuilder::from_sizes(&[2, 1], &[]).is_err());
        assert!(
            NetworkBuilder::new(2)
                .unwrap()
                .add_layer(
                    1,
                    Activation::Gaussian {
                        center: 0.0,
                        width: -1.0,
                        peak: 1.0
                    }
                )
                .is_err()
        );
    }

    #[test]
    fn bias_flags_shape_the_layout() {
        let net = NetworkBuilder::new(3)
            .unwrap()
            .input_bias(false)
            .add_layer_with_bias(4, Activation::Sigmoid, true)
            .unwrap()
            .add_layer_with_bias(2, Activation::Sigmoid, true)
            .unwrap()
            .build_with_seed(0)
            .unwrap();
        assert_eq!(net.layer_counts(), &[2, 5, 3]);
        assert!(!net.has_bias(0));
        assert!(net.has_bias(1));
        assert!(!net.has_bias(2));
        assert_eq!(net.activations()[2], Activation::Linear);
    }

    #[test]
    fn init_range_is_respected() {
        let net = NetworkBuilder::new(4)
            .unwrap()
            .init(Init::Range {
                low: -0.1,
                high: 0.1,
            })
            .unwrap()
            .add_layer(5, Activation::Tanh)
            .unwrap()
            .add_layer(2, Activation::Linear)
            .unwrap()
            .build_with_seed(9)
            .unwrap();
        assert!(net.weights().iter().all(|w| (-0.1..0.1).contains(w)));
        assert!(net.weights().iter().any(|&w| w != 0.0));

        assert!(
            NetworkBuilder::new(1)
                .unwrap()
                .init(Init::Range {
                    low: 1.0,
                    high: 0.0
                })
                .is_err()
        );
    }

    #[test]
    fn xavier_scales_by_fan() {
        let net = NetworkBuilder::new(10)
            .unwrap()
            .init(Init::Xavier)
            .unwrap()
            .add_layer(10, Activation::Tanh)
            .unwrap()
            .build_with_seed(1)
            .unwrap();
        let limit = (6.0_f64 / 21.0).sqrt();
        assert!(net.weights().iter().all(|w| w.abs() <= limit));
    }
}
