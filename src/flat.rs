//! Flat feed-forward network.
//!
//! The whole network lives in a handful of contiguous arrays indexed by
//! precomputed offsets; there is no per-layer object graph.
//!
//! # Layout
//!
//! - Layers are numbered from the output: layer `0` is the output layer and
//!   layer `layer_count() - 1` is the input layer.
//! - Every layer except the output may carry a bias neuron, stored after the
//!   regular neurons of that layer. `layer_counts[i]` includes it,
//!   `layer_feed_counts[i]` does not.
//! - `layer_index[i]` is the offset of layer `i` inside the per-neuron buffers
//!   (`Scratch::layer_sums` / `Scratch::layer_output`).
//! - `weight_index[i]` is the offset of the block of weights feeding layer `i`
//!   from layer `i + 1`. The block is row-major `(layer_feed_counts[i],
//!   layer_counts[i + 1])`: one row per target neuron, one column per source
//!   neuron including the source bias.
//!
//! The forward pass walks from the input layer down to layer `0`.

use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::builder::Init;
use crate::train::Encodable;
use crate::{Activation, Error, ErrorCalculation, ErrorMode, Result, TrainingData};

#[derive(Debug, Clone)]
pub struct FlatNetwork {
    input_count: usize,
    output_count: usize,
    layer_counts: Vec<usize>,
    layer_feed_counts: Vec<usize>,
    layer_index: Vec<usize>,
    weight_index: Vec<usize>,
    activations: Vec<Activation>,
    /// Output value of each layer's bias neuron (unused when the layer has none).
    bias_activation: Vec<f64>,
    weights: Vec<f64>,
    /// Arena used by [`FlatNetwork::compute`].
    scratch: Scratch,
}

/// Per-neuron buffers for one forward pass.
///
/// Both buffers are segmented by [`FlatNetwork::layer_index`]. The output of the
/// most recent forward pass is the first `output_count` values of `layer_output`.
#[derive(Debug, Clone, Default)]
pub struct Scratch {
    /// Weighted sums before activation.
    pub(crate) layer_sums: Vec<f64>,
    /// Activated values; bias slots hold the bias activation.
    pub(crate) layer_output: Vec<f64>,
}

/// Index arrays and weights of a [`FlatNetwork`], for persistence collaborators.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FlatNetworkParts {
    pub layer_counts: Vec<usize>,
    pub layer_feed_counts: Vec<usize>,
    pub activations: Vec<Activation>,
    pub bias_activation: Vec<f64>,
    pub weights: Vec<f64>,
}

impl FlatNetwork {
    /// Build from per-layer descriptions ordered output first.
    ///
    /// Weights start at zero. Prefer [`crate::NetworkBuilder`].
    pub(crate) fn from_layout(
        layer_feed_counts: Vec<usize>,
        has_bias: Vec<bool>,
        activations: Vec<Activation>,
        bias_activation: f64,
    ) -> Result<Self> {
        let bias_activation = has_bias
            .iter()
            .map(|&b| if b { bias_activation } else { 0.0 })
            .collect();
        let layer_counts: Vec<usize> = layer_feed_counts
            .iter()
            .zip(&has_bias)
            .map(|(&n, &b)| n + usize::from(b))
            .collect();
        let weight_len = weight_len(&layer_feed_counts, &layer_counts);
        Self::from_parts(FlatNetworkParts {
            layer_counts,
            layer_feed_counts,
            activations,
            bias_activation,
            weights: vec![0.0; weight_len],
        })
    }

    /// Rebuild a network from its parts, validating every invariant.
    pub fn from_parts(parts: FlatNetworkParts) -> Result<Self> {
        let FlatNetworkParts {
            layer_counts,
            layer_feed_counts,
            activations,
            bias_activation,
            weights,
        } = parts;

        let layers = layer_counts.len();
        if layers < 2 {
            return Err(Error::InvalidConfig(
                "network needs at least an input and an output layer".to_owned(),
            ));
        }
        if layer_feed_counts.len() != layers
            || activations.len() != layers
            || bias_activation.len() != layers
        {
            return Err(Error::InvalidConfig(format!(
                "per-layer arrays must all have {layers} entries"
            )));
        }
        for (i, (&count, &feed)) in layer_counts.iter().zip(&layer_feed_counts).enumerate() {
            if feed == 0 {
                return Err(Error::InvalidConfig(format!("layer {i} has no neurons")));
            }
            if count != feed && count != feed + 1 {
                return Err(Error::InvalidConfig(format!(
                    "layer {i} count {count} must equal feed count {feed}, plus one for a bias"
                )));
            }
        }
        if layer_counts[0] != layer_feed_counts[0] {
            return Err(Error::InvalidConfig(
                "the output layer cannot have a bias neuron".to_owned(),
            ));
        }
        for act in &activations {
            act.validate()?;
        }
        if bias_activation.iter().any(|b| !b.is_finite()) {
            return Err(Error::InvalidConfig(
                "bias activations must be finite".to_owned(),
            ));
        }

        let expected = weight_len(&layer_feed_counts, &layer_counts);
        if weights.len() != expected {
            return Err(Error::Dimension(format!(
                "weights length {} does not match topology ({expected})",
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::InvalidData(
                "weights must contain only finite values".to_owned(),
            ));
        }

        let mut layer_index = vec![0; layers];
        let mut weight_index = vec![0; layers];
        for i in 1..layers {
            layer_index[i] = layer_index[i - 1] + layer_counts[i - 1];
            weight_index[i] = weight_index[i - 1] + layer_feed_counts[i - 1] * layer_counts[i];
        }

        let mut net = Self {
            input_count: layer_feed_counts[layers - 1],
            output_count: layer_feed_counts[0],
            layer_counts,
            layer_feed_counts,
            layer_index,
            weight_index,
            activations,
            bias_activation,
            weights,
            scratch: Scratch::default(),
        };
        net.scratch = net.scratch();
        Ok(net)
    }

    /// Copy out the index arrays and weights.
    pub fn to_parts(&self) -> FlatNetworkParts {
        FlatNetworkParts {
            layer_counts: self.layer_counts.clone(),
            layer_feed_counts: self.layer_feed_counts.clone(),
            activations: self.activations.clone(),
            bias_activation: self.bias_activation.clone(),
            weights: self.weights.clone(),
        }
    }

    #[inline]
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    #[inline]
    pub fn output_count(&self) -> usize {
        self.output_count
    }

    #[inline]
    pub fn layer_count(&self) -> usize {
        self.layer_counts.len()
    }

    /// Neurons per layer including bias neurons, output layer first.
    #[inline]
    pub fn layer_counts(&self) -> &[usize] {
        &self.layer_counts
    }

    /// Neurons per layer excluding bias neurons, output layer first.
    #[inline]
    pub fn layer_feed_counts(&self) -> &[usize] {
        &self.layer_feed_counts
    }

    #[inline]
    pub fn layer_index(&self) -> &[usize] {
        &self.layer_index
    }

    #[inline]
    pub fn weight_index(&self) -> &[usize] {
        &self.weight_index
    }

    #[inline]
    pub fn activations(&self) -> &[Activation] {
        &self.activations
    }

    #[inline]
    pub fn bias_activation(&self) -> &[f64] {
        &self.bias_activation
    }

    #[inline]
    pub fn has_bias(&self, layer: usize) -> bool {
        self.layer_counts[layer] != self.layer_feed_counts[layer]
    }

    /// Total neurons across all layers, bias neurons included.
    #[inline]
    pub fn neuron_count(&self) -> usize {
        self.layer_counts.iter().sum()
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    /// The weight connecting `from_neuron` of layer `from_layer` to `to_neuron`
    /// of layer `from_layer - 1`.
    pub fn weight(&self, from_layer: usize, from_neuron: usize, to_neuron: usize) -> Result<f64> {
        Ok(self.weights[self.weight_offset(from_layer, from_neuron, to_neuron)?])
    }

    pub fn set_weight(
        &mut self,
        from_layer: usize,
        from_neuron: usize,
        to_neuron: usize,
        value: f64,
    ) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::InvalidValue(format!("weight must be finite, got {value}")));
        }
        let idx = self.weight_offset(from_layer, from_neuron, to_neuron)?;
        self.weights[idx] = value;
        Ok(())
    }

    /// Fresh buffers sized for this network.
    pub fn scratch(&self) -> Scratch {
        let len = self.neuron_count();
        let mut scratch = Scratch {
            layer_sums: vec![0.0; len],
            layer_output: vec![0.0; len],
        };
        for layer in 0..self.layer_count() {
            if self.has_bias(layer) {
                let slot = self.layer_index[layer] + self.layer_feed_counts[layer];
                scratch.layer_output[slot] = self.bias_activation[layer];
            }
        }
        scratch
    }

    /// Forward pass for a single sample, writing every layer into `scratch`.
    ///
    /// Returns the output slice. Shape mismatches are programmer error and panic.
    pub fn forward<'a>(&self, input: &[f64], scratch: &'a mut Scratch) -> &'a [f64] {
        assert_eq!(
            input.len(),
            self.input_count,
            "input len {} does not match network input_count {}",
            input.len(),
            self.input_count
        );
        assert_eq!(
            scratch.layer_output.len(),
            self.neuron_count(),
            "scratch has {} neurons, network has {}",
            scratch.layer_output.len(),
            self.neuron_count()
        );

        let input_layer = self.layer_count() - 1;
        let start = self.layer_index[input_layer];
        scratch.layer_sums[start..start + self.input_count].copy_from_slice(input);
        scratch.layer_output[start..start + self.input_count].copy_from_slice(input);
        self.activations[input_layer]
            .apply(&mut scratch.layer_output[start..start + self.input_count]);

        for layer in (0..input_layer).rev() {
            self.compute_layer(layer, scratch);
        }

        &scratch.layer_output[..self.output_count]
    }

    /// Compute layer `layer` from layer `layer + 1`.
    fn compute_layer(&self, layer: usize, scratch: &mut Scratch) {
        let src = self.layer_index[layer + 1];
        let src_count = self.layer_counts[layer + 1];
        let dst = self.layer_index[layer];
        let dst_count = self.layer_feed_counts[layer];
        let activation = self.activations[layer];

        if self.has_bias(layer) {
            scratch.layer_output[dst + dst_count] = self.bias_activation[layer];
        }

        let Scratch {
            layer_sums,
            layer_output,
        } = scratch;
        let (out, inputs) = layer_output.split_at_mut(src);
        let inputs = &inputs[..src_count];

        let mut w = self.weight_index[layer];
        for x in 0..dst_count {
            let mut sum = 0.0;
            for &v in inputs {
                sum = self.weights[w].mul_add(v, sum);
                w += 1;
            }
            layer_sums[dst + x] = sum;
            out[dst + x] = activation.forward(sum);
        }
    }

    /// Shape-checked inference using the network's own buffers.
    pub fn compute(&mut self, input: &[f64], output: &mut [f64]) -> Result<()> {
        self.check_input(input)?;
        if output.len() != self.output_count {
            return Err(Error::Dimension(format!(
                "output len {} does not match network output_count {}",
                output.len(),
                self.output_count
            )));
        }
        let mut scratch = std::mem::take(&mut self.scratch);
        output.copy_from_slice(self.forward(input, &mut scratch));
        self.scratch = scratch;
        Ok(())
    }

    /// Allocating convenience form of [`FlatNetwork::compute`].
    pub fn compute_to_vec(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.output_count];
        self.compute(input, &mut out)?;
        Ok(out)
    }

    /// Aggregate error of the network over `data`.
    pub fn calculate_error<D: TrainingData + ?Sized>(&self, data: &D, mode: ErrorMode) -> Result<f64> {
        if data.is_empty() {
            return Err(Error::EmptyDataset);
        }
        self.check_data(data)?;

        let mut scratch = self.scratch();
        let mut calc = ErrorCalculation::new();
        for idx in 0..data.len() {
            let actual = self.forward(data.input(idx), &mut scratch);
            calc.update(actual, data.ideal(idx));
        }
        Ok(calc.calculate(mode))
    }

    /// Re-initialise all weights.
    pub fn randomize<R: Rng + ?Sized>(&mut self, init: Init, rng: &mut R) -> Result<()> {
        init.validate()?;
        for layer in 0..self.layer_count() - 1 {
            let start = self.weight_index[layer];
            let end = start + self.layer_feed_counts[layer] * self.layer_counts[layer + 1];
            let fan_in = self.layer_counts[layer + 1];
            let fan_out = self.layer_feed_counts[layer];
            init.fill(&mut self.weights[start..end], fan_in, fan_out, rng);
        }
        Ok(())
    }

    pub(crate) fn check_data<D: TrainingData + ?Sized>(&self, data: &D) -> Result<()> {
        if data.input_dim() != self.input_count {
            return Err(Error::InvalidData(format!(
                "data input_dim {} does not match network input_count {}",
                data.input_dim(),
                self.input_count
            )));
        }
        if data.ideal_dim() != self.output_count {
            return Err(Error::InvalidData(format!(
                "data ideal_dim {} does not match network output_count {}",
                data.ideal_dim(),
                self.output_count
            )));
        }
        Ok(())
    }

    fn check_input(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_count {
            return Err(Error::Dimension(format!(
                "input len {} does not match network input_count {}",
                input.len(),
                self.input_count
            )));
        }
        Ok(())
    }

    fn weight_offset(&self, from_layer: usize, from_neuron: usize, to_neuron: usize) -> Result<usize> {
        if from_layer == 0 || from_layer >= self.layer_count() {
            return Err(Error::Index(format!(
                "from_layer {from_layer} must be in 1..{}",
                self.layer_count()
            )));
        }
        let from_count = self.layer_counts[from_layer];
        let to_count = self.layer_feed_counts[from_layer - 1];
        if from_neuron >= from_count {
            return Err(Error::Index(format!(
                "from_neuron {from_neuron} must be < {from_count}"
            )));
        }
        if to_neuron >= to_count {
            return Err(Error::Index(format!(
                "to_neuron {to_neuron} must be < {to_count}"
            )));
        }
        Ok(self.weight_index[from_layer - 1] + to_neuron * from_count + from_neuron)
    }
}

impl Encodable for FlatNetwork {
    fn encoded_array_len(&self) -> usize {
        self.weights.len()
    }

    fn encode_to_array(&self, out: &mut [f64]) -> Result<()> {
        if out.len() != self.weights.len() {
            return Err(Error::Dimension(format!(
                "encode buffer len {} does not match weight count {}",
                out.len(),
                self.weights.len()
            )));
        }
        out.copy_from_slice(&self.weights);
        Ok(())
    }

    fn decode_from_array(&mut self, encoded: &[f64]) -> Result<()> {
        if encoded.len() != self.weights.len() {
            return Err(Error::Dimension(format!(
                "encoded len {} does not match weight count {}",
                encoded.len(),
                self.weights.len()
            )));
        }
        self.weights.copy_from_slice(encoded);
        Ok(())
    }
}

impl Scratch {
    /// Output values of the most recent forward pass.
    #[inline]
    pub fn output(&self, output_count: usize) -> &[f64] {
        &self.layer_output[..output_count]
    }

    #[inline]
    pub fn layer_sums(&self) -> &[f64] {
        &self.layer_sums
    }

    #[inline]
    pub fn layer_output(&self) -> &[f64] {
        &self.layer_output
    }
}

fn weight_len(layer_feed_counts: &[usize], layer_counts: &[usize]) -> usize {
    (0..layer_counts.len().saturating_sub(1))
        .map(|i| layer_feed_counts[i] * layer_counts[i + 1])
        .sum()
}


#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;
    use crate::NetworkBuilder;

    #[test]
    fn parts_survive_json() {
        let net = NetworkBuilder::new(2)
            .unwrap()
            .add_layer(
                2,
                Activation::Gaussian {
                    center: 0.0,
                    width: 1.0,
                    peak: 1.0,
                },
            )
            .unwrap()
            .add_layer(1, Activation::Sigmoid)
            .unwrap()
            .build_with_seed(4)
            .unwrap();

        let json = serde_json::to_string(&net.to_parts()).unwrap();
        assert!(json.contains(r#""kind":"gaussian""#));

        let parts: FlatNetworkParts = serde_json::from_str(&json).unwrap();
        let mut loaded = FlatNetwork::from_parts(parts).unwrap();
        let mut original = net.clone();
        let a = loaded.compute_to_vec(&[0.3, -0.2]).unwrap();
        let b = original.compute_to_vec(&[0.3, -0.2]).unwrap();
        assert!((a[0] - b[0]).abs() < 1e-12);
    }
}
