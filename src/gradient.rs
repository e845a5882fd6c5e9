//! Gradient accumulation over a range of training samples.
//!
//! A [`GradientWorker`] owns every buffer it writes: a forward-pass
//! [`Scratch`], per-neuron deltas, a per-weight gradient sum and a partial
//! [`ErrorCalculation`]. Workers only read the network, so several of them can
//! process disjoint sample ranges at once; their gradients are summed
//! afterwards.
//!
//! Sign convention: `delta = (ideal - actual) * f'` and
//! `gradient = sum(delta * source_output)`, i.e. the gradient points in the
//! direction that *reduces* the error.

use std::ops::Range;

use crate::{ErrorCalculation, FlatNetwork, Scratch, TrainingData};

#[derive(Debug, Clone)]
pub(crate) struct GradientWorker {
    scratch: Scratch,
    /// Segmented like `Scratch::layer_output`.
    layer_delta: Vec<f64>,
    gradients: Vec<f64>,
    error: ErrorCalculation,
}

impl GradientWorker {
    pub(crate) fn new(network: &FlatNetwork) -> Self {
        Self {
            scratch: network.scratch(),
            layer_delta: vec![0.0; network.neuron_count()],
            gradients: vec![0.0; network.weights().len()],
            error: ErrorCalculation::new(),
        }
    }

    #[inline]
    pub(crate) fn gradients(&self) -> &[f64] {
        &self.gradients
    }

    #[inline]
    pub(crate) fn error(&self) -> &ErrorCalculation {
        &self.error
    }

    /// Overwrite this worker's gradients and error with the sums over `range`.
    pub(crate) fn run<D: TrainingData + ?Sized>(
        &mut self,
        network: &FlatNetwork,
        data: &D,
        range: Range<usize>,
    ) {
        self.gradients.fill(0.0);
        self.error.reset();
        for idx in range {
            self.process(network, data.input(idx), data.ideal(idx));
        }
    }

    /// Overwrite this worker's error with the error over `range`, without
    /// touching the gradients.
    pub(crate) fn measure<D: TrainingData + ?Sized>(
        &mut self,
        network: &FlatNetwork,
        data: &D,
        range: Range<usize>,
    ) {
        self.error.reset();
        for idx in range {
            let actual = network.forward(data.input(idx), &mut self.scratch);
            self.error.update(actual, data.ideal(idx));
        }
    }

    fn process(&mut self, network: &FlatNetwork, input: &[f64], ideal: &[f64]) {
        let output_count = network.output_count();
        network.forward(input, &mut self.scratch);

        let output_activation = network.activations()[0];
        for i in 0..output_count {
            let actual = self.scratch.layer_output[i];
            let diff = ideal[i] - actual;
            self.error.update_value(diff);
            self.layer_delta[i] = diff
                * output_activation.derivative_unchecked(self.scratch.layer_sums[i], actual);
        }

        for layer in 0..network.layer_count() - 1 {
            self.process_level(network, layer);
        }
    }

    /// Accumulate gradients for the weights feeding `layer` and propagate
    /// deltas back into `layer + 1`.
    fn process_level(&mut self, network: &FlatNetwork, layer: usize) {
        let from = layer + 1;
        let from_idx = network.layer_index()[from];
        let from_count = network.layer_counts()[from];
        let to_idx = network.layer_index()[layer];
        let to_count = network.layer_feed_counts()[layer];
        let w0 = network.weight_index()[layer];
        let weights = network.weights();

        // The input layer has no incoming weights, so its deltas are never read.
        let propagate = from < network.layer_count() - 1;
        let activation = network.activations()[from];

        for y in 0..from_count {
            let source_output = self.scratch.layer_output[from_idx + y];
            let mut sum = 0.0;
            let mut w = w0 + y;
            for x in 0..to_count {
                let delta = self.layer_delta[to_idx + x];
                self.gradients[w] = source_output.mul_add(delta, self.gradients[w]);
                sum = weights[w].mul_add(delta, sum);
                w += from_count;
            }
            if propagate {
                self.layer_delta[from_idx + y] = sum
                    * activation.derivative_unchecked(
                        self.scratch.layer_sums[from_idx + y],
                        source_output,
                    );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, Dataset, ErrorMode, NetworkBuilder};

    fn assert_close(analytic: f64, numeric: f64, abs_tol: f64, rel_tol: f64) {
        let diff = (analytic - numeric).abs();
        let scale = analytic.abs().max(numeric.abs()).max(1.0);
        assert!(
            diff <= abs_tol || diff / scale <= rel_tol,
            "analytic={analytic} numeric={numeric} diff={diff}"
        );
    }

    fn sse(net: &FlatNetwork, data: &Dataset) -> f64 {
        // calculate_error divides by the number of output values.
        let values = (data.len() * data.ideal_dim()) as f64;
        net.calculate_error(data, ErrorMode::Mse).unwrap() * values
    }

    #[test]
    fn gradients_match_numeric_gradients() {
        let mut net = NetworkBuilder::new(2)
            .unwrap()
            .add_layer(3, Activation::Tanh)
            .unwrap()
            .add_layer(2, Activation::Sin)
            .unwrap()
            .add_layer(
                2,
                Activation::Gaussian {
                    center: 0.1,
                    width: 1.5,
                    peak: 1.0,
                },
            )
            .unwrap()
            .build_with_seed(0)
            .unwrap();
        let data = Dataset::from_rows(
            &[vec![0.3, -0.7], vec![-0.5, 0.9]],
            &[vec![0.2, 0.8], vec![0.6, -0.1]],
        )
        .unwrap();

        let mut worker = GradientWorker::new(&net);
        worker.run(&net, &data, 0..data.len());
        let analytic = worker.gradients().to_vec();

        // E = 0.5 * SSE, and the worker's gradient is -dE/dw.
        let eps = 1e-6;
        for p in 0..net.weights().len() {
            let orig = net.weights()[p];
            net.weights_mut()[p] = orig + eps;
            let plus = 0.5 * sse(&net, &data);
            net.weights_mut()[p] = orig - eps;
            let minus = 0.5 * sse(&net, &data);
            net.weights_mut()[p] = orig;

            let numeric = -(plus - minus) / (2.0 * eps);
            assert_close(analytic[p], numeric, 1e-6, 1e-4);
        }
    }

    #[test]
    fn split_ranges_sum_to_full_range() {
        let net = NetworkBuilder::from_sizes(&[2, 4, 1], &[Activation::Sigmoid; 2])
            .unwrap()
            .build_with_seed(5)
            .unwrap();
        let data = Dataset::from_rows(
            &[vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            &[vec![0.0], vec![1.0], vec![1.0], vec![0.0]],
        )
        .unwrap();

        let mut full = GradientWorker::new(&net);
        full.run(&net, &data, 0..4);

        let mut a = GradientWorker::new(&net);
        let mut b = GradientWorker::new(&net);
        a.run(&net, &data, 0..1);
        b.run(&net, &data, 1..4);

        for ((&f, &x), &y) in full.gradients().iter().zip(a.gradients()).zip(b.gradients()) {
            assert!((f - (x + y)).abs() < 1e-12);
        }
        let mut err = *a.error();
        err.merge(b.error());
        assert!((err.calculate(ErrorMode::Mse) - full.error().calculate(ErrorMode::Mse)).abs() < 1e-12);
    }

    #[test]
    fn measure_matches_network_error_and_keeps_gradients() {
        let net = NetworkBuilder::from_sizes(&[1, 2, 1], &[Activation::Tanh, Activation::Linear])
            .unwrap()
            .build_with_seed(2)
            .unwrap();
        let data = Dataset::from_rows(&[vec![0.5], vec![-1.0]], &[vec![1.0], vec![0.0]]).unwrap();

        let mut worker = GradientWorker::new(&net);
        worker.run(&net, &data, 0..2);
        let gradients = worker.gradients().to_vec();

        worker.measure(&net, &data, 0..2);
        assert_eq!(worker.gradients(), gradients.as_slice());
        let expected = net.calculate_error(&data, ErrorMode::Rms).unwrap();
        assert!((worker.error().calculate(ErrorMode::Rms) - expected).abs() < 1e-12);
    }
}
