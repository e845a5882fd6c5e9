//! Propagation training engine.
//!
//! One [`Propagation::iteration`] is a full epoch:
//!
//! 1. every gradient worker runs forward + backprop over its contiguous range
//!    of samples (in parallel with `rayon` when there is more than one);
//! 2. the per-worker gradients are summed in worker order;
//! 3. the configured [`Optimizer`] updates every weight, single-threaded;
//! 4. the workers measure the error of the updated weights, which becomes
//!    [`Train::error`].
//!
//! Creating the engine performs initialisation, leaving it `Ready`;
//! [`Train::finish_training`] moves it to `Done`, after which iterations are
//! rejected.

use std::mem;
use std::ops::Range;

use log::{debug, trace};
use rayon::prelude::*;

use crate::gradient::GradientWorker;
use crate::strategy::Strategy;
use crate::train::{Encodable, LearningRate, Momentum, Train};
use crate::{
    Error, ErrorCalculation, ErrorMode, FlatNetwork, Optimizer, OptimizerState,
    ResilientContinuation, Result, TrainingData,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropagationConfig {
    pub optimizer: Optimizer,
    /// Number of gradient workers; capped at the number of samples.
    pub workers: usize,
    pub error_mode: ErrorMode,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            optimizer: Optimizer::default(),
            workers: 1,
            error_mode: ErrorMode::Mse,
        }
    }
}

impl PropagationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be > 0".to_owned()));
        }
        self.optimizer.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Ready,
    Done,
}

/// Gradient-based trainer for a [`FlatNetwork`].
pub struct Propagation<'a> {
    network: FlatNetwork,
    training: &'a (dyn TrainingData + Sync),
    workers: Vec<GradientWorker>,
    ranges: Vec<Range<usize>>,
    gradients: Vec<f64>,
    optimizer: OptimizerState,
    error_mode: ErrorMode,
    error: f64,
    iteration: usize,
    strategies: Vec<Box<dyn Strategy>>,
    state: TrainingState,
}

impl<'a> Propagation<'a> {
    pub fn new(
        network: FlatNetwork,
        training: &'a (dyn TrainingData + Sync),
        config: PropagationConfig,
    ) -> Result<Self> {
        config.validate()?;
        if training.is_empty() {
            return Err(Error::EmptyDataset);
        }
        network.check_data(training)?;

        // Every layer that receives weights needs a derivative.
        let last = network.layer_count() - 1;
        if let Some(act) = network.activations()[..last]
            .iter()
            .find(|a| !a.has_derivative())
        {
            return Err(Error::NonDifferentiableActivation(act.name().to_owned()));
        }

        let optimizer = config.optimizer.state(network.weights().len())?;
        let ranges = split_ranges(training.len(), config.workers);
        let workers = ranges.iter().map(|_| GradientWorker::new(&network)).collect();

        debug!(
            "propagation engine created: layers {:?}, {} weights, {} samples, optimizer {}, {} workers",
            network.layer_counts(),
            network.weights().len(),
            training.len(),
            config.optimizer.name(),
            ranges.len()
        );

        Ok(Self {
            gradients: vec![0.0; network.weights().len()],
            network,
            training,
            workers,
            ranges,
            optimizer,
            error_mode: config.error_mode,
            error: 0.0,
            iteration: 0,
            strategies: Vec::new(),
            state: TrainingState::Ready,
        })
    }

    /// RPROP with default constants on a single worker.
    pub fn resilient(network: FlatNetwork, training: &'a (dyn TrainingData + Sync)) -> Result<Self> {
        Self::new(network, training, PropagationConfig::default())
    }

    #[inline]
    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Summed gradients of the most recent iteration.
    #[inline]
    pub fn gradients(&self) -> &[f64] {
        &self.gradients
    }

    #[inline]
    pub fn optimizer_state(&self) -> &OptimizerState {
        &self.optimizer
    }

    pub fn into_network(self) -> FlatNetwork {
        self.network
    }

    /// Snapshot RPROP state. Only RPROP supports continuation.
    pub fn pause(&self) -> Result<ResilientContinuation> {
        let rprop = self.optimizer.as_resilient().ok_or_else(|| {
            Error::UnsupportedMethod("pause is only supported by resilient propagation".to_owned())
        })?;
        debug!("training paused at iteration {}", self.iteration);
        Ok(rprop.pause())
    }

    pub fn is_valid_resume(&self, state: &ResilientContinuation) -> bool {
        self.optimizer
            .as_resilient()
            .is_some_and(|rprop| rprop.is_valid_resume(state))
    }

    /// Continue from a snapshot taken by [`Propagation::pause`].
    pub fn resume(&mut self, state: &ResilientContinuation) -> Result<()> {
        if self.state == TrainingState::Done {
            return Err(Error::InvalidConfig(
                "cannot resume a finished training run".to_owned(),
            ));
        }
        match &mut self.optimizer {
            OptimizerState::Resilient(rprop) => rprop.resume(state)?,
            _ => {
                return Err(Error::UnsupportedMethod(
                    "resume is only supported by resilient propagation".to_owned(),
                ));
            }
        }
        debug!("training resumed at iteration {}", self.iteration);
        Ok(())
    }

    /// Run `pass` on every worker over its own range, in parallel when there
    /// is more than one worker.
    fn run_workers<F>(&mut self, pass: F)
    where
        F: Fn(&mut GradientWorker, &FlatNetwork, &(dyn TrainingData + Sync), Range<usize>) + Sync,
    {
        let network = &self.network;
        let training = self.training;

        if self.workers.len() == 1 {
            pass(&mut self.workers[0], network, training, self.ranges[0].clone());
        } else {
            self.workers
                .par_iter_mut()
                .zip(self.ranges.par_iter())
                .for_each(|(worker, range)| pass(worker, network, training, range.clone()));
        }
    }

    fn calculate_gradients(&mut self) {
        self.run_workers(|worker, network, training, range| {
            worker.run(network, training, range)
        });

        self.gradients.fill(0.0);
        for worker in &self.workers {
            for (g, &w) in self.gradients.iter_mut().zip(worker.gradients()) {
                *g += w;
            }
        }
    }

    fn calculate_error(&mut self) {
        self.run_workers(|worker, network, training, range| {
            worker.measure(network, training, range)
        });

        let mut error = ErrorCalculation::new();
        for worker in &self.workers {
            error.merge(worker.error());
        }
        self.error = error.calculate(self.error_mode);
    }

    fn run_iteration(&mut self, strategies: &mut [Box<dyn Strategy>]) -> Result<()> {
        for strategy in strategies.iter_mut() {
            strategy.pre_iteration(self)?;
        }

        self.calculate_gradients();
        self.optimizer
            .step(self.network.weights_mut(), &self.gradients);
        self.calculate_error();
        self.iteration += 1;
        trace!("iteration {} error {}", self.iteration, self.error);

        for strategy in strategies.iter_mut() {
            strategy.post_iteration(self)?;
        }
        Ok(())
    }
}

impl Train for Propagation<'_> {
    fn network(&self) -> &FlatNetwork {
        &self.network
    }

    fn network_mut(&mut self) -> &mut FlatNetwork {
        &mut self.network
    }

    fn error(&self) -> f64 {
        self.error
    }

    fn set_error(&mut self, error: f64) {
        self.error = error;
    }

    fn iteration(&mut self) -> Result<()> {
        if self.state == TrainingState::Done {
            return Err(Error::InvalidConfig(
                "training already finished".to_owned(),
            ));
        }

        // Strategies get `&mut self`, so they are detached for the iteration.
        let mut strategies = mem::take(&mut self.strategies);
        let result = self.run_iteration(&mut strategies);
        strategies.append(&mut self.strategies);
        self.strategies = strategies;
        result
    }

    fn iteration_count(&self) -> usize {
        self.iteration
    }

    fn training_len(&self) -> usize {
        self.training.len()
    }

    fn add_strategy(&mut self, mut strategy: Box<dyn Strategy>) -> Result<()> {
        strategy.init(self)?;
        self.strategies.push(strategy);
        Ok(())
    }

    fn is_training_done(&self) -> bool {
        self.state == TrainingState::Done || self.strategies.iter().any(|s| s.should_stop(self))
    }

    fn finish_training(&mut self) {
        if self.state != TrainingState::Done {
            debug!(
                "training finished after {} iterations, error {}",
                self.iteration, self.error
            );
        }
        self.state = TrainingState::Done;
    }

    fn encodable_mut(&mut self) -> Option<&mut dyn Encodable> {
        Some(&mut self.network)
    }

    fn learning_rate_mut(&mut self) -> Option<&mut dyn LearningRate> {
        self.optimizer.learning_rate_mut()
    }

    fn momentum_mut(&mut self) -> Option<&mut dyn Momentum> {
        self.optimizer.momentum_mut()
    }
}

/// Split `0..len` into at most `workers` contiguous, non-empty ranges.
fn split_ranges(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.min(len).max(1);
    let base = len / workers;
    let extra = len % workers;

    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for i in 0..workers {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, Dataset, NetworkBuilder};

    fn xor() -> Dataset {
        Dataset::from_rows(
            &[vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            &[vec![0.0], vec![1.0], vec![1.0], vec![0.0]],
        )
        .unwrap()
    }

    fn net(hidden: Activation) -> FlatNetwork {
        NetworkBuilder::from_sizes(&[2, 3, 1], &[hidden, Activation::Sigmoid])
            .unwrap()
            .build_with_seed(3)
            .unwrap()
    }

    #[test]
    fn ranges_cover_everything() {
        assert_eq!(split_ranges(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(split_ranges(2, 8), vec![0..1, 1..2]);
        assert_eq!(split_ranges(5, 1), vec![0..5]);
    }

    #[test]
    fn construction_checks() {
        let data = xor();
        assert!(matches!(
            Propagation::resilient(net(Activation::BiPolar), &data),
            Err(Error::NonDifferentiableActivation(_))
        ));

        let wide = Dataset::from_rows(&[vec![0.0, 0.0, 0.0]], &[vec![0.0]]).unwrap();
        assert!(matches!(
            Propagation::resilient(net(Activation::Tanh), &wide),
            Err(Error::InvalidData(_))
        ));

        let config = PropagationConfig {
            workers: 0,
            ..PropagationConfig::default()
        };
        assert!(Propagation::new(net(Activation::Tanh), &data, config).is_err());
    }

    #[test]
    fn initial_update_values_before_first_iteration() {
        let data = xor();
        let train = Propagation::resilient(net(Activation::Tanh), &data).unwrap();
        let rprop = train.optimizer_state().as_resilient().unwrap();
        assert!(rprop.update_values().iter().all(|&u| u == 0.1));
        assert_eq!(train.error(), 0.0);
        assert_eq!(train.state(), TrainingState::Ready);
    }

    #[test]
    fn error_reflects_updated_weights() {
        let data = xor();
        let mut train = Propagation::resilient(net(Activation::Tanh), &data).unwrap();
        for _ in 0..3 {
            train.iteration().unwrap();
            let expected = train.network().calculate_error(&data, ErrorMode::Mse).unwrap();
            assert!((train.error() - expected).abs() < 1e-12);
        }
        assert_eq!(train.iteration_count(), 3);
    }

    #[test]
    fn finished_training_rejects_iterations() {
        let data = xor();
        let mut train = Propagation::resilient(net(Activation::Tanh), &data).unwrap();
        train.finish_training();
        assert!(train.is_training_done());
        assert!(matches!(train.iteration(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn continuation_is_rprop_only() {
        let data = xor();
        let config = PropagationConfig {
            optimizer: Optimizer::Backprop {
                learning_rate: 0.7,
                momentum: 0.3,
            },
            ..PropagationConfig::default()
        };
        let mut train = Propagation::new(net(Activation::Tanh), &data, config).unwrap();
        assert!(matches!(train.pause(), Err(Error::UnsupportedMethod(_))));

        let snapshot = ResilientContinuation {
            last_gradient: vec![0.0; 13],
            update_values: vec![0.1; 13],
            last_weight_change: vec![0.0; 13],
        };
        assert!(!train.is_valid_resume(&snapshot));
        assert!(train.resume(&snapshot).is_err());
        assert!(train.learning_rate_mut().is_some());
        assert!(train.momentum_mut().is_some());
    }
}
