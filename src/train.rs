//! Training abstractions.
//!
//! [`Train`] is what strategies and driver loops see of a training algorithm.
//! Optional capabilities ([`Encodable`], [`LearningRate`], [`Momentum`]) are
//! exposed through `*_mut` hooks that return `None` when the algorithm lacks
//! them, so a strategy can fail fast with [`Error::UnsupportedMethod`].

use crate::strategy::Strategy;
use crate::{Error, FlatNetwork, Result};

/// A model whose trainable state can be flattened into an array.
pub trait Encodable {
    fn encoded_array_len(&self) -> usize;

    /// Copy the state into `out`. `out.len()` must equal `encoded_array_len()`.
    fn encode_to_array(&self, out: &mut [f64]) -> Result<()>;

    /// Overwrite the state from `encoded`.
    fn decode_from_array(&mut self, encoded: &[f64]) -> Result<()>;
}

/// A training algorithm driven by a learning rate.
pub trait LearningRate {
    fn learning_rate(&self) -> f64;
    fn set_learning_rate(&mut self, rate: f64);
}

/// A training algorithm with a momentum term.
pub trait Momentum {
    fn momentum(&self) -> f64;
    fn set_momentum(&mut self, momentum: f64);
}

/// An iterative training algorithm.
pub trait Train {
    fn network(&self) -> &FlatNetwork;

    fn network_mut(&mut self) -> &mut FlatNetwork;

    /// Aggregate error reported by the most recent iteration.
    fn error(&self) -> f64;

    fn set_error(&mut self, error: f64);

    /// Run one epoch over the training data.
    fn iteration(&mut self) -> Result<()>;

    /// Number of completed iterations.
    fn iteration_count(&self) -> usize;

    /// Number of training samples.
    fn training_len(&self) -> usize;

    /// Initialise `strategy` against this algorithm and attach it.
    fn add_strategy(&mut self, strategy: Box<dyn Strategy>) -> Result<()>;

    /// True once training was finished or a strategy asks to stop.
    fn is_training_done(&self) -> bool;

    fn finish_training(&mut self);

    fn encodable_mut(&mut self) -> Option<&mut dyn Encodable> {
        None
    }

    fn learning_rate_mut(&mut self) -> Option<&mut dyn LearningRate> {
        None
    }

    fn momentum_mut(&mut self) -> Option<&mut dyn Momentum> {
        None
    }
}

/// Iterate until the error is at most `target`, a strategy stops training or
/// `max_iterations` is reached. Finishes training and returns the number of
/// iterations run.
pub fn train_to_error(train: &mut dyn Train, target: f64, max_iterations: usize) -> Result<usize> {
    if !target.is_finite() || target < 0.0 {
        return Err(Error::InvalidConfig(format!(
            "target error must be finite and >= 0, got {target}"
        )));
    }
    if max_iterations == 0 {
        return Err(Error::InvalidConfig("max_iterations must be > 0".to_owned()));
    }

    let mut done = 0;
    while done < max_iterations && !train.is_training_done() {
        train.iteration()?;
        done += 1;
        if train.error() <= target {
            break;
        }
    }
    train.finish_training();
    Ok(done)
}
