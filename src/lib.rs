//! Dense matrices and resilient-propagation training for feed-forward networks.
//!
//! `rprop-net` is organised leaves first:
//!
//! - [`Matrix`] and the free functions in [`matrix_math`]: a rectangular grid of
//!   finite `f64` values and the arithmetic over it.
//! - [`CholeskyDecomposition`]: `A = L * L^T` factorisation and linear solves.
//! - [`FlatNetwork`]: a feed-forward network flattened into index arrays and one
//!   contiguous weight vector, built once from a [`NetworkBuilder`].
//! - [`Propagation`]: the training engine. Gradients are accumulated by
//!   back-propagation over the whole [`TrainingData`] and applied with RPROP
//!   (default), classic backprop with momentum or the Manhattan rule.
//! - [`strategy`]: policies layered on a training run (greedy rollback,
//!   termination, learning rate and momentum adaptation).
//!
//! # Panics vs `Result`
//!
//! The per-sample hot path ([`FlatNetwork::forward`]) treats shape misuse as
//! programmer error and panics via `assert!`. Everything else validates its
//! arguments and returns [`Result`].
//!
//! Numeric divergence is not an error: a network whose weights blow up simply
//! reports a NaN or infinite [`Train::error`].
//!
//! # Layout
//!
//! Layers of a [`FlatNetwork`] are stored output first: layer `0` is the output
//! layer, layer `layer_count() - 1` the input layer. Weights feeding layer `i`
//! start at `weight_index()[i]` and are row-major `(to_neuron, from_neuron)`.
//!
//! # Quick start
//!
//! ```rust
//! use rprop_net::{Activation, Dataset, NetworkBuilder, Propagation, Train};
//!
//! # fn main() -> rprop_net::Result<()> {
//! let xs = vec![
//!     vec![0.0, 0.0],
//!     vec![0.0, 1.0],
//!     vec![1.0, 0.0],
//!     vec![1.0, 1.0],
//! ];
//! let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
//! let data = Dataset::from_rows(&xs, &ys)?;
//!
//! let network = NetworkBuilder::new(2)?
//!     .add_layer(4, Activation::Tanh)?
//!     .add_layer(1, Activation::Sigmoid)?
//!     .build_with_seed(0)?;
//!
//! let mut train = Propagation::resilient(network, &data)?;
//! rprop_net::train_to_error(&mut train, 0.01, 1000)?;
//!
//! let mut network = train.into_network();
//! let y = network.compute_to_vec(&[1.0, 0.0])?;
//! assert_eq!(y.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod builder;
pub mod cholesky;
pub mod data;
pub mod error;
pub mod flat;
pub(crate) mod gradient;
pub mod loss;
pub(crate) mod matmul;
pub mod matrix;
pub mod matrix_math;
pub mod optim;
pub mod propagation;
pub mod resilient;
pub mod strategy;
pub mod train;

pub use activation::Activation;
pub use builder::{Init, NetworkBuilder};
pub use cholesky::CholeskyDecomposition;
pub use data::{Dataset, Pairs, TrainingData, pairs};
pub use error::{Error, Result};
pub use flat::{FlatNetwork, FlatNetworkParts, Scratch};
pub use loss::{ErrorCalculation, ErrorMode};
pub use matrix::Matrix;
pub use optim::{Optimizer, OptimizerState};
pub use propagation::{Propagation, PropagationConfig, TrainingState};
pub use resilient::{ResilientContinuation, ResilientState};
pub use strategy::{
    EndIterationsStrategy, EndMinutesStrategy, Greedy, SmartLearningRate, SmartMomentum, Strategy,
};
pub use train::{Encodable, LearningRate, Momentum, Train, train_to_error};
