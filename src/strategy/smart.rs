use log::debug;

use super::Strategy;
use crate::train::Train;
use crate::{Error, Result};

/// Factor applied to the learning rate whenever the error rises.
pub const LEARNING_DECAY: f64 = 0.99;

/// Starts the learning rate at `1 / training_len` and decays it whenever an
/// iteration makes the error worse.
#[derive(Debug, Clone, Default)]
pub struct SmartLearningRate {
    current: f64,
    last_error: f64,
    ready: bool,
}

impl SmartLearningRate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn learning_rate(&self) -> f64 {
        self.current
    }
}

impl Strategy for SmartLearningRate {
    fn init(&mut self, train: &mut dyn Train) -> Result<()> {
        let len = train.training_len();
        let setup = train.learning_rate_mut().ok_or_else(|| {
            Error::UnsupportedMethod(
                "smart learning rate requires a learning-rate based algorithm".to_owned(),
            )
        })?;
        self.current = 1.0 / len.max(1) as f64;
        self.ready = false;
        setup.set_learning_rate(self.current);
        debug!("smart learning rate starting at {}", self.current);
        Ok(())
    }

    fn pre_iteration(&mut self, train: &mut dyn Train) -> Result<()> {
        self.last_error = train.error();
        Ok(())
    }

    fn post_iteration(&mut self, train: &mut dyn Train) -> Result<()> {
        if !self.ready {
            self.ready = true;
            return Ok(());
        }
        if train.error() > self.last_error {
            self.current *= LEARNING_DECAY;
            if let Some(setup) = train.learning_rate_mut() {
                setup.set_learning_rate(self.current);
            }
        }
        Ok(())
    }
}

/// Relative improvement below which training counts as stalled.
pub const MIN_IMPROVEMENT: f64 = 0.0001;
pub const MAX_MOMENTUM: f64 = 4.0;
/// Momentum applied when a stall is first detected.
pub const START_MOMENTUM: f64 = 0.1;
/// Relative growth of the momentum on every further stall.
pub const MOMENTUM_INCREASE: f64 = 0.01;
/// Stalled iterations tolerated before momentum is raised.
pub const MOMENTUM_CYCLES: usize = 10;

/// Adds momentum when training stalls and removes it again once the error
/// improves.
#[derive(Debug, Clone, Default)]
pub struct SmartMomentum {
    current: f64,
    last_error: f64,
    stalled: usize,
    ready: bool,
}

impl SmartMomentum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn momentum(&self) -> f64 {
        self.current
    }
}

impl Strategy for SmartMomentum {
    fn init(&mut self, train: &mut dyn Train) -> Result<()> {
        let setup = train.momentum_mut().ok_or_else(|| {
            Error::UnsupportedMethod(
                "smart momentum requires a momentum based algorithm".to_owned(),
            )
        })?;
        setup.set_momentum(0.0);
        *self = Self::default();
        Ok(())
    }

    fn pre_iteration(&mut self, train: &mut dyn Train) -> Result<()> {
        self.last_error = train.error();
        Ok(())
    }

    fn post_iteration(&mut self, train: &mut dyn Train) -> Result<()> {
        if !self.ready {
            self.ready = true;
            return Ok(());
        }

        let error = train.error();
        // A zero previous error leaves nothing to improve on.
        let improvement = if self.last_error == 0.0 {
            0.0
        } else {
            (error - self.last_error) / self.last_error
        };

        if improvement > 0.0 || improvement.abs() < MIN_IMPROVEMENT {
            self.stalled += 1;
            if self.stalled > MOMENTUM_CYCLES {
                self.stalled = 0;
                if self.current == 0.0 {
                    self.current = START_MOMENTUM;
                }
                self.current = (self.current * (1.0 + MOMENTUM_INCREASE)).min(MAX_MOMENTUM);
                debug!("smart momentum raised to {}", self.current);
                if let Some(setup) = train.momentum_mut() {
                    setup.set_momentum(self.current);
                }
            }
        } else if self.current != 0.0 {
            self.current = 0.0;
            if let Some(setup) = train.momentum_mut() {
                setup.set_momentum(0.0);
            }
        }
        Ok(())
    }
}
