//! Training strategies.
//!
//! A [`Strategy`] is attached to a [`Train`] algorithm with
//! [`Train::add_strategy`] and then called around every iteration. Strategies
//! are independent of each other and of the update rule; any number can be
//! combined.
//!
//! Termination is cooperative: [`Strategy::should_stop`] is only consulted
//! between iterations, through [`Train::is_training_done`].

mod end;
mod greedy;
mod smart;

pub use end::{EndIterationsStrategy, EndMinutesStrategy};
pub use greedy::Greedy;
pub use smart::{SmartLearningRate, SmartMomentum};

use crate::Result;
use crate::train::Train;

pub trait Strategy {
    /// Called once when the strategy is attached.
    fn init(&mut self, train: &mut dyn Train) -> Result<()>;

    fn pre_iteration(&mut self, _train: &mut dyn Train) -> Result<()> {
        Ok(())
    }

    fn post_iteration(&mut self, _train: &mut dyn Train) -> Result<()> {
        Ok(())
    }

    /// Whether training should end before the next iteration.
    fn should_stop(&self, _train: &dyn Train) -> bool {
        false
    }
}
