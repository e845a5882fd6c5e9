use std::time::{Duration, Instant};

use log::info;

use super::Strategy;
use crate::Result;
use crate::train::Train;

/// Stop once a wall-clock budget has elapsed since the strategy was attached.
#[derive(Debug, Clone)]
pub struct EndMinutesStrategy {
    duration: Duration,
    started: Option<Instant>,
    reported: bool,
}

impl EndMinutesStrategy {
    pub fn new(minutes: u64) -> Self {
        Self::with_duration(Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn with_duration(duration: Duration) -> Self {
        Self {
            duration,
            started: None,
            reported: false,
        }
    }

    /// Time since `init`, zero before it.
    pub fn elapsed(&self) -> Duration {
        self.started.map_or(Duration::ZERO, |s| s.elapsed())
    }

    fn expired(&self) -> bool {
        self.started.is_some() && self.elapsed() >= self.duration
    }
}

impl Strategy for EndMinutesStrategy {
    fn init(&mut self, _train: &mut dyn Train) -> Result<()> {
        self.started = Some(Instant::now());
        self.reported = false;
        Ok(())
    }

    fn post_iteration(&mut self, train: &mut dyn Train) -> Result<()> {
        if !self.reported && self.expired() {
            self.reported = true;
            info!(
                "time budget of {:?} used up after {} iterations",
                self.duration,
                train.iteration_count()
            );
        }
        Ok(())
    }

    fn should_stop(&self, _train: &dyn Train) -> bool {
        self.expired()
    }
}

/// Stop after a fixed number of iterations.
#[derive(Debug, Clone)]
pub struct EndIterationsStrategy {
    max_iterations: usize,
    reported: bool,
}

impl EndIterationsStrategy {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            reported: false,
        }
    }
}

impl Strategy for EndIterationsStrategy {
    fn init(&mut self, _train: &mut dyn Train) -> Result<()> {
        self.reported = false;
        Ok(())
    }

    fn post_iteration(&mut self, train: &mut dyn Train) -> Result<()> {
        if !self.reported && train.iteration_count() >= self.max_iterations {
            self.reported = true;
            info!("iteration limit {} reached", self.max_iterations);
        }
        Ok(())
    }

    fn should_stop(&self, train: &dyn Train) -> bool {
        train.iteration_count() >= self.max_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, Dataset, NetworkBuilder, Propagation};

    fn data() -> Dataset {
        Dataset::from_rows(&[vec![0.5]], &[vec![0.25]]).unwrap()
    }

    fn network() -> crate::FlatNetwork {
        NetworkBuilder::from_sizes(&[1, 1], &[Activation::Linear])
            .unwrap()
            .build_with_seed(0)
            .unwrap()
    }

    #[test]
    fn zero_budget_stops_immediately() {
        let data = data();
        let mut train = Propagation::resilient(network(), &data).unwrap();
        assert!(!train.is_training_done());
        train
            .add_strategy(Box::new(EndMinutesStrategy::with_duration(Duration::ZERO)))
            .unwrap();
        assert!(train.is_training_done());
    }

    #[test]
    fn long_budget_keeps_going() {
        let data = data();
        let mut train = Propagation::resilient(network(), &data).unwrap();
        train.add_strategy(Box::new(EndMinutesStrategy::new(60))).unwrap();
        train.iteration().unwrap();
        assert!(!train.is_training_done());
    }

    #[test]
    fn not_started_before_init() {
        let s = EndMinutesStrategy::with_duration(Duration::ZERO);
        assert_eq!(s.elapsed(), Duration::ZERO);
        assert!(!s.expired());
    }

    #[test]
    fn iteration_limit() {
        let data = data();
        let mut train = Propagation::resilient(network(), &data).unwrap();
        train.add_strategy(Box::new(EndIterationsStrategy::new(3))).unwrap();
        let mut n = 0;
        while !train.is_training_done() {
            train.iteration().unwrap();
            n += 1;
        }
        assert_eq!(n, 3);
    }
}
