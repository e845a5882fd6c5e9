//! Aggregate training error.
//!
//! [`ErrorCalculation`] accumulates squared differences between actual and
//! ideal outputs sample by sample and reports them as MSE or RMS. Partial
//! accumulators (one per gradient worker) are combined with
//! [`ErrorCalculation::merge`].
//!
//! Non-finite outputs are not filtered: a diverged network reports a NaN or
//! infinite error.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Mean of squared differences over every output value.
    #[default]
    Mse,
    /// Square root of [`ErrorMode::Mse`].
    Rms,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorCalculation {
    global_error: f64,
    set_size: usize,
}

impl ErrorCalculation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample. Shape contract: `actual.len() == ideal.len()`.
    #[inline]
    pub fn update(&mut self, actual: &[f64], ideal: &[f64]) {
        assert_eq!(
            actual.len(),
            ideal.len(),
            "actual len {} does not match ideal len {}",
            actual.len(),
            ideal.len()
        );
        for (&a, &i) in actual.iter().zip(ideal) {
            self.update_value(i - a);
        }
    }

    /// Add a single output difference (`ideal - actual`).
    #[inline]
    pub fn update_value(&mut self, delta: f64) {
        self.global_error = delta.mul_add(delta, self.global_error);
        self.set_size += 1;
    }

    pub fn merge(&mut self, other: &ErrorCalculation) {
        self.global_error += other.global_error;
        self.set_size += other.set_size;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Aggregate error; zero when nothing was accumulated.
    pub fn calculate(&self, mode: ErrorMode) -> f64 {
        if self.set_size == 0 {
            return 0.0;
        }
        let mse = self.global_error / self.set_size as f64;
        match mode {
            ErrorMode::Mse => mse,
            ErrorMode::Rms => mse.sqrt(),
        }
    }
}
