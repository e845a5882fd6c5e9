//! Training data.
//!
//! Training only needs indexed access to `(input, ideal)` pairs of known
//! width, expressed by [`TrainingData`]. Anything that can hand out slices can
//! back it; [`Dataset`] is the in-memory implementation, stored contiguously in
//! row-major layout.

use crate::{Error, Result};

/// Indexed `(input, ideal)` pairs with fixed widths.
pub trait TrainingData {
    /// Number of samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn input_dim(&self) -> usize;

    fn ideal_dim(&self) -> usize;

    /// The `idx`-th input row. Panics if `idx >= len()`.
    fn input(&self, idx: usize) -> &[f64];

    /// The `idx`-th ideal row. Panics if `idx >= len()`.
    fn ideal(&self, idx: usize) -> &[f64];
}

/// Iterator over the pairs of a [`TrainingData`].
#[derive(Debug)]
pub struct Pairs<'a, D: TrainingData + ?Sized> {
    data: &'a D,
    idx: usize,
}

/// Iterate `(input, ideal)` pairs in order.
pub fn pairs<D: TrainingData + ?Sized>(data: &D) -> Pairs<'_, D> {
    Pairs { data, idx: 0 }
}

impl<'a, D: TrainingData + ?Sized> Iterator for Pairs<'a, D> {
    type Item = (&'a [f64], &'a [f64]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.data.len() {
            return None;
        }
        let idx = self.idx;
        self.idx += 1;
        Some((self.data.input(idx), self.data.ideal(idx)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.data.len().saturating_sub(self.idx);
        (left, Some(left))
    }
}

impl<D: TrainingData + ?Sized> ExactSizeIterator for Pairs<'_, D> {}

/// A supervised dataset held in memory.
///
/// - `inputs.len() == len * input_dim`
/// - `ideals.len() == len * ideal_dim`
#[derive(Debug, Clone)]
pub struct Dataset {
    inputs: Vec<f64>,
    ideals: Vec<f64>,
    len: usize,
    input_dim: usize,
    ideal_dim: usize,
}

impl Dataset {
    /// Build a dataset from flat buffers.
    ///
    /// `inputs` is `(len, input_dim)` and `ideals` is `(len, ideal_dim)`.
    pub fn from_flat(
        inputs: Vec<f64>,
        ideals: Vec<f64>,
        input_dim: usize,
        ideal_dim: usize,
    ) -> Result<Self> {
        if input_dim == 0 || ideal_dim == 0 {
            return Err(Error::InvalidData(format!(
                "input_dim and ideal_dim must be > 0, got {input_dim} and {ideal_dim}"
            )));
        }
        if !inputs.len().is_multiple_of(input_dim) {
            return Err(Error::InvalidData(format!(
                "inputs length {} is not divisible by input_dim {input_dim}",
                inputs.len()
            )));
        }

        let len = inputs.len() / input_dim;
        if ideals.len() != len * ideal_dim {
            return Err(Error::InvalidData(format!(
                "ideals length {} does not match len * ideal_dim ({len} * {ideal_dim})",
                ideals.len()
            )));
        }

        Ok(Self {
            inputs,
            ideals,
            len,
            input_dim,
            ideal_dim,
        })
    }

    /// Build a dataset from per-sample rows.
    ///
    /// This is a convenience constructor (it copies into contiguous storage).
    pub fn from_rows(inputs: &[Vec<f64>], ideals: &[Vec<f64>]) -> Result<Self> {
        if inputs.len() != ideals.len() {
            return Err(Error::InvalidData(format!(
                "inputs/ideals length mismatch: {} vs {}",
                inputs.len(),
                ideals.len()
            )));
        }
        if inputs.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let input_dim = inputs[0].len();
        let ideal_dim = ideals[0].len();
        let inputs = flatten(inputs, input_dim, "input")?;
        let ideals = flatten(ideals, ideal_dim, "ideal")?;
        Self::from_flat(inputs, ideals, input_dim, ideal_dim)
    }
}

impl TrainingData for Dataset {
    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    fn ideal_dim(&self) -> usize {
        self.ideal_dim
    }

    #[inline]
    fn input(&self, idx: usize) -> &[f64] {
        let start = idx * self.input_dim;
        &self.inputs[start..start + self.input_dim]
    }

    #[inline]
    fn ideal(&self, idx: usize) -> &[f64] {
        let start = idx * self.ideal_dim;
        &self.ideals[start..start + self.ideal_dim]
    }
}

fn flatten(rows: &[Vec<f64>], dim: usize, what: &str) -> Result<Vec<f64>> {
    let mut flat = Vec::with_capacity(rows.len() * dim);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != dim {
            return Err(Error::InvalidData(format!(
                "{what} row {i} has len {}, expected {dim}",
                row.len()
            )));
        }
        flat.extend_from_slice(row);
    }
    Ok(flat)
}
