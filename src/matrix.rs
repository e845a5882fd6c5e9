//! Dense matrix of `f64`.
//!
//! Values are stored contiguously in row-major layout, the same way layer weights
//! are stored in [`crate::FlatNetwork`]. The shape is fixed at construction; cells
//! may be mutated but can never hold NaN or an infinite value.
//!
//! Arithmetic between matrices lives in [`crate::matrix_math`].

use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Decimal places used by [`Matrix::equals`].
pub const DEFAULT_PRECISION: i32 = 10;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    /// Row-major, `rows * cols` values.
    data: Vec<f64>,
}

impl Matrix {
    /// Zero-filled `rows x cols` matrix.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::Dimension(format!(
                "matrix dims must be > 0, got {rows}x{cols}"
            )));
        }
        Ok(Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        })
    }

    /// Deep-copy a rectangular 2D input.
    pub fn from_rows(values: &[Vec<f64>]) -> Result<Self> {
        let rows = values.len();
        let cols = values.first().map(|r| r.len()).unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(Error::Dimension(
                "matrix must have at least one row and one column".to_owned(),
            ));
        }

        let mut data = Vec::with_capacity(rows * cols);
        for (r, row) in values.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::Dimension(format!(
                    "row {r} has len {}, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }

        Self::from_flat(rows, cols, data)
    }

    /// Build from a 2D boolean grid: `true` becomes 1, `false` becomes -1.
    pub fn from_bools(values: &[Vec<bool>]) -> Result<Self> {
        let rows: Vec<Vec<f64>> = values
            .iter()
            .map(|row| row.iter().map(|&b| if b { 1.0 } else { -1.0 }).collect())
            .collect();
        Self::from_rows(&rows)
    }

    /// Build from a row-major flat buffer of length `rows * cols`.
    pub fn from_flat(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::Dimension(format!(
                "matrix dims must be > 0, got {rows}x{cols}"
            )));
        }
        if data.len() != rows * cols {
            return Err(Error::Dimension(format!(
                "buffer length {} does not match {rows}x{cols}",
                data.len()
            )));
        }
        if let Some(v) = data.iter().find(|v| !v.is_finite()) {
            return Err(Error::InvalidValue(format!(
                "matrix cells must be finite, got {v}"
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// A `1 x n` matrix.
    pub fn row_vector(values: &[f64]) -> Result<Self> {
        Self::from_flat(1, values.len(), values.to_vec())
    }

    /// An `n x 1` matrix.
    pub fn column_vector(values: &[f64]) -> Result<Self> {
        Self::from_flat(values.len(), 1, values.to_vec())
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of cells (`rows * cols`).
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Row-major view of all cells.
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Copy of the cells as one `Vec` per row.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.data.chunks(self.cols).map(|r| r.to_vec()).collect()
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_index(row, col)?;
        Ok(self.data[row * self.cols + col])
    }

    /// Assign a cell. NaN and infinite values are rejected and leave the cell untouched.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        check_finite(value)?;
        self.data[row * self.cols + col] = value;
        Ok(())
    }

    /// Add `value` to a cell.
    pub fn add_to(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let current = self.get(row, col)?;
        self.set(row, col, current + value)
    }

    /// The given row as a `1 x cols` matrix.
    pub fn row(&self, row: usize) -> Result<Matrix> {
        if row >= self.rows {
            return Err(Error::Index(format!(
                "row {row} does not exist in a {}x{} matrix",
                self.rows, self.cols
            )));
        }
        let start = row * self.cols;
        Ok(Matrix::from_raw(
            1,
            self.cols,
            self.data[start..start + self.cols].to_vec(),
        ))
    }

    /// The given column as a `rows x 1` matrix.
    pub fn col(&self, col: usize) -> Result<Matrix> {
        if col >= self.cols {
            return Err(Error::Index(format!(
                "column {col} does not exist in a {}x{} matrix",
                self.rows, self.cols
            )));
        }
        let data = (0..self.rows).map(|r| self.at(r, col)).collect();
        Ok(Matrix::from_raw(self.rows, 1, data))
    }

    /// Set every cell to zero.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Set every cell to `value`.
    pub fn fill(&mut self, value: f64) -> Result<()> {
        check_finite(value)?;
        self.data.fill(value);
        Ok(())
    }

    /// Add `other` cell by cell into this matrix.
    ///
    /// Fails without modifying `self` on a shape mismatch or when a sum
    /// overflows to infinity.
    pub fn add_matrix(&mut self, other: &Matrix) -> Result<()> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(Error::Dimension(format!(
                "cannot add a {}x{} matrix into a {}x{} matrix",
                other.rows, other.cols, self.rows, self.cols
            )));
        }
        for (a, b) in self.data.iter().zip(&other.data) {
            check_finite(a + b)?;
        }
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
        Ok(())
    }

    /// True when the matrix has a single row or a single column.
    #[inline]
    pub fn is_vector(&self) -> bool {
        self.rows == 1 || self.cols == 1
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&v| v == 0.0)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Fill with uniform random values in `[min, max)`.
    pub fn randomize<R: Rng + ?Sized>(&mut self, min: f64, max: f64, rng: &mut R) -> Result<()> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(Error::InvalidArgument(format!(
                "randomize range must be finite with min < max, got [{min}, {max})"
            )));
        }
        for v in &mut self.data {
            *v = rng.gen_range(min..max);
        }
        Ok(())
    }

    /// Row-major copy of the cells.
    pub fn to_packed_array(&self) -> Vec<f64> {
        self.data.clone()
    }

    /// Overwrite all cells from `array[index..]`, row by row.
    ///
    /// Returns the index just past the last value consumed. On error the matrix
    /// is left unchanged.
    pub fn load_packed_array(&mut self, array: &[f64], index: usize) -> Result<usize> {
        let end = index
            .checked_add(self.data.len())
            .filter(|&end| end <= array.len())
            .ok_or_else(|| {
                Error::Index(format!(
                    "packed array of len {} cannot supply {} values from index {index}",
                    array.len(),
                    self.data.len()
                ))
            })?;
        let src = &array[index..end];
        if let Some(v) = src.iter().find(|v| !v.is_finite()) {
            return Err(Error::InvalidValue(format!(
                "matrix cells must be finite, got {v}"
            )));
        }
        self.data.copy_from_slice(src);
        Ok(end)
    }

    /// Compare with [`DEFAULT_PRECISION`] decimal places.
    pub fn equals(&self, other: &Matrix) -> bool {
        // DEFAULT_PRECISION is always a supported precision.
        self.equals_with_precision(other, DEFAULT_PRECISION)
            .unwrap_or(false)
    }

    /// Compare cell by cell after truncating both values to `places` decimals.
    ///
    /// Matrices of different shape are never equal.
    pub fn equals_with_precision(&self, other: &Matrix, places: i32) -> Result<bool> {
        if places < 0 {
            return Err(Error::InvalidArgument(format!(
                "precision can't be negative, got {places}"
            )));
        }
        let scale = 10f64.powi(places);
        if !scale.is_finite() || scale > i64::MAX as f64 {
            return Err(Error::InvalidArgument(format!(
                "precision of {places} decimal places is not supported"
            )));
        }
        if self.rows != other.rows || self.cols != other.cols {
            return Ok(false);
        }

        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .all(|(&a, &b)| (a * scale).trunc() == (b * scale).trunc()))
    }

    #[inline]
    pub(crate) fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Build without validation; callers guarantee shape and finiteness.
    #[inline]
    pub(crate) fn from_raw(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert!(rows > 0 && cols > 0);
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(Error::Index(format!(
                "({row}, {col}) is outside a {}x{} matrix",
                self.rows, self.cols
            )));
        }
        Ok(())
    }
}

#[inline]
pub(crate) fn check_finite(value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::InvalidValue(format!(
            "trying to assign {value} to a matrix cell"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn new_rejects_empty_shapes() {
        assert!(matches!(Matrix::new(0, 3), Err(Error::Dimension(_))));
        assert!(matches!(Matrix::new(3, 0), Err(Error::Dimension(_))));
        let m = Matrix::new(2, 3).unwrap();
        assert_eq!((m.rows(), m.cols(), m.size()), (2, 3, 6));
        assert!(m.is_zero());
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, Error::Dimension(_)));
    }

    #[test]
    fn set_validates_index_and_value() {
        let mut m = Matrix::new(2, 2).unwrap();
        assert!(matches!(m.set(2, 0, 1.0), Err(Error::Index(_))));
        assert!(matches!(m.get(0, 2), Err(Error::Index(_))));
        assert!(matches!(m.set(0, 0, f64::NAN), Err(Error::InvalidValue(_))));
        assert!(matches!(
            m.set(0, 0, f64::INFINITY),
            Err(Error::InvalidValue(_))
        ));
        m.set(1, 0, 3.5).unwrap();
        m.add_to(1, 0, 1.0).unwrap();
        assert_eq!(m.get(1, 0).unwrap(), 4.5);
    }

    #[test]
    fn bools_map_to_bipolar_values() {
        let m = Matrix::from_bools(&[vec![true, false]]).unwrap();
        assert_eq!(m.data(), &[1.0, -1.0]);
    }

    #[test]
    fn row_and_col_extraction() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.row(1).unwrap().data(), &[3.0, 4.0]);
        let c = m.col(1).unwrap();
        assert_eq!((c.rows(), c.cols()), (2, 1));
        assert_eq!(c.data(), &[2.0, 4.0]);
        assert!(matches!(m.row(2), Err(Error::Index(_))));
        assert!(matches!(m.col(2), Err(Error::Index(_))));
    }

    #[test]
    fn packed_array_round_trip_reports_next_index() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let mut packed = vec![9.0];
        packed.extend(m.to_packed_array());

        let mut other = Matrix::new(2, 2).unwrap();
        let next = other.load_packed_array(&packed, 1).unwrap();
        assert_eq!(next, 5);
        assert_eq!(other, m);

        assert!(matches!(
            other.load_packed_array(&packed, 2),
            Err(Error::Index(_))
        ));
    }

    #[test]
    fn precision_equality_truncates() {
        let a = Matrix::row_vector(&[1.123_45, 2.0]).unwrap();
        let b = Matrix::row_vector(&[1.123_49, 2.0]).unwrap();
        assert!(a.equals_with_precision(&b, 4).unwrap());
        assert!(!a.equals_with_precision(&b, 5).unwrap());
        assert!(!a.equals(&b));
        assert!(matches!(
            a.equals_with_precision(&b, -1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            a.equals_with_precision(&b, 40),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn precision_equality_distinguishes_large_values() {
        let a = Matrix::row_vector(&[1e9]).unwrap();
        let b = Matrix::row_vector(&[2e9]).unwrap();
        assert!(!a.equals(&b));
        assert!(a.equals(&a.clone()));

        let c = Matrix::row_vector(&[-5e12, 3.0]).unwrap();
        let d = Matrix::row_vector(&[-7e15, 3.0]).unwrap();
        assert!(!c.equals(&d));
        assert!(!c.equals_with_precision(&d, 0).unwrap());
    }

    #[test]
    fn fill_and_add_matrix_in_place() {
        let mut m = Matrix::new(2, 2).unwrap();
        m.fill(1.5).unwrap();
        assert_eq!(m.data(), &[1.5; 4]);
        assert!(matches!(m.fill(f64::NAN), Err(Error::InvalidValue(_))));

        let other = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        m.add_matrix(&other).unwrap();
        assert_eq!(m.data(), &[2.5, 3.5, 4.5, 5.5]);

        let wide = Matrix::new(2, 3).unwrap();
        assert!(matches!(m.add_matrix(&wide), Err(Error::Dimension(_))));

        let huge = Matrix::row_vector(&[f64::MAX, 1.0]).unwrap();
        let mut big = huge.clone();
        assert!(matches!(big.add_matrix(&huge), Err(Error::InvalidValue(_))));
        assert_eq!(big, huge);
    }

    #[test]
    fn clone_is_deep() {
        let a = Matrix::row_vector(&[1.0, 2.0]).unwrap();
        let mut b = a.clone();
        b.set(0, 0, 5.0).unwrap();
        assert_eq!(a.get(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn randomize_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut m = Matrix::new(4, 4).unwrap();
        m.randomize(-0.5, 0.5, &mut rng).unwrap();
        assert!(m.data().iter().all(|v| (-0.5..0.5).contains(v)));
        assert!(m.randomize(1.0, 1.0, &mut rng).is_err());
    }
}

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn json_keeps_shape() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.5]]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let back: Matrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
        assert_eq!((back.rows(), back.cols()), (2, 2));
    }
}
