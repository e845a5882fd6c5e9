//! Arithmetic over [`Matrix`] values.
//!
//! Every function returns a fresh matrix; inputs are never modified (except the
//! destination of [`copy`]). Results are subject to the same finiteness invariant
//! as any other matrix: an operation whose result would contain NaN or an
//! infinite value fails with [`Error::InvalidValue`] instead of producing it.

use crate::matmul::gemm_f64;
use crate::matrix::check_finite;
use crate::{Error, Matrix, Result};

/// Elementwise `a + b`.
pub fn add(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    check_same_shape(a, b, "add")?;
    zip_with(a, b, |x, y| x + y)
}

/// Elementwise `a - b`.
pub fn subtract(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    check_same_shape(a, b, "subtract")?;
    zip_with(a, b, |x, y| x - y)
}

/// Matrix product. Requires `a.cols() == b.rows()`; the result is `a.rows() x b.cols()`.
pub fn multiply(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if a.cols() != b.rows() {
        return Err(Error::Dimension(format!(
            "cannot multiply {}x{} by {}x{}: a.cols must equal b.rows",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }

    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    let mut out = vec![0.0; m * n];
    gemm_f64(
        m,
        n,
        k,
        1.0,
        a.data(),
        k,
        1,
        b.data(),
        n,
        1,
        0.0,
        &mut out,
        n,
        1,
    );
    Matrix::from_flat(m, n, out)
}

/// Scale every cell by `scalar`.
pub fn multiply_scalar(a: &Matrix, scalar: f64) -> Result<Matrix> {
    map(a, |x| x * scalar)
}

/// Divide every cell by `scalar`.
///
/// Dividing by zero (or by a value small enough to overflow) yields infinite
/// cells, which a matrix cannot hold: the call then fails with
/// [`Error::InvalidValue`]. `0 / 0` fails the same way.
pub fn divide(a: &Matrix, scalar: f64) -> Result<Matrix> {
    map(a, |x| x / scalar)
}

/// Sum of elementwise products of two vectors of equal length.
///
/// Both operands must be vectors (single row or single column); a row vector may
/// be dotted with a column vector.
pub fn dot_product(a: &Matrix, b: &Matrix) -> Result<f64> {
    if !a.is_vector() || !b.is_vector() {
        return Err(Error::Dimension(
            "dot product requires both matrices to be vectors".to_owned(),
        ));
    }
    if a.size() != b.size() {
        return Err(Error::Dimension(format!(
            "dot product requires vectors of equal length, got {} and {}",
            a.size(),
            b.size()
        )));
    }

    Ok(a
        .data()
        .iter()
        .zip(b.data())
        .fold(0.0, |acc, (&x, &y)| x.mul_add(y, acc)))
}

/// `n x n` identity matrix.
pub fn identity(n: usize) -> Result<Matrix> {
    if n == 0 {
        return Err(Error::Dimension(
            "identity matrix size must be > 0".to_owned(),
        ));
    }
    let mut data = vec![0.0; n * n];
    for i in 0..n {
        data[i * n + i] = 1.0;
    }
    Ok(Matrix::from_raw(n, n, data))
}

/// New matrix with `result[c][r] = a[r][c]`.
pub fn transpose(a: &Matrix) -> Matrix {
    let (rows, cols) = (a.rows(), a.cols());
    let mut data = Vec::with_capacity(rows * cols);
    for c in 0..cols {
        for r in 0..rows {
            data.push(a.at(r, c));
        }
    }
    Matrix::from_raw(cols, rows, data)
}

/// Copy of `a` without row `row`.
pub fn delete_row(a: &Matrix, row: usize) -> Result<Matrix> {
    if row >= a.rows() {
        return Err(Error::Index(format!(
            "can't delete row {row} from a matrix with {} rows",
            a.rows()
        )));
    }
    if a.rows() == 1 {
        return Err(Error::Dimension(
            "can't delete the only row of a matrix".to_owned(),
        ));
    }
    let cols = a.cols();
    let data = a
        .data()
        .chunks(cols)
        .enumerate()
        .filter(|&(r, _)| r != row)
        .flat_map(|(_, values)| values.iter().copied())
        .collect();
    Ok(Matrix::from_raw(a.rows() - 1, cols, data))
}

/// Copy of `a` without column `col`.
pub fn delete_col(a: &Matrix, col: usize) -> Result<Matrix> {
    if col >= a.cols() {
        return Err(Error::Index(format!(
            "can't delete column {col} from a matrix with {} columns",
            a.cols()
        )));
    }
    if a.cols() == 1 {
        return Err(Error::Dimension(
            "can't delete the only column of a matrix".to_owned(),
        ));
    }
    let data = a
        .data()
        .chunks(a.cols())
        .flat_map(|values| {
            values
                .iter()
                .enumerate()
                .filter(move |&(c, _)| c != col)
                .map(|(_, &v)| v)
        })
        .collect();
    Ok(Matrix::from_raw(a.rows(), a.cols() - 1, data))
}

/// Overwrite `dst` with the cells of `src`. Shapes must match.
pub fn copy(src: &Matrix, dst: &mut Matrix) -> Result<()> {
    check_same_shape(src, dst, "copy")?;
    dst.data_mut().copy_from_slice(src.data());
    Ok(())
}

/// Euclidean length of a vector matrix.
pub fn vector_length(a: &Matrix) -> Result<f64> {
    if !a.is_vector() {
        return Err(Error::Dimension(
            "vector length requires a single row or column".to_owned(),
        ));
    }
    Ok(a.data().iter().map(|v| v * v).sum::<f64>().sqrt())
}

fn check_same_shape(a: &Matrix, b: &Matrix, op: &str) -> Result<()> {
    if a.rows() != b.rows() || a.cols() != b.cols() {
        return Err(Error::Dimension(format!(
            "{op} requires equal shapes, got {}x{} and {}x{}",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }
    Ok(())
}

fn map(a: &Matrix, f: impl Fn(f64) -> f64) -> Result<Matrix> {
    let mut data = Vec::with_capacity(a.size());
    for &x in a.data() {
        let v = f(x);
        check_finite(v)?;
        data.push(v);
    }
    Ok(Matrix::from_raw(a.rows(), a.cols(), data))
}

fn zip_with(a: &Matrix, b: &Matrix, f: impl Fn(f64, f64) -> f64) -> Result<Matrix> {
    let mut data = Vec::with_capacity(a.size());
    for (&x, &y) in a.data().iter().zip(b.data()) {
        let v = f(x, y);
        check_finite(v)?;
        data.push(v);
    }
    Ok(Matrix::from_raw(a.rows(), a.cols(), data))
}
