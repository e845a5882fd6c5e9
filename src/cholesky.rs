//! Cholesky decomposition.
//!
//! Factors a symmetric positive-definite matrix `A` into `L * L^T` with `L`
//! lower triangular. The factorisation always runs to completion: when `A` turns
//! out not to be SPD, `is_spd()` reports `false` and `L` holds a best-effort
//! partial factor, but [`CholeskyDecomposition::solve`] refuses to use it.

use crate::{Error, Matrix, Result};

#[derive(Debug, Clone)]
pub struct CholeskyDecomposition {
    n: usize,
    /// Row-major `n x n`, zero above the diagonal.
    l: Vec<f64>,
    spd: bool,
}

impl CholeskyDecomposition {
    /// Factor `a`. `n` is taken from the row count; non-square input is never SPD.
    pub fn new(a: &Matrix) -> Self {
        let n = a.rows();
        let cols = a.cols();
        let at = |r: usize, c: usize| if c < cols { a.at(r, c) } else { 0.0 };

        let mut l = vec![0.0; n * n];
        let mut spd = cols == n;

        for j in 0..n {
            let mut d = 0.0;
            for k in 0..j {
                let mut s = 0.0;
                for i in 0..k {
                    s += l[k * n + i] * l[j * n + i];
                }
                s = (at(j, k) - s) / l[k * n + k];
                l[j * n + k] = s;
                d += s * s;
                spd &= at(k, j) == at(j, k);
            }
            d = at(j, j) - d;
            spd &= d > 0.0;
            l[j * n + j] = d.max(0.0).sqrt();
        }

        Self { n, l, spd }
    }

    /// True when the input was symmetric and positive definite.
    #[inline]
    pub fn is_spd(&self) -> bool {
        self.spd
    }

    /// The lower-triangular factor.
    ///
    /// Fails with [`Error::InvalidValue`] when a non-SPD input left non-finite
    /// entries in the partial factor.
    pub fn l(&self) -> Result<Matrix> {
        Matrix::from_flat(self.n, self.n, self.l.clone())
    }

    /// Solve `A * X = B` by forward substitution (`L * Y = B`) then back
    /// substitution (`L^T * X = Y`).
    pub fn solve(&self, b: &Matrix) -> Result<Matrix> {
        if b.rows() != self.n {
            return Err(Error::Dimension(format!(
                "right-hand side has {} rows, decomposition is {}x{}",
                b.rows(),
                self.n,
                self.n
            )));
        }
        if !self.spd {
            return Err(Error::NotPositiveDefinite);
        }

        let n = self.n;
        let nx = b.cols();
        let l = &self.l;
        let mut x = b.data().to_vec();

        for k in 0..n {
            for j in 0..nx {
                for i in 0..k {
                    x[k * nx + j] -= x[i * nx + j] * l[k * n + i];
                }
                x[k * nx + j] /= l[k * n + k];
            }
        }

        for k in (0..n).rev() {
            for j in 0..nx {
                for i in k + 1..n {
                    x[k * nx + j] -= x[i * nx + j] * l[i * n + k];
                }
                x[k * nx + j] /= l[k * n + k];
            }
        }

        Matrix::from_flat(n, nx, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix_math;

    fn spd() -> Matrix {
        Matrix::from_rows(&[
            vec![4.0, 12.0, -16.0],
            vec![12.0, 37.0, -43.0],
            vec![-16.0, -43.0, 98.0],
        ])
        .unwrap()
    }

    #[test]
    fn factor_matches_known_result() {
        let chol = CholeskyDecomposition::new(&spd());
        assert!(chol.is_spd());
        let expected = Matrix::from_rows(&[
            vec![2.0, 0.0, 0.0],
            vec![6.0, 1.0, 0.0],
            vec![-8.0, 5.0, 3.0],
        ])
        .unwrap();
        assert!(chol.l().unwrap().equals(&expected));
    }

    #[test]
    fn factor_reconstructs_input() {
        let a = spd();
        let l = CholeskyDecomposition::new(&a).l().unwrap();
        let llt = matrix_math::multiply(&l, &matrix_math::transpose(&l)).unwrap();
        assert!(llt.equals_with_precision(&a, 8).unwrap());
    }

    #[test]
    fn solve_recovers_x() {
        let a = spd();
        let x = Matrix::from_rows(&[vec![1.0, 0.5], vec![-2.0, 1.0], vec![3.0, 0.0]]).unwrap();
        let b = matrix_math::multiply(&a, &x).unwrap();

        let solved = CholeskyDecomposition::new(&a).solve(&b).unwrap();
        assert!(solved.equals_with_precision(&x, 8).unwrap());
    }

    #[test]
    fn solve_checks_rows() {
        let chol = CholeskyDecomposition::new(&spd());
        let b = Matrix::new(2, 1).unwrap();
        assert!(matches!(chol.solve(&b), Err(Error::Dimension(_))));
    }

    #[test]
    fn non_symmetric_input_is_not_spd() {
        let a = Matrix::from_rows(&[vec![4.0, 1.0], vec![2.0, 3.0]]).unwrap();
        let chol = CholeskyDecomposition::new(&a);
        assert!(!chol.is_spd());

        let b = Matrix::new(2, 1).unwrap();
        assert!(matches!(chol.solve(&b), Err(Error::NotPositiveDefinite)));
    }

    #[test]
    fn indefinite_input_still_completes() {
        let a = Matrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 1.0]]).unwrap();
        let chol = CholeskyDecomposition::new(&a);
        assert!(!chol.is_spd());
        // The diagonal term is clamped to zero rather than going NaN.
        assert_eq!(chol.l().unwrap().get(1, 1).unwrap(), 0.0);
    }

    #[test]
    fn non_square_input_is_not_spd() {
        let a = Matrix::new(2, 3).unwrap();
        assert!(!CholeskyDecomposition::new(&a).is_spd());
    }
}
