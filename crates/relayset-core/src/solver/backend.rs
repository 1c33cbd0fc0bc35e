use crate::{RelayError, RelayResult};
use num_complex::Complex64;

const PIVOT_EPS: f64 = 1e-12;

/// Trait for solving dense complex linear systems (Yx = b).
///
/// Used for admittance-matrix solves in the fault solver, where the
/// Thevenin impedance at a bus is the matching diagonal entry of `Y⁻¹`.
pub trait LinearSystemBackend: Send + Sync {
    /// Solve the linear system Ax = b
    fn solve(&self, matrix: &[Vec<Complex64>], rhs: &[Complex64]) -> RelayResult<Vec<Complex64>>;

    /// Solve for several right-hand sides sharing one matrix.
    fn solve_many(
        &self,
        matrix: &[Vec<Complex64>],
        rhs_columns: &[Vec<Complex64>],
    ) -> RelayResult<Vec<Vec<Complex64>>> {
        rhs_columns
            .iter()
            .map(|rhs| self.solve(matrix, rhs))
            .collect()
    }

    /// Diagonal of the inverse matrix.
    fn inverse_diagonal(&self, matrix: &[Vec<Complex64>]) -> RelayResult<Vec<Complex64>> {
        let n = matrix.len();
        let units: Vec<Vec<Complex64>> = (0..n).map(|k| unit_vector(n, k)).collect();
        let columns = self.solve_many(matrix, &units)?;
        Ok(columns
            .iter()
            .enumerate()
            .map(|(k, col)| col[k])
            .collect())
    }
}

fn unit_vector(n: usize, k: usize) -> Vec<Complex64> {
    let mut v = vec![Complex64::new(0.0, 0.0); n];
    v[k] = Complex64::new(1.0, 0.0);
    v
}

fn check_square(matrix: &[Vec<Complex64>]) -> RelayResult<usize> {
    let n = matrix.len();
    if matrix.iter().any(|row| row.len() != n) {
        return Err(RelayError::SolverFailure("matrix must be square".into()));
    }
    Ok(n)
}

/// LU factors with row permutation, `P·A = L·U`.
#[derive(Debug, Clone)]
struct LuFactors {
    lu: Vec<Vec<Complex64>>,
    perm: Vec<usize>,
}

impl LuFactors {
    fn factor(matrix: &[Vec<Complex64>]) -> RelayResult<Self> {
        let n = check_square(matrix)?;
        let mut lu = matrix.to_vec();
        let mut perm: Vec<usize> = (0..n).collect();

        for i in 0..n {
            let mut pivot = i;
            for row in i + 1..n {
                if lu[row][i].norm() > lu[pivot][i].norm() {
                    pivot = row;
                }
            }
            if pivot != i {
                lu.swap(i, pivot);
                perm.swap(i, pivot);
            }

            let diag = lu[i][i];
            if diag.norm() < PIVOT_EPS {
                return Err(RelayError::SolverFailure(format!(
                    "singular matrix (pivot {i})"
                )));
            }

            let pivot_row = lu[i][i + 1..].to_vec();
            for row in lu.iter_mut().skip(i + 1) {
                let factor = row[i] / diag;
                row[i] = factor;
                for (target, &p) in row[i + 1..].iter_mut().zip(pivot_row.iter()) {
                    *target -= factor * p;
                }
            }
        }

        Ok(Self { lu, perm })
    }

    fn solve(&self, rhs: &[Complex64]) -> RelayResult<Vec<Complex64>> {
        let n = self.lu.len();
        if rhs.len() != n {
            return Err(RelayError::SolverFailure(format!(
                "rhs length ({}) does not match matrix dimension {}",
                rhs.len(),
                n
            )));
        }

        let mut x: Vec<Complex64> = self.perm.iter().map(|&p| rhs[p]).collect();
        for i in 0..n {
            for j in 0..i {
                let delta = self.lu[i][j] * x[j];
                x[i] -= delta;
            }
        }
        for i in (0..n).rev() {
            for j in i + 1..n {
                let delta = self.lu[i][j] * x[j];
                x[i] -= delta;
            }
            let diag = self.lu[i][i];
            x[i] /= diag;
        }
        Ok(x)
    }
}

/// Gaussian elimination with partial pivoting on complex entries.
#[derive(Debug, Clone, Default)]
pub struct GaussSolver;

impl LinearSystemBackend for GaussSolver {
    fn solve(&self, matrix: &[Vec<Complex64>], rhs: &[Complex64]) -> RelayResult<Vec<Complex64>> {
        if matrix.is_empty() {
            return Ok(Vec::new());
        }
        LuFactors::factor(matrix)?.solve(rhs)
    }

    fn solve_many(
        &self,
        matrix: &[Vec<Complex64>],
        rhs_columns: &[Vec<Complex64>],
    ) -> RelayResult<Vec<Vec<Complex64>>> {
        if matrix.is_empty() {
            return Ok(rhs_columns.iter().map(|_| Vec::new()).collect());
        }
        let factors = LuFactors::factor(matrix)?;
        rhs_columns.iter().map(|rhs| factors.solve(rhs)).collect()
    }
}
