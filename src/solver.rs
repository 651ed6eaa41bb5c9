use std::time::Instant;

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::error::{Result, SimError};

/// Solver configuration
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub method: SolverMethod,
    /// A pivot below `pivot_tolerance` times the largest entry of its column
    /// in A marks the system singular
    pub pivot_tolerance: f64,
    /// Residual norm under which a solve is reported as successful
    pub residual_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            method: SolverMethod::Lu,
            pivot_tolerance: 1e-12,
            residual_tolerance: 1e-9,
        }
    }
}

/// Available solver methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverMethod {
    /// Direct LU decomposition with partial pivoting
    Lu,
    /// QR decomposition
    Qr,
}

/// Solver statistics
#[derive(Debug, Clone)]
pub struct SolverStats {
    pub method_used: SolverMethod,
    pub residual_norm: f64,
    pub solve_time: f64,
    pub success: bool,
}

/// Dense linear system solver
#[derive(Debug, Clone, Default)]
pub struct LinearSolver {
    config: SolverConfig,
}

impl LinearSolver {
    /// Create a new solver with default configuration
    pub fn new() -> Self {
        LinearSolver {
            config: SolverConfig::default(),
        }
    }

    /// Create a new solver with custom configuration
    pub fn with_config(config: SolverConfig) -> Self {
        LinearSolver { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve the linear system Ax = b.
    ///
    /// Fails with a singular-system error instead of returning a solution
    /// polluted by a near-zero pivot.
    pub fn solve_dense(
        &self,
        matrix: &DMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolverStats)> {
        let start_time = Instant::now();

        if matrix.nrows() != matrix.ncols() || matrix.nrows() != rhs.len() {
            return Err(SimError::DimensionMismatch {
                rows: matrix.nrows(),
                cols: matrix.ncols(),
                rhs: rhs.len(),
            });
        }

        let solution = if matrix.nrows() == 0 {
            DVector::zeros(0)
        } else {
            match self.config.method {
                SolverMethod::Lu => self.solve_lu_dense(matrix, rhs)?,
                SolverMethod::Qr => self.solve_qr_dense(matrix, rhs)?,
            }
        };

        if let Some(row) = solution.iter().position(|x| !x.is_finite()) {
            return Err(SimError::degenerate_pivot(row));
        }

        let residual_norm = (matrix * &solution - rhs).norm();
        let stats = SolverStats {
            method_used: self.config.method,
            residual_norm,
            solve_time: start_time.elapsed().as_secs_f64(),
            success: residual_norm < self.config.residual_tolerance,
        };

        debug!(
            "{:?} solve of {}x{} system: residual {:.2e} in {:.3}ms",
            stats.method_used,
            matrix.nrows(),
            matrix.ncols(),
            stats.residual_norm,
            stats.solve_time * 1000.0
        );

        Ok((solution, stats))
    }

    /// LU decomposition solve for dense matrices
    fn solve_lu_dense(&self, matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        let lu = matrix.clone().lu();
        self.check_pivots(matrix, lu.u().diagonal().iter())?;

        lu.solve(rhs)
            .ok_or_else(|| SimError::degenerate_pivot(matrix.nrows() - 1))
    }

    /// QR decomposition solve for dense matrices
    fn solve_qr_dense(&self, matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        let qr = matrix.clone().qr();
        self.check_pivots(matrix, qr.r().diagonal().iter())?;

        qr.solve(rhs)
            .ok_or_else(|| SimError::degenerate_pivot(matrix.nrows() - 1))
    }

    /// Reject the factorization if any pivot is negligible against its column.
    ///
    /// Scaling a column of A scales the matching column of U (or R) by the
    /// same factor.
    fn check_pivots<'a>(
        &self,
        matrix: &DMatrix<f64>,
        pivots: impl Iterator<Item = &'a f64>,
    ) -> Result<()> {
        for (col, pivot) in pivots.enumerate() {
            let threshold = self.config.pivot_tolerance * matrix.column(col).amax();
            if pivot.abs() <= threshold {
                return Err(SimError::degenerate_pivot(col));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Singularity;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_dense_lu_solver() {
        let solver = LinearSolver::new();

        // Create a simple 2x2 system: [2 1; 1 2] * [x; y] = [3; 3]
        // Solution should be [1; 1]
        let matrix = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        let rhs = DVector::from_vec(vec![3.0, 3.0]);

        let (solution, stats) = solver.solve_dense(&matrix, &rhs).unwrap();

        assert_abs_diff_eq!(solution[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(solution[1], 1.0, epsilon = 1e-10);
        assert!(stats.success);
        assert_eq!(stats.method_used, SolverMethod::Lu);
    }

    #[test]
    fn test_dense_qr_solver() {
        let solver = LinearSolver::with_config(SolverConfig {
            method: SolverMethod::Qr,
            ..SolverConfig::default()
        });

        // Zero diagonal entry, needs pivoting or orthogonalisation
        let matrix = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let rhs = DVector::from_vec(vec![2.0, 3.0]);

        let (solution, stats) = solver.solve_dense(&matrix, &rhs).unwrap();
        assert_abs_diff_eq!(solution[0], 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(solution[1], 2.0, epsilon = 1e-10);
        assert_eq!(stats.method_used, SolverMethod::Qr);
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        // Floating node pair: rows sum to zero
        let matrix = DMatrix::from_row_slice(2, 2, &[0.1, -0.1, -0.1, 0.1]);
        let rhs = DVector::from_vec(vec![0.0, 0.0]);

        for method in [SolverMethod::Lu, SolverMethod::Qr] {
            let solver = LinearSolver::with_config(SolverConfig {
                method,
                ..SolverConfig::default()
            });
            let err = solver.solve_dense(&matrix, &rhs).unwrap_err();
            assert!(matches!(
                err,
                SimError::SingularSystem(Singularity::DegeneratePivot { .. })
            ));
        }

        let zero = DMatrix::zeros(1, 1);
        let err = LinearSolver::new()
            .solve_dense(&zero, &DVector::from_vec(vec![1.0]))
            .unwrap_err();
        assert_eq!(err, SimError::degenerate_pivot(0));
    }

    #[test]
    fn test_widely_scaled_columns_are_not_singular() {
        // 1 mOhm and 10 GOhm to ground, thirteen decades apart
        let matrix = DMatrix::from_row_slice(2, 2, &[1e3, 0.0, 0.0, 1e-10]);
        let rhs = DVector::from_vec(vec![1.0, 1e-9]);

        for method in [SolverMethod::Lu, SolverMethod::Qr] {
            let solver = LinearSolver::with_config(SolverConfig {
                method,
                ..SolverConfig::default()
            });
            let (solution, _) = solver.solve_dense(&matrix, &rhs).unwrap();
            assert_abs_diff_eq!(solution[0], 1e-3, epsilon = 1e-15);
            assert_abs_diff_eq!(solution[1], 10.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_empty_and_mismatched_systems() {
        let solver = LinearSolver::new();
        let (solution, stats) = solver
            .solve_dense(&DMatrix::zeros(0, 0), &DVector::zeros(0))
            .unwrap();
        assert_eq!(solution.len(), 0);
        assert!(stats.success);

        let err = solver
            .solve_dense(&DMatrix::identity(2, 2), &DVector::zeros(3))
            .unwrap_err();
        assert_eq!(
            err,
            SimError::DimensionMismatch {
                rows: 2,
                cols: 2,
                rhs: 3
            }
        );
    }
}
