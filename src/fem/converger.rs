use super::GlobalState;
use crate::base::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};
use crate::StrError;
use russell_lab::{vec_inner, vec_norm, Norm, Vector};
use serde::{Deserialize, Serialize};

/// Defines the scalar error metric checked by the converger
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConvergenceCriterion {
    /// Euclidean norm of the last displacement correction
    AbsDisp,

    /// Norm of the last correction relative to the norm of the trial displacement
    RelDisp,

    /// Euclidean norm of the out-of-balance force (erased at restrained DOFs)
    AbsResidual,

    /// Norm of the out-of-balance force relative to the norm of the resistance
    RelResidual,

    /// Absolute incremental energy `|correction · residual|`
    AbsIncreEnergy,

    /// Incremental energy relative to the first iteration of the step
    RelIncreEnergy,
}

/// Checks convergence of the iterative solvers
///
/// Computes one scalar error from the global state and compares it against the
/// tolerance; the test never mutates the analysis state. Inconsistent input
/// (mismatched dimensions) makes the test defensively fail instead of
/// panicking.
pub struct Converger {
    criterion: ConvergenceCriterion,
    tolerance: f64,
    max_iterations: usize,
    error: f64,
    converged: bool,
    reference: f64,
    verbose: bool,
}

impl Converger {
    /// Allocates a new instance
    pub fn new(criterion: ConvergenceCriterion) -> Self {
        Converger {
            criterion,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            error: 0.0,
            converged: false,
            reference: 0.0,
            verbose: false,
        }
    }

    /// Sets the tolerance
    pub fn set_tolerance(&mut self, tolerance: f64) -> Result<&mut Self, StrError> {
        if tolerance <= 0.0 {
            return Err("the tolerance must be positive");
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    /// Sets the maximum number of iterations
    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<&mut Self, StrError> {
        if max_iterations < 1 {
            return Err("the maximum number of iterations must be at least 1");
        }
        self.max_iterations = max_iterations;
        Ok(self)
    }

    /// Enables or disables printing the error each iteration
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Returns the maximum number of iterations
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Returns the tolerance
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Returns the error computed by the last test
    pub fn error(&self) -> f64 {
        self.error
    }

    /// Returns whether the last test was satisfied
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Prepares for a new step (forgets the error and the energy reference)
    pub fn reset(&mut self) {
        self.error = 0.0;
        self.converged = false;
        self.reference = 0.0;
    }

    /// Computes the error metric and compares it against the tolerance
    ///
    /// Returns `false` defensively on inconsistent input.
    pub fn test(&mut self, state: &GlobalState, prescribed: &[bool]) -> bool {
        let n = state.dim();
        if prescribed.len() != n || state.ninja.dim() != n {
            if self.verbose {
                println!("converger: inconsistent input; failing the test");
            }
            self.converged = false;
            return false;
        }

        // out-of-balance force, erased at restrained DOFs
        let mut residual = Vector::new(n);
        for i in 0..n {
            if !prescribed[i] {
                residual[i] = state.load.trial[i] - state.resistance.trial[i];
            }
        }

        self.error = match self.criterion {
            ConvergenceCriterion::AbsDisp => vec_norm(&state.ninja, Norm::Euc),
            ConvergenceCriterion::RelDisp => {
                let denominator = vec_norm(&state.displacement.trial, Norm::Euc);
                let numerator = vec_norm(&state.ninja, Norm::Euc);
                if denominator > f64::EPSILON {
                    numerator / denominator
                } else {
                    numerator
                }
            }
            ConvergenceCriterion::AbsResidual => vec_norm(&residual, Norm::Euc),
            ConvergenceCriterion::RelResidual => {
                let mut resistance = Vector::new(n);
                for i in 0..n {
                    if !prescribed[i] {
                        resistance[i] = state.resistance.trial[i];
                    }
                }
                let denominator = vec_norm(&resistance, Norm::Euc);
                let numerator = vec_norm(&residual, Norm::Euc);
                if denominator > f64::EPSILON {
                    numerator / denominator
                } else {
                    numerator
                }
            }
            ConvergenceCriterion::AbsIncreEnergy => match vec_inner_checked(&state.ninja, &residual) {
                Some(e) => e.abs(),
                None => return self.fail_defensively(),
            },
            ConvergenceCriterion::RelIncreEnergy => {
                let energy = match vec_inner_checked(&state.ninja, &residual) {
                    Some(e) => e.abs(),
                    None => return self.fail_defensively(),
                };
                if self.reference == 0.0 {
                    self.reference = energy;
                }
                if self.reference > f64::EPSILON {
                    energy / self.reference
                } else {
                    energy
                }
            }
        };

        if self.verbose {
            println!(
                "converger: error = {:>13.6e} (tolerance = {:e})",
                self.error, self.tolerance
            );
        }
        self.converged = self.error.is_finite() && self.error < self.tolerance;
        self.converged
    }

    fn fail_defensively(&mut self) -> bool {
        if self.verbose {
            println!("converger: inconsistent input; failing the test");
        }
        self.converged = false;
        false
    }
}

// inner product, None on dimension mismatch
fn vec_inner_checked(u: &Vector, v: &Vector) -> Option<f64> {
    if u.dim() != v.dim() {
        return None;
    }
    Some(vec_inner(u, v))
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
