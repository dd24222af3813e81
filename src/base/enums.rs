use serde::{Deserialize, Serialize};

/// Defines the type of analysis regarding time dependence
///
/// A purely static analysis never allocates velocity or acceleration vectors,
/// nor the mass and damping operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AnalysisType {
    /// Static (equilibrium) analysis
    Statics,

    /// Dynamic analysis with inertial and damping effects
    Dynamics,
}

/// Defines the storage scheme of the global operators
///
/// The scheme is chosen once per analysis; banded and packed schemes fold
/// writes into the reduced storage index `(row - col + offset, col)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum StorageScheme {
    /// Full (dense) matrix; LU factorization with partial pivoting
    Full,

    /// General banded matrix; banded LU factorization without pivoting
    Band,

    /// Symmetric banded matrix (lower band); banded Cholesky factorization
    BandSymm,

    /// Symmetric packed matrix (lower triangle); packed Cholesky factorization
    SymmPack,
}

impl StorageScheme {
    /// Returns whether the scheme stores only one triangle
    pub fn symmetric(&self) -> bool {
        match self {
            StorageScheme::Full | StorageScheme::Band => false,
            StorageScheme::BandSymm | StorageScheme::SymmPack => true,
        }
    }
}

/// Defines the recoverable outcome of one solver run over a sub-step
///
/// Fatal conditions (singular operator, NaN/Inf, invalid configuration) are
/// not outcomes; they propagate as errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SolveOutcome {
    /// The convergence test was satisfied after the given number of linear solves
    Converged {
        /// Number of linear solves performed
        iterations: usize,
    },

    /// The iteration budget was exhausted without satisfying the convergence test
    NonConvergence,
}

/// Holds counters summarizing a completed step
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    /// Number of committed sub-steps
    pub n_committed: usize,

    /// Number of step-halving retries
    pub n_halvings: usize,

    /// Total number of solver iterations over all sub-steps
    pub n_iterations: usize,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{AnalysisType, SolveOutcome, StepSummary, StorageScheme};

    #[test]
    fn derive_works() {
        let a = AnalysisType::Dynamics;
        let clone = a.clone();
        assert_eq!(a, clone);
        assert_eq!(format!("{:?}", a), "Dynamics");
        let json = serde_json::to_string(&a).unwrap();
        let read: AnalysisType = serde_json::from_str(&json).unwrap();
        assert_eq!(read, a);

        let summary = StepSummary::default();
        assert_eq!(summary.n_committed, 0);
        let outcome = SolveOutcome::Converged { iterations: 2 };
        assert!(outcome != SolveOutcome::NonConvergence);
    }

    #[test]
    fn symmetric_works() {
        assert!(!StorageScheme::Full.symmetric());
        assert!(!StorageScheme::Band.symmetric());
        assert!(StorageScheme::BandSymm.symmetric());
        assert!(StorageScheme::SymmPack.symmetric());
    }
}
