/// Default convergence tolerance
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Default maximum number of iterations per sub-step
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// Default maximum number of sub-steps per step
pub const DEFAULT_MAX_SUBSTEPS: usize = 1000;

/// Default length of the quasi-Newton iteration history
pub const DEFAULT_BFGS_HISTORY: usize = 8;

/// Values smaller than this are treated as a singular pivot
pub const PIVOT_TINY: f64 = 1e-13;
