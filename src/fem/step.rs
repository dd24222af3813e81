use super::{Assembler, Converger, GlobalState, Integrator, Solver};
use crate::base::{Config, SolveOutcome, StepSummary};
use crate::model::Domain;
use crate::StrError;

/// Drives one step over its time/load window with adaptive sub-increments
///
/// Repeatedly invokes the solver with the current sub-increment size: a
/// converged sub-increment is committed and the window shrinks; a
/// non-convergence halves the size and retries from the committed state; a
/// fatal solver error (or breaching the minimum size or the sub-increment
/// budget) aborts the step, leaving all previously committed states intact.
pub struct StepControl {
    period: f64,
    ini_step: f64,
    min_step: f64,
    max_step: f64,
    max_substeps: usize,
    fixed_step: bool,
    verbose: bool,

    /// Number of committed sub-steps of the last run
    pub n_committed: usize,

    /// Number of halving retries of the last run
    pub n_halvings: usize,

    /// Total number of solver iterations of the last run
    pub n_iterations: usize,
}

impl StepControl {
    /// Allocates a new instance from the configuration
    pub fn new(config: &Config) -> Result<Self, StrError> {
        if let Some(message) = config.validate() {
            return Err(message);
        }
        Ok(StepControl {
            period: config.period,
            ini_step: config.ini_step,
            min_step: config.min_step,
            max_step: config.max_step,
            max_substeps: config.max_substeps,
            fixed_step: config.fixed_step,
            verbose: config.verbose_steps,
            n_committed: 0,
            n_halvings: 0,
            n_iterations: 0,
        })
    }

    /// Consumes the whole time/load window of one step
    ///
    /// The counters (`n_committed`, `n_halvings`, `n_iterations`) are reset at
    /// the beginning and remain inspectable after a failure.
    pub fn analyze(
        &mut self,
        domain: &mut Domain,
        state: &mut GlobalState,
        assembler: &Assembler,
        integrator: &mut Integrator,
        solver: &mut Solver,
        converger: &mut Converger,
    ) -> Result<StepSummary, StrError> {
        self.n_committed = 0;
        self.n_halvings = 0;
        self.n_iterations = 0;
        let mut remaining = self.period;
        let mut step = f64::min(self.ini_step, f64::min(self.max_step, remaining));
        let mut substeps = 0;
        // relative tolerance stopping the remaining-time loop
        let tiny = 1e-12 * self.period;
        while remaining > tiny {
            if substeps >= self.max_substeps {
                return Err("the maximum number of sub-increments has been reached");
            }
            substeps += 1;
            integrator.update_increment(domain, assembler, state, step)?;
            match solver.analyze(domain, state, assembler, integrator, converger)? {
                SolveOutcome::Converged { iterations } => {
                    self.n_iterations += iterations;
                    integrator.commit(domain, assembler, state)?;
                    solver.on_step_committed(state);
                    self.n_committed += 1;
                    remaining -= step;
                    if self.verbose {
                        println!(
                            "step: t = {:>13.6e}, dt = {:>13.6e}, iterations = {}",
                            state.t, step, iterations
                        );
                    }
                    if remaining > tiny {
                        step = f64::min(step, remaining);
                    }
                }
                SolveOutcome::NonConvergence => {
                    assembler.reset(domain, state)?;
                    solver.on_step_rejected();
                    if self.fixed_step {
                        return Err("the solver did not converge with a fixed increment size");
                    }
                    if step <= self.min_step {
                        return Err("the increment size fell below the minimum");
                    }
                    step /= 2.0;
                    self.n_halvings += 1;
                    if self.verbose {
                        println!("step: halving the increment to dt = {:>13.6e}", step);
                    }
                }
            }
        }
        Ok(StepSummary {
            n_committed: self.n_committed,
            n_halvings: self.n_halvings,
            n_iterations: self.n_iterations,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
