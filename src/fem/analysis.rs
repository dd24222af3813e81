use super::{Assembler, Converger, GlobalState, Integrator, Solver, StateRecord, StepControl};
use crate::base::{Config, StepSummary};
use crate::model::{DofLayout, Domain};
use crate::StrError;

/// Wires the analysis components together and runs steps
///
/// Owns the single [`GlobalState`] of the run and threads it through the
/// assembler, integrator, solver, and step controller; the model itself stays
/// with the caller and is borrowed per step.
pub struct Analysis {
    config: Config,
    layout: DofLayout,
    assembler: Assembler,
    integrator: Integrator,
    solver: Solver,
    converger: Converger,
    control: StepControl,

    /// Global numeric state of the run
    pub state: GlobalState,
}

impl Analysis {
    /// Allocates a new instance, finalizing the model and sizing the state
    ///
    /// Configuration errors (invalid step window, an integrator that does not
    /// match the analysis type) are reported here, before the run starts.
    pub fn new(
        config: &Config,
        domain: &mut Domain,
        integrator: Integrator,
        solver: Solver,
        mut converger: Converger,
    ) -> Result<Self, StrError> {
        if let Some(message) = config.validate() {
            return Err(message);
        }
        if integrator.analysis() != config.analysis {
            return Err("the integrator does not match the analysis type");
        }
        let layout = domain.finalize(config.reorder)?;
        let assembler = Assembler::new(&layout);
        let state = GlobalState::new(
            config.analysis,
            config.scheme,
            layout.n_equation,
            layout.band_low,
            layout.band_up,
        )?;
        let control = StepControl::new(config)?;
        converger.set_verbose(config.verbose_iterations);
        Ok(Analysis {
            config: config.clone(),
            layout,
            assembler,
            integrator,
            solver,
            converger,
            control,
            state,
        })
    }

    /// Returns the DOF layout computed when the model was finalized
    pub fn layout(&self) -> &DofLayout {
        &self.layout
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the error computed by the last convergence test
    pub fn error(&self) -> f64 {
        self.converger.error()
    }

    /// Runs one step over the configured time/load window
    pub fn run(&mut self, domain: &mut Domain) -> Result<StepSummary, StrError> {
        self.control.analyze(
            domain,
            &mut self.state,
            &self.assembler,
            &mut self.integrator,
            &mut self.solver,
            &mut self.converger,
        )
    }

    /// Extracts a serializable snapshot of the committed state
    pub fn record(&self) -> StateRecord {
        StateRecord::from_state(&self.state)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
