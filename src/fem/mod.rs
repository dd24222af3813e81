//! Implements the analysis core: global state, operators, assembly, time
//! integration, convergence control, nonlinear solvers, and step control

mod analysis;
mod assembler;
mod converger;
mod global_state;
mod integrator;
mod operator;
mod reorder;
mod solver;
mod step;
pub use crate::fem::analysis::*;
pub use crate::fem::assembler::*;
pub use crate::fem::converger::*;
pub use crate::fem::global_state::*;
pub use crate::fem::integrator::*;
pub use crate::fem::operator::*;
pub use crate::fem::reorder::*;
pub use crate::fem::solver::*;
pub use crate::fem::step::*;
