//! Implements the model container: nodes, elements, loads, and restraints
//!
//! Concrete element kernels and material models are external collaborators;
//! the engine reaches them only through [`ElementTrait`].

mod domain;
mod element;
mod load;
mod node;
mod restraint;
mod sample_elements;
pub use crate::model::domain::*;
pub use crate::model::element::*;
pub use crate::model::load::*;
pub use crate::model::node::*;
pub use crate::model::restraint::*;
pub use crate::model::sample_elements::*;
