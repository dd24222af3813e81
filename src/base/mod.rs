//! Implements the base structures for a structural analysis

mod config;
mod constants;
mod enums;
pub use crate::base::config::*;
pub use crate::base::constants::*;
pub use crate::base::enums::*;
