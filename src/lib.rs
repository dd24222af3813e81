//! Structural nonlinear equilibrium simulator
//!
//! This crate implements the equilibrium-iteration engine of a nonlinear
//! finite element structural analysis: a global numeric state with
//! previous/current/trial/incremental views, bandwidth-minimizing DOF
//! reordering, the assembly protocol, implicit and explicit time-integration
//! transforms, convergence tests, iterative solvers (Newton, quasi-Newton
//! BFGS, Ramm arc-length), and an adaptive step-size controller.
//!
//! Element kernels, material models, and model input/output are external
//! collaborators reached only through the interfaces in [`crate::model`].

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod base;
pub mod fem;
pub mod model;
