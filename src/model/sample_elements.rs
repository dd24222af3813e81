use super::{ElementTrait, Node};
use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Implements a linear spring connecting two one-DOF nodes (used in tests)
///
/// Local stiffness `k [[1,-1],[-1,1]]`; the resistance follows the trial
/// displacements of the connected nodes.
pub struct SpringElement {
    nodes: [usize; 2],
    stiffness: f64,
}

/// Implements a linear spring connecting one one-DOF node to the ground
pub struct GroundSpringElement {
    nodes: [usize; 1],
    stiffness: f64,
}

/// Implements a cubic-hardening spring connecting one one-DOF node to the ground
///
/// Resistance `k u + k3 u³`, tangent `k + 3 k3 u²`.
pub struct CubicSpringElement {
    nodes: [usize; 1],
    stiffness: f64,
    hardening: f64,
}

/// Implements a lumped mass at one one-DOF node
pub struct MassElement {
    nodes: [usize; 1],
    mass: f64,
}

/// Implements a grounded linear dashpot at one one-DOF node
pub struct DashpotElement {
    nodes: [usize; 1],
    damping: f64,
}

impl SpringElement {
    /// Allocates a new instance
    pub fn new(nodes: [usize; 2], stiffness: f64) -> Self {
        SpringElement { nodes, stiffness }
    }
}

impl GroundSpringElement {
    /// Allocates a new instance
    pub fn new(node: usize, stiffness: f64) -> Self {
        GroundSpringElement {
            nodes: [node],
            stiffness,
        }
    }
}

impl CubicSpringElement {
    /// Allocates a new instance
    pub fn new(node: usize, stiffness: f64, hardening: f64) -> Self {
        CubicSpringElement {
            nodes: [node],
            stiffness,
            hardening,
        }
    }
}

impl MassElement {
    /// Allocates a new instance
    pub fn new(node: usize, mass: f64) -> Self {
        MassElement { nodes: [node], mass }
    }
}

impl DashpotElement {
    /// Allocates a new instance
    pub fn new(node: usize, damping: f64) -> Self {
        DashpotElement {
            nodes: [node],
            damping,
        }
    }
}

impl ElementTrait for SpringElement {
    fn connectivity(&self) -> &[usize] {
        &self.nodes
    }
    fn ndof_local(&self) -> usize {
        2
    }
    fn calc_resistance(&self, nodes: &[Node], rr: &mut Vector) -> Result<(), StrError> {
        let ua = nodes[self.nodes[0]].trial_displacement()[0];
        let ub = nodes[self.nodes[1]].trial_displacement()[0];
        rr[0] = self.stiffness * (ua - ub);
        rr[1] = self.stiffness * (ub - ua);
        Ok(())
    }
    fn calc_stiffness(&self, _nodes: &[Node], kk: &mut Matrix) -> Result<(), StrError> {
        kk.set(0, 0, self.stiffness);
        kk.set(0, 1, -self.stiffness);
        kk.set(1, 0, -self.stiffness);
        kk.set(1, 1, self.stiffness);
        Ok(())
    }
    fn calc_mass(&self, _nodes: &[Node], mm: &mut Matrix) -> Result<(), StrError> {
        mm.fill(0.0);
        Ok(())
    }
    fn calc_damping(&self, _nodes: &[Node], cc: &mut Matrix) -> Result<(), StrError> {
        cc.fill(0.0);
        Ok(())
    }
    fn update_status(&mut self, _nodes: &[Node]) -> Result<(), StrError> {
        Ok(())
    }
    fn commit_status(&mut self) {}
    fn reset_status(&mut self) {}
    fn clear_status(&mut self) {}
}

impl ElementTrait for GroundSpringElement {
    fn connectivity(&self) -> &[usize] {
        &self.nodes
    }
    fn ndof_local(&self) -> usize {
        1
    }
    fn calc_resistance(&self, nodes: &[Node], rr: &mut Vector) -> Result<(), StrError> {
        rr[0] = self.stiffness * nodes[self.nodes[0]].trial_displacement()[0];
        Ok(())
    }
    fn calc_stiffness(&self, _nodes: &[Node], kk: &mut Matrix) -> Result<(), StrError> {
        kk.set(0, 0, self.stiffness);
        Ok(())
    }
    fn calc_mass(&self, _nodes: &[Node], mm: &mut Matrix) -> Result<(), StrError> {
        mm.set(0, 0, 0.0);
        Ok(())
    }
    fn calc_damping(&self, _nodes: &[Node], cc: &mut Matrix) -> Result<(), StrError> {
        cc.set(0, 0, 0.0);
        Ok(())
    }
    fn update_status(&mut self, _nodes: &[Node]) -> Result<(), StrError> {
        Ok(())
    }
    fn commit_status(&mut self) {}
    fn reset_status(&mut self) {}
    fn clear_status(&mut self) {}
}

impl ElementTrait for CubicSpringElement {
    fn connectivity(&self) -> &[usize] {
        &self.nodes
    }
    fn ndof_local(&self) -> usize {
        1
    }
    fn calc_resistance(&self, nodes: &[Node], rr: &mut Vector) -> Result<(), StrError> {
        let u = nodes[self.nodes[0]].trial_displacement()[0];
        rr[0] = self.stiffness * u + self.hardening * u * u * u;
        Ok(())
    }
    fn calc_stiffness(&self, nodes: &[Node], kk: &mut Matrix) -> Result<(), StrError> {
        let u = nodes[self.nodes[0]].trial_displacement()[0];
        kk.set(0, 0, self.stiffness + 3.0 * self.hardening * u * u);
        Ok(())
    }
    fn calc_mass(&self, _nodes: &[Node], mm: &mut Matrix) -> Result<(), StrError> {
        mm.set(0, 0, 0.0);
        Ok(())
    }
    fn calc_damping(&self, _nodes: &[Node], cc: &mut Matrix) -> Result<(), StrError> {
        cc.set(0, 0, 0.0);
        Ok(())
    }
    fn update_status(&mut self, _nodes: &[Node]) -> Result<(), StrError> {
        Ok(())
    }
    fn commit_status(&mut self) {}
    fn reset_status(&mut self) {}
    fn clear_status(&mut self) {}
}

impl ElementTrait for MassElement {
    fn connectivity(&self) -> &[usize] {
        &self.nodes
    }
    fn ndof_local(&self) -> usize {
        1
    }
    fn calc_resistance(&self, _nodes: &[Node], rr: &mut Vector) -> Result<(), StrError> {
        rr[0] = 0.0;
        Ok(())
    }
    fn calc_stiffness(&self, _nodes: &[Node], kk: &mut Matrix) -> Result<(), StrError> {
        kk.set(0, 0, 0.0);
        Ok(())
    }
    fn calc_mass(&self, _nodes: &[Node], mm: &mut Matrix) -> Result<(), StrError> {
        mm.set(0, 0, self.mass);
        Ok(())
    }
    fn calc_damping(&self, _nodes: &[Node], cc: &mut Matrix) -> Result<(), StrError> {
        cc.set(0, 0, 0.0);
        Ok(())
    }
    fn update_status(&mut self, _nodes: &[Node]) -> Result<(), StrError> {
        Ok(())
    }
    fn commit_status(&mut self) {}
    fn reset_status(&mut self) {}
    fn clear_status(&mut self) {}
}

impl ElementTrait for DashpotElement {
    fn connectivity(&self) -> &[usize] {
        &self.nodes
    }
    fn ndof_local(&self) -> usize {
        1
    }
    fn calc_resistance(&self, _nodes: &[Node], rr: &mut Vector) -> Result<(), StrError> {
        rr[0] = 0.0;
        Ok(())
    }
    fn calc_stiffness(&self, _nodes: &[Node], kk: &mut Matrix) -> Result<(), StrError> {
        kk.set(0, 0, 0.0);
        Ok(())
    }
    fn calc_mass(&self, _nodes: &[Node], mm: &mut Matrix) -> Result<(), StrError> {
        mm.set(0, 0, 0.0);
        Ok(())
    }
    fn calc_damping(&self, _nodes: &[Node], cc: &mut Matrix) -> Result<(), StrError> {
        cc.set(0, 0, self.damping);
        Ok(())
    }
    fn update_status(&mut self, _nodes: &[Node]) -> Result<(), StrError> {
        Ok(())
    }
    fn commit_status(&mut self) {}
    fn reset_status(&mut self) {}
    fn clear_status(&mut self) {}
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
