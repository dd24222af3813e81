use super::{GlobalOperator, GlobalState};
use crate::model::{DofLayout, Domain, GenericElement};
use crate::StrError;
use russell_lab::Vector;

/// Links the model to the global state
///
/// Gathers element-local blocks into the global operators and vectors
/// (serial scatter-add, since concurrent writers would race on shared
/// entries) and propagates the global trial/incremental views back out to
/// the nodes and elements (parallel, disjoint per-object memory).
pub struct Assembler {
    /// Prescribed (restrained) flag per reordered DOF index
    pub prescribed: Vec<bool>,
}

impl Assembler {
    /// Allocates a new instance from the finalized DOF layout
    pub fn new(layout: &DofLayout) -> Self {
        Assembler {
            prescribed: layout.prescribed.clone(),
        }
    }

    /// Assembles the trial resistance vector from all active elements
    pub fn assemble_resistance(&self, domain: &mut Domain, state: &mut GlobalState) -> Result<(), StrError> {
        state.resistance.trial.fill(0.0);
        let Domain { nodes, elements, .. } = domain;
        for element in elements.iter_mut().filter(|e| e.active) {
            let GenericElement {
                actual,
                residual,
                local_to_global,
                ..
            } = element;
            actual.calc_resistance(nodes, residual)?;
            state.assemble_resistance(residual, local_to_global, &self.prescribed)?;
        }
        Ok(())
    }

    /// Assembles the tangent stiffness operator from all active elements
    pub fn assemble_stiffness(&self, domain: &mut Domain, state: &mut GlobalState) -> Result<(), StrError> {
        state.stiffness.zero();
        let Domain { nodes, elements, .. } = domain;
        for element in elements.iter_mut().filter(|e| e.active) {
            let GenericElement {
                actual,
                jacobian,
                local_to_global,
                ..
            } = element;
            actual.calc_stiffness(nodes, jacobian)?;
            state.assemble_stiffness(jacobian, local_to_global, &self.prescribed)?;
        }
        Ok(())
    }

    /// Assembles the mass operator from all active elements (dynamics only)
    pub fn assemble_mass(&self, domain: &mut Domain, state: &mut GlobalState) -> Result<(), StrError> {
        if let Some(mass) = state.mass.as_mut() {
            mass.zero();
        }
        let Domain { nodes, elements, .. } = domain;
        for element in elements.iter_mut().filter(|e| e.active) {
            let GenericElement {
                actual,
                jacobian,
                local_to_global,
                ..
            } = element;
            actual.calc_mass(nodes, jacobian)?;
            state.assemble_mass(jacobian, local_to_global, &self.prescribed)?;
        }
        Ok(())
    }

    /// Assembles the damping operator from all active elements (dynamics only)
    pub fn assemble_damping(&self, domain: &mut Domain, state: &mut GlobalState) -> Result<(), StrError> {
        if let Some(damping) = state.damping.as_mut() {
            damping.zero();
        }
        let Domain { nodes, elements, .. } = domain;
        for element in elements.iter_mut().filter(|e| e.active) {
            let GenericElement {
                actual,
                jacobian,
                local_to_global,
                ..
            } = element;
            actual.calc_damping(nodes, jacobian)?;
            state.assemble_damping(jacobian, local_to_global, &self.prescribed)?;
        }
        Ok(())
    }

    /// Erases the entries of a global vector at prescribed DOFs
    pub fn erase_prescribed(&self, v: &mut Vector) {
        for (g, &fixed) in self.prescribed.iter().enumerate() {
            if fixed {
                v[g] = 0.0;
            }
        }
    }

    /// Places a unit value on the diagonal of an operator at prescribed DOFs
    ///
    /// Assembly skips prescribed rows and columns, which would leave zero
    /// rows; the unit diagonal keeps the operator regular with a zero
    /// solution at these DOFs.
    pub fn set_prescribed_diagonal(&self, op: &mut GlobalOperator) -> Result<(), StrError> {
        for (g, &fixed) in self.prescribed.iter().enumerate() {
            if fixed {
                op.add(g, g, 1.0)?;
            }
        }
        Ok(())
    }

    /// Propagates the global trial views out to the nodes and elements
    pub fn update_trial_status(&self, domain: &mut Domain, state: &GlobalState) -> Result<(), StrError> {
        domain.update_trial_status(
            &state.displacement.trial,
            state.velocity.as_ref().map(|v| &v.trial),
            state.acceleration.as_ref().map(|a| &a.trial),
        )
    }

    /// Propagates the global displacement increment out to the nodes and elements
    pub fn update_incre_status(&self, domain: &mut Domain, state: &GlobalState) -> Result<(), StrError> {
        domain.update_incre_status(&state.displacement.increment)
    }

    /// Commits state and model together
    pub fn commit(&self, domain: &mut Domain, state: &mut GlobalState) -> Result<(), StrError> {
        state.commit()?;
        domain.commit_status();
        Ok(())
    }

    /// Resets state and model together back to the committed status
    pub fn reset(&self, domain: &mut Domain, state: &mut GlobalState) -> Result<(), StrError> {
        state.reset()?;
        domain.reset_status();
        Ok(())
    }

    /// Clears state and model together
    pub fn clear(&self, domain: &mut Domain, state: &mut GlobalState) {
        state.clear();
        domain.clear_status();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Assembler;
    use crate::base::{AnalysisType, StorageScheme};
    use crate::fem::GlobalState;
    use crate::model::{Domain, SpringElement};
    use russell_lab::Vector;

    fn two_springs() -> (Domain, Assembler, GlobalState) {
        let mut domain = Domain::new();
        let a = domain.add_node(1);
        let b = domain.add_node(1);
        let c = domain.add_node(1);
        domain.add_element(Box::new(SpringElement::new([a, b], 10.0)));
        domain.add_element(Box::new(SpringElement::new([b, c], 10.0)));
        domain.add_restraint(0, 0);
        let layout = domain.finalize(false).unwrap();
        let assembler = Assembler::new(&layout);
        let state = GlobalState::new(
            AnalysisType::Statics,
            StorageScheme::Full,
            layout.n_equation,
            layout.band_low,
            layout.band_up,
        )
        .unwrap();
        (domain, assembler, state)
    }

    #[test]
    fn assemble_stiffness_works() {
        let (mut domain, assembler, mut state) = two_springs();
        assembler.assemble_stiffness(&mut domain, &mut state).unwrap();
        assembler.set_prescribed_diagonal(&mut state.stiffness).unwrap();
        assert_eq!(state.stiffness.get(0, 0), 1.0); // restrained: unit diagonal
        assert_eq!(state.stiffness.get(0, 1), 0.0);
        assert_eq!(state.stiffness.get(1, 1), 20.0);
        assert_eq!(state.stiffness.get(1, 2), -10.0);
        assert_eq!(state.stiffness.get(2, 2), 10.0);
    }

    #[test]
    fn assemble_resistance_works() {
        let (mut domain, assembler, mut state) = two_springs();
        let d = Vector::from(&[0.0, 0.1, 0.3]);
        state.displacement.update_trial(&d).unwrap();
        assembler.update_trial_status(&mut domain, &state).unwrap();
        assembler.assemble_resistance(&mut domain, &mut state).unwrap();
        assert_eq!(state.resistance.trial[0], 0.0); // restrained: skipped
        assert!((state.resistance.trial[1] - (10.0 * 0.1 - 10.0 * 0.2)).abs() < 1e-14);
        assert!((state.resistance.trial[2] - 10.0 * 0.2).abs() < 1e-14);
    }

    #[test]
    fn erase_prescribed_works() {
        let (_, assembler, _) = two_springs();
        let mut v = Vector::from(&[5.0, 6.0, 7.0]);
        assembler.erase_prescribed(&mut v);
        assert_eq!(v.as_data(), &[0.0, 6.0, 7.0]);
    }
}
