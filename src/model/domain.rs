use super::{ElementTrait, GenericElement, NodalLoad, Node, Restraint};
use crate::fem::{rcm_ordering, semi_bandwidths};
use crate::StrError;
use rayon::prelude::*;
use russell_lab::Vector;

/// Holds the DOF layout computed when the model is finalized
#[derive(Clone, Debug)]
pub struct DofLayout {
    /// Total number of equations (DOFs of active nodes)
    pub n_equation: usize,

    /// Lower semi-bandwidth of the assembled operators
    pub band_low: usize,

    /// Upper semi-bandwidth of the assembled operators
    pub band_up: usize,

    /// Prescribed (restrained) flag per reordered DOF index
    pub prescribed: Vec<bool>,
}

/// Holds the model: nodes, elements, loads, and restraints
///
/// The arenas are public so that callers (and the assembler) can split-borrow
/// nodes and elements independently.
pub struct Domain {
    /// All nodes (id equals the index in this arena)
    pub nodes: Vec<Node>,

    /// All elements (id equals the index in this arena)
    pub elements: Vec<GenericElement>,

    /// Concentrated nodal loads
    pub loads: Vec<NodalLoad>,

    /// Homogeneous restraints (fixed DOFs)
    pub restraints: Vec<Restraint>,
}

impl Domain {
    /// Allocates a new (empty) instance
    pub fn new() -> Self {
        Domain {
            nodes: Vec::new(),
            elements: Vec::new(),
            loads: Vec::new(),
            restraints: Vec::new(),
        }
    }

    /// Appends a new node with the given number of DOFs and returns its id
    pub fn add_node(&mut self, ndof: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, ndof));
        id
    }

    /// Appends a new element wrapping the actual implementation and returns its id
    pub fn add_element(&mut self, actual: Box<dyn ElementTrait>) -> usize {
        let id = self.elements.len();
        self.elements.push(GenericElement::new(actual));
        id
    }

    /// Appends a concentrated nodal load
    pub fn add_load(&mut self, load: NodalLoad) {
        self.loads.push(load);
    }

    /// Appends a homogeneous restraint (fixed DOF)
    pub fn add_restraint(&mut self, node: usize, dof: usize) {
        self.restraints.push(Restraint::new(node, dof));
    }

    /// Numbers the DOFs, computes the element encodings, and returns the layout
    ///
    /// With `reorder = true`, a reverse Cuthill-McKee permutation is applied to
    /// reduce the semi-bandwidths; the original numbering is kept on the nodes
    /// for traceability. Must be called (again) after any change to the model.
    pub fn finalize(&mut self, reorder: bool) -> Result<DofLayout, StrError> {
        if self.nodes.is_empty() {
            return Err("the model has no nodes");
        }
        if self.elements.is_empty() {
            return Err("the model has no elements");
        }

        // number active nodes contiguously
        let mut n_equation = 0;
        for node in &mut self.nodes {
            if node.active {
                node.number(n_equation);
                n_equation += node.ndof();
            }
        }
        if n_equation == 0 {
            return Err("the model has no active nodes");
        }

        // DOF encodings with the identity ordering
        for element in &mut self.elements {
            if !element.active {
                continue;
            }
            for node_id in element.actual.connectivity() {
                let node = self
                    .nodes
                    .get(*node_id)
                    .ok_or("element connectivity points to a missing node")?;
                if !node.active {
                    return Err("element connects to an inactive node");
                }
            }
            element.compute_local_to_global(&self.nodes)?;
        }

        // bandwidth-reducing permutation
        if reorder {
            let mut adjacency = vec![Vec::new(); n_equation];
            for element in self.elements.iter().filter(|e| e.active) {
                for &i in &element.local_to_global {
                    for &j in &element.local_to_global {
                        if i != j && !adjacency[i].contains(&j) {
                            adjacency[i].push(j);
                        }
                    }
                }
            }
            let perm = rcm_ordering(&adjacency);
            for node in self.nodes.iter_mut().filter(|n| n.active) {
                node.apply_permutation(&perm);
            }
            for element in self.elements.iter_mut().filter(|e| e.active) {
                element.compute_local_to_global(&self.nodes)?;
            }
        }

        // semi-bandwidths of the final numbering
        let (band_low, band_up) = semi_bandwidths(&self.elements);

        // prescribed flags
        let mut prescribed = vec![false; n_equation];
        for restraint in &self.restraints {
            let node = self
                .nodes
                .get(restraint.node)
                .ok_or("restraint points to a missing node")?;
            if !node.active {
                return Err("restraint points to an inactive node");
            }
            let g = node.reordered_dof(restraint.dof).map_err(|_| "restraint DOF index is out of range")?;
            prescribed[g] = true;
        }

        Ok(DofLayout {
            n_equation,
            band_low,
            band_up,
            prescribed,
        })
    }

    /// Evaluates the external loads at time `t` into the global force vector
    ///
    /// The vector is zeroed first; loads on restrained DOFs are ignored.
    pub fn process_loads(&self, t: f64, prescribed: &[bool], ff: &mut Vector) -> Result<(), StrError> {
        if prescribed.len() != ff.dim() {
            return Err("the prescribed array does not match the force vector");
        }
        ff.fill(0.0);
        for load in &self.loads {
            let node = self.nodes.get(load.node).ok_or("load points to a missing node")?;
            if !node.active {
                continue;
            }
            let g = node.reordered_dof(load.dof).map_err(|_| "load DOF index is out of range")?;
            if g >= ff.dim() {
                return Err("the force vector does not match the model numbering");
            }
            if prescribed[g] {
                continue;
            }
            ff[g] += load.value_at(t)?;
        }
        Ok(())
    }

    /// Evaluates the reference load vector (magnitudes only, time patterns ignored)
    ///
    /// The arc-length solver scales this vector by the load factor.
    pub fn reference_load(&self, prescribed: &[bool], ff: &mut Vector) -> Result<(), StrError> {
        if prescribed.len() != ff.dim() {
            return Err("the prescribed array does not match the force vector");
        }
        ff.fill(0.0);
        for load in &self.loads {
            let node = self.nodes.get(load.node).ok_or("load points to a missing node")?;
            if !node.active {
                continue;
            }
            let g = node.reordered_dof(load.dof).map_err(|_| "load DOF index is out of range")?;
            if g >= ff.dim() {
                return Err("the force vector does not match the model numbering");
            }
            if prescribed[g] {
                continue;
            }
            ff[g] += load.value;
        }
        Ok(())
    }

    /// Propagates the global trial status to all active nodes and elements (in parallel)
    pub fn update_trial_status(
        &mut self,
        d: &Vector,
        v: Option<&Vector>,
        a: Option<&Vector>,
    ) -> Result<(), StrError> {
        let Domain { nodes, elements, .. } = self;
        nodes
            .par_iter_mut()
            .filter(|n| n.active)
            .for_each(|node| node.update_trial_status(d, v, a));
        elements
            .par_iter_mut()
            .filter(|e| e.active)
            .try_for_each(|element| element.actual.update_status(nodes))
    }

    /// Propagates the global incremental status to all active nodes and elements (in parallel)
    pub fn update_incre_status(&mut self, du: &Vector) -> Result<(), StrError> {
        let Domain { nodes, elements, .. } = self;
        nodes
            .par_iter_mut()
            .filter(|n| n.active)
            .for_each(|node| node.update_incre_status(du));
        elements
            .par_iter_mut()
            .filter(|e| e.active)
            .try_for_each(|element| element.actual.update_status(nodes))
    }

    /// Commits the trial status of all nodes and elements
    pub fn commit_status(&mut self) {
        self.nodes.par_iter_mut().for_each(|node| node.commit_status());
        self.elements
            .par_iter_mut()
            .for_each(|element| element.actual.commit_status());
    }

    /// Resets the trial status of all nodes and elements back to the committed one
    pub fn reset_status(&mut self) {
        self.nodes.par_iter_mut().for_each(|node| node.reset_status());
        self.elements
            .par_iter_mut()
            .for_each(|element| element.actual.reset_status());
    }

    /// Clears the status of all nodes and elements
    pub fn clear_status(&mut self) {
        self.nodes.par_iter_mut().for_each(|node| node.clear_status());
        self.elements
            .par_iter_mut()
            .for_each(|element| element.actual.clear_status());
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Domain;
    use crate::model::{NodalLoad, SpringElement};
    use russell_lab::Vector;

    fn three_springs() -> Domain {
        let mut domain = Domain::new();
        let a = domain.add_node(1);
        let b = domain.add_node(1);
        let c = domain.add_node(1);
        let d = domain.add_node(1);
        domain.add_element(Box::new(SpringElement::new([a, b], 1.0)));
        domain.add_element(Box::new(SpringElement::new([b, c], 1.0)));
        domain.add_element(Box::new(SpringElement::new([c, d], 1.0)));
        domain
    }

    #[test]
    fn finalize_works() {
        let mut domain = three_springs();
        domain.add_restraint(0, 0);
        let layout = domain.finalize(false).unwrap();
        assert_eq!(layout.n_equation, 4);
        assert_eq!(layout.band_low, 1);
        assert_eq!(layout.band_up, 1);
        assert_eq!(layout.prescribed, &[true, false, false, false]);
    }

    #[test]
    fn finalize_captures_errors() {
        let mut domain = Domain::new();
        assert_eq!(domain.finalize(false).err(), Some("the model has no nodes"));
        domain.add_node(1);
        assert_eq!(domain.finalize(false).err(), Some("the model has no elements"));
        domain.add_element(Box::new(SpringElement::new([0, 9], 1.0)));
        assert_eq!(
            domain.finalize(false).err(),
            Some("element connectivity points to a missing node")
        );
    }

    #[test]
    fn process_loads_works() {
        let mut domain = three_springs();
        domain.add_restraint(0, 0);
        domain.add_load(NodalLoad::constant(3, 0, 2.0));
        domain.add_load(NodalLoad::ramp(1, 0, 4.0));
        domain.add_load(NodalLoad::constant(0, 0, 9.0)); // restrained: ignored
        let layout = domain.finalize(false).unwrap();
        let mut ff = Vector::new(layout.n_equation);
        domain.process_loads(0.5, &layout.prescribed, &mut ff).unwrap();
        assert_eq!(ff.as_data(), &[0.0, 2.0, 0.0, 2.0]);
        let mut fr = Vector::new(layout.n_equation);
        domain.reference_load(&layout.prescribed, &mut fr).unwrap();
        assert_eq!(fr.as_data(), &[0.0, 4.0, 0.0, 2.0]);
        let mut short = Vector::new(2);
        assert_eq!(
            domain.process_loads(0.5, &layout.prescribed, &mut short).err(),
            Some("the prescribed array does not match the force vector")
        );
        assert_eq!(
            domain.reference_load(&layout.prescribed, &mut short).err(),
            Some("the prescribed array does not match the force vector")
        );
    }

    #[test]
    fn status_propagation_works() {
        let mut domain = three_springs();
        let layout = domain.finalize(false).unwrap();
        let d = Vector::from(&[0.1, 0.2, 0.3, 0.4]);
        domain.update_trial_status(&d, None, None).unwrap();
        assert_eq!(domain.nodes[2].trial_displacement()[0], 0.3);
        domain.commit_status();
        let du = Vector::from(&[0.0; 4]);
        domain.update_incre_status(&du).unwrap();
        assert_eq!(domain.nodes[2].trial_displacement()[0], 0.3);
        domain.reset_status();
        domain.clear_status();
        assert_eq!(domain.nodes[2].trial_displacement()[0], 0.0);
        assert_eq!(layout.n_equation, 4);
    }
}
