use super::Node;
use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Defines the interface between generic elements and the analysis core
///
/// Implementations read the trial status of their nodes and write local dense
/// blocks; the assembler scatters the blocks into the global operators using
/// the element's DOF encoding.
pub trait ElementTrait: Send + Sync {
    /// Returns the node ids connected by this element
    fn connectivity(&self) -> &[usize];

    /// Returns the number of local DOFs (length of the local vectors/matrices)
    fn ndof_local(&self) -> usize;

    /// Computes the local resistance (internal force) vector
    fn calc_resistance(&self, nodes: &[Node], rr: &mut Vector) -> Result<(), StrError>;

    /// Computes the local tangent stiffness matrix
    fn calc_stiffness(&self, nodes: &[Node], kk: &mut Matrix) -> Result<(), StrError>;

    /// Computes the local mass matrix
    fn calc_mass(&self, nodes: &[Node], mm: &mut Matrix) -> Result<(), StrError>;

    /// Computes the local damping matrix
    fn calc_damping(&self, nodes: &[Node], cc: &mut Matrix) -> Result<(), StrError>;

    /// Updates internal variables from the trial status of the nodes
    fn update_status(&mut self, nodes: &[Node]) -> Result<(), StrError>;

    /// Commits the internal variables
    fn commit_status(&mut self);

    /// Resets the internal variables back to the committed ones
    fn reset_status(&mut self);

    /// Clears the internal variables
    fn clear_status(&mut self);
}

/// Defines a generic element, wrapping an "actual" implementation
///
/// Holds the scratch local vector/matrix and the DOF encoding (the list of
/// reordered global DOF indices per local DOF) computed when the model is
/// finalized.
pub struct GenericElement {
    /// Connects to the "actual" implementation of the local equations
    pub actual: Box<dyn ElementTrait>,

    /// Only active elements are assembled
    pub active: bool,

    /// Local resistance vector (scratch)
    pub residual: Vector,

    /// Local matrix (scratch, shared by stiffness/mass/damping passes)
    pub jacobian: Matrix,

    /// DOF encoding: reordered global DOF index per local DOF
    pub local_to_global: Vec<usize>,
}

impl GenericElement {
    /// Allocates a new instance wrapping the actual implementation
    pub fn new(actual: Box<dyn ElementTrait>) -> Self {
        let neq = actual.ndof_local();
        GenericElement {
            actual,
            active: true,
            residual: Vector::new(neq),
            jacobian: Matrix::new(neq, neq),
            local_to_global: vec![0; neq],
        }
    }

    /// Computes the DOF encoding from the (possibly reordered) node numbering
    pub(crate) fn compute_local_to_global(&mut self, nodes: &[Node]) -> Result<(), StrError> {
        let mut local = 0;
        for node_id in self.actual.connectivity() {
            let node = nodes.get(*node_id).ok_or("element connectivity points to a missing node")?;
            for l in 0..node.ndof() {
                if local >= self.local_to_global.len() {
                    return Err("element DOF encoding is larger than ndof_local");
                }
                self.local_to_global[local] = node.reordered_dof(l)?;
                local += 1;
            }
        }
        if local != self.local_to_global.len() {
            return Err("element DOF encoding is smaller than ndof_local");
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::GenericElement;
    use crate::model::{Node, SpringElement};

    #[test]
    fn compute_local_to_global_works() {
        let mut nodes = vec![Node::new(0, 1), Node::new(1, 1)];
        nodes[0].number(0);
        nodes[1].number(1);
        let mut element = GenericElement::new(Box::new(SpringElement::new([0, 1], 100.0)));
        element.compute_local_to_global(&nodes).unwrap();
        assert_eq!(element.local_to_global, &[0, 1]);
        let perm = vec![1, 0];
        nodes[0].apply_permutation(&perm);
        nodes[1].apply_permutation(&perm);
        element.compute_local_to_global(&nodes).unwrap();
        assert_eq!(element.local_to_global, &[1, 0]);
    }

    #[test]
    fn compute_local_to_global_captures_errors() {
        let nodes = vec![Node::new(0, 1)];
        let mut element = GenericElement::new(Box::new(SpringElement::new([0, 7], 1.0)));
        assert_eq!(
            element.compute_local_to_global(&nodes).err(),
            Some("element connectivity points to a missing node")
        );
    }
}
