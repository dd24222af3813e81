/// Holds a homogeneous restraint (fixed DOF) at one node
///
/// Restrained DOFs keep a zero increment: assembly skips their rows/columns,
/// the effective stiffness receives a unit diagonal entry, and the residual
/// is erased at these positions before and after the linear solve.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Restraint {
    /// Node id
    pub node: usize,

    /// Local DOF index at the node
    pub dof: usize,
}

impl Restraint {
    /// Allocates a new instance
    pub fn new(node: usize, dof: usize) -> Self {
        Restraint { node, dof }
    }
}
