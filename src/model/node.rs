use crate::StrError;
use russell_lab::Vector;

/// Holds one node of the model with its local slice of the analysis state
///
/// Nodes own only their own local copies of displacement, velocity, and
/// acceleration; the global vectors are exclusively owned by the global state
/// and synchronized to the nodes by the assembler using the DOF indices.
///
/// Two DOF numberings coexist: the *original* contiguous numbering assigned
/// when the model is finalized, and the *reordered* numbering produced by the
/// bandwidth-reducing permutation. The original index is kept for
/// traceability; storage and assembly use the reordered one.
#[derive(Clone, Debug)]
pub struct Node {
    /// Identifier (index in the domain's node arena)
    pub id: usize,

    /// Only active nodes receive DOF numbers
    pub active: bool,

    ndof: usize,
    dofs: Vec<usize>,
    reordered: Vec<usize>,
    numbered: bool,
    trial_displacement: Vector,
    current_displacement: Vector,
    incre_displacement: Vector,
    trial_velocity: Vector,
    current_velocity: Vector,
    trial_acceleration: Vector,
    current_acceleration: Vector,
}

impl Node {
    /// Allocates a new instance with the given number of DOFs
    pub fn new(id: usize, ndof: usize) -> Self {
        Node {
            id,
            active: true,
            ndof,
            dofs: vec![0; ndof],
            reordered: vec![0; ndof],
            numbered: false,
            trial_displacement: Vector::new(ndof),
            current_displacement: Vector::new(ndof),
            incre_displacement: Vector::new(ndof),
            trial_velocity: Vector::new(ndof),
            current_velocity: Vector::new(ndof),
            trial_acceleration: Vector::new(ndof),
            current_acceleration: Vector::new(ndof),
        }
    }

    /// Returns the number of DOFs of this node
    pub fn ndof(&self) -> usize {
        self.ndof
    }

    /// Assigns contiguous original DOF indices starting at `first`
    ///
    /// The reordered indices start equal to the original ones.
    pub(crate) fn number(&mut self, first: usize) {
        for l in 0..self.ndof {
            self.dofs[l] = first + l;
            self.reordered[l] = first + l;
        }
        self.numbered = true;
    }

    /// Applies a permutation (`perm[original] = reordered`) to the DOF indices
    pub(crate) fn apply_permutation(&mut self, perm: &[usize]) {
        for l in 0..self.ndof {
            self.reordered[l] = perm[self.dofs[l]];
        }
    }

    /// Returns the original global index of a local DOF
    pub fn original_dof(&self, local: usize) -> Result<usize, StrError> {
        if !self.numbered {
            return Err("node has not been numbered yet");
        }
        if local >= self.ndof {
            return Err("local DOF index is out of range");
        }
        Ok(self.dofs[local])
    }

    /// Returns the reordered global index of a local DOF
    pub fn reordered_dof(&self, local: usize) -> Result<usize, StrError> {
        if !self.numbered {
            return Err("node has not been numbered yet");
        }
        if local >= self.ndof {
            return Err("local DOF index is out of range");
        }
        Ok(self.reordered[local])
    }

    /// Returns the trial displacement slice
    pub fn trial_displacement(&self) -> &Vector {
        &self.trial_displacement
    }

    /// Returns the trial velocity slice
    pub fn trial_velocity(&self) -> &Vector {
        &self.trial_velocity
    }

    /// Returns the trial acceleration slice
    pub fn trial_acceleration(&self) -> &Vector {
        &self.trial_acceleration
    }

    /// Returns the incremental displacement slice (trial minus current)
    pub fn incre_displacement(&self) -> &Vector {
        &self.incre_displacement
    }

    /// Pulls this node's trial status from the global vectors
    ///
    /// Velocity/acceleration vectors are optional (absent in static analyses).
    pub fn update_trial_status(&mut self, d: &Vector, v: Option<&Vector>, a: Option<&Vector>) {
        for l in 0..self.ndof {
            let g = self.reordered[l];
            self.trial_displacement[l] = d[g];
            self.incre_displacement[l] = d[g] - self.current_displacement[l];
            if let Some(v) = v {
                self.trial_velocity[l] = v[g];
            }
            if let Some(a) = a {
                self.trial_acceleration[l] = a[g];
            }
        }
    }

    /// Pulls this node's incremental status from the global increment vector
    ///
    /// Maintains `trial = current + increment` on the local slice.
    pub fn update_incre_status(&mut self, du: &Vector) {
        for l in 0..self.ndof {
            let g = self.reordered[l];
            self.incre_displacement[l] = du[g];
            self.trial_displacement[l] = self.current_displacement[l] + du[g];
        }
    }

    /// Commits the trial status (`current := trial`, zero increment)
    pub fn commit_status(&mut self) {
        for l in 0..self.ndof {
            self.current_displacement[l] = self.trial_displacement[l];
            self.current_velocity[l] = self.trial_velocity[l];
            self.current_acceleration[l] = self.trial_acceleration[l];
            self.incre_displacement[l] = 0.0;
        }
    }

    /// Resets the trial status back to the committed one
    pub fn reset_status(&mut self) {
        for l in 0..self.ndof {
            self.trial_displacement[l] = self.current_displacement[l];
            self.trial_velocity[l] = self.current_velocity[l];
            self.trial_acceleration[l] = self.current_acceleration[l];
            self.incre_displacement[l] = 0.0;
        }
    }

    /// Clears all local status slices
    pub fn clear_status(&mut self) {
        self.trial_displacement.fill(0.0);
        self.current_displacement.fill(0.0);
        self.incre_displacement.fill(0.0);
        self.trial_velocity.fill(0.0);
        self.current_velocity.fill(0.0);
        self.trial_acceleration.fill(0.0);
        self.current_acceleration.fill(0.0);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Node;
    use russell_lab::Vector;

    #[test]
    fn numbering_works() {
        let mut node = Node::new(0, 2);
        assert_eq!(node.ndof(), 2);
        assert_eq!(node.original_dof(0).err(), Some("node has not been numbered yet"));
        node.number(3);
        assert_eq!(node.original_dof(0).unwrap(), 3);
        assert_eq!(node.original_dof(1).unwrap(), 4);
        assert_eq!(node.reordered_dof(1).unwrap(), 4);
        assert_eq!(node.original_dof(2).err(), Some("local DOF index is out of range"));
        let perm = vec![0, 1, 2, 5, 4, 3];
        node.apply_permutation(&perm);
        assert_eq!(node.reordered_dof(0).unwrap(), 5);
        assert_eq!(node.reordered_dof(1).unwrap(), 4);
        assert_eq!(node.original_dof(0).unwrap(), 3); // original preserved
    }

    #[test]
    fn status_cycle_works() {
        let mut node = Node::new(0, 1);
        node.number(0);
        let d = Vector::from(&[0.5]);
        node.update_trial_status(&d, None, None);
        assert_eq!(node.trial_displacement()[0], 0.5);
        assert_eq!(node.incre_displacement()[0], 0.5);
        node.commit_status();
        assert_eq!(node.incre_displacement()[0], 0.0);
        let d = Vector::from(&[0.7]);
        node.update_trial_status(&d, None, None);
        assert!((node.incre_displacement()[0] - 0.2).abs() < 1e-15);
        node.reset_status();
        assert_eq!(node.trial_displacement()[0], 0.5);
        node.clear_status();
        assert_eq!(node.trial_displacement()[0], 0.0);
    }

    #[test]
    fn incre_status_works() {
        let mut node = Node::new(0, 1);
        node.number(0);
        let d = Vector::from(&[1.0]);
        node.update_trial_status(&d, None, None);
        node.commit_status();
        let du = Vector::from(&[0.25]);
        node.update_incre_status(&du);
        assert_eq!(node.trial_displacement()[0], 1.25);
        assert_eq!(node.incre_displacement()[0], 0.25);
    }
}
