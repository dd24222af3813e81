use crate::StrError;

/// Defines a function of time used to scale load magnitudes
pub type FnTime = fn(f64) -> f64;

/// Holds a concentrated load applied to one DOF of one node
///
/// The value applied at time `t` is `value * pattern(t)`. Loads acting on
/// restrained DOFs are ignored during processing.
#[derive(Clone, Copy, Debug)]
pub struct NodalLoad {
    /// Node id
    pub node: usize,

    /// Local DOF index at the node
    pub dof: usize,

    /// Reference magnitude
    pub value: f64,

    /// Time scaling function
    pub pattern: FnTime,
}

impl NodalLoad {
    /// Allocates a new instance with an explicit time pattern
    pub fn new(node: usize, dof: usize, value: f64, pattern: FnTime) -> Self {
        NodalLoad {
            node,
            dof,
            value,
            pattern,
        }
    }

    /// Allocates a load with a constant (time-independent) magnitude
    pub fn constant(node: usize, dof: usize, value: f64) -> Self {
        NodalLoad {
            node,
            dof,
            value,
            pattern: |_| 1.0,
        }
    }

    /// Allocates a load ramped linearly in time (`value * t`)
    pub fn ramp(node: usize, dof: usize, value: f64) -> Self {
        NodalLoad {
            node,
            dof,
            value,
            pattern: |t| t,
        }
    }

    /// Evaluates the load at the given time
    pub fn value_at(&self, t: f64) -> Result<f64, StrError> {
        let v = self.value * (self.pattern)(t);
        if !v.is_finite() {
            return Err("load pattern produced a non-finite value");
        }
        Ok(v)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::NodalLoad;
    use russell_lab::approx_eq;

    #[test]
    fn value_at_works() {
        let load = NodalLoad::constant(0, 0, 3.0);
        approx_eq(load.value_at(0.0).unwrap(), 3.0, 1e-15);
        approx_eq(load.value_at(10.0).unwrap(), 3.0, 1e-15);

        let load = NodalLoad::ramp(0, 0, 3.0);
        approx_eq(load.value_at(0.5).unwrap(), 1.5, 1e-15);

        let load = NodalLoad::new(1, 0, 2.0, |t| t * t);
        approx_eq(load.value_at(3.0).unwrap(), 18.0, 1e-15);
    }

    #[test]
    fn value_at_captures_errors() {
        let load = NodalLoad::new(0, 0, 1.0, |t| 1.0 / t);
        assert_eq!(
            load.value_at(0.0).err(),
            Some("load pattern produced a non-finite value")
        );
    }
}
