use super::GlobalOperator;
use crate::base::{AnalysisType, StorageScheme};
use crate::StrError;
use russell_lab::{vec_add, vec_copy, vec_update, Matrix, Vector};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Holds the four temporal views of one DOF-indexed quantity
///
/// The views satisfy `trial = current + increment` after every update
/// operation; `previous` keeps the state committed one step earlier (needed by
/// the explicit integration scheme).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateVector {
    pub previous: Vector,
    pub current: Vector,
    pub trial: Vector,
    pub increment: Vector,
}

impl StateVector {
    /// Allocates a new (zeroed) instance
    pub fn new(n: usize) -> Self {
        StateVector {
            previous: Vector::new(n),
            current: Vector::new(n),
            trial: Vector::new(n),
            increment: Vector::new(n),
        }
    }

    /// Returns the dimension
    pub fn dim(&self) -> usize {
        self.trial.dim()
    }

    /// Sets the trial view and recomputes the increment (`increment = trial - current`)
    pub fn update_trial(&mut self, x: &Vector) -> Result<(), StrError> {
        vec_copy(&mut self.trial, x)?;
        vec_add(&mut self.increment, 1.0, &self.trial, -1.0, &self.current)
    }

    /// Sets the increment view and recomputes the trial (`trial = current + increment`)
    pub fn update_increment(&mut self, dx: &Vector) -> Result<(), StrError> {
        vec_copy(&mut self.increment, dx)?;
        vec_add(&mut self.trial, 1.0, &self.current, 1.0, &self.increment)
    }

    /// Adds a correction to both the trial and the increment views
    pub fn accumulate(&mut self, dx: &Vector) -> Result<(), StrError> {
        vec_update(&mut self.trial, 1.0, dx)?;
        vec_update(&mut self.increment, 1.0, dx)?;
        Ok(())
    }

    /// Commits the trial view (`previous := current`, `current := trial`, zero increment)
    pub fn commit(&mut self) -> Result<(), StrError> {
        vec_copy(&mut self.previous, &self.current)?;
        vec_copy(&mut self.current, &self.trial)?;
        self.increment.fill(0.0);
        Ok(())
    }

    /// Resets the trial view back to the committed one (zero increment)
    pub fn reset(&mut self) -> Result<(), StrError> {
        vec_copy(&mut self.trial, &self.current)?;
        self.increment.fill(0.0);
        Ok(())
    }

    /// Zeros all four views
    pub fn clear(&mut self) {
        self.previous.fill(0.0);
        self.current.fill(0.0);
        self.trial.fill(0.0);
        self.increment.fill(0.0);
    }
}

/// Holds the global numeric state of one analysis
///
/// Owns the DOF-indexed vectors (load, resistance, displacement, and, for
/// dynamics, velocity and acceleration), the "ninja" solve buffer, and the
/// global operators. There is exactly one instance per analysis and it is
/// threaded explicitly through assembler, integrator, and solver.
pub struct GlobalState {
    analysis: AnalysisType,
    scheme: StorageScheme,
    n: usize,
    band_low: usize,
    band_up: usize,
    initialized: bool,

    /// Committed time
    pub t: f64,

    /// Current sub-increment size
    pub dt: f64,

    /// Committed load factor (continuation methods)
    pub load_factor: f64,

    /// External load
    pub load: StateVector,

    /// Internal resistance
    pub resistance: StateVector,

    /// Displacement
    pub displacement: StateVector,

    /// Velocity (dynamics only)
    pub velocity: Option<StateVector>,

    /// Acceleration (dynamics only)
    pub acceleration: Option<StateVector>,

    /// Solve buffer (receives the linear-system solution)
    pub ninja: Vector,

    /// Effective (tangent) stiffness operator
    pub stiffness: GlobalOperator,

    /// Mass operator (dynamics only)
    pub mass: Option<GlobalOperator>,

    /// Damping operator (dynamics only)
    pub damping: Option<GlobalOperator>,
}

impl GlobalState {
    /// Allocates a new instance sized to the DOF layout
    pub fn new(
        analysis: AnalysisType,
        scheme: StorageScheme,
        n: usize,
        band_low: usize,
        band_up: usize,
    ) -> Result<Self, StrError> {
        let mut state = GlobalState {
            analysis,
            scheme,
            n,
            band_low,
            band_up,
            initialized: false,
            t: 0.0,
            dt: 0.0,
            load_factor: 0.0,
            load: StateVector::new(0),
            resistance: StateVector::new(0),
            displacement: StateVector::new(0),
            velocity: None,
            acceleration: None,
            ninja: Vector::new(0),
            stiffness: GlobalOperator::new(scheme, n, band_low, band_up)?,
            mass: None,
            damping: None,
        };
        state.initialize()?;
        Ok(state)
    }

    /// Returns the number of equations
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Returns the analysis type
    pub fn analysis(&self) -> AnalysisType {
        self.analysis
    }

    /// Sets a new size and invalidates the allocation
    pub fn set_size(&mut self, n: usize) -> &mut Self {
        self.n = n;
        self.initialized = false;
        self
    }

    /// Sets new semi-bandwidths and invalidates the allocation
    pub fn set_bandwidth(&mut self, band_low: usize, band_up: usize) -> &mut Self {
        self.band_low = band_low;
        self.band_up = band_up;
        self.initialized = false;
        self
    }

    /// Sets a new storage scheme and invalidates the allocation
    pub fn set_storage_scheme(&mut self, scheme: StorageScheme) -> &mut Self {
        self.scheme = scheme;
        self.initialized = false;
        self
    }

    /// (Re)allocates all vectors and operators (no-op if already initialized)
    pub fn initialize(&mut self) -> Result<(), StrError> {
        if self.initialized && self.n > 0 {
            return Ok(());
        }
        if self.n < 1 {
            return Err("the global state requires at least one equation");
        }
        self.load = StateVector::new(self.n);
        self.resistance = StateVector::new(self.n);
        self.displacement = StateVector::new(self.n);
        self.ninja = Vector::new(self.n);
        self.stiffness = GlobalOperator::new(self.scheme, self.n, self.band_low, self.band_up)?;
        match self.analysis {
            AnalysisType::Statics => {
                self.velocity = None;
                self.acceleration = None;
                self.mass = None;
                self.damping = None;
            }
            AnalysisType::Dynamics => {
                self.velocity = Some(StateVector::new(self.n));
                self.acceleration = Some(StateVector::new(self.n));
                self.mass = Some(GlobalOperator::new(self.scheme, self.n, self.band_low, self.band_up)?);
                self.damping = Some(GlobalOperator::new(self.scheme, self.n, self.band_low, self.band_up)?);
            }
        }
        self.initialized = true;
        Ok(())
    }

    /// Returns whether the allocation matches the configured topology
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    // guard against assembling with a stale topology
    fn check_initialized(&self) -> Result<(), StrError> {
        if !self.initialized {
            return Err("the global state must be initialized before assembly");
        }
        Ok(())
    }

    /// Scatter-adds a local resistance vector into the trial resistance
    ///
    /// Prescribed (restrained) DOFs are skipped.
    pub fn assemble_resistance(
        &mut self,
        local: &Vector,
        encoding: &[usize],
        prescribed: &[bool],
    ) -> Result<(), StrError> {
        self.check_initialized()?;
        if local.dim() != encoding.len() {
            return Err("the local vector dimension does not match the DOF encoding");
        }
        if prescribed.len() < self.n {
            return Err("the prescribed array does not match the global state");
        }
        for (l, &g) in encoding.iter().enumerate() {
            if g >= self.n {
                return Err("the DOF encoding points outside of the global state");
            }
            if prescribed[g] {
                continue;
            }
            self.resistance.trial[g] += local[l];
        }
        Ok(())
    }

    // scatter-adds a local matrix into a global operator
    fn assemble_operator(
        op: &mut GlobalOperator,
        n: usize,
        local: &Matrix,
        encoding: &[usize],
        prescribed: &[bool],
    ) -> Result<(), StrError> {
        let (nrow, ncol) = local.dims();
        if nrow != encoding.len() || ncol != encoding.len() {
            return Err("the local matrix dimensions do not match the DOF encoding");
        }
        if prescribed.len() < n {
            return Err("the prescribed array does not match the global state");
        }
        for (li, &gi) in encoding.iter().enumerate() {
            if gi >= n {
                return Err("the DOF encoding points outside of the global state");
            }
            if prescribed[gi] {
                continue;
            }
            for (lj, &gj) in encoding.iter().enumerate() {
                if gj >= n {
                    return Err("the DOF encoding points outside of the global state");
                }
                if prescribed[gj] {
                    continue;
                }
                op.add(gi, gj, local.get(li, lj))?;
            }
        }
        Ok(())
    }

    /// Scatter-adds a local stiffness matrix into the stiffness operator
    pub fn assemble_stiffness(
        &mut self,
        local: &Matrix,
        encoding: &[usize],
        prescribed: &[bool],
    ) -> Result<(), StrError> {
        self.check_initialized()?;
        GlobalState::assemble_operator(&mut self.stiffness, self.n, local, encoding, prescribed)
    }

    /// Scatter-adds a local mass matrix into the mass operator (dynamics only)
    pub fn assemble_mass(
        &mut self,
        local: &Matrix,
        encoding: &[usize],
        prescribed: &[bool],
    ) -> Result<(), StrError> {
        self.check_initialized()?;
        let mass = self
            .mass
            .as_mut()
            .ok_or("the analysis type does not carry a mass operator")?;
        GlobalState::assemble_operator(mass, self.n, local, encoding, prescribed)
    }

    /// Scatter-adds a local damping matrix into the damping operator (dynamics only)
    pub fn assemble_damping(
        &mut self,
        local: &Matrix,
        encoding: &[usize],
        prescribed: &[bool],
    ) -> Result<(), StrError> {
        self.check_initialized()?;
        let damping = self
            .damping
            .as_mut()
            .ok_or("the analysis type does not carry a damping operator")?;
        GlobalState::assemble_operator(damping, self.n, local, encoding, prescribed)
    }

    /// Commits the trial views of all state vectors
    pub fn commit(&mut self) -> Result<(), StrError> {
        self.load.commit()?;
        self.resistance.commit()?;
        self.displacement.commit()?;
        if let Some(v) = self.velocity.as_mut() {
            v.commit()?;
        }
        if let Some(a) = self.acceleration.as_mut() {
            a.commit()?;
        }
        Ok(())
    }

    /// Resets the trial views of all state vectors back to the committed ones
    pub fn reset(&mut self) -> Result<(), StrError> {
        self.load.reset()?;
        self.resistance.reset()?;
        self.displacement.reset()?;
        if let Some(v) = self.velocity.as_mut() {
            v.reset()?;
        }
        if let Some(a) = self.acceleration.as_mut() {
            a.reset()?;
        }
        Ok(())
    }

    /// Zeros all state vectors and operators
    pub fn clear(&mut self) {
        self.t = 0.0;
        self.dt = 0.0;
        self.load_factor = 0.0;
        self.load.clear();
        self.resistance.clear();
        self.displacement.clear();
        if let Some(v) = self.velocity.as_mut() {
            v.clear();
        }
        if let Some(a) = self.acceleration.as_mut() {
            a.clear();
        }
        self.ninja.fill(0.0);
        self.stiffness.zero();
        if let Some(m) = self.mass.as_mut() {
            m.zero();
        }
        if let Some(c) = self.damping.as_mut() {
            c.zero();
        }
    }
}

/// Holds a serializable snapshot of the committed analysis state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateRecord {
    pub t: f64,
    pub dt: f64,
    pub load_factor: f64,
    pub displacement: Vector,
    pub velocity: Option<Vector>,
    pub acceleration: Option<Vector>,
}

impl StateRecord {
    /// Extracts a snapshot of the committed state
    pub fn from_state(state: &GlobalState) -> Self {
        StateRecord {
            t: state.t,
            dt: state.dt,
            load_factor: state.load_factor,
            displacement: state.displacement.current.clone(),
            velocity: state.velocity.as_ref().map(|v| v.current.clone()),
            acceleration: state.acceleration.as_ref().map(|a| a.current.clone()),
        }
    }

    /// Restores a snapshot into the committed (and trial) state
    pub fn to_state(&self, state: &mut GlobalState) -> Result<(), StrError> {
        if self.displacement.dim() != state.dim() {
            return Err("the recorded state has an incompatible dimension");
        }
        state.t = self.t;
        state.dt = self.dt;
        state.load_factor = self.load_factor;
        vec_copy(&mut state.displacement.current, &self.displacement)?;
        if let (Some(v), Some(rec)) = (state.velocity.as_mut(), self.velocity.as_ref()) {
            vec_copy(&mut v.current, rec)?;
        }
        if let (Some(a), Some(rec)) = (state.acceleration.as_mut(), self.acceleration.as_ref()) {
            vec_copy(&mut a.current, rec)?;
        }
        state.displacement.reset()?;
        if let Some(v) = state.velocity.as_mut() {
            v.reset()?;
        }
        if let Some(a) = state.acceleration.as_mut() {
            a.reset()?;
        }
        Ok(())
    }

    /// Reads a JSON file containing a state record
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open file")?;
        let buffered = BufReader::new(input);
        let record = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(record)
    }

    /// Writes a JSON file with this state record
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let mut file = File::create(&path).map_err(|_| "cannot create file")?;
        serde_json::to_writer(&mut file, &self).map_err(|_| "cannot write file")?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{GlobalState, StateRecord, StateVector};
    use crate::base::{AnalysisType, StorageScheme};
    use russell_lab::{vec_approx_eq, Matrix, Vector};

    #[test]
    fn trial_equals_current_plus_increment() {
        let mut sv = StateVector::new(2);
        let x = Vector::from(&[1.0, 2.0]);
        sv.update_trial(&x).unwrap();
        vec_approx_eq(&sv.increment, &[1.0, 2.0], 1e-15);
        sv.commit().unwrap();
        let dx = Vector::from(&[0.5, -0.5]);
        sv.update_increment(&dx).unwrap();
        vec_approx_eq(&sv.trial, &[1.5, 1.5], 1e-15);
        sv.accumulate(&dx).unwrap();
        vec_approx_eq(&sv.trial, &[2.0, 1.0], 1e-15);
        vec_approx_eq(&sv.increment, &[1.0, -1.0], 1e-15);
    }

    #[test]
    fn commit_is_idempotent() {
        let mut sv = StateVector::new(1);
        let x = Vector::from(&[3.0]);
        sv.update_trial(&x).unwrap();
        sv.commit().unwrap();
        sv.commit().unwrap();
        assert_eq!(sv.current[0], 3.0);
        assert_eq!(sv.increment[0], 0.0);
        assert_eq!(sv.previous[0], 3.0);
    }

    #[test]
    fn reset_restores_the_committed_state() {
        let mut sv = StateVector::new(1);
        let x = Vector::from(&[3.0]);
        sv.update_trial(&x).unwrap();
        sv.commit().unwrap();
        let y = Vector::from(&[9.0]);
        sv.update_trial(&y).unwrap();
        sv.update_trial(&y).unwrap();
        sv.reset().unwrap();
        assert_eq!(sv.trial[0], 3.0);
        assert_eq!(sv.increment[0], 0.0);
    }

    #[test]
    fn allocation_follows_the_analysis_type() {
        let state = GlobalState::new(AnalysisType::Statics, StorageScheme::Full, 3, 1, 1).unwrap();
        assert!(state.velocity.is_none());
        assert!(state.mass.is_none());
        let state = GlobalState::new(AnalysisType::Dynamics, StorageScheme::Band, 3, 1, 1).unwrap();
        assert!(state.velocity.is_some());
        assert!(state.mass.is_some());
        assert!(state.damping.is_some());
    }

    #[test]
    fn assemble_works_and_captures_errors() {
        let mut state = GlobalState::new(AnalysisType::Statics, StorageScheme::Full, 2, 1, 1).unwrap();
        let prescribed = vec![false, true];
        let local = Vector::from(&[1.0, 2.0]);
        state.assemble_resistance(&local, &[0, 1], &prescribed).unwrap();
        assert_eq!(state.resistance.trial[0], 1.0);
        assert_eq!(state.resistance.trial[1], 0.0); // prescribed: skipped
        let kk = Matrix::from(&[[4.0, -4.0], [-4.0, 4.0]]);
        state.assemble_stiffness(&kk, &[0, 1], &prescribed).unwrap();
        assert_eq!(state.stiffness.get(0, 0), 4.0);
        assert_eq!(state.stiffness.get(0, 1), 0.0);
        assert_eq!(state.stiffness.get(1, 1), 0.0);
        assert_eq!(
            state.assemble_resistance(&local, &[0, 5], &prescribed).err(),
            Some("the DOF encoding points outside of the global state")
        );
        assert_eq!(
            state.assemble_mass(&kk, &[0, 1], &prescribed).err(),
            Some("the analysis type does not carry a mass operator")
        );
        assert_eq!(
            state.assemble_resistance(&local, &[0, 1], &[false]).err(),
            Some("the prescribed array does not match the global state")
        );
        assert_eq!(
            state.assemble_stiffness(&kk, &[0, 1], &[false]).err(),
            Some("the prescribed array does not match the global state")
        );
        state.set_size(3);
        assert_eq!(
            state.assemble_resistance(&local, &[0, 1], &prescribed).err(),
            Some("the global state must be initialized before assembly")
        );
    }

    #[test]
    fn record_round_trip_works() {
        let mut state = GlobalState::new(AnalysisType::Statics, StorageScheme::Full, 2, 1, 1).unwrap();
        state.t = 0.5;
        let x = Vector::from(&[1.0, 2.0]);
        state.displacement.update_trial(&x).unwrap();
        state.commit().unwrap();
        let record = StateRecord::from_state(&state);
        let mut other = GlobalState::new(AnalysisType::Statics, StorageScheme::Full, 2, 1, 1).unwrap();
        record.to_state(&mut other).unwrap();
        assert_eq!(other.t, 0.5);
        vec_approx_eq(&other.displacement.current, &[1.0, 2.0], 1e-15);
        vec_approx_eq(&other.displacement.trial, &[1.0, 2.0], 1e-15);
    }
}
