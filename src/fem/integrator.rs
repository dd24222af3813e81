use super::{estimate_max_eigenvalue, Assembler, GlobalState};
use crate::base::AnalysisType;
use crate::model::Domain;
use crate::StrError;
use russell_lab::Vector;
use std::f64::consts::PI;

/// Converts the equation of motion into an equivalent algebraic system
///
/// The integrator folds the inertial and damping effects of the current
/// increment into an effective resistance and an effective stiffness so that
/// the nonlinear solvers only ever see an algebraic problem. Three families
/// are available besides the static pass-through:
///
/// * `Newmark` — implicit, unconditionally stable for `beta >= 0.5` and
///   `alpha >= 0.25 (0.5 + beta)²`
/// * `GeneralizedAlpha` — implicit with controllable numerical dissipation
///   (`alpha_m <= alpha_f <= 0.5`)
/// * `CentralDifference` — explicit and conditionally stable; the increment
///   size is checked against `pi / sqrt(max eig(M⁻¹ K))`
///
/// Coefficients are recomputed by [`Integrator::update_increment`] whenever
/// the increment size changes.
pub enum Integrator {
    /// Static pass-through (no inertial or damping terms)
    Statics,

    /// Implicit Newmark scheme
    Newmark {
        alpha: f64,
        beta: f64,
        c0: f64,
        c1: f64,
        c2: f64,
        c3: f64,
        c6: f64,
        c7: f64,
    },

    /// Implicit generalized-alpha scheme
    GeneralizedAlpha {
        alpha_m: f64,
        alpha_f: f64,
        gamma: f64,
        beta: f64,
        /// Matrix coefficients (mass and damping weights of the effective stiffness)
        m0: f64,
        m1: f64,
        c0: f64,
        c2: f64,
        c3: f64,
        c6: f64,
        c7: f64,
    },

    /// Explicit central-difference scheme
    CentralDifference { c0: f64, c1: f64, primed: bool },
}

impl Integrator {
    /// Allocates a Newmark integrator (the parameters must satisfy the stability bounds)
    pub fn new_newmark(alpha: f64, beta: f64) -> Result<Self, StrError> {
        if beta < 0.5 || alpha < 0.25 * (0.5 + beta) * (0.5 + beta) {
            return Err("invalid Newmark integration parameters");
        }
        Ok(Integrator::Newmark {
            alpha,
            beta,
            c0: 0.0,
            c1: 0.0,
            c2: 0.0,
            c3: 0.0,
            c6: 0.0,
            c7: 0.0,
        })
    }

    /// Allocates a generalized-alpha integrator (requires `alpha_m <= alpha_f <= 0.5`)
    pub fn new_generalized_alpha(alpha_m: f64, alpha_f: f64) -> Result<Self, StrError> {
        if alpha_m > alpha_f || alpha_f > 0.5 {
            return Err("invalid generalized-alpha integration parameters");
        }
        let gamma = 0.5 - alpha_m + alpha_f;
        let beta = 0.25 * (gamma + 0.5) * (gamma + 0.5);
        Ok(Integrator::GeneralizedAlpha {
            alpha_m,
            alpha_f,
            gamma,
            beta,
            m0: 0.0,
            m1: 0.0,
            c0: 0.0,
            c2: 0.0,
            c3: 0.0,
            c6: 0.0,
            c7: 0.0,
        })
    }

    /// Allocates an explicit central-difference integrator
    pub fn new_central_difference() -> Self {
        Integrator::CentralDifference {
            c0: 0.0,
            c1: 0.0,
            primed: false,
        }
    }

    /// Returns the analysis type required by this integrator
    pub fn analysis(&self) -> AnalysisType {
        match self {
            Integrator::Statics => AnalysisType::Statics,
            _ => AnalysisType::Dynamics,
        }
    }

    /// Returns whether the scheme is explicit (single solve, no iteration)
    pub fn explicit(&self) -> bool {
        matches!(self, Integrator::CentralDifference { .. })
    }

    /// Prepares a new sub-increment of the given size
    ///
    /// Recomputes the integration coefficients, reassembles the (constant)
    /// mass and damping operators, recovers the trial velocity/acceleration
    /// for a zero displacement increment, and, for the explicit scheme, checks
    /// the increment size against the stability limit.
    pub fn update_increment(
        &mut self,
        domain: &mut Domain,
        assembler: &Assembler,
        state: &mut GlobalState,
        dt: f64,
    ) -> Result<(), StrError> {
        if dt <= 0.0 {
            return Err("the increment size must be positive");
        }
        state.dt = dt;
        match self {
            Integrator::Statics => Ok(()),
            Integrator::Newmark {
                alpha,
                beta,
                c0,
                c1,
                c2,
                c3,
                c6,
                c7,
            } => {
                *c0 = 1.0 / (*alpha * dt * dt);
                *c1 = *beta / (*alpha * dt);
                *c2 = 1.0 / (*alpha * dt);
                *c3 = 0.5 / *alpha - 1.0;
                *c6 = dt * (1.0 - *beta);
                *c7 = *beta * dt;
                assembler.assemble_mass(domain, state)?;
                assembler.assemble_damping(domain, state)?;
                self.update_trial(state)
            }
            Integrator::GeneralizedAlpha {
                alpha_m,
                alpha_f,
                gamma,
                beta,
                m0,
                m1,
                c0,
                c2,
                c3,
                c6,
                c7,
            } => {
                *m0 = (1.0 - *alpha_m) / (*beta * dt * dt);
                *m1 = (1.0 - *alpha_f) * *gamma / (*beta * dt);
                *c0 = 1.0 / (*beta * dt * dt);
                *c2 = 1.0 / (*beta * dt);
                *c3 = 0.5 / *beta - 1.0;
                *c6 = dt * (1.0 - *gamma);
                *c7 = *gamma * dt;
                assembler.assemble_mass(domain, state)?;
                assembler.assemble_damping(domain, state)?;
                self.update_trial(state)
            }
            Integrator::CentralDifference { c0, c1, primed } => {
                *c0 = 1.0 / (dt * dt);
                *c1 = 1.0 / (2.0 * dt);
                assembler.assemble_mass(domain, state)?;
                assembler.assemble_damping(domain, state)?;
                // restrained rows would make the mass singular
                let mass = state.mass.as_mut().ok_or("the analysis type does not carry a mass operator")?;
                assembler.set_prescribed_diagonal(mass)?;
                if !*primed {
                    // extrapolate the missing pre-step displacement
                    let u = &state.displacement.current;
                    let v = &state
                        .velocity
                        .as_ref()
                        .ok_or("the analysis type does not carry a velocity")?
                        .current;
                    let a = &state
                        .acceleration
                        .as_ref()
                        .ok_or("the analysis type does not carry an acceleration")?
                        .current;
                    let mut pre = Vector::new(state.dim());
                    for i in 0..state.dim() {
                        pre[i] = u[i] - dt * v[i] + 0.5 * dt * dt * a[i];
                    }
                    for i in 0..state.dim() {
                        state.displacement.previous[i] = pre[i];
                    }
                    *primed = true;
                }
                // conditional stability check
                assembler.assemble_stiffness(domain, state)?;
                let GlobalState { stiffness, mass, .. } = state;
                let mass = mass.as_mut().ok_or("the analysis type does not carry a mass operator")?;
                let lambda = estimate_max_eigenvalue(stiffness, mass)?;
                if lambda > 0.0 {
                    let max_dt = PI / lambda.sqrt();
                    if dt > max_dt {
                        return Err("the increment size exceeds the stability limit of the explicit scheme");
                    }
                }
                Ok(())
            }
        }
    }

    /// Evaluates the external load for the current increment
    ///
    /// The generalized-alpha scheme samples the load at an intermediate time;
    /// the explicit scheme samples it at the beginning of the increment.
    pub fn process_load(
        &self,
        domain: &Domain,
        assembler: &Assembler,
        state: &mut GlobalState,
    ) -> Result<(), StrError> {
        let t_trial = state.t + state.dt;
        let time = match self {
            Integrator::Statics | Integrator::Newmark { .. } => t_trial,
            Integrator::GeneralizedAlpha { alpha_f, .. } => alpha_f * t_trial + (1.0 - alpha_f) * state.t,
            Integrator::CentralDifference { .. } => state.t,
        };
        let mut f = Vector::new(state.dim());
        domain.process_loads(time, &assembler.prescribed, &mut f)?;
        state.load.update_trial(&f)
    }

    /// Assembles the effective resistance (element resistance plus inertial/damping terms)
    pub fn assemble_resistance(
        &self,
        domain: &mut Domain,
        assembler: &Assembler,
        state: &mut GlobalState,
    ) -> Result<(), StrError> {
        assembler.assemble_resistance(domain, state)?;
        let n = state.dim();
        match self {
            Integrator::Statics => Ok(()),
            Integrator::Newmark { .. } => {
                let mut tmp = Vector::new(n);
                let a = state
                    .acceleration
                    .as_ref()
                    .ok_or("the analysis type does not carry an acceleration")?;
                let mass = state.mass.as_ref().ok_or("the analysis type does not carry a mass operator")?;
                mass.mul_vec(&mut tmp, &a.trial)?;
                for i in 0..n {
                    state.resistance.trial[i] += tmp[i];
                }
                let v = state.velocity.as_ref().ok_or("the analysis type does not carry a velocity")?;
                let damping = state
                    .damping
                    .as_ref()
                    .ok_or("the analysis type does not carry a damping operator")?;
                damping.mul_vec(&mut tmp, &v.trial)?;
                for i in 0..n {
                    state.resistance.trial[i] += tmp[i];
                }
                Ok(())
            }
            Integrator::GeneralizedAlpha { alpha_m, alpha_f, .. } => {
                // weighted resistance between the trial and committed states
                for i in 0..n {
                    state.resistance.trial[i] =
                        (1.0 - alpha_f) * state.resistance.trial[i] + alpha_f * state.resistance.current[i];
                }
                let mut w = Vector::new(n);
                let a = state
                    .acceleration
                    .as_ref()
                    .ok_or("the analysis type does not carry an acceleration")?;
                for i in 0..n {
                    w[i] = (1.0 - alpha_m) * a.trial[i] + alpha_m * a.current[i];
                }
                let mut tmp = Vector::new(n);
                let mass = state.mass.as_ref().ok_or("the analysis type does not carry a mass operator")?;
                mass.mul_vec(&mut tmp, &w)?;
                for i in 0..n {
                    state.resistance.trial[i] += tmp[i];
                }
                let v = state.velocity.as_ref().ok_or("the analysis type does not carry a velocity")?;
                for i in 0..n {
                    w[i] = (1.0 - alpha_f) * v.trial[i] + alpha_f * v.current[i];
                }
                let damping = state
                    .damping
                    .as_ref()
                    .ok_or("the analysis type does not carry a damping operator")?;
                damping.mul_vec(&mut tmp, &w)?;
                for i in 0..n {
                    state.resistance.trial[i] += tmp[i];
                }
                Ok(())
            }
            Integrator::CentralDifference { c0, c1, .. } => {
                // w = u_current - u_previous
                let mut w = Vector::new(n);
                for i in 0..n {
                    w[i] = state.displacement.current[i] - state.displacement.previous[i];
                }
                let mut tmp = Vector::new(n);
                let mass = state.mass.as_ref().ok_or("the analysis type does not carry a mass operator")?;
                mass.mul_vec(&mut tmp, &w)?;
                for i in 0..n {
                    state.resistance.trial[i] -= c0 * tmp[i];
                }
                let damping = state
                    .damping
                    .as_ref()
                    .ok_or("the analysis type does not carry a damping operator")?;
                damping.mul_vec(&mut tmp, &w)?;
                for i in 0..n {
                    state.resistance.trial[i] += c1 * tmp[i];
                }
                Ok(())
            }
        }
    }

    /// Assembles the effective stiffness operator (with a unit diagonal at restrained DOFs)
    pub fn assemble_matrix(
        &self,
        domain: &mut Domain,
        assembler: &Assembler,
        state: &mut GlobalState,
    ) -> Result<(), StrError> {
        match self {
            Integrator::Statics => {
                assembler.assemble_stiffness(domain, state)?;
            }
            Integrator::Newmark { c0, c1, .. } => {
                assembler.assemble_stiffness(domain, state)?;
                let mass = state.mass.as_ref().ok_or("the analysis type does not carry a mass operator")?;
                state.stiffness.add_scaled(mass, *c0)?;
                let damping = state
                    .damping
                    .as_ref()
                    .ok_or("the analysis type does not carry a damping operator")?;
                state.stiffness.add_scaled(damping, *c1)?;
            }
            Integrator::GeneralizedAlpha { alpha_f, m0, m1, .. } => {
                assembler.assemble_stiffness(domain, state)?;
                state.stiffness.scale(1.0 - alpha_f);
                let mass = state.mass.as_ref().ok_or("the analysis type does not carry a mass operator")?;
                state.stiffness.add_scaled(mass, *m0)?;
                let damping = state
                    .damping
                    .as_ref()
                    .ok_or("the analysis type does not carry a damping operator")?;
                state.stiffness.add_scaled(damping, *m1)?;
            }
            Integrator::CentralDifference { c0, c1, .. } => {
                // no tangent stiffness: the effective operator is purely inertial
                state.stiffness.zero();
                let mass = state.mass.as_ref().ok_or("the analysis type does not carry a mass operator")?;
                state.stiffness.add_scaled(mass, *c0)?;
                let damping = state
                    .damping
                    .as_ref()
                    .ok_or("the analysis type does not carry a damping operator")?;
                state.stiffness.add_scaled(damping, *c1)?;
            }
        }
        assembler.set_prescribed_diagonal(&mut state.stiffness)
    }

    /// Recovers the trial velocity and acceleration from the displacement increment
    pub fn update_trial(&self, state: &mut GlobalState) -> Result<(), StrError> {
        let n = state.dim();
        match self {
            Integrator::Statics => Ok(()),
            Integrator::Newmark { c0, c2, c3, c6, c7, .. }
            | Integrator::GeneralizedAlpha { c0, c2, c3, c6, c7, .. } => {
                let mut a_new = Vector::new(n);
                let mut v_new = Vector::new(n);
                {
                    let du = &state.displacement.increment;
                    let v = state.velocity.as_ref().ok_or("the analysis type does not carry a velocity")?;
                    let a = state
                        .acceleration
                        .as_ref()
                        .ok_or("the analysis type does not carry an acceleration")?;
                    for i in 0..n {
                        a_new[i] = c0 * du[i] - c2 * v.current[i] - c3 * a.current[i];
                        v_new[i] = v.current[i] + c6 * a.current[i] + c7 * a_new[i];
                    }
                }
                state
                    .acceleration
                    .as_mut()
                    .ok_or("the analysis type does not carry an acceleration")?
                    .update_trial(&a_new)?;
                state
                    .velocity
                    .as_mut()
                    .ok_or("the analysis type does not carry a velocity")?
                    .update_trial(&v_new)
            }
            Integrator::CentralDifference { c0, c1, .. } => {
                let mut a_new = Vector::new(n);
                let mut v_new = Vector::new(n);
                {
                    let du = &state.displacement.increment;
                    let u = &state.displacement.current;
                    let u_pre = &state.displacement.previous;
                    for i in 0..n {
                        let w = u[i] - u_pre[i];
                        a_new[i] = c0 * (du[i] - w);
                        v_new[i] = c1 * (du[i] + w);
                    }
                }
                state
                    .acceleration
                    .as_mut()
                    .ok_or("the analysis type does not carry an acceleration")?
                    .update_trial(&a_new)?;
                state
                    .velocity
                    .as_mut()
                    .ok_or("the analysis type does not carry a velocity")?
                    .update_trial(&v_new)
            }
        }
    }

    /// Commits the converged increment (advances time, state, and model together)
    pub fn commit(
        &self,
        domain: &mut Domain,
        assembler: &Assembler,
        state: &mut GlobalState,
    ) -> Result<(), StrError> {
        state.t += state.dt;
        assembler.commit(domain, state)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
