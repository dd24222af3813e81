use super::{Assembler, Converger, GlobalState, Integrator};
use crate::base::{SolveOutcome, DEFAULT_BFGS_HISTORY, PIVOT_TINY};
use crate::model::Domain;
use crate::StrError;
use russell_lab::{vec_copy, vec_inner, vec_update, Vector};
use std::collections::VecDeque;

/// Holds one displacement/residual pair of the quasi-Newton recursion
struct HistoryPair {
    s: Vector,
    y: Vector,
    rho: f64,
}

/// Holds a bounded deque of iteration pairs for the two-loop BFGS recursion
///
/// Pairs with a non-positive curvature (`y · s <= 0`) are rejected because
/// they would break the positive-definiteness of the inverse-Hessian
/// approximation; the oldest pair is evicted once the capacity is reached.
pub struct IterationHistory {
    capacity: usize,
    pairs: VecDeque<HistoryPair>,
}

impl IterationHistory {
    /// Allocates a new instance with the given capacity
    pub fn new(capacity: usize) -> Result<Self, StrError> {
        if capacity < 1 {
            return Err("the history capacity must be at least 1");
        }
        Ok(IterationHistory {
            capacity,
            pairs: VecDeque::new(),
        })
    }

    /// Returns the number of stored pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns whether no pairs are stored
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Forgets all stored pairs
    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    /// Stores a new pair, evicting the oldest when full
    ///
    /// Returns `false` if the pair was rejected by the curvature condition.
    pub fn push(&mut self, s: Vector, y: Vector) -> bool {
        let curvature = vec_inner(&y, &s);
        if curvature <= PIVOT_TINY {
            return false;
        }
        if self.pairs.len() == self.capacity {
            self.pairs.pop_front();
        }
        self.pairs.push_back(HistoryPair {
            s,
            y,
            rho: 1.0 / curvature,
        });
        true
    }

    /// Applies the two-loop recursion: `direction = H · residual`
    ///
    /// The `precondition` closure applies the frozen factorization of the
    /// tangent in the middle of the recursion.
    fn apply<F>(&self, residual: &Vector, direction: &mut Vector, precondition: F) -> Result<(), StrError>
    where
        F: FnOnce(&Vector, &mut Vector) -> Result<(), StrError>,
    {
        let k = self.pairs.len();
        let mut q = residual.clone();
        let mut alpha = vec![0.0; k];
        for (i, pair) in self.pairs.iter().enumerate().rev() {
            alpha[i] = pair.rho * vec_inner(&pair.s, &q);
            vec_update(&mut q, -alpha[i], &pair.y)?;
        }
        precondition(&q, direction)?;
        for (i, pair) in self.pairs.iter().enumerate() {
            let beta = pair.rho * vec_inner(&pair.y, direction);
            vec_update(direction, alpha[i] - beta, &pair.s)?;
        }
        Ok(())
    }
}

/// Executes the per-step iterative linearization loop
///
/// Three variants share one contract: [`Solver::analyze`] drives the trial
/// state from the committed one to equilibrium and reports either convergence
/// (with the iteration count), a recoverable non-convergence (the step
/// controller halves the increment and retries), or a fatal error (singular
/// operator, non-finite residual), which is never retried.
pub enum Solver {
    /// Full Newton-Raphson (refactorizes every iteration)
    Newton,

    /// Limited-memory quasi-Newton; the factorization of the first iteration
    /// is frozen and reused as a preconditioner
    Bfgs { history: IterationHistory },

    /// Ramm arc-length continuation over a scalar load factor
    ArcLength {
        /// Arc-length radius (self-adjusts after each committed step)
        radius: f64,
        /// Iteration count targeted by the radius adaptation
        target_iterations: usize,
        /// Reference displacement frozen at the first iteration of the step
        disp_ref: Vector,
        /// Load-factor increment accumulated over the current step
        lambda_step: f64,
        /// Iterations spent by the last converged step
        last_iterations: usize,
    },
}

impl Solver {
    /// Allocates a full Newton-Raphson solver
    pub fn new_newton() -> Self {
        Solver::Newton
    }

    /// Allocates a quasi-Newton solver with the default history capacity
    pub fn new_bfgs() -> Self {
        Solver::Bfgs {
            history: IterationHistory::new(DEFAULT_BFGS_HISTORY).unwrap(),
        }
    }

    /// Allocates a quasi-Newton solver with a custom history capacity
    pub fn new_bfgs_with_history(capacity: usize) -> Result<Self, StrError> {
        Ok(Solver::Bfgs {
            history: IterationHistory::new(capacity)?,
        })
    }

    /// Allocates a Ramm arc-length solver
    pub fn new_arc_length(radius: f64, target_iterations: usize) -> Result<Self, StrError> {
        if radius <= 0.0 {
            return Err("the arc-length radius must be positive");
        }
        if target_iterations < 1 {
            return Err("the target number of iterations must be at least 1");
        }
        Ok(Solver::ArcLength {
            radius,
            target_iterations,
            disp_ref: Vector::new(0),
            lambda_step: 0.0,
            last_iterations: 0,
        })
    }

    /// Runs the iteration loop for one sub-increment
    ///
    /// On `Ok(NonConvergence)` the caller may reset the state, halve the
    /// increment, and retry; an `Err` is fatal for the step.
    pub fn analyze(
        &mut self,
        domain: &mut Domain,
        state: &mut GlobalState,
        assembler: &Assembler,
        integrator: &Integrator,
        converger: &mut Converger,
    ) -> Result<SolveOutcome, StrError> {
        match self {
            Solver::Newton => newton_loop(domain, state, assembler, integrator, converger),
            Solver::Bfgs { history } => bfgs_loop(history, domain, state, assembler, integrator, converger),
            Solver::ArcLength {
                radius,
                disp_ref,
                lambda_step,
                last_iterations,
                ..
            } => arc_length_loop(
                *radius,
                disp_ref,
                lambda_step,
                last_iterations,
                domain,
                state,
                assembler,
                integrator,
                converger,
            ),
        }
    }

    /// Notifies the solver of a committed step
    ///
    /// The arc-length variant commits the accumulated load factor and adapts
    /// its radius to keep the convergence speed roughly constant.
    pub fn on_step_committed(&mut self, state: &mut GlobalState) {
        if let Solver::ArcLength {
            radius,
            target_iterations,
            lambda_step,
            last_iterations,
            ..
        } = self
        {
            state.load_factor += *lambda_step;
            *lambda_step = 0.0;
            if *last_iterations > 0 {
                *radius *= (*target_iterations as f64 / *last_iterations as f64).sqrt();
                *last_iterations = 0;
            }
        }
    }

    /// Forgets the per-step state after a rejected sub-increment
    pub fn on_step_rejected(&mut self) {
        match self {
            Solver::Newton => (),
            Solver::Bfgs { history } => history.clear(),
            Solver::ArcLength {
                lambda_step,
                last_iterations,
                ..
            } => {
                *lambda_step = 0.0;
                *last_iterations = 0;
            }
        }
    }
}

// residual = load - resistance, erased at restrained DOFs; Err on non-finite entries
fn out_of_balance(state: &GlobalState, assembler: &Assembler, residual: &mut Vector) -> Result<(), StrError> {
    let n = state.dim();
    for i in 0..n {
        residual[i] = state.load.trial[i] - state.resistance.trial[i];
    }
    assembler.erase_prescribed(residual);
    for i in 0..n {
        if !residual[i].is_finite() {
            return Err("the out-of-balance force is not finite");
        }
    }
    Ok(())
}

// correction accepted: update trial displacement and propagate everything
fn apply_correction(
    domain: &mut Domain,
    state: &mut GlobalState,
    assembler: &Assembler,
    integrator: &Integrator,
) -> Result<(), StrError> {
    assembler.erase_prescribed(&mut state.ninja);
    state.displacement.accumulate(&state.ninja)?;
    integrator.update_trial(state)?;
    assembler.update_trial_status(domain, state)
}

fn newton_loop(
    domain: &mut Domain,
    state: &mut GlobalState,
    assembler: &Assembler,
    integrator: &Integrator,
    converger: &mut Converger,
) -> Result<SolveOutcome, StrError> {
    converger.reset();
    let n = state.dim();
    let mut residual = Vector::new(n);
    let max_iterations = converger.max_iterations();
    for iteration in 0..=max_iterations {
        integrator.process_load(domain, assembler, state)?;
        integrator.assemble_resistance(domain, assembler, state)?;
        out_of_balance(state, assembler, &mut residual)?;
        if iteration > 0 && converger.test(state, &assembler.prescribed) {
            return Ok(SolveOutcome::Converged { iterations: iteration });
        }
        if iteration == max_iterations {
            break;
        }
        integrator.assemble_matrix(domain, assembler, state)?;
        state.stiffness.factorize()?;
        {
            let GlobalState { stiffness, ninja, .. } = state;
            stiffness.solve_trs(ninja, &residual)?;
        }
        apply_correction(domain, state, assembler, integrator)?;
        if integrator.explicit() {
            return Ok(SolveOutcome::Converged { iterations: 1 });
        }
    }
    Ok(SolveOutcome::NonConvergence)
}

fn bfgs_loop(
    history: &mut IterationHistory,
    domain: &mut Domain,
    state: &mut GlobalState,
    assembler: &Assembler,
    integrator: &Integrator,
    converger: &mut Converger,
) -> Result<SolveOutcome, StrError> {
    converger.reset();
    history.clear();
    let n = state.dim();
    let mut residual = Vector::new(n);
    let mut residual_prev = Vector::new(n);
    let max_iterations = converger.max_iterations();
    for iteration in 0..=max_iterations {
        integrator.process_load(domain, assembler, state)?;
        integrator.assemble_resistance(domain, assembler, state)?;
        out_of_balance(state, assembler, &mut residual)?;
        if iteration > 0 && converger.test(state, &assembler.prescribed) {
            return Ok(SolveOutcome::Converged { iterations: iteration });
        }
        if iteration == max_iterations {
            break;
        }
        if iteration == 0 {
            // single factorization, frozen for the whole step
            integrator.assemble_matrix(domain, assembler, state)?;
            state.stiffness.factorize()?;
            let GlobalState { stiffness, ninja, .. } = state;
            stiffness.solve_trs(ninja, &residual)?;
        } else {
            // pair from the previous iterate: s = last correction, y = r_prev - r
            let s = state.ninja.clone();
            let mut y = residual_prev.clone();
            vec_update(&mut y, -1.0, &residual)?;
            history.push(s, y);
            let GlobalState { stiffness, ninja, .. } = state;
            let mut direction = Vector::new(n);
            history.apply(&residual, &mut direction, |q, z| stiffness.solve_trs(z, q))?;
            vec_copy(ninja, &direction)?;
        }
        vec_copy(&mut residual_prev, &residual)?;
        apply_correction(domain, state, assembler, integrator)?;
        if integrator.explicit() {
            return Ok(SolveOutcome::Converged { iterations: 1 });
        }
    }
    Ok(SolveOutcome::NonConvergence)
}

#[allow(clippy::too_many_arguments)]
fn arc_length_loop(
    radius: f64,
    disp_ref: &mut Vector,
    lambda_step: &mut f64,
    last_iterations: &mut usize,
    domain: &mut Domain,
    state: &mut GlobalState,
    assembler: &Assembler,
    integrator: &Integrator,
    converger: &mut Converger,
) -> Result<SolveOutcome, StrError> {
    converger.reset();
    let n = state.dim();
    if disp_ref.dim() != n {
        *disp_ref = Vector::new(n);
    }
    *lambda_step = 0.0;
    let mut f_ref = Vector::new(n);
    domain.reference_load(&assembler.prescribed, &mut f_ref)?;
    let mut residual = Vector::new(n);
    let mut disp_a = Vector::new(n);
    let mut load = Vector::new(n);
    let max_iterations = converger.max_iterations();
    for iteration in 0..=max_iterations {
        integrator.assemble_resistance(domain, assembler, state)?;
        for i in 0..n {
            load[i] = (state.load_factor + *lambda_step) * f_ref[i];
        }
        state.load.update_trial(&load)?;
        out_of_balance(state, assembler, &mut residual)?;
        if iteration > 0 && converger.test(state, &assembler.prescribed) {
            *last_iterations = iteration;
            return Ok(SolveOutcome::Converged { iterations: iteration });
        }
        if iteration == max_iterations {
            break;
        }
        integrator.assemble_matrix(domain, assembler, state)?;
        state.stiffness.factorize()?;
        state.stiffness.solve_trs(&mut disp_a, &f_ref)?;
        assembler.erase_prescribed(&mut disp_a);
        let dlambda = if iteration == 0 {
            // constraint surface: the sign follows the tangent determinant
            let sign = state.stiffness.det_sign()?;
            let dlambda = sign * radius / (vec_inner(&disp_a, &disp_a) + 1.0).sqrt();
            vec_copy(disp_ref, &disp_a)?; // frozen for the whole step
            for i in 0..n {
                state.ninja[i] = dlambda * disp_a[i];
            }
            dlambda
        } else {
            {
                let GlobalState { stiffness, ninja, .. } = state;
                stiffness.solve_trs(ninja, &residual)?;
            }
            assembler.erase_prescribed(&mut state.ninja);
            let denominator = vec_inner(disp_ref, &disp_a);
            if denominator.abs() < PIVOT_TINY {
                return Err("the arc-length constraint is degenerate");
            }
            let dlambda = -vec_inner(disp_ref, &state.ninja) / denominator;
            vec_update(&mut state.ninja, dlambda, &disp_a)?;
            dlambda
        };
        *lambda_step += dlambda;
        apply_correction(domain, state, assembler, integrator)?;
    }
    Ok(SolveOutcome::NonConvergence)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{IterationHistory, Solver};
    use crate::base::{AnalysisType, SolveOutcome, StorageScheme};
    use crate::fem::{Assembler, ConvergenceCriterion, Converger, GlobalState, Integrator};
    use crate::model::{CubicSpringElement, Domain, GroundSpringElement, NodalLoad};
    use russell_lab::{approx_eq, vec_inner, Vector};

    #[test]
    fn history_respects_curvature_and_capacity() {
        let mut history = IterationHistory::new(2).unwrap();
        assert!(history.is_empty());
        assert!(!history.push(Vector::from(&[1.0]), Vector::from(&[-1.0]))); // y·s < 0
        assert!(history.push(Vector::from(&[1.0]), Vector::from(&[2.0])));
        assert!(history.push(Vector::from(&[1.0]), Vector::from(&[3.0])));
        assert!(history.push(Vector::from(&[1.0]), Vector::from(&[4.0])));
        assert_eq!(history.len(), 2); // oldest evicted
        assert_eq!(IterationHistory::new(0).err(), Some("the history capacity must be at least 1"));
    }

    #[test]
    fn history_apply_reduces_to_the_secant() {
        // one pair in 1d: H r must return (s·y)/(y·y)-scaled ... with identity
        // preconditioner the recursion yields r + s (alpha - beta) etc.; check
        // the exact secant property H y = s
        let mut history = IterationHistory::new(4).unwrap();
        let s = Vector::from(&[2.0]);
        let y = Vector::from(&[4.0]);
        history.push(s.clone(), y.clone());
        let mut direction = Vector::new(1);
        history
            .apply(&y, &mut direction, |q, z| {
                z[0] = q[0]; // identity preconditioner
                Ok(())
            })
            .unwrap();
        approx_eq(direction[0], s[0], 1e-15);
        assert!(vec_inner(&s, &y) > 0.0);
    }

    fn one_dof_linear() -> (Domain, Assembler, GlobalState, Converger) {
        let mut domain = Domain::new();
        let a = domain.add_node(1);
        domain.add_element(Box::new(GroundSpringElement::new(a, 1.0)));
        domain.add_load(NodalLoad::constant(a, 0, 1.0));
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
        let mut converger = Converger::new(ConvergenceCriterion::AbsResidual);
        converger.set_tolerance(1e-6).unwrap().set_max_iterations(10).unwrap();
        (domain, assembler, state, converger)
    }

    #[test]
    fn newton_solves_a_linear_system_in_one_iteration() {
        let (mut domain, assembler, mut state, mut converger) = one_dof_linear();
        state.dt = 1.0;
        let mut solver = Solver::new_newton();
        let integrator = Integrator::Statics;
        let outcome = solver
            .analyze(&mut domain, &mut state, &assembler, &integrator, &mut converger)
            .unwrap();
        assert_eq!(outcome, SolveOutcome::Converged { iterations: 1 });
        approx_eq(state.displacement.trial[0], 1.0, 1e-14);
        assert!(converger.error() <= f64::EPSILON);
    }

    #[test]
    fn bfgs_solves_a_nonlinear_spring() {
        // resistance u + u^3 with unit load: root ~ 0.6823278
        let mut domain = Domain::new();
        let a = domain.add_node(1);
        domain.add_element(Box::new(CubicSpringElement::new(a, 1.0, 1.0)));
        domain.add_load(NodalLoad::constant(a, 0, 1.0));
        let layout = domain.finalize(false).unwrap();
        let assembler = Assembler::new(&layout);
        let mut state = GlobalState::new(
            AnalysisType::Statics,
            StorageScheme::Full,
            layout.n_equation,
            layout.band_low,
            layout.band_up,
        )
        .unwrap();
        state.dt = 1.0;
        let mut converger = Converger::new(ConvergenceCriterion::AbsResidual);
        converger.set_tolerance(1e-10).unwrap().set_max_iterations(25).unwrap();
        let mut solver = Solver::new_bfgs();
        let integrator = Integrator::Statics;
        let outcome = solver
            .analyze(&mut domain, &mut state, &assembler, &integrator, &mut converger)
            .unwrap();
        match outcome {
            SolveOutcome::Converged { iterations } => assert!(iterations >= 2),
            SolveOutcome::NonConvergence => panic!("BFGS did not converge"),
        }
        approx_eq(state.displacement.trial[0], 0.6823278038280193, 1e-8);
    }

    #[test]
    fn new_arc_length_captures_errors() {
        assert_eq!(
            Solver::new_arc_length(0.0, 5).err(),
            Some("the arc-length radius must be positive")
        );
        assert_eq!(
            Solver::new_arc_length(0.1, 0).err(),
            Some("the target number of iterations must be at least 1")
        );
    }
}
