use russell_lab::approx_eq;
use stsim::base::{AnalysisType, Config};
use stsim::fem::{Analysis, ConvergenceCriterion, Converger, Integrator, Solver};
use stsim::model::{DashpotElement, Domain, GroundSpringElement, MassElement, NodalLoad};
use stsim::StrError;

// Single-DOF dynamic tests: a lumped mass (optionally with a grounded spring
// and dashpot) under a constant force.

fn build_sdof(mass: f64, damping: f64, stiffness: f64, force: f64) -> Domain {
    let mut domain = Domain::new();
    let a = domain.add_node(1);
    domain.add_element(Box::new(MassElement::new(a, mass)));
    domain.add_element(Box::new(GroundSpringElement::new(a, stiffness)));
    domain.add_element(Box::new(DashpotElement::new(a, damping)));
    domain.add_load(NodalLoad::constant(a, 0, force));
    domain
}

fn dynamic_config(dt: f64) -> Result<Config, StrError> {
    let mut config = Config::new();
    config
        .set_analysis(AnalysisType::Dynamics)
        .set_period(dt)?
        .set_steps(dt, dt * 1e-4, dt)?;
    Ok(config)
}

#[test]
fn test_newmark_recovers_the_initial_acceleration() -> Result<(), StrError> {
    // from rest, with no stiffness or damping, one step must reproduce the
    // closed-form a = F / M
    let (mass, force, dt) = (2.0, 3.0, 0.1);
    let mut domain = build_sdof(mass, 0.0, 0.0, force);
    let config = dynamic_config(dt)?;
    let mut converger = Converger::new(ConvergenceCriterion::AbsResidual);
    converger.set_tolerance(1e-10)?;
    let integrator = Integrator::new_newmark(0.25, 0.5)?;
    let mut analysis = Analysis::new(&config, &mut domain, integrator, Solver::new_newton(), converger)?;
    let summary = analysis.run(&mut domain)?;
    assert_eq!(summary.n_committed, 1);
    let a = analysis.state.acceleration.as_ref().unwrap();
    let v = analysis.state.velocity.as_ref().unwrap();
    approx_eq(a.current[0], force / mass, 1e-12);
    // v = dt/2 (a0 + a1), u = dt^2/4 a1 with the trapezoidal parameters
    approx_eq(v.current[0], 0.5 * dt * force / mass, 1e-12);
    approx_eq(analysis.state.displacement.current[0], 0.25 * dt * dt * force / mass, 1e-12);
    Ok(())
}

#[test]
fn test_generalized_alpha_recovers_the_initial_acceleration() -> Result<(), StrError> {
    // with alpha_m = alpha_f = 0 the scheme degenerates to the trapezoidal
    // Newmark rule, so the one-step acceleration matches the closed form
    let (mass, force, dt) = (1.0, 1.0, 0.05);
    let mut domain = build_sdof(mass, 0.0, 0.0, force);
    let config = dynamic_config(dt)?;
    let mut converger = Converger::new(ConvergenceCriterion::AbsResidual);
    converger.set_tolerance(1e-10)?;
    let integrator = Integrator::new_generalized_alpha(0.0, 0.0)?;
    let mut analysis = Analysis::new(&config, &mut domain, integrator, Solver::new_newton(), converger)?;
    analysis.run(&mut domain)?;
    let a = analysis.state.acceleration.as_ref().unwrap();
    approx_eq(a.current[0], force / mass, 1e-10);
    Ok(())
}

#[test]
fn test_newmark_damped_system_approaches_statics() -> Result<(), StrError> {
    // heavily damped oscillator under a constant force: after many periods
    // the displacement settles at the static value F / K
    let (mass, damping, stiffness, force) = (1.0, 4.0, 10.0, 5.0);
    let mut domain = build_sdof(mass, damping, stiffness, force);
    let dt = 0.05;
    let mut config = Config::new();
    config
        .set_analysis(AnalysisType::Dynamics)
        .set_period(20.0)?
        .set_steps(dt, dt * 1e-4, dt)?;
    let mut converger = Converger::new(ConvergenceCriterion::AbsResidual);
    converger.set_tolerance(1e-9)?;
    let integrator = Integrator::new_newmark(0.25, 0.5)?;
    let mut analysis = Analysis::new(&config, &mut domain, integrator, Solver::new_newton(), converger)?;
    let summary = analysis.run(&mut domain)?;
    assert_eq!(summary.n_committed, 400);
    approx_eq(analysis.state.displacement.current[0], force / stiffness, 1e-3);
    let v = analysis.state.velocity.as_ref().unwrap();
    approx_eq(v.current[0], 0.0, 1e-3);
    Ok(())
}

#[test]
fn test_central_difference_rejects_an_unstable_step() -> Result<(), StrError> {
    // omega^2 = K / M = 100, so the limit is pi / 10; a larger step must fail
    let mut domain = build_sdof(1.0, 0.0, 100.0, 1.0);
    let config = dynamic_config(1.0)?;
    let converger = Converger::new(ConvergenceCriterion::AbsDisp);
    let integrator = Integrator::new_central_difference();
    let mut analysis = Analysis::new(&config, &mut domain, integrator, Solver::new_newton(), converger)?;
    assert_eq!(
        analysis.run(&mut domain).err(),
        Some("the increment size exceeds the stability limit of the explicit scheme")
    );
    Ok(())
}

#[test]
fn test_central_difference_marches_a_free_mass() -> Result<(), StrError> {
    // free mass under a constant force; the explicit recursion accelerates it
    // with a = F / M at every step
    let (mass, force, dt) = (2.0, 4.0, 0.1);
    let mut domain = build_sdof(mass, 0.0, 0.0, force);
    let mut config = Config::new();
    config
        .set_analysis(AnalysisType::Dynamics)
        .set_period(1.0)?
        .set_steps(dt, dt * 1e-4, dt)?;
    let converger = Converger::new(ConvergenceCriterion::AbsDisp);
    let integrator = Integrator::new_central_difference();
    let mut analysis = Analysis::new(&config, &mut domain, integrator, Solver::new_newton(), converger)?;
    let summary = analysis.run(&mut domain)?;
    assert_eq!(summary.n_committed, 10);
    assert_eq!(summary.n_iterations, 10); // one solve per explicit sub-step
    let a = analysis.state.acceleration.as_ref().unwrap();
    approx_eq(a.current[0], force / mass, 1e-10);
    assert!(analysis.state.displacement.current[0] > 0.0);
    Ok(())
}
