use super::{AnalysisType, StorageScheme, DEFAULT_MAX_SUBSTEPS};
use crate::StrError;
use std::fmt;

/// Holds configuration parameters for one analysis run
///
/// The step window (`period`, `ini_step`, `min_step`, `max_step`) defines the
/// time/load interval covered by one step and the adaptive sub-increment
/// bounds used by the step controller.
#[derive(Clone, Debug)]
pub struct Config {
    /// Type of analysis (statics or dynamics)
    pub analysis: AnalysisType,

    /// Storage scheme of the global operators
    pub scheme: StorageScheme,

    /// Applies the RCM bandwidth-reducing reordering to the DOF numbering
    pub reorder: bool,

    /// Time/load period covered by one step
    pub period: f64,

    /// Initial sub-increment size
    pub ini_step: f64,

    /// Minimum sub-increment size (halving below this is a hard failure)
    pub min_step: f64,

    /// Maximum sub-increment size
    pub max_step: f64,

    /// Maximum number of sub-increments per step
    pub max_substeps: usize,

    /// Disables adaptive halving; any non-convergence is immediately fatal
    pub fixed_step: bool,

    /// Prints a line per committed sub-step
    pub verbose_steps: bool,

    /// Prints a line per solver iteration
    pub verbose_iterations: bool,
}

impl Config {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        Config {
            analysis: AnalysisType::Statics,
            scheme: StorageScheme::Full,
            reorder: false,
            period: 1.0,
            ini_step: 1.0,
            min_step: 1e-6,
            max_step: 1.0,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
            fixed_step: false,
            verbose_steps: false,
            verbose_iterations: false,
        }
    }

    /// Sets the type of analysis
    pub fn set_analysis(&mut self, analysis: AnalysisType) -> &mut Self {
        self.analysis = analysis;
        self
    }

    /// Sets the storage scheme of the global operators
    pub fn set_scheme(&mut self, scheme: StorageScheme) -> &mut Self {
        self.scheme = scheme;
        self
    }

    /// Enables or disables the RCM reordering
    pub fn set_reorder(&mut self, flag: bool) -> &mut Self {
        self.reorder = flag;
        self
    }

    /// Sets the time/load period covered by one step
    pub fn set_period(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value <= 0.0 {
            return Err("period must be > 0.0");
        }
        self.period = value;
        Ok(self)
    }

    /// Sets the initial, minimum, and maximum sub-increment sizes
    pub fn set_steps(&mut self, ini: f64, min: f64, max: f64) -> Result<&mut Self, StrError> {
        if min <= 0.0 {
            return Err("minimum step size must be > 0.0");
        }
        if ini < min || ini > max {
            return Err("initial step size must satisfy min ≤ ini ≤ max");
        }
        self.ini_step = ini;
        self.min_step = min;
        self.max_step = max;
        Ok(self)
    }

    /// Sets the maximum number of sub-increments per step
    pub fn set_max_substeps(&mut self, value: usize) -> Result<&mut Self, StrError> {
        if value < 1 {
            return Err("max_substeps must be ≥ 1");
        }
        self.max_substeps = value;
        Ok(self)
    }

    /// Fixes the sub-increment size (disables adaptive halving)
    pub fn set_fixed_step(&mut self, flag: bool) -> &mut Self {
        self.fixed_step = flag;
        self
    }

    /// Sets the verbosity flags
    pub fn set_verbose(&mut self, steps: bool, iterations: bool) -> &mut Self {
        self.verbose_steps = steps;
        self.verbose_iterations = iterations;
        self
    }

    /// Validates all cross-field constraints; returns a message on failure
    pub fn validate(&self) -> Option<StrError> {
        if self.period <= 0.0 {
            return Some("period must be > 0.0");
        }
        if self.min_step <= 0.0 {
            return Some("minimum step size must be > 0.0");
        }
        if self.ini_step < self.min_step || self.ini_step > self.max_step {
            return Some("initial step size must satisfy min ≤ ini ≤ max");
        }
        if self.max_substeps < 1 {
            return Some("max_substeps must be ≥ 1");
        }
        None
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "analysis = {:?}\n", self.analysis)?;
        write!(f, "scheme = {:?}\n", self.scheme)?;
        write!(f, "reorder = {:?}\n", self.reorder)?;
        write!(f, "period = {:?}\n", self.period)?;
        write!(f, "ini_step = {:?}\n", self.ini_step)?;
        write!(f, "min_step = {:?}\n", self.min_step)?;
        write!(f, "max_step = {:?}\n", self.max_step)?;
        write!(f, "max_substeps = {:?}\n", self.max_substeps)?;
        write!(f, "fixed_step = {:?}\n", self.fixed_step)?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::base::{AnalysisType, StorageScheme};
    use crate::StrError;

    #[test]
    fn new_works() -> Result<(), StrError> {
        let mut config = Config::new();
        config
            .set_analysis(AnalysisType::Dynamics)
            .set_scheme(StorageScheme::BandSymm)
            .set_reorder(true)
            .set_period(2.0)?
            .set_steps(0.1, 0.001, 0.5)?
            .set_max_substeps(100)?
            .set_fixed_step(false)
            .set_verbose(false, false);
        assert_eq!(config.analysis, AnalysisType::Dynamics);
        assert_eq!(config.scheme, StorageScheme::BandSymm);
        assert_eq!(config.period, 2.0);
        assert_eq!(config.validate(), None);
        assert!(format!("{}", config).contains("period = 2.0"));
        Ok(())
    }

    #[test]
    fn setters_capture_errors() {
        let mut config = Config::new();
        assert_eq!(config.set_period(0.0).err(), Some("period must be > 0.0"));
        assert_eq!(
            config.set_steps(1.0, 0.0, 2.0).err(),
            Some("minimum step size must be > 0.0")
        );
        assert_eq!(
            config.set_steps(3.0, 0.1, 2.0).err(),
            Some("initial step size must satisfy min ≤ ini ≤ max")
        );
        assert_eq!(config.set_max_substeps(0).err(), Some("max_substeps must be ≥ 1"));
    }

    #[test]
    fn validate_works() {
        let mut config = Config::new();
        config.period = -1.0;
        assert_eq!(config.validate(), Some("period must be > 0.0"));
        config.period = 1.0;
        config.min_step = 0.0;
        assert_eq!(config.validate(), Some("minimum step size must be > 0.0"));
        config.min_step = 0.1;
        config.ini_step = 0.01;
        assert_eq!(
            config.validate(),
            Some("initial step size must satisfy min ≤ ini ≤ max")
        );
    }
}
