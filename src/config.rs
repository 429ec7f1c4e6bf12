//! Run configuration for the response builder.
//!
//! Settings can come from defaults, a JSON file, or the compact option string
//! `emin=..:emax=..:maxia=..` accepted by the command line. Every path ends in
//! [`ResponseConfig::validate`], which must pass before a builder is created.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dependency::ClosureComparison;
use crate::error::ConfigError;

/// Smallest accepted `max_cosine_limit`. The central cosine axis has interior
/// edges up to this value.
pub const MIN_COSINE_LIMIT: f64 = 1.8;

const MIN_ENERGY_KEV: f64 = 1.0;
const MIN_ENERGY_MAX_KEV: f64 = 100.0;
const MAX_ENERGY_KEV: f64 = 20_000.0;

/// Energy tolerances used by the absorption checks.
///
/// The values were tuned against reference output. Changing them silently
/// changes which sequences are classified as good.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsorptionTolerance {
    /// Multiplier applied to the energy resolution (keV per sigma).
    pub sigma_factor: f64,
    /// Fixed systematic floor added to the scaled resolution, in keV.
    pub floor_kev: f64,
    /// Absolute track absorption slack, in keV.
    pub track_floor_kev: f64,
    /// Relative track absorption slack.
    pub track_fraction: f64,
}

impl Default for AbsorptionTolerance {
    fn default() -> Self {
        Self {
            sigma_factor: 3.0,
            floor_kev: 2.0,
            track_floor_kev: 20.0,
            track_fraction: 0.15,
        }
    }
}

impl AbsorptionTolerance {
    /// Maximum accepted `|observed - ideal|` for the given resolution.
    #[must_use]
    pub fn window(&self, resolution: f64) -> f64 {
        self.sigma_factor * resolution + self.floor_kev
    }

    /// Returns true if `observed` lies within the window around `ideal`.
    #[must_use]
    pub fn accepts(&self, observed: f64, ideal: f64, resolution: f64) -> bool {
        (observed - ideal).abs() <= self.window(resolution)
    }

    /// Returns true if a track deposit is close enough to the true deposit.
    ///
    /// A track is rejected only when it misses by more than both the absolute
    /// and the relative slack.
    #[must_use]
    pub fn accepts_track(&self, observed: f64, real: f64) -> bool {
        let diff = (observed - real).abs();
        !(diff > self.track_floor_kev && diff / real > self.track_fraction)
    }
}

/// Complete configuration of one response-building run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Prefix of every written response file.
    pub output_prefix: PathBuf,
    /// Longest sequence (number of candidate sites) that is analyzed.
    pub max_interactions: usize,
    /// Lower edge of the accepted total energy window, keV.
    pub energy_min: f64,
    /// Upper edge of the accepted total energy window, keV.
    pub energy_max: f64,
    /// Cosine values are clamped to 0.99 of this bound before binning.
    pub max_cosine_limit: f64,
    /// Whether reach and photo-absorption probabilities are accumulated.
    pub do_absorptions: bool,
    /// Longest sequence for which absorption probabilities are computed.
    pub max_absorptions: usize,
    /// Number of matched events between checkpoint writes.
    pub save_after: u64,
    /// Stop after this many matched events.
    pub max_events: Option<u64>,
    /// Accept truncated simulated events that consist only of the primary.
    pub only_init_required: bool,
    /// How the downward dependency closure identifies descendants.
    pub closure_comparison: ClosureComparison,
    /// Energy tolerances.
    pub tolerance: AbsorptionTolerance,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            output_prefix: PathBuf::from("Response"),
            max_interactions: 7,
            energy_min: 100.0,
            energy_max: 10_000.0,
            max_cosine_limit: 2.0,
            do_absorptions: true,
            max_absorptions: 5,
            save_after: 100_000,
            max_events: None,
            only_init_required: false,
            closure_comparison: ClosureComparison::default(),
            tolerance: AbsorptionTolerance::default(),
        }
    }
}

impl ResponseConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply a colon-separated option string such as `emin=200:emax=5000:maxia=5`.
    ///
    /// Recognized keys are `emin`, `emax`, `maxia`, `maxabs`, `abs` (`true` or
    /// `false`) and `cos`. An empty string is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys, fragments without `=`, values that
    /// do not parse, or a configuration that fails validation afterwards.
    pub fn apply_options(&mut self, options: &str) -> Result<(), ConfigError> {
        for fragment in options.split(':').map(str::trim).filter(|f| !f.is_empty()) {
            let (key, value) = fragment
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedOption {
                    fragment: fragment.to_string(),
                })?;
            let key = key.trim();
            let value = value.trim();
            match key {
                "emin" => self.energy_min = parse_value(key, value)?,
                "emax" => self.energy_max = parse_value(key, value)?,
                "maxia" => self.max_interactions = parse_value(key, value)?,
                "maxabs" => self.max_absorptions = parse_value(key, value)?,
                "abs" => self.do_absorptions = parse_value(key, value)?,
                "cos" => self.max_cosine_limit = parse_value(key, value)?,
                _ => {
                    return Err(ConfigError::UnknownOption {
                        key: key.to_string(),
                    })
                }
            }
        }
        self.validate()
    }

    /// Validate the configuration.
    ///
    /// This must be called before constructing a `ResponseBuilder`.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.energy_min > 0.0 && self.energy_max > 0.0 && self.energy_min < self.energy_max) {
            return Err(ConfigError::InvalidEnergyWindow {
                min: self.energy_min,
                max: self.energy_max,
            });
        }
        // energy axes have fixed outer edges at 1 keV and 20 MeV and an
        // interior central-energy range starting at 100 keV
        if !(self.energy_min > MIN_ENERGY_KEV && self.energy_max > MIN_ENERGY_MAX_KEV && self.energy_max < MAX_ENERGY_KEV) {
            return Err(ConfigError::InvalidValue {
                field: "energy window".to_string(),
                reason: format!(
                    "need {MIN_ENERGY_KEV} < minimum and {MIN_ENERGY_MAX_KEV} < maximum < {MAX_ENERGY_KEV} keV, got [{}, {}]",
                    self.energy_min, self.energy_max
                ),
            });
        }
        if self.max_interactions < 2 {
            return Err(ConfigError::TooFewInteractions {
                value: self.max_interactions,
            });
        }
        if !(self.max_cosine_limit > MIN_COSINE_LIMIT && self.max_cosine_limit.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "max_cosine_limit".to_string(),
                reason: format!("must be a finite value > {MIN_COSINE_LIMIT}"),
            });
        }
        if self.save_after == 0 {
            return Err(ConfigError::InvalidValue {
                field: "save_after".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.max_events == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_events".to_string(),
                reason: "must be > 0 when set".to_string(),
            });
        }
        let t = &self.tolerance;
        if t.sigma_factor < 0.0 || t.floor_kev < 0.0 || t.track_floor_kev < 0.0 || t.track_fraction < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "tolerance".to_string(),
                reason: "tolerances must be non-negative".to_string(),
            });
        }
        if self.output_prefix.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "output_prefix".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        field: key.to_string(),
        reason: format!("'{value}': {e}"),
    })
}
