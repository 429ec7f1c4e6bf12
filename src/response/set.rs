use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::axis::{create_equi_dist, create_log_dist, mirrored, Axis, DistOptions};
use super::matrix::ResponseMatrix;
use crate::classifier::Verdict;
use crate::config::ResponseConfig;
use crate::error::StorageError;
use crate::storage;

const NAME_SEQUENCE_LENGTH: &str = "Sequence length";
const NAME_MATERIAL: &str = "Material (0: ?, 1: Si, 2: Ge, 3: Xe, 4: CsI)";
const NAME_COS_PHI: &str = "cos phi";
const NAME_ENERGY: &str = "Energy [keV]";

/// A good and a bad matrix with identical axes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePair {
    pub good: ResponseMatrix,
    pub bad: ResponseMatrix,
}

impl ResponsePair {
    fn new(title: &str, axes: Vec<Axis>) -> Result<Self, StorageError> {
        Ok(Self {
            good: ResponseMatrix::new(format!("MC: {title} (good)"), axes.clone())?,
            bad: ResponseMatrix::new(format!("MC: {title} (bad)"), axes)?,
        })
    }

    /// The matrix that collects outcomes of `verdict`.
    pub fn select(&mut self, verdict: Verdict) -> &mut ResponseMatrix {
        match verdict {
            Verdict::Good => &mut self.good,
            Verdict::Bad => &mut self.bad,
        }
    }

    /// Add one outcome with weight 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinate count does not match the axes.
    pub fn add(&mut self, verdict: Verdict, coordinates: &[f64]) -> Result<bool, StorageError> {
        self.select(verdict).add(coordinates, 1.0)
    }

    fn merge(&mut self, other: &Self) -> Result<(), StorageError> {
        self.good.merge(&other.good)?;
        self.bad.merge(&other.bad)
    }
}

/// The thirteen matrices of a multiple-Compton response.
///
/// | group            | coordinates                                                    |
/// |------------------|----------------------------------------------------------------|
/// | `good_bad`       | verdict (0.5 / 1.5), sequence length                           |
/// | `dual`           | total energy, cos phi, absorption probability, material        |
/// | `start`          | total energy, cos phi, sequence length, material               |
/// | `track`          | delta cos alpha, cos alpha, distance, track energy, length, material |
/// | `compton`        | delta cos phi, cos phi, lever arm, energy, length, material    |
/// | `compton_distance` | reach probability, energy, length, material                  |
/// | `photo_distance` | photo-absorption probability, energy, length, material         |
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSet {
    pub good_bad: ResponseMatrix,
    pub dual: ResponsePair,
    pub start: ResponsePair,
    pub track: ResponsePair,
    pub compton: ResponsePair,
    pub compton_distance: ResponsePair,
    pub photo_distance: ResponsePair,
}

impl ResponseSet {
    /// File suffixes in the order the matrices are written.
    pub const SUFFIXES: [&'static str; 13] = [
        "goodbad",
        "dual.good",
        "dual.bad",
        "start.good",
        "start.bad",
        "track.good",
        "track.bad",
        "compton.good",
        "compton.bad",
        "comptondistance.good",
        "comptondistance.bad",
        "photodistance.good",
        "photodistance.bad",
    ];

    /// Create empty matrices with the axes derived from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidAxis`] if the configured energy window
    /// or cosine limit produce non-increasing edges.
    pub fn new(config: &ResponseConfig) -> Result<Self, StorageError> {
        let limit = config.max_cosine_limit;
        let emin = config.energy_min;
        let emax = config.energy_max;
        let cosine_bounds = DistOptions::bounded(-limit, limit);

        let max_length = u32::try_from(config.max_interactions).unwrap_or(u32::MAX).saturating_add(1);
        let sequence_length = || Axis::new(NAME_SEQUENCE_LENGTH, (2..=max_length).map(f64::from).collect());
        let material = || Axis::new(NAME_MATERIAL, create_equi_dist(-0.5, 4.5, 5, DistOptions::NONE));
        let cos_phi_start = || Axis::new(NAME_COS_PHI, create_equi_dist(-1.5, 1.1, 26, cosine_bounds));

        let mut probability_edges = vec![-0.001, 0.001, 0.005, 0.01];
        probability_edges.extend(create_equi_dist(0.025, 0.975, 38, DistOptions::NONE));
        probability_edges.extend([0.99, 0.995, 0.999, 1.001]);
        let distance_energy = || {
            Axis::new(
                NAME_ENERGY,
                create_log_dist(15.0, emax, 38, DistOptions::bounded(1.0, 20_000.0)),
            )
        };

        let mut dual_probability = create_equi_dist(-0.001, 0.99, 15, DistOptions::NONE);
        dual_probability.push(1.001);

        let good_bad = ResponseMatrix::new(
            "MC: Good/Bad ratio (=prior)",
            vec![
                Axis::new("GoodBad", create_equi_dist(0.0, 2.0, 2, DistOptions::NONE))?,
                sequence_length()?,
            ],
        )?;

        let dual = ResponsePair::new(
            "Dual",
            vec![
                Axis::new(NAME_ENERGY, create_log_dist(emin, emax, 18, DistOptions::bounded(1.0, 20_000.0)))?,
                cos_phi_start()?,
                Axis::new("Scatter probability", dual_probability)?,
                material()?,
            ],
        )?;

        let start = ResponsePair::new(
            "Start",
            vec![
                Axis::new(NAME_ENERGY, create_log_dist(emin, emax, 38, DistOptions::bounded(1.0, 20_000.0)))?,
                cos_phi_start()?,
                sequence_length()?,
                material()?,
            ],
        )?;

        let track = ResponsePair::new(
            "Track",
            vec![
                Axis::new("Delta cos alpha", create_equi_dist(-0.5, 1.5, 36, cosine_bounds))?,
                Axis::new("cos alpha", create_equi_dist(-0.5, 1.5, 1, cosine_bounds))?,
                Axis::new("d [cm]", create_equi_dist(0.0, 1_000_000.0, 1, DistOptions::NONE))?,
                Axis::new("E_e [keV]", create_log_dist(500.0, 10_000.0, 10, DistOptions::bounded(0.0, 100_000.0)))?,
                sequence_length()?,
                material()?,
            ],
        )?;

        let compton = ResponsePair::new(
            "Central",
            vec![
                Axis::new(
                    "cos phi_E - cos phi_G",
                    mirrored(&create_log_dist(0.003, 1.8, 13, DistOptions::NONE.with_max_bound(limit))),
                )?,
                Axis::new(NAME_COS_PHI, create_equi_dist(-1.4, 1.2, 13, cosine_bounds))?,
                Axis::new("Distance [cm]", create_log_dist(0.2, 10.0, 7, DistOptions::bounded(0.01, 100.0)))?,
                Axis::new(
                    "E_tot [keV]",
                    create_log_dist(100.0, emax, 4, DistOptions::bounded(1.0, (2.0 * emax).max(10_000.0))),
                )?,
                sequence_length()?,
                material()?,
            ],
        )?;

        let compton_distance = ResponsePair::new(
            "Compton distance",
            vec![
                Axis::new("Reach probability", probability_edges.clone())?,
                distance_energy()?,
                sequence_length()?,
                material()?,
            ],
        )?;

        let photo_distance = ResponsePair::new(
            "Photo distance",
            vec![
                Axis::new("Scatter probability", probability_edges)?,
                distance_energy()?,
                sequence_length()?,
                material()?,
            ],
        )?;

        Ok(Self {
            good_bad,
            dual,
            start,
            track,
            compton,
            compton_distance,
            photo_distance,
        })
    }

    /// All matrices with their file suffixes, in [`Self::SUFFIXES`] order.
    #[must_use]
    pub fn matrices(&self) -> [(&'static str, &ResponseMatrix); 13] {
        let s = Self::SUFFIXES;
        [
            (s[0], &self.good_bad),
            (s[1], &self.dual.good),
            (s[2], &self.dual.bad),
            (s[3], &self.start.good),
            (s[4], &self.start.bad),
            (s[5], &self.track.good),
            (s[6], &self.track.bad),
            (s[7], &self.compton.good),
            (s[8], &self.compton.bad),
            (s[9], &self.compton_distance.good),
            (s[10], &self.compton_distance.bad),
            (s[11], &self.photo_distance.good),
            (s[12], &self.photo_distance.bad),
        ]
    }

    fn matrices_mut(&mut self) -> [&mut ResponseMatrix; 13] {
        [
            &mut self.good_bad,
            &mut self.dual.good,
            &mut self.dual.bad,
            &mut self.start.good,
            &mut self.start.bad,
            &mut self.track.good,
            &mut self.track.bad,
            &mut self.compton.good,
            &mut self.compton.bad,
            &mut self.compton_distance.good,
            &mut self.compton_distance.bad,
            &mut self.photo_distance.good,
            &mut self.photo_distance.bad,
        ]
    }

    /// Path of the matrix with `suffix`: `{prefix}.mc.{suffix}.rsp`.
    #[must_use]
    pub fn file_path(prefix: &Path, suffix: &str) -> PathBuf {
        let mut name = OsString::from(prefix.as_os_str());
        name.push(format!(".mc.{suffix}.rsp"));
        PathBuf::from(name)
    }

    /// Total number of accepted adds over all matrices.
    #[must_use]
    pub fn total_entries(&self) -> u64 {
        self.matrices().iter().map(|(_, m)| m.entries()).sum()
    }

    /// Total number of dropped adds over all matrices.
    #[must_use]
    pub fn total_dropped(&self) -> u64 {
        self.matrices().iter().map(|(_, m)| m.dropped()).sum()
    }

    /// Write every matrix next to `prefix`. Returns the written paths.
    ///
    /// # Errors
    ///
    /// Returns the first storage error. Matrices written before it stay on
    /// disk.
    pub fn save(&self, prefix: &Path) -> Result<Vec<PathBuf>, StorageError> {
        log::info!("saving {} response matrices to {}.mc.*.rsp", Self::SUFFIXES.len(), prefix.display());
        self.matrices()
            .iter()
            .map(|(suffix, matrix)| {
                let path = Self::file_path(prefix, suffix);
                storage::write_matrix(&path, matrix)?;
                Ok::<_, StorageError>(path)
            })
            .collect()
    }

    /// Read a complete set written by [`Self::save`].
    ///
    /// The layout of every file must match what `config` produces.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a file is missing, corrupt, or has another
    /// layout.
    pub fn load(prefix: &Path, config: &ResponseConfig) -> Result<Self, StorageError> {
        let mut set = Self::new(config)?;
        for (suffix, slot) in Self::SUFFIXES.iter().zip(set.matrices_mut()) {
            let loaded = storage::read_matrix(&Self::file_path(prefix, suffix))?;
            if loaded.layout_digest() != slot.layout_digest() {
                return Err(StorageError::LayoutMismatch {
                    name: slot.name().to_string(),
                    reason: format!("file for '{suffix}' was written with another configuration"),
                });
            }
            *slot = loaded;
        }
        Ok(set)
    }

    /// Add the contents of another set with the same layout.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LayoutMismatch`] if any layout differs; the
    /// set may then be partially merged.
    pub fn merge(&mut self, other: &Self) -> Result<(), StorageError> {
        self.good_bad.merge(&other.good_bad)?;
        self.dual.merge(&other.dual)?;
        self.start.merge(&other.start)?;
        self.track.merge(&other.track)?;
        self.compton.merge(&other.compton)?;
        self.compton_distance.merge(&other.compton_distance)?;
        self.photo_distance.merge(&other.photo_distance)
    }
}
