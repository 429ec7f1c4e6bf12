//! Detector geometry and material service.
//!
//! The classifier only needs interaction probabilities along straight paths
//! and the material at a position. [`GeometryService`] is that seam;
//! [`HomogeneousGeometry`] and [`LayeredGeometry`] are simple attenuation
//! models that are good enough for response generation on slab detectors
//! and for tests.

use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A point or displacement in detector coordinates (cm).
pub type Position = Vector3<f64>;

/// Detector material classes distinguished by the response matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Material {
    /// Not one of the known detector materials.
    #[default]
    Unknown,
    /// Silicon.
    Si,
    /// Germanium.
    Ge,
    /// Xenon.
    Xe,
    /// Cesium iodide.
    CsI,
}

impl Material {
    /// Classify a material by the atomic number of its main component.
    #[must_use]
    pub const fn from_atomic_number(z: u32) -> Self {
        match z {
            14 => Self::Si,
            32 => Self::Ge,
            54 => Self::Xe,
            55 => Self::CsI,
            _ => Self::Unknown,
        }
    }

    /// Coordinate of this material on the material axis.
    #[must_use]
    pub const fn bin_center(self) -> f64 {
        match self {
            Self::Unknown => 0.0,
            Self::Si => 1.0,
            Self::Ge => 2.0,
            Self::Xe => 3.0,
            Self::CsI => 4.0,
        }
    }
}

/// Source of interaction probabilities and materials.
pub trait GeometryService: Send + Sync {
    /// Probability of a photo-absorption on the straight path `from -> to`.
    fn photo_absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64;

    /// Probability of a Compton scatter on the straight path `from -> to`.
    fn compton_absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64;

    /// Probability of pair production on the straight path `from -> to`.
    fn pair_absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64;

    /// Probability of any interaction on the straight path `from -> to`.
    fn absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64;

    /// Material at `position`.
    fn material(&self, position: &Position) -> Material;
}

/// Linear attenuation coefficients (1/cm) per process, tabulated over energy.
///
/// Points must be sorted by energy. Lookups interpolate log-log between
/// points and hold the end values outside the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttenuationTable {
    /// `(energy keV, mu 1/cm)` for photo-absorption.
    pub photo: Vec<(f64, f64)>,
    /// `(energy keV, mu 1/cm)` for Compton scattering.
    pub compton: Vec<(f64, f64)>,
    /// `(energy keV, mu 1/cm)` for pair production.
    #[serde(default)]
    pub pair: Vec<(f64, f64)>,
}

impl AttenuationTable {
    /// A table with energy-independent coefficients.
    #[must_use]
    pub fn constant(photo: f64, compton: f64, pair: f64) -> Self {
        Self {
            photo: vec![(1.0, photo)],
            compton: vec![(1.0, compton)],
            pair: vec![(1.0, pair)],
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, points) in [("photo", &self.photo), ("compton", &self.compton), ("pair", &self.pair)] {
            let sorted = points.windows(2).all(|w| w[0].0 < w[1].0);
            let sane = points.iter().all(|&(e, mu)| e > 0.0 && mu >= 0.0 && mu.is_finite());
            if !sorted || !sane {
                return Err(ConfigError::InvalidValue {
                    field: format!("attenuation.{name}"),
                    reason: "points must have positive, strictly increasing energies and finite mu >= 0"
                        .to_string(),
                });
            }
        }
        Ok(())
    }

    fn photo(&self, energy: f64) -> f64 {
        interpolate(&self.photo, energy)
    }

    fn compton(&self, energy: f64) -> f64 {
        interpolate(&self.compton, energy)
    }

    fn pair(&self, energy: f64) -> f64 {
        interpolate(&self.pair, energy)
    }

    fn total(&self, energy: f64) -> f64 {
        self.photo(energy) + self.compton(energy) + self.pair(energy)
    }
}

fn interpolate(points: &[(f64, f64)], energy: f64) -> f64 {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return 0.0;
    };
    if energy <= first.0 {
        return first.1;
    }
    if energy >= last.0 {
        return last.1;
    }
    let upper = points.partition_point(|&(e, _)| e <= energy);
    let (e0, mu0) = points[upper - 1];
    let (e1, mu1) = points[upper];
    if mu0 <= 0.0 || mu1 <= 0.0 {
        return mu0 + (mu1 - mu0) * (energy - e0) / (e1 - e0);
    }
    let t = (energy.ln() - e0.ln()) / (e1.ln() - e0.ln());
    (mu0.ln() + t * (mu1.ln() - mu0.ln())).exp()
}

fn interaction_probability(mu_times_length: f64) -> f64 {
    1.0 - (-mu_times_length).exp()
}

/// A material with its attenuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medium {
    /// Material class.
    pub material: Material,
    /// Attenuation coefficients.
    pub attenuation: AttenuationTable,
}

/// Geometry made of a single medium filling all space.
#[derive(Debug, Clone, PartialEq)]
pub struct HomogeneousGeometry {
    /// The medium.
    pub medium: Medium,
}

impl HomogeneousGeometry {
    /// Create a homogeneous geometry.
    ///
    /// # Errors
    ///
    /// Returns an error if the attenuation table is malformed.
    pub fn new(medium: Medium) -> Result<Self, ConfigError> {
        medium.attenuation.validate()?;
        Ok(Self { medium })
    }

    fn probability(&self, from: &Position, to: &Position, mu: f64) -> f64 {
        interaction_probability(mu * (to - from).norm())
    }
}

impl GeometryService for HomogeneousGeometry {
    fn photo_absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64 {
        self.probability(from, to, self.medium.attenuation.photo(energy))
    }

    fn compton_absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64 {
        self.probability(from, to, self.medium.attenuation.compton(energy))
    }

    fn pair_absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64 {
        self.probability(from, to, self.medium.attenuation.pair(energy))
    }

    fn absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64 {
        self.probability(from, to, self.medium.attenuation.total(energy))
    }

    fn material(&self, _position: &Position) -> Material {
        self.medium.material
    }
}

/// A slab of detector material between two z planes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Lower z boundary (cm).
    pub z_min: f64,
    /// Upper z boundary (cm).
    pub z_max: f64,
    /// Slab medium.
    pub medium: Medium,
}

/// A stack of non-overlapping slabs in vacuum.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredGeometry {
    layers: Vec<Layer>,
}

impl LayeredGeometry {
    /// Create a layered geometry. Layers are sorted by `z_min`.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer is empty or inverted, layers overlap, or an
    /// attenuation table is malformed.
    pub fn new(mut layers: Vec<Layer>) -> Result<Self, ConfigError> {
        layers.sort_by(|a, b| a.z_min.total_cmp(&b.z_min));
        for layer in &layers {
            if !(layer.z_min < layer.z_max) {
                return Err(ConfigError::InvalidValue {
                    field: "layers".to_string(),
                    reason: format!("layer [{}, {}] is empty or inverted", layer.z_min, layer.z_max),
                });
            }
            layer.medium.attenuation.validate()?;
        }
        if let Some(pair) = layers.windows(2).find(|w| w[0].z_max > w[1].z_min) {
            return Err(ConfigError::InvalidValue {
                field: "layers".to_string(),
                reason: format!(
                    "layers [{}, {}] and [{}, {}] overlap",
                    pair[0].z_min, pair[0].z_max, pair[1].z_min, pair[1].z_max
                ),
            });
        }
        Ok(Self { layers })
    }

    /// The slabs, sorted by position.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Sum of `mu * path length` over all slabs crossed by `from -> to`.
    fn optical_depth(&self, from: &Position, to: &Position, mu: impl Fn(&AttenuationTable) -> f64) -> f64 {
        let length = (to - from).norm();
        if length == 0.0 {
            return 0.0;
        }
        let dz = to.z - from.z;
        self.layers
            .iter()
            .map(|layer| {
                let fraction = if dz == 0.0 {
                    if from.z >= layer.z_min && from.z <= layer.z_max {
                        1.0
                    } else {
                        0.0
                    }
                } else {
                    let t0 = (layer.z_min - from.z) / dz;
                    let t1 = (layer.z_max - from.z) / dz;
                    let (lo, hi) = if t0 < t1 { (t0, t1) } else { (t1, t0) };
                    (hi.min(1.0) - lo.max(0.0)).max(0.0)
                };
                fraction * length * mu(&layer.medium.attenuation)
            })
            .sum()
    }
}

impl GeometryService for LayeredGeometry {
    fn photo_absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64 {
        interaction_probability(self.optical_depth(from, to, |a| a.photo(energy)))
    }

    fn compton_absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64 {
        interaction_probability(self.optical_depth(from, to, |a| a.compton(energy)))
    }

    fn pair_absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64 {
        interaction_probability(self.optical_depth(from, to, |a| a.pair(energy)))
    }

    fn absorption_probability(&self, from: &Position, to: &Position, energy: f64) -> f64 {
        interaction_probability(self.optical_depth(from, to, |a| a.total(energy)))
    }

    fn material(&self, position: &Position) -> Material {
        self.layers
            .iter()
            .find(|l| position.z >= l.z_min && position.z <= l.z_max)
            .map_or(Material::Unknown, |l| l.medium.material)
    }
}

/// On-disk geometry description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryDescription {
    /// See [`HomogeneousGeometry`].
    Homogeneous {
        /// The medium.
        medium: Medium,
    },
    /// See [`LayeredGeometry`].
    Layered {
        /// The slabs.
        layers: Vec<Layer>,
    },
}

impl GeometryDescription {
    /// Load a geometry description from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Build the described geometry.
    ///
    /// # Errors
    ///
    /// Returns an error if the description is inconsistent.
    pub fn build(self) -> Result<Box<dyn GeometryService>, ConfigError> {
        Ok(match self {
            Self::Homogeneous { medium } => Box::new(HomogeneousGeometry::new(medium)?),
            Self::Layered { layers } => Box::new(LayeredGeometry::new(layers)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn germanium(mu_photo: f64, mu_compton: f64) -> Medium {
        Medium {
            material: Material::Ge,
            attenuation: AttenuationTable::constant(mu_photo, mu_compton, 0.0),
        }
    }

    #[test]
    fn test_material_codes() {
        assert_eq!(Material::from_atomic_number(14), Material::Si);
        assert_eq!(Material::from_atomic_number(55), Material::CsI);
        assert_eq!(Material::from_atomic_number(1), Material::Unknown);
        assert!((Material::Xe.bin_center() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_homogeneous_probabilities() {
        let geo = HomogeneousGeometry::new(germanium(0.1, 0.2)).unwrap();
        let a = Position::zeros();
        let b = Position::new(0.0, 0.0, 2.0);
        let photo = geo.photo_absorption_probability(&a, &b, 500.0);
        assert!((photo - (1.0 - (-0.2f64).exp())).abs() < 1e-12);
        let total = geo.absorption_probability(&a, &b, 500.0);
        assert!((total - (1.0 - (-0.6f64).exp())).abs() < 1e-12);
        assert_eq!(geo.pair_absorption_probability(&a, &b, 500.0), 0.0);
        assert_eq!(geo.absorption_probability(&a, &a, 500.0), 0.0);
        assert_eq!(geo.material(&b), Material::Ge);
    }

    #[test]
    fn test_log_log_interpolation() {
        let table = vec![(100.0, 1.0), (1000.0, 0.01)];
        let mid = interpolate(&table, 316.227_766_016_837_94);
        assert!((mid - 0.1).abs() < 1e-9);
        assert!((interpolate(&table, 10.0) - 1.0).abs() < f64::EPSILON);
        assert!((interpolate(&table, 1e5) - 0.01).abs() < f64::EPSILON);
        assert_eq!(interpolate(&[], 10.0), 0.0);
    }

    #[test]
    fn test_layered_path_fraction() {
        let geo = LayeredGeometry::new(vec![
            Layer {
                z_min: 0.0,
                z_max: 1.0,
                medium: germanium(1.0, 0.0),
            },
            Layer {
                z_min: 3.0,
                z_max: 4.0,
                medium: Medium {
                    material: Material::CsI,
                    attenuation: AttenuationTable::constant(1.0, 0.0, 0.0),
                },
            },
        ])
        .unwrap();
        // 2 cm of material along a 4 cm path
        let p = geo.photo_absorption_probability(&Position::zeros(), &Position::new(0.0, 0.0, 4.0), 100.0);
        assert!((p - (1.0 - (-2.0f64).exp())).abs() < 1e-12);
        assert_eq!(geo.material(&Position::new(5.0, 5.0, 3.5)), Material::CsI);
        assert_eq!(geo.material(&Position::new(0.0, 0.0, 2.0)), Material::Unknown);
    }

    #[test]
    fn test_layered_rejects_overlap() {
        let err = LayeredGeometry::new(vec![
            Layer {
                z_min: 0.0,
                z_max: 2.0,
                medium: germanium(1.0, 0.0),
            },
            Layer {
                z_min: 1.0,
                z_max: 3.0,
                medium: germanium(1.0, 0.0),
            },
        ])
        .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_description_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo.json");
        std::fs::write(
            &path,
            r#"{"kind":"homogeneous","medium":{"material":"Si","attenuation":{"photo":[[1.0,0.01]],"compton":[[1.0,0.2]]}}}"#,
        )
        .unwrap();
        let geo = GeometryDescription::from_json_file(&path).unwrap().build().unwrap();
        assert_eq!(geo.material(&Position::zeros()), Material::Si);

        assert!(GeometryDescription::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
