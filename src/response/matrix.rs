use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::axis::Axis;
use crate::error::StorageError;

/// Sparse N-dimensional histogram with named axes.
///
/// Only non-empty cells are stored. Adds outside any axis range are dropped
/// and counted, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MatrixData", try_from = "MatrixData")]
pub struct ResponseMatrix {
    name: String,
    axes: Vec<Axis>,
    cells: BTreeMap<Vec<usize>, f64>,
    entries: u64,
    dropped: u64,
}

impl ResponseMatrix {
    /// Create an empty matrix.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidAxis`] if `axes` is empty.
    pub fn new(name: impl Into<String>, axes: Vec<Axis>) -> Result<Self, StorageError> {
        let name = name.into();
        if axes.is_empty() {
            return Err(StorageError::InvalidAxis {
                name,
                reason: "a matrix needs at least one axis".to_string(),
            });
        }
        Ok(Self {
            name,
            axes,
            cells: BTreeMap::new(),
            entries: 0,
            dropped: 0,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.axes.len()
    }

    /// Number of accepted adds.
    #[must_use]
    pub const fn entries(&self) -> u64 {
        self.entries
    }

    /// Number of adds dropped because a coordinate was out of range.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn check_dimensions(&self, actual: usize) -> Result<(), StorageError> {
        if actual == self.axes.len() {
            Ok(())
        } else {
            Err(StorageError::DimensionMismatch {
                name: self.name.clone(),
                expected: self.axes.len(),
                actual,
            })
        }
    }

    /// Bin indices of `coordinates`, or `None` if any is out of range.
    #[must_use]
    pub fn bin_of(&self, coordinates: &[f64]) -> Option<Vec<usize>> {
        if coordinates.len() != self.axes.len() {
            return None;
        }
        self.axes
            .iter()
            .zip(coordinates)
            .map(|(axis, &x)| axis.bin_of(x))
            .collect()
    }

    /// Add `weight` to the cell containing `coordinates`.
    ///
    /// Returns `Ok(false)` if the add was dropped as out of range.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DimensionMismatch`] if the number of
    /// coordinates differs from the number of axes.
    pub fn add(&mut self, coordinates: &[f64], weight: f64) -> Result<bool, StorageError> {
        self.check_dimensions(coordinates.len())?;
        match self.bin_of(coordinates) {
            Some(bins) => {
                *self.cells.entry(bins).or_insert(0.0) += weight;
                self.entries += 1;
                Ok(true)
            }
            None => {
                log::debug!("{}: dropping out-of-range add at {coordinates:?}", self.name);
                self.dropped += 1;
                Ok(false)
            }
        }
    }

    /// Content of the cell containing `coordinates`; 0 outside the axes.
    #[must_use]
    pub fn value_at(&self, coordinates: &[f64]) -> f64 {
        self.bin_of(coordinates)
            .map_or(0.0, |bins| self.bin_value(&bins))
    }

    /// Content of the cell with the given bin indices.
    #[must_use]
    pub fn bin_value(&self, bins: &[usize]) -> f64 {
        self.cells.get(bins).copied().unwrap_or(0.0)
    }

    /// Sum over all cells.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.cells.values().sum()
    }

    /// Non-empty cells in bin order.
    pub fn cells(&self) -> impl Iterator<Item = (&[usize], f64)> + '_ {
        self.cells.iter().map(|(bins, &value)| (bins.as_slice(), value))
    }

    /// Digest of the name, axis names and edges. Two matrices can be merged
    /// iff their digests are equal.
    #[must_use]
    pub fn layout_digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.name.as_bytes());
        hasher.update(&(self.axes.len() as u64).to_le_bytes());
        for axis in &self.axes {
            hasher.update(&(axis.name().len() as u64).to_le_bytes());
            hasher.update(axis.name().as_bytes());
            hasher.update(&(axis.edges().len() as u64).to_le_bytes());
            for edge in axis.edges() {
                hasher.update(&edge.to_le_bytes());
            }
        }
        hasher.finalize()
    }

    /// Add the contents of `other`, e.g. a response from a parallel run.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LayoutMismatch`] if the layouts differ.
    pub fn merge(&mut self, other: &Self) -> Result<(), StorageError> {
        if self.layout_digest() != other.layout_digest() {
            return Err(StorageError::LayoutMismatch {
                name: self.name.clone(),
                reason: format!("'{}' has a different axis layout", other.name),
            });
        }
        for (bins, value) in &other.cells {
            *self.cells.entry(bins.clone()).or_insert(0.0) += value;
        }
        self.entries += other.entries;
        self.dropped += other.dropped;
        Ok(())
    }
}

/// Serialized form of a [`ResponseMatrix`]. JSON maps need string keys, so
/// cells are stored as a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MatrixData {
    name: String,
    axes: Vec<Axis>,
    cells: Vec<(Vec<usize>, f64)>,
    entries: u64,
    dropped: u64,
}

impl From<ResponseMatrix> for MatrixData {
    fn from(matrix: ResponseMatrix) -> Self {
        Self {
            name: matrix.name,
            axes: matrix.axes,
            cells: matrix.cells.into_iter().collect(),
            entries: matrix.entries,
            dropped: matrix.dropped,
        }
    }
}

impl TryFrom<MatrixData> for ResponseMatrix {
    type Error = StorageError;

    fn try_from(data: MatrixData) -> Result<Self, Self::Error> {
        let axes = data
            .axes
            .into_iter()
            .map(|axis| Axis::new(axis.name().to_string(), axis.edges().to_vec()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut matrix = Self::new(data.name, axes)?;
        for (bins, value) in data.cells {
            matrix.check_dimensions(bins.len())?;
            if let Some((axis, bin)) = matrix
                .axes
                .iter()
                .zip(&bins)
                .find(|(axis, bin)| **bin >= axis.num_bins())
            {
                return Err(StorageError::InvalidAxis {
                    name: axis.name().to_string(),
                    reason: format!("cell index {bin} exceeds {} bins", axis.num_bins()),
                });
            }
            matrix.cells.insert(bins, value);
        }
        matrix.entries = data.entries;
        matrix.dropped = data.dropped;
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> ResponseMatrix {
        ResponseMatrix::new(
            "test",
            vec![
                Axis::new("x", vec![0.0, 1.0, 2.0]).unwrap(),
                Axis::new("y", vec![-1.0, 0.0, 1.0]).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_add_and_lookup() {
        let mut m = matrix();
        assert!(m.add(&[0.5, -0.5], 1.0).unwrap());
        assert!(m.add(&[0.7, -0.1], 2.0).unwrap());
        assert!(m.add(&[1.5, 0.5], 1.0).unwrap());
        assert_eq!(m.value_at(&[0.1, -0.9]), 3.0);
        assert_eq!(m.bin_value(&[1, 1]), 1.0);
        assert_eq!(m.value_at(&[1.5, -0.5]), 0.0);
        assert_eq!(m.sum(), 4.0);
        assert_eq!(m.len(), 2);
        assert_eq!(m.entries(), 3);
        assert_eq!(m.dropped(), 0);
    }

    #[test]
    fn test_out_of_range_is_dropped() {
        let mut m = matrix();
        assert!(!m.add(&[2.0, 0.0], 1.0).unwrap());
        assert!(!m.add(&[0.5, f64::NAN], 1.0).unwrap());
        assert_eq!(m.dropped(), 2);
        assert_eq!(m.entries(), 0);
        assert!(m.is_empty());
        assert_eq!(m.value_at(&[5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut m = matrix();
        let err = m.add(&[0.5], 1.0).unwrap_err();
        assert!(matches!(err, StorageError::DimensionMismatch { expected: 2, actual: 1, .. }));
        assert_eq!(m.bin_of(&[0.5]), None);
    }

    #[test]
    fn test_merge() {
        let mut a = matrix();
        let mut b = matrix();
        a.add(&[0.5, 0.5], 1.0).unwrap();
        b.add(&[0.5, 0.5], 2.0).unwrap();
        b.add(&[1.5, -0.5], 1.0).unwrap();
        b.add(&[9.0, 0.0], 1.0).unwrap();
        a.merge(&b).unwrap();
        assert_eq!(a.value_at(&[0.5, 0.5]), 3.0);
        assert_eq!(a.sum(), 4.0);
        assert_eq!(a.entries(), 3);
        assert_eq!(a.dropped(), 1);
    }

    #[test]
    fn test_merge_rejects_other_layout() {
        let mut a = matrix();
        let b = ResponseMatrix::new(
            "test",
            vec![
                Axis::new("x", vec![0.0, 1.0, 3.0]).unwrap(),
                Axis::new("y", vec![-1.0, 0.0, 1.0]).unwrap(),
            ],
        )
        .unwrap();
        assert_ne!(a.layout_digest(), b.layout_digest());
        assert!(matches!(a.merge(&b), Err(StorageError::LayoutMismatch { .. })));
    }

    #[test]
    fn test_serde_keeps_cells() {
        let mut m = matrix();
        m.add(&[0.5, 0.5], 1.5).unwrap();
        m.add(&[7.0, 0.5], 1.0).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let back: ResponseMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
        assert_eq!(back.layout_digest(), m.layout_digest());
    }

    #[test]
    fn test_deserialize_rejects_bad_cell() {
        let json = r#"{"name":"m","axes":[{"name":"x","edges":[0.0,1.0]}],"cells":[[[3],1.0]],"entries":1,"dropped":0}"#;
        assert!(serde_json::from_str::<ResponseMatrix>(json).is_err());
    }
}
