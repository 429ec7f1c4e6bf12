//! Binned axes for response matrices.
//!
//! The `create_*` helpers produce edge lists the same way for every matrix
//! in a [`ResponseSet`](super::ResponseSet): interior edges first, then the
//! optional outer bounds, then inversion and offset. [`Axis::new`] checks
//! the result.

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Post-processing applied to a generated edge list.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistOptions {
    /// Extra first edge, catching everything below the interior range.
    pub min_bound: Option<f64>,
    /// Extra last edge, catching everything above the interior range.
    pub max_bound: Option<f64>,
    /// Added to every edge at the end.
    pub offset: f64,
    /// Mirror the bin widths between the outermost edges.
    pub inverted: bool,
}

impl DistOptions {
    /// No bounds, no offset, not inverted.
    pub const NONE: Self = Self {
        min_bound: None,
        max_bound: None,
        offset: 0.0,
        inverted: false,
    };

    #[must_use]
    pub const fn bounded(min: f64, max: f64) -> Self {
        Self {
            min_bound: Some(min),
            max_bound: Some(max),
            ..Self::NONE
        }
    }

    #[must_use]
    pub const fn with_min_bound(mut self, min: f64) -> Self {
        self.min_bound = Some(min);
        self
    }

    #[must_use]
    pub const fn with_max_bound(mut self, max: f64) -> Self {
        self.max_bound = Some(max);
        self
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub const fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    fn finish(self, interior: impl IntoIterator<Item = f64>) -> Vec<f64> {
        let mut edges: Vec<f64> = self
            .min_bound
            .into_iter()
            .chain(interior)
            .chain(self.max_bound)
            .collect();

        if self.inverted && edges.len() > 2 {
            let original = edges.clone();
            let n = original.len();
            for i in 1..n - 1 {
                edges[i] = edges[i - 1] + (original[n - i] - original[n - i - 1]);
            }
        }

        for edge in &mut edges {
            *edge += self.offset;
        }
        edges
    }
}

/// `bins` equally wide bins between `min` and `max`.
#[must_use]
pub fn create_equi_dist(min: f64, max: f64, bins: usize, options: DistOptions) -> Vec<f64> {
    let width = (max - min) / bins as f64;
    options.finish((0..=bins).map(|i| min + i as f64 * width))
}

/// `bins` logarithmically spaced bins between `min` and `max` (both > 0).
#[must_use]
pub fn create_log_dist(min: f64, max: f64, bins: usize, options: DistOptions) -> Vec<f64> {
    let (lo, hi) = (min.ln(), max.ln());
    let width = (hi - lo) / bins as f64;
    options.finish((0..=bins).map(|i| (lo + i as f64 * width).exp()))
}

/// Logarithmic bins whose widths never drop below `threshold`.
///
/// A non-positive `min` is replaced by 1. A threshold that does not fit
/// `bins` times into the range is reduced until it does, which turns the
/// axis into an equidistant one.
#[must_use]
pub fn create_thresholded_log_dist(
    min: f64,
    max: f64,
    bins: usize,
    threshold: f64,
    options: DistOptions,
) -> Vec<f64> {
    let mut min = min;
    if min <= 0.0 {
        log::warn!("thresholded log axis: minimum {min} must be positive, using 1");
        min = 1.0;
    }
    let n = bins as f64;
    let mut threshold = threshold;
    if threshold >= (max - min) / n {
        log::warn!(
            "thresholded log axis: threshold {threshold} must be below (max - min) / bins, bins become equidistant"
        );
        threshold = (max - min) / n;
    }

    let lo = min.ln();
    let hi = (max - n * threshold).ln();
    let width = (hi - lo) / n;
    options.finish((0..=bins).map(|i| {
        let i = i as f64;
        (lo + i * width).exp() + i * threshold
    }))
}

/// Edge list symmetric around zero: the negated, reversed `edges` followed
/// by `edges`. The input must be positive and increasing.
#[must_use]
pub fn mirrored(edges: &[f64]) -> Vec<f64> {
    edges
        .iter()
        .rev()
        .map(|e| -e)
        .chain(edges.iter().copied())
        .collect()
}

/// A named axis with strictly increasing bin edges.
///
/// Bins are half open: bin `i` covers `[edges[i], edges[i + 1])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    name: String,
    edges: Vec<f64>,
}

impl Axis {
    /// Create an axis.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidAxis`] if there are fewer than two
    /// edges, an edge is not finite, or the edges are not strictly increasing.
    pub fn new(name: impl Into<String>, edges: Vec<f64>) -> Result<Self, StorageError> {
        let name = name.into();
        let invalid = |reason: String| StorageError::InvalidAxis {
            name: name.clone(),
            reason,
        };
        if edges.len() < 2 {
            return Err(invalid(format!("needs at least 2 edges, got {}", edges.len())));
        }
        if let Some(bad) = edges.iter().find(|e| !e.is_finite()) {
            return Err(invalid(format!("edge {bad} is not finite")));
        }
        if let Some(i) = edges.windows(2).position(|w| w[0] >= w[1]) {
            return Err(invalid(format!(
                "edges are not strictly increasing at position {}: {} >= {}",
                i + 1,
                edges[i],
                edges[i + 1]
            )));
        }
        Ok(Self { name, edges })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Lowest edge.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.edges[0]
    }

    /// Highest edge. Values equal to it are out of range.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Bin containing `value`, or `None` outside `[min, max)` and for NaN.
    #[must_use]
    pub fn bin_of(&self, value: f64) -> Option<usize> {
        let below = self.edges.partition_point(|&e| e <= value);
        (below > 0 && below < self.edges.len()).then(|| below - 1)
    }

    /// Center of bin `bin`.
    #[must_use]
    pub fn center(&self, bin: usize) -> Option<f64> {
        let lo = self.edges.get(bin)?;
        let hi = self.edges.get(bin + 1)?;
        Some(0.5 * (lo + hi))
    }
}
