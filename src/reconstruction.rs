//! Candidate interaction sites proposed by the event reconstruction.
//!
//! Sites form a closed set of kinds (single hit, cluster of hits, track) and
//! carry a dense [`SiteId`] assigned by the producer. IDs are unique within one
//! [`RawEventList`], so they can key per-event caches.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::geometry::Position;

/// Dense identifier of a candidate site, unique within one raw event list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(pub u32);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural kind of a candidate site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteKind {
    /// A single detector hit, referenced by its index in the simulated event.
    Leaf {
        /// Hit index.
        hit: usize,
    },
    /// Hits merged because they are adjacent. Members must be leaves.
    Cluster {
        /// Member leaves.
        leaves: Vec<CandidateSite>,
    },
    /// An electron track. Elements are leaves or clusters, ordered from the
    /// start of the track.
    Track {
        /// Ordered track elements.
        elements: Vec<CandidateSite>,
    },
}

/// A reconstructed interaction site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSite {
    /// Identity within the raw event list.
    pub id: SiteId,
    /// Total deposited energy, keV.
    pub energy: f64,
    /// One-sigma energy resolution, keV.
    pub energy_resolution: f64,
    /// Representative position.
    pub position: Position,
    /// Structure.
    #[serde(flatten)]
    pub kind: SiteKind,
}

impl CandidateSite {
    /// Short name of the site kind, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self.kind {
            SiteKind::Leaf { .. } => "leaf",
            SiteKind::Cluster { .. } => "cluster",
            SiteKind::Track { .. } => "track",
        }
    }

    /// Returns true if this site is a track.
    #[must_use]
    pub const fn is_track(&self) -> bool {
        matches!(self.kind, SiteKind::Track { .. })
    }

    /// Direct children (empty for a leaf).
    #[must_use]
    pub fn children(&self) -> &[CandidateSite] {
        match &self.kind {
            SiteKind::Leaf { .. } => &[],
            SiteKind::Cluster { leaves } => leaves,
            SiteKind::Track { elements } => elements,
        }
    }

    /// Direction of a track: from its first to its second element.
    ///
    /// `None` for non-tracks, tracks with fewer than two elements, or
    /// coincident first elements.
    #[must_use]
    pub fn track_direction(&self) -> Option<Position> {
        let SiteKind::Track { elements } = &self.kind else {
            return None;
        };
        let [first, second, ..] = elements.as_slice() else {
            return None;
        };
        (second.position - first.position).try_normalize(0.0)
    }

    /// This site and every nested site, depth first.
    pub fn walk(&self) -> Box<dyn Iterator<Item = &CandidateSite> + '_> {
        Box::new(std::iter::once(self).chain(self.children().iter().flat_map(CandidateSite::walk)))
    }
}

/// Assigns dense site IDs while building sites.
///
/// Composite sites derive energy (sum), resolution (quadratic sum) and
/// position from their members. A cluster sits at its energy-weighted
/// centroid; a track sits at its first element.
#[derive(Debug, Default)]
pub struct SiteFactory {
    next: u32,
}

impl SiteFactory {
    /// Create a factory whose first ID is 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> SiteId {
        let id = SiteId(self.next);
        self.next += 1;
        id
    }

    /// A single hit site.
    pub fn leaf(&mut self, hit: usize, energy: f64, energy_resolution: f64, position: Position) -> CandidateSite {
        CandidateSite {
            id: self.allocate(),
            energy,
            energy_resolution,
            position,
            kind: SiteKind::Leaf { hit },
        }
    }

    /// A cluster of leaves.
    pub fn cluster(&mut self, leaves: Vec<CandidateSite>) -> CandidateSite {
        let (energy, energy_resolution) = combined_energy(&leaves);
        let position = if energy > 0.0 {
            leaves
                .iter()
                .fold(Position::zeros(), |acc, l| acc + l.position * l.energy)
                / energy
        } else {
            leaves.first().map_or_else(Position::zeros, |l| l.position)
        };
        CandidateSite {
            id: self.allocate(),
            energy,
            energy_resolution,
            position,
            kind: SiteKind::Cluster { leaves },
        }
    }

    /// A track through the given elements, in order.
    pub fn track(&mut self, elements: Vec<CandidateSite>) -> CandidateSite {
        let (energy, energy_resolution) = combined_energy(&elements);
        let position = elements.first().map_or_else(Position::zeros, |e| e.position);
        CandidateSite {
            id: self.allocate(),
            energy,
            energy_resolution,
            position,
            kind: SiteKind::Track { elements },
        }
    }
}

fn combined_energy(sites: &[CandidateSite]) -> (f64, f64) {
    let energy = sites.iter().map(|s| s.energy).sum();
    let variance: f64 = sites.iter().map(|s| s.energy_resolution * s.energy_resolution).sum();
    (energy, variance.sqrt())
}

/// One reconstruction hypothesis for an event: sites and their proposed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event number, shared with the simulated event.
    pub event_id: u64,
    /// Total measured energy, keV.
    pub energy: f64,
    /// One-sigma resolution of the total energy, keV.
    pub energy_resolution: f64,
    /// Top-level sites.
    pub sites: Vec<CandidateSite>,
    /// Indices into `sites` in the proposed interaction order. The first entry
    /// is the start point. Empty when the reconstruction found no start point.
    #[serde(default)]
    pub sequence: Vec<usize>,
    /// Pair events are not Compton sequences.
    #[serde(default)]
    pub is_pair: bool,
    /// Set when the reconstruction attached a vertex to this event.
    #[serde(default)]
    pub has_vertex: bool,
}

impl RawEvent {
    /// A raw event whose sites are already in interaction order.
    #[must_use]
    pub fn ordered(event_id: u64, energy: f64, energy_resolution: f64, sites: Vec<CandidateSite>) -> Self {
        let sequence = (0..sites.len()).collect();
        Self {
            event_id,
            energy,
            energy_resolution,
            sites,
            sequence,
            is_pair: false,
            has_vertex: false,
        }
    }

    /// Number of top-level sites.
    #[must_use]
    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    /// The start point of the proposed sequence.
    #[must_use]
    pub fn start(&self) -> Option<&CandidateSite> {
        self.sequence.first().and_then(|&i| self.sites.get(i))
    }

    /// The proposed sequence, start first. Restartable: every call walks the
    /// order from the beginning.
    pub fn ordering(&self) -> impl Iterator<Item = &CandidateSite> + Clone + '_ {
        self.sequence.iter().filter_map(|&i| self.sites.get(i))
    }

    fn validate(&self, seen: &mut HashSet<SiteId>) -> Result<(), String> {
        let mut used = HashSet::new();
        for &index in &self.sequence {
            if index >= self.sites.len() {
                return Err(format!("sequence refers to site {index} of {}", self.sites.len()));
            }
            if !used.insert(index) {
                return Err(format!("site {index} appears twice in the sequence"));
            }
        }
        for site in self.sites.iter().flat_map(CandidateSite::walk) {
            if !seen.insert(site.id) {
                return Err(format!("site ID {} is not unique", site.id));
            }
        }
        Ok(())
    }
}

/// All reconstruction hypotheses for one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEventList {
    /// Hypotheses, best first.
    pub raw_events: Vec<RawEvent>,
}

impl RawEventList {
    /// Wrap a list of raw events.
    #[must_use]
    pub fn new(raw_events: Vec<RawEvent>) -> Self {
        Self { raw_events }
    }

    /// The hypotheses.
    #[must_use]
    pub fn raw_events(&self) -> &[RawEvent] {
        &self.raw_events
    }

    /// The best hypothesis, which decides the event ID used for matching.
    #[must_use]
    pub fn primary(&self) -> Option<&RawEvent> {
        self.raw_events.first()
    }

    /// Check sequence indices and site ID uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidEvent`] describing the first problem.
    pub fn validate(&self) -> Result<(), SourceError> {
        let mut seen = HashSet::new();
        for raw in &self.raw_events {
            raw.validate(&mut seen).map_err(|reason| SourceError::InvalidEvent {
                event_id: raw.event_id,
                reason,
            })?;
        }
        Ok(())
    }
}
