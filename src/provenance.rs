//! Maps candidate sites back to the simulated interactions that produced them.
//!
//! Resolution runs thousands of times per event in the classifier's nested
//! loops, so both the flattened hit lists and the origin sets are memoized by
//! [`SiteId`]. The caches hold for one simulated event and must be reset when
//! the driver moves to the next one.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ProvenanceError;
use crate::reconstruction::{CandidateSite, SiteId, SiteKind};
use crate::simulation::SimulatedEvent;

/// Memoizing resolver from candidate sites to hit indices and origin IDs.
#[derive(Debug, Default)]
pub struct OriginResolver {
    hit_ids: HashMap<SiteId, Arc<[usize]>>,
    origins: HashMap<SiteId, Arc<[u32]>>,
}

impl OriginResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all cached results. Call whenever the simulated event changes.
    pub fn reset(&mut self) {
        self.hit_ids.clear();
        self.origins.clear();
    }

    /// Number of sites with a cached origin set.
    #[must_use]
    pub fn cached_sites(&self) -> usize {
        self.origins.len()
    }

    /// Sorted indices of the hits a site is built from.
    ///
    /// Tracks may contain leaves and clusters, clusters only leaves.
    ///
    /// # Errors
    ///
    /// Returns [`ProvenanceError::UnexpectedSiteKind`] for any other nesting.
    pub fn hit_ids(&mut self, site: &CandidateSite) -> Result<Arc<[usize]>, ProvenanceError> {
        if let Some(cached) = self.hit_ids.get(&site.id) {
            return Ok(Arc::clone(cached));
        }

        let mut ids = Vec::new();
        match &site.kind {
            SiteKind::Leaf { hit } => ids.push(*hit),
            SiteKind::Cluster { leaves } => {
                for leaf in leaves {
                    ids.push(leaf_hit(leaf)?);
                }
            }
            SiteKind::Track { elements } => {
                for element in elements {
                    match &element.kind {
                        SiteKind::Leaf { hit } => ids.push(*hit),
                        SiteKind::Cluster { leaves } => {
                            for leaf in leaves {
                                ids.push(leaf_hit(leaf)?);
                            }
                        }
                        SiteKind::Track { .. } => {
                            return Err(ProvenanceError::UnexpectedSiteKind {
                                site: element.id,
                                found: element.kind_name(),
                            })
                        }
                    }
                }
            }
        }
        ids.sort_unstable();

        let ids: Arc<[usize]> = ids.into();
        self.hit_ids.insert(site.id, Arc::clone(&ids));
        Ok(ids)
    }

    /// Sorted, deduplicated IDs of the interactions that deposited energy in
    /// the site's hits.
    ///
    /// Primary creation, annihilation and decay records are skipped, as is
    /// the null origin 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the site nesting is invalid or refers to a hit the
    /// simulated event does not have. Failed resolutions are not cached.
    pub fn try_resolve(
        &mut self,
        event: &SimulatedEvent,
        site: &CandidateSite,
    ) -> Result<Arc<[u32]>, ProvenanceError> {
        if let Some(cached) = self.origins.get(&site.id) {
            return Ok(Arc::clone(cached));
        }

        let hits = self.hit_ids(site)?;
        let mut origins: Vec<u32> = Vec::with_capacity(hits.len() * 2);
        for &index in hits.iter() {
            let hit = event.hit(index).ok_or(ProvenanceError::HitOutOfRange {
                site: site.id,
                hit: index,
                available: event.num_hits(),
            })?;
            for &origin in &hit.origins {
                let keep = origin >= 1
                    && event
                        .process_of(origin)
                        .is_some_and(|process| !process.is_source());
                if keep {
                    origins.push(origin);
                }
            }
        }
        origins.sort_unstable();
        origins.dedup();

        let origins: Arc<[u32]> = origins.into();
        self.origins.insert(site.id, Arc::clone(&origins));
        Ok(origins)
    }

    /// Like [`try_resolve`](Self::try_resolve), but logs failures and returns
    /// an empty set, which every classifier predicate treats as "cannot
    /// classify".
    pub fn resolve(&mut self, event: &SimulatedEvent, site: &CandidateSite) -> Arc<[u32]> {
        match self.try_resolve(event, site) {
            Ok(origins) => origins,
            Err(err) => {
                log::error!("event {}: {err}", event.event_id);
                Arc::from(Vec::new())
            }
        }
    }
}

fn leaf_hit(site: &CandidateSite) -> Result<usize, ProvenanceError> {
    match site.kind {
        SiteKind::Leaf { hit } => Ok(hit),
        _ => Err(ProvenanceError::UnexpectedSiteKind {
            site: site.id,
            found: site.kind_name(),
        }),
    }
}
