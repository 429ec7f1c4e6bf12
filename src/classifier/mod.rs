//! Ground-truth classification of candidate orderings.
//!
//! A [`SequenceClassifier`] answers, for one simulated event, whether a
//! candidate site is a valid sequence start, whether two or three sites
//! follow each other in the true photon history, and whether tracks are
//! traversed in the right direction. Every predicate is a pure decision:
//! `false` means "wrong at this position" and is logged at debug level with
//! its reason. Nothing here returns an error or panics.

mod track;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::absorption::{self, Rejection};
use crate::config::AbsorptionTolerance;
use crate::dependency::{self, ClosureComparison};
use crate::diagnostics::WarnOnce;
use crate::provenance::OriginResolver;
use crate::reconstruction::CandidateSite;
use crate::simulation::{ParticleId, Process, SimulatedEvent};

/// Outcome of classifying one sequence position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Good,
    Bad,
}

impl Verdict {
    #[must_use]
    pub const fn from_good(good: bool) -> Self {
        if good {
            Self::Good
        } else {
            Self::Bad
        }
    }

    #[must_use]
    pub const fn is_good(self) -> bool {
        matches!(self, Self::Good)
    }

    /// Bin center on the good/bad axis: 1.5 for good, 0.5 for bad.
    #[must_use]
    pub const fn coordinate(self) -> f64 {
        match self {
            Self::Good => 1.5,
            Self::Bad => 0.5,
        }
    }
}

impl From<bool> for Verdict {
    fn from(good: bool) -> Self {
        Self::from_good(good)
    }
}

/// Number of Compton scatters in `ids` whose photon came from `true_origin`.
#[must_use]
pub fn number_of_compton_interactions(event: &SimulatedEvent, ids: &[u32], true_origin: u32) -> usize {
    ids.iter()
        .filter_map(|&id| event.interaction(id))
        .filter(|ia| ia.process == Process::Comp && ia.origin_id == true_origin)
        .count()
}

/// Classifier bound to one simulated event.
///
/// Borrows the driver's resolver cache and warn-once registry for the
/// duration of the event.
pub struct SequenceClassifier<'a> {
    event: &'a SimulatedEvent,
    resolver: &'a mut OriginResolver,
    warnings: &'a mut WarnOnce,
    tolerance: AbsorptionTolerance,
    closure: ClosureComparison,
}

impl<'a> SequenceClassifier<'a> {
    /// Create a classifier for `event`. The resolver must have been reset
    /// when the driver switched to this event.
    pub fn new(
        event: &'a SimulatedEvent,
        resolver: &'a mut OriginResolver,
        warnings: &'a mut WarnOnce,
        tolerance: AbsorptionTolerance,
        closure: ClosureComparison,
    ) -> Self {
        Self {
            event,
            resolver,
            warnings,
            tolerance,
            closure,
        }
    }

    /// The simulated event.
    #[must_use]
    pub fn event(&self) -> &'a SimulatedEvent {
        self.event
    }

    /// Origin IDs of `site` (cached).
    pub fn origins(&mut self, site: &CandidateSite) -> Arc<[u32]> {
        self.resolver.resolve(self.event, site)
    }

    /// Sorted hit indices of `site`, or an empty list on a malformed site.
    pub fn hit_ids(&mut self, site: &CandidateSite) -> Arc<[usize]> {
        match self.resolver.hit_ids(site) {
            Ok(ids) => ids,
            Err(err) => {
                log::error!("event {}: {err}", self.event.event_id);
                Arc::from(Vec::new())
            }
        }
    }

    fn contains_only_compton_dependants(&self, ids: &[u32]) -> bool {
        dependency::contains_only_compton_dependants(self.event, ids, self.closure)
    }

    fn absorbed(&mut self, context: &str, ids: &[u32], observed: f64, resolution: f64) -> bool {
        match absorption::check_absorbed(self.event, ids, observed, resolution, &self.tolerance) {
            Ok(_) => true,
            Err(Rejection::UnsupportedProcess { process, .. }) => {
                self.warnings.info(&format!("unsupported-process:{process}"), || {
                    format!(
                        "Ignoring events that contain interactions other than COMP, PHOT and RAYL (found {process})"
                    )
                });
                false
            }
            Err(reason) => {
                log::debug!("{context}: {reason}");
                false
            }
        }
    }

    fn totally_absorbed(&self, context: &str, ids: &[u32], observed: f64, resolution: f64) -> bool {
        match absorption::check_totally_absorbed(self.event, ids, observed, resolution, &self.tolerance) {
            Ok(_) => true,
            Err(reason) => {
                log::debug!("{context}: {reason}");
                false
            }
        }
    }

    /// Returns true if `site` is the first interaction of a Compton sequence.
    ///
    /// With `e_tot > 0` the site must also hold its own deposit and the
    /// photon energy `e_tot` must match what entered it.
    pub fn is_compton_start(&mut self, site: &CandidateSite, e_tot: f64, e_res: f64) -> bool {
        log::trace!("is compton start: looking at {}", site.id);
        let origins = self.origins(site);
        let Some(&smallest) = origins.first() else {
            log::debug!("is compton start: {} has no origins", site.id);
            return false;
        };
        let Some(true_origin) = self.event.origin_of(smallest) else {
            return false;
        };

        if e_tot > 0.0 {
            if !self.absorbed("is compton start", &origins, site.energy, site.energy_resolution) {
                log::debug!("is compton start: {} not completely absorbed", site.id);
                return false;
            }
            if !self.totally_absorbed("is compton start", &origins, e_tot, e_res) {
                log::debug!("is compton start: remaining sequence not completely absorbed");
                return false;
            }
        }

        let creates_photon = self.event.interaction(true_origin).is_some_and(|ia| {
            ia.secondary_particle_id == ParticleId::PHOTON
                || (ia.secondary_particle_id == ParticleId::NONE && ia.mother_particle_id == ParticleId::PHOTON)
        });
        if !creates_photon {
            log::debug!("is compton start: interaction {true_origin} neither created a photon nor is a photon creating nothing");
            return false;
        }

        if !self.contains_only_compton_dependants(&origins) {
            log::debug!("is compton start: {} contains not only Compton dependants", site.id);
            return false;
        }

        let comptons = number_of_compton_interactions(self.event, &origins, true_origin);
        if comptons != 1 {
            log::debug!("is compton start: not exactly one Compton interaction ({comptons})");
            return false;
        }
        true
    }

    /// Returns true if `curr` directly follows `prev` in the photon history.
    ///
    /// With `e_tot > 0`, `e_tot` must match the energy that entered `curr`.
    pub fn is_compton_sequence(
        &mut self,
        prev: &CandidateSite,
        curr: &CandidateSite,
        e_tot: f64,
        e_res: f64,
    ) -> bool {
        log::trace!("is compton sequence: looking at {} - {}", prev.id, curr.id);
        let prev_origins = self.origins(prev);
        if prev_origins.is_empty() {
            log::debug!("is compton sequence: {} has no origins", prev.id);
            return false;
        }
        let curr_origins = self.origins(curr);
        if curr_origins.is_empty() {
            log::debug!("is compton sequence: {} has no origins", curr.id);
            return false;
        }
        if !self.contains_only_compton_dependants(&curr_origins) {
            log::debug!("is compton sequence: {} contains not only Compton dependants", curr.id);
            return false;
        }
        if !self.are_in_compton_sequence(&prev_origins, &curr_origins) {
            return false;
        }
        if e_tot > 0.0 && !self.totally_absorbed("is compton sequence", &curr_origins, e_tot, e_res) {
            return false;
        }
        true
    }

    /// Returns true if `prev -> curr -> next` are three consecutive steps of
    /// the photon history and `curr` is fully accounted for.
    pub fn is_compton_sequence_triple(
        &mut self,
        prev: &CandidateSite,
        curr: &CandidateSite,
        next: &CandidateSite,
        e_tot: f64,
        e_res: f64,
    ) -> bool {
        log::trace!("is compton sequence: looking at {} - {} - {}", prev.id, curr.id, next.id);
        let prev_origins = self.origins(prev);
        if prev_origins.is_empty() {
            log::debug!("is compton sequence: {} has no origins", prev.id);
            return false;
        }
        let curr_origins = self.origins(curr);
        if curr_origins.is_empty() {
            log::debug!("is compton sequence: {} has no origins", curr.id);
            return false;
        }
        if !self.absorbed("is compton sequence", &curr_origins, curr.energy, curr.energy_resolution) {
            log::debug!("is compton sequence: {} not completely absorbed", curr.id);
            return false;
        }
        let next_origins = self.origins(next);
        if next_origins.is_empty() {
            log::debug!("is compton sequence: {} has no origins", next.id);
            return false;
        }
        if !self.contains_only_compton_dependants(&curr_origins) {
            log::debug!("is compton sequence: {} contains not only Compton dependants", curr.id);
            return false;
        }
        if !self.contains_only_compton_dependants(&next_origins) {
            log::debug!("is compton sequence: {} contains not only Compton dependants", next.id);
            return false;
        }
        if !self.are_in_compton_sequence(&prev_origins, &curr_origins)
            || !self.are_in_compton_sequence(&curr_origins, &next_origins)
        {
            return false;
        }
        if !self.totally_absorbed("is compton sequence", &curr_origins, e_tot, e_res) {
            return false;
        }
        let behind = prev_origins
            .iter()
            .any(|&p| i64::from(next_origins[0]) - i64::from(p) == 2);
        if !behind {
            log::debug!("is compton sequence: more than one Compton between {} and {}", prev.id, next.id);
            return false;
        }
        true
    }

    /// Returns true if the step with origins `b` directly follows the
    /// Compton scatter with origins `a` of the same photon.
    ///
    /// Both sets must be non-empty and sorted.
    #[must_use]
    pub fn are_in_compton_sequence(&self, a: &[u32], b: &[u32]) -> bool {
        let (Some(&a0), Some(&b0)) = (a.first(), b.first()) else {
            return false;
        };
        let (Some(first), Some(second)) = (self.event.interaction(a0), self.event.interaction(b0)) else {
            return false;
        };
        if first.process != Process::Comp {
            log::debug!("are in compton sequence: {a0} is {}, not COMP", first.process);
            return false;
        }
        if first.origin_id != second.origin_id {
            log::debug!("are in compton sequence: {a0} and {b0} have no common origin");
            return false;
        }
        if !a.iter().any(|&id| i64::from(b0) - i64::from(id) == 1) {
            log::debug!("are in compton sequence: {a0} and {b0} are not behind each other");
            return false;
        }
        true
    }

    /// Returns true if `site` is the last step of a photon history.
    pub fn is_compton_end(&mut self, site: &CandidateSite) -> bool {
        log::trace!("is compton end: looking at {}", site.id);
        let origins = self.origins(site);
        let Some(&smallest) = origins.first() else {
            log::debug!("is compton end: {} has no origins", site.id);
            return false;
        };
        if !self.totally_absorbed("is compton end", &origins, site.energy, site.energy_resolution) {
            return false;
        }
        if !self.contains_only_compton_dependants(&origins) {
            log::debug!("is compton end: {} contains not only Compton dependants", site.id);
            return false;
        }
        if self.event.num_interactions() < 3 {
            log::debug!("is compton end: not enough interactions");
            return false;
        }

        let Some(ia) = self.event.interaction(smallest) else {
            return false;
        };
        let governing = if ia.origin_id == 0 {
            Some(ia.process)
        } else {
            self.event.process_of(ia.origin_id)
        };
        matches!(governing, Some(Process::Anni | Process::Init))
    }

    /// Returns true if `site` holds exactly one Compton scatter (with any
    /// number of photo-absorptions), or no scatter but a photo-absorption.
    pub fn is_single_compton(&mut self, site: &CandidateSite) -> bool {
        let origins = self.origins(site);
        if origins.is_empty() {
            log::debug!("is single compton: {} has no origins", site.id);
            return false;
        }
        let mut comptons = 0;
        let mut photos = 0;
        for process in origins.iter().filter_map(|&id| self.event.process_of(id)) {
            match process {
                Process::Comp => comptons += 1,
                Process::Phot => photos += 1,
                _ => {}
            }
        }
        let single = comptons == 1 || (comptons == 0 && photos >= 1);
        log::trace!("is single compton: C={comptons} P={photos} -> {single}");
        single
    }
}
