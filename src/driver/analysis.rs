//! Classification of one raw event and accumulation of its features.
//!
//! The proposed ordering is walked start -> central* -> stop. Every position
//! gets a verdict from the [`SequenceClassifier`] and its feature tuple goes
//! into the good or bad matrix of the matching group. Sequences of two sites
//! are handled as a whole by the dual matrices.

use crate::classifier::{SequenceClassifier, Verdict};
use crate::config::ResponseConfig;
use crate::error::StorageError;
use crate::geometry::{GeometryService, Position};
use crate::kinematics::{self, CosineClamp};
use crate::reconstruction::{CandidateSite, RawEvent};
use crate::response::ResponseSet;

/// Why a raw event was not analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Skip {
    TooFewSites,
    OutsideEnergyWindow,
    NoStartPoint,
    TooManySites,
    IncompleteOrdering,
}

/// Resolution left after removing the deposit with resolution `part`.
fn remaining_resolution(total: f64, part: f64) -> f64 {
    (total * total - part * part).max(0.0).sqrt()
}

/// Borrowed view of the builder state needed to analyze raw events.
pub(crate) struct EventAnalyzer<'a> {
    pub config: &'a ResponseConfig,
    pub geometry: &'a dyn GeometryService,
    pub responses: &'a mut ResponseSet,
}

impl EventAnalyzer<'_> {
    fn material(&self, site: &CandidateSite) -> f64 {
        self.geometry.material(&site.position).bin_center()
    }

    fn clamp(&self) -> CosineClamp {
        CosineClamp::new(self.config.max_cosine_limit)
    }

    fn check(&self, raw: &RawEvent) -> Result<(), Skip> {
        let n = raw.num_sites();
        if n <= 1 {
            return Err(Skip::TooFewSites);
        }
        if raw.energy < self.config.energy_min || raw.energy > self.config.energy_max {
            return Err(Skip::OutsideEnergyWindow);
        }
        if raw.start().is_none() {
            return Err(Skip::NoStartPoint);
        }
        if n > self.config.max_interactions {
            return Err(Skip::TooManySites);
        }
        if raw.ordering().count() != n {
            return Err(Skip::IncompleteOrdering);
        }
        Ok(())
    }

    /// Classify `raw` and fill the matrices.
    ///
    /// Returns the event-level verdict (good iff every examined position was
    /// good), or the reason the raw event was skipped.
    ///
    /// # Errors
    ///
    /// Only a coordinate count that does not match a matrix, which is a bug.
    pub fn analyze(
        &mut self,
        classifier: &mut SequenceClassifier<'_>,
        raw: &RawEvent,
    ) -> Result<Result<Verdict, Skip>, StorageError> {
        if let Err(skip) = self.check(raw) {
            log::debug!("raw event {}: skipped ({skip:?})", raw.event_id);
            return Ok(Err(skip));
        }
        let sites: Vec<&CandidateSite> = raw.ordering().collect();
        let all_good = if let [start, stop] = sites.as_slice() {
            self.analyze_dual(classifier, raw, start, stop)?
        } else {
            self.analyze_sequence(classifier, raw, &sites)?
        };

        let verdict = Verdict::from_good(all_good);
        let length = sites.len() as f64;
        self.responses.good_bad.add(&[verdict.coordinate(), length], 1.0)?;
        log::debug!("raw event {}: {verdict:?} sequence of length {}", raw.event_id, sites.len());
        Ok(Ok(verdict))
    }

    fn analyze_dual(
        &mut self,
        classifier: &mut SequenceClassifier<'_>,
        raw: &RawEvent,
        start: &CandidateSite,
        stop: &CandidateSite,
    ) -> Result<bool, StorageError> {
        let e_tot = raw.energy;
        let e_res = raw.energy_resolution;
        let cos_phi = self.clamp().apply(kinematics::cos_phi_energy(start.energy, e_tot));
        let probability = self
            .geometry
            .absorption_probability(&start.position, &stop.position, stop.energy);

        let good = classifier.is_compton_start(start, e_tot, e_res)
            && classifier.is_compton_sequence(
                start,
                stop,
                e_tot - start.energy,
                remaining_resolution(e_res, start.energy_resolution),
            );
        let coordinates = [e_tot, cos_phi, probability, self.material(start)];
        self.responses.dual.add(Verdict::from_good(good), &coordinates)?;
        Ok(good)
    }

    fn analyze_track(
        &mut self,
        classifier: &mut SequenceClassifier<'_>,
        track: &CandidateSite,
        next: &CandidateSite,
        e_tot: f64,
        e_res: f64,
        length: f64,
    ) -> Result<bool, StorageError> {
        let direction = track.track_direction().unwrap_or_else(Position::zeros);
        let clamp = self.clamp();
        let delta_alpha = clamp.apply(kinematics::delta_cos_alpha(
            &track.position,
            &direction,
            &next.position,
            track.energy,
            e_tot,
        ));
        let alpha = clamp.apply(kinematics::cos_alpha_geometric(&track.position, &direction, &next.position));

        let good = classifier.is_compton_track(track, next, e_tot, e_res);
        let coordinates = [delta_alpha, alpha, 1.0, track.energy, length, self.material(track)];
        self.responses.track.add(Verdict::from_good(good), &coordinates)?;
        Ok(good)
    }

    fn analyze_sequence(
        &mut self,
        classifier: &mut SequenceClassifier<'_>,
        raw: &RawEvent,
        sites: &[&CandidateSite],
    ) -> Result<bool, StorageError> {
        let n = sites.len();
        let length = n as f64;
        let clamp = self.clamp();
        let absorptions = self.config.do_absorptions && n <= self.config.max_absorptions;
        let mut e_tot = raw.energy;
        let mut e_res = raw.energy_resolution;
        let mut all_good = true;

        let start = sites[0];
        let good = classifier.is_compton_start(start, e_tot, e_res);
        let cos_phi = clamp.apply(kinematics::cos_phi_energy(start.energy, e_tot));
        let coordinates = [e_tot, cos_phi, length, self.material(start)];
        self.responses.start.add(Verdict::from_good(good), &coordinates)?;
        all_good &= good;

        if start.is_track() {
            all_good &= self.analyze_track(classifier, start, sites[1], e_tot, e_res, length)?;
        }

        for window in sites.windows(3) {
            let [prev, curr, next] = [window[0], window[1], window[2]];
            e_tot -= prev.energy;
            e_res = remaining_resolution(e_res, prev.energy_resolution);

            if absorptions {
                let reach = kinematics::reach_probability(self.geometry, &prev.position, &curr.position, e_tot);
                let good = classifier.is_compton_sequence(prev, curr, e_tot, e_res);
                let coordinates = [reach, e_tot, length, self.material(curr)];
                self.responses.compton_distance.add(Verdict::from_good(good), &coordinates)?;
                all_good &= good;
            }

            let delta_phi = clamp.apply(kinematics::delta_cos_phi(
                &prev.position,
                &curr.position,
                &next.position,
                curr.energy,
                e_tot,
            ));
            let cos_phi = clamp.apply(kinematics::cos_phi_energy(curr.energy, e_tot));
            let lever = kinematics::min_lever_arm(&prev.position, &curr.position, &next.position);
            let good = classifier.is_compton_sequence_triple(prev, curr, next, e_tot, e_res);
            let coordinates = [delta_phi, cos_phi, lever, e_tot, length, self.material(curr)];
            self.responses.compton.add(Verdict::from_good(good), &coordinates)?;
            all_good &= good;

            if curr.is_track() {
                all_good &= self.analyze_track(classifier, curr, next, e_tot, e_res, length)?;
            }
        }

        let (prev, last) = (sites[n - 2], sites[n - 1]);
        e_tot -= prev.energy;
        e_res = remaining_resolution(e_res, prev.energy_resolution);
        if absorptions {
            let probability = self
                .geometry
                .photo_absorption_probability(&prev.position, &last.position, e_tot);
            let good = classifier.is_compton_sequence(prev, last, e_tot, e_res);
            let coordinates = [probability, e_tot, length, self.material(last)];
            self.responses.photo_distance.add(Verdict::from_good(good), &coordinates)?;
            all_good &= good;
        }

        Ok(all_good)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::WarnOnce;
    use crate::geometry::{AttenuationTable, HomogeneousGeometry, Material, Medium};
    use crate::provenance::OriginResolver;
    use crate::reconstruction::SiteFactory;
    use crate::simulation::{fixtures, SimulatedEvent};

    fn geometry() -> HomogeneousGeometry {
        HomogeneousGeometry::new(Medium {
            material: Material::Ge,
            attenuation: AttenuationTable::constant(0.05, 0.2, 0.0),
        })
        .unwrap()
    }

    fn analyze(event: &SimulatedEvent, raw: &RawEvent, config: &ResponseConfig) -> (ResponseSet, Result<Verdict, Skip>) {
        let geometry = geometry();
        let mut responses = ResponseSet::new(config).unwrap();
        let mut resolver = OriginResolver::new();
        let mut warnings = WarnOnce::new();
        let mut classifier = SequenceClassifier::new(
            event,
            &mut resolver,
            &mut warnings,
            config.tolerance,
            config.closure_comparison,
        );
        let mut analyzer = EventAnalyzer {
            config,
            geometry: &geometry,
            responses: &mut responses,
        };
        let outcome = analyzer.analyze(&mut classifier, raw).unwrap();
        (responses, outcome)
    }

    fn dual_raw(b_energy: f64) -> RawEvent {
        let mut f = SiteFactory::new();
        let a = f.leaf(0, 100.0, 3.0, Position::new(0.0, 0.0, 0.0));
        let b = f.leaf(1, b_energy, 4.0, Position::new(0.0, 0.0, 5.0));
        RawEvent::ordered(1, 100.0 + b_energy, 5.0, vec![a, b])
    }

    fn triple_raw(order: [usize; 4]) -> RawEvent {
        let event = fixtures::triple_compton();
        let mut f = SiteFactory::new();
        let sites = event
            .hits
            .iter()
            .enumerate()
            .map(|(i, hit)| f.leaf(i, hit.energy, 2.0, hit.position))
            .collect();
        let mut raw = RawEvent::ordered(event.event_id, 1000.0, 4.0, sites);
        raw.sequence = order.to_vec();
        raw
    }

    #[test]
    fn test_good_dual() {
        let config = ResponseConfig::default();
        let (responses, outcome) = analyze(&fixtures::compton_then_photo(), &dual_raw(400.0), &config);
        assert_eq!(outcome, Ok(Verdict::Good));
        assert_eq!(responses.dual.good.entries(), 1);
        assert_eq!(responses.dual.bad.entries(), 0);
        assert_eq!(responses.good_bad.value_at(&[1.5, 2.0]), 1.0);
        assert_eq!(responses.start.good.entries() + responses.start.bad.entries(), 0);
    }

    #[test]
    fn test_short_absorption_is_bad_dual() {
        let config = ResponseConfig::default();
        let (responses, outcome) = analyze(&fixtures::compton_then_photo(), &dual_raw(350.0), &config);
        assert_eq!(outcome, Ok(Verdict::Bad));
        assert_eq!(responses.dual.bad.entries(), 1);
        assert_eq!(responses.dual.good.entries(), 0);
        assert_eq!(responses.good_bad.value_at(&[0.5, 2.0]), 1.0);
    }

    #[test]
    fn test_true_order_fills_good_matrices() {
        let config = ResponseConfig::default();
        let (responses, outcome) = analyze(&fixtures::triple_compton(), &triple_raw([0, 1, 2, 3]), &config);
        assert_eq!(outcome, Ok(Verdict::Good));
        assert_eq!(responses.start.good.entries(), 1);
        assert_eq!(responses.compton.good.entries(), 2);
        assert_eq!(responses.compton_distance.good.entries(), 2);
        assert_eq!(responses.photo_distance.good.entries(), 1);
        assert_eq!(responses.compton.bad.entries(), 0);
        assert_eq!(responses.total_dropped(), 0);
        assert_eq!(responses.good_bad.value_at(&[1.5, 4.0]), 1.0);
    }

    #[test]
    fn test_swapped_order_is_bad() {
        let config = ResponseConfig::default();
        let (responses, outcome) = analyze(&fixtures::triple_compton(), &triple_raw([0, 2, 1, 3]), &config);
        assert_eq!(outcome, Ok(Verdict::Bad));
        assert!(responses.compton.bad.entries() >= 1);
        assert_eq!(responses.good_bad.value_at(&[0.5, 4.0]), 1.0);
    }

    #[test]
    fn test_absorptions_can_be_disabled() {
        let mut config = ResponseConfig::default();
        config.do_absorptions = false;
        let (responses, _) = analyze(&fixtures::triple_compton(), &triple_raw([0, 1, 2, 3]), &config);
        assert_eq!(responses.compton_distance.good.entries(), 0);
        assert_eq!(responses.photo_distance.good.entries(), 0);

        let mut config = ResponseConfig::default();
        config.max_absorptions = 3;
        let (responses, _) = analyze(&fixtures::triple_compton(), &triple_raw([0, 1, 2, 3]), &config);
        assert_eq!(responses.photo_distance.good.entries(), 0);
        assert_eq!(responses.compton.good.entries(), 2);
    }

    #[test]
    fn test_skips() {
        let config = ResponseConfig::default();
        let event = fixtures::compton_then_photo();

        let mut f = SiteFactory::new();
        let single = RawEvent::ordered(1, 500.0, 5.0, vec![f.leaf(0, 500.0, 5.0, Position::zeros())]);
        assert_eq!(analyze(&event, &single, &config).1, Err(Skip::TooFewSites));

        let mut raw = dual_raw(400.0);
        raw.energy = 50.0;
        assert_eq!(analyze(&event, &raw, &config).1, Err(Skip::OutsideEnergyWindow));

        let mut raw = dual_raw(400.0);
        raw.sequence.clear();
        assert_eq!(analyze(&event, &raw, &config).1, Err(Skip::NoStartPoint));

        let mut raw = dual_raw(400.0);
        raw.sequence.truncate(1);
        assert_eq!(analyze(&event, &raw, &config).1, Err(Skip::IncompleteOrdering));

        let mut config = ResponseConfig::default();
        config.max_interactions = 3;
        let (responses, outcome) = analyze(&fixtures::triple_compton(), &triple_raw([0, 1, 2, 3]), &config);
        assert_eq!(outcome, Err(Skip::TooManySites));
        assert_eq!(responses.total_entries(), 0);
    }

    #[test]
    fn test_remaining_resolution_never_negative() {
        assert!((remaining_resolution(5.0, 3.0) - 4.0).abs() < 1e-12);
        assert_eq!(remaining_resolution(2.0, 3.0), 0.0);
    }
}
