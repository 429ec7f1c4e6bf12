//! Pairs simulated and reconstructed events by event ID.
//!
//! Both streams are increasing in ID but either may skip events, and IDs wrap
//! around when input files are chained. Each stream therefore carries a
//! `(level, id)` cursor whose level grows on every wrap, and the matcher
//! always advances the stream that is behind.

use std::cmp::Ordering;

use crate::diagnostics::{RunStats, WarnOnce};
use crate::error::{ResponseResult, SourceError};
use crate::oracle::{ReconstructionSource, SimulationSource};
use crate::provenance::OriginResolver;
use crate::reconstruction::RawEventList;
use crate::simulation::SimulatedEvent;

/// Position of an event in a possibly wrapping ID stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
struct Cursor {
    level: u64,
    id: u64,
}

impl Cursor {
    /// Move to `id`, opening a new level if the ID went backwards.
    fn advance(&mut self, id: u64) {
        if id < self.id {
            self.level += 1;
        }
        self.id = id;
    }
}

const DESYNC_HINT: &str = "simulation and reconstruction disagree; likely causes: \
     no interaction information stored in the simulation, \
     step length too long, or too high production thresholds";

/// Event-ID matcher with a sanity check on every matched pair.
#[derive(Debug, Default)]
pub(crate) struct EventMatcher {
    only_init_required: bool,
    rec_cursor: Cursor,
    sim_cursor: Cursor,
    rec_head: Option<RawEventList>,
    sim_head: Option<SimulatedEvent>,
}

impl EventMatcher {
    pub fn new(only_init_required: bool) -> Self {
        Self {
            only_init_required,
            ..Self::default()
        }
    }

    fn read_reconstructed(
        &mut self,
        source: &mut dyn ReconstructionSource,
        stats: &mut RunStats,
    ) -> ResponseResult<bool> {
        loop {
            let list = match source.analyze_next() {
                Ok(Some(list)) => list,
                Ok(None) => return Ok(false),
                Err(SourceError::InvalidEvent { event_id, reason }) => {
                    stats.reconstructed_read += 1;
                    log::warn!("skipping reconstructed event {event_id}: {reason}");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            stats.reconstructed_read += 1;
            let id = match list.primary() {
                Some(primary) if !primary.is_pair => primary.event_id,
                Some(primary) => {
                    log::info!("skipping reconstructed event {}: pair event", primary.event_id);
                    continue;
                }
                None => {
                    log::info!("skipping reconstructed event list without raw events");
                    continue;
                }
            };
            self.rec_cursor.advance(id);
            self.rec_head = Some(list);
            return Ok(true);
        }
    }

    fn read_simulated(&mut self, source: &mut dyn SimulationSource, stats: &mut RunStats) -> ResponseResult<bool> {
        loop {
            let event = match source.next_event(false) {
                Ok(Some(event)) => event,
                Ok(None) => return Ok(false),
                Err(SourceError::InvalidEvent { event_id, reason }) => {
                    stats.simulated_read += 1;
                    log::warn!("skipping simulated event {event_id}: {reason}");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            stats.simulated_read += 1;
            // the cursor moves even for unusable events so that wraps are seen
            self.sim_cursor.advance(event.event_id);
            if !event.is_complete(self.only_init_required) {
                log::info!(
                    "skipping simulated event {}: truncated or without interaction information",
                    event.event_id
                );
                continue;
            }
            self.sim_head = Some(event);
            return Ok(true);
        }
    }

    /// Returns the next matched pair that passes the sanity check, or `None`
    /// once either stream is exhausted.
    ///
    /// The resolver is reset for the returned event.
    ///
    /// # Errors
    ///
    /// Source errors other than [`SourceError::InvalidEvent`].
    pub fn next_pair(
        &mut self,
        simulation: &mut dyn SimulationSource,
        reconstruction: &mut dyn ReconstructionSource,
        resolver: &mut OriginResolver,
        warnings: &mut WarnOnce,
        stats: &mut RunStats,
    ) -> ResponseResult<Option<(SimulatedEvent, RawEventList)>> {
        loop {
            if self.rec_head.is_none() && !self.read_reconstructed(reconstruction, stats)? {
                return Ok(None);
            }
            if self.sim_head.is_none() && !self.read_simulated(simulation, stats)? {
                return Ok(None);
            }

            match self.rec_cursor.cmp(&self.sim_cursor) {
                Ordering::Less => {
                    log::debug!("no simulated event for reconstructed event {}", self.rec_cursor.id);
                    self.rec_head = None;
                }
                Ordering::Greater => {
                    log::debug!("simulated event {} was not reconstructed", self.sim_cursor.id);
                    self.sim_head = None;
                }
                Ordering::Equal => {
                    let (Some(event), Some(list)) = (self.sim_head.take(), self.rec_head.take()) else {
                        continue;
                    };
                    resolver.reset();
                    if let Err(reason) = self.sanity_check(&event, &list, resolver) {
                        stats.sanity_failures += 1;
                        log::info!("event {}: {reason}", event.event_id);
                        warnings.warn("matcher-desync", || DESYNC_HINT.to_string());
                        continue;
                    }
                    stats.matched += 1;
                    return Ok(Some((event, list)));
                }
            }
        }
    }

    /// Checks that the reconstruction can be explained by the simulation.
    fn sanity_check(
        &self,
        event: &SimulatedEvent,
        list: &RawEventList,
        resolver: &mut OriginResolver,
    ) -> Result<(), String> {
        if self.only_init_required {
            return Ok(());
        }
        if event.ignored_hits > 0 {
            return Err(format!("{} simulated hits were ignored", event.ignored_hits));
        }
        for raw in list.raw_events().iter().filter(|raw| !raw.has_vertex) {
            if event.num_hits() < raw.num_sites() {
                return Err(format!(
                    "{} reconstructed sites but only {} simulated hits",
                    raw.num_sites(),
                    event.num_hits()
                ));
            }
            for site in &raw.sites {
                let origins = resolver.resolve(event, site);
                if origins.is_empty() {
                    return Err(format!("site {} has no simulated origin", site.id));
                }
                if let Some(&origin) = origins.iter().find(|&&o| o <= 1) {
                    return Err(format!("site {} is attributed to interaction {origin}", site.id));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Position;
    use crate::oracle::{VecReconstructionSource, VecSimulationSource};
    use crate::reconstruction::{RawEvent, SiteFactory};
    use crate::simulation::{fixtures, Process};

    fn simulated(id: u64) -> SimulatedEvent {
        let mut event = fixtures::compton_then_photo();
        event.event_id = id;
        event
    }

    fn reconstructed(id: u64) -> RawEventList {
        let mut f = SiteFactory::new();
        let a = f.leaf(0, 100.0, 3.0, Position::new(0.0, 0.0, 0.0));
        let b = f.leaf(1, 400.0, 4.0, Position::new(0.0, 0.0, 5.0));
        RawEventList::new(vec![RawEvent::ordered(id, 500.0, 5.0, vec![a, b])])
    }

    struct Run {
        matcher: EventMatcher,
        simulation: VecSimulationSource,
        reconstruction: VecReconstructionSource,
        resolver: OriginResolver,
        warnings: WarnOnce,
        stats: RunStats,
    }

    impl Run {
        fn new(sim: Vec<SimulatedEvent>, rec: Vec<RawEventList>) -> Self {
            Self {
                matcher: EventMatcher::new(false),
                simulation: VecSimulationSource::new(sim),
                reconstruction: VecReconstructionSource::new(rec),
                resolver: OriginResolver::new(),
                warnings: WarnOnce::new(),
                stats: RunStats::default(),
            }
        }

        fn matched_ids(&mut self) -> Vec<u64> {
            let mut ids = Vec::new();
            while let Some((event, list)) = self
                .matcher
                .next_pair(
                    &mut self.simulation,
                    &mut self.reconstruction,
                    &mut self.resolver,
                    &mut self.warnings,
                    &mut self.stats,
                )
                .unwrap()
            {
                assert_eq!(event.event_id, list.primary().unwrap().event_id);
                ids.push(event.event_id);
            }
            ids
        }
    }

    #[test]
    fn test_matches_equal_ids() {
        let mut run = Run::new(
            vec![simulated(1), simulated(2), simulated(3)],
            vec![reconstructed(1), reconstructed(2), reconstructed(3)],
        );
        assert_eq!(run.matched_ids(), vec![1, 2, 3]);
        assert_eq!(run.stats.matched, 3);
        assert_eq!(run.stats.sanity_failures, 0);
    }

    #[test]
    fn test_recovers_from_gaps_on_both_sides() {
        let mut run = Run::new(
            vec![simulated(1), simulated(2), simulated(4), simulated(5)],
            vec![reconstructed(2), reconstructed(3), reconstructed(5)],
        );
        assert_eq!(run.matched_ids(), vec![2, 5]);
        assert_eq!(run.stats.simulated_read, 4);
        assert_eq!(run.stats.reconstructed_read, 3);
    }

    #[test]
    fn test_id_wrap_opens_new_level() {
        let mut run = Run::new(
            vec![simulated(5), simulated(6), simulated(1), simulated(2)],
            vec![reconstructed(6), reconstructed(2)],
        );
        assert_eq!(run.matched_ids(), vec![6, 2]);
    }

    #[test]
    fn test_skips_pair_and_incomplete_events() {
        let mut pair = reconstructed(1);
        pair.raw_events[0].is_pair = true;
        let mut truncated = simulated(2);
        truncated.interactions.truncate(1);
        let mut run = Run::new(
            vec![simulated(1), truncated, simulated(3)],
            vec![pair, reconstructed(2), reconstructed(3), RawEventList::default()],
        );
        assert_eq!(run.matched_ids(), vec![3]);
    }

    #[test]
    fn test_sanity_failure_is_skipped_and_warned_once() {
        let mut ignored = simulated(1);
        ignored.ignored_hits = 2;
        let mut primary_hit = simulated(2);
        primary_hit.hits[0].origins = vec![1];
        let mut too_few_hits = simulated(3);
        too_few_hits.hits.truncate(1);
        let mut run = Run::new(
            vec![ignored, primary_hit, too_few_hits, simulated(4)],
            (1..=4).map(reconstructed).collect(),
        );
        assert_eq!(run.matched_ids(), vec![4]);
        assert_eq!(run.stats.sanity_failures, 3);
        assert!(run.warnings.has_seen("matcher-desync"));
    }

    #[test]
    fn test_vertex_events_skip_hit_checks() {
        let mut too_few_hits = simulated(1);
        too_few_hits.hits.truncate(1);
        let mut list = reconstructed(1);
        list.raw_events[0].has_vertex = true;
        let mut run = Run::new(vec![too_few_hits], vec![list]);
        assert_eq!(run.matched_ids(), vec![1]);
    }

    #[test]
    fn test_init_only_events_pass_when_allowed() {
        let mut init_only = simulated(1);
        init_only.interactions.truncate(1);
        init_only.hits.truncate(1);
        init_only.hits[0].origins = vec![1];
        assert_eq!(init_only.interactions[0].process, Process::Init);

        let mut run = Run::new(vec![init_only.clone()], vec![reconstructed(1)]);
        assert!(run.matched_ids().is_empty());

        let mut run = Run::new(vec![init_only], vec![reconstructed(1)]);
        run.matcher = EventMatcher::new(true);
        assert_eq!(run.matched_ids(), vec![1]);
    }

    #[test]
    fn test_invalid_simulated_event_is_skipped() {
        let mut broken = simulated(1);
        broken.interactions[2].origin_id = 7;
        let mut run = Run::new(
            vec![broken, simulated(2)],
            vec![reconstructed(1), reconstructed(2)],
        );
        assert_eq!(run.matched_ids(), vec![2]);
    }
}
