//! Internal ordering of reconstructed electron tracks.
//!
//! A track is an ordered list of hits left by one charged particle. Its
//! direction is right when the hits of each element are contiguous in
//! simulation time, no foreign hit falls between neighbouring elements, and
//! the first (last) element holds the earliest (latest) deposit of the
//! particle.

use super::SequenceClassifier;
use crate::absorption;
use crate::reconstruction::CandidateSite;

impl SequenceClassifier<'_> {
    fn hit_time(&self, index: usize) -> Option<f64> {
        self.event.hit(index).map(|h| h.time)
    }

    /// Returns true if the hits strictly between the last hit of `before`
    /// and the first hit of `after` in time are none.
    fn gap_is_empty(&self, before: &[usize], after: &[usize]) -> bool {
        let (Some(&last), Some(&first)) = (before.last(), after.first()) else {
            return false;
        };
        let (Some(from), Some(to)) = (self.hit_time(last), self.hit_time(first)) else {
            return false;
        };
        !self.event.hits.iter().any(|h| h.time > from && h.time < to)
    }

    /// An origin shared by a hit of every group: the last shared origin of
    /// the latest hit in the first group that has one.
    fn common_origin(&self, groups: &[&[usize]]) -> Option<u32> {
        let (first, rest) = groups.split_first()?;
        let mut common = None;
        for &index in *first {
            let Some(hit) = self.event.hit(index) else {
                continue;
            };
            for &origin in &hit.origins {
                let shared = rest.iter().all(|group| {
                    group
                        .iter()
                        .any(|&i| self.event.hit(i).is_some_and(|h| h.has_origin(origin)))
                });
                if shared {
                    common = Some(origin);
                }
            }
        }
        common
    }

    fn track_absorbed(&self, context: &str, hit_ids: &[usize], energy: f64) -> bool {
        match absorption::check_track_completely_absorbed(self.event, hit_ids, energy, &self.tolerance) {
            Ok(_) => true,
            Err(reason) => {
                log::debug!("{context}: {reason}");
                false
            }
        }
    }

    /// Returns true if no hit that shares an origin with `ids` lies strictly
    /// inside their time span without being one of them.
    #[must_use]
    pub fn are_hits_in_sequence(&self, ids: &[usize]) -> bool {
        let mut origins: Vec<u32> = Vec::new();
        let mut min_time = f64::MAX;
        let mut max_time = f64::MIN;
        for &index in ids {
            let Some(hit) = self.event.hit(index) else {
                log::debug!("are hits in sequence: hit {index} does not exist");
                return false;
            };
            for &origin in &hit.origins {
                if !origins.contains(&origin) {
                    origins.push(origin);
                }
            }
            min_time = min_time.min(hit.time);
            max_time = max_time.max(hit.time);
        }

        self.event.hits.iter().enumerate().all(|(index, hit)| {
            let inside = hit.time > min_time && hit.time < max_time;
            !inside || !origins.iter().any(|&o| hit.has_origin(o)) || ids.contains(&index)
        })
    }

    /// Returns true if `track` is a correctly oriented recoil electron track
    /// of a single Compton scatter followed by `next`.
    pub fn is_compton_track(
        &mut self,
        track: &CandidateSite,
        next: &CandidateSite,
        e_tot: f64,
        e_res: f64,
    ) -> bool {
        log::trace!("is compton track: looking at {} ({e_tot})", track.id);
        if !track.is_track() {
            log::debug!("is compton track: {} is a {}", track.id, track.kind_name());
            return false;
        }
        if !self.is_single_compton(track) {
            log::debug!("is compton track: {} has multiple Comptons", track.id);
            return false;
        }
        if !self.is_compton_sequence(track, next, e_tot - track.energy, e_res) {
            log::debug!("is compton track: no Compton sequence");
            return false;
        }
        let [first, second, ..] = track.children() else {
            log::debug!("is compton track: {} has fewer than two elements", track.id);
            return false;
        };
        if !self.is_track_start(first, second, track.energy) {
            log::debug!("is compton track: track {} is wrong", track.id);
            return false;
        }
        true
    }

    /// Returns true if `start` is the first element of a track continuing
    /// with `central`. With `energy > 0` the track must be fully absorbed.
    pub fn is_track_start(&mut self, start: &CandidateSite, central: &CandidateSite, energy: f64) -> bool {
        let start_ids = self.hit_ids(start);
        let central_ids = self.hit_ids(central);
        if start_ids.is_empty() || central_ids.is_empty() {
            return false;
        }
        if !self.are_hits_in_sequence(&start_ids) {
            log::debug!("is track start: start hits not in sequence");
            return false;
        }
        if !self.are_hits_in_sequence(&central_ids) {
            log::debug!("is track start: central hits not in sequence");
            return false;
        }
        if !self.gap_is_empty(&start_ids, &central_ids) {
            log::debug!("is track start: hit between start and central according to time");
            return false;
        }
        let Some(origin) = self.common_origin(&[&start_ids[..], &central_ids[..]]) else {
            log::debug!("is track start: no common origin");
            return false;
        };

        let earliest = start_ids
            .iter()
            .filter_map(|&i| self.hit_time(i))
            .fold(f64::MAX, f64::min);
        if self
            .event
            .hits
            .iter()
            .any(|h| h.has_origin(origin) && h.time < earliest)
        {
            log::debug!("is track start: not the first hit (timing)");
            return false;
        }

        if energy > 0.0 && !self.track_absorbed("is track start", &start_ids, energy) {
            return false;
        }
        true
    }

    /// Returns true if `stop` is the last element of a track coming from
    /// `central`, and the track is fully absorbed.
    pub fn is_track_stop(&mut self, central: &CandidateSite, stop: &CandidateSite, energy: f64) -> bool {
        let central_ids = self.hit_ids(central);
        let stop_ids = self.hit_ids(stop);
        if central_ids.is_empty() || stop_ids.is_empty() {
            return false;
        }
        if !self.are_hits_in_sequence(&central_ids) {
            log::debug!("is track stop: central hits not in sequence");
            return false;
        }
        if !self.are_hits_in_sequence(&stop_ids) {
            log::debug!("is track stop: stop hits not in sequence");
            return false;
        }
        if !self.gap_is_empty(&central_ids, &stop_ids) {
            log::debug!("is track stop: hit between central and stop according to time");
            return false;
        }
        let Some(origin) = self.common_origin(&[&central_ids[..], &stop_ids[..]]) else {
            log::debug!("is track stop: no common origin");
            return false;
        };

        let latest = stop_ids
            .iter()
            .filter_map(|&i| self.hit_time(i))
            .fold(f64::MIN, f64::max);
        if self
            .event
            .hits
            .iter()
            .any(|h| h.has_origin(origin) && h.time > latest)
        {
            log::debug!("is track stop: not the last hit (timing)");
            return false;
        }

        self.track_absorbed("is track stop", &stop_ids, energy)
    }

    /// Returns true if `start -> central -> stop` are consecutive elements
    /// of one track and `central` is fully absorbed.
    pub fn are_sites_in_sequence(
        &mut self,
        start: &CandidateSite,
        central: &CandidateSite,
        stop: &CandidateSite,
        energy: f64,
    ) -> bool {
        let start_ids = self.hit_ids(start);
        let central_ids = self.hit_ids(central);
        let stop_ids = self.hit_ids(stop);
        if start_ids.is_empty() || central_ids.is_empty() || stop_ids.is_empty() {
            return false;
        }
        for (name, ids) in [("start", &start_ids), ("central", &central_ids), ("stop", &stop_ids)] {
            if !self.are_hits_in_sequence(ids) {
                log::debug!("are sites in sequence: {name} hits not in sequence");
                return false;
            }
        }
        if !self.gap_is_empty(&start_ids, &central_ids) || !self.gap_is_empty(&central_ids, &stop_ids) {
            log::debug!("are sites in sequence: hit between neighbours according to time");
            return false;
        }
        if self
            .common_origin(&[&start_ids[..], &central_ids[..], &stop_ids[..]])
            .is_none()
        {
            log::debug!("are sites in sequence: no common origin");
            return false;
        }

        let times = (
            self.hit_time(start_ids[0]),
            self.hit_time(central_ids[0]),
            self.hit_time(stop_ids[0]),
        );
        let (Some(t_start), Some(t_central), Some(t_stop)) = times else {
            return false;
        };
        if t_start > t_central || t_central > t_stop {
            log::debug!("are sites in sequence: timing wrong");
            return false;
        }

        self.track_absorbed("are sites in sequence", &central_ids, energy)
    }
}
