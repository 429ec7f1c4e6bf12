//! Checks that an origin set describes exactly one atomic step of a photon
//! history: one Compton scatter, or one photo-absorption right after a
//! scatter, together with everything that step caused locally.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::simulation::{Process, SimulatedEvent};

/// How the downward pass decides whether a descendant is in the origin set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureComparison {
    /// Compare the descendant's interaction ID with the set members.
    /// Violations reject the set.
    #[default]
    InteractionId,
    /// Compare the descendant's position in the closure list with the
    /// positions of the set. This mirrors the legacy response generator,
    /// which only reported violations and never rejected a set.
    ListPosition,
}

/// Walk the origin links of `id` up to the primary and return the topmost
/// member of `ids` met on the way, or `id` itself if there is none.
///
/// Returns `None` if the chain refers to a missing interaction.
#[must_use]
pub fn governing_interaction(event: &SimulatedEvent, ids: &[u32], id: u32) -> Option<u32> {
    let mut highest = id;
    let mut current = id;
    loop {
        let origin = event.origin_of(current)?;
        if origin == 0 {
            return Some(highest);
        }
        if origin != id && ids.contains(&origin) {
            highest = origin;
        }
        if event.process_of(origin)? == Process::Init {
            return Some(highest);
        }
        current = origin;
    }
}

/// Returns true if interaction `id` can head a sequence element: it is a
/// Compton scatter, or a photo-absorption whose photon scattered before.
///
/// For a photo-absorption the IDs below it are scanned for an interaction of
/// the same photon (same origin) that is a Compton or Rayleigh scatter.
/// Reaching ID 1 ends the scan without success.
#[must_use]
pub fn is_compton_governed(event: &SimulatedEvent, id: u32) -> bool {
    let Some(record) = event.interaction(id) else {
        return false;
    };
    match record.process {
        Process::Comp => true,
        Process::Phot => {
            let mut predecessor = id.saturating_sub(1);
            while predecessor > 1 {
                match event.interaction(predecessor) {
                    Some(p) if p.origin_id == record.origin_id && p.process.is_scatter() => return true,
                    Some(_) => predecessor -= 1,
                    None => return false,
                }
            }
            false
        }
        _ => false,
    }
}

/// All interactions descending from `id` through origin links, `id` first,
/// in discovery order.
#[must_use]
pub fn descendant_closure(event: &SimulatedEvent, id: u32) -> Vec<u32> {
    let mut closure = vec![id];
    let mut members: HashSet<u32> = HashSet::from([id]);
    let mut cursor = 0;
    while cursor < closure.len() {
        let parent = closure[cursor];
        for ia in &event.interactions {
            if ia.origin_id == parent && members.insert(ia.id) {
                closure.push(ia.id);
            }
        }
        cursor += 1;
    }
    closure
}

/// Descendants of the set members that spawned a locally depositing
/// secondary but are missing from `ids`, according to `comparison`.
#[must_use]
pub fn closure_violations(event: &SimulatedEvent, ids: &[u32], comparison: ClosureComparison) -> Vec<u32> {
    let mut violations = Vec::new();
    for &member in ids {
        for (position, descendant) in descendant_closure(event, member).into_iter().enumerate() {
            let spawns = event
                .interaction(descendant)
                .is_some_and(|ia| ia.spawns_local_secondary());
            if !spawns {
                continue;
            }
            let contained = match comparison {
                ClosureComparison::InteractionId => ids.contains(&descendant),
                ClosureComparison::ListPosition => position < ids.len(),
            };
            if !contained && !violations.contains(&descendant) {
                violations.push(descendant);
            }
        }
    }
    violations
}

/// Returns true if every member of `ids` is governed by a Compton step and
/// the set is closed under local consequences of its members.
#[must_use]
pub fn contains_only_compton_dependants(
    event: &SimulatedEvent,
    ids: &[u32],
    comparison: ClosureComparison,
) -> bool {
    for &id in ids {
        let Some(highest) = governing_interaction(event, ids, id) else {
            log::debug!("compton dependants: broken origin chain at {id}");
            return false;
        };
        if !is_compton_governed(event, highest) {
            log::debug!("compton dependants: {id} is governed by {highest}, which is not a Compton step");
            return false;
        }
    }

    let violations = closure_violations(event, ids, comparison);
    if violations.is_empty() {
        return true;
    }
    match comparison {
        ClosureComparison::InteractionId => {
            log::debug!("compton dependants: descendants {violations:?} originate from the set but are missing");
            false
        }
        ClosureComparison::ListPosition => {
            log::debug!("compton dependants: originates but not contained: {violations:?}");
            true
        }
    }
}
