//! Energy bookkeeping against the simulated truth.
//!
//! The local check compares a site's deposit with the energy its own
//! interaction step should have left behind. The total check compares it with
//! the energy the photon still carried when it reached the site. Track
//! absorption sums the true deposits of the track's charged particle.

use thiserror::Error;

use crate::config::AbsorptionTolerance;
use crate::simulation::{InteractionRecord, ParticleId, Process, SimulatedEvent};

/// Why an absorption check failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("interaction {id} does not exist")]
    MissingInteraction { id: u32 },

    #[error("hit {index} does not exist")]
    MissingHit { index: usize },

    #[error("unsupported process {process} at interaction {id}")]
    UnsupportedProcess { id: u32, process: Process },

    #[error("no interaction above the primary")]
    NoCandidate,

    #[error("no track origin")]
    NoOrigin,

    #[error("not absorbed: ideal={ideal:.3} observed={observed:.3} window={window:.3}")]
    OutOfTolerance {
        ideal: f64,
        observed: f64,
        window: f64,
    },

    #[error("track not absorbed: real={real:.3} observed={observed:.3}")]
    TrackNotAbsorbed { real: f64, observed: f64 },
}

fn lookup(event: &SimulatedEvent, id: u32) -> Result<&InteractionRecord, Rejection> {
    event
        .interaction(id)
        .ok_or(Rejection::MissingInteraction { id })
}

/// The interaction right before `ia` in ID order.
fn predecessor<'e>(
    event: &'e SimulatedEvent,
    ia: &InteractionRecord,
) -> Result<&'e InteractionRecord, Rejection> {
    let id = ia.id.saturating_sub(1);
    lookup(event, id)
}

/// Smallest member above the primary.
fn min_id(ids: &[u32]) -> Result<u32, Rejection> {
    ids.iter()
        .copied()
        .filter(|&id| id > 1)
        .min()
        .ok_or(Rejection::NoCandidate)
}

/// Mother of `current` and the interaction that determines the energy
/// entering it: the mother if both belong to the same particle, otherwise
/// the record that created the particle (e.g. a bremsstrahlung vertex).
fn top_and_mother<'e>(
    event: &'e SimulatedEvent,
    current: &InteractionRecord,
) -> Result<(&'e InteractionRecord, &'e InteractionRecord), Rejection> {
    let mother = predecessor(event, current)?;
    let top = if mother.origin_id == current.origin_id {
        mother
    } else {
        lookup(event, current.origin_id)?
    };
    Ok((top, mother))
}

/// Energy the interaction steps in `ids` should have deposited locally.
///
/// Members created by other members are folded into their parents, photo
/// absorptions only count right after a step of the same photon that was not
/// itself an absorption, and fluorescence Compton records (no recoil
/// electron) are ignored. Remaining records other than Compton,
/// photo-absorption and Rayleigh make the set unusable.
///
/// # Errors
///
/// Returns the reason the ideal energy could not be computed.
pub fn ideal_local_energy(event: &SimulatedEvent, ids: &[u32]) -> Result<f64, Rejection> {
    let mut members = Vec::with_capacity(ids.len());
    for &id in ids {
        let ia = lookup(event, id)?;
        if !ids.contains(&ia.origin_id) {
            members.push(ia);
        }
    }

    let mut kept = Vec::with_capacity(members.len());
    for ia in members {
        let keep = match ia.process {
            Process::Phot => event
                .interaction(ia.id.saturating_sub(1))
                .is_some_and(|p| p.origin_id == ia.origin_id && p.process != Process::Phot),
            Process::Comp => ia.secondary_particle_id == ParticleId::ELECTRON,
            _ => true,
        };
        if keep {
            kept.push(ia);
        }
    }

    if let Some(ia) = kept
        .iter()
        .find(|ia| !matches!(ia.process, Process::Comp | Process::Phot | Process::Rayl))
    {
        return Err(Rejection::UnsupportedProcess {
            id: ia.id,
            process: ia.process,
        });
    }

    let mut ideal = 0.0;
    for ia in kept {
        match ia.process {
            Process::Comp => {
                let p = predecessor(event, ia)?;
                ideal += if p.process.is_scatter() {
                    p.mother_energy - ia.mother_energy
                } else {
                    p.secondary_energy - ia.mother_energy
                };
            }
            Process::Phot => {
                let p = predecessor(event, ia)?;
                ideal += if p.process.is_scatter() {
                    p.mother_energy
                } else {
                    p.secondary_energy
                };
            }
            _ => log::trace!("ideal local energy: {} {} deposits nothing", ia.process, ia.id),
        }
    }
    Ok(ideal)
}

/// Energy the photon carried when it reached the smallest member of `ids`.
///
/// # Errors
///
/// Returns [`Rejection::NoCandidate`] if no member is above the primary.
pub fn ideal_total_energy(event: &SimulatedEvent, ids: &[u32]) -> Result<f64, Rejection> {
    let current = lookup(event, min_id(ids)?)?;
    let (top, mother) = top_and_mother(event, current)?;
    Ok(if mother.process == Process::Comp {
        top.mother_energy
    } else {
        top.secondary_energy
    })
}

/// Energy the step at `min_id` deposits: entering energy minus the energy
/// the photon keeps.
///
/// # Errors
///
/// Returns [`Rejection::MissingInteraction`] if the chain is incomplete.
pub fn ideal_deposited_energy(event: &SimulatedEvent, min_id: u32) -> Result<f64, Rejection> {
    let bottom = lookup(event, min_id)?;
    let (top, mother) = top_and_mother(event, bottom)?;
    Ok(if mother.process == Process::Comp {
        top.mother_energy - bottom.mother_energy
    } else {
        top.secondary_energy - bottom.mother_energy
    })
}

fn within(
    ideal: f64,
    observed: f64,
    resolution: f64,
    tolerance: &AbsorptionTolerance,
) -> Result<f64, Rejection> {
    if tolerance.accepts(observed, ideal, resolution) {
        Ok(ideal)
    } else {
        Err(Rejection::OutOfTolerance {
            ideal,
            observed,
            window: tolerance.window(resolution),
        })
    }
}

/// Check that `observed` matches the local deposit of `ids`. Returns the
/// ideal energy on success.
///
/// # Errors
///
/// Returns the [`Rejection`] reason.
pub fn check_absorbed(
    event: &SimulatedEvent,
    ids: &[u32],
    observed: f64,
    resolution: f64,
    tolerance: &AbsorptionTolerance,
) -> Result<f64, Rejection> {
    let ideal = ideal_local_energy(event, ids)?;
    within(ideal, observed, resolution, tolerance)
}

/// Check that `observed` matches the energy that entered the step at the
/// smallest member of `ids`. Returns the ideal energy on success.
///
/// # Errors
///
/// Returns the [`Rejection`] reason.
pub fn check_totally_absorbed(
    event: &SimulatedEvent,
    ids: &[u32],
    observed: f64,
    resolution: f64,
    tolerance: &AbsorptionTolerance,
) -> Result<f64, Rejection> {
    let ideal = ideal_total_energy(event, ids)?;
    within(ideal, observed, resolution, tolerance)
}

/// Check that a track deposit `observed` covers everything its charged
/// particle deposited from the track's first hit on. Returns the real
/// deposit on success.
///
/// The particle is identified by the first origin other than the primary of
/// each hit; the last hit that has one decides.
///
/// # Errors
///
/// Returns the [`Rejection`] reason.
pub fn check_track_completely_absorbed(
    event: &SimulatedEvent,
    hit_ids: &[usize],
    observed: f64,
    tolerance: &AbsorptionTolerance,
) -> Result<f64, Rejection> {
    let first = *hit_ids.first().ok_or(Rejection::NoOrigin)?;
    let mut origin = None;
    for &index in hit_ids {
        let hit = event.hit(index).ok_or(Rejection::MissingHit { index })?;
        if let Some(&o) = hit.origins.iter().find(|&&o| o != 1) {
            origin = Some(o);
        }
    }
    let origin = match origin {
        Some(o) if o > 1 => o,
        _ => return Err(Rejection::NoOrigin),
    };

    let start = event
        .hit(first)
        .ok_or(Rejection::MissingHit { index: first })?
        .time;
    let real: f64 = event
        .hits
        .iter()
        .filter(|h| h.has_origin(origin) && h.time >= start)
        .map(|h| h.energy)
        .sum();

    if tolerance.accepts_track(observed, real) {
        Ok(real)
    } else {
        Err(Rejection::TrackNotAbsorbed { real, observed })
    }
}

/// Boolean form of [`check_absorbed`]; rejections are logged at debug level.
#[must_use]
pub fn is_absorbed(
    event: &SimulatedEvent,
    ids: &[u32],
    observed: f64,
    resolution: f64,
    tolerance: &AbsorptionTolerance,
) -> bool {
    match check_absorbed(event, ids, observed, resolution, tolerance) {
        Ok(_) => true,
        Err(reason) => {
            log::debug!("is absorbed: {reason}");
            false
        }
    }
}

/// Boolean form of [`check_totally_absorbed`].
#[must_use]
pub fn is_totally_absorbed(
    event: &SimulatedEvent,
    ids: &[u32],
    observed: f64,
    resolution: f64,
    tolerance: &AbsorptionTolerance,
) -> bool {
    match check_totally_absorbed(event, ids, observed, resolution, tolerance) {
        Ok(_) => true,
        Err(reason) => {
            log::debug!("is totally absorbed: {reason}");
            false
        }
    }
}

/// Boolean form of [`check_track_completely_absorbed`].
#[must_use]
pub fn is_track_completely_absorbed(
    event: &SimulatedEvent,
    hit_ids: &[usize],
    observed: f64,
    tolerance: &AbsorptionTolerance,
) -> bool {
    match check_track_completely_absorbed(event, hit_ids, observed, tolerance) {
        Ok(_) => true,
        Err(reason) => {
            log::debug!("is track completely absorbed: {reason}");
            false
        }
    }
}
