//! Hand-built events shared by the integration tests.

#![allow(dead_code)]

use compton_response::geometry::{AttenuationTable, HomogeneousGeometry, Medium};
use compton_response::simulation::ParticleId;
use compton_response::{
    CandidateSite, HitRecord, InteractionRecord, Material, Position, Process, RawEvent,
    RawEventList, ResponseBuilder, ResponseConfig, SimulatedEvent, SiteFactory,
    VecReconstructionSource, VecSimulationSource,
};

pub fn interaction(
    id: u32,
    process: Process,
    origin_id: u32,
    position: Position,
    deposit: f64,
    remaining: f64,
) -> InteractionRecord {
    let secondary_particle_id = if process == Process::Init {
        ParticleId::PHOTON
    } else {
        ParticleId::ELECTRON
    };
    InteractionRecord {
        id,
        process,
        origin_id,
        position,
        time: f64::from(id),
        mother_particle_id: if process == Process::Init { 0 } else { ParticleId::PHOTON },
        mother_energy: remaining,
        secondary_particle_id,
        secondary_energy: deposit,
    }
}

pub fn hit(energy: f64, position: Position, origins: &[u32]) -> HitRecord {
    HitRecord {
        energy,
        position,
        time: f64::from(origins.first().copied().unwrap_or(0)),
        origins: origins.to_vec(),
    }
}

/// A photon of `deposits.iter().sum()` keV that Compton scatters at every
/// position but the last, where it is photo-absorbed.
///
/// Interaction `k + 2` deposits `deposits[k]` at `positions[k]` and produces
/// hit `k`.
pub fn photon_history(event_id: u64, deposits: &[f64], positions: &[Position]) -> SimulatedEvent {
    let total: f64 = deposits.iter().sum();
    let mut interactions = vec![interaction(1, Process::Init, 0, Position::new(0.0, 0.0, -10.0), total, 0.0)];
    let mut hits = Vec::new();
    let mut remaining = total;
    for (k, (&deposit, &position)) in deposits.iter().zip(positions).enumerate() {
        let id = u32::try_from(k).unwrap() + 2;
        remaining -= deposit;
        let process = if k + 1 == deposits.len() { Process::Phot } else { Process::Comp };
        interactions.push(interaction(id, process, 1, position, deposit, remaining));
        hits.push(hit(deposit, position, &[id]));
    }
    SimulatedEvent {
        event_id,
        interactions,
        hits,
        ignored_hits: 0,
    }
}

/// 100 keV Compton scatter followed by a 400 keV photo-absorption.
pub fn compton_then_photo(event_id: u64) -> SimulatedEvent {
    photon_history(
        event_id,
        &[100.0, 400.0],
        &[Position::new(0.0, 0.0, 0.0), Position::new(0.0, 0.0, 5.0)],
    )
}

/// Three Compton scatters (200, 150, 250 keV) and a 400 keV absorption.
pub fn triple_compton(event_id: u64) -> SimulatedEvent {
    photon_history(
        event_id,
        &[200.0, 150.0, 250.0, 400.0],
        &[
            Position::new(0.0, 0.0, 0.0),
            Position::new(0.0, 0.0, 4.0),
            Position::new(3.0, 0.0, 6.0),
            Position::new(3.0, 2.0, 9.0),
        ],
    )
}

/// One leaf per simulated hit, carrying the hit's energy and position.
pub fn leaves(f: &mut SiteFactory, event: &SimulatedEvent, resolution: f64) -> Vec<CandidateSite> {
    event
        .hits
        .iter()
        .enumerate()
        .map(|(i, h)| f.leaf(i, h.energy, resolution, h.position))
        .collect()
}

/// The two-site reconstruction of [`compton_then_photo`] with the stop site
/// measuring `stop_energy`.
pub fn dual_reconstruction(event_id: u64, stop_energy: f64) -> RawEventList {
    let mut f = SiteFactory::new();
    let a = f.leaf(0, 100.0, 3.0, Position::new(0.0, 0.0, 0.0));
    let b = f.leaf(1, stop_energy, 4.0, Position::new(0.0, 0.0, 5.0));
    RawEventList::new(vec![RawEvent::ordered(event_id, 100.0 + stop_energy, 5.0, vec![a, b])])
}

pub fn germanium() -> HomogeneousGeometry {
    HomogeneousGeometry::new(Medium {
        material: Material::Ge,
        attenuation: AttenuationTable::constant(0.05, 0.2, 0.0),
    })
    .unwrap()
}

pub fn config_in(dir: &tempfile::TempDir) -> ResponseConfig {
    ResponseConfig {
        output_prefix: dir.path().join("run"),
        ..ResponseConfig::default()
    }
}

pub fn builder(config: ResponseConfig, sim: Vec<SimulatedEvent>, rec: Vec<RawEventList>) -> ResponseBuilder {
    ResponseBuilder::new(
        config,
        Box::new(VecSimulationSource::new(sim)),
        Box::new(VecReconstructionSource::new(rec)),
        Box::new(germanium()),
    )
    .unwrap()
}
