//! Ground truth from the Monte Carlo simulation.
//!
//! A [`SimulatedEvent`] carries the full interaction history (a DAG of
//! [`InteractionRecord`]s rooted at the primary) and the detector hits those
//! interactions produced. The core only ever reads these records.

mod interaction;

pub use interaction::{InteractionRecord, ParticleId, Process};

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::geometry::Position;

/// One simulated energy deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    /// Deposited energy in keV.
    pub energy: f64,
    /// Deposit position.
    pub position: Position,
    /// Simulation time of the deposit.
    pub time: f64,
    /// Interaction IDs whose deposits contributed to this hit.
    pub origins: Vec<u32>,
}

impl HitRecord {
    /// Returns true if the interaction `id` contributed to this hit.
    #[must_use]
    pub fn has_origin(&self, id: u32) -> bool {
        self.origins.contains(&id)
    }
}

/// The complete ground truth of one simulated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedEvent {
    /// Event number, shared with the matching reconstructed event.
    pub event_id: u64,
    /// Interactions ordered by ID, starting at 1.
    pub interactions: Vec<InteractionRecord>,
    /// Detector hits. Reconstructed leaves refer to hits by index.
    pub hits: Vec<HitRecord>,
    /// Hits the simulation dropped (e.g. outside sensitive volumes).
    #[serde(default)]
    pub ignored_hits: usize,
}

impl SimulatedEvent {
    /// Look up an interaction by its 1-based ID.
    #[must_use]
    pub fn interaction(&self, id: u32) -> Option<&InteractionRecord> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.interactions.get(index)
    }

    /// Look up a hit by index.
    #[must_use]
    pub fn hit(&self, index: usize) -> Option<&HitRecord> {
        self.hits.get(index)
    }

    /// Number of interactions.
    #[must_use]
    pub fn num_interactions(&self) -> usize {
        self.interactions.len()
    }

    /// Number of hits.
    #[must_use]
    pub fn num_hits(&self) -> usize {
        self.hits.len()
    }

    /// Process of interaction `id`, if it exists.
    #[must_use]
    pub fn process_of(&self, id: u32) -> Option<Process> {
        self.interaction(id).map(|ia| ia.process)
    }

    /// Origin of interaction `id`, if it exists.
    #[must_use]
    pub fn origin_of(&self, id: u32) -> Option<u32> {
        self.interaction(id).map(|ia| ia.origin_id)
    }

    /// Returns true if the simulation stopped tracking before the event ended.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.interactions
            .last()
            .is_some_and(|ia| ia.process == Process::Trnc)
    }

    /// Returns true if the event consists of the primary creation only.
    #[must_use]
    pub fn is_init_only(&self) -> bool {
        self.interactions.len() == 1 && self.interactions[0].process == Process::Init
    }

    /// Returns true if the event is usable for response generation.
    ///
    /// An event needs more than the primary and must not be truncated, unless
    /// `only_init_required` is set and the event is just the primary.
    #[must_use]
    pub fn is_complete(&self, only_init_required: bool) -> bool {
        (only_init_required && self.is_init_only())
            || (self.interactions.len() > 1 && !self.is_truncated())
    }

    /// Check the structural invariants of the interaction graph.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidEvent`] if IDs are not sequential from 1,
    /// an origin does not refer to a strictly smaller ID, or a hit refers to an
    /// interaction that does not exist.
    pub fn validate(&self) -> Result<(), SourceError> {
        let invalid = |reason: String| SourceError::InvalidEvent {
            event_id: self.event_id,
            reason,
        };

        for (index, ia) in self.interactions.iter().enumerate() {
            let expected = u32::try_from(index + 1)
                .map_err(|_| invalid("too many interactions".to_string()))?;
            if ia.id != expected {
                return Err(invalid(format!(
                    "interaction at position {index} has ID {} (expected {expected})",
                    ia.id
                )));
            }
            if ia.origin_id >= ia.id {
                return Err(invalid(format!(
                    "interaction {} has origin {} which is not a predecessor",
                    ia.id, ia.origin_id
                )));
            }
        }

        let max_id = self.interactions.len();
        for (index, hit) in self.hits.iter().enumerate() {
            if let Some(bad) = hit
                .origins
                .iter()
                .find(|&&o| usize::try_from(o).map_or(true, |o| o > max_id))
            {
                return Err(invalid(format!(
                    "hit {index} refers to unknown interaction {bad}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-built events shared by the unit tests.

    use super::*;

    /// Shorthand for an interaction record.
    pub fn ia(id: u32, process: Process, origin_id: u32) -> InteractionRecord {
        InteractionRecord {
            id,
            process,
            origin_id,
            position: Position::zeros(),
            time: f64::from(id),
            mother_particle_id: 1,
            mother_energy: 0.0,
            secondary_particle_id: 0,
            secondary_energy: 0.0,
        }
    }

    /// Shorthand for a hit.
    pub fn hit(energy: f64, time: f64, origins: &[u32]) -> HitRecord {
        HitRecord {
            energy,
            position: Position::new(0.0, 0.0, time),
            time,
            origins: origins.to_vec(),
        }
    }

    /// A 500 keV photon that Compton scatters once (100 keV) and is then
    /// photo-absorbed (400 keV).
    ///
    /// IA 1: INIT, IA 2: COMP, IA 3: PHOT. Hit 0 comes from IA 2, hit 1 from IA 3.
    pub fn compton_then_photo() -> SimulatedEvent {
        let mut init = ia(1, Process::Init, 0);
        init.mother_particle_id = 0;
        init.secondary_particle_id = ParticleId::PHOTON;
        init.secondary_energy = 500.0;

        let mut comp = ia(2, Process::Comp, 1);
        comp.mother_energy = 400.0;
        comp.secondary_particle_id = ParticleId::ELECTRON;
        comp.secondary_energy = 100.0;
        comp.position = Position::new(0.0, 0.0, 0.0);

        let mut phot = ia(3, Process::Phot, 1);
        phot.mother_energy = 0.0;
        phot.secondary_particle_id = ParticleId::ELECTRON;
        phot.secondary_energy = 400.0;
        phot.position = Position::new(0.0, 0.0, 5.0);

        SimulatedEvent {
            event_id: 1,
            interactions: vec![init, comp, phot],
            hits: vec![
                HitRecord {
                    energy: 100.0,
                    position: Position::new(0.0, 0.0, 0.0),
                    time: 1.0,
                    origins: vec![2],
                },
                HitRecord {
                    energy: 400.0,
                    position: Position::new(0.0, 0.0, 5.0),
                    time: 2.0,
                    origins: vec![3],
                },
            ],
            ignored_hits: 0,
        }
    }

    /// A 1000 keV photon with three Compton scatters and a final absorption.
    ///
    /// Deposits: IA 2 = 200, IA 3 = 150, IA 4 = 250, IA 5 = 400 keV.
    /// Hits 0..4 come from IA 2..5 in order.
    pub fn triple_compton() -> SimulatedEvent {
        let mut init = ia(1, Process::Init, 0);
        init.mother_particle_id = 0;
        init.secondary_particle_id = ParticleId::PHOTON;
        init.secondary_energy = 1000.0;

        let deposits = [200.0, 150.0, 250.0];
        let mut remaining = 1000.0;
        let mut interactions = vec![init];
        for (offset, deposit) in deposits.iter().enumerate() {
            let id = 2 + u32::try_from(offset).unwrap();
            remaining -= deposit;
            let mut comp = ia(id, Process::Comp, 1);
            comp.mother_energy = remaining;
            comp.secondary_particle_id = ParticleId::ELECTRON;
            comp.secondary_energy = *deposit;
            interactions.push(comp);
        }
        let mut phot = ia(5, Process::Phot, 1);
        phot.secondary_particle_id = ParticleId::ELECTRON;
        phot.secondary_energy = remaining;
        interactions.push(phot);

        let positions = [
            Position::new(0.0, 0.0, 0.0),
            Position::new(0.0, 0.0, 4.0),
            Position::new(3.0, 0.0, 6.0),
            Position::new(3.0, 2.0, 9.0),
        ];
        let energies = [200.0, 150.0, 250.0, 400.0];
        let hits = (0..4)
            .map(|i| HitRecord {
                energy: energies[i],
                position: positions[i],
                time: 1.0 + i as f64,
                origins: vec![2 + u32::try_from(i).unwrap()],
            })
            .collect();

        SimulatedEvent {
            event_id: 7,
            interactions,
            hits,
            ignored_hits: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_interaction_lookup_is_one_based() {
        let event = compton_then_photo();
        assert_eq!(event.interaction(1).unwrap().process, Process::Init);
        assert_eq!(event.interaction(3).unwrap().process, Process::Phot);
        assert!(event.interaction(0).is_none());
        assert!(event.interaction(4).is_none());
    }

    #[test]
    fn test_validate_accepts_fixture() {
        compton_then_photo().validate().unwrap();
        triple_compton().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_forward_origin() {
        let mut event = compton_then_photo();
        event.interactions[1].origin_id = 3;
        let err = event.validate().unwrap_err();
        assert!(err.to_string().contains("not a predecessor"));
    }

    #[test]
    fn test_validate_rejects_gaps_and_unknown_hit_origins() {
        let mut event = compton_then_photo();
        event.interactions[2].id = 5;
        assert!(event.validate().is_err());

        let mut event = compton_then_photo();
        event.hits[0].origins.push(9);
        let err = event.validate().unwrap_err();
        assert!(err.to_string().contains("unknown interaction 9"));
    }

    #[test]
    fn test_completeness() {
        let event = compton_then_photo();
        assert!(event.is_complete(false));

        let mut truncated = compton_then_photo();
        truncated.interactions.push(ia(4, Process::Trnc, 1));
        assert!(truncated.is_truncated());
        assert!(!truncated.is_complete(false));

        let init_only = SimulatedEvent {
            event_id: 2,
            interactions: vec![ia(1, Process::Init, 0)],
            hits: Vec::new(),
            ignored_hits: 0,
        };
        assert!(!init_only.is_complete(false));
        assert!(init_only.is_complete(true));
    }

    #[test]
    fn test_serde_uses_process_tags() {
        let event = compton_then_photo();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"COMP\""));
        let back: SimulatedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
