use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Position;

/// Physics process that produced an interaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Process {
    /// Compton scatter.
    Comp,
    /// Photo-absorption.
    Phot,
    /// Rayleigh scatter.
    Rayl,
    /// Pair production.
    Pair,
    /// Bremsstrahlung.
    Brem,
    /// Positron annihilation.
    Anni,
    /// Primary particle creation.
    Init,
    /// Particle left the world volume.
    Escp,
    /// Tracking stopped early.
    Trnc,
    /// Ionization.
    Ioni,
    /// Radioactive decay.
    Deca,
    /// Anything the response builder does not distinguish.
    #[serde(other)]
    Other,
}

impl Process {
    /// Returns true for records that start a new photon history.
    ///
    /// Such records never count as origins of a detector hit.
    #[must_use]
    pub const fn is_source(self) -> bool {
        matches!(self, Self::Init | Self::Anni | Self::Deca)
    }

    /// Returns true for Compton and Rayleigh scatters.
    #[must_use]
    pub const fn is_scatter(self) -> bool {
        matches!(self, Self::Comp | Self::Rayl)
    }

    /// Four-letter tag used in simulation output.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Comp => "COMP",
            Self::Phot => "PHOT",
            Self::Rayl => "RAYL",
            Self::Pair => "PAIR",
            Self::Brem => "BREM",
            Self::Anni => "ANNI",
            Self::Init => "INIT",
            Self::Escp => "ESCP",
            Self::Trnc => "TRNC",
            Self::Ioni => "IONI",
            Self::Deca => "DECA",
            Self::Other => "OTHR",
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Particle species codes used by the simulation.
pub struct ParticleId;

impl ParticleId {
    /// No particle.
    pub const NONE: u32 = 0;
    /// Photon.
    pub const PHOTON: u32 = 1;
    /// Electron.
    pub const ELECTRON: u32 = 3;
}

/// One interaction of the simulated particle history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// 1-based ID, increasing with simulation time.
    pub id: u32,
    /// Process tag.
    pub process: Process,
    /// ID of the interaction that produced the particle interacting here.
    /// Zero for the primary.
    pub origin_id: u32,
    /// Interaction position.
    pub position: Position,
    /// Interaction time.
    pub time: f64,
    /// Species of the particle interacting here.
    #[serde(default)]
    pub mother_particle_id: u32,
    /// Energy of that particle after the interaction, keV.
    pub mother_energy: f64,
    /// Species of the particle created here, see [`ParticleId`].
    #[serde(default)]
    pub secondary_particle_id: u32,
    /// Energy of the created particle, keV.
    #[serde(default)]
    pub secondary_energy: f64,
}

impl InteractionRecord {
    /// Returns true if this interaction created a particle that deposits its
    /// energy locally (anything but nothing or a photon).
    #[must_use]
    pub const fn spawns_local_secondary(&self) -> bool {
        self.secondary_particle_id != ParticleId::NONE
            && self.secondary_particle_id != ParticleId::PHOTON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_tags_roundtrip_through_serde() {
        for process in [Process::Comp, Process::Phot, Process::Init, Process::Trnc] {
            let json = serde_json::to_string(&process).unwrap();
            assert_eq!(json, format!("\"{}\"", process.tag()));
            let back: Process = serde_json::from_str(&json).unwrap();
            assert_eq!(back, process);
        }
    }

    #[test]
    fn test_unknown_process_maps_to_other() {
        let p: Process = serde_json::from_str("\"HADR\"").unwrap();
        assert_eq!(p, Process::Other);
    }

    #[test]
    fn test_source_processes() {
        assert!(Process::Init.is_source());
        assert!(Process::Anni.is_source());
        assert!(Process::Deca.is_source());
        assert!(!Process::Comp.is_source());
        assert!(Process::Rayl.is_scatter());
        assert!(!Process::Phot.is_scatter());
    }
}
