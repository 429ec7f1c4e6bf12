//! In-memory oracles.
//!
//! Used by tests, benches and embedders that produce events themselves.
//! Records are validated on the way out exactly like the file sources do.

use std::collections::VecDeque;

use super::traits::{ReconstructionSource, SimulationSource};
use crate::error::SourceError;
use crate::reconstruction::RawEventList;
use crate::simulation::SimulatedEvent;

/// Replays a list of simulated events.
#[derive(Debug, Clone, Default)]
pub struct VecSimulationSource {
    pending: VecDeque<SimulatedEvent>,
    read: u64,
}

impl VecSimulationSource {
    #[must_use]
    pub fn new(events: Vec<SimulatedEvent>) -> Self {
        Self {
            pending: events.into(),
            read: 0,
        }
    }

    /// Events not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl SimulationSource for VecSimulationSource {
    fn next_event(&mut self, require_untruncated: bool) -> Result<Option<SimulatedEvent>, SourceError> {
        while let Some(event) = self.pending.pop_front() {
            self.read += 1;
            event.validate()?;
            if require_untruncated && event.is_truncated() {
                log::debug!("skipping truncated simulated event {}", event.event_id);
                continue;
            }
            return Ok(Some(event));
        }
        Ok(None)
    }

    fn simulated_events(&self) -> u64 {
        self.read
    }
}

/// Replays a list of reconstructed events.
#[derive(Debug, Clone, Default)]
pub struct VecReconstructionSource {
    pending: VecDeque<RawEventList>,
}

impl VecReconstructionSource {
    #[must_use]
    pub fn new(lists: Vec<RawEventList>) -> Self {
        Self {
            pending: lists.into(),
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl ReconstructionSource for VecReconstructionSource {
    fn analyze_next(&mut self) -> Result<Option<RawEventList>, SourceError> {
        match self.pending.pop_front() {
            Some(list) => {
                list.validate()?;
                Ok(Some(list))
            }
            None => Ok(None),
        }
    }
}
