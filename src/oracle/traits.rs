//! Contracts of the two event oracles.
//!
//! The simulation oracle replays the Monte Carlo ground truth, the
//! reconstruction oracle replays the detector front end. The driver pulls
//! from both and matches them by event ID.

use crate::error::SourceError;
use crate::reconstruction::RawEventList;
use crate::simulation::SimulatedEvent;

/// Source of simulated events in increasing ID order (IDs may wrap when
/// several simulation files are chained).
pub trait SimulationSource {
    /// Read the next event.
    ///
    /// With `require_untruncated` set, truncated events are skipped by the
    /// source. Returns `Ok(None)` when the source is exhausted.
    ///
    /// # Errors
    ///
    /// [`SourceError::InvalidEvent`] loses only this event; the source stays
    /// usable. Any other error ends the stream.
    fn next_event(&mut self, require_untruncated: bool) -> Result<Option<SimulatedEvent>, SourceError>;

    /// Number of showers simulated up to the current position.
    fn simulated_events(&self) -> u64;
}

/// Source of reconstructed events, one [`RawEventList`] per event.
pub trait ReconstructionSource {
    /// Reconstruct the next event. Returns `Ok(None)` when exhausted.
    ///
    /// # Errors
    ///
    /// Same contract as [`SimulationSource::next_event`].
    fn analyze_next(&mut self) -> Result<Option<RawEventList>, SourceError>;
}

impl<S: SimulationSource + ?Sized> SimulationSource for Box<S> {
    fn next_event(&mut self, require_untruncated: bool) -> Result<Option<SimulatedEvent>, SourceError> {
        (**self).next_event(require_untruncated)
    }

    fn simulated_events(&self) -> u64 {
        (**self).simulated_events()
    }
}

impl<S: ReconstructionSource + ?Sized> ReconstructionSource for Box<S> {
    fn analyze_next(&mut self) -> Result<Option<RawEventList>, SourceError> {
        (**self).analyze_next()
    }
}
