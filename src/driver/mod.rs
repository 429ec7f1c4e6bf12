//! The event-stream driver.
//!
//! [`ResponseBuilder`] owns everything a run needs: the two oracles, the
//! geometry, the response matrices and the per-event caches. Each call to
//! [`ResponseBuilder::analyze_next_event`] matches one event pair and feeds
//! its raw events through classification and accumulation.

mod analysis;
mod matcher;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use self::analysis::EventAnalyzer;
use self::matcher::EventMatcher;
use crate::classifier::SequenceClassifier;
use crate::config::ResponseConfig;
use crate::diagnostics::{RunStats, RunSummary, WarnOnce};
use crate::error::{ConfigError, ResponseResult, StorageError};
use crate::geometry::GeometryService;
use crate::oracle::{ReconstructionSource, SimulationSource};
use crate::provenance::OriginResolver;
use crate::response::ResponseSet;

/// Cooperative cancellation flag shared between a builder and its owner.
///
/// The builder polls it once per event; after an interrupt
/// [`ResponseBuilder::analyze_next_event`] returns `false` and the run can be
/// finalized normally.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the run to stop after the current event.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Builds response matrices from matched simulated and reconstructed events.
pub struct ResponseBuilder {
    config: ResponseConfig,
    simulation: Box<dyn SimulationSource>,
    reconstruction: Box<dyn ReconstructionSource>,
    geometry: Box<dyn GeometryService>,
    responses: ResponseSet,
    matcher: EventMatcher,
    resolver: OriginResolver,
    warnings: WarnOnce,
    stats: RunStats,
    interrupt: InterruptHandle,
    started_at: DateTime<Utc>,
    exhausted: bool,
}

impl ResponseBuilder {
    /// Validate `config` and set up empty response matrices.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::Config`](crate::error::ResponseError::Config)
    /// if the configuration is invalid or yields unusable axes.
    pub fn new(
        config: ResponseConfig,
        simulation: Box<dyn SimulationSource>,
        reconstruction: Box<dyn ReconstructionSource>,
        geometry: Box<dyn GeometryService>,
    ) -> ResponseResult<Self> {
        config.validate()?;
        let responses = ResponseSet::new(&config).map_err(|e| ConfigError::InvalidValue {
            field: "axes".to_string(),
            reason: e.to_string(),
        })?;
        log::info!(
            "response builder: energy window [{}, {}] keV, up to {} interactions, output {}.mc.*.rsp",
            config.energy_min,
            config.energy_max,
            config.max_interactions,
            config.output_prefix.display()
        );
        Ok(Self {
            matcher: EventMatcher::new(config.only_init_required),
            config,
            simulation,
            reconstruction,
            geometry,
            responses,
            resolver: OriginResolver::new(),
            warnings: WarnOnce::new(),
            stats: RunStats::default(),
            interrupt: InterruptHandle::new(),
            started_at: Utc::now(),
            exhausted: false,
        })
    }

    /// Handle for stopping the run from elsewhere, e.g. a signal handler.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Request the run to stop after the current event.
    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }

    #[must_use]
    pub fn config(&self) -> &ResponseConfig {
        &self.config
    }

    /// The matrices accumulated so far.
    #[must_use]
    pub fn responses(&self) -> &ResponseSet {
        &self.responses
    }

    #[must_use]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    fn limit_reached(&self) -> bool {
        self.config.max_events.is_some_and(|max| self.stats.matched >= max)
    }

    /// Match and analyze one event.
    ///
    /// Returns `false` once the streams are exhausted, the event limit is
    /// reached, or the run was interrupted.
    ///
    /// # Errors
    ///
    /// Fatal source errors. Malformed single events are skipped.
    pub fn analyze_next_event(&mut self) -> ResponseResult<bool> {
        if self.exhausted || self.interrupt.is_interrupted() || self.limit_reached() {
            return Ok(false);
        }

        let next = self.matcher.next_pair(
            self.simulation.as_mut(),
            self.reconstruction.as_mut(),
            &mut self.resolver,
            &mut self.warnings,
            &mut self.stats,
        )?;
        let Some((event, list)) = next else {
            log::info!("event streams exhausted after {} matched events", self.stats.matched);
            self.exhausted = true;
            return Ok(false);
        };
        log::debug!("analyzing event {} ({} raw events)", event.event_id, list.raw_events().len());

        let mut classifier = SequenceClassifier::new(
            &event,
            &mut self.resolver,
            &mut self.warnings,
            self.config.tolerance,
            self.config.closure_comparison,
        );
        let mut analyzer = EventAnalyzer {
            config: &self.config,
            geometry: self.geometry.as_ref(),
            responses: &mut self.responses,
        };
        for raw in list.raw_events() {
            match analyzer.analyze(&mut classifier, raw)? {
                Ok(verdict) => {
                    self.stats.raw_events_analyzed += 1;
                    if verdict.is_good() {
                        self.stats.good_sequences += 1;
                    } else {
                        self.stats.bad_sequences += 1;
                    }
                }
                Err(_) => self.stats.raw_events_skipped += 1,
            }
        }

        if self.stats.matched % self.config.save_after == 0 {
            self.checkpoint();
        }
        Ok(true)
    }

    /// Write all matrices; failures only cost this checkpoint.
    fn checkpoint(&mut self) {
        match self.responses.save(&self.config.output_prefix) {
            Ok(_) => {
                self.stats.checkpoints_written += 1;
                log::info!("checkpoint after {} matched events", self.stats.matched);
            }
            Err(err) => {
                self.stats.checkpoint_failures += 1;
                log::warn!("checkpoint after {} matched events failed: {err}", self.stats.matched);
            }
        }
    }

    /// Write all matrices and report the run.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the final write fails.
    pub fn finalize(&mut self) -> ResponseResult<RunSummary> {
        self.responses
            .save(&self.config.output_prefix)
            .map_err(|e: StorageError| {
                log::error!("final write of the response matrices failed: {e}");
                e
            })?;
        let summary = RunSummary {
            started_at: self.started_at,
            finished_at: Utc::now(),
            simulated_showers: self.simulation.simulated_events(),
            interrupted: self.interrupt.is_interrupted(),
            stats: self.stats,
        };
        log::info!("{}", summary.describe());
        Ok(summary)
    }

    /// Analyze events until the streams end, the event limit is reached, or
    /// the run is interrupted, then finalize.
    ///
    /// # Errors
    ///
    /// Fatal source errors and a failed final write.
    pub fn run(&mut self) -> ResponseResult<RunSummary> {
        while self.analyze_next_event()? {}
        if self.interrupt.is_interrupted() {
            log::warn!("run interrupted after {} matched events", self.stats.matched);
        }
        self.finalize()
    }
}
