//! # compton-response - Compton sequence response learning
//!
//! Learns the statistical response used to decide whether a proposed order
//! of interactions in a multi-hit gamma-ray event is the physical one. Each
//! simulated event is matched with its reconstruction, every proposed
//! ordering is classified against the simulated ground truth, and the
//! kinematic features of each step are accumulated into good and bad
//! response matrices.
//!
//! ## Core Concepts
//!
//! - **SimulatedEvent**: ground truth, a DAG of interactions plus detector hits
//! - **CandidateSite**: a reconstructed hit, cluster or electron track
//! - **SequenceClassifier**: decides if a start, step or track is physically right
//! - **ResponseSet**: the good/bad matrices the features are binned into
//! - **ResponseBuilder**: drives a run from two event oracles to files on disk
//!
//! ## Usage
//!
//! ```rust,ignore
//! use compton_response::{
//!     GeometryDescription, JsonlReconstructionSource, JsonlSimulationSource, ResponseBuilder,
//!     ResponseConfig,
//! };
//!
//! let config = ResponseConfig::default();
//! let geometry = GeometryDescription::from_json_file("detector.json".as_ref())?.build()?;
//! let mut builder = ResponseBuilder::new(
//!     config,
//!     Box::new(JsonlSimulationSource::open("sim.jsonl".as_ref())?),
//!     Box::new(JsonlReconstructionSource::open("rec.jsonl".as_ref())?),
//!     geometry,
//! )?;
//! let summary = builder.run()?;
//! println!("{}", summary.describe());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

// Ground truth and reconstruction inputs
pub mod geometry;
pub mod reconstruction;
pub mod simulation;

// Classification
pub mod absorption;
pub mod classifier;
pub mod dependency;
pub mod kinematics;
pub mod provenance;

// Accumulation and persistence
pub mod response;
pub mod storage;

// Run plumbing
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod oracle;

// Re-export primary types at crate root for convenience
pub use classifier::{SequenceClassifier, Verdict};
pub use config::{AbsorptionTolerance, ResponseConfig};
pub use diagnostics::{RunStats, RunSummary, WarnOnce};
pub use driver::{InterruptHandle, ResponseBuilder};
pub use error::{ConfigError, ProvenanceError, ResponseError, ResponseResult, SourceError, StorageError};
pub use geometry::{GeometryDescription, GeometryService, Material, Position};
pub use oracle::{
    JsonlReconstructionSource, JsonlSimulationSource, ReconstructionSource, SimulationSource,
    VecReconstructionSource, VecSimulationSource,
};
pub use provenance::OriginResolver;
pub use reconstruction::{CandidateSite, RawEvent, RawEventList, SiteFactory, SiteId, SiteKind};
pub use response::{Axis, ResponseMatrix, ResponseSet};
pub use simulation::{HitRecord, InteractionRecord, Process, SimulatedEvent};
