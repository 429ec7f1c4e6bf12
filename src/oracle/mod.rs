//! Event oracles: where simulated and reconstructed events come from.

mod jsonl;
mod memory;
mod traits;

pub use jsonl::{JsonlReconstructionSource, JsonlSimulationSource};
pub use memory::{VecReconstructionSource, VecSimulationSource};
pub use traits::{ReconstructionSource, SimulationSource};
