//! Response matrices accumulated over classified sequences.
//!
//! [`ResponseMatrix`] is a sparse histogram over named [`Axis`] values.
//! [`ResponseSet`] holds the good/bad matrix pairs of a multiple-Compton
//! response and knows how to save and reload them.

pub mod axis;
mod matrix;
mod set;

pub use axis::{
    create_equi_dist, create_log_dist, create_thresholded_log_dist, mirrored, Axis, DistOptions,
};
pub use matrix::ResponseMatrix;
pub use set::{ResponsePair, ResponseSet};
