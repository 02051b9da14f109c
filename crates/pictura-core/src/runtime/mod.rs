//! Reference ML runtime.

pub mod features;
pub mod linear;

pub use linear::{LinearModel, LinearRuntime, LinearTensors};
