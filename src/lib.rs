//! Deterministic strapdown inertial navigation runtime: a plugin bus
//! drives calibration, alignment, gravity, attitude, and motion stages
//! over a shared navigation context at a fixed cadence.

pub mod bus;
pub mod error;
pub mod linal;
pub mod plugins;
pub mod time;
pub mod types;

pub use bus::{Bus, NavContext, Plugin};
pub use error::{FsnavError, FsnavResult};
