// range-core/src/lib.rs

//! The core logic for the vocal range estimator.
//! This crate turns audio frames into pitch samples and aggregates a
//! detection session into a singer's range and preferred key. It is
//! completely headless and contains no front-end code.

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod notes;
pub mod pitch;
pub mod range;
pub mod session;
pub mod signal;
pub mod usage;

pub use config::{Config, EstimatorConfig};
pub use error::{RangeError, Result};
pub use notes::{Note, PitchClass};
pub use range::{PreferredKey, RangeResult, Sample, SessionState, VocalRangeEstimator};
pub use session::{SessionHandle, spawn_session_worker};
