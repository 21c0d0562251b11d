//! Readiness probing policies.
//!
//! ## Contents
//! - [`ProbePolicy`]  ping interval and per-attempt timeout for the readiness prober
//! - [`JitterPolicy`] optional randomization of the probe interval
//!
//! ## Defaults
//! - `ProbePolicy::default()` → interval=100ms, attempt_timeout=500ms, jitter=None.

mod jitter;
mod probe;

pub use jitter::JitterPolicy;
pub use probe::ProbePolicy;
