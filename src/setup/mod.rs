//! # Post-formation setup hooks.
//!
//! - [`SetupHook`] - trait for the caller's one-shot setup step
//! - [`SetupFn`] - closure-backed implementation
//! - [`SetupRef`] - shared reference to a hook (`Arc<dyn SetupHook>`)

mod hook;
mod hook_fn;

pub use hook::{SetupHook, SetupRef};
pub use hook_fn::SetupFn;
