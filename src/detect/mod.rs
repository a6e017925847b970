//! Pluggable perception backends.
//!
//! The pose estimator and the line-segment detector are external inference
//! engines. They plug in behind `PerceptionBackend` and are looked up by
//! capability through a `BackendRegistry`.

mod backend;
mod backends;
mod registry;

pub use backend::{DetectionCapability, PerceptionBackend};
pub use backends::StubBackend;
pub use registry::{BackendRegistry, SharedBackend};
