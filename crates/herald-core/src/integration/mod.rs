//! Integration layer: ports to the systems the core depends on.

pub mod resolver;

pub use resolver::{Capability, CapabilityKey, CapabilityResolver, capability};
