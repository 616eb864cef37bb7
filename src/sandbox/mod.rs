//! Execution sandbox for AI-generated components.
//!
//! Pipeline: raw source → [`normalize`] → [`executor::Sandbox::compile`]
//! under the [`registry::CapabilityRegistry`] → [`cache::ComponentCache`]
//! → mounted behind an [`isolator::FaultBoundary`]. A runtime fault is
//! captured as a [`fault::FaultRecord`] and packaged for the fix loop.

pub mod cache;
pub mod executor;
pub mod fault;
pub mod isolator;
pub mod normalize;
pub mod registry;

pub use executor::{LoadError, Mount, Sandbox};
pub use fault::{package_fix_request, FaultRecord};
pub use isolator::{FaultBoundary, RenderOutcome};
