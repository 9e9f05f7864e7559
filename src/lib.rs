//! Multi-tenant wiki farm configuration engine.
//!
//! Given the host and path of a request, find the tenant being addressed,
//! the code version serving it, its merged settings and the ordered list of
//! components to activate. Every expensive step is snapshotted on disk and
//! reused until one of the files it was derived from changes.

// Request pipeline
pub mod routing;
pub mod resolver;
pub mod compiler;
pub mod components;
pub mod engine;

// Storage
pub mod cache;
pub mod source;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod observability;

pub use config::EngineConfig;
pub use engine::{FarmEngine, FarmRequest, FarmResponse, Resolution};
pub use error::{FarmError, FarmResult};
