//! Engine configuration subsystem.
//!
//! # Data Flow
//! ```text
//! engine.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → borrowed by every request-scoped component
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Farm definitions are NOT engine config: they live in the farms file and
//!   are read per request through the source reader (see `routing`)

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ComponentLayout;
pub use schema::EngineConfig;
pub use schema::PathsConfig;
