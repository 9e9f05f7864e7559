//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (host, path)
//!     → router.rs (load farms file, ordered family list)
//!     → matcher.rs (evaluate each family's server pattern)
//!     → family.rs (validate the matched family)
//!     → redirect family? rewrite host/path, loop with budget - 1
//!     → Return: FarmMatch, no match, or FarmError
//! ```
//!
//! # Design Decisions
//! - Patterns compiled per request; the farms file itself is cached pre-parsed
//! - Deterministic: same input always matches same family
//! - First match wins (ordered by declaration)

pub mod family;
pub mod matcher;
pub mod router;

pub use family::{ConfigSourceDescriptor, FamilyDefinition, FamilyRole, VariableDeclaration};
pub use matcher::{HostPattern, PatternMatch};
pub use router::{FarmMatch, FarmRouter, Farms};
