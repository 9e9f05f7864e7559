//! Optional component activation.
//!
//! # Data Flow
//! ```text
//! MergedConfiguration.components (+ enable-<kind>-<Name> settings)
//!     → detect.rs      footprints in the tenant's code path
//!     → activator.rs   state per component (see its state machine)
//!     → manifest.rs    dependencies of dependency-managed components,
//!                      pulled in with negative sequences
//!     → ordering.rs    mechanism / kind / sequence, dependencies first
//!     → ActivationPlan, written back into the MergedConfiguration
//! ```
//!
//! # Design Decisions
//! - A component that cannot be activated is logged and skipped, never fatal
//! - Decisions needing the host's registry support wait for it instead of
//!   guessing; `ActivationPlan::settle` finishes them without touching disk

pub mod activator;
pub mod candidate;
pub mod detect;
pub mod manifest;
pub mod ordering;

pub use activator::{decide, ActivationPlan, ActivationState, ComponentActivator, Control, PlannedComponent};
pub use candidate::{ComponentCandidate, ComponentKind, Mechanism};
pub use detect::{Detector, Footprint};
pub use manifest::DependencyManifest;
