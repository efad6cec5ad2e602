//! Core data structures for slipway.
//!
//! This module contains the foundational types used throughout the
//! configurator:
//! - The scoped key-value store holding options, targets, and toolchains
//! - The loading-phase state machine
//! - Platform/architecture/mode resolution
//! - Entity views over the store (options, targets, toolchains)
//! - The configuration session threading everything together

pub mod option;
pub mod phase;
pub mod platform;
pub mod session;
pub mod store;
pub mod target;
pub mod toolchain;

pub use phase::Phase;
pub use session::Session;
pub use store::{ConfStore, Namespace, Value, ROOT_SCOPE};
pub use target::{SourceKind, TargetKind};
pub use toolchain::DetectedToolchain;
