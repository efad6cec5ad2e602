//! slipway - a script-driven build configurator for C/C++ projects
//!
//! This crate provides the configuration-and-generation engine: Lua build
//! scripts register options, toolchains, and targets; the host is probed
//! for a usable toolchain and optional features; and a self-contained
//! Makefile is emitted to drive compilation, linking, installation, and
//! cleaning of native artifacts.

pub mod configure;
pub mod core;
pub mod generate;
pub mod script;
pub mod util;

pub use crate::core::phase::Phase;
pub use crate::core::session::Session;
pub use crate::core::store::ConfStore;
