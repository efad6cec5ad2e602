//! Generation: target graph resolution, configfile templating, and the
//! Makefile emitter.

pub mod configfile;
pub mod makefile;
pub mod resolve;

pub use configfile::generate_configfiles;
pub use makefile::emit_makefile;
pub use resolve::{resolve_graph, ResolvedGraph, ResolvedTarget};
