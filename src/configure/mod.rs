//! Host configuration: flag translation, toolchain detection, and option
//! probing.

pub mod detect;
pub mod flags;
pub mod probe;

pub use detect::{detect_toolchain, verify_backend};
pub use flags::{translate, translate_all, FlagError, Itemname, ToolKind, ToolName};
pub use probe::probe_options;
