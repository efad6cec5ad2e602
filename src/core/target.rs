//! Target kinds, source kinds, and output naming defaults.

use thiserror::Error;

use crate::core::platform;

/// Errors raised at the target parse boundary.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("unknown target kind: {0}")]
    UnknownKind(String),

    #[error("unknown source file extension: {0}")]
    UnknownSourceExtension(String),
}

/// The kind of artifact a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Executable binary
    Binary,
    /// Static library (.a)
    Static,
    /// Shared library (.so / .dylib / .dll)
    Shared,
}

impl TargetKind {
    /// Parse a kind string from `set_kind`.
    pub fn parse(s: &str) -> Result<TargetKind, TargetError> {
        match s {
            "binary" => Ok(TargetKind::Binary),
            "static" => Ok(TargetKind::Static),
            "shared" => Ok(TargetKind::Shared),
            other => Err(TargetError::UnknownKind(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Binary => "binary",
            TargetKind::Static => "static",
            TargetKind::Shared => "shared",
        }
    }

    /// Default output file extension for the given platform.
    pub fn extension(&self, plat: &str) -> &'static str {
        match self {
            TargetKind::Binary => {
                if platform::is_mingw(plat) {
                    ".exe"
                } else {
                    ""
                }
            }
            TargetKind::Static => ".a",
            TargetKind::Shared => {
                if platform::is_mingw(plat) {
                    ".dll"
                } else if platform::is_macosx(plat) {
                    ".dylib"
                } else {
                    ".so"
                }
            }
        }
    }

    /// Default output file prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            TargetKind::Binary => "",
            TargetKind::Static | TargetKind::Shared => "lib",
        }
    }

    /// Whether dependents link against this target's output.
    pub fn is_linkable(&self) -> bool {
        matches!(self, TargetKind::Static | TargetKind::Shared)
    }
}

/// The tool role a source file compiles under, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// C
    Cc,
    /// C++
    Cxx,
    /// Objective-C
    Mm,
    /// Objective-C++
    Mxx,
    /// Assembly
    As,
}

impl SourceKind {
    /// Infer the source kind from a file path.
    pub fn from_path(path: &str) -> Result<SourceKind, TargetError> {
        let ext = path.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        match ext {
            "c" => Ok(SourceKind::Cc),
            "cpp" | "cc" | "ixx" => Ok(SourceKind::Cxx),
            "m" => Ok(SourceKind::Mm),
            "mm" | "mxx" => Ok(SourceKind::Mxx),
            "s" | "S" | "asm" => Ok(SourceKind::As),
            _ => Err(TargetError::UnknownSourceExtension(path.to_string())),
        }
    }
}

/// Default object file extension for the given platform.
pub fn object_extension(plat: &str) -> &'static str {
    if platform::is_mingw(plat) {
        ".obj"
    } else {
        ".o"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(TargetKind::parse("binary").unwrap(), TargetKind::Binary);
        assert_eq!(TargetKind::parse("static").unwrap(), TargetKind::Static);
        assert_eq!(TargetKind::parse("shared").unwrap(), TargetKind::Shared);
        assert!(TargetKind::parse("bundle").is_err());
    }

    #[test]
    fn test_naming_defaults() {
        assert_eq!(TargetKind::Binary.extension("linux"), "");
        assert_eq!(TargetKind::Binary.extension("mingw"), ".exe");
        assert_eq!(TargetKind::Static.extension("linux"), ".a");
        assert_eq!(TargetKind::Shared.extension("linux"), ".so");
        assert_eq!(TargetKind::Shared.extension("mingw"), ".dll");
        assert_eq!(TargetKind::Shared.extension("macosx"), ".dylib");

        assert_eq!(TargetKind::Binary.prefix(), "");
        assert_eq!(TargetKind::Static.prefix(), "lib");
        assert_eq!(TargetKind::Shared.prefix(), "lib");
    }

    #[test]
    fn test_source_kind_from_path() {
        assert_eq!(SourceKind::from_path("src/main.c").unwrap(), SourceKind::Cc);
        assert_eq!(SourceKind::from_path("a.cpp").unwrap(), SourceKind::Cxx);
        assert_eq!(SourceKind::from_path("a.cc").unwrap(), SourceKind::Cxx);
        assert_eq!(SourceKind::from_path("a.m").unwrap(), SourceKind::Mm);
        assert_eq!(SourceKind::from_path("a.mm").unwrap(), SourceKind::Mxx);
        assert_eq!(SourceKind::from_path("boot.S").unwrap(), SourceKind::As);
        assert!(SourceKind::from_path("readme.txt").is_err());
        assert!(SourceKind::from_path("noext").is_err());
    }

    #[test]
    fn test_object_extension() {
        assert_eq!(object_extension("linux"), ".o");
        assert_eq!(object_extension("mingw"), ".obj");
    }
}
