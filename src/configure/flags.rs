//! Abstract flag translation.
//!
//! Maps `(toolkind, toolname, itemname, value)` to a concrete compiler
//! flag for the gcc/clang family. The translator owns every compiler-idiom
//! decision; callers never concatenate flags by hand.
//!
//! Tool kinds, tool names, and item names are closed enumerations, so an
//! unknown string can only appear at the parse boundary.

use thiserror::Error;

use crate::core::platform;
use crate::core::target::SourceKind;

/// Errors raised at the translation parse boundary.
#[derive(Debug, Error)]
pub enum FlagError {
    #[error("unknown tool kind: {0}")]
    UnknownToolKind(String),

    #[error("unknown tool name: {0}")]
    UnknownToolName(String),

    #[error("unknown flag item: {0}")]
    UnknownItem(String),

    #[error("unknown language value: {0}")]
    UnknownLanguage(String),
}

/// A role in the compile/link pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    Cc,
    Cxx,
    As,
    Mm,
    Mxx,
    Ld,
    Sh,
    Ar,
}

impl ToolKind {
    pub fn parse(s: &str) -> Result<ToolKind, FlagError> {
        match s {
            "cc" => Ok(ToolKind::Cc),
            "cxx" => Ok(ToolKind::Cxx),
            "as" => Ok(ToolKind::As),
            "mm" => Ok(ToolKind::Mm),
            "mxx" => Ok(ToolKind::Mxx),
            "ld" => Ok(ToolKind::Ld),
            "sh" => Ok(ToolKind::Sh),
            "ar" => Ok(ToolKind::Ar),
            other => Err(FlagError::UnknownToolKind(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Cc => "cc",
            ToolKind::Cxx => "cxx",
            ToolKind::As => "as",
            ToolKind::Mm => "mm",
            ToolKind::Mxx => "mxx",
            ToolKind::Ld => "ld",
            ToolKind::Sh => "sh",
            ToolKind::Ar => "ar",
        }
    }

    /// The Makefile variable naming the program for this kind.
    pub fn make_var(&self) -> &'static str {
        match self {
            ToolKind::Cc => "CC",
            ToolKind::Cxx => "CXX",
            ToolKind::As => "AS",
            ToolKind::Mm => "MM",
            ToolKind::Mxx => "MXX",
            ToolKind::Ld => "LD",
            ToolKind::Sh => "SH",
            ToolKind::Ar => "AR",
        }
    }

    /// The per-target flag attribute this kind consumes.
    pub fn flag_attr(&self) -> &'static str {
        match self {
            ToolKind::Cc => "cflags",
            ToolKind::Cxx => "cxxflags",
            ToolKind::As => "asflags",
            ToolKind::Mm => "mflags",
            ToolKind::Mxx => "mxxflags",
            ToolKind::Ld => "ldflags",
            ToolKind::Sh => "shflags",
            ToolKind::Ar => "arflags",
        }
    }

    /// The user-facing description used in detection progress lines.
    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::Cc => "c compiler",
            ToolKind::Cxx => "c++ compiler",
            ToolKind::As => "assembler",
            ToolKind::Mm => "objc compiler",
            ToolKind::Mxx => "objc++ compiler",
            ToolKind::Ld => "linker",
            ToolKind::Sh => "shared library linker",
            ToolKind::Ar => "static library archiver",
        }
    }

    pub fn from_source(kind: SourceKind) -> ToolKind {
        match kind {
            SourceKind::Cc => ToolKind::Cc,
            SourceKind::Cxx => ToolKind::Cxx,
            SourceKind::Mm => ToolKind::Mm,
            SourceKind::Mxx => ToolKind::Mxx,
            SourceKind::As => ToolKind::As,
        }
    }
}

/// A compiler family derived from the program basename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    Gcc,
    Gxx,
    Clang,
    Clangxx,
    Ar,
}

impl ToolName {
    /// Derive the family from a program name or path.
    ///
    /// Tolerates cross prefixes (`x86_64-w64-mingw32-gcc`) and version
    /// suffixes (`gcc-12`).
    pub fn from_program(program: &str) -> Result<ToolName, FlagError> {
        let basename = program
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(program)
            .trim_end_matches(".exe");

        // gcc-12, clang-18 and friends
        let name = match basename.rsplit_once('-') {
            Some((head, tail))
                if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit() || c == '.') =>
            {
                head
            }
            _ => basename,
        };

        if name == "clang++" || name.ends_with("-clang++") {
            Ok(ToolName::Clangxx)
        } else if name == "clang" || name.ends_with("-clang") {
            Ok(ToolName::Clang)
        } else if name == "g++"
            || name.ends_with("-g++")
            || name == "c++"
            || name.ends_with("-c++")
        {
            Ok(ToolName::Gxx)
        } else if name == "gcc" || name.ends_with("-gcc") || name == "cc" || name.ends_with("-cc")
        {
            Ok(ToolName::Gcc)
        } else if name == "ar" || name.ends_with("-ar") {
            Ok(ToolName::Ar)
        } else {
            Err(FlagError::UnknownToolName(program.to_string()))
        }
    }

    pub fn is_clang(&self) -> bool {
        matches!(self, ToolName::Clang | ToolName::Clangxx)
    }
}

/// An abstract flag category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Itemname {
    Defines,
    Udefines,
    Includedirs,
    Linkdirs,
    Links,
    Syslinks,
    Frameworks,
    Frameworkdirs,
    Rpathdirs,
    Symbols,
    Strip,
    Warnings,
    Optimizes,
    Languages,
}

impl Itemname {
    pub fn parse(s: &str) -> Result<Itemname, FlagError> {
        match s {
            "defines" => Ok(Itemname::Defines),
            "udefines" => Ok(Itemname::Udefines),
            "includedirs" => Ok(Itemname::Includedirs),
            "linkdirs" => Ok(Itemname::Linkdirs),
            "links" => Ok(Itemname::Links),
            "syslinks" => Ok(Itemname::Syslinks),
            "frameworks" => Ok(Itemname::Frameworks),
            "frameworkdirs" => Ok(Itemname::Frameworkdirs),
            "rpathdirs" => Ok(Itemname::Rpathdirs),
            "symbols" => Ok(Itemname::Symbols),
            "strip" => Ok(Itemname::Strip),
            "warnings" => Ok(Itemname::Warnings),
            "optimizes" => Ok(Itemname::Optimizes),
            "languages" => Ok(Itemname::Languages),
            other => Err(FlagError::UnknownItem(other.to_string())),
        }
    }

    /// The attribute key this item reads from the store.
    pub fn attr(&self) -> &'static str {
        match self {
            Itemname::Defines => "defines",
            Itemname::Udefines => "udefines",
            Itemname::Includedirs => "includedirs",
            Itemname::Linkdirs => "linkdirs",
            Itemname::Links => "links",
            Itemname::Syslinks => "syslinks",
            Itemname::Frameworks => "frameworks",
            Itemname::Frameworkdirs => "frameworkdirs",
            Itemname::Rpathdirs => "rpathdirs",
            Itemname::Symbols => "symbols",
            Itemname::Strip => "strip",
            Itemname::Warnings => "warnings",
            Itemname::Optimizes => "optimizes",
            Itemname::Languages => "languages",
        }
    }
}

/// Translate one abstract `(itemname, value)` pair to a concrete flag.
///
/// Returns `Ok(None)` for values the mapping table skips. Unknown C++
/// standards are fatal; every other unknown value is silently dropped.
pub fn translate(
    kind: ToolKind,
    tool: ToolName,
    item: Itemname,
    value: &str,
    plat: &str,
) -> Result<Option<String>, FlagError> {
    let flag = match item {
        Itemname::Defines => Some(format!("-D{}", value.replace('"', "\\\""))),
        Itemname::Udefines => Some(format!("-U{}", value)),
        Itemname::Includedirs => Some(format!("-I{}", value)),
        Itemname::Linkdirs => Some(format!("-L{}", value)),
        Itemname::Links | Itemname::Syslinks => Some(format!("-l{}", value)),
        Itemname::Frameworks => Some(format!("-framework {}", value)),
        Itemname::Frameworkdirs => Some(format!("-F{}", value)),
        Itemname::Rpathdirs => match tool {
            ToolName::Gcc | ToolName::Gxx => Some(format!(
                "-Wl,-rpath='{}'",
                value.replace("@loader_path", "$$ORIGIN")
            )),
            ToolName::Clang | ToolName::Clangxx => Some(format!(
                "-Xlinker -rpath -Xlinker {}",
                value.replace("$ORIGIN", "@loader_path")
            )),
            ToolName::Ar => None,
        },
        Itemname::Symbols => match value {
            "debug" => Some("-g".to_string()),
            "hidden" => Some("-fvisibility=hidden".to_string()),
            _ => None,
        },
        Itemname::Strip => match value {
            "debug" if platform::is_macosx(plat) => Some("-Wl,-S".to_string()),
            "all" if platform::is_macosx(plat) => Some("-Wl,-x".to_string()),
            "debug" | "all" => Some("-s".to_string()),
            _ => None,
        },
        Itemname::Warnings => match value {
            "all" | "more" | "less" => Some("-Wall".to_string()),
            "allextra" | "everything" => Some("-Wall -Wextra".to_string()),
            "error" => Some("-Werror".to_string()),
            "none" => Some("-w".to_string()),
            _ => None,
        },
        Itemname::Optimizes => match value {
            "fast" => Some("-O1".to_string()),
            "faster" => Some("-O2".to_string()),
            "fastest" => Some("-O3".to_string()),
            "smallest" if tool.is_clang() => Some("-Oz".to_string()),
            "smallest" => Some("-Os".to_string()),
            "aggressive" => Some("-Ofast".to_string()),
            "none" => Some("-O0".to_string()),
            _ => None,
        },
        Itemname::Languages => translate_language(kind, value)?,
    };
    Ok(flag)
}

fn translate_language(kind: ToolKind, value: &str) -> Result<Option<String>, FlagError> {
    match kind {
        ToolKind::Cc | ToolKind::Mm => match value {
            "ansi" => Ok(Some("-ansi".to_string())),
            "c89" | "c90" | "c99" | "c11" | "c17" | "gnu89" | "gnu90" | "gnu99" | "gnu11"
            | "gnu17" => Ok(Some(format!("-std={}", value))),
            // C++ standards in a mixed list are not for the C compiler.
            _ => Ok(None),
        },
        ToolKind::Cxx | ToolKind::Mxx => {
            let (dialect, rest) = if let Some(rest) = value.strip_prefix("gnu++") {
                ("gnu", rest)
            } else if let Some(rest) = value.strip_prefix("gnuxx") {
                ("gnu", rest)
            } else if let Some(rest) = value.strip_prefix("c++") {
                ("c", rest)
            } else if let Some(rest) = value.strip_prefix("cxx") {
                ("c", rest)
            } else {
                return Ok(None);
            };
            match rest {
                "98" | "11" | "14" | "17" | "20" => {
                    Ok(Some(format!("-std={}++{}", dialect, rest)))
                }
                _ => Err(FlagError::UnknownLanguage(value.to_string())),
            }
        }
        _ => Ok(None),
    }
}

/// Translate every token in `values`, concatenating non-empty results.
pub fn translate_all(
    kind: ToolKind,
    tool: ToolName,
    item: Itemname,
    values: &[String],
    plat: &str,
) -> Result<String, FlagError> {
    let mut flags = Vec::new();
    for value in values {
        if value.is_empty() {
            continue;
        }
        if let Some(flag) = translate(kind, tool, item, value, plat)? {
            flags.push(flag);
        }
    }
    Ok(flags.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_name_from_program() {
        assert_eq!(ToolName::from_program("gcc").unwrap(), ToolName::Gcc);
        assert_eq!(ToolName::from_program("cc").unwrap(), ToolName::Gcc);
        assert_eq!(ToolName::from_program("/usr/bin/g++").unwrap(), ToolName::Gxx);
        assert_eq!(ToolName::from_program("c++").unwrap(), ToolName::Gxx);
        assert_eq!(ToolName::from_program("clang").unwrap(), ToolName::Clang);
        assert_eq!(ToolName::from_program("clang++").unwrap(), ToolName::Clangxx);
        assert_eq!(ToolName::from_program("clang-18").unwrap(), ToolName::Clang);
        assert_eq!(ToolName::from_program("gcc-12").unwrap(), ToolName::Gcc);
        assert_eq!(
            ToolName::from_program("x86_64-w64-mingw32-gcc").unwrap(),
            ToolName::Gcc
        );
        assert_eq!(
            ToolName::from_program("x86_64-w64-mingw32-ar").unwrap(),
            ToolName::Ar
        );
        assert!(ToolName::from_program("tcc").is_err());
        assert!(ToolName::from_program("cl").is_err());
    }

    #[test]
    fn test_defines_escapes_quotes() {
        let flag = translate(
            ToolKind::Cc,
            ToolName::Gcc,
            Itemname::Defines,
            "VERSION=\"1.0\"",
            "linux",
        )
        .unwrap()
        .unwrap();
        assert_eq!(flag, "-DVERSION=\\\"1.0\\\"");
    }

    #[test]
    fn test_defines_roundtrip() {
        // Invertible for shell-safe values.
        for value in ["DEBUG", "VERSION=3", "NDEBUG"] {
            let flag = translate(ToolKind::Cc, ToolName::Gcc, Itemname::Defines, value, "linux")
                .unwrap()
                .unwrap();
            assert_eq!(flag.strip_prefix("-D").unwrap(), value);
        }
    }

    #[test]
    fn test_rpath_per_family() {
        let gcc = translate(
            ToolKind::Ld,
            ToolName::Gcc,
            Itemname::Rpathdirs,
            "@loader_path/.",
            "linux",
        )
        .unwrap()
        .unwrap();
        assert_eq!(gcc, "-Wl,-rpath='$$ORIGIN/.'");

        let clang = translate(
            ToolKind::Ld,
            ToolName::Clangxx,
            Itemname::Rpathdirs,
            "$ORIGIN/.",
            "macosx",
        )
        .unwrap()
        .unwrap();
        assert_eq!(clang, "-Xlinker -rpath -Xlinker @loader_path/.");
    }

    #[test]
    fn test_warning_levels() {
        for (value, expected) in [
            ("all", "-Wall"),
            ("more", "-Wall"),
            ("less", "-Wall"),
            ("allextra", "-Wall -Wextra"),
            ("everything", "-Wall -Wextra"),
            ("error", "-Werror"),
            ("none", "-w"),
        ] {
            let flag = translate(ToolKind::Cc, ToolName::Gcc, Itemname::Warnings, value, "linux")
                .unwrap()
                .unwrap();
            assert_eq!(flag, expected);
        }
    }

    #[test]
    fn test_optimize_levels() {
        let gcc = translate(
            ToolKind::Cc,
            ToolName::Gcc,
            Itemname::Optimizes,
            "smallest",
            "linux",
        )
        .unwrap()
        .unwrap();
        assert_eq!(gcc, "-Os");

        let clang = translate(
            ToolKind::Cc,
            ToolName::Clang,
            Itemname::Optimizes,
            "smallest",
            "linux",
        )
        .unwrap()
        .unwrap();
        assert_eq!(clang, "-Oz");

        let fast = translate(
            ToolKind::Cc,
            ToolName::Gcc,
            Itemname::Optimizes,
            "aggressive",
            "linux",
        )
        .unwrap()
        .unwrap();
        assert_eq!(fast, "-Ofast");
    }

    #[test]
    fn test_strip_is_platform_aware() {
        let linux = translate(ToolKind::Ld, ToolName::Gcc, Itemname::Strip, "all", "linux")
            .unwrap()
            .unwrap();
        assert_eq!(linux, "-s");

        let macos = translate(ToolKind::Ld, ToolName::Clang, Itemname::Strip, "all", "macosx")
            .unwrap()
            .unwrap();
        assert_eq!(macos, "-Wl,-x");

        let macos_debug =
            translate(ToolKind::Ld, ToolName::Clang, Itemname::Strip, "debug", "macosx")
                .unwrap()
                .unwrap();
        assert_eq!(macos_debug, "-Wl,-S");
    }

    #[test]
    fn test_cxx_language_mapping() {
        let std17 = translate(
            ToolKind::Cxx,
            ToolName::Gxx,
            Itemname::Languages,
            "c++17",
            "linux",
        )
        .unwrap()
        .unwrap();
        assert_eq!(std17, "-std=c++17");

        let alias = translate(
            ToolKind::Cxx,
            ToolName::Gxx,
            Itemname::Languages,
            "cxx14",
            "linux",
        )
        .unwrap()
        .unwrap();
        assert_eq!(alias, "-std=c++14");

        let gnu = translate(
            ToolKind::Cxx,
            ToolName::Clangxx,
            Itemname::Languages,
            "gnuxx11",
            "linux",
        )
        .unwrap()
        .unwrap();
        assert_eq!(gnu, "-std=gnu++11");
    }

    #[test]
    fn test_unknown_cxx_standard_is_fatal() {
        let err = translate(
            ToolKind::Cxx,
            ToolName::Gxx,
            Itemname::Languages,
            "c++99",
            "linux",
        )
        .unwrap_err();
        assert!(matches!(err, FlagError::UnknownLanguage(_)));
    }

    #[test]
    fn test_c_compiler_skips_cxx_standard() {
        // Mixed set_languages("c99", "c++17") lists hit both compilers.
        let skipped = translate(
            ToolKind::Cc,
            ToolName::Gcc,
            Itemname::Languages,
            "c++17",
            "linux",
        )
        .unwrap();
        assert_eq!(skipped, None);

        let c99 = translate(ToolKind::Cc, ToolName::Gcc, Itemname::Languages, "c99", "linux")
            .unwrap()
            .unwrap();
        assert_eq!(c99, "-std=c99");
    }

    #[test]
    fn test_unknown_value_is_skipped() {
        let flag = translate(
            ToolKind::Cc,
            ToolName::Gcc,
            Itemname::Warnings,
            "pedantic-extreme",
            "linux",
        )
        .unwrap();
        assert_eq!(flag, None);
    }

    #[test]
    fn test_unknown_item_is_fatal() {
        assert!(matches!(
            Itemname::parse("linkflags"),
            Err(FlagError::UnknownItem(_))
        ));
    }

    #[test]
    fn test_translate_all_joins() {
        let flags = translate_all(
            ToolKind::Cc,
            ToolName::Gcc,
            Itemname::Defines,
            &["A".to_string(), String::new(), "B=2".to_string()],
            "linux",
        )
        .unwrap();
        assert_eq!(flags, "-DA -DB=2");
    }
}
