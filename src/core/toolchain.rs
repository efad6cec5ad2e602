//! Toolchain entities and the built-in toolchain set.
//!
//! A toolchain declares, per toolset kind, an ordered sequence of candidate
//! programs. Detection collapses each sequence to the single program that
//! passed probing.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::store::{ConfStore, Namespace, Value};

/// The eight toolset kinds every toolchain must resolve.
pub const TOOLSET_KINDS: &[&str] = &["cc", "cxx", "as", "mm", "mxx", "ld", "sh", "ar"];

/// Store key holding the candidate sequence for a toolset kind.
pub fn toolset_key(kind: &str) -> String {
    format!("toolset_{}", kind)
}

/// A toolchain whose candidates have all been collapsed to one program.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectedToolchain {
    pub name: String,
    tools: BTreeMap<String, String>,
}

impl DetectedToolchain {
    pub fn new(name: impl Into<String>) -> Self {
        DetectedToolchain {
            name: name.into(),
            tools: BTreeMap::new(),
        }
    }

    pub fn set_tool(&mut self, kind: &str, program: impl Into<String>) {
        self.tools.insert(kind.to_string(), program.into());
    }

    /// The program detection promoted for a toolset kind.
    pub fn tool(&self, kind: &str) -> Option<&str> {
        self.tools.get(kind).map(String::as_str)
    }
}

fn set_toolsets(store: &mut ConfStore, name: &str, toolsets: &[(&str, Vec<String>)]) {
    store.declare(Namespace::Toolchains, name);
    for (kind, candidates) in toolsets {
        store.set(
            Namespace::Toolchains,
            name,
            &toolset_key(kind),
            Value::List(candidates.clone()),
        );
    }
}

fn owned(candidates: &[&str]) -> Vec<String> {
    candidates.iter().map(|s| s.to_string()).collect()
}

fn mingw_toolsets(prefix: &str) -> Vec<(&'static str, Vec<String>)> {
    let p = |tool: &str| format!("{}-{}", prefix, tool);
    vec![
        ("cc", vec![p("gcc")]),
        ("cxx", vec![p("gcc"), p("g++")]),
        ("as", vec![p("gcc")]),
        ("mm", vec![p("gcc")]),
        ("mxx", vec![p("gcc"), p("g++")]),
        ("ld", vec![p("g++"), p("gcc")]),
        ("sh", vec![p("g++"), p("gcc")]),
        ("ar", vec![p("ar"), "ar".to_string()]),
    ]
}

/// Register the built-in toolchains during the toolchains-loading phase.
///
/// User scripts may add more with `toolchain()`/`set_toolset`.
pub fn register_builtin_toolchains(store: &mut ConfStore) {
    set_toolsets(
        store,
        "clang",
        &[
            ("cc", owned(&["clang"])),
            ("cxx", owned(&["clang", "clang++"])),
            ("as", owned(&["clang"])),
            ("mm", owned(&["clang"])),
            ("mxx", owned(&["clang", "clang++"])),
            ("ld", owned(&["clang++", "clang"])),
            ("sh", owned(&["clang++", "clang"])),
            ("ar", owned(&["ar"])),
        ],
    );

    set_toolsets(
        store,
        "gcc",
        &[
            ("cc", owned(&["gcc"])),
            ("cxx", owned(&["gcc", "g++"])),
            ("as", owned(&["gcc"])),
            ("mm", owned(&["gcc"])),
            ("mxx", owned(&["gcc", "g++"])),
            ("ld", owned(&["g++", "gcc"])),
            ("sh", owned(&["g++", "gcc"])),
            ("ar", owned(&["ar"])),
        ],
    );

    set_toolsets(store, "envs", &env_toolsets());

    set_toolsets(store, "x86_64_w64_mingw32", &mingw_toolsets("x86_64-w64-mingw32"));
    set_toolsets(store, "i686_w64_mingw32", &mingw_toolsets("i686-w64-mingw32"));
}

fn env_toolsets() -> Vec<(&'static str, Vec<String>)> {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    let cc = var("CC");
    let cxx = var("CXX");
    let asm = var("AS");
    let ld = var("LD");
    let ar = var("AR");

    let seq = |vars: &[&Option<String>]| -> Vec<String> {
        vars.iter().filter_map(|v| (*v).clone()).collect()
    };

    vec![
        ("cc", seq(&[&cc])),
        ("cxx", seq(&[&cxx, &cc])),
        ("as", seq(&[&asm, &cc])),
        ("mm", seq(&[&cc])),
        ("mxx", seq(&[&cxx, &cc])),
        ("ld", seq(&[&ld, &cxx, &cc])),
        ("sh", seq(&[&ld, &cxx, &cc])),
        ("ar", seq(&[&ar])),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_cover_all_kinds() {
        let mut store = ConfStore::new();
        register_builtin_toolchains(&mut store);

        for name in ["clang", "gcc", "x86_64_w64_mingw32", "i686_w64_mingw32"] {
            for kind in TOOLSET_KINDS {
                let candidates = store.list(Namespace::Toolchains, name, &toolset_key(kind));
                assert!(
                    !candidates.is_empty(),
                    "{} declares no candidates for {}",
                    name,
                    kind
                );
            }
        }
    }

    #[test]
    fn test_mingw_candidates_are_prefixed() {
        let mut store = ConfStore::new();
        register_builtin_toolchains(&mut store);

        let cc = store.list(
            Namespace::Toolchains,
            "x86_64_w64_mingw32",
            &toolset_key("cc"),
        );
        assert_eq!(cc, vec!["x86_64-w64-mingw32-gcc"]);
    }

    #[test]
    fn test_detected_toolchain_lookup() {
        let mut tc = DetectedToolchain::new("gcc");
        tc.set_tool("cc", "gcc");
        tc.set_tool("ld", "g++");

        assert_eq!(tc.tool("cc"), Some("gcc"));
        assert_eq!(tc.tool("ld"), Some("g++"));
        assert_eq!(tc.tool("mm"), None);
    }
}
