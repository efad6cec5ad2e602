//! Toolchain detection.
//!
//! Tries candidate toolchains in a platform-defaulted order, probing each
//! toolset kind's candidate programs until one passes. A toolchain succeeds
//! only when all eight kinds resolve; the first passing candidate per kind
//! is promoted to the singleton toolset.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Result};

use crate::configure::flags::{ToolKind, ToolName};
use crate::core::platform;
use crate::core::session::Session;
use crate::core::store::{Namespace, Value};
use crate::core::toolchain::{toolset_key, DetectedToolchain, TOOLSET_KINDS};
use crate::util::process::{find_program, ProcessBuilder};

/// Per-program probe result cache.
#[derive(Debug, Default)]
struct ProbeCache {
    results: HashMap<String, bool>,
}

impl ProbeCache {
    fn probe(&mut self, program: &str) -> bool {
        if let Some(&ok) = self.results.get(program) {
            return ok;
        }
        let ok = run_probe(program);
        self.results.insert(program.to_string(), ok);
        ok
    }
}

fn run_probe(program: &str) -> bool {
    let family = match ToolName::from_program(program) {
        Ok(family) => family,
        Err(e) => {
            tracing::debug!("rejecting candidate {}: {}", program, e);
            return false;
        }
    };

    let Some(path) = find_program(program) else {
        tracing::debug!("candidate {} not found in PATH", program);
        return false;
    };

    match family {
        ToolName::Ar => probe_archiver(&path),
        _ => ProcessBuilder::new(&path).arg("--version").check(),
    }
}

/// Verify an archiver by archiving an empty object file.
fn probe_archiver(path: &Path) -> bool {
    let Ok(dir) = tempfile::Builder::new().prefix("slipway-ar").tempdir() else {
        return false;
    };
    let obj = dir.path().join("empty.o");
    if std::fs::write(&obj, b"").is_err() {
        return false;
    }
    let lib = dir.path().join("libempty.a");
    ProcessBuilder::new(path).arg("-cr").arg(&lib).arg(&obj).check()
}

/// The candidate toolchain order for a platform.
///
/// mingw forces the arch-matching cross toolchain; macOS prefers clang,
/// everything else gcc. When `CC` is exported the `envs` toolchain is
/// consulted first so the environment wins over auto-detection.
fn default_order(plat: &str, arch: &str, env_cc: bool) -> Vec<String> {
    if platform::is_mingw(plat) {
        let name = if arch.starts_with("i686") || arch == "i386" || arch == "x86" {
            "i686_w64_mingw32"
        } else {
            "x86_64_w64_mingw32"
        };
        return vec![name.to_string()];
    }

    let mut order = Vec::new();
    if env_cc {
        order.push("envs".to_string());
    }
    if platform::is_macosx(plat) {
        order.push("clang".to_string());
        order.push("gcc".to_string());
    } else {
        order.push("gcc".to_string());
        order.push("clang".to_string());
    }
    order
}

fn candidate_toolchains(session: &Session) -> Vec<String> {
    if let Some(name) = &session.requested_toolchain {
        return vec![name.clone()];
    }
    let env_cc = std::env::var("CC").map(|v| !v.is_empty()).unwrap_or(false);
    default_order(&session.plat, &session.arch, env_cc)
}

fn try_toolchain(
    session: &Session,
    name: &str,
    cache: &mut ProbeCache,
) -> Option<DetectedToolchain> {
    let mut detected = DetectedToolchain::new(name);

    for kind in TOOLSET_KINDS {
        let candidates = session
            .store
            .list(Namespace::Toolchains, name, &toolset_key(kind));

        let mut promoted = None;
        for program in &candidates {
            if cache.probe(program) {
                promoted = Some(program.clone());
                break;
            }
            tracing::debug!("toolchain {}: {} candidate {} failed", name, kind, program);
        }

        let program = promoted?;
        let tool_kind = ToolKind::parse(kind).expect("built-in toolset kind");
        println!(
            "checking for the {} ({}) ... {}",
            tool_kind.description(),
            kind,
            program
        );
        detected.set_tool(kind, program);
    }

    Some(detected)
}

/// Detect a usable toolchain and record it on the session.
///
/// Collapses each toolset candidate sequence in the store to the program
/// that passed probing. Failure of every candidate toolchain is fatal.
pub fn detect_toolchain(session: &mut Session) -> Result<()> {
    let mut cache = ProbeCache::default();

    for name in candidate_toolchains(session) {
        if !session.store.exists(Namespace::Toolchains, &name) {
            tracing::debug!("toolchain {} is not declared", name);
            continue;
        }

        if let Some(detected) = try_toolchain(session, &name, &mut cache) {
            println!("checking for toolchain ... {}", name);
            for kind in TOOLSET_KINDS {
                if let Some(program) = detected.tool(kind) {
                    session.store.set(
                        Namespace::Toolchains,
                        &name,
                        &toolset_key(kind),
                        Value::Scalar(program.to_string()),
                    );
                }
            }
            session.toolchain = Some(detected);
            return Ok(());
        }
    }

    println!("checking for toolchain ... no");
    bail!("toolchain not found")
}

/// Verify the generator backend program.
///
/// Only `make` is supported; the program must answer `--version`.
pub fn verify_backend(make_override: Option<&str>) -> Result<String> {
    let program = match make_override {
        Some(path) => path.to_string(),
        None => {
            if find_program("make").is_some() {
                "make".to_string()
            } else if find_program("gmake").is_some() {
                "gmake".to_string()
            } else {
                bail!("make not found");
            }
        }
    };

    if !ProcessBuilder::new(&program).arg("--version").check() {
        bail!("make not found");
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_prefers_gcc_on_linux() {
        assert_eq!(default_order("linux", "x86_64", false), vec!["gcc", "clang"]);
    }

    #[test]
    fn test_default_order_prefers_clang_on_macos() {
        assert_eq!(
            default_order("macosx", "x86_64", false),
            vec!["clang", "gcc"]
        );
    }

    #[test]
    fn test_env_cc_consults_envs_first() {
        assert_eq!(
            default_order("linux", "x86_64", true),
            vec!["envs", "gcc", "clang"]
        );
    }

    #[test]
    fn test_mingw_forced_by_arch() {
        assert_eq!(
            default_order("mingw", "x86_64", false),
            vec!["x86_64_w64_mingw32"]
        );
        assert_eq!(
            default_order("mingw", "i686", true),
            vec!["i686_w64_mingw32"]
        );
    }

    #[test]
    fn test_probe_rejects_missing_program() {
        let mut cache = ProbeCache::default();
        assert!(!cache.probe("slipway-no-such-compiler-gcc"));
        // Cached on second ask.
        assert!(!cache.probe("slipway-no-such-compiler-gcc"));
    }

    #[test]
    fn test_probe_archiver_with_host_ar() {
        if find_program("ar").is_none() {
            return;
        }
        assert!(probe_archiver(Path::new("ar")));
    }

    #[test]
    fn test_verify_backend_reports_missing_make() {
        let err = verify_backend(Some("slipway-no-such-make")).unwrap_err();
        assert!(err.to_string().contains("make not found"));
    }
}
