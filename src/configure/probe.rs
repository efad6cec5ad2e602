//! Option probing.
//!
//! For each option with no default and at least one probing input, a C or
//! C++ snippet is synthesized, compiled, and (when `links`/`syslinks` are
//! declared) linked with the detected toolchain. The exit code is the sole
//! success signal; the option's `value` becomes `true` or `false`.
//!
//! Probe scratch files live in a temporary directory that is removed on
//! every exit path.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::configure::flags::{self, Itemname, ToolKind, ToolName};
use crate::core::option::OptionRef;
use crate::core::session::Session;
use crate::core::store::Namespace;

/// Resolve every registered option, probing where required.
pub fn probe_options(session: &mut Session) -> Result<()> {
    let names: Vec<String> = session.store.names(Namespace::Options).to_vec();

    for name in names {
        let opt = OptionRef::new(&session.store, &name);

        if !opt.needs_probe() {
            // A declared default resolves the option without a compiler.
            if opt.value().is_none() {
                if let Some(default) = opt.default_value() {
                    let default = default.to_string();
                    session
                        .store
                        .set_scalar(Namespace::Options, &name, "value", default);
                }
            }
            continue;
        }

        let ok = check_option(session, &name)?;
        session
            .store
            .set_scalar(Namespace::Options, &name, "value", if ok { "true" } else { "false" });
        println!("checking for {} .. {}", name, if ok { "ok" } else { "no" });
    }
    Ok(())
}

/// Assemble the probe source for one language kind.
///
/// Order: includes, typedefs, raw snippets, then a `main` that either
/// evaluates each func as a call expression (when it contains `(`) or
/// takes its address through a volatile pointer.
fn assemble_snippet(
    includes: &[String],
    types: &[String],
    snippets: &[String],
    funcs: &[String],
) -> String {
    let mut src = String::new();

    for inc in includes {
        let _ = writeln!(src, "#include \"{}\"", inc);
    }
    for ty in types {
        let sanitized: String = ty
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let _ = writeln!(src, "typedef {} __type_{};", ty, sanitized);
    }
    for snippet in snippets {
        let _ = writeln!(src, "{}", snippet);
    }

    let _ = writeln!(src, "int main(int argc, char** argv)");
    let _ = writeln!(src, "{{");
    for func in funcs {
        if func.contains('(') {
            let _ = writeln!(src, "    {};", func);
        } else {
            let _ = writeln!(src, "    volatile void* p{} = (void*)&{};", func, func);
        }
    }
    let _ = writeln!(src, "    return 0;");
    let _ = writeln!(src, "}}");
    src
}

/// Split a translated flag string into process arguments.
///
/// Colons inside translated segments are list delimiters and become
/// spaces before invocation.
fn split_flags(flags: &str) -> Vec<String> {
    flags
        .replace(':', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn check_option(session: &Session, name: &str) -> Result<bool> {
    let opt = OptionRef::new(&session.store, name);
    let toolchain = session
        .toolchain
        .as_ref()
        .context("toolchain not detected")?;

    let scratch = tempfile::Builder::new().prefix("slipway-probe").tempdir()?;
    let mut objects: Vec<PathBuf> = Vec::new();

    for (kind, prefix, file) in [
        (ToolKind::Cc, "c", "probe.c"),
        (ToolKind::Cxx, "cxx", "probe.cpp"),
    ] {
        let includes = opt.list(&format!("{}includes", prefix));
        let types = opt.list(&format!("{}types", prefix));
        let snippets = opt.list(&format!("{}snippets", prefix));
        let funcs = opt.list(&format!("{}funcs", prefix));

        if includes.is_empty() && types.is_empty() && snippets.is_empty() && funcs.is_empty() {
            // No inputs for this kind: the check succeeds without a compile.
            continue;
        }

        let program = toolchain
            .tool(kind.as_str())
            .with_context(|| format!("toolchain has no {} tool", kind.as_str()))?;
        let tool = match ToolName::from_program(program) {
            Ok(tool) => tool,
            Err(e) => {
                tracing::debug!("option {}: {}", name, e);
                return Ok(false);
            }
        };

        let src_path = scratch.path().join(file);
        std::fs::write(
            &src_path,
            assemble_snippet(&includes, &types, &snippets, &funcs),
        )?;
        let obj_path = scratch.path().join(format!("{}.o", file));

        let mut args: Vec<String> = vec!["-c".to_string()];
        for item in [
            Itemname::Languages,
            Itemname::Warnings,
            Itemname::Optimizes,
            Itemname::Defines,
            Itemname::Udefines,
        ] {
            let values = opt.list(item.attr());
            let translated = flags::translate_all(kind, tool, item, &values, &session.plat)?;
            args.extend(split_flags(&translated));
        }
        args.extend(opt.list("cxflags"));
        args.extend(opt.list(kind.flag_attr()));
        args.push("-o".to_string());
        args.push(obj_path.display().to_string());
        args.push(src_path.display().to_string());

        let probe = crate::util::process::ProcessBuilder::new(program).args(&args);
        tracing::debug!("option {}: {}", name, probe.display_command());
        let output = probe.exec()?;
        if !output.status.success() {
            tracing::debug!(
                "option {}: compile failed: {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(false);
        }
        objects.push(obj_path);
    }

    let links = opt.list("links");
    let syslinks = opt.list("syslinks");
    if !links.is_empty() || !syslinks.is_empty() {
        if objects.is_empty() {
            // Link-only probes still need an object to feed the linker.
            let src_path = scratch.path().join("probe.c");
            std::fs::write(&src_path, assemble_snippet(&[], &[], &[], &[]))?;
            let obj_path = scratch.path().join("probe.c.o");
            let cc = toolchain.tool("cc").context("toolchain has no cc tool")?;
            let compiled = crate::util::process::ProcessBuilder::new(cc)
                .arg("-c")
                .arg("-o")
                .arg(&obj_path)
                .arg(&src_path)
                .check();
            if !compiled {
                return Ok(false);
            }
            objects.push(obj_path);
        }

        let ld = toolchain.tool("ld").context("toolchain has no ld tool")?;
        let tool = match ToolName::from_program(ld) {
            Ok(tool) => tool,
            Err(e) => {
                tracing::debug!("option {}: {}", name, e);
                return Ok(false);
            }
        };

        let bin_path = scratch.path().join("probe.bin");
        let mut args: Vec<String> = vec!["-o".to_string(), bin_path.display().to_string()];
        for object in &objects {
            args.push(object.display().to_string());
        }
        for item in [Itemname::Linkdirs, Itemname::Links, Itemname::Syslinks] {
            let values = opt.list(item.attr());
            let translated =
                flags::translate_all(ToolKind::Ld, tool, item, &values, &session.plat)?;
            args.extend(split_flags(&translated));
        }
        args.extend(opt.list("ldflags"));

        let probe = crate::util::process::ProcessBuilder::new(ld).args(&args);
        tracing::debug!("option {}: {}", name, probe.display_command());
        let output = probe.exec()?;
        if !output.status.success() {
            tracing::debug!(
                "option {}: link failed: {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::phase::Phase;

    #[test]
    fn test_snippet_assembly_order() {
        let src = assemble_snippet(
            &["pthread.h".to_string()],
            &["pthread_t".to_string()],
            &["static int probe_state = 0;".to_string()],
            &["pthread_create".to_string(), "pthread_exit((void*)0)".to_string()],
        );

        let expected = "\
#include \"pthread.h\"
typedef pthread_t __type_pthread_t;
static int probe_state = 0;
int main(int argc, char** argv)
{
    volatile void* ppthread_create = (void*)&pthread_create;
    pthread_exit((void*)0);
    return 0;
}
";
        assert_eq!(src, expected);
    }

    #[test]
    fn test_type_sanitization() {
        let src = assemble_snippet(&[], &["struct stat".to_string()], &[], &[]);
        assert!(src.contains("typedef struct stat __type_struct_stat;"));
    }

    #[test]
    fn test_split_flags_rewrites_colons() {
        assert_eq!(
            split_flags("-L/usr/lib:-lfoo -lbar"),
            vec!["-L/usr/lib", "-lfoo", "-lbar"]
        );
        assert!(split_flags("").is_empty());
    }

    #[test]
    fn test_defaulted_option_keeps_default() {
        let mut session = Session::new(PathBuf::from("."));
        session.phase = Phase::LoadOptions;
        session.enter_option("feature", None, Some("enabled"));
        // Probing inputs present, but the default wins.
        session.add_values("cfuncs", &["some_symbol".to_string()]);
        session.end_option();
        session.phase = Phase::Detect;

        probe_options(&mut session).unwrap();

        assert_eq!(
            session.store.scalar(Namespace::Options, "feature", "value"),
            Some("enabled")
        );
    }

    #[test]
    fn test_option_without_inputs_is_untouched() {
        let mut session = Session::new(PathBuf::from("."));
        session.phase = Phase::LoadOptions;
        session.enter_option("bare", None, None);
        session.end_option();
        session.phase = Phase::Detect;

        probe_options(&mut session).unwrap();

        assert_eq!(
            session.store.scalar(Namespace::Options, "bare", "value"),
            None
        );
    }
}
