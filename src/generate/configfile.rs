//! Configfile templating.
//!
//! Substitutes `${VAR}` and `${define VAR}` placeholders in per-target
//! template files. Everything outside a placeholder is preserved byte for
//! byte, and a final sweep turns any placeholder left over into
//! `/* #undef VAR */`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;

use crate::core::platform;
use crate::core::session::Session;
use crate::generate::resolve::{ResolvedGraph, ResolvedTarget};
use crate::util::fs as fsutil;

/// Render one `#define` line for a `${define VAR}` placeholder.
fn define_line(name: &str, value: &str) -> String {
    match value {
        "" => format!("/* #undef {} */", name),
        "1" | "true" => format!("#define {} 1", name),
        "0" | "false" => format!("/* #define {} 0 */", name),
        other => format!("#define {} {}", name, other),
    }
}

/// Replace any remaining `${define X}` with `/* #undef X */`.
fn sweep_defines(content: &str) -> String {
    let mut out = String::new();
    let mut rest = content;
    while let Some(start) = rest.find("${define ") {
        out.push_str(&rest[..start]);
        let after = &rest[start + "${define ".len()..];
        match after.find('}') {
            Some(end) => {
                let name = after[..end].trim();
                out.push_str(&format!("/* #undef {} */", name));
                rest = &after[end + 1..];
            }
            None => {
                out.push_str("${define ");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Apply every variable to a template. Substitution is global and
/// idempotent per pattern.
pub fn substitute(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut content = template.to_string();
    for (name, value) in vars {
        content = content.replace(
            &format!("${{define {}}}", name),
            &define_line(name, value),
        );
        content = content.replace(&format!("${{{}}}", name), value);
    }
    sweep_defines(&content)
}

/// Git metadata for `GIT_*` placeholders. A missing or broken repository
/// is tolerated: the variables are simply absent.
fn git_vars(root: &Path) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();

    let repo = match git2::Repository::discover(root) {
        Ok(repo) => repo,
        Err(e) => {
            tracing::debug!("no git repository: {}", e);
            return vars;
        }
    };

    let mut opts = git2::DescribeOptions::new();
    opts.describe_tags();
    if let Ok(describe) = repo.describe(&opts) {
        if let Ok(tag) = describe.format(None) {
            vars.insert("GIT_TAG".to_string(), tag);
        }
        let mut fmt = git2::DescribeFormatOptions::new();
        fmt.always_use_long_format(true);
        if let Ok(long) = describe.format(Some(&fmt)) {
            vars.insert("GIT_TAG_LONG".to_string(), long);
        }
    }

    if let Ok(head) = repo.head() {
        if let Some(branch) = head.shorthand() {
            vars.insert("GIT_BRANCH".to_string(), branch.to_string());
        }
        if let Ok(commit) = head.peel_to_commit() {
            vars.insert("GIT_COMMIT_LONG".to_string(), commit.id().to_string());
            if let Ok(short) = commit.as_object().short_id() {
                if let Some(short) = short.as_str() {
                    vars.insert("GIT_COMMIT".to_string(), short.to_string());
                }
            }
            if let Some(date) = chrono::DateTime::from_timestamp(commit.time().seconds(), 0) {
                vars.insert(
                    "GIT_COMMIT_DATE".to_string(),
                    date.format("%Y%m%d%H%M%S").to_string(),
                );
            }
        }
    }

    vars
}

/// The variable set visible to one target's configfiles.
fn target_vars(session: &Session, target: &ResolvedTarget, wants_git: bool) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();

    let os = if platform::is_mingw(&session.plat) {
        "WINDOWS".to_string()
    } else {
        session.plat.to_uppercase()
    };
    vars.insert("OS".to_string(), os);

    if let Some(version) = &session.version {
        vars.insert("VERSION".to_string(), version.clone());
        let mut parts = version.split('.');
        for (key, part) in ["VERSION_MAJOR", "VERSION_MINOR", "VERSION_ALTER"]
            .iter()
            .zip(&mut parts)
        {
            vars.insert(key.to_string(), part.to_string());
        }
    }

    if let Some(pattern) = &session.version_build {
        vars.insert(
            "VERSION_BUILD".to_string(),
            Local::now().format(pattern).to_string(),
        );
    }

    if wants_git {
        vars.extend(git_vars(&session.project_root));
    }

    for (name, value) in &target.configvars {
        vars.insert(name.clone(), value.clone());
    }

    vars
}

/// The output path for a template: `configdir` (or the template's own
/// directory) joined with the template name minus a trailing `.in`.
fn output_path(session: &Session, target: &ResolvedTarget, template: &str) -> PathBuf {
    let name = template.rsplit('/').next().unwrap_or(template);
    let name = name.strip_suffix(".in").unwrap_or(name);

    let dir = match &target.configdir {
        Some(dir) => PathBuf::from(dir),
        None => Path::new(template)
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf(),
    };
    session.project_root.join(dir).join(name)
}

/// Generate every target's configfiles.
pub fn generate_configfiles(session: &Session, graph: &ResolvedGraph) -> Result<()> {
    for target in &graph.targets {
        for template in &target.configfiles {
            let template_path = session.project_root.join(template);
            let content = fsutil::read_to_string(&template_path)?;
            let out_path = output_path(session, target, template);
            let display = fsutil::relative_to(&out_path, &session.project_root);

            println!("generating {} ..", display);
            let vars = target_vars(session, target, content.contains("GIT_"));
            fsutil::write_string(&out_path, &substitute(&content, &vars))?;
            println!("{} is generated!", display);
        }
    }
    Ok(())
}
