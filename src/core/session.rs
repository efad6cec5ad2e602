//! The process-wide configuration session.
//!
//! A `Session` owns the store and the loading-phase state machine, and
//! routes every registration call from scripts to the entity the current
//! scope selects. Ownership transitions with phase: loading phases write
//! their entity kinds, detection writes option values and toolchain
//! toolsets, generation only reads.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::core::option::OptionRef;
use crate::core::phase::Phase;
use crate::core::platform;
use crate::core::store::{ConfStore, Namespace, Value, ROOT_SCOPE};
use crate::core::target::TargetKind;
use crate::core::toolchain::{toolset_key, DetectedToolchain};

/// Which declaration block is currently open during script evaluation.
///
/// `Root` means unscoped: setters apply to the root target scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Scope {
    #[default]
    Root,
    Option(String),
    Target(String),
    Toolchain(String),
}

/// Installation directory layout fed from the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct InstallDirs {
    pub prefix: String,
    pub bindir: String,
    pub libdir: String,
    pub includedir: String,
}

impl Default for InstallDirs {
    fn default() -> Self {
        InstallDirs {
            prefix: "/usr/local".to_string(),
            bindir: "bin".to_string(),
            libdir: "lib".to_string(),
            includedir: "include".to_string(),
        }
    }
}

/// The configuration session.
#[derive(Debug, Serialize)]
pub struct Session {
    pub store: ConfStore,
    #[serde(skip)]
    pub phase: Phase,
    #[serde(skip)]
    pub project_root: PathBuf,
    pub plat: String,
    pub arch: String,
    pub mode: String,
    pub buildir: String,
    pub install: InstallDirs,
    pub project: Option<String>,
    pub version: Option<String>,
    pub version_build: Option<String>,
    /// Toolchain forced with `--toolchain`.
    #[serde(skip)]
    pub requested_toolchain: Option<String>,
    pub toolchain: Option<DetectedToolchain>,
    /// Named configuration values from `set_config` and CLI overrides.
    pub configs: BTreeMap<String, String>,
    #[serde(skip)]
    scope: Scope,
}

impl Session {
    pub fn new(project_root: PathBuf) -> Self {
        Session {
            store: ConfStore::new(),
            phase: Phase::LoadOptions,
            project_root,
            plat: platform::host_plat().to_string(),
            arch: platform::host_arch().to_string(),
            mode: "release".to_string(),
            buildir: "build".to_string(),
            install: InstallDirs::default(),
            project: None,
            version: None,
            version_build: None,
            requested_toolchain: None,
            toolchain: None,
            configs: BTreeMap::new(),
            scope: Scope::Root,
        }
    }

    // ------------------------------------------------------------------
    // Scope transitions
    // ------------------------------------------------------------------

    /// Open an option block. The one-line form (non-empty description)
    /// closes the scope immediately.
    pub fn enter_option(
        &mut self,
        name: &str,
        description: Option<&str>,
        default: Option<&str>,
    ) {
        self.scope = Scope::Option(name.to_string());

        if self.phase.options_active() {
            self.store.declare(Namespace::Options, name);
            if let Some(desc) = description {
                self.store
                    .set_scalar(Namespace::Options, name, "description", desc);
            }
            if let Some(default) = default {
                self.store
                    .set_scalar(Namespace::Options, name, "default", default);
            }
        }

        if description.is_some_and(|d| !d.is_empty()) {
            self.scope = Scope::Root;
        }
    }

    pub fn end_option(&mut self) {
        if matches!(self.scope, Scope::Option(_)) {
            self.scope = Scope::Root;
        }
    }

    /// Open a target block.
    pub fn enter_target(&mut self, name: &str) {
        self.scope = Scope::Target(name.to_string());
        if self.phase.targets_active() {
            self.store.declare(Namespace::Targets, name);
        }
    }

    pub fn end_target(&mut self) {
        if matches!(self.scope, Scope::Target(_)) {
            self.scope = Scope::Root;
        }
    }

    /// Open a toolchain block.
    pub fn enter_toolchain(&mut self, name: &str) {
        self.scope = Scope::Toolchain(name.to_string());
        if self.phase.toolchains_active() {
            self.store.declare(Namespace::Toolchains, name);
        }
    }

    pub fn end_toolchain(&mut self) {
        if matches!(self.scope, Scope::Toolchain(_)) {
            self.scope = Scope::Root;
        }
    }

    /// The entity the current scope writes to, honoring phase gating.
    /// `None` means the call is mis-phased and must be ignored.
    fn write_slot(&self) -> Option<(Namespace, String)> {
        match &self.scope {
            Scope::Option(name) if self.phase.options_active() => {
                Some((Namespace::Options, name.clone()))
            }
            Scope::Target(name) if self.phase.targets_active() => {
                Some((Namespace::Targets, name.clone()))
            }
            Scope::Root if self.phase.targets_active() => {
                Some((Namespace::Targets, ROOT_SCOPE.to_string()))
            }
            Scope::Toolchain(name) if self.phase.toolchains_active() => {
                Some((Namespace::Toolchains, name.clone()))
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Setters used by the script API
    // ------------------------------------------------------------------

    /// Set a scalar attribute on the current scope.
    pub fn set_value(&mut self, key: &str, value: &str) {
        if let Some((ns, name)) = self.write_slot() {
            self.store.set_scalar(ns, &name, key, value);
        }
    }

    /// Replace a list attribute on the current scope.
    pub fn set_values(&mut self, key: &str, tokens: &[String]) {
        if let Some((ns, name)) = self.write_slot() {
            self.store.set(ns, &name, key, Value::List(tokens.to_vec()));
        }
    }

    /// Append tokens to a list attribute on the current scope.
    ///
    /// A literal `{public}` token splits visibility: when present, all
    /// non-marker tokens are additionally copied into `<key>_public`.
    pub fn add_values(&mut self, key: &str, tokens: &[String]) {
        let Some((ns, name)) = self.write_slot() else {
            return;
        };

        let has_public = tokens.iter().any(|t| t == "{public}");
        let values: Vec<String> = tokens.iter().filter(|t| *t != "{public}").cloned().collect();
        if values.is_empty() {
            return;
        }

        self.store.extend(ns, &name, key, &values);
        if has_public {
            self.store
                .extend(ns, &name, &format!("{}_public", key), &values);
        }
    }

    /// `set_kind` with validation at the parse boundary.
    pub fn set_kind(&mut self, kind: &str) -> Result<()> {
        TargetKind::parse(kind)?;
        self.set_value("kind", kind);
        Ok(())
    }

    /// `set_toolset(kind, program…)` inside a toolchain block.
    pub fn set_toolset(&mut self, kind: &str, programs: &[String]) {
        if let Scope::Toolchain(name) = &self.scope {
            if self.phase.toolchains_active() {
                let name = name.clone();
                self.store.set(
                    Namespace::Toolchains,
                    &name,
                    &toolset_key(kind),
                    Value::List(programs.to_vec()),
                );
            }
        }
    }

    /// `set_configvar(name, value)` on the current option or target.
    pub fn set_configvar(&mut self, name: &str, value: &str) {
        let Some((ns, entity)) = self.write_slot() else {
            return;
        };
        let registered = self.store.list(ns, &entity, "configvars");
        if !registered.iter().any(|n| n == name) {
            self.store.append(ns, &entity, "configvars", name);
        }
        self.store
            .set_scalar(ns, &entity, &format!("configvar_{}", name), value);
    }

    pub fn set_project(&mut self, name: &str) {
        self.project = Some(name.to_string());
    }

    pub fn set_version(&mut self, version: &str, build_format: Option<&str>) {
        self.version = Some(version.to_string());
        if let Some(fmt) = build_format {
            self.version_build = Some(fmt.to_string());
        }
    }

    // ------------------------------------------------------------------
    // Predicates and configuration values
    // ------------------------------------------------------------------

    pub fn is_plat(&self, names: &[String]) -> bool {
        names.iter().any(|n| *n == self.plat)
    }

    pub fn is_arch(&self, names: &[String]) -> bool {
        names.iter().any(|n| *n == self.arch)
    }

    pub fn is_mode(&self, names: &[String]) -> bool {
        names.iter().any(|n| *n == self.mode)
    }

    pub fn is_host(&self, names: &[String]) -> bool {
        names
            .iter()
            .any(|n| *n == platform::host_plat() || *n == std::env::consts::OS)
    }

    pub fn is_toolchain(&self, names: &[String]) -> bool {
        let current = self
            .toolchain
            .as_ref()
            .map(|tc| tc.name.as_str())
            .or(self.requested_toolchain.as_deref());
        match current {
            Some(current) => names.iter().any(|n| *n == current),
            None => false,
        }
    }

    /// A configuration value by name: explicit configs first, then the
    /// built-in knobs, then resolved option values.
    pub fn config_value(&self, name: &str) -> Option<String> {
        if let Some(v) = self.configs.get(name) {
            return Some(v.clone());
        }
        match name {
            "plat" => return Some(self.plat.clone()),
            "arch" => return Some(self.arch.clone()),
            "mode" => return Some(self.mode.clone()),
            "buildir" => return Some(self.buildir.clone()),
            _ => {}
        }
        OptionRef::new(&self.store, name)
            .value()
            .map(str::to_string)
    }

    pub fn is_config(&self, name: &str, value: &str) -> bool {
        self.config_value(name).as_deref() == Some(value)
    }

    /// True when a config is set or the named option resolved enabled.
    pub fn has_config(&self, names: &[String]) -> bool {
        names.iter().any(|name| {
            self.configs.contains_key(name) || OptionRef::new(&self.store, name).enabled()
        })
    }

    pub fn set_config(&mut self, name: &str, value: &str) {
        self.configs.insert(name.to_string(), value.to_string());
    }

    // ------------------------------------------------------------------
    // CLI integration
    // ------------------------------------------------------------------

    /// Apply `--<option>=<value>` overrides collected by the CLI.
    ///
    /// Unknown names are fatal. Boolean spellings are normalized so that
    /// probing and `has_config` agree with script-resolved values.
    pub fn apply_option_overrides(&mut self, overrides: &[(String, String)]) -> Result<()> {
        for (name, raw) in overrides {
            if !self.store.exists(Namespace::Options, name) {
                bail!("unknown option: --{}={}", name, raw);
            }
            let value = normalize_bool(raw);
            self.store
                .set_scalar(Namespace::Options, name, "value", &value);
            self.configs.insert(name.clone(), value);
        }
        Ok(())
    }
}

fn normalize_bool(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => "true".to_string(),
        "n" | "no" | "false" => "false".to_string(),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(PathBuf::from("."))
    }

    #[test]
    fn test_public_marker_splits_visibility() {
        let mut s = session();
        s.phase = Phase::LoadTargets;
        s.enter_target("lib");
        s.add_values(
            "defines",
            &[
                "A".to_string(),
                "B".to_string(),
                "{public}".to_string(),
                "C".to_string(),
            ],
        );
        s.end_target();

        assert_eq!(
            s.store.list(Namespace::Targets, "lib", "defines"),
            vec!["A", "B", "C"]
        );
        assert_eq!(
            s.store.list(Namespace::Targets, "lib", "defines_public"),
            vec!["A", "B", "C"]
        );
    }

    #[test]
    fn test_no_marker_keeps_public_empty() {
        let mut s = session();
        s.phase = Phase::LoadTargets;
        s.enter_target("lib");
        s.add_values("defines", &["A".to_string(), "B".to_string()]);

        assert!(s
            .store
            .list(Namespace::Targets, "lib", "defines_public")
            .is_empty());
    }

    #[test]
    fn test_misphased_calls_are_ignored() {
        let mut s = session();
        // Targets phase: option registration must be a no-op.
        s.phase = Phase::LoadTargets;
        s.enter_option("opt", None, None);
        s.add_values("cfuncs", &["pthread_create".to_string()]);
        s.end_option();
        assert!(!s.store.exists(Namespace::Options, "opt"));

        // Options phase: target registration must be a no-op.
        s.phase = Phase::LoadOptions;
        s.enter_target("app");
        s.add_values("files", &["main.c".to_string()]);
        s.end_target();
        assert!(!s.store.exists(Namespace::Targets, "app"));
    }

    #[test]
    fn test_option_scope_routes_inside_target_phase() {
        let mut s = session();
        s.phase = Phase::LoadTargets;
        // An option block evaluated during the targets pass must not leak
        // its setters into the root target scope.
        s.enter_option("opt", None, None);
        s.add_values("defines", &["OPT_ONLY".to_string()]);
        s.end_option();

        assert!(s
            .store
            .list(Namespace::Targets, ROOT_SCOPE, "defines")
            .is_empty());
    }

    #[test]
    fn test_one_line_option_auto_closes() {
        let mut s = session();
        s.enter_option("fast", Some("enable fast mode"), Some("true"));
        // Scope closed: subsequent root-level adds go to the root target.
        s.phase = Phase::LoadTargets;
        s.add_values("defines", &["ROOT".to_string()]);

        assert_eq!(
            s.store.list(Namespace::Targets, ROOT_SCOPE, "defines"),
            vec!["ROOT"]
        );
    }

    #[test]
    fn test_set_kind_validates() {
        let mut s = session();
        s.phase = Phase::LoadTargets;
        s.enter_target("app");
        assert!(s.set_kind("binary").is_ok());
        assert!(s.set_kind("bundle").is_err());
    }

    #[test]
    fn test_unknown_cli_option_is_fatal() {
        let mut s = session();
        let err = s
            .apply_option_overrides(&[("nope".to_string(), "y".to_string())])
            .unwrap_err();
        assert!(err.to_string().contains("unknown option"));
    }

    #[test]
    fn test_cli_override_normalizes_and_registers_config() {
        let mut s = session();
        s.phase = Phase::LoadOptions;
        s.enter_option("pthread", None, None);
        s.end_option();

        s.apply_option_overrides(&[("pthread".to_string(), "y".to_string())])
            .unwrap();

        assert_eq!(
            s.store.scalar(Namespace::Options, "pthread", "value"),
            Some("true")
        );
        assert!(s.has_config(&["pthread".to_string()]));
        assert!(!OptionRef::new(&s.store, "pthread").needs_probe());
    }

    #[test]
    fn test_config_value_builtins() {
        let s = session();
        assert_eq!(s.config_value("mode").as_deref(), Some("release"));
        assert_eq!(s.config_value("buildir").as_deref(), Some("build"));
        assert_eq!(s.config_value("missing"), None);
    }
}
