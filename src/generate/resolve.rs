//! Target graph resolution.
//!
//! Computes, for every declared target: output paths, glob-expanded
//! sources with their object files, transitive library dependencies in
//! reverse-dedup order, public-attribute inheritance, and the serialized
//! per-toolkind flag strings the Makefile emitter writes out.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use anyhow::{bail, Context, Result};

use crate::configure::flags::{self, Itemname, ToolKind, ToolName};
use crate::core::option::OptionRef;
use crate::core::session::Session;
use crate::core::store::{dedup_first, Namespace, ROOT_SCOPE};
use crate::core::target::{object_extension, SourceKind, TargetKind};
use crate::util::fs as fsutil;

/// Attributes with a `_public` variant that propagates to dependents.
const PUBLIC_ATTRS: &[&str] = &[
    "defines",
    "udefines",
    "includedirs",
    "linkdirs",
    "links",
    "syslinks",
    "frameworks",
];

/// Option attributes applied to targets referencing the option.
const OPTION_FLAG_ATTRS: &[&str] = &[
    "defines",
    "udefines",
    "includedirs",
    "linkdirs",
    "links",
    "syslinks",
    "frameworks",
    "frameworkdirs",
    "languages",
    "warnings",
    "optimizes",
    "cflags",
    "cxxflags",
    "cxflags",
    "ldflags",
];

/// A source file with its inferred kind and object path.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub kind: SourceKind,
    pub object: String,
}

/// One `headerfiles`/`installfiles` entry, decoded from its
/// `src:rootdir:prefixdir:filename` token.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallEntry {
    pub src: String,
    pub rootdir: String,
    pub prefixdir: String,
    pub filename: String,
}

impl InstallEntry {
    pub fn parse(token: &str) -> InstallEntry {
        let mut parts = token.splitn(4, ':');
        InstallEntry {
            src: parts.next().unwrap_or_default().to_string(),
            rootdir: parts.next().unwrap_or_default().to_string(),
            prefixdir: parts.next().unwrap_or_default().to_string(),
            filename: parts.next().unwrap_or_default().to_string(),
        }
    }

    /// The installed path relative to the destination base directory.
    ///
    /// With a `rootdir`, the subpath of `src` under it is preserved;
    /// otherwise the file lands at the base. An explicit `filename`
    /// overrides the trailing name.
    pub fn dest_subpath(&self) -> String {
        let name = if self.filename.is_empty() {
            self.src.rsplit('/').next().unwrap_or(&self.src)
        } else {
            &self.filename
        };

        if self.rootdir.is_empty() {
            return name.to_string();
        }

        let rel = self
            .src
            .strip_prefix(self.rootdir.trim_end_matches('/'))
            .map(|r| r.trim_start_matches('/'))
            .unwrap_or(&self.src);
        match rel.rsplit_once('/') {
            Some((dir, _)) => format!("{}/{}", dir, name),
            None => name.to_string(),
        }
    }
}

/// A fully resolved target, immutable during emission.
#[derive(Debug)]
pub struct ResolvedTarget {
    pub name: String,
    pub kind: TargetKind,
    pub targetdir: String,
    pub objectdir: String,
    pub targetfile: String,
    pub sources: Vec<SourceFile>,
    pub is_default: bool,
    pub libdeps: Vec<String>,
    /// Serialized flag string per toolkind this target uses.
    pub flags: BTreeMap<ToolKind, String>,
    pub link_kind: ToolKind,
    pub installdir: Option<String>,
    pub headerfiles: Vec<InstallEntry>,
    pub installfiles: Vec<InstallEntry>,
    pub configfiles: Vec<String>,
    pub configdir: Option<String>,
    /// Configuration variables visible to this target's configfiles.
    pub configvars: BTreeMap<String, String>,
}

/// The resolved target graph.
#[derive(Debug)]
pub struct ResolvedGraph {
    pub targets: Vec<ResolvedTarget>,
    /// Every toolkind any target uses, driving toolchain variable emission.
    pub toolkinds: BTreeSet<ToolKind>,
}

impl ResolvedGraph {
    pub fn target(&self, name: &str) -> Option<&ResolvedTarget> {
        self.targets.iter().find(|t| t.name == name)
    }
}

struct Resolver<'a> {
    session: &'a Session,
    kinds: HashMap<String, TargetKind>,
    targetdirs: HashMap<String, String>,
    basenames: HashMap<String, String>,
    deps: HashMap<String, Vec<String>>,
    libdeps: HashMap<String, Vec<String>>,
}

/// Resolve the whole target graph.
pub fn resolve_graph(session: &Session) -> Result<ResolvedGraph> {
    let names: Vec<String> = session
        .store
        .names(Namespace::Targets)
        .iter()
        .filter(|n| *n != ROOT_SCOPE)
        .cloned()
        .collect();

    let mut resolver = Resolver {
        session,
        kinds: HashMap::new(),
        targetdirs: HashMap::new(),
        basenames: HashMap::new(),
        deps: HashMap::new(),
        libdeps: HashMap::new(),
    };

    // First pass: kinds, paths, and the dependency relation.
    for name in &names {
        let kind = session
            .store
            .scalar(Namespace::Targets, name, "kind")
            .with_context(|| format!("target {}: kind is not set", name))?;
        let kind = TargetKind::parse(kind)?;
        resolver.kinds.insert(name.clone(), kind);

        let deps = session.store.list(Namespace::Targets, name, "deps");
        for dep in &deps {
            if !session.store.exists(Namespace::Targets, dep) {
                bail!("target {}: unknown dependency {}", name, dep);
            }
        }
        resolver.deps.insert(name.clone(), deps);

        resolver
            .targetdirs
            .insert(name.clone(), resolver.default_targetdir(name));
        resolver.basenames.insert(
            name.clone(),
            session
                .store
                .scalar(Namespace::Targets, name, "basename")
                .unwrap_or(name)
                .to_string(),
        );
    }

    // Second pass: transitive library deps, memoized.
    for name in &names {
        let mut visiting = HashSet::new();
        resolver.lib_deps(name, &mut visiting);
    }

    // Third pass: full resolution.
    let mut targets = Vec::new();
    let mut toolkinds = BTreeSet::new();
    for name in &names {
        let target = resolver.resolve_target(name)?;
        toolkinds.extend(target.flags.keys().copied());
        targets.push(target);
    }

    Ok(ResolvedGraph { targets, toolkinds })
}

impl<'a> Resolver<'a> {
    fn scalar(&self, name: &str, key: &str) -> Option<&str> {
        self.session.store.scalar(Namespace::Targets, name, key)
    }

    fn list(&self, name: &str, key: &str) -> Vec<String> {
        self.session.store.list(Namespace::Targets, name, key)
    }

    fn default_targetdir(&self, name: &str) -> String {
        match self.scalar(name, "targetdir") {
            Some(dir) => dir.to_string(),
            None => format!(
                "{}/{}/{}/{}",
                self.session.buildir, self.session.plat, self.session.arch, self.session.mode
            ),
        }
    }

    fn default_objectdir(&self, name: &str) -> String {
        match self.scalar(name, "objectdir") {
            Some(dir) => dir.to_string(),
            None => format!(
                "{}/.objs/{}/{}/{}/{}",
                self.session.buildir, name, self.session.plat, self.session.arch, self.session.mode
            ),
        }
    }

    /// Transitive static/shared deps in reverse-dedup order: the
    /// occurrence nearest the root survives. The visited set makes
    /// dependency cycles terminate instead of recursing forever, and a
    /// node inside a cycle is dropped from its own closure so no target
    /// ever depends on itself.
    fn lib_deps(&mut self, name: &str, visiting: &mut HashSet<String>) -> Vec<String> {
        if let Some(cached) = self.libdeps.get(name) {
            return cached.clone();
        }
        if !visiting.insert(name.to_string()) {
            return Vec::new();
        }

        let mut collected = Vec::new();
        for dep in self.deps.get(name).cloned().unwrap_or_default() {
            if self
                .kinds
                .get(&dep)
                .is_some_and(|kind| kind.is_linkable())
            {
                collected.push(dep.clone());
            }
            collected.extend(self.lib_deps(&dep, visiting));
        }
        visiting.remove(name);

        collected.retain(|dep| dep != name);
        let collected = dedup_first(collected);
        self.libdeps.insert(name.to_string(), collected.clone());
        collected
    }

    /// Option names whose resolved value enables them for this target.
    fn enabled_options(&self, name: &str) -> Vec<String> {
        self.list(name, "options")
            .into_iter()
            .filter(|opt| OptionRef::new(&self.session.store, opt).enabled())
            .collect()
    }

    /// Effective values for an attribute: the target's own list, the lists
    /// of its enabled options, then each library dep's public list.
    fn effective(&self, name: &str, attr: &str) -> Vec<String> {
        let mut values = self.list(name, attr);

        if OPTION_FLAG_ATTRS.contains(&attr) {
            for opt in self.enabled_options(name) {
                values.extend(self.session.store.list(Namespace::Options, &opt, attr));
            }
        }

        if PUBLIC_ATTRS.contains(&attr) {
            let public_key = format!("{}_public", attr);
            for dep in self.libdeps.get(name).cloned().unwrap_or_default() {
                values.extend(self.session.store.list(Namespace::Targets, &dep, &public_key));
            }
        }

        dedup_first(values)
    }

    fn tool_for(&self, kind: ToolKind) -> Result<(String, ToolName)> {
        let toolchain = self
            .session
            .toolchain
            .as_ref()
            .context("toolchain not detected")?;
        let program = toolchain
            .tool(kind.as_str())
            .with_context(|| format!("toolchain has no {} tool", kind.as_str()))?;
        let tool = ToolName::from_program(program)?;
        Ok((program.to_string(), tool))
    }

    fn compile_flags(&self, name: &str, kind: ToolKind) -> Result<String> {
        let (_, tool) = self.tool_for(kind)?;
        let plat = &self.session.plat;
        let mut parts: Vec<String> = Vec::new();

        for item in [
            Itemname::Languages,
            Itemname::Symbols,
            Itemname::Warnings,
            Itemname::Optimizes,
            Itemname::Defines,
            Itemname::Udefines,
            Itemname::Includedirs,
            Itemname::Frameworkdirs,
        ] {
            let values = self.effective(name, item.attr());
            let translated = flags::translate_all(kind, tool, item, &values, plat)?;
            if !translated.is_empty() {
                parts.push(translated);
            }
        }

        if self.kinds.get(name) == Some(&TargetKind::Shared) {
            parts.push("-fPIC".to_string());
        }

        let raw_attrs: &[&str] = match kind {
            ToolKind::Cc => &["cxflags", "cflags"],
            ToolKind::Cxx => &["cxflags", "cxxflags"],
            ToolKind::Mm => &["mxflags", "mflags"],
            ToolKind::Mxx => &["mxflags", "mxxflags"],
            ToolKind::As => &["asflags"],
            _ => &[],
        };
        for attr in raw_attrs {
            let raw = self.effective(name, attr);
            if !raw.is_empty() {
                parts.push(raw.join(" "));
            }
        }

        Ok(parts.join(" "))
    }

    fn link_flags(&self, name: &str, kind: ToolKind) -> Result<String> {
        if kind == ToolKind::Ar {
            return Ok(self.list(name, "arflags").join(" "));
        }

        let (_, tool) = self.tool_for(kind)?;
        let plat = &self.session.plat;
        let libdeps = self.libdeps.get(name).cloned().unwrap_or_default();
        let mut parts: Vec<String> = Vec::new();

        if kind == ToolKind::Sh {
            parts.push("-shared -fPIC".to_string());
        }

        // Library search paths: dep output dirs first, then declared dirs.
        let mut linkdirs: Vec<String> = libdeps
            .iter()
            .filter_map(|dep| self.targetdirs.get(dep).cloned())
            .collect();
        linkdirs.extend(self.effective(name, "linkdirs"));
        let translated =
            flags::translate_all(kind, tool, Itemname::Linkdirs, &dedup_first(linkdirs), plat)?;
        if !translated.is_empty() {
            parts.push(translated);
        }

        // Libraries: dependency outputs, then declared and inherited links.
        let mut links: Vec<String> = libdeps
            .iter()
            .filter_map(|dep| self.basenames.get(dep).cloned())
            .collect();
        links.extend(self.effective(name, "links"));
        let translated =
            flags::translate_all(kind, tool, Itemname::Links, &dedup_first(links), plat)?;
        if !translated.is_empty() {
            parts.push(translated);
        }

        for item in [Itemname::Syslinks, Itemname::Frameworks, Itemname::Frameworkdirs] {
            let values = self.effective(name, item.attr());
            let translated = flags::translate_all(kind, tool, item, &values, plat)?;
            if !translated.is_empty() {
                parts.push(translated);
            }
        }

        // Shared deps need a loader-relative rpath at run time.
        let mut rpathdirs = self.list(name, "rpathdirs");
        let targetdir = self.targetdirs.get(name).cloned().unwrap_or_default();
        for dep in &libdeps {
            if self.kinds.get(dep) == Some(&TargetKind::Shared) {
                let depdir = self.targetdirs.get(dep).cloned().unwrap_or_default();
                rpathdirs.push(format!("@loader_path/{}", relative_dir(&targetdir, &depdir)));
            }
        }
        let translated = flags::translate_all(
            kind,
            tool,
            Itemname::Rpathdirs,
            &dedup_first(rpathdirs),
            plat,
        )?;
        if !translated.is_empty() {
            parts.push(translated);
        }

        for item in [Itemname::Strip, Itemname::Symbols] {
            let values = self.list(name, item.attr());
            let translated = flags::translate_all(kind, tool, item, &values, plat)?;
            if !translated.is_empty() {
                parts.push(translated);
            }
        }

        let raw_attr = if kind == ToolKind::Sh { "shflags" } else { "ldflags" };
        let raw = self.effective(name, raw_attr);
        if !raw.is_empty() {
            parts.push(raw.join(" "));
        }

        Ok(parts.join(" "))
    }

    /// Configuration variables for this target's configfiles: the target's
    /// own configvars plus those of every enabled option.
    fn configvars(&self, name: &str) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();

        let mut collect = |ns: Namespace, entity: &str| {
            for var in self.session.store.list(ns, entity, "configvars") {
                let value = self
                    .session
                    .store
                    .scalar(ns, entity, &format!("configvar_{}", var))
                    .unwrap_or("")
                    .to_string();
                vars.insert(var, value);
            }
        };

        for opt in self.enabled_options(name) {
            collect(Namespace::Options, &opt);
        }
        collect(Namespace::Targets, name);
        vars
    }

    fn resolve_target(&self, name: &str) -> Result<ResolvedTarget> {
        let kind = self.kinds[name];
        let targetdir = self.targetdirs[name].clone();
        let objectdir = self.default_objectdir(name);

        let filename = match self.scalar(name, "filename") {
            Some(filename) => filename.to_string(),
            None => {
                let prefix = self
                    .scalar(name, "prefixname")
                    .unwrap_or_else(|| kind.prefix());
                let extension = self
                    .scalar(name, "extension")
                    .unwrap_or_else(|| kind.extension(&self.session.plat));
                format!("{}{}{}", prefix, self.basenames[name], extension)
            }
        };
        let targetfile = fsutil::join_str(&targetdir, &filename);

        let patterns = self.list(name, "files");
        let files = fsutil::glob_files(&self.session.project_root, &patterns)?;
        let obj_ext = object_extension(&self.session.plat);
        let mut sources = Vec::new();
        for path in files {
            let source_kind = SourceKind::from_path(&path)
                .with_context(|| format!("target {}: {}", name, path))?;
            let object = format!("{}/{}{}", objectdir, path, obj_ext);
            sources.push(SourceFile {
                path,
                kind: source_kind,
                object,
            });
        }

        let mut flag_map = BTreeMap::new();
        let source_kinds: BTreeSet<ToolKind> = sources
            .iter()
            .map(|s| ToolKind::from_source(s.kind))
            .collect();
        for source_kind in source_kinds {
            flag_map.insert(source_kind, self.compile_flags(name, source_kind)?);
        }

        let link_kind = match kind {
            TargetKind::Binary => ToolKind::Ld,
            TargetKind::Shared => ToolKind::Sh,
            TargetKind::Static => ToolKind::Ar,
        };
        flag_map.insert(link_kind, self.link_flags(name, link_kind)?);

        let headerfiles = self.expand_install_entries(name, "headerfiles")?;
        let installfiles = self.expand_install_entries(name, "installfiles")?;

        Ok(ResolvedTarget {
            name: name.to_string(),
            kind,
            targetdir,
            objectdir,
            targetfile,
            sources,
            is_default: self.scalar(name, "default") != Some("false"),
            libdeps: self.libdeps.get(name).cloned().unwrap_or_default(),
            flags: flag_map,
            link_kind,
            installdir: self.scalar(name, "installdir").map(str::to_string),
            headerfiles,
            installfiles,
            configfiles: self.list(name, "configfiles"),
            configdir: self.scalar(name, "configdir").map(str::to_string),
            configvars: self.configvars(name),
        })
    }

    /// Decode and glob-expand `headerfiles`/`installfiles` tokens.
    fn expand_install_entries(&self, name: &str, attr: &str) -> Result<Vec<InstallEntry>> {
        let mut entries = Vec::new();
        for token in self.list(name, attr) {
            let entry = InstallEntry::parse(&token);
            let expanded = fsutil::glob_files(
                &self.session.project_root,
                std::slice::from_ref(&entry.src),
            )?;
            for src in expanded {
                entries.push(InstallEntry {
                    src,
                    rootdir: entry.rootdir.clone(),
                    prefixdir: entry.prefixdir.clone(),
                    filename: entry.filename.clone(),
                });
            }
        }
        Ok(entries)
    }
}

/// Relative path from one directory to another, `/`-separated, `.` when
/// they are equal.
fn relative_dir(from: &str, to: &str) -> String {
    let from_parts: Vec<&str> = from.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    let to_parts: Vec<&str> = to.split('/').filter(|p| !p.is_empty() && *p != ".").collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from_parts.len() {
        parts.push("..".to_string());
    }
    for part in &to_parts[common..] {
        parts.push(part.to_string());
    }

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
