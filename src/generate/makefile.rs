//! Makefile emission.
//!
//! Linearizes the resolved target graph into a self-contained Makefile:
//! toolchain variables, per-target flag variables, link/archive rules with
//! their per-object compile rules, and the run/clean/install phonies. The
//! output file is opened once at header emission and appended for the
//! remainder of the run.

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};

use crate::configure::flags::ToolKind;
use crate::core::session::Session;
use crate::core::target::TargetKind;
use crate::generate::resolve::{InstallEntry, ResolvedGraph, ResolvedTarget};
use crate::util::fs as fsutil;

/// Write the Makefile at the project root.
pub fn emit_makefile(session: &Session, graph: &ResolvedGraph) -> Result<()> {
    println!("generating makefile ..");

    let path = session.project_root.join("Makefile");
    let file = File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let mut emitter = Emitter {
        out: BufWriter::new(file),
        session,
        graph,
    };
    emitter.emit()?;

    println!("makefile is generated!");
    Ok(())
}

struct Emitter<'a> {
    out: BufWriter<File>,
    session: &'a Session,
    graph: &'a ResolvedGraph,
}

impl<'a> Emitter<'a> {
    fn emit(&mut self) -> Result<()> {
        let graph = self.graph;

        self.emit_header()?;
        self.emit_verbosity()?;
        self.emit_toolchain_vars()?;
        self.emit_flag_vars()?;
        self.emit_phony()?;
        for target in &graph.targets {
            self.emit_target_rules(target)?;
        }
        self.emit_run()?;
        self.emit_clean()?;
        self.emit_install()?;

        self.out.flush()?;
        Ok(())
    }

    fn emit_header(&mut self) -> Result<()> {
        writeln!(self.out, "# An auto-generated makefile by slipway")?;
        writeln!(
            self.out,
            "# Edits will be overwritten the next time configuration runs."
        )?;
        writeln!(self.out)?;
        Ok(())
    }

    fn emit_verbosity(&mut self) -> Result<()> {
        writeln!(self.out, "ifneq ($(VERBOSE),1)")?;
        writeln!(self.out, "V=@")?;
        writeln!(self.out, "endif")?;
        writeln!(self.out)?;
        Ok(())
    }

    fn emit_toolchain_vars(&mut self) -> Result<()> {
        let toolchain = self
            .session
            .toolchain
            .as_ref()
            .context("toolchain not detected")?;

        for kind in &self.graph.toolkinds {
            let program = toolchain
                .tool(kind.as_str())
                .with_context(|| format!("toolchain has no {} tool", kind.as_str()))?;
            writeln!(self.out, "{}={}", kind.make_var(), program)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn emit_flag_vars(&mut self) -> Result<()> {
        for target in &self.graph.targets {
            for (kind, flags) in &target.flags {
                writeln!(self.out, "{}_{}={}", target.name, kind.flag_attr(), flags)?;
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn emit_phony(&mut self) -> Result<()> {
        let defaults: Vec<&str> = self
            .graph
            .targets
            .iter()
            .filter(|t| t.is_default)
            .map(|t| t.name.as_str())
            .collect();
        let all: Vec<&str> = self.graph.targets.iter().map(|t| t.name.as_str()).collect();

        writeln!(self.out, "default: {}", defaults.join(" "))?;
        writeln!(self.out, "all: {}", all.join(" "))?;
        writeln!(
            self.out,
            ".PHONY: default all run clean install {}",
            all.join(" ")
        )?;
        writeln!(self.out)?;
        Ok(())
    }

    fn emit_target_rules(&mut self, target: &ResolvedTarget) -> Result<()> {
        // Alias from the target name to its output file.
        writeln!(self.out, "{}: {}", target.name, target.targetfile)?;
        writeln!(self.out)?;

        let mut prerequisites: Vec<String> = target
            .libdeps
            .iter()
            .filter_map(|dep| self.graph.target(dep).map(|d| d.targetfile.clone()))
            .collect();
        prerequisites.extend(target.sources.iter().map(|s| s.object.clone()));

        writeln!(
            self.out,
            "{}: {}",
            target.targetfile,
            prerequisites.join(" ")
        )?;

        let objects: Vec<&str> = target.sources.iter().map(|s| s.object.as_str()).collect();
        let objects = objects.join(" ");

        match target.kind {
            TargetKind::Static => {
                writeln!(self.out, "\t@echo archiving {}", target.name)?;
                writeln!(self.out, "\t@mkdir -p {}", target.targetdir)?;
                writeln!(
                    self.out,
                    "\t$(V)$(AR) -cr {} {} $({}_arflags)",
                    target.targetfile, objects, target.name
                )?;
            }
            TargetKind::Binary | TargetKind::Shared => {
                writeln!(self.out, "\t@echo linking {}", target.name)?;
                writeln!(self.out, "\t@mkdir -p {}", target.targetdir)?;
                writeln!(
                    self.out,
                    "\t$(V)$({}) -o {} {} $({}_{})",
                    target.link_kind.make_var(),
                    target.targetfile,
                    objects,
                    target.name,
                    target.link_kind.flag_attr()
                )?;
            }
        }
        writeln!(self.out)?;

        for source in &target.sources {
            let kind = ToolKind::from_source(source.kind);
            let objdir = source
                .object
                .rsplit_once('/')
                .map(|(dir, _)| dir)
                .unwrap_or(".");

            writeln!(self.out, "{}: {}", source.object, source.path)?;
            writeln!(self.out, "\t@echo compiling {}", source.path)?;
            writeln!(self.out, "\t@mkdir -p {}", objdir)?;
            writeln!(
                self.out,
                "\t$(V)$({}) -c $({}_{}) -o {} {}",
                kind.make_var(),
                target.name,
                kind.flag_attr(),
                source.object,
                source.path
            )?;
            writeln!(self.out)?;
        }
        Ok(())
    }

    /// Default binary targets, the ones `run` builds and executes.
    fn run_targets(&self) -> Vec<&'a ResolvedTarget> {
        self.graph
            .targets
            .iter()
            .filter(|t| t.is_default && t.kind == TargetKind::Binary)
            .collect()
    }

    fn emit_run(&mut self) -> Result<()> {
        let runnable = self.run_targets();
        let names: Vec<&str> = runnable.iter().map(|t| t.name.as_str()).collect();

        writeln!(self.out, "run: {}", names.join(" "))?;
        for target in runnable {
            writeln!(self.out, "\t@echo running {} ..", target.name)?;
            writeln!(self.out, "\t$(V)./{}", target.targetfile)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn emit_clean(&mut self) -> Result<()> {
        let defaults: Vec<&str> = self
            .graph
            .targets
            .iter()
            .filter(|t| t.is_default)
            .map(|t| t.name.as_str())
            .collect();

        writeln!(self.out, "clean: {}", defaults.join(" "))?;
        for target in self.graph.targets.iter().filter(|t| t.is_default) {
            writeln!(self.out, "\t@echo cleaning {} ..", target.name)?;
            writeln!(self.out, "\t$(V)rm -f {}", target.targetfile)?;
            for source in &target.sources {
                writeln!(self.out, "\t$(V)rm -f {}", source.object)?;
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    /// Destination directory for a named layout dir, honoring absolute
    /// overrides from the CLI.
    fn install_subdir(base: &str, dir: &str) -> String {
        if dir.starts_with('/') {
            dir.to_string()
        } else {
            fsutil::join_str(base, dir)
        }
    }

    fn emit_install_entries(
        &mut self,
        base: &str,
        entries: &[InstallEntry],
    ) -> Result<()> {
        for entry in entries {
            let dest_base = if entry.prefixdir.is_empty() {
                base.to_string()
            } else {
                fsutil::join_str(base, &entry.prefixdir)
            };
            let dest = fsutil::join_str(&dest_base, &entry.dest_subpath());
            let dest_dir = dest.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(".");
            writeln!(self.out, "\t$(V)mkdir -p {}", dest_dir)?;
            writeln!(self.out, "\t$(V)cp {} {}", entry.src, dest)?;
        }
        Ok(())
    }

    fn emit_install(&mut self) -> Result<()> {
        let graph = self.graph;
        writeln!(self.out, "install: all")?;

        for target in &graph.targets {
            let base = target
                .installdir
                .clone()
                .unwrap_or_else(|| self.session.install.prefix.clone());

            writeln!(self.out, "\t@echo installing {} ..", target.name)?;

            let artifact_dir = match target.kind {
                TargetKind::Binary => Self::install_subdir(&base, &self.session.install.bindir),
                TargetKind::Static | TargetKind::Shared => {
                    Self::install_subdir(&base, &self.session.install.libdir)
                }
            };
            let filename = target
                .targetfile
                .rsplit('/')
                .next()
                .unwrap_or(&target.targetfile);
            writeln!(self.out, "\t$(V)mkdir -p {}", artifact_dir)?;
            writeln!(
                self.out,
                "\t$(V)cp {} {}",
                target.targetfile,
                fsutil::join_str(&artifact_dir, filename)
            )?;

            let include_base = Self::install_subdir(&base, &self.session.install.includedir);
            self.emit_install_entries(&include_base, &target.headerfiles)?;
            self.emit_install_entries(&base, &target.installfiles)?;
        }
        writeln!(self.out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::phase::Phase;
    use crate::core::toolchain::{DetectedToolchain, TOOLSET_KINDS};
    use crate::generate::resolve::resolve_graph;
    use std::path::Path;
    use tempfile::TempDir;

    fn gcc_toolchain() -> DetectedToolchain {
        let mut tc = DetectedToolchain::new("gcc");
        for (kind, program) in TOOLSET_KINDS.iter().zip([
            "gcc", "g++", "gcc", "gcc", "g++", "g++", "g++", "ar",
        ]) {
            tc.set_tool(kind, program);
        }
        tc
    }

    fn configure(root: &Path, script: impl FnOnce(&mut Session)) -> String {
        let mut session = Session::new(root.to_path_buf());
        session.plat = "linux".to_string();
        session.arch = "x86_64".to_string();
        session.phase = Phase::LoadTargets;
        script(&mut session);
        session.toolchain = Some(gcc_toolchain());

        let graph = resolve_graph(&session).unwrap();
        emit_makefile(&session, &graph).unwrap();
        std::fs::read_to_string(root.join("Makefile")).unwrap()
    }

    #[test]
    fn test_minimal_binary_rules() {
        let tmp = TempDir::new().unwrap();
        let makefile = configure(tmp.path(), |s| {
            s.enter_target("hello");
            s.set_kind("binary").unwrap();
            s.add_values("files", &["main.c".to_string()]);
            s.end_target();
        });

        assert!(makefile.contains("hello: build/linux/x86_64/release/hello\n"));
        assert!(makefile.contains(
            "build/linux/x86_64/release/hello: build/.objs/hello/linux/x86_64/release/main.c.o\n"
        ));
        assert!(makefile.contains(
            "$(V)$(CC) -c $(hello_cflags) -o build/.objs/hello/linux/x86_64/release/main.c.o main.c\n"
        ));
        assert!(makefile
            .contains("$(V)$(LD) -o build/linux/x86_64/release/hello build/.objs/hello/linux/x86_64/release/main.c.o $(hello_ldflags)\n"));
        assert!(makefile.contains("CC=gcc\n"));
        assert!(makefile.contains("LD=g++\n"));
    }

    #[test]
    fn test_verbosity_switch() {
        let tmp = TempDir::new().unwrap();
        let makefile = configure(tmp.path(), |s| {
            s.enter_target("hello");
            s.set_kind("binary").unwrap();
            s.add_values("files", &["main.c".to_string()]);
            s.end_target();
        });

        assert!(makefile.contains("ifneq ($(VERBOSE),1)\nV=@\nendif\n"));
    }

    #[test]
    fn test_default_and_all_lists() {
        let tmp = TempDir::new().unwrap();
        let makefile = configure(tmp.path(), |s| {
            s.enter_target("app");
            s.set_kind("binary").unwrap();
            s.add_values("files", &["main.c".to_string()]);
            s.end_target();

            s.enter_target("extra");
            s.set_kind("binary").unwrap();
            s.set_value("default", "false");
            s.add_values("files", &["extra.c".to_string()]);
            s.end_target();
        });

        assert!(makefile.contains("default: app\n"));
        assert!(makefile.contains("all: app extra\n"));
        assert!(makefile.contains(".PHONY: default all run clean install app extra\n"));
    }

    #[test]
    fn test_static_archive_rule() {
        let tmp = TempDir::new().unwrap();
        let makefile = configure(tmp.path(), |s| {
            s.enter_target("util");
            s.set_kind("static").unwrap();
            s.add_values("files", &["util.c".to_string()]);
            s.end_target();
        });

        assert!(makefile.contains("AR=ar\n"));
        assert!(makefile.contains(
            "$(V)$(AR) -cr build/linux/x86_64/release/libutil.a build/.objs/util/linux/x86_64/release/util.c.o $(util_arflags)\n"
        ));
    }

    #[test]
    fn test_dep_targetfile_is_prerequisite() {
        let tmp = TempDir::new().unwrap();
        let makefile = configure(tmp.path(), |s| {
            s.enter_target("foo");
            s.set_kind("shared").unwrap();
            s.add_values("files", &["foo.c".to_string()]);
            s.end_target();

            s.enter_target("app");
            s.set_kind("binary").unwrap();
            s.add_values("deps", &["foo".to_string()]);
            s.add_values("files", &["main.c".to_string()]);
            s.end_target();
        });

        assert!(makefile.contains(
            "build/linux/x86_64/release/app: build/linux/x86_64/release/libfoo.so build/.objs/app/linux/x86_64/release/main.c.o\n"
        ));
        assert!(makefile.contains("SH=g++\n"));
    }

    #[test]
    fn test_run_clean_install_sections() {
        let tmp = TempDir::new().unwrap();
        let makefile = configure(tmp.path(), |s| {
            s.enter_target("hello");
            s.set_kind("binary").unwrap();
            s.add_values("files", &["main.c".to_string()]);
            s.end_target();
        });

        assert!(makefile.contains("run: hello\n"));
        assert!(makefile.contains("$(V)./build/linux/x86_64/release/hello\n"));
        assert!(makefile.contains("clean: hello\n"));
        assert!(makefile.contains("$(V)rm -f build/linux/x86_64/release/hello\n"));
        assert!(makefile
            .contains("$(V)rm -f build/.objs/hello/linux/x86_64/release/main.c.o\n"));
        assert!(makefile.contains("install: all\n"));
        assert!(makefile.contains("$(V)mkdir -p /usr/local/bin\n"));
        assert!(makefile
            .contains("$(V)cp build/linux/x86_64/release/hello /usr/local/bin/hello\n"));
    }

    #[test]
    fn test_headerfiles_preserve_rootdir_subpath() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("include/mylib")).unwrap();
        std::fs::write(tmp.path().join("include/mylib/api.h"), "").unwrap();

        let makefile = configure(tmp.path(), |s| {
            s.enter_target("mylib");
            s.set_kind("static").unwrap();
            s.add_values("files", &["lib.c".to_string()]);
            s.add_values(
                "headerfiles",
                &["include/mylib/api.h:include::".to_string()],
            );
            s.end_target();
        });

        assert!(makefile.contains("$(V)mkdir -p /usr/local/include/mylib\n"));
        assert!(makefile.contains(
            "$(V)cp include/mylib/api.h /usr/local/include/mylib/api.h\n"
        ));
    }
}
