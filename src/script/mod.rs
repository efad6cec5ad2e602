//! Script loading and evaluation.
//!
//! A project is described by `build.lua` scripts evaluated in a controlled
//! Lua environment: the registration API is installed as global functions
//! closing over the shared session, and `scriptdir` names the directory of
//! the script currently being evaluated.
//!
//! The same script tree is evaluated once per loading phase; phase gating
//! inside the session makes mis-phased registration calls silent no-ops.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use mlua::Lua;
use walkdir::WalkDir;

use crate::core::phase::Phase;
use crate::core::session::Session;

mod api;

/// The project description file name.
pub const SCRIPT_NAME: &str = "build.lua";

/// Session handle shared with the Lua callbacks.
pub type SharedSession = Rc<RefCell<Session>>;

/// Evaluate the project's script tree for one loading phase.
pub fn eval_project(session: &SharedSession, phase: Phase) -> Result<()> {
    session.borrow_mut().phase = phase;
    let root = session.borrow().project_root.clone();

    let scripts = discover_scripts(&root)?;
    if scripts.is_empty() {
        bail!("no {} found in {}", SCRIPT_NAME, root.display());
    }

    let lua = Lua::new();
    api::install(&lua, session)?;

    for script in &scripts {
        eval_script(&lua, script)?;
    }
    Ok(())
}

/// Find the project scripts: `build.lua` at the root, or failing that every
/// `build.lua` at depth 2 of the project tree.
fn discover_scripts(root: &Path) -> Result<Vec<PathBuf>> {
    let top = root.join(SCRIPT_NAME);
    if top.is_file() {
        return Ok(vec![top]);
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name() == SCRIPT_NAME {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Evaluate one script file, exposing its directory as `scriptdir` and
/// restoring the previous value afterwards so `includes` nests properly.
pub(crate) fn eval_script(lua: &Lua, path: &Path) -> Result<()> {
    let source = crate::util::fs::read_to_string(path)?;
    let dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_string_lossy()
        .to_string();

    let previous: Option<String> = lua.globals().get("scriptdir").ok();
    lua.globals().set("scriptdir", dir)?;

    let result = lua
        .load(&source)
        .set_name(path.to_string_lossy().to_string())
        .exec();

    match previous {
        Some(p) => lua.globals().set("scriptdir", p)?,
        None => lua.globals().set("scriptdir", mlua::Value::Nil)?,
    }

    result.with_context(|| format!("failed to evaluate {}", path.display()))
}
