//! The registration API exposed to scripts.
//!
//! Every operation is a Lua global closing over the shared session. Phase
//! gating and scope routing live in [`Session`]; this module only converts
//! Lua values and forwards.

use std::path::PathBuf;

use anyhow::Result;
use mlua::{Lua, Value as LuaValue, Variadic};

use super::{SharedSession, SCRIPT_NAME};

/// Scalar-setting operations: `(global name, attribute key)`.
const SCALAR_SETTERS: &[(&str, &str)] = &[
    ("set_description", "description"),
    ("set_filename", "filename"),
    ("set_basename", "basename"),
    ("set_extension", "extension"),
    ("set_prefixname", "prefixname"),
    ("set_targetdir", "targetdir"),
    ("set_objectdir", "objectdir"),
    ("set_configdir", "configdir"),
    ("set_installdir", "installdir"),
    ("set_strip", "strip"),
];

/// List-replacing operations.
const LIST_SETTERS: &[(&str, &str)] = &[
    ("set_languages", "languages"),
    ("set_warnings", "warnings"),
    ("set_optimizes", "optimizes"),
    ("set_symbols", "symbols"),
];

/// List-appending operations. A literal `{public}` token in the arguments
/// splits visibility where the attribute supports it.
const LIST_ADDERS: &[(&str, &str)] = &[
    ("add_files", "files"),
    ("add_headerfiles", "headerfiles"),
    ("add_installfiles", "installfiles"),
    ("add_configfiles", "configfiles"),
    ("add_deps", "deps"),
    ("add_options", "options"),
    ("add_defines", "defines"),
    ("add_udefines", "udefines"),
    ("add_includedirs", "includedirs"),
    ("add_links", "links"),
    ("add_syslinks", "syslinks"),
    ("add_linkdirs", "linkdirs"),
    ("add_rpathdirs", "rpathdirs"),
    ("add_frameworks", "frameworks"),
    ("add_frameworkdirs", "frameworkdirs"),
    ("add_cflags", "cflags"),
    ("add_cxxflags", "cxxflags"),
    ("add_cxflags", "cxflags"),
    ("add_mflags", "mflags"),
    ("add_mxxflags", "mxxflags"),
    ("add_mxflags", "mxflags"),
    ("add_asflags", "asflags"),
    ("add_ldflags", "ldflags"),
    ("add_shflags", "shflags"),
    ("add_arflags", "arflags"),
    ("add_cfuncs", "cfuncs"),
    ("add_cxxfuncs", "cxxfuncs"),
    ("add_cincludes", "cincludes"),
    ("add_cxxincludes", "cxxincludes"),
    ("add_ctypes", "ctypes"),
    ("add_cxxtypes", "cxxtypes"),
    ("add_csnippets", "csnippets"),
    ("add_cxxsnippets", "cxxsnippets"),
];

/// Render a Lua value the way the store expects it.
fn value_to_string(value: &LuaValue) -> Option<String> {
    match value {
        LuaValue::Nil => None,
        LuaValue::Boolean(b) => Some(b.to_string()),
        LuaValue::Integer(i) => Some(i.to_string()),
        LuaValue::Number(n) => Some(n.to_string()),
        LuaValue::String(s) => s.to_str().ok().map(str::to_string),
        _ => None,
    }
}

/// Install the full registration API into a Lua environment.
pub fn install(lua: &Lua, session: &SharedSession) -> Result<()> {
    let globals = lua.globals();

    // ------------------------------------------------------------------
    // Project
    // ------------------------------------------------------------------

    let s = session.clone();
    globals.set(
        "set_project",
        lua.create_function(move |_, name: String| {
            s.borrow_mut().set_project(&name);
            Ok(())
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "set_version",
        lua.create_function(move |_, (version, build): (String, Option<String>)| {
            s.borrow_mut().set_version(&version, build.as_deref());
            Ok(())
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "includes",
        lua.create_function(move |lua, paths: Variadic<String>| {
            for path in paths.iter() {
                let base: String = lua.globals().get("scriptdir").unwrap_or_default();
                let base = if base.is_empty() {
                    s.borrow().project_root.clone()
                } else {
                    PathBuf::from(base)
                };
                let mut file = base.join(path);
                if file.is_dir() {
                    file = file.join(SCRIPT_NAME);
                }
                super::eval_script(lua, &file).map_err(mlua::Error::external)?;
            }
            Ok(())
        })?,
    )?;

    // ------------------------------------------------------------------
    // Scope blocks
    // ------------------------------------------------------------------

    let s = session.clone();
    globals.set(
        "option",
        lua.create_function(
            move |_, (name, description, default): (String, Option<String>, Option<LuaValue>)| {
                let default = default.as_ref().and_then(value_to_string);
                s.borrow_mut()
                    .enter_option(&name, description.as_deref(), default.as_deref());
                Ok(())
            },
        )?,
    )?;

    let s = session.clone();
    globals.set(
        "option_end",
        lua.create_function(move |_, ()| {
            s.borrow_mut().end_option();
            Ok(())
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "target",
        lua.create_function(move |_, name: String| {
            s.borrow_mut().enter_target(&name);
            Ok(())
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "target_end",
        lua.create_function(move |_, ()| {
            s.borrow_mut().end_target();
            Ok(())
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "toolchain",
        lua.create_function(move |_, name: String| {
            s.borrow_mut().enter_toolchain(&name);
            Ok(())
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "toolchain_end",
        lua.create_function(move |_, ()| {
            s.borrow_mut().end_toolchain();
            Ok(())
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "set_toolset",
        lua.create_function(move |_, (kind, programs): (String, Variadic<String>)| {
            s.borrow_mut().set_toolset(&kind, &programs);
            Ok(())
        })?,
    )?;

    // ------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------

    let s = session.clone();
    globals.set(
        "set_kind",
        lua.create_function(move |_, kind: String| {
            s.borrow_mut().set_kind(&kind).map_err(mlua::Error::external)
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "set_default",
        lua.create_function(move |_, value: LuaValue| {
            if let Some(value) = value_to_string(&value) {
                s.borrow_mut().set_value("default", &value);
            }
            Ok(())
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "set_showmenu",
        lua.create_function(move |_, value: bool| {
            s.borrow_mut().set_value("showmenu", &value.to_string());
            Ok(())
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "set_configvar",
        lua.create_function(move |_, (name, value): (String, LuaValue)| {
            if let Some(value) = value_to_string(&value) {
                s.borrow_mut().set_configvar(&name, &value);
            }
            Ok(())
        })?,
    )?;

    for (global, key) in SCALAR_SETTERS {
        let s = session.clone();
        globals.set(
            *global,
            lua.create_function(move |_, value: String| {
                s.borrow_mut().set_value(key, &value);
                Ok(())
            })?,
        )?;
    }

    for (global, key) in LIST_SETTERS {
        let s = session.clone();
        globals.set(
            *global,
            lua.create_function(move |_, values: Variadic<String>| {
                s.borrow_mut().set_values(key, &values);
                Ok(())
            })?,
        )?;
    }

    for (global, key) in LIST_ADDERS {
        let s = session.clone();
        globals.set(
            *global,
            lua.create_function(move |_, values: Variadic<String>| {
                s.borrow_mut().add_values(key, &values);
                Ok(())
            })?,
        )?;
    }

    // ------------------------------------------------------------------
    // Predicates and configuration
    // ------------------------------------------------------------------

    let s = session.clone();
    globals.set(
        "is_plat",
        lua.create_function(move |_, names: Variadic<String>| Ok(s.borrow().is_plat(&names)))?,
    )?;

    let s = session.clone();
    globals.set(
        "is_arch",
        lua.create_function(move |_, names: Variadic<String>| Ok(s.borrow().is_arch(&names)))?,
    )?;

    let s = session.clone();
    globals.set(
        "is_mode",
        lua.create_function(move |_, names: Variadic<String>| Ok(s.borrow().is_mode(&names)))?,
    )?;

    let s = session.clone();
    globals.set(
        "is_host",
        lua.create_function(move |_, names: Variadic<String>| Ok(s.borrow().is_host(&names)))?,
    )?;

    let s = session.clone();
    globals.set(
        "is_toolchain",
        lua.create_function(move |_, names: Variadic<String>| {
            Ok(s.borrow().is_toolchain(&names))
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "is_config",
        lua.create_function(move |_, (name, value): (String, LuaValue)| {
            let value = value_to_string(&value).unwrap_or_default();
            Ok(s.borrow().is_config(&name, &value))
        })?,
    )?;

    let s = session.clone();
    globals.set(
        "has_config",
        lua.create_function(move |_, names: Variadic<String>| Ok(s.borrow().has_config(&names)))?,
    )?;

    let s = session.clone();
    globals.set(
        "set_config",
        lua.create_function(move |_, (name, value): (String, LuaValue)| {
            if let Some(value) = value_to_string(&value) {
                s.borrow_mut().set_config(&name, &value);
            }
            Ok(())
        })?,
    )?;

    Ok(())
}
