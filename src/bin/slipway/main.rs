//! slipway CLI - configure a project and generate its Makefile.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Generator};
use slipway::configure::{detect_toolchain, probe_options, verify_backend};
use slipway::core::phase::Phase;
use slipway::core::session::Session;
use slipway::core::toolchain::register_builtin_toolchains;
use slipway::generate::{emit_makefile, generate_configfiles, resolve_graph};
use slipway::script;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e)
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            let _ = e.print();
            std::process::exit(2);
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging. Progress lines go to stdout directly; tracing carries
    // the diagnostic substrate.
    let filter = if cli.diagnosis {
        EnvFilter::new("slipway=trace")
    } else if cli.verbose {
        EnvFilter::new("slipway=debug")
    } else {
        EnvFilter::new("slipway=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    if cli.generator == Generator::Ninja || cli.ninja.is_some() {
        bail!("ninja generator is not supported");
    }

    let overrides = cli::parse_option_overrides(&cli.option_args)?;

    let root = std::env::current_dir()?;
    let mut session = Session::new(root);
    if let Some(plat) = cli.plat {
        session.plat = plat;
    }
    if let Some(arch) = cli.arch {
        session.arch = arch;
    }
    if let Some(mode) = cli.mode {
        session.mode = mode;
    }
    if let Some(buildir) = cli.buildir {
        session.buildir = buildir;
    }
    if let Some(prefix) = cli.prefix {
        session.install.prefix = prefix;
    }
    if let Some(bindir) = cli.bindir {
        session.install.bindir = bindir;
    }
    if let Some(libdir) = cli.libdir {
        session.install.libdir = libdir;
    }
    if let Some(includedir) = cli.includedir {
        session.install.includedir = includedir;
    }
    session.requested_toolchain = cli.toolchain;

    println!("checking for platform ... {}", session.plat);
    println!("checking for architecture ... {}", session.arch);

    // Built-in toolchains register ahead of the scripts, which may add
    // their own during the same phase.
    register_builtin_toolchains(&mut session.store);

    let session = Rc::new(RefCell::new(session));

    // First pass: collect options and toolchains.
    script::eval_project(&session, Phase::LoadOptions)?;

    // CLI overrides win over probing.
    session.borrow_mut().apply_option_overrides(&overrides)?;

    // Detection: fix the toolchain, verify the backend, probe options.
    {
        let mut s = session.borrow_mut();
        s.phase = Phase::Detect;
        detect_toolchain(&mut s)?;
        verify_backend(cli.make.as_deref())?;
        probe_options(&mut s)?;
    }

    // Second pass: collect targets, with option results queryable.
    script::eval_project(&session, Phase::LoadTargets)?;

    // Generation: read-only over the store.
    let s = session.borrow();
    let graph = resolve_graph(&s)?;
    generate_configfiles(&s, &graph)?;
    emit_makefile(&s, &graph)?;

    if cli.diagnosis {
        eprintln!("{}", serde_json::to_string_pretty(&*s)?);
    }

    Ok(())
}
