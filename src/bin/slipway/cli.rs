//! CLI definitions using clap.

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};

/// Generator backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Generator {
    /// GNU make (default)
    #[default]
    Gmake,
    /// Ninja (declared unsupported)
    Ninja,
}

/// slipway - configure a project and generate its Makefile
#[derive(Parser)]
#[command(name = "slipway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable diagnosis output (trace logging plus a resolved-session dump)
    #[arg(long)]
    pub diagnosis: bool,

    /// Generator backend
    #[arg(long, value_enum, default_value_t = Generator::Gmake)]
    pub generator: Generator,

    /// Path to the make program
    #[arg(long, value_name = "PATH")]
    pub make: Option<String>,

    /// Path to the ninja program
    #[arg(long, value_name = "PATH")]
    pub ninja: Option<String>,

    /// Target platform (linux, macosx, mingw, ...)
    #[arg(long, value_name = "P")]
    pub plat: Option<String>,

    /// Target architecture
    #[arg(long, value_name = "A")]
    pub arch: Option<String>,

    /// Build mode
    #[arg(long, value_parser = ["release", "debug"])]
    pub mode: Option<String>,

    /// Toolchain to use instead of auto-detection
    #[arg(long, value_name = "NAME")]
    pub toolchain: Option<String>,

    /// Installation prefix
    #[arg(long, value_name = "DIR")]
    pub prefix: Option<String>,

    /// Binary installation directory
    #[arg(long, value_name = "DIR")]
    pub bindir: Option<String>,

    /// Library installation directory
    #[arg(long, value_name = "DIR")]
    pub libdir: Option<String>,

    /// Header installation directory
    #[arg(long, value_name = "DIR")]
    pub includedir: Option<String>,

    /// Build output directory
    #[arg(long, value_name = "DIR")]
    pub buildir: Option<String>,

    /// Registered option overrides as --<option>=<value>
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub option_args: Vec<String>,
}

/// Decode the trailing `--<option>=<value>` arguments.
///
/// Validation against the registered option set happens after script
/// loading; here only the shape is checked. A bare `--<option>` enables
/// the option.
pub fn parse_option_overrides(args: &[String]) -> Result<Vec<(String, String)>> {
    let mut overrides = Vec::new();
    for arg in args {
        let Some(rest) = arg.strip_prefix("--") else {
            bail!("unknown argument: {}", arg);
        };
        match rest.split_once('=') {
            Some((name, value)) => overrides.push((name.to_string(), value.to_string())),
            None => overrides.push((rest.to_string(), "true".to_string())),
        }
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_option_overrides() {
        let args = vec!["--pthread=y".to_string(), "--lto".to_string()];
        let overrides = parse_option_overrides(&args).unwrap();
        assert_eq!(
            overrides,
            vec![
                ("pthread".to_string(), "y".to_string()),
                ("lto".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_non_flag_argument_is_rejected() {
        let args = vec!["pthread=y".to_string()];
        assert!(parse_option_overrides(&args).is_err());
    }
}
