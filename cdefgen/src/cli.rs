//! The command-line arguments and configuration system for the `cdefgen` binary.

use cdefgen_core::config::Config;
use clap::Parser;
use config::FileFormat::Toml;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Synthesizes C declarations for FFI binding generators from a header.
#[derive(Debug, Parser)]
#[command(name = "cdefgen", version)]
pub struct Args {
    /// Set a configuration value; format $NAME=$VALUE.
    #[arg(long, short)]
    pub config: Vec<String>,

    /// The C header to synthesize declarations for.
    // Should always be present unless using a flag like --print-config-path
    pub header: Option<PathBuf>,

    /// Add a directory to the include search path. Declarations and macros from headers under
    /// it are emitted too.
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub include: Vec<PathBuf>,

    /// Define a macro for the front end; format NAME or NAME=VALUE. Always emitted.
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    pub define: Vec<String>,

    /// Write the declarations to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log debug output and interleave AST comments with the declarations.
    #[arg(short, long)]
    pub verbose: bool,

    /// Leave the macro probe unit on disk.
    #[arg(long)]
    pub keep_probe: bool,

    /// The clang executable to use.
    #[arg(long, value_name = "PATH")]
    pub clang: Option<PathBuf>,

    /// Prints out the location of the config file.
    #[arg(long)]
    pub print_config_path: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config value {0:?}; no '=' found")]
    MissingEquals(String),
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// Performs parsing and validation of the config; to be called by main() before doing anything
/// else.
///
/// Returns the config, or None if a command line flag that calls for an early exit (such as
/// --print-config-path) was provided.
pub fn initialize(args: &Args) -> Result<Option<Config>, ConfigError> {
    let dirs = ProjectDirs::from("", "", "cdefgen");
    let config_dir = dirs.as_ref().map(ProjectDirs::config_dir);
    if args.print_config_path {
        match config_dir {
            Some(dir) => println!("Config file location: {:?}", config_file(dir)),
            None => println!("No config file location: home directory unknown"),
        }
        return Ok(None);
    }
    load_config(args, config_dir).map(Some)
}

fn load_config(args: &Args, config_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let mut settings = config::Config::builder().add_source(config::File::from_str(
        include_str!("../default_config.toml"),
        Toml,
    ));
    if let Some(dir) = config_dir {
        settings = settings.add_source(config::File::from(config_file(dir)).required(false));
    }
    settings =
        settings.add_source(config::File::from(PathBuf::from("cdefgen.toml")).required(false));
    for config_arg in &args.config {
        let Some((name, value)) = config_arg.split_once('=') else {
            return Err(ConfigError::MissingEquals(config_arg.clone()));
        };
        settings = settings.set_override(name, value)?;
    }
    if args.verbose {
        settings = settings.set_override("verbose", true)?;
    }
    if args.keep_probe {
        settings = settings.set_override("keep_probe", true)?;
    }

    let mut config: Config = settings.build()?.try_deserialize()?;
    // Paths do not round-trip through config values, so the flag is applied afterwards.
    if let Some(ref clang) = args.clang {
        config.clang = clang.clone();
    }
    Ok(config)
}

/// Returns the config file path, given the config directory.
fn config_file(config_dir: &Path) -> PathBuf {
    [config_dir, "cdefgen.toml".as_ref()].iter().collect()
}
