//! The configuration cdefgen runs with. Built by the binary from the embedded defaults, the
//! user's config files, `--config` overrides and explicit flags, in that order.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// The C front end to run.
    pub clang: PathBuf,

    /// Extra arguments passed to every front-end invocation (e.g. `--target=...`).
    #[serde(default)]
    pub clang_args: Vec<String>,

    /// Leave the macro probe unit on disk after resolution.
    pub keep_probe: bool,

    /// Directory the macro probe unit is created in.
    pub probe_dir: PathBuf,

    /// Log at debug level and interleave AST comments with the output.
    pub verbose: bool,

    #[serde(flatten)]
    pub unknown: HashMap<String, Value>,
}

impl Config {
    /// Warns about config keys nothing reads.
    pub fn validate(&self) {
        unknown_field_warning("", &self.unknown);
    }

    /// Returns a mock config for testing.
    pub fn mock() -> Self {
        Self {
            clang: "clang".into(),
            clang_args: Vec::new(),
            keep_probe: false,
            probe_dir: ".".into(),
            verbose: false,
            unknown: HashMap::new(),
        }
    }
}

/// Prints out a warning message for every field in `unknown`.
///
/// `prefix` should be the path to the table `unknown` was flattened into (empty for the root).
pub fn unknown_field_warning(prefix: &str, unknown: &HashMap<String, Value>) {
    let mut entries: Vec<_> = unknown.keys().collect();
    entries.sort_unstable();
    entries.into_iter().for_each(|name| match prefix {
        "" => warn!("Unknown config key {name}"),
        p => warn!("Unknown config key {p}.{name}"),
    });
}
