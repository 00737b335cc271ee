//! Drives the `clang` executable for the two views the synthesizer needs.

use crate::{Clang, Frontend, FrontendError, ParseOptions, PreprocessedUnit, ast_from_slice};
use clang_ast::Node;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info, warn};

/// A [`Frontend`] backed by a `clang` binary.
#[derive(Clone, Debug)]
pub struct ClangFrontend {
    executable: PathBuf,
    extra_args: Vec<String>,
}

impl Default for ClangFrontend {
    fn default() -> Self {
        Self::new("clang")
    }
}

impl ClangFrontend {
    pub fn new<P: Into<PathBuf>>(executable: P) -> ClangFrontend {
        ClangFrontend {
            executable: executable.into(),
            extra_args: Vec::new(),
        }
    }

    /// Arguments passed to every invocation ahead of the include paths and defines.
    pub fn with_args<I: IntoIterator<Item = String>>(mut self, args: I) -> ClangFrontend {
        self.extra_args.extend(args);
        self
    }

    fn run(
        &self,
        mode: &[&str],
        source: &Path,
        options: &ParseOptions,
    ) -> Result<Output, FrontendError> {
        let mut clang_cmd = Command::new(&self.executable);
        let clang_cmd = clang_cmd
            .args(&self.extra_args)
            .args(mode)
            .args(options.compiler_args())
            .args(["-x", "c"])
            .arg(source)
            .stdin(Stdio::null());
        debug!("Running {clang_cmd:?}");
        clang_cmd.output().map_err(|source| FrontendError::Spawn {
            executable: self.executable.display().to_string(),
            source,
        })
    }

    fn failure(&self, source: &Path, output: &Output) -> FrontendError {
        FrontendError::Failed {
            executable: self.executable.display().to_string(),
            path: source.to_path_buf(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

impl Frontend for ClangFrontend {
    fn parse_ast(
        &self,
        source: &Path,
        options: &ParseOptions,
    ) -> Result<Node<Clang>, FrontendError> {
        let output = self.run(
            &["-Xclang", "-ast-dump=json", "-fsyntax-only"],
            source,
            options,
        )?;
        // Clang still dumps the (partially recovered) AST when the source has errors, so only a
        // missing dump is treated as a failure.
        if output.stdout.is_empty() {
            return Err(self.failure(source, &output));
        }
        if !output.status.success() {
            warn!(
                "{} reported errors for {}: {}",
                self.executable.display(),
                source.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let ast = ast_from_slice(source, &output.stdout)?;
        info!("Parsed {}", source.display());
        Ok(ast)
    }

    fn preprocess(
        &self,
        source: &Path,
        options: &ParseOptions,
    ) -> Result<PreprocessedUnit, FrontendError> {
        let output = self.run(&["-E", "-dD"], source, options)?;
        if !output.status.success() {
            return Err(self.failure(source, &output));
        }
        let unit = PreprocessedUnit::parse(&String::from_utf8_lossy(&output.stdout));
        info!(
            "Preprocessed {}: {} macro directives",
            source.display(),
            unit.directives().len()
        );
        Ok(unit)
    }
}
