//! Generates FFI-ready C declarations from a header. This is normally used through the
//! `cdefgen` binary, but is exposed as a library crate as well.

pub mod cli;

use c_ast::{ClangFrontend, ParseOptions};
use cdefgen_core::config::Config;
use cli::Args;
use declaration_synthesizer::{DeclarationList, SynthesisError, SynthesisRequest, synthesize};

pub use declaration_synthesizer::{Declaration, DeclarationKind};

/// Builds the synthesis request for the header named on the command line, or `None` when no
/// header was given.
pub fn request(args: &Args, config: &Config) -> Option<SynthesisRequest> {
    let header = args.header.clone()?;
    Some(SynthesisRequest {
        header,
        parse: ParseOptions {
            include_dirs: args.include.clone(),
            defines: args.define.clone(),
        },
        verbose: config.verbose,
        keep_probe: config.keep_probe,
        probe_dir: config.probe_dir.clone(),
    })
}

/// Runs the synthesizer against the configured `clang`.
pub fn synthesize_header(
    config: &Config,
    request: &SynthesisRequest,
) -> Result<DeclarationList, SynthesisError> {
    let frontend = ClangFrontend::new(&config.clang).with_args(config.clang_args.iter().cloned());
    synthesize(&frontend, request)
}
