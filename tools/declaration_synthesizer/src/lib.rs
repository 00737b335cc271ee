//! Synthesizes a flat list of C declarations from a header, suitable for FFI binding generators
//! that only understand a restricted declaration grammar.
//!
//! A run parses the header once, walks its top-level declarations in translation order,
//! classifies its macros, and resolves the macros that are not plain literals with a single
//! probe compilation unit. Declarations and macros are merged back into translation order.

mod classify;
mod declaration;
mod declarator;
mod emit;
mod enums;
mod filter;
mod flatten;
mod macros;

#[cfg(test)]
mod fixtures;

pub use declaration::{Declaration, DeclarationKind, DeclarationList};
pub use enums::format_constant;
pub use macros::{MacroClass, MacroEntry};

use c_ast::{Frontend, FrontendError, ParseOptions};
use emit::Emitter;
use filter::OriginFilter;
use macros::{MacroTable, ProbeSettings};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Everything one synthesis run needs to know about its input.
#[derive(Clone, Debug)]
pub struct SynthesisRequest {
    pub header: PathBuf,
    pub parse: ParseOptions,
    /// Interleave `/* [Kind name @ file:line:col] */` comments with the output.
    pub verbose: bool,
    /// Leave the macro probe unit on disk.
    pub keep_probe: bool,
    /// Where the macro probe unit is created.
    pub probe_dir: PathBuf,
}

impl SynthesisRequest {
    pub fn new(header: impl Into<PathBuf>) -> SynthesisRequest {
        SynthesisRequest {
            header: header.into(),
            parse: ParseOptions::default(),
            verbose: false,
            keep_probe: false,
            probe_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("header {0} does not exist")]
    MissingHeader(PathBuf),
    #[error(transparent)]
    Parse(#[from] FrontendError),
}

/// Produces the declaration stream for `request.header`.
///
/// Failing to parse the header is the only fatal error. Macros the probe cannot evaluate are
/// reported as comments, and declarations with no C representation are skipped.
pub fn synthesize<F: Frontend + ?Sized>(
    frontend: &F,
    request: &SynthesisRequest,
) -> Result<DeclarationList, SynthesisError> {
    if !request.header.exists() {
        return Err(SynthesisError::MissingHeader(request.header.clone()));
    }
    info!("Synthesizing declarations for {}", request.header.display());
    let ast = frontend.parse_ast(&request.header, &request.parse)?;
    let unit = frontend.preprocess(&request.header, &request.parse)?;

    let mut filter = OriginFilter::new(
        &request.header,
        &request.parse.include_dirs,
        request.parse.defined_names(),
    );
    let mut macros = MacroTable::collect(&unit, &mut filter);

    let mut emitter = Emitter::new(&ast, request.verbose);
    let mut declarations = Vec::new();
    let mut position = 0;
    for node in &ast.inner {
        if !filter.allows_node(node) {
            continue;
        }
        let located = node
            .kind
            .origin()
            .and_then(|origin| unit.position(&origin.file, origin.line));
        position = located.map_or(position, |located| located.max(position));
        declarations.extend(emitter.emit(node).into_iter().map(|d| (position, d)));
    }
    debug!(
        "Emitted {} declarations; {} macros survived filtering",
        declarations.len(),
        macros.entries().len()
    );

    macros.resolve(
        frontend,
        &request.header,
        &request.parse,
        ProbeSettings {
            dir: &request.probe_dir,
            keep: request.keep_probe,
        },
    );
    Ok(merge(declarations, macros.into_entries()))
}

/// Interleaves macros with declarations by translation position. A macro defined before a
/// declaration's line precedes it.
fn merge(declarations: Vec<(usize, Declaration)>, macros: Vec<MacroEntry>) -> DeclarationList {
    let mut out = Vec::with_capacity(declarations.len() + macros.len());
    let mut macros = macros.into_iter().peekable();
    for (position, declaration) in declarations {
        while let Some(entry) = macros.next_if(|entry| entry.position <= position) {
            out.push(entry.render());
        }
        out.push(declaration);
    }
    out.extend(macros.map(|entry| entry.render()));
    out.into()
}
