//! The output of `clang -E -dD`: macro directives interleaved with line markers.
//!
//! Besides the macro definitions themselves, the preprocessed stream fixes a single translation
//! order across every file the header pulls in. [`PreprocessedUnit::position`] exposes that
//! order so declarations from the AST dump can be merged with macro definitions.

use crate::token::{Token, tokenize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One `#define` as it appears in the preprocessed stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroDefinition {
    pub name: String,
    /// The parameter list of a function-like macro, parentheses included.
    pub parameters: Option<String>,
    pub replacement: Vec<Token>,
    pub file: Arc<str>,
    pub line: usize,
    pub column: usize,
    /// Index of the directive in the preprocessed output.
    pub position: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroDirective {
    Define(MacroDefinition),
    Undef { name: String, position: usize },
}

#[derive(Debug, Default)]
pub struct PreprocessedUnit {
    directives: Vec<MacroDirective>,
    /// file -> source line -> first output line it was emitted at.
    lines: HashMap<Arc<str>, BTreeMap<usize, usize>>,
}

impl PreprocessedUnit {
    pub fn parse(text: &str) -> PreprocessedUnit {
        let mut unit = PreprocessedUnit::default();
        let mut file: Arc<str> = Arc::from("<stdin>");
        let mut line = 1;
        for (position, raw) in text.lines().enumerate() {
            if let Some((marker_line, marker_file)) = parse_line_marker(raw) {
                if *file != *marker_file {
                    file = Arc::from(marker_file);
                }
                line = marker_line;
                continue;
            }
            unit.lines
                .entry(file.clone())
                .or_default()
                .entry(line)
                .or_insert(position);

            let directive = raw.trim_start();
            if let Some(rest) = directive.strip_prefix("#define ") {
                let column = raw.len() - rest.len() + 1;
                if let Some(definition) = parse_define(rest, &file, line, column, position) {
                    unit.directives.push(MacroDirective::Define(definition));
                }
            } else if let Some(rest) = directive.strip_prefix("#undef ") {
                unit.directives.push(MacroDirective::Undef {
                    name: rest.trim().to_string(),
                    position,
                });
            }
            line += 1;
        }
        unit
    }

    pub fn directives(&self) -> &[MacroDirective] {
        &self.directives
    }

    /// Returns where `file:line` lands in translation order. Lines the preprocessor collapsed
    /// map to the closest preceding emitted line of the same file.
    pub fn position(&self, file: &str, line: usize) -> Option<usize> {
        self.lines
            .get(file)?
            .range(..=line)
            .next_back()
            .map(|(_, position)| *position)
    }
}

/// Parses `# 12 "file.h" 1 3` (and the `#line 12 "file.h"` spelling).
fn parse_line_marker(raw: &str) -> Option<(usize, String)> {
    let rest = raw
        .strip_prefix("# ")
        .or_else(|| raw.strip_prefix("#line "))?;
    let (number, rest) = rest.split_once(' ')?;
    let line = number.parse().ok()?;
    let quoted = rest.trim_start().strip_prefix('"')?;
    let mut name = String::new();
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some((line, name)),
            '\\' => name.extend(chars.next()),
            c => name.push(c),
        }
    }
    None
}

fn parse_define(
    rest: &str,
    file: &Arc<str>,
    line: usize,
    column: usize,
    position: usize,
) -> Option<MacroDefinition> {
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    let (name, mut body) = rest.split_at(name_len);
    let mut parameters = None;
    if body.starts_with('(') {
        let close = body.find(')')?;
        parameters = Some(body[..=close].to_string());
        body = &body[close + 1..];
    }
    Some(MacroDefinition {
        name: name.to_string(),
        parameters,
        replacement: tokenize(body),
        file: file.clone(),
        line,
        column,
        position,
    })
}
