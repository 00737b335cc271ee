//! Macro classification and resolution.
//!
//! Object-like macros whose replacement is a single literal are emitted as-is. Anything else
//! is pending until the probe pass: one extra compilation unit includes the header and assigns
//! every pending macro to an enumerator, so the compiler does the evaluation.

use crate::declaration::{Declaration, DeclarationKind};
use crate::enums::{constant_value, format_constant};
use crate::filter::OriginFilter;
use c_ast::token::{Token, TokenKind, is_integer_literal};
use c_ast::{Clang, Frontend, MacroDefinition, MacroDirective, ParseOptions, PreprocessedUnit};
use clang_ast::Node;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroClass {
    /// `#define NAME` with nothing after it.
    Empty,
    /// A single integer or string literal, kept verbatim.
    Primitive(String),
    /// Needs the probe; holds the replacement text.
    Pending(String),
    Resolved(i128),
    /// The probe could not evaluate it; holds the replacement text.
    Unresolved(String),
    /// Holds the parameter list.
    FunctionLike(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroEntry {
    pub name: String,
    pub class: MacroClass,
    pub file: Arc<str>,
    pub line: usize,
    pub column: usize,
    /// Where the definition sits in translation order.
    pub position: usize,
}

fn comment_safe(text: &str) -> String {
    text.replace("*/", "* /")
}

/// The replacement list as text. Tokens are joined by spaces, except that a list opening with
/// `<` (a header name) is glued back together.
fn raw_text(tokens: &[Token]) -> String {
    let separator = match tokens.first() {
        Some(token) if token.text == "<" => "",
        _ => " ",
    };
    tokens
        .iter()
        .map(|token| token.text.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}

pub fn classify(definition: &MacroDefinition) -> MacroClass {
    if let Some(parameters) = &definition.parameters {
        return MacroClass::FunctionLike(parameters.clone());
    }
    match definition.replacement.as_slice() {
        [] => MacroClass::Empty,
        [token] if token.kind == TokenKind::Number && is_integer_literal(&token.text) => {
            MacroClass::Primitive(token.text.clone())
        }
        [token] if token.kind == TokenKind::StringLiteral => {
            MacroClass::Primitive(token.text.clone())
        }
        tokens => MacroClass::Pending(raw_text(tokens)),
    }
}

impl MacroEntry {
    pub fn new(definition: &MacroDefinition) -> MacroEntry {
        MacroEntry {
            name: definition.name.clone(),
            class: classify(definition),
            file: definition.file.clone(),
            line: definition.line,
            column: definition.column,
            position: definition.position,
        }
    }

    pub fn render(&self) -> Declaration {
        let name = &self.name;
        match &self.class {
            MacroClass::Empty => Declaration::new(
                DeclarationKind::MacroEmpty,
                format!("/* {name}: empty macro */"),
            ),
            MacroClass::Primitive(value) => {
                Declaration::new(DeclarationKind::MacroDefined, format!("#define {name} {value}"))
            }
            MacroClass::Resolved(value) => Declaration::new(
                DeclarationKind::MacroDefined,
                format!("#define {name} {}", format_constant(*value)),
            ),
            MacroClass::Pending(raw) | MacroClass::Unresolved(raw) => Declaration::new(
                DeclarationKind::MacroNonPrimitive,
                format!("/* {name}: unresolved macro: {} */", comment_safe(raw)),
            ),
            MacroClass::FunctionLike(parameters) => Declaration::new(
                DeclarationKind::MacroNonPrimitive,
                format!("/* {name}: function-like macro {} */", comment_safe(parameters)),
            ),
        }
    }

    /// Identifies the definition site: the last two path segments of its file, its line and
    /// column, as identifier characters.
    pub fn location_tag(&self) -> String {
        let segments: Vec<&str> = self
            .file
            .rsplit(['/', '\\'])
            .take(2)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}_{}_{}", segments.join("_"), self.line, self.column)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }

    /// The enum the probe unit declares for this macro.
    pub fn probe_enum_name(&self) -> String {
        format!("__anon_{}_{}", self.name, self.location_tag())
    }
}

/// Where to put the probe unit, and whether to leave it behind.
#[derive(Clone, Copy, Debug)]
pub struct ProbeSettings<'p> {
    pub dir: &'p Path,
    pub keep: bool,
}

/// The macros that survive filtering, in definition order.
#[derive(Debug, Default)]
pub struct MacroTable {
    entries: Vec<MacroEntry>,
}

impl MacroTable {
    /// Replays the directives of `unit`. A redefinition replaces the earlier entry and `#undef`
    /// removes it.
    pub fn collect(unit: &PreprocessedUnit, filter: &mut OriginFilter) -> MacroTable {
        let mut entries: Vec<MacroEntry> = Vec::new();
        for directive in unit.directives() {
            match directive {
                MacroDirective::Define(definition) => {
                    if !filter.allows_macro(&definition.name, &definition.file) {
                        continue;
                    }
                    entries.retain(|entry| entry.name != definition.name);
                    entries.push(MacroEntry::new(definition));
                }
                MacroDirective::Undef { name, .. } => entries.retain(|entry| &entry.name != name),
            }
        }
        debug!("Collected {} macros", entries.len());
        MacroTable { entries }
    }

    pub fn entries(&self) -> &[MacroEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<MacroEntry> {
        self.entries
    }

    fn pending(&self) -> impl Iterator<Item = &MacroEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.class, MacroClass::Pending(_)))
    }

    /// The probe unit: the header, then one single-enumerator enum per pending macro.
    pub fn probe_source(&self, header: &Path) -> String {
        let include = header.display().to_string().replace('\\', "\\\\").replace('"', "\\\"");
        let mut source = format!("#include \"{include}\"\n");
        for entry in self.pending() {
            source.push_str(&format!(
                "enum {} {{ __{} = {} }};\n",
                entry.probe_enum_name(),
                entry.name,
                entry.name
            ));
        }
        source
    }

    /// Evaluates every pending macro with one probe parse. Macros the probe could not evaluate
    /// become unresolved; a probe that fails altogether leaves them all unresolved.
    pub fn resolve<F: Frontend + ?Sized>(
        &mut self,
        frontend: &F,
        header: &Path,
        options: &ParseOptions,
        settings: ProbeSettings,
    ) {
        let count = self.pending().count();
        if count == 0 {
            return;
        }
        info!("Resolving {count} macros with a probe unit");
        let values = match self.run_probe(frontend, header, options, settings) {
            Ok(ast) => read_probe(&ast, self.pending()),
            Err(e) => {
                warn!("Macro probe failed: {e}");
                HashMap::new()
            }
        };
        for entry in &mut self.entries {
            if let MacroClass::Pending(raw) = &entry.class {
                entry.class = match values.get(&entry.name) {
                    Some(&value) => MacroClass::Resolved(value),
                    None => {
                        debug!("Macro {} did not evaluate to an integer", entry.name);
                        MacroClass::Unresolved(raw.clone())
                    }
                };
            }
        }
    }

    fn run_probe<F: Frontend + ?Sized>(
        &self,
        frontend: &F,
        header: &Path,
        options: &ParseOptions,
        settings: ProbeSettings,
    ) -> Result<Node<Clang>, Box<dyn std::error::Error>> {
        let mut probe = tempfile::Builder::new()
            .prefix("cdefgen-probe-")
            .suffix(".c")
            .tempfile_in(settings.dir)?;
        let absolute = std::path::absolute(header)?;
        probe.write_all(self.probe_source(&absolute).as_bytes())?;
        probe.flush()?;
        let ast = frontend.parse_ast(probe.path(), options);
        if settings.keep {
            let (_, path) = probe.keep()?;
            info!("Kept macro probe at {}", path.display());
        }
        Ok(ast?)
    }
}

/// Reads the value of each pending macro back out of the probe unit's AST.
fn read_probe<'e>(
    ast: &Node<Clang>,
    pending: impl Iterator<Item = &'e MacroEntry>,
) -> HashMap<String, i128> {
    let by_enum: HashMap<String, &str> = pending
        .map(|entry| (entry.probe_enum_name(), entry.name.as_str()))
        .collect();
    let mut values = HashMap::new();
    for node in &ast.inner {
        let Clang::EnumDecl {
            name: Some(enum_name),
            ..
        } = &node.kind
        else {
            continue;
        };
        let Some(&macro_name) = by_enum.get(enum_name) else {
            continue;
        };
        let constant = format!("__{macro_name}");
        let value = node
            .inner
            .iter()
            .find(|child| child.kind.name() == Some(constant.as_str()))
            .and_then(constant_value);
        if let Some(value) = value {
            values.insert(macro_name.to_string(), value);
        }
    }
    values
}
