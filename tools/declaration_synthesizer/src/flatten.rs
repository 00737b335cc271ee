//! Renders struct, union and enum bodies, giving anonymous nested aggregates a place to live.
//!
//! Named nested definitions are hoisted to file scope (where C puts their tags anyway) and the
//! member refers to them by name. Anonymous nested aggregates stay inline; when the member
//! itself is unnamed (a C11 anonymous struct or union) it gets a synthetic name.

use crate::classify::{TagKind, has_valid_spelling, is_definition, tag_kind, tag_name};
use crate::declarator::{anonymous_span, clean_spelling, declarator};
use crate::enums::{constant_value, render_enumerators};
use c_ast::Clang;
use clang_ast::{Id, Node};
use std::collections::HashSet;
use std::ops::Range;
use tracing::debug;

/// Hands out `__anon_<kind>_<n>` identifiers, unique within one synthesis run.
#[derive(Debug, Default)]
pub struct SyntheticNames {
    next: usize,
}

impl SyntheticNames {
    pub fn next(&mut self, kind: TagKind) -> String {
        let name = format!("__anon_{}_{}", kind.keyword(), self.next);
        self.next += 1;
        name
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Renders tag bodies for one run. `defined` holds the tags whose body has been emitted.
pub struct Flattener<'r> {
    pub names: &'r mut SyntheticNames,
    pub defined: &'r mut HashSet<Id>,
}

impl Flattener<'_> {
    /// Renders `tag` as a file-scope definition (`struct NAME { .. };`), preceded by the nested
    /// definitions it hoisted.
    pub fn definition(&mut self, tag: &Node<Clang>) -> Vec<String> {
        self.defined.insert(tag.id);
        let mut out = Vec::new();
        let body = self.body(tag, 0, &mut out);
        let keyword = tag_kind(tag).unwrap_or(TagKind::Struct).keyword();
        out.push(match tag_name(tag) {
            Some(name) => format!("{keyword} {name} {body};"),
            None => format!("{keyword} {body};"),
        });
        out
    }

    /// Renders the braces and members of `tag`. The closing brace is indented for `depth`;
    /// definitions that must precede the enclosing declaration are appended to `hoisted`.
    pub fn body(&mut self, tag: &Node<Clang>, depth: usize, hoisted: &mut Vec<String>) -> String {
        self.defined.insert(tag.id);
        let lines = match tag.kind {
            Clang::EnumDecl { .. } => render_enumerators(tag, depth + 1),
            _ => self.members(tag, depth + 1, hoisted),
        };
        if lines.is_empty() {
            format!("{{\n{}}}", indent(depth))
        } else {
            format!("{{\n{}\n{}}}", lines.join("\n"), indent(depth))
        }
    }

    fn members(
        &mut self,
        record: &Node<Clang>,
        depth: usize,
        hoisted: &mut Vec<String>,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        let mut pending: Option<&Node<Clang>> = None;
        let mut last_inline: Option<&Node<Clang>> = None;
        for child in &record.inner {
            match &child.kind {
                Clang::RecordDecl { .. } | Clang::EnumDecl { .. } => {
                    if let Some(unclaimed) = pending.take() {
                        self.unclaimed(unclaimed, depth, &mut lines, hoisted);
                    }
                    if tag_name(child).is_none() {
                        pending = Some(child);
                    } else if is_definition(child) && !self.defined.contains(&child.id) {
                        hoisted.extend(self.definition(child));
                    }
                }
                Clang::FieldDecl {
                    name,
                    qtype,
                    is_bitfield,
                    is_implicit,
                    ..
                } => {
                    let spelling = clean_spelling(&qtype.qual_type);
                    let name = name
                        .as_deref()
                        .filter(|name| !*is_implicit && has_valid_spelling(name));
                    if let Some(span) = anonymous_span(&spelling) {
                        let Some(tag) = pending.take().or(last_inline) else {
                            debug!("No anonymous definition for member of type {spelling}");
                            continue;
                        };
                        last_inline = Some(tag);
                        let field = match name {
                            Some(name) => name.to_string(),
                            None => self.names.next(tag_kind(tag).unwrap_or(TagKind::Struct)),
                        };
                        lines.push(self.inline(tag, &spelling, span, &field, depth, hoisted));
                        continue;
                    }
                    if let Some(unclaimed) = pending.take() {
                        self.unclaimed(unclaimed, depth, &mut lines, hoisted);
                    }
                    let declaration = declarator(&spelling, name.unwrap_or_default());
                    let width = is_bitfield.then(|| constant_value(child)).flatten();
                    lines.push(match width {
                        Some(width) => format!("{}{declaration} : {width};", indent(depth)),
                        None => format!("{}{declaration};", indent(depth)),
                    });
                }
                _ => {}
            }
        }
        if let Some(unclaimed) = pending {
            self.unclaimed(unclaimed, depth, &mut lines, hoisted);
        }
        lines
    }

    /// A member whose type is the anonymous `tag`: `struct { .. } name;` with any declarator
    /// suffix (`*`, `[N]`) kept around the name.
    fn inline(
        &mut self,
        tag: &Node<Clang>,
        spelling: &str,
        span: Range<usize>,
        field: &str,
        depth: usize,
        hoisted: &mut Vec<String>,
    ) -> String {
        let keyword = tag_kind(tag).unwrap_or(TagKind::Struct).keyword();
        let mut placeholder = spelling.to_string();
        placeholder.replace_range(span, "@");
        let body = self.body(tag, depth, hoisted);
        let declaration =
            declarator(&placeholder, field).replacen('@', &format!("{keyword} {body}"), 1);
        format!("{}{declaration};", indent(depth))
    }

    /// An anonymous definition no member refers to. Enumerators still belong to file scope, so an
    /// enum is hoisted; a record becomes a member with a synthetic name.
    fn unclaimed(
        &mut self,
        tag: &Node<Clang>,
        depth: usize,
        lines: &mut Vec<String>,
        hoisted: &mut Vec<String>,
    ) {
        match tag_kind(tag) {
            Some(TagKind::Enum) => hoisted.extend(self.definition(tag)),
            Some(kind) if is_definition(tag) => {
                let field = self.names.next(kind);
                let body = self.body(tag, depth, hoisted);
                lines.push(format!("{}{} {body} {field};", indent(depth), kind.keyword()));
            }
            _ => {}
        }
    }
}
