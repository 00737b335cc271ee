//! Turns top-level AST nodes into declarations: typedef dispatch, tag bodies and prototypes.

use crate::classify::{
    TagKind, TagTable, TypedefIndex, desugar, is_definition, tag_kind, tag_name, tag_target,
};
use crate::declaration::{Declaration, DeclarationKind};
use crate::declarator::{anonymous_span, clean_spelling, declarator};
use crate::flatten::{Flattener, SyntheticNames};
use c_ast::Clang;
use clang_ast::{Id, Node};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// `/* [Kind name @ file:line:col] */`
pub fn debug_comment(node: &Node<Clang>) -> String {
    let kind = node.kind.kind_name();
    let name = node
        .kind
        .name()
        .filter(|name| !name.is_empty())
        .unwrap_or("<anonymous>");
    match node.kind.origin() {
        Some(origin) => format!(
            "/* [{kind} {name} @ {}:{}:{}] */",
            origin.file, origin.line, origin.col
        ),
        None => format!("/* [{kind} {name}] */"),
    }
}

/// The first record or enum reached by descending a type's children.
fn find_tag(mut ty: &Node<Clang>) -> Option<Id> {
    loop {
        match &ty.kind {
            Clang::RecordType { decl, .. } | Clang::EnumType { decl, .. } => return Some(decl.id),
            _ => ty = ty.inner.first()?,
        }
    }
}

fn typedef_line(spelling: &str, name: &str) -> Declaration {
    Declaration::new(
        DeclarationKind::Typedef,
        format!("typedef {};", declarator(spelling, name)),
    )
}

fn tag_declarations(texts: Vec<String>) -> impl Iterator<Item = Declaration> {
    texts
        .into_iter()
        .map(|text| Declaration::new(DeclarationKind::StructUnionEnum, text))
}

/// `typedef R (*NAME)(P1, P2);` from the pieces of a prototype. Returns `None` when the return
/// type is itself a declarator that cannot be written in front of the name.
fn prototype_pointer(prototype: &Node<Clang>, variadic: bool, name: &str) -> Option<String> {
    let mut types = prototype
        .inner
        .iter()
        .map(|ty| ty.kind.qual_type().map(|q| clean_spelling(&q.qual_type)));
    let ret = types.next()??;
    if ret.contains('(') {
        return None;
    }
    let mut params = types.collect::<Option<Vec<_>>>()?;
    if variadic {
        params.push("...".to_string());
    } else if params.is_empty() {
        params.push("void".to_string());
    }
    let separator = if ret.ends_with('*') { "" } else { " " };
    Some(format!(
        "typedef {ret}{separator}(*{name})({});",
        params.join(", ")
    ))
}

/// Walks the top level of one translation unit. Tag bodies are emitted at most once and
/// identical declarations are dropped.
pub struct Emitter<'a> {
    tags: TagTable<'a>,
    index: TypedefIndex,
    defined: HashSet<Id>,
    /// Anonymous tag -> the typedef carrying its body and that typedef's pointer depth.
    anonymous_aliases: HashMap<Id, (String, usize)>,
    names: SyntheticNames,
    emitted: HashSet<String>,
    verbose: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(root: &'a Node<Clang>, verbose: bool) -> Emitter<'a> {
        let tags = TagTable::build(root);
        let index = TypedefIndex::build(&root.inner, &tags);
        Emitter {
            tags,
            index,
            defined: HashSet::new(),
            anonymous_aliases: HashMap::new(),
            names: SyntheticNames::default(),
            emitted: HashSet::new(),
            verbose,
        }
    }

    fn flattener(&mut self) -> Flattener<'_> {
        Flattener {
            names: &mut self.names,
            defined: &mut self.defined,
        }
    }

    /// The declarations for one top-level node, preceded by its debug comment in verbose mode.
    pub fn emit(&mut self, node: &'a Node<Clang>) -> Vec<Declaration> {
        let mut out = Vec::new();
        if self.verbose {
            out.push(Declaration::new(
                DeclarationKind::Verbose,
                debug_comment(node),
            ));
        }
        let produced = match &node.kind {
            Clang::TypedefDecl {
                is_implicit: true, ..
            }
            | Clang::RecordDecl {
                is_implicit: true, ..
            }
            | Clang::FunctionDecl {
                is_implicit: true, ..
            } => Vec::new(),
            Clang::TypedefDecl { name, qtype, .. } => self.typedef(node, name, &qtype.qual_type),
            Clang::RecordDecl { .. } | Clang::EnumDecl { .. } => self.tag(node),
            Clang::FunctionDecl {
                name,
                storage_class,
                qtype,
                ..
            } => self.function(name, storage_class.as_deref(), &qtype.qual_type),
            kind => {
                debug!(
                    "Skipping unrepresentable {} {}",
                    kind.kind_name(),
                    kind.name().unwrap_or_default()
                );
                Vec::new()
            }
        };
        out.extend(
            produced
                .into_iter()
                .filter(|declaration| self.emitted.insert(declaration.text.clone())),
        );
        out
    }

    fn tag(&mut self, node: &'a Node<Clang>) -> Vec<Declaration> {
        if self.index.has_typedef_sibling(node.id) {
            debug!("{} is emitted with its typedef", debug_comment(node));
            return Vec::new();
        }
        if is_definition(node) {
            if self.defined.contains(&node.id) {
                return Vec::new();
            }
            let texts = self.flattener().definition(node);
            return tag_declarations(texts).collect();
        }
        match (tag_kind(node), tag_name(node)) {
            (Some(kind @ (TagKind::Struct | TagKind::Union)), Some(name)) => vec![Declaration::new(
                DeclarationKind::StructUnionEnum,
                format!("{} {name};", kind.keyword()),
            )],
            _ => Vec::new(),
        }
    }

    fn function(
        &mut self,
        name: &str,
        storage_class: Option<&str>,
        spelling: &str,
    ) -> Vec<Declaration> {
        if storage_class == Some("static") {
            debug!("Skipping static function {name}");
            return Vec::new();
        }
        let spelling = clean_spelling(spelling);
        if anonymous_span(&spelling).is_some() {
            debug!("Skipping function {name} with an anonymous type in its signature");
            return Vec::new();
        }
        vec![Declaration::new(
            DeclarationKind::Function,
            format!("{};", declarator(&spelling, name)),
        )]
    }

    fn typedef(&mut self, node: &'a Node<Clang>, name: &str, spelling: &str) -> Vec<Declaration> {
        let Some(ty) = node.inner.first() else {
            return vec![typedef_line(spelling, name)];
        };
        let anonymous = tag_target(ty).and_then(|target| {
            self.tags
                .definition(target.id)
                .filter(|definition| tag_name(definition).is_none())
                .map(|definition| (definition, target.pointer_depth))
        });
        if let Some((definition, pointer_depth)) = anonymous {
            return self.anonymous_typedef(definition, pointer_depth, name);
        }
        if anonymous_span(&clean_spelling(spelling)).is_some() {
            return self.emit_inline_typedef_with_body(ty, spelling, name);
        }

        let desugared = desugar(ty);
        match &desugared.kind {
            Clang::BuiltinType { .. } => vec![typedef_line(spelling, name)],
            Clang::PointerType { .. } => {
                let pointee = desugared.inner.first().map(desugar);
                let text = pointee.and_then(|pointee| match &pointee.kind {
                    Clang::FunctionProtoType { variadic, .. } => {
                        prototype_pointer(pointee, *variadic, name)
                    }
                    _ => None,
                });
                match text {
                    Some(text) => vec![Declaration::new(DeclarationKind::Typedef, text)],
                    None => vec![typedef_line(spelling, name)],
                }
            }
            Clang::RecordType { decl, .. } | Clang::EnumType { decl, .. } => {
                self.named_tag_typedef(node, decl.id, spelling, name)
            }
            Clang::FunctionProtoType { .. }
            | Clang::FunctionNoProtoType { .. }
            | Clang::TypedefType { .. }
            | Clang::ConstantArrayType { .. } => vec![typedef_line(spelling, name)],
            _ => self.emit_inline_typedef_with_body(ty, spelling, name),
        }
    }

    /// `typedef struct NAME ALIAS;`, preceded by the tag's body when this typedef owns it.
    fn named_tag_typedef(
        &mut self,
        node: &Node<Clang>,
        tag: Id,
        spelling: &str,
        name: &str,
    ) -> Vec<Declaration> {
        let canonical = self.tags.canonical(tag);
        let owned = self.index.owning_typedef(canonical) == Some(node.id)
            && !self.defined.contains(&canonical);
        let definition = self.tags.definition(canonical).filter(|_| owned);
        let Some(definition) = definition else {
            return vec![typedef_line(spelling, name)];
        };
        let mut texts = self.flattener().definition(definition);
        let body = texts.pop().unwrap_or_default();
        let mut out: Vec<_> = tag_declarations(texts).collect();
        out.push(Declaration::new(
            DeclarationKind::Typedef,
            format!("{body}\ntypedef {};", declarator(spelling, name)),
        ));
        out
    }

    /// The owning typedef of an anonymous tag carries its body; the others alias it. The body
    /// is written when the first typedef of the tag is reached, whichever one owns it.
    fn anonymous_typedef(
        &mut self,
        definition: &Node<Clang>,
        pointer_depth: usize,
        name: &str,
    ) -> Vec<Declaration> {
        let mut out = self.anonymous_owner_body(definition, name, pointer_depth);
        let Some((first, first_depth)) = self.anonymous_aliases.get(&definition.id) else {
            return out;
        };
        if first == name {
            return out;
        }
        let text = match (*first_depth, pointer_depth) {
            (a, b) if a == b => format!("typedef {first} {name};"),
            (0, 1) => format!("typedef {first} *{name};"),
            _ => {
                debug!("Cannot name the pointee of {first} as {name}");
                return out;
            }
        };
        out.push(Declaration::new(DeclarationKind::Typedef, text));
        out
    }

    /// The bodied typedef of an anonymous tag's owner, the first time the tag is reached. A tag
    /// with no owner in the index is owned by `name`.
    fn anonymous_owner_body(
        &mut self,
        definition: &Node<Clang>,
        name: &str,
        pointer_depth: usize,
    ) -> Vec<Declaration> {
        if self.anonymous_aliases.contains_key(&definition.id) {
            return Vec::new();
        }
        let (owner, owner_depth) = match self.index.owner(definition.id) {
            Some(owner) => (owner.name.clone(), owner.pointer_depth),
            None => (name.to_string(), pointer_depth),
        };
        let keyword = tag_kind(definition).unwrap_or(TagKind::Struct).keyword();
        let mut hoisted = Vec::new();
        let body = self.flattener().body(definition, 0, &mut hoisted);
        let pointer = if owner_depth == 1 { "*" } else { "" };
        let mut out: Vec<_> = tag_declarations(hoisted).collect();
        out.push(Declaration::new(
            DeclarationKind::Typedef,
            format!("typedef {keyword} {body} {pointer}{owner};"),
        ));
        self.anonymous_aliases
            .insert(definition.id, (owner, owner_depth));
        out
    }

    /// A typedef whose spelling embeds an anonymous tag anywhere (for instance an array of one):
    /// the tag's body is written in place of its spelling.
    fn emit_inline_typedef_with_body(
        &mut self,
        ty: &Node<Clang>,
        spelling: &str,
        name: &str,
    ) -> Vec<Declaration> {
        let spelling = clean_spelling(spelling);
        let definition = find_tag(ty).and_then(|id| self.tags.definition(id));
        let (Some(span), Some(definition)) = (anonymous_span(&spelling), definition) else {
            debug!("Typedef {name} of {spelling} has no representable form");
            return Vec::new();
        };
        let mut out = Vec::new();
        if self
            .index
            .owner(definition.id)
            .is_some_and(|owner| owner.pointer_depth == 0)
        {
            out = self.anonymous_owner_body(definition, name, 0);
        }
        if let Some((first, 0)) = self.anonymous_aliases.get(&definition.id) {
            let mut aliased = spelling.clone();
            aliased.replace_range(span, first);
            out.push(typedef_line(&aliased, name));
            return out;
        }
        let keyword = tag_kind(definition).unwrap_or(TagKind::Struct).keyword();
        let mut placeholder = spelling.clone();
        placeholder.replace_range(span, "@");
        let mut hoisted = Vec::new();
        let body = self.flattener().body(definition, 0, &mut hoisted);
        let declaration =
            declarator(&placeholder, name).replacen('@', &format!("{keyword} {body}"), 1);
        out.extend(tag_declarations(hoisted));
        out.push(Declaration::new(
            DeclarationKind::Typedef,
            format!("typedef {declaration};"),
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Fixture, parse};

    fn emit_all(tu: &Node<Clang>, verbose: bool) -> Vec<String> {
        let mut emitter = Emitter::new(tu, verbose);
        tu.inner
            .iter()
            .flat_map(|node| emitter.emit(node))
            .map(|declaration| declaration.text)
            .collect()
    }

    #[test]
    fn owned_named_struct_is_emitted_with_its_typedef() {
        let mut f = Fixture::new("vec.h");
        let fields = vec![f.field("x", "float"), f.field("y", "float")];
        let record = f.record("struct", Some("Vec2"), fields);
        let record_type = f.tag_type(&record);
        let elaborated = f.elaborated(record_type, Some(&record));
        let typedef = f.typedef("vec2_t", elaborated);
        let tu = parse(f.translation_unit(vec![record, typedef]));

        assert_eq!(
            emit_all(&tu, false),
            ["struct Vec2 {\n  float x;\n  float y;\n};\ntypedef struct Vec2 vec2_t;"]
        );
    }

    #[test]
    fn typedef_dispatch() {
        let mut f = Fixture::new("types.h");
        let ulong = f.builtin("unsigned long");
        let size = f.typedef("size_type", ulong);
        let int = f.builtin("int");
        let chars = f.builtin("char");
        let char_ptr = f.pointer("char *", chars);
        let void = f.builtin("void");
        let prototype = f.prototype("void (int, char *)", void, vec![int, char_ptr], false);
        let paren = f.paren(prototype);
        let callback_ptr = f.pointer("void (*)(int, char *)", paren);
        let callback = f.typedef("callback_t", callback_ptr);
        let int_ret = f.builtin("int");
        let empty = f.prototype("int (void)", int_ret, vec![], false);
        let getter_ptr = f.pointer("int (*)(void)", empty);
        let getter = f.typedef("getter_t", getter_ptr);
        let size_ref = f.typedef_type(&size);
        let alias = f.typedef("length_type", size_ref);
        let element = f.builtin("int");
        let array = f.array("int [16]", 16, element);
        let block = f.typedef("block_t", array);
        let tu = parse(f.translation_unit(vec![size, callback, getter, alias, block]));

        assert_eq!(
            emit_all(&tu, false),
            [
                "typedef unsigned long size_type;",
                "typedef void (*callback_t)(int, char *);",
                "typedef int (*getter_t)(void);",
                "typedef size_type length_type;",
                "typedef int block_t[16];",
            ]
        );
    }

    #[test]
    fn later_typedefs_of_an_anonymous_tag_alias_the_first() {
        let mut f = Fixture::new("handle.h");
        let fields = vec![f.field("fd", "int")];
        let record = f.record("struct", None, fields);
        let spelling = Fixture::spelling(&record);
        let record_type = f.tag_type(&record);
        let elaborated = f.elaborated(record_type, Some(&record));
        let handle = f.typedef("handle_t", elaborated);
        let record_type = f.tag_type(&record);
        let pointer = f.pointer(&format!("{spelling} *"), record_type);
        let handle_ptr = f.typedef("handle_ptr", pointer);
        let record_type = f.tag_type(&record);
        let array = f.array(&format!("{spelling} [2]"), 2, record_type);
        let pair = f.typedef("handle_pair", array);
        let tu = parse(f.translation_unit(vec![record, handle, handle_ptr, pair]));

        assert_eq!(
            emit_all(&tu, false),
            [
                "typedef struct {\n  int fd;\n} handle_t;",
                "typedef handle_t *handle_ptr;",
                "typedef handle_t handle_pair[2];",
            ]
        );
    }

    #[test]
    fn pointer_typedef_before_direct_typedef_keeps_both() {
        // typedef struct { int a; } *PA, A;
        let mut f = Fixture::new("pa.h");
        let fields = vec![f.field("a", "int")];
        let record = f.record("struct", None, fields);
        let spelling = Fixture::spelling(&record);
        let record_type = f.tag_type(&record);
        let elaborated = f.elaborated(record_type, Some(&record));
        let pointer = f.pointer(&format!("{spelling} *"), elaborated);
        let pa = f.typedef("PA", pointer);
        let record_type = f.tag_type(&record);
        let elaborated = f.elaborated(record_type, Some(&record));
        let a = f.typedef("A", elaborated);
        let tu = parse(f.translation_unit(vec![record, pa, a]));

        assert_eq!(
            emit_all(&tu, false),
            ["typedef struct {\n  int a;\n} A;", "typedef A *PA;"]
        );
    }

    #[test]
    fn functions_forward_declarations_and_skipped_nodes() {
        let mut f = Fixture::new("api.h");
        let forward = f.forward_record("struct", "Opaque");
        let open = f.function("api_open", "struct Opaque *(const char *, int)", None);
        let helper = f.function("api_helper", "int (void)", Some("static"));
        let log = f.function("api_log", "void (const char *, ...)", Some("extern"));
        let global = f.variable("api_version", "int");
        let tu = parse(f.translation_unit(vec![forward, open, helper, log, global]));

        assert_eq!(
            emit_all(&tu, false),
            [
                "struct Opaque;",
                "struct Opaque *api_open(const char *, int);",
                "void api_log(const char *, ...);",
            ]
        );
        let verbose = emit_all(&tu, true);
        assert_eq!(verbose[0], "/* [RecordDecl Opaque @ api.h:1:1] */");
        assert_eq!(verbose.last().unwrap(), "/* [VarDecl api_version @ api.h:5:1] */");
    }

    #[test]
    fn duplicate_declarations_are_emitted_once() {
        let mut f = Fixture::new("dup.h");
        let first = f.function("dup", "int (int)", None);
        let second = f.function("dup", "int (int)", None);
        let tu = parse(f.translation_unit(vec![first, second]));
        assert_eq!(emit_all(&tu, false), ["int dup(int);"]);
    }
}
