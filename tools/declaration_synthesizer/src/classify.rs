//! Identifier classification: which spellings are usable names, and which tag declarations are
//! owned by a sibling typedef.
//!
//! Ownership is decided by declaration identity (Clang node ids), never by name, since the
//! interesting case is the anonymous tag that has no name to compare.

use c_ast::Clang;
use clang_ast::{Id, Node};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagKind {
    Struct,
    Union,
    Enum,
}

impl TagKind {
    pub fn keyword(self) -> &'static str {
        match self {
            TagKind::Struct => "struct",
            TagKind::Union => "union",
            TagKind::Enum => "enum",
        }
    }
}

/// True iff `spelling` is exactly one identifier token. Empty names and compiler-made spellings
/// such as `struct (unnamed at x.h:3:9)` are rejected.
pub fn has_valid_spelling(spelling: &str) -> bool {
    let mut chars = spelling.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn tag_kind(node: &Node<Clang>) -> Option<TagKind> {
    match &node.kind {
        Clang::RecordDecl { tag_used, .. } => Some(match tag_used.as_deref() {
            Some("union") => TagKind::Union,
            _ => TagKind::Struct,
        }),
        Clang::EnumDecl { .. } => Some(TagKind::Enum),
        _ => None,
    }
}

/// The tag's name when it has a usable one.
pub fn tag_name(node: &Node<Clang>) -> Option<&str> {
    node.kind.name().filter(|name| has_valid_spelling(name))
}

/// True when `node` carries a body rather than only declaring the tag.
pub fn is_definition(node: &Node<Clang>) -> bool {
    match &node.kind {
        Clang::RecordDecl {
            complete_definition,
            ..
        } => *complete_definition,
        Clang::EnumDecl { .. } => node
            .inner
            .iter()
            .any(|child| matches!(child.kind, Clang::EnumConstantDecl { .. })),
        _ => false,
    }
}

/// Strips parentheses and qualifiers, and at most one level of elaboration. Also reports the
/// tag declaration an elaborated type owns.
fn strip_sugar(mut ty: &Node<Clang>) -> (&Node<Clang>, Option<Id>) {
    let mut owned = None;
    let mut elaborated = false;
    loop {
        match &ty.kind {
            Clang::ParenType { .. } | Clang::QualType { .. } => {}
            Clang::ElaboratedType { owned_tag_decl, .. } if !elaborated => {
                elaborated = true;
                owned = owned_tag_decl.as_ref().map(|decl| decl.id);
            }
            _ => return (ty, owned),
        }
        match ty.inner.first() {
            Some(inner) => ty = inner,
            None => return (ty, owned),
        }
    }
}

/// Like [`strip_sugar`] without the ownership report.
pub fn desugar(ty: &Node<Clang>) -> &Node<Clang> {
    strip_sugar(ty).0
}

/// A tag reached from a type: directly (`pointer_depth == 0`) or through one pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TagTarget {
    pub id: Id,
    pub pointer_depth: usize,
    /// The tag declaration the written type defined in place, if any.
    pub owned: Option<Id>,
}

/// Resolves the tag a typedef's underlying type names, looking through at most one pointer.
pub fn tag_target(ty: &Node<Clang>) -> Option<TagTarget> {
    let (mut ty, mut owned) = strip_sugar(ty);
    let mut pointer_depth = 0;
    if matches!(ty.kind, Clang::PointerType { .. }) {
        pointer_depth = 1;
        (ty, owned) = strip_sugar(ty.inner.first()?);
    }
    match &ty.kind {
        Clang::RecordType { decl, .. } | Clang::EnumType { decl, .. } => Some(TagTarget {
            id: decl.id,
            pointer_depth,
            owned,
        }),
        _ => None,
    }
}

/// Every struct, union and enum declaration in a translation unit, by identity.
pub struct TagTable<'a> {
    by_id: HashMap<Id, &'a Node<Clang>>,
    definitions: HashMap<(TagKind, &'a str), Id>,
}

impl<'a> TagTable<'a> {
    pub fn build(root: &'a Node<Clang>) -> TagTable<'a> {
        let mut table = TagTable {
            by_id: HashMap::new(),
            definitions: HashMap::new(),
        };
        table.collect(root);
        table
    }

    fn collect(&mut self, node: &'a Node<Clang>) {
        for child in &node.inner {
            if let Some(kind) = tag_kind(child) {
                self.by_id.insert(child.id, child);
                if let (true, Some(name)) = (is_definition(child), tag_name(child)) {
                    self.definitions.entry((kind, name)).or_insert(child.id);
                }
                self.collect(child);
            }
        }
    }

    pub fn get(&self, id: Id) -> Option<&'a Node<Clang>> {
        self.by_id.get(&id).copied()
    }

    /// The definition of the tag `id` refers to: the node itself when it has a body, otherwise
    /// the same-named definition elsewhere in the unit.
    pub fn definition(&self, id: Id) -> Option<&'a Node<Clang>> {
        let node = self.get(id)?;
        if is_definition(node) {
            return Some(node);
        }
        let key = (tag_kind(node)?, tag_name(node)?);
        self.definitions.get(&key).and_then(|id| self.get(*id))
    }

    /// The identity used for ownership: the definition's id when one exists.
    pub fn canonical(&self, id: Id) -> Id {
        self.definition(id).map_or(id, |node| node.id)
    }
}

/// The typedef that carries a tag's body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Owner {
    pub typedef: Id,
    pub name: String,
    pub pointer_depth: usize,
}

/// Maps tag definitions of one scope to the typedef that owns them.
///
/// A named tag is owned by a typedef that defines it in place (`typedef struct Foo { .. } Foo;`);
/// front ends that do not report the owned declaration are covered by accepting a direct typedef
/// that immediately follows the definition. An anonymous tag is owned by a typedef that names it
/// directly, or through one pointer when no typedef names it directly.
#[derive(Debug, Default)]
pub struct TypedefIndex {
    owners: HashMap<Id, Owner>,
}

impl TypedefIndex {
    pub fn build(scope: &[Node<Clang>], tags: &TagTable) -> TypedefIndex {
        let mut owners: HashMap<Id, Owner> = HashMap::new();
        for (i, child) in scope.iter().enumerate() {
            let Clang::TypedefDecl { name, .. } = &child.kind else {
                continue;
            };
            let Some(target) = child.inner.first().and_then(tag_target) else {
                continue;
            };
            let Some(definition) = tags.definition(target.id) else {
                continue;
            };
            let owns = if tag_name(definition).is_none() {
                target.pointer_depth <= 1
            } else {
                target.pointer_depth == 0
                    && (target.owned == Some(definition.id)
                        || (i > 0 && scope[i - 1].id == definition.id))
            };
            if !owns {
                continue;
            }
            let owner = Owner {
                typedef: child.id,
                name: name.clone(),
                pointer_depth: target.pointer_depth,
            };
            match owners.get(&definition.id) {
                Some(current) if current.pointer_depth <= owner.pointer_depth => {}
                _ => {
                    owners.insert(definition.id, owner);
                }
            }
        }
        TypedefIndex { owners }
    }

    /// Whether the tag definition `tag` (a canonical id) is folded into a sibling typedef.
    pub fn has_typedef_sibling(&self, tag: Id) -> bool {
        self.owners.contains_key(&tag)
    }

    pub fn owning_typedef(&self, tag: Id) -> Option<Id> {
        self.owners.get(&tag).map(|owner| owner.typedef)
    }

    pub fn owner(&self, tag: Id) -> Option<&Owner> {
        self.owners.get(&tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Fixture, parse};

    #[test]
    fn valid_spellings() {
        assert!(has_valid_spelling("Point"));
        assert!(has_valid_spelling("_private2"));
        assert!(!has_valid_spelling(""));
        assert!(!has_valid_spelling("2d"));
        assert!(!has_valid_spelling("struct Point"));
        assert!(!has_valid_spelling("(unnamed struct at p.h:1:9)"));
    }

    #[test]
    fn anonymous_tag_is_owned_by_its_typedef() {
        let mut f = Fixture::new("point.h");
        let fields = vec![f.field("x", "int"), f.field("y", "int")];
        let record = f.record("struct", None, fields);
        let record_type = f.tag_type(&record);
        let elaborated = f.elaborated(record_type, Some(&record));
        let typedef = f.typedef("Point", elaborated);
        let tu = parse(f.translation_unit(vec![record, typedef]));

        let tags = TagTable::build(&tu);
        let index = TypedefIndex::build(&tu.inner, &tags);
        assert!(index.has_typedef_sibling(tu.inner[0].id));
        assert_eq!(index.owning_typedef(tu.inner[0].id), Some(tu.inner[1].id));
    }

    #[test]
    fn named_tag_ownership_requires_an_in_place_definition() {
        let mut f = Fixture::new("list.h");
        // typedef struct Node Node; struct Node { Node *next; };
        let forward = f.forward_record("struct", "Node");
        let forward_type = f.tag_type(&forward);
        let elaborated = f.elaborated(forward_type, Some(&forward));
        let typedef = f.typedef("Node", elaborated);
        let fields = vec![f.field("next", "Node *")];
        let definition = f.record("struct", Some("Node"), fields);
        // struct Pair { int a; }; typedef struct Pair Pair;
        let pair_fields = vec![f.field("a", "int")];
        let pair = f.record("struct", Some("Pair"), pair_fields);
        let pair_type = f.tag_type(&pair);
        let pair_elaborated = f.elaborated(pair_type, None);
        let pair_typedef = f.typedef("Pair", pair_elaborated);
        let tu = parse(f.translation_unit(vec![forward, typedef, definition, pair, pair_typedef]));

        let tags = TagTable::build(&tu);
        assert_eq!(tags.canonical(tu.inner[0].id), tu.inner[2].id);
        let index = TypedefIndex::build(&tu.inner, &tags);
        assert!(!index.has_typedef_sibling(tu.inner[2].id));
        // No ownedTagDecl, but the typedef immediately follows the definition.
        assert!(index.has_typedef_sibling(tu.inner[3].id));
    }

    #[test]
    fn pointer_typedefs_own_only_anonymous_tags() {
        let mut f = Fixture::new("handles.h");
        let fields = vec![f.field("fd", "int")];
        let anonymous = f.record("struct", None, fields);
        let anonymous_type = f.tag_type(&anonymous);
        let pointer = f.pointer("struct (unnamed) *", anonymous_type);
        let handle = f.typedef("Handle", pointer);
        let named_fields = vec![f.field("fd", "int")];
        let named = f.record("struct", Some("File"), named_fields);
        let named_type = f.tag_type(&named);
        let named_elaborated = f.elaborated(named_type, Some(&named));
        let named_pointer = f.pointer("struct File *", named_elaborated);
        let file_ptr = f.typedef("FilePtr", named_pointer);
        let tu = parse(f.translation_unit(vec![anonymous, handle, named, file_ptr]));

        let tags = TagTable::build(&tu);
        let index = TypedefIndex::build(&tu.inner, &tags);
        assert!(index.has_typedef_sibling(tu.inner[0].id));
        assert!(!index.has_typedef_sibling(tu.inner[2].id));
        let target = tag_target(&tu.inner[3].inner[0]).unwrap();
        assert_eq!(target.pointer_depth, 1);
        assert_eq!(target.id, tu.inner[2].id);
    }

    #[test]
    fn direct_typedef_owns_anonymous_tag_over_earlier_pointer() {
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

        let tags = TagTable::build(&tu);
        let index = TypedefIndex::build(&tu.inner, &tags);
        let owner = index.owner(tu.inner[0].id).unwrap();
        assert_eq!(owner.typedef, tu.inner[2].id);
        assert_eq!(owner.name, "A");
        assert_eq!(owner.pointer_depth, 0);
    }
}
