use std::fmt;
use std::path::Path;

/// What produced a unit of output text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    /// `#define NAME VALUE` with a literal or resolved value.
    MacroDefined,
    /// A macro that could not be reduced to a constant; emitted as a comment.
    MacroNonPrimitive,
    /// A macro with no replacement list; emitted as a comment.
    MacroEmpty,
    Typedef,
    StructUnionEnum,
    Function,
    /// AST debug comments, only produced in verbose mode.
    Verbose,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub text: String,
}

impl Declaration {
    pub fn new<S: Into<String>>(kind: DeclarationKind, text: S) -> Declaration {
        Declaration {
            kind,
            text: text.into(),
        }
    }
}

/// The ordered output of one synthesis run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclarationList(Vec<Declaration>);

impl DeclarationList {
    pub fn iter(&self) -> std::slice::Iter<'_, Declaration> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Texts of the declarations of the given kind, in output order.
    pub fn texts_of(&self, kind: DeclarationKind) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(move |d| d.kind == kind)
            .map(|d| d.text.as_str())
    }

    /// Writes the declaration stream to `path`.
    pub fn materialize(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_string())
    }
}

impl From<Vec<Declaration>> for DeclarationList {
    fn from(declarations: Vec<Declaration>) -> Self {
        DeclarationList(declarations)
    }
}

impl<'a> IntoIterator for &'a DeclarationList {
    type Item = &'a Declaration;
    type IntoIter = std::slice::Iter<'a, Declaration>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for DeclarationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for declaration in &self.0 {
            writeln!(f, "{}", declaration.text)?;
        }
        Ok(())
    }
}
