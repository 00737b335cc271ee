//! The C front end used by cdefgen: a typed view of Clang's JSON AST dump plus the macro
//! definition stream that the AST dump does not carry.
//!
//! Everything downstream talks to the front end through [`Frontend`], so the synthesizer can be
//! driven by real `clang` ([`ClangFrontend`]) or by canned fixtures in tests.

mod clang;
mod preprocessed;
pub mod token;

pub use clang::ClangFrontend;
pub use preprocessed::{MacroDefinition, MacroDirective, PreprocessedUnit};

use clang_ast::{BareSourceLocation, Node};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Represents a (possibly) qualified type in the Clang AST, such as `int`, `const int`, or `const volatile int`.
/// Clang Docs on QualType: https://clang.llvm.org/doxygen/classclang_1_1QualType.html
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QualType {
    /// String representation of the desugared type, i.e., it will have `typedefs` and `typeofs` resolved.
    #[serde(rename = "desugaredQualType")]
    pub desugared_qual_type: Option<String>,
    /// String representation of the type as written in the source code, i.e., it may include `typedefs` and `typeofs`.
    #[serde(rename = "qualType")]
    pub qual_type: String,
}

/// A bare reference to a declaration, as attached to `RecordType`, `EnumType` and friends.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeclRef {
    pub id: clang_ast::Id,
    pub kind: Option<String>,
    pub name: Option<String>,
}

/// Represents a node in the Clang AST.
/// Only the declaration, type and constant-expression nodes the synthesizer reads are modelled;
/// everything else lands in `Other`.
#[derive(Serialize, Deserialize, Debug)]
pub enum Clang {
    TranslationUnitDecl,
    /// Clang Docs: https://clang.llvm.org/doxygen/classclang_1_1TypedefDecl.html
    TypedefDecl {
        loc: Option<clang_ast::SourceLocation>,
        range: Option<clang_ast::SourceRange>,
        name: String,
        /// The underlying type.
        #[serde(rename = "type")]
        qtype: QualType,
        #[serde(rename = "isImplicit", default)]
        is_implicit: bool,
    },
    /// Represents a record (struct/union) declaration in the Clang AST.
    /// Clang Docs: https://clang.llvm.org/doxygen/classclang_1_1RecordDecl.html
    RecordDecl {
        loc: Option<clang_ast::SourceLocation>,
        range: Option<clang_ast::SourceRange>,
        name: Option<String>,
        #[serde(rename = "tagUsed")]
        tag_used: Option<String>,
        #[serde(rename = "completeDefinition", default)]
        complete_definition: bool,
        #[serde(rename = "isImplicit", default)]
        is_implicit: bool,
    },
    /// Clang Docs: https://clang.llvm.org/doxygen/classclang_1_1EnumDecl.html
    EnumDecl {
        loc: Option<clang_ast::SourceLocation>,
        range: Option<clang_ast::SourceRange>,
        name: Option<String>,
    },
    EnumConstantDecl {
        loc: Option<clang_ast::SourceLocation>,
        range: Option<clang_ast::SourceRange>,
        name: String,
        #[serde(rename = "type")]
        qtype: QualType,
    },
    FieldDecl {
        loc: Option<clang_ast::SourceLocation>,
        range: Option<clang_ast::SourceRange>,
        name: Option<String>,
        #[serde(rename = "type")]
        qtype: QualType,
        #[serde(rename = "isBitfield", default)]
        is_bitfield: bool,
        #[serde(rename = "isImplicit", default)]
        is_implicit: bool,
    },
    /// Represents a function declaration in the Clang AST.
    /// Clang Docs: https://clang.llvm.org/doxygen/classclang_1_1FunctionDecl.html
    FunctionDecl {
        loc: Option<clang_ast::SourceLocation>,
        range: Option<clang_ast::SourceRange>,
        name: String,
        #[serde(rename = "storageClass")]
        storage_class: Option<String>,
        #[serde(rename = "type")]
        qtype: QualType,
        #[serde(rename = "isImplicit", default)]
        is_implicit: bool,
    },
    ParmVarDecl {
        loc: Option<clang_ast::SourceLocation>,
        range: Option<clang_ast::SourceRange>,
        name: Option<String>,
        #[serde(rename = "type")]
        qtype: QualType,
    },
    VarDecl {
        loc: Option<clang_ast::SourceLocation>,
        range: Option<clang_ast::SourceRange>,
        name: String,
        #[serde(rename = "type")]
        qtype: QualType,
        #[serde(rename = "storageClass")]
        storage_class: Option<String>,
    },
    BuiltinType {
        #[serde(rename = "type")]
        qtype: QualType,
    },
    PointerType {
        #[serde(rename = "type")]
        qtype: QualType,
    },
    RecordType {
        #[serde(rename = "type")]
        qtype: QualType,
        decl: DeclRef,
    },
    EnumType {
        #[serde(rename = "type")]
        qtype: QualType,
        decl: DeclRef,
    },
    /// `struct Foo` as written. When the tag was declared by the same declaration (the
    /// `typedef struct Foo { .. } Foo;` idiom) `owned_tag_decl` names it.
    ElaboratedType {
        #[serde(rename = "type")]
        qtype: QualType,
        #[serde(rename = "ownedTagDecl")]
        owned_tag_decl: Option<DeclRef>,
    },
    TypedefType {
        #[serde(rename = "type")]
        qtype: QualType,
        decl: DeclRef,
    },
    /// Children are the return type followed by the parameter types.
    FunctionProtoType {
        #[serde(rename = "type")]
        qtype: QualType,
        #[serde(default)]
        variadic: bool,
    },
    FunctionNoProtoType {
        #[serde(rename = "type")]
        qtype: QualType,
    },
    ConstantArrayType {
        #[serde(rename = "type")]
        qtype: QualType,
        size: Option<u64>,
    },
    ParenType {
        #[serde(rename = "type")]
        qtype: QualType,
    },
    QualType {
        #[serde(rename = "type")]
        qtype: QualType,
        qualifiers: Option<String>,
    },
    /// An evaluated constant; `value` is present once Clang folded the expression.
    ConstantExpr {
        range: Option<clang_ast::SourceRange>,
        value: Option<serde_json::Value>,
    },
    IntegerLiteral {
        range: Option<clang_ast::SourceRange>,
        value: Option<serde_json::Value>,
    },
    /// Every other node (not relevant to declaration synthesis). Locations are still
    /// deserialized so that Clang's elided file names are tracked across nodes.
    Other {
        kind: Option<String>,
        loc: Option<clang_ast::SourceLocation>,
        range: Option<clang_ast::SourceRange>,
    },
}

impl Clang {
    /// Returns the source location of this AST node, if available.
    pub fn loc(&self) -> Option<&clang_ast::SourceLocation> {
        match self {
            Clang::TypedefDecl { loc, .. }
            | Clang::RecordDecl { loc, .. }
            | Clang::EnumDecl { loc, .. }
            | Clang::EnumConstantDecl { loc, .. }
            | Clang::FieldDecl { loc, .. }
            | Clang::FunctionDecl { loc, .. }
            | Clang::ParmVarDecl { loc, .. }
            | Clang::VarDecl { loc, .. } => loc.as_ref(),
            _ => None,
        }
    }

    /// Returns the location this node was written at once macro expansion is accounted for:
    /// the expansion location when there is one, the spelling location otherwise.
    pub fn origin(&self) -> Option<&BareSourceLocation> {
        let loc = self.loc()?;
        loc.expansion_loc.as_ref().or(loc.spelling_loc.as_ref())
    }

    /// Returns the name of this declaration. Anonymous records and enums return `None`.
    pub fn name(&self) -> Option<&str> {
        match self {
            Clang::TypedefDecl { name, .. }
            | Clang::EnumConstantDecl { name, .. }
            | Clang::FunctionDecl { name, .. }
            | Clang::VarDecl { name, .. } => Some(name),
            Clang::RecordDecl { name, .. }
            | Clang::EnumDecl { name, .. }
            | Clang::FieldDecl { name, .. }
            | Clang::ParmVarDecl { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    /// Returns the type spelling carried by this node, for declarations and type nodes alike.
    pub fn qual_type(&self) -> Option<&QualType> {
        match self {
            Clang::TypedefDecl { qtype, .. }
            | Clang::EnumConstantDecl { qtype, .. }
            | Clang::FieldDecl { qtype, .. }
            | Clang::FunctionDecl { qtype, .. }
            | Clang::ParmVarDecl { qtype, .. }
            | Clang::VarDecl { qtype, .. }
            | Clang::BuiltinType { qtype }
            | Clang::PointerType { qtype }
            | Clang::RecordType { qtype, .. }
            | Clang::EnumType { qtype, .. }
            | Clang::ElaboratedType { qtype, .. }
            | Clang::TypedefType { qtype, .. }
            | Clang::FunctionProtoType { qtype, .. }
            | Clang::FunctionNoProtoType { qtype }
            | Clang::ConstantArrayType { qtype, .. }
            | Clang::ParenType { qtype }
            | Clang::QualType { qtype, .. } => Some(qtype),
            _ => None,
        }
    }

    /// The Clang kind name of this node, used for debug output.
    pub fn kind_name(&self) -> &str {
        match self {
            Clang::TranslationUnitDecl => "TranslationUnitDecl",
            Clang::TypedefDecl { .. } => "TypedefDecl",
            Clang::RecordDecl { .. } => "RecordDecl",
            Clang::EnumDecl { .. } => "EnumDecl",
            Clang::EnumConstantDecl { .. } => "EnumConstantDecl",
            Clang::FieldDecl { .. } => "FieldDecl",
            Clang::FunctionDecl { .. } => "FunctionDecl",
            Clang::ParmVarDecl { .. } => "ParmVarDecl",
            Clang::VarDecl { .. } => "VarDecl",
            Clang::BuiltinType { .. } => "BuiltinType",
            Clang::PointerType { .. } => "PointerType",
            Clang::RecordType { .. } => "RecordType",
            Clang::EnumType { .. } => "EnumType",
            Clang::ElaboratedType { .. } => "ElaboratedType",
            Clang::TypedefType { .. } => "TypedefType",
            Clang::FunctionProtoType { .. } => "FunctionProtoType",
            Clang::FunctionNoProtoType { .. } => "FunctionNoProtoType",
            Clang::ConstantArrayType { .. } => "ConstantArrayType",
            Clang::ParenType { .. } => "ParenType",
            Clang::QualType { .. } => "QualType",
            Clang::ConstantExpr { .. } => "ConstantExpr",
            Clang::IntegerLiteral { .. } => "IntegerLiteral",
            Clang::Other { kind, .. } => kind.as_deref().unwrap_or("Other"),
        }
    }
}

/// Include directories and preprocessor defines handed to every front-end invocation.
#[derive(Clone, Debug, Default)]
pub struct ParseOptions {
    pub include_dirs: Vec<PathBuf>,
    /// `NAME` or `NAME=VALUE`, as given to `-D`.
    pub defines: Vec<String>,
}

impl ParseOptions {
    /// The `-I`/`-D` arguments for these options.
    pub fn compiler_args(&self) -> Vec<String> {
        self.include_dirs
            .iter()
            .map(|dir| format!("-I{}", dir.display()))
            .chain(self.defines.iter().map(|define| format!("-D{define}")))
            .collect()
    }

    /// Names of the macros the caller defined explicitly.
    pub fn defined_names(&self) -> impl Iterator<Item = &str> {
        self.defines
            .iter()
            .map(|define| define.split_once('=').map_or(define.as_str(), |(name, _)| name))
    }
}

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("failed to run {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{executable} failed on {path} ({status}): {stderr}")]
    Failed {
        executable: String,
        path: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("malformed AST dump for {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("AST dump for {path} is not a translation unit")]
    NotTranslationUnit { path: PathBuf },
}

/// The parsing oracle. Implementations turn a source file into a declaration tree and a macro
/// definition stream; nothing else about the front end is visible to the synthesizer.
pub trait Frontend {
    /// Parses `source` into its translation unit.
    fn parse_ast(&self, source: &Path, options: &ParseOptions)
    -> Result<Node<Clang>, FrontendError>;

    /// Runs the preprocessor over `source`, keeping macro definitions in the output.
    fn preprocess(
        &self,
        source: &Path,
        options: &ParseOptions,
    ) -> Result<PreprocessedUnit, FrontendError>;
}

/// Deserializes a JSON AST dump produced by `clang -Xclang -ast-dump=json`.
pub fn ast_from_slice(path: &Path, json: &[u8]) -> Result<Node<Clang>, FrontendError> {
    let ast: Node<Clang> = serde_json::from_slice(json).map_err(|source| FrontendError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if !matches!(ast.kind, Clang::TranslationUnitDecl) {
        return Err(FrontendError::NotTranslationUnit {
            path: path.to_path_buf(),
        });
    }
    Ok(ast)
}
