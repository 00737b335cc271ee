//! Builders for Clang-shaped JSON ASTs and a [`Frontend`] that serves them.

use c_ast::{Clang, Frontend, FrontendError, ParseOptions, PreprocessedUnit};
use clang_ast::Node;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub fn parse(json: Value) -> Node<Clang> {
    serde_json::from_value(json).unwrap()
}

pub fn id_of(node: &Value) -> Value {
    node["id"].clone()
}

fn qual_of(node: &Value) -> String {
    node["type"]["qualType"].as_str().unwrap_or_default().to_string()
}

/// Hands out ids and source lines so fixture declarations look like one parsed header.
pub struct Fixture {
    file: String,
    next_id: u64,
    lines: HashMap<String, usize>,
    files: Vec<String>,
    defines: Vec<(String, usize, String)>,
}

impl Fixture {
    pub fn new(file: &str) -> Fixture {
        Fixture {
            file: file.to_string(),
            next_id: 0x100,
            lines: HashMap::new(),
            files: vec![file.to_string()],
            defines: Vec::new(),
        }
    }

    /// Subsequent declarations and defines come from `file`.
    pub fn in_file(&mut self, file: &str) -> &mut Fixture {
        if !self.files.iter().any(|f| f == file) {
            self.files.push(file.to_string());
        }
        self.file = file.to_string();
        self
    }

    fn id(&mut self) -> String {
        self.next_id += 1;
        format!("0x{:x}", self.next_id)
    }

    fn next_line(&mut self) -> usize {
        let line = self.lines.entry(self.file.clone()).or_insert(0);
        *line += 1;
        *line
    }

    fn loc(&mut self) -> Value {
        let line = self.next_line();
        json!({"offset": line * 40, "file": self.file, "line": line, "col": 1, "tokLen": 1})
    }

    pub fn record(&mut self, tag: &str, name: Option<&str>, fields: Vec<Value>) -> Value {
        let mut decl = json!({
            "id": self.id(), "kind": "RecordDecl", "loc": self.loc(),
            "tagUsed": tag, "completeDefinition": true, "inner": fields,
        });
        if let Some(name) = name {
            decl["name"] = json!(name);
        }
        decl
    }

    pub fn forward_record(&mut self, tag: &str, name: &str) -> Value {
        json!({"id": self.id(), "kind": "RecordDecl", "loc": self.loc(), "name": name, "tagUsed": tag})
    }

    pub fn field(&mut self, name: &str, qual: &str) -> Value {
        json!({"id": self.id(), "kind": "FieldDecl", "loc": self.loc(), "name": name, "type": {"qualType": qual}})
    }

    /// The unnamed member Clang adds for a C11 anonymous struct/union.
    pub fn implicit_field(&mut self, qual: &str) -> Value {
        json!({"id": self.id(), "kind": "FieldDecl", "loc": self.loc(), "isImplicit": true, "type": {"qualType": qual}})
    }

    pub fn bitfield(&mut self, name: &str, qual: &str, width: u32) -> Value {
        json!({
            "id": self.id(), "kind": "FieldDecl", "loc": self.loc(), "name": name,
            "type": {"qualType": qual}, "isBitfield": true,
            "inner": [{"id": self.id(), "kind": "ConstantExpr", "value": width.to_string()}],
        })
    }

    pub fn enumeration(&mut self, name: Option<&str>, constants: Vec<Value>) -> Value {
        let mut decl = json!({"id": self.id(), "kind": "EnumDecl", "loc": self.loc(), "inner": constants});
        if let Some(name) = name {
            decl["name"] = json!(name);
        }
        decl
    }

    pub fn enumerator(&mut self, name: &str, value: Option<Value>) -> Value {
        let mut decl = json!({
            "id": self.id(), "kind": "EnumConstantDecl", "loc": self.loc(),
            "name": name, "type": {"qualType": "int"},
        });
        if let Some(value) = value {
            decl["inner"] = json!([{"id": self.id(), "kind": "ConstantExpr", "value": value}]);
        }
        decl
    }

    pub fn typedef(&mut self, name: &str, ty: Value) -> Value {
        json!({
            "id": self.id(), "kind": "TypedefDecl", "loc": self.loc(), "name": name,
            "type": {"qualType": qual_of(&ty)}, "inner": [ty],
        })
    }

    pub fn function(&mut self, name: &str, qual: &str, storage: Option<&str>) -> Value {
        let mut decl = json!({
            "id": self.id(), "kind": "FunctionDecl", "loc": self.loc(), "name": name,
            "type": {"qualType": qual},
        });
        if let Some(storage) = storage {
            decl["storageClass"] = json!(storage);
        }
        decl
    }

    pub fn variable(&mut self, name: &str, qual: &str) -> Value {
        json!({
            "id": self.id(), "kind": "VarDecl", "loc": self.loc(), "name": name,
            "type": {"qualType": qual}, "storageClass": "extern",
        })
    }

    pub fn define(&mut self, name: &str, body: &str) {
        let line = self.next_line();
        let text = format!("#define {name} {body}").trim_end().to_string();
        self.defines.push((self.file.clone(), line, text));
    }

    pub fn undef(&mut self, name: &str) {
        let line = self.next_line();
        self.defines
            .push((self.file.clone(), line, format!("#undef {name}")));
    }

    /// How Clang spells the type of `decl` (`struct Foo`, `struct (unnamed struct at f.h:3:1)`).
    pub fn spelling(decl: &Value) -> String {
        let keyword = decl["tagUsed"].as_str().unwrap_or("enum");
        match decl["name"].as_str() {
            Some(name) => format!("{keyword} {name}"),
            None => format!(
                "{keyword} (unnamed {keyword} at {}:{}:1)",
                decl["loc"]["file"].as_str().unwrap_or_default(),
                decl["loc"]["line"]
            ),
        }
    }

    pub fn builtin(&mut self, qual: &str) -> Value {
        json!({"id": self.id(), "kind": "BuiltinType", "type": {"qualType": qual}})
    }

    pub fn pointer(&mut self, qual: &str, pointee: Value) -> Value {
        json!({"id": self.id(), "kind": "PointerType", "type": {"qualType": qual}, "inner": [pointee]})
    }

    pub fn tag_type(&mut self, decl: &Value) -> Value {
        let kind = if decl["kind"] == "EnumDecl" {
            "EnumType"
        } else {
            "RecordType"
        };
        json!({
            "id": self.id(), "kind": kind, "type": {"qualType": Fixture::spelling(decl)},
            "decl": {"id": id_of(decl), "kind": decl["kind"], "name": decl["name"].as_str().unwrap_or("")},
        })
    }

    /// `struct Foo` as written; `owned` marks the declaration that defined the tag in place.
    pub fn elaborated(&mut self, inner: Value, owned: Option<&Value>) -> Value {
        let mut ty = json!({
            "id": self.id(), "kind": "ElaboratedType", "type": {"qualType": qual_of(&inner)},
            "inner": [inner],
        });
        if let Some(owned) = owned {
            ty["ownedTagDecl"] = json!({"id": id_of(owned), "kind": owned["kind"], "name": owned["name"].as_str().unwrap_or("")});
        }
        ty
    }

    pub fn typedef_type(&mut self, typedef: &Value) -> Value {
        let name = typedef["name"].as_str().unwrap_or_default();
        json!({
            "id": self.id(), "kind": "TypedefType", "type": {"qualType": name},
            "decl": {"id": id_of(typedef), "kind": "TypedefDecl", "name": name},
        })
    }

    pub fn prototype(&mut self, qual: &str, ret: Value, params: Vec<Value>, variadic: bool) -> Value {
        let mut inner = vec![ret];
        inner.extend(params);
        let mut ty = json!({"id": self.id(), "kind": "FunctionProtoType", "type": {"qualType": qual}, "inner": inner});
        if variadic {
            ty["variadic"] = json!(true);
        }
        ty
    }

    pub fn paren(&mut self, inner: Value) -> Value {
        json!({"id": self.id(), "kind": "ParenType", "type": {"qualType": qual_of(&inner)}, "inner": [inner]})
    }

    pub fn array(&mut self, qual: &str, size: u64, element: Value) -> Value {
        json!({"id": self.id(), "kind": "ConstantArrayType", "type": {"qualType": qual}, "size": size, "inner": [element]})
    }

    pub fn translation_unit(&mut self, decls: Vec<Value>) -> Value {
        json!({"id": "0x1", "kind": "TranslationUnitDecl", "loc": {}, "range": {}, "inner": decls})
    }

    /// The `clang -E -dD` output matching the defines and declaration lines handed out so far.
    pub fn preprocessed(&self) -> String {
        let mut text = String::new();
        for file in &self.files {
            text.push_str(&format!("# 1 \"{file}\"\n"));
            let last = self.lines.get(file).copied().unwrap_or(0);
            for line in 1..=last {
                let define = self
                    .defines
                    .iter()
                    .find(|(f, l, _)| f == file && *l == line)
                    .map_or("", |(_, _, directive)| directive.as_str());
                text.push_str(define);
                text.push('\n');
            }
        }
        text
    }
}

/// The AST of a probe unit in which each `(enum name, macro, value)` was evaluated; a `None`
/// value models an initializer Clang rejected.
pub fn probe_ast(entries: &[(&str, &str, Option<i128>)]) -> Value {
    let inner: Vec<Value> = entries
        .iter()
        .enumerate()
        .map(|(i, (enum_name, macro_name, value))| {
            let mut constant = json!({
                "id": format!("0x{:x}", 0x9000 + i * 4), "kind": "EnumConstantDecl",
                "name": format!("__{macro_name}"), "type": {"qualType": "int"},
            });
            if let Some(value) = value {
                constant["inner"] = json!([{
                    "id": format!("0x{:x}", 0x9001 + i * 4), "kind": "ConstantExpr",
                    "value": value.to_string(),
                }]);
            }
            json!({
                "id": format!("0x{:x}", 0x9002 + i * 4), "kind": "EnumDecl",
                "name": enum_name, "inner": [constant],
            })
        })
        .collect();
    json!({"id": "0x1", "kind": "TranslationUnitDecl", "inner": inner})
}

/// A [`Frontend`] serving canned ASTs. Parsing a `.c` file is treated as the macro probe: its
/// source is captured and `probe` is returned.
pub struct FixtureFrontend {
    pub ast: Value,
    pub preprocessed: String,
    pub probe: Option<Value>,
    pub probe_source: RefCell<Option<String>>,
    pub probe_path: RefCell<Option<PathBuf>>,
}

impl FixtureFrontend {
    pub fn new(ast: Value, preprocessed: String) -> FixtureFrontend {
        FixtureFrontend {
            ast,
            preprocessed,
            probe: None,
            probe_source: RefCell::new(None),
            probe_path: RefCell::new(None),
        }
    }

    pub fn with_probe(mut self, probe: Value) -> FixtureFrontend {
        self.probe = Some(probe);
        self
    }
}

impl Frontend for FixtureFrontend {
    fn parse_ast(
        &self,
        source: &Path,
        _options: &ParseOptions,
    ) -> Result<Node<Clang>, FrontendError> {
        if source.extension().is_some_and(|ext| ext == "c") {
            *self.probe_source.borrow_mut() = std::fs::read_to_string(source).ok();
            *self.probe_path.borrow_mut() = Some(source.to_path_buf());
            return match &self.probe {
                Some(probe) => Ok(parse(probe.clone())),
                None => Err(FrontendError::NotTranslationUnit {
                    path: source.to_path_buf(),
                }),
            };
        }
        Ok(parse(self.ast.clone()))
    }

    fn preprocess(
        &self,
        _source: &Path,
        _options: &ParseOptions,
    ) -> Result<PreprocessedUnit, FrontendError> {
        Ok(PreprocessedUnit::parse(&self.preprocessed))
    }
}

#[test]
fn fixture_objects_deserialize_as_clang_nodes() {
    let mut f = Fixture::new("order.h");
    let fields = vec![f.field("x", "int")];
    let record = f.record("struct", Some("Order"), fields);
    let tu = parse(f.translation_unit(vec![record]));
    assert!(matches!(tu.kind, Clang::TranslationUnitDecl));
    let record = &tu.inner[0];
    assert_eq!(record.kind.name(), Some("Order"));
    assert!(matches!(record.inner[0].kind, Clang::FieldDecl { .. }));
}
