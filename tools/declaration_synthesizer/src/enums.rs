//! Enumerator rendering and the literal format shared with resolved macros.

use c_ast::Clang;
use clang_ast::Node;
use serde_json::Value;
use tracing::warn;

/// Formats a constant the way it is emitted: small values in decimal, larger ones as hex
/// zero-padded to 2, 4 or 8 digits, and anything negative or wider than 32 bits in decimal.
pub fn format_constant(value: i128) -> String {
    match value {
        0..=0xf => value.to_string(),
        0x10..=0xff => format!("0x{value:02x}"),
        0x100..=0xffff => format!("0x{value:04x}"),
        0x1_0000..=0xffff_ffff => format!("0x{value:08x}"),
        _ => value.to_string(),
    }
}

fn parse_value(value: &Value) -> Option<i128> {
    match value {
        Value::String(text) => text.trim().parse().ok(),
        Value::Number(number) => number
            .as_i64()
            .map(i128::from)
            .or_else(|| number.as_u64().map(i128::from)),
        _ => None,
    }
}

fn evaluated(node: &Node<Clang>) -> Option<i128> {
    match &node.kind {
        Clang::ConstantExpr {
            value: Some(value), ..
        }
        | Clang::IntegerLiteral {
            value: Some(value), ..
        } => parse_value(value),
        Clang::ConstantExpr { value: None, .. } => node.inner.first().and_then(evaluated),
        Clang::Other {
            kind: Some(kind), ..
        } if matches!(
            kind.as_str(),
            "ImplicitCastExpr" | "CStyleCastExpr" | "ParenExpr"
        ) =>
        {
            node.inner.first().and_then(evaluated)
        }
        _ => None,
    }
}

/// The value Clang computed for the initializer attached to `node` (an enumerator or a
/// bit-field), if any.
pub fn constant_value(node: &Node<Clang>) -> Option<i128> {
    node.inner.iter().find_map(evaluated)
}

/// Renders the enumerators of an `EnumDecl` as `NAME = VALUE,` lines at `depth`.
pub fn render_enumerators(node: &Node<Clang>, depth: usize) -> Vec<String> {
    let indent = "  ".repeat(depth);
    let mut next = 0i128;
    let mut lines = Vec::new();
    for child in &node.inner {
        let Clang::EnumConstantDecl { name, .. } = &child.kind else {
            continue;
        };
        let value = match constant_value(child) {
            Some(value) => value,
            None => {
                if !child.inner.is_empty() {
                    warn!("Initializer of enumerator {name} was not evaluated; assuming {next}");
                }
                next
            }
        };
        next = value + 1;
        lines.push(format!("{indent}{name} = {},", format_constant(value)));
    }
    lines
}
