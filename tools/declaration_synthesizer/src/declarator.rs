//! Turns Clang's abstract type spellings (`int [4]`, `void (*)(int)`) into declarators that
//! name something (`int name[4]`, `void (*name)(int)`).

const ATTRIBUTE: &str = "__attribute__";

/// Qualifiers Clang prints that restricted C parsers reject.
const DROPPED_WORDS: [&str; 6] = [
    "_Nullable_result",
    "_Nullable",
    "_Nonnull",
    "_Null_unspecified",
    "__restrict__",
    "__restrict",
];

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Removes `__attribute__((...))` groups and compiler-specific qualifiers from a type
/// spelling and normalizes whitespace.
pub fn clean_spelling(spelling: &str) -> String {
    let mut out = String::with_capacity(spelling.len());
    let mut rest = spelling;
    while let Some(start) = rest.find(ATTRIBUTE) {
        out.push_str(&rest[..start]);
        let after = rest[start + ATTRIBUTE.len()..].trim_start();
        match balanced_end(after) {
            Some(end) => rest = &after[end..],
            None => {
                out.push_str(ATTRIBUTE);
                rest = after;
            }
        }
    }
    out.push_str(rest);

    for word in DROPPED_WORDS {
        let mut from = 0;
        while let Some(found) = out[from..].find(word).map(|at| at + from) {
            let end = found + word.len();
            let bounded = !out[..found].ends_with(is_ident_char)
                && !out[end..].starts_with(is_ident_char);
            if bounded {
                out.replace_range(found..end, "");
                from = found;
            } else {
                from = end;
            }
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// For text starting with `(`, returns the index just past the matching `)`.
fn balanced_end(text: &str) -> Option<usize> {
    if !text.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Finds where the name goes in a pointer-to-function or pointer-to-array spelling: after the
/// `(*` that opens the outermost parenthesized declarator.
fn pointer_hole(spelling: &str) -> Option<usize> {
    let open = spelling.find('(')?;
    let after = spelling[open + 1..].trim_start();
    if !after.starts_with('*') {
        return None;
    }
    let from = spelling.len() - after.len();
    let offset = spelling[from..].find([')', '[', '('])?;
    Some(from + offset)
}

fn join(head: &str, name: &str) -> String {
    if head.ends_with(['*', '(']) {
        format!("{head}{name}")
    } else {
        format!("{head} {name}")
    }
}

/// Builds the declarator declaring `name` with the type spelled `spelling`. An empty name
/// yields the cleaned spelling alone.
pub fn declarator(spelling: &str, name: &str) -> String {
    let spelling = clean_spelling(spelling);
    if name.is_empty() {
        return spelling;
    }
    if let Some(hole) = pointer_hole(&spelling) {
        let (head, tail) = spelling.split_at(hole);
        let separator = if head.ends_with(is_ident_char) { " " } else { "" };
        return format!("{head}{separator}{name}{tail}");
    }
    let suffix_open = if spelling.ends_with(']') {
        spelling.find('[')
    } else if spelling.ends_with(')') {
        spelling.find('(')
    } else {
        None
    };
    match suffix_open {
        Some(at) => {
            let (head, tail) = spelling.split_at(at);
            format!("{}{tail}", join(head.trim_end(), name))
        }
        None => join(&spelling, name),
    }
}

/// Locates the `struct (unnamed struct at file.h:3:5)` part of a spelling that refers to an
/// anonymous tag, keyword included.
pub fn anonymous_span(spelling: &str) -> Option<std::ops::Range<usize>> {
    let paren = spelling
        .find("(unnamed")
        .or_else(|| spelling.find("(anonymous"))?;
    let end = paren + balanced_end(&spelling[paren..])?;
    let head = spelling[..paren].trim_end();
    let start = ["struct", "union", "enum"]
        .iter()
        .find(|keyword| head.ends_with(*keyword))
        .map_or(paren, |keyword| head.len() - keyword.len());
    Some(start..end)
}
