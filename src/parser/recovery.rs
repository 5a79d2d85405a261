//! Declaration-level error isolation.
//!
//! When a whole-file parse cannot be trusted (unbalanced braces, a parser
//! panic, or syntax errors the parser recovered from), the file is cut into top-level declaration chunks and
//! each chunk is parsed on its own.  Stub files put top-level declarations
//! at column zero, which is what the splitter keys on.  A chunk that still
//! fails is skipped with a `ParseError`; its neighbours are unaffected.
//!
//! Namespace and `use` statements are replayed in front of every chunk so
//! names keep resolving the same way they would in a whole-file parse.

use crate::diagnostics::{Diagnostic, DiagnosticKind};

use super::{ParseFailure, ParseOptions, ParsedFile, parse_source};

const DECLARATION_STARTS: &[&str] = &[
    "/**",
    "#[",
    "function ",
    "function&",
    "class ",
    "abstract ",
    "final ",
    "readonly ",
    "interface ",
    "trait ",
    "enum ",
    "namespace ",
    "use ",
    "const ",
    "define(",
    "if ",
    "if(",
];

/// Whether every `{`, `(` and `[` outside strings and comments is closed,
/// in order.
pub(crate) fn is_balanced(content: &str) -> bool {
    let bytes = content.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'\'' | b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != c {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                match memchr::memmem::find(&bytes[i + 2..], b"*/") {
                    Some(end) => i += end + 3,
                    None => return false,
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = memchr::memchr(b'\n', &bytes[i..]).map_or(bytes.len(), |nl| i + nl);
            }
            b'#' if bytes.get(i + 1) != Some(&b'[') => {
                i = memchr::memchr(b'\n', &bytes[i..]).map_or(bytes.len(), |nl| i + nl);
            }
            b'{' | b'(' | b'[' => stack.push(c),
            b'}' | b')' | b']' => {
                let open = match c {
                    b'}' => b'{',
                    b')' => b'(',
                    _ => b'[',
                };
                if stack.pop() != Some(open) {
                    return false;
                }
            }
            _ => {}
        }
        i += 1;
    }
    stack.is_empty()
}

/// A top-level slice of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk<'a> {
    start: usize,
    text: &'a str,
}

/// Whether a chunk so far already holds a complete declaration, i.e. it
/// is more than a docblock or attribute prefix.
fn holds_declaration(text: &str) -> bool {
    let trimmed = text.trim_end();
    let last_line = trimmed.lines().last().unwrap_or("").trim();
    (trimmed.ends_with('}') || trimmed.ends_with(';'))
        && !last_line.starts_with("#[")
        && !last_line.starts_with('*')
}

fn split_chunks(content: &str) -> Vec<Chunk<'_>> {
    let mut boundaries = vec![0usize];
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let starts = DECLARATION_STARTS.iter().any(|s| line.starts_with(s));
        if starts && offset > 0 {
            let last = boundaries.last().copied().unwrap_or(0);
            if holds_declaration(&content[last..offset]) || content[last..offset].trim().is_empty()
            {
                boundaries.push(offset);
            } else if content[last..offset].trim_start().starts_with("<?php") {
                boundaries.push(offset);
            }
        }
        offset += line.len();
    }
    boundaries.push(content.len());
    boundaries
        .windows(2)
        .filter(|w| w[0] < w[1])
        .map(|w| Chunk {
            start: w[0],
            text: &content[w[0]..w[1]],
        })
        .collect()
}

/// A best-effort name for a chunk, for diagnostics.
fn guess_name(text: &str) -> Option<String> {
    let mut words = text
        .split(|c: char| c.is_whitespace() || c == '(' || c == '{' || c == ':')
        .filter(|w| !w.is_empty());
    while let Some(word) = words.next() {
        if matches!(
            word.to_ascii_lowercase().as_str(),
            "class" | "interface" | "trait" | "enum" | "function" | "const"
        ) {
            return words
                .next()
                .map(|n| n.trim_start_matches('&').to_string())
                .filter(|n| !n.is_empty());
        }
    }
    None
}

pub(crate) fn parse_in_chunks(path: &str, content: &str, options: &ParseOptions) -> ParsedFile {
    let mut declarations = Vec::new();
    let mut diagnostics = Vec::new();
    let mut namespace_line: Option<String> = None;
    let mut use_lines: Vec<String> = Vec::new();

    for chunk in split_chunks(content) {
        let trimmed = chunk.text.trim();
        let body = trimmed.strip_prefix("<?php").unwrap_or(trimmed).trim();
        if body.is_empty() {
            continue;
        }

        // Unbraced namespace and imports only change the replayed header.
        if body.starts_with("namespace ") && body.ends_with(';') && !body.contains('{') {
            namespace_line = Some(body.to_string());
            use_lines.clear();
            continue;
        }
        if body.starts_with("use ") && body.ends_with(';') {
            use_lines.push(body.to_string());
            continue;
        }

        let symbol = guess_name(body).unwrap_or_default();
        if !is_balanced(chunk.text) {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::ParseError,
                    "declaration with unbalanced brackets skipped",
                )
                .at(path, offset_u32(chunk.start))
                .for_symbol(symbol),
            );
            continue;
        }

        let mut header = String::from("<?php\n");
        if let Some(ns) = &namespace_line {
            header.push_str(ns);
            header.push('\n');
        }
        for line in &use_lines {
            header.push_str(line);
            header.push('\n');
        }
        let base = chunk.start as i64 - header.len() as i64;
        let text = format!("{header}{}", chunk.text);

        match parse_source(path, &text, options, base) {
            Ok((decls, diags)) => {
                declarations.extend(decls);
                diagnostics.extend(diags);
            }
            Err(ParseFailure::Panicked) => diagnostics.push(
                Diagnostic::new(DiagnosticKind::ParseError, "declaration could not be parsed")
                    .at(path, offset_u32(chunk.start))
                    .for_symbol(symbol),
            ),
            Err(ParseFailure::Syntax { offset, message }) => {
                // Offsets inside the replayed header map to the chunk start.
                let at = (offset as i64 + base).max(chunk.start as i64);
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::ParseError,
                        format!("declaration skipped: {message}"),
                    )
                    .at(path, offset_u32(at as usize))
                    .for_symbol(symbol),
                );
            }
        }
    }

    ParsedFile {
        path: path.to_string(),
        declarations,
        diagnostics,
    }
}

fn offset_u32(offset: usize) -> u32 {
    u32::try_from(offset).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_ignores_strings_and_comments() {
        assert!(is_balanced("function f() { return '{'; } // }"));
        assert!(is_balanced("/* { */ class A {}"));
        assert!(!is_balanced("class A { function f() {}"));
        assert!(!is_balanced("class A ) {"));
    }

    #[test]
    fn chunks_keep_docblocks_with_their_declaration() {
        let src = concat!(
            "<?php\n",
            "/** doc */\n",
            "#[Pure]\n",
            "function a() {}\n",
            "class B {\n",
            "    public function c() {}\n",
            "}\n",
        );
        let chunks = split_chunks(src);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.trim()).collect();
        assert_eq!(
            texts,
            vec![
                "<?php",
                "/** doc */\n#[Pure]\nfunction a() {}",
                "class B {\n    public function c() {}\n}",
            ]
        );
    }

    #[test]
    fn guesses_declaration_names() {
        assert_eq!(guess_name("final class Foo extends Bar {").as_deref(), Some("Foo"));
        assert_eq!(guess_name("function &bar(): int {}").as_deref(), Some("bar"));
        assert_eq!(guess_name("if (true) {}"), None);
    }
}
