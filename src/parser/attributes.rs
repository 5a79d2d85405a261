//! PHP attribute decoding.
//!
//! Attributes are read from the source text rather than the AST: the
//! parser hands us the declaration's byte offset and we decode the
//! `#[...]` groups in front of it.  Only constant expressions are
//! supported as arguments, which is all the stub corpus uses.
//!
//! The interpreters at the bottom of the file map the handful of
//! attributes that carry annotation-equivalent meaning onto plain values.

use crate::declarations::{AttrValue, AttributeArg, AttributeDecl};
use crate::php_version::PhpVersion;

use super::names::NameContext;

// ─── Locating attribute groups ──────────────────────────────────────────────

/// Walk backwards from `node_start` over whitespace and `#[...]` groups,
/// returning the offset where the declaration's attributes begin.
///
/// mago spans do not always include leading attributes, and the docblock
/// sits in front of the attributes, so docblock lookup starts here.
pub(crate) fn declaration_start(content: &str, node_start: usize) -> usize {
    let bytes = content.as_bytes();
    let mut pos = node_start.min(bytes.len());
    loop {
        let mut p = pos;
        while p > 0 && bytes[p - 1].is_ascii_whitespace() {
            p -= 1;
        }
        if p == 0 || bytes[p - 1] != b']' {
            return pos;
        }
        match matching_open(bytes, p - 1) {
            Some(open) if open > 0 && bytes[open - 1] == b'#' => pos = open - 1,
            _ => return pos,
        }
    }
}

/// Given the index of a `]`, find the index of its matching `[`.
fn matching_open(bytes: &[u8], close: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut i = close + 1;
    let mut quote: Option<u8> = None;
    while i > 0 {
        i -= 1;
        let c = bytes[i];
        if let Some(q) = quote {
            if c == q && (i == 0 || bytes[i - 1] != b'\\') {
                quote = None;
            }
            continue;
        }
        match c {
            b'\'' | b'"' => quote = Some(c),
            b']' => depth += 1,
            b'[' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Given the index just past a `#[`, find the index of the closing `]`.
fn matching_close(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 1i32;
    let mut i = from;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = quote {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            b'\'' | b'"' => quote = Some(c),
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Decode every attribute group starting at `start`, stopping at the first
/// thing that is neither whitespace, a comment, nor `#[`.
pub(crate) fn leading_attributes(
    content: &str,
    start: usize,
    names: &NameContext,
) -> Vec<AttributeDecl> {
    let bytes = content.as_bytes();
    let mut out = Vec::new();
    let mut pos = start;
    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if bytes[pos..].starts_with(b"/*") {
            match memchr::memmem::find(&bytes[pos + 2..], b"*/") {
                Some(end) => {
                    pos += end + 4;
                    continue;
                }
                None => break,
            }
        }
        if !bytes[pos..].starts_with(b"#[") {
            break;
        }
        let Some(close) = matching_close(bytes, pos + 2) else {
            break;
        };
        out.extend(parse_group(&content[pos + 2..close], names));
        pos = close + 1;
    }
    out
}

// ─── Argument parsing ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Str(String),
    Int(i64),
    Float(f64),
    Ident(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Arrow,
    Colon,
    DoubleColon,
    Minus,
    Other(char),
}

fn lex(src: &str) -> Vec<Tok> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            c if c.is_ascii_whitespace() => i += 1,
            b'\'' | b'"' => {
                let mut value = String::new();
                let mut chars = src[i + 1..].char_indices();
                let mut end = bytes.len();
                while let Some((idx, ch)) = chars.next() {
                    if ch == '\\' {
                        if let Some((_, escaped)) = chars.next() {
                            if escaped as u32 == c as u32 || escaped == '\\' {
                                value.push(escaped);
                            } else {
                                value.push('\\');
                                value.push(escaped);
                            }
                        }
                    } else if ch as u32 == c as u32 {
                        end = i + 1 + idx + 1;
                        break;
                    } else {
                        value.push(ch);
                    }
                }
                out.push(Tok::Str(value));
                i = end;
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'_')
                {
                    i += 1;
                }
                out.push(parse_number(&src[start..i]));
            }
            b'[' => {
                out.push(Tok::LBracket);
                i += 1;
            }
            b']' => {
                out.push(Tok::RBracket);
                i += 1;
            }
            b'(' => {
                out.push(Tok::LParen);
                i += 1;
            }
            b')' => {
                out.push(Tok::RParen);
                i += 1;
            }
            b',' => {
                out.push(Tok::Comma);
                i += 1;
            }
            b'-' => {
                out.push(Tok::Minus);
                i += 1;
            }
            b'=' if bytes.get(i + 1) == Some(&b'>') => {
                out.push(Tok::Arrow);
                i += 2;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                out.push(Tok::DoubleColon);
                i += 2;
            }
            b':' => {
                out.push(Tok::Colon);
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == b'_' || c == b'\\' || c >= 0x80 => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric()
                        || bytes[i] == b'_'
                        || bytes[i] == b'\\'
                        || bytes[i] >= 0x80)
                {
                    i += 1;
                }
                out.push(Tok::Ident(src[start..i].to_string()));
            }
            _ => {
                let ch = src[i..].chars().next().unwrap_or('?');
                out.push(Tok::Other(ch));
                i += ch.len_utf8();
            }
        }
    }
    out
}

fn parse_number(text: &str) -> Tok {
    let clean: String = text.chars().filter(|c| *c != '_').collect();
    let lower = clean.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if lower.len() > 1 && lower.starts_with('0') && lower.chars().all(|c| c.is_ascii_digit()) {
        i64::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse::<i64>().ok()
    };
    match parsed {
        Some(v) => Tok::Int(v),
        None => match lower.parse::<f64>() {
            Ok(f) => Tok::Float(f),
            Err(_) => Tok::Other('?'),
        },
    }
}

struct ArgParser<'n> {
    toks: Vec<Tok>,
    pos: usize,
    names: &'n NameContext,
}

impl ArgParser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Tok> {
        self.toks.get(self.pos + ahead)
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Skip to the next `,` or closing bracket at the current depth.
    fn skip_value(&mut self) {
        let mut depth = 0;
        while let Some(tok) = self.peek() {
            match tok {
                Tok::LBracket | Tok::LParen => depth += 1,
                Tok::RBracket | Tok::RParen if depth == 0 => return,
                Tok::RBracket | Tok::RParen => depth -= 1,
                Tok::Comma if depth == 0 => return,
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn args(&mut self) -> Vec<AttributeArg> {
        let mut args = Vec::new();
        while let Some(tok) = self.peek() {
            if *tok == Tok::RParen {
                break;
            }
            let name = match (self.peek(), self.peek_at(1)) {
                (Some(Tok::Ident(n)), Some(Tok::Colon)) => {
                    let n = n.clone();
                    self.pos += 2;
                    Some(n)
                }
                _ => None,
            };
            let value = self.value();
            args.push(AttributeArg { name, value });
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        args
    }

    fn value(&mut self) -> AttrValue {
        let start = self.pos;
        let value = match self.peek().cloned() {
            Some(Tok::Str(s)) => {
                self.pos += 1;
                AttrValue::Str(s)
            }
            Some(Tok::Int(v)) => {
                self.pos += 1;
                AttrValue::Int(v)
            }
            Some(Tok::Float(v)) => {
                self.pos += 1;
                AttrValue::Float(v)
            }
            Some(Tok::Minus) => {
                self.pos += 1;
                match self.peek().cloned() {
                    Some(Tok::Int(v)) => {
                        self.pos += 1;
                        AttrValue::Int(-v)
                    }
                    Some(Tok::Float(v)) => {
                        self.pos += 1;
                        AttrValue::Float(-v)
                    }
                    _ => AttrValue::Other("-".to_string()),
                }
            }
            Some(Tok::LBracket) => {
                self.pos += 1;
                let items = self.array_items(&Tok::RBracket);
                AttrValue::Array(items)
            }
            Some(Tok::Ident(word)) if word.eq_ignore_ascii_case("array")
                && self.peek_at(1) == Some(&Tok::LParen) =>
            {
                self.pos += 2;
                AttrValue::Array(self.array_items(&Tok::RParen))
            }
            Some(Tok::Ident(word)) => {
                self.pos += 1;
                match word.to_ascii_lowercase().as_str() {
                    "true" => AttrValue::Bool(true),
                    "false" => AttrValue::Bool(false),
                    "null" => AttrValue::Null,
                    _ => {
                        if self.eat(&Tok::DoubleColon) {
                            match self.peek().cloned() {
                                Some(Tok::Ident(member)) => {
                                    self.pos += 1;
                                    AttrValue::ClassConstant {
                                        class: self.names.resolve_class(&word),
                                        member,
                                    }
                                }
                                _ => AttrValue::Other(word),
                            }
                        } else {
                            AttrValue::Other(word)
                        }
                    }
                }
            }
            _ => AttrValue::Other(String::new()),
        };
        // Anything trailing (operators, concatenation) makes the value opaque.
        if !matches!(
            self.peek(),
            None | Some(Tok::Comma) | Some(Tok::RBracket) | Some(Tok::RParen) | Some(Tok::Arrow)
        ) {
            self.pos = start;
            self.skip_value();
            return AttrValue::Other(String::new());
        }
        value
    }

    fn array_items(&mut self, close: &Tok) -> Vec<(Option<AttrValue>, AttrValue)> {
        let mut items = Vec::new();
        while self.peek().is_some() && self.peek() != Some(close) {
            let first = self.value();
            let item = if self.eat(&Tok::Arrow) {
                (Some(first), self.value())
            } else {
                (None, first)
            };
            items.push(item);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.eat(close);
        items
    }
}

/// Parse the inside of one `#[...]` group: `A, B(args), C`.
fn parse_group(inner: &str, names: &NameContext) -> Vec<AttributeDecl> {
    let mut parser = ArgParser {
        toks: lex(inner),
        pos: 0,
        names,
    };
    let mut out = Vec::new();
    while let Some(tok) = parser.peek().cloned() {
        let Tok::Ident(name) = tok else {
            parser.pos += 1;
            continue;
        };
        parser.pos += 1;
        let args = if parser.eat(&Tok::LParen) {
            let args = parser.args();
            parser.eat(&Tok::RParen);
            args
        } else {
            Vec::new()
        };
        out.push(AttributeDecl {
            name: names.resolve_class(&name),
            args,
        });
        parser.eat(&Tok::Comma);
    }
    out
}

// ─── Interpreters ───────────────────────────────────────────────────────────

fn find<'a>(attrs: &'a [AttributeDecl], short: &str) -> Option<&'a AttributeDecl> {
    attrs.iter().find(|a| a.is(short))
}

/// `#[Deprecated(reason:, replacement:, since:)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DeprecatedAttr {
    pub reason: Option<String>,
    pub replacement: Option<String>,
    pub since: Option<String>,
}

pub(crate) fn deprecated(attrs: &[AttributeDecl]) -> Option<DeprecatedAttr> {
    let attr = find(attrs, "Deprecated")?;
    let text = |name: &str, pos: usize| {
        attr.arg(name, pos)
            .and_then(AttrValue::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Some(DeprecatedAttr {
        reason: text("reason", 0),
        replacement: text("replacement", 1),
        since: text("since", 2),
    })
}

/// Purity declared by `#[Pure]`: `Some(false)` for pure, `Some(true)` when
/// the function may depend on global scope (mutation-free only).
pub(crate) fn pure(attrs: &[AttributeDecl]) -> Option<bool> {
    let attr = find(attrs, "Pure")?;
    let global = matches!(
        attr.arg("mayDependOnGlobalScope", 0),
        Some(AttrValue::Bool(true))
    );
    Some(global)
}

pub(crate) fn tentative_type(attrs: &[AttributeDecl]) -> bool {
    find(attrs, "TentativeType").is_some()
}

/// Whether `#[PhpStormStubsElementAvailable(from:, to:)]` admits `target`.
/// Declarations without the attribute are always available.
pub(crate) fn available(attrs: &[AttributeDecl], target: PhpVersion) -> bool {
    attrs
        .iter()
        .filter(|a| a.is("PhpStormStubsElementAvailable"))
        .all(|attr| {
            let version = |name: &str, pos: usize| {
                attr.arg(name, pos)
                    .and_then(AttrValue::as_str)
                    .and_then(|s| s.parse::<PhpVersion>().ok())
            };
            target.within(version("from", 0), version("to", 1))
        })
}

/// The native type chosen by `#[LanguageLevelTypeAware([...], default:)]`
/// for `target`.  `Some("")` means "no type".
pub(crate) fn language_level_type(attrs: &[AttributeDecl], target: PhpVersion) -> Option<String> {
    let attr = find(attrs, "LanguageLevelTypeAware")?;
    let mut best: Option<(PhpVersion, String)> = None;
    if let Some(AttrValue::Array(items)) = attr.arg("languageLevelTypeMap", 0) {
        for (key, value) in items {
            let (Some(AttrValue::Str(version)), AttrValue::Str(ty)) = (key, value) else {
                continue;
            };
            let Ok(version) = version.parse::<PhpVersion>() else {
                continue;
            };
            if version <= target && best.as_ref().is_none_or(|(v, _)| version > *v) {
                best = Some((version, ty.clone()));
            }
        }
    }
    match best {
        Some((_, ty)) => Some(ty),
        None => attr
            .arg("default", 1)
            .and_then(AttrValue::as_str)
            .map(str::to_string),
    }
}

/// Convert `#[ArrayShape(['key' => 'type', ...])]` to shape type text.
pub(crate) fn array_shape(attrs: &[AttributeDecl]) -> Option<String> {
    let attr = find(attrs, "ArrayShape")?;
    let Some(AttrValue::Array(items)) = attr.arg("shape", 0) else {
        return None;
    };
    let mut fields = Vec::new();
    for (key, value) in items {
        let ty = match value {
            AttrValue::Str(s) if !s.is_empty() => s.clone(),
            AttrValue::ClassConstant { class, member } if member.eq_ignore_ascii_case("class") => {
                format!("\\{class}")
            }
            _ => "mixed".to_string(),
        };
        match key {
            Some(AttrValue::Str(k)) => fields.push(format!("{}: {ty}", quote_key(k))),
            Some(AttrValue::Int(k)) => fields.push(format!("{k}: {ty}")),
            _ => fields.push(ty),
        }
    }
    Some(format!("array{{{}}}", fields.join(", ")))
}

fn quote_key(key: &str) -> String {
    let bare = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if bare {
        key.to_string()
    } else {
        format!("'{}'", key.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}
