//! PHPDoc tag recognition.
//!
//! A docblock is split into tag entries: each line starting with `@` opens
//! an entry, and the lines that follow (until the next tag) are appended to
//! its body.  Type values are then cut from the body with
//! [`split_type_token`], which keeps going across line breaks while a
//! bracket is open, so multi-line array shapes and conditional return
//! types arrive as one piece.

use super::templates;
use super::{
    AssertionKind, AssertionTag, DeprecatedTag, DocblockAnnotations, DocblockOptions, ParamTag,
};

/// One `@tag body...` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TagEntry {
    /// Base tag name, lowercased, without `@` and without vendor prefix.
    pub name: String,
    /// Whether the tag was written with a `phpstan-`/`psalm-` prefix.
    pub prefixed: bool,
    pub body: String,
}

/// Split a docblock into tag entries.
pub(crate) fn tag_entries(docblock: &str) -> Vec<TagEntry> {
    let inner = docblock.trim();
    let inner = inner.strip_prefix("/**").unwrap_or(inner);
    let inner = inner.strip_suffix("*/").unwrap_or(inner);

    let mut entries: Vec<TagEntry> = Vec::new();
    let mut in_tag = false;

    for line in inner.lines() {
        let trimmed = line.trim().trim_start_matches('*').trim();
        if let Some(rest) = trimmed.strip_prefix('@') {
            let name_end = rest
                .find(|c: char| c.is_whitespace() || c == '(' || c == '{')
                .unwrap_or(rest.len());
            let raw_name = rest[..name_end].to_ascii_lowercase();
            if raw_name.is_empty() {
                in_tag = false;
                continue;
            }
            let (name, prefixed) = normalize_tag_name(&raw_name);
            entries.push(TagEntry {
                name,
                prefixed,
                body: rest[name_end..].trim().to_string(),
            });
            in_tag = true;
        } else if in_tag {
            if let Some(last) = entries.last_mut() {
                if !last.body.is_empty() {
                    last.body.push('\n');
                }
                last.body.push_str(trimmed);
            }
        }
    }

    entries
}

fn normalize_tag_name(raw: &str) -> (String, bool) {
    let (base, prefixed) = if let Some(b) = raw.strip_prefix("phpstan-") {
        (b, true)
    } else if let Some(b) = raw.strip_prefix("psalm-") {
        (b, true)
    } else {
        (raw, false)
    };
    let base = match base {
        "template-extends" => "extends",
        "template-implements" => "implements",
        "template-use" => "use",
        other => other,
    };
    (base.to_string(), prefixed)
}

/// Split the leading type expression off `s`.
///
/// Nesting of `<>`, `()`, `{}` and `[]` is respected, as are quoted string
/// literals.  Whitespace outside any bracket ends the type, except around
/// `|` and `&` and after `:`, so `int | string` and `callable(): void` are
/// kept whole.
///
/// Returns `(type_token, remainder)`.
pub fn split_type_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = 0;

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
            b'<' | b'(' | b'{' | b'[' => depth += 1,
            b'>' | b')' | b'}' | b']' => {
                depth -= 1;
                if depth < 0 {
                    return (&s[..i], &s[i..]);
                }
            }
            c if c.is_ascii_whitespace() && depth == 0 => {
                let prev = s[..i].trim_end().as_bytes().last().copied();
                let next_idx = s[i..]
                    .find(|ch: char| !ch.is_whitespace())
                    .map(|off| i + off);
                let next = next_idx.map(|n| bytes[n]);
                let joins = matches!(prev, Some(b'|') | Some(b'&') | Some(b':'))
                    || matches!(next, Some(b'|') | Some(b'&'));
                match (joins, next_idx) {
                    (true, Some(n)) => {
                        i = n;
                        continue;
                    }
                    _ => return (&s[..i], &s[i..]),
                }
            }
            _ => {}
        }
        i += 1;
    }
    (s, "")
}

/// Parse `$name` (optionally `&$name`, `...$name`) from the start of `s`.
fn leading_param_name(s: &str) -> Option<String> {
    let word = s.split_whitespace().next()?;
    let word = word.trim_start_matches('&').trim_start_matches("...");
    let name = word.strip_prefix('$')?;
    let name = name.trim_end_matches([',', '.', ';']);
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// Whether a tag coming in with `incoming_prefixed` replaces an existing
/// one that was `existing_prefixed`.
pub(crate) fn overrides(options: &DocblockOptions, existing_prefixed: bool, incoming_prefixed: bool) -> bool {
    !options.prefer_prefixed || incoming_prefixed || !existing_prefixed
}

fn upsert_param(list: &mut Vec<ParamTag>, tag: ParamTag, options: &DocblockOptions) {
    match list.iter_mut().find(|p| p.name == tag.name) {
        Some(existing) => {
            if overrides(options, existing.prefixed, tag.prefixed) {
                *existing = tag;
            }
        }
        None => list.push(tag),
    }
}

fn parse_param_like(entry: &TagEntry) -> Result<Option<ParamTag>, String> {
    let body = entry.body.trim();
    if body.is_empty() {
        return Err("missing type and parameter name".to_string());
    }
    // `@param $x description` carries no type.
    if body.starts_with('$') || body.starts_with("...$") || body.starts_with("&$") {
        return Ok(None);
    }
    let (ty, rest) = split_type_token(body);
    match leading_param_name(rest) {
        Some(name) => Ok(Some(ParamTag {
            name,
            type_text: ty.to_string(),
            prefixed: entry.prefixed,
        })),
        None => Err(format!("missing parameter name after type `{ty}`")),
    }
}

fn parse_assertion(entry: &TagEntry, kind: AssertionKind) -> Result<AssertionTag, String> {
    let body = entry.body.trim();
    let (negated, body) = match body.strip_prefix('!') {
        Some(b) => (true, b),
        None => (false, body),
    };
    let (ty, rest) = split_type_token(body);
    if ty.is_empty() {
        return Err("missing asserted type".to_string());
    }
    let target = rest
        .split_whitespace()
        .next()
        .and_then(|w| w.strip_prefix('$'))
        .ok_or_else(|| format!("missing asserted parameter after `{ty}`"))?;
    // `$this->prop` asserts on a property; keep the receiver part.
    let param = target.split("->").next().unwrap_or(target);
    Ok(AssertionTag {
        kind,
        negated,
        type_text: ty.to_string(),
        param: param.to_string(),
    })
}

fn looks_like_version(word: &str) -> bool {
    !word.is_empty()
        && word.as_bytes()[0].is_ascii_digit()
        && word.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn parse_deprecated(body: &str) -> DeprecatedTag {
    let body = body.trim();
    let mut words = body.splitn(2, char::is_whitespace);
    let first = words.next().unwrap_or("");
    let rest = words.next().unwrap_or("").trim();

    let (since, message) = if looks_like_version(first) {
        (Some(first.to_string()), rest)
    } else if first.eq_ignore_ascii_case("since") {
        let mut rest_words = rest.splitn(2, char::is_whitespace);
        let version = rest_words.next().unwrap_or("");
        if looks_like_version(version) {
            (
                Some(version.to_string()),
                rest_words.next().unwrap_or("").trim(),
            )
        } else {
            (None, body)
        }
    } else {
        (None, body)
    };

    let message = message.split_whitespace().collect::<Vec<_>>().join(" ");
    DeprecatedTag {
        message: (!message.is_empty()).then_some(message),
        since,
    }
}

/// Split a `A|B` list at depth 0, trimming each part.
fn split_alternatives(ty: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in ty.char_indices() {
        match c {
            '<' | '(' | '{' | '[' => depth += 1,
            '>' | ')' | '}' | ']' => depth -= 1,
            '|' | ',' if depth == 0 => {
                parts.push(ty[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(ty[start..].trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Fold one tag entry into the annotation set.
pub(crate) fn apply_tag(out: &mut DocblockAnnotations, entry: &TagEntry, options: &DocblockOptions) {
    let malformed = |message: String| {
        tracing::debug!(tag = %entry.name, %message, "malformed docblock tag");
        out_malformed(entry, message)
    };

    match entry.name.as_str() {
        "param" => match parse_param_like(entry) {
            Ok(Some(tag)) => upsert_param(&mut out.params, tag, options),
            Ok(None) => {}
            Err(message) => out.malformed.push(malformed(message)),
        },
        "param-out" => match parse_param_like(entry) {
            Ok(Some(tag)) => upsert_param(&mut out.param_out, tag, options),
            Ok(None) => {}
            Err(message) => out.malformed.push(malformed(message)),
        },
        "return" => {
            let (ty, _) = split_type_token(&entry.body);
            if ty.is_empty() {
                out.malformed.push(malformed("missing return type".to_string()));
            } else if out.return_type.is_none()
                || overrides(options, out.return_prefixed, entry.prefixed)
            {
                out.return_type = Some(ty.to_string());
                out.return_prefixed = entry.prefixed;
            }
        }
        "var" => {
            let (ty, _) = split_type_token(&entry.body);
            if !ty.is_empty()
                && !ty.starts_with('$')
                && (out.var.is_none() || overrides(options, out.var_prefixed, entry.prefixed))
            {
                out.var = Some(ty.to_string());
                out.var_prefixed = entry.prefixed;
            }
        }
        "template" | "template-covariant" | "template-contravariant" => {
            match templates::parse_template(&entry.name, &entry.body) {
                Some(tag) => templates::upsert_template(&mut out.templates, tag),
                None => out.malformed.push(malformed("missing template name".to_string())),
            }
        }
        "extends" => templates::push_binding(&mut out.extends, &mut out.prefixed_bindings, entry, options),
        "implements" => templates::push_binding(&mut out.implements, &mut out.prefixed_bindings, entry, options),
        "use" => templates::push_binding(&mut out.uses, &mut out.prefixed_bindings, entry, options),
        "pure" => out.pure = true,
        "mutation-free" => out.mutation_free = true,
        "immutable" => out.immutable = true,
        "no-named-arguments" => out.no_named_arguments = true,
        "assert" | "assert-if-true" | "assert-if-false" => {
            let kind = match entry.name.as_str() {
                "assert-if-true" => AssertionKind::IfTrue,
                "assert-if-false" => AssertionKind::IfFalse,
                _ => AssertionKind::Always,
            };
            match parse_assertion(entry, kind) {
                Ok(tag) => out.assertions.push(tag),
                Err(message) => out.malformed.push(malformed(message)),
            }
        }
        "throws" => {
            let (ty, _) = split_type_token(&entry.body);
            for alt in split_alternatives(ty) {
                if !out.throws.contains(&alt) {
                    out.throws.push(alt);
                }
            }
        }
        "deprecated" => out.deprecated = Some(parse_deprecated(&entry.body)),
        "since" => {
            if let Some(version) = entry.body.split_whitespace().next() {
                out.since = Some(version.to_string());
            }
        }
        "inheritors" => {
            let (ty, _) = split_type_token(&entry.body);
            out.inheritors.extend(split_alternatives(ty));
        }
        _ => {}
    }
}

fn out_malformed(entry: &TagEntry, message: String) -> (String, String) {
    let tag = if entry.prefixed {
        format!("@phpstan-{}", entry.name)
    } else {
        format!("@{}", entry.name)
    };
    (tag, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docblock::parse_docblock;

    #[test]
    fn split_type_token_respects_nesting_and_spaced_unions() {
        assert_eq!(
            split_type_token("array<int, string> $x desc"),
            ("array<int, string>", " $x desc")
        );
        assert_eq!(split_type_token("int | string $x"), ("int | string", " $x"));
        assert_eq!(
            split_type_token("callable(int): void $cb"),
            ("callable(int): void", " $cb")
        );
        assert_eq!(
            split_type_token("array{'a b': int} rest"),
            ("array{'a b': int}", " rest")
        );
    }

    #[test]
    fn multi_line_conditional_is_joined() {
        let doc = parse_docblock(
            concat!(
                "/**\n",
                " * @return ($flag is true\n",
                " *     ? string\n",
                " *     : false)\n",
                " */",
            ),
            &DocblockOptions::default(),
        );
        assert_eq!(
            doc.return_type.as_deref(),
            Some("($flag is true\n? string\n: false)")
        );
    }

    #[test]
    fn deprecated_with_version_and_message() {
        let d = parse_deprecated("8.1 Use something else");
        assert_eq!(d.since.as_deref(), Some("8.1"));
        assert_eq!(d.message.as_deref(), Some("Use something else"));

        let d = parse_deprecated("");
        assert_eq!(d, DeprecatedTag::default());
    }

    #[test]
    fn tag_names_are_normalised() {
        assert_eq!(
            normalize_tag_name("phpstan-template-extends"),
            ("extends".to_string(), true)
        );
        assert_eq!(normalize_tag_name("psalm-pure"), ("pure".to_string(), true));
        assert_eq!(normalize_tag_name("param"), ("param".to_string(), false));
    }
}
