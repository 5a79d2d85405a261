//! Template and generic binding tags.
//!
//! Handles `@template` (with `-covariant` / `-contravariant` variants,
//! `of`/`as` bounds and `= default`), and the generic parent bindings
//! `@extends`, `@implements` and `@use`.

use super::tags::{TagEntry, overrides, split_type_token};
use super::{DocblockOptions, TemplateTag, Variance};

/// Parse the body of a `@template*` tag.
///
/// Accepted forms:
///   - `@template T`
///   - `@template TKey of array-key`
///   - `@template T as object`
///   - `@template T of object = stdClass`
///   - `@template-covariant TValue`
pub(crate) fn parse_template(tag: &str, body: &str) -> Option<TemplateTag> {
    let variance = match tag {
        "template-covariant" => Variance::Covariant,
        "template-contravariant" => Variance::Contravariant,
        _ => Variance::Invariant,
    };

    let body = body.trim_start();
    let name_end = body
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(body.len());
    let name = &body[..name_end];
    if !name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    {
        return None;
    }

    let mut rest = body[name_end..].trim_start();
    let mut bound = None;
    for keyword in ["of", "as"] {
        if let Some(after) = rest.strip_prefix(keyword)
            && after.starts_with(char::is_whitespace)
        {
            let (ty, remainder) = split_type_token(after);
            if !ty.is_empty() {
                bound = Some(ty.to_string());
            }
            rest = remainder.trim_start();
            break;
        }
    }

    let default = rest.strip_prefix('=').and_then(|after| {
        let (ty, _) = split_type_token(after);
        (!ty.is_empty()).then(|| ty.to_string())
    });

    Some(TemplateTag {
        name: name.to_string(),
        bound,
        default,
        variance,
    })
}

/// Add a template, replacing an earlier declaration with the same name
/// in place so positional indices stay stable.
pub(crate) fn upsert_template(list: &mut Vec<TemplateTag>, tag: TemplateTag) {
    match list.iter_mut().find(|t| t.name == tag.name) {
        Some(existing) => *existing = tag,
        None => list.push(tag),
    }
}

/// Base class name of a binding such as `ArrayAccess<TKey, TValue>`.
pub(crate) fn binding_base(text: &str) -> &str {
    let base = text.split('<').next().unwrap_or(text).trim();
    base.trim_start_matches('\\')
}

/// Record an `@extends`/`@implements`/`@use` binding.
///
/// A binding for the same base class as an earlier one replaces it,
/// subject to the prefixed-tag precedence rule.
pub(crate) fn push_binding(
    list: &mut Vec<String>,
    prefixed_bases: &mut Vec<String>,
    entry: &TagEntry,
    options: &DocblockOptions,
) {
    let (ty, _) = split_type_token(&entry.body);
    if ty.is_empty() {
        return;
    }
    let base = binding_base(ty).to_ascii_lowercase();
    let existing_prefixed = prefixed_bases.contains(&base);

    match list
        .iter()
        .position(|b| binding_base(b).eq_ignore_ascii_case(&base))
    {
        Some(idx) => {
            if overrides(options, existing_prefixed, entry.prefixed) {
                list[idx] = ty.to_string();
            } else {
                return;
            }
        }
        None => list.push(ty.to_string()),
    }
    if entry.prefixed && !existing_prefixed {
        prefixed_bases.push(base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docblock::{DocblockOptions, parse_docblock};

    #[test]
    fn template_with_bound_and_default() {
        let t = parse_template("template", "T of object = \\stdClass").unwrap();
        assert_eq!(t.name, "T");
        assert_eq!(t.bound.as_deref(), Some("object"));
        assert_eq!(t.default.as_deref(), Some("\\stdClass"));
        assert_eq!(t.variance, Variance::Invariant);
    }

    #[test]
    fn covariant_template_with_as_bound() {
        let t = parse_template("template-covariant", "TValue as array-key").unwrap();
        assert_eq!(t.variance, Variance::Covariant);
        assert_eq!(t.bound.as_deref(), Some("array-key"));
    }

    #[test]
    fn invalid_template_name_is_rejected() {
        assert!(parse_template("template", "$x").is_none());
        assert!(parse_template("template", "").is_none());
    }

    #[test]
    fn prefixed_extends_wins_over_plain_regardless_of_order() {
        let doc = parse_docblock(
            concat!(
                "/**\n",
                " * @template-extends Base<int>\n",
                " * @extends Base<string>\n",
                " */",
            ),
            &DocblockOptions::default(),
        );
        // `@template-extends` is not vendor-prefixed, so the later tag wins.
        assert_eq!(doc.extends, vec!["Base<string>".to_string()]);

        let doc = parse_docblock(
            concat!(
                "/**\n",
                " * @phpstan-extends Base<int>\n",
                " * @extends Base<string>\n",
                " */",
            ),
            &DocblockOptions::default(),
        );
        assert_eq!(doc.extends, vec!["Base<int>".to_string()]);
    }
}
