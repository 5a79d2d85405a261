//! PHPDoc block parsing.
//!
//! This module turns the raw `/** ... */` text attached to a declaration
//! into a [`DocblockAnnotations`] value.  Only a whitelist of tags is
//! recognised; everything else is ignored.  Type-expression values are
//! kept as raw text here and compiled later by
//! [`crate::type_expr::compile`], once the declaration's template and
//! parameter scopes are known.
//!
//! Vendor-prefixed tags (`@phpstan-param`, `@psalm-return`, ...) are
//! normalised to their base tag.  When [`DocblockOptions::prefer_prefixed`]
//! is set, a prefixed tag overrides the unprefixed tag for the same target
//! regardless of order; otherwise the last occurrence wins.
//!
//! # Submodules
//!
//! - [`tags`]: line splitting, tag recognition, type-token scanning.
//! - [`templates`]: `@template` and generic `@extends`/`@implements`/`@use`.

pub(crate) mod tags;
pub(crate) mod templates;

use mago_syntax::ast::{Trivia, TriviaKind};
use serde::{Deserialize, Serialize};

pub use tags::split_type_token;

/// Knobs for docblock parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocblockOptions {
    pub prefer_prefixed: bool,
}

impl Default for DocblockOptions {
    fn default() -> Self {
        DocblockOptions {
            prefer_prefixed: true,
        }
    }
}

/// A type-valued tag bound to a parameter name, e.g. `@param int $x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamTag {
    /// Parameter name without the leading `$`.
    pub name: String,
    pub type_text: String,
    pub(crate) prefixed: bool,
}

/// `@template T of Bound = Default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateTag {
    pub name: String,
    pub bound: Option<String>,
    pub default: Option<String>,
    pub variance: Variance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variance {
    #[default]
    Invariant,
    Covariant,
    Contravariant,
}

/// When an `@assert*` tag applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssertionKind {
    Always,
    IfTrue,
    IfFalse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionTag {
    pub kind: AssertionKind,
    pub negated: bool,
    pub type_text: String,
    /// Parameter name without `$`, or `this` for `$this`.
    pub param: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeprecatedTag {
    pub message: Option<String>,
    pub since: Option<String>,
}

/// Everything recognised in one docblock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocblockAnnotations {
    pub params: Vec<ParamTag>,
    pub return_type: Option<String>,
    pub templates: Vec<TemplateTag>,
    pub pure: bool,
    pub mutation_free: bool,
    pub immutable: bool,
    pub no_named_arguments: bool,
    pub param_out: Vec<ParamTag>,
    pub assertions: Vec<AssertionTag>,
    pub throws: Vec<String>,
    pub deprecated: Option<DeprecatedTag>,
    pub since: Option<String>,
    pub inheritors: Vec<String>,
    pub extends: Vec<String>,
    pub implements: Vec<String>,
    pub uses: Vec<String>,
    pub var: Option<String>,
    /// Tags whose value could not be split into the expected pieces,
    /// as `(tag, message)`.
    pub malformed: Vec<(String, String)>,
    pub(crate) return_prefixed: bool,
    pub(crate) var_prefixed: bool,
    /// Base names of `@extends`/`@implements`/`@use` bindings that came
    /// from prefixed tags.
    pub(crate) prefixed_bindings: Vec<String>,
}

impl DocblockAnnotations {
    pub fn param(&self, name: &str) -> Option<&ParamTag> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn param_out(&self, name: &str) -> Option<&ParamTag> {
        self.param_out.iter().find(|p| p.name == name)
    }

    pub fn template_names(&self) -> Vec<String> {
        self.templates.iter().map(|t| t.name.clone()).collect()
    }
}

/// Parse a docblock's text (including the `/**` and `*/` delimiters).
pub fn parse_docblock(text: &str, options: &DocblockOptions) -> DocblockAnnotations {
    let mut out = DocblockAnnotations::default();
    if memchr::memchr(b'@', text.as_bytes()).is_none() {
        return out;
    }
    for entry in tags::tag_entries(text) {
        tags::apply_tag(&mut out, &entry, options);
    }
    out
}

/// Find the `/** ... */` comment that immediately precedes byte offset
/// `start`, allowing only whitespace and ordinary comments in between.
pub fn docblock_before<'a>(trivia: &'a [Trivia<'a>], content: &str, start: u32) -> Option<&'a str> {
    let candidate_idx = trivia.partition_point(|t| t.span.start.offset < start);
    if candidate_idx == 0 {
        return None;
    }

    let content_bytes = content.as_bytes();
    let mut covered_from = start;

    for t in trivia[..candidate_idx].iter().rev() {
        let gap = content_bytes
            .get(t.span.end.offset as usize..covered_from as usize)
            .unwrap_or(&[]);
        if !gap.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        match t.kind {
            TriviaKind::DocBlockComment => return Some(t.value),
            TriviaKind::WhiteSpace
            | TriviaKind::SingleLineComment
            | TriviaKind::MultiLineComment
            | TriviaKind::HashComment => {
                covered_from = t.span.start.offset;
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_at_sign_short_circuits() {
        let doc = parse_docblock("/** Just a description. */", &DocblockOptions::default());
        assert_eq!(doc, DocblockAnnotations::default());
    }
}
