//! Stub file parsing.
//!
//! This module parses PHP stub source text with the mago_syntax parser and
//! extracts the declaration tree: namespaces, class-likes with their
//! members, free functions, and global constants (`const` and `define()`).
//! Function and method bodies are never visited.
//!
//! Sub-modules:
//! - [`classes`]: Class, interface, trait, and enum extraction
//! - [`functions`]: Functions, parameters, constants and `define()` calls
//! - [`names`]: Namespace and `use` import tracking
//! - [`attributes`]: `#[...]` decoding and interpretation
//! - [`recovery`]: Chunked re-parse when a file has unbalanced braces,
//!   makes the parser panic, or has syntax errors
pub(crate) mod attributes;
mod classes;
mod functions;
pub mod names;
mod recovery;

use std::sync::Arc;

use mago_span::HasSpan;
use mago_syntax::ast::*;

use crate::declarations::{AttributeDecl, Declaration, Visibility};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::docblock::docblock_before;
use crate::php_version::PhpVersion;

use names::NameContext;

/// Parser knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Declarations marked unavailable for this version are dropped.
    pub php_version: PhpVersion,
}

/// The result of parsing one stub file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: String,
    pub declarations: Vec<Declaration>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse one stub file.
///
/// Never fails: a file the parser cannot take as a whole is split into
/// top-level declaration chunks, each parsed on its own, and the chunks
/// that still fail are skipped with a `ParseError` diagnostic.
pub fn parse_stub_file(path: &str, content: &str, options: &ParseOptions) -> ParsedFile {
    if recovery::is_balanced(content) {
        match parse_source(path, content, options, 0) {
            Ok((declarations, diagnostics)) => {
                return ParsedFile {
                    path: path.to_string(),
                    declarations,
                    diagnostics,
                };
            }
            Err(ParseFailure::Panicked) => {
                tracing::warn!(path, "parser panicked; retrying declaration by declaration");
            }
            Err(ParseFailure::Syntax { offset, message }) => {
                tracing::debug!(
                    path,
                    offset,
                    error = %message,
                    "syntax error; parsing declaration by declaration"
                );
            }
        }
    } else {
        tracing::debug!(path, "unbalanced braces; parsing declaration by declaration");
    }
    recovery::parse_in_chunks(path, content, options)
}

/// Why a parse produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParseFailure {
    Panicked,
    /// The parser recovered from a syntax error at `offset` (relative to
    /// the parsed text).  What it recovered into cannot be trusted.
    Syntax { offset: u32, message: String },
}

/// Parse `text` and walk it.  `base` is added to every recorded offset so
/// chunked parses report positions in the original file.
fn parse_source(
    path: &str,
    text: &str,
    options: &ParseOptions,
    base: i64,
) -> Result<(Vec<Declaration>, Vec<Diagnostic>), ParseFailure> {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let arena = bumpalo::Bump::new();
        let file_id = mago_database::file::FileId::new(path);
        let program = mago_syntax::parser::parse_file_content(&arena, file_id, text);

        if let Some(error) = program.errors.iter().next() {
            return Err(ParseFailure::Syntax {
                offset: error.span().start.offset,
                message: error.to_string(),
            });
        }

        let mut walker = Walker::new(path, text, program.trivia.as_slice(), options, base);
        walker.walk_statements(program.statements.iter());
        Ok((walker.declarations, walker.diagnostics))
    }));
    result.unwrap_or(Err(ParseFailure::Panicked))
}

/// The name context in effect, shared cheaply between the declarations
/// that were written under it.
#[derive(Debug, Default)]
struct Scope {
    ctx: NameContext,
    shared: Option<Arc<NameContext>>,
}

impl Scope {
    fn shared(&mut self) -> Arc<NameContext> {
        self.shared
            .get_or_insert_with(|| Arc::new(self.ctx.clone()))
            .clone()
    }

    fn replace(&mut self, ctx: NameContext) -> NameContext {
        self.shared = None;
        std::mem::replace(&mut self.ctx, ctx)
    }

    fn add_use(&mut self, items: &UseItems) {
        self.shared = None;
        self.ctx.add_use_items(items);
    }
}

/// Where a declaration sits and what is attached to it.
struct Located {
    offset: u32,
    docblock: Option<String>,
    attributes: Vec<AttributeDecl>,
}

/// Statement walker shared by the extraction submodules.
pub(crate) struct Walker<'a> {
    path: &'a str,
    content: &'a str,
    trivia: &'a [Trivia<'a>],
    options: &'a ParseOptions,
    base: i64,
    scope: Scope,
    pub(crate) declarations: Vec<Declaration>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'a> Walker<'a> {
    fn new(
        path: &'a str,
        content: &'a str,
        trivia: &'a [Trivia<'a>],
        options: &'a ParseOptions,
        base: i64,
    ) -> Self {
        Walker {
            path,
            content,
            trivia,
            options,
            base,
            scope: Scope::default(),
            declarations: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn walk_statements<'s>(&mut self, statements: impl Iterator<Item = &'s Statement<'s>>) {
        for statement in statements {
            match statement {
                Statement::Namespace(namespace) => {
                    let name = namespace
                        .name
                        .as_ref()
                        .map(|ident| ident.value().trim_matches('\\').to_string());
                    let outer = self.scope.replace(NameContext::new(name));
                    self.walk_statements(namespace.statements().iter());
                    self.scope.replace(outer);
                }
                Statement::Use(use_stmt) => self.scope.add_use(&use_stmt.items),
                Statement::Class(class) => self.extract_class(class),
                Statement::Interface(iface) => self.extract_interface(iface),
                Statement::Trait(trait_def) => self.extract_trait(trait_def),
                Statement::Enum(enum_def) => self.extract_enum(enum_def),
                Statement::Function(func) => self.extract_function(func),
                Statement::Constant(constant) => self.extract_global_constant(constant),
                Statement::Expression(expr_stmt) => self.extract_define(expr_stmt),
                Statement::Block(block) => self.walk_statements(block.statements.iter()),
                // `if (!function_exists('x')) { function x() {} }`
                Statement::If(if_stmt) => self.walk_if_body(&if_stmt.body),
                _ => {}
            }
        }
    }

    fn walk_if_body<'s>(&mut self, body: &'s IfBody<'s>) {
        match body {
            IfBody::Statement(body) => {
                self.walk_statements(std::iter::once(body.statement));
                for else_if in body.else_if_clauses.iter() {
                    self.walk_statements(std::iter::once(else_if.statement));
                }
                if let Some(else_clause) = &body.else_clause {
                    self.walk_statements(std::iter::once(else_clause.statement));
                }
            }
            IfBody::ColonDelimited(body) => {
                self.walk_statements(body.statements.iter());
                for else_if in body.else_if_clauses.iter() {
                    self.walk_statements(else_if.statements.iter());
                }
                if let Some(else_clause) = &body.else_clause {
                    self.walk_statements(else_clause.statements.iter());
                }
            }
        }
    }

    // ─── Shared helpers ─────────────────────────────────────────────────

    /// Map an offset in the parsed text back to the original file.
    fn file_offset(&self, offset: usize) -> u32 {
        u32::try_from((offset as i64 + self.base).max(0)).unwrap_or(u32::MAX)
    }

    /// Find the declaration's real start, docblock and attributes.
    fn locate(&self, node: &impl HasSpan) -> Located {
        let node_start = node.span().start.offset as usize;
        let start = attributes::declaration_start(self.content, node_start);
        let docblock = docblock_before(self.trivia, self.content, start as u32).map(str::to_string);
        let attributes = attributes::leading_attributes(self.content, start, &self.scope.ctx);
        Located {
            offset: self.file_offset(node_start),
            docblock,
            attributes,
        }
    }

    fn text_of(&self, node: &impl HasSpan) -> &'a str {
        let span = node.span();
        self.content
            .get(span.start.offset as usize..span.end.offset as usize)
            .unwrap_or("")
    }

    /// Whether a declaration is available for the target PHP version.
    fn available(&self, attributes: &[AttributeDecl]) -> bool {
        attributes::available(attributes, self.options.php_version)
    }

    fn php_version(&self) -> PhpVersion {
        self.options.php_version
    }

    /// Validate a declared name, recording a `ParseError` if it is unusable.
    fn check_name(&mut self, name: &str, what: &str, offset: u32) -> bool {
        if is_valid_name(name) {
            return true;
        }
        self.diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::ParseError,
                format!("{what} with missing or invalid name `{name}` skipped"),
            )
            .at(self.path, offset),
        );
        false
    }

    fn parse_error(&mut self, message: impl Into<String>, offset: u32, symbol: &str) {
        self.diagnostics.push(
            Diagnostic::new(DiagnosticKind::ParseError, message)
                .at(self.path, offset)
                .for_symbol(symbol),
        );
    }
}

/// Visibility from a set of modifiers, defaulting to public.
pub(crate) fn visibility_of<'m>(modifiers: impl Iterator<Item = &'m Modifier<'m>>) -> Visibility {
    for m in modifiers {
        if m.is_private() {
            return Visibility::Private;
        }
        if m.is_protected() {
            return Visibility::Protected;
        }
        if m.is_public() {
            return Visibility::Public;
        }
    }
    Visibility::Public
}

/// A PHP identifier, optionally namespaced.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let name = name.trim_start_matches('\\');
    !name.is_empty()
        && name.split('\\').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || !c.is_ascii())
                && chars.all(|c| c.is_alphanumeric() || c == '_' || !c.is_ascii())
        })
}

/// Source text after the first top-level `=` of a declaration fragment,
/// e.g. the value of `FOO = 1` or the default of `$x = []`.
pub(crate) fn value_after_equals(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
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
        } else {
            match c {
                b'\'' | b'"' => quote = Some(c),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                b'=' if depth == 0
                    && bytes.get(i + 1) != Some(&b'>')
                    && bytes.get(i + 1) != Some(&b'=') =>
                {
                    let value = text[i + 1..].trim().trim_end_matches(';').trim();
                    return (!value.is_empty()).then(|| value.to_string());
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(is_valid_name("Foo\\Bar_1"));
        assert!(is_valid_name("\\strlen"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name("Foo\\"));
    }

    #[test]
    fn value_after_equals_skips_nested_and_arrows() {
        assert_eq!(value_after_equals("FOO = 1").as_deref(), Some("1"));
        assert_eq!(
            value_after_equals("$x = ['a' => 1]").as_deref(),
            Some("['a' => 1]")
        );
        assert_eq!(value_after_equals("case A").as_deref(), None);
    }
}
