//! Recursive-descent compiler from docblock type text to [`TypeExpr`].
//!
//! Precedence, loosest first: union (`|`), intersection (`&`), prefix
//! nullable (`?T`), postfix array (`T[]`), atoms.  Conditional types are
//! only recognised inside parentheses, where the `(`, subject, `is` triple
//! is unambiguous.
//!
//! Name resolution happens during compilation so the AST only ever holds
//! fully-qualified class names, canonical keywords, and positional template
//! references.

use thiserror::Error;

use super::lexer::{Spanned, Token, tokenize};
use super::{
    ArrayShape, CallableParam, CallableType, ConditionalSubject, ConditionalType, LiteralValue,
    NamedType, Refinement, ShapeField, ShapeKey, ShapeKind, TemplateRef, TypeExpr,
    canonical_keyword,
};
use crate::parser::names::NameContext;

/// Nesting depth at which compilation gives up.  Real stubs stay below 10.
const MAX_DEPTH: usize = 64;

/// A syntax error in a type expression, with the byte offset into the
/// expression text where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct TypeSyntaxError {
    pub message: String,
    pub offset: usize,
}

impl TypeSyntaxError {
    pub(crate) fn new(message: impl Into<String>, offset: usize) -> Self {
        TypeSyntaxError {
            message: message.into(),
            offset,
        }
    }
}

/// Everything name resolution needs at a declaration site.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    pub names: &'a NameContext,
    /// Template scopes, innermost first.  Inside a method this is
    /// `[method templates, class templates]`.
    pub templates: &'a [&'a [String]],
    /// Parameter names (without `$`) of the enclosing signature, used to
    /// resolve conditional subjects to indices.
    pub params: &'a [String],
}

impl<'a> CompileContext<'a> {
    /// A context with no templates and no parameters.
    pub fn bare(names: &'a NameContext) -> Self {
        CompileContext {
            names,
            templates: &[],
            params: &[],
        }
    }

    fn template(&self, name: &str) -> Option<TemplateRef> {
        for (level, scope) in self.templates.iter().enumerate() {
            if let Some(index) = scope.iter().position(|t| t == name) {
                return Some(TemplateRef {
                    level: u8::try_from(level).unwrap_or(u8::MAX),
                    index: u16::try_from(index).unwrap_or(u16::MAX),
                    name: name.to_string(),
                });
            }
        }
        None
    }
}

/// Compile `src` into a type expression.
pub fn compile(src: &str, ctx: &CompileContext<'_>) -> Result<TypeExpr, TypeSyntaxError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(TypeSyntaxError::new("empty type expression", 0));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        ctx,
        end: src.len(),
    };
    let ty = parser.parse_type()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(TypeSyntaxError::new(
            format!("unexpected {}", describe(&extra.token)),
            extra.offset,
        ));
    }
    Ok(ty)
}

struct Parser<'c, 'a> {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    ctx: &'c CompileContext<'a>,
    end: usize,
}

impl Parser<'_, '_> {
    // ─── Token helpers ──────────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), TypeSyntaxError> {
        if self.eat(expected) {
            return Ok(());
        }
        Err(self.error(format!("expected {}", describe(expected))))
    }

    fn error(&self, message: impl Into<String>) -> TypeSyntaxError {
        let mut message = message.into();
        match self.peek() {
            Some(found) => {
                message.push_str(", found ");
                message.push_str(&describe(found));
            }
            None => message.push_str(", found end of input"),
        }
        TypeSyntaxError::new(message, self.offset())
    }

    fn is_ident(&self, ahead: usize, word: &str) -> bool {
        matches!(self.peek_at(ahead), Some(Token::Ident(w)) if w.eq_ignore_ascii_case(word))
    }

    fn enter(&mut self) -> Result<(), TypeSyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(TypeSyntaxError::new(
                "type expression nested too deeply",
                self.offset(),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ─── Grammar ────────────────────────────────────────────────────────

    fn parse_type(&mut self) -> Result<TypeExpr, TypeSyntaxError> {
        self.enter()?;
        let result = self.parse_union();
        self.leave();
        result
    }

    fn parse_union(&mut self) -> Result<TypeExpr, TypeSyntaxError> {
        // A leading `|` is tolerated in multi-line unions.
        self.eat(&Token::Pipe);
        let first = self.parse_intersection()?;
        if self.peek() != Some(&Token::Pipe) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.eat(&Token::Pipe) {
            members.push(self.parse_intersection()?);
        }
        Ok(TypeExpr::union(members))
    }

    fn parse_intersection(&mut self) -> Result<TypeExpr, TypeSyntaxError> {
        let first = self.parse_prefix()?;
        if !self.at_intersection_amp() {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.at_intersection_amp() {
            self.pos += 1;
            members.push(self.parse_prefix()?);
        }
        Ok(TypeExpr::intersection(members))
    }

    /// `&` is an intersection unless it marks a by-reference callable
    /// parameter (`callable(int &$x)`).
    fn at_intersection_amp(&self) -> bool {
        self.peek() == Some(&Token::Amp)
            && !matches!(
                self.peek_at(1),
                Some(Token::Variable(_))
                    | Some(Token::Ellipsis)
                    | Some(Token::RParen)
                    | Some(Token::Comma)
                    | Some(Token::Eq)
                    | None
            )
    }

    fn parse_prefix(&mut self) -> Result<TypeExpr, TypeSyntaxError> {
        if self.eat(&Token::Question) {
            self.enter()?;
            let inner = self.parse_prefix();
            self.leave();
            return Ok(TypeExpr::nullable(inner?));
        }
        let mut ty = self.parse_atom()?;
        while self.peek() == Some(&Token::LBracket) && self.peek_at(1) == Some(&Token::RBracket)
        {
            self.pos += 2;
            ty = TypeExpr::Generic(NamedType::plain("array"), vec![ty]);
        }
        Ok(ty)
    }

    fn parse_atom(&mut self) -> Result<TypeExpr, TypeSyntaxError> {
        let offset = self.offset();
        let Some(token) = self.bump() else {
            return Err(TypeSyntaxError::new(
                "expected a type, found end of input",
                offset,
            ));
        };
        match token {
            Token::LParen => self.parse_parenthesized(),
            Token::Variable(name) if name == "this" => Ok(TypeExpr::ThisRef),
            Token::Variable(name) => Err(TypeSyntaxError::new(
                format!("variable `${name}` is not a type"),
                offset,
            )),
            Token::Int(v) => Ok(TypeExpr::Literal(LiteralValue::Int(v))),
            Token::Float(text) => Ok(TypeExpr::Literal(LiteralValue::Float(text))),
            Token::Str(s) => Ok(TypeExpr::Literal(LiteralValue::String(s))),
            Token::Ident(name) => self.parse_named(name, offset),
            other => Err(TypeSyntaxError::new(
                format!("expected a type, found {}", describe(&other)),
                offset,
            )),
        }
    }

    fn parse_parenthesized(&mut self) -> Result<TypeExpr, TypeSyntaxError> {
        let is_conditional = matches!(self.peek(), Some(Token::Variable(_)) | Some(Token::Ident(_)))
            && self.is_ident(1, "is");
        self.enter()?;
        let result = if is_conditional {
            self.parse_conditional()
        } else {
            self.parse_union()
        };
        self.leave();
        let ty = result?;
        self.expect(&Token::RParen)?;
        Ok(ty)
    }

    fn parse_conditional(&mut self) -> Result<TypeExpr, TypeSyntaxError> {
        let offset = self.offset();
        let subject = match self.bump() {
            Some(Token::Variable(name)) => {
                match self.ctx.params.iter().position(|p| *p == name) {
                    Some(index) => ConditionalSubject::Param { index, name },
                    None => {
                        return Err(TypeSyntaxError::new(
                            format!("conditional subject `${name}` is not a parameter"),
                            offset,
                        ));
                    }
                }
            }
            Some(Token::Ident(name)) => match self.ctx.template(&name) {
                Some(template) => ConditionalSubject::Template(template),
                None => {
                    return Err(TypeSyntaxError::new(
                        format!("conditional subject `{name}` is not a template"),
                        offset,
                    ));
                }
            },
            _ => return Err(TypeSyntaxError::new("expected conditional subject", offset)),
        };
        // `is`
        self.pos += 1;
        let negated = if self.is_ident(0, "not") {
            self.pos += 1;
            true
        } else {
            false
        };
        let test = self.parse_union()?;
        self.expect(&Token::Question)?;
        let then = self.parse_union()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.parse_union()?;
        Ok(TypeExpr::Conditional(Box::new(ConditionalType {
            subject,
            negated,
            test,
            then,
            otherwise,
        })))
    }

    fn parse_named(&mut self, name: String, offset: usize) -> Result<TypeExpr, TypeSyntaxError> {
        if self.peek() == Some(&Token::DoubleColon) {
            self.pos += 1;
            return self.parse_class_member_literal(&name, offset);
        }

        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "self" => return Ok(TypeExpr::SelfRef),
            "static" => return Ok(TypeExpr::StaticRef),
            _ => {}
        }

        if self.peek() == Some(&Token::LBrace)
            && let Some(kind) = ShapeKind::from_keyword(&lower)
        {
            self.pos += 1;
            return self.parse_shape(kind);
        }

        if self.peek() == Some(&Token::LParen)
            && matches!(
                lower.as_str(),
                "callable" | "closure" | "\\closure" | "pure-callable" | "pure-closure"
            )
        {
            self.pos += 1;
            return self.parse_callable(&lower);
        }

        let base = self.resolve_name(&name);

        if self.peek() == Some(&Token::Lt) {
            self.pos += 1;
            return self.parse_generic(base, offset);
        }

        Ok(base)
    }

    /// Resolve a bare name to a keyword, template or class.
    fn resolve_name(&self, name: &str) -> TypeExpr {
        if let Some((base, refinement)) = canonical_keyword(name) {
            return TypeExpr::Named(NamedType {
                name: base.to_string(),
                refinement: refinement.map(|r| Refinement::Keyword(r.to_string())),
            });
        }
        if !name.contains('\\')
            && let Some(template) = self.ctx.template(name)
        {
            return TypeExpr::Template(template);
        }
        TypeExpr::Named(NamedType::plain(self.ctx.names.resolve_class(name)))
    }

    fn parse_class_member_literal(
        &mut self,
        class: &str,
        offset: usize,
    ) -> Result<TypeExpr, TypeSyntaxError> {
        let class_name = match class.to_ascii_lowercase().as_str() {
            "self" | "static" => class.to_ascii_lowercase(),
            _ => self.ctx.names.resolve_class(class),
        };
        let mut member = match self.peek() {
            Some(Token::Ident(m)) => {
                let m = m.clone();
                self.pos += 1;
                m
            }
            Some(Token::Star) => String::new(),
            _ => return Err(self.error("expected constant name after `::`")),
        };
        if member.eq_ignore_ascii_case("class") {
            return Ok(TypeExpr::Literal(LiteralValue::ClassString(class_name)));
        }
        if self.eat(&Token::Star) {
            member.push('*');
            // `FOO_*_BAR`
            if let Some(Token::Ident(tail)) = self.peek() {
                member.push_str(&tail.clone());
                self.pos += 1;
            }
        }
        if member.is_empty() {
            return Err(TypeSyntaxError::new("empty class constant name", offset));
        }
        Ok(TypeExpr::Literal(LiteralValue::ClassConstant {
            class: class_name,
            name: member,
        }))
    }

    fn parse_generic(
        &mut self,
        base: TypeExpr,
        offset: usize,
    ) -> Result<TypeExpr, TypeSyntaxError> {
        let named = match base {
            TypeExpr::Named(named) => named,
            TypeExpr::Template(t) => {
                return Err(TypeSyntaxError::new(
                    format!("template `{}` cannot take type arguments", t.name),
                    offset,
                ));
            }
            _ => return Err(TypeSyntaxError::new("type cannot take arguments", offset)),
        };

        if named.name == "int" && named.refinement.is_none() && self.at_int_range() {
            return self.parse_int_range();
        }

        self.enter()?;
        let mut args = Vec::new();
        loop {
            if self.peek() == Some(&Token::Gt) && !args.is_empty() {
                break;
            }
            // Variance markers are accepted and dropped.
            if (self.is_ident(0, "covariant") || self.is_ident(0, "contravariant"))
                && matches!(
                    self.peek_at(1),
                    Some(Token::Ident(_)) | Some(Token::LParen) | Some(Token::Question)
                )
            {
                self.pos += 1;
            }
            if self.eat(&Token::Star) {
                args.push(TypeExpr::mixed());
            } else {
                args.push(self.parse_union()?);
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.leave();
        self.expect(&Token::Gt)?;
        Ok(TypeExpr::Generic(named, args))
    }

    fn at_int_range(&self) -> bool {
        let bound = |t: Option<&Token>| match t {
            Some(Token::Int(_)) => true,
            Some(Token::Ident(w)) => w == "min" || w == "max",
            _ => false,
        };
        bound(self.peek()) && self.peek_at(1) == Some(&Token::Comma) && bound(self.peek_at(2))
    }

    fn parse_int_range(&mut self) -> Result<TypeExpr, TypeSyntaxError> {
        let min = self.parse_range_bound("min")?;
        self.expect(&Token::Comma)?;
        let max = self.parse_range_bound("max")?;
        self.expect(&Token::Gt)?;
        Ok(TypeExpr::Named(NamedType {
            name: "int".to_string(),
            refinement: Some(Refinement::IntRange { min, max }),
        }))
    }

    fn parse_range_bound(&mut self, open_word: &str) -> Result<Option<i64>, TypeSyntaxError> {
        match self.bump() {
            Some(Token::Int(v)) => Ok(Some(v)),
            Some(Token::Ident(w)) if w == open_word => Ok(None),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("expected integer or `{open_word}`")))
            }
        }
    }

    fn parse_shape(&mut self, kind: ShapeKind) -> Result<TypeExpr, TypeSyntaxError> {
        self.enter()?;
        let mut fields = Vec::new();
        let mut open = false;
        let mut rest = Vec::new();
        loop {
            if self.peek() == Some(&Token::RBrace) {
                break;
            }
            if self.eat(&Token::Ellipsis) {
                open = true;
                if self.eat(&Token::Lt) {
                    loop {
                        rest.push(self.parse_union()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::Gt)?;
                }
                self.eat(&Token::Comma);
                break;
            }
            fields.push(self.parse_shape_field()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.leave();
        self.expect(&Token::RBrace)?;
        Ok(TypeExpr::ArrayShape(ArrayShape {
            kind,
            fields,
            open,
            rest,
        }))
    }

    fn parse_shape_field(&mut self) -> Result<ShapeField, TypeSyntaxError> {
        let keyed = match self.peek_at(1) {
            Some(Token::Colon) => true,
            Some(Token::Question) => self.peek_at(2) == Some(&Token::Colon),
            _ => false,
        };
        if !keyed {
            return Ok(ShapeField {
                key: None,
                optional: false,
                ty: self.parse_union()?,
            });
        }

        let key = match self.bump() {
            Some(Token::Int(v)) => ShapeKey::Int(v),
            Some(Token::Ident(name)) => ShapeKey::Str(name),
            Some(Token::Str(s)) => ShapeKey::Str(s),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                return Err(self.error("expected shape key"));
            }
        };
        let optional = self.eat(&Token::Question);
        self.expect(&Token::Colon)?;
        let ty = self.parse_union()?;
        Ok(ShapeField {
            key: Some(key),
            optional,
            ty,
        })
    }

    fn parse_callable(&mut self, lower: &str) -> Result<TypeExpr, TypeSyntaxError> {
        let kind = match lower {
            "callable" => NamedType::plain("callable"),
            "pure-callable" => NamedType {
                name: "callable".to_string(),
                refinement: Some(Refinement::Keyword("pure-callable".to_string())),
            },
            "pure-closure" => NamedType {
                name: "Closure".to_string(),
                refinement: Some(Refinement::Keyword("pure-Closure".to_string())),
            },
            _ => NamedType::plain("Closure"),
        };

        self.enter()?;
        let mut params = Vec::new();
        while self.peek() != Some(&Token::RParen) {
            params.push(self.parse_callable_param()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.leave();
        self.expect(&Token::RParen)?;

        let ret = if self.eat(&Token::Colon) {
            self.enter()?;
            let ret = self.parse_prefix();
            self.leave();
            Some(ret?)
        } else {
            None
        };

        Ok(TypeExpr::Callable(Box::new(CallableType { kind, params, ret })))
    }

    fn parse_callable_param(&mut self) -> Result<CallableParam, TypeSyntaxError> {
        let ty = self.parse_union()?;
        let by_ref = self.eat(&Token::Amp);
        let variadic = self.eat(&Token::Ellipsis);
        let name = match self.peek() {
            Some(Token::Variable(n)) => {
                let n = n.clone();
                self.pos += 1;
                Some(n)
            }
            _ => None,
        };
        let optional = self.eat(&Token::Eq);
        Ok(CallableParam {
            ty,
            by_ref,
            variadic,
            optional,
            name,
        })
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("`{name}`"),
        Token::Variable(name) => format!("`${name}`"),
        Token::Int(v) => format!("`{v}`"),
        Token::Float(text) => format!("`{text}`"),
        Token::Str(_) => "string literal".to_string(),
        Token::Pipe => "`|`".to_string(),
        Token::Amp => "`&`".to_string(),
        Token::Lt => "`<`".to_string(),
        Token::Gt => "`>`".to_string(),
        Token::Comma => "`,`".to_string(),
        Token::LParen => "`(`".to_string(),
        Token::RParen => "`)`".to_string(),
        Token::LBrace => "`{`".to_string(),
        Token::RBrace => "`}`".to_string(),
        Token::LBracket => "`[`".to_string(),
        Token::RBracket => "`]`".to_string(),
        Token::Colon => "`:`".to_string(),
        Token::DoubleColon => "`::`".to_string(),
        Token::Question => "`?`".to_string(),
        Token::Ellipsis => "`...`".to_string(),
        Token::Eq => "`=`".to_string(),
        Token::Star => "`*`".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> NameContext {
        NameContext::default()
    }

    fn c(src: &str) -> TypeExpr {
        let names = global();
        compile(src, &CompileContext::bare(&names)).unwrap()
    }

    #[test]
    fn nullable_becomes_union_with_null() {
        assert_eq!(
            c("?int"),
            TypeExpr::Union(vec![TypeExpr::keyword("int"), TypeExpr::keyword("null")])
        );
    }

    #[test]
    fn postfix_array_becomes_generic_array() {
        assert_eq!(
            c("string[]"),
            TypeExpr::Generic(NamedType::plain("array"), vec![TypeExpr::keyword("string")])
        );
    }

    #[test]
    fn nested_unions_are_flat() {
        assert_eq!(
            c("int|(string|null)|int"),
            TypeExpr::Union(vec![
                TypeExpr::keyword("int"),
                TypeExpr::keyword("string"),
                TypeExpr::keyword("null"),
            ])
        );
    }

    #[test]
    fn int_range_is_a_refinement() {
        assert_eq!(
            c("int<0, max>"),
            TypeExpr::Named(NamedType {
                name: "int".into(),
                refinement: Some(Refinement::IntRange {
                    min: Some(0),
                    max: None
                }),
            })
        );
    }

    #[test]
    fn shape_fields_keep_order_and_flags() {
        let TypeExpr::ArrayShape(shape) = c("array{0: int, name?: string, ...}") else {
            panic!("expected shape");
        };
        assert_eq!(shape.fields.len(), 2);
        assert_eq!(shape.fields[0].key, Some(ShapeKey::Int(0)));
        assert!(!shape.fields[0].optional);
        assert_eq!(shape.fields[1].key, Some(ShapeKey::Str("name".into())));
        assert!(shape.fields[1].optional);
        assert!(shape.open);
    }

    #[test]
    fn conditional_resolves_subject_to_index() {
        let names = global();
        let params = vec!["calendar".to_string(), "field".to_string()];
        let ctx = CompileContext {
            names: &names,
            templates: &[],
            params: &params,
        };
        let ty = compile("($field is IntlCalendar::FIELD_* ? int : false)", &ctx).unwrap();
        let TypeExpr::Conditional(cond) = ty else {
            panic!("expected conditional");
        };
        assert_eq!(
            cond.subject,
            ConditionalSubject::Param {
                index: 1,
                name: "field".into()
            }
        );
        assert_eq!(
            cond.test,
            TypeExpr::Literal(LiteralValue::ClassConstant {
                class: "IntlCalendar".into(),
                name: "FIELD_*".into(),
            })
        );
        assert_eq!(cond.then, TypeExpr::keyword("int"));
        assert_eq!(cond.otherwise, TypeExpr::keyword("false"));
    }

    #[test]
    fn conditional_on_unknown_parameter_is_an_error() {
        assert!(compile("($nope is int ? int : string)", &CompileContext::bare(&global())).is_err());
    }

    #[test]
    fn templates_compile_to_positional_refs() {
        let names = global();
        let method: Vec<String> = vec!["U".into()];
        let class: Vec<String> = vec!["K".into(), "V".into()];
        let scopes: [&[String]; 2] = [&method, &class];
        let ctx = CompileContext {
            names: &names,
            templates: &scopes,
            params: &[],
        };
        let ty = compile("Iterator<K, V|U>", &ctx).unwrap();
        assert_eq!(
            ty,
            TypeExpr::Generic(
                NamedType::plain("Iterator"),
                vec![
                    TypeExpr::Template(TemplateRef {
                        level: 1,
                        index: 0,
                        name: "K".into()
                    }),
                    TypeExpr::union([
                        TypeExpr::Template(TemplateRef {
                            level: 1,
                            index: 1,
                            name: "V".into()
                        }),
                        TypeExpr::Template(TemplateRef {
                            level: 0,
                            index: 0,
                            name: "U".into()
                        }),
                    ]),
                ]
            )
        );
    }

    #[test]
    fn callable_with_by_ref_param_is_not_an_intersection() {
        let TypeExpr::Callable(callable) = c("callable(int &$x, string ...$rest): void") else {
            panic!("expected callable");
        };
        assert_eq!(callable.params.len(), 2);
        assert!(callable.params[0].by_ref);
        assert!(callable.params[1].variadic);
        assert_eq!(callable.ret, Some(TypeExpr::keyword("void")));
    }

    #[test]
    fn unbalanced_generic_is_an_error() {
        let err = compile("array<int, string", &CompileContext::bare(&global())).unwrap_err();
        assert!(err.message.contains("expected `>`"));
    }

    #[test]
    fn names_resolve_through_namespace() {
        let names = NameContext::new(Some("Foo".into()));
        let ty = compile("Bar|\\Baz", &CompileContext::bare(&names)).unwrap();
        assert_eq!(
            ty,
            TypeExpr::Union(vec![TypeExpr::class("Foo\\Bar"), TypeExpr::class("Baz")])
        );
    }

    #[test]
    fn deep_nesting_is_rejected_not_overflowed() {
        let src = format!("{}int{}", "array<".repeat(200), ">".repeat(200));
        assert!(compile(&src, &CompileContext::bare(&global())).is_err());
    }
}
