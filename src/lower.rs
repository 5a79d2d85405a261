//! Lowering from parsed declarations to database symbols.
//!
//! This is where docblocks are parsed and type text is compiled, because
//! only here are a declaration's template and parameter scopes known.
//! Every failure degrades the one affected type to `Unknown` and records an
//! `AnnotationError`; the rest of the symbol is kept.

use crate::declarations::{
    AttributeDecl, ClassDecl, ClassKind, ConstantDecl, Declaration, FunctionDecl, MemberDecl,
    PropertyDecl, Visibility,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::docblock::{DeprecatedTag, DocblockAnnotations, DocblockOptions, TemplateTag, parse_docblock};
use crate::parser::ParsedFile;
use crate::parser::attributes;
use crate::parser::names::NameContext;
use crate::type_expr::{CompileContext, LiteralValue, TemplateRef, TypeExpr, compile};
use crate::types::{
    AncestorBinding, Assertion, AssertionTarget, ClassShape, Deprecation, EffectSet, Location,
    Modifiers, ParamDefault, ParamSig, Signature, Symbol, SymbolKind, TemplateParam,
};

/// Symbols lowered from one file, in declaration order.
#[derive(Debug, Clone)]
pub(crate) struct LoweredFile {
    pub path: String,
    pub symbols: Vec<Symbol>,
    pub diagnostics: Vec<Diagnostic>,
}

pub(crate) fn lower_file(file: ParsedFile, options: &DocblockOptions) -> LoweredFile {
    let mut lowerer = Lowerer {
        path: &file.path,
        options,
        diagnostics: Vec::new(),
    };
    let symbols = file
        .declarations
        .iter()
        .map(|decl| match decl {
            Declaration::ClassLike(class) => lowerer.lower_class(class),
            Declaration::Function(func) => lowerer.lower_callable(func, None),
            Declaration::Constant(constant) => lowerer.lower_constant(constant, None),
        })
        .collect();

    let mut diagnostics = file.diagnostics;
    diagnostics.append(&mut lowerer.diagnostics);
    LoweredFile {
        path: file.path,
        symbols,
        diagnostics,
    }
}

/// What members need to know about their class.
struct ClassScope<'a> {
    name: &'a str,
    templates: Vec<String>,
    immutable: bool,
    no_named_arguments: bool,
}

struct Lowerer<'a> {
    path: &'a str,
    options: &'a DocblockOptions,
    diagnostics: Vec<Diagnostic>,
}

impl Lowerer<'_> {
    fn annotation_error(&mut self, symbol: &str, offset: u32, message: String) {
        self.diagnostics.push(
            Diagnostic::new(DiagnosticKind::AnnotationError, message)
                .at(self.path, offset)
                .for_symbol(symbol),
        );
    }

    fn docblock(&mut self, text: Option<&str>, symbol: &str, offset: u32) -> DocblockAnnotations {
        let Some(text) = text else {
            return DocblockAnnotations::default();
        };
        let ann = parse_docblock(text, self.options);
        for (tag, message) in &ann.malformed {
            self.annotation_error(symbol, offset, format!("malformed {tag}: {message}"));
        }
        ann
    }

    /// Compile docblock or native type text, degrading to `Unknown`.
    fn compile_type(
        &mut self,
        text: &str,
        ctx: &CompileContext<'_>,
        symbol: &str,
        offset: u32,
        what: &str,
    ) -> TypeExpr {
        match compile(text, ctx) {
            Ok(ty) => ty,
            Err(err) => {
                self.annotation_error(symbol, offset, format!("invalid {what} type `{text}`: {err}"));
                TypeExpr::Unknown
            }
        }
    }

    fn native_type(
        &mut self,
        hint: Option<&str>,
        ctx: &CompileContext<'_>,
        symbol: &str,
        offset: u32,
    ) -> Option<TypeExpr> {
        hint.map(|h| self.compile_type(h, ctx, symbol, offset, "native"))
    }

    fn template_params(
        &mut self,
        tags: &[TemplateTag],
        ctx: &CompileContext<'_>,
        symbol: &str,
        offset: u32,
    ) -> Vec<TemplateParam> {
        tags.iter()
            .map(|tag| TemplateParam {
                name: tag.name.clone(),
                bound: tag
                    .bound
                    .as_deref()
                    .map(|b| self.compile_type(b, ctx, symbol, offset, "template bound")),
                default: tag
                    .default
                    .as_deref()
                    .map(|d| self.compile_type(d, ctx, symbol, offset, "template default")),
                variance: tag.variance,
            })
            .collect()
    }

    // ─── Class-likes ────────────────────────────────────────────────────

    fn lower_class(&mut self, decl: &ClassDecl) -> Symbol {
        let ann = self.docblock(decl.docblock.as_deref(), &decl.name, decl.offset);
        let template_names = ann.template_names();
        let scopes = [template_names.as_slice()];
        let ctx = CompileContext {
            names: &decl.names,
            templates: &scopes,
            params: &[],
        };

        let templates = self.template_params(&ann.templates, &ctx, &decl.name, decl.offset);

        let mut bindings = Vec::new();
        for text in ann.extends.iter().chain(&ann.implements).chain(&ann.uses) {
            match self.compile_type(text, &ctx, &decl.name, decl.offset, "ancestor binding") {
                TypeExpr::Generic(base, args) if !base.is_keyword() => {
                    bindings.push(AncestorBinding {
                        name: base.name,
                        args,
                    });
                }
                TypeExpr::Named(base) if !base.is_keyword() => {}
                TypeExpr::Unknown => {}
                other => self.annotation_error(
                    &decl.name,
                    decl.offset,
                    format!("ancestor binding `{other}` does not name a class"),
                ),
            }
        }

        let mut interfaces = decl.interfaces.clone();
        if decl.kind == ClassKind::Enum {
            let implicit = if decl.enum_backing.is_some() {
                "BackedEnum"
            } else {
                "UnitEnum"
            };
            if !interfaces.iter().any(|i| i.eq_ignore_ascii_case(implicit)) {
                interfaces.push(implicit.to_string());
            }
        }

        let enum_backing = decl
            .enum_backing
            .as_deref()
            .and_then(|b| self.native_type(Some(b), &ctx, &decl.name, decl.offset));

        let inheritors = ann
            .inheritors
            .iter()
            .map(|name| decl.names.resolve_class(name))
            .collect();

        let scope = ClassScope {
            name: &decl.name,
            templates: template_names.clone(),
            immutable: ann.immutable || ann.mutation_free,
            no_named_arguments: ann.no_named_arguments,
        };

        let mut members = Vec::new();
        let mut traits = Vec::new();
        for member in &decl.members {
            match member {
                MemberDecl::Method(method) => {
                    let symbol = self.lower_callable(method, Some(&scope));
                    let promoted = self.promoted_properties(method, &symbol, &scope);
                    members.push(symbol);
                    members.extend(promoted);
                }
                MemberDecl::Property(property) => {
                    members.push(self.lower_property(property, &scope));
                }
                MemberDecl::Constant(constant) => {
                    members.push(self.lower_constant(constant, Some(&scope)));
                }
                MemberDecl::EnumCase(case) => members.push(self.lower_enum_case(case, &scope)),
                MemberDecl::TraitUse(names) => traits.extend(names.iter().cloned()),
            }
        }

        Symbol {
            name: decl.name.clone(),
            kind: SymbolKind::from_class_kind(decl.kind),
            location: self.location(decl.offset),
            visibility: Visibility::Public,
            is_static: false,
            declaring_class: None,
            modifiers: Modifiers {
                is_abstract: decl.is_abstract,
                is_final: decl.is_final,
                is_readonly: decl.is_readonly,
                tentative_type: false,
            },
            signature: None,
            class: Some(ClassShape {
                kind: decl.kind,
                parent: decl.parent.clone(),
                interfaces,
                traits,
                templates,
                bindings,
                members,
                enum_backing,
                inheritors,
            }),
            ty: None,
            value: None,
            effects: EffectSet {
                deprecated: deprecation(ann.deprecated.as_ref(), &decl.attributes),
                ..EffectSet::default()
            },
            since: ann.since,
        }
    }

    fn location(&self, offset: u32) -> Location {
        Location {
            file: self.path.to_string(),
            offset,
        }
    }

    // ─── Functions and methods ──────────────────────────────────────────

    fn lower_callable(&mut self, decl: &FunctionDecl, class: Option<&ClassScope<'_>>) -> Symbol {
        let qualified = match class {
            Some(c) => format!("{}::{}", c.name, decl.name),
            None => decl.name.clone(),
        };
        let offset = decl.offset;
        let ann = self.docblock(decl.docblock.as_deref(), &qualified, offset);

        let method_templates = ann.template_names();
        let param_names: Vec<String> = decl.params.iter().map(|p| p.name.clone()).collect();
        let mut scopes: Vec<&[String]> = vec![method_templates.as_slice()];
        if let Some(c) = class {
            scopes.push(c.templates.as_slice());
        }
        let ctx = CompileContext {
            names: &decl.names,
            templates: &scopes,
            params: &param_names,
        };

        for tag in &ann.params {
            if !param_names.contains(&tag.name) {
                tracing::debug!(symbol = %qualified, param = %tag.name, "@param for a parameter the signature does not declare");
            }
        }

        let self_class = class.map(|c| c.name);
        let mut params = Vec::with_capacity(decl.params.len());
        for p in &decl.params {
            let native = self.native_type(p.hint.as_deref(), &ctx, &qualified, offset);
            let ty = match ann.param(&p.name) {
                Some(tag) => self.compile_type(&tag.type_text, &ctx, &qualified, offset, "@param"),
                None => match attributes::array_shape(&p.attributes) {
                    Some(shape) => self.compile_type(&shape, &ctx, &qualified, offset, "#[ArrayShape]"),
                    None => native.clone().unwrap_or_default(),
                },
            };
            let out = ann
                .param_out(&p.name)
                .map(|tag| self.compile_type(&tag.type_text, &ctx, &qualified, offset, "@param-out"));
            let default = p.default.as_ref().map(|text| ParamDefault {
                text: text.clone(),
                value: parse_literal(text, &decl.names, self_class),
            });
            params.push(ParamSig {
                name: p.name.clone(),
                ty,
                native,
                default,
                variadic: p.variadic,
                by_ref: p.by_ref,
                out,
                promoted: p.promoted.is_some(),
            });
        }

        let native_return = self.native_type(decl.return_hint.as_deref(), &ctx, &qualified, offset);
        let return_type = match (&ann.return_type, attributes::array_shape(&decl.attributes)) {
            (Some(text), _) => self.compile_type(text, &ctx, &qualified, offset, "@return"),
            (None, Some(shape)) => self.compile_type(&shape, &ctx, &qualified, offset, "#[ArrayShape]"),
            (None, None) => native_return.clone().unwrap_or_default(),
        };

        let mut assertions = Vec::new();
        for tag in &ann.assertions {
            let target = if tag.param == "this" {
                AssertionTarget::This
            } else if let Some(index) = param_names.iter().position(|n| *n == tag.param) {
                AssertionTarget::Param(index)
            } else {
                self.annotation_error(
                    &qualified,
                    offset,
                    format!("assertion on unknown parameter `${}`", tag.param),
                );
                continue;
            };
            let ty = self.compile_type(&tag.type_text, &ctx, &qualified, offset, "assertion");
            assertions.push(Assertion {
                kind: tag.kind,
                negated: tag.negated,
                target,
                ty,
            });
        }

        let throws = ann
            .throws
            .iter()
            .map(|t| self.compile_type(t, &ctx, &qualified, offset, "@throws"))
            .collect();

        let templates = self.template_params(&ann.templates, &ctx, &qualified, offset);

        let attr_pure = attributes::pure(&decl.attributes);
        let pure = ann.pure || attr_pure == Some(false);
        let mutation_free = pure
            || ann.mutation_free
            || attr_pure == Some(true)
            || class.is_some_and(|c| c.immutable && !decl.is_static);
        let effects = EffectSet {
            pure,
            mutation_free,
            no_named_arguments: ann.no_named_arguments
                || class.is_some_and(|c| c.no_named_arguments),
            deprecated: deprecation(ann.deprecated.as_ref(), &decl.attributes),
            by_reference: params
                .iter()
                .enumerate()
                .filter(|(_, p)| p.by_ref)
                .map(|(i, _)| i)
                .collect(),
            out_params: params
                .iter()
                .enumerate()
                .filter(|(_, p)| p.is_out())
                .map(|(i, _)| i)
                .collect(),
        };

        Symbol {
            name: decl.name.clone(),
            kind: if class.is_some() {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            },
            location: self.location(offset),
            visibility: decl.visibility,
            is_static: decl.is_static,
            declaring_class: class.map(|c| c.name.to_string()),
            modifiers: Modifiers {
                is_abstract: decl.is_abstract,
                is_final: decl.is_final,
                is_readonly: false,
                tentative_type: attributes::tentative_type(&decl.attributes),
            },
            signature: Some(Signature {
                params,
                return_type,
                native_return,
                templates,
                by_ref_return: decl.by_ref_return,
                assertions,
                throws,
            }),
            class: None,
            ty: None,
            value: None,
            effects,
            since: ann.since,
        }
    }

    /// Constructor-promoted parameters are also properties.
    fn promoted_properties(
        &mut self,
        method: &FunctionDecl,
        symbol: &Symbol,
        scope: &ClassScope<'_>,
    ) -> Vec<Symbol> {
        let Some(signature) = &symbol.signature else {
            return Vec::new();
        };
        method
            .params
            .iter()
            .zip(&signature.params)
            .filter_map(|(decl, sig)| {
                let visibility = decl.promoted?;
                Some(Symbol {
                    name: decl.name.clone(),
                    kind: SymbolKind::Property,
                    location: symbol.location.clone(),
                    visibility,
                    is_static: false,
                    declaring_class: Some(scope.name.to_string()),
                    modifiers: Modifiers::default(),
                    signature: None,
                    class: None,
                    ty: Some(to_class_scope(sig.ty.clone())),
                    value: None,
                    effects: EffectSet::default(),
                    since: None,
                })
            })
            .collect()
    }

    // ─── Properties and constants ───────────────────────────────────────

    fn lower_property(&mut self, decl: &PropertyDecl, scope: &ClassScope<'_>) -> Symbol {
        let qualified = format!("{}::${}", scope.name, decl.name);
        let ann = self.docblock(decl.docblock.as_deref(), &qualified, decl.offset);
        let scopes = [scope.templates.as_slice()];
        let ctx = CompileContext {
            names: &decl.names,
            templates: &scopes,
            params: &[],
        };
        let ty = match &ann.var {
            Some(text) => self.compile_type(text, &ctx, &qualified, decl.offset, "@var"),
            None => self
                .native_type(decl.hint.as_deref(), &ctx, &qualified, decl.offset)
                .unwrap_or_default(),
        };

        Symbol {
            name: decl.name.clone(),
            kind: SymbolKind::Property,
            location: self.location(decl.offset),
            visibility: decl.visibility,
            is_static: decl.is_static,
            declaring_class: Some(scope.name.to_string()),
            modifiers: Modifiers {
                is_readonly: decl.is_readonly,
                ..Modifiers::default()
            },
            signature: None,
            class: None,
            ty: Some(ty),
            value: decl
                .default
                .as_deref()
                .and_then(|text| parse_literal(text, &decl.names, Some(scope.name))),
            effects: EffectSet {
                deprecated: deprecation(ann.deprecated.as_ref(), &decl.attributes),
                ..EffectSet::default()
            },
            since: ann.since,
        }
    }

    fn lower_constant(&mut self, decl: &ConstantDecl, class: Option<&ClassScope<'_>>) -> Symbol {
        let qualified = match class {
            Some(c) => format!("{}::{}", c.name, decl.name),
            None => decl.name.clone(),
        };
        let ann = self.docblock(decl.docblock.as_deref(), &qualified, decl.offset);
        let ctx = CompileContext::bare(&decl.names);
        let value = decl
            .value
            .as_deref()
            .and_then(|text| parse_literal(text, &decl.names, class.map(|c| c.name)));
        let ty = match (&ann.var, decl.hint.as_deref()) {
            (Some(text), _) => Some(self.compile_type(text, &ctx, &qualified, decl.offset, "@var")),
            (None, Some(hint)) => self.native_type(Some(hint), &ctx, &qualified, decl.offset),
            (None, None) => value.as_ref().map(LiteralValue::to_type),
        };

        Symbol {
            name: decl.name.clone(),
            kind: if class.is_some() {
                SymbolKind::ClassConstant
            } else {
                SymbolKind::GlobalConstant
            },
            location: self.location(decl.offset),
            visibility: decl.visibility,
            is_static: class.is_some(),
            declaring_class: class.map(|c| c.name.to_string()),
            modifiers: Modifiers::default(),
            signature: None,
            class: None,
            ty,
            value,
            effects: EffectSet {
                deprecated: deprecation(ann.deprecated.as_ref(), &decl.attributes),
                ..EffectSet::default()
            },
            since: ann.since,
        }
    }

    fn lower_enum_case(&mut self, decl: &ConstantDecl, scope: &ClassScope<'_>) -> Symbol {
        let mut symbol = self.lower_constant(decl, Some(scope));
        symbol.kind = SymbolKind::EnumCase;
        symbol.ty = Some(TypeExpr::class(scope.name));
        symbol
    }
}

/// Re-level a type compiled in a method's scope for use at class level.
/// The method's own templates have no meaning there.
fn to_class_scope(ty: TypeExpr) -> TypeExpr {
    ty.rewrite(&mut |node| match node {
        TypeExpr::Template(r) if r.level > 0 => TypeExpr::Template(TemplateRef {
            level: r.level - 1,
            ..r
        }),
        TypeExpr::Template(_) => TypeExpr::mixed(),
        other => other,
    })
}

/// Merge `@deprecated` and `#[Deprecated]`; the docblock wins where both
/// say something.
fn deprecation(tag: Option<&DeprecatedTag>, attrs: &[AttributeDecl]) -> Option<Deprecation> {
    let attr = attributes::deprecated(attrs);
    if tag.is_none() && attr.is_none() {
        return None;
    }
    let mut out = Deprecation::default();
    if let Some(tag) = tag {
        out.message = tag.message.clone();
        out.since = tag.since.clone();
    }
    if let Some(attr) = attr {
        out.message = out.message.or(attr.reason);
        out.since = out.since.or(attr.since);
        out.replacement = attr.replacement;
    }
    Some(out)
}

/// Interpret a constant or default value written in PHP source, if it is a
/// plain literal.  `self_class` resolves `self::` and `static::`.
pub(crate) fn parse_literal(
    text: &str,
    names: &NameContext,
    self_class: Option<&str>,
) -> Option<LiteralValue> {
    let text = text.trim();
    let lower = text.trim_start_matches('\\').to_ascii_lowercase();
    match lower.as_str() {
        "null" => return Some(LiteralValue::Null),
        "true" => return Some(LiteralValue::Bool(true)),
        "false" => return Some(LiteralValue::Bool(false)),
        _ => {}
    }

    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Some(LiteralValue::String(unescape_single(inner)));
    }
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return unescape_double(inner).map(LiteralValue::String);
    }

    if let Some((class, member)) = text.split_once("::") {
        let class = class.trim();
        let member = member.trim();
        if !crate::parser::is_valid_name(member) {
            return None;
        }
        let class = match class.to_ascii_lowercase().as_str() {
            "self" | "static" => self_class?.to_string(),
            _ if crate::parser::is_valid_name(class) => names.resolve_class(class),
            _ => return None,
        };
        return Some(if member.eq_ignore_ascii_case("class") {
            LiteralValue::ClassString(class)
        } else {
            LiteralValue::ClassConstant {
                class,
                name: member.to_string(),
            }
        });
    }

    parse_number(text)
}

fn parse_number(text: &str) -> Option<LiteralValue> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, text[1..].trim_start()),
        b'+' => (false, text[1..].trim_start()),
        _ => (false, text),
    };
    let digits = digits.replace('_', "");
    if digits.is_empty() {
        return None;
    }
    let lower = digits.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if lower.len() > 1 && lower.starts_with('0') && lower.bytes().all(|b| b.is_ascii_digit()) {
        i64::from_str_radix(&lower[1..], 8).ok()
    } else if lower.bytes().all(|b| b.is_ascii_digit()) {
        lower.parse::<i64>().ok()
    } else {
        let is_float = lower
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'-' | b'+'))
            && lower.bytes().any(|b| b.is_ascii_digit());
        return (is_float && lower.parse::<f64>().is_ok()).then(|| {
            LiteralValue::Float(if negative {
                format!("-{digits}")
            } else {
                digits.clone()
            })
        });
    };
    parsed.map(|n| LiteralValue::Int(if negative { -n } else { n }))
}

fn unescape_single(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && matches!(chars.peek(), Some('\'') | Some('\\')) {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Double-quoted strings with interpolation are not literals.
fn unescape_double(inner: &str) -> Option<String> {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '$' => return None,
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some('e') => out.push('\u{1b}'),
                Some('v') => out.push('\u{0b}'),
                Some('f') => out.push('\u{0c}'),
                Some(c @ ('\\' | '"' | '$')) => out.push(c),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    Some(out)
}
