/// Function, method, parameter and global constant extraction.
///
/// Global constants come from both `const X = ...;` statements and
/// `define('X', ...)` calls; the latter are usually wrapped in
/// `if (!defined('X'))` guards, which the statement walker already
/// descends into.
use mago_span::HasSpan;
use mago_syntax::ast::*;

use crate::declarations::{
    ClassKind, ConstantDecl, Declaration, FunctionDecl, ParamDecl, Visibility,
};

use super::attributes;
use super::classes::hint_text;
use super::{Walker, value_after_equals, visibility_of};

impl Walker<'_> {
    pub(crate) fn extract_function(&mut self, func: &Function<'_>) {
        let located = self.locate(func);
        let short = func.name.value;
        if !self.check_name(short, "function", located.offset) {
            return;
        }
        if !self.available(&located.attributes) {
            tracing::debug!(name = short, "function not available for target version");
            return;
        }
        let names = self.scope.shared();
        let name = names.qualify(short);

        let params = self.extract_parameters(&func.parameter_list, &name);
        let return_hint = self.effective_hint(
            &located.attributes,
            func.return_type_hint.as_ref().map(|rth| hint_text(&rth.hint)),
        );
        let by_ref_return =
            self.returns_by_ref(func.span().start.offset, func.name.span.start.offset);

        self.declarations.push(Declaration::Function(FunctionDecl {
            name,
            offset: located.offset,
            names,
            docblock: located.docblock,
            attributes: located.attributes,
            params,
            return_hint,
            by_ref_return,
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
            is_final: false,
        }));
    }

    pub(crate) fn extract_method(
        &mut self,
        method: &Method<'_>,
        class_name: &str,
        kind: ClassKind,
    ) -> Option<FunctionDecl> {
        let located = self.locate(method);
        let name = method.name.value;
        if !self.check_name(name, "method", located.offset) {
            return None;
        }
        if !self.available(&located.attributes) {
            tracing::debug!(class = class_name, name, "method not available for target version");
            return None;
        }

        let qualified = format!("{class_name}::{name}");
        let params = self.extract_parameters(&method.parameter_list, &qualified);
        let return_hint = self.effective_hint(
            &located.attributes,
            method
                .return_type_hint
                .as_ref()
                .map(|rth| hint_text(&rth.hint)),
        );
        let by_ref_return =
            self.returns_by_ref(method.span().start.offset, method.name.span.start.offset);

        Some(FunctionDecl {
            name: name.to_string(),
            offset: located.offset,
            names: self.scope.shared(),
            docblock: located.docblock,
            attributes: located.attributes,
            params,
            return_hint,
            by_ref_return,
            visibility: visibility_of(method.modifiers.iter()),
            is_static: method.modifiers.iter().any(|m| m.is_static()),
            // Interface methods are implicitly abstract.
            is_abstract: kind == ClassKind::Interface
                || method.modifiers.iter().any(|m| m.is_abstract()),
            is_final: method.modifiers.iter().any(|m| m.is_final()),
        })
    }

    /// Extract parameters, dropping those marked unavailable for the
    /// target version and applying `#[LanguageLevelTypeAware]`.
    fn extract_parameters(
        &mut self,
        parameter_list: &FunctionLikeParameterList<'_>,
        owner: &str,
    ) -> Vec<ParamDecl> {
        let mut out = Vec::new();
        for param in parameter_list.parameters.iter() {
            let located = self.locate(param);
            if !self.available(&located.attributes) {
                continue;
            }
            let raw_name = param.variable.name;
            let name = raw_name.strip_prefix('$').unwrap_or(raw_name);
            if !super::is_valid_name(name) {
                self.parse_error(
                    format!("parameter with invalid name `{raw_name}` skipped"),
                    located.offset,
                    owner,
                );
                continue;
            }
            let hint = self.effective_hint(
                &located.attributes,
                param.hint.as_ref().map(|h| hint_text(h)),
            );
            let default = param
                .default_value
                .as_ref()
                .and_then(|dv| {
                    let text = self.text_of(dv).trim();
                    let text = text.strip_prefix('=').unwrap_or(text).trim();
                    (!text.is_empty()).then(|| text.to_string())
                });
            let promoted = param
                .is_promoted_property()
                .then(|| visibility_of(param.modifiers.iter()));

            out.push(ParamDecl {
                name: name.to_string(),
                hint,
                default,
                variadic: param.ellipsis.is_some(),
                by_ref: param.ampersand.is_some(),
                promoted,
                attributes: located.attributes,
            });
        }
        out
    }

    /// `#[LanguageLevelTypeAware]` replaces the native hint; an empty type
    /// from the attribute means "no native type".
    fn effective_hint(
        &self,
        attributes: &[crate::declarations::AttributeDecl],
        native: Option<String>,
    ) -> Option<String> {
        match attributes::language_level_type(attributes, self.php_version()) {
            Some(ty) if ty.is_empty() => None,
            Some(ty) => Some(ty),
            None => native,
        }
    }

    /// `function &foo()` returns by reference.
    fn returns_by_ref(&self, start: u32, name_start: u32) -> bool {
        self.content
            .get(start as usize..name_start as usize)
            .is_some_and(|head| head.contains('&'))
    }

    pub(crate) fn extract_global_constant(&mut self, constant: &Constant<'_>) {
        let located = self.locate(constant);
        if !self.available(&located.attributes) {
            return;
        }
        for item in constant.items.iter() {
            let name = item.name.value;
            let offset = self.file_offset(item.span().start.offset as usize);
            if !self.check_name(name, "constant", offset) {
                continue;
            }
            let names = self.scope.shared();
            let value = value_after_equals(self.text_of(item));
            self.declarations.push(Declaration::Constant(ConstantDecl {
                name: names.qualify(name),
                offset,
                names,
                docblock: located.docblock.clone(),
                attributes: located.attributes.clone(),
                hint: None,
                value,
                visibility: Visibility::Public,
            }));
        }
    }

    /// `define('NAME', value);`
    pub(crate) fn extract_define(&mut self, expr_stmt: &ExpressionStatement<'_>) {
        let Expression::Call(Call::Function(func_call)) = expr_stmt.expression else {
            return;
        };
        let is_define = matches!(
            func_call.function,
            Expression::Identifier(ident) if ident.value().trim_start_matches('\\').eq_ignore_ascii_case("define")
        );
        if !is_define {
            return;
        }
        let args: Vec<_> = func_call.argument_list.arguments.iter().collect();
        let Some(first) = args.first() else {
            return;
        };
        let value = args
            .get(1)
            .map(|arg| match arg {
                Argument::Positional(pos) => self.text_of(pos.value),
                Argument::Named(named) => self.text_of(named.value),
            })
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let first_expr = match first {
            Argument::Positional(pos) => pos.value,
            Argument::Named(named) => named.value,
        };
        let located = self.locate(expr_stmt);
        let Expression::Literal(Literal::String(lit)) = first_expr else {
            self.parse_error("define() with a non-literal name skipped", located.offset, "define");
            return;
        };
        let Some(name) = lit.value.map(|v| v.trim_start_matches('\\').to_string()) else {
            return;
        };
        if !self.check_name(&name, "define() constant", located.offset) {
            return;
        }

        self.declarations.push(Declaration::Constant(ConstantDecl {
            name,
            offset: located.offset,
            names: self.scope.shared(),
            docblock: located.docblock,
            attributes: located.attributes,
            hint: None,
            value,
            visibility: Visibility::Public,
        }));
    }
}
