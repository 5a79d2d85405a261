//! Call-site evaluation of signature types.
//!
//! [`evaluate`] turns a declared return type, which may mention template
//! parameters, `self`/`static` and conditionals, into a concrete type for
//! one call.  The steps are:
//!
//! 1. map call arguments onto parameters (positional, named, omitted);
//! 2. bind templates, from explicit arguments, the receiver type and
//!    argument unification ([`bind`]);
//! 3. rewrite the type bottom-up, substituting bound templates and deciding
//!    each conditional against the argument it tests ([`decide`]);
//! 4. normalize the result.
//!
//! A conditional whose subject cannot be decided statically evaluates to
//! the union of both branches.  Evaluation is a pure function of the
//! database and the call site.

mod bind;
mod decide;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::SymbolDatabase;
use crate::type_expr::{ConditionalSubject, LiteralValue, NamedType, TemplateRef, TypeExpr};
use crate::types::{ClassKind, ParamSig, Signature, Symbol, SymbolKind};

use bind::Bindings;

pub use decide::decide;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),

    #[error("`{0}` is not callable")]
    NotCallable(String),

    #[error("template `{name}` is not in scope in `{symbol}`")]
    UnresolvedTemplate { symbol: String, name: String },
}

/// What the caller knows about one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Type of the object (or class) the method is called on.
    #[serde(default)]
    pub receiver: Option<TypeExpr>,
    #[serde(default)]
    pub args: Vec<CallArgument>,
    /// Explicit generic arguments for the callee's own templates.
    #[serde(default)]
    pub template_args: Vec<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallArgument {
    /// Set for named arguments (`foo(flags: 1)`), without `$`.
    #[serde(default)]
    pub name: Option<String>,
    pub value: ArgValue,
}

/// A statically known argument value, or just its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgValue {
    Literal(LiteralValue),
    Type(TypeExpr),
}

impl ArgValue {
    pub fn ty(&self) -> TypeExpr {
        match self {
            ArgValue::Literal(value) => value.to_type(),
            ArgValue::Type(ty) => ty.clone(),
        }
    }
}

impl CallSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_receiver(mut self, receiver: TypeExpr) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn literal(mut self, value: LiteralValue) -> Self {
        self.args.push(CallArgument {
            name: None,
            value: ArgValue::Literal(value),
        });
        self
    }

    pub fn typed(mut self, ty: TypeExpr) -> Self {
        self.args.push(CallArgument {
            name: None,
            value: ArgValue::Type(ty),
        });
        self
    }

    pub fn named(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.args.push(CallArgument {
            name: Some(name.into()),
            value,
        });
        self
    }

    pub fn with_template_args(mut self, args: Vec<TypeExpr>) -> Self {
        self.template_args = args;
        self
    }
}

/// Evaluate the return type of `symbol` for `site`.
pub fn evaluate(db: &SymbolDatabase, symbol: &Symbol, site: &CallSite) -> Result<TypeExpr, EvalError> {
    let sig = signature(symbol)?;
    let frame = Frame::for_callable(db, symbol, sig, site);
    frame.instantiate(sig.return_type.clone())
}

/// Evaluate the `@param-out` type of parameter `index`, or its declared
/// type when it has none.
pub fn evaluate_param_out(
    db: &SymbolDatabase,
    symbol: &Symbol,
    site: &CallSite,
    index: usize,
) -> Result<Option<TypeExpr>, EvalError> {
    let sig = signature(symbol)?;
    let Some(param) = sig.params.get(index) else {
        return Ok(None);
    };
    let frame = Frame::for_callable(db, symbol, sig, site);
    let ty = param.out.clone().unwrap_or_else(|| param.ty.clone());
    frame.instantiate(ty).map(Some)
}

/// Evaluate a property's type as seen through `receiver`.
pub fn evaluate_property(
    db: &SymbolDatabase,
    property: &Symbol,
    receiver: Option<&TypeExpr>,
) -> Result<TypeExpr, EvalError> {
    let declared = property.ty.clone().unwrap_or_default();
    let frame = Frame::for_member(db, property, receiver);
    frame.instantiate(declared)
}

fn signature(symbol: &Symbol) -> Result<&Signature, EvalError> {
    symbol
        .signature
        .as_ref()
        .ok_or_else(|| EvalError::NotCallable(symbol.qualified_name()))
}

/// Everything one evaluation needs.
struct Frame<'a> {
    db: &'a SymbolDatabase,
    symbol: &'a Symbol,
    params: &'a [ParamSig],
    /// Argument mapped to each parameter, `None` when omitted.
    args: Vec<Option<&'a ArgValue>>,
    bindings: Bindings,
    /// Type `self` resolves to.
    self_type: Option<TypeExpr>,
    /// Type `static` and `$this` resolve to.
    static_type: Option<TypeExpr>,
}

impl<'a> Frame<'a> {
    fn for_callable(db: &'a SymbolDatabase, symbol: &'a Symbol, sig: &'a Signature, site: &'a CallSite) -> Self {
        let mut frame = Frame::for_member(db, symbol, site.receiver.as_ref());
        frame.params = &sig.params;
        frame.args = map_arguments(symbol, &sig.params, &site.args);
        frame.bindings.push_inner(sig.templates.clone());
        for (i, ty) in site.template_args.iter().enumerate() {
            frame.bindings.bind(0, i, ty.clone());
        }
        if let Some(receiver) = &site.receiver {
            frame.bind_receiver(receiver, 1);
        }
        for (param, arg) in sig.params.iter().zip(&frame.args) {
            if let Some(arg) = arg {
                bind::unify(db, &param.ty, &arg.ty(), &mut frame.bindings);
            }
        }
        frame
    }

    /// A frame whose innermost scope is the declaring class's templates.
    fn for_member(db: &'a SymbolDatabase, symbol: &'a Symbol, receiver: Option<&TypeExpr>) -> Self {
        let declaring = symbol.declaring_class.as_deref().and_then(|c| db.lookup_class(c));
        let class_templates = declaring
            .and_then(|c| c.class.as_ref())
            .map(|shape| shape.templates.clone())
            .unwrap_or_default();
        let declaring_type = declaring.map(|c| TypeExpr::class(c.name.clone()));
        let in_trait = declaring
            .and_then(|c| c.class.as_ref())
            .is_some_and(|s| s.kind == ClassKind::Trait);

        let receiver_type = receiver.cloned().filter(|r| !r.is_mixed());
        let self_type = if in_trait {
            receiver_type.clone().or(declaring_type.clone())
        } else {
            declaring_type.clone()
        };
        let static_type = receiver_type.or(declaring_type);

        let mut frame = Frame {
            db,
            symbol,
            params: &[],
            args: Vec::new(),
            bindings: Bindings::new(vec![class_templates]),
            self_type,
            static_type,
        };
        if symbol.kind == SymbolKind::Property
            && let Some(receiver) = receiver
        {
            frame.bind_receiver(receiver, 0);
        }
        frame
    }

    /// Bind the declaring class's templates (scope `level`) from the
    /// receiver's generic arguments.
    fn bind_receiver(&mut self, receiver: &TypeExpr, level: usize) {
        let Some(declaring) = self.symbol.declaring_class.as_deref() else {
            return;
        };
        for member in receiver.members() {
            let (name, args) = match member {
                TypeExpr::Generic(base, args) => (&base.name, args.as_slice()),
                TypeExpr::Named(base) if !base.is_keyword() => (&base.name, &[][..]),
                _ => continue,
            };
            if let Some(bound) = bind::ancestor_args(self.db, name, args, declaring) {
                for (i, ty) in bound.into_iter().enumerate() {
                    if let Some(ty) = ty {
                        self.bindings.bind(level, i, ty);
                    }
                }
                return;
            }
        }
    }

    /// Substitute and decide, then normalize.
    fn instantiate(&self, ty: TypeExpr) -> Result<TypeExpr, EvalError> {
        let mut error = None;
        let result = ty.rewrite(&mut |node| match node {
            TypeExpr::Template(r) => match self.template(&r) {
                Some(t) => t,
                None => {
                    error.get_or_insert_with(|| EvalError::UnresolvedTemplate {
                        symbol: self.symbol.qualified_name(),
                        name: r.name.clone(),
                    });
                    TypeExpr::Unknown
                }
            },
            TypeExpr::SelfRef => self.self_type.clone().unwrap_or(TypeExpr::SelfRef),
            TypeExpr::StaticRef => self.static_type.clone().unwrap_or(TypeExpr::StaticRef),
            TypeExpr::ThisRef => self.static_type.clone().unwrap_or(TypeExpr::ThisRef),
            TypeExpr::Literal(LiteralValue::ClassConstant { class, name })
                if matches!(class.as_str(), "self" | "static") =>
            {
                let class = self.class_name().unwrap_or(class);
                TypeExpr::Literal(LiteralValue::ClassConstant { class, name })
            }
            TypeExpr::Conditional(cond) => {
                let subject = match &cond.subject {
                    ConditionalSubject::Param { index, .. } => self.argument(*index),
                    ConditionalSubject::Template(r) => self.bindings.get(r).cloned(),
                };
                let decided = subject
                    .as_ref()
                    .and_then(|s| decide(s, &cond.test, self.db, self.class_name().as_deref()))
                    .map(|d| d != cond.negated);
                match decided {
                    Some(true) => cond.then,
                    Some(false) => cond.otherwise,
                    None => TypeExpr::union([cond.then, cond.otherwise]),
                }
            }
            other => other,
        });
        match error {
            Some(err) => Err(err),
            None => Ok(result.normalized()),
        }
    }

    /// The bound type, the declared fallback, or `None` when out of scope.
    fn template(&self, r: &TemplateRef) -> Option<TypeExpr> {
        if let Some(bound) = self.bindings.get(r) {
            return Some(bound.clone());
        }
        let param = self.bindings.param(r)?;
        let fallback = param
            .default
            .clone()
            .or_else(|| param.bound.clone())
            .filter(|t| !t.contains_template())
            .unwrap_or_else(TypeExpr::mixed);
        Some(fallback)
    }

    /// The type a conditional tests for parameter `index`: the argument,
    /// else the literal default.
    fn argument(&self, index: usize) -> Option<TypeExpr> {
        if let Some(arg) = self.args.get(index).copied().flatten() {
            return Some(arg.ty());
        }
        let default = self.params.get(index)?.default.as_ref()?;
        default.value.as_ref().map(LiteralValue::to_type)
    }

    fn class_name(&self) -> Option<String> {
        match self.self_type.as_ref()? {
            TypeExpr::Named(NamedType { name, .. }) | TypeExpr::Generic(NamedType { name, .. }, _) => {
                Some(name.clone())
            }
            _ => None,
        }
    }
}

/// Place each argument on its parameter.  A variadic parameter takes the
/// first of the remaining positional arguments.
fn map_arguments<'s>(symbol: &Symbol, params: &[ParamSig], args: &'s [CallArgument]) -> Vec<Option<&'s ArgValue>> {
    let mut mapped = vec![None; params.len()];
    let mut position = 0;
    for arg in args {
        match &arg.name {
            None => {
                let index = position.min(params.len().saturating_sub(1));
                let is_variadic = params.get(index).is_some_and(|p| p.variadic);
                if position < params.len() || is_variadic {
                    if mapped[index].is_none() {
                        mapped[index] = Some(&arg.value);
                    }
                } else {
                    tracing::debug!(symbol = %symbol.qualified_name(), "extra positional argument ignored");
                }
                position += 1;
            }
            Some(name) => {
                let name = name.trim_start_matches('$');
                match params.iter().position(|p| p.name == name) {
                    Some(index) => mapped[index] = Some(&arg.value),
                    None => tracing::debug!(
                        symbol = %symbol.qualified_name(),
                        argument = name,
                        "named argument does not match a parameter"
                    ),
                }
            }
        }
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StubResolver;

    #[test]
    fn named_and_omitted_arguments() {
        let resolver = StubResolver::from_php(concat!(
            "<?php\n",
            "/** @return ($strict is true ? int : int|false) */\n",
            "function f(string $s, bool $strict = false) {}\n",
        ));
        let db = resolver.database();
        let f = db.lookup_function("f").unwrap();

        let omitted = CallSite::new().typed(TypeExpr::keyword("string"));
        let ty = evaluate(db, f, &omitted).unwrap();
        assert_eq!(ty.to_string(), "int|false");

        let named = CallSite::new().named("strict", ArgValue::Literal(LiteralValue::Bool(true)));
        assert_eq!(evaluate(db, f, &named).unwrap().to_string(), "int");
    }

    #[test]
    fn explicit_template_arguments_bind_positionally() {
        let resolver = StubResolver::from_php(concat!(
            "<?php\n",
            "/**\n * @template T\n * @return list<T>\n */\n",
            "function make() {}\n",
        ));
        let db = resolver.database();
        let make = db.lookup_function("make").unwrap();
        let site = CallSite::new().with_template_args(vec![TypeExpr::class("Foo")]);
        assert_eq!(evaluate(db, make, &site).unwrap().to_string(), "list<Foo>");
        assert_eq!(evaluate(db, make, &CallSite::new()).unwrap().to_string(), "list<mixed>");
    }

    #[test]
    fn constants_are_not_callable() {
        let resolver = StubResolver::from_php("<?php\nconst X = 1;\n");
        let db = resolver.database();
        let x = db.lookup_constant("X").unwrap();
        assert!(matches!(
            evaluate(db, x, &CallSite::new()),
            Err(EvalError::NotCallable(_))
        ));
    }
}
