//! Template binding.
//!
//! Templates are bound positionally per scope.  The first binding of a
//! template wins: explicit generic arguments, then the receiver, then the
//! arguments in parameter order.

use crate::database::SymbolDatabase;
use crate::database::class_key;
use crate::type_expr::{LiteralValue, NamedType, TemplateRef, TypeExpr};
use crate::types::{Symbol, TemplateParam};

/// Deepest ancestor chain or type nesting followed while binding.
const MAX_DEPTH: usize = 32;

/// Keyword bases that take `<K, V>` or `<V>` arguments.
const ITERABLE_KEYWORDS: &[&str] = &["array", "iterable"];

#[derive(Debug, Clone)]
struct Scope {
    params: Vec<TemplateParam>,
    bound: Vec<Option<TypeExpr>>,
}

/// Template scopes, innermost first.
#[derive(Debug, Clone)]
pub(super) struct Bindings {
    scopes: Vec<Scope>,
}

impl Bindings {
    pub(super) fn new(scopes: Vec<Vec<TemplateParam>>) -> Self {
        Bindings {
            scopes: scopes.into_iter().map(Scope::new).collect(),
        }
    }

    /// Add a scope inside the existing ones; existing levels shift out by one.
    pub(super) fn push_inner(&mut self, params: Vec<TemplateParam>) {
        self.scopes.insert(0, Scope::new(params));
    }

    pub(super) fn bind(&mut self, level: usize, index: usize, ty: TypeExpr) {
        if let Some(slot) = self
            .scopes
            .get_mut(level)
            .and_then(|scope| scope.bound.get_mut(index))
            && slot.is_none()
        {
            *slot = Some(ty);
        }
    }

    pub(super) fn get(&self, r: &TemplateRef) -> Option<&TypeExpr> {
        self.scopes
            .get(usize::from(r.level))?
            .bound
            .get(usize::from(r.index))?
            .as_ref()
    }

    pub(super) fn param(&self, r: &TemplateRef) -> Option<&TemplateParam> {
        self.scopes
            .get(usize::from(r.level))?
            .params
            .get(usize::from(r.index))
    }
}

impl Scope {
    fn new(params: Vec<TemplateParam>) -> Self {
        let bound = vec![None; params.len()];
        Scope { params, bound }
    }
}

/// Bind templates in `param` from the matching parts of `arg`.
pub(super) fn unify(db: &SymbolDatabase, param: &TypeExpr, arg: &TypeExpr, bindings: &mut Bindings) {
    unify_at(db, param, arg, bindings, 0);
}

fn unify_at(db: &SymbolDatabase, param: &TypeExpr, arg: &TypeExpr, bindings: &mut Bindings, depth: usize) {
    if depth > MAX_DEPTH || arg.is_mixed() || !param.contains_template() {
        return;
    }
    match param {
        TypeExpr::Template(r) => {
            bindings.bind(usize::from(r.level), usize::from(r.index), widen(arg));
        }
        TypeExpr::Union(members) => {
            // `T|null` given `Foo|null` binds `T` to `Foo`.
            let concrete: Vec<&TypeExpr> = members.iter().filter(|m| !m.contains_template()).collect();
            let rest: Vec<TypeExpr> = arg
                .members()
                .iter()
                .filter(|a| !concrete.contains(a))
                .cloned()
                .collect();
            if rest.is_empty() {
                return;
            }
            let rest = TypeExpr::union(rest);
            for member in members.iter().filter(|m| m.contains_template()) {
                unify_at(db, member, &rest, bindings, depth + 1);
            }
        }
        TypeExpr::Generic(base, params) => unify_generic(db, base, params, arg, bindings, depth),
        TypeExpr::Callable(callable) => {
            let TypeExpr::Callable(given) = arg else {
                return;
            };
            for (p, a) in callable.params.iter().zip(&given.params) {
                unify_at(db, &p.ty, &a.ty, bindings, depth + 1);
            }
            if let (Some(p), Some(a)) = (&callable.ret, &given.ret) {
                unify_at(db, p, a, bindings, depth + 1);
            }
        }
        TypeExpr::ArrayShape(shape) => {
            let TypeExpr::ArrayShape(given) = arg else {
                return;
            };
            for (i, field) in shape.fields.iter().enumerate() {
                let matching = match &field.key {
                    Some(key) => given.fields.iter().find(|f| f.key.as_ref() == Some(key)),
                    None => given.fields.get(i),
                };
                if let Some(matching) = matching {
                    unify_at(db, &field.ty, &matching.ty, bindings, depth + 1);
                }
            }
        }
        _ => {}
    }
}

fn unify_generic(
    db: &SymbolDatabase,
    base: &NamedType,
    params: &[TypeExpr],
    arg: &TypeExpr,
    bindings: &mut Bindings,
    depth: usize,
) {
    if is_class_string(base) {
        let [inner] = params else {
            return;
        };
        for member in arg.members() {
            match member {
                TypeExpr::Literal(LiteralValue::ClassString(class)) => {
                    unify_at(db, inner, &TypeExpr::class(class.clone()), bindings, depth + 1);
                }
                TypeExpr::Generic(given, args) if is_class_string(given) => {
                    if let Some(a) = args.first() {
                        unify_at(db, inner, a, bindings, depth + 1);
                    }
                }
                _ => {}
            }
        }
        return;
    }

    for member in arg.members() {
        let given: Vec<TypeExpr> = match member {
            TypeExpr::Generic(given, args) => match generic_args_as(db, given, args, base) {
                Some(args) => args,
                None => continue,
            },
            TypeExpr::ArrayShape(shape) if is_iterable_keyword(base) => {
                let values = TypeExpr::union(shape.fields.iter().map(|f| f.ty.clone()));
                if shape.fields.is_empty() {
                    continue;
                }
                vec![TypeExpr::keyword("array-key"), values]
            }
            _ => continue,
        };
        // `array<V>` lines up with `array<K, V>` from the end.
        let skip_params = params.len().saturating_sub(given.len());
        let skip_given = given.len().saturating_sub(params.len());
        for (p, a) in params.iter().skip(skip_params).zip(given.iter().skip(skip_given)) {
            unify_at(db, p, a, bindings, depth + 1);
        }
    }
}

/// The arguments `given<args>` supplies to `target`, if it is one.
fn generic_args_as(
    db: &SymbolDatabase,
    given: &NamedType,
    args: &[TypeExpr],
    target: &NamedType,
) -> Option<Vec<TypeExpr>> {
    if given.is_keyword() || target.is_keyword() {
        let both_iterable = is_iterable_keyword(given) && is_iterable_keyword(target);
        if given.name == target.name || both_iterable {
            return Some(args.to_vec());
        }
        if !given.is_keyword() && target.name == "iterable" {
            return known(ancestor_args(db, &given.name, args, "Traversable")?);
        }
        return None;
    }
    known(ancestor_args(db, &given.name, args, &target.name)?)
}

fn known(args: Vec<Option<TypeExpr>>) -> Option<Vec<TypeExpr>> {
    Some(args.into_iter().map(|a| a.unwrap_or_else(TypeExpr::mixed)).collect())
}

fn is_iterable_keyword(named: &NamedType) -> bool {
    ITERABLE_KEYWORDS.contains(&named.name.as_str())
}

fn is_class_string(named: &NamedType) -> bool {
    matches!(
        named.refinement_keyword(),
        Some("class-string" | "interface-string" | "enum-string" | "trait-string")
    )
}

/// Literal argument types bind their keyword type: `T` given `'x'` is
/// `string`.
fn widen(ty: &TypeExpr) -> TypeExpr {
    ty.clone().rewrite(&mut |node| match node {
        TypeExpr::Literal(literal) if !matches!(literal, LiteralValue::ClassConstant { .. }) => {
            literal.widened()
        }
        TypeExpr::Named(n) if n.refinement.is_none() && (n.name == "true" || n.name == "false") => {
            TypeExpr::keyword("bool")
        }
        other => other,
    })
}

/// Generic arguments that `class<args>` supplies to its ancestor `target`,
/// one per template of `target`.  `None` entries are templates nothing
/// binds.  Returns `None` when `target` is not an ancestor.
pub(super) fn ancestor_args(
    db: &SymbolDatabase,
    class: &str,
    args: &[TypeExpr],
    target: &str,
) -> Option<Vec<Option<TypeExpr>>> {
    let symbol = db.lookup_class(class)?;
    let shape = symbol.class.as_ref()?;
    let own = align(
        shape.templates.len(),
        args,
        db.is_subtype_of(&symbol.name, "Traversable"),
    );
    walk(db, symbol, own, &class_key(target), 0)
}

/// Spread `args` over `count` templates.  `Traversable` descendants accept
/// the value type alone (`Iterator<Foo>`).
fn align(count: usize, args: &[TypeExpr], traversable: bool) -> Vec<Option<TypeExpr>> {
    let mut out = vec![None; count];
    if traversable && args.len() == 1 && count >= 2 {
        out[count - 1] = Some(args[0].clone());
        return out;
    }
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = Some(arg.clone());
    }
    out
}

fn walk(
    db: &SymbolDatabase,
    symbol: &Symbol,
    own: Vec<Option<TypeExpr>>,
    target: &str,
    depth: usize,
) -> Option<Vec<Option<TypeExpr>>> {
    if class_key(&symbol.name) == target {
        return Some(own);
    }
    if depth >= MAX_DEPTH {
        return None;
    }
    let shape = symbol.class.as_ref()?;
    let edges = shape.edges().chain(shape.traits.iter().map(String::as_str));
    for edge in edges {
        let Some(next) = db.lookup_class(edge) else {
            continue;
        };
        let count = next.class.as_ref().map_or(0, |s| s.templates.len());
        let next_args = match shape.binding_for(edge) {
            Some(binding) => {
                let mut args: Vec<Option<TypeExpr>> = binding
                    .args
                    .iter()
                    .map(|a| substitute_own(a, &own, &shape.templates))
                    .collect();
                args.resize(count, None);
                args
            }
            None => vec![None; count],
        };
        if let Some(found) = walk(db, next, next_args, target, depth + 1) {
            return Some(found);
        }
    }
    None
}

/// Replace the class's own template refs in a binding argument.  A bare
/// reference to an unbound template stays unbound.
fn substitute_own(
    arg: &TypeExpr,
    own: &[Option<TypeExpr>],
    templates: &[TemplateParam],
) -> Option<TypeExpr> {
    if let TypeExpr::Template(r) = arg
        && r.level == 0
    {
        return own.get(usize::from(r.index)).cloned().flatten();
    }
    Some(arg.clone().rewrite(&mut |node| match node {
        TypeExpr::Template(r) if r.level == 0 => own
            .get(usize::from(r.index))
            .cloned()
            .flatten()
            .or_else(|| {
                templates
                    .get(usize::from(r.index))
                    .and_then(|t| t.bound.clone())
                    .filter(|b| !b.contains_template())
            })
            .unwrap_or_else(TypeExpr::mixed),
        other => other,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StubResolver;

    const STUB: &str = concat!(
        "<?php\n",
        "/** @template-covariant TKey\n @template-covariant TValue */\n",
        "interface Traversable {}\n",
        "/** @template TKey\n @template TValue\n @extends Traversable<TKey, TValue> */\n",
        "interface Iterator extends Traversable {}\n",
        "/** @template T\n @implements Iterator<int, T> */\n",
        "class ListIterator implements Iterator {}\n",
    );

    #[test]
    fn arguments_flow_through_bindings() {
        let resolver = StubResolver::from_php(STUB);
        let db = resolver.database();
        let args = ancestor_args(db, "ListIterator", &[TypeExpr::class("Foo")], "Traversable").unwrap();
        assert_eq!(args, vec![Some(TypeExpr::keyword("int")), Some(TypeExpr::class("Foo"))]);
    }

    #[test]
    fn value_only_iterator_arguments() {
        let resolver = StubResolver::from_php(STUB);
        let db = resolver.database();
        let args = ancestor_args(db, "Iterator", &[TypeExpr::class("Foo")], "Iterator").unwrap();
        assert_eq!(args, vec![None, Some(TypeExpr::class("Foo"))]);
    }

    #[test]
    fn unrelated_target_is_none() {
        let resolver = StubResolver::from_php(STUB);
        assert!(ancestor_args(resolver.database(), "ListIterator", &[], "Countable").is_none());
    }

    #[test]
    fn first_binding_wins() {
        let mut bindings = Bindings::new(vec![vec![TemplateParam {
            name: "T".to_string(),
            bound: None,
            default: None,
            variance: Default::default(),
        }]]);
        let r = TemplateRef {
            level: 0,
            index: 0,
            name: "T".to_string(),
        };
        bindings.bind(0, 0, TypeExpr::keyword("int"));
        bindings.bind(0, 0, TypeExpr::keyword("string"));
        assert_eq!(bindings.get(&r), Some(&TypeExpr::keyword("int")));
    }
}
