//! Type expression AST.
//!
//! Docblock and native type hints are compiled into [`TypeExpr`], a tagged
//! variant tree that the database stores and the evaluator interprets.
//! Template parameters are stored positionally ([`TemplateRef`]) rather than
//! by name, so instantiation is an index lookup into the binding list of the
//! matching scope.
//!
//! # Submodules
//!
//! - [`lexer`]: tokenizer for the docblock type mini-language.
//! - [`compiler`]: recursive-descent parser producing [`TypeExpr`].
//! - [`printer`]: `Display` implementation whose output re-compiles to an
//!   equal tree.

pub mod compiler;
mod lexer;
pub mod printer;

use serde::{Deserialize, Serialize};

pub use compiler::{CompileContext, TypeSyntaxError, compile};

// ─── Keyword tables ─────────────────────────────────────────────────────────

/// Builtin type keywords that are never resolved against the namespace.
pub(crate) const KEYWORD_TYPES: &[&str] = &[
    "int",
    "float",
    "string",
    "bool",
    "array",
    "callable",
    "iterable",
    "object",
    "mixed",
    "void",
    "null",
    "never",
    "true",
    "false",
    "resource",
    "scalar",
    "numeric",
    "array-key",
    "key-of",
    "value-of",
    "int-mask",
    "int-mask-of",
    "empty",
];

/// Spellings that are plain synonyms of a canonical keyword.
const KEYWORD_ALIASES: &[(&str, &str)] = &[
    ("integer", "int"),
    ("boolean", "bool"),
    ("double", "float"),
    ("real", "float"),
    ("no-return", "never"),
    ("never-return", "never"),
    ("never-returns", "never"),
    ("noreturn", "never"),
];

/// Pseudo-types that refine a base keyword.  They compile to a
/// [`NamedType`] of the base carrying a [`Refinement::Keyword`].
const REFINED_KEYWORDS: &[(&str, &str)] = &[
    ("non-empty-string", "string"),
    ("numeric-string", "string"),
    ("lowercase-string", "string"),
    ("uppercase-string", "string"),
    ("non-empty-lowercase-string", "string"),
    ("non-empty-uppercase-string", "string"),
    ("literal-string", "string"),
    ("non-empty-literal-string", "string"),
    ("non-falsy-string", "string"),
    ("truthy-string", "string"),
    ("callable-string", "string"),
    ("class-string", "string"),
    ("interface-string", "string"),
    ("trait-string", "string"),
    ("enum-string", "string"),
    ("positive-int", "int"),
    ("negative-int", "int"),
    ("non-positive-int", "int"),
    ("non-negative-int", "int"),
    ("non-zero-int", "int"),
    ("literal-int", "int"),
    ("list", "array"),
    ("non-empty-list", "array"),
    ("non-empty-array", "array"),
    ("callable-array", "array"),
    ("associative-array", "array"),
    ("callable-object", "object"),
    ("pure-callable", "callable"),
    ("closed-resource", "resource"),
    ("open-resource", "resource"),
];

/// Generic argument count accepted by builtin generic keywords.
const BUILTIN_GENERIC_ARITY: &[(&str, usize, usize)] = &[
    ("array", 1, 2),
    ("non-empty-array", 1, 2),
    ("associative-array", 1, 2),
    ("list", 1, 1),
    ("non-empty-list", 1, 1),
    ("iterable", 1, 2),
    ("class-string", 1, 1),
    ("interface-string", 1, 1),
    ("trait-string", 1, 1),
    ("enum-string", 1, 1),
    ("key-of", 1, 1),
    ("value-of", 1, 1),
    ("int-mask", 1, usize::MAX),
    ("int-mask-of", 1, 1),
    ("object", 1, 1),
];

/// Canonicalize a builtin keyword spelling.
///
/// Returns `(base, refinement)` for any builtin keyword or pseudo-type, or
/// `None` if `name` is not a keyword (i.e. it names a class or template).
pub(crate) fn canonical_keyword(name: &str) -> Option<(&'static str, Option<&'static str>)> {
    let lower = name.to_ascii_lowercase();
    if let Some(kw) = KEYWORD_TYPES.iter().find(|k| **k == lower) {
        return Some((kw, None));
    }
    if let Some((_, canonical)) = KEYWORD_ALIASES.iter().find(|(a, _)| *a == lower) {
        return Some((canonical, None));
    }
    REFINED_KEYWORDS
        .iter()
        .find(|(k, _)| *k == lower)
        .map(|(k, base)| (*base, Some(*k)))
}

/// Accepted generic argument range for a builtin keyword (by its printed
/// spelling, e.g. `"list"` or `"array"`).
pub(crate) fn builtin_generic_arity(keyword: &str) -> Option<(usize, usize)> {
    BUILTIN_GENERIC_ARITY
        .iter()
        .find(|(k, _, _)| *k == keyword)
        .map(|(_, min, max)| (*min, *max))
}

// ─── AST ────────────────────────────────────────────────────────────────────

/// A compiled type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    /// A class name or builtin keyword, optionally refined.
    Named(NamedType),
    /// `A|B|C`, always flat (no directly nested unions).
    Union(Vec<TypeExpr>),
    /// `A&B`, always flat.
    Intersection(Vec<TypeExpr>),
    /// `Name<A, B>`.
    Generic(NamedType, Vec<TypeExpr>),
    /// `array{0: int, name?: string, ...}` and friends.
    ArrayShape(ArrayShape),
    /// `42`, `'x'`, `Foo::class`, `Foo::BAR`, `Foo::BAR_*`.
    Literal(LiteralValue),
    /// `($param is T ? A : B)`.
    Conditional(Box<ConditionalType>),
    /// A reference to a template parameter in scope at the declaration.
    Template(TemplateRef),
    /// `callable(int): string`, `Closure(T): U`.
    Callable(Box<CallableType>),
    /// `self`
    SelfRef,
    /// `static`
    StaticRef,
    /// `$this`
    ThisRef,
    /// A type that could not be compiled.  Behaves like `mixed`.
    Unknown,
}

/// A named type: a fully-qualified class name or a canonical keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedType {
    pub name: String,
    pub refinement: Option<Refinement>,
}

/// A refinement predicate carried on a named type.
///
/// The evaluator only understands a handful of these; the rest are
/// propagated untouched for consumers that do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Refinement {
    /// A pseudo-type keyword such as `non-empty-string` or `list`.
    Keyword(String),
    /// `int<min, max>`; `None` stands for an open end.
    IntRange { min: Option<i64>, max: Option<i64> },
}

/// Which brace syntax introduced a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Array,
    List,
    NonEmptyArray,
    NonEmptyList,
    Object,
}

impl ShapeKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ShapeKind::Array => "array",
            ShapeKind::List => "list",
            ShapeKind::NonEmptyArray => "non-empty-array",
            ShapeKind::NonEmptyList => "non-empty-list",
            ShapeKind::Object => "object",
        }
    }

    pub(crate) fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "array" => Some(ShapeKind::Array),
            "list" => Some(ShapeKind::List),
            "non-empty-array" => Some(ShapeKind::NonEmptyArray),
            "non-empty-list" => Some(ShapeKind::NonEmptyList),
            "object" => Some(ShapeKind::Object),
            _ => None,
        }
    }
}

/// An array or object shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayShape {
    pub kind: ShapeKind,
    pub fields: Vec<ShapeField>,
    /// Whether the shape ends with `...` (additional fields allowed).
    pub open: bool,
    /// Key/value types given as `...<K, V>`; empty when unspecified.
    pub rest: Vec<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeField {
    /// `None` for positional entries (`array{int, string}`).
    pub key: Option<ShapeKey>,
    pub optional: bool,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKey {
    Int(i64),
    Str(String),
}

/// A literal value, used both as a literal type and as a constant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralValue {
    Int(i64),
    /// Kept as source text so the AST stays `Eq`/`Hash`.
    Float(String),
    String(String),
    Bool(bool),
    Null,
    /// `Foo::class`
    ClassString(String),
    /// `Foo::BAR`; `name` may contain a trailing `*` wildcard.
    ClassConstant { class: String, name: String },
}

impl LiteralValue {
    /// Whether this is a class-constant reference containing a wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, LiteralValue::ClassConstant { name, .. } if name.contains('*'))
    }

    /// The keyword type this literal widens to (`42` → `int`).
    pub fn widened(&self) -> TypeExpr {
        match self {
            LiteralValue::Int(_) => TypeExpr::keyword("int"),
            LiteralValue::Float(_) => TypeExpr::keyword("float"),
            LiteralValue::String(_) => TypeExpr::keyword("string"),
            LiteralValue::Bool(true) => TypeExpr::keyword("true"),
            LiteralValue::Bool(false) => TypeExpr::keyword("false"),
            LiteralValue::Null => TypeExpr::keyword("null"),
            LiteralValue::ClassString(_) => TypeExpr::Named(NamedType {
                name: "string".to_string(),
                refinement: Some(Refinement::Keyword("class-string".to_string())),
            }),
            LiteralValue::ClassConstant { .. } => TypeExpr::Unknown,
        }
    }

    /// The literal as a type expression.  `true`, `false` and `null` are
    /// keywords in the type grammar, so they map to named types.
    pub fn to_type(&self) -> TypeExpr {
        match self {
            LiteralValue::Bool(_) | LiteralValue::Null => self.widened(),
            other => TypeExpr::Literal(other.clone()),
        }
    }
}

/// `($subject is [not] test ? then : otherwise)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionalType {
    pub subject: ConditionalSubject,
    pub negated: bool,
    pub test: TypeExpr,
    pub then: TypeExpr,
    pub otherwise: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionalSubject {
    /// Index into the enclosing signature's parameter list.  The name is
    /// kept for printing only.
    Param { index: usize, name: String },
    Template(TemplateRef),
}

/// A positional template reference.
///
/// `level` counts scopes outward from the innermost one: inside a method,
/// level 0 is the method's own `@template` list and level 1 the declaring
/// class's.  Inside a class-level annotation (property type, `@extends`),
/// level 0 is the class's list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
    pub level: u8,
    pub index: u16,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallableType {
    /// `callable`, `Closure` (fully-qualified), or `pure-callable`.
    pub kind: NamedType,
    pub params: Vec<CallableParam>,
    pub ret: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallableParam {
    pub ty: TypeExpr,
    pub by_ref: bool,
    pub variadic: bool,
    pub optional: bool,
    pub name: Option<String>,
}

// ─── Constructors & queries ─────────────────────────────────────────────────

impl NamedType {
    pub fn plain(name: impl Into<String>) -> Self {
        NamedType {
            name: name.into(),
            refinement: None,
        }
    }

    /// Whether the base name is a builtin keyword rather than a class.
    pub fn is_keyword(&self) -> bool {
        KEYWORD_TYPES.contains(&self.name.as_str())
    }

    /// The refinement keyword, if any.
    pub fn refinement_keyword(&self) -> Option<&str> {
        match &self.refinement {
            Some(Refinement::Keyword(k)) => Some(k),
            _ => None,
        }
    }

    /// The spelling used when printing: the refinement keyword when it
    /// has one, else the base name.
    pub fn spelling(&self) -> &str {
        self.refinement_keyword().unwrap_or(&self.name)
    }
}

impl Default for TypeExpr {
    fn default() -> Self {
        TypeExpr::mixed()
    }
}

impl TypeExpr {
    pub fn keyword(name: &str) -> Self {
        TypeExpr::Named(NamedType::plain(name))
    }

    pub fn class(name: impl Into<String>) -> Self {
        TypeExpr::Named(NamedType::plain(name))
    }

    pub fn mixed() -> Self {
        TypeExpr::keyword("mixed")
    }

    /// Build a union, flattening nested unions and dropping duplicates.
    /// A single member collapses to itself.
    pub fn union(members: impl IntoIterator<Item = TypeExpr>) -> Self {
        let mut flat: Vec<TypeExpr> = Vec::new();
        for member in members {
            match member {
                TypeExpr::Union(inner) => {
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.len() {
            0 => TypeExpr::keyword("never"),
            1 => flat.pop().unwrap_or(TypeExpr::Unknown),
            _ => TypeExpr::Union(flat),
        }
    }

    /// Build an intersection, flattening nested intersections.
    pub fn intersection(members: impl IntoIterator<Item = TypeExpr>) -> Self {
        let mut flat: Vec<TypeExpr> = Vec::new();
        for member in members {
            match member {
                TypeExpr::Intersection(inner) => {
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.len() {
            0 => TypeExpr::mixed(),
            1 => flat.pop().unwrap_or(TypeExpr::Unknown),
            _ => TypeExpr::Intersection(flat),
        }
    }

    pub fn nullable(inner: TypeExpr) -> Self {
        TypeExpr::union([inner, TypeExpr::keyword("null")])
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeExpr::Unknown)
    }

    /// `mixed` or [`TypeExpr::Unknown`].
    pub fn is_mixed(&self) -> bool {
        match self {
            TypeExpr::Unknown => true,
            TypeExpr::Named(n) => n.name == "mixed" && n.refinement.is_none(),
            _ => false,
        }
    }

    /// Whether this is the named keyword `name` without refinement.
    pub fn is_keyword(&self, name: &str) -> bool {
        matches!(self, TypeExpr::Named(n) if n.refinement.is_none() && n.name == name)
    }

    /// Visit every node, parents before children.
    pub fn walk(&self, f: &mut impl FnMut(&TypeExpr)) {
        f(self);
        match self {
            TypeExpr::Union(members) | TypeExpr::Intersection(members) => {
                for m in members {
                    m.walk(f);
                }
            }
            TypeExpr::Generic(_, args) => {
                for a in args {
                    a.walk(f);
                }
            }
            TypeExpr::ArrayShape(shape) => {
                for field in &shape.fields {
                    field.ty.walk(f);
                }
                for r in &shape.rest {
                    r.walk(f);
                }
            }
            TypeExpr::Conditional(cond) => {
                cond.test.walk(f);
                cond.then.walk(f);
                cond.otherwise.walk(f);
            }
            TypeExpr::Callable(callable) => {
                for p in &callable.params {
                    p.ty.walk(f);
                }
                if let Some(ret) = &callable.ret {
                    ret.walk(f);
                }
            }
            TypeExpr::Named(_)
            | TypeExpr::Literal(_)
            | TypeExpr::Template(_)
            | TypeExpr::SelfRef
            | TypeExpr::StaticRef
            | TypeExpr::ThisRef
            | TypeExpr::Unknown => {}
        }
    }

    /// Rebuild the tree bottom-up, letting `f` replace each node after its
    /// children have been rewritten.  Unions and intersections are
    /// re-flattened on the way up.
    pub fn rewrite(self, f: &mut impl FnMut(TypeExpr) -> TypeExpr) -> TypeExpr {
        let rebuilt = match self {
            TypeExpr::Union(members) => {
                TypeExpr::union(members.into_iter().map(|m| m.rewrite(f)).collect::<Vec<_>>())
            }
            TypeExpr::Intersection(members) => TypeExpr::intersection(
                members.into_iter().map(|m| m.rewrite(f)).collect::<Vec<_>>(),
            ),
            TypeExpr::Generic(base, args) => {
                TypeExpr::Generic(base, args.into_iter().map(|a| a.rewrite(f)).collect())
            }
            TypeExpr::ArrayShape(shape) => TypeExpr::ArrayShape(ArrayShape {
                kind: shape.kind,
                fields: shape
                    .fields
                    .into_iter()
                    .map(|field| ShapeField {
                        key: field.key,
                        optional: field.optional,
                        ty: field.ty.rewrite(f),
                    })
                    .collect(),
                open: shape.open,
                rest: shape.rest.into_iter().map(|r| r.rewrite(f)).collect(),
            }),
            TypeExpr::Conditional(cond) => {
                let ConditionalType {
                    subject,
                    negated,
                    test,
                    then,
                    otherwise,
                } = *cond;
                TypeExpr::Conditional(Box::new(ConditionalType {
                    subject,
                    negated,
                    test: test.rewrite(f),
                    then: then.rewrite(f),
                    otherwise: otherwise.rewrite(f),
                }))
            }
            TypeExpr::Callable(callable) => {
                let CallableType { kind, params, ret } = *callable;
                TypeExpr::Callable(Box::new(CallableType {
                    kind,
                    params: params
                        .into_iter()
                        .map(|p| CallableParam {
                            ty: p.ty.rewrite(f),
                            ..p
                        })
                        .collect(),
                    ret: ret.map(|r| r.rewrite(f)),
                }))
            }
            leaf => leaf,
        };
        f(rebuilt)
    }

    /// Whether any node satisfies `pred`.
    pub fn any(&self, pred: &impl Fn(&TypeExpr) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |t| {
            if !found && pred(t) {
                found = true;
            }
        });
        found
    }

    pub fn contains_template(&self) -> bool {
        self.any(&|t| {
            matches!(t, TypeExpr::Template(_))
                || matches!(t, TypeExpr::Conditional(c) if matches!(c.subject, ConditionalSubject::Template(_)))
        })
    }

    pub fn contains_conditional(&self) -> bool {
        self.any(&|t| matches!(t, TypeExpr::Conditional(_)))
    }

    /// Union members, or the type itself as a one-element slice.
    pub fn members(&self) -> &[TypeExpr] {
        match self {
            TypeExpr::Union(members) => members,
            other => std::slice::from_ref(other),
        }
    }

    /// Collapse `never` inside non-trivial unions and re-flatten.
    pub fn normalized(self) -> TypeExpr {
        self.rewrite(&mut |t| match t {
            TypeExpr::Union(members) => {
                let kept: Vec<TypeExpr> = members
                    .iter()
                    .filter(|m| !m.is_keyword("never"))
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    TypeExpr::keyword("never")
                } else if kept.iter().any(|m| m.is_keyword("mixed")) {
                    TypeExpr::mixed()
                } else {
                    TypeExpr::union(kept)
                }
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_flattens_and_dedupes() {
        let inner = TypeExpr::union([TypeExpr::keyword("int"), TypeExpr::keyword("string")]);
        let outer = TypeExpr::union([inner, TypeExpr::keyword("int"), TypeExpr::keyword("null")]);
        assert_eq!(
            outer,
            TypeExpr::Union(vec![
                TypeExpr::keyword("int"),
                TypeExpr::keyword("string"),
                TypeExpr::keyword("null"),
            ])
        );
    }

    #[test]
    fn single_member_union_collapses() {
        assert_eq!(
            TypeExpr::union([TypeExpr::keyword("int"), TypeExpr::keyword("int")]),
            TypeExpr::keyword("int")
        );
    }

    #[test]
    fn normalized_drops_never() {
        let t = TypeExpr::Union(vec![TypeExpr::keyword("never"), TypeExpr::keyword("int")]);
        assert_eq!(t.normalized(), TypeExpr::keyword("int"));
    }

    #[test]
    fn canonical_keyword_handles_aliases_and_refinements() {
        assert_eq!(canonical_keyword("integer"), Some(("int", None)));
        assert_eq!(
            canonical_keyword("non-empty-string"),
            Some(("string", Some("non-empty-string")))
        );
        assert_eq!(canonical_keyword("ArrayObject"), None);
    }
}
