//! The symbol model.
//!
//! These are the immutable records the symbol database hands out: one
//! [`Symbol`] per function, class-like, member or global constant, with a
//! compiled [`Signature`] for callables and a [`ClassShape`] for
//! class-likes.  All data is owned so nothing depends on the parser's arena
//! lifetime, and only ordered containers are used so a built database
//! serializes the same way every time.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::declarations::{ClassKind, Visibility};
use crate::docblock::{AssertionKind, Variance};
use crate::type_expr::{LiteralValue, TypeExpr};

/// Position of a symbol in the database's top-level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Trait,
    Enum,
    Method,
    Property,
    ClassConstant,
    EnumCase,
    GlobalConstant,
}

impl SymbolKind {
    pub fn is_class_like(self) -> bool {
        matches!(
            self,
            SymbolKind::Class | SymbolKind::Interface | SymbolKind::Trait | SymbolKind::Enum
        )
    }

    pub fn is_callable(self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }

    pub fn is_member(self) -> bool {
        matches!(
            self,
            SymbolKind::Method | SymbolKind::Property | SymbolKind::ClassConstant | SymbolKind::EnumCase
        )
    }

    /// PHP function, class and method names are case-insensitive;
    /// constants and properties are not.
    pub fn case_insensitive(self) -> bool {
        self.is_class_like() || self.is_callable()
    }

    pub(crate) fn from_class_kind(kind: ClassKind) -> Self {
        match kind {
            ClassKind::Class => SymbolKind::Class,
            ClassKind::Interface => SymbolKind::Interface,
            ClassKind::Trait => SymbolKind::Trait,
            ClassKind::Enum => SymbolKind::Enum,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Trait => "trait",
            SymbolKind::Enum => "enum",
            SymbolKind::Method => "method",
            SymbolKind::Property => "property",
            SymbolKind::ClassConstant => "class constant",
            SymbolKind::EnumCase => "enum case",
            SymbolKind::GlobalConstant => "constant",
        };
        f.write_str(s)
    }
}

/// Where a symbol was declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub offset: u32,
}

/// A uniquely named entity of the stub corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Fully-qualified name for top-level symbols; the bare member name
    /// (no `$` for properties) for members.
    pub name: String,
    pub kind: SymbolKind,
    pub location: Location,
    pub visibility: Visibility,
    pub is_static: bool,
    /// The class-like that declares this member.
    pub declaring_class: Option<String>,
    pub modifiers: Modifiers,
    pub signature: Option<Signature>,
    pub class: Option<ClassShape>,
    /// Declared type of a property or constant.
    pub ty: Option<TypeExpr>,
    /// Value of a constant or backed enum case, when it is a literal.
    pub value: Option<LiteralValue>,
    pub effects: EffectSet,
    pub since: Option<String>,
}

impl Symbol {
    /// `Class::member` for members, the name itself otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.declaring_class {
            Some(class) if self.kind.is_member() => format!("{class}::{}", self.name),
            _ => self.name.clone(),
        }
    }

    /// The key a member is merged and looked up by.  Methods share a
    /// case-insensitive namespace; constants and enum cases share one
    /// case-sensitive namespace; properties have their own.
    pub fn member_key(&self) -> MemberKey {
        member_key(self.kind, &self.name)
    }

    /// Minimum and maximum argument counts, `None` for no upper bound.
    pub fn arity(&self) -> Option<(usize, Option<usize>)> {
        self.signature.as_ref().map(Signature::arity)
    }

    pub fn accepts_arity(&self, count: usize) -> bool {
        match self.arity() {
            Some((min, max)) => count >= min && max.is_none_or(|max| count <= max),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_readonly: bool,
    /// `#[TentativeType]`: the native return type is advisory.
    pub tentative_type: bool,
}

/// Member namespace plus normalized name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MemberKey {
    Method(String),
    Property(String),
    Constant(String),
}

pub fn member_key(kind: SymbolKind, name: &str) -> MemberKey {
    match kind {
        SymbolKind::Property => MemberKey::Property(name.trim_start_matches('$').to_string()),
        SymbolKind::ClassConstant | SymbolKind::EnumCase => MemberKey::Constant(name.to_string()),
        _ => MemberKey::Method(name.to_ascii_lowercase()),
    }
}

/// The class-like part of a symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassShape {
    pub kind: ClassKind,
    /// The `extends` target of a class.
    pub parent: Option<String>,
    /// `implements` targets of a class or enum, `extends` targets of an
    /// interface, in declaration order.
    pub interfaces: Vec<String>,
    /// Traits pulled in with `use`, in declaration order.
    pub traits: Vec<String>,
    pub templates: Vec<TemplateParam>,
    /// Generic arguments given to ancestors via `@extends`, `@implements`
    /// and `@use`, compiled in this class's template scope.
    pub bindings: Vec<AncestorBinding>,
    /// Own members in declaration order.  Redeclared members are all kept.
    pub members: Vec<Symbol>,
    pub enum_backing: Option<TypeExpr>,
    /// `@inheritors`: the closed set of permitted subtypes.
    pub inheritors: Vec<String>,
}

impl ClassShape {
    /// Capability edges in lookup order: interfaces first, then the
    /// parent class.
    pub fn edges(&self) -> impl Iterator<Item = &str> {
        self.interfaces
            .iter()
            .map(String::as_str)
            .chain(self.parent.as_deref())
    }

    pub fn binding_for(&self, ancestor: &str) -> Option<&AncestorBinding> {
        self.bindings
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(ancestor))
    }

    pub fn template_index(&self, name: &str) -> Option<usize> {
        self.templates.iter().position(|t| t.name == name)
    }
}

/// `@extends Base<int, T>`: the named ancestor and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorBinding {
    pub name: String,
    pub args: Vec<TypeExpr>,
}

/// A declared template parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: String,
    pub bound: Option<TypeExpr>,
    pub default: Option<TypeExpr>,
    pub variance: Variance,
}

/// The signature of a function or method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<ParamSig>,
    /// Docblock return type when present, otherwise the native one,
    /// otherwise `mixed`.
    pub return_type: TypeExpr,
    pub native_return: Option<TypeExpr>,
    pub templates: Vec<TemplateParam>,
    pub by_ref_return: bool,
    pub assertions: Vec<Assertion>,
    pub throws: Vec<TypeExpr>,
}

impl Signature {
    pub fn arity(&self) -> (usize, Option<usize>) {
        let required = self
            .params
            .iter()
            .take_while(|p| p.default.is_none() && !p.variadic)
            .count();
        let max = if self.params.iter().any(|p| p.variadic) {
            None
        } else {
            Some(self.params.len())
        };
        (required, max)
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        let name = name.trim_start_matches('$');
        self.params.iter().position(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSig {
    /// Name without the leading `$`.
    pub name: String,
    pub ty: TypeExpr,
    pub native: Option<TypeExpr>,
    pub default: Option<ParamDefault>,
    pub variadic: bool,
    pub by_ref: bool,
    /// Type after the call, from `@param-out`.
    pub out: Option<TypeExpr>,
    /// Constructor-promoted property.
    pub promoted: bool,
}

impl ParamSig {
    pub fn is_out(&self) -> bool {
        self.out.is_some()
    }

    pub fn is_optional(&self) -> bool {
        self.default.is_some() || self.variadic
    }
}

/// A parameter default as written, plus its value when it is a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDefault {
    pub text: String,
    pub value: Option<LiteralValue>,
}

/// `@assert`, `@assert-if-true`, `@assert-if-false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub kind: AssertionKind,
    pub negated: bool,
    pub target: AssertionTarget,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssertionTarget {
    Param(usize),
    This,
}

/// Effect facts declared for a symbol.  Never inferred.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSet {
    /// No side effects; the result depends only on the inputs.
    pub pure: bool,
    /// Does not mutate the receiver, but may read global state.
    pub mutation_free: bool,
    pub no_named_arguments: bool,
    pub deprecated: Option<Deprecation>,
    /// Indices of parameters passed by reference.
    pub by_reference: Vec<usize>,
    /// Indices of parameters with an `@param-out` type.
    pub out_params: Vec<usize>,
}

impl EffectSet {
    pub fn is_deprecated(&self) -> bool {
        self.deprecated.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deprecation {
    pub message: Option<String>,
    pub since: Option<String>,
    pub replacement: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, default: bool, variadic: bool) -> ParamSig {
        ParamSig {
            name: name.to_string(),
            ty: TypeExpr::mixed(),
            native: None,
            default: default.then(|| ParamDefault {
                text: "null".to_string(),
                value: Some(LiteralValue::Null),
            }),
            variadic,
            by_ref: false,
            out: None,
            promoted: false,
        }
    }

    #[test]
    fn arity_counts_required_and_variadic() {
        let sig = Signature {
            params: vec![param("a", false, false), param("b", true, false)],
            ..Signature::default()
        };
        assert_eq!(sig.arity(), (1, Some(2)));

        let sig = Signature {
            params: vec![param("a", false, false), param("rest", false, true)],
            ..Signature::default()
        };
        assert_eq!(sig.arity(), (1, None));
    }

    #[test]
    fn member_keys_follow_php_case_rules() {
        assert_eq!(
            member_key(SymbolKind::Method, "getIterator"),
            member_key(SymbolKind::Method, "GETITERATOR")
        );
        assert_ne!(
            member_key(SymbolKind::ClassConstant, "FOO"),
            member_key(SymbolKind::ClassConstant, "foo")
        );
        assert_eq!(
            member_key(SymbolKind::EnumCase, "A"),
            member_key(SymbolKind::ClassConstant, "A")
        );
    }
}
