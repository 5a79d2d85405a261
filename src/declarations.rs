//! Declaration tree produced by the stub parser.
//!
//! These are syntactic: names are resolved to fully-qualified form and
//! attributes are decoded, but docblocks are still raw text and type hints
//! are still strings.  [`crate::lower`] turns them into database symbols.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::parser::names::NameContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Trait,
    Enum,
}

/// A decoded PHP attribute such as `#[Deprecated(since: '8.1')]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDecl {
    /// Fully-qualified attribute class name.
    pub name: String,
    pub args: Vec<AttributeArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeArg {
    pub name: Option<String>,
    pub value: AttrValue,
}

/// A constant-expression attribute argument.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    /// `[key => value, value, ...]`
    Array(Vec<(Option<AttrValue>, AttrValue)>),
    /// `Foo::BAR` or `Foo::class` (member is `class`).
    ClassConstant { class: String, member: String },
    /// Anything else, kept as source text.
    Other(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl AttributeDecl {
    /// Whether the attribute's short name is `short` (case-insensitive).
    pub fn is(&self, short: &str) -> bool {
        crate::parser::names::short_name(&self.name).eq_ignore_ascii_case(short)
    }

    /// Argument by name, falling back to position.
    pub fn arg(&self, name: &str, position: usize) -> Option<&AttrValue> {
        self.args
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
            .or_else(|| {
                self.args
                    .iter()
                    .filter(|a| a.name.is_none())
                    .nth(position)
            })
            .map(|a| &a.value)
    }
}

#[derive(Debug, Clone)]
pub enum Declaration {
    ClassLike(ClassDecl),
    Function(FunctionDecl),
    Constant(ConstantDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::ClassLike(c) => &c.name,
            Declaration::Function(f) => &f.name,
            Declaration::Constant(c) => &c.name,
        }
    }

    pub fn offset(&self) -> u32 {
        match self {
            Declaration::ClassLike(c) => c.offset,
            Declaration::Function(f) => f.offset,
            Declaration::Constant(c) => c.offset,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub kind: ClassKind,
    pub offset: u32,
    pub names: Arc<NameContext>,
    pub docblock: Option<String>,
    pub attributes: Vec<AttributeDecl>,
    /// Resolved `extends` target (for interfaces: the first of several).
    pub parent: Option<String>,
    /// Resolved `implements` list, or for interfaces the `extends` list.
    pub interfaces: Vec<String>,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_readonly: bool,
    /// Native backing type of an enum (`int` or `string`).
    pub enum_backing: Option<String>,
    pub members: Vec<MemberDecl>,
}

#[derive(Debug, Clone)]
pub enum MemberDecl {
    Method(FunctionDecl),
    Property(PropertyDecl),
    Constant(ConstantDecl),
    EnumCase(ConstantDecl),
    /// Resolved names of used traits.
    TraitUse(Vec<String>),
}

/// A free function or a method.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    /// Fully-qualified for functions, bare for methods.
    pub name: String,
    pub offset: u32,
    pub names: Arc<NameContext>,
    pub docblock: Option<String>,
    pub attributes: Vec<AttributeDecl>,
    pub params: Vec<ParamDecl>,
    pub return_hint: Option<String>,
    pub by_ref_return: bool,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub hint: Option<String>,
    /// Default value source text.
    pub default: Option<String>,
    pub variadic: bool,
    pub by_ref: bool,
    /// Visibility of a promoted constructor property.
    pub promoted: Option<Visibility>,
    pub attributes: Vec<AttributeDecl>,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub name: String,
    pub offset: u32,
    pub names: Arc<NameContext>,
    pub docblock: Option<String>,
    pub attributes: Vec<AttributeDecl>,
    pub hint: Option<String>,
    pub default: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_readonly: bool,
}

/// A global constant, class constant, or enum case.
#[derive(Debug, Clone)]
pub struct ConstantDecl {
    pub name: String,
    pub offset: u32,
    pub names: Arc<NameContext>,
    pub docblock: Option<String>,
    pub attributes: Vec<AttributeDecl>,
    pub hint: Option<String>,
    /// Value source text.
    pub value: Option<String>,
    pub visibility: Visibility,
}
