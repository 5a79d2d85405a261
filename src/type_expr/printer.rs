//! Pretty-printing of type expressions.
//!
//! `Display` prints class names as stored (no leading backslash), which is
//! what diagnostics and the CLI show.  [`TypeExpr::qualified`] prints class
//! names with a leading `\` so the text re-compiles to an equal tree under
//! any namespace context.

use std::fmt::{self, Display, Formatter, Write};

use super::{
    ArrayShape, CallableType, ConditionalSubject, LiteralValue, NamedType, Refinement, ShapeKey,
    TypeExpr,
};

/// A `Display` adapter that prints class names fully qualified.
pub struct Qualified<'a>(&'a TypeExpr);

impl TypeExpr {
    pub fn qualified(&self) -> Qualified<'_> {
        Qualified(self)
    }
}

impl Display for TypeExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_type(f, self, false)
    }
}

impl Display for Qualified<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_type(f, self.0, true)
    }
}

fn write_type(f: &mut Formatter<'_>, ty: &TypeExpr, qualified: bool) -> fmt::Result {
    match ty {
        TypeExpr::Named(named) => write_named(f, named, qualified),
        TypeExpr::Union(members) => write_joined(f, members, '|', qualified),
        TypeExpr::Intersection(members) => write_joined(f, members, '&', qualified),
        TypeExpr::Generic(base, args) => {
            write_named(f, base, qualified)?;
            f.write_char('<')?;
            write_list(f, args, qualified)?;
            f.write_char('>')
        }
        TypeExpr::ArrayShape(shape) => write_shape(f, shape, qualified),
        TypeExpr::Literal(literal) => write_literal(f, literal, qualified),
        TypeExpr::Conditional(cond) => {
            f.write_char('(')?;
            match &cond.subject {
                ConditionalSubject::Param { name, .. } => write!(f, "${name}")?,
                ConditionalSubject::Template(t) => f.write_str(&t.name)?,
            }
            f.write_str(if cond.negated { " is not " } else { " is " })?;
            write_type(f, &cond.test, qualified)?;
            f.write_str(" ? ")?;
            write_type(f, &cond.then, qualified)?;
            f.write_str(" : ")?;
            write_type(f, &cond.otherwise, qualified)?;
            f.write_char(')')
        }
        TypeExpr::Template(t) => f.write_str(&t.name),
        TypeExpr::Callable(callable) => write_callable(f, callable, qualified),
        TypeExpr::SelfRef => f.write_str("self"),
        TypeExpr::StaticRef => f.write_str("static"),
        TypeExpr::ThisRef => f.write_str("$this"),
        TypeExpr::Unknown => f.write_str("mixed"),
    }
}

fn write_named(f: &mut Formatter<'_>, named: &NamedType, qualified: bool) -> fmt::Result {
    match &named.refinement {
        Some(Refinement::IntRange { min, max }) => {
            f.write_str("int<")?;
            match min {
                Some(v) => write!(f, "{v}")?,
                None => f.write_str("min")?,
            }
            f.write_str(", ")?;
            match max {
                Some(v) => write!(f, "{v}"),
                None => f.write_str("max"),
            }?;
            f.write_char('>')
        }
        Some(Refinement::Keyword(keyword)) => f.write_str(keyword),
        None => {
            if qualified && !named.is_keyword() {
                f.write_char('\\')?;
            }
            f.write_str(&named.name)
        }
    }
}

fn write_joined(
    f: &mut Formatter<'_>,
    members: &[TypeExpr],
    sep: char,
    qualified: bool,
) -> fmt::Result {
    for (i, member) in members.iter().enumerate() {
        if i > 0 {
            f.write_char(sep)?;
        }
        let wrap = match member {
            TypeExpr::Union(_) => true,
            TypeExpr::Intersection(_) => sep == '&',
            TypeExpr::Callable(c) => c.ret.is_some(),
            _ => false,
        };
        if wrap {
            f.write_char('(')?;
            write_type(f, member, qualified)?;
            f.write_char(')')?;
        } else {
            write_type(f, member, qualified)?;
        }
    }
    Ok(())
}

fn write_list(f: &mut Formatter<'_>, items: &[TypeExpr], qualified: bool) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_type(f, item, qualified)?;
    }
    Ok(())
}

fn write_shape(f: &mut Formatter<'_>, shape: &ArrayShape, qualified: bool) -> fmt::Result {
    f.write_str(shape.kind.keyword())?;
    f.write_char('{')?;
    for (i, field) in shape.fields.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        if let Some(key) = &field.key {
            match key {
                ShapeKey::Int(v) => write!(f, "{v}")?,
                ShapeKey::Str(s) if is_bare_key(s) => f.write_str(s)?,
                ShapeKey::Str(s) => write_quoted(f, s)?,
            }
            if field.optional {
                f.write_char('?')?;
            }
            f.write_str(": ")?;
        }
        write_type(f, &field.ty, qualified)?;
    }
    if shape.open {
        if !shape.fields.is_empty() {
            f.write_str(", ")?;
        }
        f.write_str("...")?;
        if !shape.rest.is_empty() {
            f.write_char('<')?;
            write_list(f, &shape.rest, qualified)?;
            f.write_char('>')?;
        }
    }
    f.write_char('}')
}

fn is_bare_key(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !s.ends_with('-')
}

fn write_quoted(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in s.chars() {
        if c == '\'' || c == '\\' {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    f.write_char('\'')
}

fn write_literal(f: &mut Formatter<'_>, literal: &LiteralValue, qualified: bool) -> fmt::Result {
    let prefix = if qualified { "\\" } else { "" };
    match literal {
        LiteralValue::Int(v) => write!(f, "{v}"),
        LiteralValue::Float(text) => f.write_str(text),
        LiteralValue::String(s) => write_quoted(f, s),
        LiteralValue::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
        LiteralValue::Null => f.write_str("null"),
        LiteralValue::ClassString(class) => write!(f, "{}::class", class_ref(class, prefix)),
        LiteralValue::ClassConstant { class, name } => {
            write!(f, "{}::{name}", class_ref(class, prefix))
        }
    }
}

fn class_ref(class: &str, prefix: &str) -> String {
    match class {
        "self" | "static" => class.to_string(),
        _ => format!("{prefix}{class}"),
    }
}

fn write_callable(f: &mut Formatter<'_>, callable: &CallableType, qualified: bool) -> fmt::Result {
    match callable.kind.refinement_keyword() {
        Some(keyword) => f.write_str(keyword)?,
        None if callable.kind.name == "Closure" && qualified => f.write_str("\\Closure")?,
        None => f.write_str(&callable.kind.name)?,
    }
    f.write_char('(')?;
    for (i, param) in callable.params.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_type(f, &param.ty, qualified)?;
        if param.by_ref || param.variadic || param.name.is_some() {
            f.write_char(' ')?;
        }
        if param.by_ref {
            f.write_char('&')?;
        }
        if param.variadic {
            f.write_str("...")?;
        }
        if let Some(name) = &param.name {
            write!(f, "${name}")?;
        }
        if param.optional {
            f.write_char('=')?;
        }
    }
    f.write_char(')')?;
    if let Some(ret) = &callable.ret {
        f.write_str(": ")?;
        let wrap = matches!(
            ret,
            TypeExpr::Union(_) | TypeExpr::Intersection(_) | TypeExpr::Callable(_)
        );
        if wrap {
            f.write_char('(')?;
            write_type(f, ret, qualified)?;
            f.write_char(')')?;
        } else {
            write_type(f, ret, qualified)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::{CompileContext, compile};
    use crate::parser::names::NameContext;

    fn roundtrip(src: &str) {
        let names = NameContext::new(Some("App".into()));
        let ctx = CompileContext::bare(&names);
        let first = compile(src, &ctx).unwrap();
        let printed = first.qualified().to_string();
        let second = compile(&printed, &ctx)
            .unwrap_or_else(|e| panic!("re-compiling `{printed}` failed: {e}"));
        assert_eq!(first, second, "printed as `{printed}`");
    }

    #[test]
    fn printed_types_recompile_to_the_same_tree() {
        for src in [
            "?Foo",
            "array<int, string>|false",
            "list<non-empty-string>",
            "int<-5, max>",
            "array{0: int, 'a b'?: string, ...<int, mixed>}",
            "(callable(int &$x=): void)|null",
            "Closure(Foo): Bar",
            "Foo&Bar",
            "(Foo|Bar)&Baz",
            "Foo::BAR_*|Foo::class|'it\\'s'|-1|1.5",
            "class-string<Foo>",
        ] {
            roundtrip(src);
        }
    }

    #[test]
    fn display_is_readable() {
        let names = NameContext::default();
        let ty = compile("?array<string,int>", &CompileContext::bare(&names)).unwrap();
        assert_eq!(ty.to_string(), "array<string, int>|null");
    }

    #[test]
    fn qualified_adds_leading_backslash_to_classes_only() {
        let names = NameContext::default();
        let ty = compile("ArrayIterator<string, int>", &CompileContext::bare(&names)).unwrap();
        assert_eq!(ty.qualified().to_string(), "\\ArrayIterator<string, int>");
    }
}
