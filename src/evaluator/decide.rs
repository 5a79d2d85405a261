//! Static decisions for conditional types.
//!
//! `decide(subject, test)` answers "is every value of `subject` a `test`?"
//! with `Some(true)`, "is no value of `subject` a `test`?" with
//! `Some(false)`, and `None` when the answer depends on the runtime value.

use crate::database::SymbolDatabase;
use crate::type_expr::{LiteralValue, NamedType, Refinement, TypeExpr};
use crate::types::{ClassKind, SymbolKind};

/// Keyword supertypes and the keywords they contain.
const SUPERTYPES: &[(&str, &[&str])] = &[
    ("scalar", &["int", "float", "string", "bool", "true", "false", "numeric", "array-key"]),
    ("numeric", &["int", "float"]),
    ("array-key", &["int", "string"]),
    ("bool", &["true", "false"]),
    ("iterable", &["array"]),
];

/// Keyword pairs that share some values without one containing the other.
const OVERLAPS: &[(&str, &str)] = &[
    ("numeric", "string"),
    ("numeric", "array-key"),
    ("callable", "string"),
    ("callable", "array"),
    ("callable", "object"),
    ("iterable", "object"),
];

/// Decide `subject is test`.  `self_class` resolves `self::CONST` in either
/// type.
pub fn decide(
    subject: &TypeExpr,
    test: &TypeExpr,
    db: &SymbolDatabase,
    self_class: Option<&str>,
) -> Option<bool> {
    let decider = Decider { db, self_class };
    let subject = decider.expand(subject);
    let test = decider.expand(test);
    decider.decide(&subject, &test)
}

struct Decider<'a> {
    db: &'a SymbolDatabase,
    self_class: Option<&'a str>,
}

impl Decider<'_> {
    /// Replace class-constant literals by their values.  A wildcard
    /// becomes the union of every matching constant.
    fn expand(&self, ty: &TypeExpr) -> TypeExpr {
        ty.clone().rewrite(&mut |node| match node {
            TypeExpr::Literal(LiteralValue::ClassConstant { class, name }) => self
                .constant_values(&class, &name)
                .unwrap_or(TypeExpr::Literal(LiteralValue::ClassConstant { class, name })),
            other => other,
        })
    }

    fn constant_values(&self, class: &str, pattern: &str) -> Option<TypeExpr> {
        let class = match class {
            "self" | "static" => self.self_class?,
            other => other,
        };
        let matching = self.db.constants_matching(class, pattern);
        if matching.is_empty() {
            return None;
        }
        let mut values = Vec::with_capacity(matching.len());
        for constant in matching {
            let value = match (&constant.value, constant.kind) {
                (Some(value), _) => value.to_type(),
                // A unit enum case is its own value.
                (None, SymbolKind::EnumCase) => TypeExpr::Literal(LiteralValue::ClassConstant {
                    class: constant.declaring_class.clone().unwrap_or_else(|| class.to_string()),
                    name: constant.name.clone(),
                }),
                (None, _) => return None,
            };
            values.push(value);
        }
        Some(TypeExpr::union(values))
    }

    fn decide(&self, subject: &TypeExpr, test: &TypeExpr) -> Option<bool> {
        if let TypeExpr::Union(members) = subject {
            return agree(members.iter().map(|m| self.decide(m, test)));
        }
        match test {
            TypeExpr::Union(members) => {
                let answers: Vec<Option<bool>> = members.iter().map(|m| self.decide(subject, m)).collect();
                if answers.contains(&Some(true)) {
                    return Some(true);
                }
                if answers.iter().all(|a| *a == Some(false)) {
                    return Some(false);
                }
                return None;
            }
            TypeExpr::Intersection(members) => {
                let answers: Vec<Option<bool>> = members.iter().map(|m| self.decide(subject, m)).collect();
                if answers.contains(&Some(false)) {
                    return Some(false);
                }
                if answers.iter().all(|a| *a == Some(true)) {
                    return Some(true);
                }
                return None;
            }
            _ => {}
        }
        if test.is_mixed() {
            return Some(true);
        }
        if subject.is_mixed() {
            return None;
        }

        match test {
            TypeExpr::Literal(expected) => self.against_literal(subject, expected),
            TypeExpr::Named(named) | TypeExpr::Generic(named, _) => self.against_named(subject, named),
            TypeExpr::ArrayShape(_) => match self.against_named(subject, &NamedType::plain("array")) {
                Some(false) => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn against_literal(&self, subject: &TypeExpr, expected: &LiteralValue) -> Option<bool> {
        if let TypeExpr::Literal(given) = subject {
            if matches!(given, LiteralValue::ClassConstant { .. })
                || matches!(expected, LiteralValue::ClassConstant { .. })
            {
                // Unresolved constants compare by name only.
                return (given == expected).then_some(true);
            }
            return Some(given == expected);
        }
        if matches!(expected, LiteralValue::ClassConstant { .. }) {
            return None;
        }
        let TypeExpr::Named(widened) = expected.widened() else {
            return None;
        };
        // A keyword subject either could hold the value or cannot.
        match self.against_named(subject, &widened) {
            Some(false) => Some(false),
            _ => None,
        }
    }

    fn against_named(&self, subject: &TypeExpr, test: &NamedType) -> Option<bool> {
        let given = match subject {
            TypeExpr::Literal(literal) => return literal_matches(literal, test),
            TypeExpr::Named(named) | TypeExpr::Generic(named, _) => named.clone(),
            TypeExpr::ArrayShape(shape) => NamedType::plain(if shape.kind.keyword() == "object" {
                "object"
            } else {
                "array"
            }),
            TypeExpr::Callable(callable) => callable.kind.clone(),
            _ => return None,
        };
        match (given.is_keyword(), test.is_keyword()) {
            (true, true) => keyword_relation(&given, test),
            (true, false) => match given.name.as_str() {
                "object" | "iterable" | "callable" | "mixed" => None,
                _ => Some(false),
            },
            (false, true) => self.class_against_keyword(&given.name, test),
            (false, false) => self.class_relation(&given.name, &test.name),
        }
    }

    fn class_against_keyword(&self, class: &str, test: &NamedType) -> Option<bool> {
        if test.refinement.is_some() {
            return match test.name.as_str() {
                "object" => None,
                _ => Some(false),
            };
        }
        match test.name.as_str() {
            "object" | "mixed" => Some(true),
            "iterable" => {
                if self.db.is_subtype_of(class, "Traversable") {
                    Some(true)
                } else {
                    self.is_final(class).then_some(false)
                }
            }
            "callable" => {
                if self.db.is_subtype_of(class, "Closure") {
                    Some(true)
                } else {
                    None
                }
            }
            _ => Some(false),
        }
    }

    fn class_relation(&self, class: &str, test: &str) -> Option<bool> {
        if self.db.is_subtype_of(class, test) {
            return Some(true);
        }
        if self.db.is_subtype_of(test, class) {
            return None;
        }
        if self.is_final(class) {
            return Some(false);
        }
        let kind = |name: &str| self.db.lookup_class(name).and_then(|s| s.class.as_ref()).map(|s| s.kind);
        match (kind(class), kind(test)) {
            // Single inheritance: no subclass of one can extend the other.
            (Some(ClassKind::Class), Some(ClassKind::Class)) => Some(false),
            _ => None,
        }
    }

    fn is_final(&self, class: &str) -> bool {
        self.db.lookup_class(class).is_some_and(|s| {
            s.modifiers.is_final || s.class.as_ref().is_some_and(|c| c.kind == ClassKind::Enum)
        })
    }
}

/// `Some(b)` when every answer is `Some(b)`.
fn agree(answers: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut result = None;
    for answer in answers {
        let answer = answer?;
        match result {
            None => result = Some(answer),
            Some(previous) if previous != answer => return None,
            Some(_) => {}
        }
    }
    result
}

fn supertype_of(wide: &str, narrow: &str) -> bool {
    SUPERTYPES
        .iter()
        .any(|(k, members)| *k == wide && members.contains(&narrow))
        || (wide == "scalar" && supertype_of("bool", narrow))
}

fn overlaps(a: &str, b: &str) -> bool {
    OVERLAPS
        .iter()
        .any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a))
}

fn keyword_relation(given: &NamedType, test: &NamedType) -> Option<bool> {
    let (g, t) = (given.name.as_str(), test.name.as_str());
    if t == "mixed" && test.refinement.is_none() {
        return Some(true);
    }
    if g == t {
        return if test.refinement.is_none() || given.refinement == test.refinement {
            Some(true)
        } else {
            None
        };
    }
    if supertype_of(t, g) {
        return if test.refinement.is_none() { Some(true) } else { None };
    }
    if supertype_of(g, t) || overlaps(g, t) {
        return None;
    }
    Some(false)
}

/// Whether a literal value is a `test`.
fn literal_matches(literal: &LiteralValue, test: &NamedType) -> Option<bool> {
    let base = match literal {
        LiteralValue::Int(_) => "int",
        LiteralValue::Float(_) => "float",
        LiteralValue::String(_) | LiteralValue::ClassString(_) => "string",
        LiteralValue::Bool(true) => "true",
        LiteralValue::Bool(false) => "false",
        LiteralValue::Null => "null",
        LiteralValue::ClassConstant { .. } => return None,
    };
    if !test.is_keyword() {
        return Some(false);
    }
    let numeric_string = matches!(literal, LiteralValue::String(s) if is_numeric(s));
    let base_matches = test.name == base
        || supertype_of(&test.name, base)
        || (test.name == "numeric" && numeric_string)
        || test.name == "mixed";
    if !base_matches {
        return Some(false);
    }
    match &test.refinement {
        None => Some(true),
        Some(Refinement::IntRange { min, max }) => match literal {
            LiteralValue::Int(v) => Some(min.is_none_or(|m| *v >= m) && max.is_none_or(|m| *v <= m)),
            _ => Some(false),
        },
        Some(Refinement::Keyword(keyword)) => refinement_holds(literal, keyword),
    }
}

fn refinement_holds(literal: &LiteralValue, keyword: &str) -> Option<bool> {
    match (literal, keyword) {
        (LiteralValue::Int(v), "positive-int") => Some(*v > 0),
        (LiteralValue::Int(v), "negative-int") => Some(*v < 0),
        (LiteralValue::Int(v), "non-positive-int") => Some(*v <= 0),
        (LiteralValue::Int(v), "non-negative-int") => Some(*v >= 0),
        (LiteralValue::Int(v), "non-zero-int") => Some(*v != 0),
        (LiteralValue::Int(_), "literal-int") => Some(true),
        (LiteralValue::String(s), "non-empty-string") => Some(!s.is_empty()),
        (LiteralValue::String(s), "non-falsy-string" | "truthy-string") => Some(!s.is_empty() && s != "0"),
        (LiteralValue::String(s), "numeric-string") => Some(is_numeric(s)),
        (LiteralValue::String(s), "lowercase-string") => Some(s.to_lowercase() == *s),
        (LiteralValue::String(s), "uppercase-string") => Some(s.to_uppercase() == *s),
        (LiteralValue::String(_) | LiteralValue::ClassString(_), "literal-string") => Some(true),
        (LiteralValue::ClassString(_), "class-string") => Some(true),
        (LiteralValue::ClassString(s), "non-empty-string" | "non-falsy-string" | "truthy-string") => {
            Some(!s.is_empty())
        }
        _ => None,
    }
}

fn is_numeric(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && s.parse::<f64>().is_ok_and(f64::is_finite)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_relations() {
        let k = NamedType::plain;
        assert_eq!(keyword_relation(&k("int"), &k("int")), Some(true));
        assert_eq!(keyword_relation(&k("int"), &k("scalar")), Some(true));
        assert_eq!(keyword_relation(&k("true"), &k("bool")), Some(true));
        assert_eq!(keyword_relation(&k("bool"), &k("true")), None);
        assert_eq!(keyword_relation(&k("int"), &k("string")), Some(false));
        assert_eq!(keyword_relation(&k("numeric"), &k("string")), None);
        assert_eq!(keyword_relation(&k("null"), &k("int")), Some(false));
    }

    #[test]
    fn literals_against_keywords() {
        let int_range = NamedType {
            name: "int".to_string(),
            refinement: Some(Refinement::IntRange { min: Some(0), max: None }),
        };
        assert_eq!(literal_matches(&LiteralValue::Int(3), &int_range), Some(true));
        assert_eq!(literal_matches(&LiteralValue::Int(-1), &int_range), Some(false));
        assert_eq!(
            literal_matches(&LiteralValue::String("12".into()), &NamedType::plain("numeric")),
            Some(true)
        );
        assert_eq!(
            literal_matches(&LiteralValue::String("x".into()), &NamedType::plain("int")),
            Some(false)
        );
    }

    #[test]
    fn agreement() {
        assert_eq!(agree([Some(true), Some(true)].into_iter()), Some(true));
        assert_eq!(agree([Some(true), Some(false)].into_iter()), None);
        assert_eq!(agree([Some(false), None].into_iter()), None);
    }
}
