//! The join phase.
//!
//! Files are lowered in parallel, but joining them is not commutative:
//! which redeclaration wins depends on bundle order.  The builder therefore
//! takes lowered files one at a time, in bundle order, and runs the
//! cross-symbol passes (redeclarations, inheritance, generic arity) once
//! every file is in.

use std::collections::HashMap;

use crate::bundle::BundleInfo;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::lower::LoweredFile;
use crate::type_expr::{TypeExpr, builtin_generic_arity};
use crate::types::{Symbol, SymbolId};

use super::{RedeclarationPolicy, SymbolDatabase, class_key, inheritance};

pub struct DatabaseBuilder {
    bundle: BundleInfo,
    policy: RedeclarationPolicy,
    symbols: Vec<Symbol>,
    diagnostics: Diagnostics,
}

impl DatabaseBuilder {
    pub fn new(bundle: BundleInfo, policy: RedeclarationPolicy) -> Self {
        DatabaseBuilder {
            bundle,
            policy,
            symbols: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Append one file's symbols.  Its diagnostics must already have been
    /// emitted by whoever lowered it.
    pub(crate) fn add_file(&mut self, file: LoweredFile) {
        tracing::trace!(file = %file.path, symbols = file.symbols.len(), "joining file");
        self.symbols.extend(file.symbols);
        self.diagnostics.absorb(file.diagnostics);
    }

    pub fn finish(self) -> SymbolDatabase {
        let mut db = SymbolDatabase::new(self.bundle, self.policy, self.symbols, self.diagnostics);

        report_redeclarations(&mut db);
        inheritance::link(&mut db);
        check_generic_arity(&mut db);

        tracing::info!(
            symbols = db.symbols.len(),
            classes = db.members.len(),
            diagnostics = db.diagnostics.len(),
            "symbol database built"
        );
        db
    }
}

/// One `Redeclaration` per shadowed top-level declaration, in join order.
fn report_redeclarations(db: &mut SymbolDatabase) {
    let mut found = Vec::new();
    for (i, symbol) in db.symbols.iter().enumerate() {
        let id = SymbolId(i as u32);
        let Some(entry) = db.entry_for(symbol) else {
            continue;
        };
        if entry.all.len() < 2 || entry.preferred == id {
            continue;
        }
        let Some(winner) = db.symbol(entry.preferred) else {
            continue;
        };
        found.push(
            Diagnostic::new(
                DiagnosticKind::Redeclaration,
                format!(
                    "{} `{}` is declared {} times; using the one at {}@{}",
                    symbol.kind,
                    symbol.name,
                    entry.all.len(),
                    winner.location.file,
                    winner.location.offset
                ),
            )
            .at(&symbol.location.file, symbol.location.offset)
            .for_symbol(&symbol.name),
        );
    }
    for d in found {
        db.diagnostics.push(d);
    }
}

/// Accepted argument counts for a generic class, from its templates.
#[derive(Clone, Copy)]
struct ClassArity {
    min: usize,
    max: usize,
    /// `Traversable` descendants also accept the value type alone.
    traversable: bool,
}

/// Degrade `Name<...>` with the wrong number of arguments to `Name`.
fn check_generic_arity(db: &mut SymbolDatabase) {
    let table: HashMap<String, ClassArity> = db
        .classes()
        .into_iter()
        .filter_map(|class| {
            let shape = class.class.as_ref()?;
            let required = shape.templates.iter().filter(|t| t.default.is_none()).count();
            Some((
                class_key(&class.name),
                ClassArity {
                    min: required,
                    max: shape.templates.len(),
                    traversable: db.is_subtype_of(&class.name, "Traversable"),
                },
            ))
        })
        .collect();

    let mut errors = Vec::new();
    let mut symbols = std::mem::take(&mut db.symbols);
    for symbol in &mut symbols {
        check_symbol(symbol, &table, &mut errors);
    }
    db.symbols = symbols;
    for d in errors {
        db.diagnostics.push(d);
    }
}

fn check_symbol(symbol: &mut Symbol, table: &HashMap<String, ClassArity>, errors: &mut Vec<Diagnostic>) {
    let name = symbol.qualified_name();
    let location = symbol.location.clone();
    let mut check = |ty: &mut TypeExpr| {
        let taken = std::mem::take(ty);
        *ty = taken.rewrite(&mut |node| match node {
            TypeExpr::Generic(base, args) => match accepted_range(&base, table) {
                Some((min, max)) if args.len() < min || args.len() > max => {
                    errors.push(
                        Diagnostic::new(
                            DiagnosticKind::ArityError,
                            format!(
                                "`{}` takes {} generic argument(s), {} given",
                                base.spelling(),
                                if min == max { min.to_string() } else { format!("{min}..{max}") },
                                args.len()
                            ),
                        )
                        .at(&location.file, location.offset)
                        .for_symbol(&name),
                    );
                    TypeExpr::Named(base)
                }
                _ => TypeExpr::Generic(base, args),
            },
            other => other,
        });
    };

    if let Some(sig) = &mut symbol.signature {
        for param in &mut sig.params {
            check(&mut param.ty);
            if let Some(out) = &mut param.out {
                check(out);
            }
        }
        check(&mut sig.return_type);
        for template in &mut sig.templates {
            template.bound.iter_mut().for_each(&mut check);
        }
        for assertion in &mut sig.assertions {
            check(&mut assertion.ty);
        }
        sig.throws.iter_mut().for_each(&mut check);
    }
    if let Some(ty) = &mut symbol.ty {
        check(ty);
    }
    if let Some(shape) = &mut symbol.class {
        for template in &mut shape.templates {
            template.bound.iter_mut().for_each(&mut check);
        }
        for binding in &mut shape.bindings {
            binding.args.iter_mut().for_each(&mut check);
        }
        for member in &mut shape.members {
            check_symbol(member, table, errors);
        }
    }
}

fn accepted_range(
    base: &crate::type_expr::NamedType,
    table: &HashMap<String, ClassArity>,
) -> Option<(usize, usize)> {
    if base.is_keyword() {
        return builtin_generic_arity(base.spelling());
    }
    let arity = table.get(&class_key(&base.name))?;
    if arity.max == 0 {
        // Generic syntax on a class that declares no templates, such as
        // `Iterator<int>` in corpora without template annotations, is
        // left alone.
        return None;
    }
    if arity.traversable && arity.min <= 2 {
        return Some((1, arity.max.max(1)));
    }
    Some((arity.min, arity.max))
}

#[cfg(test)]
mod tests {
    use crate::resolver::StubResolver;
    use crate::{DiagnosticKind, TypeExpr};

    fn build(src: &str) -> crate::SymbolDatabase {
        StubResolver::from_php(src).database().as_ref().clone()
    }

    #[test]
    fn wrong_class_arity_degrades_to_bare_name() {
        let db = build(concat!(
            "<?php\n",
            "/** @template K\n @template V */\n",
            "class Box {}\n",
            "/** @return Box<int, string, bool> */\n",
            "function f() {}\n",
        ));
        let f = db.lookup_function("f").unwrap();
        assert_eq!(f.signature.as_ref().unwrap().return_type, TypeExpr::class("Box"));
        assert_eq!(db.diagnostics().of_kind(DiagnosticKind::ArityError).count(), 1);
    }

    #[test]
    fn builtin_ranges_apply() {
        let db = build(concat!(
            "<?php\n",
            "/** @return list<int, string> */\n",
            "function f() {}\n",
            "/** @return array<int, string> */\n",
            "function g() {}\n",
        ));
        assert_eq!(db.diagnostics().of_kind(DiagnosticKind::ArityError).count(), 1);
        let g = db.lookup_function("g").unwrap();
        assert!(matches!(g.signature.as_ref().unwrap().return_type, TypeExpr::Generic(..)));
    }
}
