//! Type compilation as seen through lowered stubs.

mod common;

use common::{declared_return, resolver, ty};
use phpantom_stubs::parser::names::NameContext;
use phpantom_stubs::type_expr::{CompileContext, compile};
use phpantom_stubs::{DiagnosticKind, SymbolKind, TypeExpr};

const CORPUS: &str = concat!(
    "<?php\n",
    "namespace Ds {\n",
    "    /** @template T */\n",
    "    final class Vector {}\n",
    "}\n",
    "namespace App {\n",
    "    use Ds\\Vector as Vec;\n",
    "    /** @return Vec<int>|null */\n",
    "    function numbers() {}\n",
    "    /** @return array{sec: int, usec: int, 'weird key'?: float} */\n",
    "    function gettimeofday_ish(bool $as_float = false) {}\n",
    "    /** @return ($as_float is true ? float : array{sec: int, usec: int}) */\n",
    "    function hrtime_ish(bool $as_float = false) {}\n",
    "    /** @return callable(string, int=): (non-empty-string|false) */\n",
    "    function maker() {}\n",
    "    /** @return int<0, max>|-1 */\n",
    "    function position() {}\n",
    "    /** @return \\Closure(static): void */\n",
    "    function binder() {}\n",
    "    function native(?string $x): string|int|null {}\n",
    "}\n",
);

#[test]
fn docblock_names_resolve_through_imports() {
    let resolver = resolver(CORPUS);
    assert_eq!(declared_return(&resolver, "App\\numbers"), "Ds\\Vector<int>|null");
}

#[test]
fn native_hints_compile_like_docblock_types() {
    let resolver = resolver(CORPUS);
    assert_eq!(declared_return(&resolver, "App\\native"), "string|int|null");
    let native = resolver.lookup_symbol("App\\native").unwrap();
    let sig = native.signature.as_ref().unwrap();
    assert_eq!(sig.params[0].ty, ty("?string"));
}

/// Printing a stored type fully qualified and compiling it again gives the
/// same tree, for every callable in the corpus.
#[test]
fn printed_return_types_recompile_to_the_same_tree() {
    let resolver = resolver(CORPUS);
    let names = NameContext::default();
    let mut checked = 0;
    for symbol in resolver.database().functions() {
        let sig = symbol.signature.as_ref().unwrap();
        if sig.return_type.contains_template() {
            continue;
        }
        let params: Vec<String> = sig.params.iter().map(|p| p.name.clone()).collect();
        let ctx = CompileContext {
            names: &names,
            templates: &[],
            params: &params,
        };
        let printed = sig.return_type.qualified().to_string();
        let again = compile(&printed, &ctx).unwrap_or_else(|e| panic!("`{printed}`: {e}"));
        assert_eq!(again, sig.return_type, "{}: `{printed}`", symbol.name);
        checked += 1;
    }
    assert_eq!(checked, 7);
}

#[test]
fn unbalanced_generic_degrades_to_unknown() {
    let resolver = resolver(concat!(
        "<?php\n",
        "/**\n",
        " * @param array<int, string $items\n",
        " * @return array<int, string\n",
        " */\n",
        "function broken(array $items) {}\n",
        "function fine(): int {}\n",
    ));
    let broken = resolver.lookup_symbol("broken").unwrap();
    let sig = broken.signature.as_ref().unwrap();
    assert_eq!(sig.return_type, TypeExpr::Unknown);
    assert!(sig.return_type.is_mixed());

    let errors: Vec<_> = resolver
        .diagnostics()
        .of_kind(DiagnosticKind::AnnotationError)
        .collect();
    assert!(!errors.is_empty());
    assert!(errors.iter().all(|d| d.symbol.as_deref() == Some("broken")));

    assert_eq!(declared_return(&resolver, "fine"), "int");
    assert_eq!(
        resolver.lookup_symbol("fine").map(|s| s.kind),
        Some(SymbolKind::Function)
    );
}

#[test]
fn wrong_generic_arity_degrades_to_the_bare_class() {
    let resolver = resolver(concat!(
        "<?php\n",
        "/** @template T */\n",
        "class Box {}\n",
        "/** @return Box<int, string> */\n",
        "function two() {}\n",
        "/** @return list<int, string> */\n",
        "function bad_list() {}\n",
        "/** @return Box<int> */\n",
        "function one() {}\n",
    ));
    assert_eq!(declared_return(&resolver, "two"), "Box");
    assert_eq!(declared_return(&resolver, "bad_list"), "list");
    assert_eq!(declared_return(&resolver, "one"), "Box<int>");
    assert_eq!(
        resolver.diagnostics().of_kind(DiagnosticKind::ArityError).count(),
        2
    );
}
