//! Declaration extraction from stub files.

use phpantom_stubs::declarations::{Declaration, MemberDecl};
use phpantom_stubs::parser::{ParseOptions, parse_stub_file};
use phpantom_stubs::{DiagnosticKind, PhpVersion};

fn parse(src: &str) -> Vec<Declaration> {
    parse_stub_file("stub.php", src, &ParseOptions::default()).declarations
}

fn names(decls: &[Declaration]) -> Vec<&str> {
    decls.iter().map(Declaration::name).collect()
}

// ─── Top-level declarations ─────────────────────────────────────────

#[test]
fn namespaced_declarations_are_fully_qualified() {
    let decls = parse(concat!(
        "<?php\n",
        "namespace Ds;\n",
        "class Vector {}\n",
        "function fn_in_ds() {}\n",
        "const DS_VERSION = '1.0';\n",
    ));
    assert_eq!(names(&decls), ["Ds\\Vector", "Ds\\fn_in_ds", "Ds\\DS_VERSION"]);
}

#[test]
fn braced_namespaces_do_not_leak() {
    let decls = parse(concat!(
        "<?php\n",
        "namespace A { class One {} }\n",
        "namespace { class Two {} }\n",
    ));
    assert_eq!(names(&decls), ["A\\One", "Two"]);
}

#[test]
fn define_calls_and_guarded_functions() {
    let decls = parse(concat!(
        "<?php\n",
        "define('E_ALL', 32767);\n",
        "if (!defined('PHP_EOL')) {\n",
        "    define('PHP_EOL', \"\\n\");\n",
        "}\n",
        "if (!function_exists('array_first')) {\n",
        "    function array_first(array $a) {}\n",
        "}\n",
    ));
    assert_eq!(names(&decls), ["E_ALL", "PHP_EOL", "array_first"]);
    let Declaration::Constant(all) = &decls[0] else {
        panic!("expected a constant");
    };
    assert_eq!(all.value.as_deref(), Some("32767"));
}

#[test]
fn bodies_are_not_walked() {
    let decls = parse(concat!(
        "<?php\n",
        "function outer() {\n",
        "    function inner() {}\n",
        "    class Hidden {}\n",
        "}\n",
    ));
    assert_eq!(names(&decls), ["outer"]);
}

// ─── Class members ──────────────────────────────────────────────────

#[test]
fn class_members_in_declaration_order() {
    let decls = parse(concat!(
        "<?php\n",
        "final class Point {\n",
        "    use Comparable;\n",
        "    public const ORIGIN = 0;\n",
        "    public function __construct(private int $x, public readonly int $y = 0) {}\n",
        "    protected static ?Point $cache = null;\n",
        "}\n",
    ));
    let Declaration::ClassLike(point) = &decls[0] else {
        panic!("expected a class");
    };
    assert!(point.is_final);
    let kinds: Vec<&str> = point
        .members
        .iter()
        .map(|m| match m {
            MemberDecl::TraitUse(_) => "use",
            MemberDecl::Constant(_) => "const",
            MemberDecl::Method(_) => "method",
            MemberDecl::Property(_) => "property",
            MemberDecl::EnumCase(_) => "case",
        })
        .collect();
    assert_eq!(kinds, ["use", "const", "method", "property"]);

    let MemberDecl::Method(ctor) = &point.members[2] else {
        panic!("expected the constructor");
    };
    assert_eq!(ctor.params.len(), 2);
    assert!(ctor.params[0].promoted.is_some());
    assert_eq!(ctor.params[1].default.as_deref(), Some("0"));
}

#[test]
fn enum_cases_keep_their_backing_values() {
    let decls = parse(concat!(
        "<?php\n",
        "enum Suit: string {\n",
        "    case Hearts = 'H';\n",
        "    case Spades = 'S';\n",
        "}\n",
    ));
    let Declaration::ClassLike(suit) = &decls[0] else {
        panic!("expected an enum");
    };
    assert_eq!(suit.enum_backing.as_deref(), Some("string"));
    let values: Vec<Option<&str>> = suit
        .members
        .iter()
        .filter_map(|m| match m {
            MemberDecl::EnumCase(case) => Some(case.value.as_deref()),
            _ => None,
        })
        .collect();
    assert_eq!(values, [Some("'H'"), Some("'S'")]);
}

#[test]
fn docblocks_attach_to_the_following_declaration() {
    let decls = parse(concat!(
        "<?php\n",
        "/** @return int */\n",
        "#[Pure]\n",
        "function f() {}\n",
        "\n",
        "function g() {}\n",
    ));
    let (Declaration::Function(f), Declaration::Function(g)) = (&decls[0], &decls[1]) else {
        panic!("expected two functions");
    };
    assert!(f.docblock.as_deref().is_some_and(|d| d.contains("@return int")));
    assert!(f.attributes.iter().any(|a| a.is("Pure")));
    assert!(g.docblock.is_none());
}

// ─── Version gating ─────────────────────────────────────────────────

#[test]
fn unavailable_declarations_are_dropped() {
    let src = concat!(
        "<?php\n",
        "#[PhpStormStubsElementAvailable(from: '8.0')]\n",
        "function str_contains(string $haystack, string $needle): bool {}\n",
        "#[PhpStormStubsElementAvailable(to: '7.4')]\n",
        "function each(array &$array) {}\n",
    );
    let modern = parse_stub_file(
        "a.php",
        src,
        &ParseOptions {
            php_version: PhpVersion::new(8, 2),
        },
    );
    assert_eq!(names(&modern.declarations), ["str_contains"]);

    let legacy = parse_stub_file(
        "a.php",
        src,
        &ParseOptions {
            php_version: PhpVersion::new(7, 4),
        },
    );
    assert_eq!(names(&legacy.declarations), ["each"]);
}

#[test]
fn language_level_types_pick_the_newest_applicable_entry() {
    let src = concat!(
        "<?php\n",
        "function strlen_ish(\n",
        "    #[LanguageLevelTypeAware(['8.0' => 'string'], default: '')] $s\n",
        "): int {}\n",
    );
    let decls = parse_stub_file(
        "a.php",
        src,
        &ParseOptions {
            php_version: PhpVersion::new(8, 3),
        },
    )
    .declarations;
    let Declaration::Function(f) = &decls[0] else {
        panic!("expected a function");
    };
    assert_eq!(f.params[0].hint.as_deref(), Some("string"));
}

// ─── Recovery ───────────────────────────────────────────────────────

#[test]
fn a_broken_declaration_does_not_take_the_file_down() {
    let file = parse_stub_file(
        "broken.php",
        concat!(
            "<?php\n",
            "function good_before() {}\n",
            "class Broken {\n",
            "    public function oops( {}\n",
            "function good_after() {}\n",
        ),
        &ParseOptions::default(),
    );
    let found = names(&file.declarations);
    assert!(found.contains(&"good_before"), "{found:?}");
    assert!(found.contains(&"good_after"), "{found:?}");
    assert!(
        file.diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ParseError),
        "{:?}",
        file.diagnostics
    );
}

#[test]
fn syntax_errors_inside_balanced_braces_are_reported() {
    let file = parse_stub_file(
        "broken.php",
        concat!(
            "<?php\n",
            "function good_before() {}\n",
            "class Broken extends { public function oops(int $x $y) {} }\n",
            "function good_after() {}\n",
        ),
        &ParseOptions::default(),
    );
    assert_eq!(names(&file.declarations), ["good_before", "good_after"]);
    let errors: Vec<_> = file
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::ParseError)
        .collect();
    assert_eq!(errors.len(), 1, "{:?}", file.diagnostics);
    assert_eq!(errors[0].symbol.as_deref(), Some("Broken"));
    assert_eq!(errors[0].file.as_deref(), Some("broken.php"));
}
