//! Call-site evaluation of generic and conditional signatures.

mod common;

use common::{call, resolver, ty};
use phpantom_stubs::{ArgValue, CallSite, EvalError, LiteralValue, TypeExpr};

// ─── Conditional return types ───────────────────────────────────────

const INTL: &str = concat!(
    "<?php\n",
    "class IntlCalendar {\n",
    "    public const FIELD_ERA = 0;\n",
    "    public const FIELD_YEAR = 1;\n",
    "    public const FIELD_MONTH = 2;\n",
    "    public const FIELD_DAY_OF_MONTH = 5;\n",
    "    public const DOW_SUNDAY = 1;\n",
    "\n",
    "    /**\n",
    "     * @param int $field\n",
    "     * @return ($field is IntlCalendar::FIELD_* ? int : false)\n",
    "     */\n",
    "    public function get(int $field) {}\n",
    "}\n",
);

#[test]
fn field_constant_argument_selects_the_then_branch() {
    let resolver = resolver(INTL);
    let site = CallSite::new().literal(LiteralValue::Int(5));
    assert_eq!(call(&resolver, "IntlCalendar::get", &site), "int");
}

#[test]
fn value_outside_the_constant_set_selects_the_else_branch() {
    let resolver = resolver(INTL);
    let site = CallSite::new().literal(LiteralValue::Int(-1));
    assert_eq!(call(&resolver, "IntlCalendar::get", &site), "false");
}

#[test]
fn runtime_argument_yields_both_branches() {
    let resolver = resolver(INTL);
    let site = CallSite::new().typed(ty("int"));
    assert_eq!(call(&resolver, "IntlCalendar::get", &site), "int|false");
}

#[test]
fn constant_reference_arguments_are_expanded() {
    let resolver = resolver(INTL);
    let site = CallSite::new().literal(LiteralValue::ClassConstant {
        class: "IntlCalendar".into(),
        name: "FIELD_YEAR".into(),
    });
    assert_eq!(call(&resolver, "IntlCalendar::get", &site), "int");
}

#[test]
fn negated_conditions_and_literal_defaults() {
    let resolver = resolver(concat!(
        "<?php\n",
        "/** @return ($mode is not 0 ? int<1, max> : 0) */\n",
        "function count_mode(array $a, int $mode = 0) {}\n",
    ));
    let any_array = ty("array");
    let omitted = CallSite::new().typed(any_array.clone());
    assert_eq!(call(&resolver, "count_mode", &omitted), "0");

    let recursive = CallSite::new()
        .typed(any_array)
        .named("mode", ArgValue::Literal(LiteralValue::Int(1)));
    assert_eq!(call(&resolver, "count_mode", &recursive), "int<1, max>");
}

// ─── Templates ──────────────────────────────────────────────────────

const SPL: &str = concat!(
    "<?php\n",
    "interface Traversable {}\n",
    "/**\n",
    " * @template TKey\n",
    " * @template-covariant TValue\n",
    " */\n",
    "interface Iterator extends Traversable {\n",
    "    /** @return TValue */\n",
    "    public function current(): mixed;\n",
    "}\n",
    "/**\n",
    " * @template TKey\n",
    " * @template-covariant TValue\n",
    " * @extends Traversable<TKey, TValue>\n",
    " */\n",
    "interface IteratorAggregate extends Traversable {\n",
    "    /** @return Traversable<TKey, TValue> */\n",
    "    public function getIterator(): Iterator;\n",
    "}\n",
    "/**\n",
    " * @template TKey of array-key\n",
    " * @template TValue\n",
    " * @implements Iterator<TKey, TValue>\n",
    " */\n",
    "class ArrayIterator implements Iterator {\n",
    "    /** @return TValue */\n",
    "    public function current(): mixed {}\n",
    "}\n",
    "/**\n",
    " * @template TKey of array-key\n",
    " * @template TValue\n",
    " * @implements IteratorAggregate<TKey, TValue>\n",
    " */\n",
    "class ArrayObject implements IteratorAggregate {\n",
    "    /** @param array<TKey, TValue>|object $array */\n",
    "    public function __construct(array|object $array = []) {}\n",
    "    /** @return ArrayIterator<TKey, TValue> */\n",
    "    public function getIterator(): Iterator {}\n",
    "    /** @return array<TKey, TValue> */\n",
    "    public function getArrayCopy(): array {}\n",
    "}\n",
    "/**\n",
    " * @template T\n",
    " * @extends ArrayIterator<int, T>\n",
    " */\n",
    "class ListIterator extends ArrayIterator {}\n",
);

#[test]
fn receiver_arguments_instantiate_class_templates() {
    let resolver = resolver(SPL);
    let site = CallSite::new().with_receiver(ty("ArrayObject<string, int>"));
    assert_eq!(
        call(&resolver, "ArrayObject::getIterator", &site),
        "ArrayIterator<string, int>"
    );
    assert_eq!(
        call(&resolver, "ArrayObject::getArrayCopy", &site),
        "array<string, int>"
    );
}

#[test]
fn unbound_templates_fall_back_to_their_bound() {
    let resolver = resolver(SPL);
    let site = CallSite::new().with_receiver(ty("ArrayObject"));
    assert_eq!(
        call(&resolver, "ArrayObject::getIterator", &site),
        "ArrayIterator<array-key, mixed>"
    );
}

#[test]
fn templates_flow_through_extends_bindings() {
    let resolver = resolver(SPL);
    let site = CallSite::new().with_receiver(ty("ListIterator<Foo>"));
    assert_eq!(call(&resolver, "ListIterator::current", &site), "Foo");
    // A bare method name is looked up on the receiver's class.
    assert_eq!(call(&resolver, "current", &site), "Foo");
}

#[test]
fn receiver_methods_win_over_global_functions() {
    let stubs = format!("{SPL}function current(array|object $array): mixed {{}}\n");
    let resolver = resolver(&stubs);
    let site = CallSite::new().with_receiver(ty("ArrayIterator<string, int>"));
    assert_eq!(call(&resolver, "current", &site), "int");
    assert_eq!(call(&resolver, "current", &CallSite::new()), "mixed");
}

#[test]
fn arguments_bind_function_templates() {
    let resolver = resolver(concat!(
        "<?php\n",
        "/**\n",
        " * @template T\n",
        " * @param array<array-key, T> $array\n",
        " * @return T|false\n",
        " */\n",
        "function reset(array &$array) {}\n",
        "/**\n",
        " * @template T of object\n",
        " * @param class-string<T> $class\n",
        " * @return T\n",
        " */\n",
        "function make(string $class) {}\n",
    ));
    let site = CallSite::new().typed(ty("list<Foo>"));
    assert_eq!(call(&resolver, "reset", &site), "Foo|false");

    // Literal element types bind their keyword type.
    let site = CallSite::new().typed(ty("array<int, 'x'|'y'>"));
    assert_eq!(call(&resolver, "reset", &site), "string|false");

    let class = CallSite::new().literal(LiteralValue::ClassString("App\\User".into()));
    assert_eq!(call(&resolver, "make", &class), "App\\User");
    assert_eq!(call(&resolver, "make", &CallSite::new()), "object");
}

#[test]
fn self_static_and_this() {
    let resolver = resolver(concat!(
        "<?php\n",
        "class Builder {\n",
        "    /** @return static */\n",
        "    public function where(): static {}\n",
        "    /** @return self */\n",
        "    public function base() {}\n",
        "    /** @return $this */\n",
        "    public function tap() {}\n",
        "}\n",
        "class QueryBuilder extends Builder {}\n",
    ));
    let site = CallSite::new().with_receiver(ty("QueryBuilder"));
    assert_eq!(call(&resolver, "QueryBuilder::where", &site), "QueryBuilder");
    assert_eq!(call(&resolver, "QueryBuilder::tap", &site), "QueryBuilder");
    assert_eq!(call(&resolver, "QueryBuilder::base", &site), "Builder");
    assert_eq!(call(&resolver, "Builder::where", &CallSite::new()), "Builder");
}

#[test]
fn param_out_and_properties() {
    let resolver = resolver(concat!(
        "<?php\n",
        "/**\n",
        " * @param-out list<string> $matches\n",
        " * @return int|false\n",
        " */\n",
        "function preg_match_ish(string $pattern, string $subject, &$matches = null) {}\n",
        "/** @template T */\n",
        "final class Holder {\n",
        "    /** @var list<T> */\n",
        "    public array $items;\n",
        "    /** @param T $first */\n",
        "    public function __construct(public readonly mixed $first) {}\n",
        "}\n",
    ));
    let site = CallSite::new().typed(ty("string")).typed(ty("string"));
    let out = resolver.resolve_param_out("preg_match_ish", &site, 2).unwrap();
    assert_eq!(out.map(|t| t.to_string()).as_deref(), Some("list<string>"));
    assert_eq!(resolver.resolve_param_out("preg_match_ish", &site, 7).unwrap(), None);

    let receiver = ty("Holder<int>");
    let items = resolver.resolve_property("Holder", "items", Some(&receiver)).unwrap();
    assert_eq!(items.to_string(), "list<int>");
    let first = resolver.resolve_property("Holder", "$first", Some(&receiver)).unwrap();
    assert_eq!(first, TypeExpr::keyword("int"));
}

// ─── Errors ─────────────────────────────────────────────────────────

#[test]
fn unknown_and_non_callable_symbols() {
    let resolver = resolver(INTL);
    assert!(matches!(
        resolver.resolve_call("nope", &CallSite::new()),
        Err(EvalError::UnknownSymbol(_))
    ));
    assert!(matches!(
        resolver.resolve_call("IntlCalendar::FIELD_ERA", &CallSite::new()),
        Err(EvalError::NotCallable(_))
    ));
    assert!(matches!(
        resolver.resolve_property("IntlCalendar", "missing", None),
        Err(EvalError::UnknownSymbol(_))
    ));
}
