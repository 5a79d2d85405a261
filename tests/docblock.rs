//! Docblock tag recognition.

use phpantom_stubs::docblock::{AssertionKind, DocblockOptions, Variance, parse_docblock};

fn doc(text: &str) -> phpantom_stubs::docblock::DocblockAnnotations {
    parse_docblock(text, &DocblockOptions::default())
}

#[test]
fn params_and_return_with_descriptions() {
    let d = doc(concat!(
        "/**\n",
        " * Split a string.\n",
        " * @param string $separator The boundary string.\n",
        " * @param int<1, max> $limit\n",
        " * @return list<string>|false Returns false on failure.\n",
        " */",
    ));
    assert_eq!(d.param("separator").map(|p| p.type_text.as_str()), Some("string"));
    assert_eq!(d.param("limit").map(|p| p.type_text.as_str()), Some("int<1, max>"));
    assert_eq!(d.return_type.as_deref(), Some("list<string>|false"));
}

#[test]
fn prefixed_tags_override_plain_ones_in_any_order() {
    let prefixed_last = doc(concat!(
        "/**\n",
        " * @return array\n",
        " * @phpstan-return array<string, int>\n",
        " */",
    ));
    assert_eq!(prefixed_last.return_type.as_deref(), Some("array<string, int>"));

    let prefixed_first = doc(concat!(
        "/**\n",
        " * @psalm-param non-empty-string $s\n",
        " * @param string $s\n",
        " */",
    ));
    assert_eq!(
        prefixed_first.param("s").map(|p| p.type_text.as_str()),
        Some("non-empty-string")
    );
}

#[test]
fn plain_order_when_prefixes_are_not_preferred() {
    let d = parse_docblock(
        concat!(
            "/**\n",
            " * @phpstan-return array<string, int>\n",
            " * @return array\n",
            " */",
        ),
        &DocblockOptions {
            prefer_prefixed: false,
        },
    );
    assert_eq!(d.return_type.as_deref(), Some("array"));
}

#[test]
fn later_param_tags_replace_earlier_ones() {
    let d = doc(concat!(
        "/**\n",
        " * @param int $x\n",
        " * @param float $x\n",
        " */",
    ));
    assert_eq!(d.params.len(), 1);
    assert_eq!(d.param("x").map(|p| p.type_text.as_str()), Some("float"));
}

#[test]
fn templates_with_bounds_defaults_and_variance() {
    let d = doc(concat!(
        "/**\n",
        " * @template TKey of array-key\n",
        " * @template-covariant TValue\n",
        " * @template TDefault of object = stdClass\n",
        " */",
    ));
    assert_eq!(d.template_names(), ["TKey", "TValue", "TDefault"]);
    assert_eq!(d.templates[0].bound.as_deref(), Some("array-key"));
    assert_eq!(d.templates[1].variance, Variance::Covariant);
    assert_eq!(d.templates[2].bound.as_deref(), Some("object"));
    assert_eq!(d.templates[2].default.as_deref(), Some("stdClass"));
}

#[test]
fn generic_bindings() {
    let d = doc(concat!(
        "/**\n",
        " * @template-implements IteratorAggregate<TKey, TValue>\n",
        " * @implements ArrayAccess<TKey, TValue>\n",
        " * @extends Base<int>\n",
        " */",
    ));
    assert_eq!(
        d.implements,
        ["IteratorAggregate<TKey, TValue>", "ArrayAccess<TKey, TValue>"]
    );
    assert_eq!(d.extends, ["Base<int>"]);
}

#[test]
fn effects_and_markers() {
    let d = doc(concat!(
        "/**\n",
        " * @pure\n",
        " * @no-named-arguments\n",
        " * @since 8.1\n",
        " * @deprecated 8.2 Use mb_str_pad() instead\n",
        " * @throws ValueError|TypeError\n",
        " */",
    ));
    assert!(d.pure);
    assert!(d.no_named_arguments);
    assert!(!d.mutation_free);
    assert_eq!(d.since.as_deref(), Some("8.1"));
    let deprecated = d.deprecated.expect("deprecated tag");
    assert_eq!(deprecated.since.as_deref(), Some("8.2"));
    assert_eq!(deprecated.message.as_deref(), Some("Use mb_str_pad() instead"));
    assert_eq!(d.throws, ["ValueError", "TypeError"]);
}

#[test]
fn assertions_and_param_out() {
    let d = doc(concat!(
        "/**\n",
        " * @phpstan-assert-if-true !null $value\n",
        " * @psalm-assert int $count\n",
        " * @param-out list<string> $matches\n",
        " */",
    ));
    assert_eq!(d.assertions.len(), 2);
    assert_eq!(d.assertions[0].kind, AssertionKind::IfTrue);
    assert!(d.assertions[0].negated);
    assert_eq!(d.assertions[0].type_text, "null");
    assert_eq!(d.assertions[0].param, "value");
    assert_eq!(d.assertions[1].kind, AssertionKind::Always);
    assert_eq!(
        d.param_out("matches").map(|p| p.type_text.as_str()),
        Some("list<string>")
    );
}

#[test]
fn multi_line_shapes_arrive_whole() {
    let d = doc(concat!(
        "/**\n",
        " * @return array{\n",
        " *     sec: int,\n",
        " *     usec: int,\n",
        " * }\n",
        " */",
    ));
    let ty = d.return_type.expect("return type");
    assert!(ty.starts_with("array{"));
    assert!(ty.ends_with('}'));
    assert!(ty.contains("usec: int"));
}

#[test]
fn malformed_tags_are_reported_not_fatal() {
    let d = doc(concat!(
        "/**\n",
        " * @param int\n",
        " * @return string\n",
        " */",
    ));
    assert_eq!(d.malformed.len(), 1);
    assert_eq!(d.malformed[0].0, "@param");
    assert_eq!(d.return_type.as_deref(), Some("string"));
}
