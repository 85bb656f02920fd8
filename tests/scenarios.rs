//! End-to-end scenarios against the public API surface only.

use std::fs;

use rsd::{parse_document, Document, RsdError};

#[test]
fn string_substitution_resolves_to_string_value() {
    let root = parse_document(r#"x = 3; y = "${x}";"#, 0, "t.rsd").unwrap();
    let y = root.get_named("y").unwrap();
    let (resolved, ok) = y.resolve().unwrap();
    assert!(ok);
    assert_eq!(resolved.raw_string().as_deref(), Some("3"));
}

#[test]
fn array_subscript_substitution_resolves_to_string_value() {
    let root = parse_document(r#"a = [1, 2, 3]; b = "${a[1]}";"#, 0, "t.rsd").unwrap();
    let b = root.get_named("b").unwrap();
    let (resolved, ok) = b.resolve().unwrap();
    assert!(ok);
    assert_eq!(resolved.raw_string().as_deref(), Some("2"));
}

#[test]
fn block_inheritance_follows_parent_for_missing_names() {
    let root = parse_document(r#"p = { n = "hi"; }; q : p { extra = 1; };"#, 0, "t.rsd").unwrap();
    let q = root.get_named("q").unwrap();

    let n = q.find_str("n").unwrap().unwrap();
    assert_eq!(n.raw_string().as_deref(), Some("hi"));

    let extra = q.find_str("extra").unwrap().unwrap();
    assert_eq!(extra.raw_integer(), Some(1));
}

#[test]
fn include_following_inlines_and_resolves() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("foo.rsd"), "k = 7;").unwrap();

    let followed =
        Document::load_buffer(r#"include "foo.rsd"; z = "${k}";"#, "main.rsd", dir.path(), true)
            .unwrap();
    let z = followed.root().get_named("z").unwrap();
    let (resolved, ok) = z.resolve().unwrap();
    assert!(ok);
    assert_eq!(resolved.raw_string().as_deref(), Some("7"));

    let unfollowed =
        Document::load_buffer(r#"include "foo.rsd"; z = "${k}";"#, "main.rsd", dir.path(), false)
            .unwrap();
    let z = unfollowed.root().get_named("z").unwrap();
    let (resolved, ok) = z.resolve().unwrap();
    assert!(!ok);
    assert_eq!(resolved.raw_string().as_deref(), Some("${k}"));
}

#[test]
fn registered_macro_resolves_while_unregistered_one_stays_unresolved() {
    rsd::register("scenarios_greeting", |_ctx, args| {
        let who = args.get("who").and_then(|v| v.raw_string()).unwrap_or_default();
        Ok(rsd::Value::string(format!("hello, {who}")))
    });

    let root = parse_document(r#"p = scenarios_greeting(who: "world");"#, 0, "t.rsd").unwrap();
    let p = root.get_named("p").unwrap();
    assert_eq!(p.as_string().unwrap(), "hello, world");

    rsd::unregister("scenarios_greeting");

    let root = parse_document(r#"p = scenarios_greeting(who: "world");"#, 0, "t.rsd").unwrap();
    let p = root.get_named("p").unwrap();
    let (resolved, ok) = p.resolve().unwrap();
    assert!(!ok);
    assert!(resolved.is_macro());
}

#[test]
fn typed_block_round_trips_through_the_serializer() {
    let root = parse_document("v = @Point { x = 1.0; y = 2.0; };", 0, "t.rsd").unwrap();
    let v = root.get_named("v").unwrap();
    assert!(v.is_block());
    assert_eq!(v.type_name().to_string(), "Point");
    assert_eq!(v.to_rsd_string(false, true, 0), "@Point { x = 1.0; y = 2.0; }");
}

#[test]
fn empty_containers_and_include_only_blocks_parse() {
    let root = parse_document("a = []; b = {}; c = { include \"x.rsd\"; };", 0, "t.rsd").unwrap();
    assert_eq!(root.get_named("a").unwrap().array_len().unwrap(), 0);
    assert_eq!(root.get_named("b").unwrap().block_len().unwrap(), 0);
    let c = root.get_named("c").unwrap();
    assert_eq!(c.block_len().unwrap(), 1);
    assert!(c.get_named("x.rsd").unwrap().is_include());
}

#[test]
fn trailing_comma_in_array_is_a_parse_error() {
    let err = parse_document("a = [1, 2,];", 0, "t.rsd").unwrap_err();
    assert!(matches!(err, RsdError::Parse { .. }));
}

#[test]
fn trailing_comma_in_macro_args_is_a_parse_error() {
    let err = parse_document("a = m(x: 1,);", 0, "t.rsd").unwrap_err();
    assert!(matches!(err, RsdError::Parse { .. }));
}

#[test]
fn unterminated_string_is_a_token_error_with_position() {
    let err = parse_document("a = \"unterminated;", 0, "t.rsd").unwrap_err();
    assert!(matches!(err, RsdError::Parse { .. }));
    assert!(err.to_string().starts_with("t.rsd:"));
}

#[test]
fn missing_reference_is_empty_and_placeholder_is_verbatim() {
    let root = parse_document(r#"y = "${missing}";"#, 0, "t.rsd").unwrap();
    assert!(root.find_str("missing").unwrap().is_none());

    let y = root.get_named("y").unwrap();
    let (resolved, ok) = y.resolve().unwrap();
    assert!(!ok);
    assert_eq!(resolved.raw_string().as_deref(), Some("${missing}"));
}

#[test]
fn integer_widens_to_float_exactly() {
    let root = parse_document("i = 42;", 0, "t.rsd").unwrap();
    let i = root.get_named("i").unwrap();
    assert_eq!(i.as_float().unwrap(), 42.0);
}
