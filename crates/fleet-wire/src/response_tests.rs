use super::*;

#[test]
fn ok_has_no_extra_fields() {
    assert_eq!(ok(), json!({ "ok": true }));
}

#[test]
fn ok_with_merges_object_fields() {
    let resp = ok_with(json!({ "status": "not_found" }));
    assert_eq!(resp, json!({ "ok": true, "status": "not_found" }));
}

#[test]
fn err_sets_ok_false_and_error_message() {
    assert_eq!(err("bad request"), json!({ "ok": false, "error": "bad request" }));
}

#[test]
fn coerce_null_becomes_literal_ok_string() {
    assert_eq!(coerce(Value::Null), Value::String("ok".to_string()));
}

#[test]
fn coerce_passes_through_non_null() {
    let v = json!({ "ok": true });
    assert_eq!(coerce(v.clone()), v);
}
