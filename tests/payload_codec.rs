// tests/payload_codec.rs

use proptest::prelude::*;
use serde_json::{json, Value};

use wiqrunner::errors::WorkerError;
use wiqrunner::payload::{self, Payload};

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("JSON numbers are finite", |f| f.is_finite())
            .prop_map(Value::from),
        ".{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            proptest::collection::btree_map(".{0,8}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn json_payload() -> impl Strategy<Value = Payload> {
    proptest::collection::btree_map(".{0,8}", json_value(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    #[test]
    fn decode_encode_round_trip(doc in json_payload()) {
        let raw = payload::encode(&doc).unwrap();
        let back = payload::decode(&raw).unwrap();
        prop_assert_eq!(back, doc);
    }
}

#[test]
fn decodes_a_json_object() {
    let doc = payload::decode(r#"{"url":"http://x","count":3,"tags":["a"]}"#).unwrap();
    assert_eq!(doc.get("url"), Some(&json!("http://x")));
    assert_eq!(doc.get("count"), Some(&json!(3)));
    assert_eq!(doc.get("tags"), Some(&json!(["a"])));
}

#[test]
fn empty_payload_decodes_to_empty_document() {
    assert!(payload::decode("").unwrap().is_empty());
    assert!(payload::decode("  \n").unwrap().is_empty());
}

#[test]
fn invalid_syntax_is_malformed() {
    match payload::decode("{\"url\": ") {
        Err(WorkerError::MalformedPayload(_)) => {}
        other => panic!("expected MalformedPayload, got {other:?}"),
    }
}

#[test]
fn non_object_documents_are_malformed() {
    for raw in ["[1,2,3]", "\"text\"", "42", "null", "true"] {
        match payload::decode(raw) {
            Err(WorkerError::MalformedPayload(msg)) => assert!(msg.contains("expected a JSON object")),
            other => panic!("expected MalformedPayload for {raw}, got {other:?}"),
        }
    }
}

#[test]
fn string_fields_must_be_strings() {
    let doc = payload::decode(r#"{"url":"http://x","port":8080,"none":null}"#).unwrap();
    assert_eq!(payload::string_field(&doc, "url").unwrap(), Some("http://x"));
    assert_eq!(payload::string_field(&doc, "missing").unwrap(), None);
    for key in ["port", "none"] {
        match payload::string_field(&doc, key) {
            Err(WorkerError::MalformedPayload(msg)) => {
                assert!(msg.starts_with(&format!("{key} must be a string")))
            }
            other => panic!("expected MalformedPayload for {key}, got {other:?}"),
        }
    }
}
