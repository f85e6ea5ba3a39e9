//! End-to-end tests for the codec

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::thread;

use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;

use crate::*;
use crate::{impl_record_codec, record};

#[derive(Debug, Default, Clone, PartialEq)]
struct User {
    id: i32,
    name: String,
    age: i32,
}

record!(User { id, name, age });

#[derive(Debug, Default, Clone, PartialEq)]
struct Address {
    street: String,
    zip: Option<String>,
}

record!(Address { street, zip });

#[derive(Debug, Default, Clone, PartialEq)]
struct Profile {
    user: User,
    address: Option<Address>,
    emails: Vec<String>,
    scores: BTreeMap<String, f64>,
    created: Option<DateTime<Utc>>,
    avatar: Bytes,
    ratio: f32,
    flags: [bool; 2],
    nickname: Option<String>,
}

record!(Profile {
    user,
    address,
    emails,
    scores,
    created,
    avatar,
    ratio,
    flags,
    nickname as "nickName",
});

#[derive(Debug, Default, PartialEq)]
struct Account {
    id: u64,
    email: String,
    tags: Vec<String>,
}

impl Record for Account {
    const NAME: &'static str = "Account";

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::<Account>::new("id", |a| &a.id, |a| &mut a.id).required(),
            FieldDescriptor::<Account>::new("email", |a| &a.email, |a| &mut a.email).required(),
            FieldDescriptor::<Account>::new("tags", |a| &a.tags, |a| &mut a.tags),
        ]
    }
}

impl_record_codec!(Account);

#[derive(Debug, Default)]
struct Node {
    name: String,
    next: Option<Rc<RefCell<Node>>>,
}

record!(Node { name, next });

#[derive(Debug, Default, PartialEq)]
struct Leaf {
    value: i32,
}

record!(Leaf { value });

#[derive(Debug, Default)]
struct Pair {
    left: Rc<Leaf>,
    right: Rc<Leaf>,
}

record!(Pair { left, right });

fn sample_user() -> User {
    User {
        id: 1,
        name: "测试用户".to_string(),
        age: 30,
    }
}

fn sample_profile() -> Profile {
    let mut scores = BTreeMap::new();
    scores.insert("math".to_string(), 92.5);
    scores.insert("art".to_string(), 71.0);

    Profile {
        user: sample_user(),
        address: Some(Address {
            street: "1 Main St".to_string(),
            zip: None,
        }),
        emails: vec!["a@example.com".to_string(), "b@example.com".to_string()],
        scores,
        created: DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        avatar: Bytes::from(vec![0u8, 1, 2, 254, 255]),
        ratio: 0.25,
        flags: [true, false],
        nickname: None,
    }
}

// ============================================================
// User scenario
// ============================================================

#[test]
fn test_user_to_json_text() {
    let text = to_json_text(&sample_user()).unwrap();
    assert_eq!(text, r#"{"id":1,"name":"测试用户","age":30}"#);
}

#[test]
fn test_user_from_json_text() {
    let text = r#"{"id":1,"name":"测试用户","age":30}"#;
    let user: User = from_json_text(text).unwrap();
    assert_eq!(user, sample_user());
    assert_eq!(user.name, "测试用户");
}

#[test]
fn test_user_escaped_unicode() {
    let codec = Codec::new(CodecOptions::default().with_escape_unicode(true)).unwrap();
    let text = codec.to_json_text(&sample_user()).unwrap();
    assert!(text.is_ascii());

    let user: User = codec.from_json_text(&text).unwrap();
    assert_eq!(user, sample_user());
}

#[test]
fn test_schemaless_object() {
    let mut object = Map::new();
    object.insert("key", "value");
    assert_eq!(object.to_json_string(), r#"{"key":"value"}"#);
    assert_eq!(to_json_text(&object).unwrap(), r#"{"key":"value"}"#);
}

// ============================================================
// Round-trips
// ============================================================

#[test]
fn test_record_roundtrip_with_nulls() {
    let codec = Codec::new(CodecOptions::default().with_include_nulls(true)).unwrap();
    let profile = sample_profile();

    let text = codec.to_json_text(&profile).unwrap();
    let restored: Profile = codec.from_json_text(&text).unwrap();
    assert_eq!(restored, profile);
}

#[test]
fn test_record_roundtrip_default_options() {
    let profile = sample_profile();
    let text = to_json_text_pretty(&profile).unwrap();
    let restored: Profile = from_json_text(&text).unwrap();
    assert_eq!(restored, profile);
}

#[test]
fn test_nulls_omitted_by_default() {
    let value = to_value(&sample_profile()).unwrap();
    let map = value.as_object().unwrap();

    assert!(!map.contains_key("nickName"));
    assert!(!map.contains_key("nickname"));
    assert_eq!(value.get("address").and_then(|a| a.get("zip")), None);

    let keys: Vec<_> = map.keys().collect();
    assert_eq!(
        keys,
        vec!["user", "address", "emails", "scores", "created", "avatar", "ratio", "flags"]
    );
}

#[test]
fn test_nulls_included_on_request() {
    let codec = Codec::new(CodecOptions::default().with_include_nulls(true)).unwrap();
    let value = codec.to_value(&sample_profile()).unwrap();
    assert_eq!(value.get("nickName"), Some(&Value::Null));
    assert_eq!(value.get("address").and_then(|a| a.get("zip")), Some(&Value::Null));
}

#[test]
fn test_profile_wire_format() {
    let value = to_value(&sample_profile()).unwrap();
    assert_eq!(value.get("created").and_then(Value::as_str), Some("2024-01-02T03:04:05Z"));
    assert_eq!(value.get("avatar").and_then(Value::as_str), Some("AAEC/v8="));
    assert_eq!(value.get("ratio"), Some(&Value::Float(0.25)));
    assert_eq!(
        render(value.get("scores").unwrap()),
        r#"{"art":71,"math":92.5}"#
    );
}

#[test]
fn test_value_idempotence() {
    let mut inner = Map::new();
    inner.insert("quote\"key", Value::string("tab\there"));
    inner.insert("emoji", Value::string("\u{1F600}"));
    let mut map = Map::new();
    map.insert("ints", Value::array(vec![Value::Int(i64::MIN), Value::Int(0)]));
    map.insert(
        "floats",
        Value::array(vec![
            Value::Float(1.5),
            Value::Float(-2.0),
            Value::Float(1e-9),
            Value::Float(6.02e23),
            Value::Float(f64::MAX),
        ]),
    );
    map.insert("nested", inner);
    map.insert("flags", Value::array(vec![Value::Bool(true), Value::Null]));
    let value = Value::Object(map);

    for opts in [
        CodecOptions::default(),
        CodecOptions::pretty(),
        CodecOptions::default().with_escape_unicode(true),
    ] {
        let text = render_with(&value, &opts);
        assert_eq!(parse(&text).unwrap(), value, "failed for {text}");
    }
}

// ============================================================
// Binding policies
// ============================================================

#[test]
fn test_unknown_fields_ignored() {
    let text = r#"{"id": 5, "extra": {"deep": [1, 2]}, "name": "n", "age": 9}"#;
    let user: User = from_json_text(text).unwrap();
    assert_eq!(
        user,
        User {
            id: 5,
            name: "n".into(),
            age: 9
        }
    );
}

#[test]
fn test_unknown_fields_rejected_in_strict_mode() {
    let codec = Codec::new(CodecOptions::strict()).unwrap();
    let err = codec
        .from_json_text::<User>(r#"{"id": 5, "extra": true}"#)
        .unwrap_err();
    match err {
        Error::Binding(BindingError::UnknownField {
            path,
            field,
            type_name,
        }) => {
            assert_eq!(path, "$");
            assert_eq!(field, "extra");
            assert_eq!(type_name, "User");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_fields_keep_defaults() {
    let user: User = from_json_text(r#"{"name": "only"}"#).unwrap();
    assert_eq!(
        user,
        User {
            id: 0,
            name: "only".into(),
            age: 0
        }
    );
}

#[test]
fn test_missing_required_field() {
    let err = from_json_text::<Account>(r#"{"id": 3, "tags": ["x"]}"#).unwrap_err();
    assert!(matches!(
        err,
        Error::Binding(BindingError::MissingRequiredField {
            field: "email",
            type_name: "Account",
            ..
        })
    ));

    let account: Account = from_json_text(r#"{"email": "e@x", "id": "3"}"#).unwrap();
    assert_eq!(
        account,
        Account {
            id: 3,
            email: "e@x".into(),
            tags: vec![]
        }
    );
}

#[test]
fn test_type_mismatch_reports_path() {
    let err = from_json_text::<Profile>(r#"{"address": {"street": true}}"#).unwrap_err();
    match err {
        Error::Binding(e @ BindingError::TypeMismatch { .. }) => {
            assert_eq!(e.path(), "$.address.street");
            assert_eq!(
                e.to_string(),
                "type mismatch at $.address.street: expected string, got bool"
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = from_json_text::<User>("[1, 2]").unwrap_err();
    assert!(matches!(
        err,
        Error::Binding(BindingError::TypeMismatch { actual: "array", .. })
    ));
}

#[test]
fn test_numeric_string_field_coerced() {
    let user: User = from_json_text(r#"{"id": "7", "age": 30.0}"#).unwrap();
    assert_eq!(user.id, 7);
    assert_eq!(user.age, 30);

    assert!(from_json_text::<User>(r#"{"age": "thirty"}"#).is_err());
    assert!(from_json_text::<User>(r#"{"age": true}"#).is_err());
}

#[test]
fn test_large_integers_never_bind_inexactly() {
    assert!(matches!(
        from_json_text::<i128>("1e300"),
        Err(Error::Binding(BindingError::OutOfRange { target: "i128", .. }))
    ));
    assert!(matches!(
        from_json_text::<u128>("1e39"),
        Err(Error::Binding(BindingError::OutOfRange { target: "u128", .. }))
    ));
    assert!(matches!(
        from_json_text::<u64>("10000000000000000001"),
        Err(Error::Binding(BindingError::OutOfRange { .. }))
    ));

    let account: Account = from_json_text(r#"{"id": 9007199254740991, "email": "e"}"#).unwrap();
    assert_eq!(account.id, 9_007_199_254_740_991);
}

#[test]
fn test_fixed_size_length_mismatch() {
    let err = from_json_text::<Profile>(r#"{"flags": [true]}"#).unwrap_err();
    assert!(matches!(
        err,
        Error::Binding(BindingError::LengthMismatch {
            expected: 2,
            actual: 1,
            ..
        })
    ));
}

// ============================================================
// Cycles and sharing
// ============================================================

#[test]
fn test_cycle_detected() {
    let a = Rc::new(RefCell::new(Node {
        name: "a".into(),
        next: None,
    }));
    let b = Rc::new(RefCell::new(Node {
        name: "b".into(),
        next: Some(Rc::clone(&a)),
    }));
    a.borrow_mut().next = Some(Rc::clone(&b));

    let err = to_json_text(&a).unwrap_err();
    match err {
        Error::Encoding(EncodingError::CyclicReference { path, type_name }) => {
            assert_eq!(path, "$.next.next");
            assert_eq!(type_name, "Node");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Break the cycle so both nodes are freed
    a.borrow_mut().next = None;
}

#[test]
fn test_self_reference_detected() {
    let node = Rc::new(RefCell::new(Node::default()));
    node.borrow_mut().next = Some(Rc::clone(&node));

    assert!(matches!(
        to_value(&node),
        Err(EncodingError::CyclicReference { .. })
    ));
    node.borrow_mut().next = None;
}

#[test]
fn test_acyclic_chain_encodes() {
    let tail = Rc::new(RefCell::new(Node {
        name: "tail".into(),
        next: None,
    }));
    let head = Node {
        name: "head".into(),
        next: Some(tail),
    };
    assert_eq!(
        to_json_text(&head).unwrap(),
        r#"{"name":"head","next":{"name":"tail"}}"#
    );

    let restored: Node = from_json_text(r#"{"name":"head","next":{"name":"tail"}}"#).unwrap();
    let next = restored.next.unwrap();
    assert_eq!(next.borrow().name, "tail");
}

#[test]
fn test_shared_reference_is_not_a_cycle() {
    let leaf = Rc::new(Leaf { value: 4 });
    let pair = Pair {
        left: Rc::clone(&leaf),
        right: leaf,
    };
    assert_eq!(
        to_json_text(&pair).unwrap(),
        r#"{"left":{"value":4},"right":{"value":4}}"#
    );
}

// ============================================================
// Parser errors through the facade
// ============================================================

#[test]
fn test_malformed_input() {
    assert!(matches!(
        from_json_text::<Value>(r#"{"a": }"#),
        Err(Error::Parse(ParseError::UnexpectedToken { offset: 6, .. }))
    ));
    assert!(matches!(
        from_json_text::<Value>("[1,2,"),
        Err(Error::Parse(ParseError::UnexpectedEnd { .. }))
    ));
    assert!(matches!(
        from_json_text::<Value>("tru"),
        Err(Error::Parse(ParseError::UnexpectedToken { .. }))
    ));
    assert!(matches!(
        from_json_text::<User>(r#"{"id": 1} {}"#),
        Err(Error::Parse(ParseError::TrailingContent { offset: 10 }))
    ));
}

#[test]
fn test_nesting_guard_through_facade() {
    let deep = format!("{}{}", "[".repeat(600), "]".repeat(600));
    assert!(matches!(
        from_json_text::<Value>(&deep),
        Err(Error::Parse(ParseError::NestingTooDeep { max_depth: 512, .. }))
    ));

    let codec = Codec::new(CodecOptions::default().with_max_nesting_depth(1000)).unwrap();
    assert!(codec.from_json_text::<Value>(&deep).is_ok());
}

#[test]
fn test_from_slice() {
    let user: User = from_slice(br#"{"id": 2, "name": "b", "age": 3}"#).unwrap();
    assert_eq!(user.id, 2);
    assert!(matches!(
        from_slice::<User>(b"{\"name\": \"\xc3\x28\"}"),
        Err(Error::Parse(ParseError::InvalidUtf8 { offset: 10 }))
    ));
}

// ============================================================
// Concurrency
// ============================================================

#[test]
fn test_concurrent_codec_calls() {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let user = User {
                    id: i,
                    name: format!("user-{i}"),
                    age: 20 + i,
                };
                let text = to_json_text(&user).unwrap();
                let back: User = from_json_text(&text).unwrap();
                (user, back)
            })
        })
        .collect();

    for handle in handles {
        let (user, back) = handle.join().unwrap();
        assert_eq!(user, back);
    }
}

#[test]
fn test_options_from_config_document() {
    let opts = CodecOptions::from_json_str(
        r#"{"includeNulls": true, "strictFieldMatching": true, "dateFormat": "%Y-%m-%d %H:%M:%S"}"#,
    )
    .unwrap();
    let codec = Codec::new(opts).unwrap();

    let value = codec.to_value(&sample_profile()).unwrap();
    assert_eq!(value.get("created").and_then(Value::as_str), Some("2024-01-02 03:04:05"));

    let text = codec.render(&value);
    let restored: Profile = codec.from_json_text(&text).unwrap();
    assert_eq!(restored, sample_profile());
}
