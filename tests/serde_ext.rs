use std::collections::BTreeMap;

use proptest::prelude::*;

use trendloom::serde_ext::{RichValue, parse, stringify};

fn obj(entries: Vec<(&str, RichValue)>) -> RichValue {
    RichValue::Object(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[test]
fn plain_json_round_trips() {
    let value = obj(vec![
        ("name", RichValue::Text("trendloom".into())),
        ("count", RichValue::Number(42.into())),
        (
            "tags",
            RichValue::List(vec![RichValue::Text("a".into()), RichValue::Null]),
        ),
    ]);
    let text = stringify(&value).unwrap();
    assert_eq!(parse(&text).unwrap(), value);
}

#[test]
fn map_set_bytes_round_trip_recursively() {
    let value = obj(vec![
        (
            "channel_versions",
            RichValue::Map(vec![
                (
                    RichValue::Text("trends".into()),
                    RichValue::Number(3.into()),
                ),
                // Non-string keys survive the round trip.
                (
                    RichValue::Number(7.into()),
                    RichValue::Set(vec![RichValue::Text("seen".into())]),
                ),
            ]),
        ),
        ("digest", RichValue::Bytes(vec![0, 1, 254, 255])),
        (
            "nested",
            RichValue::List(vec![RichValue::Map(vec![(
                RichValue::Bytes(vec![9]),
                RichValue::Null,
            )])]),
        ),
    ]);
    let text = stringify(&value).unwrap();
    assert_eq!(parse(&text).unwrap(), value);
}

#[test]
fn wrapper_encoding_is_the_tagged_object_shape() {
    let text = stringify(&RichValue::Bytes(vec![1, 2])).unwrap();
    assert_eq!(text, r#"{"__type":"Bytes","value":[1,2]}"#);

    let text = stringify(&RichValue::Map(vec![(
        RichValue::Text("k".into()),
        RichValue::Number(1.into()),
    )]))
    .unwrap();
    assert_eq!(text, r#"{"__type":"Map","value":[["k",1]]}"#);
}

#[test]
fn double_round_trip_is_stable() {
    let value = RichValue::Set(vec![
        RichValue::Bytes(vec![3, 4]),
        RichValue::Text("x".into()),
    ]);
    let once = stringify(&value).unwrap();
    let twice = stringify(&parse(&once).unwrap()).unwrap();
    assert_eq!(once, twice);
}

fn arb_rich_value() -> impl Strategy<Value = RichValue> {
    let leaf = prop_oneof![
        Just(RichValue::Null),
        any::<bool>().prop_map(RichValue::Bool),
        any::<i64>().prop_map(|n| RichValue::Number(n.into())),
        "[a-z0-9 ]{0,12}".prop_map(RichValue::Text),
        proptest::collection::vec(any::<u8>(), 0..16).prop_map(RichValue::Bytes),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(RichValue::List),
            proptest::collection::btree_map("[a-z]{1,6}", inner.clone(), 0..4)
                .prop_map(RichValue::Object),
            proptest::collection::vec((inner.clone(), inner.clone()), 0..4)
                .prop_map(RichValue::Map),
            proptest::collection::vec(inner, 0..4).prop_map(RichValue::Set),
        ]
    })
}

proptest! {
    #[test]
    fn round_trip_holds_for_arbitrary_values(value in arb_rich_value()) {
        let text = stringify(&value).unwrap();
        prop_assert_eq!(parse(&text).unwrap(), value);
    }
}
