//! Property-based tests for the type codec and envelopes.

use chrono::NaiveDate;
use proptest::collection::vec;
use proptest::prelude::*;
use xrow_core::{codec, envelope, xml, MethodCall, MethodResponse, Struct, Value};

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-2_147_483_647i64..2_147_483_647).prop_map(Value::Integer),
        any::<f64>()
            .prop_filter("finite", |d| d.is_finite())
            .prop_map(Value::Double),
        // leading and trailing whitespace is trimmed on decode
        "[a-zA-Z0-9<>&;'\"]{0,16}".prop_map(Value::String),
        vec(any::<u8>(), 0..32).prop_map(Value::Binary),
        (1900i32..2100, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_filter_map(
            "valid timestamp",
            |(y, mo, d, h, mi, s)| {
                NaiveDate::from_ymd_opt(y, mo, d)
                    .and_then(|date| date.and_hms_opt(h, mi, s))
                    .map(Value::DateTime)
            }
        ),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 48, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Value::Array),
            vec(("[a-zA-Z_]{1,8}", inner), 0..4)
                .prop_map(|members| Value::Struct(members.into_iter().collect::<Struct>())),
        ]
    })
}

fn round_trip(value: &Value) -> Value {
    let element = codec::encode_value(value).expect("test: encodable");
    let bytes = xml::write_document(&element, false).expect("test: writable");
    let parsed = xml::parse_document(&bytes).expect("test: parsable");
    codec::decode(&parsed).expect("test: decodable")
}

proptest! {
    /// Every generated value survives encode, serialize, parse and decode.
    #[test]
    fn values_round_trip(value in value()) {
        prop_assert_eq!(round_trip(&value), value);
    }

    /// Integers keep their type only strictly inside the i4 window.
    #[test]
    fn integer_window(n in any::<i64>()) {
        let element = codec::encode(&Value::Integer(n)).expect("test: encodable");
        let inside = -2_147_483_648 < n && n < 2_147_483_647;
        prop_assert_eq!(element.name() == "i4", inside);

        let expected = if inside { Value::Integer(n) } else { Value::Double(n as f64) };
        prop_assert_eq!(round_trip(&Value::Integer(n)), expected);
    }

    /// Struct member order is preserved exactly.
    #[test]
    fn struct_order_preserved(names in proptest::sample::subsequence(
        vec!["alpha", "beta", "gamma", "delta", "epsilon", "zeta"], 0..6
    ).prop_shuffle()) {
        let members: Struct = names.iter().enumerate().map(|(i, n)| (*n, i as i64)).collect();
        let decoded = round_trip(&Value::Struct(members));
        let order: Vec<&str> = decoded.as_struct().expect("test: struct").keys().collect();
        prop_assert_eq!(order, names);
    }

    /// Calls with any arguments survive the request envelope.
    #[test]
    fn calls_round_trip(method in "[a-z][a-z0-9_.]{0,24}", params in vec(value(), 0..4)) {
        let call = MethodCall::new(method, params);
        let bytes = envelope::encode_call(&call).expect("test: encodable");
        let decoded = envelope::decode_call(&bytes, Some("text/xml")).expect("test: decodable");
        prop_assert_eq!(decoded, call);
    }

    /// Responses survive the response envelope, pretty-printed or not.
    #[test]
    fn responses_round_trip(value in value(), code in any::<i32>(), pretty in any::<bool>()) {
        for response in [
            MethodResponse::Success(value.clone()),
            MethodResponse::fault(code, "failure"),
        ] {
            let bytes = envelope::encode_response(&response, pretty).expect("test: encodable");
            prop_assert_eq!(envelope::decode_response(&bytes).expect("test: decodable"), response);
        }
    }

    /// Arbitrary bodies never panic the request decoder.
    #[test]
    fn no_panic_on_arbitrary_body(input in "\\PC{0,256}") {
        let _ = envelope::decode_call(input.as_bytes(), Some("text/xml"));
    }

    /// Arbitrary bytes wrapped in a call never panic the decoder either.
    #[test]
    fn no_panic_on_arbitrary_value_text(text in "\\PC{0,64}", tag in prop_oneof![
        Just("i4"), Just("double"), Just("boolean"), Just("base64"),
        Just("dateTime.iso8601"), Just("string"), Just("unknown"),
    ]) {
        let body = format!(
            "<methodCall><methodName>m</methodName><params><param><value><{tag}>{text}</{tag}></value></param></params></methodCall>"
        );
        let _ = envelope::decode_call(body.as_bytes(), Some("text/xml"));
    }
}
