//! Stream decoder vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use tapedeck_core::protocol::decode_all;

use vector_loader::TestVector;

fn load(name: &str) -> TestVector {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

#[test]
fn decoder_vectors() {
    let files = [
        "ordered_with_timestamps.json",
        "out_of_order_skipped.json",
        "unknown_type_error.json",
        "url_based_attribute.json",
        "truncated_tail.json",
        "start_time_supplied.json",
        "tree_mutations.json",
    ];

    for f in files {
        let v = load(f);
        let raw = v.frame.decode();
        let report = decode_all(raw, v.start_time);

        let got = serde_json::to_value(&report.messages).unwrap();
        assert_eq!(got, v.expect.messages, "vector={}", v.description);
        assert_eq!(report.skipped, v.expect.skipped, "vector={}", v.description);
        assert_eq!(report.error, v.expect.error, "vector={}", v.description);
        assert_eq!(report.truncated, v.expect.truncated, "vector={}", v.description);
    }
}
