use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, Bson},
    cmap::StreamDescription,
    coll::{
        options::{CountOptions, Hint},
        Namespace,
    },
    collation::Collation,
    concern::ReadConcern,
    feature::ServerVersion,
    operation::{
        test::{self, build_document, handle_response_test},
        Count,
        Operation,
    },
    test::{assert_doc_eq, ns_not_found_error},
};

fn ns() -> Namespace {
    Namespace::new("test_db", "test_coll")
}

#[test]
fn build() {
    let mut count_op = Count::new(ns(), None, None);
    let count_command = count_op
        .build(&StreamDescription::new_testing())
        .expect("error on build");
    assert_doc_eq(&count_command.document().unwrap(), &doc! { "count": "test_coll" });
    assert_eq!(count_command.target_db(), "test_db");
}

#[test]
fn build_with_options() {
    let options = CountOptions::builder()
        .limit(10_u64)
        .skip(5_u64)
        .hint(Hint::Name("a_1".to_string()))
        .collation(Collation::locale("en_US"))
        .max_time(Duration::from_millis(20))
        .read_concern(ReadConcern::majority())
        .build();
    let mut count_op = Count::new(ns(), Some(doc! { "a": 1 }), Some(options));
    let document = build_document(&mut count_op, &StreamDescription::new_testing()).unwrap();
    assert_doc_eq(
        &document,
        &doc! {
            "count": "test_coll",
            "query": { "a": 1 },
            "limit": 10_i64,
            "skip": 5_i64,
            "hint": "a_1",
            "collation": { "locale": "en_US" },
            "maxTimeMS": 20_i32,
            "readConcern": { "level": "majority" },
        },
    );
}

#[test]
fn max_time_rounds_up_to_int32() {
    let options = CountOptions::builder()
        .max_time(Duration::from_micros(1_001))
        .build();
    let mut count_op = Count::new(ns(), None, Some(options));
    let document = build_document(&mut count_op, &StreamDescription::new_testing()).unwrap();
    assert_eq!(document.get("maxTimeMS"), Some(&Bson::Int32(2)));
}

#[test]
fn server_default_read_concern_omitted() {
    let options = CountOptions::builder()
        .read_concern(ReadConcern::server_default())
        .build();
    let mut count_op = Count::new(ns(), None, Some(options));
    let document = build_document(&mut count_op, &StreamDescription::new_testing()).unwrap();
    assert!(!document.contains_key("readConcern"));
}

#[test]
fn collation_unsupported() {
    let options = CountOptions::builder()
        .collation(Collation::locale("en_US"))
        .build();
    let mut count_op = Count::new(ns(), None, Some(options.clone()));
    let description = StreamDescription::with_server_version(ServerVersion::new(3, 2, 0));
    assert!(count_op.build(&description).unwrap_err().is_unsupported_feature());

    let mut count_op = Count::new(ns(), None, Some(options));
    let description = StreamDescription::with_server_version(ServerVersion::new(3, 4, 0));
    assert!(count_op.build(&description).is_ok());
}

#[test]
fn read_concern_unsupported() {
    let options = CountOptions::builder()
        .read_concern(ReadConcern::local())
        .build();
    let mut count_op = Count::new(ns(), None, Some(options));
    let description = StreamDescription::with_server_version(ServerVersion::new(3, 0, 0));
    assert!(count_op.build(&description).unwrap_err().is_unsupported_feature());
}

#[test]
fn empty_namespace_rejected() {
    let mut count_op = Count::empty();
    assert!(count_op
        .build(&StreamDescription::new_testing())
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
fn op_selection_criteria() {
    test::op_selection_criteria(|selection_criteria| {
        let options = CountOptions::builder()
            .selection_criteria(selection_criteria)
            .build();
        Count::new(ns(), None, Some(options))
    });
}

#[test]
fn handle_success() {
    let count_op = Count::empty();

    let n = 26;
    let response = doc! { "ok": 1.0, "n": n };

    let actual_values = handle_response_test(&count_op, response).unwrap();
    assert_eq!(actual_values, 26);
}

#[test]
fn handle_response_no_n() {
    let count_op = Count::empty();
    handle_response_test(&count_op, doc! { "ok": 1.0 }).unwrap_err();
}

#[test]
fn ns_not_found_is_zero() {
    let count_op = Count::empty();
    let error = ns_not_found_error();
    assert_eq!(count_op.handle_error(error).unwrap(), 0);
}
