use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, Bson},
    cmap::StreamDescription,
    coll::{
        options::{CursorType, FindOptions, Hint},
        Namespace,
    },
    collation::Collation,
    concern::ReadConcern,
    feature::ServerVersion,
    operation::{
        test::{self, build_document, handle_response_test},
        Find,
    },
    test::assert_doc_eq,
};

fn ns() -> Namespace {
    Namespace::new("test_db", "test_coll")
}

fn build_with(options: FindOptions) -> bson::Document {
    let mut op = Find::new(ns(), Some(doc! { "x": 1 }), Some(options));
    build_document(&mut op, &StreamDescription::new_testing()).unwrap()
}

#[test]
fn build() {
    let mut op = Find::new(ns(), None, None);
    let document = build_document(&mut op, &StreamDescription::new_testing()).unwrap();
    assert_doc_eq(&document, &doc! { "find": "test_coll" });
}

#[test]
fn build_field_order() {
    let options = FindOptions::builder()
        .sort(doc! { "y": -1 })
        .projection(doc! { "_id": 0 })
        .hint(Hint::Name("x_1".to_string()))
        .skip(2_u64)
        .limit(5_i64)
        .batch_size(3_u32)
        .comment(Bson::from("hello"))
        .max_time(Duration::from_millis(50))
        .min(doc! { "x": 0 })
        .max(doc! { "x": 10 })
        .return_key(false)
        .show_record_id(true)
        .cursor_type(CursorType::TailableAwait)
        .oplog_replay(true)
        .no_cursor_timeout(true)
        .allow_partial_results(true)
        .collation(Collation::locale("en"))
        .read_concern(ReadConcern::majority())
        .build();
    assert_doc_eq(
        &build_with(options),
        &doc! {
            "find": "test_coll",
            "filter": { "x": 1 },
            "sort": { "y": -1 },
            "projection": { "_id": 0 },
            "hint": "x_1",
            "skip": 2_i64,
            "limit": 5_i64,
            "batchSize": 3_i64,
            "comment": "hello",
            "maxTimeMS": 50_i32,
            "min": { "x": 0 },
            "max": { "x": 10 },
            "returnKey": false,
            "showRecordId": true,
            "tailable": true,
            "oplogReplay": true,
            "noCursorTimeout": true,
            "awaitData": true,
            "allowPartialResults": true,
            "collation": { "locale": "en" },
            "readConcern": { "level": "majority" },
        },
    );
}

#[test]
fn negative_limit_is_single_batch() {
    let document = build_with(FindOptions::builder().limit(-4_i64).build());
    assert_eq!(document.get("limit"), Some(&Bson::Int64(4)));
    assert_eq!(document.get("singleBatch"), Some(&Bson::Boolean(true)));
}

#[test]
fn unrepresentable_negative_limit_rejected() {
    let options = FindOptions::builder().limit(i64::MIN).build();
    let mut op = Find::new(ns(), None, Some(options));
    assert!(build_document(&mut op, &StreamDescription::new_testing())
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
fn zero_limit_omitted() {
    let document = build_with(FindOptions::builder().limit(0_i64).build());
    assert!(!document.contains_key("limit"));
    assert!(!document.contains_key("singleBatch"));
}

#[test]
fn batch_size_equal_to_limit() {
    let document = build_with(FindOptions::builder().limit(10_i64).batch_size(10_u32).build());
    assert_eq!(document.get("batchSize"), Some(&Bson::Int64(11)));

    let mut op = Find::new(
        ns(),
        None,
        Some(FindOptions::builder().batch_size(u32::MAX).build()),
    );
    assert!(build_document(&mut op, &StreamDescription::new_testing())
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
fn tailable_without_await() {
    let document = build_with(FindOptions::builder().cursor_type(CursorType::Tailable).build());
    assert_eq!(document.get("tailable"), Some(&Bson::Boolean(true)));
    assert!(!document.contains_key("awaitData"));
}

#[test]
fn allow_disk_use_gated() {
    let options = FindOptions::builder().allow_disk_use(true).build();

    let mut op = Find::new(ns(), None, Some(options.clone()));
    let description = StreamDescription::with_server_version(ServerVersion::new(4, 2, 0));
    assert!(build_document(&mut op, &description)
        .unwrap_err()
        .is_unsupported_feature());

    let mut op = Find::new(ns(), None, Some(options));
    let description = StreamDescription::with_server_version(ServerVersion::new(4, 4, 0));
    let document = build_document(&mut op, &description).unwrap();
    assert_eq!(document.get("allowDiskUse"), Some(&Bson::Boolean(true)));
}

#[test]
fn op_selection_criteria() {
    test::op_selection_criteria(|selection_criteria| {
        let options = FindOptions::builder()
            .selection_criteria(selection_criteria)
            .build();
        Find::new(ns(), None, Some(options))
    });
}

#[test]
fn handle_response() {
    let op = Find::new(ns(), None, None);
    let response = doc! {
        "ok": 1,
        "cursor": {
            "id": 123_i64,
            "ns": "test_db.test_coll",
            "firstBatch": [{ "_id": 1 }, { "_id": 2 }],
        },
    };
    let cursor = handle_response_test(&op, response).unwrap();
    assert_eq!(cursor.id, 123);
    assert_eq!(cursor.ns, ns());
    assert_eq!(cursor.first_batch.len(), 2);
    assert_eq!(cursor.post_batch_resume_token, None);
}

#[test]
fn handle_invalid_response() {
    let op = Find::new(ns(), None, None);
    handle_response_test(&op, doc! { "ok": 1, "cursor": { "id": 1_i64 } }).unwrap_err();
}
