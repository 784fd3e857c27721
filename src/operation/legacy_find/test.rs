use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, Bson},
    cmap::StreamDescription,
    coll::{
        options::{CursorType, LegacyFindOptions},
        Namespace,
    },
    operation::{test::handle_response_test, LegacyFind, Operation},
    sdam::ServerType,
    selection_criteria::{ReadPreference, SelectionCriteria},
    test::assert_doc_eq,
    wire::{QueryFlags, WireCommand},
};

fn ns() -> Namespace {
    Namespace::new("test_db", "test_coll")
}

fn description(server_type: ServerType) -> StreamDescription {
    StreamDescription {
        initial_server_type: server_type,
        ..StreamDescription::new_testing()
    }
}

fn wire(op: &mut LegacyFind, description: &StreamDescription) -> WireCommand {
    op.build(description)
        .unwrap()
        .wire_document(description)
        .unwrap()
}

fn options_with_modifiers() -> LegacyFindOptions {
    LegacyFindOptions::builder()
        .comment(Bson::from("funny"))
        .max_time(Duration::from_secs(20))
        .modifiers(doc! { "$comment": "notfunny", "$snapshot": true })
        .projection(doc! { "y": 1 })
        .sort(doc! { "a": 1 })
        .selection_criteria(SelectionCriteria::from(ReadPreference::Secondary {
            options: Default::default(),
        }))
        .build()
}

#[test]
fn wrapped_query_not_mongos() {
    let mut op = LegacyFind::new(ns(), Some(doc! { "x": 1 }), Some(options_with_modifiers()));
    let wire = wire(&mut op, &description(ServerType::RsArbiter));
    assert_doc_eq(
        &wire.document,
        &doc! {
            "$query": { "x": 1 },
            "$orderby": { "a": 1 },
            "$comment": "funny",
            "$maxTimeMS": 20_000_i32,
            "$snapshot": true,
        },
    );
    assert_eq!(wire.flags, QueryFlags::SECONDARY_OK);

    let header = wire.query.unwrap();
    assert_eq!(header.full_collection_name, "test_db.test_coll");
    assert_eq!(header.return_fields_selector, Some(doc! { "y": 1 }));
}

#[test]
fn wrapped_query_mongos() {
    let mut op = LegacyFind::new(ns(), Some(doc! { "x": 1 }), Some(options_with_modifiers()));
    let wire = wire(&mut op, &description(ServerType::Mongos));
    assert_doc_eq(
        &wire.document,
        &doc! {
            "$query": { "x": 1 },
            "$readPreference": { "mode": "secondary" },
            "$orderby": { "a": 1 },
            "$comment": "funny",
            "$maxTimeMS": 20_000_i32,
            "$snapshot": true,
        },
    );
    assert_eq!(wire.flags, QueryFlags::SECONDARY_OK);
}

#[test]
fn unwrapped_without_options() {
    let mut op = LegacyFind::new(ns(), None, None);
    let wire = wire(&mut op, &description(ServerType::Mongos));
    assert_doc_eq(&wire.document, &doc! {});
    assert_eq!(wire.flags, QueryFlags::empty());

    let header = wire.query.unwrap();
    assert_eq!(header.number_to_skip, 0);
    assert_eq!(header.number_to_return, 0);
    assert_eq!(header.return_fields_selector, None);
}

#[test]
fn number_to_return() {
    let cases: [(Option<i64>, Option<u32>, i32); 5] = [
        (Some(-5), Some(10), -5),
        (Some(10), Some(3), 3),
        (Some(2), Some(4), 2),
        (None, Some(4), 4),
        (Some(2), None, 2),
    ];
    for (limit, batch_size, expected) in cases {
        let options = LegacyFindOptions::builder()
            .limit(limit)
            .batch_size(batch_size)
            .skip(7_u64)
            .build();
        let mut op = LegacyFind::new(ns(), None, Some(options));
        let header = wire(&mut op, &StreamDescription::new_testing()).query.unwrap();
        assert_eq!(header.number_to_return, expected, "limit {limit:?}, batch {batch_size:?}");
        assert_eq!(header.number_to_skip, 7);
    }
}

#[test]
fn cursor_flags() {
    let options = LegacyFindOptions::builder()
        .cursor_type(CursorType::TailableAwait)
        .no_cursor_timeout(true)
        .allow_partial_results(true)
        .oplog_replay(false)
        .build();
    let mut op = LegacyFind::new(ns(), None, Some(options));
    let wire = wire(&mut op, &StreamDescription::new_testing());
    assert_eq!(
        wire.flags,
        QueryFlags::TAILABLE_CURSOR
            | QueryFlags::AWAIT_DATA
            | QueryFlags::NO_CURSOR_TIMEOUT
            | QueryFlags::PARTIAL
    );
}

#[test]
fn skip_out_of_range() {
    let options = LegacyFindOptions::builder().skip(u64::MAX).build();
    let mut op = LegacyFind::new(ns(), None, Some(options));
    assert!(op
        .build(&StreamDescription::new_testing())
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
fn handle_response() {
    let op = LegacyFind::new(ns(), None, None);
    let cursor = handle_response_test(
        &op,
        doc! { "ok": 1, "cursorId": 42_i64, "documents": [{ "_id": 1 }, { "_id": 2 }] },
    )
    .unwrap();
    assert_eq!(cursor.id, 42);
    assert_eq!(cursor.ns, ns());
    assert_eq!(cursor.first_batch.len(), 2);
    assert!(!op.supports_sessions());
}

#[test]
fn handle_query_failure() {
    let op = LegacyFind::new(ns(), None, None);
    let error = handle_response_test(
        &op,
        doc! { "ok": 1, "cursorId": 0_i64, "documents": [{ "$err": "bad query", "code": 17 }] },
    )
    .unwrap_err();
    assert_eq!(error.code(), Some(17));
}
