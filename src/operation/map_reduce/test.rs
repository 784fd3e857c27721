use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, Bson},
    cmap::StreamDescription,
    coll::{
        options::{MapReduceOptions, MapReduceOutput, MapReduceOutputAction},
        Namespace,
    },
    collation::Collation,
    concern::{ReadConcern, WriteConcern},
    operation::{
        test::{self, build_document, handle_response_test},
        MapReduce,
        MapReduceOutputToCollection,
    },
    test::assert_doc_eq,
};

const MAP: &str = "function() { emit(this.x, 1); }";
const REDUCE: &str = "function(k, v) { return Array.sum(v); }";

fn ns() -> Namespace {
    Namespace::new("test_db", "test_coll")
}

fn js(code: &str) -> Bson {
    Bson::JavaScriptCode(code.to_string())
}

#[test]
fn build_inline() {
    let options = MapReduceOptions::builder()
        .query(doc! { "x": { "$gt": 0 } })
        .finalize("function(k, v) { return v; }".to_string())
        .js_mode(false)
        .limit(100_u64)
        .max_time(Duration::from_millis(500))
        .scope(doc! { "y": 1 })
        .sort(doc! { "x": 1 })
        .verbose(true)
        .collation(Collation::locale("en"))
        .read_concern(ReadConcern::local())
        .build();
    let mut op = MapReduce::new(ns(), MAP, REDUCE, Some(options));
    let document = build_document(&mut op, &StreamDescription::new_testing()).unwrap();
    assert_doc_eq(
        &document,
        &doc! {
            "mapreduce": "test_coll",
            "map": js(MAP),
            "reduce": js(REDUCE),
            "out": { "inline": 1 },
            "query": { "x": { "$gt": 0 } },
            "finalize": js("function(k, v) { return v; }"),
            "jsMode": false,
            "limit": 100_i64,
            "maxTimeMS": 500_i32,
            "scope": { "y": 1 },
            "sort": { "x": 1 },
            "verbose": true,
            "collation": { "locale": "en" },
            "readConcern": { "level": "local" },
        },
    );
}

#[test]
fn build_output_to_collection() {
    let output = MapReduceOutput::builder()
        .action(MapReduceOutputAction::Merge)
        .collection("results".to_string())
        .database("other".to_string())
        .non_atomic(true)
        .build();
    let options = MapReduceOptions::builder()
        .bypass_document_validation(true)
        .write_concern(WriteConcern::majority())
        .read_concern(ReadConcern::majority())
        .build();
    let mut op = MapReduceOutputToCollection::new(ns(), MAP, REDUCE, output, Some(options));
    let document = build_document(&mut op, &StreamDescription::new_testing()).unwrap();
    assert_doc_eq(
        &document,
        &doc! {
            "mapreduce": "test_coll",
            "map": js(MAP),
            "reduce": js(REDUCE),
            "out": { "merge": "results", "db": "other", "nonAtomic": true },
            "bypassDocumentValidation": true,
            "writeConcern": { "w": "majority" },
        },
    );
}

#[test]
fn empty_functions_rejected() {
    let mut op = MapReduce::new(ns(), "", REDUCE, None);
    assert!(build_document(&mut op, &StreamDescription::new_testing())
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
fn op_selection_criteria() {
    test::op_selection_criteria(|selection_criteria| {
        let options = MapReduceOptions::builder()
            .selection_criteria(selection_criteria)
            .build();
        MapReduce::new(ns(), MAP, REDUCE, Some(options))
    });
}

#[test]
fn handle_inline_response() {
    let op = MapReduce::new(ns(), MAP, REDUCE, None);
    let results = handle_response_test(
        &op,
        doc! { "ok": 1, "results": [{ "_id": 1, "value": 3 }, { "_id": 2, "value": 1 }] },
    )
    .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0], doc! { "_id": 1, "value": 3 });
}
