use crate::{
    bson::doc,
    cmap::StreamDescription,
    coll::{options::DropCollectionOptions, Namespace},
    concern::WriteConcern,
    operation::{
        test::{build_document, handle_response_test},
        DropCollection,
        Operation,
    },
    test::{assert_doc_eq, network_error, ns_not_found_error},
};

fn ns() -> Namespace {
    Namespace::new("test_db", "test_coll")
}

#[test]
fn build() {
    let options = DropCollectionOptions::builder()
        .write_concern(WriteConcern::majority())
        .build();
    let mut op = DropCollection::new(ns(), Some(options));
    let command = op.build(&StreamDescription::new_testing()).unwrap();
    assert_eq!(command.target_db(), "test_db");
    assert_doc_eq(
        &command.document().unwrap(),
        &doc! { "drop": "test_coll", "writeConcern": { "w": "majority" } },
    );

    let mut op = DropCollection::new(ns(), None);
    let document = build_document(&mut op, &StreamDescription::new_testing()).unwrap();
    assert_doc_eq(&document, &doc! { "drop": "test_coll" });
}

#[test]
fn handle_response() {
    let op = DropCollection::new(ns(), None);
    handle_response_test(&op, doc! { "ok": 1 }).unwrap();
}

#[test]
fn ns_not_found_is_ok() {
    let op = DropCollection::new(ns(), None);
    let error = ns_not_found_error();
    op.handle_error(error).unwrap();
    op.handle_error(network_error()).unwrap_err();
}
