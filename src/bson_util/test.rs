use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, Bson},
    bson_util::{
        get_int,
        get_u64,
        merge_without_overwrite,
        replacement_document_check,
        to_i64,
        update_document_check,
        CommandBuilder,
    },
    cmap::StreamDescription,
    collation::Collation,
    feature::{Feature, ServerVersion},
    test::assert_doc_eq,
};

#[test]
fn numeric_coercion() {
    assert_eq!(get_int(&Bson::Int32(3)), Some(3));
    assert_eq!(get_int(&Bson::Int64(-4)), Some(-4));
    assert_eq!(get_int(&Bson::Double(2.0)), Some(2));
    assert_eq!(get_int(&Bson::Double(1.5)), None);
    assert_eq!(get_int(&Bson::String("1".into())), None);

    assert_eq!(get_u64(&Bson::Int32(-1)), None);
    assert_eq!(get_u64(&Bson::Int64(7)), Some(7));
    assert_eq!(to_i64(u64::MAX), i64::MAX);
}

#[test]
fn merge_keeps_existing_values() {
    let mut document = doc! { "a": 1, "b": 2 };
    merge_without_overwrite(&mut document, &doc! { "b": 3, "c": 4 });
    assert_doc_eq(&document, &doc! { "a": 1, "b": 2, "c": 4 });
}

#[test]
fn modification_document_checks() {
    assert!(update_document_check(&doc! { "$set": { "x": 1 } }).is_ok());
    assert!(update_document_check(&doc! { "x": 1 })
        .unwrap_err()
        .is_invalid_argument());
    assert!(update_document_check(&doc! {})
        .unwrap_err()
        .is_invalid_argument());

    assert!(replacement_document_check(&doc! { "x": 1 }).is_ok());
    assert!(replacement_document_check(&doc! {}).is_ok());
    assert!(replacement_document_check(&doc! { "$set": { "x": 1 } })
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
fn fields_follow_call_order_and_presence() {
    let description = StreamDescription::new_testing();
    let document = CommandBuilder::new("find", "coll", &description)
        .optional("filter", Some(doc! { "x": 1 }))
        .optional::<i32>("skip", None)
        .append_if("singleBatch", true, false)
        .append_if("allowPartialResults", true, true)
        .append("limit", 5_i64)
        .build();

    assert_doc_eq(
        &document,
        &doc! {
            "find": "coll",
            "filter": { "x": 1 },
            "allowPartialResults": true,
            "limit": 5_i64,
        },
    );
}

#[test]
fn max_time_is_int32() {
    let description = StreamDescription::new_testing();
    let cases = [
        (Duration::ZERO, 0),
        (Duration::from_nanos(100), 1),
        (Duration::from_micros(999), 1),
        (Duration::from_millis(1), 1),
        (Duration::from_micros(1_001), 2),
    ];
    for (max_time, expected) in cases {
        let document = CommandBuilder::new("count", "coll", &description)
            .max_time(Some(max_time))
            .unwrap()
            .build();
        assert_eq!(
            document.get("maxTimeMS"),
            Some(&Bson::Int32(expected)),
            "{max_time:?}"
        );
    }

    let document = CommandBuilder::new("count", "coll", &description)
        .max_time(None)
        .unwrap()
        .build();
    assert!(!document.contains_key("maxTimeMS"));

    let too_long = Duration::from_millis(u64::try_from(i32::MAX).unwrap() + 1);
    assert!(CommandBuilder::new("count", "coll", &description)
        .max_time(Some(too_long))
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
fn gated_fields() {
    let old = StreamDescription::with_server_version(ServerVersion::new(3, 2, 0));
    let collation = Collation::locale("fr");

    let absent = CommandBuilder::new("count", "coll", &old)
        .gated_serialized::<Collation>("collation", &Feature::COLLATION, None)
        .unwrap()
        .build();
    assert_doc_eq(&absent, &doc! { "count": "coll" });

    let error = CommandBuilder::new("count", "coll", &old)
        .gated_serialized("collation", &Feature::COLLATION, Some(&collation))
        .unwrap_err();
    assert!(error.is_unsupported_feature());

    let current = StreamDescription::new_testing();
    let present = CommandBuilder::new("count", "coll", &current)
        .gated_serialized("collation", &Feature::COLLATION, Some(&collation))
        .unwrap()
        .build();
    assert_eq!(
        present.get_document("collation").unwrap().get_str("locale"),
        Ok("fr")
    );

    let bypass = CommandBuilder::new("insert", "coll", &old)
        .gated("bypassDocumentValidation", &Feature::BYPASS_DOCUMENT_VALIDATION, Some(true))
        .unwrap()
        .build();
    assert_eq!(bypass.get_bool("bypassDocumentValidation"), Ok(true));
}
