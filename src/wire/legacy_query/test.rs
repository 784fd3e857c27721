use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, Bson, Document},
    sdam::ServerType,
    selection_criteria::ReadPreference,
    test::assert_doc_eq,
    wire::{LegacyQueryWrapper, QueryFlags, QueryHeader},
};

fn secondary() -> ReadPreference {
    ReadPreference::Secondary { options: None }
}

fn query() -> Document {
    doc! { "count": "coll" }
}

#[test]
fn unwrapped_without_modifiers() {
    let (document, flags) = LegacyQueryWrapper::new(ServerType::RsPrimary, None)
        .wrap(query())
        .unwrap();
    assert_doc_eq(&document, &query());
    assert_eq!(flags, QueryFlags::empty());

    let primary = ReadPreference::Primary;
    let (document, flags) = LegacyQueryWrapper::new(ServerType::Mongos, Some(&primary))
        .wrap(query())
        .unwrap();
    assert_doc_eq(&document, &query());
    assert_eq!(flags, QueryFlags::empty());
}

#[test]
fn secondary_preference_off_mongos_only_sets_flag() {
    let read_preference = secondary();
    for server_type in [ServerType::RsSecondary, ServerType::Standalone] {
        let (document, flags) = LegacyQueryWrapper::new(server_type, Some(&read_preference))
            .wrap(query())
            .unwrap();
        assert_doc_eq(&document, &query());
        assert_eq!(flags, QueryFlags::SECONDARY_OK);
    }
}

#[test]
fn secondary_preference_on_mongos_is_wrapped() {
    let read_preference = ReadPreference::SecondaryPreferred { options: None };
    let (document, flags) = LegacyQueryWrapper::new(ServerType::Mongos, Some(&read_preference))
        .wrap(query())
        .unwrap();
    assert_doc_eq(
        &document,
        &doc! {
            "$query": { "count": "coll" },
            "$readPreference": { "mode": "secondaryPreferred" },
        },
    );
    assert_eq!(flags, QueryFlags::SECONDARY_OK);
}

#[test]
fn comment_alone_wraps() {
    let (document, flags) = LegacyQueryWrapper::new(ServerType::RsPrimary, None)
        .comment(Some(Bson::String("hi".into())))
        .wrap(query())
        .unwrap();
    assert_doc_eq(
        &document,
        &doc! { "$query": { "count": "coll" }, "$comment": "hi" },
    );
    assert_eq!(flags, QueryFlags::empty());
}

#[test]
fn empty_additional_options_do_not_wrap() {
    let empty = Document::new();
    let (document, _) = LegacyQueryWrapper::new(ServerType::RsPrimary, None)
        .additional_options(Some(&empty))
        .wrap(query())
        .unwrap();
    assert_doc_eq(&document, &query());
}

#[test]
fn triggers_compose_into_one_wrap() {
    let read_preference = secondary();
    let options = doc! { "$comment": "ignored", "$snapshot": true };
    let (document, flags) = LegacyQueryWrapper::new(ServerType::Mongos, Some(&read_preference))
        .element("$orderby", Some(doc! { "x": 1 }))
        .element("$hint", None::<i32>)
        .comment(Some(Bson::String("hi".into())))
        .element("$maxTimeMS", Some(5))
        .additional_options(Some(&options))
        .wrap(doc! { "x": { "$gt": 1 } })
        .unwrap();

    assert_doc_eq(
        &document,
        &doc! {
            "$query": { "x": { "$gt": 1 } },
            "$readPreference": { "mode": "secondary" },
            "$orderby": { "x": 1 },
            "$comment": "hi",
            "$maxTimeMS": 5,
            "$snapshot": true,
        },
    );
    assert_eq!(flags, QueryFlags::SECONDARY_OK);
}

#[test]
fn flags_can_be_toggled() {
    let read_preference = secondary();
    let (_, flags) = LegacyQueryWrapper::new(ServerType::RsSecondary, Some(&read_preference))
        .flag(QueryFlags::NO_CURSOR_TIMEOUT, true)
        .flag(QueryFlags::TAILABLE_CURSOR, false)
        .flag(QueryFlags::SECONDARY_OK, false)
        .wrap(query())
        .unwrap();
    assert_eq!(flags, QueryFlags::NO_CURSOR_TIMEOUT);
}

#[test]
fn command_header() {
    let header = QueryHeader::for_command("admin");
    assert_eq!(header.full_collection_name, "admin.$cmd");
    assert_eq!(header.number_to_skip, 0);
    assert_eq!(header.number_to_return, -1);
    assert_eq!(header.return_fields_selector, None);
}
