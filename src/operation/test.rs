use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, Document, Timestamp},
    client::ClusterTime,
    cmap::{RawCommandResponse, StreamDescription},
    concern::{ReadConcern, WriteConcern},
    error::{ErrorKind, Result, WriteFailure},
    feature::{Feature, ServerVersion},
    operation::{
        read_concern_for,
        write_concern_for,
        CommandErrorBody,
        CommandResponse,
        Operation,
        WriteConcernOnlyBody,
        WriteResponseBody,
    },
    selection_criteria::{ReadPreference, SelectionCriteria},
};

pub(crate) fn handle_response_test<T: Operation>(op: &T, response_doc: Document) -> Result<T::O> {
    let raw = RawCommandResponse::with_document(response_doc).unwrap();
    op.handle_response(&raw, &StreamDescription::new_testing())
}

/// Builds the operation for `description` and returns the command document the executor would
/// start from.
pub(crate) fn build_document<T: Operation>(
    op: &mut T,
    description: &StreamDescription,
) -> Result<Document> {
    op.build(description)?.document()
}

pub(crate) fn op_selection_criteria<F, T>(constructor: F)
where
    T: Operation,
    F: Fn(Option<SelectionCriteria>) -> T,
{
    let op = constructor(None);
    assert_eq!(op.selection_criteria(), None);

    let read_pref: SelectionCriteria = ReadPreference::Secondary {
        options: Default::default(),
    }
    .into();

    let op = constructor(Some(read_pref.clone()));
    assert_eq!(op.selection_criteria(), Some(&read_pref));
}

#[test]
fn response_success() {
    let cluster_timestamp = Timestamp {
        time: 123,
        increment: 345,
    };
    let doc = doc! {
        "ok": 1,
        "some": "field",
        "operationTime": Timestamp { time: 100, increment: 1 },
        "$clusterTime": {
            "clusterTime": cluster_timestamp,
            "signature": {}
        }
    };
    let raw = RawCommandResponse::with_document(doc).unwrap();
    let response: CommandResponse<Document> = raw.body().unwrap();

    assert!(response.is_success());
    assert_eq!(
        response.cluster_time,
        Some(ClusterTime::new(cluster_timestamp, doc! {}))
    );
    assert_eq!(
        response.operation_time,
        Some(Timestamp {
            time: 100,
            increment: 1
        })
    );
    assert_eq!(response.body, doc! { "some": "field" });
}

#[test]
fn response_failure() {
    let doc = doc! {
        "ok": 0,
        "code": 123,
        "codeName": "name",
        "errmsg": "some message",
        "errorLabels": ["TransientTransactionError"],
    };
    let raw = RawCommandResponse::with_document(doc).unwrap();
    let response: CommandResponse<CommandErrorBody> = raw.body().unwrap();
    assert!(!response.is_success());

    let error: crate::error::Error = response.body.into();
    assert!(error.contains_label("TransientTransactionError"));
    match *error.kind {
        ErrorKind::Command(ref command_error) => {
            assert_eq!(command_error.code, 123);
            assert_eq!(command_error.code_name, "name");
            assert_eq!(command_error.message, "some message");
        }
        ref other => panic!("expected command error, got {other:?}"),
    }
}

#[test]
fn write_concern_error_body() {
    let raw = RawCommandResponse::with_document(doc! {
        "ok": 1,
        "writeConcernError": { "code": 64, "codeName": "WriteConcernFailed", "errmsg": "timeout" },
        "errorLabels": ["RetryableWriteError"],
    })
    .unwrap();
    let body: WriteConcernOnlyBody = raw.body().unwrap();
    let error = body.validate().unwrap_err();
    assert!(error.contains_label("RetryableWriteError"));
    assert!(matches!(
        *error.kind,
        ErrorKind::Write(WriteFailure::WriteConcernError(ref e)) if e.code == 64
    ));
}

#[test]
fn write_errors_body() {
    let raw = RawCommandResponse::with_document(doc! {
        "ok": 1,
        "n": 1,
        "writeErrors": [{ "index": 1, "code": 11000, "errmsg": "duplicate key" }],
    })
    .unwrap();
    let body: WriteResponseBody = raw.body().unwrap();
    assert_eq!(body.n, 1);
    match *body.validate().unwrap_err().kind {
        ErrorKind::BulkWrite(ref failure) => {
            let errors = failure.write_errors.as_ref().unwrap();
            assert_eq!(errors[0].index, 1);
            assert_eq!(errors[0].code, 11000);
        }
        ref other => panic!("expected bulk write error, got {other:?}"),
    }
}

#[test]
fn concern_helpers() {
    let old = StreamDescription::with_server_version(ServerVersion::new(3, 0, 0));
    let current = StreamDescription::new_testing();

    assert_eq!(read_concern_for(&old, None).unwrap(), None);
    assert_eq!(
        read_concern_for(&old, Some(&ReadConcern::server_default())).unwrap(),
        None
    );
    assert!(read_concern_for(&old, Some(&ReadConcern::majority()))
        .unwrap_err()
        .is_unsupported_feature());
    assert!(read_concern_for(&current, Some(&ReadConcern::majority()))
        .unwrap()
        .is_some());

    let feature = Feature::COMMANDS_THAT_WRITE_ACCEPT_WRITE_CONCERN;
    assert_eq!(
        write_concern_for(&feature, &old, Some(&WriteConcern::default())).unwrap(),
        None
    );
    assert!(write_concern_for(&feature, &old, Some(&WriteConcern::majority()))
        .unwrap_err()
        .is_unsupported_feature());
    let invalid = WriteConcern::builder()
        .w(crate::concern::Acknowledgment::Nodes(0))
        .journal(true)
        .build();
    assert!(write_concern_for(&feature, &current, Some(&invalid))
        .unwrap_err()
        .is_invalid_argument());
}
