use pretty_assertions::assert_eq;

use crate::{
    bson::doc,
    error::{
        convert_bulk_write_error,
        BulkWriteFailure,
        CommandError,
        Error,
        ErrorKind,
        IndexedWriteError,
        WriteConcernError,
        WriteFailure,
        RETRYABLE_WRITE_ERROR,
        TRANSIENT_TRANSACTION_ERROR,
    },
    sdam::ServerType,
    test::network_error,
};

fn command_error(code: i32) -> Error {
    ErrorKind::Command(CommandError {
        code,
        code_name: String::new(),
        message: String::new(),
        topology_version: None,
    })
    .into()
}

fn write_concern_error(code: i32, labels: Vec<String>) -> WriteConcernError {
    WriteConcernError {
        code,
        code_name: "WriteConcernFailed".to_string(),
        message: "waiting for replication timed out".to_string(),
        details: None,
        labels,
    }
}

#[test]
fn read_retryability() {
    assert!(network_error().is_read_retryable());
    assert!(command_error(91).is_read_retryable());
    assert!(command_error(134).is_read_retryable());
    assert!(!command_error(2).is_read_retryable());
    assert!(!Error::invalid_argument("bad").is_read_retryable());
}

#[test]
fn retryable_write_label_depends_on_wire_version() {
    // 4.2 and older: the client decides by code.
    assert!(command_error(91).should_add_retryable_write_label(8, Some(ServerType::RsPrimary)));
    assert!(!command_error(134).should_add_retryable_write_label(8, Some(ServerType::RsPrimary)));
    assert!(network_error().should_add_retryable_write_label(8, None));

    // 4.4+: the server labels everything except network errors.
    assert!(!command_error(91).should_add_retryable_write_label(9, Some(ServerType::RsPrimary)));
    assert!(network_error().should_add_retryable_write_label(9, None));

    let wc_error: Error =
        ErrorKind::Write(WriteFailure::WriteConcernError(write_concern_error(91, vec![]))).into();
    assert!(wc_error.should_add_retryable_write_label(8, Some(ServerType::RsPrimary)));
    assert!(!wc_error.should_add_retryable_write_label(8, Some(ServerType::Mongos)));
}

#[test]
fn unknown_commit_result_label() {
    assert!(network_error().should_add_unknown_transaction_commit_result_label());
    assert!(command_error(50).should_add_unknown_transaction_commit_result_label());
    assert!(!command_error(2).should_add_unknown_transaction_commit_result_label());

    let mut transient = network_error();
    transient.add_label(TRANSIENT_TRANSACTION_ERROR);
    assert!(!transient.should_add_unknown_transaction_commit_result_label());
}

#[test]
fn labels_are_found_through_the_source() {
    let mut source = command_error(91);
    source.add_label(RETRYABLE_WRITE_ERROR);
    let error = Error::internal("wrapper").with_source(source);

    assert!(error.contains_label(RETRYABLE_WRITE_ERROR));
    assert!(error.is_write_retryable());
    assert!(error.labels().is_empty());
    assert_eq!(error.code(), Some(91));
}

#[test]
fn write_concern_error_labels_are_lifted() {
    let failure = BulkWriteFailure {
        write_concern_error: Some(write_concern_error(
            64,
            vec![RETRYABLE_WRITE_ERROR.to_string()],
        )),
        ..BulkWriteFailure::new()
    };
    let error: Error = ErrorKind::BulkWrite(failure).into();
    assert!(error.contains_label(RETRYABLE_WRITE_ERROR));
    assert_eq!(error.code(), Some(64));
}

#[test]
fn bulk_failures_convert_to_single_write_failures() {
    let failure = BulkWriteFailure {
        write_errors: Some(vec![IndexedWriteError {
            index: 0,
            code: 11000,
            code_name: None,
            message: "duplicate key".to_string(),
            details: Some(doc! { "key": 1 }),
        }]),
        ..BulkWriteFailure::new()
    };
    let error = convert_bulk_write_error(Error::new(
        ErrorKind::BulkWrite(failure),
        Some(vec!["SomeLabel".to_string()]),
    ));
    match *error.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) => {
            assert_eq!(write_error.code, 11000);
            assert_eq!(write_error.details, Some(doc! { "key": 1 }));
        }
        ref other => panic!("expected write error, got {other:?}"),
    }
    assert!(error.contains_label("SomeLabel"));

    let untouched = convert_bulk_write_error(command_error(2));
    assert_eq!(untouched.code(), Some(2));
}

#[test]
fn cancellation_and_network_predicates() {
    let cancelled: Error = ErrorKind::Cancelled.into();
    assert!(cancelled.is_cancelled());
    assert!(!cancelled.is_read_retryable());
    assert!(network_error().is_network_error());
    assert!(command_error(26).is_ns_not_found());
}
