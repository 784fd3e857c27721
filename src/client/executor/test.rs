use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use super::RetryContext;
use crate::{
    bson::{doc, Bson, Document, Timestamp},
    client::{
        options::{ExecutorOptions, TransactionOptions},
        session::{ClientSession, TransactionState},
        Executor,
    },
    cmap::StreamDescription,
    coll::{
        options::{CountOptions, InsertManyOptions},
        Namespace,
    },
    collation::Collation,
    concern::{ReadConcern, WriteConcern},
    error::{ErrorKind, NO_WRITES_PERFORMED, TRANSIENT_TRANSACTION_ERROR},
    feature::ServerVersion,
    operation::{Count, Insert, RunCommand},
    sdam::ServerType,
    selection_criteria::{ReadPreference, SelectionCriteria},
    test::{assert_doc_eq, command_error_reply, network_error, MockChannelSource},
};

fn ns() -> Namespace {
    Namespace::new("db", "coll")
}

fn insert() -> Insert {
    Insert::new(ns(), [doc! { "_id": 1 }], None)
}

fn count() -> Count {
    Count::new(ns(), None, None)
}

fn ts(time: u32, increment: u32) -> Timestamp {
    Timestamp { time, increment }
}

fn executor(source: &MockChannelSource) -> Executor {
    Executor::new(source.clone(), None)
}

fn insert_ok() -> Document {
    doc! { "ok": 1, "n": 1 }
}

#[test]
fn retry_context_matrix() {
    for bits in 0..16_u8 {
        let context = RetryContext {
            retry_requested: bits & 1 != 0,
            supports_retryable_writes: bits & 2 != 0,
            session_has_id: bits & 4 != 0,
            in_transaction: bits & 8 != 0,
        };
        assert_eq!(
            context.allows_retries(),
            bits == 0b0111,
            "unexpected result for {context:?}"
        );
    }
}

#[tokio::test]
async fn retryable_write_retries_once_on_new_channel() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source.reply_error(network_error()).reply(insert_ok());

    let result = executor(&source).execute(&mut insert(), None).await;
    assert!(result.is_ok(), "{result:?}");

    let sent = source.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(source.channels_acquired(), 2);
    assert_ne!(sent[0].channel_id, sent[1].channel_id);

    let (first, second) = (sent[0].document(), sent[1].document());
    assert_eq!(first.get_i64("txnNumber").unwrap(), 1);
    assert_eq!(first.get("txnNumber"), second.get("txnNumber"));
    assert_eq!(first.get("lsid"), second.get("lsid"));
    assert_eq!(first.get("documents"), second.get("documents"));
}

#[tokio::test]
async fn second_failure_is_returned() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source
        .reply_error(network_error())
        .reply(command_error_reply(91));

    let error = executor(&source)
        .execute(&mut insert(), None)
        .await
        .unwrap_err();
    assert_eq!(error.code(), Some(91));
    assert_eq!(source.sent().len(), 2);
}

#[tokio::test]
async fn client_side_failure_on_retry_is_returned() {
    let source = MockChannelSource::new(StreamDescription::new_testing())
        .with_channel_descriptions([
            StreamDescription::new_testing(),
            StreamDescription::with_server_version(ServerVersion::new(3, 2, 0)),
        ]);
    source.reply_error(network_error());

    let options = CountOptions::builder()
        .collation(Collation::locale("fr"))
        .build();
    let error = executor(&source)
        .execute(&mut Count::new(ns(), None, Some(options)), None)
        .await
        .unwrap_err();
    assert!(error.is_unsupported_feature(), "{error:?}");
    assert_eq!(source.channels_acquired(), 2);
    assert_eq!(source.sent().len(), 1);
}

#[tokio::test]
async fn no_writes_performed_returns_first_error() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    let mut second = network_error();
    second.add_label(NO_WRITES_PERFORMED);
    source.reply(command_error_reply(91)).reply_error(second);

    let error = executor(&source)
        .execute(&mut insert(), None)
        .await
        .unwrap_err();
    assert_eq!(error.code(), Some(91));
    assert!(!error.contains_label(NO_WRITES_PERFORMED));
    assert_eq!(source.sent().len(), 2);
}

#[tokio::test]
async fn failed_reacquisition_returns_first_error() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source.reply(command_error_reply(91));
    source.fail_acquisitions_from(1);

    let error = executor(&source)
        .execute(&mut insert(), None)
        .await
        .unwrap_err();
    assert_eq!(error.code(), Some(91));
    assert_eq!(source.channels_acquired(), 2);
    assert_eq!(source.sent().len(), 1);
}

#[tokio::test]
async fn retry_abandoned_when_new_server_lacks_retryable_writes() {
    let standalone = StreamDescription {
        initial_server_type: ServerType::Standalone,
        ..StreamDescription::new_testing()
    };
    let source = MockChannelSource::new(StreamDescription::new_testing())
        .with_channel_descriptions([StreamDescription::new_testing(), standalone]);
    source.reply_error(network_error());

    let error = executor(&source)
        .execute(&mut insert(), None)
        .await
        .unwrap_err();
    assert!(error.is_network_error());
    assert_eq!(source.channels_acquired(), 2);
    assert_eq!(source.sent().len(), 1);
}

#[tokio::test]
async fn non_retryable_error_is_not_retried() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source.reply(command_error_reply(2));

    let error = executor(&source)
        .execute(&mut insert(), None)
        .await
        .unwrap_err();
    assert_eq!(error.code(), Some(2));
    assert!(error.server_response().is_some());
    assert_eq!(source.sent().len(), 1);
}

#[tokio::test]
async fn retry_writes_disabled() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source.reply_error(network_error());
    let options = ExecutorOptions::builder().retry_writes(false).build();

    let error = Executor::new(source.clone(), options)
        .execute(&mut insert(), None)
        .await
        .unwrap_err();
    assert!(error.is_network_error());

    let sent = source.sent_documents();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains_key("lsid"));
    assert!(!sent[0].contains_key("txnNumber"));
}

#[tokio::test]
async fn retryable_read_retries_without_txn_number() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source
        .reply_error(network_error())
        .reply(doc! { "ok": 1, "n": 5 });

    let n = executor(&source).execute(&mut count(), None).await.unwrap();
    assert_eq!(n, 5);

    let sent = source.sent_documents();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|d| !d.contains_key("txnNumber")));
}

#[tokio::test]
async fn operation_can_recover_from_error() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source.reply(command_error_reply(26));

    let n = executor(&source).execute(&mut count(), None).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn cancellation_prevents_retry() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source.reply_pending();
    let executor = executor(&source);
    let token = CancellationToken::new();

    let mut op = insert();
    let (result, ()) = tokio::join!(
        executor.execute_with_cancellation(&mut op, None, &token),
        async {
            tokio::task::yield_now().await;
            token.cancel();
        }
    );
    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(source.sent().len(), 1);
    assert_eq!(source.channels_acquired(), 1);
}

#[tokio::test]
async fn cancelled_token_acquires_nothing() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    let token = CancellationToken::new();
    token.cancel();

    let error = executor(&source)
        .execute_with_cancellation(&mut insert(), None, &token)
        .await
        .unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::Cancelled));
    assert_eq!(source.channels_acquired(), 0);
}

#[test]
fn blocking_path_sends_identical_command() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source
        .reply(doc! { "ok": 1, "n": 1 })
        .reply(doc! { "ok": 1, "n": 1 });
    let executor = executor(&source);
    let session = ClientSession::new(None);
    let options = CountOptions::builder()
        .max_time(Duration::from_millis(10))
        .build();

    let blocking = executor
        .execute_blocking(&mut Count::new(ns(), None, Some(options.clone())), Some(&session))
        .unwrap();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let asynchronous = runtime
        .block_on(executor.execute(&mut Count::new(ns(), None, Some(options)), Some(&session)))
        .unwrap();

    assert_eq!(blocking, asynchronous);
    let sent = source.sent_documents();
    assert_eq!(sent.len(), 2);
    assert_doc_eq(&sent[0], &sent[1]);
}

#[tokio::test]
async fn end_to_end_count() {
    let description = StreamDescription {
        logical_session_timeout: None,
        ..StreamDescription::new_testing()
    };
    let source = MockChannelSource::new(description);
    source
        .reply(doc! { "ok": 1, "n": 3 })
        .reply(doc! { "ok": 1, "n": 3 });
    let executor = executor(&source);

    assert_eq!(executor.execute(&mut count(), None).await.unwrap(), 3);

    let options = CountOptions::builder()
        .max_time(Duration::from_micros(1500))
        .build();
    let mut with_max_time = Count::new(ns(), None, Some(options));
    executor.execute(&mut with_max_time, None).await.unwrap();

    let sent = source.sent_documents();
    assert_doc_eq(&sent[0], &doc! { "count": "coll" });
    assert_doc_eq(&sent[1], &doc! { "count": "coll", "maxTimeMS": Bson::Int32(2) });

    let old_source =
        MockChannelSource::new(StreamDescription::with_server_version(ServerVersion::new(3, 2, 0)));
    let options = CountOptions::builder()
        .collation(Collation::locale("en_US"))
        .build();
    let error = Executor::new(old_source.clone(), None)
        .execute(&mut Count::new(ns(), None, Some(options)), None)
        .await
        .unwrap_err();
    assert!(error.is_unsupported_feature());
    assert!(old_source.sent().is_empty());
}

#[tokio::test]
async fn operations_leave_reference_count_unchanged() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source
        .reply(doc! { "ok": 1, "n": 1 })
        .reply(doc! { "ok": 1, "n": 1 });
    let executor = executor(&source);
    let session = ClientSession::new(None);

    executor.execute(&mut count(), Some(&session)).await.unwrap();
    assert_eq!(session.reference_count(), 1);

    let fork = session.fork();
    executor.execute(&mut count(), Some(&fork)).await.unwrap();
    assert_eq!(session.reference_count(), 2);
    drop(fork);
    assert_eq!(session.reference_count(), 1);
}

#[tokio::test]
async fn unacknowledged_write_with_explicit_session_fails_fast() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    let session = ClientSession::new(None);
    let options = InsertManyOptions::builder()
        .write_concern(WriteConcern::unacknowledged())
        .build();
    let mut op = Insert::new(ns(), [doc! { "_id": 1 }], Some(options));

    let error = executor(&source)
        .execute(&mut op, Some(&session))
        .await
        .unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::InvalidOperation { .. }));
    assert_eq!(source.channels_acquired(), 0);
}

#[tokio::test]
async fn unacknowledged_write_without_session_sends_no_lsid() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source.reply(doc! { "ok": 1, "n": 0 });
    let options = InsertManyOptions::builder()
        .write_concern(WriteConcern::unacknowledged())
        .build();
    let mut op = Insert::new(ns(), [doc! { "_id": 1 }], Some(options));

    executor(&source).execute(&mut op, None).await.unwrap();

    let sent = source.sent_documents();
    assert!(!sent[0].contains_key("lsid"));
    assert!(!sent[0].contains_key("txnNumber"));
    assert_eq!(sent[0].get_document("writeConcern").unwrap(), &doc! { "w": 0 });
}

#[tokio::test]
async fn explicit_session_rejected_by_sessionless_command() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    let session = ClientSession::new(None);
    let mut op = RunCommand::new("db", doc! { "killCursors": "coll", "cursors": [1_i64] }, None);

    let error = executor(&source)
        .execute(&mut op, Some(&session))
        .await
        .unwrap_err();
    assert!(error.is_invalid_argument());
    assert!(source.sent().is_empty());
}

#[tokio::test]
async fn causal_consistency_preserves_read_concern_level() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source
        .reply(doc! { "ok": 1, "n": 1, "operationTime": ts(5, 1) })
        .reply(doc! { "ok": 1, "n": 1 });
    let executor = executor(&source);
    let session = ClientSession::new(None);

    executor.execute(&mut count(), Some(&session)).await.unwrap();
    assert_eq!(session.operation_time(), Some(ts(5, 1)));

    let options = CountOptions::builder()
        .read_concern(ReadConcern::majority())
        .build();
    executor
        .execute(&mut Count::new(ns(), None, Some(options)), Some(&session))
        .await
        .unwrap();

    let sent = source.sent_documents();
    assert!(!sent[0].contains_key("readConcern"));
    assert_doc_eq(
        sent[1].get_document("readConcern").unwrap(),
        &doc! { "level": "majority", "afterClusterTime": ts(5, 1) },
    );
}

#[tokio::test]
async fn causal_reads_skip_after_cluster_time_without_sessions() {
    for version in [ServerVersion::new(3, 4, 0), ServerVersion::new(3, 0, 0)] {
        let source = MockChannelSource::new(StreamDescription::with_server_version(version));
        source.reply(doc! { "ok": 1, "n": 1 });
        let session = ClientSession::new(None);
        session.advance_operation_time(ts(5, 1));

        executor(&source)
            .execute(&mut count(), Some(&session))
            .await
            .unwrap();

        let sent = source.sent_documents();
        assert_doc_eq(&sent[0], &doc! { "count": "coll" });
    }
}

#[tokio::test]
async fn implicit_session_is_not_causally_consistent() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source
        .reply(doc! { "ok": 1, "n": 1, "operationTime": ts(5, 1) })
        .reply(doc! { "ok": 1, "n": 1 });
    let executor = executor(&source);

    executor.execute(&mut count(), None).await.unwrap();
    executor.execute(&mut count(), None).await.unwrap();

    let sent = source.sent_documents();
    assert!(sent[1].contains_key("lsid"));
    assert_ne!(sent[0].get("lsid"), sent[1].get("lsid"));
    assert!(!sent[1].contains_key("readConcern"));
}

#[tokio::test]
async fn times_only_move_forward() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    let later = doc! { "clusterTime": ts(10, 1), "signature": { "keyId": 2_i64 } };
    let earlier = doc! { "clusterTime": ts(5, 1), "signature": { "keyId": 1_i64 } };
    source
        .reply(doc! { "ok": 1, "n": 1, "operationTime": ts(10, 1), "$clusterTime": later.clone() })
        .reply(doc! { "ok": 1, "n": 1, "operationTime": ts(5, 1), "$clusterTime": earlier })
        .reply(doc! { "ok": 1, "n": 1 });
    let executor = executor(&source);
    let session = ClientSession::new(None);

    for _ in 0..3 {
        executor.execute(&mut count(), Some(&session)).await.unwrap();
    }

    assert_eq!(session.operation_time(), Some(ts(10, 1)));
    assert_eq!(session.cluster_time().unwrap().timestamp(), ts(10, 1));
    assert_eq!(executor.cluster_time().unwrap().timestamp(), ts(10, 1));

    let sent = source.sent_documents();
    assert!(!sent[0].contains_key("$clusterTime"));
    assert_doc_eq(sent[2].get_document("$clusterTime").unwrap(), &later);
    assert_eq!(
        sent[2].get_document("readConcern").unwrap(),
        &doc! { "afterClusterTime": ts(10, 1) }
    );
}

#[tokio::test]
async fn transaction_fields() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source.reply(insert_ok()).reply(insert_ok());
    let executor = executor(&source);
    let session = ClientSession::new(None);
    let options = TransactionOptions::builder()
        .read_concern(ReadConcern::majority())
        .write_concern(WriteConcern::majority())
        .build();
    session.start_transaction(options).unwrap();

    let write_concern = InsertManyOptions::builder()
        .write_concern(WriteConcern::nodes(1))
        .build();
    executor
        .execute(
            &mut Insert::new(ns(), [doc! { "_id": 1 }], Some(write_concern)),
            Some(&session),
        )
        .await
        .unwrap();
    assert_eq!(session.transaction_state(), TransactionState::InProgress);
    executor
        .execute(&mut Insert::new(ns(), [doc! { "_id": 2 }], None), Some(&session))
        .await
        .unwrap();
    executor.commit_transaction(&session).await.unwrap();
    assert_eq!(
        session.transaction_state(),
        TransactionState::Committed {
            data_committed: true
        }
    );

    let sent = source.sent_documents();
    assert_eq!(sent.len(), 3);

    let first = &sent[0];
    assert_eq!(first.get_i64("txnNumber").unwrap(), 1);
    assert!(first.get_bool("startTransaction").unwrap());
    assert!(!first.get_bool("autocommit").unwrap());
    assert_eq!(
        first.get_document("readConcern").unwrap(),
        &doc! { "level": "majority" }
    );
    assert!(!first.contains_key("writeConcern"));

    let second = &sent[1];
    assert_eq!(second.get_i64("txnNumber").unwrap(), 1);
    assert!(!second.contains_key("startTransaction"));
    assert!(!second.get_bool("autocommit").unwrap());
    assert!(!second.contains_key("readConcern"));

    let commit = &sent[2];
    assert_eq!(commit.get_i32("commitTransaction").unwrap(), 1);
    assert_eq!(commit.get_i64("txnNumber").unwrap(), 1);
    assert!(!commit.get_bool("autocommit").unwrap());
    assert_eq!(
        commit.get_document("writeConcern").unwrap(),
        &doc! { "w": "majority" }
    );
    assert_eq!(commit.get("lsid"), first.get("lsid"));
}

#[tokio::test]
async fn empty_transactions_do_not_contact_server() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    let executor = executor(&source);
    let session = ClientSession::new(None);

    session.start_transaction(None).unwrap();
    executor.commit_transaction(&session).await.unwrap();
    executor.commit_transaction(&session).await.unwrap();

    session.start_transaction(None).unwrap();
    executor.abort_transaction(&session).await.unwrap();
    assert_eq!(session.transaction_state(), TransactionState::Aborted);

    let error = executor.abort_transaction(&session).await.unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::Transaction { .. }));
    let error = executor.commit_transaction(&session).await.unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::Transaction { .. }));

    assert_eq!(source.channels_acquired(), 0);
}

#[tokio::test]
async fn abort_after_commit_is_an_error() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    let executor = executor(&source);
    let session = ClientSession::new(None);

    session.start_transaction(None).unwrap();
    executor.commit_transaction(&session).await.unwrap();
    let error = executor.abort_transaction(&session).await.unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::Transaction { .. }));
}

#[tokio::test]
async fn abort_ignores_server_errors() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source.reply(insert_ok()).reply(command_error_reply(2));
    let executor = executor(&source);
    let session = ClientSession::new(None);

    session.start_transaction(None).unwrap();
    executor.execute(&mut insert(), Some(&session)).await.unwrap();
    executor.abort_transaction(&session).await.unwrap();

    assert_eq!(session.transaction_state(), TransactionState::Aborted);
    let sent = source.sent_documents();
    assert_eq!(sent[1].get_i32("abortTransaction").unwrap(), 1);
    assert!(!sent[1].get_bool("autocommit").unwrap());
}

#[tokio::test]
async fn network_error_in_transaction_is_transient() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source.reply_error(network_error());
    let executor = executor(&source);
    let session = ClientSession::new(None);

    session.start_transaction(None).unwrap();
    let error = executor
        .execute(&mut insert(), Some(&session))
        .await
        .unwrap_err();

    assert!(error.contains_label(TRANSIENT_TRANSACTION_ERROR));
    assert!(session.is_dirty());
    assert_eq!(source.sent().len(), 1);
}

#[tokio::test]
async fn operation_after_commit_leaves_transaction() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source.reply(insert_ok()).reply(doc! { "ok": 1 }).reply(insert_ok());
    let executor = executor(&source);
    let session = ClientSession::new(None);

    session.start_transaction(None).unwrap();
    executor.execute(&mut insert(), Some(&session)).await.unwrap();
    executor.commit_transaction(&session).await.unwrap();
    executor.execute(&mut insert(), Some(&session)).await.unwrap();

    assert_eq!(session.transaction_state(), TransactionState::None);
    let sent = source.sent_documents();
    assert!(!sent[2].contains_key("autocommit"));
    assert_eq!(sent[2].get_i64("txnNumber").unwrap(), 2);
}

#[tokio::test]
async fn transaction_selection_criteria_override_operation() {
    let source = MockChannelSource::new(StreamDescription::new_testing());
    source
        .reply(doc! { "ok": 1, "n": 5 })
        .reply(doc! { "ok": 1, "n": 5 });
    let executor = executor(&source);
    let session = ClientSession::new(None);

    executor.execute(&mut count(), Some(&session)).await.unwrap();

    let secondary = ReadPreference::Secondary { options: None };
    let options = TransactionOptions::builder()
        .selection_criteria(SelectionCriteria::from(secondary.clone()))
        .build();
    session.start_transaction(options).unwrap();
    executor.execute(&mut count(), Some(&session)).await.unwrap();

    assert_eq!(
        source.requested_criteria(),
        vec![None, Some(SelectionCriteria::ReadPreference(secondary))]
    );
}
