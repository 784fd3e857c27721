#[cfg(test)]
mod test;

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
        PoisonError,
    },
    time::Instant,
};

use derive_where::derive_where;
use tokio_util::sync::CancellationToken;

use super::{
    options::ExecutorOptions,
    session::{ClientSession, TransactionState},
    ClusterTime,
};
use crate::{
    bson::Document,
    cmap::{Channel, ChannelSource, Command, RawCommandResponse, StreamDescription},
    concern::ReadConcernInternal,
    error::{
        Error,
        ErrorKind,
        Result,
        NO_WRITES_PERFORMED,
        RETRYABLE_WRITE_ERROR,
        TRANSIENT_TRANSACTION_ERROR,
        UNKNOWN_TRANSACTION_COMMIT_RESULT,
    },
    operation::{
        AbortTransaction,
        CommandErrorBody,
        CommandResponse,
        CommitTransaction,
        Operation,
        Retryability,
    },
    runtime,
    selection_criteria::SelectionCriteria,
    trace::command::CommandTracer,
};

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Runs operations against the servers reachable through a [`ChannelSource`].
///
/// The executor attaches session, transaction and cluster time metadata to each command, and
/// retries an operation once after a retryable error when its retryability and the server allow
/// it. `Executor` uses an [`Arc`] internally, so clones share the same source and cluster time.
#[derive(Clone, Debug)]
pub struct Executor {
    inner: Arc<ExecutorInner>,
}

#[derive_where(Debug)]
struct ExecutorInner {
    #[derive_where(skip)]
    source: Box<dyn ChannelSource>,
    options: ExecutorOptions,
    cluster_time: Mutex<Option<ClusterTime>>,
}

/// The inputs that decide whether a retryable write may be attempted a second time.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RetryContext {
    pub(crate) retry_requested: bool,
    pub(crate) supports_retryable_writes: bool,
    pub(crate) session_has_id: bool,
    pub(crate) in_transaction: bool,
}

impl RetryContext {
    pub(crate) fn allows_retries(&self) -> bool {
        self.retry_requested
            && self.supports_retryable_writes
            && self.session_has_id
            && !self.in_transaction
    }
}

#[derive(Debug)]
struct ExecutionRetry {
    prior_txn_number: Option<i64>,
    first_error: Error,
}

trait RetryHelper {
    fn first_error(&mut self) -> Result<()>;
}

impl RetryHelper for Option<ExecutionRetry> {
    fn first_error(&mut self) -> Result<()> {
        match self.take() {
            Some(r) => Err(r.first_error),
            None => Ok(()),
        }
    }
}

fn is_transaction_command(name: &str) -> bool {
    name == CommitTransaction::NAME || name == AbortTransaction::NAME
}

impl Executor {
    /// Creates an executor that acquires its channels from `source`.
    pub fn new(
        source: impl ChannelSource + 'static,
        options: impl Into<Option<ExecutorOptions>>,
    ) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                source: Box::new(source),
                options: options.into().unwrap_or_default(),
                cluster_time: Mutex::new(None),
            }),
        }
    }

    /// The options this executor was created with.
    pub fn options(&self) -> &ExecutorOptions {
        &self.inner.options
    }

    /// The highest cluster time seen in any reply so far.
    pub fn cluster_time(&self) -> Option<ClusterTime> {
        self.inner
            .cluster_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn advance_cluster_time(&self, to: &ClusterTime) {
        let mut cluster_time = self
            .inner
            .cluster_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if cluster_time.as_ref().map(|ct| ct < to).unwrap_or(true) {
            *cluster_time = Some(to.clone());
        }
    }

    /// Executes the given operation, optionally in the given session.
    ///
    /// When no session is given and both the server and the operation support sessions, an
    /// implicit session is created for the duration of this call.
    pub async fn execute<T: Operation>(
        &self,
        op: &mut T,
        session: Option<&ClientSession>,
    ) -> Result<T::O> {
        self.execute_with_cancellation(op, session, &CancellationToken::new())
            .await
    }

    /// Executes the given operation, stopping with an [`ErrorKind::Cancelled`] error once
    /// `cancellation_token` fires. A cancelled attempt is never retried.
    pub async fn execute_with_cancellation<T: Operation>(
        &self,
        op: &mut T,
        session: Option<&ClientSession>,
        cancellation_token: &CancellationToken,
    ) -> Result<T::O> {
        if let Some(session) = session {
            if !op.is_acknowledged() {
                return Err(Error::invalid_operation(
                    "cannot use an explicit session with an unacknowledged write concern",
                ));
            }

            let mut transaction = session.transaction();
            match transaction.state {
                TransactionState::Committed { .. } if op.name() != CommitTransaction::NAME => {
                    transaction.reset();
                }
                TransactionState::Aborted if op.name() != AbortTransaction::NAME => {
                    transaction.reset();
                }
                _ => {}
            }
        }

        let selection_criteria = session
            .filter(|s| s.in_transaction())
            .and_then(|s| {
                s.transaction()
                    .options
                    .as_ref()
                    .and_then(|o| o.selection_criteria.clone())
            })
            .or_else(|| op.selection_criteria().cloned());

        self.execute_with_retry(op, selection_criteria.as_ref(), session, cancellation_token)
            .await
    }

    /// Executes the given operation on the calling thread, blocking until it completes.
    ///
    /// This drives [`Executor::execute`] on a runtime owned by this crate, so the commands sent and
    /// the outcome are the same. It must not be called from within an async runtime.
    pub fn execute_blocking<T: Operation>(
        &self,
        op: &mut T,
        session: Option<&ClientSession>,
    ) -> Result<T::O> {
        runtime::block_on(self.execute(op, session))?
    }

    /// Commits the transaction in progress on `session`.
    ///
    /// A transaction that ran no operations is committed without contacting the server. Calling
    /// this again after a commit retries the commit.
    pub async fn commit_transaction(&self, session: &ClientSession) -> Result<()> {
        let (options, recommit) = {
            let mut transaction = session.transaction();
            match transaction.state {
                TransactionState::None => {
                    return Err(Error::transaction("no transaction started"));
                }
                TransactionState::Aborted => {
                    return Err(Error::transaction(
                        "cannot call commitTransaction after calling abortTransaction",
                    ));
                }
                TransactionState::Starting => {
                    transaction.commit(false);
                    return Ok(());
                }
                TransactionState::Committed {
                    data_committed: false,
                } => return Ok(()),
                TransactionState::InProgress
                | TransactionState::Committed {
                    data_committed: true,
                } => {
                    let recommit = matches!(transaction.state, TransactionState::Committed { .. });
                    transaction.commit(true);
                    (transaction.options.clone(), recommit)
                }
            }
        };

        let mut op = CommitTransaction::new(options);
        if recommit {
            op.update_for_retry();
        }
        self.execute(&mut op, Some(session)).await
    }

    /// Aborts the transaction in progress on `session`.
    ///
    /// Errors reported by the server while aborting are ignored; the transaction is aborted
    /// either way.
    pub async fn abort_transaction(&self, session: &ClientSession) -> Result<()> {
        let write_concern = {
            let mut transaction = session.transaction();
            match transaction.state {
                TransactionState::None => {
                    return Err(Error::transaction("no transaction started"));
                }
                TransactionState::Committed { .. } => {
                    return Err(Error::transaction(
                        "cannot call abortTransaction after calling commitTransaction",
                    ));
                }
                TransactionState::Aborted => {
                    return Err(Error::transaction("cannot call abortTransaction twice"));
                }
                TransactionState::Starting => {
                    transaction.abort();
                    return Ok(());
                }
                TransactionState::InProgress => {
                    let write_concern = transaction
                        .options
                        .as_ref()
                        .and_then(|options| options.write_concern.clone());
                    transaction.abort();
                    write_concern
                }
            }
        };

        let mut op = AbortTransaction::new(write_concern);
        if let Err(error) = self.execute(&mut op, Some(session)).await {
            tracing::debug!(%error, "ignoring abortTransaction failure");
        }
        Ok(())
    }

    async fn execute_with_retry<T: Operation>(
        &self,
        op: &mut T,
        selection_criteria: Option<&SelectionCriteria>,
        session: Option<&ClientSession>,
        cancellation_token: &CancellationToken,
    ) -> Result<T::O> {
        let operation_id = NEXT_OPERATION_ID.fetch_add(1, Ordering::SeqCst);
        let mut retry: Option<ExecutionRetry> = None;
        let mut implicit_session: Option<ClientSession> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancellation_token.is_cancelled() {
                return Err(ErrorKind::Cancelled.into());
            }
            if retry.is_some() {
                op.update_for_retry();
            }

            let channel = match self.inner.source.get_channel(selection_criteria).await {
                Ok(channel) => channel,
                Err(mut err) => {
                    retry.first_error()?;

                    if let Some(session) = session {
                        err.add_labels(None, session, None);
                    }
                    return Err(err);
                }
            };
            let description = channel.stream_description();

            if session.is_none()
                && implicit_session.is_none()
                && description.supports_sessions()
                && op.supports_sessions()
                && op.is_acknowledged()
            {
                implicit_session = Some(ClientSession::new_implicit());
            }
            let active_session = session.or(implicit_session.as_ref());

            let retryability = self.retryability(op, active_session, description);
            if retryability == Retryability::None {
                retry.first_error()?;
            }

            let txn_number = match retry.as_ref().and_then(|r| r.prior_txn_number) {
                Some(txn_number) => Some(txn_number),
                None => active_session.and_then(|session| {
                    if session.transaction_state() != TransactionState::None {
                        Some(session.txn_number())
                    } else if retryability == Retryability::Write {
                        Some(session.get_and_increment_txn_number())
                    } else {
                        None
                    }
                }),
            };

            let result = self
                .execute_on_channel(
                    op,
                    channel.as_ref(),
                    active_session,
                    txn_number,
                    retryability,
                    selection_criteria,
                    (operation_id, attempt),
                    cancellation_token,
                )
                .await;

            let mut err = match result {
                Ok(output) => return Ok(output),
                Err(err) => err,
            };
            err.wire_version = description.max_wire_version;

            if err.is_cancelled() {
                return Err(err);
            }

            if let Some(r) = retry {
                if err.contains_label(NO_WRITES_PERFORMED) {
                    return Err(r.first_error);
                }
                return Err(err);
            } else if retryability.can_retry_error(&err) {
                CommandTracer {
                    command_name: op.name(),
                    database_name: "",
                    operation_id,
                    attempt,
                    server: &description.server_address,
                }
                .retrying(&err);
                retry = Some(ExecutionRetry {
                    prior_txn_number: txn_number,
                    first_error: err,
                });
                continue;
            } else {
                return Err(err);
            }
        }
    }

    /// Builds, stamps and sends the command for a single attempt, then interprets the reply.
    #[allow(clippy::too_many_arguments)]
    async fn execute_on_channel<T: Operation>(
        &self,
        op: &mut T,
        channel: &dyn Channel,
        session: Option<&ClientSession>,
        txn_number: Option<i64>,
        retryability: Retryability,
        selection_criteria: Option<&SelectionCriteria>,
        (operation_id, attempt): (u64, u32),
        cancellation_token: &CancellationToken,
    ) -> Result<T::O> {
        let description = channel.stream_description();
        let mut command = op.build(description)?;
        self.stamp_command(
            op,
            &mut command,
            description,
            session,
            txn_number,
            selection_criteria,
        )?;

        let database_name = command.target_db().to_string();
        let tracer = CommandTracer {
            command_name: op.name(),
            database_name: &database_name,
            operation_id,
            attempt,
            server: &description.server_address,
        };
        tracer.started(&command);
        let start = Instant::now();

        let send_result = tokio::select! {
            biased;
            () = cancellation_token.cancelled() => Err(ErrorKind::Cancelled.into()),
            result = channel.send_command(command, cancellation_token) => result,
        };
        let response_result = match send_result {
            Ok(response) => self.parse_response(session, &response).map(|()| response),
            Err(err) => Err(err),
        };

        let response = match response_result {
            Ok(response) => response,
            Err(mut err) => {
                tracer.failed(start.elapsed(), &err);
                if let Some(session) = session {
                    if err.is_network_error() {
                        session.mark_dirty();
                    }
                    err.add_labels(Some(description), session, Some(retryability));
                }
                return op.handle_error(err);
            }
        };

        match op.handle_response(&response, description) {
            Ok(output) => {
                tracer.succeeded(start.elapsed());
                Ok(output)
            }
            Err(mut err) => {
                tracer.failed(start.elapsed(), &err);
                if let Some(session) = session {
                    err.add_labels(Some(description), session, Some(retryability));
                }
                Err(err)
            }
        }
    }

    /// Attaches the read preference, session, transaction and cluster time fields.
    fn stamp_command<T: Operation>(
        &self,
        op: &T,
        command: &mut Command,
        description: &StreamDescription,
        session: Option<&ClientSession>,
        txn_number: Option<i64>,
        selection_criteria: Option<&SelectionCriteria>,
    ) -> Result<()> {
        if command.read_preference.is_none() {
            if let Some(read_preference) = selection_criteria.and_then(|c| c.as_read_pref()) {
                command.set_read_preference(read_preference.clone());
            }
        }

        match session {
            Some(session) if op.supports_sessions() => {
                if description.supports_sessions() {
                    command.set_session_id(session.id());
                }
                if let Some(txn_number) = txn_number {
                    command.set_txn_number(txn_number);
                }

                let mut transaction = session.transaction();
                if matches!(
                    transaction.state,
                    TransactionState::Starting | TransactionState::InProgress
                ) {
                    command.set_read_concern(None);
                    command.set_write_concern(None);
                }

                if session.causal_consistency()
                    && description.supports_sessions()
                    && matches!(
                        transaction.state,
                        TransactionState::None | TransactionState::Starting
                    )
                    && op.supports_read_concern(description)
                {
                    if let Some(operation_time) = session.operation_time() {
                        command.set_after_cluster_time(operation_time);
                    }
                }

                match transaction.state {
                    TransactionState::Starting => {
                        command.set_start_transaction();
                        command.set_autocommit();
                        if let Some(read_concern) = transaction
                            .options
                            .as_ref()
                            .and_then(|options| options.read_concern.as_ref())
                            .filter(|rc| !rc.is_server_default())
                        {
                            let mut internal = ReadConcernInternal::from(read_concern.clone());
                            internal.after_cluster_time = command
                                .read_concern
                                .as_ref()
                                .and_then(|rc| rc.after_cluster_time);
                            command.set_read_concern(Some(internal));
                        }
                        transaction.state = TransactionState::InProgress;
                    }
                    TransactionState::InProgress
                    | TransactionState::Committed { .. }
                    | TransactionState::Aborted => command.set_autocommit(),
                    TransactionState::None => {}
                }
            }
            Some(session) if !session.is_implicit() => {
                return Err(Error::invalid_argument(format!(
                    "{} does not support sessions",
                    command.name()
                )));
            }
            _ => {}
        }

        let session_cluster_time = session.and_then(ClientSession::cluster_time);
        let executor_cluster_time = self.cluster_time();
        if let Some(cluster_time) = std::cmp::max(session_cluster_time, executor_cluster_time) {
            command.set_cluster_time(&cluster_time);
        }

        Ok(())
    }

    /// Records the reply's times and turns an `ok: 0` reply into an error.
    fn parse_response(
        &self,
        session: Option<&ClientSession>,
        response: &RawCommandResponse,
    ) -> Result<()> {
        let reply: CommandResponse<Document> = response.body()?;

        if let Some(ref cluster_time) = reply.cluster_time {
            self.advance_cluster_time(cluster_time);
            if let Some(session) = session {
                session.advance_cluster_time(cluster_time);
            }
        }
        if let (Some(session), Some(operation_time)) = (session, reply.operation_time) {
            session.advance_operation_time(operation_time);
        }

        if reply.is_success() {
            return Ok(());
        }
        let error = response
            .body::<CommandErrorBody>()
            .map(Error::from)
            .unwrap_or_else(|e| {
                Error::invalid_response(format!("error deserializing command error: {e}"))
            });
        Err(error.with_server_response(response))
    }

    /// The retryability of `op` for an attempt on a server described by `description`.
    fn retryability<T: Operation>(
        &self,
        op: &T,
        session: Option<&ClientSession>,
        description: &StreamDescription,
    ) -> Retryability {
        if is_transaction_command(op.name()) {
            return Retryability::Write;
        }

        let in_transaction = session.is_some_and(ClientSession::in_transaction);
        match op.retryability() {
            Retryability::Write => {
                let context = RetryContext {
                    retry_requested: self.inner.options.retry_writes && op.is_acknowledged(),
                    supports_retryable_writes: description.supports_retryable_writes(),
                    session_has_id: session.is_some(),
                    in_transaction,
                };
                if context.allows_retries() {
                    Retryability::Write
                } else {
                    Retryability::None
                }
            }
            Retryability::Read if self.inner.options.retry_reads && !in_transaction => {
                Retryability::Read
            }
            _ => Retryability::None,
        }
    }
}

impl Error {
    /// Adds the labels implied by the session's transaction state and the server's wire version.
    ///
    /// Inside a transaction, network errors are labelled `TransientTransactionError`. When
    /// committing or aborting, and for retryable writes outside a transaction, a
    /// `RetryableWriteError` label is added when the wire version calls for one. Commit failures
    /// whose outcome is unknown are labelled `UnknownTransactionCommitResult`.
    fn add_labels(
        &mut self,
        description: Option<&StreamDescription>,
        session: &ClientSession,
        retryability: Option<Retryability>,
    ) {
        let max_wire_version = description.and_then(|d| d.max_wire_version);
        let server_type = description.map(|d| d.initial_server_type);
        let add_retryable_write_label = |error: &mut Error| {
            if let Some(max_wire_version) = max_wire_version {
                if error.should_add_retryable_write_label(max_wire_version, server_type) {
                    error.add_label(RETRYABLE_WRITE_ERROR);
                }
            }
        };

        match session.transaction_state() {
            TransactionState::Starting | TransactionState::InProgress => {
                if self.is_network_error() {
                    self.add_label(TRANSIENT_TRANSACTION_ERROR);
                }
            }
            TransactionState::Committed { .. } => {
                add_retryable_write_label(self);
                if self.should_add_unknown_transaction_commit_result_label() {
                    self.add_label(UNKNOWN_TRANSACTION_COMMIT_RESULT);
                }
            }
            TransactionState::Aborted => add_retryable_write_label(self),
            TransactionState::None => {
                if retryability == Some(Retryability::Write) {
                    add_retryable_write_label(self);
                }
            }
        }
    }
}
