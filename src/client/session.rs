mod cluster_time;

use std::sync::{
    atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering},
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};

use uuid::Uuid;

use crate::{
    bson::{doc, spec::BinarySubtype, Binary, Bson, Document, Timestamp},
    client::options::{SessionOptions, TransactionOptions},
    error::{Error, Result},
};
pub use cluster_time::ClusterTime;

/// A logical session used for ordering sequential operations and for transactions.
///
/// A `ClientSession` is a handle to shared session state. [`ClientSession::fork`] creates
/// another handle to the same state; the number of live handles is the session's reference count.
/// Operations take the session by reference, so running an operation never changes the count.
#[derive(Debug)]
pub struct ClientSession {
    state: Arc<SessionState>,
}

#[derive(Debug)]
struct SessionState {
    id: Document,
    is_implicit: bool,
    options: Option<SessionOptions>,

    /// `Timestamp` packed as `time << 32 | increment`; zero means unset.
    operation_time: AtomicU64,
    cluster_time: Mutex<Option<ClusterTime>>,
    txn_number: AtomicI64,
    transaction: Mutex<Transaction>,
    reference_count: AtomicUsize,
    dirty: AtomicBool,
}

/// The transaction state of a session.
#[derive(Clone, Debug, Default)]
pub(crate) struct Transaction {
    pub(crate) state: TransactionState,
    pub(crate) options: Option<TransactionOptions>,
}

impl Transaction {
    fn start(&mut self, options: Option<TransactionOptions>) {
        self.state = TransactionState::Starting;
        self.options = options;
    }

    pub(crate) fn commit(&mut self, data_committed: bool) {
        self.state = TransactionState::Committed { data_committed };
    }

    pub(crate) fn abort(&mut self) {
        self.state = TransactionState::Aborted;
        self.options = None;
    }

    pub(crate) fn reset(&mut self) {
        self.state = TransactionState::None;
        self.options = None;
    }
}

/// Where a session is in the transaction lifecycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) enum TransactionState {
    #[default]
    None,
    Starting,
    InProgress,
    Committed {
        /// Whether any command ran in the transaction before it was committed. A transaction
        /// that ran nothing is committed without contacting the server.
        data_committed: bool,
    },
    Aborted,
}

fn pack_timestamp(ts: Timestamp) -> u64 {
    (u64::from(ts.time) << 32) | u64::from(ts.increment)
}

#[allow(clippy::cast_possible_truncation)]
fn unpack_timestamp(packed: u64) -> Option<Timestamp> {
    (packed != 0).then(|| Timestamp {
        time: (packed >> 32) as u32,
        increment: packed as u32,
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ClientSession {
    /// Starts an explicit session. The session id is generated client side.
    pub fn new(options: impl Into<Option<SessionOptions>>) -> Self {
        Self::with_implicit(options.into(), false)
    }

    /// Starts a session on behalf of a single operation that was not given one.
    pub(crate) fn new_implicit() -> Self {
        Self::with_implicit(None, true)
    }

    fn with_implicit(options: Option<SessionOptions>, is_implicit: bool) -> Self {
        let binary = Bson::Binary(Binary {
            subtype: BinarySubtype::Uuid,
            bytes: Uuid::new_v4().as_bytes().to_vec(),
        });
        Self {
            state: Arc::new(SessionState {
                id: doc! { "id": binary },
                is_implicit,
                options,
                operation_time: AtomicU64::new(0),
                cluster_time: Mutex::new(None),
                txn_number: AtomicI64::new(0),
                transaction: Mutex::new(Transaction::default()),
                reference_count: AtomicUsize::new(1),
                dirty: AtomicBool::new(false),
            }),
        }
    }

    /// Creates another handle to this session, incrementing its reference count. Dropping the
    /// handle decrements it again.
    pub fn fork(&self) -> Self {
        self.state.reference_count.fetch_add(1, Ordering::SeqCst);
        Self {
            state: self.state.clone(),
        }
    }

    /// The number of live handles to this session.
    pub fn reference_count(&self) -> usize {
        self.state.reference_count.load(Ordering::SeqCst)
    }

    /// The id of this session.
    pub fn id(&self) -> &Document {
        &self.state.id
    }

    /// Whether this session was created implicitly for a single operation.
    pub fn is_implicit(&self) -> bool {
        self.state.is_implicit
    }

    /// The options used to create this session.
    pub(crate) fn options(&self) -> Option<&SessionOptions> {
        self.state.options.as_ref()
    }

    pub(crate) fn causal_consistency(&self) -> bool {
        if self.is_implicit() {
            return false;
        }
        self.options()
            .and_then(|opts| opts.causal_consistency)
            .unwrap_or(true)
    }

    /// The highest cluster time this session has seen so far.
    /// This will be `None` if this session has not been used in an operation yet.
    pub fn cluster_time(&self) -> Option<ClusterTime> {
        lock(&self.state.cluster_time).clone()
    }

    /// Set the cluster time to the provided one if it is greater than this session's highest seen
    /// cluster time or if this session's cluster time is `None`.
    pub fn advance_cluster_time(&self, to: &ClusterTime) {
        let mut cluster_time = lock(&self.state.cluster_time);
        if cluster_time.as_ref().map(|ct| ct < to).unwrap_or(true) {
            *cluster_time = Some(to.clone());
        }
    }

    /// The operation time returned by the last operation executed in this session.
    pub fn operation_time(&self) -> Option<Timestamp> {
        unpack_timestamp(self.state.operation_time.load(Ordering::SeqCst))
    }

    /// Advance operation time for this session. If the provided timestamp is earlier than this
    /// session's current operation time, then the operation time is unchanged.
    pub fn advance_operation_time(&self, ts: Timestamp) {
        self.state
            .operation_time
            .fetch_max(pack_timestamp(ts), Ordering::SeqCst);
    }

    /// The transaction number of the most recent retryable write or transaction.
    pub fn txn_number(&self) -> i64 {
        self.state.txn_number.load(Ordering::SeqCst)
    }

    /// Increments the txn_number and returns the new value.
    pub(crate) fn get_and_increment_txn_number(&self) -> i64 {
        self.state.txn_number.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Mark this session as dirty after a network error.
    pub(crate) fn mark_dirty(&self) {
        self.state.dirty.store(true, Ordering::SeqCst);
    }

    /// Whether a network error was encountered while using this session.
    pub fn is_dirty(&self) -> bool {
        self.state.dirty.load(Ordering::SeqCst)
    }

    /// Starts a new transaction on this session. Options that are not given are taken from the
    /// session's default transaction options.
    ///
    /// The transaction starts with the next operation run on this session.
    pub fn start_transaction(
        &self,
        options: impl Into<Option<TransactionOptions>>,
    ) -> Result<()> {
        let options = options.into().or_else(|| {
            self.options()
                .and_then(|options| options.default_transaction_options.clone())
        });
        if let Some(write_concern) = options.as_ref().and_then(|o| o.write_concern.as_ref()) {
            if !write_concern.is_acknowledged() {
                return Err(Error::invalid_argument(
                    "transactions do not support unacknowledged write concerns",
                ));
            }
        }

        let mut transaction = lock(&self.state.transaction);
        match transaction.state {
            TransactionState::Starting | TransactionState::InProgress => {
                Err(Error::transaction("transaction already in progress"))
            }
            TransactionState::Committed { .. }
            | TransactionState::Aborted
            | TransactionState::None => {
                self.get_and_increment_txn_number();
                transaction.start(options);
                Ok(())
            }
        }
    }

    /// Whether this session is currently in a transaction.
    pub fn in_transaction(&self) -> bool {
        matches!(
            self.transaction_state(),
            TransactionState::Starting | TransactionState::InProgress
        )
    }

    pub(crate) fn transaction_state(&self) -> TransactionState {
        lock(&self.state.transaction).state.clone()
    }

    pub(crate) fn transaction(&self) -> MutexGuard<'_, Transaction> {
        lock(&self.state.transaction)
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.state.reference_count.fetch_sub(1, Ordering::SeqCst);
    }
}
