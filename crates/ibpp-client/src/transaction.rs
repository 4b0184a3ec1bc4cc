//! Transactions, possibly spanning several databases.
//!
//! A transaction collects one transaction parameter block per linked
//! database. Links and table reservations can only change while the
//! transaction is not started; [`Transaction::start`] then hands every
//! block to the server in one call, so the transaction is either started on
//! all of its databases or on none.

use ibpp_protocol::tags::tpb;
use ibpp_protocol::{ParamBlock, Tpb};
use smallvec::SmallVec;

use crate::arena::{ArrayKey, BlobKey, DatabaseKey, StatementKey, TransactionKey};
use crate::client::{discard, Client};
use crate::config::TransactionConfig;
use crate::error::{Error, Result};
use crate::instrumentation::{span_names, transaction_span};
use crate::transport::TrHandle;

/// Lock taken on a table when the transaction starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableReservation {
    /// Others may read and write; this transaction reads.
    SharedRead,
    /// Others may read and write; this transaction writes.
    SharedWrite,
    /// Others may only read; this transaction reads.
    ProtectedRead,
    /// Others may only read; this transaction writes.
    ProtectedWrite,
}

impl TableReservation {
    fn lock(self) -> u8 {
        match self {
            Self::SharedRead | Self::ProtectedRead => tpb::LOCK_READ,
            Self::SharedWrite | Self::ProtectedWrite => tpb::LOCK_WRITE,
        }
    }

    fn sharing(self) -> u8 {
        match self {
            Self::SharedRead | Self::SharedWrite => tpb::SHARED,
            Self::ProtectedRead | Self::ProtectedWrite => tpb::PROTECTED,
        }
    }
}

/// One database's share of a transaction.
#[derive(Debug)]
pub(crate) struct DatabaseLink {
    pub(crate) database: DatabaseKey,
    pub(crate) tpb: ParamBlock<Tpb>,
}

#[derive(Debug, Default)]
pub(crate) struct TransactionState {
    pub(crate) handle: Option<TrHandle>,
    pub(crate) links: SmallVec<[DatabaseLink; 2]>,
    pub(crate) statements: SmallVec<[StatementKey; 8]>,
    pub(crate) blobs: SmallVec<[BlobKey; 4]>,
    pub(crate) arrays: SmallVec<[ArrayKey; 4]>,
}

impl TransactionState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn link_mut(&mut self, db: DatabaseKey) -> Option<&mut DatabaseLink> {
        self.links.iter_mut().find(|link| link.database == db)
    }
}

impl Client {
    pub(crate) fn tr(&self, key: TransactionKey) -> Result<&TransactionState> {
        self.transactions
            .get(key)
            .ok_or(Error::InvalidHandle("transaction"))
    }

    pub(crate) fn tr_mut(&mut self, key: TransactionKey) -> Result<&mut TransactionState> {
        self.transactions
            .get_mut(key)
            .ok_or(Error::InvalidHandle("transaction"))
    }

    /// Handle of a linked transaction that must be started.
    pub(crate) fn started_tr(
        &self,
        context: &'static str,
        key: Option<TransactionKey>,
    ) -> Result<TrHandle> {
        let key = key.ok_or_else(|| Error::logic(context, "No Transaction is attached."))?;
        self.tr(key)?.handle.ok_or(Error::NotStarted { context })
    }

    pub(crate) fn attach_transaction_database(
        &mut self,
        key: TransactionKey,
        db: DatabaseKey,
        config: TransactionConfig,
    ) -> Result<()> {
        const CONTEXT: &str = "Transaction::AttachDatabase";
        self.db(db)?;
        let state = self.tr_mut(key)?;
        if state.handle.is_some() {
            return Err(Error::AlreadyStarted { context: CONTEXT });
        }
        if state.link_mut(db).is_some() {
            return Err(Error::logic(
                CONTEXT,
                "The database is already attached to this transaction.",
            ));
        }
        state.links.push(DatabaseLink {
            database: db,
            tpb: config.tpb(),
        });
        self.db_mut(db)?.transactions.push(key);
        Ok(())
    }

    pub(crate) fn detach_transaction_database(
        &mut self,
        key: TransactionKey,
        db: DatabaseKey,
    ) -> Result<()> {
        const CONTEXT: &str = "Transaction::DetachDatabase";
        let state = self.tr_mut(key)?;
        if state.handle.is_some() {
            return Err(Error::AlreadyStarted { context: CONTEXT });
        }
        if state.link_mut(db).is_none() {
            return Err(Error::logic(
                CONTEXT,
                "The database connection you specified is not attached to this transaction.",
            ));
        }
        self.unlink_transaction_database(key, db);
        Ok(())
    }

    /// Remove the link between a transaction and a database, whatever the
    /// transaction state.
    pub(crate) fn unlink_transaction_database(&mut self, key: TransactionKey, db: DatabaseKey) {
        if let Some(state) = self.transactions.get_mut(key) {
            state.links.retain(|link| link.database != db);
        }
        if let Some(state) = self.databases.get_mut(db) {
            state.transactions.retain(|tr| *tr != key);
        }
    }

    pub(crate) fn rollback_transaction(&mut self, key: TransactionKey) -> Result<()> {
        let Some(handle) = self.tr(key)?.handle else {
            return Ok(());
        };
        let span = transaction_span(span_names::ROLLBACK);
        let _enter = span.enter();
        self.transport
            .rollback(handle)
            .map_err(|status| self.server_error("Transaction::Rollback", status))?;
        self.tr_mut(key)?.handle = None;
        tracing::info!("transaction rolled back");
        Ok(())
    }

    /// Roll back if started and detach everything bound to the transaction.
    pub(crate) fn teardown_transaction(&mut self, key: TransactionKey) {
        discard("Transaction::Rollback", self.rollback_transaction(key));
        let Ok(state) = self.tr(key) else {
            return;
        };
        let statements = state.statements.to_vec();
        let blobs = state.blobs.to_vec();
        let arrays = state.arrays.to_vec();
        let databases: Vec<DatabaseKey> = state.links.iter().map(|link| link.database).collect();
        for st in statements {
            discard("Statement::Close", self.detach_statement_transaction(st));
        }
        for blob in blobs {
            self.unlink_blob_transaction(blob);
        }
        for array in arrays {
            self.unlink_array_transaction(array);
        }
        for db in databases {
            self.unlink_transaction_database(key, db);
        }
    }
}

/// A transaction borrowed from a [`Client`].
pub struct Transaction<'c> {
    client: &'c mut Client,
    key: TransactionKey,
}

impl<'c> Transaction<'c> {
    pub(crate) fn new(client: &'c mut Client, key: TransactionKey) -> Self {
        Self { client, key }
    }

    /// Key of this transaction.
    #[must_use]
    pub fn key(&self) -> TransactionKey {
        self.key
    }

    /// Link a database, with its own transaction parameters.
    pub fn attach_database(&mut self, db: DatabaseKey, config: TransactionConfig) -> Result<()> {
        self.client.attach_transaction_database(self.key, db, config)
    }

    /// Unlink a database.
    pub fn detach_database(&mut self, db: DatabaseKey) -> Result<()> {
        self.client.detach_transaction_database(self.key, db)
    }

    /// Reserve `table` of a linked database when the transaction starts.
    pub fn add_reservation(
        &mut self,
        db: DatabaseKey,
        table: &str,
        reservation: TableReservation,
    ) -> Result<()> {
        const CONTEXT: &str = "Transaction::AddReservation";
        let state = self.client.tr_mut(self.key)?;
        if state.handle.is_some() {
            return Err(Error::AlreadyStarted { context: CONTEXT });
        }
        let link = state.link_mut(db).ok_or_else(|| {
            Error::logic(
                CONTEXT,
                "The database connection you specified is not attached to this transaction.",
            )
        })?;
        link.tpb.insert(reservation.lock());
        link.tpb.insert_str(table)?;
        link.tpb.insert(reservation.sharing());
        Ok(())
    }

    /// Start the transaction on every linked database at once.
    ///
    /// Does nothing when already started. Fails with
    /// [`Error::NotAllAttachedConnected`] without contacting the server if
    /// any linked database is disconnected.
    pub fn start(&mut self) -> Result<()> {
        const CONTEXT: &str = "Transaction::Start";
        let client = &mut *self.client;
        let state = client
            .transactions
            .get(self.key)
            .ok_or(Error::InvalidHandle("transaction"))?;
        if state.handle.is_some() {
            return Ok(());
        }
        if state.links.is_empty() {
            return Err(Error::logic(CONTEXT, "No Database is attached."));
        }

        let mut targets = Vec::with_capacity(state.links.len());
        for link in &state.links {
            let handle = client
                .databases
                .get(link.database)
                .and_then(|db| db.handle)
                .ok_or(Error::NotAllAttachedConnected)?;
            targets.push((handle, &link.tpb));
        }

        let span = transaction_span(span_names::START_TRANSACTION);
        let _enter = span.enter();
        let databases = targets.len();
        let started = client.transport.start_multiple(&targets);
        drop(targets);

        let handle = started.map_err(|status| client.server_error(CONTEXT, status))?;
        client.tr_mut(self.key)?.handle = Some(handle);
        tracing::info!(databases, "transaction started");
        Ok(())
    }

    /// Commit and end the transaction.
    pub fn commit(&mut self) -> Result<()> {
        const CONTEXT: &str = "Transaction::Commit";
        let handle = self.handle(CONTEXT)?;
        let span = transaction_span(span_names::COMMIT);
        let _enter = span.enter();
        self.client
            .transport
            .commit(handle)
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        self.client.tr_mut(self.key)?.handle = None;
        tracing::info!("transaction committed");
        Ok(())
    }

    /// Commit, keeping the transaction started.
    pub fn commit_retain(&mut self) -> Result<()> {
        const CONTEXT: &str = "Transaction::CommitRetain";
        let handle = self.handle(CONTEXT)?;
        let span = transaction_span(span_names::COMMIT);
        let _enter = span.enter();
        self.client
            .transport
            .commit_retaining(handle)
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        tracing::debug!("transaction committed, context retained");
        Ok(())
    }

    /// Roll back and end the transaction. Does nothing when not started.
    pub fn rollback(&mut self) -> Result<()> {
        self.client.rollback_transaction(self.key)
    }

    /// Roll back, keeping the transaction started.
    pub fn rollback_retain(&mut self) -> Result<()> {
        const CONTEXT: &str = "Transaction::RollbackRetain";
        let handle = self.handle(CONTEXT)?;
        let span = transaction_span(span_names::ROLLBACK);
        let _enter = span.enter();
        self.client
            .transport
            .rollback_retaining(handle)
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        tracing::debug!("transaction rolled back, context retained");
        Ok(())
    }

    /// Whether the transaction is started.
    pub fn is_started(&self) -> Result<bool> {
        Ok(self.client.tr(self.key)?.handle.is_some())
    }

    /// Linked databases, in link order.
    pub fn databases(&self) -> Result<Vec<DatabaseKey>> {
        Ok(self
            .client
            .tr(self.key)?
            .links
            .iter()
            .map(|link| link.database)
            .collect())
    }

    /// Statements bound to this transaction.
    pub fn statements(&self) -> Result<Vec<StatementKey>> {
        Ok(self.client.tr(self.key)?.statements.to_vec())
    }

    /// Transaction parameter block built for a linked database.
    pub fn parameter_block(&self, db: DatabaseKey) -> Result<Vec<u8>> {
        self.client
            .tr(self.key)?
            .links
            .iter()
            .find(|link| link.database == db)
            .map(|link| link.tpb.as_bytes().to_vec())
            .ok_or_else(|| {
                Error::logic(
                    "Transaction::ParameterBlock",
                    "The database connection you specified is not attached to this transaction.",
                )
            })
    }

    fn handle(&self, context: &'static str) -> Result<TrHandle> {
        self.client
            .tr(self.key)?
            .handle
            .ok_or(Error::NotStarted { context })
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction").field("key", &self.key).finish()
    }
}
