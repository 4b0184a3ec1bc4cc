//! The root object owning the transport and every resource.
//!
//! A [`Client`] stores databases, transactions, statements, blobs, arrays,
//! event subscriptions and service attachments in generation-checked
//! arenas. Callers hold `Copy` keys and borrow short-lived views
//! ([`Database`], [`Statement`], ...) to operate on a resource. Links
//! between resources are kept on both sides and are used only to cascade
//! teardown.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ibpp_client::{Client, DatabaseConfig, TransactionConfig};
//!
//! let mut client = Client::new(transport);
//! let db = client.add_database(
//!     DatabaseConfig::new("/data/employee.fdb").user("SYSDBA").password("masterkey"),
//! );
//! client.database(db)?.connect()?;
//!
//! let tr = client.add_transaction_for(db, TransactionConfig::default())?;
//! client.transaction(tr)?.start()?;
//!
//! let st = client.add_statement(db, tr)?;
//! let mut stmt = client.statement(st)?;
//! stmt.prepare("SELECT id, name FROM t WHERE id = ?")?;
//! stmt.set(1, &7_i32)?;
//! stmt.execute()?;
//! while stmt.fetch()? {
//!     let name: String = stmt.get(2)?;
//! }
//! ```

use ibpp_protocol::StatusVector;

use crate::arena::{
    Arena, ArrayKey, BlobKey, DatabaseKey, EventsKey, ServiceKey, StatementKey, TransactionKey,
};
use crate::array::{Array, ArrayState};
use crate::blob::{Blob, BlobState};
use crate::config::{ClientConfig, DatabaseConfig, ServiceConfig, TransactionConfig};
use crate::database::{Database, DatabaseState};
use crate::error::{Error, Result, ServerError};
use crate::events::{Events, EventsState};
use crate::service::{Service, ServiceState};
use crate::statement::{Statement, StatementState};
use crate::transaction::{Transaction, TransactionState};
use crate::transport::Transport;

/// Owner of a transport and of every resource created through it.
///
/// Dropping the client disconnects every database and service, rolling
/// back whatever transactions are still started. Failures during that
/// teardown are logged and discarded.
pub struct Client {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) config: ClientConfig,
    pub(crate) databases: Arena<DatabaseKey, DatabaseState>,
    pub(crate) transactions: Arena<TransactionKey, TransactionState>,
    pub(crate) statements: Arena<StatementKey, StatementState>,
    pub(crate) blobs: Arena<BlobKey, BlobState>,
    pub(crate) arrays: Arena<ArrayKey, ArrayState>,
    pub(crate) events: Arena<EventsKey, EventsState>,
    pub(crate) services: Arena<ServiceKey, ServiceState>,
}

impl Client {
    /// Create a client over `transport` with default settings.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    /// Create a client over `transport`.
    pub fn with_config(transport: impl Transport + 'static, config: ClientConfig) -> Self {
        Self {
            transport: Box::new(transport),
            config,
            databases: Arena::new(),
            transactions: Arena::new(),
            statements: Arena::new(),
            blobs: Arena::new(),
            arrays: Arena::new(),
            events: Arena::new(),
            services: Arena::new(),
        }
    }

    /// Client-wide settings.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // Databases

    /// Register a database. Nothing is sent to the server until
    /// [`Database::connect`] or [`Database::create`].
    pub fn add_database(&mut self, config: DatabaseConfig) -> DatabaseKey {
        self.databases.insert(DatabaseState::new(config))
    }

    /// Borrow a database.
    pub fn database(&mut self, key: DatabaseKey) -> Result<Database<'_>> {
        self.db(key)?;
        Ok(Database::new(self, key))
    }

    /// Disconnect a database and forget it.
    ///
    /// Every resource still linked to it is detached first; their keys stay
    /// valid.
    pub fn release_database(&mut self, key: DatabaseKey) -> Result<()> {
        self.db(key)?;
        discard("Database::Disconnect", self.disconnect_database(key));
        // Links are gone after a disconnect cascade; a never connected
        // database may still be listed by unstarted transactions.
        let state = self.db(key)?;
        let transactions = state.transactions.to_vec();
        let statements = state.statements.to_vec();
        let blobs = state.blobs.to_vec();
        let arrays = state.arrays.to_vec();
        let events = state.events.to_vec();
        for st in statements {
            discard("Statement::DetachDatabase", self.detach_statement_database(st));
        }
        for blob in blobs {
            self.unlink_blob_database(blob);
        }
        for array in arrays {
            self.unlink_array_database(array);
        }
        for tr in transactions {
            self.unlink_transaction_database(tr, key);
        }
        for ev in events {
            discard("Events::Clear", self.clear_events(ev));
            self.unlink_events_database(ev);
        }
        self.databases.remove(key);
        Ok(())
    }

    // Transactions

    /// Register a transaction with no database attached.
    pub fn add_transaction(&mut self) -> TransactionKey {
        self.transactions.insert(TransactionState::new())
    }

    /// Register a transaction attached to one database.
    pub fn add_transaction_for(
        &mut self,
        db: DatabaseKey,
        config: TransactionConfig,
    ) -> Result<TransactionKey> {
        self.db(db)?;
        let key = self.add_transaction();
        self.attach_transaction_database(key, db, config)?;
        Ok(key)
    }

    /// Borrow a transaction.
    pub fn transaction(&mut self, key: TransactionKey) -> Result<Transaction<'_>> {
        self.tr(key)?;
        Ok(Transaction::new(self, key))
    }

    /// Roll back a transaction if started, detach everything bound to it
    /// and forget it.
    pub fn release_transaction(&mut self, key: TransactionKey) -> Result<()> {
        self.tr(key)?;
        self.teardown_transaction(key);
        self.transactions.remove(key);
        Ok(())
    }

    // Statements

    /// Register a statement bound to `db` and `tr`.
    pub fn add_statement(&mut self, db: DatabaseKey, tr: TransactionKey) -> Result<StatementKey> {
        self.db(db)?;
        self.tr(tr)?;
        let key = self.statements.insert(StatementState::new());
        self.link_statement_database(key, db)?;
        self.link_statement_transaction(key, tr)?;
        Ok(key)
    }

    /// Borrow a statement.
    pub fn statement(&mut self, key: StatementKey) -> Result<Statement<'_>> {
        self.stmt(key)?;
        Ok(Statement::new(self, key))
    }

    /// Close a statement, detach it and forget it.
    pub fn release_statement(&mut self, key: StatementKey) -> Result<()> {
        self.stmt(key)?;
        discard("Statement::Close", self.close_statement(key));
        self.unlink_statement_transaction(key);
        self.unlink_statement_database(key);
        self.statements.remove(key);
        Ok(())
    }

    // Blobs

    /// Register a blob bound to `db` and `tr`.
    pub fn add_blob(&mut self, db: DatabaseKey, tr: TransactionKey) -> Result<BlobKey> {
        self.db(db)?;
        self.tr(tr)?;
        let key = self.blobs.insert(BlobState::new());
        self.link_blob_database(key, db)?;
        self.link_blob_transaction(key, tr)?;
        Ok(key)
    }

    /// Borrow a blob.
    pub fn blob(&mut self, key: BlobKey) -> Result<Blob<'_>> {
        self.blob_state(key)?;
        Ok(Blob::new(self, key))
    }

    /// Cancel or close a blob, detach it and forget it.
    pub fn release_blob(&mut self, key: BlobKey) -> Result<()> {
        self.blob_state(key)?;
        self.teardown_blob(key);
        self.unlink_blob_transaction(key);
        self.unlink_blob_database(key);
        self.blobs.remove(key);
        Ok(())
    }

    // Arrays

    /// Register an array bound to `db` and `tr`.
    pub fn add_array(&mut self, db: DatabaseKey, tr: TransactionKey) -> Result<ArrayKey> {
        self.db(db)?;
        self.tr(tr)?;
        let key = self.arrays.insert(ArrayState::new());
        self.link_array_database(key, db)?;
        self.link_array_transaction(key, tr)?;
        Ok(key)
    }

    /// Borrow an array.
    pub fn array(&mut self, key: ArrayKey) -> Result<Array<'_>> {
        self.array_state(key)?;
        Ok(Array::new(self, key))
    }

    /// Detach an array and forget it.
    pub fn release_array(&mut self, key: ArrayKey) -> Result<()> {
        self.array_state(key)?;
        self.unlink_array_transaction(key);
        self.unlink_array_database(key);
        self.arrays.remove(key);
        Ok(())
    }

    // Events

    /// Register an event subscription on `db`.
    pub fn add_events(&mut self, db: DatabaseKey) -> Result<EventsKey> {
        self.db(db)?;
        let key = self.events.insert(EventsState::new());
        self.link_events_database(key, db)?;
        Ok(key)
    }

    /// Borrow an event subscription.
    pub fn events(&mut self, key: EventsKey) -> Result<Events<'_>> {
        self.events_state(key)?;
        Ok(Events::new(self, key))
    }

    /// Cancel a subscription and forget it.
    pub fn release_events(&mut self, key: EventsKey) -> Result<()> {
        self.events_state(key)?;
        discard("Events::Clear", self.clear_events(key));
        self.unlink_events_database(key);
        self.events.remove(key);
        Ok(())
    }

    // Services

    /// Register a service manager attachment.
    pub fn add_service(&mut self, config: ServiceConfig) -> ServiceKey {
        self.services.insert(ServiceState::new(config))
    }

    /// Borrow a service manager attachment.
    pub fn service(&mut self, key: ServiceKey) -> Result<Service<'_>> {
        self.service_state(key)?;
        Ok(Service::new(self, key))
    }

    /// Detach from a service manager and forget it.
    pub fn release_service(&mut self, key: ServiceKey) -> Result<()> {
        self.service_state(key)?;
        discard("Service::Disconnect", self.disconnect_service(key));
        self.services.remove(key);
        Ok(())
    }

    /// Number of live resources of every kind, in the order databases,
    /// transactions, statements, blobs, arrays, events, services.
    #[must_use]
    pub fn resource_counts(&self) -> [usize; 7] {
        [
            self.databases.len(),
            self.transactions.len(),
            self.statements.len(),
            self.blobs.len(),
            self.arrays.len(),
            self.events.len(),
            self.services.len(),
        ]
    }

    /// Render a failed status vector.
    pub(crate) fn server_error(&self, operation: &'static str, status: StatusVector) -> Error {
        ServerError::new(operation, status, self.transport.interpreter()).into()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("databases", &self.databases)
            .field("transactions", &self.transactions)
            .field("statements", &self.statements)
            .field("blobs", &self.blobs)
            .field("arrays", &self.arrays)
            .field("events", &self.events)
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        for key in self.transactions.keys() {
            self.teardown_transaction(key);
        }
        for key in self.databases.keys() {
            discard("Database::Disconnect", self.disconnect_database(key));
        }
        for key in self.services.keys() {
            discard("Service::Disconnect", self.disconnect_service(key));
        }
    }
}

/// Log and drop an error raised while tearing down.
pub(crate) fn discard(operation: &'static str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(operation, error = %e, "error ignored during teardown");
    }
}

/// Keep the first error of a cascade; log the ones after it.
pub(crate) fn keep_first(first: &mut Option<Error>, operation: &'static str, result: Result<()>) {
    if let Err(e) = result {
        if first.is_some() {
            tracing::warn!(operation, error = %e, "further error during cascade");
        } else {
            first.get_or_insert(e);
        }
    }
}
