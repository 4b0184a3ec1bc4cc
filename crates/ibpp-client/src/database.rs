//! Database attachments.

use ibpp_protocol::{info, Dialect, OdsVersion, ResultBlock};
use smallvec::SmallVec;

use crate::arena::{ArrayKey, BlobKey, DatabaseKey, EventsKey, StatementKey, TransactionKey};
use crate::client::{keep_first, Client};
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::instrumentation::{connect_span, disconnect_span};
use crate::transport::DbHandle;

/// Physical characteristics of an attached database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// On-disk structure version.
    pub ods: OdsVersion,
    /// Page size in bytes.
    pub page_size: i64,
    /// Number of allocated pages.
    pub pages: i64,
    /// Page buffers in the cache.
    pub buffers: i64,
    /// Sweep interval in transactions.
    pub sweep_interval: i64,
    /// Whether forced (synchronous) writes are on.
    pub sync_writes: bool,
    /// Whether space is reserved on data pages for record versions.
    pub reserve_space: bool,
}

/// Page I/O counters since the attachment was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseStatistics {
    /// Reads from the page cache.
    pub fetches: i64,
    /// Writes to the page cache.
    pub marks: i64,
    /// Page reads from disk.
    pub reads: i64,
    /// Page writes to disk.
    pub writes: i64,
}

/// Record operation counters, summed over every table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseCounts {
    /// Records inserted.
    pub inserts: i64,
    /// Records updated.
    pub updates: i64,
    /// Records deleted.
    pub deletes: i64,
    /// Records read through an index.
    pub read_idx: i64,
    /// Records read sequentially.
    pub read_seq: i64,
}

pub(crate) struct DatabaseState {
    pub(crate) config: DatabaseConfig,
    pub(crate) handle: Option<DbHandle>,
    pub(crate) dialect: Dialect,
    pub(crate) transactions: SmallVec<[TransactionKey; 4]>,
    pub(crate) statements: SmallVec<[StatementKey; 8]>,
    pub(crate) blobs: SmallVec<[BlobKey; 4]>,
    pub(crate) arrays: SmallVec<[ArrayKey; 4]>,
    pub(crate) events: SmallVec<[EventsKey; 2]>,
}

impl DatabaseState {
    pub(crate) fn new(config: DatabaseConfig) -> Self {
        Self {
            dialect: config.dialect,
            config,
            handle: None,
            transactions: SmallVec::new(),
            statements: SmallVec::new(),
            blobs: SmallVec::new(),
            arrays: SmallVec::new(),
            events: SmallVec::new(),
        }
    }
}

impl std::fmt::Debug for DatabaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseState")
            .field("database", &self.config.database)
            .field("handle", &self.handle)
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

/// Check the ODS and dialect reported at attach time.
fn check_server(block: &ResultBlock) -> Result<Dialect> {
    let major = block.get_value(info::db::ODS_VERSION)?;
    let ods = OdsVersion::new(u16::try_from(major).unwrap_or(0), 0);
    if !ods.is_supported() {
        return Err(Error::UnsupportedServer(format!(
            "on-disk structure {major} is too old, at least {} is required",
            OdsVersion::MIN_SUPPORTED_MAJOR
        )));
    }
    let dialect = block.get_value(info::db::SQL_DIALECT)?;
    Dialect::from_i64(dialect).ok_or_else(|| {
        Error::UnsupportedServer(format!("dialect {dialect} reported, 1 or 3 is required"))
    })
}

impl Client {
    pub(crate) fn db(&self, key: DatabaseKey) -> Result<&DatabaseState> {
        self.databases.get(key).ok_or(Error::InvalidHandle("database"))
    }

    pub(crate) fn db_mut(&mut self, key: DatabaseKey) -> Result<&mut DatabaseState> {
        self.databases
            .get_mut(key)
            .ok_or(Error::InvalidHandle("database"))
    }

    /// Handle of a linked database that must be connected.
    pub(crate) fn connected_db(
        &self,
        context: &'static str,
        key: Option<DatabaseKey>,
    ) -> Result<DbHandle> {
        let key = key.ok_or_else(|| Error::logic(context, "No Database is attached."))?;
        self.db(key)?.handle.ok_or(Error::NotConnected { context })
    }

    pub(crate) fn connect_database(&mut self, key: DatabaseKey) -> Result<()> {
        const CONTEXT: &str = "Database::Connect";
        let state = self.db(key)?;
        if state.handle.is_some() {
            return Ok(());
        }
        if state.config.database.is_empty() {
            return Err(Error::logic(CONTEXT, "Unspecified database name."));
        }
        if state.config.user.is_empty() {
            return Err(Error::logic(CONTEXT, "Unspecified user name."));
        }
        let attach = state.config.attach_string();
        let dpb = state.config.dpb()?;

        let span = connect_span(&attach);
        let _enter = span.enter();
        tracing::trace!(dpb_len = dpb.len(), "attach parameters built");

        let handle = self
            .transport
            .attach_database(&attach, &dpb)
            .map_err(|status| self.server_error(CONTEXT, status))?;

        let items = [info::db::ODS_VERSION, info::db::SQL_DIALECT, info::END];
        let checked = match self.transport.database_info(handle, &items) {
            Ok(block) => check_server(&block),
            Err(status) => Err(self.server_error(CONTEXT, status)),
        };
        let dialect = match checked {
            Ok(dialect) => dialect,
            Err(e) => {
                if let Err(status) = self.transport.detach_database(handle) {
                    tracing::warn!(
                        code = status.engine_code(),
                        "detach after a rejected attach failed"
                    );
                }
                return Err(e);
            }
        };

        let state = self.db_mut(key)?;
        state.handle = Some(handle);
        state.dialect = dialect;
        tracing::info!(database = %attach, dialect = %dialect, "connected");
        Ok(())
    }

    /// Roll back, cancel and detach everything linked to a database.
    ///
    /// The whole cascade always runs; the first error met is returned.
    pub(crate) fn inactivate_database(&mut self, key: DatabaseKey) -> Result<()> {
        let state = self.db(key)?;
        if state.handle.is_none() {
            return Ok(());
        }
        tracing::debug!(database = %state.config.database, "inactivating");
        let transactions = state.transactions.to_vec();
        let statements = state.statements.to_vec();
        let blobs = state.blobs.to_vec();
        let arrays = state.arrays.to_vec();
        let events = state.events.to_vec();

        let mut first = None;
        for &tr in &transactions {
            if self.tr(tr).is_ok_and(|state| state.handle.is_some()) {
                keep_first(&mut first, "Transaction::Rollback", self.rollback_transaction(tr));
            }
        }
        for &ev in &events {
            keep_first(&mut first, "Events::Clear", self.clear_events(ev));
        }
        for blob in blobs {
            self.unlink_blob_database(blob);
        }
        for array in arrays {
            self.unlink_array_database(array);
        }
        for st in statements {
            keep_first(&mut first, "Statement::Close", self.detach_statement_database(st));
        }
        for tr in transactions {
            self.unlink_transaction_database(tr, key);
        }
        for ev in events {
            self.unlink_events_database(ev);
        }
        first.map_or(Ok(()), Err)
    }

    pub(crate) fn disconnect_database(&mut self, key: DatabaseKey) -> Result<()> {
        let Some(handle) = self.db(key)?.handle else {
            return Ok(());
        };
        let span = disconnect_span(&self.db(key)?.config.attach_string());
        let _enter = span.enter();
        let cascade = self.inactivate_database(key);
        let detached = self.transport.detach_database(handle);
        let state = self.db_mut(key)?;
        state.handle = None;
        tracing::info!(database = %state.config.database, "disconnected");
        cascade?;
        detached.map_err(|status| self.server_error("Database::Disconnect", status))
    }

    fn create_database(&mut self, key: DatabaseKey, dialect: Dialect) -> Result<()> {
        const CONTEXT: &str = "Database::Create";
        let state = self.db(key)?;
        if state.handle.is_some() {
            return Err(Error::logic(CONTEXT, "Database is already connected."));
        }
        if state.config.database.is_empty() {
            return Err(Error::logic(CONTEXT, "Unspecified database name."));
        }
        if state.config.user.is_empty() {
            return Err(Error::logic(CONTEXT, "Unspecified user name."));
        }
        let sql = state.config.create_sql();
        let span = connect_span(&state.config.attach_string());
        let _enter = span.enter();

        let handle = self
            .transport
            .create_database(&sql, dialect)
            .map_err(|status| self.server_error(CONTEXT, status))?;
        self.transport
            .detach_database(handle)
            .map_err(|status| self.server_error(CONTEXT, status))?;
        tracing::info!(dialect = %dialect, "database created");
        Ok(())
    }

    fn drop_database(&mut self, key: DatabaseKey) -> Result<()> {
        const CONTEXT: &str = "Database::Drop";
        let handle = self.db(key)?.handle.ok_or(Error::NotConnected { context: CONTEXT })?;
        self.inactivate_database(key)?;
        let dropped = self.transport.drop_database(handle);
        self.db_mut(key)?.handle = None;
        dropped.map_err(|status| self.server_error(CONTEXT, status))?;
        tracing::info!("database dropped");
        Ok(())
    }

    fn database_info(
        &mut self,
        key: DatabaseKey,
        context: &'static str,
        items: &[u8],
    ) -> Result<ResultBlock> {
        let handle = self.db(key)?.handle.ok_or(Error::NotConnected { context })?;
        self.transport
            .database_info(handle, items)
            .map_err(|status| self.server_error(context, status))
    }
}

/// A database attachment borrowed from a [`Client`].
pub struct Database<'c> {
    client: &'c mut Client,
    key: DatabaseKey,
}

impl<'c> Database<'c> {
    pub(crate) fn new(client: &'c mut Client, key: DatabaseKey) -> Self {
        Self { client, key }
    }

    /// Key of this database.
    #[must_use]
    pub fn key(&self) -> DatabaseKey {
        self.key
    }

    fn state(&self) -> Result<&DatabaseState> {
        self.client.db(self.key)
    }

    /// Attach to the server. Does nothing when already connected.
    ///
    /// Fails with [`Error::UnsupportedServer`] when the database's on-disk
    /// structure predates dialects or its dialect is neither 1 nor 3; the
    /// attachment is released before the error is returned.
    pub fn connect(&mut self) -> Result<()> {
        self.client.connect_database(self.key)
    }

    /// Whether an attachment is open.
    pub fn is_connected(&self) -> Result<bool> {
        Ok(self.state()?.handle.is_some())
    }

    /// Run the teardown cascade, then detach.
    ///
    /// The native handle is forgotten even when the server rejects the
    /// detach.
    pub fn disconnect(&mut self) -> Result<()> {
        self.client.disconnect_database(self.key)
    }

    /// Roll back every started transaction, cancel every event
    /// subscription and detach every linked resource, keeping the
    /// attachment itself open.
    pub fn inactivate(&mut self) -> Result<()> {
        self.client.inactivate_database(self.key)
    }

    /// Create the database on the server. The database is left
    /// disconnected.
    pub fn create(&mut self, dialect: Dialect) -> Result<()> {
        self.client.create_database(self.key, dialect)
    }

    /// Drop the database from the server, after running the teardown
    /// cascade.
    pub fn drop_database(&mut self) -> Result<()> {
        self.client.drop_database(self.key)
    }

    /// Connection settings.
    pub fn config(&self) -> Result<&DatabaseConfig> {
        Ok(&self.state()?.config)
    }

    /// Dialect in use: the server's once connected, the configured one
    /// before.
    pub fn dialect(&self) -> Result<Dialect> {
        Ok(self.state()?.dialect)
    }

    /// Physical characteristics of the database.
    pub fn info(&mut self) -> Result<DatabaseInfo> {
        use info::db;
        let block = self.client.database_info(
            self.key,
            "Database::Info",
            &[
                db::ODS_VERSION,
                db::ODS_MINOR_VERSION,
                db::PAGE_SIZE,
                db::ALLOCATION,
                db::NUM_BUFFERS,
                db::SWEEP_INTERVAL,
                db::FORCED_WRITES,
                db::NO_RESERVE,
                info::END,
            ],
        )?;
        let major = block.get_value(db::ODS_VERSION)?;
        let minor = block.get_value(db::ODS_MINOR_VERSION)?;
        Ok(DatabaseInfo {
            ods: OdsVersion::new(
                u16::try_from(major).unwrap_or(0),
                u16::try_from(minor).unwrap_or(0),
            ),
            page_size: block.get_value(db::PAGE_SIZE)?,
            pages: block.get_value(db::ALLOCATION)?,
            buffers: block.get_value(db::NUM_BUFFERS)?,
            sweep_interval: block.get_value(db::SWEEP_INTERVAL)?,
            sync_writes: block.get_value(db::FORCED_WRITES)? == 1,
            reserve_space: block.get_value(db::NO_RESERVE)? != 1,
        })
    }

    /// Page I/O counters.
    pub fn statistics(&mut self) -> Result<DatabaseStatistics> {
        use info::db;
        let block = self.client.database_info(
            self.key,
            "Database::Statistics",
            &[db::FETCHES, db::MARKS, db::READS, db::WRITES, info::END],
        )?;
        Ok(DatabaseStatistics {
            fetches: block.get_value(db::FETCHES)?,
            marks: block.get_value(db::MARKS)?,
            reads: block.get_value(db::READS)?,
            writes: block.get_value(db::WRITES)?,
        })
    }

    /// Record operation counters.
    pub fn counts(&mut self) -> Result<DatabaseCounts> {
        use info::db;
        let block = self.client.database_info(
            self.key,
            "Database::Counts",
            &[
                db::INSERT_COUNT,
                db::UPDATE_COUNT,
                db::DELETE_COUNT,
                db::READ_IDX_COUNT,
                db::READ_SEQ_COUNT,
                info::END,
            ],
        )?;
        Ok(DatabaseCounts {
            inserts: block.get_count_value(db::INSERT_COUNT)?,
            updates: block.get_count_value(db::UPDATE_COUNT)?,
            deletes: block.get_count_value(db::DELETE_COUNT)?,
            read_idx: block.get_count_value(db::READ_IDX_COUNT)?,
            read_seq: block.get_count_value(db::READ_SEQ_COUNT)?,
        })
    }

    /// Names of the users currently attached to the database.
    pub fn users(&mut self) -> Result<Vec<String>> {
        let block = self.client.database_info(
            self.key,
            "Database::Users",
            &[info::db::USER_NAMES, info::END],
        )?;
        // Each entry holds a one-byte length followed by the name.
        Ok(block
            .entries()
            .filter(|(tag, _)| *tag == info::db::USER_NAMES)
            .filter_map(|(_, value)| {
                let (&len, rest) = value.split_first()?;
                let name = rest.get(..usize::from(len))?;
                (!name.is_empty()).then(|| String::from_utf8_lossy(name).into_owned())
            })
            .collect())
    }

    /// Transactions linked to this database.
    pub fn transactions(&self) -> Result<Vec<TransactionKey>> {
        Ok(self.state()?.transactions.to_vec())
    }

    /// Statements linked to this database.
    pub fn statements(&self) -> Result<Vec<StatementKey>> {
        Ok(self.state()?.statements.to_vec())
    }

    /// Blobs linked to this database.
    pub fn blobs(&self) -> Result<Vec<BlobKey>> {
        Ok(self.state()?.blobs.to_vec())
    }

    /// Arrays linked to this database.
    pub fn arrays(&self) -> Result<Vec<ArrayKey>> {
        Ok(self.state()?.arrays.to_vec())
    }

    /// Event subscriptions linked to this database.
    pub fn events(&self) -> Result<Vec<EventsKey>> {
        Ok(self.state()?.events.to_vec())
    }
}

impl std::fmt::Debug for Database<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("key", &self.key).finish()
    }
}
