//! # ibpp-client
//!
//! Synchronous Firebird/InterBase client over an injectable transport.
//!
//! The driver builds parameter blocks, decodes information buffers,
//! marshals row cells and keeps the graph of server resources consistent.
//! Every server call goes through the [`Transport`] trait, so the native
//! client library (or a test double) is plugged in by the caller.
//!
//! ## Features
//!
//! - **Resource graph**: databases, transactions, statements, blobs, arrays,
//!   event subscriptions and service attachments live in generation-checked
//!   arenas owned by a [`Client`]; stale keys are reported, never followed
//! - **Cascading teardown**: disconnecting a database rolls back its
//!   transactions and releases everything linked to it, innermost first
//! - **Multi-database transactions**: one transaction may span several
//!   attachments, started atomically
//! - **Typed cells**: `set`/`get` through [`ToSql`]/[`FromSql`] with NUMERIC
//!   scaling and dialect-aware dates
//! - **Events**: notifications are delivered over a channel and dispatched
//!   on the caller's thread
//!
//! ## Resource Lifecycle
//!
//! ```text
//! Database:    Disconnected -> Connected (connect) -> Disconnected (disconnect)
//! Transaction: Unstarted -> Started (start) -> Unstarted (commit / rollback)
//! Statement:   Unprepared -> Prepared (prepare) -> Executed (execute) -> fetch ...
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ibpp_client::{Client, DatabaseConfig, TransactionConfig};
//!
//! let mut client = Client::new(transport);
//! let db = client.add_database(DatabaseConfig::from_connection_string(
//!     "localhost:/data/employee.fdb?user=SYSDBA&password=masterkey",
//! )?);
//! client.database(db)?.connect()?;
//!
//! let tr = client.add_transaction_for(db, TransactionConfig::default())?;
//! client.transaction(tr)?.start()?;
//!
//! let st = client.add_statement(db, tr)?;
//! let mut stmt = client.statement(st)?;
//! stmt.execute_sql("SELECT emp_no, full_name FROM employee")?;
//! while stmt.fetch()? {
//!     let id: i32 = stmt.get(1)?;
//!     let name: String = stmt.get(2)?;
//!     println!("{id}: {name}");
//! }
//!
//! client.transaction(tr)?.commit()?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod arena;

pub mod array;
pub mod blob;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod instrumentation;
pub mod row;
pub mod service;
pub mod statement;
pub mod transaction;
pub mod transport;

// Re-export commonly used types
pub use arena::{ArrayKey, BlobKey, DatabaseKey, EventsKey, ServiceKey, StatementKey, TransactionKey};
pub use array::Array;
pub use blob::{Blob, BlobInfo, MAX_SEGMENT_SIZE};
pub use client::Client;
pub use config::{
    AccessMode, ClientConfig, DatabaseConfig, IsolationLevel, LockResolution, ServiceConfig,
    TransactionConfig, TransactionFlags, DEFAULT_BLOB_SEGMENT_SIZE,
};
pub use database::{Database, DatabaseCounts, DatabaseInfo, DatabaseStatistics};
pub use error::{Error, Result, ServerError};
pub use events::{EventHandler, Events};
pub use ibpp_protocol::{Dialect, OdsVersion, Quad, StatementType};
pub use ibpp_types::{Date, DbKey, FromSql, NativeType, SqlDataType, Time, Timestamp, ToSql, Value};
pub use instrumentation::SanitizationConfig;
pub use row::Row;
pub use service::{BackupFlags, RepairFlags, RestoreFlags, Service, ShutdownMode, User};
pub use statement::Statement;
pub use transaction::{TableReservation, Transaction};
pub use transport::{
    BlobHandle, ColumnDesc, DbHandle, Described, EventHandle, EventNotification, FetchStatus,
    FreeOption, Interpreter, Segment, ServiceHandle, SqlVar, StmtHandle, TrHandle, Transport,
    TransportResult,
};
