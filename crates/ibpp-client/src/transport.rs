//! The transport capability.
//!
//! A [`Transport`] is whatever actually reaches the server: a binding to the
//! native client library, a network implementation of the wire protocol, or
//! an in-memory mock. The driver only ever talks to it through this trait,
//! handing it pre-built parameter blocks and receiving either a value or
//! the [`StatusVector`] of a failed call.
//!
//! Native handles are opaque numbers owned by the transport. The driver
//! stores them in its resource graph and never interprets them.

use std::sync::Arc;

use ibpp_protocol::{
    ArrayDesc, Dialect, Dpb, ParamBlock, Quad, ResultBlock, Spb, SqlType, StatusInterpreter,
    StatusVector, Tpb,
};
use ibpp_types::TypeInfo;
use tokio::sync::mpsc::UnboundedSender;

/// Result of a transport call.
pub type TransportResult<T> = std::result::Result<T, StatusVector>;

/// Shared message catalogue of a transport.
pub type Interpreter = Arc<dyn StatusInterpreter + Send + Sync>;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);
    };
}

native_handle!(
    /// Database attachment handle.
    DbHandle
);
native_handle!(
    /// Transaction handle.
    TrHandle
);
native_handle!(
    /// Prepared statement handle.
    StmtHandle
);
native_handle!(
    /// Open blob handle.
    BlobHandle
);
native_handle!(
    /// Queued event request.
    EventHandle
);
native_handle!(
    /// Service manager attachment handle.
    ServiceHandle
);

/// Description of one column or parameter, as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    /// Wire type.
    pub sql_type: SqlType,
    /// Whether the slot carries a null indicator.
    pub nullable: bool,
    /// Blob subtype or text character set.
    pub subtype: i16,
    /// NUMERIC scale (zero or negative).
    pub scale: i16,
    /// Declared length in bytes.
    pub length: u16,
    /// Column name.
    pub name: String,
    /// Table the column belongs to.
    pub relation: String,
    /// Column alias.
    pub alias: String,
}

impl ColumnDesc {
    /// A nullable, unnamed slot of the given type and declared length.
    #[must_use]
    pub fn new(sql_type: SqlType, length: u16) -> Self {
        Self {
            sql_type,
            nullable: true,
            subtype: 0,
            scale: 0,
            length,
            name: String::new(),
            relation: String::new(),
            alias: String::new(),
        }
    }

    /// Set the column name; the alias defaults to the same text.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.alias = self.name.clone();
        self
    }

    /// Set the alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Set the owning table.
    #[must_use]
    pub fn relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = relation.into();
        self
    }

    /// Set the NUMERIC scale.
    #[must_use]
    pub fn scale(mut self, scale: i16) -> Self {
        self.scale = scale;
        self
    }

    /// Set the subtype.
    #[must_use]
    pub fn subtype(mut self, subtype: i16) -> Self {
        self.subtype = subtype;
        self
    }

    /// Mark the slot as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Cell layout of this slot.
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        TypeInfo::column(self.sql_type, self.length, self.scale)
    }
}

/// One described slot together with its native storage.
///
/// Rows are vectors of these; they travel to the transport for execute and
/// fetch calls, which read the input cells and fill the output cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlVar {
    /// Slot description.
    pub desc: ColumnDesc,
    /// Cell bytes, laid out per [`TypeInfo`].
    pub data: Vec<u8>,
    /// Null indicator.
    pub null: bool,
}

impl SqlVar {
    /// A slot with freshly initialized storage, set to null.
    #[must_use]
    pub fn new(desc: ColumnDesc) -> Self {
        let data = desc.type_info().blank();
        Self {
            desc,
            data,
            null: true,
        }
    }
}

/// Outcome of a describe call.
///
/// `columns` holds at most the requested capacity; `total` is the count the
/// server actually has. When `total` exceeds the capacity the caller must
/// describe again with a larger one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Described {
    /// Number of slots the statement really has.
    pub total: usize,
    /// Descriptions of the first `min(total, capacity)` slots.
    pub columns: Vec<ColumnDesc>,
}

/// Outcome of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// A row was written into the output slots.
    Row,
    /// The cursor is exhausted (SQLCODE 100).
    NoMoreRows,
}

/// How to release a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeOption {
    /// Close the cursor, keep the prepared statement.
    Close,
    /// Release the statement handle.
    Drop,
}

/// One blob segment read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A whole segment.
    Complete(Vec<u8>),
    /// The buffer was too small; more of the same segment follows.
    Partial(Vec<u8>),
    /// End of the blob.
    Eof,
}

/// Counters pushed by the server for a queued event request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNotification {
    /// The request that fired.
    pub queue: EventHandle,
    /// Result buffer, shaped like the queued event buffer.
    pub counts: Vec<u8>,
}

/// Every server call the driver issues.
///
/// Each method either succeeds or returns the status vector of the failed
/// call; the driver turns that vector into an [`Error`](crate::Error) with
/// the help of [`interpreter`](Transport::interpreter).
pub trait Transport: Send {
    /// Message catalogue used to render status vectors.
    fn interpreter(&self) -> Interpreter;

    // Databases

    /// Attach to `connection` (`[server:]path`).
    fn attach_database(&mut self, connection: &str, dpb: &ParamBlock<Dpb>)
        -> TransportResult<DbHandle>;

    /// Run a `CREATE DATABASE` statement, returning the new attachment.
    fn create_database(&mut self, sql: &str, dialect: Dialect) -> TransportResult<DbHandle>;

    /// Detach.
    fn detach_database(&mut self, db: DbHandle) -> TransportResult<()>;

    /// Drop the attached database and detach.
    fn drop_database(&mut self, db: DbHandle) -> TransportResult<()>;

    /// Query information items.
    fn database_info(&mut self, db: DbHandle, items: &[u8]) -> TransportResult<ResultBlock>;

    // Transactions

    /// Start one transaction spanning every listed attachment.
    fn start_multiple(&mut self, targets: &[(DbHandle, &ParamBlock<Tpb>)])
        -> TransportResult<TrHandle>;

    /// Commit and release.
    fn commit(&mut self, tr: TrHandle) -> TransportResult<()>;

    /// Commit, keeping the transaction context.
    fn commit_retaining(&mut self, tr: TrHandle) -> TransportResult<()>;

    /// Roll back and release.
    fn rollback(&mut self, tr: TrHandle) -> TransportResult<()>;

    /// Roll back, keeping the transaction context.
    fn rollback_retaining(&mut self, tr: TrHandle) -> TransportResult<()>;

    // Dynamic SQL

    /// Allocate a statement handle.
    fn dsql_allocate_statement(&mut self, db: DbHandle) -> TransportResult<StmtHandle>;

    /// Prepare `sql`, describing up to `capacity` output columns.
    fn dsql_prepare(
        &mut self,
        tr: TrHandle,
        stmt: StmtHandle,
        sql: &str,
        dialect: Dialect,
        capacity: usize,
    ) -> TransportResult<Described>;

    /// Describe up to `capacity` output columns.
    fn dsql_describe(&mut self, stmt: StmtHandle, capacity: usize) -> TransportResult<Described>;

    /// Describe up to `capacity` input parameters.
    fn dsql_describe_bind(&mut self, stmt: StmtHandle, capacity: usize)
        -> TransportResult<Described>;

    /// Query statement information items.
    fn dsql_sql_info(&mut self, stmt: StmtHandle, items: &[u8]) -> TransportResult<ResultBlock>;

    /// Execute, opening a cursor for selects.
    fn dsql_execute(
        &mut self,
        tr: TrHandle,
        stmt: StmtHandle,
        inputs: Option<&[SqlVar]>,
    ) -> TransportResult<()>;

    /// Execute, returning at most one row into `outputs`.
    fn dsql_execute2(
        &mut self,
        tr: TrHandle,
        stmt: StmtHandle,
        inputs: Option<&[SqlVar]>,
        outputs: Option<&mut [SqlVar]>,
    ) -> TransportResult<()>;

    /// Fetch the next row of the open cursor into `outputs`.
    fn dsql_fetch(&mut self, stmt: StmtHandle, outputs: &mut [SqlVar])
        -> TransportResult<FetchStatus>;

    /// Name the open cursor, for positioned updates.
    fn dsql_set_cursor_name(&mut self, stmt: StmtHandle, name: &str) -> TransportResult<()>;

    /// Close the cursor or release the statement.
    fn dsql_free_statement(&mut self, stmt: StmtHandle, option: FreeOption)
        -> TransportResult<()>;

    /// Execute a statement without preparing it first.
    fn dsql_execute_immediate(
        &mut self,
        db: DbHandle,
        tr: TrHandle,
        sql: &str,
        dialect: Dialect,
    ) -> TransportResult<()>;

    // Blobs

    /// Create a blob for writing.
    fn create_blob2(&mut self, db: DbHandle, tr: TrHandle) -> TransportResult<(BlobHandle, Quad)>;

    /// Open an existing blob for reading.
    fn open_blob2(&mut self, db: DbHandle, tr: TrHandle, id: Quad) -> TransportResult<BlobHandle>;

    /// Read at most `max` bytes.
    fn get_segment(&mut self, blob: BlobHandle, max: usize) -> TransportResult<Segment>;

    /// Append one segment.
    fn put_segment(&mut self, blob: BlobHandle, data: &[u8]) -> TransportResult<()>;

    /// Close, keeping what was written.
    fn close_blob(&mut self, blob: BlobHandle) -> TransportResult<()>;

    /// Close, discarding what was written.
    fn cancel_blob(&mut self, blob: BlobHandle) -> TransportResult<()>;

    /// Query blob information items.
    fn blob_info(&mut self, blob: BlobHandle, items: &[u8]) -> TransportResult<ResultBlock>;

    // Arrays

    /// Look up the declared shape of an array column.
    fn array_lookup_bounds(
        &mut self,
        db: DbHandle,
        tr: TrHandle,
        table: &str,
        column: &str,
    ) -> TransportResult<ArrayDesc>;

    /// Read the slice described by `desc`.
    fn array_get_slice(
        &mut self,
        db: DbHandle,
        tr: TrHandle,
        id: Quad,
        desc: &ArrayDesc,
    ) -> TransportResult<Vec<u8>>;

    /// Write the slice described by `desc`, returning the id of the stored
    /// array.
    fn array_put_slice(
        &mut self,
        db: DbHandle,
        tr: TrHandle,
        id: Option<Quad>,
        desc: &ArrayDesc,
        data: &[u8],
    ) -> TransportResult<Quad>;

    // Events

    /// Queue interest in the events listed in `events`.
    ///
    /// The notification is delivered once, over `notify`, from whatever
    /// thread the transport uses for server pushes.
    fn que_events(
        &mut self,
        db: DbHandle,
        events: &[u8],
        notify: UnboundedSender<EventNotification>,
    ) -> TransportResult<EventHandle>;

    /// Withdraw a queued request.
    fn cancel_events(&mut self, db: DbHandle, queue: EventHandle) -> TransportResult<()>;

    // Services

    /// Attach to the service manager at `connection`.
    fn service_attach(&mut self, connection: &str, spb: &ParamBlock<Spb>)
        -> TransportResult<ServiceHandle>;

    /// Detach from the service manager.
    fn service_detach(&mut self, svc: ServiceHandle) -> TransportResult<()>;

    /// Start a service action.
    fn service_start(&mut self, svc: ServiceHandle, spb: &ParamBlock<Spb>) -> TransportResult<()>;

    /// Query service output.
    fn service_query(&mut self, svc: ServiceHandle, items: &[u8]) -> TransportResult<ResultBlock>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_var_is_null_and_blank() {
        let var = SqlVar::new(ColumnDesc::new(SqlType::Text, 4));
        assert!(var.null);
        assert_eq!(var.data, b"    ");
    }

    #[test]
    fn test_named_sets_alias() {
        let desc = ColumnDesc::new(SqlType::Long, 4).named("ID").relation("T");
        assert_eq!(desc.alias, "ID");
        assert_eq!(desc.relation, "T");
        let desc = desc.alias("KEY");
        assert_eq!(desc.name, "ID");
        assert_eq!(desc.alias, "KEY");
    }

    #[test]
    fn test_type_info_follows_scale() {
        let info = ColumnDesc::new(SqlType::Int64, 8).scale(-2).type_info();
        assert_eq!(info.scale, -2);
        assert_eq!(info.size, 8);
    }
}
