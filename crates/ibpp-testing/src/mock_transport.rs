//! Scriptable in-memory server.
//!
//! [`MockTransport`] implements [`Transport`] without any network or
//! native library. Databases, statements, array columns and users are
//! registered up front through a [`MockHandle`]; the handle stays usable
//! after the transport has been moved into a `Client`, so tests can fire
//! events, inject failures and inspect what the driver sent.
//!
//! Statements are matched by their exact (trimmed) SQL text. Each script
//! declares the statement kind, the described columns and parameters, the
//! rows a cursor yields and the affected-row count.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ibpp_testing::{MockDatabase, MockStatement, MockTransport};
//!
//! let transport = MockTransport::new();
//! let server = transport.handle();
//! server.add_database("/data/test.fdb", MockDatabase::default());
//! server.script(
//!     "SELECT id FROM t",
//!     MockStatement::select(vec![ColumnDesc::new(SqlType::Long, 4).named("ID")])
//!         .row(vec![Value::Int32(1)]),
//! );
//! let mut client = Client::new(transport);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use ibpp_client::{
    BlobHandle, ColumnDesc, DbHandle, Described, EventHandle, EventNotification, FetchStatus,
    FreeOption, Interpreter, Segment, ServiceHandle, SqlVar, StmtHandle, TrHandle, Transport,
    TransportResult, User,
};
use ibpp_protocol::tags::{action, spb};
use ibpp_protocol::{
    info, vax_integer, ArrayDesc, Dialect, Dpb, ParamBlock, Quad, ResultBlock, ResultBlockBuilder,
    Spb, StatusInterpreter, StatusVector, Tpb, STATUS_LEN,
};
use ibpp_types::{decode_value, encode_value, NativeType, TypeError, TypeInfo, Value};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// Engine codes the mock reports.
pub mod codes {
    pub use ibpp_protocol::status::code::{DSQL_ERROR, LOCK_CONFLICT, NETWORK_ERROR};

    /// Invalid database handle.
    pub const BAD_DB_HANDLE: i64 = 335_544_324;
    /// Invalid blob handle.
    pub const BAD_SEGSTR_HANDLE: i64 = 335_544_328;
    /// Invalid blob id.
    pub const BAD_SEGSTR_ID: i64 = 335_544_329;
    /// Invalid transaction handle.
    pub const BAD_TRANS_HANDLE: i64 = 335_544_332;
    /// Conversion error.
    pub const CONVERSION_ERROR: i64 = 335_544_334;
    /// File could not be opened.
    pub const IO_ERROR: i64 = 335_544_344;
    /// Wrong user name or password.
    pub const LOGIN: i64 = 335_544_472;
    /// Invalid statement handle.
    pub const BAD_STMT_HANDLE: i64 = 335_544_485;
    /// Invalid service handle.
    pub const BAD_SVC_HANDLE: i64 = 335_544_559;
    /// Unique constraint violated.
    pub const UNIQUE_KEY_VIOLATION: i64 = 335_544_665;
    /// Column unknown.
    pub const FIELD_NOT_FOUND: i64 = 335_544_578;
    /// Cursor not open.
    pub const CURSOR_NOT_OPEN: i64 = 335_544_577;
    /// Security database record missing.
    pub const USER_NOT_FOUND: i64 = 335_544_753;
}

/// Message catalogue of the mock server.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockCatalogue;

impl MockCatalogue {
    fn engine_message(code: i64) -> &'static str {
        match code {
            codes::BAD_DB_HANDLE => "invalid database handle (no active connection)",
            codes::BAD_SEGSTR_HANDLE => "invalid BLOB handle",
            codes::BAD_SEGSTR_ID => "invalid BLOB ID",
            codes::BAD_TRANS_HANDLE => "invalid transaction handle (expecting explicit transaction start)",
            codes::CONVERSION_ERROR => "conversion error from string",
            codes::IO_ERROR => "I/O error during \"open\" operation",
            codes::LOGIN => "Your user name and password are not defined",
            codes::BAD_STMT_HANDLE => "invalid statement handle",
            codes::BAD_SVC_HANDLE => "service is not defined",
            codes::UNIQUE_KEY_VIOLATION => "violation of PRIMARY or UNIQUE KEY constraint",
            codes::FIELD_NOT_FOUND => "Column unknown",
            codes::CURSOR_NOT_OPEN => "Attempt to reclose a closed cursor",
            codes::USER_NOT_FOUND => "record not found for user",
            codes::DSQL_ERROR => "Dynamic SQL Error",
            codes::LOCK_CONFLICT => "lock conflict on no wait transaction",
            codes::NETWORK_ERROR => "Unable to complete network request to host",
            _ => "unknown engine error",
        }
    }
}

impl StatusInterpreter for MockCatalogue {
    fn sql_code(&self, status: &[i64; STATUS_LEN]) -> i32 {
        match status[1] {
            codes::UNIQUE_KEY_VIOLATION => -803,
            codes::DSQL_ERROR | codes::FIELD_NOT_FOUND => -104,
            codes::IO_ERROR | codes::LOGIN | codes::NETWORK_ERROR => -902,
            codes::CONVERSION_ERROR => -413,
            codes::LOCK_CONFLICT => -913,
            codes::CURSOR_NOT_OPEN => -501,
            codes::USER_NOT_FOUND => -85,
            _ => -901,
        }
    }

    fn sql_message(&self, sql_code: i32) -> String {
        format!("SQLCODE {sql_code}")
    }

    fn engine_messages(&self, status: &[i64; STATUS_LEN]) -> Vec<String> {
        vec![Self::engine_message(status[1]).to_string()]
    }
}

fn fail(code: i64) -> StatusVector {
    StatusVector::error(code)
}

/// Properties of a database the mock knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDatabase {
    /// On-disk structure major version.
    pub ods_major: i32,
    /// On-disk structure minor version.
    pub ods_minor: i32,
    /// SQL dialect reported at attach time.
    pub dialect: i32,
    /// Page size in bytes.
    pub page_size: i32,
    /// Allocated pages.
    pub pages: i32,
    /// Cache pages.
    pub buffers: i32,
    /// Sweep interval.
    pub sweep_interval: i32,
    /// Forced writes.
    pub forced_writes: bool,
    /// Space reservation.
    pub reserve_space: bool,
    /// Page counters: fetches, marks, reads, writes.
    pub io: [i32; 4],
    /// Per-table counters `(table id, count)` for inserts, updates,
    /// deletes, indexed reads and sequential reads.
    pub counts: [Vec<(u16, u32)>; 5],
    /// Attached users.
    pub users: Vec<String>,
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self {
            ods_major: 11,
            ods_minor: 2,
            dialect: 3,
            page_size: 4096,
            pages: 220,
            buffers: 2048,
            sweep_interval: 20_000,
            forced_writes: true,
            reserve_space: true,
            io: [0; 4],
            counts: Default::default(),
            users: vec!["SYSDBA".into()],
        }
    }
}

impl MockDatabase {
    /// Set the reported on-disk structure version.
    #[must_use]
    pub fn ods(mut self, major: i32, minor: i32) -> Self {
        self.ods_major = major;
        self.ods_minor = minor;
        self
    }

    /// Set the reported dialect.
    #[must_use]
    pub fn dialect(mut self, dialect: i32) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the attached users.
    #[must_use]
    pub fn users(mut self, users: &[&str]) -> Self {
        self.users = users.iter().map(|u| (*u).to_string()).collect();
        self
    }

    fn info(&self, items: &[u8]) -> ResultBlock {
        use info::db;
        let mut block = ResultBlock::builder();
        for &item in items {
            block = match item {
                db::ODS_VERSION => block.int(item, self.ods_major),
                db::ODS_MINOR_VERSION => block.int(item, self.ods_minor),
                db::SQL_DIALECT => block.byte(item, self.dialect as u8),
                db::PAGE_SIZE => block.int(item, self.page_size),
                db::ALLOCATION => block.int(item, self.pages),
                db::NUM_BUFFERS => block.int(item, self.buffers),
                db::SWEEP_INTERVAL => block.int(item, self.sweep_interval),
                db::FORCED_WRITES => block.byte(item, u8::from(self.forced_writes)),
                db::NO_RESERVE => block.byte(item, u8::from(!self.reserve_space)),
                db::FETCHES => block.int(item, self.io[0]),
                db::MARKS => block.int(item, self.io[1]),
                db::READS => block.int(item, self.io[2]),
                db::WRITES => block.int(item, self.io[3]),
                db::INSERT_COUNT => block.counts(item, &self.counts[0]),
                db::UPDATE_COUNT => block.counts(item, &self.counts[1]),
                db::DELETE_COUNT => block.counts(item, &self.counts[2]),
                db::READ_IDX_COUNT => block.counts(item, &self.counts[3]),
                db::READ_SEQ_COUNT => block.counts(item, &self.counts[4]),
                db::USER_NAMES => {
                    for user in &self.users {
                        let mut value = vec![user.len() as u8];
                        value.extend_from_slice(user.as_bytes());
                        block = block.raw(item, &value);
                    }
                    block
                }
                _ => block,
            };
        }
        block.build()
    }
}

/// Script answering one SQL text.
#[derive(Debug, Clone, PartialEq)]
pub struct MockStatement {
    kind: i64,
    columns: Vec<ColumnDesc>,
    params: Vec<ColumnDesc>,
    rows: Vec<Vec<Value>>,
    affected: i64,
    plan: String,
    failure: Option<i64>,
}

impl MockStatement {
    fn new(kind: i64) -> Self {
        Self {
            kind,
            columns: Vec::new(),
            params: Vec::new(),
            rows: Vec::new(),
            affected: 0,
            plan: String::new(),
            failure: None,
        }
    }

    /// A SELECT returning `columns`.
    #[must_use]
    pub fn select(columns: Vec<ColumnDesc>) -> Self {
        Self {
            columns,
            ..Self::new(info::stmt::SELECT)
        }
    }

    /// A `SELECT ... FOR UPDATE` returning `columns`.
    #[must_use]
    pub fn select_for_update(columns: Vec<ColumnDesc>) -> Self {
        Self {
            columns,
            ..Self::new(info::stmt::SELECT_FOR_UPD)
        }
    }

    /// An INSERT.
    #[must_use]
    pub fn insert() -> Self {
        Self::new(info::stmt::INSERT)
    }

    /// An UPDATE.
    #[must_use]
    pub fn update() -> Self {
        Self::new(info::stmt::UPDATE)
    }

    /// A DELETE.
    #[must_use]
    pub fn delete() -> Self {
        Self::new(info::stmt::DELETE)
    }

    /// A DDL statement.
    #[must_use]
    pub fn ddl() -> Self {
        Self::new(info::stmt::DDL)
    }

    /// An EXECUTE PROCEDURE returning at most one row of `columns`.
    #[must_use]
    pub fn procedure(columns: Vec<ColumnDesc>) -> Self {
        Self {
            columns,
            ..Self::new(info::stmt::EXEC_PROCEDURE)
        }
    }

    /// A statement of a raw kind code.
    #[must_use]
    pub fn of_kind(kind: i64) -> Self {
        Self::new(kind)
    }

    /// Declare the input parameters.
    #[must_use]
    pub fn params(mut self, params: Vec<ColumnDesc>) -> Self {
        self.params = params;
        self
    }

    /// Append a result row.
    #[must_use]
    pub fn row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    /// Set the affected-row count.
    #[must_use]
    pub fn affected(mut self, rows: i64) -> Self {
        self.affected = rows;
        self
    }

    /// Set the access plan, reported with a leading newline.
    #[must_use]
    pub fn plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = plan.into();
        self
    }

    /// Make every execution fail with `code`.
    #[must_use]
    pub fn failing(mut self, code: i64) -> Self {
        self.failure = Some(code);
        self
    }

    fn describe(slots: &[ColumnDesc], capacity: usize) -> Described {
        Described {
            total: slots.len(),
            columns: slots.iter().take(capacity).cloned().collect(),
        }
    }

    fn is_cursor(&self) -> bool {
        self.kind == info::stmt::SELECT || self.kind == info::stmt::SELECT_FOR_UPD
    }

    fn info(&self, items: &[u8]) -> ResultBlock {
        use info::{req, sql};
        let mut block = ResultBlock::builder();
        for &item in items {
            block = match item {
                sql::STMT_TYPE => block.int(item, self.kind as i32),
                sql::GET_PLAN => block.string(item, &format!("\n{}", self.plan)),
                sql::RECORDS => {
                    let count = |kind: i64| if self.kind == kind { self.affected as i32 } else { 0 };
                    let selected = if self.is_cursor() { self.rows.len() as i32 } else { 0 };
                    block.nested(
                        item,
                        ResultBlock::builder()
                            .int(req::UPDATE_COUNT, count(info::stmt::UPDATE))
                            .int(req::DELETE_COUNT, count(info::stmt::DELETE))
                            .int(req::SELECT_COUNT, selected)
                            .int(req::INSERT_COUNT, count(info::stmt::INSERT)),
                    )
                }
                _ => block,
            };
        }
        block.build()
    }
}

/// One execution seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Statement text.
    pub sql: String,
    /// Input slots as sent by the driver.
    pub params: Vec<SqlVar>,
    /// Cursor name, for positioned updates.
    pub cursor: Option<String>,
}

impl Execution {
    /// Decode parameter `idx` (1-based) as `native`. A null parameter
    /// reads as [`Value::Null`]; `None` when there is no such parameter.
    #[must_use]
    pub fn param(&self, idx: usize, native: NativeType) -> Option<Result<Value, TypeError>> {
        let var = idx.checked_sub(1).and_then(|i| self.params.get(i))?;
        if var.null {
            return Some(Ok(Value::Null));
        }
        Some(decode_value(&var.desc.type_info(), &var.data, native))
    }
}

/// A decoded service manager request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRequest {
    /// Action opcode.
    pub action: u8,
    /// String arguments.
    pub strings: Vec<(u8, String)>,
    /// Integer arguments.
    pub ints: Vec<(u8, i32)>,
    /// Single-byte arguments.
    pub bytes: Vec<(u8, u8)>,
    /// Bare flags.
    pub flags: Vec<u8>,
}

impl ServiceRequest {
    /// First string argument tagged `tag`.
    #[must_use]
    pub fn string(&self, tag: u8) -> Option<&str> {
        self.strings.iter().find(|(t, _)| *t == tag).map(|(_, s)| s.as_str())
    }

    /// First integer argument tagged `tag`.
    #[must_use]
    pub fn int(&self, tag: u8) -> Option<i32> {
        self.ints.iter().find(|(t, _)| *t == tag).map(|(_, v)| *v)
    }

    /// First byte argument tagged `tag`.
    #[must_use]
    pub fn byte(&self, tag: u8) -> Option<u8> {
        self.bytes.iter().find(|(t, _)| *t == tag).map(|(_, v)| *v)
    }

    /// Whether the bare flag `tag` was sent.
    #[must_use]
    pub fn has_flag(&self, tag: u8) -> bool {
        self.flags.contains(&tag)
    }

    /// Decode a request. Argument widths depend on the action.
    fn parse(buf: &[u8]) -> Option<Self> {
        let (&action, mut rest) = buf.split_first()?;
        let mut request = Self {
            action,
            ..Self::default()
        };
        while let Some((&tag, tail)) = rest.split_first() {
            rest = tail;
            match Self::width(action, tag) {
                ArgWidth::Flag => request.flags.push(tag),
                ArgWidth::Byte => {
                    let (&value, tail) = rest.split_first()?;
                    request.bytes.push((tag, value));
                    rest = tail;
                }
                ArgWidth::Quad => {
                    let value = rest.get(..4)?;
                    request.ints.push((tag, vax_integer(value) as i32));
                    rest = &rest[4..];
                }
                ArgWidth::String => {
                    let len = usize::from(u16::from_le_bytes([*rest.first()?, *rest.get(1)?]));
                    let value = rest.get(2..2 + len)?;
                    request
                        .strings
                        .push((tag, String::from_utf8_lossy(value).into_owned()));
                    rest = &rest[2 + len..];
                }
            }
        }
        Some(request)
    }

    fn width(action: u8, tag: u8) -> ArgWidth {
        match (action, tag) {
            (_, spb::VERBOSE) => ArgWidth::Flag,
            (_, spb::OPTIONS) => ArgWidth::Quad,
            (action::ADD_USER | action::MODIFY_USER, spb::SEC_USERID | spb::SEC_GROUPID) => {
                ArgWidth::Quad
            }
            (action::RESTORE, spb::RES_PAGE_SIZE) => ArgWidth::Quad,
            (
                action::PROPERTIES,
                spb::PRP_PAGE_BUFFERS
                | spb::PRP_SWEEP_INTERVAL
                | spb::PRP_SHUTDOWN_DB
                | spb::PRP_DENY_NEW_ATTACHMENTS
                | spb::PRP_DENY_NEW_TRANSACTIONS,
            ) => ArgWidth::Quad,
            (
                action::PROPERTIES,
                spb::PRP_RESERVE_SPACE | spb::PRP_WRITE_MODE | spb::PRP_ACCESS_MODE,
            ) => ArgWidth::Byte,
            _ => ArgWidth::String,
        }
    }
}

enum ArgWidth {
    Flag,
    Byte,
    Quad,
    String,
}

/// Number of live native objects, for leak checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenCounts {
    /// Database attachments.
    pub attachments: usize,
    /// Started transactions.
    pub transactions: usize,
    /// Allocated statements.
    pub statements: usize,
    /// Open blobs.
    pub blobs: usize,
    /// Queued event requests.
    pub event_requests: usize,
    /// Service attachments.
    pub services: usize,
}

#[derive(Debug)]
struct StmtSlot {
    script: Option<MockStatement>,
    sql: String,
    cursor: Option<VecDeque<Vec<Value>>>,
}

#[derive(Debug)]
struct OpenBlob {
    id: Quad,
    tr: TrHandle,
    write: bool,
    segments: Vec<Vec<u8>>,
    segment: usize,
    offset: usize,
}

#[derive(Debug)]
struct EventRequest {
    handle: EventHandle,
    db: DbHandle,
    buffer: Vec<u8>,
    notify: UnboundedSender<EventNotification>,
}

#[derive(Debug, Default)]
struct ServiceSlot {
    output: VecDeque<String>,
    listing: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u32,
    databases: HashMap<String, MockDatabase>,
    attachments: HashMap<DbHandle, String>,
    transactions: HashMap<TrHandle, Vec<DbHandle>>,
    scripts: HashMap<String, MockStatement>,
    statements: HashMap<StmtHandle, StmtSlot>,
    blobs: HashMap<Quad, Vec<Vec<u8>>>,
    open_blobs: HashMap<BlobHandle, OpenBlob>,
    array_columns: HashMap<(String, String), ArrayDesc>,
    arrays: HashMap<Quad, (ArrayDesc, Vec<u8>)>,
    event_counts: HashMap<String, u32>,
    event_requests: Vec<EventRequest>,
    services: HashMap<ServiceHandle, ServiceSlot>,
    users: Vec<User>,
    server_version: String,
    failures: HashMap<&'static str, i64>,
    calls: Vec<&'static str>,
    executions: Vec<Execution>,
    immediate: Vec<String>,
    dpbs: Vec<(String, Vec<u8>)>,
    tpbs: Vec<Vec<Vec<u8>>>,
    service_requests: Vec<ServiceRequest>,
    created: Vec<(String, Dialect)>,
    dropped: Vec<String>,
}

impl MockState {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn next_quad(&mut self) -> Quad {
        let low = self.next();
        Quad::from_parts(0x80, low)
    }

    /// Log `op` and fail if a failure was injected for it.
    fn enter(&mut self, op: &'static str) -> TransportResult<()> {
        self.calls.push(op);
        match self.failures.remove(op) {
            Some(code) => {
                tracing::debug!(op, code, "injected failure");
                Err(fail(code))
            }
            None => Ok(()),
        }
    }

    fn database(&self, db: DbHandle) -> TransportResult<&str> {
        self.attachments
            .get(&db)
            .map(String::as_str)
            .ok_or_else(|| fail(codes::BAD_DB_HANDLE))
    }

    fn transaction(&self, tr: TrHandle) -> TransportResult<()> {
        if self.transactions.contains_key(&tr) {
            Ok(())
        } else {
            Err(fail(codes::BAD_TRANS_HANDLE))
        }
    }

    /// Forget a transaction and the blob handles opened under it.
    fn end_transaction(&mut self, tr: TrHandle) -> TransportResult<()> {
        self.transactions
            .remove(&tr)
            .ok_or_else(|| fail(codes::BAD_TRANS_HANDLE))?;
        self.open_blobs.retain(|_, blob| blob.tr != tr);
        Ok(())
    }

    fn slot(&mut self, stmt: StmtHandle) -> TransportResult<&mut StmtSlot> {
        self.statements
            .get_mut(&stmt)
            .ok_or_else(|| fail(codes::BAD_STMT_HANDLE))
    }

    fn prepared(&mut self, stmt: StmtHandle) -> TransportResult<&mut StmtSlot> {
        let slot = self.slot(stmt)?;
        if slot.script.is_none() {
            return Err(fail(codes::DSQL_ERROR));
        }
        Ok(slot)
    }

    fn run(
        &mut self,
        tr: TrHandle,
        stmt: StmtHandle,
        inputs: Option<&[SqlVar]>,
    ) -> TransportResult<MockStatement> {
        self.transaction(tr)?;
        let slot = self.prepared(stmt)?;
        let script = slot.script.clone().ok_or_else(|| fail(codes::DSQL_ERROR))?;
        let sql = slot.sql.clone();
        if let Some(code) = script.failure {
            return Err(fail(code));
        }
        let params = inputs.map(<[SqlVar]>::to_vec).unwrap_or_default();
        if params.len() != script.params.len() {
            return Err(fail(codes::DSQL_ERROR));
        }
        self.executions.push(Execution {
            sql,
            params,
            cursor: None,
        });
        Ok(script)
    }

    /// Counters the server holds for the events listed in `buffer`,
    /// shaped like `buffer`, and whether any differs from the request.
    fn event_answer(&self, buffer: &[u8]) -> (Vec<u8>, bool) {
        let mut answer = buffer.to_vec();
        let mut fired = false;
        let mut pos = 1;
        while let Some(&len) = buffer.get(pos) {
            let len = usize::from(len);
            let (Some(name), Some(count)) = (
                buffer.get(pos + 1..pos + 1 + len),
                buffer.get(pos + 1 + len..pos + 5 + len),
            ) else {
                break;
            };
            let name = String::from_utf8_lossy(name);
            let current = self.event_counts.get(name.as_ref()).copied().unwrap_or(0);
            if count != current.to_le_bytes() {
                fired = true;
            }
            answer[pos + 1 + len..pos + 5 + len].copy_from_slice(&current.to_le_bytes());
            pos += 5 + len;
        }
        (answer, fired)
    }

    /// Deliver every queued request whose counters moved.
    fn deliver_events(&mut self) {
        let requests = std::mem::take(&mut self.event_requests);
        for request in requests {
            let (counts, fired) = self.event_answer(&request.buffer);
            if !fired {
                self.event_requests.push(request);
                continue;
            }
            tracing::debug!(queue = ?request.handle, "event request fired");
            let notification = EventNotification {
                queue: request.handle,
                counts,
            };
            if request.notify.send(notification).is_err() {
                tracing::debug!(queue = ?request.handle, "event receiver gone");
            }
        }
    }

    fn apply_service(&mut self, slot: ServiceHandle, request: &ServiceRequest) -> TransportResult<()> {
        let username = request.string(spb::SEC_USERNAME).map(str::to_string);
        let mut output = VecDeque::new();
        let mut listing = Vec::new();
        match request.action {
            action::ADD_USER => {
                let name = username.ok_or_else(|| fail(codes::DSQL_ERROR))?;
                if self.users.iter().any(|u| u.username == name) {
                    return Err(fail(codes::UNIQUE_KEY_VIOLATION));
                }
                let mut user = User::new(name);
                fill_user(&mut user, request);
                self.users.push(user);
            }
            action::MODIFY_USER => {
                let name = username.ok_or_else(|| fail(codes::DSQL_ERROR))?;
                let user = self
                    .users
                    .iter_mut()
                    .find(|u| u.username == name)
                    .ok_or_else(|| fail(codes::USER_NOT_FOUND))?;
                fill_user(user, request);
            }
            action::DELETE_USER => {
                let name = username.ok_or_else(|| fail(codes::DSQL_ERROR))?;
                let before = self.users.len();
                self.users.retain(|u| u.username != name);
                if self.users.len() == before {
                    return Err(fail(codes::USER_NOT_FOUND));
                }
            }
            action::DISPLAY_USER => {
                for user in self
                    .users
                    .iter()
                    .filter(|u| username.as_ref().is_none_or(|name| &u.username == name))
                {
                    encode_user(&mut listing, user);
                }
            }
            action::BACKUP | action::RESTORE => {
                if request.has_flag(spb::VERBOSE) {
                    let file = request.string(spb::DBNAME).unwrap_or_default();
                    output.push_back(format!("gbak: readied database {file}"));
                    output.push_back("gbak: writing domains".to_string());
                    output.push_back("gbak: closing file, committing, and finishing".to_string());
                }
            }
            action::PROPERTIES | action::REPAIR => {}
            _ => return Err(fail(codes::DSQL_ERROR)),
        }
        let slot = self
            .services
            .get_mut(&slot)
            .ok_or_else(|| fail(codes::BAD_SVC_HANDLE))?;
        slot.output = output;
        slot.listing = listing;
        Ok(())
    }
}

fn fill_user(user: &mut User, request: &ServiceRequest) {
    if let Some(v) = request.string(spb::SEC_PASSWORD) {
        user.password = v.to_string();
    }
    if let Some(v) = request.string(spb::SEC_FIRSTNAME) {
        user.firstname = v.to_string();
    }
    if let Some(v) = request.string(spb::SEC_MIDDLENAME) {
        user.middlename = v.to_string();
    }
    if let Some(v) = request.string(spb::SEC_LASTNAME) {
        user.lastname = v.to_string();
    }
    if let Some(v) = request.int(spb::SEC_USERID) {
        user.userid = v as u32;
    }
    if let Some(v) = request.int(spb::SEC_GROUPID) {
        user.groupid = v as u32;
    }
}

/// Append a user in the security database listing layout.
fn encode_user(out: &mut Vec<u8>, user: &User) {
    let mut text = |tag: u8, value: &str| {
        out.push(tag);
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
        out.extend_from_slice(value.as_bytes());
    };
    text(spb::SEC_USERNAME, &user.username);
    text(spb::SEC_FIRSTNAME, &user.firstname);
    text(spb::SEC_MIDDLENAME, &user.middlename);
    text(spb::SEC_LASTNAME, &user.lastname);
    out.push(spb::SEC_USERID);
    out.extend_from_slice(&user.userid.to_le_bytes());
    out.push(spb::SEC_GROUPID);
    out.extend_from_slice(&user.groupid.to_le_bytes());
}

/// Write `row` into `vars`.
fn fill_row(vars: &mut [SqlVar], row: &[Value]) -> TransportResult<()> {
    for (var, value) in vars.iter_mut().zip(row) {
        let info = var.desc.type_info();
        var.data = info.blank();
        if value.is_null() {
            var.null = true;
            continue;
        }
        encode_value(&info, value, &mut var.data).map_err(|_| fail(codes::CONVERSION_ERROR))?;
        var.null = false;
    }
    Ok(())
}

/// Element positions, in the declared array, of the slice `wanted`,
/// in row-major order.
fn slice_positions(declared: &ArrayDesc, wanted: &ArrayDesc) -> Option<Vec<usize>> {
    if declared.bounds.len() != wanted.bounds.len() {
        return None;
    }
    let mut positions = vec![0usize];
    for (decl, want) in declared.bounds.iter().zip(&wanted.bounds) {
        if !decl.contains(want) {
            return None;
        }
        let extent = decl.len().ok()?;
        positions = positions
            .into_iter()
            .flat_map(|base| {
                (want.lower..=want.upper).map(move |i| base * extent + (i - decl.lower) as usize)
            })
            .collect();
    }
    Some(positions)
}

/// In-memory [`Transport`].
#[derive(Debug, Default)]
pub struct MockTransport {
    shared: Arc<Mutex<MockState>>,
    catalogue: Arc<MockCatalogue>,
}

impl MockTransport {
    /// An empty server.
    #[must_use]
    pub fn new() -> Self {
        let transport = Self::default();
        transport.shared.lock().server_version = "WI-V2.5.9.27139 Firebird 2.5".to_string();
        transport
    }

    /// A handle sharing this server's state.
    #[must_use]
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Control and inspection side of a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Register a database under its connection string (`[server:]path`).
    pub fn add_database(&self, connection: impl Into<String>, database: MockDatabase) {
        self.shared.lock().databases.insert(connection.into(), database);
    }

    /// Answer `sql` with `statement`.
    pub fn script(&self, sql: impl Into<String>, statement: MockStatement) {
        let sql = sql.into();
        self.shared
            .lock()
            .scripts
            .insert(sql.trim().to_string(), statement);
    }

    /// Declare an array column.
    pub fn add_array_column(&self, desc: ArrayDesc) {
        let key = (desc.relation_name.clone(), desc.field_name.clone());
        self.shared.lock().array_columns.insert(key, desc);
    }

    /// Store a blob and return its id.
    pub fn insert_blob(&self, segments: Vec<Vec<u8>>) -> Quad {
        let mut state = self.shared.lock();
        let id = state.next_quad();
        state.blobs.insert(id, segments);
        id
    }

    /// Concatenated content of blob `id`.
    #[must_use]
    pub fn blob(&self, id: Quad) -> Option<Vec<u8>> {
        self.shared.lock().blobs.get(&id).map(|s| s.concat())
    }

    /// Segments of blob `id`.
    #[must_use]
    pub fn blob_segments(&self, id: Quad) -> Option<Vec<Vec<u8>>> {
        self.shared.lock().blobs.get(&id).cloned()
    }

    /// Add a user to the security database.
    pub fn add_user(&self, user: User) {
        self.shared.lock().users.push(user);
    }

    /// Users of the security database.
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.shared.lock().users.clone()
    }

    /// Set the reported server version.
    pub fn set_server_version(&self, version: impl Into<String>) {
        self.shared.lock().server_version = version.into();
    }

    /// Make the next call to `op` (a [`Transport`] method name, e.g.
    /// `"commit"`) fail with `code`.
    pub fn fail_next(&self, op: &'static str, code: i64) {
        self.shared.lock().failures.insert(op, code);
    }

    /// Post `name` `times` times and deliver the requests that fire.
    pub fn post_event(&self, name: &str, times: u32) {
        let mut state = self.shared.lock();
        *state.event_counts.entry(name.to_string()).or_insert(0) += times;
        state.deliver_events();
    }

    /// Transport methods called so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.shared.lock().calls.clone()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        self.shared.lock().calls.clear();
    }

    /// Executions so far.
    #[must_use]
    pub fn executions(&self) -> Vec<Execution> {
        self.shared.lock().executions.clone()
    }

    /// Statements run through execute-immediate.
    #[must_use]
    pub fn immediate(&self) -> Vec<String> {
        self.shared.lock().immediate.clone()
    }

    /// Attach requests: connection string and DPB bytes.
    #[must_use]
    pub fn attachments(&self) -> Vec<(String, Vec<u8>)> {
        self.shared.lock().dpbs.clone()
    }

    /// TPB bytes of every transaction start, one per database.
    #[must_use]
    pub fn transaction_blocks(&self) -> Vec<Vec<Vec<u8>>> {
        self.shared.lock().tpbs.clone()
    }

    /// Service requests decoded so far.
    #[must_use]
    pub fn service_requests(&self) -> Vec<ServiceRequest> {
        self.shared.lock().service_requests.clone()
    }

    /// `CREATE DATABASE` statements seen, with their dialect.
    #[must_use]
    pub fn created(&self) -> Vec<(String, Dialect)> {
        self.shared.lock().created.clone()
    }

    /// Connection strings of dropped databases.
    #[must_use]
    pub fn dropped(&self) -> Vec<String> {
        self.shared.lock().dropped.clone()
    }

    /// Live native objects.
    #[must_use]
    pub fn open_counts(&self) -> OpenCounts {
        let state = self.shared.lock();
        OpenCounts {
            attachments: state.attachments.len(),
            transactions: state.transactions.len(),
            statements: state.statements.len(),
            blobs: state.open_blobs.len(),
            event_requests: state.event_requests.len(),
            services: state.services.len(),
        }
    }
}

impl Transport for MockTransport {
    fn interpreter(&self) -> Interpreter {
        self.catalogue.clone()
    }

    fn attach_database(
        &mut self,
        connection: &str,
        dpb: &ParamBlock<Dpb>,
    ) -> TransportResult<DbHandle> {
        let mut state = self.shared.lock();
        state.enter("attach_database")?;
        state
            .dpbs
            .push((connection.to_string(), dpb.as_bytes().to_vec()));
        if !state.databases.contains_key(connection) {
            return Err(fail(codes::IO_ERROR));
        }
        let handle = DbHandle(state.next());
        state.attachments.insert(handle, connection.to_string());
        Ok(handle)
    }

    fn create_database(&mut self, sql: &str, dialect: Dialect) -> TransportResult<DbHandle> {
        let mut state = self.shared.lock();
        state.enter("create_database")?;
        let path = sql
            .split('\'')
            .nth(1)
            .ok_or_else(|| fail(codes::DSQL_ERROR))?
            .to_string();
        if state.databases.contains_key(&path) {
            return Err(fail(codes::IO_ERROR));
        }
        let database = MockDatabase::default().dialect(i32::from(dialect.as_u16()));
        state.databases.insert(path.clone(), database);
        state.created.push((sql.to_string(), dialect));
        let handle = DbHandle(state.next());
        state.attachments.insert(handle, path);
        Ok(handle)
    }

    fn detach_database(&mut self, db: DbHandle) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("detach_database")?;
        state
            .attachments
            .remove(&db)
            .map(drop)
            .ok_or_else(|| fail(codes::BAD_DB_HANDLE))
    }

    fn drop_database(&mut self, db: DbHandle) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("drop_database")?;
        let path = state
            .attachments
            .remove(&db)
            .ok_or_else(|| fail(codes::BAD_DB_HANDLE))?;
        state.databases.remove(&path);
        state.dropped.push(path);
        Ok(())
    }

    fn database_info(&mut self, db: DbHandle, items: &[u8]) -> TransportResult<ResultBlock> {
        let mut state = self.shared.lock();
        state.enter("database_info")?;
        let path = state.database(db)?;
        let database = state
            .databases
            .get(path)
            .ok_or_else(|| fail(codes::BAD_DB_HANDLE))?;
        Ok(database.info(items))
    }

    fn start_multiple(
        &mut self,
        targets: &[(DbHandle, &ParamBlock<Tpb>)],
    ) -> TransportResult<TrHandle> {
        let mut state = self.shared.lock();
        state.enter("start_multiple")?;
        for (db, _) in targets {
            state.database(*db)?;
        }
        state
            .tpbs
            .push(targets.iter().map(|(_, tpb)| tpb.as_bytes().to_vec()).collect());
        let handle = TrHandle(state.next());
        state
            .transactions
            .insert(handle, targets.iter().map(|(db, _)| *db).collect());
        Ok(handle)
    }

    fn commit(&mut self, tr: TrHandle) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("commit")?;
        state.end_transaction(tr)
    }

    fn commit_retaining(&mut self, tr: TrHandle) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("commit_retaining")?;
        state.transaction(tr)
    }

    fn rollback(&mut self, tr: TrHandle) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("rollback")?;
        state.end_transaction(tr)
    }

    fn rollback_retaining(&mut self, tr: TrHandle) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("rollback_retaining")?;
        state.transaction(tr)
    }

    fn dsql_allocate_statement(&mut self, db: DbHandle) -> TransportResult<StmtHandle> {
        let mut state = self.shared.lock();
        state.enter("dsql_allocate_statement")?;
        state.database(db)?;
        let handle = StmtHandle(state.next());
        state.statements.insert(
            handle,
            StmtSlot {
                script: None,
                sql: String::new(),
                cursor: None,
            },
        );
        Ok(handle)
    }

    fn dsql_prepare(
        &mut self,
        tr: TrHandle,
        stmt: StmtHandle,
        sql: &str,
        _dialect: Dialect,
        capacity: usize,
    ) -> TransportResult<Described> {
        let mut state = self.shared.lock();
        state.enter("dsql_prepare")?;
        state.transaction(tr)?;
        let script = state
            .scripts
            .get(sql.trim())
            .cloned()
            .ok_or_else(|| fail(codes::DSQL_ERROR))?;
        let described = MockStatement::describe(&script.columns, capacity);
        let slot = state.slot(stmt)?;
        slot.sql = sql.trim().to_string();
        slot.script = Some(script);
        slot.cursor = None;
        Ok(described)
    }

    fn dsql_describe(&mut self, stmt: StmtHandle, capacity: usize) -> TransportResult<Described> {
        let mut state = self.shared.lock();
        state.enter("dsql_describe")?;
        let slot = state.prepared(stmt)?;
        let columns = slot.script.as_ref().map(|s| s.columns.as_slice()).unwrap_or_default();
        Ok(MockStatement::describe(columns, capacity))
    }

    fn dsql_describe_bind(
        &mut self,
        stmt: StmtHandle,
        capacity: usize,
    ) -> TransportResult<Described> {
        let mut state = self.shared.lock();
        state.enter("dsql_describe_bind")?;
        let slot = state.prepared(stmt)?;
        let params = slot.script.as_ref().map(|s| s.params.as_slice()).unwrap_or_default();
        Ok(MockStatement::describe(params, capacity))
    }

    fn dsql_sql_info(&mut self, stmt: StmtHandle, items: &[u8]) -> TransportResult<ResultBlock> {
        let mut state = self.shared.lock();
        state.enter("dsql_sql_info")?;
        let slot = state.prepared(stmt)?;
        Ok(slot
            .script
            .as_ref()
            .map(|s| s.info(items))
            .unwrap_or_default())
    }

    fn dsql_execute(
        &mut self,
        tr: TrHandle,
        stmt: StmtHandle,
        inputs: Option<&[SqlVar]>,
    ) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("dsql_execute")?;
        let script = state.run(tr, stmt, inputs)?;
        let slot = state.slot(stmt)?;
        slot.cursor = script
            .is_cursor()
            .then(|| script.rows.iter().cloned().collect());
        Ok(())
    }

    fn dsql_execute2(
        &mut self,
        tr: TrHandle,
        stmt: StmtHandle,
        inputs: Option<&[SqlVar]>,
        outputs: Option<&mut [SqlVar]>,
    ) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("dsql_execute2")?;
        let script = state.run(tr, stmt, inputs)?;
        if let (Some(outputs), Some(row)) = (outputs, script.rows.first()) {
            fill_row(outputs, row)?;
        }
        Ok(())
    }

    fn dsql_fetch(
        &mut self,
        stmt: StmtHandle,
        outputs: &mut [SqlVar],
    ) -> TransportResult<FetchStatus> {
        let mut state = self.shared.lock();
        state.enter("dsql_fetch")?;
        let slot = state.prepared(stmt)?;
        let cursor = slot
            .cursor
            .as_mut()
            .ok_or_else(|| fail(codes::CURSOR_NOT_OPEN))?;
        match cursor.pop_front() {
            Some(row) => {
                fill_row(outputs, &row)?;
                Ok(FetchStatus::Row)
            }
            None => Ok(FetchStatus::NoMoreRows),
        }
    }

    fn dsql_set_cursor_name(&mut self, stmt: StmtHandle, name: &str) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("dsql_set_cursor_name")?;
        let slot = state.prepared(stmt)?;
        if slot.cursor.is_none() {
            return Err(fail(codes::CURSOR_NOT_OPEN));
        }
        let sql = slot.sql.clone();
        if let Some(execution) = state.executions.iter_mut().rev().find(|e| e.sql == sql) {
            execution.cursor = Some(name.to_string());
        }
        Ok(())
    }

    fn dsql_free_statement(&mut self, stmt: StmtHandle, option: FreeOption) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("dsql_free_statement")?;
        match option {
            FreeOption::Close => {
                state.slot(stmt)?.cursor = None;
                Ok(())
            }
            FreeOption::Drop => state
                .statements
                .remove(&stmt)
                .map(drop)
                .ok_or_else(|| fail(codes::BAD_STMT_HANDLE)),
        }
    }

    fn dsql_execute_immediate(
        &mut self,
        db: DbHandle,
        tr: TrHandle,
        sql: &str,
        _dialect: Dialect,
    ) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("dsql_execute_immediate")?;
        state.database(db)?;
        state.transaction(tr)?;
        if let Some(code) = state.scripts.get(sql.trim()).and_then(|s| s.failure) {
            return Err(fail(code));
        }
        state.immediate.push(sql.to_string());
        Ok(())
    }

    fn create_blob2(&mut self, db: DbHandle, tr: TrHandle) -> TransportResult<(BlobHandle, Quad)> {
        let mut state = self.shared.lock();
        state.enter("create_blob2")?;
        state.database(db)?;
        state.transaction(tr)?;
        let id = state.next_quad();
        let handle = BlobHandle(state.next());
        state.open_blobs.insert(
            handle,
            OpenBlob {
                id,
                tr,
                write: true,
                segments: Vec::new(),
                segment: 0,
                offset: 0,
            },
        );
        Ok((handle, id))
    }

    fn open_blob2(&mut self, db: DbHandle, tr: TrHandle, id: Quad) -> TransportResult<BlobHandle> {
        let mut state = self.shared.lock();
        state.enter("open_blob2")?;
        state.database(db)?;
        state.transaction(tr)?;
        let segments = state
            .blobs
            .get(&id)
            .cloned()
            .ok_or_else(|| fail(codes::BAD_SEGSTR_ID))?;
        let handle = BlobHandle(state.next());
        state.open_blobs.insert(
            handle,
            OpenBlob {
                id,
                tr,
                write: false,
                segments,
                segment: 0,
                offset: 0,
            },
        );
        Ok(handle)
    }

    fn get_segment(&mut self, blob: BlobHandle, max: usize) -> TransportResult<Segment> {
        let mut state = self.shared.lock();
        state.enter("get_segment")?;
        let open = state
            .open_blobs
            .get_mut(&blob)
            .filter(|b| !b.write)
            .ok_or_else(|| fail(codes::BAD_SEGSTR_HANDLE))?;
        let Some(segment) = open.segments.get(open.segment) else {
            return Ok(Segment::Eof);
        };
        let rest = &segment[open.offset.min(segment.len())..];
        if rest.len() <= max {
            let data = rest.to_vec();
            open.segment += 1;
            open.offset = 0;
            Ok(Segment::Complete(data))
        } else {
            let data = rest[..max].to_vec();
            open.offset += max;
            Ok(Segment::Partial(data))
        }
    }

    fn put_segment(&mut self, blob: BlobHandle, data: &[u8]) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("put_segment")?;
        let open = state
            .open_blobs
            .get_mut(&blob)
            .filter(|b| b.write)
            .ok_or_else(|| fail(codes::BAD_SEGSTR_HANDLE))?;
        open.segments.push(data.to_vec());
        Ok(())
    }

    fn close_blob(&mut self, blob: BlobHandle) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("close_blob")?;
        let open = state
            .open_blobs
            .remove(&blob)
            .ok_or_else(|| fail(codes::BAD_SEGSTR_HANDLE))?;
        if open.write {
            state.blobs.insert(open.id, open.segments);
        }
        Ok(())
    }

    fn cancel_blob(&mut self, blob: BlobHandle) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("cancel_blob")?;
        state
            .open_blobs
            .remove(&blob)
            .map(drop)
            .ok_or_else(|| fail(codes::BAD_SEGSTR_HANDLE))
    }

    fn blob_info(&mut self, blob: BlobHandle, items: &[u8]) -> TransportResult<ResultBlock> {
        let mut state = self.shared.lock();
        state.enter("blob_info")?;
        let open = state
            .open_blobs
            .get(&blob)
            .ok_or_else(|| fail(codes::BAD_SEGSTR_HANDLE))?;
        let total: usize = open.segments.iter().map(Vec::len).sum();
        let largest = open.segments.iter().map(Vec::len).max().unwrap_or(0);
        let mut block = ResultBlock::builder();
        for &item in items {
            block = match item {
                info::blob::TOTAL_LENGTH => block.int(item, total as i32),
                info::blob::MAX_SEGMENT => block.int(item, largest as i32),
                info::blob::NUM_SEGMENTS => block.int(item, open.segments.len() as i32),
                info::blob::TYPE => block.byte(item, 0),
                _ => block,
            };
        }
        Ok(block.build())
    }

    fn array_lookup_bounds(
        &mut self,
        db: DbHandle,
        tr: TrHandle,
        table: &str,
        column: &str,
    ) -> TransportResult<ArrayDesc> {
        let mut state = self.shared.lock();
        state.enter("array_lookup_bounds")?;
        state.database(db)?;
        state.transaction(tr)?;
        state
            .array_columns
            .get(&(table.to_string(), column.to_string()))
            .cloned()
            .ok_or_else(|| fail(codes::FIELD_NOT_FOUND))
    }

    fn array_get_slice(
        &mut self,
        db: DbHandle,
        tr: TrHandle,
        id: Quad,
        desc: &ArrayDesc,
    ) -> TransportResult<Vec<u8>> {
        let mut state = self.shared.lock();
        state.enter("array_get_slice")?;
        state.database(db)?;
        state.transaction(tr)?;
        let (declared, data) = state
            .arrays
            .get(&id)
            .ok_or_else(|| fail(codes::BAD_SEGSTR_ID))?;
        let positions = slice_positions(declared, desc).ok_or_else(|| fail(codes::DSQL_ERROR))?;
        let size = declared.element_size();
        let mut slice = Vec::with_capacity(positions.len() * size);
        for pos in positions {
            let cell = data
                .get(pos * size..(pos + 1) * size)
                .ok_or_else(|| fail(codes::DSQL_ERROR))?;
            slice.extend_from_slice(cell);
        }
        Ok(slice)
    }

    fn array_put_slice(
        &mut self,
        db: DbHandle,
        tr: TrHandle,
        id: Option<Quad>,
        desc: &ArrayDesc,
        data: &[u8],
    ) -> TransportResult<Quad> {
        let mut state = self.shared.lock();
        state.enter("array_put_slice")?;
        state.database(db)?;
        state.transaction(tr)?;
        let (declared, mut stored) = match id.and_then(|id| state.arrays.get(&id)) {
            Some((declared, stored)) => (declared.clone(), stored.clone()),
            None => {
                let declared = state
                    .array_columns
                    .get(&(desc.relation_name.clone(), desc.field_name.clone()))
                    .cloned()
                    .ok_or_else(|| fail(codes::FIELD_NOT_FOUND))?;
                let blank = TypeInfo::element(&declared).blank();
                let count = declared
                    .element_count()
                    .map_err(|_| fail(codes::DSQL_ERROR))?;
                let stored = blank.repeat(count);
                (declared, stored)
            }
        };
        let positions = slice_positions(&declared, desc).ok_or_else(|| fail(codes::DSQL_ERROR))?;
        let size = declared.element_size();
        if data.len() != positions.len() * size {
            return Err(fail(codes::DSQL_ERROR));
        }
        for (pos, cell) in positions.into_iter().zip(data.chunks_exact(size)) {
            stored
                .get_mut(pos * size..(pos + 1) * size)
                .ok_or_else(|| fail(codes::DSQL_ERROR))?
                .copy_from_slice(cell);
        }
        let new_id = state.next_quad();
        state.arrays.insert(new_id, (declared, stored));
        Ok(new_id)
    }

    fn que_events(
        &mut self,
        db: DbHandle,
        events: &[u8],
        notify: UnboundedSender<EventNotification>,
    ) -> TransportResult<EventHandle> {
        let mut state = self.shared.lock();
        state.enter("que_events")?;
        state.database(db)?;
        let handle = EventHandle(state.next());
        state.event_requests.push(EventRequest {
            handle,
            db,
            buffer: events.to_vec(),
            notify,
        });
        state.deliver_events();
        Ok(handle)
    }

    fn cancel_events(&mut self, db: DbHandle, queue: EventHandle) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("cancel_events")?;
        state.database(db)?;
        // A request that already fired is gone; cancelling it is harmless.
        state
            .event_requests
            .retain(|r| !(r.handle == queue && r.db == db));
        Ok(())
    }

    fn service_attach(
        &mut self,
        _connection: &str,
        _spb: &ParamBlock<Spb>,
    ) -> TransportResult<ServiceHandle> {
        let mut state = self.shared.lock();
        state.enter("service_attach")?;
        let handle = ServiceHandle(state.next());
        state.services.insert(handle, ServiceSlot::default());
        Ok(handle)
    }

    fn service_detach(&mut self, svc: ServiceHandle) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("service_detach")?;
        state
            .services
            .remove(&svc)
            .map(drop)
            .ok_or_else(|| fail(codes::BAD_SVC_HANDLE))
    }

    fn service_start(&mut self, svc: ServiceHandle, spb: &ParamBlock<Spb>) -> TransportResult<()> {
        let mut state = self.shared.lock();
        state.enter("service_start")?;
        if !state.services.contains_key(&svc) {
            return Err(fail(codes::BAD_SVC_HANDLE));
        }
        let request = ServiceRequest::parse(spb.as_bytes()).ok_or_else(|| fail(codes::DSQL_ERROR))?;
        state.service_requests.push(request.clone());
        state.apply_service(svc, &request)
    }

    fn service_query(&mut self, svc: ServiceHandle, items: &[u8]) -> TransportResult<ResultBlock> {
        let mut state = self.shared.lock();
        state.enter("service_query")?;
        let version = state.server_version.clone();
        let slot = state
            .services
            .get_mut(&svc)
            .ok_or_else(|| fail(codes::BAD_SVC_HANDLE))?;
        let mut block = ResultBlockBuilder::default();
        for &item in items {
            block = match item {
                info::svc::SERVER_VERSION => block.string(item, &version),
                info::svc::LINE => block.string(item, &slot.output.pop_front().unwrap_or_default()),
                info::svc::GET_USERS => block.raw(item, &std::mem::take(&mut slot.listing)),
                _ => block,
            };
        }
        Ok(block.build())
    }
}
