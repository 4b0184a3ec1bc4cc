//! Prepared statements and forward-only cursors.
//!
//! A statement is bound to one database and one transaction. Preparing it
//! describes its input parameters and output columns into two [`Row`]s,
//! either of which is absent when the statement has none. Parameters are
//! written with [`Statement::set`] and columns read with
//! [`Statement::get`]; slots are numbered from 1.
//!
//! `String` and byte values written to a BLOB parameter are stored in a
//! new blob whose id is bound instead, and reading a BLOB column as a
//! `String` or `Vec<u8>` loads the blob.

use ibpp_protocol::{info, Dialect, SqlType, StatementType};
use ibpp_types::{FromSql, NativeType, SqlDataType, ToSql, Value};

use crate::arena::{DatabaseKey, StatementKey, TransactionKey};
use crate::client::Client;
use crate::error::{Error, Result, ServerError};
use crate::instrumentation::{attributes, span_names, statement_span};
use crate::row::Row;
use crate::transport::{DbHandle, Described, FetchStatus, FreeOption, StmtHandle, TrHandle};

#[derive(Debug, Default)]
pub(crate) struct StatementState {
    pub(crate) handle: Option<StmtHandle>,
    pub(crate) database: Option<DatabaseKey>,
    pub(crate) transaction: Option<TransactionKey>,
    pub(crate) sql: String,
    pub(crate) kind: StatementType,
    pub(crate) inputs: Option<Row>,
    pub(crate) outputs: Option<Row>,
    pub(crate) result_available: bool,
    pub(crate) cursor_opened: bool,
}

impl StatementState {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

/// Initial describe capacities guessed from the SQL text.
///
/// Counting `?` and `,` is wrong as soon as literals contain them; the
/// guess only sizes the first describe, which is repeated when the server
/// reports more slots.
fn estimate_slots(sql: &str) -> (usize, usize) {
    let inputs = sql.bytes().filter(|&b| b == b'?').count();
    let outputs = 1 + sql.bytes().filter(|&b| b == b',').count();
    (inputs, outputs)
}

/// Everything a server call on a statement needs.
#[derive(Debug, Clone, Copy)]
struct Targets {
    db: DbHandle,
    tr: TrHandle,
    dialect: Dialect,
}

impl Client {
    pub(crate) fn stmt(&self, key: StatementKey) -> Result<&StatementState> {
        self.statements
            .get(key)
            .ok_or(Error::InvalidHandle("statement"))
    }

    pub(crate) fn stmt_mut(&mut self, key: StatementKey) -> Result<&mut StatementState> {
        self.statements
            .get_mut(key)
            .ok_or(Error::InvalidHandle("statement"))
    }

    pub(crate) fn link_statement_database(&mut self, key: StatementKey, db: DatabaseKey) -> Result<()> {
        self.db_mut(db)?.statements.push(key);
        self.stmt_mut(key)?.database = Some(db);
        Ok(())
    }

    pub(crate) fn link_statement_transaction(
        &mut self,
        key: StatementKey,
        tr: TransactionKey,
    ) -> Result<()> {
        self.tr_mut(tr)?.statements.push(key);
        self.stmt_mut(key)?.transaction = Some(tr);
        Ok(())
    }

    pub(crate) fn unlink_statement_database(&mut self, key: StatementKey) {
        let Some(db) = self.statements.get_mut(key).and_then(|s| s.database.take()) else {
            return;
        };
        if let Some(state) = self.databases.get_mut(db) {
            state.statements.retain(|s| *s != key);
        }
    }

    pub(crate) fn unlink_statement_transaction(&mut self, key: StatementKey) {
        let Some(tr) = self.statements.get_mut(key).and_then(|s| s.transaction.take()) else {
            return;
        };
        if let Some(state) = self.transactions.get_mut(tr) {
            state.statements.retain(|s| *s != key);
        }
    }

    /// Close, then unlink from the database.
    pub(crate) fn detach_statement_database(&mut self, key: StatementKey) -> Result<()> {
        let closed = self.close_statement(key);
        self.unlink_statement_database(key);
        closed
    }

    /// Close, then unlink from the transaction.
    pub(crate) fn detach_statement_transaction(&mut self, key: StatementKey) -> Result<()> {
        let closed = self.close_statement(key);
        self.unlink_statement_transaction(key);
        closed
    }

    /// Forget the prepared state and release the server handle.
    pub(crate) fn close_statement(&mut self, key: StatementKey) -> Result<()> {
        let state = self.stmt_mut(key)?;
        state.inputs = None;
        state.outputs = None;
        state.result_available = false;
        state.cursor_opened = false;
        state.kind = StatementType::Unknown;
        let Some(handle) = state.handle.take() else {
            return Ok(());
        };
        self.transport
            .dsql_free_statement(handle, FreeOption::Drop)
            .map_err(|status| self.server_error("Statement::Close", status))
    }

    /// Close the open cursor, if any, keeping the statement prepared.
    fn cursor_free(&mut self, key: StatementKey) -> Result<()> {
        let state = self.stmt_mut(key)?;
        if !state.cursor_opened {
            return Ok(());
        }
        state.cursor_opened = false;
        let Some(handle) = state.handle else {
            return Ok(());
        };
        self.transport
            .dsql_free_statement(handle, FreeOption::Close)
            .map_err(|status| self.server_error("Statement::CursorFree", status))
    }

    fn statement_targets(&self, context: &'static str, key: StatementKey) -> Result<Targets> {
        let state = self.stmt(key)?;
        let db = self.connected_db(context, state.database)?;
        let tr = self.started_tr(context, state.transaction)?;
        let dialect = state
            .database
            .and_then(|k| self.databases.get(k))
            .map_or(Dialect::V3, |d| d.dialect);
        Ok(Targets { db, tr, dialect })
    }

    fn prepared_handle(&self, context: &'static str, key: StatementKey) -> Result<StmtHandle> {
        self.stmt(key)?
            .handle
            .ok_or_else(|| Error::logic(context, "No statement has been prepared."))
    }

    fn describe_all(
        &mut self,
        handle: StmtHandle,
        first: Described,
        bind: bool,
    ) -> Result<Described> {
        if first.total <= first.columns.len() {
            return Ok(first);
        }
        tracing::trace!(total = first.total, bind, "describing again with full capacity");
        let again = if bind {
            self.transport.dsql_describe_bind(handle, first.total)
        } else {
            self.transport.dsql_describe(handle, first.total)
        };
        again.map_err(|status| self.server_error("Statement::Prepare", status))
    }

    fn prepare_statement(&mut self, key: StatementKey, sql: &str) -> Result<()> {
        const CONTEXT: &str = "Statement::Prepare";
        let targets = self.statement_targets(CONTEXT, key)?;
        if sql.is_empty() {
            return Err(Error::logic(CONTEXT, "SQL statement can't be empty."));
        }
        self.close_statement(key)?;
        self.stmt_mut(key)?.sql = sql.to_string();

        let span = statement_span(span_names::PREPARE, &self.config.instrumentation, sql);
        let _enter = span.enter();

        let handle = self
            .transport
            .dsql_allocate_statement(targets.db)
            .map_err(|status| self.server_error(CONTEXT, status))?;
        self.stmt_mut(key)?.handle = Some(handle);

        let prepared = self.describe_statement(key, handle, targets, sql);
        if prepared.is_err() {
            if let Err(e) = self.close_statement(key) {
                tracing::warn!(error = %e, "close after failed prepare");
            }
        }
        prepared
    }

    fn describe_statement(
        &mut self,
        key: StatementKey,
        handle: StmtHandle,
        targets: Targets,
        sql: &str,
    ) -> Result<()> {
        const CONTEXT: &str = "Statement::Prepare";
        let (input_hint, output_hint) = estimate_slots(sql);

        let described = match self.transport.dsql_prepare(
            targets.tr,
            handle,
            sql,
            targets.dialect,
            output_hint,
        ) {
            Ok(described) => described,
            Err(status) => {
                let source = ServerError::new(CONTEXT, status, self.transport.interpreter());
                return Err(Error::PrepareFailed {
                    sql: sql.to_string(),
                    source,
                });
            }
        };

        let block = self
            .transport
            .dsql_sql_info(handle, &[info::sql::STMT_TYPE, info::END])
            .map_err(|status| self.server_error(CONTEXT, status))?;
        let kind = StatementType::from_code(block.get_value(info::sql::STMT_TYPE)?);
        if matches!(kind, StatementType::Unknown | StatementType::Unsupported) {
            return Err(Error::logic(CONTEXT, "Unknown or unsupported statement type"));
        }

        let outputs = self.describe_all(handle, described, false)?;
        let bind = self
            .transport
            .dsql_describe_bind(handle, input_hint)
            .map_err(|status| self.server_error(CONTEXT, status))?;
        let inputs = self.describe_all(handle, bind, true)?;

        let state = self.stmt_mut(key)?;
        state.kind = kind;
        state.outputs = (!outputs.columns.is_empty())
            .then(|| Row::new(outputs.columns, targets.dialect));
        state.inputs = (!inputs.columns.is_empty()).then(|| {
            let mut row = Row::new(inputs.columns, targets.dialect);
            row.force_nullable();
            row
        });
        tracing::debug!(
            statement_kind = ?kind,
            parameters = state.inputs.as_ref().map_or(0, Row::columns),
            columns = state.outputs.as_ref().map_or(0, Row::columns),
            "statement prepared"
        );
        Ok(())
    }

    pub(crate) fn statement_affected_rows(
        &mut self,
        context: &'static str,
        key: StatementKey,
    ) -> Result<i64> {
        let handle = self.prepared_handle(context, key)?;
        let state = self.stmt(key)?;
        self.connected_db(context, state.database)?;
        let counter = match state.kind {
            StatementType::Select | StatementType::SelectUpdate => info::req::SELECT_COUNT,
            StatementType::Insert => info::req::INSERT_COUNT,
            StatementType::Update => info::req::UPDATE_COUNT,
            StatementType::Delete => info::req::DELETE_COUNT,
            _ => return Ok(0),
        };
        let block = self
            .transport
            .dsql_sql_info(handle, &[info::sql::RECORDS, info::END])
            .map_err(|status| self.server_error(context, status))?;
        Ok(block.get_subvalue(info::sql::RECORDS, counter)?)
    }

    fn execute_statement(&mut self, key: StatementKey) -> Result<()> {
        const CONTEXT: &str = "Statement::Execute";
        let handle = self.prepared_handle(CONTEXT, key)?;
        let targets = self.statement_targets(CONTEXT, key)?;
        let state = self.stmt(key)?;
        if let Some(missing) = state
            .inputs
            .as_ref()
            .map(Row::missing_values)
            .filter(|&n| n > 0)
        {
            return Err(Error::MissingParameters {
                context: CONTEXT,
                missing,
            });
        }
        self.cursor_free(key)?;

        let state = self
            .statements
            .get_mut(key)
            .ok_or(Error::InvalidHandle("statement"))?;
        let span = statement_span(span_names::EXECUTE, &self.config.instrumentation, &state.sql);
        let _enter = span.enter();

        let inputs = state.inputs.as_ref().map(Row::vars);
        let result = if state.kind == StatementType::Select {
            self.transport.dsql_execute(targets.tr, handle, inputs)
        } else {
            let outputs = state.outputs.as_mut().map(Row::vars_mut);
            self.transport
                .dsql_execute2(targets.tr, handle, inputs, outputs)
        };
        if result.is_ok() && state.kind == StatementType::Select && state.outputs.is_some() {
            state.result_available = true;
            state.cursor_opened = true;
        }
        let kind = state.kind;
        result.map_err(|status| self.server_error(CONTEXT, status))?;

        // Row counts need an extra server call.
        let counted = matches!(
            kind,
            StatementType::Insert | StatementType::Update | StatementType::Delete
        );
        if counted && !span.is_disabled() {
            match self.statement_affected_rows(CONTEXT, key) {
                Ok(rows) => {
                    span.record(attributes::DB_ROWS_AFFECTED, rows);
                    tracing::debug!(statement_kind = ?kind, rows, "statement executed");
                }
                Err(e) => tracing::warn!(error = %e, "row count unavailable"),
            }
        } else {
            tracing::debug!(statement_kind = ?kind, "statement executed");
        }
        Ok(())
    }
}

/// A statement borrowed from a [`Client`].
pub struct Statement<'c> {
    client: &'c mut Client,
    key: StatementKey,
}

impl<'c> Statement<'c> {
    pub(crate) fn new(client: &'c mut Client, key: StatementKey) -> Self {
        Self { client, key }
    }

    /// Key of this statement.
    #[must_use]
    pub fn key(&self) -> StatementKey {
        self.key
    }

    fn state(&self) -> Result<&StatementState> {
        self.client.stmt(self.key)
    }

    fn state_mut(&mut self) -> Result<&mut StatementState> {
        self.client.stmt_mut(self.key)
    }

    /// Rebind to another database. Closes the statement first.
    pub fn attach_database(&mut self, db: DatabaseKey) -> Result<()> {
        self.client.db(db)?;
        self.client.detach_statement_database(self.key)?;
        self.client.link_statement_database(self.key, db)
    }

    /// Rebind to another transaction. Closes the statement first.
    pub fn attach_transaction(&mut self, tr: TransactionKey) -> Result<()> {
        self.client.tr(tr)?;
        self.client.detach_statement_transaction(self.key)?;
        self.client.link_statement_transaction(self.key, tr)
    }

    /// Linked database.
    pub fn database(&self) -> Result<Option<DatabaseKey>> {
        Ok(self.state()?.database)
    }

    /// Linked transaction.
    pub fn transaction(&self) -> Result<Option<TransactionKey>> {
        Ok(self.state()?.transaction)
    }

    /// Prepare `sql`, replacing whatever was prepared before.
    ///
    /// Fails with [`Error::PrepareFailed`] when the server rejects the
    /// text; the statement is then left unprepared.
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        self.client.prepare_statement(self.key, sql)
    }

    /// Execute the prepared statement.
    ///
    /// Every parameter must have been set or nulled. A SELECT opens a
    /// cursor to [`fetch`](Self::fetch) from; a statement returning a
    /// single row (EXECUTE PROCEDURE) fills the output row directly.
    pub fn execute(&mut self) -> Result<()> {
        self.client.execute_statement(self.key)
    }

    /// Prepare `sql`, then execute it. Only valid for statements without
    /// parameters.
    pub fn execute_sql(&mut self, sql: &str) -> Result<()> {
        self.prepare(sql)?;
        self.execute()
    }

    /// Prepare and execute a `SELECT ... FOR UPDATE`, naming its cursor
    /// for positioned updates. An empty `sql` reuses the prepared text.
    pub fn cursor_execute(&mut self, cursor: &str, sql: &str) -> Result<()> {
        const CONTEXT: &str = "Statement::CursorExecute";
        if cursor.is_empty() {
            return Err(Error::logic(CONTEXT, "Cursor name can't be 0."));
        }
        if !sql.is_empty() {
            self.prepare(sql)?;
        }
        let handle = self.client.prepared_handle(CONTEXT, self.key)?;
        let targets = self.client.statement_targets(CONTEXT, self.key)?;
        let state = self.state()?;
        if state.kind != StatementType::SelectUpdate {
            return Err(Error::logic(
                CONTEXT,
                "Call CursorExecute only with a SELECT ... FOR UPDATE statement.",
            ));
        }
        if state.outputs.is_none() {
            return Err(Error::logic(CONTEXT, "Statement has no result set."));
        }
        if let Some(missing) = state
            .inputs
            .as_ref()
            .map(Row::missing_values)
            .filter(|&n| n > 0)
        {
            return Err(Error::MissingParameters {
                context: CONTEXT,
                missing,
            });
        }
        self.client.cursor_free(self.key)?;

        let client = &mut *self.client;
        let state = client
            .statements
            .get(self.key)
            .ok_or(Error::InvalidHandle("statement"))?;
        let span = statement_span(span_names::EXECUTE, &client.config.instrumentation, &state.sql);
        let _enter = span.enter();
        let executed = client
            .transport
            .dsql_execute(targets.tr, handle, state.inputs.as_ref().map(Row::vars));
        executed.map_err(|status| client.server_error(CONTEXT, status))?;
        client
            .transport
            .dsql_set_cursor_name(handle, cursor)
            .map_err(|status| client.server_error(CONTEXT, status))?;

        let state = self.state_mut()?;
        state.result_available = true;
        state.cursor_opened = true;
        Ok(())
    }

    /// Execute `sql` without preparing it. Parameters and result sets are
    /// not supported; the statement is left unprepared.
    pub fn execute_immediate(&mut self, sql: &str) -> Result<()> {
        const CONTEXT: &str = "Statement::ExecuteImmediate";
        let targets = self.client.statement_targets(CONTEXT, self.key)?;
        if sql.is_empty() {
            return Err(Error::logic(CONTEXT, "SQL statement can't be empty."));
        }
        self.client.close_statement(self.key)?;
        let span = statement_span(span_names::EXECUTE, &self.client.config.instrumentation, sql);
        let _enter = span.enter();
        self.client
            .transport
            .dsql_execute_immediate(targets.db, targets.tr, sql, targets.dialect)
            .map_err(|status| self.client.server_error(CONTEXT, status))
    }

    /// Fetch the next row into the output slots.
    ///
    /// Returns `false` once the cursor is exhausted, closing it. Any other
    /// failure closes the statement.
    pub fn fetch(&mut self) -> Result<bool> {
        const CONTEXT: &str = "Statement::Fetch";
        let client = &mut *self.client;
        let state = client
            .statements
            .get_mut(self.key)
            .ok_or(Error::InvalidHandle("statement"))?;
        if !state.result_available {
            return Err(Error::logic(
                CONTEXT,
                "No statement has been executed or no result set available.",
            ));
        }
        let (Some(handle), Some(outputs)) = (state.handle, state.outputs.as_mut()) else {
            return Err(Error::logic(CONTEXT, "The statement does not return results."));
        };
        match client.transport.dsql_fetch(handle, outputs.vars_mut()) {
            Ok(FetchStatus::Row) => Ok(true),
            Ok(FetchStatus::NoMoreRows) => {
                state.result_available = false;
                state.cursor_opened = true;
                client.cursor_free(self.key)?;
                tracing::debug!("cursor exhausted");
                Ok(false)
            }
            Err(status) => {
                let err = client.server_error(CONTEXT, status);
                if let Err(e) = client.close_statement(self.key) {
                    tracing::warn!(error = %e, "close after failed fetch");
                }
                Err(err)
            }
        }
    }

    /// Fetch the next row and return a detached copy of it.
    pub fn fetch_row(&mut self) -> Result<Option<Row>> {
        if !self.fetch()? {
            return Ok(None);
        }
        Ok(self.state()?.outputs.clone())
    }

    /// Release the prepared statement.
    pub fn close(&mut self) -> Result<()> {
        self.client.close_statement(self.key)
    }

    /// Rows touched by the last execution of an action statement, 0 for
    /// other kinds.
    pub fn affected_rows(&mut self) -> Result<i64> {
        self.client.statement_affected_rows("Statement::AffectedRows", self.key)
    }

    /// Access plan chosen by the optimizer.
    pub fn plan(&mut self) -> Result<String> {
        const CONTEXT: &str = "Statement::Plan";
        let handle = self.client.prepared_handle(CONTEXT, self.key)?;
        let block = self
            .client
            .transport
            .dsql_sql_info(handle, &[info::sql::GET_PLAN, info::END])
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        let plan = block.get_string(info::sql::GET_PLAN)?;
        Ok(plan.strip_prefix('\n').map(str::to_string).unwrap_or(plan))
    }

    /// Text of the prepared statement.
    pub fn sql(&self) -> Result<&str> {
        Ok(&self.state()?.sql)
    }

    /// Kind of the prepared statement.
    pub fn kind(&self) -> Result<StatementType> {
        Ok(self.state()?.kind)
    }

    /// Number of input parameters.
    pub fn parameters(&self) -> Result<usize> {
        Ok(self.state()?.inputs.as_ref().map_or(0, Row::columns))
    }

    /// Number of output columns.
    pub fn columns(&self) -> Result<usize> {
        Ok(self.state()?.outputs.as_ref().map_or(0, Row::columns))
    }

    fn inputs(&self, context: &'static str) -> Result<&Row> {
        self.state()?
            .inputs
            .as_ref()
            .ok_or_else(|| Error::logic(context, "The statement does not take parameters."))
    }

    fn inputs_mut(&mut self, context: &'static str) -> Result<&mut Row> {
        self.state_mut()?
            .inputs
            .as_mut()
            .ok_or_else(|| Error::logic(context, "The statement does not take parameters."))
    }

    fn outputs(&self, context: &'static str) -> Result<&Row> {
        self.state()?
            .outputs
            .as_ref()
            .ok_or_else(|| Error::logic(context, "The statement does not return results."))
    }

    /// Whether output column `idx` is NULL in the current row.
    pub fn is_null(&self, idx: usize) -> Result<bool> {
        self.outputs("Statement::IsNull")?.is_null(idx)
    }

    /// Set parameter `idx` to NULL.
    pub fn set_null(&mut self, idx: usize) -> Result<()> {
        self.inputs_mut("Statement::SetNull")?.set_null(idx)
    }

    /// Write parameter `idx`.
    pub fn set<T: ToSql + ?Sized>(&mut self, idx: usize, value: &T) -> Result<()> {
        let value = value
            .to_sql()
            .map_err(|e| Error::from_type("Statement::Set", e))?;
        self.set_value(idx, &value)
    }

    /// Write parameter `idx` from a [`Value`].
    pub fn set_value(&mut self, idx: usize, value: &Value) -> Result<()> {
        const CONTEXT: &str = "Statement::Set";
        let is_blob = self.inputs(CONTEXT)?.column_sql_type(idx)? == SqlType::Blob;
        let text = match value {
            Value::String(s) if is_blob => Some(s.as_bytes()),
            Value::Bytes(b) if is_blob => Some(b.as_slice()),
            _ => None,
        };
        if let Some(data) = text {
            let targets = self.client.statement_targets(CONTEXT, self.key)?;
            let id = self
                .client
                .write_blob_value(CONTEXT, targets.db, targets.tr, data)?;
            return self.inputs_mut(CONTEXT)?.set_value(idx, &Value::Blob(id));
        }
        self.inputs_mut(CONTEXT)?.set_value(idx, value)
    }

    /// Read output column `idx` of the current row.
    pub fn get<T: FromSql>(&mut self, idx: usize) -> Result<T> {
        let value = self.get_value(idx, T::NATIVE)?;
        T::from_sql(&value).map_err(|e| Error::from_type("Statement::Get", e))
    }

    /// Read the output column named `name`.
    pub fn get_by_name<T: FromSql>(&mut self, name: &str) -> Result<T> {
        let idx = self.column_num(name)?;
        self.get(idx)
    }

    /// Read output column `idx` as `native`, or [`Value::Null`].
    pub fn get_value(&mut self, idx: usize, native: NativeType) -> Result<Value> {
        const CONTEXT: &str = "Statement::Get";
        let outputs = self.outputs(CONTEXT)?;
        let loads_blob = outputs.column_sql_type(idx)? == SqlType::Blob
            && matches!(native, NativeType::String | NativeType::Bytes);
        if !loads_blob {
            return outputs.get_value(idx, native);
        }
        let Value::Blob(id) = outputs.get_value(idx, NativeType::Blob)? else {
            return Ok(Value::Null);
        };
        let targets = self.client.statement_targets(CONTEXT, self.key)?;
        let data = self
            .client
            .read_blob_value(CONTEXT, targets.db, targets.tr, id)?;
        Ok(match native {
            NativeType::Bytes => Value::Bytes(data),
            _ => Value::String(String::from_utf8_lossy(&data).into_owned()),
        })
    }

    /// 1-based number of the output column named `name`.
    pub fn column_num(&self, name: &str) -> Result<usize> {
        self.outputs("Statement::ColumnNum")?.column_num(name)
    }

    /// Output column name.
    pub fn column_name(&self, idx: usize) -> Result<&str> {
        self.outputs("Statement::ColumnName")?.column_name(idx)
    }

    /// Output column alias.
    pub fn column_alias(&self, idx: usize) -> Result<&str> {
        self.outputs("Statement::ColumnAlias")?.column_alias(idx)
    }

    /// Table of an output column.
    pub fn column_table(&self, idx: usize) -> Result<&str> {
        self.outputs("Statement::ColumnTable")?.column_table(idx)
    }

    /// Logical type of an output column.
    pub fn column_type(&self, idx: usize) -> Result<SqlDataType> {
        self.outputs("Statement::ColumnType")?.column_type(idx)
    }

    /// Subtype of an output column.
    pub fn column_subtype(&self, idx: usize) -> Result<i16> {
        self.outputs("Statement::ColumnSubtype")?.column_subtype(idx)
    }

    /// Declared size of an output column.
    pub fn column_size(&self, idx: usize) -> Result<usize> {
        self.outputs("Statement::ColumnSize")?.column_size(idx)
    }

    /// Scale of an output column.
    pub fn column_scale(&self, idx: usize) -> Result<i16> {
        self.outputs("Statement::ColumnScale")?.column_scale(idx)
    }

    /// Logical type of a parameter.
    pub fn parameter_type(&self, idx: usize) -> Result<SqlDataType> {
        self.inputs("Statement::ParameterType")?.column_type(idx)
    }

    /// Subtype of a parameter.
    pub fn parameter_subtype(&self, idx: usize) -> Result<i16> {
        self.inputs("Statement::ParameterSubtype")?.column_subtype(idx)
    }

    /// Declared size of a parameter.
    pub fn parameter_size(&self, idx: usize) -> Result<usize> {
        self.inputs("Statement::ParameterSize")?.column_size(idx)
    }

    /// Scale of a parameter.
    pub fn parameter_scale(&self, idx: usize) -> Result<i16> {
        self.inputs("Statement::ParameterScale")?.column_scale(idx)
    }

    /// Whether a cursor is open with rows left to fetch.
    pub fn result_available(&self) -> Result<bool> {
        Ok(self.state()?.result_available)
    }

    /// Whether a cursor is open on the server.
    pub fn cursor_opened(&self) -> Result<bool> {
        Ok(self.state()?.cursor_opened)
    }

    /// Whether a statement is prepared.
    pub fn is_prepared(&self) -> Result<bool> {
        Ok(self.state()?.handle.is_some())
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_counts_markers_and_commas() {
        assert_eq!(estimate_slots("SELECT id, name FROM t WHERE id = ?"), (1, 2));
        assert_eq!(estimate_slots("INSERT INTO t VALUES (?, ?, ?)"), (3, 3));
        assert_eq!(estimate_slots("DELETE FROM t"), (0, 1));
    }

    #[test]
    fn test_estimate_is_fooled_by_literals() {
        // The guess is only a starting capacity; describe fixes it up.
        assert_eq!(estimate_slots("SELECT 'a,b?' FROM t"), (1, 2));
    }

    #[test]
    fn test_new_state_is_unprepared() {
        let state = StatementState::new();
        assert!(state.handle.is_none());
        assert_eq!(state.kind, StatementType::Unknown);
        assert!(state.inputs.is_none() && state.outputs.is_none());
        assert!(!state.result_available && !state.cursor_opened);
    }
}
