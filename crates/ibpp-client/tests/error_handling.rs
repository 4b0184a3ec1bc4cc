//! Error handling path tests for ibpp-client.
//!
//! Tests for error display, categorization and the diagnostics carried by
//! server errors raised through the mock transport.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use ibpp_client::{
    Client, DatabaseKey, Error, NativeType, ServerError, StatementKey, TransactionConfig,
    TransactionKey,
};
use ibpp_protocol::{ProtocolError, StatusVector};
use ibpp_testing::fixtures::{self, EmployeeFixture};
use ibpp_testing::{codes, MockCatalogue, MockHandle, MockStatement};

fn server_error(operation: &'static str, code: i64) -> ServerError {
    ServerError::new(operation, StatusVector::error(code), Arc::new(MockCatalogue))
}

struct Session {
    server: MockHandle,
    client: Client,
    db: DatabaseKey,
    tr: TransactionKey,
}

impl Session {
    fn start() -> Self {
        let (fixture, transport) = EmployeeFixture::build();
        let mut client = Client::new(transport);
        let db = client.add_database(fixtures::employee_config());
        client.database(db).unwrap().connect().unwrap();
        let tr = client
            .add_transaction_for(db, TransactionConfig::default())
            .unwrap();
        client.transaction(tr).unwrap().start().unwrap();
        Self {
            server: fixture.server,
            client,
            db,
            tr,
        }
    }

    fn statement(&mut self) -> StatementKey {
        self.client.add_statement(self.db, self.tr).unwrap()
    }
}

// =============================================================================
// Error Display Tests
// =============================================================================

#[test]
fn test_bounds_error_display() {
    let err = Error::InvalidBounds {
        dimension: 0,
        low: 0,
        high: 9,
    };
    let msg = err.to_string();
    assert!(msg.contains("[0:9]"));
    assert!(msg.contains("dimension 0"));
    assert!(msg.contains("narrowed"));
}

#[test]
fn test_element_count_display() {
    let err = Error::ElementCountMismatch {
        expected: 5,
        actual: 3,
    };
    assert_eq!(
        err.to_string(),
        "wrong count of array elements: slice holds 5, got 3"
    );
}

#[test]
fn test_missing_parameters_display() {
    let err = Error::MissingParameters {
        context: "Statement::Execute",
        missing: 2,
    };
    let msg = err.to_string();
    assert!(msg.starts_with("Statement::Execute: "));
    assert!(msg.contains("2 missing"));
}

#[test]
fn test_state_error_display() {
    assert_eq!(
        Error::NotConnected {
            context: "Database::Statistics"
        }
        .to_string(),
        "Database::Statistics: database is not connected"
    );
    assert_eq!(
        Error::NotStarted {
            context: "Transaction::Commit"
        }
        .to_string(),
        "Transaction::Commit: transaction is not started"
    );
    assert!(Error::NotAllAttachedConnected
        .to_string()
        .contains("must be connected"));
}

#[test]
fn test_handle_and_column_display() {
    assert_eq!(
        Error::InvalidHandle("blob").to_string(),
        "blob handle is stale or unknown"
    );
    assert_eq!(
        Error::ColumnNotFound("SALARY".into()).to_string(),
        "could not find column named 'SALARY'"
    );
}

#[test]
fn test_buffer_overflow_display() {
    let err = Error::BufferOverflow {
        needed: 40_000,
        limit: 32_766,
    };
    let msg = err.to_string();
    assert!(msg.contains("40000"));
    assert!(msg.contains("32766"));
}

#[test]
fn test_wrong_type_display() {
    let err = Error::WrongType {
        context: "Statement::Get",
        sql_type: "SQL_SHORT",
        native: NativeType::Date,
    };
    let msg = err.to_string();
    assert!(msg.contains("SQL_SHORT"));
    assert!(msg.contains("incompatible types"));
}

// =============================================================================
// Categorization Tests
// =============================================================================

#[test]
fn test_logic_errors_have_no_server_codes() {
    let errors = [
        Error::NotAllAttachedConnected,
        Error::InvalidHandle("statement"),
        Error::Config("missing database path".into()),
        Error::UnsupportedServer("on-disk structure 9".into()),
    ];
    for err in &errors {
        assert!(err.is_logic_error(), "{err}");
        assert!(!err.is_server_error(), "{err}");
        assert!(err.server_error().is_none());
        assert_eq!(err.sql_code(), None);
        assert_eq!(err.engine_code(), None);
    }
}

#[test]
fn test_server_error_carries_codes() {
    let err: Error = server_error("Statement::Execute", codes::UNIQUE_KEY_VIOLATION).into();
    assert!(err.is_server_error());
    assert!(!err.is_logic_error());
    assert_eq!(err.sql_code(), Some(-803));
    assert_eq!(err.engine_code(), Some(codes::UNIQUE_KEY_VIOLATION));
}

#[test]
fn test_server_error_message_layout() {
    let err = server_error("Transaction::Commit", codes::LOCK_CONFLICT);
    assert!(err.message().starts_with("SQL Message : -913"));
    assert!(err.message().contains("Engine Code    : 335544345"));
    assert!(err.message().contains("lock conflict on no wait transaction"));
    assert!(err.to_string().starts_with("Transaction::Commit: "));
    assert_eq!(err.status.cached_message(), Some(err.message()));
}

#[test]
fn test_prepare_failure_is_a_server_error() {
    let err = Error::PrepareFailed {
        sql: "SELEC 1".into(),
        source: server_error("Statement::Prepare", codes::DSQL_ERROR),
    };
    assert!(err.is_server_error());
    assert_eq!(err.sql_code(), Some(-104));
    assert!(err.to_string().contains("`SELEC 1`"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_protocol_errors_convert() {
    let err: Error = ProtocolError::FieldNotFound {
        tag: 4,
        subtag: None,
    }
    .into();
    assert!(matches!(err, Error::FieldNotFound { tag: 4 }));
    assert!(err.is_logic_error());
}

// =============================================================================
// Errors Raised Through The Driver
// =============================================================================

#[test]
fn test_constraint_violation_on_execute() {
    let mut session = Session::start();
    session.server.script(
        "INSERT INTO country (country, currency) VALUES ('USA', 'Dollar')",
        MockStatement::insert().failing(codes::UNIQUE_KEY_VIOLATION),
    );
    let st = session.statement();
    let err = session
        .client
        .statement(st)
        .unwrap()
        .execute_sql("INSERT INTO country (country, currency) VALUES ('USA', 'Dollar')")
        .unwrap_err();

    let server = err.server_error().expect("server diagnostics");
    assert_eq!(server.sql_code, -803);
    assert_eq!(server.operation, "Statement::Execute");
    assert!(server.message().contains("violation of PRIMARY or UNIQUE KEY constraint"));
}

#[test]
fn test_commit_failure_keeps_transaction_started() {
    let mut session = Session::start();
    session.server.fail_next("commit", codes::LOCK_CONFLICT);

    let mut transaction = session.client.transaction(session.tr).unwrap();
    let err = transaction.commit().unwrap_err();
    assert_eq!(err.sql_code(), Some(-913));
    assert!(transaction.is_started().unwrap());

    transaction.commit().unwrap();
    assert!(!transaction.is_started().unwrap());
}

#[test]
fn test_unknown_column_name() {
    let mut session = Session::start();
    let st = session.statement();
    let mut stmt = session.client.statement(st).unwrap();
    stmt.execute_sql(fixtures::SELECT_EMPLOYEES).unwrap();
    assert!(stmt.fetch().unwrap());

    let err = stmt.get_by_name::<i32>("HIRE_DATE").unwrap_err();
    assert!(matches!(err, Error::ColumnNotFound(ref name) if name == "HIRE_DATE"));
    assert_eq!(stmt.get_by_name::<i32>("emp_no").unwrap(), 2);
}

#[test]
fn test_incompatible_get_is_wrong_type() {
    let mut session = Session::start();
    let st = session.statement();
    let mut stmt = session.client.statement(st).unwrap();
    stmt.execute_sql(fixtures::SELECT_EMPLOYEES).unwrap();
    assert!(stmt.fetch().unwrap());

    let err = stmt.get::<String>(1).unwrap_err();
    assert!(matches!(
        err,
        Error::WrongType {
            sql_type: "SQL_SHORT",
            native: NativeType::String,
            ..
        }
    ));
}

#[test]
fn test_narrowing_set_is_out_of_range() {
    let mut session = Session::start();
    let st = session.statement();
    let mut stmt = session.client.statement(st).unwrap();
    stmt.prepare(fixtures::RAISE_SALARY).unwrap();

    let err = stmt.set(2, &70_000_i32).unwrap_err();
    assert!(matches!(
        err,
        Error::OutOfRange {
            target_type: "int16",
            ..
        }
    ));
    assert!(err.is_logic_error());
}

#[test]
fn test_index_out_of_range_is_logic_error() {
    let mut session = Session::start();
    let st = session.statement();
    let mut stmt = session.client.statement(st).unwrap();
    stmt.prepare(fixtures::RAISE_SALARY).unwrap();
    assert!(stmt.set(0, &1_i32).unwrap_err().is_logic_error());
    assert!(stmt.set(3, &1_i32).unwrap_err().is_logic_error());
    assert!(stmt.set_null(9).unwrap_err().is_logic_error());
}
