//! Resource graph lifecycle tests.
//!
//! These cover the links between databases, transactions, statements and
//! subscriptions: cascading teardown, multi-database starts, stale keys and
//! what survives when the server refuses a teardown call.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use ibpp_client::{
    Client, DatabaseConfig, DatabaseKey, Error, TransactionConfig, TransactionKey,
};
use ibpp_testing::fixtures::{self, EmployeeFixture};
use ibpp_testing::{codes, MockDatabase, MockHandle};

const SALES_DB: &str = "/data/sales.fdb";

fn sales_config() -> DatabaseConfig {
    DatabaseConfig::new(SALES_DB)
        .server(fixtures::SERVER)
        .user(fixtures::USER)
        .password(fixtures::PASSWORD)
}

/// Employee fixture plus a second database, neither connected.
fn two_databases() -> (MockHandle, Client, DatabaseKey, DatabaseKey) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (fixture, transport) = EmployeeFixture::build();
    fixture
        .server
        .add_database(format!("{}:{SALES_DB}", fixtures::SERVER), MockDatabase::default());
    let mut client = Client::new(transport);
    let employee = client.add_database(fixtures::employee_config());
    let sales = client.add_database(sales_config());
    (fixture.server, client, employee, sales)
}

fn connected() -> (MockHandle, Client, DatabaseKey, TransactionKey) {
    let (server, mut client, db, _) = two_databases();
    client.database(db).unwrap().connect().unwrap();
    let tr = client
        .add_transaction_for(db, TransactionConfig::default())
        .unwrap();
    client.transaction(tr).unwrap().start().unwrap();
    (server, client, db, tr)
}

fn position(calls: &[&str], op: &str) -> usize {
    calls
        .iter()
        .position(|c| *c == op)
        .unwrap_or_else(|| panic!("{op} was never called: {calls:?}"))
}

// =============================================================================
// Disconnect Cascade
// =============================================================================

#[test]
fn test_disconnect_rolls_back_and_closes_dependents() {
    let (server, mut client, db, tr) = connected();
    let st = client.add_statement(db, tr).unwrap();
    {
        let mut stmt = client.statement(st).unwrap();
        stmt.execute_sql(fixtures::SELECT_EMPLOYEES).unwrap();
        assert!(stmt.fetch().unwrap());
    }
    let ev = client.add_events(db).unwrap();
    client.events(ev).unwrap().add("new_order", |_, _| {}).unwrap();
    server.clear_calls();

    client.database(db).unwrap().disconnect().unwrap();

    let calls = server.calls();
    assert!(position(&calls, "rollback") < position(&calls, "detach_database"));
    assert!(position(&calls, "dsql_free_statement") < position(&calls, "detach_database"));

    assert!(!client.transaction(tr).unwrap().is_started().unwrap());
    assert!(client.transaction(tr).unwrap().databases().unwrap().is_empty());
    let stmt = client.statement(st).unwrap();
    assert!(!stmt.is_prepared().unwrap());
    assert_eq!(stmt.database().unwrap(), None);
    assert_eq!(stmt.transaction().unwrap(), Some(tr));
    assert!(client.events(ev).unwrap().list().unwrap().is_empty());

    let database = client.database(db).unwrap();
    assert!(database.transactions().unwrap().is_empty());
    assert!(database.statements().unwrap().is_empty());
    assert!(database.events().unwrap().is_empty());

    let open = server.open_counts();
    assert_eq!(open.attachments, 0);
    assert_eq!(open.transactions, 0);
    assert_eq!(open.statements, 0);
    assert_eq!(open.event_requests, 0);
}

#[test]
fn test_inactivate_keeps_the_attachment() {
    let (server, mut client, db, tr) = connected();
    let mut database = client.database(db).unwrap();
    database.inactivate().unwrap();
    assert!(database.is_connected().unwrap());
    assert!(!client.transaction(tr).unwrap().is_started().unwrap());
    assert_eq!(server.open_counts().attachments, 1);
    assert_eq!(server.open_counts().transactions, 0);
}

#[test]
fn test_disconnect_forgets_handle_when_detach_fails() {
    let (server, mut client, db, _) = connected();
    server.fail_next("detach_database", codes::NETWORK_ERROR);

    let mut database = client.database(db).unwrap();
    let err = database.disconnect().unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(err.sql_code(), Some(-902));
    assert!(!database.is_connected().unwrap());

    // The handle is gone, so a second disconnect has nothing to do.
    database.disconnect().unwrap();
}

#[test]
fn test_cascade_reports_first_error_and_still_detaches() {
    let (server, mut client, db, _) = connected();
    server.fail_next("rollback", codes::LOCK_CONFLICT);

    let mut database = client.database(db).unwrap();
    let err = database.disconnect().unwrap_err();
    assert_eq!(err.engine_code(), Some(codes::LOCK_CONFLICT));
    assert!(!database.is_connected().unwrap());
    assert!(server.calls().contains(&"detach_database"));
}

#[test]
fn test_drop_requires_connection() {
    let (_server, mut client, _, sales) = two_databases();
    let err = client.database(sales).unwrap().drop_database().unwrap_err();
    assert!(matches!(err, Error::NotConnected { .. }));
}

// =============================================================================
// Transactions
// =============================================================================

#[test]
fn test_start_refuses_disconnected_database() {
    let (server, mut client, employee, sales) = two_databases();
    client.database(employee).unwrap().connect().unwrap();

    let tr = client.add_transaction();
    let mut transaction = client.transaction(tr).unwrap();
    transaction
        .attach_database(employee, TransactionConfig::default())
        .unwrap();
    transaction
        .attach_database(sales, TransactionConfig::default())
        .unwrap();

    let err = transaction.start().unwrap_err();
    assert!(matches!(err, Error::NotAllAttachedConnected));
    assert!(err.is_logic_error());
    assert!(!transaction.is_started().unwrap());
    assert!(!server.calls().contains(&"start_multiple"));
}

#[test]
fn test_start_spans_every_database() {
    let (server, mut client, employee, sales) = two_databases();
    client.database(employee).unwrap().connect().unwrap();
    client.database(sales).unwrap().connect().unwrap();

    let tr = client.add_transaction();
    let mut transaction = client.transaction(tr).unwrap();
    transaction
        .attach_database(employee, TransactionConfig::default())
        .unwrap();
    transaction
        .attach_database(sales, TransactionConfig::default())
        .unwrap();
    transaction.start().unwrap();
    assert_eq!(transaction.databases().unwrap(), vec![employee, sales]);

    let blocks = server.transaction_blocks();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].len(), 2);
    assert_eq!(
        blocks[0][0],
        transaction.parameter_block(employee).unwrap()
    );

    transaction.commit().unwrap();
    assert!(!transaction.is_started().unwrap());
    assert_eq!(server.open_counts().transactions, 0);
}

#[test]
fn test_start_without_database_is_logic_error() {
    let (_server, mut client, _, _) = two_databases();
    let tr = client.add_transaction();
    let err = client.transaction(tr).unwrap().start().unwrap_err();
    assert!(err.is_logic_error());
    assert!(err.to_string().contains("No Database is attached."));
}

#[test]
fn test_started_transaction_refuses_new_attachment() {
    let (_server, mut client, _, tr) = connected();
    let sales = client.add_database(sales_config());
    let err = client
        .transaction(tr)
        .unwrap()
        .attach_database(sales, TransactionConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyStarted { .. }));
}

#[test]
fn test_retaining_keeps_transaction_started() {
    let (server, mut client, _, tr) = connected();
    let mut transaction = client.transaction(tr).unwrap();
    transaction.commit_retain().unwrap();
    assert!(transaction.is_started().unwrap());
    transaction.rollback_retain().unwrap();
    assert!(transaction.is_started().unwrap());
    transaction.rollback().unwrap();
    assert!(!transaction.is_started().unwrap());

    let err = transaction.commit().unwrap_err();
    assert!(matches!(err, Error::NotStarted { .. }));
    assert_eq!(server.open_counts().transactions, 0);
}

#[test]
fn test_start_twice_is_a_no_op() {
    let (server, mut client, _, tr) = connected();
    client.transaction(tr).unwrap().start().unwrap();
    assert_eq!(server.transaction_blocks().len(), 1);
}

// =============================================================================
// Keys
// =============================================================================

#[test]
fn test_released_keys_go_stale() {
    let (_server, mut client, db, tr) = connected();
    let st = client.add_statement(db, tr).unwrap();
    client.release_statement(st).unwrap();

    let err = client.statement(st).unwrap_err();
    assert!(matches!(err, Error::InvalidHandle("statement")));
    assert!(client.release_statement(st).is_err());

    // A new statement reusing the slot does not revive the old key.
    let fresh = client.add_statement(db, tr).unwrap();
    assert_ne!(fresh, st);
    assert!(client.statement(fresh).is_ok());
    assert!(client.statement(st).is_err());
}

#[test]
fn test_stale_database_key_is_refused() {
    let (_server, mut client, _, sales) = two_databases();
    client.release_database(sales).unwrap();
    assert!(matches!(
        client.add_transaction_for(sales, TransactionConfig::default()),
        Err(Error::InvalidHandle("database"))
    ));
    assert!(matches!(
        client.add_events(sales),
        Err(Error::InvalidHandle("database"))
    ));
}

#[test]
fn test_release_database_detaches_dependents() {
    let (server, mut client, db, tr) = connected();
    let st = client.add_statement(db, tr).unwrap();
    client.release_database(db).unwrap();

    assert!(client.database(db).is_err());
    assert!(client.transaction(tr).unwrap().databases().unwrap().is_empty());
    assert_eq!(client.statement(st).unwrap().database().unwrap(), None);
    assert_eq!(client.resource_counts(), [1, 1, 1, 0, 0, 0, 0]);
    assert_eq!(server.open_counts().attachments, 0);
}

#[test]
fn test_release_transaction_rolls_back() {
    let (server, mut client, db, tr) = connected();
    let st = client.add_statement(db, tr).unwrap();
    client.release_transaction(tr).unwrap();

    assert!(server.calls().contains(&"rollback"));
    assert_eq!(client.statement(st).unwrap().transaction().unwrap(), None);
    assert!(client.database(db).unwrap().transactions().unwrap().is_empty());
}

// =============================================================================
// Client Drop
// =============================================================================

#[test]
fn test_dropping_client_releases_everything() {
    let (server, mut client, db, tr) = connected();
    let st = client.add_statement(db, tr).unwrap();
    client
        .statement(st)
        .unwrap()
        .execute_sql(fixtures::SELECT_EMPLOYEES)
        .unwrap();
    let blob = client.add_blob(db, tr).unwrap();
    client.blob(blob).unwrap().create().unwrap();
    let svc = client.add_service(
        ibpp_client::ServiceConfig::new(fixtures::SERVER)
            .user(fixtures::USER)
            .password(fixtures::PASSWORD),
    );
    client.service(svc).unwrap().connect().unwrap();

    let open = server.open_counts();
    assert_eq!(open.attachments, 1);
    assert_eq!(open.statements, 1);
    assert_eq!(open.services, 1);

    drop(client);

    let open = server.open_counts();
    assert_eq!(open.attachments, 0);
    assert_eq!(open.transactions, 0);
    assert_eq!(open.statements, 0);
    assert_eq!(open.blobs, 0);
    assert_eq!(open.services, 0);
}

#[test]
fn test_drop_survives_failed_teardown() {
    let (server, client, _, _) = connected();
    server.fail_next("rollback", codes::NETWORK_ERROR);
    drop(client);
    assert_eq!(server.open_counts().attachments, 0);
}
