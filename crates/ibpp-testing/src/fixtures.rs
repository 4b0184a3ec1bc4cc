//! Test fixture utilities.
//!
//! A small slice of the classic `employee` sample database, scripted on a
//! [`MockTransport`].

use ibpp_client::{ColumnDesc, DatabaseConfig, Quad, User, Value};
use ibpp_protocol::{ArrayBound, ArrayDesc, BlrType, SqlType};

use crate::mock_transport::{MockDatabase, MockHandle, MockStatement, MockTransport};

/// Server part of the fixture connection string.
pub const SERVER: &str = "localhost";

/// Path of the fixture database.
pub const EMPLOYEE_DB: &str = "/data/employee.fdb";

/// Fixture user.
pub const USER: &str = "SYSDBA";

/// Fixture password.
pub const PASSWORD: &str = "masterkey";

/// Employees, ordered by number.
pub const SELECT_EMPLOYEES: &str = "SELECT emp_no, full_name, salary FROM employee ORDER BY emp_no";

/// Employee count.
pub const COUNT_EMPLOYEES: &str = "SELECT count(*) FROM employee";

/// Raise one employee's salary.
pub const RAISE_SALARY: &str = "UPDATE employee SET salary = salary + ? WHERE emp_no = ?";

/// Add a country.
pub const INSERT_COUNTRY: &str = "INSERT INTO country (country, currency) VALUES (?, ?)";

/// Purge new orders.
pub const DELETE_NEW_SALES: &str = "DELETE FROM sales WHERE order_status = 'new'";

/// Project description, a text blob.
pub const PROJECT_DESCRIPTION: &str = "SELECT proj_desc FROM project WHERE proj_id = ?";

/// Languages required for a job, an array column.
pub const JOB_LANGUAGES: &str = "SELECT language_req FROM job WHERE job_code = ?";

/// Projects of an employee.
pub const EMPLOYEE_PROJECT: &str = "EXECUTE PROCEDURE get_emp_proj(?)";

/// Employees for update.
pub const EMPLOYEES_FOR_UPDATE: &str = "SELECT emp_no, salary FROM employee FOR UPDATE";

/// Text of the scripted project description.
pub const PROJECT_TEXT: &str = "Design a video data base management system for controlling on-demand video distribution.";

/// Connection configuration of the fixture database.
#[must_use]
pub fn employee_config() -> DatabaseConfig {
    DatabaseConfig::new(EMPLOYEE_DB)
        .server(SERVER)
        .user(USER)
        .password(PASSWORD)
}

fn salary() -> ColumnDesc {
    ColumnDesc::new(SqlType::Int64, 8).named("SALARY").scale(-2)
}

/// The `JOB.LANGUAGE_REQ` array column: five `VARCHAR(15)` elements.
#[must_use]
pub fn language_column() -> ArrayDesc {
    ArrayDesc {
        dtype: BlrType::Varying,
        scale: 0,
        length: 15,
        field_name: "LANGUAGE_REQ".into(),
        relation_name: "JOB".into(),
        bounds: vec![ArrayBound::new(1, 5)],
    }
}

/// Scripted employee server.
#[derive(Debug)]
pub struct EmployeeFixture {
    /// Control side of the server.
    pub server: MockHandle,
    /// Id of the project description blob.
    pub project_blob: Quad,
}

impl EmployeeFixture {
    /// Build the fixture and return the transport to hand to a client.
    #[must_use]
    pub fn build() -> (Self, MockTransport) {
        let transport = MockTransport::new();
        let server = transport.handle();
        server.add_database(format!("{SERVER}:{EMPLOYEE_DB}"), MockDatabase::default());
        server.add_user(User::new(USER).password(PASSWORD));

        let project_blob = server.insert_blob(
            PROJECT_TEXT
                .as_bytes()
                .chunks(32)
                .map(<[u8]>::to_vec)
                .collect(),
        );
        server.add_array_column(language_column());

        server.script(
            SELECT_EMPLOYEES,
            MockStatement::select(vec![
                ColumnDesc::new(SqlType::Short, 2).named("EMP_NO").not_null(),
                ColumnDesc::new(SqlType::Varying, 37).named("FULL_NAME"),
                salary(),
            ])
            .row(vec![
                Value::Int16(2),
                Value::String("Nelson, Robert".into()),
                Value::Double(105_900.0),
            ])
            .row(vec![
                Value::Int16(4),
                Value::String("Young, Bruce".into()),
                Value::Double(97_500.0),
            ])
            .row(vec![Value::Int16(5), Value::Null, Value::Double(102_750.0)])
            .plan("PLAN (EMPLOYEE ORDER RDB$PRIMARY7)"),
        );
        server.script(
            COUNT_EMPLOYEES,
            MockStatement::select(vec![ColumnDesc::new(SqlType::Long, 4).named("COUNT")])
                .row(vec![Value::Int32(42)]),
        );
        server.script(
            RAISE_SALARY,
            MockStatement::update()
                .params(vec![salary(), ColumnDesc::new(SqlType::Short, 2).named("EMP_NO")])
                .affected(1),
        );
        server.script(
            INSERT_COUNTRY,
            MockStatement::insert()
                .params(vec![
                    ColumnDesc::new(SqlType::Varying, 15).named("COUNTRY"),
                    ColumnDesc::new(SqlType::Varying, 10).named("CURRENCY"),
                ])
                .affected(1),
        );
        server.script(DELETE_NEW_SALES, MockStatement::delete().affected(3));
        server.script(
            PROJECT_DESCRIPTION,
            MockStatement::select(vec![
                ColumnDesc::new(SqlType::Blob, 8).named("PROJ_DESC").subtype(1),
            ])
            .params(vec![ColumnDesc::new(SqlType::Text, 5).named("PROJ_ID")])
            .row(vec![Value::Blob(project_blob)]),
        );
        server.script(
            JOB_LANGUAGES,
            MockStatement::select(vec![
                ColumnDesc::new(SqlType::Array, 8).named("LANGUAGE_REQ").relation("JOB"),
            ])
            .params(vec![ColumnDesc::new(SqlType::Varying, 5).named("JOB_CODE")]),
        );
        server.script(
            EMPLOYEE_PROJECT,
            MockStatement::procedure(vec![ColumnDesc::new(SqlType::Text, 5).named("PROJ_ID")])
                .params(vec![ColumnDesc::new(SqlType::Short, 2).named("EMP_NO")])
                .row(vec![Value::String("VBASE".into())]),
        );
        server.script(
            EMPLOYEES_FOR_UPDATE,
            MockStatement::select_for_update(vec![
                ColumnDesc::new(SqlType::Short, 2).named("EMP_NO"),
                salary(),
            ])
            .row(vec![Value::Int16(2), Value::Double(105_900.0)]),
        );

        (
            Self {
                server,
                project_blob,
            },
            transport,
        )
    }
}
