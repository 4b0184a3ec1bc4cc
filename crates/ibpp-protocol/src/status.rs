//! Status vectors.
//!
//! Every server call fills a status vector. Cell 0 is `1` (`isc_arg_gds`)
//! and cell 1 carries the engine error code; the remaining cells hold a
//! chain of typed arguments terminated by `isc_arg_end`. A non-zero code in
//! cell 1 means the call failed.
//!
//! Turning a vector into readable text needs extra calls (SQL code lookup,
//! message interpretation), so the rendered message is computed on first
//! request and cached.

use std::fmt;

use once_cell::sync::OnceCell;

/// Number of cells in a status vector.
pub const STATUS_LEN: usize = 20;

/// Argument tags used inside a status vector.
pub mod arg {
    /// End of the argument chain.
    pub const END: i64 = 0;
    /// An engine error code follows.
    pub const GDS: i64 = 1;
    /// A string argument follows.
    pub const STRING: i64 = 2;
    /// A numeric argument follows.
    pub const NUMBER: i64 = 4;
    /// An already interpreted message follows.
    pub const INTERPRETED: i64 = 5;
    /// A warning code follows.
    pub const WARNING: i64 = 18;
}

/// Engine codes the driver reacts to.
pub mod code {
    /// Partial blob segment returned.
    pub const SEGMENT: i64 = 335_544_366;
    /// End of blob reached.
    pub const SEGSTR_EOF: i64 = 335_544_367;
    /// Generic network failure.
    pub const NETWORK_ERROR: i64 = 335_544_721;
    /// Lock conflict.
    pub const LOCK_CONFLICT: i64 = 335_544_345;
    /// Dynamic SQL error.
    pub const DSQL_ERROR: i64 = 335_544_569;
}

/// Translates status vectors into SQL codes and text.
///
/// Implemented by transports, since only the server side knows its
/// message catalogue.
pub trait StatusInterpreter {
    /// SQL code (e.g. `-104`) corresponding to a status vector.
    fn sql_code(&self, status: &[i64; STATUS_LEN]) -> i32;

    /// Text for a SQL code.
    fn sql_message(&self, sql_code: i32) -> String;

    /// One line per chained engine error.
    fn engine_messages(&self, status: &[i64; STATUS_LEN]) -> Vec<String>;
}

/// The result status of one server call.
#[derive(Clone, Default)]
pub struct StatusVector {
    cells: [i64; STATUS_LEN],
    message: OnceCell<String>,
    sql_code: OnceCell<i32>,
}

impl StatusVector {
    /// A success vector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a vector from leading cells; the rest are zero.
    #[must_use]
    pub fn from_cells(cells: &[i64]) -> Self {
        let mut vector = Self::new();
        let n = cells.len().min(STATUS_LEN);
        vector.cells[..n].copy_from_slice(&cells[..n]);
        vector
    }

    /// An error vector carrying a single engine code.
    #[must_use]
    pub fn error(engine_code: i64) -> Self {
        Self::from_cells(&[arg::GDS, engine_code, arg::END])
    }

    /// Zero all cells and drop any cached rendering.
    pub fn reset(&mut self) {
        self.cells = [0; STATUS_LEN];
        self.message = OnceCell::new();
        self.sql_code = OnceCell::new();
    }

    /// Raw cells.
    #[must_use]
    pub fn cells(&self) -> &[i64; STATUS_LEN] {
        &self.cells
    }

    /// Whether the vector reports an error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.cells[0] == arg::GDS && self.cells[1] > 0
    }

    /// Engine error code, or 0 when the vector does not start with one.
    #[must_use]
    pub fn engine_code(&self) -> i64 {
        if self.cells[0] == arg::GDS {
            self.cells[1]
        } else {
            0
        }
    }

    /// Whether `code` appears as the leading engine code.
    #[must_use]
    pub fn is(&self, code: i64) -> bool {
        self.engine_code() == code
    }

    /// SQL code, looked up once.
    pub fn sql_code(&self, interpreter: &dyn StatusInterpreter) -> i32 {
        *self
            .sql_code
            .get_or_init(|| interpreter.sql_code(&self.cells))
    }

    /// Rendered diagnostic text, computed on first call and cached.
    pub fn error_message(&self, interpreter: &dyn StatusInterpreter) -> &str {
        self.message.get_or_init(|| {
            let sql_code = self.sql_code(interpreter);
            let mut text = format!(
                "SQL Message : {}\n{}\n\nEngine Code    : {}\nEngine Message :",
                sql_code,
                interpreter.sql_message(sql_code),
                self.engine_code()
            );
            for line in interpreter.engine_messages(&self.cells) {
                text.push('\n');
                text.push_str(&line);
            }
            text
        })
    }

    /// Cached message, if [`error_message`](Self::error_message) already ran.
    #[must_use]
    pub fn cached_message(&self) -> Option<&str> {
        self.message.get().map(String::as_str)
    }
}

impl PartialEq for StatusVector {
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
    }
}

impl Eq for StatusVector {}

impl fmt::Debug for StatusVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self
            .cells
            .iter()
            .rposition(|c| *c != 0)
            .map_or(0, |i| i + 1);
        f.debug_struct("StatusVector")
            .field("cells", &&self.cells[..used])
            .finish()
    }
}
