//! Information item tags used in info requests and result blocks.

/// End of an information buffer.
pub const END: u8 = 1;
/// The buffer was too small for the answer.
pub const TRUNCATED: u8 = 2;
/// The server could not answer an item.
pub const ERROR: u8 = 3;

/// Database information items.
pub mod db {
    /// Page reads.
    pub const READS: u8 = 5;
    /// Page writes.
    pub const WRITES: u8 = 6;
    /// Page fetches.
    pub const FETCHES: u8 = 7;
    /// Page marks.
    pub const MARKS: u8 = 8;
    /// Page size in bytes.
    pub const PAGE_SIZE: u8 = 14;
    /// Number of cache buffers.
    pub const NUM_BUFFERS: u8 = 15;
    /// Allocated pages.
    pub const ALLOCATION: u8 = 21;
    /// Sequential reads per table.
    pub const READ_SEQ_COUNT: u8 = 23;
    /// Indexed reads per table.
    pub const READ_IDX_COUNT: u8 = 24;
    /// Inserts per table.
    pub const INSERT_COUNT: u8 = 25;
    /// Updates per table.
    pub const UPDATE_COUNT: u8 = 26;
    /// Deletes per table.
    pub const DELETE_COUNT: u8 = 27;
    /// Sweep interval.
    pub const SWEEP_INTERVAL: u8 = 31;
    /// On-disk structure major version.
    pub const ODS_VERSION: u8 = 32;
    /// On-disk structure minor version.
    pub const ODS_MINOR_VERSION: u8 = 33;
    /// Space reservation disabled.
    pub const NO_RESERVE: u8 = 34;
    /// Forced writes enabled.
    pub const FORCED_WRITES: u8 = 52;
    /// Names of attached users.
    pub const USER_NAMES: u8 = 53;
    /// SQL dialect of the database.
    pub const SQL_DIALECT: u8 = 62;
}

/// Statement information items.
pub mod sql {
    /// Output descriptor.
    pub const SELECT: u8 = 4;
    /// Input descriptor.
    pub const BIND: u8 = 5;
    /// Statement type.
    pub const STMT_TYPE: u8 = 21;
    /// Access plan.
    pub const GET_PLAN: u8 = 22;
    /// Affected record counts.
    pub const RECORDS: u8 = 23;
}

/// Sub-items of [`sql::RECORDS`].
pub mod req {
    /// Rows inserted.
    pub const INSERT_COUNT: u8 = 13;
    /// Rows updated.
    pub const UPDATE_COUNT: u8 = 14;
    /// Rows deleted.
    pub const DELETE_COUNT: u8 = 15;
    /// Rows selected.
    pub const SELECT_COUNT: u8 = 16;
}

/// Statement type codes reported for [`sql::STMT_TYPE`].
pub mod stmt {
    /// SELECT.
    pub const SELECT: i64 = 1;
    /// INSERT.
    pub const INSERT: i64 = 2;
    /// UPDATE.
    pub const UPDATE: i64 = 3;
    /// DELETE.
    pub const DELETE: i64 = 4;
    /// DDL.
    pub const DDL: i64 = 5;
    /// Blob segment read.
    pub const GET_SEGMENT: i64 = 6;
    /// Blob segment write.
    pub const PUT_SEGMENT: i64 = 7;
    /// EXECUTE PROCEDURE.
    pub const EXEC_PROCEDURE: i64 = 8;
    /// START TRANSACTION.
    pub const START_TRANS: i64 = 9;
    /// COMMIT.
    pub const COMMIT: i64 = 10;
    /// ROLLBACK.
    pub const ROLLBACK: i64 = 11;
    /// SELECT ... FOR UPDATE.
    pub const SELECT_FOR_UPD: i64 = 12;
    /// SET GENERATOR.
    pub const SET_GENERATOR: i64 = 13;
    /// SAVEPOINT.
    pub const SAVEPOINT: i64 = 14;
}

/// Blob information items.
pub mod blob {
    /// Number of segments.
    pub const NUM_SEGMENTS: u8 = 4;
    /// Largest segment size.
    pub const MAX_SEGMENT: u8 = 5;
    /// Total length in bytes.
    pub const TOTAL_LENGTH: u8 = 6;
    /// Segmented or stream blob.
    pub const TYPE: u8 = 7;
}

/// Service information items.
pub mod svc {
    /// Server version string.
    pub const SERVER_VERSION: u8 = 55;
    /// One line of service output.
    pub const LINE: u8 = 62;
    /// User list.
    pub const GET_USERS: u8 = 68;
}
