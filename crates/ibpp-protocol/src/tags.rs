//! Cluster tags for database, transaction and service parameter blocks.

/// Database parameter block (DPB) tags.
pub mod dpb {
    /// Version byte written at the start of every DPB.
    pub const VERSION1: u8 = 1;
    /// Number of cache buffers.
    pub const NUM_BUFFERS: u8 = 5;
    /// Sweep interval.
    pub const SWEEP_INTERVAL: u8 = 22;
    /// Forced writes on or off.
    pub const FORCE_WRITE: u8 = 24;
    /// Do not reserve space for record versions.
    pub const NO_RESERVE: u8 = 27;
    /// User name.
    pub const USER_NAME: u8 = 28;
    /// Password.
    pub const PASSWORD: u8 = 29;
    /// Connection character set.
    pub const LC_CTYPE: u8 = 48;
    /// SQL role.
    pub const SQL_ROLE_NAME: u8 = 60;
    /// SQL dialect for database creation.
    pub const SQL_DIALECT: u8 = 63;
}

/// Transaction parameter block (TPB) tags.
pub mod tpb {
    /// Version byte written at the start of every TPB.
    pub const VERSION3: u8 = 3;
    /// Table-stability isolation.
    pub const CONSISTENCY: u8 = 1;
    /// Snapshot isolation.
    pub const CONCURRENCY: u8 = 2;
    /// Shared table reservation.
    pub const SHARED: u8 = 3;
    /// Protected table reservation.
    pub const PROTECTED: u8 = 4;
    /// Exclusive table reservation.
    pub const EXCLUSIVE: u8 = 5;
    /// Wait on lock conflicts.
    pub const WAIT: u8 = 6;
    /// Fail immediately on lock conflicts.
    pub const NOWAIT: u8 = 7;
    /// Read-only access.
    pub const READ: u8 = 8;
    /// Read-write access.
    pub const WRITE: u8 = 9;
    /// Reserve a table for reading.
    pub const LOCK_READ: u8 = 10;
    /// Reserve a table for writing.
    pub const LOCK_WRITE: u8 = 11;
    /// Ignore limbo transactions.
    pub const IGNORE_LIMBO: u8 = 14;
    /// Read-committed isolation.
    pub const READ_COMMITTED: u8 = 15;
    /// Commit automatically after each statement.
    pub const AUTOCOMMIT: u8 = 16;
    /// Read the latest committed record version.
    pub const REC_VERSION: u8 = 17;
    /// Wait for uncommitted record versions.
    pub const NO_REC_VERSION: u8 = 18;
    /// Disable the transaction-level undo log.
    pub const NO_AUTO_UNDO: u8 = 20;
}

/// Service parameter block (SPB) tags.
pub mod spb {
    /// Leading SPB opcode for attach blocks.
    pub const VERSION: u8 = 2;
    /// Current SPB version, follows [`VERSION`].
    pub const CURRENT_VERSION: u8 = 2;
    /// User name.
    pub const USER_NAME: u8 = 28;
    /// Password.
    pub const PASSWORD: u8 = 29;
    /// Database file name.
    pub const DBNAME: u8 = 106;
    /// Verbose output.
    pub const VERBOSE: u8 = 107;
    /// Option bit mask.
    pub const OPTIONS: u8 = 108;

    /// Security database user id.
    pub const SEC_USERID: u8 = 5;
    /// Security database group id.
    pub const SEC_GROUPID: u8 = 6;
    /// Security database user name.
    pub const SEC_USERNAME: u8 = 7;
    /// Security database password.
    pub const SEC_PASSWORD: u8 = 8;
    /// Security database group name.
    pub const SEC_GROUPNAME: u8 = 9;
    /// Security database first name.
    pub const SEC_FIRSTNAME: u8 = 10;
    /// Security database middle name.
    pub const SEC_MIDDLENAME: u8 = 11;
    /// Security database last name.
    pub const SEC_LASTNAME: u8 = 12;

    /// Backup file name.
    pub const BKP_FILE: u8 = 5;
    /// Restore page size.
    pub const RES_PAGE_SIZE: u8 = 10;

    /// Property: page buffers.
    pub const PRP_PAGE_BUFFERS: u8 = 5;
    /// Property: sweep interval.
    pub const PRP_SWEEP_INTERVAL: u8 = 6;
    /// Property: forced shutdown timeout.
    pub const PRP_SHUTDOWN_DB: u8 = 7;
    /// Property: deny new attachments timeout.
    pub const PRP_DENY_NEW_ATTACHMENTS: u8 = 9;
    /// Property: deny new transactions timeout.
    pub const PRP_DENY_NEW_TRANSACTIONS: u8 = 10;
    /// Property: reserve space.
    pub const PRP_RESERVE_SPACE: u8 = 11;
    /// Property: write mode.
    pub const PRP_WRITE_MODE: u8 = 12;
    /// Property: access mode.
    pub const PRP_ACCESS_MODE: u8 = 13;
    /// Reserve space value: use the full page.
    pub const PRP_RES_USE_FULL: u8 = 35;
    /// Reserve space value: reserve space.
    pub const PRP_RES: u8 = 36;
    /// Write mode value: asynchronous.
    pub const PRP_WM_ASYNC: u8 = 37;
    /// Write mode value: synchronous.
    pub const PRP_WM_SYNC: u8 = 38;
    /// Access mode value: read-only.
    pub const PRP_AM_READONLY: u8 = 39;
    /// Access mode value: read-write.
    pub const PRP_AM_READWRITE: u8 = 40;
    /// Option mask: bring a database back online.
    pub const PRP_DB_ONLINE: i32 = 0x0200;

    /// Repair mask: validate the database.
    pub const RPR_VALIDATE_DB: i32 = 0x01;
    /// Repair mask: sweep the database.
    pub const RPR_SWEEP_DB: i32 = 0x02;
    /// Repair mask: mend the database.
    pub const RPR_MEND_DB: i32 = 0x04;
    /// Repair mask: read-only check.
    pub const RPR_CHECK_DB: i32 = 0x10;
    /// Repair mask: ignore checksum errors.
    pub const RPR_IGNORE_CHECKSUM: i32 = 0x20;
    /// Repair mask: kill unavailable shadows.
    pub const RPR_KILL_SHADOWS: i32 = 0x40;
    /// Repair mask: full validation.
    pub const RPR_FULL: i32 = 0x80;

    /// Backup mask: ignore checksums.
    pub const BKP_IGNORE_CHECKSUMS: i32 = 0x01;
    /// Backup mask: ignore limbo transactions.
    pub const BKP_IGNORE_LIMBO: i32 = 0x02;
    /// Backup mask: metadata only.
    pub const BKP_METADATA_ONLY: i32 = 0x04;
    /// Backup mask: skip garbage collection.
    pub const BKP_NO_GARBAGE_COLLECT: i32 = 0x08;
    /// Backup mask: non-transportable format.
    pub const BKP_NON_TRANSPORTABLE: i32 = 0x20;
    /// Backup mask: convert external tables.
    pub const BKP_CONVERT: i32 = 0x40;

    /// Restore mask: deactivate indexes.
    pub const RES_DEACTIVATE_IDX: i32 = 0x0100;
    /// Restore mask: do not recreate shadows.
    pub const RES_NO_SHADOW: i32 = 0x0200;
    /// Restore mask: skip validity constraints.
    pub const RES_NO_VALIDITY: i32 = 0x0400;
    /// Restore mask: commit after each table.
    pub const RES_ONE_AT_A_TIME: i32 = 0x0800;
    /// Restore mask: replace an existing database.
    pub const RES_REPLACE: i32 = 0x1000;
    /// Restore mask: create a new database.
    pub const RES_CREATE: i32 = 0x2000;
    /// Restore mask: fill pages completely.
    pub const RES_USE_ALL_SPACE: i32 = 0x4000;
}

/// Service manager actions, the first byte of a service start block.
pub mod action {
    /// Start a backup.
    pub const BACKUP: u8 = 1;
    /// Start a restore.
    pub const RESTORE: u8 = 2;
    /// Repair or sweep.
    pub const REPAIR: u8 = 3;
    /// Add a user.
    pub const ADD_USER: u8 = 4;
    /// Delete a user.
    pub const DELETE_USER: u8 = 5;
    /// Modify a user.
    pub const MODIFY_USER: u8 = 6;
    /// List users.
    pub const DISPLAY_USER: u8 = 7;
    /// Change database properties.
    pub const PROPERTIES: u8 = 8;
}
