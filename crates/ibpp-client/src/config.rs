//! Client configuration.

use bitflags::bitflags;
use ibpp_protocol::tags::{dpb, spb, tpb};
use ibpp_protocol::{Dialect, Dpb, LengthPrefix, ParamBlock, Spb, Tpb};

use crate::error::{Error, Result};
use crate::instrumentation::SanitizationConfig;

/// Largest segment written by whole-blob saves.
pub const DEFAULT_BLOB_SEGMENT_SIZE: usize = 32 * 1024 - 1;

/// Settings shared by every resource of a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How SQL text is recorded in tracing output.
    pub instrumentation: SanitizationConfig,
    /// Segment size used by [`Blob::save`](crate::Blob::save) and
    /// blob-backed string parameters.
    pub blob_segment_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            instrumentation: SanitizationConfig::default(),
            blob_segment_size: DEFAULT_BLOB_SEGMENT_SIZE,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SQL sanitization used in tracing output.
    #[must_use]
    pub fn instrumentation(mut self, config: SanitizationConfig) -> Self {
        self.instrumentation = config;
        self
    }

    /// Set the blob segment size, clamped to `1..=65535`.
    #[must_use]
    pub fn blob_segment_size(mut self, size: usize) -> Self {
        self.blob_segment_size = clamp_segment_size(size);
        self
    }

    /// Segment size actually used for transfers.
    ///
    /// The field is public, so it is clamped again here.
    #[must_use]
    pub fn segment_size(&self) -> usize {
        clamp_segment_size(self.blob_segment_size)
    }
}

fn clamp_segment_size(size: usize) -> usize {
    size.clamp(1, usize::from(u16::MAX))
}

/// Where and how to attach to a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Server host, empty for a local attachment.
    pub server: String,
    /// Database path or alias on the server.
    pub database: String,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
    /// SQL role.
    pub role: String,
    /// Connection character set.
    pub charset: String,
    /// Extra clauses appended to `CREATE DATABASE`.
    pub create_params: String,
    /// Dialect requested for statements.
    pub dialect: Dialect,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
            role: String::new(),
            charset: String::new(),
            create_params: String::new(),
            dialect: Dialect::V3,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a database path or alias.
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Parse a connection string.
    ///
    /// Format: `[server:]path[?key=value&key=value...]` with keys `user`,
    /// `password`, `role`, `charset` and `dialect`. A single-letter prefix
    /// before the colon is taken as a drive letter, not a server.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let (target, options) = conn_str
            .trim()
            .split_once('?')
            .unwrap_or((conn_str.trim(), ""));

        let mut config = Self::default();
        match target.split_once(':') {
            Some((server, path)) if server.len() > 1 => {
                config.server = server.to_string();
                config.database = path.to_string();
            }
            _ => config.database = target.to_string(),
        }
        if config.database.is_empty() {
            return Err(Error::Config(format!("missing database path: {conn_str}")));
        }

        for part in options.split('&') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("invalid key-value: {part}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user" | "user_name" | "username" => config.user = value.to_string(),
                "password" | "pwd" => config.password = value.to_string(),
                "role" => config.role = value.to_string(),
                "charset" | "lc_ctype" => config.charset = value.to_string(),
                "dialect" => {
                    config.dialect = value
                        .parse::<i64>()
                        .ok()
                        .and_then(Dialect::from_i64)
                        .ok_or_else(|| Error::Config(format!("invalid dialect: {value}")))?;
                }
                _ => {
                    tracing::debug!(key = %key, "ignoring unknown connection string option");
                }
            }
        }

        Ok(config)
    }

    /// Set the server host.
    #[must_use]
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Set the user name.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the SQL role.
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Set the connection character set.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Set clauses appended to `CREATE DATABASE` (page size, charset...).
    #[must_use]
    pub fn create_params(mut self, params: impl Into<String>) -> Self {
        self.create_params = params.into();
        self
    }

    /// Set the dialect.
    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// `server:path`, or just the path for a local attachment.
    #[must_use]
    pub fn attach_string(&self) -> String {
        if self.server.is_empty() {
            self.database.clone()
        } else {
            format!("{}:{}", self.server, self.database)
        }
    }

    pub(crate) fn dpb(&self) -> Result<ParamBlock<Dpb>> {
        let mut block = ParamBlock::<Dpb>::new();
        block.insert_str(dpb::USER_NAME, &self.user)?;
        block.insert_str(dpb::PASSWORD, &self.password)?;
        if !self.role.is_empty() {
            block.insert_str(dpb::SQL_ROLE_NAME, &self.role)?;
        }
        if !self.charset.is_empty() {
            block.insert_str(dpb::LC_CTYPE, &self.charset)?;
        }
        Ok(block)
    }

    pub(crate) fn create_sql(&self) -> String {
        let mut sql = format!(
            "CREATE DATABASE '{}' USER '{}'",
            self.attach_string(),
            self.user
        );
        if !self.password.is_empty() {
            sql.push_str(&format!(" PASSWORD '{}'", self.password));
        }
        if !self.create_params.is_empty() {
            sql.push(' ');
            sql.push_str(&self.create_params);
        }
        sql
    }
}

/// Whether a transaction may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read and write.
    #[default]
    Write,
    /// Read only.
    Read,
}

/// Transaction isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Snapshot.
    #[default]
    Concurrency,
    /// Snapshot with table stability.
    Consistency,
    /// Read committed, waiting on uncommitted record versions.
    ReadCommitted,
    /// Read committed, reading the latest committed version.
    ReadDirty,
}

/// What to do on a lock conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockResolution {
    /// Wait for the conflicting transaction.
    #[default]
    Wait,
    /// Fail immediately.
    NoWait,
}

bitflags! {
    /// Optional transaction behaviors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TransactionFlags: u8 {
        /// Ignore limbo transactions.
        const IGNORE_LIMBO = 0x01;
        /// Commit after each statement.
        const AUTO_COMMIT = 0x02;
        /// Do not keep an undo log.
        const NO_AUTO_UNDO = 0x04;
    }
}

/// Parameters of one database's share in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionConfig {
    /// Access mode.
    pub access: AccessMode,
    /// Isolation level.
    pub isolation: IsolationLevel,
    /// Lock conflict policy.
    pub lock_resolution: LockResolution,
    /// Extra flags.
    pub flags: TransactionFlags,
}

impl TransactionConfig {
    /// Default settings: write, concurrency, wait.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the access mode.
    #[must_use]
    pub fn access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    /// Set the isolation level.
    #[must_use]
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// Set the lock conflict policy.
    #[must_use]
    pub fn lock_resolution(mut self, lock_resolution: LockResolution) -> Self {
        self.lock_resolution = lock_resolution;
        self
    }

    /// Set extra flags.
    #[must_use]
    pub fn flags(mut self, flags: TransactionFlags) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn tpb(&self) -> ParamBlock<Tpb> {
        let mut block = ParamBlock::<Tpb>::new();
        block.insert(match self.access {
            AccessMode::Read => tpb::READ,
            AccessMode::Write => tpb::WRITE,
        });
        match self.isolation {
            IsolationLevel::Consistency => block.insert(tpb::CONSISTENCY),
            IsolationLevel::ReadDirty => {
                block.insert(tpb::READ_COMMITTED);
                block.insert(tpb::REC_VERSION);
            }
            IsolationLevel::ReadCommitted => {
                block.insert(tpb::READ_COMMITTED);
                block.insert(tpb::NO_REC_VERSION);
            }
            IsolationLevel::Concurrency => block.insert(tpb::CONCURRENCY),
        }
        block.insert(match self.lock_resolution {
            LockResolution::NoWait => tpb::NOWAIT,
            LockResolution::Wait => tpb::WAIT,
        });
        if self.flags.contains(TransactionFlags::IGNORE_LIMBO) {
            block.insert(tpb::IGNORE_LIMBO);
        }
        if self.flags.contains(TransactionFlags::AUTO_COMMIT) {
            block.insert(tpb::AUTOCOMMIT);
        }
        if self.flags.contains(TransactionFlags::NO_AUTO_UNDO) {
            block.insert(tpb::NO_AUTO_UNDO);
        }
        block
    }
}

/// Where and how to attach to a service manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Server host, empty for a local attachment.
    pub server: String,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
}

impl ServiceConfig {
    /// Configuration for a server host.
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Set the user name.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// `server:service_mgr`, or `service_mgr` for a local attachment.
    #[must_use]
    pub fn attach_string(&self) -> String {
        if self.server.is_empty() {
            "service_mgr".to_string()
        } else {
            format!("{}:service_mgr", self.server)
        }
    }

    pub(crate) fn spb(&self) -> Result<ParamBlock<Spb>> {
        let mut block = ParamBlock::<Spb>::new();
        block.insert(spb::VERSION);
        block.insert(spb::CURRENT_VERSION);
        block.insert_string(spb::USER_NAME, LengthPrefix::Byte, &self.user)?;
        block.insert_string(spb::PASSWORD, LengthPrefix::Byte, &self.password)?;
        Ok(block)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_parsing() {
        let config = DatabaseConfig::from_connection_string(
            "db.example.com:/data/employee.fdb?user=SYSDBA&password=masterkey&role=ADMIN&charset=UTF8&dialect=1",
        )
        .unwrap();

        assert_eq!(config.server, "db.example.com");
        assert_eq!(config.database, "/data/employee.fdb");
        assert_eq!(config.user, "SYSDBA");
        assert_eq!(config.password, "masterkey");
        assert_eq!(config.role, "ADMIN");
        assert_eq!(config.charset, "UTF8");
        assert_eq!(config.dialect, Dialect::V1);
    }

    #[test]
    fn test_drive_letter_is_not_a_server() {
        let config = DatabaseConfig::from_connection_string(r"C:\data\test.fdb").unwrap();
        assert!(config.server.is_empty());
        assert_eq!(config.database, r"C:\data\test.fdb");
        assert_eq!(config.attach_string(), r"C:\data\test.fdb");

        let config =
            DatabaseConfig::from_connection_string(r"fbhost:C:\data\test.fdb?user=u").unwrap();
        assert_eq!(config.server, "fbhost");
        assert_eq!(config.attach_string(), r"fbhost:C:\data\test.fdb");
    }

    #[test]
    fn test_connection_string_rejects_bad_dialect() {
        let err = DatabaseConfig::from_connection_string("x.fdb?dialect=2").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(DatabaseConfig::from_connection_string("?user=a").is_err());
        assert!(DatabaseConfig::from_connection_string("x.fdb?user").is_err());
    }

    #[test]
    fn test_unknown_options_are_ignored() {
        let config = DatabaseConfig::from_connection_string("x.fdb?page_size=8192&user=a").unwrap();
        assert_eq!(config.user, "a");
    }

    #[test]
    fn test_dpb_skips_empty_optional_fields() {
        let config = DatabaseConfig::new("x.fdb").user("SYSDBA").password("pw");
        let block = config.dpb().unwrap();
        let mut expected = vec![dpb::VERSION1, dpb::USER_NAME, 6];
        expected.extend_from_slice(b"SYSDBA");
        expected.extend_from_slice(&[dpb::PASSWORD, 2]);
        expected.extend_from_slice(b"pw");
        assert_eq!(block.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_create_sql() {
        let config = DatabaseConfig::new("/db/new.fdb")
            .server("srv")
            .user("SYSDBA")
            .password("pw")
            .create_params("PAGE_SIZE 8192");
        assert_eq!(
            config.create_sql(),
            "CREATE DATABASE 'srv:/db/new.fdb' USER 'SYSDBA' PASSWORD 'pw' PAGE_SIZE 8192"
        );
        let config = DatabaseConfig::new("local.fdb").user("u");
        assert_eq!(config.create_sql(), "CREATE DATABASE 'local.fdb' USER 'u'");
    }

    #[test]
    fn test_default_tpb() {
        let block = TransactionConfig::default().tpb();
        assert_eq!(
            block.as_bytes(),
            &[tpb::VERSION3, tpb::WRITE, tpb::CONCURRENCY, tpb::WAIT]
        );
    }

    #[test]
    fn test_tpb_isolation_and_flags() {
        let block = TransactionConfig::new()
            .access(AccessMode::Read)
            .isolation(IsolationLevel::ReadDirty)
            .lock_resolution(LockResolution::NoWait)
            .flags(TransactionFlags::IGNORE_LIMBO | TransactionFlags::NO_AUTO_UNDO)
            .tpb();
        assert_eq!(
            block.as_bytes(),
            &[
                tpb::VERSION3,
                tpb::READ,
                tpb::READ_COMMITTED,
                tpb::REC_VERSION,
                tpb::NOWAIT,
                tpb::IGNORE_LIMBO,
                tpb::NO_AUTO_UNDO,
            ]
        );

        let block = TransactionConfig::new()
            .isolation(IsolationLevel::ReadCommitted)
            .tpb();
        assert_eq!(&block.as_bytes()[2..4], &[tpb::READ_COMMITTED, tpb::NO_REC_VERSION]);
    }

    #[test]
    fn test_service_attach_string_and_spb() {
        let config = ServiceConfig::new("fbhost").user("SYSDBA").password("pw");
        assert_eq!(config.attach_string(), "fbhost:service_mgr");
        assert_eq!(ServiceConfig::default().attach_string(), "service_mgr");

        let block = config.spb().unwrap();
        assert_eq!(&block.as_bytes()[..2], &[spb::VERSION, spb::CURRENT_VERSION]);
        assert_eq!(block.as_bytes()[2], spb::USER_NAME);
        assert_eq!(block.as_bytes()[3], 6);
    }

    #[test]
    fn test_client_config_segment_size_is_clamped() {
        assert_eq!(ClientConfig::default().blob_segment_size, DEFAULT_BLOB_SEGMENT_SIZE);
        assert_eq!(ClientConfig::new().blob_segment_size(0).blob_segment_size, 1);
        assert_eq!(ClientConfig::new().blob_segment_size(1 << 20).blob_segment_size, 65535);
    }
}
