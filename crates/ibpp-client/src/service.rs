//! Service manager attachments.
//!
//! The service manager runs administrative tasks on the server: user
//! management, database properties, validation and repair, backup and
//! restore. Each task is started with a service parameter block; its
//! textual output is then drained line by line. Every task except backup
//! and restore is drained before the call returns. Backup and restore
//! leave the output to the caller through [`Service::wait_msg`] or
//! [`Service::wait`].

use bitflags::bitflags;
use ibpp_protocol::tags::{action, spb};
use ibpp_protocol::{info, vax_integer, LengthPrefix, ParamBlock, ProtocolError, Spb};

use crate::arena::ServiceKey;
use crate::client::Client;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::instrumentation::service_span;
use crate::transport::ServiceHandle;

/// An entry of the server's security database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    /// Login name.
    pub username: String,
    /// Password. Never reported back by the server.
    pub password: String,
    /// First name.
    pub firstname: String,
    /// Middle name.
    pub middlename: String,
    /// Last name.
    pub lastname: String,
    /// Unix user id.
    pub userid: u32,
    /// Unix group id.
    pub groupid: u32,
}

impl User {
    /// A user with only a login name.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    fn insert_details(&self, block: &mut ParamBlock<Spb>) -> Result<()> {
        if !self.password.is_empty() {
            block.insert_string(spb::SEC_PASSWORD, LengthPrefix::Word, &self.password)?;
        }
        if !self.firstname.is_empty() {
            block.insert_string(spb::SEC_FIRSTNAME, LengthPrefix::Word, &self.firstname)?;
        }
        if !self.middlename.is_empty() {
            block.insert_string(spb::SEC_MIDDLENAME, LengthPrefix::Word, &self.middlename)?;
        }
        if !self.lastname.is_empty() {
            block.insert_string(spb::SEC_LASTNAME, LengthPrefix::Word, &self.lastname)?;
        }
        if self.userid != 0 {
            block.insert_quad(spb::SEC_USERID, self.userid as i32);
        }
        if self.groupid != 0 {
            block.insert_quad(spb::SEC_GROUPID, self.groupid as i32);
        }
        Ok(())
    }
}

/// How [`Service::shutdown`] takes a database offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Refuse new attachments, fail if any remain after the timeout.
    DenyAttach,
    /// Refuse new transactions, fail if any remain after the timeout.
    DenyTrans,
    /// Shut down after the timeout whatever remains.
    Force,
}

impl ShutdownMode {
    fn tag(self) -> u8 {
        match self {
            Self::DenyAttach => spb::PRP_DENY_NEW_ATTACHMENTS,
            Self::DenyTrans => spb::PRP_DENY_NEW_TRANSACTIONS,
            Self::Force => spb::PRP_SHUTDOWN_DB,
        }
    }
}

bitflags! {
    /// Options of [`Service::repair`].
    ///
    /// Exactly one of `MEND_RECORDS`, `VALIDATE_PAGES` or `VALIDATE_FULL`
    /// picks the task; when several are set the most thorough wins.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RepairFlags: u8 {
        /// Report problems without fixing them.
        const READ_ONLY = 0x01;
        /// Ignore page checksum errors.
        const IGNORE_CHECKSUMS = 0x02;
        /// Drop references to unavailable shadows.
        const KILL_SHADOWS = 0x04;
        /// Mark corrupted records as unavailable.
        const MEND_RECORDS = 0x08;
        /// Validate page structures.
        const VALIDATE_PAGES = 0x10;
        /// Validate page structures and record fragments.
        const VALIDATE_FULL = 0x20;
    }
}

impl RepairFlags {
    fn options(self) -> Option<i32> {
        let mut mask = if self.contains(Self::VALIDATE_FULL) {
            spb::RPR_FULL | spb::RPR_VALIDATE_DB
        } else if self.contains(Self::VALIDATE_PAGES) {
            spb::RPR_VALIDATE_DB
        } else if self.contains(Self::MEND_RECORDS) {
            spb::RPR_MEND_DB
        } else {
            return None;
        };
        if self.contains(Self::READ_ONLY) {
            mask |= spb::RPR_CHECK_DB;
        }
        if self.contains(Self::IGNORE_CHECKSUMS) {
            mask |= spb::RPR_IGNORE_CHECKSUM;
        }
        if self.contains(Self::KILL_SHADOWS) {
            mask |= spb::RPR_KILL_SHADOWS;
        }
        Some(mask)
    }
}

bitflags! {
    /// Options of [`Service::start_backup`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BackupFlags: u8 {
        /// Report progress through the service output.
        const VERBOSE = 0x01;
        /// Ignore page checksum errors.
        const IGNORE_CHECKSUMS = 0x02;
        /// Ignore limbo transactions.
        const IGNORE_LIMBO = 0x04;
        /// Back up metadata only.
        const METADATA_ONLY = 0x08;
        /// Skip garbage collection while reading.
        const NO_GARBAGE_COLLECT = 0x10;
        /// Write a platform-specific backup.
        const NON_TRANSPORTABLE = 0x20;
        /// Back up external tables as internal ones.
        const CONVERT_EXT_TABLES = 0x40;
    }
}

impl BackupFlags {
    fn options(self) -> i32 {
        [
            (Self::IGNORE_CHECKSUMS, spb::BKP_IGNORE_CHECKSUMS),
            (Self::IGNORE_LIMBO, spb::BKP_IGNORE_LIMBO),
            (Self::METADATA_ONLY, spb::BKP_METADATA_ONLY),
            (Self::NO_GARBAGE_COLLECT, spb::BKP_NO_GARBAGE_COLLECT),
            (Self::NON_TRANSPORTABLE, spb::BKP_NON_TRANSPORTABLE),
            (Self::CONVERT_EXT_TABLES, spb::BKP_CONVERT),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .fold(0, |mask, (_, bit)| mask | bit)
    }
}

bitflags! {
    /// Options of [`Service::start_restore`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RestoreFlags: u8 {
        /// Report progress through the service output.
        const VERBOSE = 0x01;
        /// Overwrite an existing database instead of creating a new one.
        const REPLACE = 0x02;
        /// Restore indices inactive.
        const DEACTIVATE_IDX = 0x04;
        /// Do not recreate shadows.
        const NO_SHADOW = 0x08;
        /// Drop validity constraints.
        const NO_VALIDITY = 0x10;
        /// Commit after each table.
        const PER_TABLE_COMMIT = 0x20;
        /// Fill data pages completely.
        const USE_ALL_SPACE = 0x40;
    }
}

impl RestoreFlags {
    fn options(self) -> i32 {
        let base = if self.contains(Self::REPLACE) {
            spb::RES_REPLACE
        } else {
            spb::RES_CREATE
        };
        [
            (Self::DEACTIVATE_IDX, spb::RES_DEACTIVATE_IDX),
            (Self::NO_SHADOW, spb::RES_NO_SHADOW),
            (Self::NO_VALIDITY, spb::RES_NO_VALIDITY),
            (Self::PER_TABLE_COMMIT, spb::RES_ONE_AT_A_TIME),
            (Self::USE_ALL_SPACE, spb::RES_USE_ALL_SPACE),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .fold(base, |mask, (_, bit)| mask | bit)
    }
}

#[derive(Debug)]
pub(crate) struct ServiceState {
    pub(crate) config: ServiceConfig,
    pub(crate) handle: Option<ServiceHandle>,
}

impl ServiceState {
    pub(crate) fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            handle: None,
        }
    }
}

/// Decode the security database listing answered to a user query.
///
/// The listing is not a regular result block: ids are bare 4-byte values
/// while strings carry a 2-byte length. Each user starts at its name.
fn parse_users(listing: &[u8]) -> Result<Vec<User>> {
    let mut users = Vec::new();
    let mut user = User::default();
    let mut pos = 0;
    while let Some(&tag) = listing.get(pos) {
        if tag == info::END {
            break;
        }
        if tag == spb::SEC_USERID || tag == spb::SEC_GROUPID {
            let value = listing
                .get(pos + 1..pos + 5)
                .ok_or(ProtocolError::Truncated { offset: pos })?;
            let id = vax_integer(value) as u32;
            if tag == spb::SEC_USERID {
                user.userid = id;
            } else {
                user.groupid = id;
            }
            pos += 5;
            continue;
        }

        let len = ibpp_protocol::codec::read_len16(listing, pos + 1)
            .ok_or(ProtocolError::Truncated { offset: pos })?;
        let value = listing
            .get(pos + 3..pos + 3 + len)
            .ok_or(ProtocolError::Truncated { offset: pos })?;
        let text = String::from_utf8_lossy(value).into_owned();
        match tag {
            spb::SEC_USERNAME => {
                if !user.username.is_empty() {
                    users.push(std::mem::take(&mut user));
                }
                user = User::new(text);
            }
            spb::SEC_PASSWORD => user.password = text,
            spb::SEC_FIRSTNAME => user.firstname = text,
            spb::SEC_MIDDLENAME => user.middlename = text,
            spb::SEC_LASTNAME => user.lastname = text,
            _ => {}
        }
        pos += 3 + len;
    }
    if !user.username.is_empty() {
        users.push(user);
    }
    Ok(users)
}

fn require_file(context: &'static str, file: &str, what: &str) -> Result<()> {
    if file.is_empty() {
        return Err(Error::logic(context, format!("{what} must be specified.")));
    }
    Ok(())
}

fn properties(dbfile: &str) -> Result<ParamBlock<Spb>> {
    let mut block = ParamBlock::<Spb>::new();
    block.insert(action::PROPERTIES);
    block.insert_string(spb::DBNAME, LengthPrefix::Word, dbfile)?;
    Ok(block)
}

impl Client {
    pub(crate) fn service_state(&self, key: ServiceKey) -> Result<&ServiceState> {
        self.services.get(key).ok_or(Error::InvalidHandle("service"))
    }

    pub(crate) fn service_state_mut(&mut self, key: ServiceKey) -> Result<&mut ServiceState> {
        self.services.get_mut(key).ok_or(Error::InvalidHandle("service"))
    }

    fn connected_service(&self, context: &'static str, key: ServiceKey) -> Result<ServiceHandle> {
        self.service_state(key)?
            .handle
            .ok_or_else(|| Error::logic(context, "Service is not connected."))
    }

    /// Detach, zeroing the handle before reporting a failure.
    pub(crate) fn disconnect_service(&mut self, key: ServiceKey) -> Result<()> {
        const CONTEXT: &str = "Service::Disconnect";
        let Some(handle) = self.service_state_mut(key)?.handle.take() else {
            return Ok(());
        };
        self.transport
            .service_detach(handle)
            .map_err(|status| self.server_error(CONTEXT, status))?;
        tracing::info!("service manager detached");
        Ok(())
    }

    fn start_service(
        &mut self,
        context: &'static str,
        key: ServiceKey,
        request: &ParamBlock<Spb>,
    ) -> Result<ServiceHandle> {
        let handle = self.connected_service(context, key)?;
        tracing::trace!(spb_len = request.len(), "service request built");
        self.transport
            .service_start(handle, request)
            .map_err(|status| self.server_error(context, status))?;
        Ok(handle)
    }

    fn next_service_line(&mut self, context: &'static str, handle: ServiceHandle) -> Result<Option<String>> {
        let items = [info::svc::LINE];
        let block = self
            .transport
            .service_query(handle, &items)
            .map_err(|status| self.server_error(context, status))?;
        let line = match block.get_string(info::svc::LINE) {
            Ok(line) => line,
            Err(ProtocolError::FieldNotFound { .. }) => String::new(),
            Err(e) => return Err(e.into()),
        };
        Ok((!line.is_empty()).then_some(line))
    }

    fn drain_service(&mut self, context: &'static str, handle: ServiceHandle) -> Result<()> {
        while let Some(line) = self.next_service_line(context, handle)? {
            tracing::trace!(%line, "service output");
        }
        Ok(())
    }

    /// Start a task and wait for it to finish.
    fn run_service(
        &mut self,
        context: &'static str,
        key: ServiceKey,
        request: &ParamBlock<Spb>,
    ) -> Result<()> {
        let handle = self.start_service(context, key, request)?;
        self.drain_service(context, handle)
    }

    fn query_users(
        &mut self,
        context: &'static str,
        key: ServiceKey,
        username: Option<&str>,
    ) -> Result<Vec<User>> {
        let mut request = ParamBlock::<Spb>::new();
        request.insert(action::DISPLAY_USER);
        if let Some(name) = username {
            request.insert_string(spb::SEC_USERNAME, LengthPrefix::Word, name)?;
        }
        let handle = self.start_service(context, key, &request)?;

        let items = [info::svc::GET_USERS];
        let block = self
            .transport
            .service_query(handle, &items)
            .map_err(|status| self.server_error(context, status))?;
        match block.entries().next() {
            Some((tag, listing)) if tag == info::svc::GET_USERS => parse_users(listing),
            Some((found, _)) => Err(ProtocolError::UnexpectedItem {
                expected: info::svc::GET_USERS,
                found,
            }
            .into()),
            None => Err(ProtocolError::UnexpectedItem {
                expected: info::svc::GET_USERS,
                found: block.first_tag().unwrap_or(info::END),
            }
            .into()),
        }
    }
}

/// A service manager attachment borrowed from a [`Client`].
pub struct Service<'c> {
    client: &'c mut Client,
    key: ServiceKey,
}

impl<'c> Service<'c> {
    pub(crate) fn new(client: &'c mut Client, key: ServiceKey) -> Self {
        Self { client, key }
    }

    /// Key of this attachment.
    #[must_use]
    pub fn key(&self) -> ServiceKey {
        self.key
    }

    /// Attach to the service manager. Does nothing when already attached.
    pub fn connect(&mut self) -> Result<()> {
        const CONTEXT: &str = "Service::Connect";
        let state = self.client.service_state(self.key)?;
        if state.handle.is_some() {
            return Ok(());
        }
        if state.config.user.is_empty() {
            return Err(Error::logic(CONTEXT, "Unspecified user name."));
        }
        if state.config.password.is_empty() {
            return Err(Error::logic(CONTEXT, "Unspecified user password."));
        }
        let attach = state.config.attach_string();
        let request = state.config.spb()?;

        let span = service_span("attach");
        let _enter = span.enter();
        let handle = self
            .client
            .transport
            .service_attach(&attach, &request)
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        self.client.service_state_mut(self.key)?.handle = Some(handle);
        tracing::info!(service = %attach, "service manager attached");
        Ok(())
    }

    /// Detach from the service manager.
    pub fn disconnect(&mut self) -> Result<()> {
        self.client.disconnect_service(self.key)
    }

    /// Whether the attachment is open.
    pub fn is_connected(&self) -> Result<bool> {
        Ok(self.client.service_state(self.key)?.handle.is_some())
    }

    /// Attachment parameters.
    pub fn config(&self) -> Result<&ServiceConfig> {
        Ok(&self.client.service_state(self.key)?.config)
    }

    /// Server version string.
    pub fn server_version(&mut self) -> Result<String> {
        const CONTEXT: &str = "Service::GetVersion";
        let handle = self.client.connected_service(CONTEXT, self.key)?;
        let items = [info::svc::SERVER_VERSION];
        let block = self
            .client
            .transport
            .service_query(handle, &items)
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        Ok(block.get_string(info::svc::SERVER_VERSION)?)
    }

    /// Add a user to the security database.
    pub fn add_user(&mut self, user: &User) -> Result<()> {
        const CONTEXT: &str = "Service::AddUser";
        self.client.connected_service(CONTEXT, self.key)?;
        if user.username.is_empty() {
            return Err(Error::logic(CONTEXT, "Username required."));
        }
        if user.password.is_empty() {
            return Err(Error::logic(CONTEXT, "Password required."));
        }
        let mut request = ParamBlock::<Spb>::new();
        request.insert(action::ADD_USER);
        request.insert_string(spb::SEC_USERNAME, LengthPrefix::Word, &user.username)?;
        user.insert_details(&mut request)?;

        let span = service_span("add_user");
        let _enter = span.enter();
        self.client.run_service(CONTEXT, self.key, &request)?;
        tracing::debug!(user = %user.username, "user added");
        Ok(())
    }

    /// Update a user. Empty fields and zero ids are left unchanged.
    pub fn modify_user(&mut self, user: &User) -> Result<()> {
        const CONTEXT: &str = "Service::ModifyUser";
        self.client.connected_service(CONTEXT, self.key)?;
        if user.username.is_empty() {
            return Err(Error::logic(CONTEXT, "Username required."));
        }
        let mut request = ParamBlock::<Spb>::new();
        request.insert(action::MODIFY_USER);
        request.insert_string(spb::SEC_USERNAME, LengthPrefix::Word, &user.username)?;
        user.insert_details(&mut request)?;

        let span = service_span("modify_user");
        let _enter = span.enter();
        self.client.run_service(CONTEXT, self.key, &request)
    }

    /// Remove a user.
    pub fn remove_user(&mut self, username: &str) -> Result<()> {
        const CONTEXT: &str = "Service::RemoveUser";
        self.client.connected_service(CONTEXT, self.key)?;
        if username.is_empty() {
            return Err(Error::logic(CONTEXT, "Username required."));
        }
        let mut request = ParamBlock::<Spb>::new();
        request.insert(action::DELETE_USER);
        request.insert_string(spb::SEC_USERNAME, LengthPrefix::Word, username)?;

        let span = service_span("remove_user");
        let _enter = span.enter();
        self.client.run_service(CONTEXT, self.key, &request)
    }

    /// Look up one user. Returns `None` when the name is unknown.
    pub fn get_user(&mut self, username: &str) -> Result<Option<User>> {
        const CONTEXT: &str = "Service::GetUser";
        self.client.connected_service(CONTEXT, self.key)?;
        if username.is_empty() {
            return Err(Error::logic(CONTEXT, "Username required."));
        }
        let users = self.client.query_users(CONTEXT, self.key, Some(username))?;
        Ok(users.into_iter().next())
    }

    /// Every user of the security database.
    pub fn get_users(&mut self) -> Result<Vec<User>> {
        self.client.query_users("Service::GetUsers", self.key, None)
    }

    fn set_property(
        &mut self,
        context: &'static str,
        dbfile: &str,
        fill: impl FnOnce(&mut ParamBlock<Spb>),
    ) -> Result<()> {
        self.client.connected_service(context, self.key)?;
        require_file(context, dbfile, "Main database file")?;
        let mut request = properties(dbfile)?;
        fill(&mut request);

        let span = service_span("properties");
        let _enter = span.enter();
        self.client.run_service(context, self.key, &request)?;
        tracing::debug!(database = dbfile, operation = context, "database property set");
        Ok(())
    }

    /// Set the number of cache pages of a database.
    pub fn set_page_buffers(&mut self, dbfile: &str, buffers: i32) -> Result<()> {
        self.set_property("Service::SetPageBuffers", dbfile, |block| {
            block.insert_quad(spb::PRP_PAGE_BUFFERS, buffers);
        })
    }

    /// Set the automatic sweep interval, in transactions. Zero disables it.
    pub fn set_sweep_interval(&mut self, dbfile: &str, sweep: i32) -> Result<()> {
        self.set_property("Service::SetSweepInterval", dbfile, |block| {
            block.insert_quad(spb::PRP_SWEEP_INTERVAL, sweep);
        })
    }

    /// Turn forced writes on or off.
    pub fn set_sync_write(&mut self, dbfile: &str, sync: bool) -> Result<()> {
        let mode = if sync { spb::PRP_WM_SYNC } else { spb::PRP_WM_ASYNC };
        self.set_property("Service::SetSyncWrite", dbfile, |block| {
            block.insert_byte(spb::PRP_WRITE_MODE, mode);
        })
    }

    /// Make a database read-only or read-write.
    pub fn set_read_only(&mut self, dbfile: &str, read_only: bool) -> Result<()> {
        let mode = if read_only {
            spb::PRP_AM_READONLY
        } else {
            spb::PRP_AM_READWRITE
        };
        self.set_property("Service::SetReadOnly", dbfile, |block| {
            block.insert_byte(spb::PRP_ACCESS_MODE, mode);
        })
    }

    /// Reserve space on data pages for record versions, or fill them.
    pub fn set_reserve_space(&mut self, dbfile: &str, reserve: bool) -> Result<()> {
        let mode = if reserve {
            spb::PRP_RES
        } else {
            spb::PRP_RES_USE_FULL
        };
        self.set_property("Service::SetReserveSpace", dbfile, |block| {
            block.insert_byte(spb::PRP_RESERVE_SPACE, mode);
        })
    }

    /// Take a database offline after `timeout` seconds.
    pub fn shutdown(&mut self, dbfile: &str, mode: ShutdownMode, timeout: i32) -> Result<()> {
        self.set_property("Service::Shutdown", dbfile, |block| {
            block.insert_quad(mode.tag(), timeout);
        })
    }

    /// Bring a database back online.
    pub fn restart(&mut self, dbfile: &str) -> Result<()> {
        self.set_property("Service::Restart", dbfile, |block| {
            block.insert_quad(spb::OPTIONS, spb::PRP_DB_ONLINE);
        })
    }

    /// Garbage collect a database.
    pub fn sweep(&mut self, dbfile: &str) -> Result<()> {
        const CONTEXT: &str = "Service::Sweep";
        self.client.connected_service(CONTEXT, self.key)?;
        require_file(CONTEXT, dbfile, "Main database file")?;
        let mut request = ParamBlock::<Spb>::new();
        request.insert(action::REPAIR);
        request.insert_string(spb::DBNAME, LengthPrefix::Word, dbfile)?;
        request.insert_quad(spb::OPTIONS, spb::RPR_SWEEP_DB);

        let span = service_span("sweep");
        let _enter = span.enter();
        self.client.run_service(CONTEXT, self.key, &request)
    }

    /// Validate or mend a database.
    pub fn repair(&mut self, dbfile: &str, flags: RepairFlags) -> Result<()> {
        const CONTEXT: &str = "Service::Repair";
        self.client.connected_service(CONTEXT, self.key)?;
        require_file(CONTEXT, dbfile, "Main database file")?;
        let options = flags.options().ok_or_else(|| {
            Error::logic(
                CONTEXT,
                "One of MEND_RECORDS, VALIDATE_PAGES, VALIDATE_FULL is required.",
            )
        })?;
        let mut request = ParamBlock::<Spb>::new();
        request.insert(action::REPAIR);
        request.insert_string(spb::DBNAME, LengthPrefix::Word, dbfile)?;
        request.insert_quad(spb::OPTIONS, options);

        let span = service_span("repair");
        let _enter = span.enter();
        self.client.run_service(CONTEXT, self.key, &request)
    }

    /// Start backing up `dbfile` to `bkfile`.
    ///
    /// Returns once the server accepted the task; drain its output with
    /// [`wait_msg`](Self::wait_msg) or [`wait`](Self::wait).
    pub fn start_backup(&mut self, dbfile: &str, bkfile: &str, flags: BackupFlags) -> Result<()> {
        const CONTEXT: &str = "Service::Backup";
        self.client.connected_service(CONTEXT, self.key)?;
        require_file(CONTEXT, dbfile, "Main database file")?;
        require_file(CONTEXT, bkfile, "Backup file")?;
        let mut request = ParamBlock::<Spb>::new();
        request.insert(action::BACKUP);
        request.insert_string(spb::DBNAME, LengthPrefix::Word, dbfile)?;
        request.insert_string(spb::BKP_FILE, LengthPrefix::Word, bkfile)?;
        if flags.contains(BackupFlags::VERBOSE) {
            request.insert(spb::VERBOSE);
        }
        let options = flags.options();
        if options != 0 {
            request.insert_quad(spb::OPTIONS, options);
        }

        let span = service_span("backup");
        let _enter = span.enter();
        self.client.start_service(CONTEXT, self.key, &request)?;
        tracing::info!(database = dbfile, backup = bkfile, "backup started");
        Ok(())
    }

    /// Start restoring `bkfile` into `dbfile`.
    ///
    /// A zero `page_size` keeps the page size recorded in the backup.
    pub fn start_restore(
        &mut self,
        bkfile: &str,
        dbfile: &str,
        page_size: i32,
        flags: RestoreFlags,
    ) -> Result<()> {
        const CONTEXT: &str = "Service::Restore";
        self.client.connected_service(CONTEXT, self.key)?;
        require_file(CONTEXT, bkfile, "Backup file")?;
        require_file(CONTEXT, dbfile, "Main database file")?;
        let mut request = ParamBlock::<Spb>::new();
        request.insert(action::RESTORE);
        request.insert_string(spb::BKP_FILE, LengthPrefix::Word, bkfile)?;
        request.insert_string(spb::DBNAME, LengthPrefix::Word, dbfile)?;
        if flags.contains(RestoreFlags::VERBOSE) {
            request.insert(spb::VERBOSE);
        }
        if page_size != 0 {
            request.insert_quad(spb::RES_PAGE_SIZE, page_size);
        }
        request.insert_quad(spb::OPTIONS, flags.options());

        let span = service_span("restore");
        let _enter = span.enter();
        self.client.start_service(CONTEXT, self.key, &request)?;
        tracing::info!(backup = bkfile, database = dbfile, "restore started");
        Ok(())
    }

    /// Next line of output of the running task, or `None` once it is done.
    pub fn wait_msg(&mut self) -> Result<Option<String>> {
        const CONTEXT: &str = "Service::Wait";
        let handle = self.client.connected_service(CONTEXT, self.key)?;
        self.client.next_service_line(CONTEXT, handle)
    }

    /// Discard the output of the running task until it is done.
    pub fn wait(&mut self) -> Result<()> {
        const CONTEXT: &str = "Service::Wait";
        let handle = self.client.connected_service(CONTEXT, self.key)?;
        self.client.drain_service(CONTEXT, handle)
    }
}

impl std::fmt::Debug for Service<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").field("key", &self.key).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn text(tag: u8, value: &str) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
        out.extend_from_slice(value.as_bytes());
        out
    }

    fn id(tag: u8, value: u32) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend_from_slice(&value.to_le_bytes());
        out
    }

    #[test]
    fn test_parse_users_splits_on_names() {
        let listing = [
            text(spb::SEC_USERNAME, "SYSDBA"),
            id(spb::SEC_USERID, 0),
            id(spb::SEC_GROUPID, 0),
            text(spb::SEC_USERNAME, "ALICE"),
            text(spb::SEC_FIRSTNAME, "Alice"),
            text(spb::SEC_LASTNAME, "Liddell"),
            id(spb::SEC_USERID, 1001),
            id(spb::SEC_GROUPID, 100),
        ]
        .concat();

        let users = parse_users(&listing).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "SYSDBA");
        assert_eq!(users[1].firstname, "Alice");
        assert_eq!(users[1].lastname, "Liddell");
        assert_eq!(users[1].userid, 1001);
        assert_eq!(users[1].groupid, 100);
    }

    #[test]
    fn test_parse_users_rejects_truncated_listing() {
        let mut listing = text(spb::SEC_USERNAME, "BOB");
        listing.push(spb::SEC_USERID);
        listing.push(1);
        assert!(parse_users(&listing).is_err());
        assert!(parse_users(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_repair_requires_a_task() {
        assert_eq!(RepairFlags::READ_ONLY.options(), None);
        assert_eq!(
            (RepairFlags::VALIDATE_FULL | RepairFlags::MEND_RECORDS).options(),
            Some(spb::RPR_FULL | spb::RPR_VALIDATE_DB)
        );
        assert_eq!(
            (RepairFlags::MEND_RECORDS | RepairFlags::KILL_SHADOWS).options(),
            Some(spb::RPR_MEND_DB | spb::RPR_KILL_SHADOWS)
        );
    }

    #[test]
    fn test_restore_defaults_to_create() {
        assert_eq!(RestoreFlags::empty().options(), spb::RES_CREATE);
        assert_eq!(
            (RestoreFlags::REPLACE | RestoreFlags::NO_SHADOW).options(),
            spb::RES_REPLACE | spb::RES_NO_SHADOW
        );
        assert_eq!(BackupFlags::VERBOSE.options(), 0);
        assert_eq!(
            BackupFlags::METADATA_ONLY.options(),
            spb::BKP_METADATA_ONLY
        );
    }
}
