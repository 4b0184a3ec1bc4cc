//! Segmented large objects.
//!
//! A blob is either created (write mode: sequential appends until closed)
//! or opened by id (read mode: sequential reads until end of stream).
//! Switching mode requires closing or cancelling first.

use ibpp_protocol::{info, Quad};

use crate::arena::{BlobKey, DatabaseKey, TransactionKey};
use crate::client::{discard, Client};
use crate::error::{Error, Result};
use crate::transport::{BlobHandle, DbHandle, Segment, TrHandle};

/// Largest segment a single read or write may transfer.
pub const MAX_SEGMENT_SIZE: usize = 65535;

/// Size and layout of an open blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobInfo {
    /// Total length in bytes.
    pub size: i64,
    /// Length of the largest segment.
    pub largest_segment: i64,
    /// Number of segments.
    pub segments: i64,
}

#[derive(Debug, Default)]
pub(crate) struct BlobState {
    pub(crate) handle: Option<BlobHandle>,
    pub(crate) database: Option<DatabaseKey>,
    pub(crate) transaction: Option<TransactionKey>,
    pub(crate) id: Option<Quad>,
    pub(crate) write_mode: bool,
}

impl BlobState {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

fn check_segment_size(context: &'static str, size: usize) -> Result<()> {
    if size == 0 || size > MAX_SEGMENT_SIZE {
        return Err(Error::logic(context, "Invalid segment size (max 64Kb-1)"));
    }
    Ok(())
}

impl Client {
    pub(crate) fn blob_state(&self, key: BlobKey) -> Result<&BlobState> {
        self.blobs.get(key).ok_or(Error::InvalidHandle("blob"))
    }

    pub(crate) fn blob_state_mut(&mut self, key: BlobKey) -> Result<&mut BlobState> {
        self.blobs.get_mut(key).ok_or(Error::InvalidHandle("blob"))
    }

    pub(crate) fn link_blob_database(&mut self, key: BlobKey, db: DatabaseKey) -> Result<()> {
        self.db_mut(db)?.blobs.push(key);
        self.blob_state_mut(key)?.database = Some(db);
        Ok(())
    }

    pub(crate) fn link_blob_transaction(&mut self, key: BlobKey, tr: TransactionKey) -> Result<()> {
        self.tr_mut(tr)?.blobs.push(key);
        self.blob_state_mut(key)?.transaction = Some(tr);
        Ok(())
    }

    pub(crate) fn unlink_blob_database(&mut self, key: BlobKey) {
        let Some(db) = self.blobs.get_mut(key).and_then(|b| b.database.take()) else {
            return;
        };
        if let Some(state) = self.databases.get_mut(db) {
            state.blobs.retain(|b| *b != key);
        }
    }

    pub(crate) fn unlink_blob_transaction(&mut self, key: BlobKey) {
        let Some(tr) = self.blobs.get_mut(key).and_then(|b| b.transaction.take()) else {
            return;
        };
        if let Some(state) = self.transactions.get_mut(tr) {
            state.blobs.retain(|b| *b != key);
        }
    }

    /// Cancel a blob being written, close one being read.
    pub(crate) fn teardown_blob(&mut self, key: BlobKey) {
        let Ok(state) = self.blob_state(key) else {
            return;
        };
        let Some(handle) = state.handle else {
            return;
        };
        let result = if state.write_mode {
            self.transport.cancel_blob(handle)
        } else {
            self.transport.close_blob(handle)
        };
        let result = result.map_err(|status| self.server_error("Blob::Close", status));
        if let Some(state) = self.blobs.get_mut(key) {
            state.handle = None;
        }
        discard("Blob::Close", result);
    }

    /// Database and transaction handles a blob operation needs.
    fn blob_targets(&self, context: &'static str, key: BlobKey) -> Result<(DbHandle, TrHandle)> {
        let state = self.blob_state(key)?;
        let db = self.connected_db(context, state.database)?;
        let tr = self.started_tr(context, state.transaction)?;
        Ok((db, tr))
    }

    /// Append `data` in segments of the configured size.
    pub(crate) fn put_blob_data(
        &mut self,
        context: &'static str,
        blob: BlobHandle,
        data: &[u8],
    ) -> Result<()> {
        for chunk in data.chunks(self.config.segment_size()) {
            self.transport
                .put_segment(blob, chunk)
                .map_err(|status| self.server_error(context, status))?;
        }
        Ok(())
    }

    /// Read every remaining segment.
    pub(crate) fn get_blob_data(&mut self, context: &'static str, blob: BlobHandle) -> Result<Vec<u8>> {
        let segment = self.config.segment_size();
        let mut data = Vec::new();
        loop {
            match self.transport.get_segment(blob, segment) {
                Ok(Segment::Complete(bytes) | Segment::Partial(bytes)) => {
                    data.extend_from_slice(&bytes);
                }
                Ok(Segment::Eof) => return Ok(data),
                Err(status) => return Err(self.server_error(context, status)),
            }
        }
    }

    /// Store `data` in a new blob and return its id.
    pub(crate) fn write_blob_value(
        &mut self,
        context: &'static str,
        db: DbHandle,
        tr: TrHandle,
        data: &[u8],
    ) -> Result<Quad> {
        let (blob, id) = self
            .transport
            .create_blob2(db, tr)
            .map_err(|status| self.server_error(context, status))?;
        if let Err(e) = self.put_blob_data(context, blob, data) {
            if let Err(status) = self.transport.cancel_blob(blob) {
                tracing::warn!(code = status.engine_code(), "blob cancel after failed write");
            }
            return Err(e);
        }
        self.transport
            .close_blob(blob)
            .map_err(|status| self.server_error(context, status))?;
        Ok(id)
    }

    /// Read the whole blob `id`.
    pub(crate) fn read_blob_value(
        &mut self,
        context: &'static str,
        db: DbHandle,
        tr: TrHandle,
        id: Quad,
    ) -> Result<Vec<u8>> {
        let blob = self
            .transport
            .open_blob2(db, tr, id)
            .map_err(|status| self.server_error(context, status))?;
        let data = self.get_blob_data(context, blob);
        let closed = self
            .transport
            .close_blob(blob)
            .map_err(|status| self.server_error(context, status));
        let data = data?;
        closed?;
        Ok(data)
    }
}

/// A blob borrowed from a [`Client`].
pub struct Blob<'c> {
    client: &'c mut Client,
    key: BlobKey,
}

impl<'c> Blob<'c> {
    pub(crate) fn new(client: &'c mut Client, key: BlobKey) -> Self {
        Self { client, key }
    }

    /// Key of this blob.
    #[must_use]
    pub fn key(&self) -> BlobKey {
        self.key
    }

    fn state(&self) -> Result<&BlobState> {
        self.client.blob_state(self.key)
    }

    fn state_mut(&mut self) -> Result<&mut BlobState> {
        self.client.blob_state_mut(self.key)
    }

    fn open_handle(&self, context: &'static str) -> Result<BlobHandle> {
        self.state()?
            .handle
            .ok_or_else(|| Error::logic(context, "The Blob is not opened"))
    }

    /// Rebind to another database. The blob must not be open.
    pub fn attach_database(&mut self, db: DatabaseKey) -> Result<()> {
        if self.state()?.handle.is_some() {
            return Err(Error::AlreadyOpen { context: "Blob::AttachDatabase" });
        }
        self.client.db(db)?;
        self.client.unlink_blob_database(self.key);
        self.client.link_blob_database(self.key, db)
    }

    /// Rebind to another transaction. The blob must not be open.
    pub fn attach_transaction(&mut self, tr: TransactionKey) -> Result<()> {
        if self.state()?.handle.is_some() {
            return Err(Error::AlreadyOpen { context: "Blob::AttachTransaction" });
        }
        self.client.tr(tr)?;
        self.client.unlink_blob_transaction(self.key);
        self.client.link_blob_transaction(self.key, tr)
    }

    /// Open the blob whose id was set, for reading.
    pub fn open(&mut self) -> Result<()> {
        const CONTEXT: &str = "Blob::Open";
        if self.state()?.handle.is_some() {
            return Err(Error::AlreadyOpen { context: CONTEXT });
        }
        let (db, tr) = self.client.blob_targets(CONTEXT, self.key)?;
        let id = self
            .state()?
            .id
            .ok_or_else(|| Error::logic(CONTEXT, "Blob Id is not assigned."))?;
        let handle = self
            .client
            .transport
            .open_blob2(db, tr, id)
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        let state = self.state_mut()?;
        state.handle = Some(handle);
        state.write_mode = false;
        Ok(())
    }

    /// Create a new blob, for writing.
    pub fn create(&mut self) -> Result<()> {
        const CONTEXT: &str = "Blob::Create";
        if self.state()?.handle.is_some() {
            return Err(Error::AlreadyOpen { context: CONTEXT });
        }
        let (db, tr) = self.client.blob_targets(CONTEXT, self.key)?;
        let (handle, id) = self
            .client
            .transport
            .create_blob2(db, tr)
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        let state = self.state_mut()?;
        state.handle = Some(handle);
        state.id = Some(id);
        state.write_mode = true;
        Ok(())
    }

    /// Close, keeping what was written. Does nothing when not open.
    pub fn close(&mut self) -> Result<()> {
        let Some(handle) = self.state()?.handle else {
            return Ok(());
        };
        self.client
            .transport
            .close_blob(handle)
            .map_err(|status| self.client.server_error("Blob::Close", status))?;
        self.state_mut()?.handle = None;
        Ok(())
    }

    /// Close, discarding what was written. Does nothing when not open.
    pub fn cancel(&mut self) -> Result<()> {
        const CONTEXT: &str = "Blob::Cancel";
        let state = self.state()?;
        let Some(handle) = state.handle else {
            return Ok(());
        };
        if !state.write_mode {
            return Err(Error::logic(CONTEXT, "Can't cancel a Blob opened for read"));
        }
        self.client
            .transport
            .cancel_blob(handle)
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        let state = self.state_mut()?;
        state.handle = None;
        state.id = None;
        Ok(())
    }

    /// Read the next segment into `buf`, returning the number of bytes
    /// read; 0 means end of blob.
    ///
    /// `buf` must hold between 1 and 65535 bytes.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        const CONTEXT: &str = "Blob::Read";
        let handle = self.open_handle(CONTEXT)?;
        if self.state()?.write_mode {
            return Err(Error::logic(CONTEXT, "Can't read from Blob opened for write"));
        }
        check_segment_size(CONTEXT, buf.len())?;
        let segment = self
            .client
            .transport
            .get_segment(handle, buf.len())
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        match segment {
            Segment::Complete(data) | Segment::Partial(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Segment::Eof => Ok(0),
        }
    }

    /// Append one segment.
    ///
    /// `data` must hold between 1 and 65535 bytes.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        const CONTEXT: &str = "Blob::Write";
        let handle = self.open_handle(CONTEXT)?;
        if !self.state()?.write_mode {
            return Err(Error::logic(CONTEXT, "Can't write to Blob opened for read"));
        }
        check_segment_size(CONTEXT, data.len())?;
        self.client
            .transport
            .put_segment(handle, data)
            .map_err(|status| self.client.server_error(CONTEXT, status))
    }

    /// Size and segment layout of the open blob.
    pub fn info(&mut self) -> Result<BlobInfo> {
        const CONTEXT: &str = "Blob::Info";
        let handle = self.open_handle(CONTEXT)?;
        let block = self
            .client
            .transport
            .blob_info(
                handle,
                &[
                    info::blob::TOTAL_LENGTH,
                    info::blob::MAX_SEGMENT,
                    info::blob::NUM_SEGMENTS,
                    info::END,
                ],
            )
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        Ok(BlobInfo {
            size: block.get_value(info::blob::TOTAL_LENGTH)?,
            largest_segment: block.get_value(info::blob::MAX_SEGMENT)?,
            segments: block.get_value(info::blob::NUM_SEGMENTS)?,
        })
    }

    /// Store `data` as a new blob: create, write in segments, close.
    pub fn save(&mut self, data: &[u8]) -> Result<()> {
        const CONTEXT: &str = "Blob::Save";
        if self.state()?.handle.is_some() {
            return Err(Error::AlreadyOpen { context: CONTEXT });
        }
        let (db, tr) = self.client.blob_targets(CONTEXT, self.key)?;
        let id = self.client.write_blob_value(CONTEXT, db, tr, data)?;
        let state = self.state_mut()?;
        state.id = Some(id);
        state.write_mode = true;
        tracing::debug!(bytes = data.len(), %id, "blob saved");
        Ok(())
    }

    /// Read the whole blob whose id was set: open, read to the end, close.
    pub fn load(&mut self) -> Result<Vec<u8>> {
        const CONTEXT: &str = "Blob::Load";
        if self.state()?.handle.is_some() {
            return Err(Error::AlreadyOpen { context: CONTEXT });
        }
        let (db, tr) = self.client.blob_targets(CONTEXT, self.key)?;
        let id = self
            .state()?
            .id
            .ok_or_else(|| Error::logic(CONTEXT, "Blob Id is not assigned."))?;
        self.client.read_blob_value(CONTEXT, db, tr, id)
    }

    /// Id of a blob created by this object, once closed.
    pub fn id(&self) -> Result<Quad> {
        const CONTEXT: &str = "Blob::GetId";
        let state = self.state()?;
        if state.handle.is_some() {
            return Err(Error::logic(CONTEXT, "Can't get Id on an opened Blob."));
        }
        if !state.write_mode {
            return Err(Error::logic(CONTEXT, "Can only get Id of a newly created Blob."));
        }
        state
            .id
            .ok_or_else(|| Error::logic(CONTEXT, "Blob Id is not assigned."))
    }

    /// Point at an existing blob, to be opened for reading.
    pub fn set_id(&mut self, id: Quad) -> Result<()> {
        let state = self.state_mut()?;
        if state.handle.is_some() {
            return Err(Error::logic("Blob::SetId", "Can't set Id on an opened Blob."));
        }
        state.id = (!id.is_zero()).then_some(id);
        state.write_mode = false;
        Ok(())
    }

    /// Whether the blob is open.
    pub fn is_open(&self) -> Result<bool> {
        Ok(self.state()?.handle.is_some())
    }

    /// Linked database.
    pub fn database(&self) -> Result<Option<DatabaseKey>> {
        Ok(self.state()?.database)
    }

    /// Linked transaction.
    pub fn transaction(&self) -> Result<Option<TransactionKey>> {
        Ok(self.state()?.transaction)
    }
}

impl std::fmt::Debug for Blob<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_size_bounds() {
        assert!(check_segment_size("Blob::Read", 1).is_ok());
        assert!(check_segment_size("Blob::Read", MAX_SEGMENT_SIZE).is_ok());
        assert!(check_segment_size("Blob::Read", 0).is_err());
        assert!(check_segment_size("Blob::Write", MAX_SEGMENT_SIZE + 1).is_err());
    }

    #[test]
    fn test_new_state_is_closed_without_id() {
        let state = BlobState::new();
        assert!(state.handle.is_none());
        assert!(state.id.is_none());
        assert!(!state.write_mode);
    }

    #[test]
    fn test_unclamped_config_still_yields_usable_segments() {
        let zero = crate::ClientConfig {
            blob_segment_size: 0,
            ..Default::default()
        };
        assert_eq!(zero.segment_size(), 1);
        assert!(check_segment_size("Blob::Save", zero.segment_size()).is_ok());

        let huge = crate::ClientConfig {
            blob_segment_size: usize::MAX,
            ..Default::default()
        };
        assert_eq!(huge.segment_size(), MAX_SEGMENT_SIZE);
    }
}
