//! Raw data whose validity is bound to the lifetime of a handle.
//!
//! Some operations of the underlying api hand out memory borrowed from an object, e.g. the
//! UTF-8 bytes of a string. Such memory is only valid while the handle it came from is open,
//! but real implementations often keep it readable afterwards, which hides bugs. The debug
//! session therefore never exposes that memory directly: it copies it into a
//! [`GuardedBuffer`] attached to the handle and hands out a [`RawData`] token instead.
//!
//! When the handle is closed the buffer is protected: it is kept around, but any further
//! access through the token is reported. Protected buffers are accounted against a
//! [`RawDataBudget`]; once the budget is exhausted newly closed buffers are released right
//! away, which bounds memory at the cost of weaker detection for those buffers.
use crate::{
    handle::DHandle,
    magic::RAW_DATA_SCRUB_BYTE,
    utils::error::{DebugError, DebugResult},
};

/// Access state of a [`GuardedBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Accessible,
    Protected,
}

/// Private copy of raw data attached to a handle.
#[derive(Debug)]
pub struct GuardedBuffer {
    data: Box<[u8]>,
    read_only: bool,
    state: BufferState,
}

/// Reason an access to a [`GuardedBuffer`] was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAccessError {
    Protected,
    ReadOnly,
    OutOfBounds { offset: usize, len: usize, size: usize },
}

impl RawAccessError {
    pub fn describe(&self) -> String {
        match self {
            RawAccessError::Protected => "access to raw data after its handle was closed".into(),
            RawAccessError::ReadOnly => "write to read-only raw data".into(),
            RawAccessError::OutOfBounds { offset, len, size } => format!(
                "access to bytes {offset}..{} of raw data of {size} bytes",
                offset.saturating_add(*len)
            ),
        }
    }
}

impl GuardedBuffer {
    /// Duplicate `data`, optionally marking the copy read-only.
    pub fn copy(data: &[u8], read_only: bool) -> DebugResult<Self> {
        let mut copy = Vec::new();
        copy.try_reserve_exact(data.len()).map_err(|e| {
            DebugError::ResourceExhaustion(format!(
                "cannot copy {} bytes of raw data: {e}",
                data.len()
            ))
        })?;
        copy.extend_from_slice(data);

        Ok(Self {
            data: copy.into_boxed_slice(),
            read_only,
            state: BufferState::Accessible,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn is_protected(&self) -> bool {
        self.state == BufferState::Protected
    }

    /// Make the buffer inaccessible. Its memory stays reserved until [`GuardedBuffer::release`].
    pub fn protect(&mut self) {
        self.state = BufferState::Protected;
    }

    pub fn read(&self) -> Result<&[u8], RawAccessError> {
        match self.state {
            BufferState::Protected => Err(RawAccessError::Protected),
            BufferState::Accessible => Ok(&self.data),
        }
    }

    /// Overwrite `bytes.len()` bytes starting at `offset`.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), RawAccessError> {
        if self.state == BufferState::Protected {
            return Err(RawAccessError::Protected);
        }
        if self.read_only {
            return Err(RawAccessError::ReadOnly);
        }
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= self.data.len())
            .ok_or(RawAccessError::OutOfBounds {
                offset,
                len: bytes.len(),
                size: self.data.len(),
            })?;
        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Reclaim the buffer. The contents are scrubbed first.
    pub fn release(mut self) {
        self.data.fill(RAW_DATA_SCRUB_BYTE);
    }
}

/// Accounting of the bytes kept protected by a session.
#[derive(Debug)]
pub struct RawDataBudget {
    max: usize,
    protected: usize,
}

impl RawDataBudget {
    pub fn new(max: usize) -> Self {
        Self { max, protected: 0 }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Bytes currently held by protected buffers.
    pub fn protected(&self) -> usize {
        self.protected
    }

    /// Protect `buffer` if it fits in the remaining budget. Returns `false`, leaving the
    /// buffer untouched, when it does not.
    pub fn try_protect(&mut self, buffer: &mut GuardedBuffer) -> bool {
        debug_assert!(!buffer.is_protected());
        match self.protected.checked_add(buffer.len()) {
            Some(total) if total <= self.max => {
                buffer.protect();
                self.protected = total;
                true
            }
            _ => false,
        }
    }

    /// Release `buffer`, giving its bytes back to the budget if it was protected.
    pub fn release(&mut self, buffer: GuardedBuffer) {
        if buffer.is_protected() {
            debug_assert!(self.protected >= buffer.len());
            self.protected -= buffer.len();
        }
        buffer.release();
    }
}

/// Token granting access to the raw data attached to a handle.
///
/// Obtained from the session operations that expose raw memory and resolved through
/// [`DebugSession::raw_read`](crate::session::DebugSession::raw_read) and
/// [`DebugSession::raw_write`](crate::session::DebugSession::raw_write).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawData {
    pub(crate) owner: DHandle,
    pub(crate) len: usize,
}

impl RawData {
    /// Handle whose lifetime bounds this data.
    pub fn owner(&self) -> DHandle {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
