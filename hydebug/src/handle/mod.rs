//! Wrapped handles and the wrapper lifecycle.
//!
//! Inside the debug layer two kinds of handles coexist:
//!
//! - [`UHandle`]: opaque tokens issued by the underlying api. Never interpreted, only stored
//!   and forwarded.
//! - [`DHandle`]: what clients of a [`DebugSession`] hold. A `DHandle` names a
//!   [`DebugHandle`] record stored in the session arena, which in turn wraps one `UHandle`.
//!
//! The two are distinct types so they cannot be mixed up at compile time. Where a caller
//! hands over a handle of unknown kind, [`AnyHandle`] carries an explicit tag that the
//! session checks before any lookup ([`expect_wrapped`], [`expect_raw`]).
//!
//! Wrappers follow a strict state machine: `open` → `close` → `free`. An open wrapper can be
//! unwrapped any number of times and always yields the same `UHandle`. A closed wrapper stays
//! in the session quarantine so late uses are reported; once freed its slot version is bumped
//! and the stale `DHandle` can never resolve again, even if the slot gets reused.
use std::fmt;

use log::{debug, trace, warn};
use slotmap::SlotMap;
use uuid::Uuid;

use crate::{
    api::UniversalApi,
    magic::CONSTANTS_GENERATION,
    raw_data::GuardedBuffer,
    session::DebugSession,
    utils::error::{DebugError, DebugResult, ViolationKind},
};

slotmap::new_key_type! {
    /// Stable slot identifier of a [`DebugHandle`] inside a session arena.
    pub struct HandleKey;
}

/// Arena owning every live (open or quarantined) wrapper of a session.
pub type HandleArena = SlotMap<HandleKey, DebugHandle>;

/// Opaque handle of the underlying api.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UHandle(pub usize);

impl UHandle {
    pub const NULL: UHandle = UHandle(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl fmt::Display for UHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UHandle(0x{:x})", self.0)
    }
}

/// Identity of a debug session, carried by each [`DHandle`] it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

/// Wrapped handle as seen by clients of a debug session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DHandle {
    key: Option<HandleKey>,
    generation: u64,
    session: SessionId,
}

impl DHandle {
    pub const NULL: DHandle = DHandle {
        key: None,
        generation: 0,
        session: SessionId(Uuid::nil()),
    };

    pub fn is_null(&self) -> bool {
        self.key.is_none()
    }

    /// Generation the wrapper was opened in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub(crate) fn from_parts(key: HandleKey, generation: u64, session: SessionId) -> Self {
        Self {
            key: Some(key),
            generation,
            session,
        }
    }

    pub(crate) fn key(&self) -> Option<HandleKey> {
        self.key
    }
}

impl fmt::Display for DHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(key) => write!(f, "DHandle({:?}, generation {})", key, self.generation),
            None => f.write_str("DHandle(NULL)"),
        }
    }
}

/// A handle of either kind, tagged explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyHandle {
    Wrapped(DHandle),
    Raw(UHandle),
}

impl From<DHandle> for AnyHandle {
    fn from(value: DHandle) -> Self {
        AnyHandle::Wrapped(value)
    }
}

impl From<UHandle> for AnyHandle {
    fn from(value: UHandle) -> Self {
        AnyHandle::Raw(value)
    }
}

impl fmt::Display for AnyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyHandle::Wrapped(dh) => dh.fmt(f),
            AnyHandle::Raw(uh) => uh.fmt(f),
        }
    }
}

/// Wrapper record associating an underlying handle with its lifecycle metadata.
#[derive(Debug)]
pub struct DebugHandle {
    pub(crate) uh: UHandle,
    pub(crate) generation: u64,
    pub(crate) is_closed: bool,
    /// Raw data whose validity is bound to this handle.
    pub(crate) raw_data: Option<GuardedBuffer>,
    pub(crate) prev: Option<HandleKey>,
    pub(crate) next: Option<HandleKey>,
}

impl DebugHandle {
    pub(crate) fn new(uh: UHandle, generation: u64) -> Self {
        Self {
            uh,
            generation,
            is_closed: false,
            raw_data: None,
            prev: None,
            next: None,
        }
    }

    pub fn uh(&self) -> UHandle {
        self.uh
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    /// Whether this wraps one of the builtin constants, which stay open for the whole session.
    pub fn is_constant(&self) -> bool {
        self.generation == CONSTANTS_GENERATION
    }

    pub fn raw_data(&self) -> Option<&GuardedBuffer> {
        self.raw_data.as_ref()
    }
}

/// Wrap `uh` into a new open handle of the current generation.
///
/// `UHandle::NULL` maps to `DHandle::NULL` without allocating. When the session limits the
/// number of open handles and the limit is reached, `uh` is closed in the underlying api and
/// [`DebugError::ResourceExhaustion`] is returned.
pub fn open<A: UniversalApi>(session: &mut DebugSession<A>, uh: UHandle) -> DebugResult<DHandle> {
    session.enter()?;
    if uh.is_null() {
        return Ok(DHandle::NULL);
    }
    debug_assert!(
        session.api.is_valid_handle(uh),
        "{uh} does not look like a handle of the underlying api"
    );

    if let Some(max) = session.config.max_open_handles {
        if session.open_handles.len() >= max {
            warn!("Refusing to open {uh}: {max} handles are already open");
            // Constants are owned by the api and never closed.
            if session.current_generation != CONSTANTS_GENERATION {
                session.api.close(uh);
            }
            return Err(DebugError::ResourceExhaustion(format!(
                "cannot open more than {max} handles"
            )));
        }
    }

    let generation = session.current_generation;
    let key = session.arena.insert(DebugHandle::new(uh, generation));
    session.open_handles.append(&mut session.arena, key);
    session.stats.opened += 1;
    trace!("open {uh} as {key:?} (generation {generation})");

    Ok(DHandle::from_parts(key, generation, session.id))
}

/// Retrieve the underlying handle of an open wrapper.
///
/// Repeated calls on the same open wrapper return the same `UHandle`. Unwrapping a closed or
/// freed wrapper is a [`ViolationKind::StaleHandleUse`].
pub fn unwrap<A: UniversalApi>(session: &mut DebugSession<A>, dh: DHandle) -> DebugResult<UHandle> {
    session.enter()?;
    let Some(key) = session.resolve(dh)? else {
        return Ok(UHandle::NULL);
    };

    let handle = &session.arena[key];
    let (uh, is_closed) = (handle.uh, handle.is_closed);
    if is_closed {
        return Err(session.handle_violation(
            ViolationKind::StaleHandleUse,
            dh,
            "unwrap of a closed handle",
        ));
    }
    Ok(uh)
}

/// Move an open wrapper into the quarantine.
///
/// Attached raw data is protected, or released right away when protecting it would exceed
/// the session budget. When the quarantine is full its oldest member is freed first.
/// Closing the wrapper of a builtin constant does nothing.
pub fn close<A: UniversalApi>(session: &mut DebugSession<A>, dh: DHandle) -> DebugResult<()> {
    session.enter()?;
    let Some(key) = session.resolve(dh)? else {
        return Ok(());
    };

    if session.arena[key].is_constant() {
        trace!("close of constant {dh} ignored");
        return Ok(());
    }

    if session.arena[key].is_closed {
        return Err(session.handle_violation(
            ViolationKind::DoubleClose,
            dh,
            "close of an already closed handle",
        ));
    }

    session.open_handles.remove(&mut session.arena, key);
    session.arena[key].is_closed = true;
    session.stats.closed += 1;
    trace!("close {dh}");

    if let Some(mut buffer) = session.arena[key].raw_data.take() {
        if session.raw_budget.try_protect(&mut buffer) {
            session.arena[key].raw_data = Some(buffer);
        } else {
            warn!(
                "Protected raw data budget exhausted ({} of {} bytes); releasing {} bytes of {dh} immediately",
                session.raw_budget.protected(),
                session.raw_budget.max(),
                buffer.len()
            );
            session.raw_budget.release(buffer);
        }
    }

    let max = session.config.closed_handles_queue_max_size;
    if max == 0 {
        release_slot(session, key);
        return Ok(());
    }
    if session.closed_handles.len() >= max {
        if let Some(oldest) = session.closed_handles.pop_front(&mut session.arena) {
            debug!("Quarantine full ({max} handles), evicting {oldest:?}");
            session.stats.evicted += 1;
            release_slot(session, oldest);
        }
    }
    session.closed_handles.append(&mut session.arena, key);
    Ok(())
}

/// Close `dh` and return the underlying handle it wrapped, for forwarding shims which must
/// close the underlying handle as well. Returns `UHandle::NULL` when there is nothing to
/// close underneath: for `DHandle::NULL` and for builtin constants.
pub fn close_and_check<A: UniversalApi>(
    session: &mut DebugSession<A>,
    dh: DHandle,
) -> DebugResult<UHandle> {
    session.enter()?;
    let uh = match session.resolve(dh)? {
        Some(key) if !session.arena[key].is_constant() => session.arena[key].uh,
        _ => UHandle::NULL,
    };
    close(session, dh)?;
    Ok(uh)
}

/// Free a closed wrapper ahead of its eviction from the quarantine.
///
/// Releases the attached raw data and gives the slot back to the arena. Freeing an open
/// wrapper is a [`ViolationKind::StaleHandleUse`]: it must be closed first.
pub fn free<A: UniversalApi>(session: &mut DebugSession<A>, dh: DHandle) -> DebugResult<()> {
    session.enter()?;
    let Some(key) = session.resolve(dh)? else {
        return Ok(());
    };

    if !session.arena[key].is_closed {
        return Err(session.handle_violation(
            ViolationKind::StaleHandleUse,
            dh,
            "free of a handle that was never closed",
        ));
    }

    session.closed_handles.remove(&mut session.arena, key);
    release_slot(session, key);
    Ok(())
}

/// Drop a wrapper which is no longer part of any queue.
fn release_slot<A: UniversalApi>(session: &mut DebugSession<A>, key: HandleKey) {
    if let Some(mut handle) = session.arena.remove(key) {
        debug_assert!(handle.is_closed, "only closed handles can be released");
        if let Some(buffer) = handle.raw_data.take() {
            session.raw_budget.release(buffer);
        }
        session.stats.freed += 1;
        trace!("free {key:?} (generation {})", handle.generation);
    }
}

/// Check that `handle` is a wrapped handle and return it.
pub fn expect_wrapped<A: UniversalApi>(
    session: &mut DebugSession<A>,
    handle: AnyHandle,
) -> DebugResult<DHandle> {
    session.enter()?;
    match handle {
        AnyHandle::Wrapped(dh) => Ok(dh),
        AnyHandle::Raw(uh) if uh.is_null() => Ok(DHandle::NULL),
        AnyHandle::Raw(uh) => Err(session.report(
            ViolationKind::NotAWrappedHandle,
            None,
            uh.to_string(),
            "raw handle passed where a wrapped handle is expected",
        )),
    }
}

/// Check that `handle` is a raw handle of the underlying api and return it.
pub fn expect_raw<A: UniversalApi>(
    session: &mut DebugSession<A>,
    handle: AnyHandle,
) -> DebugResult<UHandle> {
    session.enter()?;
    match handle {
        AnyHandle::Raw(uh) => Ok(uh),
        AnyHandle::Wrapped(dh) if dh.is_null() => Ok(UHandle::NULL),
        AnyHandle::Wrapped(dh) => Err(session.handle_violation(
            ViolationKind::NotARawHandle,
            dh,
            "wrapped handle passed where a raw handle is expected",
        )),
    }
}

/// Unwrap a tagged handle coming from a dynamic boundary.
pub fn unwrap_any<A: UniversalApi>(
    session: &mut DebugSession<A>,
    handle: AnyHandle,
) -> DebugResult<UHandle> {
    let dh = expect_wrapped(session, handle)?;
    unwrap(session, dh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handles() {
        assert!(UHandle::NULL.is_null());
        assert!(!UHandle(3).is_null());
        assert!(DHandle::NULL.is_null());
        assert_eq!(DHandle::NULL.to_string(), "DHandle(NULL)");
    }

    #[test]
    fn tagged_handles_convert() {
        assert_eq!(AnyHandle::from(UHandle(5)), AnyHandle::Raw(UHandle(5)));
        assert_eq!(AnyHandle::from(DHandle::NULL), AnyHandle::Wrapped(DHandle::NULL));
        assert_eq!(AnyHandle::Raw(UHandle(0x2a)).to_string(), "UHandle(0x2a)");
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
