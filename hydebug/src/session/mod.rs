//! The debug session: a proxy in front of a [`UniversalApi`] which wraps every handle crossing
//! the boundary and checks how it is used.
//!
//! All bookkeeping (arena, queues, generation counter, limits) lives in the session object and
//! every operation takes `&mut self`. The session does no locking of its own: confine it to a
//! single thread, or put it behind the lock that already serializes access to the underlying
//! api.
//!
//! A detected violation is fatal. The session invokes the invalid-handle callback, logs the
//! diagnostic, poisons itself so that every later call fails, and returns
//! [`DebugError::Violation`]. That error must travel up to a top-level handler whose only
//! valid action is [`DebugSession::terminate`]; [`DebugSession::run`] is such a handler.
use log::{debug, error, warn};
use slotmap::SlotMap;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    api::{Constant, UniversalApi},
    handle::{self, DHandle, HandleArena, HandleKey, SessionId},
    magic::{CONSTANTS_GENERATION, DEBUG_MAGIC, FIRST_GENERATION},
    queue::DHQueue,
    raw_data::{GuardedBuffer, RawData, RawDataBudget},
    utils::{
        conf::DebugConfig,
        error::{DebugError, DebugResult, Violation, ViolationKind},
    },
};

mod forward;

/// Hook invoked with every violation before it is reported, e.g. to break into a debugger.
pub type InvalidHandleCallback = Box<dyn FnMut(&Violation)>;

/// Parameters of [`DebugSession::create`].
#[derive(Default)]
pub struct SessionCreateInfo {
    pub config: DebugConfig,
    pub on_invalid_handle: Option<InvalidHandleCallback>,
}

/// Snapshot of one wrapper, as returned by the introspection operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleInfo {
    pub handle: DHandle,
    pub generation: u64,
    pub is_closed: bool,
    /// Size of the attached raw data, if any.
    pub raw_data_size: Option<usize>,
}

/// Counters of wrapper lifecycle events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub opened: u64,
    pub closed: u64,
    /// Wrappers freed, explicitly or by eviction.
    pub freed: u64,
    /// Wrappers freed because the quarantine was full.
    pub evicted: u64,
}

pub struct DebugSession<A: UniversalApi> {
    pub(crate) magic: u64,
    pub(crate) id: SessionId,
    pub(crate) api: A,
    pub(crate) current_generation: u64,
    pub(crate) arena: HandleArena,
    pub(crate) open_handles: DHQueue,
    pub(crate) closed_handles: DHQueue,
    pub(crate) config: DebugConfig,
    pub(crate) raw_budget: RawDataBudget,
    pub(crate) stats: SessionStats,
    on_invalid_handle: Option<InvalidHandleCallback>,
    poisoned: Option<ViolationKind>,
    constants: Vec<DHandle>,
}

impl<A: UniversalApi> DebugSession<A> {
    /// Wrap `api` into a new debug session.
    ///
    /// The builtin constants of the api are opened once, in generation
    /// [`CONSTANTS_GENERATION`]; client handles start at [`FIRST_GENERATION`].
    pub fn create(api: A, create_info: SessionCreateInfo) -> DebugResult<Self> {
        let SessionCreateInfo {
            config,
            on_invalid_handle,
        } = create_info;

        let mut session = DebugSession {
            magic: DEBUG_MAGIC,
            id: SessionId::new(),
            api,
            current_generation: CONSTANTS_GENERATION,
            arena: SlotMap::with_key(),
            open_handles: DHQueue::new(),
            closed_handles: DHQueue::new(),
            raw_budget: RawDataBudget::new(config.protected_raw_data_max_size),
            config,
            stats: SessionStats::default(),
            on_invalid_handle,
            poisoned: None,
            constants: Vec::with_capacity(Constant::COUNT),
        };

        for constant in Constant::iter() {
            let uh = session.api.constant(constant);
            let dh = handle::open(&mut session, uh)?;
            session.constants.push(dh);
        }
        session.current_generation = FIRST_GENERATION;

        debug!(
            "Debug session {} created over '{}' ({:?})",
            session.id.uuid(),
            session.api.name(),
            session.config
        );
        Ok(session)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Consume the session and give back the underlying api.
    pub fn into_api(self) -> A {
        self.api
    }

    pub fn config(&self) -> &DebugConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Kind of the violation that poisoned this session, if any.
    pub fn poisoned(&self) -> Option<ViolationKind> {
        self.poisoned
    }

    /// Wrapped handle of a builtin constant. Valid for the whole session.
    pub fn constant(&self, constant: Constant) -> DHandle {
        self.constants[constant as usize]
    }

    pub fn current_generation(&self) -> u64 {
        self.current_generation
    }

    /// Start a new generation and return it. Handles opened from now on belong to it.
    pub fn new_generation(&mut self) -> u64 {
        self.current_generation += 1;
        debug!("New handle generation {}", self.current_generation);
        self.current_generation
    }

    pub fn closed_handles_queue_max_size(&self) -> usize {
        self.config.closed_handles_queue_max_size
    }

    pub fn protected_raw_data_max_size(&self) -> usize {
        self.raw_budget.max()
    }

    /// Bytes currently kept protected for closed handles.
    pub fn protected_raw_data_size(&self) -> usize {
        self.raw_budget.protected()
    }

    pub fn open_handles_count(&self) -> usize {
        self.open_handles.len()
    }

    pub fn closed_handles_count(&self) -> usize {
        self.closed_handles.len()
    }

    /// Open handles created in generation `since` or later, oldest first.
    pub fn open_handles(&self, since: u64) -> Vec<HandleInfo> {
        self.open_handles
            .iter(&self.arena)
            .filter(|(_, handle)| handle.generation >= since)
            .map(|(key, _)| self.handle_info(key))
            .collect()
    }

    /// Handles currently in quarantine, oldest first.
    pub fn closed_handles(&self) -> Vec<HandleInfo> {
        self.closed_handles
            .iter(&self.arena)
            .map(|(key, _)| self.handle_info(key))
            .collect()
    }

    /// Fail with [`DebugError::Leak`] if any handle opened in generation `since` or later is
    /// still open.
    pub fn check_leaks(&self, since: u64) -> DebugResult<()> {
        let handles = self.open_handles(since);
        if handles.is_empty() {
            return Ok(());
        }
        warn!(
            "{} handle(s) opened since generation {since} are still open",
            handles.len()
        );
        Err(DebugError::Leak { since, handles })
    }

    /// Describe a wrapped handle: generation, state, attached raw data and, for open handles,
    /// the underlying object as rendered by the api.
    pub fn dump(&mut self, dh: DHandle) -> DebugResult<String> {
        self.enter()?;
        let Some(key) = self.resolve(dh)? else {
            return Ok("DHandle(NULL)".to_string());
        };

        let handle = &self.arena[key];
        let mut out = format!(
            "{dh}: {}",
            if handle.is_closed { "closed" } else { "open" }
        );
        if let Some(buffer) = handle.raw_data() {
            out.push_str(&format!(
                ", raw data {} bytes ({:?})",
                buffer.len(),
                buffer.state()
            ));
        }
        if !handle.is_closed {
            out.push_str(&format!(", {} -> {}", handle.uh, self.api.dump(handle.uh)));
        }
        Ok(out)
    }

    /// Verify both queues and the bookkeeping tying them to the arena.
    pub fn sanity_check(&self) -> DebugResult<()> {
        self.open_handles.sanity_check(&self.arena)?;
        self.closed_handles.sanity_check(&self.arena)?;

        if let Some((key, _)) = self
            .open_handles
            .iter(&self.arena)
            .find(|(_, handle)| handle.is_closed)
        {
            return Err(DebugError::QueueCorrupted(format!(
                "closed handle {key:?} is in the open queue"
            )));
        }
        if let Some((key, _)) = self
            .closed_handles
            .iter(&self.arena)
            .find(|(_, handle)| !handle.is_closed)
        {
            return Err(DebugError::QueueCorrupted(format!(
                "open handle {key:?} is in the closed queue"
            )));
        }

        let members = self.open_handles.len() + self.closed_handles.len();
        if members != self.arena.len() {
            return Err(DebugError::QueueCorrupted(format!(
                "{} wrappers are allocated but the queues hold {members}",
                self.arena.len()
            )));
        }

        let protected: usize = self
            .closed_handles
            .iter(&self.arena)
            .filter_map(|(_, handle)| handle.raw_data())
            .filter(|buffer| buffer.is_protected())
            .map(GuardedBuffer::len)
            .sum();
        if protected != self.raw_budget.protected() {
            return Err(DebugError::QueueCorrupted(format!(
                "protected raw data adds up to {protected} bytes, {} are accounted",
                self.raw_budget.protected()
            )));
        }
        if self.closed_handles.len() > self.config.closed_handles_queue_max_size {
            return Err(DebugError::QueueCorrupted(format!(
                "quarantine holds {} handles, the limit is {}",
                self.closed_handles.len(),
                self.config.closed_handles_queue_max_size
            )));
        }
        Ok(())
    }

    /// Attach a private copy of `data` to the open handle `dh`.
    ///
    /// If raw data is already attached, the existing token is returned.
    pub fn attach_raw_data(
        &mut self,
        dh: DHandle,
        data: &[u8],
        read_only: bool,
    ) -> DebugResult<RawData> {
        handle::unwrap(self, dh)?;
        if let Some(raw) = self.attached_raw_data(dh) {
            return Ok(raw);
        }
        let buffer = GuardedBuffer::copy(data, read_only)?;
        self.attach_buffer(dh, buffer)
    }

    /// Token of the raw data already attached to `dh`, if any.
    pub(crate) fn attached_raw_data(&self, dh: DHandle) -> Option<RawData> {
        let buffer = self.arena.get(dh.key()?)?.raw_data()?;
        Some(RawData {
            owner: dh,
            len: buffer.len(),
        })
    }

    /// Attach `buffer` to `dh`, which the caller has already unwrapped successfully.
    pub(crate) fn attach_buffer(
        &mut self,
        dh: DHandle,
        buffer: GuardedBuffer,
    ) -> DebugResult<RawData> {
        let Some(key) = dh.key() else {
            return Err(self.handle_violation(
                ViolationKind::RawBufferOverrun,
                dh,
                "raw data cannot be attached to a NULL handle",
            ));
        };
        let len = buffer.len();
        self.arena[key].raw_data = Some(buffer);
        Ok(RawData { owner: dh, len })
    }

    /// Read the raw data behind `raw`. Only allowed while its owner is open.
    pub fn raw_read(&mut self, raw: RawData) -> DebugResult<&[u8]> {
        let key = self.raw_owner(raw)?;

        let refused = match self.arena[key].raw_data() {
            Some(buffer) => buffer.read().err().map(|e| e.describe()),
            None => Some("raw data was released when its handle was closed".to_string()),
        };
        if let Some(detail) = refused {
            return Err(self.handle_violation(ViolationKind::RawBufferOverrun, raw.owner, detail));
        }

        Ok(self.arena[key]
            .raw_data()
            .and_then(|buffer| buffer.read().ok())
            .unwrap_or_default())
    }

    /// Write into the raw data behind `raw`. Only allowed while its owner is open and if the
    /// data is writable.
    pub fn raw_write(&mut self, raw: RawData, offset: usize, bytes: &[u8]) -> DebugResult<()> {
        let key = self.raw_owner(raw)?;

        let result = match self.arena[key].raw_data.as_mut() {
            Some(buffer) => buffer.write(offset, bytes).map_err(|e| e.describe()),
            None => Err("raw data was released when its handle was closed".to_string()),
        };
        result.map_err(|detail| {
            self.handle_violation(ViolationKind::RawBufferOverrun, raw.owner, detail)
        })
    }

    /// Terminate the process because of `error`. This is the only valid way to handle a fatal
    /// [`DebugError`].
    pub fn terminate(&self, error: DebugError) -> ! {
        let message = match error.violation() {
            Some(violation) => format!(
                "Invalid usage of handle {} (generation {}): {violation}",
                violation.subject(),
                violation
                    .generation()
                    .map_or_else(|| "unknown".to_string(), |g| g.to_string())
            ),
            None => error.to_string(),
        };
        error!("{message}");
        self.api.fatal_error(&message)
    }

    /// Run `f` as a top-level entry: fatal errors terminate the process, recoverable ones are
    /// returned.
    pub fn run<T>(&mut self, f: impl FnOnce(&mut Self) -> DebugResult<T>) -> DebugResult<T> {
        match f(self) {
            Err(error) if error.is_fatal() => self.terminate(error),
            other => other,
        }
    }

    /// Entry check shared by every operation: session marker and poisoning.
    pub(crate) fn enter(&mut self) -> DebugResult<()> {
        if let Some(kind) = self.poisoned {
            return Err(DebugError::Poisoned(kind));
        }
        if self.magic != DEBUG_MAGIC {
            let subject = format!("session {}", self.id.uuid());
            return Err(self.report(
                ViolationKind::SessionMismatch,
                None,
                subject,
                format!("bad session marker 0x{:x}", self.magic),
            ));
        }
        Ok(())
    }

    /// Map `dh` to its arena slot. `Ok(None)` for `DHandle::NULL`.
    pub(crate) fn resolve(&mut self, dh: DHandle) -> DebugResult<Option<HandleKey>> {
        let Some(key) = dh.key() else {
            return Ok(None);
        };
        if dh.session() != self.id {
            return Err(self.handle_violation(
                ViolationKind::SessionMismatch,
                dh,
                format!(
                    "handle of session {} used with session {}",
                    dh.session().uuid(),
                    self.id.uuid()
                ),
            ));
        }
        if !self.arena.contains_key(key) {
            return Err(self.handle_violation(
                ViolationKind::StaleHandleUse,
                dh,
                "use of a freed handle",
            ));
        }
        Ok(Some(key))
    }

    fn raw_owner(&mut self, raw: RawData) -> DebugResult<HandleKey> {
        self.enter()?;
        let dh = raw.owner;
        let Some(key) = dh.key() else {
            return Err(self.handle_violation(
                ViolationKind::RawBufferOverrun,
                dh,
                "raw data of a NULL handle",
            ));
        };
        if dh.session() != self.id {
            return Err(self.handle_violation(
                ViolationKind::SessionMismatch,
                dh,
                "raw data of another session",
            ));
        }
        if !self.arena.contains_key(key) {
            return Err(self.handle_violation(
                ViolationKind::RawBufferOverrun,
                dh,
                "access to raw data of a freed handle",
            ));
        }
        Ok(key)
    }

    fn handle_info(&self, key: HandleKey) -> HandleInfo {
        let handle = &self.arena[key];
        HandleInfo {
            handle: DHandle::from_parts(key, handle.generation, self.id),
            generation: handle.generation,
            is_closed: handle.is_closed,
            raw_data_size: handle.raw_data().map(GuardedBuffer::len),
        }
    }

    pub(crate) fn handle_violation(
        &mut self,
        kind: ViolationKind,
        dh: DHandle,
        detail: impl Into<String>,
    ) -> DebugError {
        self.report(kind, Some(dh.generation()), dh.to_string(), detail)
    }

    /// Record a violation: callback, log, poison. Returns the error to propagate.
    pub(crate) fn report(
        &mut self,
        kind: ViolationKind,
        generation: Option<u64>,
        subject: String,
        detail: impl Into<String>,
    ) -> DebugError {
        let violation = Violation::new(kind, generation, subject, detail);
        if let Some(callback) = self.on_invalid_handle.as_mut() {
            callback(&violation);
        }
        error!("{violation}");
        self.poisoned.get_or_insert(kind);
        DebugError::Violation(Box::new(violation))
    }
}
