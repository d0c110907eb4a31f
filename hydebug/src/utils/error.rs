use strum::{Display, EnumIter, FromRepr, IntoStaticStr};
use thiserror::Error;

use crate::session::HandleInfo;

/// Kind of handle-lifetime violation detected by a debug session.
///
/// Every kind is a caller protocol violation. Once one is reported the session refuses any
/// further work (see [`DebugError::Poisoned`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr, IntoStaticStr)]
#[repr(u32)]
pub enum ViolationKind {
    /// A closed handle was unwrapped or forwarded, or a freed handle was used in any way
    /// (including `dump`), or an open handle was freed.
    StaleHandleUse = 1,
    /// An already closed handle was closed again.
    DoubleClose = 2,
    /// A handle (or the session itself) does not carry the expected session marker.
    SessionMismatch = 3,
    /// Raw data attached to a handle was accessed outside of its validity.
    RawBufferOverrun = 4,
    /// A raw underlying handle was passed where a wrapped handle was expected.
    NotAWrappedHandle = 5,
    /// A wrapped handle was passed where a raw underlying handle was expected.
    NotARawHandle = 6,
}

impl ViolationKind {
    /// The invariant broken by this kind of violation.
    pub fn invariant(&self) -> &'static str {
        match self {
            ViolationKind::StaleHandleUse => "a handle must not be used after it has been closed",
            ViolationKind::DoubleClose => "a handle must be closed exactly once",
            ViolationKind::SessionMismatch => {
                "a handle must only be used with the session that opened it"
            }
            ViolationKind::RawBufferOverrun => {
                "raw data is only accessible, within bounds, while its handle is open"
            }
            ViolationKind::NotAWrappedHandle => "only wrapped handles cross the debug boundary",
            ViolationKind::NotARawHandle => "only raw handles reach the underlying api",
        }
    }
}

/// Description of a handle-lifetime violation.
///
/// Values of this type are only produced by the session when it detects misuse.
#[derive(Debug, Error)]
#[error("{kind} ({}): {detail} [{subject}]", .kind.invariant())]
pub struct Violation {
    kind: ViolationKind,
    generation: Option<u64>,
    subject: String,
    detail: String,
}

impl Violation {
    pub(crate) fn new(
        kind: ViolationKind,
        generation: Option<u64>,
        subject: String,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            generation,
            subject,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ViolationKind {
        self.kind
    }

    /// Generation of the offending handle, when the offender is a wrapped handle.
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    /// Human readable name of the offending handle.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

#[derive(Debug, Error)]
pub enum DebugError {
    #[error("Fatal handle violation: {0}")]
    Violation(Box<Violation>),

    #[error("Debug session is poisoned by an earlier {0} violation")]
    Poisoned(ViolationKind),

    #[error("Resource exhaustion: {0}")]
    ResourceExhaustion(String),

    #[error("{} handle(s) opened since generation {since} are still open", .handles.len())]
    Leak {
        since: u64,
        handles: Vec<HandleInfo>,
    },

    #[error("Handle queue is corrupted: {0}")]
    QueueCorrupted(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config file '{file}': {source}")]
    ConfigParseError {
        source: toml::de::Error,
        file: String,
    },

    #[error("Failed to serialize config: {0}")]
    ConfigSerializeError(#[from] toml::ser::Error),
}

impl DebugError {
    /// Whether this error stems from a handle-lifetime violation. Such errors must reach
    /// [`DebugSession::terminate`](crate::session::DebugSession::terminate).
    pub fn is_fatal(&self) -> bool {
        matches!(self, DebugError::Violation(_) | DebugError::Poisoned(_))
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            DebugError::Violation(violation) => Some(violation.as_ref()),
            _ => None,
        }
    }

    pub fn violation_kind(&self) -> Option<ViolationKind> {
        match self {
            DebugError::Violation(violation) => Some(violation.kind()),
            DebugError::Poisoned(kind) => Some(*kind),
            _ => None,
        }
    }
}

pub type DebugResult<T> = Result<T, DebugError>;
