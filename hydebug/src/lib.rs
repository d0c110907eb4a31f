//! Debug-mode proxy for handle-based object apis.
//!
//! A [`DebugSession`](session::DebugSession) sits in front of a trusted implementation of
//! [`UniversalApi`](api::UniversalApi). Every handle the implementation returns is wrapped
//! before it reaches the client, and every wrapped handle the client passes back is checked:
//! use after close, double close, handles of another session, and access to raw data after
//! its owner was closed are all reported instead of silently corrupting memory.
//!
//! Closed handles are kept in a bounded quarantine so late uses can still be attributed to
//! the handle and generation they came from. Most consumers only need
//! [`session::DebugSession`] and the configuration in [`utils::conf::DebugConfig`].

pub mod api;
pub mod handle;
pub mod magic;
pub mod queue;
pub mod raw_data;
pub mod session;
#[cfg(any(test, feature = "test-utils"))]
pub mod tests_utils;
pub mod utils;

pub use api::{Constant, UniversalApi};
pub use handle::{AnyHandle, DHandle, UHandle};
pub use raw_data::RawData;
pub use session::{DebugSession, SessionCreateInfo};
pub use utils::{
    conf::DebugConfig,
    error::{DebugError, DebugResult, Violation, ViolationKind},
};
