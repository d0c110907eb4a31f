/// Marker stored in every [`DebugSession`](crate::session::DebugSession) and checked on each
/// entry point.
pub const DEBUG_MAGIC: u64 = 0xDEB00FF;

/// Default number of closed handles kept in quarantine before the oldest one is freed.
pub const DEFAULT_CLOSED_HANDLES_QUEUE_MAX_SIZE: usize = 1024;

/// Default cap on the cumulative size of protected raw data (10 MiB).
pub const DEFAULT_PROTECTED_RAW_DATA_MAX_SIZE: usize = 1024 * 1024 * 10;

/// Generation of the wrappers opened while the session is created (builtin constants).
pub const CONSTANTS_GENERATION: u64 = 0;

/// Generation of the first handle opened by a client.
pub const FIRST_GENERATION: u64 = 1;

/// Byte written over raw data before it is released.
pub const RAW_DATA_SCRUB_BYTE: u8 = 0xFF;

/// Name of the environment variable containing the path to the debug configuration file.
/// If not set, defaults to
///  (1) on Linux and macOS: `$XDG_CONFIG_HOME/hydebug/debug.toml` or `$HOME/.config/hydebug/debug.toml`
///  (2) on Windows: `%APPDATA%\hydebug\debug.toml`
pub const ENV_DEBUG_CONFIG_PATH: &str = "HYDEBUG_CONFIG_PATH";
