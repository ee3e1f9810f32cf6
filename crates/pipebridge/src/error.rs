//! Error types for the bridge and the engines it hosts.

use std::io;

use thiserror::Error;

/// Failures surfaced by [`Bridge`](crate::Bridge) operations.
///
/// The infallible entry points (`send`, `read_line`) never return these; they
/// log and degrade instead. The `try_*` variants and `start`/`shutdown` do.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The OS could not allocate the pipe descriptors (descriptor table full).
    #[error("failed to allocate engine pipes: {0}")]
    ResourceExhausted(#[source] io::Error),

    /// Rebinding or restoring a standard descriptor failed.
    #[error("failed to redirect {stream}: {source}")]
    Redirect {
        stream: &'static str,
        #[source]
        source: io::Error,
    },

    /// The engine thread could not be spawned.
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("engine already started")]
    AlreadyStarted,

    #[error("engine not started")]
    NotInitialized,

    /// The command side was closed by `shutdown`.
    #[error("engine input closed")]
    InputClosed,

    #[error("engine I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl BridgeError {
    pub fn redirect(stream: &'static str, source: impl Into<io::Error>) -> Self {
        Self::Redirect {
            stream,
            source: source.into(),
        }
    }
}

/// Failures reported by an [`Engine`](crate::Engine) from its own thread.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One-time initialization (tables, tunables) failed.
    #[error("engine initialization failed: {message}")]
    Init { message: String },

    /// The engine's entry point returned a non-zero status.
    #[error("engine exited with status {code}")]
    Exit { code: i32 },

    #[error("engine I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("{message}")]
    Other { message: String },
}

impl EngineError {
    pub fn init(message: impl Into<String>) -> Self {
        Self::Init {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// A configuration value that could not be parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} (expected {expected})")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Failures of the async [`LineSession`](crate::LineSession).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no engine output within {0:?}")]
    Timeout(std::time::Duration),

    /// The listener stopped: output closed, bridge stopped or session closed.
    #[error("session closed")]
    Closed,
}
