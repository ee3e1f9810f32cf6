//! pipebridge: redirected-stdio bridge for line-protocol engines embedded in
//! the same process.
//!
//! An engine library runs on a background thread with its console bound to two
//! OS pipes; callers send command lines and read response lines.

#[cfg(not(unix))]
compile_error!("pipebridge needs unix pipes and descriptor duplication");

mod bridge;
mod config;
mod error;
pub mod logging;
pub mod pipes;
mod reader;
mod runner;
mod session;
mod status;
mod writer;

pub use bridge::{Bridge, global};
pub use config::{BridgeConfig, ENV_QUIT_COMMAND, ENV_STDIO, ENV_THREAD_NAME, StdioMode};
pub use error::{BridgeError, ConfigError, EngineError, SessionError};
pub use reader::{LineReader, ReadOutcome};
pub use runner::{
    Engine, EngineHandle, EngineMain, EngineStdio, FnEngine, ForeignEngine, engine_fn,
    spawn_engine, spawn_engine_then,
};
pub use session::{LineSession, SessionConfig};
pub use status::{BridgeState, EngineStatus};
pub use writer::{CommandWriter, LINE_TERMINATOR};

/// Bridge version from Cargo.toml
pub const PIPEBRIDGE_VERSION: &str = env!("CARGO_PKG_VERSION");
