//! Bridge configuration: builder plus environment overrides.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_STDIO: &str = "PIPEBRIDGE_STDIO";
pub const ENV_THREAD_NAME: &str = "PIPEBRIDGE_THREAD_NAME";
pub const ENV_QUIT_COMMAND: &str = "PIPEBRIDGE_QUIT_COMMAND";

const DEFAULT_THREAD_NAME: &str = "pipebridge-engine";
const DEFAULT_QUIT_COMMAND: &str = "quit";

/// How the engine's console I/O is bound to the pipes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StdioMode {
    /// Pipe ends are handed to the engine through [`EngineStdio`](crate::EngineStdio).
    /// Nothing process-global changes.
    #[default]
    Injected,
    /// fd 0/1 are rebound to the pipes, for engines that hardcode console
    /// access. Captures every stdout write in the process.
    ProcessWide,
}

impl FromStr for StdioMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "injected" => Ok(Self::Injected),
            "process" | "process-wide" => Ok(Self::ProcessWide),
            _ => Err(ConfigError::InvalidValue {
                key: ENV_STDIO,
                value: s.to_string(),
                expected: "injected or process",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub stdio: StdioMode,
    pub thread_name: String,
    /// Sent by `shutdown` before the input is closed. `None` just closes.
    pub quit_command: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            stdio: StdioMode::default(),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            quit_command: Some(DEFAULT_QUIT_COMMAND.to_string()),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stdio(mut self, stdio: StdioMode) -> Self {
        self.stdio = stdio;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_quit_command(mut self, command: Option<String>) -> Self {
        self.quit_command = command;
        self
    }

    /// Apply `PIPEBRIDGE_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Invalid values are logged and
    /// ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(ENV_STDIO) {
            match raw.parse::<StdioMode>() {
                Ok(mode) => self.stdio = mode,
                Err(e) => tracing::warn!(error = %e, "Ignoring stdio override"),
            }
        }

        if let Some(name) = lookup(ENV_THREAD_NAME) {
            if name.trim().is_empty() || name.contains('\0') {
                tracing::warn!(key = ENV_THREAD_NAME, "Ignoring invalid thread name override");
            } else {
                self.thread_name = name;
            }
        }

        if let Some(command) = lookup(ENV_QUIT_COMMAND) {
            self.quit_command = if command.is_empty() {
                None
            } else {
                Some(command)
            };
        }

        self
    }
}
