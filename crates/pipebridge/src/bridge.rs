//! The request/response bridge.
//!
//! Flow:
//! 1. `start` allocates both pipe pairs
//! 2. In process-wide mode fd 0/1 are rebound to the engine's pipe ends
//! 3. The engine thread is spawned
//! 4. `send` writes command lines, `read_line` blocks for response lines
//!
//! Ordering between commands and responses relies on pipe FIFO semantics only;
//! matching responses to requests is up to the caller.

use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, OnceLock};
use std::thread;

use crate::config::{BridgeConfig, StdioMode};
use crate::error::BridgeError;
use crate::pipes::{EnginePipes, StdioRedirect};
use crate::reader::{LineReader, ReadOutcome};
use crate::runner::{Engine, EngineHandle, EngineStdio, lock, spawn_engine_then};
use crate::status::{BridgeState, EngineStatus};
use crate::writer::CommandWriter;

struct Running {
    writer: Mutex<Option<CommandWriter<File>>>,
    reader: Mutex<LineReader<File>>,
    engine: EngineHandle,
    redirect: Arc<Mutex<Option<StdioRedirect>>>,
}

/// Result of [`Bridge::deliver_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// The line was handed back and stays unread.
    Refused,
    /// Not started, or output closed.
    Ended,
}

/// Bridge between a caller and one embedded engine.
///
/// Safe to call from any thread before, during and after the engine's life:
/// sends before `start` are dropped and reads return empty without blocking.
/// Concurrent readers are serialized; each gets whole lines.
pub struct Bridge {
    config: BridgeConfig,
    start_lock: Mutex<()>,
    running: OnceLock<Running>,
    stopped: AtomicBool,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            start_lock: Mutex::new(()),
            running: OnceLock::new(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> BridgeState {
        if self.stopped.load(Ordering::SeqCst) {
            BridgeState::Stopped
        } else if self.running.get().is_some() {
            BridgeState::Running
        } else {
            BridgeState::Uninitialized
        }
    }

    pub fn is_started(&self) -> bool {
        self.running.get().is_some()
    }

    /// Allocate the pipes, bind the engine's console to them and spawn the
    /// engine thread.
    ///
    /// One engine per bridge: a second call returns
    /// [`BridgeError::AlreadyStarted`] and changes nothing.
    pub fn start<E: Engine>(&self, engine: E) -> Result<(), BridgeError> {
        let _guard = lock(&self.start_lock);
        if self.running.get().is_some() {
            tracing::warn!(engine = engine.name(), "Engine already started, ignoring start");
            return Err(BridgeError::AlreadyStarted);
        }

        let EnginePipes {
            engine_stdin,
            engine_stdout,
            commands,
            responses,
        } = EnginePipes::allocate()?;

        let (stdio, redirect) = match self.config.stdio {
            StdioMode::Injected => (EngineStdio::from_pipes(engine_stdin, engine_stdout), None),
            StdioMode::ProcessWide => {
                let redirect = StdioRedirect::install(&engine_stdin, &engine_stdout)?;
                // fd 0/1 now hold the engine's ends; the originals must close
                // so end-of-input and end-of-output propagate.
                drop(engine_stdin);
                drop(engine_stdout);
                (EngineStdio::console(), Some(redirect))
            }
        };

        // The engine thread puts fd 0/1 back as soon as it ends, so the
        // process's copy of the output write end closes and readers see
        // end of output. On spawn failure the last reference drops here and
        // restores stdio.
        let redirect = Arc::new(Mutex::new(redirect));
        let on_exit = {
            let redirect = Arc::clone(&redirect);
            move || restore_stdio(&redirect)
        };
        let engine = spawn_engine_then(engine, stdio, &self.config.thread_name, on_exit)?;

        tracing::info!(
            engine = engine.name(),
            stdio = ?self.config.stdio,
            "Engine bridge started"
        );

        let running = Running {
            writer: Mutex::new(Some(CommandWriter::new(File::from(commands)))),
            reader: Mutex::new(LineReader::new(File::from(responses))),
            engine,
            redirect,
        };
        if self.running.set(running).is_err() {
            // Unreachable while start_lock is held.
            return Err(BridgeError::AlreadyStarted);
        }
        Ok(())
    }

    /// Send one command line. No-op before `start` and after `shutdown`.
    pub fn send(&self, command: &str) {
        self.send_bytes(command.as_bytes());
    }

    /// Like [`send`](Self::send) for commands that are not valid UTF-8.
    pub fn send_bytes(&self, command: &[u8]) {
        match self.try_send_bytes(command) {
            Ok(()) => {}
            Err(BridgeError::NotInitialized) => {
                tracing::trace!("Engine not started, dropping command");
            }
            Err(BridgeError::InputClosed) => {
                tracing::debug!("Engine input closed, dropping command");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send command to engine");
            }
        }
    }

    pub fn try_send(&self, command: &str) -> Result<(), BridgeError> {
        self.try_send_bytes(command.as_bytes())
    }

    pub fn try_send_bytes(&self, command: &[u8]) -> Result<(), BridgeError> {
        let running = self.running.get().ok_or(BridgeError::NotInitialized)?;
        let mut writer = lock(&running.writer);
        let writer = writer.as_mut().ok_or(BridgeError::InputClosed)?;
        writer.send(command)?;
        Ok(())
    }

    /// Read one line, blocking until the engine writes one.
    ///
    /// Returns the empty string before `start` (without blocking) and once the
    /// engine's output is closed.
    pub fn read_line(&self) -> String {
        self.read_outcome().into_text()
    }

    /// Like [`read_line`](Self::read_line) but tells the empty cases apart.
    pub fn read_outcome(&self) -> ReadOutcome {
        let Some(running) = self.running.get() else {
            return ReadOutcome::NotStarted;
        };

        let mut reader = lock(&running.reader);
        match reader.read_line() {
            Ok(Some(line)) => ReadOutcome::Line(line),
            Ok(None) => ReadOutcome::Closed,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read engine output");
                ReadOutcome::Closed
            }
        }
    }

    /// Read one line and hand it to `deliver` without releasing the reader.
    ///
    /// A line `deliver` gives back is pushed back and is the next one any
    /// reader sees, so handing off between readers never drops a line.
    pub(crate) fn deliver_line(
        &self,
        deliver: impl FnOnce(Vec<u8>) -> Result<(), Vec<u8>>,
    ) -> Delivery {
        let Some(running) = self.running.get() else {
            return Delivery::Ended;
        };

        let mut reader = lock(&running.reader);
        match reader.read_line() {
            Ok(Some(line)) => match deliver(line) {
                Ok(()) => Delivery::Delivered,
                Err(line) => {
                    reader.unread(line);
                    Delivery::Refused
                }
            },
            Ok(None) => Delivery::Ended,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read engine output");
                Delivery::Ended
            }
        }
    }

    pub fn engine_status(&self) -> Option<EngineStatus> {
        self.running.get().map(|r| r.engine.status())
    }

    pub fn engine_error(&self) -> Option<String> {
        self.running.get().and_then(|r| r.engine.error())
    }

    pub fn is_engine_alive(&self) -> bool {
        self.running.get().is_some_and(|r| r.engine.is_alive())
    }

    /// Stop the engine and release the pipes.
    ///
    /// Sends the configured quit command, closes the engine's input, waits for
    /// the engine thread, then restores stdin/stdout in process-wide mode.
    /// Output nobody has read yet is drained meanwhile so the engine never
    /// stalls on a full pipe; later reads still return it in order.
    /// Blocks until the engine's run loop returns. Not restartable; calling it
    /// again only reports the final status.
    pub fn shutdown(&self) -> Result<EngineStatus, BridgeError> {
        let running = self.running.get().ok_or(BridgeError::NotInitialized)?;
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(running.engine.status());
        }

        let status = thread::scope(|scope| {
            let drain = thread::Builder::new()
                .name("pipebridge-drain".to_string())
                .spawn_scoped(scope, || {
                    let mut reader = lock(&running.reader);
                    match reader.buffer_to_end() {
                        Ok(0) => {}
                        Ok(lines) => tracing::debug!(lines, "Buffered unread engine output"),
                        Err(e) => tracing::warn!(error = %e, "Failed to drain engine output"),
                    }
                });
            if let Err(e) = drain {
                tracing::warn!(error = %e, "Output drain not started, shutdown may stall on a full pipe");
            }

            let writer = lock(&running.writer).take();
            if let Some(mut writer) = writer {
                if let Some(quit) = &self.config.quit_command
                    && let Err(e) = writer.send(quit.as_bytes())
                {
                    tracing::debug!(error = %e, "Quit command not delivered");
                }
                drop(writer);
            }

            let status = running.engine.join();
            // Normally already done by the engine thread on exit.
            let redirect = lock(&running.redirect).take();
            redirect.map(StdioRedirect::restore).transpose()?;
            Ok::<_, BridgeError>(status)
        })?;

        tracing::info!(engine = running.engine.name(), status = status.as_str(), "Engine bridge stopped");
        Ok(status)
    }
}

fn restore_stdio(redirect: &Mutex<Option<StdioRedirect>>) {
    let redirect = lock(redirect).take();
    if let Some(redirect) = redirect
        && let Err(e) = redirect.restore()
    {
        tracing::error!(error = %e, "Failed to restore standard descriptors");
    }
}

static GLOBAL: LazyLock<Bridge> = LazyLock::new(|| {
    Bridge::new(
        BridgeConfig::new()
            .with_stdio(StdioMode::ProcessWide)
            .with_env_overrides(),
    )
});

/// The process-wide bridge used by the foreign-function surfaces.
///
/// Defaults to [`StdioMode::ProcessWide`] because linked engines address the
/// console directly; `PIPEBRIDGE_*` variables override the defaults.
pub fn global() -> &'static Bridge {
    &GLOBAL
}
