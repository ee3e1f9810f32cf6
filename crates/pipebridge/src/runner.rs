//! Engine abstraction and the supervised engine thread.
//!
//! The engine runs its one-time initialization and then its run loop on a
//! dedicated thread. The loop blocks reading commands until it sees its
//! termination command or end of input. Errors and panics on that thread are
//! caught, logged and recorded on the [`EngineHandle`]; nothing unwinds into
//! the caller.

use std::any::Any;
use std::ffi::{CString, c_char, c_int};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::os::fd::OwnedFd;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::error::{BridgeError, EngineError};
use crate::status::EngineStatus;

/// The engine's view of its console.
///
/// In injected mode these are the engine's pipe ends. In process-wide mode
/// they are the (redirected) process stdin/stdout.
pub struct EngineStdio {
    pub input: Box<dyn BufRead + Send>,
    pub output: Box<dyn Write + Send>,
}

impl EngineStdio {
    pub fn new(input: impl BufRead + Send + 'static, output: impl Write + Send + 'static) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    pub fn from_pipes(stdin: OwnedFd, stdout: OwnedFd) -> Self {
        Self::new(BufReader::new(File::from(stdin)), File::from(stdout))
    }

    pub fn console() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }

    /// Next input line without terminator, `None` at end of input.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Write one line and flush it.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.output.write_all(line.as_bytes())?;
        self.output.write_all(b"\n")?;
        self.output.flush()
    }
}

/// An engine hosted on the bridge's background thread.
pub trait Engine: Send + 'static {
    fn name(&self) -> &str {
        "engine"
    }

    /// One-time setup (tables, tunable parameters). Runs on the engine thread.
    fn init(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    /// The engine's run loop.
    fn run(&mut self, stdio: EngineStdio) -> Result<(), EngineError>;
}

/// Engine built from a closure, see [`engine_fn`].
pub struct FnEngine<F> {
    name: String,
    run: F,
}

pub fn engine_fn<F>(name: impl Into<String>, run: F) -> FnEngine<F>
where
    F: FnMut(EngineStdio) -> Result<(), EngineError> + Send + 'static,
{
    FnEngine {
        name: name.into(),
        run,
    }
}

impl<F> Engine for FnEngine<F>
where
    F: FnMut(EngineStdio) -> Result<(), EngineError> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, stdio: EngineStdio) -> Result<(), EngineError> {
        (self.run)(stdio)
    }
}

/// C entry point of a linked engine library: `int main(int argc, char** argv)`.
pub type EngineMain = unsafe extern "C" fn(argc: c_int, argv: *const *const c_char) -> c_int;

/// A linked engine whose entry point hardcodes console access.
///
/// Ignores [`EngineStdio`]; pair it with [`StdioMode::ProcessWide`](crate::StdioMode).
pub struct ForeignEngine {
    entry: EngineMain,
    argv0: CString,
}

impl ForeignEngine {
    /// # Safety
    ///
    /// `entry` must be safe to call once, from a non-main thread, with a
    /// one-element null-terminated `argv`.
    pub unsafe fn new(entry: EngineMain, argv0: CString) -> Self {
        Self { entry, argv0 }
    }
}

impl Engine for ForeignEngine {
    fn name(&self) -> &str {
        self.argv0.to_str().unwrap_or("engine")
    }

    fn run(&mut self, stdio: EngineStdio) -> Result<(), EngineError> {
        drop(stdio);
        let argv = [self.argv0.as_ptr(), std::ptr::null()];
        // Safety: contract of `new`; argv outlives the call.
        let code = unsafe { (self.entry)(1, argv.as_ptr()) };
        if code == 0 {
            Ok(())
        } else {
            Err(EngineError::Exit { code })
        }
    }
}

#[derive(Debug, Default)]
struct EngineReport {
    status: EngineStatus,
    error: Option<String>,
}

/// Handle to the supervised engine thread.
pub struct EngineHandle {
    name: String,
    report: Arc<Mutex<EngineReport>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EngineHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> EngineStatus {
        lock(&self.report).status
    }

    /// Failure or panic message once the engine has stopped abnormally.
    pub fn error(&self) -> Option<String> {
        lock(&self.report).error.clone()
    }

    pub fn is_alive(&self) -> bool {
        lock(&self.thread)
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Wait for the engine thread to finish. Blocks until the run loop returns.
    pub fn join(&self) -> EngineStatus {
        let thread = lock(&self.thread).take();
        if let Some(thread) = thread
            && thread.join().is_err()
        {
            // Panics are caught inside the thread; this only trips if the
            // report itself could not be written.
            tracing::error!(engine = %self.name, "Engine thread terminated abnormally");
        }
        self.status()
    }
}

/// Spawn `engine` on its own named thread.
///
/// Fire-and-forget from the caller's point of view: completion and failure are
/// only observable through the returned handle and the logs.
pub fn spawn_engine<E: Engine>(
    engine: E,
    stdio: EngineStdio,
    thread_name: &str,
) -> Result<EngineHandle, BridgeError> {
    spawn_engine_then(engine, stdio, thread_name, || {})
}

/// Like [`spawn_engine`], running `on_exit` on the engine thread once the run
/// loop has returned, failed or panicked, before the final status is recorded.
pub fn spawn_engine_then<E, F>(
    mut engine: E,
    stdio: EngineStdio,
    thread_name: &str,
    on_exit: F,
) -> Result<EngineHandle, BridgeError>
where
    E: Engine,
    F: FnOnce() + Send + 'static,
{
    let name = engine.name().to_string();
    let report = Arc::new(Mutex::new(EngineReport::default()));
    let thread_report = Arc::clone(&report);
    let engine_name = name.clone();

    let thread = thread::Builder::new()
        .name(thread_name.replace('\0', ""))
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                engine.init()?;
                record(&thread_report, EngineStatus::Running, None);
                tracing::info!(engine = %engine_name, "Engine run loop started");
                engine.run(stdio)
            }));

            on_exit();

            match outcome {
                Ok(Ok(())) => {
                    tracing::info!(engine = %engine_name, "Engine exited");
                    record(&thread_report, EngineStatus::Exited, None);
                }
                Ok(Err(e)) => {
                    tracing::error!(engine = %engine_name, error = %e, "Engine failed");
                    record(&thread_report, EngineStatus::Failed, Some(e.to_string()));
                }
                Err(payload) => {
                    let message = panic_message(&*payload);
                    tracing::error!(engine = %engine_name, panic = %message, "Engine panicked");
                    record(&thread_report, EngineStatus::Panicked, Some(message));
                }
            }
        })
        .map_err(BridgeError::Spawn)?;

    tracing::debug!(engine = %name, thread = thread_name, "Spawned engine thread");

    Ok(EngineHandle {
        name,
        report,
        thread: Mutex::new(Some(thread)),
    })
}

fn record(report: &Mutex<EngineReport>, status: EngineStatus, error: Option<String>) {
    let mut report = lock(report);
    report.status = status;
    report.error = error;
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Lock, recovering from poison: the guarded data stays consistent because
/// every writer replaces it wholesale.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
