//! C ABI over the process-wide bridge.
//!
//! A host registers the linked engine's entry point once, starts it, then
//! exchanges lines:
//!
//! ```c
//! pipebridge_register_engine(stockfish_main, "stockfish");
//! if (pipebridge_start_engine() != PIPEBRIDGE_OK) { /* ... */ }
//! pipebridge_send_command("uci");
//! char *line = pipebridge_read_output();
//! /* ... */
//! pipebridge_string_free(line);
//! ```
//!
//! JVM hosts bind the same symbols through JNA or the foreign function API.

use std::ffi::{CString, c_char, c_int};
use std::sync::Mutex;

use pipebridge::{BridgeError, EngineMain, EngineStatus, ForeignEngine, logging};

pub mod marshal;

pub const PIPEBRIDGE_OK: c_int = 0;
pub const PIPEBRIDGE_ERR_NO_ENGINE: c_int = -1;
pub const PIPEBRIDGE_ERR_ALREADY_STARTED: c_int = -2;
pub const PIPEBRIDGE_ERR_RESOURCES: c_int = -3;
pub const PIPEBRIDGE_ERR_REDIRECT: c_int = -4;
pub const PIPEBRIDGE_ERR_SPAWN: c_int = -5;
pub const PIPEBRIDGE_ERR_NOT_STARTED: c_int = -6;
pub const PIPEBRIDGE_ERR_IO: c_int = -7;
pub const PIPEBRIDGE_ERR_INVALID_ARGUMENT: c_int = -8;

/// `pipebridge_engine_status` before the engine has been started.
pub const PIPEBRIDGE_STATUS_NONE: c_int = -1;
pub const PIPEBRIDGE_STATUS_STARTING: c_int = 0;
pub const PIPEBRIDGE_STATUS_RUNNING: c_int = 1;
pub const PIPEBRIDGE_STATUS_EXITED: c_int = 2;
pub const PIPEBRIDGE_STATUS_FAILED: c_int = 3;
pub const PIPEBRIDGE_STATUS_PANICKED: c_int = 4;

const DEFAULT_ARGV0: &str = "stockfish";

struct Registration {
    entry: EngineMain,
    argv0: CString,
}

static REGISTERED: Mutex<Option<Registration>> = Mutex::new(None);

fn error_code(error: &BridgeError) -> c_int {
    match error {
        BridgeError::ResourceExhausted(_) => PIPEBRIDGE_ERR_RESOURCES,
        BridgeError::Redirect { .. } => PIPEBRIDGE_ERR_REDIRECT,
        BridgeError::Spawn(_) => PIPEBRIDGE_ERR_SPAWN,
        BridgeError::AlreadyStarted => PIPEBRIDGE_ERR_ALREADY_STARTED,
        BridgeError::NotInitialized => PIPEBRIDGE_ERR_NOT_STARTED,
        BridgeError::InputClosed | BridgeError::Io(_) => PIPEBRIDGE_ERR_IO,
    }
}

fn status_code(status: EngineStatus) -> c_int {
    match status {
        EngineStatus::Starting => PIPEBRIDGE_STATUS_STARTING,
        EngineStatus::Running => PIPEBRIDGE_STATUS_RUNNING,
        EngineStatus::Exited => PIPEBRIDGE_STATUS_EXITED,
        EngineStatus::Failed => PIPEBRIDGE_STATUS_FAILED,
        EngineStatus::Panicked => PIPEBRIDGE_STATUS_PANICKED,
    }
}

/// Register the engine entry point used by `pipebridge_start_engine`.
///
/// `argv0` may be null, in which case the engine sees `"stockfish"`. A later
/// registration replaces an earlier one but has no effect once started.
///
/// # Safety
///
/// `entry` must be safe to call once from a background thread with a
/// `main`-style argument vector. `argv0` is null or a valid NUL-terminated
/// string; it is copied before returning.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pipebridge_register_engine(
    entry: Option<EngineMain>,
    argv0: *const c_char,
) -> c_int {
    let Some(entry) = entry else {
        return PIPEBRIDGE_ERR_INVALID_ARGUMENT;
    };
    // Safety: forwarded from this function's contract.
    let argv0 = match unsafe { marshal::command_bytes(argv0) } {
        Some(bytes) => CString::new(bytes).unwrap_or_default(),
        None => CString::new(DEFAULT_ARGV0).unwrap_or_default(),
    };

    let mut registered = REGISTERED.lock().unwrap_or_else(|e| e.into_inner());
    *registered = Some(Registration { entry, argv0 });
    PIPEBRIDGE_OK
}

/// Start the registered engine on the process-wide bridge.
///
/// Returns `PIPEBRIDGE_OK` or a negative error code. A second call returns
/// `PIPEBRIDGE_ERR_ALREADY_STARTED` and changes nothing.
#[unsafe(no_mangle)]
pub extern "C" fn pipebridge_start_engine() -> c_int {
    logging::init_tracing();

    let engine = {
        let registered = REGISTERED.lock().unwrap_or_else(|e| e.into_inner());
        let Some(registration) = registered.as_ref() else {
            tracing::error!("No engine registered before start");
            return PIPEBRIDGE_ERR_NO_ENGINE;
        };
        // Safety: the registration contract covers calling `entry` once on a
        // background thread.
        unsafe { ForeignEngine::new(registration.entry, registration.argv0.clone()) }
    };

    match pipebridge::global().start(engine) {
        Ok(()) => PIPEBRIDGE_OK,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start engine");
            error_code(&e)
        }
    }
}

/// Send one command line. A no-op before start, after shutdown, or for null.
///
/// # Safety
///
/// `command` is null or a valid NUL-terminated string for the duration of the
/// call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pipebridge_send_command(command: *const c_char) {
    // Safety: forwarded from this function's contract.
    let Some(command) = (unsafe { marshal::command_bytes(command) }) else {
        tracing::debug!("Ignoring null command");
        return;
    };
    pipebridge::global().send_bytes(command);
}

/// Read one response line, blocking until the engine produces one.
///
/// Returns an empty string before start and once output has closed. The
/// result is never null and must be released with `pipebridge_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn pipebridge_read_output() -> *mut c_char {
    marshal::outcome_to_c(pipebridge::global().read_outcome())
}

/// # Safety
///
/// `line` is null or a pointer returned by `pipebridge_read_output` that has
/// not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pipebridge_string_free(line: *mut c_char) {
    // Safety: forwarded from this function's contract.
    unsafe { marshal::free_c_string(line) }
}

/// Engine thread status: `PIPEBRIDGE_STATUS_NONE` before start, then 0
/// starting, 1 running, 2 exited, 3 failed, 4 panicked.
#[unsafe(no_mangle)]
pub extern "C" fn pipebridge_engine_status() -> c_int {
    pipebridge::global()
        .engine_status()
        .map_or(PIPEBRIDGE_STATUS_NONE, status_code)
}

/// Stop the engine and restore the console. Blocks until the engine returns.
///
/// Returns the final status code (see `pipebridge_engine_status`) or a
/// negative error code.
#[unsafe(no_mangle)]
pub extern "C" fn pipebridge_shutdown() -> c_int {
    match pipebridge::global().shutdown() {
        Ok(status) => status_code(status),
        Err(e) => {
            tracing::warn!(error = %e, "Engine shutdown failed");
            error_code(&e)
        }
    }
}

/// Static NUL-terminated version string. Do not free.
#[unsafe(no_mangle)]
pub extern "C" fn pipebridge_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast()
}
