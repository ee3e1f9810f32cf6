//! pipebridge-python: PyO3 bindings for the process-wide engine bridge.
//!
//! ```python
//! import ctypes, pipebridge
//!
//! lib = ctypes.CDLL("libstockfish.so")
//! entry = ctypes.cast(lib.stockfish_main, ctypes.c_void_p).value
//! pipebridge.start_engine(entry)
//! pipebridge.send_command("uci")
//! while pipebridge.read_output() != "uciok":
//!     pass
//! ```

use std::ffi::CString;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3_stub_gen::derive::gen_stub_pyfunction;

use pipebridge_core::{BridgeError, EngineMain, ForeignEngine, logging};

fn bridge_err(e: BridgeError) -> PyErr {
    tracing::error!(error = %e, "Engine bridge call failed");
    PyRuntimeError::new_err(e.to_string())
}

/// Start the engine whose `main`-style entry point lives at address `entry`.
///
/// The engine runs on a background thread with the process's stdin/stdout
/// bound to the bridge pipes. Raises `RuntimeError` if the engine was already
/// started or the pipes could not be set up.
#[gen_stub_pyfunction]
#[pyfunction]
#[pyo3(signature = (entry, argv0 = "stockfish"))]
fn start_engine(entry: usize, argv0: &str) -> PyResult<()> {
    logging::init_tracing();

    if entry == 0 {
        tracing::warn!("Rejected null engine entry point");
        return Err(PyValueError::new_err("engine entry point is null"));
    }
    let argv0 = CString::new(argv0).map_err(|e| PyValueError::new_err(e.to_string()))?;

    // Safety: the caller hands us the address of a linked function with the
    // `int main(int, char **)` shape, typically taken from a ctypes symbol.
    let engine = unsafe {
        let entry = std::mem::transmute::<usize, EngineMain>(entry);
        ForeignEngine::new(entry, argv0)
    };
    pipebridge_core::global().start(engine).map_err(bridge_err)
}

/// Send one command line to the engine. Ignored before `start_engine`.
#[gen_stub_pyfunction]
#[pyfunction]
fn send_command(command: &str) {
    pipebridge_core::global().send(command);
}

/// Next line of engine output without its newline.
///
/// Blocks (with the GIL released) until a line arrives. Returns `""` before
/// `start_engine` and after the engine's output has closed.
#[gen_stub_pyfunction]
#[pyfunction]
fn read_output(py: Python<'_>) -> String {
    py.detach(|| pipebridge_core::global().read_line())
}

/// `"STARTING"`, `"RUNNING"`, `"EXITED"`, `"FAILED"`, `"PANICKED"`, or
/// `None` before the engine is started.
#[gen_stub_pyfunction]
#[pyfunction]
fn engine_status() -> Option<&'static str> {
    pipebridge_core::global()
        .engine_status()
        .map(|status| status.as_str())
}

/// Stop the engine and restore stdin/stdout. Returns the final engine status.
#[gen_stub_pyfunction]
#[pyfunction]
fn shutdown(py: Python<'_>) -> PyResult<&'static str> {
    py.detach(|| pipebridge_core::global().shutdown())
        .map(|status| status.as_str())
        .map_err(bridge_err)
}

#[pymodule]
fn pipebridge(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("PIPEBRIDGE_PEP440_VERSION"))?;

    m.add_function(wrap_pyfunction!(start_engine, m)?)?;
    m.add_function(wrap_pyfunction!(send_command, m)?)?;
    m.add_function(wrap_pyfunction!(read_output, m)?)?;
    m.add_function(wrap_pyfunction!(engine_status, m)?)?;
    m.add_function(wrap_pyfunction!(shutdown, m)?)?;

    Ok(())
}

pyo3_stub_gen::define_stub_info_gatherer!(stub_info);
