//! Full lifecycle through the exported C functions against the process-global
//! bridge. Single test: the global bridge starts once per process and rebinds
//! fd 0/1 while the engine runs.

use std::ffi::{CStr, CString, c_char, c_int};
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

use pipebridge_ffi::{
    PIPEBRIDGE_ERR_ALREADY_STARTED, PIPEBRIDGE_OK, PIPEBRIDGE_STATUS_EXITED,
    PIPEBRIDGE_STATUS_NONE, PIPEBRIDGE_STATUS_RUNNING, pipebridge_engine_status,
    pipebridge_read_output, pipebridge_register_engine, pipebridge_send_command,
    pipebridge_shutdown, pipebridge_start_engine, pipebridge_string_free,
};

/// A linked engine's `main`: answers on the console, checks its argv[0].
unsafe extern "C" fn console_engine_main(argc: c_int, argv: *const *const c_char) -> c_int {
    // Safety: the bridge passes argc entries plus a terminating null.
    let name = unsafe { CStr::from_ptr(*argv) };
    if argc != 1 || name.to_bytes() != b"console" {
        return 9;
    }

    let mut stdout = std::io::stdout();
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else {
            return 3;
        };
        let reply = match line.as_str() {
            "uci" => "id name Console\nid author pipebridge\nuciok",
            "isready" => "readyok",
            "quit" => return 0,
            _ => continue,
        };
        if writeln!(stdout, "{reply}").and_then(|_| stdout.flush()).is_err() {
            return 4;
        }
    }
    0
}

/// Read one line through the C surface and release it.
fn read_output() -> String {
    let ptr = pipebridge_read_output();
    assert!(!ptr.is_null());
    let line = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
    unsafe { pipebridge_string_free(ptr) };
    line
}

fn send_command(command: &str) {
    let command = CString::new(command).unwrap();
    unsafe { pipebridge_send_command(command.as_ptr()) };
}

#[test]
fn uci_round_trip_through_c_abi() {
    assert_eq!(pipebridge_engine_status(), PIPEBRIDGE_STATUS_NONE);
    assert_eq!(read_output(), "");

    let argv0 = CString::new("console").unwrap();
    let code = unsafe { pipebridge_register_engine(Some(console_engine_main), argv0.as_ptr()) };
    assert_eq!(code, PIPEBRIDGE_OK);
    drop(argv0);

    assert_eq!(pipebridge_start_engine(), PIPEBRIDGE_OK);
    assert_eq!(pipebridge_start_engine(), PIPEBRIDGE_ERR_ALREADY_STARTED);

    send_command("uci");
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut lines = Vec::new();
    while lines.last().map(String::as_str) != Some("uciok") {
        assert!(Instant::now() < deadline, "no uciok after {lines:?}");
        lines.push(read_output());
    }
    assert_eq!(lines, vec!["id name Console", "id author pipebridge", "uciok"]);
    assert_eq!(pipebridge_engine_status(), PIPEBRIDGE_STATUS_RUNNING);

    send_command("isready");
    assert_eq!(read_output(), "readyok");

    assert_eq!(pipebridge_shutdown(), PIPEBRIDGE_STATUS_EXITED);
    assert_eq!(pipebridge_engine_status(), PIPEBRIDGE_STATUS_EXITED);
    assert_eq!(read_output(), "");
    send_command("uci");
    assert_eq!(read_output(), "");
}
