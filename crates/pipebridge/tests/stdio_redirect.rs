//! Process-wide mode rebinds fd 0/1, so this binary holds a single test: no
//! other test may run while the standard descriptors point at the pipes.

use std::ffi::{CString, c_char, c_int};
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

use pipebridge::{
    Bridge, BridgeConfig, BridgeState, EngineStatus, ForeignEngine, ReadOutcome, StdioMode,
};

/// Stands in for a linked engine's `main`: talks to the process console only.
unsafe extern "C" fn console_engine_main(_argc: c_int, _argv: *const *const c_char) -> c_int {
    let mut stdout = std::io::stdout();
    if writeln!(stdout, "Console engine").and_then(|_| stdout.flush()).is_err() {
        return 2;
    }

    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else {
            return 3;
        };
        let reply = match line.as_str() {
            "uci" => "id name Console\nuciok",
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

#[test]
fn process_wide_redirect_round_trip_and_restore() {
    let bridge = Bridge::new(BridgeConfig::new().with_stdio(StdioMode::ProcessWide));
    let engine =
        unsafe { ForeignEngine::new(console_engine_main, CString::new("console").unwrap()) };
    bridge.start(engine).unwrap();
    assert_eq!(bridge.state(), BridgeState::Running);

    bridge.send("uci");
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut lines = Vec::new();
    while lines.last().map(String::as_str) != Some("uciok") {
        assert!(Instant::now() < deadline, "no uciok after {lines:?}");
        lines.push(bridge.read_line());
    }
    assert_eq!(lines, vec!["Console engine", "id name Console", "uciok"]);

    bridge.send("isready");
    assert_eq!(bridge.read_line(), "readyok");

    // Sends "quit", joins the engine, then puts fd 0/1 back; restoring fd 1
    // closes the last write end of the output pipe.
    assert_eq!(bridge.shutdown().unwrap(), EngineStatus::Exited);
    assert_eq!(bridge.read_outcome(), ReadOutcome::Closed);
    assert_eq!(bridge.read_line(), "");
}
