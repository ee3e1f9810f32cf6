//! End-to-end request/response flow against a scripted UCI-speaking engine.

use std::time::{Duration, Instant};

use pipebridge::{Bridge, BridgeConfig, BridgeState, EngineError, EngineStatus, EngineStdio, ReadOutcome, engine_fn};

fn scripted_engine() -> impl pipebridge::Engine {
    engine_fn("scripted", |mut io: EngineStdio| {
        io.write_line("Scripted 1.0 by the test suite")?;
        while let Some(line) = io.read_line()? {
            let mut words = line.split_whitespace();
            match words.next() {
                Some("uci") => {
                    io.write_line("id name Scripted 1.0")?;
                    io.write_line("id author the test suite")?;
                    io.write_line("")?;
                    io.write_line("option name Skill Level type spin default 20 min 0 max 20")?;
                    io.write_line("uciok")?;
                }
                Some("isready") => io.write_line("readyok")?,
                Some("go") => {
                    let depth: u32 = match (words.next(), words.next()) {
                        (Some("depth"), Some(d)) => d
                            .parse()
                            .map_err(|_| EngineError::other(format!("bad depth {d}")))?,
                        _ => 1,
                    };
                    for d in 1..=depth {
                        io.write_line(&format!("info depth {d} score cp {} pv e2e4", 10 * d))?;
                    }
                    io.write_line("bestmove e2e4 ponder e7e5")?;
                }
                Some("quit") => break,
                _ => {}
            }
        }
        Ok(())
    })
}

fn read_until(bridge: &Bridge, terminal: &str) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut lines = Vec::new();
    loop {
        assert!(Instant::now() < deadline, "no {terminal:?} after {lines:?}");
        let line = bridge.read_line();
        let done = line == terminal;
        lines.push(line);
        if done {
            return lines;
        }
    }
}

#[test]
fn uci_handshake_reaches_uciok_without_dropping_lines() {
    let bridge = Bridge::new(BridgeConfig::new());
    bridge.start(scripted_engine()).unwrap();

    bridge.send("uci");
    let lines = read_until(&bridge, "uciok");

    assert_eq!(
        lines,
        vec![
            "Scripted 1.0 by the test suite",
            "id name Scripted 1.0",
            "id author the test suite",
            "",
            "option name Skill Level type spin default 20 min 0 max 20",
            "uciok",
        ]
    );

    bridge.send("isready");
    assert_eq!(bridge.read_line(), "readyok");
    assert_eq!(bridge.shutdown().unwrap(), EngineStatus::Exited);
}

#[test]
fn queued_commands_answer_in_order() {
    let bridge = Bridge::new(BridgeConfig::new());
    bridge.start(scripted_engine()).unwrap();

    // Everything is sent before the engine has produced any response.
    bridge.send("isready");
    bridge.send("position startpos moves e2e4");
    bridge.send("go depth 3");
    bridge.send("isready");

    assert_eq!(bridge.read_line(), "Scripted 1.0 by the test suite");
    assert_eq!(bridge.read_line(), "readyok");
    let search = read_until(&bridge, "bestmove e2e4 ponder e7e5");
    assert_eq!(
        search,
        vec![
            "info depth 1 score cp 10 pv e2e4",
            "info depth 2 score cp 20 pv e2e4",
            "info depth 3 score cp 30 pv e2e4",
            "bestmove e2e4 ponder e7e5",
        ]
    );
    assert_eq!(bridge.read_line(), "readyok");
}

#[test]
fn engine_error_closes_output() {
    let bridge = Bridge::new(BridgeConfig::new());
    bridge.start(scripted_engine()).unwrap();

    assert_eq!(bridge.read_line(), "Scripted 1.0 by the test suite");
    bridge.send("go depth lots");

    assert_eq!(bridge.read_outcome(), ReadOutcome::Closed);
    assert_eq!(bridge.read_line(), "");
    assert_eq!(bridge.shutdown().unwrap(), EngineStatus::Failed);
    assert_eq!(bridge.engine_error().as_deref(), Some("bad depth lots"));
    assert_eq!(bridge.state(), BridgeState::Stopped);
}
