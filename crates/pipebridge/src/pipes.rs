//! Pipe allocation and standard descriptor rebinding.
//!
//! The engine reads commands from the read end of the input pipe and writes
//! responses to the write end of the output pipe. The bridge keeps the other
//! two ends. In process-wide mode the engine's ends are duplicated onto fd 0
//! and fd 1, so an engine that hardcodes console access talks to the pipes.
//!
//! Process-wide rebinding is global: after [`StdioRedirect::install`] any code
//! in the process that writes to stdout is captured into the output pipe.
//! Only Rust's `io::stdout()` buffer is flushed before the rebind. Output a C
//! host or engine left pending in libc's `stdout` `FILE*` is flushed after
//! it, into the pipe, and reads back as engine output; such hosts should call
//! `fflush(stdout)` before starting the engine.
//!
//! ## Safety contracts
//!
//! All `unsafe` blocks in this module rely on these guarantees:
//! 1. Standard fds (0, 1) are open at process startup and stay open
//! 2. The redirect is installed before the engine thread starts
//! 3. Temporary `OwnedFd`s built over standard fds are forgotten after `dup2`,
//!    so this module never closes fd 0 or fd 1 itself

use std::io::{self, Write};
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use nix::unistd::{dup, dup2, pipe};

use crate::error::BridgeError;

pub const STDIN_FD: RawFd = 0;
pub const STDOUT_FD: RawFd = 1;

/// One unidirectional OS pipe.
#[derive(Debug)]
pub struct PipePair {
    pub read: OwnedFd,
    pub write: OwnedFd,
}

/// Allocate one pipe.
///
/// Fails with [`BridgeError::ResourceExhausted`] when the descriptor table is
/// full.
pub fn create_pipe_pair() -> Result<PipePair, BridgeError> {
    let (read, write) = pipe().map_err(|e| BridgeError::ResourceExhausted(e.into()))?;
    tracing::trace!(
        read = read.as_raw_fd(),
        write = write.as_raw_fd(),
        "Created pipe pair"
    );
    Ok(PipePair { read, write })
}

/// Both pipe pairs, split by owner.
#[derive(Debug)]
pub struct EnginePipes {
    /// Read end of the input pipe, becomes the engine's stdin.
    pub engine_stdin: OwnedFd,
    /// Write end of the output pipe, becomes the engine's stdout.
    pub engine_stdout: OwnedFd,
    /// Write end of the input pipe, kept by the bridge for commands.
    pub commands: OwnedFd,
    /// Read end of the output pipe, kept by the bridge for responses.
    pub responses: OwnedFd,
}

impl EnginePipes {
    pub fn allocate() -> Result<Self, BridgeError> {
        let input = create_pipe_pair()?;
        let output = create_pipe_pair()?;
        Ok(Self {
            engine_stdin: input.read,
            engine_stdout: output.write,
            commands: input.write,
            responses: output.read,
        })
    }
}

/// Process-wide stdin/stdout rebinding.
///
/// Holds duplicates of the original descriptors; dropping (or calling
/// [`restore`](Self::restore)) puts them back. Restoring stdout closes the
/// process's copy of the output pipe's write end.
#[derive(Debug)]
pub struct StdioRedirect {
    saved_stdin: Option<OwnedFd>,
    saved_stdout: Option<OwnedFd>,
}

impl StdioRedirect {
    /// Rebind fd 0 to `stdin_src` and fd 1 to `stdout_src`.
    ///
    /// CRITICAL: must run before the engine thread starts so its first read
    /// and write already target the pipes.
    pub fn install(stdin_src: &OwnedFd, stdout_src: &OwnedFd) -> Result<Self, BridgeError> {
        // Anything still buffered belongs on the real console. libc's own
        // stdout buffer is out of reach here, see the module docs.
        io::stdout().flush()?;

        let saved_stdin = dup_standard(STDIN_FD, "stdin")?;
        let saved_stdout = dup_standard(STDOUT_FD, "stdout")?;
        tracing::trace!(
            saved_stdin = saved_stdin.as_raw_fd(),
            saved_stdout = saved_stdout.as_raw_fd(),
            "Duped original standard fds"
        );

        // From here a failed step drops `redirect`, which rolls back.
        let redirect = Self {
            saved_stdin: Some(saved_stdin),
            saved_stdout: Some(saved_stdout),
        };
        rebind(stdin_src, STDIN_FD, "stdin")?;
        rebind(stdout_src, STDOUT_FD, "stdout")?;

        tracing::debug!("Standard input/output redirected to engine pipes");
        Ok(redirect)
    }

    /// Put the original stdin/stdout back.
    pub fn restore(mut self) -> Result<(), BridgeError> {
        self.restore_saved()
    }

    fn restore_saved(&mut self) -> Result<(), BridgeError> {
        // Engine output still sitting in the std buffer goes to the pipe.
        let _ = io::stdout().flush();

        if let Some(fd) = self.saved_stdout.take() {
            rebind(&fd, STDOUT_FD, "stdout")?;
        }
        if let Some(fd) = self.saved_stdin.take() {
            rebind(&fd, STDIN_FD, "stdin")?;
        }
        tracing::debug!("Standard input/output restored");
        Ok(())
    }
}

impl Drop for StdioRedirect {
    fn drop(&mut self) {
        if let Err(e) = self.restore_saved() {
            tracing::error!(error = %e, "Failed to restore standard descriptors");
        }
    }
}

fn dup_standard(fd: RawFd, stream: &'static str) -> Result<OwnedFd, BridgeError> {
    // Safety: standard fds are open for the life of the process.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    dup(borrowed).map_err(|e| BridgeError::redirect(stream, e))
}

/// `dup2(src, target)` without taking ownership of `target`.
fn rebind(src: &OwnedFd, target: RawFd, stream: &'static str) -> Result<(), BridgeError> {
    // Safety: target is open; the temporary is forgotten below, never closed.
    let mut target_fd = unsafe { OwnedFd::from_raw_fd(target) };
    let result = dup2(src, &mut target_fd);
    std::mem::forget(target_fd);
    result.map_err(|e| BridgeError::redirect(stream, e))
}
