//! Command side of the bridge.

use std::io::{self, BufWriter, Write};

/// Line terminator appended to every command.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Writes one command per line and flushes immediately.
///
/// Commands pass through verbatim: no escaping, validation or length limit.
/// A command that already contains a terminator reaches the engine as more
/// than one line.
pub struct CommandWriter<W: Write> {
    inner: BufWriter<W>,
}

impl<W: Write> CommandWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
        }
    }

    /// Write `command` plus exactly one terminator, then flush.
    ///
    /// Blocks only if the pipe buffer is full.
    pub fn send(&mut self, command: &[u8]) -> io::Result<()> {
        self.inner.write_all(command)?;
        self.inner.write_all(&[LINE_TERMINATOR])?;
        self.inner.flush()?;
        tracing::trace!(command_len = command.len(), "Sent command");
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        self.inner.get_ref()
    }
}
