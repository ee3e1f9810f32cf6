//! Response side of the bridge.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};

use crate::writer::LINE_TERMINATOR;

/// Result of one read attempt on the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One line with its terminator stripped.
    Line(Vec<u8>),
    /// The bridge has not been started; nothing was read.
    NotStarted,
    /// The engine's output is closed (or failed) and fully drained.
    Closed,
}

impl ReadOutcome {
    /// The line as text, empty for every non-line outcome.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn into_text(self) -> String {
        match self {
            ReadOutcome::Line(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            },
            ReadOutcome::NotStarted | ReadOutcome::Closed => String::new(),
        }
    }

    pub fn is_line(&self) -> bool {
        matches!(self, ReadOutcome::Line(_))
    }
}

/// Blocking line reader with a growable buffer.
///
/// Bytes accumulate until a terminator arrives, so long lines are never split
/// across calls. Once the source reports end of input or an error the reader
/// stays exhausted and returns `None` without touching the source again.
///
/// Lines handed back with [`unread`](Self::unread) or collected by
/// [`buffer_to_end`](Self::buffer_to_end) are returned before the source is
/// read again.
pub struct LineReader<R: Read> {
    inner: BufReader<R>,
    pending: VecDeque<Vec<u8>>,
    exhausted: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next line without its terminator, or `None` once the source is closed.
    ///
    /// Blocks until a full line (or end of input) is available. A trailing
    /// fragment without terminator is returned as the last line.
    pub fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if let Some(line) = self.pending.pop_front() {
            return Ok(Some(line));
        }
        self.read_source()
    }

    fn read_source(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut line = Vec::new();
        match self.inner.read_until(LINE_TERMINATOR, &mut line) {
            Ok(0) => {
                self.exhausted = true;
                tracing::debug!("Engine output closed");
                Ok(None)
            }
            Ok(n) => {
                if line.last() == Some(&LINE_TERMINATOR) {
                    line.pop();
                }
                tracing::trace!(line_len = n, "Read engine line");
                Ok(Some(line))
            }
            Err(e) => {
                self.exhausted = true;
                Err(e)
            }
        }
    }

    /// Put a line back; it becomes the next one returned.
    pub fn unread(&mut self, line: Vec<u8>) {
        self.pending.push_front(line);
    }

    /// Read the source until it closes, keeping every line for later reads.
    ///
    /// Keeps the writer side from stalling on a full pipe while the caller
    /// waits for it to finish. Returns the number of lines buffered.
    pub fn buffer_to_end(&mut self) -> io::Result<usize> {
        let mut buffered = 0;
        while let Some(line) = self.read_source()? {
            self.pending.push_back(line);
            buffered += 1;
        }
        Ok(buffered)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
