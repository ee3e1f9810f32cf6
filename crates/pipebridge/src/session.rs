//! Async line session on top of a started [`Bridge`].
//!
//! Two blocking tasks do the I/O so the runtime's workers never block on the
//! pipes:
//! - writer: drains the command queue into `Bridge::send`
//! - listener: reads the bridge and forwards lines into a bounded channel
//!   (backpressure when the consumer falls behind)
//!
//! A listener blocked in a read only notices cancellation after the engine
//! writes its next line or closes its output. That line is handed back to the
//! bridge, so direct reads after `close` miss nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::{Bridge, Delivery};
use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Capacity of the output channel.
    pub capacity: usize,
    /// Drop lines that are empty or whitespace only.
    pub skip_blank: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            skip_blank: true,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_skip_blank(mut self, skip_blank: bool) -> Self {
        self.skip_blank = skip_blank;
        self
    }
}

pub struct LineSession {
    commands: mpsc::UnboundedSender<String>,
    lines: mpsc::Receiver<String>,
    cancel: CancellationToken,
    writer: JoinHandle<()>,
    listener: JoinHandle<()>,
}

impl LineSession {
    /// Attach with default settings. Must be called inside a tokio runtime.
    pub fn attach(bridge: Arc<Bridge>) -> Self {
        Self::attach_with(bridge, SessionConfig::default())
    }

    pub fn attach_with(bridge: Arc<Bridge>, config: SessionConfig) -> Self {
        let cancel = CancellationToken::new();
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<String>();
        let (line_tx, line_rx) = mpsc::channel::<String>(config.capacity.max(1));

        let writer_bridge = Arc::clone(&bridge);
        let writer = tokio::task::spawn_blocking(move || {
            while let Some(command) = command_rx.blocking_recv() {
                tracing::debug!(command = %command, "Engine input");
                writer_bridge.send(&command);
            }
        });

        let listener_cancel = cancel.clone();
        let listener = tokio::task::spawn_blocking(move || {
            while !listener_cancel.is_cancelled() {
                let delivery = bridge.deliver_line(|line| {
                    // Cancelled while blocked in the read: leave the line for
                    // whoever reads the bridge next.
                    if listener_cancel.is_cancelled() {
                        return Err(line);
                    }
                    let text = String::from_utf8_lossy(&line).into_owned();
                    if config.skip_blank && text.trim().is_empty() {
                        return Ok(());
                    }
                    tracing::debug!(line = %text, "Engine output");
                    line_tx.blocking_send(text).map_err(|_| line)
                });
                if delivery != Delivery::Delivered {
                    break;
                }
            }
            tracing::debug!("Engine output listener stopped");
        });

        Self {
            commands: command_tx,
            lines: line_rx,
            cancel,
            writer,
            listener,
        }
    }

    /// Queue one command. Never blocks.
    pub fn send(&self, command: impl Into<String>) -> Result<(), SessionError> {
        self.commands
            .send(command.into())
            .map_err(|_| SessionError::Closed)
    }

    /// Next output line, `None` once the listener has stopped and the channel
    /// is drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Next output line, waiting at most `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<String, SessionError> {
        match tokio::time::timeout(timeout, self.lines.recv()).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(SessionError::Closed),
            Err(_) => Err(SessionError::Timeout(timeout)),
        }
    }

    /// Collect every line up to and including the first one matching `done`.
    ///
    /// `timeout` bounds the wait for each individual line.
    pub async fn wait_for(
        &mut self,
        mut done: impl FnMut(&str) -> bool,
        timeout: Duration,
    ) -> Result<Vec<String>, SessionError> {
        let mut collected = Vec::new();
        loop {
            let line = self.recv_timeout(timeout).await?;
            let finished = done(&line);
            collected.push(line);
            if finished {
                return Ok(collected);
            }
        }
    }

    pub fn is_listening(&self) -> bool {
        !self.listener.is_finished()
    }

    pub fn is_writing(&self) -> bool {
        !self.writer.is_finished()
    }

    /// Stop both tasks. Does not stop the engine; queued commands are still
    /// delivered.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for LineSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
