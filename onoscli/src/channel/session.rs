//! Expect-style session over a transport.

use std::time::Duration;

use log::trace;
use regex::bytes::Regex;
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use crate::error::{ChannelError, Result};
use crate::transport::Transport;

/// Outcome of waiting for a set of patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect {
    /// One of the patterns matched.
    Matched {
        /// Position of the matching pattern in the list.
        index: usize,
        /// Output preceding the match.
        before: String,
        /// The matched text.
        after: String,
    },

    /// Nothing matched in time. `before` holds whatever had arrived.
    Timeout { before: String },
}

impl Expect {
    /// Index of the matched pattern, `None` on timeout.
    pub fn index(&self) -> Option<usize> {
        match self {
            Expect::Matched { index, .. } => Some(*index),
            Expect::Timeout { .. } => None,
        }
    }

    /// Output captured before the match (or before giving up).
    pub fn before(&self) -> &str {
        match self {
            Expect::Matched { before, .. } | Expect::Timeout { before } => before,
        }
    }
}

/// Interactive session: writes lines, waits for prompts.
pub struct Session<T> {
    transport: T,
    buffer: PatternBuffer,
    alive: bool,
}

impl<T: Transport> Session<T> {
    /// Wrap a connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(),
            alive: true,
        }
    }

    /// Send a line followed by a newline.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        trace!("send: {:?}", line);
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.transport.write(&data).await
    }

    /// Send bytes as-is (control characters).
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        trace!("send raw: {:?}", data);
        self.transport.write(data).await
    }

    /// Wait until one of `patterns` appears or `timeout` elapses.
    ///
    /// The earliest match in the output wins. Everything through the end
    /// of the match is consumed. On timeout the buffer is drained into
    /// [`Expect::Timeout`]. If the stream ends first the session is marked
    /// dead and [`ChannelError::EndOfStream`] is returned.
    pub async fn expect(&mut self, patterns: &[&Regex], timeout: Duration) -> Result<Expect> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(found) = self.buffer.first_match(patterns) {
                let (before, after) = self.buffer.consume(found);
                return Ok(Expect::Matched {
                    index: found.index,
                    before: String::from_utf8_lossy(&before).into_owned(),
                    after: String::from_utf8_lossy(&after).into_owned(),
                });
            }

            match tokio::time::timeout_at(deadline, self.transport.read()).await {
                Ok(Ok(Some(chunk))) => {
                    trace!("recv: {:?}", String::from_utf8_lossy(&chunk));
                    self.buffer.extend(&chunk);
                }
                Ok(Ok(None)) => {
                    self.alive = false;
                    return Err(ChannelError::EndOfStream {
                        before: self.drain(),
                    }
                    .into());
                }
                Ok(Err(e)) => {
                    self.alive = false;
                    return Err(e);
                }
                Err(_) => {
                    return Ok(Expect::Timeout {
                        before: self.drain(),
                    });
                }
            }
        }
    }

    /// Discard and return whatever is buffered.
    pub fn drain(&mut self) -> String {
        String::from_utf8_lossy(&self.buffer.take()).into_owned()
    }

    /// False once the remote side closed the stream.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Close the underlying transport.
    pub async fn close(self) -> Result<()> {
        self.transport.close().await
    }
}
