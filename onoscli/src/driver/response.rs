//! Response type for console command results.

use std::time::Duration;

use crate::error::{CommandError, Result};

/// The universal failure marker in console output.
pub const ERROR_MARKER: &str = "Error";

/// Response from a console command.
#[derive(Debug, Clone)]
pub struct Response {
    /// The command that was executed.
    pub command: String,

    /// The cleaned output (escape codes, echo and line noise removed).
    pub result: String,

    /// The raw output before cleaning.
    pub raw_result: String,

    /// The prompt that was matched at the end (empty when degraded).
    pub prompt: String,

    /// Time taken to execute the command.
    pub elapsed: Duration,

    /// The prompt never came back; `result` is whatever had arrived.
    pub degraded: bool,
}

impl Response {
    /// Create a complete response.
    pub fn new(
        command: impl Into<String>,
        result: impl Into<String>,
        raw_result: impl Into<String>,
        prompt: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            result: result.into(),
            raw_result: raw_result.into(),
            prompt: prompt.into(),
            elapsed,
            degraded: false,
        }
    }

    /// Create a response for a command whose prompt never came back.
    pub fn degraded(
        command: impl Into<String>,
        result: impl Into<String>,
        raw_result: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            result: result.into(),
            raw_result: raw_result.into(),
            prompt: String::new(),
            elapsed,
            degraded: true,
        }
    }

    /// Whether the output carries the `Error` marker (case-sensitive).
    pub fn has_error_marker(&self) -> bool {
        self.result.contains(ERROR_MARKER)
    }

    /// Fail if the prompt never came back.
    pub fn complete(self) -> Result<Self> {
        if self.degraded {
            return Err(CommandError::Degraded {
                command: self.command,
                output: self.result,
            }
            .into());
        }
        Ok(self)
    }

    /// Fail if degraded or if the output carries the `Error` marker.
    pub fn ensure_ok(self) -> Result<Self> {
        let response = self.complete()?;
        if response.has_error_marker() {
            log::error!("'{}' failed: {}", response.command, response.result);
            return Err(CommandError::ErrorMarker {
                command: response.command,
                output: response.result,
            }
            .into());
        }
        Ok(response)
    }

    /// Get the result lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.result.lines()
    }

    /// Check if the result contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.result.contains(pattern)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.result)
    }
}
