//! Error types for onoscli.
//!
//! Errors are layered the same way the driver is: transport, channel,
//! driver (session/console state) and command (controller responses).
//! [`Error::is_fatal`] decides which of them must abort a whole test run.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::commands::AppState;

/// Main error type for onoscli operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Controller command errors
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

impl Error {
    /// Whether this error leaves the session unusable for the rest of the run.
    ///
    /// Connection problems and end-of-stream are fatal. Timeouts, console
    /// state problems and controller-side failures are not: the caller gets
    /// a typed failure and decides what to do with it.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Channel(ChannelError::EndOfStream { .. }) => true,
            Error::Channel(ChannelError::Ssh(_)) => true,
            Error::Channel(_) => false,
            Error::Driver(_) => false,
            Error::Command(_) => false,
        }
    }

    /// Whether this error is a prompt wait that ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Channel(ChannelError::PatternTimeout(_)) | Error::Transport(TransportError::Timeout(_))
        )
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// The server presented a key that differs from known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// The server is not in known_hosts and strict checking is on
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// The shell never showed its prompt after login
    #[error("No shell prompt from {host} after login")]
    NoInitialPrompt { host: String },

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (pattern matching on the shell stream).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Pattern matching timed out
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(Duration),

    /// The remote process went away while we were waiting for output
    #[error("End of stream; last output: {before:?}")]
    EndOfStream { before: String },

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Driver layer errors (session and console state).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Driver not connected
    #[error("Driver not connected - call connect() first")]
    NotConnected,

    /// Driver already connected
    #[error("Driver already connected")]
    AlreadyConnected,

    /// The console could not be entered, even after the retry
    #[error("Failed to start the ONOS console for {address}")]
    ConsoleStartFailed { address: String },

    /// The session fell out of the console and could not be brought back
    #[error("Console session lost while sending '{command}'")]
    ConsoleLost { command: String },

    /// The echoed command was not found in the captured output
    #[error("Echo of '{command}' not found in output {output:?}")]
    EchoNotFound { command: String, output: String },

    /// Arguments rejected before anything was sent
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl DriverError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        DriverError::InvalidInput {
            message: message.into(),
        }
    }
}

/// Errors derived from what the controller answered.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The response carries the `Error` marker
    #[error("'{command}' failed: {output}")]
    ErrorMarker { command: String, output: String },

    /// The response matched none of the expected forms
    #[error("Unexpected response to '{command}': {output:?}")]
    UnexpectedResponse { command: String, output: String },

    /// The command succeeded but no `id=0x...,` was in the response
    #[error("Intent id not found in response to '{command}': {output:?}")]
    IntentIdNotFound { command: String, output: String },

    /// Store/leadership error that survived the retry
    #[error("'{command}' kept failing with a store error: {output}")]
    Transient { command: String, output: String },

    /// The controller does not know the command (app not loaded)
    #[error("'{command}' is not installed on the controller")]
    NotInstalled { command: String },

    /// The application is in a state the action cannot start from
    #[error("Cannot {action} application '{app}' while it is {from}")]
    InvalidTransition {
        app: String,
        from: AppState,
        action: &'static str,
    },

    /// A polled condition was not reached
    #[error("{what} not reached after {attempts} attempts")]
    NotConverged { what: String, attempts: u32 },

    /// The response was not the JSON we expected
    #[error("Bad JSON from '{command}': {source}")]
    Json {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    /// The prompt never came back; partial output attached
    #[error("No prompt after '{command}', partial output: {output:?}")]
    Degraded { command: String, output: String },
}

/// Result type alias using onoscli's Error.
pub type Result<T> = std::result::Result<T, Error>;
