//! Transport layer.
//!
//! A [`Transport`] is a bidirectional byte stream to a login shell on a
//! bench machine. [`SshTransport`] is the real one; tests drive the
//! session through a scripted in-memory shell instead.

pub mod config;
mod ssh;

#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;

pub use config::{AuthMethod, HostKeyVerification, SshConfig, resolve_host};
pub use ssh::SshTransport;

use crate::error::Result;

/// Byte stream to an interactive shell.
pub trait Transport: Send {
    /// Write raw bytes to the shell.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next chunk of output.
    ///
    /// Returns `None` once the remote side has closed the stream.
    fn read(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Tear the connection down.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}
