//! Console state machine.
//!
//! A bench session sits either at the machine's shell (`$`) or inside the
//! ONOS console (`onos>`). Entering the console goes through `onos -w`,
//! which waits for the controller to come up and is known to hang now and
//! then; it gets exactly one interrupt-and-retry.

use std::fmt;

use log::{debug, error, info, warn};
use regex::bytes::Regex;

use super::onos::OnosCliDriver;
use crate::channel::Expect;
use crate::error::{ChannelError, DriverError, Result};
use crate::transport::Transport;

/// Which prompt the session is at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleState {
    /// Not probed yet, or the last wait timed out.
    #[default]
    Unknown,
    /// The bench machine's shell.
    Outer,
    /// The ONOS console.
    Inner,
}

impl fmt::Display for ConsoleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleState::Unknown => write!(f, "unknown"),
            ConsoleState::Outer => write!(f, "shell"),
            ConsoleState::Inner => write!(f, "console"),
        }
    }
}

impl<T: Transport> OnosCliDriver<T> {
    /// Resynchronise with the session and see which prompt answers.
    ///
    /// Writes `echo <marker>` and discards everything up to the marker's
    /// output, so late output of a timed-out command is never taken for a
    /// prompt or for the answer to the next command.
    pub async fn probe(&mut self) -> Result<ConsoleState> {
        self.sync_markers += 1;
        let marker = format!("onoscli-sync-{}", self.sync_markers);
        let echoed = Regex::new(&format!(r"(?m)^{}\r*\n", regex::escape(&marker))).map_err(ChannelError::from)?;
        let probe = self.settings.timeouts.probe;
        let inner = self.prompts.inner.clone();
        let outer = self.prompts.outer.clone();
        let name = self.settings.name.clone();
        let session = self.session_mut()?;

        session.send_line(&format!("echo {}", marker)).await?;
        let state = match session.expect(&[&echoed], probe).await? {
            Expect::Matched { before, .. } => {
                debug!("{}: skipped before {}: {:?}", name, marker, before);
                match session.expect(&[&inner, &outer], probe).await? {
                    Expect::Matched { index: 0, .. } => ConsoleState::Inner,
                    Expect::Matched { .. } => ConsoleState::Outer,
                    Expect::Timeout { before } => {
                        warn!("{}: no prompt after {}: {:?}", name, marker, before);
                        ConsoleState::Unknown
                    }
                }
            }
            Expect::Timeout { before } => {
                warn!("{}: no answer to {}: {:?}", name, marker, before);
                ConsoleState::Unknown
            }
        };
        self.state = state;
        Ok(state)
    }

    /// Which prompt the session is at right now.
    ///
    /// A known state is confirmed with a blank line; an unknown one goes
    /// through [`probe`](Self::probe).
    async fn current_prompt(&mut self) -> Result<ConsoleState> {
        if self.state == ConsoleState::Unknown {
            return self.probe().await;
        }

        let probe = self.settings.timeouts.probe;
        let inner = self.prompts.inner.clone();
        let outer = self.prompts.outer.clone();
        let name = self.settings.name.clone();
        let session = self.session_mut()?;

        session.send_line("").await?;
        let state = match session.expect(&[&inner, &outer], probe).await? {
            Expect::Matched { index: 0, .. } => ConsoleState::Inner,
            Expect::Matched { .. } => ConsoleState::Outer,
            Expect::Timeout { before } => {
                warn!("{}: no prompt answered a blank line: {:?}", name, before);
                ConsoleState::Unknown
            }
        };
        self.state = state;
        Ok(state)
    }

    /// Enter the ONOS console for the controller at `address`.
    ///
    /// Does nothing if the console is already up. With `idle_timeout` the
    /// Karaf SSH idle timeout is changed after entering, which restarts the
    /// console, and the console is entered again.
    pub async fn start_onos_cli(&mut self, address: &str, idle_timeout: Option<&str>) -> Result<()> {
        let timeouts = self.settings.timeouts;
        let inner = self.prompts.inner.clone();
        let outer = self.prompts.outer.clone();

        match self.current_prompt().await? {
            ConsoleState::Inner => {
                info!("{}: ONOS cli is already running", self.settings.name);
                self.console_address = Some(address.to_string());
                return Ok(());
            }
            ConsoleState::Outer => {}
            ConsoleState::Unknown => {
                error!("{}: no prompt before starting the console", self.settings.name);
                return Err(ChannelError::PatternTimeout(timeouts.probe).into());
            }
        }

        self.launch_console(address).await?;

        if let Some(idle_timeout) = idle_timeout {
            let session = self.session_mut()?;
            session
                .send_line(&format!(
                    "config:property-set -p org.apache.karaf.shell sshIdleTimeout {}",
                    idle_timeout
                ))
                .await?;
            // The console restarts and drops us at the shell
            if session.expect(&[&outer], timeouts.command).await?.index().is_none() {
                self.state = ConsoleState::Unknown;
                error!("{}: console did not restart after idle timeout change", self.settings.name);
                return Err(DriverError::ConsoleStartFailed {
                    address: address.to_string(),
                }
                .into());
            }

            session.send_line(&format!("onos -w {}", address)).await?;
            if session.expect(&[&inner], timeouts.console_start).await?.index().is_none() {
                self.state = ConsoleState::Unknown;
                error!("{}: could not re-enter the console", self.settings.name);
                return Err(DriverError::ConsoleStartFailed {
                    address: address.to_string(),
                }
                .into());
            }
        }

        self.state = ConsoleState::Inner;
        self.console_address = Some(address.to_string());
        info!("{}: ONOS cli started for {}", self.settings.name, address);
        Ok(())
    }

    /// Run `onos -w`, interrupting and retrying once if it hangs.
    async fn launch_console(&mut self, address: &str) -> Result<()> {
        let timeouts = self.settings.timeouts;
        let inner = self.prompts.inner.clone();
        let name = self.settings.name.clone();
        let launch = format!("onos -w {}", address);
        let session = self.session_mut()?;

        session.send_line(&launch).await?;
        if session.expect(&[&inner], timeouts.console_start).await?.index().is_some() {
            return Ok(());
        }

        warn!(
            "{}: console did not start within {:?}, interrupting and retrying",
            name, timeouts.console_start
        );
        session.send_raw(b"\x03").await?;
        session.send_line(&launch).await?;
        match session.expect(&[&inner], timeouts.console_retry).await? {
            Expect::Matched { .. } => Ok(()),
            Expect::Timeout { before } => {
                self.state = ConsoleState::Unknown;
                error!("{}: failed to start ONOS cli: {:?}", name, before);
                Err(DriverError::ConsoleStartFailed {
                    address: address.to_string(),
                }
                .into())
            }
        }
    }

    /// Leave the console.
    ///
    /// Returns `Ok(true)` once at the shell prompt (including when the
    /// console was not running) and `Ok(false)` when no prompt answered.
    pub async fn logout(&mut self) -> Result<bool> {
        let timeouts = self.settings.timeouts;
        let outer = self.prompts.outer.clone();
        let name = self.settings.name.clone();

        match self.current_prompt().await? {
            ConsoleState::Inner => {
                let session = self.session_mut()?;
                session.send_line("logout").await?;
                if session.expect(&[&outer], timeouts.command).await?.index().is_some() {
                    self.state = ConsoleState::Outer;
                    Ok(true)
                } else {
                    self.state = ConsoleState::Unknown;
                    error!("{}: no shell prompt after logout", name);
                    Ok(false)
                }
            }
            ConsoleState::Outer => Ok(true),
            ConsoleState::Unknown => {
                error!("{}: logout got no prompt, session state unknown", name);
                Ok(false)
            }
        }
    }

    /// Bring the session into the console before sending `command`.
    pub(super) async fn ensure_console(&mut self, command: &str) -> Result<()> {
        if self.state == ConsoleState::Unknown {
            self.probe().await?;
        }
        match self.state {
            ConsoleState::Inner => Ok(()),
            ConsoleState::Outer => self.recover_console(command).await,
            ConsoleState::Unknown => {
                error!("{}: session state unknown, not sending '{}'", self.settings.name, command);
                Err(ChannelError::PatternTimeout(self.settings.timeouts.probe).into())
            }
        }
    }

    /// Re-enter the console at the last known address.
    pub(super) async fn recover_console(&mut self, command: &str) -> Result<()> {
        let Some(address) = self.console_address.clone() else {
            error!(
                "{}: at the shell prompt with no console to return to, not sending '{}'",
                self.settings.name, command
            );
            return Err(DriverError::ConsoleLost {
                command: command.to_string(),
            }
            .into());
        };

        warn!("{}: console lost, entering it again for '{}'", self.settings.name, command);
        match self.start_onos_cli(&address, None).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!("{}: could not re-enter the console: {}", self.settings.name, e);
                Err(DriverError::ConsoleLost {
                    command: command.to_string(),
                }
                .into())
            }
        }
    }
}
