//! The ONOS CLI driver: session ownership and the command/response protocol.

use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::time::Instant;

use super::builder::{Settings, Timeouts};
use super::console::ConsoleState;
use super::normalize::{clean_response, strip_noise};
use super::response::Response;
use crate::channel::{Expect, Prompts, Session};
use crate::error::{ChannelError, DriverError, Result, TransportError};
use crate::poll::PollPolicy;
use crate::transport::config::{SshConfig, resolve_host};
use crate::transport::{SshTransport, Transport};

/// Driver for one bench machine and the ONOS console reachable from it.
///
/// All commands on one driver run strictly one after another. Drive
/// several nodes concurrently by giving each its own driver.
pub struct OnosCliDriver<T = SshTransport> {
    pub(super) settings: Settings,
    pub(super) prompts: Prompts,
    pub(super) session: Option<Session<T>>,
    pub(super) state: ConsoleState,
    /// Controller address of the last successful console entry.
    pub(super) console_address: Option<String>,
    /// Sync markers sent so far.
    pub(super) sync_markers: u64,
    ssh_config: Option<SshConfig>,
}

impl<T: Transport> OnosCliDriver<T> {
    pub(crate) fn new(settings: Settings, prompts: Prompts, ssh_config: Option<SshConfig>) -> Self {
        Self {
            settings,
            prompts,
            session: None,
            state: ConsoleState::Unknown,
            console_address: None,
            sync_markers: 0,
            ssh_config,
        }
    }

    /// Take over a connected transport: wait for the login prompt, then
    /// change into the home directory.
    pub async fn attach(&mut self, transport: T) -> Result<()> {
        if self.session.is_some() {
            return Err(DriverError::AlreadyConnected.into());
        }

        let mut session = Session::new(transport);
        let timeouts = self.settings.timeouts;

        let login = session.expect(&[&self.prompts.outer], timeouts.connect).await?;
        if login.index().is_none() {
            error!("{}: no shell prompt after login: {:?}", self.name(), login.before());
            return Err(TransportError::NoInitialPrompt {
                host: self.name().to_string(),
            }
            .into());
        }

        session.send_line(&format!("cd {}", self.settings.home)).await?;
        let cd = session.expect(&[&self.prompts.outer], timeouts.command).await?;
        if cd.index().is_none() {
            return Err(TransportError::NoInitialPrompt {
                host: self.name().to_string(),
            }
            .into());
        }

        info!("{}: connected, working in {}", self.name(), self.settings.home);
        self.session = Some(session);
        self.state = ConsoleState::Outer;
        Ok(())
    }

    /// The name this driver logs under.
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// The driver's timing knobs.
    pub fn timeouts(&self) -> &Timeouts {
        &self.settings.timeouts
    }

    /// How application state changes are polled.
    pub fn app_poll(&self) -> PollPolicy {
        self.settings.app_poll
    }

    /// Which prompt the session was last seen at.
    pub fn console_state(&self) -> ConsoleState {
        self.state
    }

    /// Whether a session is attached.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the session is attached and the stream has not ended.
    pub fn is_alive(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_alive())
    }

    pub(super) fn session_mut(&mut self) -> Result<&mut Session<T>> {
        self.session
            .as_mut()
            .ok_or_else(|| DriverError::NotConnected.into())
    }

    /// Close the transport without logging out first.
    pub async fn close(&mut self) -> Result<()> {
        self.state = ConsoleState::Unknown;
        if let Some(session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }

    /// Leave the console, exit the shell and close the connection.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.session.is_none() {
            return Ok(());
        }

        if !self.logout().await? {
            warn!("{}: could not confirm logout before disconnecting", self.name());
        }

        let timeouts = self.settings.timeouts;
        let outer = self.prompts.outer.clone();
        let closed = self.prompts.closed.clone();
        let session = self.session_mut()?;

        session.send_line("").await?;
        session.expect(&[&outer], timeouts.probe).await?;
        session.send_line("exit").await?;
        match session.expect(&[&closed], timeouts.probe).await {
            Ok(_) | Err(crate::Error::Channel(ChannelError::EndOfStream { .. })) => {}
            Err(e) => return Err(e),
        }

        info!("{}: disconnected", self.name());
        self.close().await
    }

    /// Send a console command and return its cleaned output.
    pub async fn send(&mut self, command: &str) -> Result<Response> {
        let timeout = self.settings.timeouts.command;
        self.send_with_timeout(command, timeout).await
    }

    /// Send a console command with a specific prompt timeout.
    ///
    /// If the session is found at the shell prompt, the console is entered
    /// again (once) and the command resent. If the prompt does not come back
    /// in time, the partial output is returned as a degraded response and
    /// the next command probes the prompt first.
    pub async fn send_with_timeout(&mut self, command: &str, timeout: Duration) -> Result<Response> {
        if self.settings.mirror_commands {
            let quoted = command.replace('\\', "\\\\").replace('"', "\\\"");
            let note = format!("log:log \"Sending CLI command: '{}'\"", quoted);
            let mirrored = self.deliver(&note, timeout).await?;
            if mirrored.degraded || mirrored.has_error_marker() {
                warn!("{}: could not record command in controller log", self.name());
            }
        }
        self.deliver(command, timeout).await
    }

    /// Send arbitrary text to the console and return the cleaned output.
    pub async fn send_raw_line(&mut self, line: &str) -> Result<Response> {
        self.send(line).await?.complete()
    }

    /// Make sure the console is up, send, and retry once after a drop.
    async fn deliver(&mut self, command: &str, timeout: Duration) -> Result<Response> {
        self.ensure_console(command).await?;

        info!("{}: sending '{}'", self.name(), command);
        if let Exchange::Answered(response) = self.exchange(command, timeout).await? {
            return Ok(response);
        }

        // Never reached the controller
        self.recover_console(command).await?;
        info!("{}: resending '{}'", self.name(), command);
        match self.exchange(command, timeout).await? {
            Exchange::Answered(response) => Ok(response),
            Exchange::Shell => Err(DriverError::ConsoleLost {
                command: command.to_string(),
            }
            .into()),
        }
    }

    /// Write `command`, wait for a prompt and clean the output.
    async fn exchange(&mut self, command: &str, timeout: Duration) -> Result<Exchange> {
        let start = Instant::now();
        let inner = self.prompts.inner.clone();
        let outer = self.prompts.outer.clone();
        let name = self.settings.name.clone();
        let session = self.session_mut()?;

        session.send_line(command).await?;
        let outcome = session.expect(&[&inner, &outer], timeout).await?;
        let elapsed = start.elapsed();

        match outcome {
            Expect::Matched { index: 0, before, after } => {
                self.state = ConsoleState::Inner;
                trace!("{}: raw output of '{}': {:?}", name, command, before);
                let result = clean_response(&before, command).ok_or_else(|| {
                    error!("{}: echo of '{}' not found in {:?}", name, command, before);
                    DriverError::EchoNotFound {
                        command: command.to_string(),
                        output: before.clone(),
                    }
                })?;
                debug!("{}: response to '{}': {}", name, command, result);
                Ok(Exchange::Answered(Response::new(command, result, before, after, elapsed)))
            }
            Expect::Matched { before, .. } => {
                self.state = ConsoleState::Outer;
                warn!(
                    "{}: dropped to the shell while sending '{}': {}",
                    name,
                    command,
                    strip_noise(&before)
                );
                Ok(Exchange::Shell)
            }
            Expect::Timeout { before } => {
                self.state = ConsoleState::Unknown;
                let result = clean_response(&before, command).unwrap_or_else(|| strip_noise(&before));
                error!(
                    "{}: no prompt within {:?} after '{}', partial output: {}",
                    name, timeout, command, result
                );
                Ok(Exchange::Answered(Response::degraded(command, result, before, elapsed)))
            }
        }
    }

    /// Record a message in the controller's log (`log:log`).
    pub async fn log_to_controller(&mut self, message: &str, level: Option<log::Level>) -> Result<()> {
        let command = match level {
            Some(level) => format!("log:log --level={} {}", level, message),
            None => format!("log:log {}", message),
        };
        let timeout = self.settings.timeouts.command;
        self.deliver(&command, timeout).await?.ensure_ok()?;
        Ok(())
    }
}

/// What came back after writing a command.
enum Exchange {
    /// The console prompt returned, or the wait timed out (degraded).
    Answered(Response),
    /// The shell prompt came back instead.
    Shell,
}

impl OnosCliDriver<SshTransport> {
    /// Connect over SSH and attach to the shell.
    ///
    /// If an environment variable named like the configured host exists,
    /// its value is dialled instead.
    pub async fn open(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(DriverError::AlreadyConnected.into());
        }
        let config = self.ssh_config.as_mut().ok_or(DriverError::NotConnected)?;
        let address = resolve_host(&config.host);
        if address != config.host {
            debug!("{}: {} resolves to {}", self.settings.name, config.host, address);
            config.host = address;
        }

        let transport = SshTransport::connect(config).await?;
        self.attach(transport).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::transport::mock::Reply;

    #[tokio::test(start_paused = true)]
    async fn test_attach_changes_directory() {
        let (driver, log) = attached(|_| Reply::Silent).await;
        assert_eq!(log.lines(), vec!["cd ~/onos"]);
        assert_eq!(driver.console_state(), ConsoleState::Outer);
        assert!(driver.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_cleans_output() {
        let (mut driver, log) = in_console(|_| {
            Reply::Output("\x1b[1mid=10.0.0.1, address=10.0.0.1:9876, state=READY\x1b[0m".to_string())
        })
        .await;

        let response = driver.send("nodes").await.unwrap();
        assert_eq!(response.result, "id=10.0.0.1, address=10.0.0.1:9876, state=READY");
        assert!(!response.result.contains('\x1b'));
        assert!(!response.result.starts_with("nodes"));
        assert!(!response.degraded);
        assert_eq!(log.lines(), vec!["nodes"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_timeout_is_degraded() {
        let (mut driver, _log) = in_console(|line| {
            if line == "summary" {
                Reply::Silent
            } else {
                Reply::Output(String::new())
            }
        })
        .await;

        let response = driver.send("summary").await.unwrap();
        assert!(response.degraded);
        assert_eq!(driver.console_state(), ConsoleState::Unknown);
        assert!(response.complete().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_output_after_timeout_is_skipped() {
        let (mut driver, log) = in_console(|line| {
            if line == "summary" {
                Reply::Late(Duration::from_secs(35), "node=10.128.20.11, devices=25".to_string())
            } else {
                Reply::Output(format!("ok-{}", line))
            }
        })
        .await;

        let response = driver.send("summary").await.unwrap();
        assert!(response.degraded);
        assert_eq!(driver.console_state(), ConsoleState::Unknown);

        for command in ["nodes", "devices", "hosts", "links"] {
            let response = driver.send(command).await.unwrap();
            assert!(!response.degraded);
            assert_eq!(response.result, format!("ok-{}", command));
        }
        assert_eq!(log.count("echo onoscli-sync"), 1);
        assert_eq!(driver.console_state(), ConsoleState::Inner);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dollar_at_chunk_end_is_not_the_shell() {
        let (mut driver, log) = in_console(|line| {
            if line == "cfg get" {
                Reply::Chunks(vec!["price is $".to_string(), "5".to_string()])
            } else {
                Reply::Output(String::new())
            }
        })
        .await;

        let response = driver.send("cfg get").await.unwrap();
        assert_eq!(response.result, "price is $5");
        assert_eq!(log.lines(), vec!["cfg get"]);
        assert_eq!(driver.console_state(), ConsoleState::Inner);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_to_shell_reenters_console_and_resends() {
        let mut dropped = false;
        let (mut driver, log) = in_console(move |line| {
            if line == "devices" && !dropped {
                dropped = true;
                Reply::DropToShell("Connection closed by foreign host.".to_string())
            } else {
                Reply::Output("id=of:0000000000000001, available=true".to_string())
            }
        })
        .await;

        let response = driver.send("devices").await.unwrap();
        assert_eq!(response.result, "id=of:0000000000000001, available=true");
        assert_eq!(log.count("devices"), 2);
        assert_eq!(log.count("onos -w 10.128.20.11"), 1);
        assert_eq!(driver.console_state(), ConsoleState::Inner);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_drop_loses_console() {
        let (mut driver, _log) = in_console(|_| Reply::DropToShell(String::new())).await;

        let err = driver.send("devices").await.unwrap_err();
        assert!(matches!(err, crate::Error::Driver(DriverError::ConsoleLost { .. })));
        assert!(!err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_without_console_address() {
        let (mut driver, log) = attached(|_| Reply::Output(String::new())).await;
        let err = driver.send("nodes").await.unwrap_err();
        assert!(matches!(err, crate::Error::Driver(DriverError::ConsoleLost { .. })));
        assert_eq!(log.count("nodes"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mirror_commands() {
        let shell = crate::transport::mock::FakeShell::new(|_| Reply::Output(String::new()));
        let log = shell.log();
        let mut driver = crate::driver::DriverBuilder::new("bench")
            .mirror_commands(true)
            .attach(shell)
            .await
            .unwrap();
        driver.start_onos_cli(CONTROLLER, None).await.unwrap();
        log.clear();

        driver.send("flows").await.unwrap();
        assert_eq!(
            log.lines(),
            vec!["log:log \"Sending CLI command: 'flows'\"", "flows"]
        );

        log.clear();
        driver.send(r#"cfg set org.onosproject.Foo name "a b""#).await.unwrap();
        assert_eq!(
            log.lines()[0],
            r#"log:log "Sending CLI command: 'cfg set org.onosproject.Foo name \"a b\"'""#
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_to_controller() {
        let (mut driver, log) = in_console(|line| {
            if line.contains("fail me") {
                Reply::Output("Error executing command: bad level".to_string())
            } else {
                Reply::Output(String::new())
            }
        })
        .await;

        tokio_test::assert_ok!(driver.log_to_controller("starting case 2", Some(log::Level::Warn)).await);
        assert_eq!(log.lines(), vec!["log:log --level=WARN starting case 2"]);

        tokio_test::assert_ok!(driver.log_to_controller("plain", None).await);
        assert_eq!(log.matching("log:log plain").len(), 1);

        tokio_test::assert_err!(driver.log_to_controller("fail me", None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect() {
        let (mut driver, log) = in_console(|_| Reply::Output(String::new())).await;
        driver.disconnect().await.unwrap();

        assert!(!driver.is_open());
        assert_eq!(log.lines(), vec!["", "logout", "", "exit"]);
        assert!(!log.in_console());
    }
}
