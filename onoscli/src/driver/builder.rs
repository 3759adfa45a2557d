//! Builder for creating ONOS CLI drivers.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::onos::OnosCliDriver;
use crate::channel::Prompts;
use crate::error::{DriverError, Result};
use crate::poll::PollPolicy;
use crate::transport::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::transport::{SshTransport, Transport};

/// Timing knobs for one driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// SSH connect and handshake.
    pub connect: Duration,

    /// Blank-line probes of the current prompt.
    pub probe: Duration,

    /// Ordinary console commands.
    pub command: Duration,

    /// First attempt at `onos -w`.
    pub console_start: Duration,

    /// The retry after interrupting a stuck `onos -w`.
    pub console_retry: Duration,

    /// Pause before resending a command that hit a store error.
    pub transient_retry_delay: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            probe: Duration::from_secs(10),
            command: Duration::from_secs(30),
            console_start: Duration::from_secs(60),
            console_retry: Duration::from_secs(30),
            transient_retry_delay: Duration::from_secs(30),
        }
    }
}

/// Builder for constructing ONOS CLI drivers.
///
/// # Example
///
/// ```rust,no_run
/// use onoscli::driver::DriverBuilder;
///
/// # async fn example() -> Result<(), onoscli::Error> {
/// let mut driver = DriverBuilder::new("OC1")
///     .name("ONOScli1")
///     .username("sdn")
///     .password("rocks")
///     .build()?;
/// driver.open().await?;
/// driver.start_onos_cli("10.128.20.11", None).await?;
/// let nodes = driver.nodes(true).await?;
/// # Ok(())
/// # }
/// ```
pub struct DriverBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    name: Option<String>,
    home: String,
    timeouts: Timeouts,
    app_poll: PollPolicy,
    mirror_commands: bool,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    terminal_width: u32,
    terminal_height: u32,
}

impl DriverBuilder {
    /// Create a new driver builder for the specified host.
    ///
    /// The host may also name an environment variable holding the address.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: AuthMethod::None,
            name: None,
            home: "~/onos".to_string(),
            timeouts: Timeouts::default(),
            app_poll: PollPolicy::default(),
            mirror_commands: false,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            terminal_width: 511,
            terminal_height: 24,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Name used to prefix this driver's log lines (default: the host).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Directory to `cd` into after login (default: `~/onos`).
    pub fn home(mut self, home: impl Into<String>) -> Self {
        self.home = home.into();
        self
    }

    /// Replace all timing knobs at once.
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the timeout for ordinary console commands.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.command = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = timeout;
        self
    }

    /// How application state changes are polled.
    pub fn app_poll(mut self, policy: PollPolicy) -> Self {
        self.app_poll = policy;
        self
    }

    /// Record every command in the controller log before sending it.
    pub fn mirror_commands(mut self, enabled: bool) -> Self {
        self.mirror_commands = enabled;
        self
    }

    /// Set the host key verification mode (default: accept new).
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a specific known_hosts file.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Build an SSH driver.
    ///
    /// This creates the driver but does not connect. Call `open()` on the
    /// returned driver to establish the connection.
    pub fn build(self) -> Result<OnosCliDriver<SshTransport>> {
        let username = self
            .username
            .clone()
            .ok_or_else(|| DriverError::invalid_input("Username is required"))?;

        let ssh_config = SshConfig {
            host: self.host.clone(),
            port: self.port,
            username,
            auth: self.auth,
            timeout: self.timeouts.connect,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        };

        let settings = Settings {
            name: self.name.unwrap_or_else(|| self.host.clone()),
            home: self.home,
            timeouts: self.timeouts,
            app_poll: self.app_poll,
            mirror_commands: self.mirror_commands,
        };

        Ok(OnosCliDriver::new(settings, Prompts::new()?, Some(ssh_config)))
    }

    /// Build a driver over an already connected transport.
    ///
    /// Waits for the shell prompt, then changes into the home directory.
    pub async fn attach<T: Transport>(self, transport: T) -> Result<OnosCliDriver<T>> {
        let settings = Settings {
            name: self.name.unwrap_or_else(|| self.host.clone()),
            home: self.home,
            timeouts: self.timeouts,
            app_poll: self.app_poll,
            mirror_commands: self.mirror_commands,
        };

        let mut driver = OnosCliDriver::new(settings, Prompts::new()?, None);
        driver.attach(transport).await?;
        Ok(driver)
    }
}

/// Per-driver settings that outlive reconnects.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) name: String,
    pub(crate) home: String,
    pub(crate) timeouts: Timeouts,
    pub(crate) app_poll: PollPolicy,
    pub(crate) mirror_commands: bool,
}
