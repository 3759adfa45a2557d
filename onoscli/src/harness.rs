//! Run-level handling of driver failures.
//!
//! A [`Run`] owns the drivers of one test run. Every step result goes
//! through [`Run::check`]: recoverable failures are logged and handed back
//! as `None` so the scenario can record them and move on, while a fatal
//! failure (lost connection, end of stream) tears every session down and
//! aborts the run.

use futures_util::future::join_all;
use log::{error, info, warn};
use thiserror::Error;

use crate::driver::OnosCliDriver;
use crate::error::{DriverError, Error, Result};
use crate::transport::{SshTransport, Transport};

/// A run stopped by a fatal error.
#[derive(Error, Debug)]
#[error("Run aborted at '{step}': {source}")]
pub struct RunAborted {
    /// The step that hit the error.
    pub step: String,
    #[source]
    pub source: Error,
}

impl RunAborted {
    /// Process exit status for an aborted run.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// The drivers of one test run.
pub struct Run<T: Transport = SshTransport> {
    nodes: Vec<OnosCliDriver<T>>,
}

impl<T: Transport> Run<T> {
    pub fn new(nodes: Vec<OnosCliDriver<T>>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Driver of the node at `index`, in the order given to [`Run::new`].
    pub fn node(&mut self, index: usize) -> Option<&mut OnosCliDriver<T>> {
        self.nodes.get_mut(index)
    }

    pub fn nodes_mut(&mut self) -> &mut [OnosCliDriver<T>] {
        &mut self.nodes
    }

    /// Sort the outcome of one step.
    ///
    /// Success comes back as `Some`, a recoverable failure is logged and
    /// comes back as `None`. A fatal failure tears the run down.
    pub async fn check<V>(&mut self, step: &str, result: Result<V>) -> std::result::Result<Option<V>, RunAborted> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => Err(self.abort(step, e).await),
            Err(e) => {
                error!("{} failed: {}", step, e);
                Ok(None)
            }
        }
    }

    /// Enter the console on every node at once, node `i` targeting
    /// `addresses[i]`.
    ///
    /// Returns whether every console came up.
    pub async fn start_clis<S: AsRef<str>>(
        &mut self,
        addresses: &[S],
        idle_timeout: Option<&str>,
    ) -> std::result::Result<bool, RunAborted> {
        if addresses.len() != self.nodes.len() {
            let mismatch = DriverError::invalid_input(format!(
                "{} controller addresses for {} nodes",
                addresses.len(),
                self.nodes.len()
            ));
            return Ok(self.check("start ONOS cli", Err::<(), _>(mismatch.into())).await?.is_some());
        }

        let results = join_all(
            self.nodes
                .iter_mut()
                .zip(addresses)
                .map(|(node, address)| node.start_onos_cli(address.as_ref(), idle_timeout)),
        )
        .await;

        let mut all_started = true;
        for (i, result) in results.into_iter().enumerate() {
            let step = format!("start ONOS cli on node {}", i + 1);
            if self.check(&step, result).await?.is_none() {
                all_started = false;
            }
        }
        Ok(all_started)
    }

    /// Log out of every console and close every connection.
    pub async fn teardown(&mut self) {
        for node in &mut self.nodes {
            if !node.is_open() {
                continue;
            }
            match node.logout().await {
                Ok(true) => {}
                Ok(false) => warn!("{}: logout not confirmed", node.name()),
                Err(e) => error!("{}: logout failed: {}", node.name(), e),
            }
            if let Err(e) = node.close().await {
                error!("{}: close failed: {}", node.name(), e);
            }
        }
    }

    /// End a run that went well: leave the consoles and exit the shells.
    pub async fn finish(mut self) {
        for node in &mut self.nodes {
            if let Err(e) = node.disconnect().await {
                error!("{}: disconnect failed: {}", node.name(), e);
            }
        }
        info!("run finished on {} nodes", self.nodes.len());
    }

    async fn abort(&mut self, step: &str, source: Error) -> RunAborted {
        error!("{} failed fatally, aborting the run: {}", step, source);
        self.teardown().await;
        RunAborted {
            step: step.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ConsoleState, DriverBuilder};
    use crate::driver::onos::testing::*;
    use crate::error::{ChannelError, CommandError};
    use crate::transport::mock::{FakeShell, Reply, ShellLog};

    async fn node(name: &str, failing_starts: u32) -> (OnosCliDriver<FakeShell>, ShellLog) {
        let shell = FakeShell::new(|_| Reply::Output(String::new())).failing_starts(failing_starts);
        let log = shell.log();
        let driver = DriverBuilder::new("bench").name(name).attach(shell).await.unwrap();
        (driver, log)
    }

    #[tokio::test(start_paused = true)]
    async fn test_recoverable_failure_keeps_run() {
        let (driver, log) = in_console(|_| Reply::Output(String::new())).await;
        let mut run = Run::new(vec![driver]);

        assert_eq!(run.check("count", Ok(5)).await.unwrap(), Some(5));

        let failure: Result<()> = Err(CommandError::ErrorMarker {
            command: "remove-node 1".to_string(),
            output: "Error executing command".to_string(),
        }
        .into());
        assert!(run.check("remove node", failure).await.unwrap().is_none());
        assert!(run.node(0).unwrap().is_open());
        assert!(log.lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failure_tears_down() {
        let (first, first_log) = in_console(|_| Reply::Output(String::new())).await;
        let (second, second_log) = in_console(|_| Reply::Output(String::new())).await;
        let mut run = Run::new(vec![first, second]);

        let lost: Result<()> = Err(ChannelError::EndOfStream {
            before: String::new(),
        }
        .into());
        let aborted = run.check("devices", lost).await.unwrap_err();

        assert_eq!(aborted.step, "devices");
        assert_eq!(aborted.exit_code(), 1);
        assert!(aborted.source.is_fatal());
        for log in [&first_log, &second_log] {
            assert_eq!(log.count("logout"), 1);
            assert!(!log.in_console());
        }
        assert!(!run.node(0).unwrap().is_open());
        assert!(!run.node(1).unwrap().is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_clis() {
        let (first, first_log) = node("ONOScli1", 0).await;
        let (second, second_log) = node("ONOScli2", 0).await;
        let mut run = Run::new(vec![first, second]);

        assert!(run.start_clis(&["10.128.20.11", "10.128.20.12"], None).await.unwrap());
        assert_eq!(first_log.count("onos -w 10.128.20.11"), 1);
        assert_eq!(second_log.count("onos -w 10.128.20.12"), 1);
        for node in run.nodes_mut() {
            assert_eq!(node.console_state(), ConsoleState::Inner);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_clis_reports_failed_node() {
        let (first, _) = node("ONOScli1", 0).await;
        let (second, second_log) = node("ONOScli2", 2).await;
        let mut run = Run::new(vec![first, second]);

        assert!(!run.start_clis(&["10.128.20.11", "10.128.20.12"], None).await.unwrap());
        assert_eq!(second_log.count("\x03"), 1);
        assert_eq!(run.node(0).unwrap().console_state(), ConsoleState::Inner);
        assert!(run.node(1).unwrap().is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_clis_address_mismatch() {
        let (first, log) = node("ONOScli1", 0).await;
        let mut run = Run::new(vec![first]);

        assert!(!run.start_clis(&["10.128.20.11", "10.128.20.12"], None).await.unwrap());
        assert_eq!(log.count("onos"), 0);
    }
}
