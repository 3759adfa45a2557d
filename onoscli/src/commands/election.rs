//! Leadership election test application (`onos-app-election`).

use std::sync::LazyLock;

use log::{error, info};
use regex::Regex;

use crate::driver::OnosCliDriver;
use crate::error::{CommandError, Result};
use crate::transport::Transport;

static LEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"The\scurrent\sleader\sfor\sthe\sElection\sapp\sis\s(?P<node>.+)\.").expect("valid leader regex")
});

static NO_LEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"There\sis\scurrently\sno\sleader\selected\sfor\sthe\sElection\sapp").expect("valid no-leader regex")
});

static RUNNING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Entering\sleadership\selections\sfor\sthe\sElection\sapp\.").expect("valid run regex")
});

static WITHDRAWING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Withdrawing\sfrom\sleadership\selections\sfor\sthe\sElection\sapp\.").expect("valid withdraw regex")
});

const NOT_FOUND: &str = "Command not found";

fn not_recognised(name: &str, command: &str, output: String) -> crate::Error {
    if output.contains(NOT_FOUND) {
        error!("{}: election app is not loaded", name);
        CommandError::NotInstalled {
            command: command.to_string(),
        }
        .into()
    } else {
        error!("{}: unexpected response to '{}': {:?}", name, command, output);
        CommandError::UnexpectedResponse {
            command: command.to_string(),
            output,
        }
        .into()
    }
}

impl<T: Transport> OnosCliDriver<T> {
    /// Current leader of the election app, `None` if nobody is elected.
    pub async fn election_test_leader(&mut self) -> Result<Option<String>> {
        let command = "election-test-leader";
        let output = self.query(command).await?;

        if let Some(caps) = LEADER.captures(&output) {
            let node = caps["node"].to_string();
            info!("{}: election-test-leader found {} as the leader", self.name(), node);
            return Ok(Some(node));
        }
        if NO_LEADER.is_match(&output) {
            info!("{}: election-test-leader found no leader", self.name());
            return Ok(None);
        }
        Err(not_recognised(self.name(), command, output))
    }

    /// Run for leadership of the election app.
    pub async fn election_test_run(&mut self) -> Result<()> {
        let command = "election-test-run";
        let output = self.query(command).await?;
        if RUNNING.is_match(&output) {
            info!("{}: entering leadership elections for the election app", self.name());
            return Ok(());
        }
        Err(not_recognised(self.name(), command, output))
    }

    /// Withdraw from the election app's leadership election.
    pub async fn election_test_withdraw(&mut self) -> Result<()> {
        let command = "election-test-withdraw";
        let output = self.query(command).await?;
        if WITHDRAWING.is_match(&output) {
            info!("{}: withdrawing from leadership elections for the election app", self.name());
            return Ok(());
        }
        Err(not_recognised(self.name(), command, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::onos::testing::*;
    use crate::error::Error;

    #[tokio::test(start_paused = true)]
    async fn test_leader() {
        let (mut driver, _log) = in_console(answers(vec![(
            "election-test-leader",
            "The current leader for the Election app is 10.128.20.12.",
        )]))
        .await;

        assert_eq!(
            driver.election_test_leader().await.unwrap().as_deref(),
            Some("10.128.20.12")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_leader() {
        let (mut driver, _log) = in_console(answers(vec![(
            "election-test-leader",
            "There is currently no leader elected for the Election app",
        )]))
        .await;

        assert_eq!(driver.election_test_leader().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_and_withdraw() {
        let (mut driver, log) = in_console(answers(vec![
            ("election-test-run", "Entering leadership elections for the Election app."),
            ("election-test-withdraw", "Withdrawing from leadership elections for the Election app."),
        ]))
        .await;

        driver.election_test_run().await.unwrap();
        driver.election_test_withdraw().await.unwrap();
        assert_eq!(log.lines(), vec!["election-test-run", "election-test-withdraw"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_app_not_loaded() {
        // `answers` replies "Command not found" to anything unknown
        let (mut driver, _log) = in_console(answers(vec![("election-test-run", "Huh?")])).await;

        assert!(matches!(
            driver.election_test_leader().await.unwrap_err(),
            Error::Command(CommandError::NotInstalled { .. })
        ));
        assert!(matches!(
            driver.election_test_run().await.unwrap_err(),
            Error::Command(CommandError::UnexpectedResponse { .. })
        ));
    }
}
