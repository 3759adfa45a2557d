//! Flow rule inventory.

use log::{error, info};

use super::model::DeviceFlows;
use super::{parse_json, with_json};
use crate::driver::OnosCliDriver;
use crate::error::{CommandError, Result};
use crate::transport::Transport;

/// Flow states that count as installed.
const INSTALLED_STATES: [&str; 2] = ["ADDED", "PENDING_ADD"];

/// Whether every flow of every device is `ADDED` or `PENDING_ADD`.
pub fn flows_all_added(devices: &[DeviceFlows]) -> bool {
    let mut all_added = true;
    for flow in devices.iter().flat_map(|device| &device.flows) {
        let state = flow.state.as_deref().unwrap_or_default();
        if !INSTALLED_STATES.contains(&state) {
            info!("flow id: {} | state: {}", flow.group_id, state);
            all_added = false;
        }
    }
    all_added
}

impl<T: Transport> OnosCliDriver<T> {
    /// `flows [-j]`
    pub async fn flows(&mut self, json: bool) -> Result<String> {
        let output = self.query(&with_json("flows", json)).await?;
        if output.contains("Error:") {
            error!("{}: flows() response: {}", self.name(), output);
        }
        Ok(output)
    }

    /// Whether every flow is installed or about to be.
    pub async fn check_flows_state(&mut self) -> Result<bool> {
        let output = self.flows(true).await?;
        let devices: Vec<DeviceFlows> = parse_json("flows -j", &output)?;
        Ok(flows_all_added(&devices))
    }

    /// Number of flow rules of one device in the `ADDED` state.
    pub async fn flow_added_count(&mut self, device_id: &str) -> Result<usize> {
        let command = format!("flows any {} | grep 'state=ADDED' | wc -l", device_id);
        let output = self.query(&command).await?;
        output
            .trim()
            .parse()
            .map_err(|_| CommandError::UnexpectedResponse { command, output }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::onos::testing::*;

    fn devices(states: &[&str]) -> Vec<DeviceFlows> {
        let flows: Vec<String> = states
            .iter()
            .enumerate()
            .map(|(i, state)| format!(r#"{{"id":"{}","groupId":0,"state":"{}"}}"#, i, state))
            .collect();
        serde_json::from_str(&format!(
            r#"[{{"device":"of:0000000000000001","flows":[{}]}}]"#,
            flows.join(",")
        ))
        .unwrap()
    }

    #[test]
    fn test_pending_add_counts_as_added() {
        assert!(flows_all_added(&devices(&["ADDED", "PENDING_ADD"])));
        assert!(!flows_all_added(&devices(&["ADDED", "PENDING_REMOVE"])));
        assert!(flows_all_added(&[]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_flows_state() {
        let (mut driver, _log) = in_console(answers(vec![(
            "flows -j",
            r#"[{"device":"of:0000000000000001","flows":[{"id":"1","groupId":0,"state":"ADDED"},{"id":"2","groupId":0,"state":"PENDING_ADD"}]}]"#,
        )]))
        .await;

        assert!(driver.check_flows_state().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flow_added_count() {
        let (mut driver, log) = in_console(answers(vec![("flows any", "12")])).await;

        assert_eq!(driver.flow_added_count("of:0000000000000001").await.unwrap(), 12);
        assert_eq!(
            log.lines(),
            vec!["flows any of:0000000000000001 | grep 'state=ADDED' | wc -l"]
        );
    }
}
