//! Cluster membership, leadership, topology summary and Karaf features.

use log::{error, info, warn};

use super::model::{ClusterNode, LeaderCandidates, Summary, Topology};
use super::{parse_json, with_json};
use crate::driver::OnosCliDriver;
use crate::error::{CommandError, Result};
use crate::transport::Transport;

impl<T: Transport> OnosCliDriver<T> {
    /// `add-node <id> <address> [<port>]`
    pub async fn add_node(&mut self, node_id: &str, address: &str, tcp_port: Option<u16>) -> Result<()> {
        let mut command = format!("add-node {} {}", node_id, address);
        if let Some(port) = tcp_port {
            command.push_str(&format!(" {}", port));
        }
        self.checked(&command).await?;
        info!("{}: node {} added", self.name(), address);
        Ok(())
    }

    /// `remove-node <id>`
    pub async fn remove_node(&mut self, node_id: &str) -> Result<()> {
        self.checked(&format!("remove-node {}", node_id)).await?;
        Ok(())
    }

    /// `nodes [-j]`
    pub async fn nodes(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("nodes", json)).await
    }

    /// Ids of every node in `nodes -j`.
    pub async fn all_nodes_id(&mut self) -> Result<Vec<String>> {
        let output = self.nodes(true).await?;
        if output.is_empty() {
            info!("{}: there are no nodes to get id from", self.name());
            return Ok(Vec::new());
        }
        let nodes: Vec<ClusterNode> = parse_json("nodes -j", &output)?;
        Ok(nodes.into_iter().map(|node| node.id).collect())
    }

    /// `topology -j`
    pub async fn topology(&mut self) -> Result<String> {
        let output = self.query("topology -j").await?;
        info!("{}: topology -j returned: {}", self.name(), output);
        Ok(output)
    }

    /// Compare the device and link counts the controller sees with the
    /// expected ones.
    pub async fn check_status(&mut self, devices: u64, links: u64) -> Result<bool> {
        let output = self.topology().await?;
        let topology: Topology = parse_json("topology -j", &output)?;
        let (Some(seen_devices), Some(seen_links)) = (topology.devices, topology.links) else {
            return Err(CommandError::UnexpectedResponse {
                command: "topology -j".to_string(),
                output,
            }
            .into());
        };

        let matches = seen_devices == devices && seen_links == links;
        let summary = format!(
            "ONOS sees {} devices ({} expected) and {} links ({} expected)",
            seen_devices, devices, seen_links, links
        );
        if matches {
            info!("{}: the number of links and switches match: {}", self.name(), summary);
        } else {
            warn!("{}: the number of links and switches does not match: {}", self.name(), summary);
        }
        Ok(matches)
    }

    /// `clusters [-j]`
    pub async fn clusters(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("clusters", json)).await
    }

    /// `onos:partitions [-j]`
    pub async fn partitions(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("onos:partitions", json)).await
    }

    /// `onos:leaders [-j]`
    pub async fn leaders(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("onos:leaders", json)).await
    }

    /// `onos:leaders -c [-j]`
    pub async fn leader_candidates(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("onos:leaders -c", json)).await
    }

    /// `[leader, candidate, ...]` for one topic, empty if the topic is unknown.
    ///
    /// The leader slot holds `"none"` when nobody is elected.
    pub async fn specific_leader_candidate(&mut self, topic: &str) -> Result<Vec<String>> {
        let entries: Vec<LeaderCandidates> = self.query_json("onos:leaders -c").await?;
        Ok(leader_then_candidates(&entries, topic))
    }

    /// `summary [-j]`
    pub async fn summary(&mut self, json: bool) -> Result<String> {
        let command = with_json("summary", json);
        let output = self.query(&command).await?;
        if output.is_empty() {
            error!("{}: summary returned nothing", self.name());
            return Err(CommandError::UnexpectedResponse { command, output }.into());
        }
        Ok(output)
    }

    /// `summary -j`, decoded.
    pub async fn summary_json(&mut self) -> Result<Summary> {
        let output = self.summary(true).await?;
        parse_json("summary -j", &output)
    }

    /// `feature:install <feature>`
    pub async fn feature_install(&mut self, feature: &str) -> Result<()> {
        self.checked(&format!("feature:install {}", feature)).await?;
        Ok(())
    }

    /// `feature:uninstall <feature>`, only if the feature is installed.
    pub async fn feature_uninstall(&mut self, feature: &str) -> Result<()> {
        let installed = self
            .query(&format!("feature:list -i | grep \"{}\"", feature))
            .await?;
        if installed.is_empty() {
            info!("{}: feature {} is not installed, nothing to uninstall", self.name(), feature);
            return Ok(());
        }
        self.checked(&format!("feature:uninstall {}", feature)).await?;
        Ok(())
    }
}

fn leader_then_candidates(entries: &[LeaderCandidates], topic: &str) -> Vec<String> {
    let mut result = Vec::new();
    for entry in entries.iter().filter(|entry| entry.topic == topic) {
        result.push(entry.leader.clone().unwrap_or_else(|| "none".to_string()));
        result.extend(entry.candidate_list());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::onos::testing::*;

    const TOPOLOGY: &str = r#"{"time":1436907418151,"devices":25,"links":76,"clusters":1}"#;

    #[tokio::test(start_paused = true)]
    async fn test_add_and_remove_node() {
        let (mut driver, log) = in_console(answers(vec![
            ("add-node", ""),
            ("remove-node 7", "Error executing command: no such node"),
        ]))
        .await;

        tokio_test::assert_ok!(driver.add_node("2", "10.0.0.2", Some(9876)).await);
        tokio_test::assert_ok!(driver.add_node("3", "10.0.0.3", None).await);
        assert!(driver.remove_node("7").await.is_err());
        assert_eq!(
            log.lines(),
            vec!["add-node 2 10.0.0.2 9876", "add-node 3 10.0.0.3", "remove-node 7"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_nodes_id() {
        let (mut driver, _log) = in_console(answers(vec![(
            "nodes -j",
            r#"[{"id":"10.0.0.1","ip":"10.0.0.1","tcpPort":9876,"state":"READY"},{"id":"10.0.0.2","ip":"10.0.0.2","tcpPort":9876,"state":"READY"}]"#,
        )]))
        .await;

        assert_eq!(driver.all_nodes_id().await.unwrap(), vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_status() {
        let (mut driver, _log) = in_console(answers(vec![("topology -j", TOPOLOGY)])).await;

        assert!(driver.check_status(25, 76).await.unwrap());
        assert!(!driver.check_status(25, 80).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feature_uninstall_skips_missing_feature() {
        let (mut driver, log) = in_console(answers(vec![("feature:list -i", "")])).await;

        tokio_test::assert_ok!(driver.feature_uninstall("onos-app-fwd").await);
        assert_eq!(log.lines(), vec!["feature:list -i | grep \"onos-app-fwd\""]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feature_uninstall() {
        let (mut driver, log) = in_console(answers(vec![
            ("feature:list -i", "onos-app-fwd | 1.2.0 | x | onos-1.2.0 | ONOS sample app"),
            ("feature:uninstall", ""),
        ]))
        .await;

        tokio_test::assert_ok!(driver.feature_uninstall("onos-app-fwd").await);
        assert_eq!(log.count("feature:uninstall onos-app-fwd"), 1);
    }

    #[test]
    fn test_leader_then_candidates() {
        let entries: Vec<LeaderCandidates> = serde_json::from_str(
            r#"[
                {"topic":"org.onosproject.election","leader":"10.0.0.2","candidates":"[10.0.0.2, 10.0.0.1, 10.0.0.3]"},
                {"topic":"intent-partition-1","leader":"10.0.0.1","candidates":"[10.0.0.1]"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            leader_then_candidates(&entries, "org.onosproject.election"),
            vec!["10.0.0.2", "10.0.0.2", "10.0.0.1", "10.0.0.3"]
        );
        assert!(leader_then_candidates(&entries, "missing").is_empty());
    }
}
