//! Infrastructure devices, links, ports and mastership.

use std::fmt;
use std::str::FromStr;

use log::{error, info, warn};

use super::model::{Device, MasterLoad, RoleAssignment};
use super::with_json;
use crate::driver::OnosCliDriver;
use crate::error::{CommandError, DriverError, Error, Result};
use crate::transport::Transport;

/// Mastership role given with `device-role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Master,
    Standby,
    None,
}

impl DeviceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRole::Master => "master",
            DeviceRole::Standby => "standby",
            DeviceRole::None => "none",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "master" => Ok(DeviceRole::Master),
            "standby" => Ok(DeviceRole::Standby),
            "none" => Ok(DeviceRole::None),
            _ => {
                error!("invalid role given to device_role(): '{}'", s);
                Err(DriverError::invalid_input(format!("invalid device role '{}'", s)).into())
            }
        }
    }
}

/// Every master owns within one device of the first master.
fn masters_balanced(masters: &[MasterLoad]) -> bool {
    let Some(first) = masters.first() else {
        return true;
    };
    masters
        .iter()
        .all(|master| (master.size - first.size).abs() <= 1)
}

/// Ids from the plain `devices` listing (`id=of:..., available=true, ...`).
fn device_ids(listing: &str) -> Vec<String> {
    listing
        .split(',')
        .filter_map(|field| field.split_once("id="))
        .map(|(_, id)| id.to_string())
        .collect()
}

/// Fail on `No such device`, otherwise parse the `wc -l` count.
fn parse_count(command: String, output: String) -> Result<usize> {
    if output.contains("No such device") {
        error!("'{}' failed: {}", command, output);
        return Err(CommandError::ErrorMarker { command, output }.into());
    }
    output
        .trim()
        .parse()
        .map_err(|_| CommandError::UnexpectedResponse { command, output }.into())
}

impl<T: Transport> OnosCliDriver<T> {
    /// `devices [-j]`
    pub async fn devices(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("devices", json)).await
    }

    /// `links [-j]`
    pub async fn links(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("links", json)).await
    }

    /// `ports [-j]`
    pub async fn ports(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("ports", json)).await
    }

    /// `roles [-j]`
    pub async fn roles(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("roles", json)).await
    }

    /// First device whose id contains `dpid` (colons ignored).
    pub async fn get_device(&mut self, dpid: &str) -> Result<Option<Device>> {
        let dpid = dpid.replace(':', "");
        let devices: Vec<Device> = self.query_json("devices").await?;
        Ok(devices.into_iter().find(|device| device.id.contains(&dpid)))
    }

    /// Role assignment of the first device whose id contains `device_id`.
    pub async fn get_role(&mut self, device_id: &str) -> Result<Option<RoleAssignment>> {
        let roles: Vec<RoleAssignment> = self.query_json("roles").await?;
        Ok(roles.into_iter().find(|role| role.id.contains(device_id)))
    }

    /// Whether every device has a master.
    pub async fn roles_not_null(&mut self) -> Result<bool> {
        let roles: Vec<RoleAssignment> = self.query_json("roles").await?;
        if let Some(orphan) = roles.iter().find(|role| role.master == "none") {
            warn!("{}: device has no master: {:?}", self.name(), orphan);
            return Ok(false);
        }
        Ok(true)
    }

    /// `device-remove <id>`
    pub async fn device_remove(&mut self, device_id: &str) -> Result<()> {
        self.checked(&format!("device-remove {}", device_id)).await?;
        Ok(())
    }

    /// `device-role <device> <node> <role>`
    ///
    /// The role is checked before anything is sent.
    pub async fn device_role(&mut self, device_id: &str, node: &str, role: &str) -> Result<()> {
        let role: DeviceRole = role.parse()?;
        self.checked(&format!("device-role {} {} {}", device_id, node, role))
            .await?;
        Ok(())
    }

    /// `onos:balance-masters`
    pub async fn balance_masters(&mut self) -> Result<()> {
        self.checked("onos:balance-masters").await?;
        Ok(())
    }

    /// `onos:masters [-j]`
    pub async fn masters(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("onos:masters", json)).await
    }

    /// Whether mastership is spread evenly over the masters.
    pub async fn check_balance_masters(&mut self) -> Result<bool> {
        let masters: Vec<MasterLoad> = self.query_json("onos:masters").await?;
        if masters_balanced(&masters) {
            info!("{}: mastership balanced between {} masters", self.name(), masters.len());
            return Ok(true);
        }
        error!("{}: mastership not balanced", self.name());
        let listing = self.masters(false).await?;
        info!("{}:\n{}", self.name(), listing);
        Ok(false)
    }

    /// `onos:paths <src> <dst>`, split into the path and its cost.
    pub async fn paths(&mut self, src: &str, dst: &str) -> Result<(String, String)> {
        let response = self.checked(&format!("onos:paths {} {}", src, dst)).await?;
        match response.result.split_once(';') {
            Some((path, cost)) => Ok((path.to_string(), cost.to_string())),
            None => Err(CommandError::UnexpectedResponse {
                command: response.command,
                output: response.result,
            }
            .into()),
        }
    }

    /// Ids of every device, in listing order.
    pub async fn all_devices_id(&mut self) -> Result<Vec<String>> {
        let listing = self.devices(false).await?;
        if listing.is_empty() {
            info!("{}: there are no devices to get id from", self.name());
        }
        Ok(device_ids(&listing))
    }

    /// Number of enabled ports on a device.
    pub async fn device_ports_enabled_count(&mut self, dpid: &str) -> Result<usize> {
        let command = format!("onos:ports -e {} | wc -l", dpid);
        let output = self.query(&command).await?;
        parse_count(command, output)
    }

    /// Number of active links on a device.
    pub async fn device_links_active_count(&mut self, dpid: &str) -> Result<usize> {
        let command = format!("onos:links {} | grep ACTIVE | wc -l", dpid);
        let output = self.query(&command).await?;
        parse_count(command, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::onos::testing::*;

    const DEVICES: &str = r#"[
        {"id":"of:0000000000000001","available":true,"role":"MASTER","type":"SWITCH"},
        {"id":"of:00000000000000a2","available":false,"role":"STANDBY","type":"SWITCH"}
    ]"#;

    const ROLES: &str = r#"[
        {"id":"of:0000000000000001","master":"10.0.0.1","standbys":["10.0.0.2"]},
        {"id":"of:0000000000000002","master":"none","standbys":[]}
    ]"#;

    fn load(id: &str, size: i64) -> MasterLoad {
        MasterLoad {
            id: id.to_string(),
            size,
            devices: Vec::new(),
        }
    }

    #[test]
    fn test_masters_balanced() {
        assert!(masters_balanced(&[load("a", 5), load("b", 4), load("c", 6)]));
        assert!(!masters_balanced(&[load("a", 5), load("b", 3)]));
        assert!(masters_balanced(&[]));
    }

    #[test]
    fn test_device_ids() {
        let listing = "id=of:0000000000000001, available=true, role=MASTER\nid=of:0000000000000002, available=true, role=MASTER";
        assert_eq!(
            device_ids(listing),
            vec!["of:0000000000000001", "of:0000000000000002"]
        );
        assert!(device_ids("").is_empty());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("MASTER".parse::<DeviceRole>().unwrap(), DeviceRole::Master);
        assert_eq!("none".parse::<DeviceRole>().unwrap(), DeviceRole::None);
        assert!("leader".parse::<DeviceRole>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_device_strips_colons() {
        let (mut driver, _log) = in_console(answers(vec![("devices -j", DEVICES)])).await;

        let device = driver.get_device("00:00:00:00:00:00:00:a2").await.unwrap().unwrap();
        assert_eq!(device.id, "of:00000000000000a2");
        assert!(!device.available);
        assert!(driver.get_device("ff").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_roles() {
        let (mut driver, _log) = in_console(answers(vec![("roles -j", ROLES)])).await;

        let role = driver.get_role("0000000000000001").await.unwrap().unwrap();
        assert_eq!(role.master, "10.0.0.1");
        assert_eq!(role.standbys, vec!["10.0.0.2"]);
        assert!(!driver.roles_not_null().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_role_rejected_before_sending() {
        let (mut driver, log) = in_console(answers(vec![("device-role", "")])).await;

        assert!(driver.device_role("of:0000000000000001", "10.0.0.1", "leader").await.is_err());
        assert!(log.lines().is_empty());

        driver.device_role("of:0000000000000001", "10.0.0.1", "Standby").await.unwrap();
        assert_eq!(log.lines(), vec!["device-role of:0000000000000001 10.0.0.1 standby"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_balance_masters() {
        let (mut driver, log) = in_console(answers(vec![
            (
                "onos:masters -j",
                r#"[{"id":"10.0.0.1","size":6,"devices":[]},{"id":"10.0.0.2","size":2,"devices":[]}]"#,
            ),
            ("onos:masters", "10.0.0.1: 6 devices\n10.0.0.2: 2 devices"),
        ]))
        .await;

        assert!(!driver.check_balance_masters().await.unwrap());
        assert_eq!(log.lines(), vec!["onos:masters -j", "onos:masters"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paths() {
        let (mut driver, _log) = in_console(answers(vec![
            ("onos:paths of:1 of:2", "of:0000000000000001/2-of:0000000000000002/1; cost=1.0"),
            ("onos:paths", "Error executing command: no such device"),
        ]))
        .await;

        let (path, cost) = driver.paths("of:1", "of:2").await.unwrap();
        assert_eq!(path, "of:0000000000000001/2-of:0000000000000002/1");
        assert_eq!(cost, " cost=1.0");
        assert!(driver.paths("of:1", "of:9").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts() {
        let (mut driver, log) = in_console(answers(vec![
            ("onos:ports -e of:0000000000000001", "4"),
            ("onos:ports -e", "No such device of:00000000000000ff"),
            ("onos:links", "3"),
        ]))
        .await;

        assert_eq!(driver.device_ports_enabled_count("of:0000000000000001").await.unwrap(), 4);
        assert!(driver.device_ports_enabled_count("of:00000000000000ff").await.is_err());
        assert_eq!(driver.device_links_active_count("of:0000000000000001").await.unwrap(), 3);
        assert_eq!(log.lines()[2], "onos:links of:0000000000000001 | grep ACTIVE | wc -l");
    }
}
