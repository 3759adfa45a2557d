//! End hosts and virtual tenant networks.

use super::model::Host;
use super::with_json;
use crate::driver::OnosCliDriver;
use crate::error::{DriverError, Result};
use crate::transport::Transport;

/// ONOS host id of a Mininet host started with `--mac`.
///
/// `h1` becomes `00:00:00:00:00:01/-1` (untagged).
pub fn host_id_from_name(name: &str) -> Result<String> {
    let number: u64 = name
        .trim_start_matches('h')
        .parse()
        .map_err(|_| DriverError::invalid_input(format!("not a Mininet host name: '{}'", name)))?;
    if number > 0xffff_ffff_ffff {
        return Err(DriverError::invalid_input(format!("host number out of MAC range: '{}'", name)).into());
    }

    let hex = format!("{:012x}", number);
    let octets: Vec<&str> = (0..12).step_by(2).map(|i| &hex[i..i + 2]).collect();
    Ok(format!("{}/-1", octets.join(":")))
}

/// [`host_id_from_name`] for a list of hosts.
pub fn hosts_id<S: AsRef<str>>(names: &[S]) -> Result<Vec<String>> {
    names.iter().map(|name| host_id_from_name(name.as_ref())).collect()
}

impl<T: Transport> OnosCliDriver<T> {
    /// `hosts [-j]`
    pub async fn hosts(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("hosts", json)).await
    }

    /// First host whose id contains `mac` (full or partial, colon separated).
    pub async fn get_host(&mut self, mac: &str) -> Result<Option<Host>> {
        let hosts: Vec<Host> = self.query_json("hosts").await?;
        Ok(hosts.into_iter().find(|host| host.id.contains(mac)))
    }

    /// `networks [-j]`
    pub async fn networks(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("networks", json)).await
    }

    /// `subnets [-j]`
    pub async fn subnets(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("subnets", json)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::onos::testing::*;

    #[test]
    fn test_host_id_from_name() {
        assert_eq!(host_id_from_name("h1").unwrap(), "00:00:00:00:00:01/-1");
        assert_eq!(host_id_from_name("h255").unwrap(), "00:00:00:00:00:ff/-1");
        assert_eq!(host_id_from_name("h4096").unwrap(), "00:00:00:00:10:00/-1");
        assert!(host_id_from_name("s1x").is_err());
    }

    #[test]
    fn test_hosts_id() {
        assert_eq!(
            hosts_id(&["h1", "h2"]).unwrap(),
            vec!["00:00:00:00:00:01/-1", "00:00:00:00:00:02/-1"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_host_by_partial_mac() {
        let (mut driver, log) = in_console(answers(vec![(
            "hosts -j",
            r#"[{"id":"00:00:00:00:00:01/-1","mac":"00:00:00:00:00:01","vlan":"-1","ips":["10.0.0.1"]},{"id":"00:00:00:00:00:02/-1","mac":"00:00:00:00:00:02","vlan":"-1","ips":["10.0.0.2"]}]"#,
        )]))
        .await;

        let host = driver.get_host("00:00:02").await.unwrap().unwrap();
        assert_eq!(host.mac.as_deref(), Some("00:00:00:00:00:02"));
        assert_eq!(host.extra["ips"][0], "10.0.0.2");
        assert!(driver.get_host("aa:bb").await.unwrap().is_none());
        assert_eq!(log.count("hosts -j"), 2);
    }
}
