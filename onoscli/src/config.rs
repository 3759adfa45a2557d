//! Typed node parameters.
//!
//! A test bench describes each ONOS node with a handful of values: how to
//! reach the bench machine and which controller its console talks to.
//! [`NodeParams`] is that description, readable from JSON:
//!
//! ```json
//! {
//!     "name": "ONOScli1",
//!     "host": "OC1",
//!     "user": "sdn",
//!     "password": "rocks",
//!     "controller": "10.128.20.11"
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::driver::DriverBuilder;
use crate::error::{DriverError, Result};

fn default_port() -> u16 {
    22
}

fn secret<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// How to reach one node and its controller.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeParams {
    /// Prefix for this node's log lines.
    pub name: String,

    /// Bench machine address, or the name of an environment variable
    /// holding it.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub user: String,

    #[serde(default, deserialize_with = "secret")]
    pub password: Option<SecretString>,

    /// Private key, used when no password is given.
    #[serde(default)]
    pub key: Option<PathBuf>,

    /// Directory to work from on the bench machine.
    #[serde(default)]
    pub home: Option<String>,

    /// Controller address given to `onos -w`.
    pub controller: String,

    /// Karaf SSH idle timeout to set after entering the console.
    #[serde(default)]
    pub idle_timeout: Option<String>,

    /// Per-command timeout in seconds.
    #[serde(default)]
    pub command_timeout: Option<u64>,
}

impl NodeParams {
    /// Parse one node.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| DriverError::invalid_input(format!("bad node parameters: {}", e)).into())
    }

    /// Parse a list of nodes.
    pub fn list_from_json(text: &str) -> Result<Vec<Self>> {
        serde_json::from_str(text)
            .map_err(|e| DriverError::invalid_input(format!("bad node parameter list: {}", e)).into())
    }

    /// A builder preloaded with these parameters.
    pub fn builder(&self) -> DriverBuilder {
        let mut builder = DriverBuilder::new(&self.host)
            .port(self.port)
            .username(&self.user)
            .name(&self.name);

        if let Some(password) = &self.password {
            builder = builder.password(password.expose_secret());
        } else if let Some(key) = &self.key {
            builder = builder.private_key(key);
        }
        if let Some(home) = &self.home {
            builder = builder.home(home);
        }
        if let Some(seconds) = self.command_timeout {
            builder = builder.command_timeout(Duration::from_secs(seconds));
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = NodeParams::from_json(
            r#"{"name":"ONOScli1","host":"OC1","user":"sdn","password":"rocks","controller":"10.128.20.11"}"#,
        )
        .unwrap();

        assert_eq!(params.port, 22);
        assert_eq!(params.controller, "10.128.20.11");
        assert_eq!(params.password.as_ref().unwrap().expose_secret(), "rocks");
        assert!(params.home.is_none());
        assert!(params.idle_timeout.is_none());
        assert!(!format!("{:?}", params).contains("rocks"));
    }

    #[test]
    fn test_list() {
        let nodes = NodeParams::list_from_json(
            r#"[
                {"name":"ONOScli1","host":"OC1","user":"sdn","key":"/home/sdn/.ssh/id_rsa","controller":"10.128.20.11","idle_timeout":"0"},
                {"name":"ONOScli2","host":"OC2","port":2222,"user":"sdn","home":"~/onos-1.4","controller":"10.128.20.12"}
            ]"#,
        )
        .unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].key.as_deref(), Some(std::path::Path::new("/home/sdn/.ssh/id_rsa")));
        assert_eq!(nodes[0].idle_timeout.as_deref(), Some("0"));
        assert_eq!(nodes[1].port, 2222);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(NodeParams::from_json(r#"{"name":"ONOScli1"}"#).is_err());
        assert!(
            NodeParams::from_json(
                r#"{"name":"a","host":"b","user":"c","controller":"d","pasword":"typo"}"#
            )
            .is_err()
        );
    }

    #[test]
    fn test_builder() {
        let params = NodeParams::from_json(
            r#"{"name":"ONOScli2","host":"OC2","user":"sdn","password":"rocks","controller":"10.128.20.12"}"#,
        )
        .unwrap();

        let driver = params.builder().build().unwrap();
        assert_eq!(driver.name(), "ONOScli2");
        assert!(!driver.is_open());
    }
}
