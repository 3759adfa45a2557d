//! Records decoded from the console's JSON listings.
//!
//! Only the fields the command helpers rely on are typed; everything else
//! a record carries is kept in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entry of `nodes -j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNode {
    pub id: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub tcp_port: Option<u16>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Entry of `devices -j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entry of `hosts -j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entry of `roles -j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: String,
    pub master: String,
    #[serde(default)]
    pub standbys: Vec<String>,
}

/// Entry of `onos:masters -j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterLoad {
    pub id: String,
    pub size: i64,
    #[serde(default)]
    pub devices: Vec<String>,
}

/// Entry of `intents -j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub id: String,
    pub state: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
}

/// Entry of `flows -j`: the flows of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFlows {
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub flows: Vec<Flow>,
}

/// One flow rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub group_id: Value,
    #[serde(default)]
    pub state: Option<String>,
}

/// Entry of `onos:apps -j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Entry of `app-ids -j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppId {
    pub id: i64,
    pub name: String,
}

/// Entry of `onos:leaders -c -j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderCandidates {
    pub topic: String,
    #[serde(default)]
    pub leader: Option<String>,
    /// Either a list or a `"[a, b]"` string, depending on the release.
    #[serde(default)]
    pub candidates: Value,
}

impl LeaderCandidates {
    /// Candidate node ids in election order.
    pub fn candidate_list(&self) -> Vec<String> {
        match &self.candidates {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Value::String(text) => {
                let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
                if inner.is_empty() {
                    Vec::new()
                } else {
                    inner.split(", ").map(str::to_string).collect()
                }
            }
            _ => Vec::new(),
        }
    }
}

/// `topology -j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub devices: Option<u64>,
    #[serde(default)]
    pub links: Option<u64>,
    #[serde(default)]
    pub clusters: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `summary -j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub nodes: Option<u64>,
    #[serde(default)]
    pub devices: Option<u64>,
    #[serde(default)]
    pub links: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
