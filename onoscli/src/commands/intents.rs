//! Intent installation, removal and state checks.

use std::sync::LazyLock;

use indexmap::IndexMap;
use log::{debug, error, info, warn};
use regex::Regex;

use super::model::Intent;
use super::{parse_json, with_json};
use crate::driver::OnosCliDriver;
use crate::error::{CommandError, DriverError, Result};
use crate::transport::Transport;

static INTENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"id=0x([\da-f]+),").expect("valid intent id regex"));

/// Default application the console files intents under.
pub const CLI_APP: &str = "org.onosproject.cli";

/// Hex digits of the first `id=0x<hex>,` in `text`.
pub fn extract_intent_id(text: &str) -> Option<String> {
    INTENT_ID
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Intent ids are shown as `0x2a` in listings and returned as `2a` here.
fn same_intent_id(a: &str, b: &str) -> bool {
    a.trim_start_matches("0x") == b.trim_start_matches("0x")
}

/// A device, optionally with the port the intent enters or leaves on.
///
/// A device written as `of:0000000000000001/3` already names its port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPoint {
    device: String,
    port: Option<String>,
}

impl ConnectPoint {
    pub fn new(device: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            port: Some(port.into()),
        }
    }

    /// A device id that must already carry its port (`device/port`).
    pub fn device(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            port: None,
        }
    }

    /// Pair devices with ports. Both lists must have the same length.
    pub fn zip<D, P>(devices: &[D], ports: &[P]) -> Result<Vec<Self>>
    where
        D: AsRef<str>,
        P: AsRef<str>,
    {
        if devices.len() != ports.len() {
            return Err(DriverError::invalid_input(format!(
                "device and port lists must have the same length ({} devices, {} ports)",
                devices.len(),
                ports.len()
            ))
            .into());
        }
        Ok(devices
            .iter()
            .zip(ports)
            .map(|(device, port)| Self::new(device.as_ref(), port.as_ref()))
            .collect())
    }

    fn render(&self, side: &str) -> Result<String> {
        if self.device.contains('/') {
            return Ok(self.device.clone());
        }
        match &self.port {
            Some(port) if !port.is_empty() => Ok(format!("{}/{}", self.device, port)),
            _ => {
                error!("You must specify the {} port", side);
                Err(DriverError::invalid_input(format!("You must specify the {} port", side)).into())
            }
        }
    }
}

impl From<&str> for ConnectPoint {
    fn from(device: &str) -> Self {
        Self::device(device)
    }
}

/// Optional match and action fields of an intent.
///
/// Only the fields that were set become flags; the flags always come out in
/// the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentOptions {
    eth_type: Option<String>,
    eth_src: Option<String>,
    eth_dst: Option<String>,
    bandwidth: Option<String>,
    lambda: bool,
    ip_proto: Option<String>,
    ip_src: Option<String>,
    ip_dst: Option<String>,
    tcp_src: Option<String>,
    tcp_dst: Option<String>,
    set_eth_src: Option<String>,
    set_eth_dst: Option<String>,
    ingress_label: Option<String>,
    egress_label: Option<String>,
    priority: Option<String>,
}

macro_rules! option_setters {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(mut self, value: impl Into<String>) -> Self {
                self.$name = Some(value.into());
                self
            }
        )*
    };
}

impl IntentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    option_setters! {
        /// `--ethType`
        eth_type,
        /// `--ethSrc`
        eth_src,
        /// `--ethDst`
        eth_dst,
        /// `--bandwidth`
        bandwidth,
        /// `--ipProto`
        ip_proto,
        /// `--ipSrc`
        ip_src,
        /// `--ipDst`
        ip_dst,
        /// `--tcpSrc`
        tcp_src,
        /// `--tcpDst`
        tcp_dst,
        /// `--setEthSrc`
        set_eth_src,
        /// `--setEthDst`
        set_eth_dst,
        /// `--ingressLabel`
        ingress_label,
        /// `--egressLabel`
        egress_label,
        /// `--priority`
        priority,
    }

    /// `--lambda`: allocate a lambda for the intent.
    pub fn lambda(mut self, allocate: bool) -> Self {
        self.lambda = allocate;
        self
    }

    fn flags(&self) -> String {
        let mut flags = String::new();
        push_flag(&mut flags, "ethType", &self.eth_type);
        push_flag(&mut flags, "ethSrc", &self.eth_src);
        push_flag(&mut flags, "ethDst", &self.eth_dst);
        push_flag(&mut flags, "bandwidth", &self.bandwidth);
        if self.lambda {
            flags.push_str(" --lambda");
        }
        push_flag(&mut flags, "ipProto", &self.ip_proto);
        push_flag(&mut flags, "ipSrc", &self.ip_src);
        push_flag(&mut flags, "ipDst", &self.ip_dst);
        push_flag(&mut flags, "tcpSrc", &self.tcp_src);
        push_flag(&mut flags, "tcpDst", &self.tcp_dst);
        push_flag(&mut flags, "setEthSrc", &self.set_eth_src);
        push_flag(&mut flags, "setEthDst", &self.set_eth_dst);
        push_flag(&mut flags, "ingressLabel", &self.ingress_label);
        push_flag(&mut flags, "egressLabel", &self.egress_label);
        push_flag(&mut flags, "priority", &self.priority);
        flags
    }
}

fn push_flag(flags: &mut String, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        flags.push_str(&format!(" --{} {}", name, value));
    }
}

/// State of one intent found in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentStateEntry {
    pub id: String,
    pub state: String,
}

/// Look up each id in the listing, skipping the ones that are missing.
fn lookup_states<S: AsRef<str>>(intents: &[Intent], ids: &[S]) -> Vec<IntentStateEntry> {
    ids.iter()
        .filter_map(|id| {
            let id = id.as_ref();
            intents
                .iter()
                .find(|intent| same_intent_id(&intent.id, id))
                .map(|intent| IntentStateEntry {
                    id: id.to_string(),
                    state: intent.state.clone(),
                })
        })
        .collect()
}

fn count_states(intents: &[Intent]) -> IndexMap<String, usize> {
    let mut summary = IndexMap::new();
    for intent in intents {
        *summary.entry(intent.state.clone()).or_insert(0) += 1;
    }
    summary
}

/// Latency figures from `push-test-intents` lines like `Intent install: 32 ms`.
fn push_latencies(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_once(": "))
        .filter_map(|(_, rest)| rest.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

impl<T: Transport> OnosCliDriver<T> {
    /// Send an intent command and return the id of the new intent.
    async fn submit_intent(&mut self, command: &str) -> Result<String> {
        let response = self.checked(command).await?;
        match extract_intent_id(&response.result) {
            Some(id) => {
                info!("{}: intent 0x{} installed", self.name(), id);
                Ok(id)
            }
            None => {
                error!("{}: no intent id in response to '{}'", self.name(), command);
                Err(CommandError::IntentIdNotFound {
                    command: command.to_string(),
                    output: response.result,
                }
                .into())
            }
        }
    }

    /// `add-host-intent <one> <two>`: a bidirectional host-to-host intent.
    pub async fn add_host_intent(&mut self, host_one: &str, host_two: &str) -> Result<String> {
        self.submit_intent(&format!("add-host-intent {} {}", host_one, host_two))
            .await
    }

    /// `add-optical-intent <ingress> <egress>`
    pub async fn add_optical_intent(&mut self, ingress_device: &str, egress_device: &str) -> Result<String> {
        self.submit_intent(&format!("add-optical-intent {} {}", ingress_device, egress_device))
            .await
    }

    /// `add-point-intent [flags] <ingress> <egress>`
    pub async fn add_point_intent(
        &mut self,
        ingress: &ConnectPoint,
        egress: &ConnectPoint,
        options: &IntentOptions,
    ) -> Result<String> {
        let command = format!(
            "add-point-intent{} {} {}",
            options.flags(),
            ingress.render("ingress")?,
            egress.render("egress")?
        );
        self.submit_intent(&command).await
    }

    /// `add-multi-to-single-intent [flags] <ingress>... <egress>`
    pub async fn add_multi_to_single_intent(
        &mut self,
        ingress: &[ConnectPoint],
        egress: &ConnectPoint,
        options: &IntentOptions,
    ) -> Result<String> {
        let mut command = format!("add-multi-to-single-intent{}", options.flags());
        for point in ingress {
            command.push(' ');
            command.push_str(&point.render("ingress")?);
        }
        command.push(' ');
        command.push_str(&egress.render("egress")?);
        self.submit_intent(&command).await
    }

    /// `add-single-to-multi-intent [flags] <ingress> <egress>...`
    pub async fn add_single_to_multi_intent(
        &mut self,
        ingress: &ConnectPoint,
        egress: &[ConnectPoint],
        options: &IntentOptions,
    ) -> Result<String> {
        let mut command = format!(
            "add-single-to-multi-intent{} {}",
            options.flags(),
            ingress.render("ingress")?
        );
        for point in egress {
            command.push(' ');
            command.push_str(&point.render("egress")?);
        }
        self.submit_intent(&command).await
    }

    /// `add-mpls-intent [flags] <ingress> <egress>`
    pub async fn add_mpls_intent(
        &mut self,
        ingress: &ConnectPoint,
        egress: &ConnectPoint,
        options: &IntentOptions,
    ) -> Result<String> {
        let command = format!(
            "add-mpls-intent{} {} {}",
            options.flags(),
            ingress.render("ingress")?,
            egress.render("egress")?
        );
        self.submit_intent(&command).await
    }

    /// `remove-intent [-p] [-s] <app> <id>`
    ///
    /// `app` defaults to [`CLI_APP`]. Returns the console output.
    pub async fn remove_intent(
        &mut self,
        intent_id: &str,
        app: Option<&str>,
        purge: bool,
        sync: bool,
    ) -> Result<String> {
        let mut command = String::from("remove-intent");
        if purge {
            command.push_str(" -p");
        }
        if sync {
            command.push_str(" -s");
        }
        command.push_str(&format!(" {} {}", app.unwrap_or(CLI_APP), intent_id));
        Ok(self.checked(&command).await?.result)
    }

    /// `purge-intents`: drop every withdrawn intent from the store.
    pub async fn purge_withdrawn_intents(&mut self) -> Result<()> {
        self.checked("purge-intents").await?;
        Ok(())
    }

    /// `intents [-j]`
    pub async fn intents(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("intents", json)).await
    }

    /// `intents -j`, decoded.
    pub async fn intents_json(&mut self) -> Result<Vec<Intent>> {
        let output = self.intents(true).await?;
        parse_intents(&output)
    }

    /// State of one intent, or `None` if it is not in the listing.
    pub async fn intent_state(&mut self, intent_id: &str) -> Result<Option<String>> {
        let intents = self.intents_json().await?;
        let state = lookup_states(&intents, &[intent_id]).pop().map(|entry| entry.state);
        if state.is_none() {
            info!("{}: cannot find intent id {} in the listing", self.name(), intent_id);
        }
        Ok(state)
    }

    /// States of the intents that are in the listing, in the order asked.
    ///
    /// Ids that are missing are left out, so the result may be shorter
    /// than `ids`.
    pub async fn intent_states<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<Vec<IntentStateEntry>> {
        let intents = self.intents_json().await?;
        let entries = lookup_states(&intents, ids);
        if entries.len() != ids.len() {
            info!(
                "{}: found the state of {} of {} intents",
                self.name(),
                entries.len(),
                ids.len()
            );
        }
        Ok(entries)
    }

    /// Whether every intent is found and in one of `expected`.
    pub async fn check_intent_state<S: AsRef<str>>(&mut self, ids: &[S], expected: &[&str]) -> Result<bool> {
        let entries = self.intent_states(ids).await?;
        if entries.len() != ids.len() {
            warn!("{}: could not get the state of every intent", self.name());
            return Ok(false);
        }

        let mut all_match = true;
        for entry in &entries {
            if !expected.contains(&entry.state.as_str()) {
                debug!(
                    "{}: intent {} is {}, expected {:?}",
                    self.name(),
                    entry.id,
                    entry.state,
                    expected
                );
                all_match = false;
            }
        }
        if all_match {
            info!("{}: all {} intents are in {:?}", self.name(), entries.len(), expected);
        }
        Ok(all_match)
    }

    /// Ids of every intent in the plain `intents` listing.
    pub async fn all_intents_id(&mut self) -> Result<Vec<String>> {
        let output = self.intents(false).await?;
        Ok(output.lines().filter_map(|line| extract_intent_id(line.trim())).collect())
    }

    /// Intent count per state, in the order the states first appear.
    pub async fn intent_summary(&mut self) -> Result<IndexMap<String, usize>> {
        let intents = self.intents_json().await?;
        let summary = count_states(&intents);
        info!("{}: intent summary {:?}", self.name(), summary);
        Ok(summary)
    }

    /// `onos:intents -p [-j]`: intents still pending.
    pub async fn pending_map(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("onos:intents -p", json)).await
    }

    /// `push-test-intents <src> <dst> <count> [<multiplier> [<app id>]]`
    ///
    /// Returns the latency figures the command reports, one per line.
    pub async fn push_test_intents(
        &mut self,
        dpid_src: &str,
        dpid_dst: &str,
        count: u32,
        multiplier: Option<u32>,
        app_id: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut command = format!("push-test-intents {} {} {}", dpid_src, dpid_dst, count);
        match (multiplier, app_id) {
            (Some(multiplier), Some(app_id)) => command.push_str(&format!(" {} {}", multiplier, app_id)),
            (Some(multiplier), None) => command.push_str(&format!(" {}", multiplier)),
            (None, Some(_)) => {
                return Err(DriverError::invalid_input("an app id needs a multiplier").into());
            }
            (None, None) => {}
        }

        let output = self.checked(&command).await?.result;
        let latencies = push_latencies(&output);
        info!("{}: push-test-intents latencies {:?}", self.name(), latencies);
        Ok(latencies)
    }

    /// `intents-events-metrics [-j]`
    pub async fn intents_events_metrics(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("intents-events-metrics", json)).await
    }

    /// `topology-events-metrics [-j]`, `{}` when JSON was asked for and
    /// nothing came back.
    pub async fn topology_events_metrics(&mut self, json: bool) -> Result<String> {
        let output = self.query(&with_json("topology-events-metrics", json)).await?;
        if output.is_empty() && json {
            return Ok("{}".to_string());
        }
        Ok(output)
    }

    /// `routes [-j]` (needs the SDN-IP application).
    pub async fn routes(&mut self, json: bool) -> Result<String> {
        self.query(&with_json("routes", json)).await
    }
}

/// Decode an `intents -j` listing fetched earlier.
pub fn parse_intents(output: &str) -> Result<Vec<Intent>> {
    parse_json("intents -j", output)
}
