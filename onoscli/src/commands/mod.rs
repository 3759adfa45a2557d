//! Typed ONOS console commands.
//!
//! Every command here is a thin layer over [`OnosCliDriver::send`]: build
//! the exact command line, send it, and turn the cleaned output into a
//! typed value. Listings return the console text (JSON when asked for);
//! helpers built on top of them parse it into the types in [`model`].
//!
//! Unless a command has its own response grammar, the `Error` marker in
//! the output is the failure signal.

mod apps;
mod cluster;
mod devices;
mod election;
mod flows;
mod hosts;
mod intents;
pub mod model;
mod primitives;
mod sets;

pub use apps::{AppAction, AppState, app_status_from};
pub use devices::DeviceRole;
pub use flows::flows_all_added;
pub use hosts::{host_id_from_name, hosts_id};
pub use intents::{CLI_APP, ConnectPoint, IntentOptions, IntentStateEntry, extract_intent_id, parse_intents};
pub use sets::SetMembership;

use log::error;
use serde::de::DeserializeOwned;

use crate::driver::{OnosCliDriver, Response};
use crate::error::{CommandError, Result};
use crate::transport::Transport;

/// Append `-j` when JSON output is wanted.
pub(crate) fn with_json(command: &str, json: bool) -> String {
    if json {
        format!("{} -j", command)
    } else {
        command.to_string()
    }
}

/// Decode a JSON listing.
pub(crate) fn parse_json<D: DeserializeOwned>(command: &str, output: &str) -> Result<D> {
    serde_json::from_str(output).map_err(|source| {
        error!("could not decode output of '{}': {:?}", command, output);
        CommandError::Json {
            command: command.to_string(),
            source,
        }
        .into()
    })
}

impl<T: Transport> OnosCliDriver<T> {
    /// Send and return the cleaned output of a listing.
    pub(crate) async fn query(&mut self, command: &str) -> Result<String> {
        Ok(self.send(command).await?.complete()?.result)
    }

    /// Send a command whose only failure signal is the `Error` marker.
    pub(crate) async fn checked(&mut self, command: &str) -> Result<Response> {
        self.send(command).await?.ensure_ok()
    }

    /// Send a listing with `-j` and decode it.
    pub(crate) async fn query_json<D: DeserializeOwned>(&mut self, command: &str) -> Result<D> {
        let command = with_json(command, true);
        let output = self.query(&command).await?;
        parse_json(&command, &output)
    }
}
