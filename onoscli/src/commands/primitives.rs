//! Distributed primitives: the retry contract shared by the test
//! primitive commands, counters and component configuration.
//!
//! Right after a mastership change the store layer answers with an
//! internal exception. Such a command is retried exactly once, after
//! [`Timeouts::transient_retry_delay`](crate::driver::Timeouts).

use log::{error, info};
use regex::Regex;
use serde_json::Value;

use super::{parse_json, with_json};
use crate::driver::OnosCliDriver;
use crate::error::{CommandError, Result};
use crate::transport::Transport;

/// Consistent map exceptions.
const STORE_SERVICE_MARKER: &str = "org.onosproject.store.service";

/// The node is not the leader.
const NOT_LEADER_MARKER: &str = "java.lang.IllegalStateException";

const EXECUTION_ERROR: &str = "Error executing command";

fn is_transient(output: &str) -> bool {
    output.contains(STORE_SERVICE_MARKER) || output.contains(NOT_LEADER_MARKER)
}

/// `counter-test-increment [-g] [-i] <name> [<delta>]`
fn counter_command(counter: &str, delta: i64, in_memory: bool, get_first: bool) -> String {
    let mut command = String::from("counter-test-increment");
    if get_first {
        command.push_str(" -g");
    }
    if in_memory {
        command.push_str(" -i");
    }
    command.push(' ');
    command.push_str(counter);
    if delta != 1 {
        command.push_str(&format!(" {}", delta));
    }
    command
}

/// `cfg [-j|-s] get [<component> [<property>]]`, `-j` winning over `-s`.
fn cfg_get_command(component: Option<&str>, property: Option<&str>, short: bool, json: bool) -> String {
    let mut command = String::from("cfg");
    if json {
        command.push_str(" -j");
    } else if short {
        command.push_str(" -s");
    }
    command.push_str(" get");
    if let Some(component) = component {
        command.push(' ');
        command.push_str(component);
        if let Some(property) = property {
            command.push(' ');
            command.push_str(property);
        }
    }
    command
}

fn cfg_value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl<T: Transport> OnosCliDriver<T> {
    /// Send a primitive command, retrying once after a store hiccup.
    ///
    /// Fails with [`CommandError::Transient`] if the hiccup is still there
    /// after the retry, and on `Error executing command` otherwise.
    pub(crate) async fn send_primitive(&mut self, command: &str) -> Result<String> {
        let mut output = self.query(command).await?;
        if is_transient(&output) {
            let delay = self.timeouts().transient_retry_delay;
            error!("{}: error in processing '{}': {}", self.name(), command, output);
            info!("{}: waiting {:?} before retrying", self.name(), delay);
            tokio::time::sleep(delay).await;

            output = self.query(command).await?;
            if is_transient(&output) {
                error!("{}: '{}' failed again after retry: {}", self.name(), command, output);
                return Err(CommandError::Transient {
                    command: command.to_string(),
                    output,
                }
                .into());
            }
        }

        if output.contains(EXECUTION_ERROR) {
            error!("{}: error in processing '{}': {}", self.name(), command, output);
            return Err(CommandError::ErrorMarker {
                command: command.to_string(),
                output,
            }
            .into());
        }
        info!("{}: {}", self.name(), output);
        Ok(output)
    }

    /// `counters [-j]`
    pub async fn counters(&mut self, json: bool) -> Result<String> {
        let command = with_json("counters", json);
        let output = self.query(&command).await?;
        if output.contains(EXECUTION_ERROR) {
            error!("{}: error in processing 'counters': {}", self.name(), output);
            return Err(CommandError::ErrorMarker { command, output }.into());
        }
        Ok(output)
    }

    /// Add `delta` to a distributed counter, then read it.
    pub async fn counter_test_add_and_get(&mut self, counter: &str, delta: i64, in_memory: bool) -> Result<i64> {
        self.counter_increment(counter, delta, in_memory, false).await
    }

    /// Read a distributed counter, then add `delta` to it.
    pub async fn counter_test_get_and_add(&mut self, counter: &str, delta: i64, in_memory: bool) -> Result<i64> {
        self.counter_increment(counter, delta, in_memory, true).await
    }

    async fn counter_increment(&mut self, counter: &str, delta: i64, in_memory: bool, get_first: bool) -> Result<i64> {
        let command = counter_command(counter, delta, in_memory, get_first);
        let output = self.send_primitive(&command).await?;

        let pattern = Regex::new(&format!(r"{} was updated to (-?\d+)", regex::escape(counter)))
            .map_err(crate::error::ChannelError::from)?;
        pattern
            .captures(&output)
            .and_then(|caps| caps[1].parse::<i64>().ok())
            .ok_or_else(|| {
                error!("{}: '{}' did not match expected output: {:?}", self.name(), command, output);
                CommandError::UnexpectedResponse { command, output }.into()
            })
    }

    /// Read component configuration.
    ///
    /// `property` is only used together with `component`.
    pub async fn get_cfg(
        &mut self,
        component: Option<&str>,
        property: Option<&str>,
        short: bool,
        json: bool,
    ) -> Result<String> {
        self.send_primitive(&cfg_get_command(component, property, short, json))
            .await
    }

    /// `cfg set <component> <property> [<value>]`
    ///
    /// Without a value the property goes back to its default. With a value
    /// and `check`, the property is read back and compared; the result says
    /// whether it took.
    pub async fn set_cfg(
        &mut self,
        component: &str,
        property: &str,
        value: Option<&str>,
        check: bool,
    ) -> Result<bool> {
        let value = value.filter(|v| !v.is_empty());
        let mut command = format!("cfg set {} {}", component, property);
        if let Some(value) = value {
            command.push_str(&format!(" {}", value));
        }
        self.send_primitive(&command).await?;

        let Some(value) = value.filter(|_| check) else {
            return Ok(true);
        };
        let output = self.get_cfg(Some(component), Some(property), false, true).await?;
        let current: Value = parse_json(&cfg_get_command(Some(component), Some(property), false, true), &output)?;
        match current.get("value") {
            Some(current) if cfg_value_as_string(current) == value => Ok(true),
            Some(current) => {
                error!(
                    "{}: {} {} is {} after setting it to {}",
                    self.name(),
                    component,
                    property,
                    current,
                    value
                );
                Ok(false)
            }
            None => {
                error!("{}: no value in cfg output: {:?}", self.name(), output);
                Ok(false)
            }
        }
    }
}
