//! Distributed set test primitives (`set-test-add`, `set-test-remove`,
//! `set-test-get`).

use log::{debug, error, info};
use regex::Regex;

use crate::driver::OnosCliDriver;
use crate::error::{ChannelError, CommandError, DriverError, Result};
use crate::transport::Transport;

/// What `set-test-get` reported for a membership query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetMembership {
    /// Every element of the set.
    pub items: Vec<String>,
    /// Whether all the queried values are in the set.
    pub contains: bool,
}

fn pattern(text: &str) -> Result<Regex> {
    Ok(Regex::new(text).map_err(ChannelError::from)?)
}

/// Elements of a `[a, b, c]` listing.
fn split_items(listing: &str) -> Vec<String> {
    if listing.is_empty() {
        Vec::new()
    } else {
        listing.split(", ").map(str::to_string).collect()
    }
}

fn unexpected(command: String, output: String) -> crate::Error {
    error!("'{}' did not match expected output", command);
    debug!("actual: {:?}", output);
    CommandError::UnexpectedResponse { command, output }.into()
}

/// Match `positive` then `negative` against `output`.
fn decide(command: String, output: String, positive: &Regex, negative: &Regex) -> Result<bool> {
    if positive.is_match(&output) {
        Ok(true)
    } else if negative.is_match(&output) {
        Ok(false)
    } else {
        Err(unexpected(command, output))
    }
}

/// Membership commands need at least one value to act on.
fn require_values(command: &str, values: &[&str]) -> Result<()> {
    if values.is_empty() {
        return Err(DriverError::invalid_input(format!("{} needs at least one value", command)).into());
    }
    Ok(())
}

impl<T: Transport> OnosCliDriver<T> {
    /// `set-test-add <set> <values>`
    ///
    /// `Ok(true)` when the values were added, `Ok(false)` when they were
    /// already in the set.
    pub async fn set_test_add(&mut self, set: &str, values: &[&str]) -> Result<bool> {
        require_values("set-test-add", values)?;
        let command = format!("set-test-add {} {}", set, values.join(" "));
        let output = self.send_primitive(&command).await?;
        let name = regex::escape(set);
        decide(
            command,
            output,
            &pattern(&format!(r"\[(.*)\] was added to the set {}", name))?,
            &pattern(&format!(r"\[(.*)\] was already in set {}", name))?,
        )
    }

    /// `set-test-remove <set> <values>`
    ///
    /// `Ok(false)` when none of the values were in the set.
    pub async fn set_test_remove(&mut self, set: &str, values: &[&str]) -> Result<bool> {
        require_values("set-test-remove", values)?;
        let command = format!("set-test-remove {} {}", set, values.join(" "));
        let output = self.send_primitive(&command).await?;
        let name = regex::escape(set);
        let negative = if values.len() == 1 {
            format!(r"\[(.*)\] was not in set {}", name)
        } else {
            format!(r"No element of \[(.*)\] was in set {}", name)
        };
        decide(
            command,
            output,
            &pattern(&format!(r"\[(.*)\] was removed from the set {}", name))?,
            &pattern(&negative)?,
        )
    }

    /// `set-test-remove -r <set> <values>`: keep only `values`.
    ///
    /// `Ok(false)` when the set did not change.
    pub async fn set_test_retain(&mut self, set: &str, values: &[&str]) -> Result<bool> {
        require_values("set-test-remove -r", values)?;
        let command = format!("set-test-remove -r {} {}", set, values.join(" "));
        let output = self.send_primitive(&command).await?;
        let name = regex::escape(set);
        decide(
            command,
            output,
            &pattern(&format!(r"{} was pruned to contain only elements of set \[(.*)\]", name))?,
            &pattern(&format!(
                r"{} was not changed by retaining only elements of the set \[(.*)\]",
                name
            ))?,
        )
    }

    /// `set-test-remove -c <set>`
    pub async fn set_test_clear(&mut self, set: &str) -> Result<()> {
        let command = format!("set-test-remove -c {}", set);
        let output = self.send_primitive(&command).await?;
        if output.contains(&format!("Set {} cleared", set)) {
            Ok(())
        } else {
            Err(unexpected(command, output))
        }
    }

    /// `set-test-get <set>`: every element of the set.
    pub async fn set_test_get(&mut self, set: &str) -> Result<Vec<String>> {
        let command = format!("set-test-get {}", set);
        let output = self.send_primitive(&command).await?;
        let listing = pattern(&format!(r"Items in set {}:\n\[(.*)\]", regex::escape(set)))?;
        match listing.captures(&output) {
            Some(caps) => Ok(split_items(&caps[1])),
            None => Err(unexpected(command, output)),
        }
    }

    /// `set-test-get <set> <values>`: the set's elements and whether it
    /// holds all of `values`.
    pub async fn set_test_contains(&mut self, set: &str, values: &[&str]) -> Result<SetMembership> {
        require_values("set-test-get", values)?;
        let joined = values.join(" ");
        let command = format!("set-test-get {} {}", set, joined);
        let output = self.send_primitive(&command).await?;

        let name = regex::escape(set);
        let listing = format!(r"Items in set {}:\n\[(.*)\]", name);
        let (contains, missing) = if values.len() == 1 {
            (
                format!(r"{}\nSet {} contains the value {}", listing, name, regex::escape(&joined)),
                format!(r"{}\nSet {} did not contain the value {}", listing, name, regex::escape(&joined)),
            )
        } else {
            // The console really does print "the the"
            (
                format!(r"{}\nSet {} contains the the subset \[(.*)\]", listing, name),
                format!(r"{}\nSet {} did not contain the the subset \[(.*)\]", listing, name),
            )
        };

        for (regex, holds) in [(pattern(&contains)?, true), (pattern(&missing)?, false)] {
            if let Some(caps) = regex.captures(&output) {
                return Ok(SetMembership {
                    items: split_items(&caps[1]),
                    contains: holds,
                });
            }
        }
        Err(unexpected(command, output))
    }

    /// `set-test-get -s <set>`: the size the controller reports.
    pub async fn set_test_size(&mut self, set: &str) -> Result<usize> {
        let command = format!("set-test-get -s {}", set);
        let output = self.send_primitive(&command).await?;
        let sized = pattern(&format!(
            r"There are (\d+) items in set {}:\n\[(.*)\]",
            regex::escape(set)
        ))?;

        let Some((size, listed)) = sized.captures(&output).and_then(|caps| {
            let size = caps[1].parse::<usize>().ok()?;
            Some((size, caps[2].split_whitespace().count()))
        }) else {
            return Err(unexpected(command, output));
        };

        if listed == size {
            info!("{}: the size of {} matches the number of elements returned", self.name(), set);
        } else {
            error!(
                "{}: {} reports size {} but lists {} elements",
                self.name(),
                set,
                size,
                listed
            );
        }
        Ok(size)
    }
}
