//! Application lifecycle: status, activate, deactivate, uninstall.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use log::{debug, error, info, warn};

use super::model::{App, AppId};
use super::{parse_json, with_json};
use crate::driver::OnosCliDriver;
use crate::error::{CommandError, DriverError, Error, Result};
use crate::transport::Transport;

/// Where an application stands on the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    Active,
    Installed,
    /// Not in the `onos:apps` listing.
    Uninstalled,
    /// A state this crate does not know about.
    Other(String),
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppState::Active => write!(f, "ACTIVE"),
            AppState::Installed => write!(f, "INSTALLED"),
            AppState::Uninstalled => write!(f, "UNINSTALLED"),
            AppState::Other(state) => write!(f, "{}", state),
        }
    }
}

/// State of `name` in an `onos:apps -j` listing.
pub fn app_status_from(apps: &[App], name: &str) -> AppState {
    let state = apps
        .iter()
        .find(|app| app.name.as_deref() == Some(name))
        .and_then(|app| app.state.as_deref());
    match state {
        Some("ACTIVE") => AppState::Active,
        Some("INSTALLED") => AppState::Installed,
        None => AppState::Uninstalled,
        Some(other) => {
            error!("unexpected state from 'onos:apps': {}", other);
            AppState::Other(other.to_string())
        }
    }
}

/// Argument of `onos:app`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Activate,
    Deactivate,
    Uninstall,
}

impl AppAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppAction::Activate => "activate",
            AppAction::Deactivate => "deactivate",
            AppAction::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for AppAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "activate" => Ok(AppAction::Activate),
            "deactivate" => Ok(AppAction::Deactivate),
            "uninstall" => Ok(AppAction::Uninstall),
            other => {
                error!(
                    "the ONOS app command only takes activate, deactivate or uninstall; was given '{}'",
                    other
                );
                Err(DriverError::invalid_input(format!("unknown app action '{}'", other)).into())
            }
        }
    }
}

/// Check that `apps` and `app-ids` agree and that `app-ids` has no duplicates.
fn ids_consistent(apps: &[App], ids: &[AppId]) -> bool {
    let mut consistent = true;

    for app in apps {
        let (Some(app_id), Some(name)) = (app.id, app.name.as_deref()) else {
            error!("error parsing app: {:?}", app);
            consistent = false;
            continue;
        };
        let registered: Vec<&AppId> = ids.iter().filter(|entry| entry.id == app_id).collect();
        match registered.as_slice() {
            [] => {
                error!("'app-ids' does not have the id for {} that 'apps' does", name);
                consistent = false;
            }
            [entry] if entry.name != name => {
                error!(
                    "'app-ids' has {} registered under id {} but 'apps' has {}",
                    entry.name, app_id, name
                );
                consistent = false;
            }
            [_] => {}
            _ => consistent = false,
        }
    }

    let unique_ids: HashSet<i64> = ids.iter().map(|entry| entry.id).collect();
    let unique_names: HashSet<&str> = ids.iter().map(|entry| entry.name.as_str()).collect();
    if unique_ids.len() != ids.len() || unique_names.len() != ids.len() {
        error!("'app-ids' has some duplicate entries: {:?}", ids);
        consistent = false;
    }
    consistent
}

impl<T: Transport> OnosCliDriver<T> {
    /// `onos:apps [-j]`
    pub async fn apps(&mut self, json: bool) -> Result<String> {
        self.listing_without_failure(&with_json("onos:apps", json)).await
    }

    /// `app-ids [-j]`
    pub async fn app_ids(&mut self, json: bool) -> Result<String> {
        self.listing_without_failure(&with_json("app-ids", json)).await
    }

    async fn listing_without_failure(&mut self, command: &str) -> Result<String> {
        let output = self.query(command).await?;
        if output.contains("Error executing command") {
            error!("{}: error in processing '{}': {}", self.name(), command, output);
            return Err(CommandError::ErrorMarker {
                command: command.to_string(),
                output,
            }
            .into());
        }
        Ok(output)
    }

    /// State of one application.
    pub async fn app_status(&mut self, name: &str) -> Result<AppState> {
        let output = self.apps(true).await?;
        let apps: Vec<App> = parse_json("onos:apps -j", &output)?;
        Ok(app_status_from(&apps, name))
    }

    /// `onos:app <action> <name>`
    ///
    /// The action is checked before anything is sent.
    pub async fn app(&mut self, name: &str, action: &str) -> Result<()> {
        let action: AppAction = action.parse()?;
        self.app_action(name, action).await
    }

    async fn app_action(&mut self, name: &str, action: AppAction) -> Result<()> {
        let command = format!("onos:app {} {}", action, name);
        let output = self.query(&command).await?;

        if output.contains("Error executing command") || output.contains("No such application") {
            error!("{}: '{}' failed: {}", self.name(), command, output);
            return Err(CommandError::ErrorMarker { command, output }.into());
        }
        if output.contains("Command not found:") {
            error!("{}: '{}' failed: {}", self.name(), command, output);
            return Err(CommandError::NotInstalled { command }.into());
        }
        if output.contains("Unsupported command:") {
            error!("{}: incorrect command given to 'app': {}", self.name(), output);
        }
        Ok(())
    }

    /// Issue `action` and, with `check`, wait for the app to reach `target`.
    async fn transition(&mut self, name: &str, action: AppAction, target: AppState, check: bool) -> Result<()> {
        self.app_action(name, action).await?;
        if !check {
            return Ok(());
        }

        let policy = self.app_poll();
        let reached = policy
            .until(async || {
                let status = self.app_status(name).await?;
                debug!("{}: application {} is {}", self.name(), name, status);
                Ok(status == target)
            })
            .await?;
        if reached {
            info!("{}: application {} is {}", self.name(), name, target);
            Ok(())
        } else {
            error!("{}: application {} never became {}", self.name(), name, target);
            Err(CommandError::NotConverged {
                what: format!("{} {}", action, name),
                attempts: policy.attempts,
            }
            .into())
        }
    }

    /// Activate an installed application.
    ///
    /// An application that is already active is left alone.
    pub async fn activate_app(&mut self, name: &str, check: bool) -> Result<()> {
        match self.app_status(name).await? {
            AppState::Installed => {
                self.transition(name, AppAction::Activate, AppState::Active, check)
                    .await
            }
            AppState::Active => Ok(()),
            from => {
                error!("{}: tried to activate application {} while it is {}", self.name(), name, from);
                Err(CommandError::InvalidTransition {
                    app: name.to_string(),
                    from,
                    action: "activate",
                }
                .into())
            }
        }
    }

    /// Deactivate an active application.
    pub async fn deactivate_app(&mut self, name: &str, check: bool) -> Result<()> {
        match self.app_status(name).await? {
            AppState::Installed => Ok(()),
            AppState::Active => {
                self.transition(name, AppAction::Deactivate, AppState::Installed, check)
                    .await
            }
            AppState::Uninstalled => {
                warn!("{}: tried to deactivate application {} which is not installed", self.name(), name);
                Ok(())
            }
            from => Err(CommandError::InvalidTransition {
                app: name.to_string(),
                from,
                action: "deactivate",
            }
            .into()),
        }
    }

    /// Uninstall an application, deactivating it on the way if needed.
    pub async fn uninstall_app(&mut self, name: &str, check: bool) -> Result<()> {
        match self.app_status(name).await? {
            AppState::Installed => {
                self.transition(name, AppAction::Uninstall, AppState::Uninstalled, check)
                    .await
            }
            AppState::Active => {
                warn!("{}: tried to uninstall application {} which is currently active", self.name(), name);
                self.transition(name, AppAction::Uninstall, AppState::Uninstalled, check)
                    .await
            }
            AppState::Uninstalled => Ok(()),
            from => Err(CommandError::InvalidTransition {
                app: name.to_string(),
                from,
                action: "uninstall",
            }
            .into()),
        }
    }

    /// Whether every application's id in `onos:apps` matches `app-ids`.
    pub async fn app_to_id_check(&mut self) -> Result<bool> {
        let ids_output = self.app_ids(true).await?;
        let apps_output = self.apps(true).await?;
        if ids_output.is_empty() || apps_output.is_empty() {
            error!("{}: app-ids or apps returned nothing", self.name());
            return Ok(false);
        }
        let ids: Vec<AppId> = parse_json("app-ids -j", &ids_output)?;
        let apps: Vec<App> = parse_json("onos:apps -j", &apps_output)?;
        Ok(ids_consistent(&apps, &ids))
    }
}
