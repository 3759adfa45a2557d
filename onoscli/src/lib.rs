//! # onoscli
//!
//! Async driver for the ONOS controller console, for functional test
//! harnesses.
//!
//! onoscli logs into a bench machine over SSH, starts the ONOS console
//! (`onos -w <controller>`) and turns console commands into typed results:
//! cluster nodes, devices, hosts, intents, flows, applications and the
//! distributed set/counter test primitives.
//!
//! ## Features
//!
//! - Async SSH connections via russh
//! - Prompt tracking between the bash shell (`$`) and the console (`onos>`)
//! - Echo and terminal-noise cleanup of every response
//! - Recovery from console drops and hung console starts
//! - Bounded polling for eventually-consistent state
//! - Run-level abort handling across several nodes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use onoscli::DriverBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), onoscli::Error> {
//!     let mut driver = DriverBuilder::new("10.128.20.11")
//!         .name("ONOScli1")
//!         .username("sdn")
//!         .password("rocks")
//!         .build()?;
//!
//!     driver.open().await?;
//!     driver.start_onos_cli("10.128.20.11", None).await?;
//!
//!     println!("{}", driver.nodes(false).await?);
//!     driver.activate_app("org.onosproject.fwd", true).await?;
//!
//!     driver.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod harness;
pub mod poll;
pub mod transport;

// Re-export main types for convenience
pub use commands::{AppState, ConnectPoint, IntentOptions};
pub use config::NodeParams;
pub use driver::{ConsoleState, DriverBuilder, OnosCliDriver, Response, Timeouts};
pub use error::{Error, Result};
pub use harness::{Run, RunAborted};
pub use poll::PollPolicy;
pub use transport::{AuthMethod, SshConfig, Transport};
