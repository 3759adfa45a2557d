//! High-level driver for the ONOS console.
//!
//! The driver layer owns the session, tracks which prompt it sits at and
//! implements the command/response protocol every console command goes
//! through. The typed controller commands live in [`crate::commands`].

mod builder;
mod console;
mod normalize;
pub(crate) mod onos;
pub(crate) mod response;

pub use builder::{DriverBuilder, Timeouts};
pub use console::ConsoleState;
pub use normalize::{clean_response, strip_noise};
pub use onos::OnosCliDriver;
pub use response::{ERROR_MARKER, Response};
