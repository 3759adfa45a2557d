//! Channel layer for pattern matching on the shell stream.
//!
//! This module turns a raw transport into an expect-style session:
//! send a line, then wait for the first of several prompts.

mod buffer;
mod patterns;
mod session;

pub use buffer::{Found, PatternBuffer};
pub use patterns::{CONNECTION_CLOSED, INNER_PROMPT, OUTER_PROMPT, Prompts};
pub use session::{Expect, Session};
