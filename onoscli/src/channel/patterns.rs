//! Prompt patterns for the bench shell and the ONOS console.

use regex::bytes::Regex;

use crate::error::Result;

/// The bench machine's shell prompt: a `user@host:dir$ ` line that ends
/// the output.
pub const OUTER_PROMPT: &str = r"(?m)^[\w.-]+@[\w.-]+:[^\r\n]*\$[ \t]*\z";

/// The Karaf console prompt.
pub const INNER_PROMPT: &str = "onos>";

/// What ssh prints when the remote shell exits.
pub const CONNECTION_CLOSED: &str = "closed";

/// Compiled prompt patterns shared by a session.
#[derive(Debug, Clone)]
pub struct Prompts {
    /// Shell prompt.
    pub outer: Regex,

    /// Console prompt.
    pub inner: Regex,

    /// Remote shell gone.
    pub closed: Regex,
}

impl Prompts {
    /// Compile the default prompt set.
    pub fn new() -> Result<Self> {
        Self::with_patterns(OUTER_PROMPT, INNER_PROMPT)
    }

    /// Compile a prompt set with custom shell and console patterns.
    pub fn with_patterns(outer: &str, inner: &str) -> Result<Self> {
        Ok(Self {
            outer: compile(outer)?,
            inner: compile(inner)?,
            closed: compile(CONNECTION_CLOSED)?,
        })
    }
}

/// Compile a pattern, mapping failures to a channel error.
pub fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| crate::error::ChannelError::InvalidPattern(e).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_prompt_only_at_end() {
        let prompts = Prompts::new().unwrap();
        assert!(prompts.outer.is_match(b"sdn@bench:~/onos$ "));
        assert!(prompts.outer.is_match(b"Last login: Mon\r\nsdn@bench:~/onos$ "));
        assert!(!prompts.outer.is_match(b"price $5 today\r\nmore"));
    }

    #[test]
    fn test_dollar_in_console_output_is_not_a_prompt() {
        let prompts = Prompts::new().unwrap();
        // A read that stops right after a `$` inside a response
        assert!(!prompts.outer.is_match(b"cfg get\r\r\nvalue=$"));
        assert!(!prompts.outer.is_match(b" flows\r\r\nselector=[ETH_TYPE:ipv4] cost $ "));
        assert!(!prompts.outer.is_match(b"sdn@bench:~/onos$ ls\r\nREADME"));
    }

    #[test]
    fn test_inner_prompt() {
        let prompts = Prompts::new().unwrap();
        assert!(prompts.inner.is_match(b"\r\r\nonos> "));
        assert!(!prompts.inner.is_match(b"sdn@bench:~/onos$ "));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Prompts::with_patterns("(", INNER_PROMPT).is_err());
    }
}
