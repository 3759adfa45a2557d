//! Output cleaning for console responses.
//!
//! Karaf colours its output and ends lines with `\r\r\n`; the shell echoes
//! every command back before the answer. Cleaning removes all three.

use std::sync::LazyLock;

use regex::Regex;

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b[^m]*m").expect("valid ANSI pattern"));

static CARRIAGE_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\r").expect("valid carriage return pattern"));

/// Remove colour codes and carriage-return artifacts, then trim.
pub fn strip_noise(raw: &str) -> String {
    let text = ANSI_ESCAPE.replace_all(raw, "");
    let text = CARRIAGE_NOISE.replace_all(&text, "");
    text.trim().to_string()
}

/// Clean a raw response and drop everything through the echoed command.
///
/// Returns `None` when the echo is not in the output.
pub fn clean_response(raw: &str, command: &str) -> Option<String> {
    let text = strip_noise(raw);
    let echo = command.trim();
    if echo.is_empty() {
        return Some(text);
    }
    text.split_once(echo)
        .map(|(_, answer)| answer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_echo_and_line_noise() {
        let raw = " summary\r\r\nnode=10.0.0.1, version=1.5.0\r\r\ndevices=3\r\r\n";
        assert_eq!(
            clean_response(raw, "summary").unwrap(),
            "node=10.0.0.1, version=1.5.0\ndevices=3"
        );
    }

    #[test]
    fn test_strips_colour_codes() {
        let raw = "apps -a\r\r\n\x1b[1m\x1b[32m*\x1b[0m id=7, name=org.onosproject.fwd\r\r\n";
        let cleaned = clean_response(raw, "apps -a").unwrap();
        assert_eq!(cleaned, "* id=7, name=org.onosproject.fwd");
        assert!(!cleaned.contains('\x1b'));
    }

    #[test]
    fn test_missing_echo() {
        assert_eq!(clean_response("\r\r\nonos", "nodes"), None);
    }

    #[test]
    fn test_only_first_echo_is_removed() {
        let raw = "log:log nodes\r\r\nnodes";
        assert_eq!(clean_response(raw, "nodes").unwrap(), "nodes");
        let raw = "echo nodes\r\nsaid nodes\r\n";
        assert_eq!(clean_response(raw, "echo nodes").unwrap(), "said nodes");
    }

    #[test]
    fn test_empty_command_keeps_everything() {
        assert_eq!(clean_response("\r\r\n", ""), Some(String::new()));
    }
}
