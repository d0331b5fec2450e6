use std::sync::OnceLock;

use regex::Regex;

/// Literal payload the sender broadcasts to find receivers.
pub const DISCOVER_MSG: &str = "DISCOVER";
/// Literal payload the sender sends to bind a transfer to a chosen receiver.
pub const CHOSEN_MSG: &str = "CHOSEN";

fn here_regex() -> &'static Regex {
    static HERE_RE: OnceLock<Regex> = OnceLock::new();
    HERE_RE.get_or_init(|| Regex::new(r"HERE\s(\S+)\s(\d+)\s*").expect("static regex is valid"))
}

/// Parses a `HERE <name> <port>` reply, returning `None` if it doesn't match
/// the expected shape or if the advertised port is `0` or out of `u16` range.
pub fn parse_here_reply(buf: &[u8]) -> Option<(String, u16)> {
    let text = std::str::from_utf8(buf).ok()?;
    let caps = here_regex().captures(text)?;
    let name = caps.get(1)?.as_str().to_string();
    let port: u32 = caps.get(2)?.as_str().parse().ok()?;
    if port == 0 || port > 65535 {
        return None;
    }
    Some((name, port as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_reply() {
        assert_eq!(
            parse_here_reply(b"HERE desktop-1 40001"),
            Some(("desktop-1".to_string(), 40001))
        );
    }

    #[test]
    fn rejects_zero_port() {
        assert_eq!(parse_here_reply(b"HERE desktop-1 0"), None);
    }

    #[test]
    fn rejects_out_of_range_port() {
        assert_eq!(parse_here_reply(b"HERE desktop-1 70000"), None);
    }

    #[test]
    fn rejects_malformed_payload() {
        assert_eq!(parse_here_reply(b"NOT A REPLY"), None);
        assert_eq!(parse_here_reply(b"HERE onlyname"), None);
    }

    #[test]
    fn trailing_whitespace_is_tolerated() {
        assert_eq!(
            parse_here_reply(b"HERE desktop-1 40001 \n"),
            Some(("desktop-1".to_string(), 40001))
        );
    }
}
