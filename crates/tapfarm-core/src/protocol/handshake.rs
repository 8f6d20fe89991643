//! Parser for the three-line minitouch handshake.
//!
//! A freshly connected minitouch server writes exactly three
//! newline-terminated lines, in this fixed order:
//!
//! ```text
//! v <protocol_version>
//! ^ <max_contacts> <max_x> <max_y> <max_pressure> [...]
//! $ <pid>
//! ```
//!
//! The `^` line describes the touch panel: how many simultaneous contacts
//! it tracks and the coordinate/pressure ranges it accepts. The `$` line
//! carries the server's on-device PID, which the controller keeps so it can
//! `kill` the process later if closing the socket is not enough.
//!
//! Parsing is strict: a missing tag, a misordered line, or a non-numeric
//! field is a [`ProtocolError::ProtocolViolation`]. There is no recovery —
//! the caller must reconnect or abandon the device.

use thiserror::Error;

/// Errors produced while reading or parsing the handshake.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A handshake line was malformed, missing, or out of order.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

/// Immutable device capabilities read once at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Protocol version from the `v` line (in practice always 1).
    pub version: u32,
    /// Maximum number of simultaneous touch contacts.
    pub max_contacts: u32,
    /// Largest accepted x coordinate.
    pub max_x: u32,
    /// Largest accepted y coordinate.
    pub max_y: u32,
    /// Largest accepted pressure value.
    pub max_pressure: u32,
    /// PID of the minitouch process on the device.
    pub pid: u32,
}

impl Handshake {
    /// Parses the three handshake lines in their fixed order.
    ///
    /// Trailing `\r`/`\n` are stripped; extra fields after the pressure on
    /// the `^` line are ignored (newer minitouch builds append more).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ProtocolViolation`] on any malformed line.
    pub fn parse(v_line: &str, caps_line: &str, pid_line: &str) -> Result<Self, ProtocolError> {
        let version = parse_tagged(v_line, "v", 1)?[0];
        let caps = parse_tagged(caps_line, "^", 4)?;
        let pid = parse_tagged(pid_line, "$", 1)?[0];

        Ok(Self {
            version,
            max_contacts: caps[0],
            max_x: caps[1],
            max_y: caps[2],
            max_pressure: caps[3],
            pid,
        })
    }
}

/// Splits `line` on spaces, checks the leading tag, and parses at least
/// `min_fields` numeric fields after it.
fn parse_tagged(line: &str, tag: &str, min_fields: usize) -> Result<Vec<u32>, ProtocolError> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let mut parts = trimmed.split(' ');

    let got = parts.next().unwrap_or("");
    if got != tag {
        return Err(ProtocolError::ProtocolViolation(format!(
            "expected '{tag}' line, got {trimmed:?}"
        )));
    }

    let fields: Vec<u32> = parts
        .take(min_fields)
        .map(|f| {
            f.parse::<u32>().map_err(|_| {
                ProtocolError::ProtocolViolation(format!(
                    "non-numeric field {f:?} in '{tag}' line {trimmed:?}"
                ))
            })
        })
        .collect::<Result<_, _>>()?;

    if fields.len() < min_fields {
        return Err(ProtocolError::ProtocolViolation(format!(
            "'{tag}' line {trimmed:?} has {} field(s), expected {min_fields}",
            fields.len()
        )));
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixture_handshake() {
        let hs = Handshake::parse("v 1\n", "^ 2 1080 1920 50\n", "$ 4321\n").expect("parse");
        assert_eq!(hs.version, 1);
        assert_eq!(hs.max_contacts, 2);
        assert_eq!(hs.max_x, 1080);
        assert_eq!(hs.max_y, 1920);
        assert_eq!(hs.max_pressure, 50);
        assert_eq!(hs.pid, 4321);
    }

    #[test]
    fn test_parse_strips_carriage_returns() {
        let hs = Handshake::parse("v 1\r\n", "^ 10 32767 32767 255\r\n", "$ 99\r\n").expect("parse");
        assert_eq!(hs.max_contacts, 10);
        assert_eq!(hs.max_pressure, 255);
        assert_eq!(hs.pid, 99);
    }

    #[test]
    fn test_parse_ignores_extra_capability_fields() {
        // Some minitouch builds append extra fields after the pressure.
        let hs = Handshake::parse("v 1", "^ 2 1080 1920 50 7 8", "$ 1").expect("parse");
        assert_eq!(hs.max_x, 1080);
        assert_eq!(hs.max_y, 1920);
    }

    #[test]
    fn test_parse_rejects_misordered_lines() {
        let err = Handshake::parse("^ 2 1080 1920 50", "v 1", "$ 1").unwrap_err();
        assert!(matches!(err, ProtocolError::ProtocolViolation(_)));
    }

    #[test]
    fn test_parse_rejects_short_capability_line() {
        let err = Handshake::parse("v 1", "^ 2 1080", "$ 1").unwrap_err();
        assert!(matches!(err, ProtocolError::ProtocolViolation(_)));
    }

    #[test]
    fn test_parse_rejects_non_numeric_field() {
        let err = Handshake::parse("v 1", "^ 2 abc 1920 50", "$ 1").unwrap_err();
        assert!(matches!(err, ProtocolError::ProtocolViolation(_)));
    }

    #[test]
    fn test_parse_rejects_empty_line() {
        let err = Handshake::parse("", "^ 2 1080 1920 50", "$ 1").unwrap_err();
        assert!(matches!(err, ProtocolError::ProtocolViolation(_)));
    }
}
