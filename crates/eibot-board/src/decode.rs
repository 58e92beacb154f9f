//! Reply classification and field parsing.

use std::str::FromStr;

use tracing::error;

use crate::error::{BoardError, ErrorCode, Result};

/// Classify a reply line as payload or as a device/host error.
///
/// Device errors are `!` plus one digit, with or without a separator before
/// the message (`!4 Err: ...`, `!4,...`, `!4Err: ...`). The host sentinels
/// `CE`/`RE` must be followed by a space or the end of the line. The message
/// is whatever follows the sentinel and one optional separator.
pub fn decode_reply(line: &str) -> Result<&str> {
    let Some((sentinel, message)) = split_sentinel(line) else {
        return Ok(line);
    };

    match ErrorCode::from_sentinel(sentinel) {
        Some(code) => Err(BoardError::Protocol {
            code,
            message: message.to_string(),
        }),
        None => {
            error!(%line, sentinel, "board sent an unmapped error sentinel");
            Err(BoardError::parse(line, format!("unknown error sentinel {sentinel:?}")))
        }
    }
}

fn split_sentinel(line: &str) -> Option<(&str, &str)> {
    let bytes = line.as_bytes();
    if bytes.first() == Some(&b'!') {
        let (head, rest) = if bytes.get(1).is_some_and(u8::is_ascii_digit) {
            line.split_at(2)
        } else {
            line.split_once(' ').unwrap_or((line, ""))
        };
        let rest = rest
            .strip_prefix(|c: char| c == ' ' || c == ',')
            .unwrap_or(rest);
        return Some((head, rest));
    }

    let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
    if head == "CE" || head == "RE" {
        Some((head, rest))
    } else {
        None
    }
}

/// Split a reply into trimmed comma-separated fields.
pub(crate) fn fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

/// Parse one field, naming it in the failure.
pub(crate) fn parse_field<T: FromStr>(line: &str, field: &str, what: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    field
        .parse()
        .map_err(|err| BoardError::parse(line, format!("{what}: {err}")))
}

/// Parse a `0`/`1` flag.
pub(crate) fn parse_flag(line: &str, field: &str) -> Result<bool> {
    match field {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(BoardError::parse(line, format!("expected 0 or 1, got {other:?}"))),
    }
}

/// Parse `TAG,v1,v2,...`, checking the tag case-insensitively.
pub(crate) fn parse_tagged<T: FromStr>(line: &str, tag: &str) -> Result<Vec<T>>
where
    T::Err: std::fmt::Display,
{
    let fields = fields(line);
    match fields.split_first() {
        Some((first, values)) if first.eq_ignore_ascii_case(tag) => values
            .iter()
            .filter(|value| !value.is_empty())
            .map(|value| parse_field(line, value, "value"))
            .collect(),
        _ => Err(BoardError::parse(line, format!("expected {tag} reply"))),
    }
}
