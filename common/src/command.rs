use std::{collections::HashMap, num::IntErrorKind};

use log::warn;

use crate::error::ParseError;

const QUERY_MARKER: &str = "/?";
const COLOR_MARKERS: [&str; 3] = ["/?r=", "&g=", "&b="];
const MESSAGE_MARKER: &str = "/?msg=";
const ENCODED_SPACE: &str = "%20";

/// What a single request asks the device to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Raw channel values as sent; clamping happens downstream.
    SetColor { r: i64, g: i64, b: i64 },
    SetMessage { text: String },
    None,
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetColor { .. } => "set-color",
            Self::SetMessage { .. } => "set-message",
            Self::None => "none",
        }
    }

    /// Like [`parse_request`], but a parse failure is logged and degrades to
    /// [`Command::None`].
    pub fn from_request(request: &str) -> Self {
        match parse_request(request) {
            Ok(command) => command,
            Err(err) => {
                warn!("ignoring malformed request: {err}");
                Self::None
            }
        }
    }
}

/// The first line of a raw request, without its line terminator.
pub fn request_line(request: &str) -> &str {
    request
        .split_once('\n')
        .map_or(request, |(line, _)| line)
        .trim_end_matches('\r')
}

/// Classifies a request by the markers on its request line.
///
/// The color form wins over the message form when both are present. Only
/// `%20` is decoded in messages.
pub fn parse_request(request: &str) -> Result<Command, ParseError> {
    let line = request_line(request);

    if COLOR_MARKERS.iter().all(|marker| line.contains(marker)) {
        return parse_color(line);
    }

    if line.contains(MESSAGE_MARKER) {
        return parse_message(line);
    }

    Ok(Command::None)
}

fn parse_color(line: &str) -> Result<Command, ParseError> {
    let query = value_after(line, QUERY_MARKER).ok_or(ParseError::MissingValue(QUERY_MARKER))?;
    let params = query_pairs(query)?;

    Ok(Command::SetColor {
        r: channel(&params, "r")?,
        g: channel(&params, "g")?,
        b: channel(&params, "b")?,
    })
}

fn parse_message(line: &str) -> Result<Command, ParseError> {
    let raw = value_after(line, MESSAGE_MARKER).ok_or(ParseError::MissingValue(MESSAGE_MARKER))?;
    Ok(Command::SetMessage {
        text: raw.replace(ENCODED_SPACE, " "),
    })
}

/// Text following the first `marker`, up to the next whitespace.
fn value_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let (_, rest) = line.split_once(marker)?;
    rest.split(char::is_whitespace).next()
}

/// Later duplicates of a key replace earlier ones.
fn query_pairs(query: &str) -> Result<HashMap<&str, &str>, ParseError> {
    query
        .split('&')
        .map(|pair| {
            let mut parts = pair.split('=');
            match (parts.next(), parts.next()) {
                (Some(key), Some(value)) => Ok((key, value)),
                _ => Err(ParseError::MalformedPair(pair.to_string())),
            }
        })
        .collect()
}

fn channel(params: &HashMap<&str, &str>, key: &'static str) -> Result<i64, ParseError> {
    let raw = params.get(key).ok_or(ParseError::MissingParam(key))?;
    parse_integer(raw).ok_or_else(|| ParseError::InvalidNumber {
        key,
        value: (*raw).to_string(),
    })
}

/// Out-of-range integers saturate instead of failing, since the value is
/// clamped to a channel afterwards anyway.
fn parse_integer(raw: &str) -> Option<i64> {
    match raw.parse::<i64>() {
        Ok(value) => Some(value),
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_color_command() {
        let command = parse_request("GET /?r=10&g=200&b=5 HTTP/1.1\r\nHost: panel\r\n\r\n");
        assert_eq!(
            command,
            Ok(Command::SetColor {
                r: 10,
                g: 200,
                b: 5
            })
        );
    }

    #[test]
    fn keeps_raw_out_of_range_values() {
        let command = parse_request("GET /?r=300&g=-5&b=128 HTTP/1.1").unwrap();
        assert_eq!(
            command,
            Command::SetColor {
                r: 300,
                g: -5,
                b: 128
            }
        );
    }

    #[test]
    fn huge_values_saturate() {
        let command = parse_request("GET /?r=99999999999999999999999&g=0&b=1 HTTP/1.1").unwrap();
        assert_eq!(
            command,
            Command::SetColor {
                r: i64::MAX,
                g: 0,
                b: 1
            }
        );
    }

    #[test]
    fn non_numeric_channel_is_rejected() {
        assert_eq!(
            parse_request("GET /?r=abc&g=1&b=1 HTTP/1.1"),
            Err(ParseError::InvalidNumber {
                key: "r",
                value: "abc".to_string()
            })
        );
        assert_eq!(
            Command::from_request("GET /?r=abc&g=1&b=1 HTTP/1.1"),
            Command::None
        );
    }

    #[test]
    fn pair_without_equals_is_rejected() {
        assert_eq!(
            parse_request("GET /?r=1&g=2&b=3&flag HTTP/1.1"),
            Err(ParseError::MalformedPair("flag".to_string()))
        );
    }

    #[test]
    fn markers_outside_the_query_token_do_not_count() {
        assert_eq!(
            parse_request("GET /?r=1&g=2 HTTP/1.1&b=3"),
            Err(ParseError::MissingParam("b"))
        );
    }

    #[test]
    fn parses_message_and_decodes_spaces_only() {
        assert_eq!(
            parse_request("GET /?msg=HELLO%20WORLD HTTP/1.1"),
            Ok(Command::SetMessage {
                text: "HELLO WORLD".to_string()
            })
        );
        assert_eq!(
            parse_request("GET /?msg=50%25%20off HTTP/1.1"),
            Ok(Command::SetMessage {
                text: "50%25 off".to_string()
            })
        );
    }

    #[test]
    fn empty_message_is_still_a_message() {
        assert_eq!(
            parse_request("GET /?msg= HTTP/1.1"),
            Ok(Command::SetMessage {
                text: String::new()
            })
        );
    }

    #[test]
    fn color_wins_over_message() {
        let command = parse_request("GET /?r=1&g=2&b=3&msg=hi HTTP/1.1").unwrap();
        assert_eq!(command.kind(), "set-color");
    }

    #[test]
    fn unrecognized_requests_are_none() {
        assert_eq!(parse_request("GET / HTTP/1.1"), Ok(Command::None));
        assert_eq!(parse_request("GET /favicon.ico HTTP/1.1"), Ok(Command::None));
        assert_eq!(parse_request(""), Ok(Command::None));
    }

    #[test]
    fn only_the_request_line_is_inspected() {
        let request = "GET / HTTP/1.1\r\nReferer: http://panel/?r=1&g=2&b=3\r\n\r\n";
        assert_eq!(parse_request(request), Ok(Command::None));
    }

    #[test]
    fn request_line_strips_terminator() {
        assert_eq!(request_line("GET / HTTP/1.1\r\nHost: x"), "GET / HTTP/1.1");
        assert_eq!(request_line("GET /"), "GET /");
    }
}
