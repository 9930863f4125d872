//! Line protocol parsing.
//!
//! Each protocol line is one command. The verb is matched case-insensitively
//! and runs of whitespace between tokens count as a single delimiter, so
//! `set  foo\tbar` and `SET foo bar` parse to the same [`Command`].

use std::{fmt, str::FromStr};

use thiserror::Error;

/// A typed representation of one protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: String, value: String },
}

/// Reasons a line could not be turned into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("command is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown command '{0}'")]
    UnknownVerb(String),

    #[error("{verb} expects {expected} arguments, got {actual}")]
    WrongArity {
        verb: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl Command {
    /// Parses a single line that has already had its delimiter removed.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().ok_or(ParseError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        if verb.eq_ignore_ascii_case("SET") {
            return match args.as_slice() {
                [key, value] => Ok(Command::Set {
                    key: (*key).to_string(),
                    value: (*value).to_string(),
                }),
                _ => Err(ParseError::WrongArity {
                    verb: "SET",
                    expected: 2,
                    actual: args.len(),
                }),
            };
        }

        Err(ParseError::UnknownVerb(verb.to_string()))
    }

    /// Parses a raw message as received from a peer.
    pub fn parse_bytes(raw: &[u8]) -> Result<Self, ParseError> {
        let line = std::str::from_utf8(raw).map_err(|_| ParseError::InvalidUtf8)?;
        Self::parse(line)
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Set { key, value } => write!(f, "SET {key} {value}"),
        }
    }
}
