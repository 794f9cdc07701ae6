//! Reply classification for the memcached text protocol.
//!
//! Every reply line is turned into one [`Reply`] by [`Reply::parse_line`]; callers match on the
//! variant instead of comparing raw bytes.

use super::{ProtocolError, ReadBuffer, Result};
use std::fmt;
use std::io::Read;

/// Header line of a retrieval reply: `VALUE <key> <flags> <bytes> [<cas>]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueHeader {
    pub key: String,
    pub flags: u32,
    pub length: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    End,
    Value(ValueHeader),
    Version(String),
    Error,
    ClientError(String),
    ServerError(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value {
    pub key: String,
    pub flags: u32,
    pub data: Vec<u8>,
}

fn unexpected(raw: &[u8]) -> ProtocolError {
    ProtocolError::UnexpectedResponse(String::from_utf8_lossy(raw).into_owned())
}

impl Reply {
    pub fn parse_line(raw: &[u8]) -> Result<Reply> {
        if !raw.ends_with(b"\r\n") {
            return Err(unexpected(raw));
        }
        let line = &raw[..raw.len() - 2];

        let reply = match line {
            b"STORED" => Reply::Stored,
            b"NOT_STORED" => Reply::NotStored,
            b"EXISTS" => Reply::Exists,
            b"NOT_FOUND" => Reply::NotFound,
            b"DELETED" => Reply::Deleted,
            b"END" => Reply::End,
            b"ERROR" => Reply::Error,
            _ if line.starts_with(b"VALUE ") => Reply::Value(parse_value_header(line, raw)?),
            _ if line.starts_with(b"VERSION") => Reply::Version(
                String::from_utf8_lossy(&line[b"VERSION".len()..])
                    .trim()
                    .to_string(),
            ),
            _ if line.starts_with(b"CLIENT_ERROR ") => Reply::ClientError(
                String::from_utf8_lossy(&line[b"CLIENT_ERROR ".len()..]).into_owned(),
            ),
            _ if line.starts_with(b"SERVER_ERROR ") => Reply::ServerError(
                String::from_utf8_lossy(&line[b"SERVER_ERROR ".len()..]).into_owned(),
            ),
            _ => return Err(unexpected(raw)),
        };
        Ok(reply)
    }

    /// The server's own error text, for `ERROR`, `CLIENT_ERROR` and `SERVER_ERROR` replies.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Reply::Error => Some("ERROR".to_string()),
            Reply::ClientError(message) => Some(format!("CLIENT_ERROR {}", message)),
            Reply::ServerError(message) => Some(format!("SERVER_ERROR {}", message)),
            _ => None,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reply::Stored => f.write_str("STORED"),
            Reply::NotStored => f.write_str("NOT_STORED"),
            Reply::Exists => f.write_str("EXISTS"),
            Reply::NotFound => f.write_str("NOT_FOUND"),
            Reply::Deleted => f.write_str("DELETED"),
            Reply::End => f.write_str("END"),
            Reply::Value(header) => {
                write!(f, "VALUE {} {} {}", header.key, header.flags, header.length)
            }
            Reply::Version(version) => write!(f, "VERSION {}", version),
            Reply::Error => f.write_str("ERROR"),
            Reply::ClientError(message) => write!(f, "CLIENT_ERROR {}", message),
            Reply::ServerError(message) => write!(f, "SERVER_ERROR {}", message),
        }
    }
}

fn parse_value_header(line: &[u8], raw: &[u8]) -> Result<ValueHeader> {
    let line = std::str::from_utf8(line)?;
    let mut parts = line.split(' ').skip(1);

    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(flags), Some(length)) if !key.is_empty() => Ok(ValueHeader {
            key: key.to_string(),
            flags: flags.parse()?,
            length: length.parse()?,
        }),
        _ => Err(unexpected(raw)),
    }
}

pub fn read_reply<R: Read>(buf: &mut ReadBuffer<R>) -> Result<Reply> {
    let line = buf.read_line()?;
    Reply::parse_line(&line)
}

fn split_line(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    memchr::memchr(b'\n', buf).map(|index| buf.split_at(index + 1))
}

/// Parses a complete retrieval reply for a single key.
///
/// `END` or `NOT_FOUND` on its own is a miss. A hit must consist of exactly one `VALUE` header,
/// its data block and the closing `END`; anything truncated or left over is rejected rather than
/// guessed at.
pub fn parse_get_response(payload: &[u8]) -> Result<Option<Value>> {
    let (line, rest) = split_line(payload).ok_or_else(|| unexpected(payload))?;

    match Reply::parse_line(line)? {
        Reply::End | Reply::NotFound => Ok(None),
        Reply::Value(header) => {
            if rest.len() < header.length || !rest[header.length..].starts_with(b"\r\n") {
                return Err(unexpected(payload));
            }
            let (data, rest) = rest.split_at(header.length);
            let rest = &rest[2..];

            match split_line(rest) {
                Some((b"END\r\n", b"")) => Ok(Some(Value {
                    key: header.key,
                    flags: header.flags,
                    data: data.to_vec(),
                })),
                _ => Err(unexpected(payload)),
            }
        }
        reply => match reply.error_message() {
            Some(message) => Err(ProtocolError::ServerError(message)),
            None => Err(unexpected(payload)),
        },
    }
}
