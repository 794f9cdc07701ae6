use super::{ProtocolError, Result};

pub const MAX_KEY_LENGTH: usize = 250;

/// Rejects keys the text protocol cannot carry: empty, longer than [`MAX_KEY_LENGTH`] bytes, or
/// containing whitespace or control characters.
pub fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && key
            .bytes()
            .all(|b| !b.is_ascii_whitespace() && !b.is_ascii_control());

    if valid {
        Ok(())
    } else {
        Err(ProtocolError::MalformedKey(key.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetCommand<'a> {
    pub key: &'a str,
    pub flags: u32,
    pub expiration: i32,
    pub value: &'a [u8],
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetCommand<'a> {
    pub key: &'a str,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteCommand<'a> {
    pub key: &'a str,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command<'a> {
    Set(SetCommand<'a>),
    Get(GetCommand<'a>),
    Delete(DeleteCommand<'a>),
    Version,
}

impl Command<'_> {
    pub fn encode(&self) -> Vec<u8> {
        let mut message = Vec::new();
        match self {
            Command::Set(command) => {
                message.extend_from_slice(
                    format!(
                        "set {} {} {} {}\r\n",
                        command.key,
                        command.flags,
                        command.expiration,
                        command.value.len()
                    )
                    .as_bytes(),
                );
                message.reserve(command.value.len() + 2);
                message.extend_from_slice(command.value);
                message.extend_from_slice(b"\r\n");
            }
            Command::Get(command) => {
                message.extend_from_slice(format!("get {}\r\n", command.key).as_bytes());
            }
            Command::Delete(command) => {
                message.extend_from_slice(format!("delete {}\r\n", command.key).as_bytes());
            }
            Command::Version => {
                message.extend_from_slice(b"version\r\n");
            }
        }

        message
    }
}

impl From<Command<'_>> for Vec<u8> {
    fn from(command: Command<'_>) -> Vec<u8> {
        command.encode()
    }
}
