use std::io;

use memshard_protocol::ProtocolError;
use memshard_selector::SelectorError;

quick_error! {
    #[derive(Debug)]
    pub enum ClientError {
        NoServers {
            display("memcache: no servers configured or available")
        }
        AddressResolution(server: String, err: io::Error) {
            display("memcache: cannot resolve server address {:?}: {}", server, err)
            cause(err)
        }
        CacheMiss {
            display("memcache: cache miss")
        }
        NotStored {
            display("memcache: item not stored")
        }
        ServerError(message: String) {
            display("memcache: server error: {}", message)
        }
        MalformedKey(key: String) {
            display("malformed: key {:?} is too long or contains invalid characters", key)
        }
        Protocol(response: String) {
            display("memcache: unexpected response: {}", response)
        }
        ConfigurationMismatch(reason: &'static str) {
            display("memcache: {}", reason)
        }
        Transport(err: io::Error) {
            from()
            display("memcache: transport error: {}", err)
            cause(err)
        }
    }
}

impl ClientError {
    pub fn is_cache_miss(&self) -> bool {
        match self {
            ClientError::CacheMiss => true,
            _ => false,
        }
    }
}

impl From<SelectorError> for ClientError {
    fn from(err: SelectorError) -> ClientError {
        match err {
            SelectorError::NoServers => ClientError::NoServers,
            SelectorError::AddressResolution(server, err) => {
                ClientError::AddressResolution(server, err)
            }
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> ClientError {
        match err {
            ProtocolError::ConnectionClosed => ClientError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before the reply was complete",
            )),
            ProtocolError::MalformedKey(key) => ClientError::MalformedKey(key),
            ProtocolError::UnexpectedResponse(response) => ClientError::Protocol(response),
            ProtocolError::ServerError(message) => ClientError::ServerError(message),
            ProtocolError::IOError(err) => ClientError::Transport(err),
            err => ClientError::Protocol(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
