use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use super::{Result, SelectorError};

/// Port memcached listens on when an endpoint string does not name one.
pub const DEFAULT_PORT: u16 = 11211;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Tcp,
    Udp,
    Unix,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Udp => "udp",
            Network::Unix => "unix",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved server endpoint.
///
/// Only the network kind and the canonical string form are kept, so an `Address` is cheap to
/// clone, compare, hash and log. The transport turns it back into a socket address when it dials.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    addr: String,
}

impl Address {
    pub fn new(network: Network, addr: impl Into<String>) -> Address {
        Address {
            network,
            addr: addr.into(),
        }
    }

    /// Classifies and resolves one endpoint string.
    ///
    /// * anything containing `/` is a Unix socket path and is taken as-is;
    /// * `host:port` is resolved as a datagram endpoint, since memcached serves UDP and TCP on
    ///   the same port;
    /// * a bare host is resolved as a TCP endpoint on [`DEFAULT_PORT`].
    pub fn resolve(server: &str) -> Result<Address> {
        let resolved = if server.contains('/') {
            Ok(Address::new(Network::Unix, server))
        } else if server.contains(':') {
            // std resolves datagram and stream endpoints through the same lookup, so a `host:port`
            // that fails here would fail as TCP as well.
            first_socket_addr(server).map(|addr| Address::new(Network::Udp, addr.to_string()))
        } else if server.is_empty() {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "empty server address"))
        } else {
            first_socket_addr((server, DEFAULT_PORT))
                .map(|addr| Address::new(Network::Tcp, addr.to_string()))
        };

        resolved.map_err(|err| SelectorError::AddressResolution(server.to_string(), err))
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn as_str(&self) -> &str {
        &self.addr
    }

    /// The inet socket address behind this endpoint, or `None` for a Unix socket path.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self.network {
            Network::Unix => None,
            Network::Tcp | Network::Udp => self.addr.parse().ok(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

fn first_socket_addr<A: ToSocketAddrs>(server: A) -> io::Result<SocketAddr> {
    server.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "no address found for server")
    })
}
