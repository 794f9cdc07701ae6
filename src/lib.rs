//! A blocking memcached client that shards keys over a pool of servers.
//!
//! Keys are mapped to servers by CRC-32 of the key modulo the server count. Stores, deletes and
//! health checks use the text protocol over TCP or Unix sockets; fetches use the UDP framing and
//! are reassembled from as many datagrams as the server sends.
//!
//! ```no_run
//! use memshard::{Client, Item};
//!
//! # fn main() -> memshard::Result<()> {
//! let client = Client::new(&["10.0.0.1:11211", "10.0.0.2:11211"], true)?;
//! client.set(&Item::new("greeting", "hello"))?;
//! assert_eq!(client.get("greeting")?.value, b"hello".to_vec());
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate quick_error;

mod client;
mod config;
mod error;
mod locks;
mod transport;

pub use client::{Client, Item};
pub use config::ClientBuilder;
pub use error::{ClientError, Result};
pub use memshard_selector::{Address, Network, ServerList, ServerSelector};
pub use transport::DEFAULT_TIMEOUT;
