//! Maps cache keys onto a fixed set of memcached servers.
//!
//! Every configured endpoint string is resolved once into an [`Address`]. The default
//! [`ServerList`] shards keys by `crc32(key) % servers`. It is not a consistent hash: changing
//! the number of servers moves nearly every key, so a resize behaves like a cold cache.

#[macro_use]
extern crate quick_error;

mod address;
mod error;
mod selector;
mod server_list;

pub use address::{Address, Network, DEFAULT_PORT};
pub use error::{Result, SelectorError};
pub use selector::ServerSelector;
pub use server_list::ServerList;
