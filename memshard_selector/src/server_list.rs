use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use log::debug;

use super::{Address, Result, SelectorError, ServerSelector};

/// A static list of servers sharded by `crc32(key) % len`.
///
/// The list is swapped as a whole by [`ServerList::set_servers`], so readers see either the old
/// or the new configuration and never a mix of both.
#[derive(Default)]
pub struct ServerList {
    addrs: RwLock<Vec<Address>>,
}

impl ServerList {
    pub fn new() -> ServerList {
        ServerList::default()
    }

    /// Resolves every server and replaces the current list.
    ///
    /// Resolution happens before the write lock is taken. If any server fails to resolve the
    /// call returns the error and the previous list stays active.
    pub fn set_servers<S: AsRef<str>>(&self, servers: &[S]) -> Result<()> {
        let addrs = servers
            .iter()
            .map(|server| Address::resolve(server.as_ref()))
            .collect::<Result<Vec<Address>>>()?;

        debug!("configured {} memcached servers", addrs.len());
        *self.addrs.write().unwrap_or_else(PoisonError::into_inner) = addrs;
        Ok(())
    }

    /// A copy of the current configuration.
    pub fn addresses(&self) -> Vec<Address> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<Vec<Address>> {
        self.addrs.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn shard_index(key: &str, shards: usize) -> usize {
    crc32fast::hash(key.as_bytes()) as usize % shards
}

impl ServerSelector for ServerList {
    fn select(&self, key: &str) -> Result<Address> {
        let addrs = self.read();
        match addrs.len() {
            0 => Err(SelectorError::NoServers),
            1 => Ok(addrs[0].clone()),
            len => Ok(addrs[shard_index(key, len)].clone()),
        }
    }

    fn each<E, F>(&self, mut visit: F) -> std::result::Result<(), E>
    where
        F: FnMut(&Address) -> std::result::Result<(), E>,
    {
        let addrs = self.read();
        for addr in addrs.iter() {
            visit(addr)?;
        }
        Ok(())
    }
}
