use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use memshard_selector::Address;

/// One mutex per destination, created on first use.
///
/// Exchanges with the same server are serialized while different servers proceed in parallel.
#[derive(Default)]
pub struct DestinationLocks {
    locks: Mutex<HashMap<Address, Arc<Mutex<()>>>>,
}

impl DestinationLocks {
    pub fn get(&self, addr: &Address) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(addr.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
