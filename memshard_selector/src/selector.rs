use super::{Address, Result};

/// Decides which server owns a key.
///
/// Implementations must be deterministic: the same key against the same configuration always
/// yields the same address.
pub trait ServerSelector: Send + Sync {
    /// Returns the server address a given key should be sent to.
    fn select(&self, key: &str) -> Result<Address>;

    /// Calls `visit` once per configured server, in configuration order, stopping at the first
    /// error it returns.
    fn each<E, F>(&self, visit: F) -> std::result::Result<(), E>
    where
        F: FnMut(&Address) -> std::result::Result<(), E>;
}
