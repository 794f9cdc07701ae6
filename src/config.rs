use std::sync::Arc;
use std::time::Duration;

use memshard_selector::ServerList;

use super::error::Result;
use super::transport::DEFAULT_TIMEOUT;
use super::Client;

/// Builds a [`Client`] over a [`ServerList`].
///
/// ```no_run
/// use std::time::Duration;
///
/// let client = memshard::ClientBuilder::default()
///     .servers(vec!["10.0.0.1:11211".to_string(), "10.0.0.2:11211".to_string()])
///     .use_udp(true)
///     .timeout(Duration::from_millis(200))
///     .build()
///     .unwrap();
/// client.health_check().unwrap();
/// ```
pub struct ClientBuilder {
    servers: Vec<String>,
    use_udp: bool,
    timeout: Duration,
}

impl Default for ClientBuilder {
    fn default() -> ClientBuilder {
        ClientBuilder {
            servers: Vec::new(),
            use_udp: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientBuilder {
    pub fn servers(mut self, servers: Vec<String>) -> Self {
        self.servers = servers;
        self
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.servers.push(server.into());
        self
    }

    /// Fetch over UDP. Without it `get` is refused.
    pub fn use_udp(mut self, use_udp: bool) -> Self {
        self.use_udp = use_udp;
        self
    }

    /// Deadline for one whole exchange. Zero selects [`DEFAULT_TIMEOUT`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves every server; fails if any of them cannot be resolved.
    pub fn build(self) -> Result<Client> {
        let servers = ServerList::new();
        servers.set_servers(&self.servers)?;

        let mut client = Client::from_selector(Arc::new(servers), self.use_udp);
        client.set_timeout(self.timeout);
        Ok(client)
    }
}
