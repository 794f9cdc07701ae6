use std::io::Write;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use log::debug;
use memshard_protocol::{
    exchange_datagram, parse_get_response, read_reply, validate_key, Command, DeleteCommand,
    GetCommand, ReadBuffer, Reply, SetCommand,
};
use memshard_selector::{Address, Network, ServerList, ServerSelector};

use super::error::{ClientError, Result};
use super::locks::DestinationLocks;
use super::transport::{Connection, DatagramConnection, DEFAULT_TIMEOUT};

const UDP_REQUEST_ID: u16 = 0;

/// A cache item.
///
/// `flags` are opaque to the client and handed back by the server on fetch. `expiration` is a
/// TTL in seconds, or an absolute unix time when it exceeds thirty days; it is never returned by
/// the server and reads back as `0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub value: Vec<u8>,
    pub flags: u32,
    pub expiration: i32,
}

impl Item {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Item {
        Item {
            key: key.into(),
            value: value.into(),
            flags: 0,
            expiration: 0,
        }
    }
}

fn unexpected_reply(reply: Reply) -> ClientError {
    match reply.error_message() {
        Some(message) => ClientError::ServerError(message),
        None => ClientError::Protocol(reply.to_string()),
    }
}

/// A memcached client that shards keys over the servers of its selector.
///
/// Stores, deletes and health checks go over TCP (or a Unix socket); fetches go over UDP and are
/// only available when the client was created with `use_udp`. Each call opens a fresh
/// connection and closes it before returning. Calls aimed at the same server are serialized;
/// calls to different servers run in parallel.
pub struct Client<S: ServerSelector = ServerList> {
    selector: Arc<S>,
    use_udp: bool,
    timeout: Duration,
    locks: DestinationLocks,
}

impl Client<ServerList> {
    pub fn new<T: AsRef<str>>(servers: &[T], use_udp: bool) -> Result<Client> {
        let list = ServerList::new();
        list.set_servers(servers)?;
        Ok(Client::from_selector(Arc::new(list), use_udp))
    }
}

impl<S: ServerSelector> Client<S> {
    /// Creates a client over a custom selector. The selector stays shared with the caller, who
    /// may keep reconfiguring it.
    pub fn from_selector(selector: Arc<S>, use_udp: bool) -> Client<S> {
        Client {
            selector,
            use_udp,
            timeout: DEFAULT_TIMEOUT,
            locks: DestinationLocks::default(),
        }
    }

    pub fn selector(&self) -> &Arc<S> {
        &self.selector
    }

    pub fn use_udp(&self) -> bool {
        self.use_udp
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sets the deadline for one whole exchange. Zero restores [`DEFAULT_TIMEOUT`].
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = if timeout == Duration::from_secs(0) {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
    }

    pub fn select_server(&self, key: &str) -> Result<Address> {
        let addr = self.selector.select(key)?;
        debug!("key {:?} maps to {}", key, addr);
        Ok(addr)
    }

    pub fn set(&self, item: &Item) -> Result<()> {
        validate_key(&item.key)?;
        let addr = self.select_server(&item.key)?;

        let command = Command::Set(SetCommand {
            key: &item.key,
            flags: item.flags,
            expiration: item.expiration,
            value: &item.value,
        });
        match self.round_trip(&addr, &command)? {
            Reply::Stored => Ok(()),
            Reply::NotFound => Err(ClientError::CacheMiss),
            Reply::NotStored => Err(ClientError::NotStored),
            reply => Err(unexpected_reply(reply)),
        }
    }

    pub fn get(&self, key: &str) -> Result<Item> {
        if !self.use_udp {
            return Err(ClientError::ConfigurationMismatch("UDP mode is not enabled"));
        }
        validate_key(key)?;
        let addr = self.select_server(key)?;
        if addr.network() == Network::Unix {
            return Err(ClientError::ConfigurationMismatch(
                "UDP fetch needs an inet server address",
            ));
        }

        let lock = self.locks.get(&addr);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut conn = DatagramConnection::open(&addr, self.timeout)?;
        let command = Command::Get(GetCommand { key });
        let payload = exchange_datagram(&mut conn, UDP_REQUEST_ID, &command)?;
        debug!("{} byte response from {}", payload.len(), addr);

        match parse_get_response(&payload)? {
            Some(value) if value.key == key => Ok(Item {
                key: key.to_string(),
                value: value.data,
                flags: value.flags,
                expiration: 0,
            }),
            Some(value) => Err(ClientError::Protocol(format!(
                "got key {:?} while fetching {:?}",
                value.key, key
            ))),
            None => Err(ClientError::CacheMiss),
        }
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let addr = self.select_server(key)?;

        let command = Command::Delete(DeleteCommand { key });
        match self.round_trip(&addr, &command)? {
            Reply::Deleted => Ok(()),
            Reply::NotFound => Err(ClientError::CacheMiss),
            reply => Err(unexpected_reply(reply)),
        }
    }

    pub fn ping(&self, key: &str) -> Result<()> {
        let addr = self.select_server(key)?;
        self.ping_server(&addr)
    }

    /// Checks that every configured server answers `version`, stopping at the first failure.
    /// Fails with `NoServers` when there is nothing to check.
    pub fn health_check(&self) -> Result<()> {
        let mut checked = 0;
        self.selector.each(|addr| {
            checked += 1;
            self.ping_server(addr)
        })?;

        if checked == 0 {
            return Err(ClientError::NoServers);
        }
        Ok(())
    }

    fn ping_server(&self, addr: &Address) -> Result<()> {
        match self.round_trip(addr, &Command::Version)? {
            Reply::Version(version) => {
                debug!("{} runs memcached {}", addr, version);
                Ok(())
            }
            reply => Err(unexpected_reply(reply)),
        }
    }

    fn round_trip(&self, addr: &Address, command: &Command) -> Result<Reply> {
        let lock = self.locks.get(addr);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut conn = Connection::open(addr, self.timeout)?;
        let request = command.encode();
        conn.write_all(&request)?;
        debug!("sent {} bytes to {}", request.len(), addr);

        let mut reader = ReadBuffer::new(&mut conn);
        Ok(read_reply(&mut reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memshard_protocol::{FrameHeader, FRAME_HEADER_LEN};
    use memshard_selector::Result as SelectorResult;
    use rand::distributions::Standard;
    use rand::{thread_rng, Rng};
    use std::collections::HashMap;
    use std::io::{self, Read, Write};
    use std::net::{SocketAddr, TcpListener, UdpSocket};
    use std::os::unix::net::UnixListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, Once};

    static INIT: Once = Once::new();
    static SOCKET_ID: AtomicUsize = AtomicUsize::new(0);

    fn init() {
        INIT.call_once(|| {
            env_logger::init();
        });
    }

    type Store = Arc<Mutex<HashMap<String, (u32, Vec<u8>)>>>;

    /// A loopback memcached stand-in serving TCP and UDP on the same port.
    struct MockServer {
        addr: SocketAddr,
        store: Store,
    }

    impl MockServer {
        fn contains(&self, key: &str) -> bool {
            self.store.lock().unwrap().contains_key(key)
        }
    }

    fn serve_stream<R: Read, W: Write>(reader: R, mut writer: W, store: Store) {
        let mut reader = ReadBuffer::new(reader);
        while let Ok(line) = reader.read_line() {
            let line = String::from_utf8_lossy(&line).trim_end().to_string();
            let parts: Vec<&str> = line.split(' ').collect();
            let reply = match parts.as_slice() {
                ["set", key, flags, _, length] => {
                    let length: usize = length.parse().unwrap();
                    let mut data = reader.read_exact(length + 2).unwrap();
                    data.truncate(length);
                    match *key {
                        "not_stored" => "NOT_STORED\r\n".to_string(),
                        "server_error" => "SERVER_ERROR out of memory\r\n".to_string(),
                        "confused" => "DELETED\r\n".to_string(),
                        _ => {
                            let flags = flags.parse().unwrap();
                            store.lock().unwrap().insert(key.to_string(), (flags, data));
                            "STORED\r\n".to_string()
                        }
                    }
                }
                ["delete", key] => match store.lock().unwrap().remove(*key) {
                    Some(_) => "DELETED\r\n".to_string(),
                    None => "NOT_FOUND\r\n".to_string(),
                },
                ["version"] => "VERSION 1.6.21\r\n".to_string(),
                _ => "ERROR\r\n".to_string(),
            };
            if writer.write_all(reply.as_bytes()).is_err() {
                return;
            }
        }
    }

    fn serve_datagrams(socket: UdpSocket, store: Store, chunk: usize) {
        let mut buf = vec![0; 2048];
        loop {
            let (read, peer) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(_) => return,
            };
            let header = FrameHeader::from_buf(&buf[..read]).unwrap();
            let request = String::from_utf8_lossy(&buf[FRAME_HEADER_LEN..read]).to_string();
            let key = request.trim_end().trim_start_matches("get ").to_string();

            let mut response = Vec::new();
            if let Some((flags, data)) = store.lock().unwrap().get(&key) {
                response.extend_from_slice(
                    format!("VALUE {} {} {}\r\n", key, flags, data.len()).as_bytes(),
                );
                response.extend_from_slice(data);
                response.extend_from_slice(b"\r\n");
            }
            response.extend_from_slice(b"END\r\n");

            let chunks: Vec<&[u8]> = response.chunks(chunk).collect();
            for (sequence, part) in chunks.iter().enumerate() {
                let mut datagram = FrameHeader {
                    request_id: header.request_id,
                    sequence: sequence as u16,
                    total: chunks.len() as u16,
                    reserved: 0,
                }
                .into_bytes()
                .to_vec();
                datagram.extend_from_slice(part);
                let _ = socket.send_to(&datagram, peer);
            }
        }
    }

    fn setup_server(chunk: usize) -> MockServer {
        init();
        let store = Store::default();
        loop {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let socket = match UdpSocket::bind(addr) {
                Ok(socket) => socket,
                Err(_) => continue,
            };

            let tcp_store = store.clone();
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let stream = match stream {
                        Ok(stream) => stream,
                        Err(_) => continue,
                    };
                    let store = tcp_store.clone();
                    std::thread::spawn(move || {
                        let reader = stream.try_clone().unwrap();
                        serve_stream(reader, stream, store);
                    });
                }
            });
            let udp_store = store.clone();
            std::thread::spawn(move || serve_datagrams(socket, udp_store, chunk));

            return MockServer { addr, store };
        }
    }

    fn setup_unix_server() -> (String, Store) {
        init();
        let path = std::env::temp_dir().join(format!(
            "memshard-{}-{}.sock",
            std::process::id(),
            SOCKET_ID.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();
        let store = Store::default();

        let unix_store = store.clone();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => continue,
                };
                let store = unix_store.clone();
                std::thread::spawn(move || {
                    let reader = stream.try_clone().unwrap();
                    serve_stream(reader, stream, store);
                });
            }
        });

        (path.to_string_lossy().into_owned(), store)
    }

    fn connect(servers: &[&MockServer], use_udp: bool) -> Client {
        let servers: Vec<String> = servers.iter().map(|s| s.addr.to_string()).collect();
        let mut client = Client::new(&servers, use_udp).unwrap();
        client.set_timeout(Duration::from_secs(2));
        client
    }

    fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    }

    #[derive(Default)]
    struct CountingSelector {
        selects: AtomicUsize,
    }

    impl ServerSelector for CountingSelector {
        fn select(&self, _key: &str) -> SelectorResult<Address> {
            self.selects.fetch_add(1, Ordering::SeqCst);
            Ok(Address::new(Network::Udp, "127.0.0.1:1"))
        }

        fn each<E, F>(&self, _visit: F) -> std::result::Result<(), E>
        where
            F: FnMut(&Address) -> std::result::Result<(), E>,
        {
            Ok(())
        }
    }

    #[test]
    fn set_get_test() {
        let server = setup_server(1400);
        let client = connect(&[&server], true);

        for i in 0..100 {
            let mut item = Item::new(format!("key{}", i), format!("value{}", i));
            item.flags = i;
            client.set(&item).unwrap();
        }

        for i in 0..100 {
            let item = client.get(&format!("key{}", i)).unwrap();
            assert_eq!(item.key, format!("key{}", i));
            assert_eq!(item.value, format!("value{}", i).into_bytes());
            assert_eq!(item.flags, i);
        }
    }

    #[test]
    fn multi_datagram_value() {
        let server = setup_server(64);
        let client = connect(&[&server], true);

        let value: Vec<u8> = thread_rng().sample_iter(Standard).take(2048).collect();
        client.set(&Item::new("big", value.clone())).unwrap();
        assert_eq!(client.get("big").unwrap().value, value);

        let value = b"line one\r\nEND\r\nline three".to_vec();
        client.set(&Item::new("tricky", value.clone())).unwrap();
        assert_eq!(client.get("tricky").unwrap().value, value);
    }

    #[test]
    fn set_delete_get_test() {
        let server = setup_server(1400);
        let client = connect(&[&server], true);

        for i in 0..20 {
            client
                .set(&Item::new(format!("key{}", i), format!("value{}", i)))
                .unwrap();
        }
        for i in 0..20 {
            if i % 2 == 0 {
                client.delete(&format!("key{}", i)).unwrap();
            }
        }
        for i in 0..20 {
            let result = client.get(&format!("key{}", i));
            if i % 2 == 0 {
                assert!(result.unwrap_err().is_cache_miss());
            } else {
                assert_eq!(result.unwrap().value, format!("value{}", i).into_bytes());
            }
        }
    }

    #[test]
    fn delete_missing_key_is_a_miss() {
        let server = setup_server(1400);
        let client = connect(&[&server], false);

        match client.delete("non_existing_key") {
            Err(ClientError::CacheMiss) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn override_test() {
        let server = setup_server(1400);
        let client = connect(&[&server], true);

        client.set(&Item::new("foo", "bar")).unwrap();
        client.set(&Item::new("foo", "baz")).unwrap();
        assert_eq!(client.get("foo").unwrap().value, b"baz".to_vec());
    }

    #[test]
    fn store_failures() {
        let server = setup_server(1400);
        let client = connect(&[&server], false);

        match client.set(&Item::new("not_stored", "x")) {
            Err(ClientError::NotStored) => {}
            other => panic!("unexpected {:?}", other),
        }
        match client.set(&Item::new("server_error", "x")) {
            Err(ClientError::ServerError(message)) => {
                assert_eq!(message, "SERVER_ERROR out of memory")
            }
            other => panic!("unexpected {:?}", other),
        }
        match client.set(&Item::new("confused", "x")) {
            Err(ClientError::Protocol(response)) => assert_eq!(response, "DELETED"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn keys_follow_the_selector() {
        let first = setup_server(1400);
        let second = setup_server(1400);
        let client = connect(&[&first, &second], true);

        for i in 0..50 {
            let key = format!("user:{}", i);
            client.set(&Item::new(key.as_str(), "v")).unwrap();

            let owner = client.select_server(&key).unwrap();
            let (owner, other) = if owner.as_str() == first.addr.to_string() {
                (&first, &second)
            } else {
                (&second, &first)
            };
            assert!(owner.contains(&key));
            assert!(!other.contains(&key));
            assert_eq!(client.get(&key).unwrap().value, b"v".to_vec());
        }
    }

    #[test]
    fn health_check_every_server() {
        let first = setup_server(1400);
        let second = setup_server(1400);
        let client = connect(&[&first, &second], false);
        client.health_check().unwrap();
        client.ping("anything").unwrap();

        let servers = vec![first.addr.to_string(), closed_port()];
        let client = Client::new(&servers, false).unwrap();
        match client.health_check() {
            Err(ClientError::Transport(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unix_socket_server() {
        let (path, store) = setup_unix_server();
        let client = Client::new(&[path.as_str()], false).unwrap();

        client.set(&Item::new("foo", "bar")).unwrap();
        assert_eq!(store.lock().unwrap().get("foo").unwrap().1, b"bar".to_vec());
        client.ping("foo").unwrap();
        client.delete("foo").unwrap();
        assert!(client.delete("foo").unwrap_err().is_cache_miss());

        let client = Client::new(&[path.as_str()], true).unwrap();
        match client.get("foo") {
            Err(ClientError::ConfigurationMismatch(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn get_requires_udp_mode() {
        let selector = Arc::new(CountingSelector::default());
        let client = Client::from_selector(selector.clone(), false);

        match client.get("foo") {
            Err(ClientError::ConfigurationMismatch(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(selector.selects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn malformed_keys_never_reach_the_selector() {
        let selector = Arc::new(CountingSelector::default());
        let client = Client::from_selector(selector.clone(), true);

        let long_key = "k".repeat(251);
        for key in &["", "has space", long_key.as_str()] {
            assert!(matches!(client.get(key), Err(ClientError::MalformedKey(_))));
            assert!(matches!(client.delete(key), Err(ClientError::MalformedKey(_))));
            assert!(matches!(
                client.set(&Item::new(*key, "v")),
                Err(ClientError::MalformedKey(_))
            ));
        }
        assert_eq!(selector.selects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn no_servers() {
        let client = Client::new::<&str>(&[], true).unwrap();
        assert!(matches!(client.set(&Item::new("foo", "bar")), Err(ClientError::NoServers)));
        assert!(matches!(client.get("foo"), Err(ClientError::NoServers)));
        assert!(matches!(client.ping("foo"), Err(ClientError::NoServers)));
        assert!(matches!(client.health_check(), Err(ClientError::NoServers)));
    }

    #[test]
    fn unreachable_server() {
        let client = Client::new(&[closed_port()], false).unwrap();
        match client.set(&Item::new("foo", "bar")) {
            Err(ClientError::Transport(err)) => {
                assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn silent_server_times_out() {
        init();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut client = Client::new(&[listener.local_addr().unwrap().to_string()], false).unwrap();
        client.set_timeout(Duration::from_millis(100));

        match client.delete("foo") {
            Err(ClientError::Transport(err)) => assert_eq!(err.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected {:?}", other),
        }
        drop(listener);
    }

    #[test]
    fn oversized_timeout_is_rejected() {
        let server = setup_server(1400);
        let mut client = connect(&[&server], true);
        client.set_timeout(Duration::from_secs(u64::MAX));

        match client.delete("foo") {
            Err(ClientError::Transport(err)) => {
                assert_eq!(err.kind(), io::ErrorKind::InvalidInput)
            }
            other => panic!("unexpected {:?}", other),
        }
        match client.get("foo") {
            Err(ClientError::Transport(err)) => {
                assert_eq!(err.kind(), io::ErrorKind::InvalidInput)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn concurrent_clients() {
        let first = setup_server(64);
        let second = setup_server(64);
        let client = Arc::new(connect(&[&first, &second], true));

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let client = client.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let key = format!("worker{}:{}", worker, i);
                        let value = format!("{}-{}", worker, i).repeat(10);
                        client.set(&Item::new(key.as_str(), value.as_str())).unwrap();
                        assert_eq!(client.get(&key).unwrap().value, value.into_bytes());
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
    }
}
