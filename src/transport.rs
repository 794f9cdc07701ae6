//! Short-lived connections bounded by a single deadline.
//!
//! Every verb opens its own connection and drops it before returning. The deadline is fixed when
//! the connection is opened and covers the whole exchange: before each read or write the socket
//! timeout is set to whatever time is left.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};

use log::debug;
use memshard_protocol::DatagramTransport;
use memshard_selector::{Address, Network};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> io::Result<Deadline> {
        Instant::now()
            .checked_add(timeout)
            .map(Deadline)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "timeout is too large")
            })
    }

    pub fn remaining(self) -> io::Result<Duration> {
        let now = Instant::now();
        if now >= self.0 {
            Err(io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded"))
        } else {
            Ok(self.0 - now)
        }
    }
}

/// Blocking sockets report an expired timeout as `WouldBlock` on Unix.
fn timed_out<T>(result: io::Result<T>) -> io::Result<T> {
    result.map_err(|err| match err.kind() {
        io::ErrorKind::WouldBlock => io::Error::new(io::ErrorKind::TimedOut, err),
        _ => err,
    })
}

fn inet_addr(addr: &Address) -> io::Result<SocketAddr> {
    addr.socket_addr().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not an inet socket address", addr),
        )
    })
}

enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

pub struct Connection {
    stream: Stream,
    deadline: Deadline,
}

impl Connection {
    /// Dials `addr`. The deadline bounds TCP connects; std has no connect timeout for Unix
    /// sockets, so only their reads and writes are bounded.
    pub fn open(addr: &Address, timeout: Duration) -> io::Result<Connection> {
        let deadline = Deadline::after(timeout)?;
        debug!("connecting to {} over {}", addr, addr.network());

        let stream = match addr.network() {
            Network::Unix => Stream::Unix(UnixStream::connect(addr.as_str())?),
            Network::Tcp | Network::Udp => Stream::Tcp(timed_out(TcpStream::connect_timeout(
                &inet_addr(addr)?,
                deadline.remaining()?,
            ))?),
        };

        Ok(Connection { stream, deadline })
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = Some(self.deadline.remaining()?);
        timed_out(match &mut self.stream {
            Stream::Tcp(stream) => stream.set_read_timeout(remaining).and_then(|_| stream.read(buf)),
            Stream::Unix(stream) => {
                stream.set_read_timeout(remaining).and_then(|_| stream.read(buf))
            }
        })
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining = Some(self.deadline.remaining()?);
        timed_out(match &mut self.stream {
            Stream::Tcp(stream) => {
                stream.set_write_timeout(remaining).and_then(|_| stream.write(buf))
            }
            Stream::Unix(stream) => {
                stream.set_write_timeout(remaining).and_then(|_| stream.write(buf))
            }
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.stream {
            Stream::Tcp(stream) => stream.flush(),
            Stream::Unix(stream) => stream.flush(),
        }
    }
}

pub struct DatagramConnection {
    socket: UdpSocket,
    deadline: Deadline,
}

impl DatagramConnection {
    pub fn open(addr: &Address, timeout: Duration) -> io::Result<DatagramConnection> {
        let deadline = Deadline::after(timeout)?;
        let remote = inet_addr(addr)?;
        let local = if remote.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        debug!("opening datagram socket to {}", remote);

        let socket = UdpSocket::bind(local)?;
        socket.connect(remote)?;
        Ok(DatagramConnection { socket, deadline })
    }
}

impl DatagramTransport for DatagramConnection {
    fn send_datagram(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket
            .set_write_timeout(Some(self.deadline.remaining()?))?;
        timed_out(self.socket.send(buf))
    }

    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket
            .set_read_timeout(Some(self.deadline.remaining()?))?;
        timed_out(self.socket.recv(buf))
    }
}
