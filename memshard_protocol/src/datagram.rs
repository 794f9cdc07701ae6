use std::collections::BTreeMap;
use std::io;
use std::net::UdpSocket;

use log::trace;

use super::{encode_datagram, Command, FrameHeader, ProtocolError, Result, FRAME_HEADER_LEN};

pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

pub trait DatagramTransport {
    fn send_datagram(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl DatagramTransport for UdpSocket {
    fn send_datagram(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)
    }

    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

/// Rebuilds one response from the datagrams carrying it.
///
/// The first datagram with our request id fixes the expected datagram count. Fragments are kept
/// by sequence number, so they may arrive in any order; duplicates and datagrams answering other
/// requests are dropped. The response is complete once every sequence number has been seen.
pub struct Reassembler {
    request_id: u16,
    total: Option<u16>,
    fragments: BTreeMap<u16, Vec<u8>>,
}

impl Reassembler {
    pub fn new(request_id: u16) -> Reassembler {
        Reassembler {
            request_id,
            total: None,
            fragments: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, datagram: &[u8]) -> Result<bool> {
        let header = FrameHeader::from_buf(datagram)?;

        if header.request_id != self.request_id {
            trace!(
                "dropping datagram for request {} while waiting for {}",
                header.request_id,
                self.request_id
            );
            return Ok(self.is_complete());
        }
        if header.total == 0 {
            return Err(ProtocolError::MalformedFrame("datagram count is zero"));
        }
        match self.total {
            Some(total) if total != header.total => {
                return Err(ProtocolError::MalformedFrame(
                    "datagram count changed within one response",
                ));
            }
            _ => self.total = Some(header.total),
        }
        if header.sequence >= header.total {
            return Err(ProtocolError::MalformedFrame(
                "sequence number is beyond the datagram count",
            ));
        }

        trace!(
            "datagram {}/{} of request {}: {} bytes",
            header.sequence + 1,
            header.total,
            header.request_id,
            datagram.len() - FRAME_HEADER_LEN
        );
        self.fragments
            .entry(header.sequence)
            .or_insert_with(|| datagram[FRAME_HEADER_LEN..].to_vec());

        Ok(self.is_complete())
    }

    pub fn is_complete(&self) -> bool {
        match self.total {
            Some(total) => self.fragments.len() == total as usize,
            None => false,
        }
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.fragments.into_iter().flat_map(|(_, fragment)| fragment).collect()
    }
}

pub fn exchange_datagram<T: DatagramTransport>(
    transport: &mut T,
    request_id: u16,
    command: &Command,
) -> Result<Vec<u8>> {
    let request = encode_datagram(request_id, command);
    let sent = transport.send_datagram(&request)?;
    if sent != request.len() {
        let err = io::Error::new(io::ErrorKind::WriteZero, "request datagram was truncated");
        return Err(err.into());
    }

    let mut buf = vec![0; MAX_DATAGRAM_SIZE];
    let mut reassembler = Reassembler::new(request_id);
    loop {
        let read = transport.recv_datagram(&mut buf)?;
        if reassembler.push(&buf[..read])? {
            return Ok(reassembler.into_payload());
        }
    }
}
