use super::{Command, ProtocolError, Result};

pub const FRAME_HEADER_LEN: usize = 8;

/// The header memcached puts in front of every UDP datagram, all fields big-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub request_id: u16,
    pub sequence: u16,
    pub total: u16,
    pub reserved: u16,
}

impl FrameHeader {
    pub fn request(request_id: u16) -> FrameHeader {
        FrameHeader {
            request_id,
            sequence: 0,
            total: 1,
            reserved: 0,
        }
    }

    pub fn from_buf(buf: &[u8]) -> Result<FrameHeader> {
        if buf.len() < FRAME_HEADER_LEN {
            return Err(ProtocolError::MalformedFrame(
                "datagram is shorter than its frame header",
            ));
        }
        let field = |offset: usize| u16::from_be_bytes([buf[offset], buf[offset + 1]]);

        Ok(FrameHeader {
            request_id: field(0),
            sequence: field(2),
            total: field(4),
            reserved: field(6),
        })
    }

    pub fn into_bytes(self) -> [u8; FRAME_HEADER_LEN] {
        let mut buf = [0; FRAME_HEADER_LEN];
        buf[0..2].copy_from_slice(&self.request_id.to_be_bytes());
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..6].copy_from_slice(&self.total.to_be_bytes());
        buf[6..8].copy_from_slice(&self.reserved.to_be_bytes());
        buf
    }
}

pub fn encode_datagram(request_id: u16, command: &Command) -> Vec<u8> {
    let mut datagram = FrameHeader::request(request_id).into_bytes().to_vec();
    datagram.extend_from_slice(command.encode().as_slice());
    datagram
}
