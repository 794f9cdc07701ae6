#[macro_use]
extern crate quick_error;

pub mod error;
pub mod reply;
pub mod request;

mod datagram;
mod frame;
mod read_buffer;

pub use datagram::{exchange_datagram, DatagramTransport, Reassembler, MAX_DATAGRAM_SIZE};
pub use frame::{encode_datagram, FrameHeader, FRAME_HEADER_LEN};
pub use read_buffer::ReadBuffer;
pub use reply::*;
pub use request::*;

pub use error::{ProtocolError, Result};
