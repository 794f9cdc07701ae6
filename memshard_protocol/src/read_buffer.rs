use super::{ProtocolError, Result};
use std::io::{self, Read};

pub const DEFAULT_BUF_SIZE: usize = 8 * 1024;

pub struct ReadBuffer<T: Read> {
    stream: T,
    read_buffer: Vec<u8>,

    read_pos: usize,
    read_cap: usize,
}

impl<T: Read> ReadBuffer<T> {
    pub fn new(stream: T) -> ReadBuffer<T> {
        ReadBuffer {
            stream,
            read_buffer: vec![0; DEFAULT_BUF_SIZE],

            read_cap: 0,
            read_pos: 0,
        }
    }

    pub fn fill_buf(&mut self) -> Result<&[u8]> {
        if self.read_pos >= self.read_cap {
            debug_assert_eq!(self.read_pos, self.read_cap);
            self.read_cap = loop {
                match self.stream.read(&mut self.read_buffer) {
                    Ok(read) => break read,
                    Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err.into()),
                }
            };
            self.read_pos = 0;
            if self.read_cap == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }
        }
        Ok(&self.read_buffer[self.read_pos..self.read_cap])
    }

    pub fn consume(&mut self, amt: usize) {
        self.read_pos = std::cmp::min(self.read_pos + amt, self.read_cap);
    }

    /// Reads up to and including the next `\n`.
    pub fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();

        loop {
            let (done, used) = {
                let available = self.fill_buf()?;

                match memchr::memchr(b'\n', available) {
                    Some(index) => {
                        buf.extend_from_slice(&available[..=index]);
                        (true, index + 1)
                    }
                    None => {
                        buf.extend_from_slice(available);
                        (false, available.len())
                    }
                }
            };
            self.consume(used);

            if done {
                return Ok(buf);
            }
        }
    }

    pub fn read_exact(&mut self, size: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(size);
        while buf.len() < size {
            let used = {
                let available = self.fill_buf()?;
                let used = std::cmp::min(available.len(), size - buf.len());
                buf.extend_from_slice(&available[..used]);
                used
            };
            self.consume(used);
        }
        Ok(buf)
    }
}
