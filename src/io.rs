//! Backing storage traits
//!
//! The decoder reads through [`DataSource`], a minimal random-access byte
//! source; the encoder writes through [`DataTarget`], an append-only sink.
//! Both are implemented for the matching `std::io` traits, so files,
//! buffered readers and `Cursor<Vec<u8>>` work directly.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Random-access byte source used by the decoder
pub trait DataSource {
    /// Read up to `buf.len()` bytes at the current position
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Move to an absolute position
    fn seek(&mut self, position: u64) -> io::Result<()>;

    /// Current absolute position
    fn position(&mut self) -> io::Result<u64>;

    /// Read until `buf` is full or the source is exhausted
    ///
    /// Returns the number of bytes read, which is short only at end of data.
    fn read_fully(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<T: Read + Seek> DataSource for T {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        Seek::seek(self, SeekFrom::Start(position)).map(|_| ())
    }

    fn position(&mut self) -> io::Result<u64> {
        Seek::stream_position(self)
    }
}

/// Append-only byte sink used by the encoder
pub trait DataTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;
}

impl<T: Write> DataTarget for T {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf)
    }
}
