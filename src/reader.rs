use std::io::{ErrorKind, Read};

use prost::Message;
use tracing::trace;

use crate::error::Error;
use crate::osm_pbf;

/// A BlobHeader may not reach 64 KiB.
pub const MAX_BLOB_HEADER_SIZE: u32 = 64 * 1024;
/// A blob may not reach 32 MiB.
pub const MAX_BLOB_SIZE: i32 = 32 * 1024 * 1024;

/// Frames `(BlobHeader, Blob)` file blocks off a raw byte stream.
///
/// Each block is laid out as a big-endian `u32` header length, the
/// `BlobHeader` message, then `datasize` bytes of `Blob` message. The
/// reader tracks its byte offset so every block can be reported together
/// with the position it started at.
pub struct BlobReader<R> {
    stream: R,
    offset: u64,
}

impl<R: Read> BlobReader<R> {
    pub fn new(stream: R) -> Self {
        Self { stream, offset: 0 }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Reads the next file block, returning it with the offset at which
    /// it started. A stream that ends cleanly between blocks yields
    /// [`Error::Eof`]; one that ends mid-block yields [`Error::Truncated`].
    pub fn read_file_block(&mut self) -> Result<(osm_pbf::BlobHeader, osm_pbf::Blob, u64), Error> {
        let position = self.offset;
        let header_size = self.read_header_size()?;
        let header = self.read_blob_header(header_size)?;
        let blob = self.read_blob(&header)?;
        let block_type = header.r#type.as_str();
        trace!(position, block_type, datasize = header.datasize, "read file block");
        Ok((header, blob, position))
    }

    /// The 4-byte length prefix is the only place where running out of
    /// input is not an error. Zero bytes here is the end of the stream;
    /// one to three bytes is a truncated file.
    fn read_header_size(&mut self) -> Result<u32, Error> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Err(Error::Eof),
                Ok(0) => return Err(Error::Truncated),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::Io(err)),
            }
        }
        self.offset += buf.len() as u64;
        let size = u32::from_be_bytes(buf);
        if size >= MAX_BLOB_HEADER_SIZE {
            return Err(Error::OversizedHeader(size));
        }
        Ok(size)
    }

    fn read_blob_header(&mut self, size: u32) -> Result<osm_pbf::BlobHeader, Error> {
        let mut buf = vec![0u8; size as usize];
        self.read_exact(&mut buf)?;
        let header = osm_pbf::BlobHeader::decode(buf.as_slice())?;
        if header.datasize >= MAX_BLOB_SIZE {
            return Err(Error::OversizedBlob(header.datasize));
        }
        if header.datasize < 0 {
            return Err(Error::CorruptBlob(format!(
                "blob header announces negative size {}",
                header.datasize
            )));
        }
        Ok(header)
    }

    fn read_blob(&mut self, header: &osm_pbf::BlobHeader) -> Result<osm_pbf::Blob, Error> {
        let mut buf = vec![0u8; header.datasize as usize];
        self.read_exact(&mut buf)?;
        Ok(osm_pbf::Blob::decode(buf.as_slice())?)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        // Error::from maps UnexpectedEof to Truncated.
        self.stream.read_exact(buf).map_err(Error::from)?;
        self.offset += buf.len() as u64;
        Ok(())
    }
}
