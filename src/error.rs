use std::io;

use thiserror::Error;

/// Failures surfaced while reading and decoding a PBF stream.
///
/// Every error is fatal to the pipeline: the first one encountered is
/// delivered to the consumer and all later [`decode`] calls report
/// [`Error::Eof`].
///
/// [`decode`]: crate::Decoder::decode
#[derive(Debug, Error)]
pub enum Error {
    /// Clean end of the input stream, reached between file blocks.
    #[error("end of stream")]
    Eof,

    /// The input ended in the middle of a file block.
    #[error("truncated file block")]
    Truncated,

    /// The underlying stream failed for a reason other than running dry.
    #[error("read error: {0}")]
    Io(io::Error),

    /// A BlobHeader announced a size of 64 KiB or more.
    #[error("blob header of {0} bytes exceeds the 64 KiB limit")]
    OversizedHeader(u32),

    /// A blob announced a size of 32 MiB or more.
    #[error("blob of {0} bytes exceeds the 32 MiB limit")]
    OversizedBlob(i32),

    /// A blob or its inner message could not be reconstructed: protobuf
    /// parse failure, zlib failure, or an inflated size that does not
    /// match the advertised `raw_size`.
    #[error("corrupt blob: {0}")]
    CorruptBlob(String),

    /// The blob carries its payload in a codec other than raw or zlib.
    #[error("unsupported blob compression codec")]
    UnsupportedCompression,

    /// The first block was not an `OSMHeader`, or a later block was not
    /// an `OSMData`.
    #[error("unexpected file block of type {0:?}")]
    UnexpectedBlockType(String),

    /// The file requires a capability outside the supported set.
    #[error("file requires unsupported feature {0:?}")]
    UnsupportedFeature(String),

    /// A PrimitiveBlock violated its own invariants: a string table index
    /// out of range, or parallel arrays of differing lengths.
    #[error("corrupt primitive block: {0}")]
    CorruptBlock(String),
}

impl Error {
    /// True for the clean end-of-stream marker.
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Eof)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::Truncated,
            _ => Error::Io(err),
        }
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::CorruptBlob(err.to_string())
    }
}

/// An [`Error`] together with the stream offset of the file block it
/// arose from.
#[derive(Debug, Error)]
#[error("{kind} (file block at byte {position})")]
pub struct DecodeError {
    /// Offset of the offending block's length prefix.
    pub position: u64,
    pub kind: Error,
}

impl DecodeError {
    /// True for the clean end-of-stream marker.
    pub fn is_eof(&self) -> bool {
        self.kind.is_eof()
    }
}
