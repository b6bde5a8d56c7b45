//! Streaming decoder for OpenStreetMap PBF files (`*.osm.pbf`).
//!
//! A PBF file is a stream of length-prefixed, optionally zlib-compressed
//! blocks. [`Decoder`] reads such a stream, fans the blocks out to a pool
//! of worker threads and hands back [`Element`]s (nodes, ways, relations)
//! in exactly the order their blocks appear in the file.
//!
//! ```no_run
//! use osm_pbf_stream::{Decoder, Element};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = std::io::BufReader::new(std::fs::File::open("planet.osm.pbf")?);
//! let mut decoder = Decoder::new(file);
//! decoder.start(4)?;
//! for entity in &mut decoder {
//!     let (element, position) = entity?;
//!     if let Element::Node(node) = element {
//!         println!("node {} at ({}, {}) from block @{position}", node.id, node.lat, node.lon);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod blob;
mod block;
pub mod decoder;
pub mod element;
pub mod error;
pub mod reader;

/// Wire messages of the PBF format, generated from `proto/fileformat.proto`
/// and `proto/osmformat.proto`.
pub mod osm_pbf {
    include!(concat!(env!("OUT_DIR"), "/osm_pbf.rs"));
}

pub use decoder::Decoder;
pub use element::{Element, Member, MemberType, Node, Relation, Tags, Way};
pub use error::{DecodeError, Error};
pub use reader::BlobReader;
