use std::io::Read;

use flate2::read::ZlibDecoder;
use prost::Message;

use crate::error::Error;
use crate::osm_pbf;

/// Capabilities this decoder implements. A file whose header requires
/// anything else is rejected up front.
pub const SUPPORTED_FEATURES: [&str; 2] = ["OsmSchema-V0.6", "DenseNodes"];

/// Extracts the uncompressed payload of a blob: the bytes of the inner
/// `HeaderBlock` or `PrimitiveBlock` message.
///
/// Raw payloads pass through untouched. Zlib payloads are inflated and
/// checked against the advertised `raw_size`. Every other codec is
/// rejected as [`Error::UnsupportedCompression`].
pub fn payload(blob: &osm_pbf::Blob) -> Result<Vec<u8>, Error> {
    if let Some(raw) = &blob.raw {
        return Ok(raw.clone());
    }
    if let Some(compressed) = &blob.zlib_data {
        let expected = blob.raw_size() as usize;
        let mut data = Vec::with_capacity(expected);
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut data)
            .map_err(|err| Error::CorruptBlob(format!("zlib: {err}")))?;
        if data.len() != expected {
            return Err(Error::CorruptBlob(format!(
                "inflated to {} bytes but blob advertises {expected}",
                data.len()
            )));
        }
        return Ok(data);
    }
    Err(Error::UnsupportedCompression)
}

/// Validates the leading `OSMHeader` payload: every feature the file
/// requires must be one this decoder supports.
pub fn check_osm_header(blob: &osm_pbf::Blob) -> Result<(), Error> {
    let data = payload(blob)?;
    let header = osm_pbf::HeaderBlock::decode(data.as_slice())?;
    for feature in &header.required_features {
        if !SUPPORTED_FEATURES.contains(&feature.as_str()) {
            return Err(Error::UnsupportedFeature(feature.clone()));
        }
    }
    Ok(())
}
