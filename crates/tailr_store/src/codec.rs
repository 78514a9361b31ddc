//! Blob payload codec: zlib with default parameters, no framing.

use std::io::{Read as _, Write as _};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

pub fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{compress, decompress};

    #[test]
    fn round_trip() {
        let body = b"<a> <b> <c> .\n<x> <y> <z> .";
        let packed = compress(body).unwrap();
        assert_eq!(decompress(&packed).unwrap(), body);
    }

    #[test]
    fn empty_round_trip() {
        let packed = compress(b"").unwrap();
        assert_eq!(decompress(&packed).unwrap(), b"");
    }

    #[test]
    fn garbage_does_not_decompress() {
        assert!(decompress(b"definitely not a zlib stream").is_err());
    }
}
