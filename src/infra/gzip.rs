use crate::app::ports::CompressorPort;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// gzip at the default level, the format `DTEUpload` accepts as `application/gzip`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCompressor;

impl CompressorPort for GzipCompressor {
    fn try_compress(&self, bytes: &[u8]) -> Result<Vec<u8>, String> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
        encoder.write_all(bytes).map_err(|e| e.to_string())?;
        encoder.finish().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn produces_a_gzip_member() {
        let xml = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<EnvioDTE/>";
        let gz = GzipCompressor.try_compress(xml).unwrap();
        assert_eq!(&gz[..2], &[0x1f, 0x8b]);

        let mut plain = Vec::new();
        GzDecoder::new(gz.as_slice()).read_to_end(&mut plain).unwrap();
        assert_eq!(plain, xml);
    }
}
