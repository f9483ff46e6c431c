use std::io::Read;

use flate2::read::GzDecoder;
use tracing::debug;

/// Inflates a decrypted payload when it is gzip, and hands it back untouched
/// when it is not. Blob keys carry an `is_compressed` flag but older
/// repositories set it inconsistently, so the probe is unconditional and
/// every gunzip failure (bad magic, short read, bad trailer) means "stored
/// uncompressed".
pub fn gunzip_or_passthrough(data: Vec<u8>) -> Vec<u8> {
    let mut inflated = Vec::new();
    match GzDecoder::new(&data[..]).read_to_end(&mut inflated) {
        Ok(_) => inflated,
        Err(err) => {
            debug!("payload is not gzip ({}), using it as-is", err);
            data
        }
    }
}
