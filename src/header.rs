use crate::error::{Error, Result};
use crate::type_utils::ArqRead;

/// Record kind announced by a blob's self-describing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobType {
    Commit,
    Tree,
    XAttrSet,
}

/// A blob header on the wire is a 4-byte tag followed by the rest of an ASCII
/// type-plus-version string: `CommitV012`, `TreeV018` or `XAttrSetV002`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub blob_type: BlobType,
    pub version: u32,
}

impl Header {
    pub fn new<R: ArqRead + std::io::Read>(mut reader: R) -> Result<Header> {
        let tag = reader.read_bytes(4)?;
        let (blob_type, remainder, prefix) = match &tag[..] {
            b"Comm" => (BlobType::Commit, 6, "CommitV"),
            b"Tree" => (BlobType::Tree, 4, "TreeV"),
            b"XAtt" => (BlobType::XAttrSet, 8, "XAttrSetV"),
            _ => {
                return Err(Error::UnknownBlobType(
                    String::from_utf8_lossy(&tag).into_owned(),
                ))
            }
        };

        let mut data = tag;
        data.extend_from_slice(&reader.read_bytes(remainder)?);
        let text = std::str::from_utf8(&data)?;
        let version = text
            .strip_prefix(prefix)
            .and_then(|digits| digits.parse::<u32>().ok())
            .ok_or_else(|| Error::BadVersion(text.to_string()))?;

        Ok(Header { blob_type, version })
    }
}
