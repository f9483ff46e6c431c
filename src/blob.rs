use crate::date::Date;
use crate::error::Result;
use crate::header::{BlobType, Header};
use crate::type_utils::ArqRead;

/// A handle pointing at either a packed object or a loose object. Which
/// fields follow the hash on the wire depends on the version of the record
/// that contains the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobKey {
    pub sha1: [u8; 20],

    /// Present for Tree version 14 or later, Commit version 4 or later.
    pub is_encryption_key_stretched: bool,

    /// Present for Commit version 8 or later, and only for the tree key, not
    /// parent-commit keys. Informational: the pipeline probes gzip anyway.
    pub is_compressed: bool,

    /// 1 == S3, 2 == Glacier; present for Tree version 17 or later,
    /// along with the archive fields below.
    pub storage_type: u32,
    pub archive_id: String,
    pub archive_size: u64,
    pub archive_upload_date: Date,
}

impl BlobKey {
    /// Decodes a blob key gated by the enclosing record's header. All gated
    /// fields are consumed even when the hash turns out to be absent; an
    /// absent hash yields `None`.
    pub fn read<R: ArqRead + std::io::Read>(
        mut reader: R,
        header: &Header,
        read_is_compressed: bool,
    ) -> Result<Option<BlobKey>> {
        let sha1 = reader.read_arq_sha1()?;

        let mut is_encryption_key_stretched = false;
        if (header.blob_type == BlobType::Tree && header.version >= 14)
            || (header.blob_type == BlobType::Commit && header.version >= 4)
        {
            is_encryption_key_stretched = reader.read_arq_bool()?;
        }

        let mut is_compressed = false;
        if header.blob_type == BlobType::Commit && header.version >= 8 && read_is_compressed {
            is_compressed = reader.read_arq_bool()?;
        }

        let mut storage_type = 0;
        let mut archive_id = String::new();
        let mut archive_size = 0;
        let mut archive_upload_date = Date::default();
        if header.blob_type == BlobType::Tree && header.version >= 17 {
            storage_type = reader.read_arq_u32()?;
            archive_id = reader.read_arq_string()?;
            archive_size = reader.read_arq_u64()?;
            archive_upload_date = reader.read_arq_date()?;
        }

        Ok(sha1.map(|sha1| BlobKey {
            sha1,
            is_encryption_key_stretched,
            is_compressed,
            storage_type,
            archive_id,
            archive_size,
            archive_upload_date,
        }))
    }
}
