//! Buckets
//! -------
//!
//! A bucket is one backed-up folder within a backup set (unrelated to object
//! store buckets). Its metadata lives in an encrypted plist at
//! `/<backup_set_uuid>/buckets/<bucket_uuid>`, and the SHA-1 of its latest
//! commit in `/<backup_set_uuid>/bucketdata/<bucket_uuid>/refs/heads/master`,
//! hex-encoded and appended with a `Y` for historical reasons.
use std::fs;

use serde::Deserialize;
use tracing::warn;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::object_encryption::ObjectCipher;

#[derive(Debug, Deserialize)]
struct BucketPlist {
    #[serde(rename = "LocalPath")]
    local_path: String,
    #[serde(rename = "BucketName", default)]
    bucket_name: String,
}

#[derive(Debug)]
pub struct Bucket {
    pub uuid: String,
    pub bucket_name: String,
    pub local_path: String,
    /// Refreshed from `refs/heads/master` at open time; `None` when the
    /// bucket has no commits yet or the ref cannot be fetched.
    pub head_sha1: Option<[u8; 20]>,
}

impl Bucket {
    /// Opens the bucket whose plist lives at `key`
    /// (`<backup_set_uuid>/buckets/<bucket_uuid>`).
    pub fn open(
        connection: &Connection,
        bucket_cipher: &ObjectCipher,
        backup_set_uuid: &str,
        key: &str,
    ) -> Result<Bucket> {
        let uuid = key
            .rsplit('/')
            .next()
            .unwrap_or(key)
            .to_string();

        let plist_path = connection.cached_get(key)?;
        let encrypted = fs::read(plist_path)?;
        let decrypted = bucket_cipher.decrypt(&encrypted)?;
        let plist: BucketPlist = plist::from_bytes(&decrypted)?;

        let head_sha1 = match Self::fetch_head(connection, backup_set_uuid, &uuid) {
            Ok(sha1) => Some(sha1),
            Err(err) => {
                warn!("bucket {} has no readable HEAD: {}", uuid, err);
                None
            }
        };

        Ok(Bucket {
            uuid,
            bucket_name: plist.bucket_name,
            local_path: plist.local_path,
            head_sha1,
        })
    }

    /// Fetches the HEAD ref uncached so a fresh snapshot is seen.
    fn fetch_head(
        connection: &Connection,
        backup_set_uuid: &str,
        bucket_uuid: &str,
    ) -> Result<[u8; 20]> {
        let key = format!(
            "{}/bucketdata/{}/refs/heads/master",
            backup_set_uuid, bucket_uuid
        );
        let path = connection.get(&key)?;
        let data = fs::read(path)?;
        parse_head_ref(&data)
    }
}

/// Decodes a HEAD ref: 40 hex characters, optionally suffixed with the
/// literal byte `Y`, which is stripped before decoding.
pub(crate) fn parse_head_ref(data: &[u8]) -> Result<[u8; 20]> {
    let data = data.strip_suffix(b"Y").unwrap_or(data);
    let text = std::str::from_utf8(data)?;
    let decoded = hex::decode(text.trim())?;
    decoded
        .try_into()
        .map_err(|_| Error::ParseError("HEAD ref is not a 20-byte SHA-1".to_string()))
}
