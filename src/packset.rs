//! Packsets
//! --------
//!
//! Each bucket keeps two packsets, one for trees and commits and one for all
//! other small blobs, named `<bucket_uuid>-trees` and `<bucket_uuid>-blobs`.
//! A packset is a set of packs; each pack file concatenates object frames and
//! ends with a 20-byte SHA-1 of everything before it:
//!
//! ```ascii
//! object[i] mimetype     [String]
//! object[i] name         [String]
//! object[i] data length  (8-byte network-byte-order)
//! object[i] data         (n bytes, encrypted, possibly gzipped)
//! ...
//! 20-byte SHA1 of all of the above
//! ```
//!
//! Every pack has a sibling `.index` with a git-style fan-out table:
//!
//! ```ascii
//! two reserved words     (2 x 4 bytes; never interpreted)
//! fanout[0..256]         (4-byte count of SHA1s with first byte <= i)
//! record[j]              offset (8) | length (8) | sha1 (20) | pad (4)
//! ```
//!
//! Records are sorted by SHA-1, so the fan-out narrows a lookup to one
//! bucket's worth of 44-byte records.
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::compression::gunzip_or_passthrough;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::object_encryption::ObjectCipher;
use crate::type_utils::ArqRead;

const FANOUT_ENTRIES: usize = 256;
const INDEX_HEADER_LEN: u64 = 8;
const INDEX_RECORD_LEN: u64 = 44;
const PACK_FOOTER_LEN: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackSetKind {
    Trees,
    Blobs,
}

impl PackSetKind {
    pub fn suffix(self) -> &'static str {
        match self {
            PackSetKind::Trees => "trees",
            PackSetKind::Blobs => "blobs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackIndexRecord {
    pub offset: u64,
    pub length: u64,
    pub sha1: [u8; 20],
}

/// One bucket's tree- or blob-packset: resolves a content hash to a byte
/// range in a pack and fetches-and-decodes the object there.
pub struct PackSet<'a> {
    connection: &'a Connection,
    cipher: &'a ObjectCipher,
    backup_set_uuid: &'a str,
    bucket_uuid: &'a str,
    kind: PackSetKind,
}

impl<'a> PackSet<'a> {
    pub fn new(
        connection: &'a Connection,
        cipher: &'a ObjectCipher,
        backup_set_uuid: &'a str,
        bucket_uuid: &'a str,
        kind: PackSetKind,
    ) -> PackSet<'a> {
        PackSet {
            connection,
            cipher,
            backup_set_uuid,
            bucket_uuid,
            kind,
        }
    }

    /// The remote prefix of this packset, also its path below the cache root.
    pub fn prefix(&self) -> String {
        format!(
            "{}/packsets/{}-{}",
            self.backup_set_uuid,
            self.bucket_uuid,
            self.kind.suffix()
        )
    }

    fn index_directory(&self) -> PathBuf {
        self.connection.cache_directory().join(self.prefix())
    }

    /// Scans the cached `.index` files for `target`, returning the pack stem
    /// and record of the first match. Indexes are visited in enumeration
    /// order; warming (see `BackupSet::warm_indexes`) must have populated the
    /// cache first.
    pub fn resolve(&self, target: &[u8; 20]) -> Result<Option<(String, PackIndexRecord)>> {
        let directory = self.index_directory();
        if !directory.is_dir() {
            return Ok(None);
        }

        let mut index_paths: Vec<_> = fs::read_dir(&directory)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.extension().map_or(false, |ext| ext == "index"))
            .collect();
        index_paths.sort();

        for path in index_paths {
            if let Some(record) = scan_index(&path, target)? {
                let pack_name = match path.file_stem().and_then(|stem| stem.to_str()) {
                    Some(stem) => stem.to_string(),
                    None => continue,
                };
                debug!(
                    "resolved {} to {}.pack offset {} length {}",
                    hex::encode(target),
                    pack_name,
                    record.offset,
                    record.length
                );
                return Ok(Some((pack_name, record)));
            }
        }
        Ok(None)
    }

    /// Resolves `target` and decodes its cleartext; `None` when no cached
    /// index knows the hash.
    pub fn lookup(&self, target: &[u8; 20]) -> Result<Option<Vec<u8>>> {
        match self.resolve(target)? {
            Some((pack_name, record)) => Ok(Some(self.fetch_object(&pack_name, &record)?)),
            None => Ok(None),
        }
    }

    /// Fetches the pack holding `record`, verifies its SHA-1 footer and
    /// decodes the object frame at the record's offset. A corrupt cached pack
    /// is deleted and re-fetched exactly once.
    pub fn fetch_object(&self, pack_name: &str, record: &PackIndexRecord) -> Result<Vec<u8>> {
        let key = format!("{}/{}.pack", self.prefix(), pack_name);
        let mut pack_path = self.connection.cached_get(&key)?;
        if let Err(err) = validate_pack_file(&pack_path) {
            warn!("cached pack {} is corrupt ({}), re-fetching", key, err);
            let _ = fs::remove_file(&pack_path);
            pack_path = self.connection.get(&key)?;
            validate_pack_file(&pack_path)?;
        }

        // The index length covers only the payload, not the preceding
        // mimetype and name strings, so the frame is read from the offset to
        // the end of the (small) pack file.
        let mut file = File::open(&pack_path)?;
        file.seek(SeekFrom::Start(record.offset))?;
        let mut frame = Vec::new();
        file.read_to_end(&mut frame)?;

        let payload = read_object_frame(&frame)
            .map_err(|err| annotate_frame_error(err, &key, record.offset))?;
        let cleartext = self.cipher.decrypt(&payload)?;
        Ok(gunzip_or_passthrough(cleartext))
    }
}

fn annotate_frame_error(err: Error, key: &str, offset: u64) -> Error {
    match err {
        Error::TruncatedObject(msg) => {
            Error::TruncatedObject(format!("{} at offset {}: {}", key, offset, msg))
        }
        other => other,
    }
}

/// Parses one object frame: mimetype and name strings, then a length-prefixed
/// encrypted payload.
fn read_object_frame(frame: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Cursor::new(frame);
    let _mimetype = reader.read_arq_string()?;
    let _name = reader.read_arq_string()?;
    let declared = reader.read_arq_u64()?;
    let remaining = frame.len() as u64 - reader.position();
    if remaining < declared {
        return Err(Error::TruncatedObject(format!(
            "frame declares {} bytes but only {} remain",
            declared, remaining
        )));
    }
    reader.read_bytes(declared as usize)
}

/// Looks `target` up in one index file: skip the two reserved words, bound
/// the record range with the fan-out table, then scan that bucket.
fn scan_index(path: &Path, target: &[u8; 20]) -> Result<Option<PackIndexRecord>> {
    let content = fs::read(path)?;
    let mut reader = Cursor::new(&content[..]);
    reader.seek(SeekFrom::Start(INDEX_HEADER_LEN))?;

    let mut fanout = [0u32; FANOUT_ENTRIES];
    let mut previous = 0;
    for entry in fanout.iter_mut() {
        *entry = reader.read_arq_u32()?;
        if *entry < previous {
            return Err(Error::ParseError(format!(
                "{}: fan-out table is not monotonic",
                path.display()
            )));
        }
        previous = *entry;
    }

    let first = target[0] as usize;
    let below = if first == 0 { 0 } else { fanout[first - 1] } as u64;
    let upto = fanout[first] as u64;

    let records_start = INDEX_HEADER_LEN + (FANOUT_ENTRIES as u64) * 4;
    reader.seek(SeekFrom::Start(records_start + below * INDEX_RECORD_LEN))?;
    for _ in below..upto {
        let offset = reader.read_arq_u64()?;
        let length = reader.read_arq_u64()?;
        let sha1: [u8; 20] = reader
            .read_bytes(20)?
            .try_into()
            .map_err(|_| Error::ParseError("short index record".to_string()))?;
        let _padding = reader.read_bytes(4)?;
        if sha1 == *target {
            return Ok(Some(PackIndexRecord {
                offset,
                length,
                sha1,
            }));
        }
    }
    Ok(None)
}

/// Verifies a pack file's trailing 20-byte SHA-1 footer against a streaming
/// hash of everything before it.
pub fn validate_pack_file(path: &Path) -> Result<()> {
    let size = fs::metadata(path)?.len();
    if size <= PACK_FOOTER_LEN {
        return Err(Error::CorruptPack(format!(
            "{} is {} bytes, too small to carry a SHA-1 footer",
            path.display(),
            size
        )));
    }

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha1::new();
    let mut body = (&mut reader).take(size - PACK_FOOTER_LEN);
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = body.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }

    let mut footer = [0u8; PACK_FOOTER_LEN as usize];
    reader.read_exact(&mut footer)?;
    let calculated: [u8; 20] = hasher.finalize().into();
    if ring::constant_time::verify_slices_are_equal(&calculated, &footer).is_err() {
        return Err(Error::CorruptPack(path.display().to_string()));
    }
    Ok(())
}
