//! Backup sets
//! -----------
//!
//! A backup set is one machine's entire corpus in the repository, stored
//! under a top-level directory named by UUID:
//!
//! ```ascii
//! <backup_set_uuid>/salt                  8 random bytes seeding the blob cipher
//! <backup_set_uuid>/computerinfo          metadata plist
//! <backup_set_uuid>/buckets/<uuid>        encrypted plist per backed-up folder
//! <backup_set_uuid>/bucketdata/...        refs and logs
//! <backup_set_uuid>/packsets/...          tree and blob packs with indexes
//! <backup_set_uuid>/objects/<hex-sha1>    loose objects
//! ```
//!
//! Regular objects are encrypted with a cipher seeded from the stored random
//! salt; bucket plists use the fixed salt `BucketPL` (see arq_restore's
//! Bucket.m).
use std::fs;
use std::thread;

use tracing::{debug, warn};

use crate::bucket::Bucket;
use crate::computer::ComputerInfo;
use crate::connection::Connection;
use crate::error::Result;
use crate::object_encryption::ObjectCipher;
use crate::packset::PackSetKind;

pub struct BackupSet {
    pub uuid: String,
    pub computer_info: ComputerInfo,
    pub buckets: Vec<Bucket>,
    pub blob_cipher: ObjectCipher,
    pub bucket_cipher: ObjectCipher,
}

impl BackupSet {
    /// Enumerates all backup sets at the store root. Sets that fail to open
    /// (foreign layout, undecodable metadata) are skipped with a warning so
    /// one bad directory does not hide the others.
    pub fn discover(connection: &Connection, password: &[u8]) -> Result<Vec<BackupSet>> {
        let objects = connection.list_as_folders("")?;
        let mut backup_sets = Vec::new();
        for object in objects {
            match BackupSet::open(connection, password, &object.path) {
                Ok(backup_set) => backup_sets.push(backup_set),
                Err(err) => warn!("skipping {}: {}", object.path, err),
            }
        }
        Ok(backup_sets)
    }

    pub fn open(connection: &Connection, password: &[u8], uuid: &str) -> Result<BackupSet> {
        let salt_path = connection.cached_get(&format!("{}/salt", uuid))?;
        let salt = fs::read(salt_path)?;
        let blob_cipher = ObjectCipher::new(password, &salt);
        let bucket_cipher = ObjectCipher::new(password, b"BucketPL");

        let info_path = connection.cached_get(&format!("{}/computerinfo", uuid))?;
        let computer_info = ComputerInfo::from_bytes(&fs::read(info_path)?, uuid)?;

        let mut buckets = Vec::new();
        for object in connection.list_as_all(&format!("{}/buckets", uuid))? {
            buckets.push(Bucket::open(
                connection,
                &bucket_cipher,
                uuid,
                &object.path,
            )?);
        }

        Ok(BackupSet {
            uuid: uuid.to_string(),
            computer_info,
            buckets,
            blob_cipher,
            bucket_cipher,
        })
    }

    pub fn bucket(&self, uuid: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|bucket| bucket.uuid == uuid)
    }

    /// Pre-fetches every `.index` file of the bucket's packsets into the
    /// cache so lookups can scan them locally. Warming is advisory: a failed
    /// index is logged and skipped, and does not delay the others.
    pub fn warm_indexes(
        &self,
        connection: &Connection,
        bucket: &Bucket,
        kinds: &[PackSetKind],
    ) -> Result<()> {
        let mut keys = Vec::new();
        for kind in kinds {
            let prefix = format!("{}/packsets/{}-{}", self.uuid, bucket.uuid, kind.suffix());
            for object in connection.list_as_all(&prefix)? {
                if object.path.ends_with(".index") {
                    keys.push(object.path);
                }
            }
        }
        debug!("warming {} index files for bucket {}", keys.len(), bucket.uuid);

        let workers = thread::available_parallelism()
            .map(|parallelism| parallelism.get())
            .unwrap_or(2)
            * 2;
        let chunk_size = keys.len().div_ceil(workers).max(1);
        thread::scope(|scope| {
            for chunk in keys.chunks(chunk_size) {
                scope.spawn(move || {
                    for key in chunk {
                        if let Err(err) = connection.cached_get(key) {
                            warn!("failed to warm {}: {}", key, err);
                        }
                    }
                });
            }
        });
        Ok(())
    }
}
