//! Builds a small synthetic repository on disk: encrypted bucket plist,
//! HEAD ref, tree and blob packsets with fan-out indexes, and loose objects.
use std::fs;
use std::path::{Path, PathBuf};

use arqrecover::object_encryption::{calculate_sha1sum, ObjectCipher};

pub const ENCRYPTION_PASSWORD: &str = "evu";
pub const BACKUP_SET_UUID: &str = "AA16A39F-AEDC-42A5-A15B-DAA09EA22E1D";
pub const BUCKET_UUID: &str = "7C19E8AF-FFE9-4952-B1E1-8D5181012BB1";
pub const SALT: &[u8] = &[7, 1, 8, 2, 8, 1, 8, 2];

// ---- wire-format writers -------------------------------------------------

pub fn w_string(out: &mut Vec<u8>, text: &str) {
    out.push(0x01);
    out.extend_from_slice(&(text.len() as u64).to_be_bytes());
    out.extend_from_slice(text.as_bytes());
}

pub fn w_absent(out: &mut Vec<u8>) {
    out.push(0x00);
}

pub fn w_bool(out: &mut Vec<u8>, value: bool) {
    out.push(u8::from(value));
}

pub fn w_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn w_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn w_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn w_i64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn w_date(out: &mut Vec<u8>, milliseconds: u64) {
    out.push(0x01);
    w_u64(out, milliseconds);
}

/// A present blob key as a v18 tree stores it: hash, stretched flag, then
/// the v17+ archive fields.
fn w_tree_blob_key(out: &mut Vec<u8>, sha1: &[u8; 20]) {
    w_string(out, &hex::encode(sha1));
    w_bool(out, false); // is_encryption_key_stretched
    w_u32(out, 1); // storage_type: S3
    w_absent(out); // archive_id
    w_u64(out, 0); // archive_size
    w_absent(out); // archive_upload_date
}

/// An absent blob key still carries its gated fields on the wire.
fn w_tree_blob_key_absent(out: &mut Vec<u8>) {
    w_absent(out); // no hash
    w_bool(out, false);
    w_u32(out, 0);
    w_absent(out);
    w_u64(out, 0);
    w_absent(out);
}

// ---- record builders (TreeV018 / CommitV009) -----------------------------

fn node_stat_tail(out: &mut Vec<u8>, mode: i32) {
    w_i32(out, 501); // uid
    w_i32(out, 20); // gid
    w_i32(out, mode);
    w_i64(out, 1_500_000_000); // mtime_sec
    w_i64(out, 0); // mtime_nsec
    w_i64(out, 0); // flags
    w_i32(out, 0); // finder_flags
    w_i32(out, 0); // extended_finder_flags
    w_absent(out); // finder_file_type
    w_absent(out); // finder_file_creator
    w_bool(out, false); // is_file_extension_hidden
    w_i32(out, 0); // st_dev
    w_i32(out, 0); // st_ino
    w_u32(out, 1); // st_nlink
    w_i32(out, 0); // st_rdev
    w_i64(out, 1_500_000_000); // ctime_sec
    w_i64(out, 0); // ctime_nsec
    w_i64(out, 1_400_000_000); // create_time_sec
    w_i64(out, 0); // create_time_nsec
    w_i64(out, 8); // st_blocks
    w_u32(out, 4096); // st_blksize
}

fn node_bytes(name: &str, is_tree: bool, blob_sha1s: &[[u8; 20]], size: u64, mode: i32) -> Vec<u8> {
    let mut out = Vec::new();
    w_string(&mut out, name);
    w_bool(&mut out, is_tree);
    w_bool(&mut out, false); // tree_contains_missing_items (v18+)
    w_bool(&mut out, false); // data_are_compressed
    w_bool(&mut out, false); // xattrs_are_compressed
    w_bool(&mut out, false); // acl_is_compressed
    w_u32(&mut out, blob_sha1s.len() as u32);
    for sha1 in blob_sha1s {
        w_tree_blob_key(&mut out, sha1);
    }
    w_u64(&mut out, size);
    w_tree_blob_key_absent(&mut out); // xattrs
    w_u64(&mut out, 0); // xattrs_size
    w_tree_blob_key_absent(&mut out); // acl
    node_stat_tail(&mut out, mode);
    out
}

pub fn file_node(name: &str, blob_sha1s: &[[u8; 20]], size: u64) -> Vec<u8> {
    node_bytes(name, false, blob_sha1s, size, 0o644)
}

pub fn dir_node(name: &str, tree_sha1: &[u8; 20]) -> Vec<u8> {
    node_bytes(name, true, &[*tree_sha1], 0, 0o755)
}

pub fn tree_bytes(nodes: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"TreeV018");
    w_bool(&mut out, false); // xattrs_are_compressed
    w_bool(&mut out, false); // acl_is_compressed
    w_tree_blob_key_absent(&mut out); // xattrs
    w_u64(&mut out, 0); // xattrs_size
    w_tree_blob_key_absent(&mut out); // acl
    w_i32(&mut out, 501); // uid
    w_i32(&mut out, 20); // gid
    w_i32(&mut out, 0o755); // mode
    w_i64(&mut out, 1_500_000_000); // mtime_sec
    w_i64(&mut out, 0); // mtime_nsec
    w_i64(&mut out, 0); // flags
    w_i32(&mut out, 0); // finder_flags
    w_i32(&mut out, 0); // extended_finder_flags
    w_i32(&mut out, 0); // st_dev
    w_i32(&mut out, 0); // st_ino
    w_u32(&mut out, 2); // st_nlink
    w_i32(&mut out, 0); // st_rdev
    w_i64(&mut out, 1_500_000_000); // ctime_sec
    w_i64(&mut out, 0); // ctime_nsec
    w_i64(&mut out, 16); // st_blocks
    w_u32(&mut out, 4096); // st_blksize
    w_i64(&mut out, 1_400_000_000); // create_time_sec (v15+)
    w_i64(&mut out, 0); // create_time_nsec
    w_u32(&mut out, 0); // missing_node_count (v18+)
    w_u32(&mut out, nodes.len() as u32);
    for node in nodes {
        out.extend_from_slice(node);
    }
    out
}

pub fn commit_bytes(tree_sha1: &[u8; 20], location: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"CommitV009");
    w_string(&mut out, "tester@testhost");
    w_string(&mut out, "test backup");
    w_u64(&mut out, 0); // no parent commits
    w_string(&mut out, &hex::encode(tree_sha1));
    w_bool(&mut out, false); // tree is_encryption_key_stretched
    w_bool(&mut out, false); // tree is_compressed
    w_string(&mut out, location);
    w_date(&mut out, 1_500_000_000_000);
    w_u64(&mut out, 0); // no failed files
    w_bool(&mut out, false); // has_missing_nodes
    w_bool(&mut out, true); // is_complete
    w_u64(&mut out, 0); // empty config_plist_xml
    out
}

// ---- pack and index builders ---------------------------------------------

pub struct PackBuilder {
    objects: Vec<([u8; 20], Vec<u8>)>,
}

impl PackBuilder {
    pub fn new() -> PackBuilder {
        PackBuilder {
            objects: Vec::new(),
        }
    }

    /// Adds one object: the hash it is addressed by and its encrypted
    /// payload bytes.
    pub fn add(&mut self, sha1: [u8; 20], payload: Vec<u8>) -> &mut Self {
        self.objects.push((sha1, payload));
        self
    }

    /// Writes `<stem>.pack` and `<stem>.index` into `directory`.
    pub fn write(&self, directory: &Path, stem: &str) {
        fs::create_dir_all(directory).unwrap();

        let mut pack = Vec::new();
        pack.extend_from_slice(b"PACK");
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&(self.objects.len() as u64).to_be_bytes());

        let mut records: Vec<(u64, u64, [u8; 20])> = Vec::new();
        for (sha1, payload) in &self.objects {
            let offset = pack.len() as u64;
            pack.push(0x00); // mimetype absent
            pack.push(0x00); // name absent
            pack.extend_from_slice(&(payload.len() as u64).to_be_bytes());
            pack.extend_from_slice(payload);
            records.push((offset, payload.len() as u64, *sha1));
        }
        let footer = calculate_sha1sum(&pack);
        pack.extend_from_slice(&footer);
        fs::write(directory.join(format!("{}.pack", stem)), &pack).unwrap();

        records.sort_by_key(|record| record.2);
        let mut index = vec![0xFF, 0x74, 0x4F, 0x63, 0, 0, 0, 2];
        let mut fanout = [0u32; 256];
        for (_, _, sha1) in &records {
            for entry in fanout.iter_mut().skip(sha1[0] as usize) {
                *entry += 1;
            }
        }
        for entry in fanout {
            index.extend_from_slice(&entry.to_be_bytes());
        }
        for (offset, length, sha1) in &records {
            index.extend_from_slice(&offset.to_be_bytes());
            index.extend_from_slice(&length.to_be_bytes());
            index.extend_from_slice(sha1);
            index.extend_from_slice(&[0u8; 4]);
        }
        let footer = calculate_sha1sum(&index);
        index.extend_from_slice(&footer);
        fs::write(directory.join(format!("{}.index", stem)), &index).unwrap();
    }
}

// ---- repository assembly -------------------------------------------------

pub struct FixtureRepo {
    pub root: PathBuf,
    pub blob_cipher: ObjectCipher,
}

impl FixtureRepo {
    /// Lays down the non-pack parts of a repository: salt, computerinfo,
    /// encrypted bucket plist and the HEAD ref (with its trailing `Y`).
    pub fn create(root: &Path, local_path: &str, head_sha1: &[u8; 20]) -> FixtureRepo {
        let blob_cipher = ObjectCipher::new(ENCRYPTION_PASSWORD.as_bytes(), SALT);
        let bucket_cipher = ObjectCipher::new(ENCRYPTION_PASSWORD.as_bytes(), b"BucketPL");

        let set_root = root.join(BACKUP_SET_UUID);
        fs::create_dir_all(set_root.join("buckets")).unwrap();
        fs::write(set_root.join("salt"), SALT).unwrap();

        let computer_info = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<plist version=\"1.0\"><dict>\
<key>userName</key><string>tester</string>\
<key>computerName</key><string>test-machine</string>\
</dict></plist>\n";
        fs::write(set_root.join("computerinfo"), computer_info).unwrap();

        let bucket_plist = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<plist version=\"1.0\"><dict>\
<key>BucketName</key><string>source</string>\
<key>LocalPath</key><string>{}</string>\
</dict></plist>\n",
            local_path
        );
        let mut encrypted_plist = b"encrypted".to_vec();
        encrypted_plist.extend_from_slice(&bucket_cipher.encrypt(bucket_plist.as_bytes()).unwrap());
        fs::write(set_root.join("buckets").join(BUCKET_UUID), encrypted_plist).unwrap();

        let head_dir = set_root
            .join("bucketdata")
            .join(BUCKET_UUID)
            .join("refs")
            .join("heads");
        fs::create_dir_all(&head_dir).unwrap();
        fs::write(head_dir.join("master"), format!("{}Y", hex::encode(head_sha1))).unwrap();

        FixtureRepo {
            root: root.to_path_buf(),
            blob_cipher,
        }
    }

    pub fn tree_packset_dir(&self) -> PathBuf {
        self.root
            .join(BACKUP_SET_UUID)
            .join("packsets")
            .join(format!("{}-trees", BUCKET_UUID))
    }

    pub fn blob_packset_dir(&self) -> PathBuf {
        self.root
            .join(BACKUP_SET_UUID)
            .join("packsets")
            .join(format!("{}-blobs", BUCKET_UUID))
    }

    /// Writes `cleartext` as a loose object, addressed by its content hash.
    pub fn write_loose_object(&self, sha1: &[u8; 20], cleartext: &[u8]) {
        let objects_dir = self.root.join(BACKUP_SET_UUID).join("objects");
        fs::create_dir_all(&objects_dir).unwrap();
        let encrypted = self.blob_cipher.encrypt(cleartext).unwrap();
        fs::write(objects_dir.join(hex::encode(sha1)), encrypted).unwrap();
    }

    pub fn encrypt(&self, cleartext: &[u8]) -> Vec<u8> {
        self.blob_cipher.encrypt(cleartext).unwrap()
    }
}

/// Content hash used to address fixture objects.
pub fn content_sha1(cleartext: &[u8]) -> [u8; 20] {
    calculate_sha1sum(cleartext)
}
