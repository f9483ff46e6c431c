//! Commits, Trees and Nodes
//! ------------------------
//!
//! Each backup corresponds to a "commit" object named by the SHA1 of its
//! contents. The commit points at a "tree" object for the backed-up folder;
//! each tree contains "nodes" that point at either another tree or at the
//! data blobs of a file.
//!
//! The records are self-describing: every commit, tree and xattr-set blob
//! starts with an ASCII type-plus-version header (`CommitV009`, `TreeV018`,
//! ...), and which fields follow depends on that version. The decoders here
//! read a version up front and then conditionally consume.
use std::io::Cursor;

use crate::blob::BlobKey;
use crate::date::Date;
use crate::error::{Error, Result};
use crate::header::{BlobType, Header};
use crate::type_utils::ArqRead;

/// Node
///
/// Byte layout (fields marked with a version range are only present for the
/// enclosing tree's version):
///
/// ```ascii
///     [String:"<file name>"]
///     [Bool:is_tree]
///     [Bool:tree_contains_missing_items]          /* tree v18+ */
///     [Bool:data_are_compressed]                  /* tree v12+ */
///     [Bool:xattrs_are_compressed]                /* tree v12+ */
///     [Bool:acl_is_compressed]                    /* tree v12+ */
///     [UInt32:data_blob_keys_count]
///     ( [BlobKey:data_blob_key] )                 /* repeated */
///     [UInt64:uncompressed_data_size]
///     [BlobKey:thumbnail_blob_key]                /* tree v17 or earlier */
///     [BlobKey:preview_blob_key]                  /* tree v17 or earlier */
///     [BlobKey:xattrs_blob_key]                   /* null if no xattrs */
///     [UInt64:xattrs_size]
///     [BlobKey:acl_blob_key]                      /* null if no acl */
///     [Int32:uid] [Int32:gid] [Int32:mode]
///     [Int64:mtime_sec] [Int64:mtime_nsec]
///     [Int64:flags]
///     [Int32:finder_flags] [Int32:extended_finder_flags]
///     [String:"<finder file type>"]
///     [String:"<finder file creator>"]
///     [Bool:is_file_extension_hidden]
///     [Int32:st_dev] [Int32:st_ino]
///     [UInt32:st_nlink] [Int32:st_rdev]
///     [Int64:ctime_sec] [Int64:ctime_nsec]
///     [Int64:create_time_sec] [Int64:create_time_nsec]
///     [Int64:st_blocks] [UInt32:st_blksize]
/// ```
///
/// A node has multiple data SHA1s when the file was split into several blobs;
/// restoring concatenates their cleartexts in order.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub is_tree: bool,
    pub tree_contains_missing_items: bool,
    pub data_are_compressed: bool,
    pub xattrs_are_compressed: bool,
    pub acl_is_compressed: bool,
    pub data_blob_keys: Vec<BlobKey>,
    pub uncompressed_data_size: u64,
    pub thumbnail_blob_key: Option<BlobKey>,
    pub preview_blob_key: Option<BlobKey>,
    pub xattrs_blob_key: Option<BlobKey>,
    pub xattrs_size: u64,
    pub acl_blob_key: Option<BlobKey>,
    pub uid: i32,
    pub gid: i32,
    pub mode: i32,
    pub mtime_sec: i64,
    pub mtime_nsec: i64,
    pub flags: i64,
    pub finder_flags: i32,
    pub extended_finder_flags: i32,
    pub finder_file_type: String,
    pub finder_file_creator: String,
    pub is_file_extension_hidden: bool,
    pub st_dev: i32,
    pub st_ino: i32,
    pub st_nlink: u32,
    pub st_rdev: i32,
    pub ctime_sec: i64,
    pub ctime_nsec: i64,
    pub create_time_sec: i64,
    pub create_time_nsec: i64,
    pub st_blocks: i64,
    pub st_blksize: u32,
}

impl Node {
    pub fn new<R: ArqRead + std::io::Read>(mut reader: R, tree_header: &Header) -> Result<Node> {
        let name = reader.read_arq_string()?;
        let is_tree = reader.read_arq_bool()?;

        let mut tree_contains_missing_items = false;
        if tree_header.version >= 18 {
            tree_contains_missing_items = reader.read_arq_bool()?;
        }

        let mut data_are_compressed = false;
        let mut xattrs_are_compressed = false;
        let mut acl_is_compressed = false;
        if tree_header.version >= 12 {
            data_are_compressed = reader.read_arq_bool()?;
            xattrs_are_compressed = reader.read_arq_bool()?;
            acl_is_compressed = reader.read_arq_bool()?;
        }

        let data_blob_keys_count = reader.read_arq_u32()?;
        let mut data_blob_keys = Vec::new();
        for _ in 0..data_blob_keys_count {
            if let Some(key) = BlobKey::read(&mut reader, tree_header, data_are_compressed)? {
                data_blob_keys.push(key);
            }
        }
        let uncompressed_data_size = reader.read_arq_u64()?;

        let mut thumbnail_blob_key = None;
        let mut preview_blob_key = None;
        if tree_header.version < 18 {
            thumbnail_blob_key = BlobKey::read(&mut reader, tree_header, false)?;
            preview_blob_key = BlobKey::read(&mut reader, tree_header, false)?;
        }

        let xattrs_blob_key = BlobKey::read(&mut reader, tree_header, true)?;
        let xattrs_size = reader.read_arq_u64()?;
        let acl_blob_key = BlobKey::read(&mut reader, tree_header, true)?;
        let uid = reader.read_arq_i32()?;
        let gid = reader.read_arq_i32()?;
        let mode = reader.read_arq_i32()?;
        let mtime_sec = reader.read_arq_i64()?;
        let mtime_nsec = reader.read_arq_i64()?;
        let flags = reader.read_arq_i64()?;
        let finder_flags = reader.read_arq_i32()?;
        let extended_finder_flags = reader.read_arq_i32()?;
        let finder_file_type = reader.read_arq_string()?;
        let finder_file_creator = reader.read_arq_string()?;
        let is_file_extension_hidden = reader.read_arq_bool()?;
        let st_dev = reader.read_arq_i32()?;
        let st_ino = reader.read_arq_i32()?;
        let st_nlink = reader.read_arq_u32()?;
        let st_rdev = reader.read_arq_i32()?;
        let ctime_sec = reader.read_arq_i64()?;
        let ctime_nsec = reader.read_arq_i64()?;
        let create_time_sec = reader.read_arq_i64()?;
        let create_time_nsec = reader.read_arq_i64()?;
        let st_blocks = reader.read_arq_i64()?;
        let st_blksize = reader.read_arq_u32()?;

        Ok(Node {
            name,
            is_tree,
            tree_contains_missing_items,
            data_are_compressed,
            xattrs_are_compressed,
            acl_is_compressed,
            data_blob_keys,
            uncompressed_data_size,
            thumbnail_blob_key,
            preview_blob_key,
            xattrs_blob_key,
            xattrs_size,
            acl_blob_key,
            uid,
            gid,
            mode,
            mtime_sec,
            mtime_nsec,
            flags,
            finder_flags,
            extended_finder_flags,
            finder_file_type,
            finder_file_creator,
            is_file_extension_hidden,
            st_dev,
            st_ino,
            st_nlink,
            st_rdev,
            ctime_sec,
            ctime_nsec,
            create_time_sec,
            create_time_nsec,
            st_blocks,
            st_blksize,
        })
    }
}

/// Tree
///
/// ```ascii
///     54 72 65 65 56 30 31 38                     "TreeV018"
///     [Bool:xattrs_are_compressed]                /* v12+ */
///     [Bool:acl_is_compressed]                    /* v12+ */
///     [BlobKey:xattrs_blob_key]                   /* null if no xattrs */
///     [UInt64:xattrs_size]
///     [BlobKey:acl_blob_key]                      /* null if no acl */
///     [Int32:uid] [Int32:gid] [Int32:mode]
///     [Int64:mtime_sec] [Int64:mtime_nsec]
///     [Int64:flags]
///     [Int32:finder_flags] [Int32:extended_finder_flags]
///     [Int32:st_dev] [Int32:st_ino]
///     [UInt32:st_nlink] [Int32:st_rdev]
///     [Int64:ctime_sec] [Int64:ctime_nsec]
///     [Int64:st_blocks] [UInt32:st_blksize]
///     [UInt64:aggregate_size_on_disk]             /* v11 to v16 */
///     [Int64:create_time_sec]                     /* v15+ */
///     [Int64:create_time_nsec]                    /* v15+ */
///     [UInt32:missing_node_count]                 /* v18+ */
///     ( [Node] )                                  /* repeated */
///     [UInt32:node_count]
///     ( [Node] )                                  /* repeated */
/// ```
#[derive(Debug, Clone)]
pub struct Tree {
    pub header: Header,
    pub xattrs_are_compressed: bool,
    pub acl_is_compressed: bool,
    pub xattrs_blob_key: Option<BlobKey>,
    pub xattrs_size: u64,
    pub acl_blob_key: Option<BlobKey>,
    pub uid: i32,
    pub gid: i32,
    pub mode: i32,
    pub mtime_sec: i64,
    pub mtime_nsec: i64,
    pub flags: i64,
    pub finder_flags: i32,
    pub extended_finder_flags: i32,
    pub st_dev: i32,
    pub st_ino: i32,
    pub st_nlink: u32,
    pub st_rdev: i32,
    pub ctime_sec: i64,
    pub ctime_nsec: i64,
    pub st_blocks: i64,
    pub st_blksize: u32,
    pub aggregate_size_on_disk: u64,
    pub create_time_sec: i64,
    pub create_time_nsec: i64,
    pub missing_nodes: Vec<Node>,
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Decodes a tree from its cleartext bytes (already decrypted and
    /// decompressed by the blob pipeline).
    pub fn new(content: &[u8]) -> Result<Tree> {
        let mut reader = Cursor::new(content);
        let header = Header::new(&mut reader)?;
        if header.blob_type != BlobType::Tree {
            return Err(Error::ParseError(format!(
                "expected a tree blob, found {:?}",
                header.blob_type
            )));
        }

        let mut xattrs_are_compressed = false;
        let mut acl_is_compressed = false;
        if header.version >= 12 {
            xattrs_are_compressed = reader.read_arq_bool()?;
            acl_is_compressed = reader.read_arq_bool()?;
        }

        let xattrs_blob_key = BlobKey::read(&mut reader, &header, true)?;
        let xattrs_size = reader.read_arq_u64()?;
        let acl_blob_key = BlobKey::read(&mut reader, &header, true)?;
        let uid = reader.read_arq_i32()?;
        let gid = reader.read_arq_i32()?;
        let mode = reader.read_arq_i32()?;
        let mtime_sec = reader.read_arq_i64()?;
        let mtime_nsec = reader.read_arq_i64()?;
        let flags = reader.read_arq_i64()?;
        let finder_flags = reader.read_arq_i32()?;
        let extended_finder_flags = reader.read_arq_i32()?;
        let st_dev = reader.read_arq_i32()?;
        let st_ino = reader.read_arq_i32()?;
        let st_nlink = reader.read_arq_u32()?;
        let st_rdev = reader.read_arq_i32()?;
        let ctime_sec = reader.read_arq_i64()?;
        let ctime_nsec = reader.read_arq_i64()?;
        let st_blocks = reader.read_arq_i64()?;
        let st_blksize = reader.read_arq_u32()?;

        let mut aggregate_size_on_disk = 0;
        if header.version >= 11 && header.version <= 16 {
            aggregate_size_on_disk = reader.read_arq_u64()?;
        }

        let mut create_time_sec = 0;
        let mut create_time_nsec = 0;
        if header.version >= 15 {
            create_time_sec = reader.read_arq_i64()?;
            create_time_nsec = reader.read_arq_i64()?;
        }

        let mut missing_nodes = Vec::new();
        if header.version >= 18 {
            let missing_node_count = reader.read_arq_u32()?;
            for _ in 0..missing_node_count {
                missing_nodes.push(Node::new(&mut reader, &header)?);
            }
        }

        let node_count = reader.read_arq_u32()?;
        let mut nodes = Vec::new();
        for _ in 0..node_count {
            nodes.push(Node::new(&mut reader, &header)?);
        }

        Ok(Tree {
            header,
            xattrs_are_compressed,
            acl_is_compressed,
            xattrs_blob_key,
            xattrs_size,
            acl_blob_key,
            uid,
            gid,
            mode,
            mtime_sec,
            mtime_nsec,
            flags,
            finder_flags,
            extended_finder_flags,
            st_dev,
            st_ino,
            st_nlink,
            st_rdev,
            ctime_sec,
            ctime_nsec,
            st_blocks,
            st_blksize,
            aggregate_size_on_disk,
            create_time_sec,
            create_time_nsec,
            missing_nodes,
            nodes,
        })
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

/// A file the backup failed to read, recorded in the commit (v3 or later).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailedFile {
    pub relative_path: String,
    pub error_message: String,
}

impl CommitFailedFile {
    pub fn new<R: ArqRead + std::io::Read>(mut reader: R) -> Result<CommitFailedFile> {
        let relative_path = reader.read_arq_string()?;
        let error_message = reader.read_arq_string()?;
        Ok(CommitFailedFile {
            relative_path,
            error_message,
        })
    }
}

/// Commit
///
/// ```ascii
///     43 6f 6d 6d 69 74 56 30 30 39               "CommitV009"
///     [String:"<author>"]
///     [String:"<comment>"]
///     [UInt64:num_parent_commits]                 (always 0 or 1)
///     ( [BlobKey:parent_commit] )                 /* repeated */
///     [BlobKey:tree]                              /* can't be null */
///     [String:"file://<hostname><path_to_folder>"]
///     [String:"<merge_common_ancestor_sha1>"]     /* v7 or older */
///     [Bool:is_merge_common_ancestor_encryption_key_stretched] /* v4 to v7 */
///     [Date:creation_date]
///     [UInt64:num_failed_files]                   /* v3+ */
///     ( [String:"<relative_path>"]
///       [String:"<error_message>"] )              /* repeated */
///     [Bool:has_missing_nodes]                    /* v8+ */
///     [Bool:is_complete]                          /* v9+ */
///     [Data:config_plist_xml]                     /* v5+ */
/// ```
///
/// The SHA1 of the most recent commit is stored in
/// `/<backup_set_uuid>/bucketdata/<bucket_uuid>/refs/heads/master`, appended
/// with a `Y` for historical reasons.
#[derive(Debug, Clone)]
pub struct Commit {
    pub header: Header,
    pub author: String,
    pub comment: String,
    pub parent_commits: Vec<BlobKey>,
    pub tree_blob_key: BlobKey,
    pub location: String,
    pub merge_common_ancestor_sha1: String,
    pub is_merge_common_ancestor_encryption_key_stretched: bool,
    pub creation_date: Date,
    pub failed_files: Vec<CommitFailedFile>,
    pub has_missing_nodes: bool,
    pub is_complete: bool,
    pub config_plist_xml: Vec<u8>,
}

impl Commit {
    pub fn new<R: ArqRead + std::io::Read>(mut reader: R) -> Result<Commit> {
        let header = Header::new(&mut reader)?;
        if header.blob_type != BlobType::Commit {
            return Err(Error::ParseError(format!(
                "expected a commit blob, found {:?}",
                header.blob_type
            )));
        }

        let author = reader.read_arq_string()?;
        let comment = reader.read_arq_string()?;

        let num_parent_commits = reader.read_arq_u64()?;
        let mut parent_commits = Vec::new();
        for _ in 0..num_parent_commits {
            if let Some(parent) = BlobKey::read(&mut reader, &header, false)? {
                parent_commits.push(parent);
            }
        }

        let tree_blob_key = BlobKey::read(&mut reader, &header, true)?
            .ok_or_else(|| Error::ParseError("commit has no tree blob key".to_string()))?;
        let location = reader.read_arq_string()?;

        let mut merge_common_ancestor_sha1 = String::new();
        let mut is_merge_common_ancestor_encryption_key_stretched = false;
        if header.version < 8 {
            merge_common_ancestor_sha1 = reader.read_arq_string()?;
            if header.version >= 4 {
                is_merge_common_ancestor_encryption_key_stretched = reader.read_arq_bool()?;
            }
        }

        let creation_date = reader.read_arq_date()?;

        let mut failed_files = Vec::new();
        if header.version >= 3 {
            let num_failed_files = reader.read_arq_u64()?;
            for _ in 0..num_failed_files {
                failed_files.push(CommitFailedFile::new(&mut reader)?);
            }
        }

        let mut has_missing_nodes = false;
        if header.version >= 8 {
            has_missing_nodes = reader.read_arq_bool()?;
        }

        let mut is_complete = false;
        if header.version >= 9 {
            is_complete = reader.read_arq_bool()?;
        }

        let mut config_plist_xml = Vec::new();
        if header.version >= 5 {
            config_plist_xml = reader.read_arq_data()?;
        }

        Ok(Commit {
            header,
            author,
            comment,
            parent_commits,
            tree_blob_key,
            location,
            merge_common_ancestor_sha1,
            is_merge_common_ancestor_encryption_key_stretched,
            creation_date,
            failed_files,
            has_missing_nodes,
            is_complete,
            config_plist_xml,
        })
    }

    /// The filesystem path of the backed-up folder, extracted from the
    /// `file://<hostname><path>` location string.
    pub fn path(&self) -> &str {
        match self.location.strip_prefix("file://") {
            Some(rest) => match rest.find('/') {
                Some(index) => &rest[index..],
                None => rest,
            },
            None => &self.location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA1_A: &str = "da8a00357643d481b5b46c9dc9c41277b35b9e85";
    const SHA1_B: &str = "c0571537d57d94881643039550dfded5cb6cfcd2";

    fn w_string(out: &mut Vec<u8>, text: &str) {
        out.push(0x01);
        out.extend_from_slice(&(text.len() as u64).to_be_bytes());
        out.extend_from_slice(text.as_bytes());
    }

    fn w_absent(out: &mut Vec<u8>) {
        out.push(0x00);
    }

    fn w_bool(out: &mut Vec<u8>, value: bool) {
        out.push(u8::from(value));
    }

    fn w_u32(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn w_i32(out: &mut Vec<u8>, value: i32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn w_u64(out: &mut Vec<u8>, value: u64) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn w_i64(out: &mut Vec<u8>, value: i64) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn w_date(out: &mut Vec<u8>, milliseconds: u64) {
        out.push(0x01);
        w_u64(out, milliseconds);
    }

    // A v12 file node pointing at a single data blob.
    fn v12_file_node(name: &str, sha1: &str, size: u64) -> Vec<u8> {
        let mut out = Vec::new();
        w_string(&mut out, name);
        w_bool(&mut out, false); // is_tree
        w_bool(&mut out, false); // data_are_compressed
        w_bool(&mut out, false); // xattrs_are_compressed
        w_bool(&mut out, false); // acl_is_compressed
        w_u32(&mut out, 1);
        w_string(&mut out, sha1); // data blob key (v12: hash only)
        w_u64(&mut out, size);
        w_absent(&mut out); // thumbnail (v < 18)
        w_absent(&mut out); // preview (v < 18)
        w_absent(&mut out); // xattrs
        w_u64(&mut out, 0); // xattrs_size
        w_absent(&mut out); // acl
        w_i32(&mut out, 501); // uid
        w_i32(&mut out, 20); // gid
        w_i32(&mut out, 0o644); // mode
        w_i64(&mut out, 1_500_000_000); // mtime_sec
        w_i64(&mut out, 0); // mtime_nsec
        w_i64(&mut out, 0); // flags
        w_i32(&mut out, 0); // finder_flags
        w_i32(&mut out, 0); // extended_finder_flags
        w_absent(&mut out); // finder_file_type
        w_absent(&mut out); // finder_file_creator
        w_bool(&mut out, false); // is_file_extension_hidden
        w_i32(&mut out, 0); // st_dev
        w_i32(&mut out, 0); // st_ino
        w_u32(&mut out, 1); // st_nlink
        w_i32(&mut out, 0); // st_rdev
        w_i64(&mut out, 1_500_000_000); // ctime_sec
        w_i64(&mut out, 0); // ctime_nsec
        w_i64(&mut out, 1_400_000_000); // create_time_sec
        w_i64(&mut out, 0); // create_time_nsec
        w_i64(&mut out, 8); // st_blocks
        w_u32(&mut out, 4096); // st_blksize
        out
    }

    fn v12_tree(nodes: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"TreeV012");
        w_bool(&mut out, false); // xattrs_are_compressed
        w_bool(&mut out, false); // acl_is_compressed
        w_absent(&mut out); // xattrs
        w_u64(&mut out, 0); // xattrs_size
        w_absent(&mut out); // acl
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
        w_u64(&mut out, 123_456); // aggregate_size_on_disk (v11-16)
        w_u32(&mut out, nodes.len() as u32);
        for node in nodes {
            out.extend_from_slice(node);
        }
        out
    }

    #[test]
    fn test_v12_tree_with_one_file() {
        let bytes = v12_tree(&[v12_file_node("somefile", SHA1_A, 1024)]);
        let tree = Tree::new(&bytes).unwrap();

        assert_eq!(tree.header.version, 12);
        assert_eq!(tree.mode, 0o755);
        assert_eq!(tree.aggregate_size_on_disk, 123_456);
        assert!(tree.missing_nodes.is_empty());
        assert_eq!(tree.nodes.len(), 1);

        let node = tree.node("somefile").unwrap();
        assert!(!node.is_tree);
        assert_eq!(node.uncompressed_data_size, 1024);
        assert_eq!(node.data_blob_keys.len(), 1);
        assert_eq!(hex::encode(node.data_blob_keys[0].sha1), SHA1_A);
        assert!(node.thumbnail_blob_key.is_none());
        assert!(node.xattrs_blob_key.is_none());
        assert_eq!(node.mode, 0o644);
        assert_eq!(node.st_blksize, 4096);
    }

    #[test]
    fn test_tree_rejects_commit_bytes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"CommitV009");
        assert!(Tree::new(&bytes).is_err());
    }

    fn v9_commit() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"CommitV009");
        w_string(&mut out, "me@laptop");
        w_string(&mut out, "scheduled backup");
        w_u64(&mut out, 1); // one parent commit
        w_string(&mut out, SHA1_B);
        w_bool(&mut out, true); // parent is_encryption_key_stretched (v4+)
        w_string(&mut out, SHA1_A);
        w_bool(&mut out, true); // tree is_encryption_key_stretched (v4+)
        w_bool(&mut out, false); // tree is_compressed (v8+)
        w_string(&mut out, "file://laptop/Users/me/docs");
        w_date(&mut out, 548_271_600_000);
        w_u64(&mut out, 1); // one failed file
        w_string(&mut out, "docs/locked.bin");
        w_string(&mut out, "permission denied");
        w_bool(&mut out, false); // has_missing_nodes (v8+)
        w_bool(&mut out, true); // is_complete (v9+)
        w_u64(&mut out, 5); // config_plist_xml (v5+)
        out.extend_from_slice(b"<xml>");
        out
    }

    #[test]
    fn test_v9_commit() {
        let commit = Commit::new(Cursor::new(v9_commit())).unwrap();

        assert_eq!(commit.header.version, 9);
        assert_eq!(commit.author, "me@laptop");
        assert_eq!(commit.comment, "scheduled backup");
        assert_eq!(commit.parent_commits.len(), 1);
        assert_eq!(hex::encode(commit.parent_commits[0].sha1), SHA1_B);
        assert!(commit.parent_commits[0].is_encryption_key_stretched);
        assert!(!commit.parent_commits[0].is_compressed);
        assert_eq!(hex::encode(commit.tree_blob_key.sha1), SHA1_A);
        assert!(!commit.tree_blob_key.is_compressed);
        assert_eq!(commit.location, "file://laptop/Users/me/docs");
        assert_eq!(commit.path(), "/Users/me/docs");
        assert_eq!(commit.creation_date.milliseconds_since_epoch, 548_271_600_000);
        assert_eq!(commit.failed_files.len(), 1);
        assert_eq!(commit.failed_files[0].relative_path, "docs/locked.bin");
        assert_eq!(commit.failed_files[0].error_message, "permission denied");
        assert!(!commit.has_missing_nodes);
        assert!(commit.is_complete);
        assert_eq!(commit.config_plist_xml, b"<xml>");
    }

    #[test]
    fn test_v7_commit_reads_merge_ancestor_fields() {
        let mut out = Vec::new();
        out.extend_from_slice(b"CommitV007");
        w_absent(&mut out); // author
        w_absent(&mut out); // comment
        w_u64(&mut out, 0); // no parents
        w_string(&mut out, SHA1_A);
        w_bool(&mut out, false); // tree stretched (v4+); no is_compressed before v8
        w_string(&mut out, "file://laptop/Users/me/docs");
        w_string(&mut out, SHA1_B); // merge_common_ancestor (v < 8)
        w_bool(&mut out, true); // merge ancestor stretched (v4 to v7)
        w_date(&mut out, 0);
        w_u64(&mut out, 0); // no failed files (v3+)
        w_u64(&mut out, 0); // empty config_plist_xml (v5+)

        let commit = Commit::new(Cursor::new(out)).unwrap();
        assert_eq!(commit.merge_common_ancestor_sha1, SHA1_B);
        assert!(commit.is_merge_common_ancestor_encryption_key_stretched);
        assert!(commit.parent_commits.is_empty());
        assert!(!commit.is_complete);
        assert!(commit.config_plist_xml.is_empty());
    }

    #[test]
    fn test_commit_path_without_scheme() {
        let mut commit = Commit::new(Cursor::new(v9_commit())).unwrap();
        commit.location = "/plain/path".to_string();
        assert_eq!(commit.path(), "/plain/path");
    }
}
