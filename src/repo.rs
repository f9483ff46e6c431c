//! The repository facade: resolve a path inside a bucket's latest backup,
//! list directory contents, and restore files or whole trees to the local
//! filesystem.
//!
//! Commits and trees are looked up through the bucket's tree-packset. File
//! data is looked up through the blob-packset first and falls back to the
//! loose object at `<backup_set_uuid>/objects/<hex-sha1>`; tree and commit
//! blobs have no loose fallback.
use std::fs::{self, File};
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::Path;

use tracing::warn;

use crate::backup_set::BackupSet;
use crate::blob::BlobKey;
use crate::bucket::Bucket;
use crate::compression::gunzip_or_passthrough;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::packset::{PackSet, PackSetKind};
use crate::tree::{Commit, Node, Tree};

/// The result of a path lookup: the deepest tree reached and, unless the
/// target was the commit root itself, the node it names. For a directory the
/// tree is the directory's own tree; for a file it is the parent's.
pub struct Located {
    pub tree: Tree,
    pub node: Option<Node>,
}

/// One row of a directory listing.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub is_tree: bool,
    pub mode: i32,
    pub size: u64,
    pub mtime_sec: i64,
}

impl DirEntry {
    fn from_node(node: &Node) -> DirEntry {
        DirEntry {
            name: node.name.clone(),
            is_tree: node.is_tree,
            mode: node.mode,
            size: node.uncompressed_data_size,
            mtime_sec: node.mtime_sec,
        }
    }
}

pub struct Repository<'a> {
    connection: &'a Connection,
    backup_set: &'a BackupSet,
    head_sha1: [u8; 20],
    trees: PackSet<'a>,
    blobs: PackSet<'a>,
}

impl<'a> Repository<'a> {
    /// Opens the bucket's latest backup. Pack indexes should have been
    /// warmed (`BackupSet::warm_indexes`) before lookups are made.
    pub fn open(
        connection: &'a Connection,
        backup_set: &'a BackupSet,
        bucket: &'a Bucket,
    ) -> Result<Repository<'a>> {
        let head_sha1 = bucket
            .head_sha1
            .ok_or_else(|| Error::BlobNotFound(format!("bucket {} has no backups", bucket.uuid)))?;
        Ok(Repository {
            connection,
            backup_set,
            head_sha1,
            trees: PackSet::new(
                connection,
                &backup_set.blob_cipher,
                &backup_set.uuid,
                &bucket.uuid,
                PackSetKind::Trees,
            ),
            blobs: PackSet::new(
                connection,
                &backup_set.blob_cipher,
                &backup_set.uuid,
                &bucket.uuid,
                PackSetKind::Blobs,
            ),
        })
    }

    pub fn head_commit(&self) -> Result<Commit> {
        let bytes = self.tree_object(&self.head_sha1)?;
        Commit::new(Cursor::new(bytes))
    }

    fn tree_object(&self, sha1: &[u8; 20]) -> Result<Vec<u8>> {
        self.trees
            .lookup(sha1)?
            .ok_or_else(|| Error::BlobNotFound(hex::encode(sha1)))
    }

    fn load_tree(&self, sha1: &[u8; 20]) -> Result<Tree> {
        Tree::new(&self.tree_object(sha1)?)
    }

    /// Resolves `target_path` against the latest commit by walking the chain
    /// of hash-linked trees one path component at a time.
    pub fn find_node(&self, target_path: &str) -> Result<Located> {
        let commit = self.head_commit()?;
        let root = clean_path(commit.path());
        let target = clean_path(target_path);
        if !target.starts_with(&root) {
            return Err(Error::PathOutsideCommit { target, root });
        }

        let mut current_hash = commit.tree_blob_key.sha1;
        let mut current_path = root;
        let mut current_node: Option<Node> = None;
        loop {
            let tree = self.load_tree(&current_hash)?;
            let next = match next_component(&target, &current_path) {
                Some(name) => name.to_string(),
                None => return Ok(Located {
                    tree,
                    node: current_node,
                }),
            };

            let node = tree
                .node(&next)
                .cloned()
                .ok_or_else(|| Error::PathNotFound(target.clone()))?;
            current_path = join_backup_path(&current_path, &next);
            if node.is_tree {
                let key = node
                    .data_blob_keys
                    .first()
                    .ok_or_else(|| Error::PathNotFound(target.clone()))?;
                current_hash = key.sha1;
                current_node = Some(node);
            } else {
                // A file ends the walk; leftover components cannot resolve.
                if next_component(&target, &current_path).is_some() {
                    return Err(Error::PathNotFound(target));
                }
                return Ok(Located {
                    tree,
                    node: Some(node),
                });
            }
        }
    }

    /// Lists the children of a directory, or the single entry of a file.
    pub fn list_directory(&self, target_path: &str) -> Result<Vec<DirEntry>> {
        let located = self.find_node(target_path)?;
        Ok(match located.node {
            Some(ref node) if !node.is_tree => vec![DirEntry::from_node(node)],
            _ => located.tree.nodes.iter().map(DirEntry::from_node).collect(),
        })
    }

    /// Restores the file or directory tree at `source_path` under
    /// `destination`. Failing children of a tree are logged and skipped so a
    /// restore recovers as much as possible.
    pub fn restore(&self, source_path: &str, destination: &Path) -> Result<()> {
        let located = self.find_node(source_path)?;
        match located.node {
            Some(ref node) if !node.is_tree => self.download_node(node, destination),
            _ => self.download_tree(&located.tree, &clean_path(source_path), destination),
        }
    }

    fn download_tree(&self, tree: &Tree, source_path: &str, destination: &Path) -> Result<()> {
        create_directory(destination, tree.mode)?;
        for node in &tree.nodes {
            let child_source = join_backup_path(source_path, &node.name);
            let child_destination = destination.join(&node.name);
            let outcome = self
                .find_node(&child_source)
                .and_then(|located| match located.node {
                    Some(ref child) if !child.is_tree => {
                        self.download_node(child, &child_destination)
                    }
                    _ => self.download_tree(&located.tree, &child_source, &child_destination),
                });
            if let Err(err) = outcome {
                warn!("skipping {}: {}", child_source, err);
            }
        }
        Ok(())
    }

    fn download_node(&self, node: &Node, destination: &Path) -> Result<()> {
        let file = File::create(destination)?;
        file.set_len(node.uncompressed_data_size)?;
        let mut writer = BufWriter::new(file);
        let mut reader = MultiBlobReader::new(self, &node.data_blob_keys);
        io::copy(&mut reader, &mut writer)?;
        writer.flush()?;

        #[cfg(unix)]
        if node.mode != 0 {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(
                destination,
                fs::Permissions::from_mode((node.mode as u32) & 0o7777),
            )?;
        }
        Ok(())
    }

    /// The cleartext of one data blob: blob-packset first, then the loose
    /// object fallback.
    fn blob_cleartext(&self, key: &BlobKey) -> Result<Vec<u8>> {
        if let Some(bytes) = self.blobs.lookup(&key.sha1)? {
            return Ok(bytes);
        }
        self.loose_object(&key.sha1)
    }

    fn loose_object(&self, sha1: &[u8; 20]) -> Result<Vec<u8>> {
        let hex_sha1 = hex::encode(sha1);
        let key = format!("{}/objects/{}", self.backup_set.uuid, hex_sha1);
        let path = match self.connection.cached_get(&key) {
            Ok(path) => path,
            Err(Error::Remote(err)) => {
                return Err(Error::BlobNotFound(format!("{} ({})", hex_sha1, err)))
            }
            Err(err) => return Err(err),
        };
        let encrypted = fs::read(path)?;
        let cleartext = self.backup_set.blob_cipher.decrypt(&encrypted)?;
        Ok(gunzip_or_passthrough(cleartext))
    }
}

/// Streams the cleartexts of a node's data blob keys back to back, in key
/// order, loading each blob lazily as the previous one drains.
pub struct MultiBlobReader<'a, 'k> {
    repository: &'a Repository<'a>,
    keys: std::slice::Iter<'k, BlobKey>,
    current: Cursor<Vec<u8>>,
}

impl<'a, 'k> MultiBlobReader<'a, 'k> {
    pub fn new(repository: &'a Repository<'a>, keys: &'k [BlobKey]) -> MultiBlobReader<'a, 'k> {
        MultiBlobReader {
            repository,
            keys: keys.iter(),
            current: Cursor::new(Vec::new()),
        }
    }
}

impl Read for MultiBlobReader<'_, '_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.current.read(buf)?;
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }
            match self.keys.next() {
                Some(key) => {
                    let bytes = self
                        .repository
                        .blob_cleartext(key)
                        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
                    self.current = Cursor::new(bytes);
                }
                None => return Ok(0),
            }
        }
    }
}

fn create_directory(destination: &Path, mode: i32) -> Result<()> {
    fs::create_dir_all(destination)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // Stored modes of zero show up in old backups; fall back to 0775.
        let mode = if mode == 0 {
            0o775
        } else {
            (mode as u32) & 0o7777
        };
        fs::set_permissions(destination, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}

/// Drops empty and `.` components: `/a/./b` becomes `/a/b`.
fn clean_path(path: &str) -> String {
    let mut cleaned = String::new();
    for component in path.split('/') {
        if component.is_empty() || component == "." {
            continue;
        }
        cleaned.push('/');
        cleaned.push_str(component);
    }
    if cleaned.is_empty() {
        "/".to_string()
    } else {
        cleaned
    }
}

fn join_backup_path(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// The first component of `target` past `current`, or `None` when the walk
/// has consumed the whole path.
fn next_component<'t>(target: &'t str, current: &str) -> Option<&'t str> {
    let rest = target.strip_prefix(current)?;
    rest.split('/').find(|component| !component.is_empty())
}
