//! Object-store access and the local fetch cache.
//!
//! A [`Remote`] can enumerate keys under a prefix and stream one key's bytes;
//! S3, Google Cloud Storage and SFTP are integration points behind this
//! trait. [`LocalRemote`] reads a repository from a local directory (mounted
//! or synced) and is what the test suite runs against.
//!
//! [`Connection`] layers the cache on top: every fetched key lands at
//! `cache_directory/<key>`, mirroring the remote layout verbatim, and
//! subsequent reads are served from disk. The cache is purely opportunistic;
//! nothing bounds its size and its contents may be deleted externally at any
//! time. Concurrent fetches of the same key are not serialized: all content
//! is content-addressed and immutable, so the last writer wins.
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// How to enumerate keys under a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// One entry per "common prefix" at the next `/` boundary.
    Folders,
    /// One entry per object under the prefix, recursively.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub path: String,
}

pub trait Remote: Send + Sync {
    fn list(&self, prefix: &str, mode: ListMode) -> Result<Vec<RemoteObject>>;
    fn fetch(&self, key: &str, sink: &mut dyn Write) -> Result<()>;
}

pub struct Connection {
    remote: Box<dyn Remote>,
    cache_directory: PathBuf,
}

impl Connection {
    pub fn new(remote: Box<dyn Remote>, cache_directory: PathBuf) -> Connection {
        Connection {
            remote,
            cache_directory,
        }
    }

    pub fn cache_directory(&self) -> &Path {
        &self.cache_directory
    }

    pub fn list_as_folders(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        self.remote.list(prefix, ListMode::Folders)
    }

    pub fn list_as_all(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        self.remote.list(prefix, ListMode::All)
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_directory.join(key)
    }

    /// Serves `key` from the cache when a non-empty copy exists, fetching it
    /// otherwise. Zero-length files count as "not cached" so truncated
    /// downloads heal on the next call.
    pub fn cached_get(&self, key: &str) -> Result<PathBuf> {
        let path = self.cache_path(key);
        if let Ok(metadata) = fs::metadata(&path) {
            if metadata.is_file() && metadata.len() > 0 {
                return Ok(path);
            }
        }
        self.get(key)
    }

    /// Unconditionally downloads `key` into the cache. A failed download
    /// leaves no partial file behind.
    pub fn get(&self, key: &str) -> Result<PathBuf> {
        let path = self.cache_path(key);
        if let Some(parent) = path.parent() {
            create_cache_dirs(parent)?;
        }

        debug!("fetching {}", key);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        let outcome = self
            .remote
            .fetch(key, &mut writer)
            .and_then(|()| writer.flush().map_err(Error::from));
        if let Err(err) = outcome {
            drop(writer);
            let _ = fs::remove_file(&path);
            return Err(err);
        }
        Ok(path)
    }
}

#[cfg(unix)]
fn create_cache_dirs(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o777)
        .create(path)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_cache_dirs(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// A repository rooted in a local directory. Keys map to paths below the
/// root; listing enumerates directory entries in sorted order.
pub struct LocalRemote {
    root: PathBuf,
}

impl LocalRemote {
    pub fn new(root: PathBuf) -> LocalRemote {
        LocalRemote { root }
    }

    fn join_key(prefix: &str, name: &str) -> String {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix.trim_end_matches('/'), name)
        }
    }

    fn collect_all(&self, directory: &Path, key_prefix: &str, out: &mut Vec<RemoteObject>) -> Result<()> {
        let mut entries: Vec<_> = fs::read_dir(directory)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .collect();
        entries.sort();
        for path in entries {
            let name = match path.file_name().and_then(|name| name.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let key = Self::join_key(key_prefix, &name);
            if path.is_dir() {
                self.collect_all(&path, &key, out)?;
            } else {
                out.push(RemoteObject { path: key });
            }
        }
        Ok(())
    }
}

impl Remote for LocalRemote {
    fn list(&self, prefix: &str, mode: ListMode) -> Result<Vec<RemoteObject>> {
        let directory = self.root.join(prefix.trim_end_matches('/'));
        if !directory.is_dir() {
            return Ok(Vec::new());
        }

        match mode {
            ListMode::Folders => {
                let mut entries: Vec<_> = fs::read_dir(&directory)?
                    .collect::<std::io::Result<Vec<_>>>()?
                    .into_iter()
                    .map(|entry| entry.path())
                    .collect();
                entries.sort();
                let mut objects = Vec::new();
                for path in entries {
                    if !path.is_dir() {
                        continue;
                    }
                    if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                        objects.push(RemoteObject {
                            path: Self::join_key(prefix.trim_end_matches('/'), name),
                        });
                    }
                }
                Ok(objects)
            }
            ListMode::All => {
                let mut objects = Vec::new();
                self.collect_all(&directory, prefix.trim_end_matches('/'), &mut objects)?;
                Ok(objects)
            }
        }
    }

    fn fetch(&self, key: &str, sink: &mut dyn Write) -> Result<()> {
        let path = self.root.join(key);
        let mut file =
            File::open(&path).map_err(|err| Error::Remote(format!("{}: {}", key, err)))?;
        std::io::copy(&mut file, sink)
            .map_err(|err| Error::Remote(format!("{}: {}", key, err)))?;
        Ok(())
    }
}
