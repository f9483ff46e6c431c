//! arqrecover reads Arq-format content-addressed, encrypted backup
//! repositories and restores files from them. It is strictly read-side:
//! given a password and access to the object store holding the repository, it
//! enumerates backup sets, lists directory contents at a point in time, and
//! reconstructs files or whole directory trees on the local filesystem.
//!
//! The storage backends (S3, Google Cloud Storage, SFTP) sit behind the
//! [`connection::Remote`] trait; a local-directory backend ships in-tree for
//! mounted or synced repositories.
pub mod backup_set;
pub mod blob;
pub mod bucket;
pub mod compression;
pub mod computer;
pub mod connection;
pub mod date;
pub mod error;
pub mod header;
pub mod object_encryption;
pub mod packset;
pub mod repo;
pub mod tree;
pub mod type_utils;
