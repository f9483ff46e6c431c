use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use arqrecover::backup_set::BackupSet;
use arqrecover::bucket::Bucket;
use arqrecover::connection::{Connection, LocalRemote};
use arqrecover::packset::PackSetKind;
use arqrecover::repo::Repository;

const PASSWORD_VARIABLE: &str = "ARQ_ENCRYPTION_PASSWORD";

#[derive(Debug, Parser)]
#[command(name = "arqrecover", version, about = "Restore folders and files from Arq backups")]
struct Cli {
    /// Storage backend holding the backup repository. The S3, Google Cloud
    /// Storage and SFTP clients plug in behind the Remote trait; the built-in
    /// backend reads a locally mounted or synced repository.
    #[arg(long, value_enum, default_value_t = BackupType::Local)]
    backup_type: BackupType,

    /// Root directory of the repository (for --backup-type local).
    #[arg(long)]
    local_path: Option<PathBuf>,

    /// Where to cache repository files for browsing.
    #[arg(long)]
    cache_directory: Option<PathBuf>,

    /// Delete the cache directory before starting. Useful when errors look
    /// like truncated downloads.
    #[arg(long)]
    delete_cache_directory: bool,

    /// Enable verbose logging.
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackupType {
    Local,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List backup sets in this repository.
    ListBackupSets,
    /// List contents of a directory in a backup.
    ListDirectoryContents {
        /// UUID of the backup set; use list-backup-sets to find it.
        #[arg(long)]
        backup_set_uuid: String,
        /// UUID of the backed-up folder; use list-backup-sets to find it.
        #[arg(long)]
        folder_uuid: String,
        /// Path of a directory or file in the backup.
        #[arg(long)]
        path: String,
    },
    /// Restore a file or directory from a backup.
    Recover {
        #[arg(long)]
        backup_set_uuid: String,
        #[arg(long)]
        folder_uuid: String,
        /// Path of the file or directory in the backup.
        #[arg(long)]
        source_path: String,
        /// Where to write the restored data; must not exist yet.
        #[arg(long)]
        destination_path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let connection = connect(&cli)?;
    let password = env::var(PASSWORD_VARIABLE)
        .with_context(|| format!("{} is not set", PASSWORD_VARIABLE))?;
    let password = password.as_bytes();

    match cli.command {
        Command::ListBackupSets => list_backup_sets(&connection, password),
        Command::ListDirectoryContents {
            backup_set_uuid,
            folder_uuid,
            path,
        } => list_directory_contents(&connection, password, &backup_set_uuid, &folder_uuid, &path),
        Command::Recover {
            backup_set_uuid,
            folder_uuid,
            source_path,
            destination_path,
        } => recover(
            &connection,
            password,
            &backup_set_uuid,
            &folder_uuid,
            &source_path,
            &destination_path,
        ),
    }
}

fn connect(cli: &Cli) -> anyhow::Result<Connection> {
    let cache_directory = match &cli.cache_directory {
        Some(directory) => directory.clone(),
        None => default_cache_directory(),
    };
    if cli.delete_cache_directory && cache_directory.exists() {
        std::fs::remove_dir_all(&cache_directory)
            .with_context(|| format!("deleting {}", cache_directory.display()))?;
    }
    match cli.backup_type {
        BackupType::Local => {
            let root = cli
                .local_path
                .clone()
                .context("--local-path is required for --backup-type local")?;
            Ok(Connection::new(
                Box::new(LocalRemote::new(root)),
                cache_directory,
            ))
        }
    }
}

fn default_cache_directory() -> PathBuf {
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".arqrecover_cache"),
        None => PathBuf::from(".arqrecover_cache"),
    }
}

fn list_backup_sets(connection: &Connection, password: &[u8]) -> anyhow::Result<()> {
    for backup_set in BackupSet::discover(connection, password)? {
        println!("BackupSet");
        println!("    UUID {}", backup_set.uuid);
        println!("    ComputerName {}", backup_set.computer_info.computer_name);
        println!("    UserName {}", backup_set.computer_info.user_name);
        println!("    Folders");
        for bucket in &backup_set.buckets {
            println!("        LocalPath {}", bucket.local_path);
            println!("        UUID {}", bucket.uuid);
        }
    }
    Ok(())
}

fn open_bucket<'a>(
    backup_sets: &'a [BackupSet],
    backup_set_uuid: &str,
    folder_uuid: &str,
) -> anyhow::Result<(&'a BackupSet, &'a Bucket)> {
    let backup_set = backup_sets
        .iter()
        .find(|set| set.uuid == backup_set_uuid)
        .with_context(|| format!("no backup set with UUID {}", backup_set_uuid))?;
    let bucket = backup_set
        .bucket(folder_uuid)
        .with_context(|| format!("no folder with UUID {}", folder_uuid))?;
    Ok((backup_set, bucket))
}

fn list_directory_contents(
    connection: &Connection,
    password: &[u8],
    backup_set_uuid: &str,
    folder_uuid: &str,
    path: &str,
) -> anyhow::Result<()> {
    let backup_sets = BackupSet::discover(connection, password)?;
    let (backup_set, bucket) = open_bucket(&backup_sets, backup_set_uuid, folder_uuid)?;
    backup_set.warm_indexes(connection, bucket, &[PackSetKind::Trees])?;

    let repository = Repository::open(connection, backup_set, bucket)?;
    println!("{:<11} {:>12} {:<20} {}", "MODE", "SIZE", "MODIFIED", "NAME");
    for entry in repository.list_directory(path)? {
        let kind = if entry.is_tree { 'd' } else { '-' };
        let modified = DateTime::<Utc>::from_timestamp(entry.mtime_sec, 0)
            .map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}{:<10o} {:>12} {:<20} {}",
            kind,
            entry.mode & 0o7777,
            entry.size,
            modified,
            entry.name
        );
    }
    Ok(())
}

fn recover(
    connection: &Connection,
    password: &[u8],
    backup_set_uuid: &str,
    folder_uuid: &str,
    source_path: &str,
    destination_path: &std::path::Path,
) -> anyhow::Result<()> {
    if destination_path.exists() {
        bail!(
            "destination {} already exists; refusing to overwrite",
            destination_path.display()
        );
    }

    let backup_sets = BackupSet::discover(connection, password)?;
    let (backup_set, bucket) = open_bucket(&backup_sets, backup_set_uuid, folder_uuid)?;
    backup_set.warm_indexes(
        connection,
        bucket,
        &[PackSetKind::Trees, PackSetKind::Blobs],
    )?;

    let repository = Repository::open(connection, backup_set, bucket)?;
    repository.restore(source_path, destination_path)?;
    println!(
        "restored {} to {}",
        source_path,
        destination_path.display()
    );
    Ok(())
}
