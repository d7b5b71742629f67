//! Virtual filesystem provider.
//!
//! - [`FileSystemProvider`]: the host-facing contract
//! - [`StorageFs`]: implementation over blob containers and file shares

mod storage_fs;
mod traits;

pub use storage_fs::{StorageFs, StorageFsBuilder};
pub use traits::{
    DeleteOptions, DirEntry, FileStat, FileSystemProvider, FileType, RenameOptions, WatchOptions,
    WriteOptions,
};
