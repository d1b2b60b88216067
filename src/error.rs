//! Crate-wide error types for blockfs

use thiserror::Error;

pub use crate::blockdev::BlockDeviceError;

/// Errors surfaced by [`crate::FileSystem`] operations.
///
/// The public API (`format`, `mount`, `create`, `remove`, `stat`, `read`,
/// `write`) still returns the primitive return codes spec.md prescribes
/// (`bool`, `i64`); `FsError` exists for callers who want to compose
/// filesystem operations with `?` instead (spec.md §7: "propagation
/// policy... through return codes of §4 without exception mechanisms" —
/// this type is additive, not a replacement for that contract).
#[derive(Error, Debug)]
pub enum FsError {
    #[error("block device error: {0}")]
    BlockDevice(#[from] BlockDeviceError),
    #[error("not formatted: invalid or inconsistent superblock")]
    NotFormatted,
    #[error("file system is already mounted")]
    AlreadyMounted,
    #[error("file system is not mounted")]
    NotMounted,
    #[error("inode {0} is out of range or not valid")]
    InvalidInode(u64),
    #[error("no free blocks available")]
    NoSpace,
}

/// Result type for [`FsError`]-returning operations.
pub type Result<T> = std::result::Result<T, FsError>;
