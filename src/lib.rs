//! blockfs - a small UNIX-style block-addressed file system
//!
//! This crate implements a file system that persists to a fixed-size
//! "disk image": a regular host file treated as an array of equal-sized
//! blocks. It provides formatting, mounting/unmounting, inode
//! create/remove, size queries, and byte-granular read/write at a
//! caller-supplied offset. There are no directories, no permissions, no
//! timestamps, and no concurrent mutators — inode numbers are the only
//! file identifiers, and the namespace is flat.
//!
//! Two components compose bottom-up: a [`blockdev`] that emulates a
//! block-granular device over a host file, and an [`fs::FileSystem`] that
//! owns the on-disk layout, the inode table, and a free-block bitmap
//! rebuilt on every mount.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rust_2018_idioms)]

pub mod block_bitmap;
pub mod blockdev;
pub mod error;
pub mod fs;
pub mod layout;

pub use blockdev::{BlockDevice, BlockDeviceError, FileBackedBlockDevice, BLOCK_SIZE};
pub use error::{FsError, Result};
pub use fs::FileSystem;
pub use layout::{
    Inode, Superblock, INODES_PER_BLOCK, INODE_SIZE, MAGIC_NUMBER, POINTERS_PER_BLOCK,
    POINTERS_PER_INODE,
};

/// Common imports for crates building on top of blockfs.
pub mod prelude {
    pub use crate::block_bitmap::FreeBlockBitmap;
    pub use crate::blockdev::{BlockDevice, BlockDeviceError, FileBackedBlockDevice, BLOCK_SIZE};
    pub use crate::error::{FsError, Result};
    pub use crate::fs::FileSystem;
}
