//! Block device I/O operations for blockfs

mod blockdev_trait;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

pub use self::blockdev_trait::{BlockDevice, BlockDeviceError, Result, BLOCK_SIZE};

/// A block device backed by a regular host file.
///
/// `open` attaches to an existing file and truncates it so its length is
/// exactly `blocks * BLOCK_SIZE` (spec.md Design Notes resolves the
/// truncate-vs-check ambiguity in favor of truncation). The image is
/// expected to already exist and be zero-filled; creating it is the
/// caller's job (spec.md §1: out of scope).
#[derive(Debug)]
pub struct FileBackedBlockDevice {
    file: File,
    blocks: u64,
    reads: u64,
    writes: u64,
}

impl FileBackedBlockDevice {
    /// Attach to the disk image at `path`, sized for `blocks` blocks.
    ///
    /// Returns `None` on any failure to open read-write or to truncate,
    /// mirroring `disk_open`'s NULL-on-failure contract; nothing is left
    /// allocated in that case.
    pub fn open(path: impl AsRef<Path>, blocks: u64) -> Option<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path).ok()?;
        file.set_len(blocks * BLOCK_SIZE as u64).ok()?;

        Some(Self {
            file,
            blocks,
            reads: 0,
            writes: 0,
        })
    }

    fn sanity_check(&self, block: u64, buf_len: usize) -> Result<()> {
        if block >= self.blocks {
            return Err(BlockDeviceError::InvalidBlockNumber(block));
        }
        if buf_len != BLOCK_SIZE {
            return Err(BlockDeviceError::InvalidBufferSize(buf_len));
        }
        Ok(())
    }

    /// Report cumulative read/write counters to stdout and drop the device.
    ///
    /// Matches the reference `disk_close` output format exactly, since it
    /// is the only externally observable side effect the debug dump does
    /// not already cover (spec.md §4.1, §6).
    pub fn close(self) {
        println!("number of disk reads: {}", self.reads);
        println!("number of disk writes: {}", self.writes);
        // `self.file` drops here, releasing the descriptor.
    }
}

impl BlockDevice for FileBackedBlockDevice {
    fn read_block(&mut self, block: u64, buf: &mut [u8]) -> Result<()> {
        self.sanity_check(block, buf.len())?;

        self.file.seek(SeekFrom::Start(block * BLOCK_SIZE as u64))?;
        self.file.read_exact(buf)?;
        self.reads += 1;
        log::trace!("block device: read block {block}");
        Ok(())
    }

    fn write_block(&mut self, block: u64, buf: &[u8]) -> Result<()> {
        self.sanity_check(block, buf.len())?;

        self.file.seek(SeekFrom::Start(block * BLOCK_SIZE as u64))?;
        self.file.write_all(buf)?;
        self.writes += 1;
        log::trace!("block device: wrote block {block}");
        Ok(())
    }

    fn block_count(&self) -> u64 {
        self.blocks
    }

    fn reads(&self) -> u64 {
        self.reads
    }

    fn writes(&self) -> u64 {
        self.writes
    }
}
