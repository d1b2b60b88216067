//! Block device trait definitions for blockfs

use std::io;
use thiserror::Error;

/// Block size in bytes (4KB)
pub const BLOCK_SIZE: usize = 4096;

/// Error type for block device operations
#[derive(Error, Debug)]
pub enum BlockDeviceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid block number: {0}")]
    InvalidBlockNumber(u64),
    #[error("invalid buffer size: {0} (expected {BLOCK_SIZE})")]
    InvalidBufferSize(usize),
    #[error("device is not open")]
    DeviceNotOpen,
}

/// Result type for block device operations
pub type Result<T> = std::result::Result<T, BlockDeviceError>;

/// Trait for block-granular device I/O.
///
/// All operations above this layer deal in whole [`BLOCK_SIZE`]-byte blocks.
/// Implementors MUST treat a short host read/write as an error rather than
/// silently returning a partial transfer (spec: "exactly BLOCK_SIZE or
/// DISK_FAILURE").
pub trait BlockDevice {
    /// Read exactly one block into `buf` (`buf.len() == BLOCK_SIZE`).
    fn read_block(&mut self, block: u64, buf: &mut [u8]) -> Result<()>;

    /// Write exactly one block from `buf` (`buf.len() == BLOCK_SIZE`).
    fn write_block(&mut self, block: u64, buf: &[u8]) -> Result<()>;

    /// Total number of blocks addressable on this device.
    fn block_count(&self) -> u64;

    /// Cumulative number of successful reads since open.
    fn reads(&self) -> u64;

    /// Cumulative number of successful writes since open.
    fn writes(&self) -> u64;
}
