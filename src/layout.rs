//! On-disk layout definitions for blockfs
//!
//! Block 0 is the super-block. Blocks `1..=inode_blocks` are the inode
//! table. Everything after that is the data region, addressed either
//! directly from an inode or indirectly through a single indirect block.

use crate::blockdev::BLOCK_SIZE;
use byteorder::{ByteOrder, LittleEndian};

/// Magic number identifying a formatted image.
pub const MAGIC_NUMBER: u32 = 0xF0F0_3410;

/// Direct block pointers carried in every inode.
pub const POINTERS_PER_INODE: usize = 5;

/// Pointers held by one indirect block (`BLOCK_SIZE / 4`).
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / 4;

/// On-disk size of one inode record: valid, size, 5 direct, indirect.
pub const INODE_SIZE: usize = 4 * (2 + POINTERS_PER_INODE + 1);

/// Inode records packed into one block.
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

/// `ceil(a / b)` for the block-count arithmetic used throughout the layout.
pub const fn div_ceil(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

/// Number of inode-table blocks for a `blocks`-block device.
///
/// `I = ceil(blocks / 10)`; 10% of the device is reserved for the inode
/// table (spec.md §3). Equivalent to the reference's `(blocks + 9) / 10`.
pub const fn inode_blocks_for(blocks: u64) -> u64 {
    div_ceil(blocks, 10)
}

/// The super-block record, exactly as persisted in block 0.
///
/// All fields are little-endian `u32`, written in this order with no
/// padding beyond the trailing zero-fill to [`BLOCK_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub magic_number: u32,
    pub blocks: u32,
    pub inode_blocks: u32,
    pub inodes: u32,
}

impl Superblock {
    /// Build the super-block for a fresh format of a `blocks`-block device.
    pub fn new(blocks: u32) -> Self {
        let inode_blocks = inode_blocks_for(blocks as u64) as u32;
        Self {
            magic_number: MAGIC_NUMBER,
            blocks,
            inode_blocks,
            inodes: inode_blocks * INODES_PER_BLOCK as u32,
        }
    }

    /// Validate the cross-field invariants checked at mount (spec.md §4.2.2).
    pub fn is_valid(&self) -> bool {
        self.magic_number == MAGIC_NUMBER
            && self.inode_blocks as u64 * INODES_PER_BLOCK as u64 == self.inodes as u64
            && self.inode_blocks as u64 == inode_blocks_for(self.blocks as u64)
    }

    /// Encode into a zero-padded [`BLOCK_SIZE`]-byte block.
    pub fn to_block(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        LittleEndian::write_u32(&mut block[0..4], self.magic_number);
        LittleEndian::write_u32(&mut block[4..8], self.blocks);
        LittleEndian::write_u32(&mut block[8..12], self.inode_blocks);
        LittleEndian::write_u32(&mut block[12..16], self.inodes);
        block
    }

    /// Decode from a [`BLOCK_SIZE`]-byte block (e.g. what was read from block 0).
    pub fn from_block(block: &[u8]) -> Self {
        Self {
            magic_number: LittleEndian::read_u32(&block[0..4]),
            blocks: LittleEndian::read_u32(&block[4..8]),
            inode_blocks: LittleEndian::read_u32(&block[8..12]),
            inodes: LittleEndian::read_u32(&block[12..16]),
        }
    }
}

/// An in-memory inode record: `valid`, `size`, direct pointers, indirect pointer.
///
/// A zero direct slot or indirect field means "unallocated" — block 0 is
/// the super-block, so it can never be a legitimate data-block index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inode {
    pub valid: bool,
    pub size: u32,
    pub direct: [u32; POINTERS_PER_INODE],
    pub indirect: u32,
}

impl Inode {
    /// Number of non-zero direct slots, i.e. direct blocks in use.
    pub fn direct_count(&self) -> usize {
        self.direct.iter().take_while(|&&b| b != 0).count()
    }

    /// Encode this inode into its [`INODE_SIZE`]-byte on-disk record.
    pub fn encode(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), INODE_SIZE);
        LittleEndian::write_u32(&mut out[0..4], self.valid as u32);
        LittleEndian::write_u32(&mut out[4..8], self.size);
        for (i, &ptr) in self.direct.iter().enumerate() {
            let off = 8 + i * 4;
            LittleEndian::write_u32(&mut out[off..off + 4], ptr);
        }
        let indirect_off = 8 + POINTERS_PER_INODE * 4;
        LittleEndian::write_u32(&mut out[indirect_off..indirect_off + 4], self.indirect);
    }

    /// Decode an inode from its [`INODE_SIZE`]-byte on-disk record.
    pub fn decode(data: &[u8]) -> Self {
        debug_assert_eq!(data.len(), INODE_SIZE);
        let valid = LittleEndian::read_u32(&data[0..4]) != 0;
        let size = LittleEndian::read_u32(&data[4..8]);
        let mut direct = [0u32; POINTERS_PER_INODE];
        for (i, slot) in direct.iter_mut().enumerate() {
            let off = 8 + i * 4;
            *slot = LittleEndian::read_u32(&data[off..off + 4]);
        }
        let indirect_off = 8 + POINTERS_PER_INODE * 4;
        let indirect = LittleEndian::read_u32(&data[indirect_off..indirect_off + 4]);

        Self {
            valid,
            size,
            direct,
            indirect,
        }
    }
}

/// Read the `u32` pointer at `index` out of a raw indirect data block.
pub fn read_pointer(block: &[u8], index: usize) -> u32 {
    LittleEndian::read_u32(&block[index * 4..index * 4 + 4])
}

/// Write the `u32` pointer at `index` into a raw indirect data block.
pub fn write_pointer(block: &mut [u8], index: usize, value: u32) {
    LittleEndian::write_u32(&mut block[index * 4..index * 4 + 4], value);
}
