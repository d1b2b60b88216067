//! The blockfs file system: format, mount, and the inode read/write path.

use crate::block_bitmap::FreeBlockBitmap;
use crate::blockdev::{BlockDevice, BLOCK_SIZE};
use crate::layout::{
    self, div_ceil, Inode, Superblock, INODES_PER_BLOCK, INODE_SIZE, POINTERS_PER_BLOCK,
    POINTERS_PER_INODE,
};
use std::io::Write;

/// A mounted, block-addressed file system over a [`BlockDevice`].
///
/// Owns the device for the duration of the mount, a cached copy of the
/// super-block, and the free-block bitmap rebuilt at mount time. There is
/// no concurrency support: callers must serialize access (spec.md §5).
pub struct FileSystem<D: BlockDevice> {
    device: D,
    super_block: Superblock,
    free_blocks: FreeBlockBitmap,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Format `device` with a fresh super-block and a zeroed inode table.
    ///
    /// Consumes `device` rather than mounting it: spec.md draws `format`
    /// and `mount` as two disjoint operations on an unmounted device, so a
    /// caller formats, drops the handle (or keeps it to pass into
    /// [`FileSystem::mount`] next), rather than formatting through a live
    /// mount.
    pub fn format(device: &mut D) -> bool {
        let blocks = device.block_count();
        let super_block = Superblock::new(blocks as u32);

        let zero_block = [0u8; BLOCK_SIZE];
        for block in 1..=super_block.inode_blocks as u64 {
            if device.write_block(block, &zero_block).is_err() {
                return false;
            }
        }

        if device.write_block(0, &super_block.to_block()).is_err() {
            return false;
        }

        log::info!(
            "formatted {blocks} blocks, {} inode blocks, {} inodes",
            super_block.inode_blocks,
            super_block.inodes
        );
        true
    }

    /// Mount `device`: load and validate the super-block, then rebuild the
    /// free-block bitmap by scanning every valid inode (spec.md §4.2.2, §4.2.6).
    pub fn mount(mut device: D) -> Option<Self> {
        let mut block = [0u8; BLOCK_SIZE];
        if device.read_block(0, &mut block).is_err() {
            return None;
        }

        let super_block = Superblock::from_block(&block);
        if !super_block.is_valid() {
            log::warn!("mount failed: invalid or inconsistent superblock");
            return None;
        }

        let mut free_blocks =
            FreeBlockBitmap::new(super_block.blocks as u64, super_block.inode_blocks as u64);

        for inode_number in 0..super_block.inodes as u64 {
            let Some(inode) = Self::load_inode_raw(&mut device, &super_block, inode_number)
            else {
                log::error!("mount failed: could not read inode {inode_number}");
                return None;
            };
            if !inode.valid {
                continue;
            }
            for &direct in inode.direct.iter().take_while(|&&b| b != 0) {
                free_blocks.mark_in_use(direct as u64);
            }
            if inode.indirect != 0 {
                free_blocks.mark_in_use(inode.indirect as u64);
                let mut indirect_block = [0u8; BLOCK_SIZE];
                if device
                    .read_block(inode.indirect as u64, &mut indirect_block)
                    .is_err()
                {
                    log::error!("mount failed: could not read indirect block {}", inode.indirect);
                    return None;
                }
                for i in 0..POINTERS_PER_BLOCK {
                    let pointer = layout::read_pointer(&indirect_block, i);
                    if pointer == 0 {
                        break;
                    }
                    free_blocks.mark_in_use(pointer as u64);
                }
            }
        }

        Some(Self {
            device,
            super_block,
            free_blocks,
        })
    }

    /// Detach the device, dropping the in-memory bitmap. The device itself
    /// is returned to the caller, who owns its lifetime (spec.md §4.2.3).
    pub fn unmount(self) -> D {
        self.device
    }

    /// Total blocks on the mounted device.
    pub fn blocks(&self) -> u32 {
        self.super_block.blocks
    }

    /// Number of inode-table blocks.
    pub fn inode_blocks(&self) -> u32 {
        self.super_block.inode_blocks
    }

    /// Total inode slots (`inode_blocks * INODES_PER_BLOCK`).
    pub fn inode_count(&self) -> u32 {
        self.super_block.inodes
    }

    fn inode_block_number(inode_number: u64) -> u64 {
        1 + inode_number / INODES_PER_BLOCK as u64
    }

    fn load_inode_raw(device: &mut D, super_block: &Superblock, inode_number: u64) -> Option<Inode> {
        if inode_number >= super_block.inodes as u64 {
            return None;
        }
        let block_number = Self::inode_block_number(inode_number);
        let mut block = [0u8; BLOCK_SIZE];
        device.read_block(block_number, &mut block).ok()?;

        let offset = (inode_number as usize % INODES_PER_BLOCK) * INODE_SIZE;
        Some(Inode::decode(&block[offset..offset + INODE_SIZE]))
    }

    fn load_inode(&mut self, inode_number: u64) -> Option<Inode> {
        Self::load_inode_raw(&mut self.device, &self.super_block, inode_number)
    }

    fn save_inode(&mut self, inode_number: u64, inode: &Inode) -> bool {
        if inode_number >= self.super_block.inodes as u64 {
            return false;
        }
        let block_number = Self::inode_block_number(inode_number);
        let mut block = [0u8; BLOCK_SIZE];
        if self.device.read_block(block_number, &mut block).is_err() {
            return false;
        }

        let offset = (inode_number as usize % INODES_PER_BLOCK) * INODE_SIZE;
        inode.encode(&mut block[offset..offset + INODE_SIZE]);

        self.device.write_block(block_number, &block).is_ok()
    }

    /// Reserve the first free inode slot, scanning the inode table in
    /// order (spec.md §4.2.4). Returns the absolute inode number, or `-1`
    /// if the table is full.
    pub fn create(&mut self) -> i64 {
        for inode_number in 0..self.super_block.inodes as u64 {
            match self.load_inode(inode_number) {
                Some(inode) if !inode.valid => {
                    let fresh = Inode {
                        valid: true,
                        ..Inode::default()
                    };
                    if !self.save_inode(inode_number, &fresh) {
                        log::error!("create: failed to write inode {inode_number}");
                        return -1;
                    }
                    log::debug!("created inode {inode_number}");
                    return inode_number as i64;
                }
                Some(_) => continue,
                None => return -1,
            }
        }
        -1
    }

    /// Release every block held by inode `n` and clear its record
    /// (spec.md §4.2.5).
    pub fn remove(&mut self, n: u64) -> bool {
        let Some(inode) = self.load_inode(n) else {
            return false;
        };
        if !inode.valid {
            return false;
        }

        for &direct in inode.direct.iter().take_while(|&&b| b != 0) {
            self.free_blocks.release(direct as u64);
        }

        if inode.indirect != 0 {
            let mut indirect_block = [0u8; BLOCK_SIZE];
            if self
                .device
                .read_block(inode.indirect as u64, &mut indirect_block)
                .is_err()
            {
                return false;
            }
            for i in 0..POINTERS_PER_BLOCK {
                let pointer = layout::read_pointer(&indirect_block, i);
                if pointer == 0 {
                    break;
                }
                self.free_blocks.release(pointer as u64);
            }
            self.free_blocks.release(inode.indirect as u64);
        }

        self.save_inode(n, &Inode::default())
    }

    /// Size in bytes of inode `n`, or `-1` if it is out of range or not valid
    /// (spec.md §4.2.9).
    pub fn stat(&mut self, n: u64) -> i64 {
        match self.load_inode(n) {
            Some(inode) if inode.valid => inode.size as i64,
            _ => -1,
        }
    }

    /// Read up to `length` bytes from inode `n` starting at `offset` into
    /// `data` (`data.len() >= length`). Returns the number of bytes read,
    /// or `-1` on failure (spec.md §4.2.10).
    pub fn read(&mut self, n: u64, data: &mut [u8], length: usize, offset: usize) -> i64 {
        let Some(inode) = self.load_inode(n) else {
            return -1;
        };
        if !inode.valid {
            return -1;
        }

        if offset >= inode.size as usize {
            return 0;
        }
        let length = length.min(inode.size as usize - offset);
        if length == 0 {
            return 0;
        }

        let mut bytes_read = 0usize;
        let mut block_index = offset / BLOCK_SIZE;
        let mut block_offset = offset % BLOCK_SIZE;
        let mut block = [0u8; BLOCK_SIZE];

        while bytes_read < length
            && block_index < POINTERS_PER_INODE
            && inode.direct[block_index] != 0
        {
            if self
                .device
                .read_block(inode.direct[block_index] as u64, &mut block)
                .is_err()
            {
                return -1;
            }
            let chunk = (BLOCK_SIZE - block_offset).min(length - bytes_read);
            data[bytes_read..bytes_read + chunk]
                .copy_from_slice(&block[block_offset..block_offset + chunk]);
            bytes_read += chunk;
            block_index += 1;
            block_offset = 0;
        }

        if bytes_read < length && inode.indirect != 0 {
            let mut indirect_block = [0u8; BLOCK_SIZE];
            if self
                .device
                .read_block(inode.indirect as u64, &mut indirect_block)
                .is_err()
            {
                return -1;
            }

            let mut pointer_index = block_index.saturating_sub(POINTERS_PER_INODE);
            while bytes_read < length && pointer_index < POINTERS_PER_BLOCK {
                let pointer = layout::read_pointer(&indirect_block, pointer_index);
                if pointer == 0 {
                    break;
                }
                if self.device.read_block(pointer as u64, &mut block).is_err() {
                    return -1;
                }
                let chunk = (BLOCK_SIZE - block_offset).min(length - bytes_read);
                data[bytes_read..bytes_read + chunk]
                    .copy_from_slice(&block[block_offset..block_offset + chunk]);
                bytes_read += chunk;
                pointer_index += 1;
                block_offset = 0;
            }
        }

        // Invariant §3 guarantees pointer-count tracks size; a short read
        // here would mean the invariant was violated elsewhere.
        debug_assert_eq!(bytes_read, length);
        bytes_read as i64
    }

    /// Write `length` bytes from `data` into inode `n` at `offset`,
    /// extending and allocating blocks as needed. Returns the number of
    /// bytes actually persisted, which is less than `length` only when
    /// the device ran out of free blocks mid-extension (spec.md §4.2.11).
    pub fn write(&mut self, n: u64, data: &[u8], length: usize, offset: usize) -> i64 {
        let Some(mut inode) = self.load_inode(n) else {
            return -1;
        };
        if !inode.valid {
            return -1;
        }

        self.extend(&mut inode, offset + length);

        let mut bytes_written = 0usize;
        let mut block_index = offset / BLOCK_SIZE;
        let mut block_offset = offset % BLOCK_SIZE;
        let mut block = [0u8; BLOCK_SIZE];

        while bytes_written < length
            && block_index < POINTERS_PER_INODE
            && inode.direct[block_index] != 0
        {
            let block_number = inode.direct[block_index] as u64;
            if self.device.read_block(block_number, &mut block).is_err() {
                return -1;
            }
            let chunk = (BLOCK_SIZE - block_offset).min(length - bytes_written);
            block[block_offset..block_offset + chunk]
                .copy_from_slice(&data[bytes_written..bytes_written + chunk]);
            if self.device.write_block(block_number, &block).is_err() {
                return -1;
            }
            bytes_written += chunk;
            block_index += 1;
            block_offset = 0;
        }

        if bytes_written < length && inode.indirect != 0 {
            let mut indirect_block = [0u8; BLOCK_SIZE];
            if self
                .device
                .read_block(inode.indirect as u64, &mut indirect_block)
                .is_err()
            {
                return -1;
            }

            let mut pointer_index = block_index.saturating_sub(POINTERS_PER_INODE);
            while bytes_written < length && pointer_index < POINTERS_PER_BLOCK {
                let pointer = layout::read_pointer(&indirect_block, pointer_index);
                if pointer == 0 {
                    break;
                }
                if self.device.read_block(pointer as u64, &mut block).is_err() {
                    return -1;
                }
                let chunk = (BLOCK_SIZE - block_offset).min(length - bytes_written);
                block[block_offset..block_offset + chunk]
                    .copy_from_slice(&data[bytes_written..bytes_written + chunk]);
                if self.device.write_block(pointer as u64, &block).is_err() {
                    return -1;
                }
                bytes_written += chunk;
                pointer_index += 1;
                block_offset = 0;
            }
        }

        self.save_inode(n, &inode);
        bytes_written as i64
    }

    /// Grow `inode` so it covers at least `new_size` bytes, allocating
    /// direct and (if needed) indirect blocks on demand. If the allocator
    /// runs out of free blocks mid-extension, `inode.size` reflects
    /// exactly how far extension reached (spec.md §4.2.12).
    fn extend(&mut self, inode: &mut Inode, new_size: usize) {
        let old_blocks = div_ceil(inode.size as u64, BLOCK_SIZE as u64) as usize;
        let new_blocks = div_ceil(new_size as u64, BLOCK_SIZE as u64) as usize;

        if new_blocks <= old_blocks {
            inode.size = inode.size.max(new_size as u32);
            return;
        }

        let mut remaining = new_blocks - old_blocks;
        let mut idx = old_blocks;

        while idx < POINTERS_PER_INODE && remaining > 0 {
            match self.free_blocks.allocate() {
                Some(block) => {
                    inode.direct[idx] = block as u32;
                    idx += 1;
                    remaining -= 1;
                }
                None => break,
            }
        }

        if idx >= POINTERS_PER_INODE && remaining > 0 {
            let mut indirect_idx = idx - POINTERS_PER_INODE;
            let had_indirect = inode.indirect != 0;

            if !had_indirect {
                if let Some(block) = self.free_blocks.allocate() {
                    inode.indirect = block as u32;
                }
            }

            if inode.indirect != 0 {
                let mut indirect_block = [0u8; BLOCK_SIZE];
                if had_indirect {
                    let _ = self
                        .device
                        .read_block(inode.indirect as u64, &mut indirect_block);
                }
                // A freshly allocated indirect block starts zeroed in memory.

                while indirect_idx < POINTERS_PER_BLOCK && remaining > 0 {
                    match self.free_blocks.allocate() {
                        Some(block) => {
                            layout::write_pointer(&mut indirect_block, indirect_idx, block as u32);
                            indirect_idx += 1;
                            remaining -= 1;
                        }
                        None => break,
                    }
                }

                if indirect_idx == 0 && !had_indirect {
                    // Allocated an indirect block but couldn't place a
                    // single pointer in it: give it back rather than leak it.
                    self.free_blocks.release(inode.indirect as u64);
                    inode.indirect = 0;
                } else {
                    let _ = self
                        .device
                        .write_block(inode.indirect as u64, &indirect_block);
                }
            }
        }

        inode.size = if remaining > 0 {
            ((new_blocks - remaining) * BLOCK_SIZE) as u32
        } else {
            new_size as u32
        };
    }

    /// Write the textual debug dump described in spec.md §4.2.13 /
    /// §6 to `out`.
    pub fn debug_to(&mut self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "SuperBlock:")?;
        writeln!(
            out,
            "    magic number is {}",
            if self.super_block.magic_number == layout::MAGIC_NUMBER {
                "valid"
            } else {
                "invalid"
            }
        )?;
        writeln!(out, "    {} blocks", self.super_block.blocks)?;
        writeln!(out, "    {} inode blocks", self.super_block.inode_blocks)?;
        writeln!(out, "    {} inodes", self.super_block.inodes)?;

        let mut reported = 0u32;
        'blocks: for inode_block in 0..self.super_block.inode_blocks as u64 {
            for j in 0..INODES_PER_BLOCK {
                let inode_number = inode_block * INODES_PER_BLOCK as u64 + j as u64;
                let Some(inode) = self.load_inode(inode_number) else {
                    break 'blocks;
                };
                if !inode.valid {
                    continue;
                }

                writeln!(out, "Inode {inode_number}:")?;
                writeln!(out, "    size: {} bytes", inode.size)?;
                write!(out, "    direct blocks:")?;
                for &direct in inode.direct.iter().take_while(|&&b| b != 0) {
                    write!(out, " {direct}")?;
                }
                writeln!(out)?;

                if inode.indirect != 0 {
                    writeln!(out, "    indirect block: {}", inode.indirect)?;
                    let mut indirect_block = [0u8; BLOCK_SIZE];
                    if self
                        .device
                        .read_block(inode.indirect as u64, &mut indirect_block)
                        .is_err()
                    {
                        break 'blocks;
                    }
                    write!(out, "    indirect data blocks:")?;
                    for i in 0..POINTERS_PER_BLOCK {
                        let pointer = layout::read_pointer(&indirect_block, i);
                        if pointer == 0 {
                            break;
                        }
                        write!(out, " {pointer}")?;
                    }
                    writeln!(out)?;
                }

                reported += 1;
                if reported >= self.super_block.inode_blocks {
                    break 'blocks;
                }
            }
        }

        Ok(())
    }

    /// Convenience wrapper around [`Self::debug_to`] that writes to stdout.
    pub fn debug(&mut self) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let _ = self.debug_to(&mut handle);
    }
}

