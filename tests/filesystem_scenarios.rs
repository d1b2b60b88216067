//! Scenario-level integration tests for blockfs, mirroring the concrete
//! scenarios spec.md §8 lists (S1–S7) plus the quantified properties above
//! them.

use blockfs::{BlockDevice, FileBackedBlockDevice, FileSystem, BLOCK_SIZE};
use tempfile::NamedTempFile;

fn zero_filled_image(blocks: u64) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    file.as_file().set_len(blocks * BLOCK_SIZE as u64).unwrap();
    file
}

fn formatted(blocks: u64) -> (NamedTempFile, FileSystem<FileBackedBlockDevice>) {
    let image = zero_filled_image(blocks);
    let mut device = FileBackedBlockDevice::open(image.path(), blocks).unwrap();
    assert!(FileSystem::format(&mut device));
    let fs = FileSystem::mount(device).unwrap();
    (image, fs)
}

#[test]
fn s1_format_and_mount_report_expected_layout() {
    env_logger::builder().is_test(true).try_init().ok();

    let (_image, mut fs) = formatted(100);
    assert_eq!(fs.blocks(), 100);
    assert_eq!(fs.inode_blocks(), 10);
    assert_eq!(fs.inode_count(), 1280);

    let mut out = Vec::new();
    fs.debug_to(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("magic number is valid"));
    assert!(text.contains("100 blocks"));
    assert!(text.contains("10 inode blocks"));
    assert!(text.contains("1280 inodes"));
    assert!(!text.contains("Inode "));
}

#[test]
fn s2_create_assigns_lowest_free_inode() {
    let (_image, mut fs) = formatted(100);

    let created: Vec<i64> = (0..5).map(|_| fs.create()).collect();
    assert_eq!(created, vec![0, 1, 2, 3, 4]);

    assert_eq!(fs.stat(3), 0);
    assert!(fs.remove(2));
    assert_eq!(fs.create(), 2);
}

#[test]
fn s3_small_write_then_read_round_trips() {
    let (_image, mut fs) = formatted(100);
    let n = fs.create() as u64;

    assert_eq!(fs.write(n, b"HELLO", 5, 0), 5);
    assert_eq!(fs.stat(n), 5);

    let mut buf = [0u8; 5];
    assert_eq!(fs.read(n, &mut buf, 5, 0), 5);
    assert_eq!(&buf, b"HELLO");

    let mut buf10 = [0u8; 10];
    assert_eq!(fs.read(n, &mut buf10, 10, 0), 5);
}

#[test]
fn s4_write_spanning_two_direct_blocks_allocates_no_indirect() {
    let (_image, mut fs) = formatted(100);
    let n = fs.create() as u64;

    let length = BLOCK_SIZE + 100;
    let data: Vec<u8> = (0..length).map(|i| (i % 251) as u8).collect();

    assert_eq!(fs.write(n, &data, length, 0), length as i64);
    assert_eq!(fs.stat(n), length as i64);

    let mut out = vec![0u8; length];
    assert_eq!(fs.read(n, &mut out, length, 0), length as i64);
    assert_eq!(out, data);
}

#[test]
fn s5_write_spanning_into_indirect_block_allocates_exactly_one_pointer() {
    let (_image, mut fs) = formatted(10_000);
    let n = fs.create() as u64;

    let length = 5 * BLOCK_SIZE + BLOCK_SIZE;
    let data = vec![0xAAu8; length];

    assert_eq!(fs.write(n, &data, length, 0), length as i64);

    let mut out = vec![0u8; length];
    assert_eq!(fs.read(n, &mut out, length, 0), length as i64);
    assert_eq!(out, data);

    let mut debug = Vec::new();
    fs.debug_to(&mut debug).unwrap();
    let text = String::from_utf8(debug).unwrap();
    assert!(text.contains("indirect block:"));
}

#[test]
fn s6_write_beyond_device_capacity_returns_partial_count() {
    let (_image, mut fs) = formatted(10);
    let n = fs.create() as u64;

    let length = 100 * BLOCK_SIZE;
    let data = vec![0x11u8; length];

    let written = fs.write(n, &data, length, 0);
    assert!(written > 0);
    assert_eq!(written % BLOCK_SIZE as i64, 0);
    assert_eq!(fs.stat(n), written);
}

#[test]
fn s7_remove_then_reread_fails_and_inode_is_reusable() {
    let (_image, mut fs) = formatted(100);
    let n = fs.create() as u64;
    fs.write(n, b"HELLO", 5, 0);

    assert!(fs.remove(n));

    let mut buf = [0u8; 5];
    assert_eq!(fs.read(n, &mut buf, 5, 0), -1);
    assert_eq!(fs.create(), n as i64);
    assert_eq!(fs.stat(n), 0);
}

#[test]
fn holes_created_by_extension_read_back_as_zero() {
    let (_image, mut fs) = formatted(100);
    let n = fs.create() as u64;

    // Extend the file via a write far past the start without touching the
    // bytes in between; those bytes must read back as zero.
    assert_eq!(fs.write(n, b"END", 3, BLOCK_SIZE + 10), 3);

    let mut hole = vec![0xFFu8; BLOCK_SIZE + 10];
    assert_eq!(
        fs.read(n, &mut hole, BLOCK_SIZE + 10, 0),
        (BLOCK_SIZE + 10) as i64
    );
    assert!(hole.iter().all(|&b| b == 0));
}

#[test]
fn bitmap_reconstruction_is_deterministic_across_remount() {
    let (image, mut fs) = formatted(200);
    let n = fs.create() as u64;
    fs.write(n, &vec![7u8; 3 * BLOCK_SIZE], 3 * BLOCK_SIZE, 0);

    let device = fs.unmount();
    device.close();

    let device = FileBackedBlockDevice::open(image.path(), 200).unwrap();
    let mut remounted = FileSystem::mount(device).unwrap();

    // A fresh write on a second inode must not collide with blocks the
    // first inode already owns.
    let m = remounted.create() as u64;
    assert_eq!(remounted.write(m, b"after-remount", 13, 0), 13);

    let mut original = vec![0u8; 3 * BLOCK_SIZE];
    assert_eq!(
        remounted.read(n, &mut original, 3 * BLOCK_SIZE, 0),
        3 * BLOCK_SIZE as i64
    );
    assert!(original.iter().all(|&b| b == 7));
}

#[test]
fn remove_reclaims_exactly_what_create_and_write_allocated() {
    let (_image, mut fs) = formatted(200);

    let before = fs.create() as u64;
    fs.remove(before);

    let n = fs.create() as u64;
    fs.write(n, &vec![1u8; 2 * BLOCK_SIZE], 2 * BLOCK_SIZE, 0);
    assert!(fs.remove(n));

    // The reclaimed blocks must be available again for an equally sized
    // write on a new inode.
    let m = fs.create() as u64;
    assert_eq!(fs.write(m, &vec![2u8; 2 * BLOCK_SIZE], 2 * BLOCK_SIZE, 0), 2 * BLOCK_SIZE as i64);
}

#[test]
fn reformatting_an_unmounted_device_is_allowed() {
    // `format` takes `&mut D` directly rather than a mounted `FileSystem`,
    // so "format a live mount" (spec.md §4.2.1) is unrepresentable by
    // construction: a mounted device is owned by its `FileSystem` and
    // can't be handed to `format` until `unmount` gives it back.
    let image = zero_filled_image(50);
    let mut device = FileBackedBlockDevice::open(image.path(), 50).unwrap();
    assert!(FileSystem::format(&mut device));
    assert!(FileSystem::format(&mut device));
}

#[test]
fn mount_rejects_an_unformatted_image() {
    let image = zero_filled_image(50);
    let device = FileBackedBlockDevice::open(image.path(), 50).unwrap();
    assert!(FileSystem::mount(device).is_none());
}

#[test]
fn a_fresh_indirect_block_with_no_room_for_a_pointer_is_released() {
    // 8 blocks => 1 inode block => exactly 6 data blocks (2..=7). A write
    // demanding 7 data blocks fills all 5 direct slots plus the indirect
    // block itself, leaving no free block for even one indirect pointer,
    // so the freshly allocated indirect block must be handed back
    // (spec.md §4.2.12's explicit guard).
    let (_image, mut fs) = formatted(8);
    let n = fs.create() as u64;

    let length = 6 * BLOCK_SIZE + 1;
    let data = vec![0x42u8; length];
    let written = fs.write(n, &data, length, 0);

    assert_eq!(written, 5 * BLOCK_SIZE as i64);
    assert_eq!(fs.stat(n), 5 * BLOCK_SIZE as i64);

    let mut debug = Vec::new();
    fs.debug_to(&mut debug).unwrap();
    assert!(!String::from_utf8(debug).unwrap().contains("indirect"));

    // The block that would have backed the indirect pointer table must
    // have been returned to the pool rather than leaked: removing this
    // inode and creating a fresh one that again demands more than the 5
    // direct slots can hold must reach the same reachable ceiling (5
    // direct blocks; the 6th data block still has nowhere to route its
    // pointer through on this 8-block image).
    assert!(fs.remove(n));
    let m = fs.create() as u64;
    assert_eq!(
        fs.write(m, &vec![1u8; 6 * BLOCK_SIZE], 6 * BLOCK_SIZE, 0),
        5 * BLOCK_SIZE as i64
    );
}
