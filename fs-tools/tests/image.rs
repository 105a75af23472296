use std::fs::OpenOptions;
use std::sync::Arc;

use block_dev::BlockDevice;
use fs_tools::BlockFile;
use ftable::FileTable;
use mini_fs::BLOCK_SIZE;
use vfs::{Error, InodeKind};

#[test]
fn stat_after_remount() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("fs.img");
    let table: FileTable = FileTable::new();

    let plain = b"hello, mini-fs\n".repeat(40);
    let checked = vec![0x05u8; BLOCK_SIZE * 2 + 1];
    {
        let fs = fs_tools::create(&image, 512, 32).unwrap();
        fs_tools::add_file(&table, &fs, "plain", &plain, InodeKind::File).unwrap();
        fs_tools::add_file(&table, &fs, "checked", &checked, InodeKind::Checked).unwrap();
        fs.sync().unwrap();
    }
    assert_eq!(0, table.live());

    let fs = fs_tools::mount(&image).unwrap();

    let stat = fs_tools::stat_path(&table, &fs, "plain").unwrap();
    assert_eq!(InodeKind::File, stat.kind);
    assert_eq!(plain.len() as u64, stat.size);
    assert_eq!(0, stat.checksum);

    // 0 号块不计入；1 号块为满块，标签为 0；2 号块只有一个 0x05
    let stat = fs_tools::stat_path(&table, &fs, "checked").unwrap();
    assert_eq!(InodeKind::Checked, stat.kind);
    assert_eq!(checked.len() as u64, stat.size);
    assert_eq!(0x05, stat.checksum);

    assert_eq!(0, table.live());
}

#[test]
fn missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("fs.img");
    let table: FileTable = FileTable::new();

    let fs = fs_tools::create(&image, 256, 16).unwrap();
    assert_eq!(
        Some(Error::NotFound),
        fs_tools::stat_path(&table, &fs, "nope").err()
    );
    assert_eq!(0, table.live());
}

#[test]
fn mount_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("garbage.img");
    std::fs::write(&image, vec![0xAA; BLOCK_SIZE * 8]).unwrap();

    assert!(fs_tools::mount(&image).is_err());
}

#[test]
fn block_file_bounds() {
    let file = tempfile::tempfile().unwrap();
    file.set_len(BLOCK_SIZE as u64 * 4).unwrap();
    let dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(file));

    let block = [0x5A; BLOCK_SIZE];
    dev.write_block(3, &block).unwrap();
    let mut buf = [0; BLOCK_SIZE];
    dev.read_block(3, &mut buf).unwrap();
    assert_eq!(block, buf);

    assert_eq!(
        Err(block_dev::Error::OutOfRange(4)),
        dev.read_block(4, &mut buf)
    );
}

#[test]
fn image_is_sized_on_create() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("fs.img");
    fs_tools::create(&image, 128, 16).unwrap();

    let len = OpenOptions::new()
        .read(true)
        .open(&image)
        .unwrap()
        .metadata()
        .unwrap()
        .len();
    assert_eq!(128 * BLOCK_SIZE as u64, len);
}
