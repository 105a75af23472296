use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use block_dev::{BlockDevice, RamDisk};
use ftable::{CharDevice, FileKind, FileTable, OpenFlag};
use mini_fs::{ADDR_MASK, BLOCK_SIZE, MiniFs, NDIRECT};
use vfs::{Error, InodeKind};

fn ram_fs() -> Arc<MiniFs> {
    let disk: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(BLOCK_SIZE, 512));
    MiniFs::format(1, disk, 512, 32).unwrap()
}

fn file_with(fs: &Arc<MiniFs>, kind: InodeKind, data: &[u8]) -> FileKind {
    let inode = fs.ialloc(kind).unwrap();
    inode.lock().unwrap().write_at(0, data).unwrap();
    FileKind::Inode(inode)
}

fn xor(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, &b| acc ^ b)
}

#[test]
fn successive_reads_advance_the_offset() {
    let fs = ram_fs();
    let table = FileTable::<4>::new();
    let file = table
        .open(file_with(&fs, InodeKind::File, b"hello, world"), OpenFlag::read_only())
        .unwrap();

    let mut buf = [0; 5];
    assert_eq!(Ok(5), table.read(file, &mut buf));
    assert_eq!(b"hello", &buf);
    assert_eq!(Ok(3), table.read(file, &mut buf[..3]));
    assert_eq!(b", w", &buf[..3]);
    assert_eq!(8, table.offset(file));

    // 末尾处读到 0 字节，偏移量不变
    assert_eq!(Ok(4), table.read(file, &mut buf));
    assert_eq!(Ok(0), table.read(file, &mut buf));
    assert_eq!(12, table.offset(file));
}

#[test]
fn duplicated_handles_share_the_offset() {
    let fs = ram_fs();
    let table = FileTable::<4>::new();
    let kind = file_with(&fs, InodeKind::File, b"abcdef");
    let first = table.open(kind.clone(), OpenFlag::read_only()).unwrap();
    let dup = table.duplicate(first).unwrap();
    let other = table.open(kind, OpenFlag::read_only()).unwrap();

    let mut buf = [0; 2];
    table.read(first, &mut buf).unwrap();
    table.read(dup, &mut buf).unwrap();
    assert_eq!(b"cd", &buf);

    table.read(other, &mut buf).unwrap();
    assert_eq!(b"ab", &buf);
    assert_eq!(4, table.offset(first));
    assert_eq!(2, table.offset(other));
}

#[test]
fn writes_extend_the_file() {
    let fs = ram_fs();
    let table = FileTable::<4>::new();
    let kind = file_with(&fs, InodeKind::File, b"");
    let writer = table.open(kind.clone(), OpenFlag::WRONLY.into()).unwrap();

    assert_eq!(Ok(6), table.write(writer, b"abc123"));
    assert_eq!(Ok(3), table.write(writer, b"xyz"));
    assert_eq!(9, table.offset(writer));
    assert_eq!(Err(Error::PermissionDenied), table.read(writer, &mut [0; 1]));

    let reader = table.open(kind, OpenFlag::read_only()).unwrap();
    assert_eq!(Err(Error::PermissionDenied), table.write(reader, b"!"));
    let mut buf = [0; 16];
    assert_eq!(Ok(9), table.read(reader, &mut buf));
    assert_eq!(b"abc123xyz", &buf[..9]);
    assert_eq!(9, table.stat(reader).unwrap().size);
}

#[test]
fn denied_write_leaves_the_file_untouched() {
    let fs = ram_fs();
    let table = FileTable::<2>::new();
    let file = table
        .open(file_with(&fs, InodeKind::File, b"keep"), OpenFlag::read_only())
        .unwrap();

    assert_eq!(Err(Error::PermissionDenied), table.write(file, b"oops"));
    assert_eq!(0, table.offset(file));
    assert_eq!(4, table.stat(file).unwrap().size);
}

#[test]
fn plain_files_report_no_checksum() {
    let fs = ram_fs();
    let table = FileTable::<2>::new();
    let file = table
        .open(file_with(&fs, InodeKind::File, &[0xFF; 1000]), OpenFlag::read_only())
        .unwrap();

    let stat = table.stat(file).unwrap();
    assert_eq!(InodeKind::File, stat.kind);
    assert_eq!(1000, stat.size);
    assert_eq!(0, stat.checksum);
}

#[test]
fn checked_files_fold_every_block_but_the_first() {
    let fs = ram_fs();
    let table = FileTable::<2>::new();

    let blocks = NDIRECT + 2;
    let data: Vec<u8> = (0..blocks * BLOCK_SIZE)
        .map(|i| (i * 7 + i / BLOCK_SIZE) as u8)
        .collect();
    let file = table
        .open(file_with(&fs, InodeKind::Checked, &data), OpenFlag::read_only())
        .unwrap();

    let expected = data
        .chunks(BLOCK_SIZE)
        .skip(1)
        .fold(0, |acc, block| acc ^ xor(block));

    let stat = table.stat(file).unwrap();
    assert_eq!(InodeKind::Checked, stat.kind);
    assert_eq!(expected, stat.checksum);
    assert_eq!(stat, table.stat(file).unwrap());
}

#[test]
fn checksum_follows_rewrites() {
    let fs = ram_fs();
    let table = FileTable::<2>::new();
    let mut data = vec![0u8; 2 * BLOCK_SIZE];
    data[BLOCK_SIZE] = 0x30;
    let file = table
        .open(file_with(&fs, InodeKind::Checked, &data), OpenFlag::RDWR.into())
        .unwrap();
    assert_eq!(0x30, table.stat(file).unwrap().checksum);

    let mut skip = vec![0; BLOCK_SIZE + 1];
    table.read(file, &mut skip).unwrap();
    table.write(file, &[0x0C]).unwrap();
    assert_eq!(0x30 ^ 0x0C, table.stat(file).unwrap().checksum);
}

#[derive(Debug, Default)]
struct Recorder {
    written: Mutex<Vec<u8>>,
}

impl CharDevice for Recorder {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        buf.fill(b'z');
        Ok(buf.len())
    }

    fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
}

#[test]
fn device_files_route_through_the_device_table() {
    let fs = ram_fs();
    let table = FileTable::<2>::new();
    let recorder = Arc::new(Recorder::default());
    table.devices().register(1, recorder.clone()).unwrap();

    let inode = fs.ialloc(InodeKind::Device).unwrap();
    inode.lock().unwrap().set_device(1, 0).unwrap();
    let console = table
        .open(FileKind::Inode(inode), OpenFlag::RDWR.into())
        .unwrap();

    assert_eq!(Ok(3), table.write(console, b"hi\n"));
    assert_eq!(b"hi\n", &recorder.written.lock().unwrap()[..]);
    let mut buf = [0; 2];
    assert_eq!(Ok(2), table.read(console, &mut buf));
    assert_eq!(b"zz", &buf);
    assert_eq!(5, table.offset(console));
    assert_eq!(0, table.stat(console).unwrap().size);
}

#[test]
fn unknown_devices_are_reported() {
    let fs = ram_fs();
    let table = FileTable::<2>::new();
    let inode = fs.ialloc(InodeKind::Device).unwrap();
    inode.lock().unwrap().set_device(7, 0).unwrap();
    let file = table
        .open(FileKind::Inode(inode), OpenFlag::read_only())
        .unwrap();

    assert_eq!(Err(Error::NoDevice), table.read(file, &mut [0; 1]));
    assert_eq!(
        Err(Error::NoDevice),
        table.devices().register(ftable::config::NDEV as u16, Arc::new(Recorder::default()))
    );
}

#[test]
fn last_close_drops_the_inode_reference() {
    let fs = ram_fs();
    let table = FileTable::<2>::new();
    let inode = fs.ialloc(InodeKind::File).unwrap();
    let file = table
        .open(FileKind::Inode(inode.clone()), OpenFlag::read_only())
        .unwrap();
    table.duplicate(file).unwrap();
    assert_eq!(2, Arc::strong_count(&inode));

    table.close(file).unwrap();
    assert_eq!(2, Arc::strong_count(&inode));
    table.close(file).unwrap();
    assert_eq!(1, Arc::strong_count(&inode));
}

/// 打开开关后一切读块都失败
#[derive(Debug)]
struct FlakyDisk {
    inner: RamDisk,
    broken: AtomicBool,
}

impl BlockDevice for FlakyDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), block_dev::Error> {
        if self.broken.load(Ordering::Relaxed) {
            return Err(block_dev::Error::Device(block_id));
        }
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), block_dev::Error> {
        self.inner.write_block(block_id, buf)
    }
}

#[test]
fn io_errors_propagate_without_touching_the_table() {
    let disk = Arc::new(FlakyDisk {
        inner: RamDisk::new(BLOCK_SIZE, 512),
        broken: AtomicBool::new(false),
    });
    let inum = {
        let fs = MiniFs::format(1, disk.clone(), 512, 32).unwrap();
        let FileKind::Inode(inode) =
            file_with(&fs, InodeKind::Checked, &vec![1; (NDIRECT + 1) * BLOCK_SIZE])
        else {
            unreachable!()
        };
        fs.sync().unwrap();
        inode.inum()
    };

    // 新挂载的文件系统缓存为空，只有超级块与节点块被读入
    let fs = MiniFs::open(1, disk.clone()).unwrap();
    let inode = fs.iget(inum);

    let indirect = (inode.lock().unwrap().addrs()[NDIRECT] & ADDR_MASK) as usize;

    let table = FileTable::<2>::new();
    let file = table
        .open(FileKind::Inode(inode), OpenFlag::read_only())
        .unwrap();
    disk.broken.store(true, Ordering::Relaxed);

    assert_eq!(
        Err(Error::Io(block_dev::Error::Device(indirect))),
        table.stat(file)
    );
    assert!(matches!(table.read(file, &mut [0; 4]), Err(Error::Io(_))));
    assert_eq!(0, table.offset(file));
    assert_eq!(1, table.ref_count(file));

    disk.broken.store(false, Ordering::Relaxed);
    assert!(table.stat(file).is_ok());
    table.close(file).unwrap();
    assert_eq!(0, table.live());
}

#[test]
fn small_checked_file_folds_in_block_zero() {
    let disk: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(BLOCK_SIZE, 512));
    let inum = {
        let fs = MiniFs::format(1, disk.clone(), 512, 32).unwrap();
        let FileKind::Inode(inode) = file_with(&fs, InodeKind::Checked, b"0123456789") else {
            unreachable!()
        };
        fs.sync().unwrap();
        inode.inum()
    };

    // 没有一级索引块，0 号块被当作索引块读取；首个表项的标签为 0x5A
    let mut boot = [0; BLOCK_SIZE];
    boot[..4].copy_from_slice(&0x5A00_0000u32.to_ne_bytes());
    disk.write_block(0, &boot).unwrap();

    let fs = MiniFs::open(1, disk).unwrap();
    let inode = fs.iget(inum);
    assert_eq!(0, inode.lock().unwrap().addrs()[NDIRECT] & ADDR_MASK);

    let table = FileTable::<2>::new();
    let file = table
        .open(FileKind::Inode(inode), OpenFlag::read_only())
        .unwrap();
    let stat = table.stat(file).unwrap();
    assert_eq!(10, stat.size);
    assert_eq!(0x5A, stat.checksum);
    table.close(file).unwrap();
}
