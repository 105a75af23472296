//! 宿主机上操作 mini-fs 镜像的工具

mod block_file;

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;

use ftable::{FileKind, FileTable, OpenFlag};
use mini_fs::{BLOCK_SIZE, MiniFs};
use vfs::{Error, InodeKind, Stat};

pub use self::block_file::BlockFile;

/// 镜像挂载时使用的设备号
pub const ROOT_DEV: u32 = 1;

/// 新建镜像文件并格式化
pub fn create(image: &Path, blocks: u32, inodes: u32) -> io::Result<Arc<MiniFs>> {
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(image)?;
    fd.set_len(blocks as u64 * BLOCK_SIZE as u64)?;

    MiniFs::format(ROOT_DEV, Arc::new(BlockFile::new(fd)), blocks, inodes).map_err(io::Error::other)
}

pub fn mount(image: &Path) -> io::Result<Arc<MiniFs>> {
    let fd = OpenOptions::new().read(true).write(true).open(image)?;
    MiniFs::open(ROOT_DEV, Arc::new(BlockFile::new(fd))).map_err(io::Error::other)
}

/// 在根目录下新建文件并经打开文件表写入内容，返回 inode 编号
pub fn add_file<const N: usize>(
    table: &FileTable<N>,
    fs: &Arc<MiniFs>,
    name: &str,
    data: &[u8],
    kind: InodeKind,
) -> Result<u32, Error> {
    let inode = fs.ialloc(kind)?;
    let inum = inode.inum();
    fs.root().lock()?.dirlink(name, inum)?;

    let file = table.open(FileKind::Inode(inode), OpenFlag::WRONLY.into())?;
    let written = table.write(file, data);
    table.close(file)?;
    written?;

    Ok(inum)
}

/// 按路径打开文件并查询元数据
pub fn stat_path<const N: usize>(
    table: &FileTable<N>,
    fs: &Arc<MiniFs>,
    path: &str,
) -> Result<Stat, Error> {
    let inode = fs.namei(path)?;
    let file = table.open(FileKind::Inode(inode), OpenFlag::read_only())?;
    let stat = table.stat(file);
    table.close(file)?;
    stat
}
