#![cfg_attr(not(test), no_std)]

extern crate alloc;

/* mini-fs 的整体架构，自上而下 */

// 索引节点层：节点锁、按字节读写、目录查找
mod inode;

// 磁盘块管理器层：格式化、分配数据块与索引节点
mod fs;

// 磁盘数据结构层
mod layout;

// 块缓存层：内存上的磁盘块数据缓存
mod block_cache;

pub use self::{
    fs::MiniFs,
    inode::{Inode, InodeGuard},
    layout::{DIRSIZ, DirEntry, DiskInode},
};

pub const MAGIC: u32 = 0x3b80_0002;
pub const BLOCK_SIZE: usize = 512;
pub const BLOCK_BITS: usize = BLOCK_SIZE * 8;

/// 直接索引个数
pub const NDIRECT: usize = 12;
/// 一级索引块内的块编号个数
pub const NINDIRECT: usize = BLOCK_SIZE / 4;
/// 单个文件最多占用的数据块个数
pub const MAXFILE: usize = NDIRECT + NINDIRECT;

/// 块指针的低24位是块号，高8位是标签；
/// [`vfs::InodeKind::Checked`] 文件的标签是所指数据块全部字节的异或
pub const ADDR_MASK: u32 = 0x00FF_FFFF;

/// 根目录的 inode 编号，0 号保留表示“无”
pub const ROOT_INUM: u32 = 1;

pub type DataBlock = [u8; BLOCK_SIZE];
/// 一级索引块
pub type IndirectBlock = [u32; NINDIRECT];
