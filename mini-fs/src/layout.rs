//! # 磁盘数据结构层
//!
//! | 块号 | 内容 |
//! |------|------|
//! | 0 | 保留（引导块） |
//! | 1 | 超级块 |
//! | `inode_start..` | 索引节点区 |
//! | `bmap_start..` | 数据块位图 |
//! | `data_start..` | 数据区 |

use core::mem;
use core::str;

use vfs::InodeKind;

use crate::{BLOCK_SIZE, MAGIC, NDIRECT};

pub(crate) const INODE_SIZE: usize = mem::size_of::<DiskInode>();
pub(crate) const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

/// 目录项中文件名的最大长度
pub const DIRSIZ: usize = 14;
pub(crate) const DIRENT_SIZE: usize = 2 + DIRSIZ;

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub(crate) struct SuperBlock {
    magic: u32,
    /// 总块数
    pub size: u32,
    pub ninodes: u32,
    pub inode_start: u32,
    pub bmap_start: u32,
    pub data_start: u32,
}

impl SuperBlock {
    pub fn new(size: u32, ninodes: u32, inode_start: u32, bmap_start: u32, data_start: u32) -> Self {
        Self {
            magic: MAGIC,
            size,
            ninodes,
            inode_start,
            bmap_start,
            data_start,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
            && self.inode_start < self.bmap_start
            && self.bmap_start < self.data_start
            && self.data_start < self.size
    }
}

/// 磁盘上的索引节点，64字节
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct DiskInode {
    /// [`InodeKind`] 的编码，0 表示空闲
    pub kind: u16,
    /// 主设备号，仅 [`InodeKind::Device`] 使用
    pub major: u16,
    pub minor: u16,
    /// 硬链接个数
    pub nlink: u16,
    pub size: u32,
    /// 前 [`NDIRECT`] 个为直接索引，最后一个指向一级索引块
    pub addrs: [u32; NDIRECT + 1],
}

impl DiskInode {
    #[inline]
    pub fn init(&mut self, kind: InodeKind) {
        *self = Self {
            kind: kind.into(),
            nlink: 1,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.kind == 0
    }
}

/// 目录项，编号为 0 的目录项是空位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirEntry {
    pub inum: u16,
    name: [u8; DIRSIZ],
}

impl DirEntry {
    /// 名字超出 [`DIRSIZ`] 的部分被截断
    pub fn new(name: &str, inum: u16) -> Self {
        let mut bytes = [0; DIRSIZ];
        let len = name.len().min(DIRSIZ);
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self { inum, name: bytes }
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(DIRSIZ);
        str::from_utf8(&self.name[..len]).unwrap_or_else(|err| {
            log::warn!("dir entry {} has a non-UTF-8 name: {err}", self.inum);
            ""
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inum == 0
    }

    pub(crate) fn to_bytes(self) -> [u8; DIRENT_SIZE] {
        let mut bytes = [0; DIRENT_SIZE];
        bytes[..2].copy_from_slice(&self.inum.to_le_bytes());
        bytes[2..].copy_from_slice(&self.name);
        bytes
    }

    pub(crate) fn from_bytes(bytes: &[u8; DIRENT_SIZE]) -> Self {
        let mut name = [0; DIRSIZ];
        name.copy_from_slice(&bytes[2..]);
        Self {
            inum: u16::from_le_bytes([bytes[0], bytes[1]]),
            name,
        }
    }
}
