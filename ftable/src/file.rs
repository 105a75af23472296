use alloc::sync::Arc;

use enumflags2::{BitFlags, bitflags};
use mini_fs::Inode;

use crate::Pipe;

/// 打开文件对象所指的 I/O 资源
#[derive(Debug, Clone, Default)]
pub enum FileKind {
    /// 空闲表项，或刚分配、尚未装入资源的表项
    #[default]
    None,
    Pipe(Arc<Pipe>),
    Inode(Arc<Inode>),
}

/// 打开文件表的一项，受表锁保护
#[derive(Debug, Default)]
pub(crate) struct Slot {
    /// 引用计数，为 0 时表项空闲
    pub refs: usize,
    pub kind: FileKind,
    /// 装入资源时确定，此后不变
    pub readable: bool,
    pub writable: bool,
}

#[rustfmt::skip]
#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFlag {
    /// 只写
    WRONLY = 0b0000_0000_0001,
    /// 读写兼备
    RDWR   = 0b0000_0000_0010,
}

impl OpenFlag {
    // enumflags2拒绝值为0的标志
    /// 只读
    pub const RDONLY: u32 = 0b0000_0000_0000;

    #[inline]
    pub fn read_only() -> BitFlags<OpenFlag> {
        BitFlags::from_bits_truncate(Self::RDONLY)
    }

    /// 由打开标志得出 `[readable, writable]`
    pub fn access(flags: BitFlags<OpenFlag>) -> [bool; 2] {
        if flags.is_empty() {
            [true, false]
        } else if flags.contains(OpenFlag::WRONLY) && !flags.contains(OpenFlag::RDWR) {
            [false, true]
        } else {
            [true, true]
        }
    }
}
