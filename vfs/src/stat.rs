use crate::InodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Stat {
    /// 所在设备
    pub dev: u32,
    /// Inode number
    pub ino: u32,
    pub kind: InodeKind,
    /// 硬链接个数
    pub nlink: u16,
    /// File size
    pub size: u64,
    /// 仅对 [`InodeKind::Checked`] 有意义，其余类型恒为 0
    pub checksum: u8,
}
