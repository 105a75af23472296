/// 索引节点类型，数值与磁盘上的编码一致，0 表示空闲节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum InodeKind {
    Directory = 1,
    #[default]
    File = 2,
    Device = 3,
    /// 参与校验和计算的普通文件
    Checked = 4,
}

impl InodeKind {
    /// 可按字节读写内容的类型
    #[inline]
    pub fn is_regular(self) -> bool {
        matches!(self, InodeKind::File | InodeKind::Checked)
    }
}

impl TryFrom<u16> for InodeKind {
    type Error = u16;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(InodeKind::Directory),
            2 => Ok(InodeKind::File),
            3 => Ok(InodeKind::Device),
            4 => Ok(InodeKind::Checked),
            raw => Err(raw),
        }
    }
}

impl From<InodeKind> for u16 {
    #[inline]
    fn from(kind: InodeKind) -> Self {
        kind as u16
    }
}
