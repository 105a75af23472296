use core::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    AlreadyExists,
    NotFound,
    NotADirectory,
    /// 打开文件表已满
    ResourceExhausted,
    /// 对不可读的文件读，或对不可写的文件写
    PermissionDenied,
    Unsupported,
    /// 设备表中没有对应的主设备号
    NoDevice,
    /// 数据块或索引节点耗尽
    NoSpace,
    FileTooLarge,
    InvalidOffset,
    /// 读端已关闭的管道
    BrokenPipe,
    /// 镜像不是本文件系统的格式
    InvalidImage,
    Io(block_dev::Error),
    /// 调用方或内部状态出错（关闭后使用、引用计数错乱），
    /// 不可重试，调用路径应当就此终止
    InvariantViolation(&'static str),
}

impl Error {
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvariantViolation(_))
    }
}

impl From<block_dev::Error> for Error {
    #[inline]
    fn from(err: block_dev::Error) -> Self {
        Error::Io(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadyExists => f.write_str("already exists"),
            Error::NotFound => f.write_str("no such file or directory"),
            Error::NotADirectory => f.write_str("not a directory"),
            Error::ResourceExhausted => f.write_str("open file table is full"),
            Error::PermissionDenied => f.write_str("permission denied"),
            Error::Unsupported => f.write_str("operation not supported"),
            Error::NoDevice => f.write_str("no such device"),
            Error::NoSpace => f.write_str("no space left on device"),
            Error::FileTooLarge => f.write_str("file too large"),
            Error::InvalidOffset => f.write_str("invalid offset"),
            Error::BrokenPipe => f.write_str("broken pipe"),
            Error::InvalidImage => f.write_str("not a valid filesystem image"),
            Error::Io(err) => write!(f, "I/O error: {err}"),
            Error::InvariantViolation(op) => write!(f, "invariant violated in {op}"),
        }
    }
}

impl core::error::Error for Error {}
