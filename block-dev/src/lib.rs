//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、光盘、U盘等；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。

#![no_std]

extern crate alloc;

mod ram_disk;

use core::any::Any;
use core::fmt::{self, Debug, Display};

pub use self::ram_disk::RamDisk;

/// 块设备驱动特质
pub trait BlockDevice: Debug + Send + Sync + Any {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error>;
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 块号超出设备容量
    OutOfRange(usize),
    /// 设备本身出错，如读写不完整
    Device(usize),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfRange(id) => write!(f, "block {id} out of range"),
            Error::Device(id) => write!(f, "device error on block {id}"),
        }
    }
}
