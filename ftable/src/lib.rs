//! # 内核文件层
//!
//! ## 分层（自上而下）
//!
//! 1. 系统调用层
//! 2. 打开文件表层：本 crate
//! 3. 内核索引节点层 / 管道
//! 4. 文件系统层（`mini-fs`）
//! 5. 块设备驱动层
//!
//! ## 打开文件表
//!
//! 全系统共享一张定长的[打开文件表](FileTable)，表项带引用计数，
//! 由分配、复制、关闭三个操作维护其生命周期；
//! 读、写、查询元数据按表项的[类型](FileKind)转交管道或索引节点。
//!
//! ## 锁序
//!
//! 表锁只保护表项的引用计数与类型，临界区内不做任何可能阻塞的事；
//! 索引节点锁保护节点内容，持有期间会读写块缓存。
//! 两把锁从不嵌套：持表锁时不取节点锁，持节点锁时也不取表锁。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod checksum;
pub mod config;
mod device;
mod file;
mod pipe;
mod table;

pub use self::{
    device::{CharDevice, DeviceTable},
    file::{FileKind, OpenFlag},
    pipe::Pipe,
    table::{FileTable, Handle},
};
