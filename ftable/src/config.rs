//! Constants used in the file layer

/// 全系统同时打开的文件对象个数
pub const NFILE: usize = 100;

/// 设备表的容量，主设备号须小于此值
pub const NDEV: usize = 10;

/// 管道缓冲区的字节数
pub const PIPE_SIZE: usize = 512;
