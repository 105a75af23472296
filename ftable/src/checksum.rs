//! # 校验和
//!
//! 对索引节点的块指针表求一个字节的校验值：
//! 取每个块指针的最高字节（即数据块的标签）逐一异或。
//!
//! 0 号直接指针的种子项先移位后掩码，恒为 0，
//! 与已有磁盘上的校验值保持逐位一致；其余指针均先掩码后移位。

use mini_fs::{ADDR_MASK, IndirectBlock, NDIRECT};
use vfs::Error;

/// 块指针中标签所占的位
const TAG_MASK: u32 = 0xFF00_0000;

/// 计算校验和，调用方须持有节点锁，保证块指针表在计算期间不变。
///
/// `read_indirect` 经块缓存读出一级索引块，参数为已去掉标签的块号。
/// 即使文件没有一级索引块也照常读取（此时读的是 0 号块），
/// 读盘出错时原样返回。
pub fn checksum<F>(addrs: &[u32; NDIRECT + 1], read_indirect: F) -> Result<u8, Error>
where
    F: FnOnce(u32) -> Result<IndirectBlock, Error>,
{
    let mut sum = seed(addrs[0]);

    // 直接索引
    for &addr in &addrs[1..NDIRECT] {
        sum ^= tag(addr);
    }

    // 一级索引
    for &entry in read_indirect(addrs[NDIRECT] & ADDR_MASK)?.iter() {
        sum ^= tag(entry);
    }

    Ok(sum)
}

#[inline]
fn seed(addr: u32) -> u8 {
    ((addr >> 24) & TAG_MASK) as u8
}

#[inline]
fn tag(addr: u32) -> u8 {
    ((addr & TAG_MASK) >> 24) as u8
}
