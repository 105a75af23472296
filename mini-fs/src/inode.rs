//! # 索引节点层
//!
//! [`Inode`] 是内存中的索引节点，自带一把节点锁。
//! 节点内容在首次上锁时从磁盘加载，之后的修改立即写回块缓存。
//! 除 [`Inode::lock`] 外，一切读写都经由 [`InodeGuard`]，
//! 保证块指针表在一次操作中不会被其他人改动。

use alloc::sync::Arc;
use core::fmt;

use spin::{Mutex, MutexGuard};
use vfs::{Error, InodeKind, Stat};

use crate::layout::{DIRENT_SIZE, DirEntry, DiskInode};
use crate::{ADDR_MASK, BLOCK_SIZE, DataBlock, IndirectBlock, MAXFILE, MiniFs, NDIRECT, NINDIRECT};

pub struct Inode {
    inum: u32,
    fs: Arc<MiniFs>,
    inner: Mutex<InodeInner>,
}

#[derive(Debug, Default)]
struct InodeInner {
    /// 是否已从磁盘加载
    valid: bool,
    kind: InodeKind,
    disk: DiskInode,
}

/// 持有节点锁期间的访问凭证
pub struct InodeGuard<'a> {
    inode: &'a Inode,
    inner: MutexGuard<'a, InodeInner>,
}

impl Inode {
    pub(crate) fn new(inum: u32, fs: Arc<MiniFs>) -> Self {
        Self {
            inum,
            fs,
            inner: Mutex::default(),
        }
    }

    #[inline]
    pub fn inum(&self) -> u32 {
        self.inum
    }

    #[inline]
    pub fn dev(&self) -> u32 {
        self.fs.dev()
    }

    #[inline]
    pub fn fs(&self) -> &Arc<MiniFs> {
        &self.fs
    }

    /// 获取节点锁，必要时从磁盘读入节点内容
    pub fn lock(&self) -> Result<InodeGuard<'_>, Error> {
        let mut inner = self.inner.lock();
        if !inner.valid {
            let disk = self.fs.read_disk_inode(self.inum)?;
            if disk.is_free() {
                log::error!("lock: inode {} is not allocated", self.inum);
                return Err(Error::NotFound);
            }
            inner.kind = InodeKind::try_from(disk.kind).map_err(|raw| {
                log::error!("lock: inode {} has unknown kind {raw}", self.inum);
                Error::InvalidImage
            })?;
            inner.disk = disk;
            inner.valid = true;
        }

        Ok(InodeGuard { inode: self, inner })
    }
}

impl fmt::Debug for Inode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inode")
            .field("dev", &self.dev())
            .field("inum", &self.inum)
            .finish()
    }
}

impl InodeGuard<'_> {
    #[inline]
    pub fn inum(&self) -> u32 {
        self.inode.inum
    }

    #[inline]
    pub fn dev(&self) -> u32 {
        self.inode.dev()
    }

    #[inline]
    pub fn kind(&self) -> InodeKind {
        self.inner.kind
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.inner.disk.size as usize
    }

    #[inline]
    pub fn major(&self) -> u16 {
        self.inner.disk.major
    }

    /// 块指针表，高8位是标签
    #[inline]
    pub fn addrs(&self) -> &[u32; NDIRECT + 1] {
        &self.inner.disk.addrs
    }

    pub fn stat(&self) -> Stat {
        Stat {
            dev: self.dev(),
            ino: self.inum(),
            kind: self.kind(),
            nlink: self.inner.disk.nlink,
            size: self.inner.disk.size as u64,
            checksum: 0,
        }
    }

    /// 读出一级索引块的全部块指针
    pub fn read_indirect(&self, block_id: u32) -> Result<IndirectBlock, Error> {
        Ok(self
            .inode
            .fs
            .cache
            .get(block_id as usize)?
            .lock()
            .map(0, |indirect: &IndirectBlock| *indirect))
    }

    /// 设为设备文件
    pub fn set_device(&mut self, major: u16, minor: u16) -> Result<(), Error> {
        if self.kind() != InodeKind::Device {
            return Err(Error::Unsupported);
        }
        self.inner.disk.major = major;
        self.inner.disk.minor = minor;
        self.update()
    }

    /// 从 `offset` 处读取至多 `buf.len()` 个字节，不越过文件末尾
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, Error> {
        let size = self.size();
        if offset > size {
            return Err(Error::InvalidOffset);
        }

        let end = (offset + buf.len()).min(size);
        let mut read = 0;
        let mut pos = offset;
        while pos < end {
            let inner_offset = pos % BLOCK_SIZE;
            let len = (end - pos).min(BLOCK_SIZE - inner_offset);
            let dst = &mut buf[read..read + len];

            match self.bmap(pos / BLOCK_SIZE)? {
                Some(block_id) => self.inode.fs.bread(block_id, |data| {
                    dst.copy_from_slice(&data[inner_offset..inner_offset + len])
                })?,
                // 空洞
                None => dst.fill(0),
            }

            read += len;
            pos += len;
        }

        Ok(read)
    }

    /// 从 `offset` 处写入 `buf`，按需分配数据块，必要时扩大文件
    pub fn write_at(&mut self, offset: usize, buf: &[u8]) -> Result<usize, Error> {
        if offset > self.size() {
            return Err(Error::InvalidOffset);
        }
        if offset + buf.len() > MAXFILE * BLOCK_SIZE {
            return Err(Error::FileTooLarge);
        }

        let checked = self.kind() == InodeKind::Checked;
        let mut written = 0;
        let mut pos = offset;
        while written < buf.len() {
            let block_index = pos / BLOCK_SIZE;
            let inner_offset = pos % BLOCK_SIZE;
            let len = (buf.len() - written).min(BLOCK_SIZE - inner_offset);
            let src = &buf[written..written + len];

            let block_id = self.bmap_alloc(block_index)?;
            let tag = self.inode.fs.cache.get(block_id as usize)?.lock().map_mut(
                0,
                |data: &mut DataBlock| {
                    data[inner_offset..inner_offset + len].copy_from_slice(src);
                    data.iter().fold(0u8, |tag, &b| tag ^ b)
                },
            );
            if checked {
                self.set_tag(block_index, tag)?;
            }

            written += len;
            pos += len;
        }

        if pos > self.size() {
            self.inner.disk.size = pos as u32;
            self.update()?;
        }

        Ok(written)
    }

    /// 在目录中查找名为 `name` 的子项，返回其 inode 编号
    pub fn dirlookup(&self, name: &str) -> Result<Option<u32>, Error> {
        Ok(self
            .find_entry(|entry| !entry.is_empty() && entry.name() == name)?
            .map(|(_, entry)| entry.inum as u32))
    }

    /// 在目录中添加子项
    pub fn dirlink(&mut self, name: &str, inum: u32) -> Result<(), Error> {
        if self.dirlookup(name)?.is_some() {
            return Err(Error::AlreadyExists);
        }
        // 目录项只有 16 位存放 inode 编号
        let inum = u16::try_from(inum).map_err(|_| {
            log::error!("dirlink: inode {inum} does not fit in a dir entry");
            Error::NoSpace
        })?;

        let offset = self
            .find_entry(DirEntry::is_empty)?
            .map_or(self.size(), |(offset, _)| offset);
        self.write_at(offset, &DirEntry::new(name, inum).to_bytes())?;
        Ok(())
    }
}

impl InodeGuard<'_> {
    fn find_entry(
        &self,
        mut pred: impl FnMut(&DirEntry) -> bool,
    ) -> Result<Option<(usize, DirEntry)>, Error> {
        if self.kind() != InodeKind::Directory {
            return Err(Error::NotADirectory);
        }

        let mut bytes = [0; DIRENT_SIZE];
        for offset in (0..self.size()).step_by(DIRENT_SIZE) {
            if self.read_at(offset, &mut bytes)? != DIRENT_SIZE {
                break;
            }
            let entry = DirEntry::from_bytes(&bytes);
            if pred(&entry) {
                return Ok(Some((offset, entry)));
            }
        }
        Ok(None)
    }

    /// 把文件内的块索引映射为块号，未分配时返回 `None`
    fn bmap(&self, block_index: usize) -> Result<Option<u32>, Error> {
        let addrs = self.addrs();
        if block_index < NDIRECT {
            let block_id = addrs[block_index] & ADDR_MASK;
            return Ok((block_id != 0).then_some(block_id));
        }

        let index = block_index - NDIRECT;
        if index >= NINDIRECT {
            return Err(Error::FileTooLarge);
        }
        let indirect = addrs[NDIRECT] & ADDR_MASK;
        if indirect == 0 {
            return Ok(None);
        }
        let block_id = self.read_indirect(indirect)?[index] & ADDR_MASK;
        Ok((block_id != 0).then_some(block_id))
    }

    fn bmap_alloc(&mut self, block_index: usize) -> Result<u32, Error> {
        if let Some(block_id) = self.bmap(block_index)? {
            return Ok(block_id);
        }

        let fs = self.inode.fs.clone();
        if block_index < NDIRECT {
            let block_id = fs.balloc()?;
            self.inner.disk.addrs[block_index] = block_id;
            self.update()?;
            return Ok(block_id);
        }

        let mut indirect = self.addrs()[NDIRECT] & ADDR_MASK;
        if indirect == 0 {
            indirect = fs.balloc()?;
            self.inner.disk.addrs[NDIRECT] = indirect;
            self.update()?;
        }

        // 分配新块会访问位图块，不能在持有索引块时进行
        let block_id = fs.balloc()?;
        fs.cache
            .get(indirect as usize)?
            .lock()
            .map_mut(0, |entries: &mut IndirectBlock| {
                entries[block_index - NDIRECT] = block_id
            });
        Ok(block_id)
    }

    /// 更新块指针的标签
    fn set_tag(&mut self, block_index: usize, tag: u8) -> Result<(), Error> {
        let tagged = |ptr: u32| (ptr & ADDR_MASK) | (tag as u32) << 24;

        if block_index < NDIRECT {
            let ptr = &mut self.inner.disk.addrs[block_index];
            *ptr = tagged(*ptr);
            return self.update();
        }

        let indirect = self.addrs()[NDIRECT] & ADDR_MASK;
        self.inode
            .fs
            .cache
            .get(indirect as usize)?
            .lock()
            .map_mut(0, |entries: &mut IndirectBlock| {
                let ptr = &mut entries[block_index - NDIRECT];
                *ptr = tagged(*ptr);
            });
        Ok(())
    }

    /// 把内存中的节点写回块缓存
    fn update(&self) -> Result<(), Error> {
        self.inode.fs.write_disk_inode(self.inode.inum, &self.inner.disk)
    }
}
