//! # 磁盘块管理器层
//!
//! 构建出磁盘的布局并使用：格式化、加载、分配数据块与索引节点。

use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};

use block_dev::BlockDevice;
use spin::Mutex;
use vfs::{Error, InodeKind};

use crate::block_cache::BlockCacheManager;
use crate::layout::*;
use crate::{ADDR_MASK, BLOCK_BITS, BLOCK_SIZE, DataBlock, Inode, ROOT_INUM};

#[derive(Debug)]
pub struct MiniFs {
    /// 设备号
    dev: u32,
    pub(crate) cache: BlockCacheManager,
    sb: SuperBlock,
    /// 内存中的索引节点，同一编号只存在一个 [`Inode`]，
    /// 因而打开同一文件的各方共用一把节点锁
    inodes: Mutex<BTreeMap<u32, Weak<Inode>>>,
}

impl MiniFs {
    pub fn format(
        dev: u32,
        device: Arc<dyn BlockDevice>,
        total_blocks: u32,
        ninodes: u32,
    ) -> Result<Arc<Self>, Error> {
        let inode_start = 2;
        let inode_blocks = ninodes.div_ceil(INODES_PER_BLOCK as u32);
        let bmap_start = inode_start + inode_blocks;
        let data_total = total_blocks.saturating_sub(bmap_start);
        let bmap_blocks = (data_total + BLOCK_BITS as u32) / (BLOCK_BITS as u32 + 1);
        let data_start = bmap_start + bmap_blocks;

        let sb = SuperBlock::new(total_blocks, ninodes, inode_start, bmap_start, data_start);
        if !sb.is_valid() || total_blocks > ADDR_MASK {
            log::error!("cannot format {total_blocks} blocks with {ninodes} inodes");
            return Err(Error::InvalidImage);
        }

        let zero: DataBlock = [0; BLOCK_SIZE];
        for block_id in 0..total_blocks as usize {
            device.write_block(block_id, &zero)?;
        }

        let fs = Arc::new(Self::new(dev, device, sb));
        fs.cache
            .get(1)?
            .lock()
            .map_mut(0, |super_block: &mut SuperBlock| *super_block = sb);

        let root = fs.ialloc(InodeKind::Directory)?;
        debug_assert_eq!(root.inum(), ROOT_INUM);
        fs.sync()?;
        log::debug!("formatted dev {dev}: {sb:?}");

        Ok(fs)
    }

    pub fn open(dev: u32, device: Arc<dyn BlockDevice>) -> Result<Arc<Self>, Error> {
        let cache = BlockCacheManager::new(device.clone());
        let sb = cache
            .get(1)?
            .lock()
            .map(0, |super_block: &SuperBlock| *super_block);
        if !sb.is_valid() {
            log::error!("dev {dev} has no valid superblock");
            return Err(Error::InvalidImage);
        }

        Ok(Arc::new(Self {
            dev,
            cache,
            sb,
            inodes: Mutex::default(),
        }))
    }

    fn new(dev: u32, device: Arc<dyn BlockDevice>, sb: SuperBlock) -> Self {
        Self {
            dev,
            cache: BlockCacheManager::new(device),
            sb,
            inodes: Mutex::default(),
        }
    }

    #[inline]
    pub fn dev(&self) -> u32 {
        self.dev
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        self.cache.device()
    }

    /// 获取内存中的索引节点，不读盘；节点内容在首次上锁时加载
    pub fn iget(self: &Arc<Self>, inum: u32) -> Arc<Inode> {
        let mut inodes = self.inodes.lock();
        if let Some(inode) = inodes.get(&inum).and_then(Weak::upgrade) {
            return inode;
        }

        inodes.retain(|_, inode| inode.strong_count() > 0);
        let inode = Arc::new(Inode::new(inum, self.clone()));
        inodes.insert(inum, Arc::downgrade(&inode));
        inode
    }

    #[inline]
    pub fn root(self: &Arc<Self>) -> Arc<Inode> {
        self.iget(ROOT_INUM)
    }

    /// 在磁盘上分配新的 inode
    pub fn ialloc(self: &Arc<Self>, kind: InodeKind) -> Result<Arc<Inode>, Error> {
        for inum in ROOT_INUM..self.sb.ninodes {
            let (block_id, offset) = self.disk_inode_pos(inum);
            let claimed = self.cache.get(block_id)?.lock().map_mut(
                offset,
                |disk_inode: &mut DiskInode| {
                    let free = disk_inode.is_free();
                    if free {
                        disk_inode.init(kind);
                    }
                    free
                },
            );
            if claimed {
                log::trace!("ialloc: inum={inum} kind={kind:?}");
                return Ok(self.iget(inum));
            }
        }

        log::warn!("dev {}: out of inodes", self.dev);
        Err(Error::NoSpace)
    }

    /// 在磁盘上分配一个清零的数据块并返回其块号
    pub fn balloc(&self) -> Result<u32, Error> {
        let data_blocks = (self.sb.size - self.sb.data_start) as usize;
        let bmap_blocks = (self.sb.data_start - self.sb.bmap_start) as usize;

        for i in 0..bmap_blocks {
            let base = i * BLOCK_BITS;
            let bits = data_blocks.saturating_sub(base).min(BLOCK_BITS);
            let found = self
                .cache
                .get(self.sb.bmap_start as usize + i)?
                .lock()
                .map_mut(0, |bitmap: &mut DataBlock| {
                    let bit = (0..bits).find(|bit| bitmap[bit / 8] & (1 << (bit % 8)) == 0)?;
                    bitmap[bit / 8] |= 1 << (bit % 8);
                    Some(bit)
                });

            if let Some(bit) = found {
                let block_id = self.sb.data_start + (base + bit) as u32;
                self.cache
                    .get(block_id as usize)?
                    .lock()
                    .map_mut(0, |data: &mut DataBlock| data.fill(0));
                return Ok(block_id);
            }
        }

        log::warn!("dev {}: out of data blocks", self.dev);
        Err(Error::NoSpace)
    }

    /// 经块缓存读取整块
    pub fn bread<V>(&self, block_id: u32, f: impl FnOnce(&DataBlock) -> V) -> Result<V, Error> {
        Ok(self.cache.get(block_id as usize)?.lock().map(0, f))
    }

    pub fn sync(&self) -> Result<(), Error> {
        self.cache.sync_all()
    }

    /// 按路径查找，路径相对于根目录，`/` 分隔，空段被忽略
    pub fn namei(self: &Arc<Self>, path: &str) -> Result<Arc<Inode>, Error> {
        let mut inode = self.root();
        for name in path.split('/').filter(|name| !name.is_empty()) {
            let inum = {
                let dir = inode.lock()?;
                dir.dirlookup(name)?.ok_or(Error::NotFound)?
            };
            inode = self.iget(inum);
        }
        Ok(inode)
    }

    pub(crate) fn read_disk_inode(&self, inum: u32) -> Result<DiskInode, Error> {
        if inum >= self.sb.ninodes {
            return Err(Error::NotFound);
        }
        let (block_id, offset) = self.disk_inode_pos(inum);
        Ok(self
            .cache
            .get(block_id)?
            .lock()
            .map(offset, |disk_inode: &DiskInode| *disk_inode))
    }

    pub(crate) fn write_disk_inode(&self, inum: u32, disk_inode: &DiskInode) -> Result<(), Error> {
        let (block_id, offset) = self.disk_inode_pos(inum);
        self.cache
            .get(block_id)?
            .lock()
            .map_mut(offset, |slot: &mut DiskInode| *slot = *disk_inode);
        Ok(())
    }

    /// 通过ID获取 inode 在磁盘上的位置：**块ID**以及**块内偏移**
    fn disk_inode_pos(&self, inum: u32) -> (usize, usize) {
        let block_id = self.sb.inode_start as usize + inum as usize / INODES_PER_BLOCK;
        let offset = inum as usize % INODES_PER_BLOCK * INODE_SIZE;
        (block_id, offset)
    }
}
