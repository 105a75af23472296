//! # 块缓存层
//!
//! 文件系统对磁盘的一切访问都经由块缓存：块在首次访问时读入内存，
//! 修改只落在缓存上，直到同步或被换出时才写回设备。
//!
//! 每个 [`MiniFs`](crate::MiniFs) 持有自己的缓存管理器，不同设备的块互不干扰。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use block_dev::BlockDevice;
use spin::Mutex;
use vfs::Error;

use crate::{BLOCK_SIZE, DataBlock};

/// 块缓存管理器，容量有限，满时换出闲置块
#[derive(Debug)]
pub(crate) struct BlockCacheManager {
    dev: Arc<dyn BlockDevice>,
    /// (块号, 缓存)，按装入先后排列
    entries: Mutex<Vec<(usize, Arc<Mutex<BlockCache>>)>>,
}

/// 8字节对齐，保证块内的 `u32`/`u16` 字段可以直接引用
#[derive(Debug)]
#[repr(C, align(8))]
struct Aligned(DataBlock);

/// 一个磁盘块在内存中的副本
#[derive(Debug)]
pub(crate) struct BlockCache {
    data: Aligned,
    block_id: usize,
    dev: Arc<dyn BlockDevice>,
    /// 与设备上的内容不一致
    modified: bool,
}

impl BlockCache {
    fn new(block_id: usize, dev: Arc<dyn BlockDevice>) -> Result<Self, Error> {
        let mut data = Aligned([0; BLOCK_SIZE]);
        dev.read_block(block_id, &mut data.0)?;

        Ok(Self {
            data,
            block_id,
            dev,
            modified: false,
        })
    }

    pub fn sync(&mut self) -> Result<(), Error> {
        if self.modified {
            self.dev.write_block(self.block_id, &self.data.0)?;
            self.modified = false;
        }
        Ok(())
    }

    // `T` 只能是由整数构成的 `#[repr(C)]` 类型，任意比特模式都合法
    fn get<T: Sized>(&self, offset: usize) -> &T {
        assert!(mem::size_of::<T>() + offset <= BLOCK_SIZE);
        assert_eq!(offset % mem::align_of::<T>(), 0);
        let addr = self.data.0[offset..].as_ptr().cast::<T>();
        unsafe { &*addr }
    }

    fn get_mut<T: Sized>(&mut self, offset: usize) -> &mut T {
        assert!(mem::size_of::<T>() + offset <= BLOCK_SIZE);
        assert_eq!(offset % mem::align_of::<T>(), 0);
        self.modified = true;
        let addr = self.data.0[offset..].as_mut_ptr().cast::<T>();
        unsafe { &mut *addr }
    }

    #[inline]
    pub fn map<T: Sized, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get(offset))
    }

    #[inline]
    pub fn map_mut<T: Sized, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        f(self.get_mut(offset))
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        if let Err(err) = self.sync() {
            log::warn!("lost write-back of block {}: {err}", self.block_id);
        }
    }
}

impl BlockCacheManager {
    /// 常驻块数，被引用的块不计入换出
    const CAPACITY: usize = 16;

    pub fn new(dev: Arc<dyn BlockDevice>) -> Self {
        Self {
            dev,
            entries: Mutex::default(),
        }
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.dev
    }

    /// 取得块的缓存，必要时从设备读入
    pub fn get(&self, block_id: usize) -> Result<Arc<Mutex<BlockCache>>, Error> {
        let mut entries = self.entries.lock();

        if let Some(cache) = entries
            .iter()
            .find_map(|(id, cache)| (block_id == *id).then_some(cache))
        {
            return Ok(Arc::clone(cache));
        };

        // 触及上限，写回一个没有其它引用的块；
        // 全部块都在使用时暂时超出上限
        if entries.len() >= Self::CAPACITY {
            if let Some(index) = entries
                .iter()
                .position(|(_, cache)| Arc::strong_count(cache) == 1)
            {
                entries.remove(index);
            }
        }

        let block_cache = Arc::new(Mutex::new(BlockCache::new(block_id, self.dev.clone())?));
        entries.push((block_id, block_cache.clone()));

        Ok(block_cache)
    }

    pub fn sync_all(&self) -> Result<(), Error> {
        // 逐块同步前先放开表锁，持有块锁的一方可能正在等它
        let caches: Vec<_> = self
            .entries
            .lock()
            .iter()
            .map(|(_, cache)| cache.clone())
            .collect();

        caches.iter().try_for_each(|cache| cache.lock().sync())
    }
}
