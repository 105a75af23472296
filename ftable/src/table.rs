//! # 打开文件表
//!
//! 表锁只保护各表项的引用计数与类型。关闭时若引用计数归零，
//! 先在锁内取出并清空表项，放锁后才真正关闭管道或释放索引节点，
//! 所以表锁从不在可能阻塞的操作中被持有。
//!
//! 偏移量不受表锁保护，只由正在读写该表项的一方在持有节点锁时推进。
//! 经复制共享同一表项的多方若并发读写，偏移量的推进顺序是不确定的。

use alloc::sync::Arc;
use core::array;
use core::sync::atomic::{AtomicUsize, Ordering};

use derive_more::Into;
use enumflags2::BitFlags;
use mini_fs::Inode;
use spin::Mutex;
use vfs::{Error, InodeKind, Stat};

use crate::checksum::checksum;
use crate::config::NFILE;
use crate::file::Slot;
use crate::{DeviceTable, FileKind, OpenFlag, Pipe};

/// 打开文件表中一项的引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Into)]
pub struct Handle(usize);

/// 定长的打开文件表，由持有者创建一次，以引用传给各使用方
#[derive(Debug)]
pub struct FileTable<const N: usize = NFILE> {
    slots: Mutex<[Slot; N]>,
    offsets: [AtomicUsize; N],
    devices: DeviceTable,
}

/// 放锁后读写所需的表项快照
struct Snapshot {
    kind: FileKind,
    readable: bool,
    writable: bool,
}

enum Io<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

impl<const N: usize> FileTable<N> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(array::from_fn(|_| Slot::default())),
            offsets: array::from_fn(|_| AtomicUsize::new(0)),
            devices: DeviceTable::new(),
        }
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn devices(&self) -> &DeviceTable {
        &self.devices
    }

    /// 按下标从小到大找到第一个空闲表项，引用计数置 1
    pub fn allocate(&self) -> Result<Handle, Error> {
        let mut slots = self.slots.lock();
        let Some(index) = slots.iter().position(|slot| slot.refs == 0) else {
            log::warn!("file table exhausted ({N} slots)");
            return Err(Error::ResourceExhausted);
        };
        slots[index].refs = 1;
        log::trace!("allocate: slot {index}");

        Ok(Handle(index))
    }

    /// 为刚分配的表项装入资源与读写属性，偏移量归零
    pub fn install(
        &self,
        handle: Handle,
        kind: FileKind,
        readable: bool,
        writable: bool,
    ) -> Result<(), Error> {
        let mut slots = self.slots.lock();
        let slot = Self::live_slot(&mut slots, handle, "install")?;
        if !matches!(slot.kind, FileKind::None) {
            log::error!("install: slot {} already holds {:?}", handle.0, slot.kind);
            return Err(Error::InvariantViolation("install"));
        }

        slot.kind = kind;
        slot.readable = readable;
        slot.writable = writable;
        self.offsets[handle.0].store(0, Ordering::Relaxed);

        Ok(())
    }

    /// 分配表项并装入资源
    pub fn open(&self, kind: FileKind, flags: BitFlags<OpenFlag>) -> Result<Handle, Error> {
        let [readable, writable] = OpenFlag::access(flags);
        let handle = self.allocate()?;
        self.install(handle, kind, readable, writable)?;
        Ok(handle)
    }

    /// 创建管道，返回读端与写端
    pub fn pipe(&self) -> Result<(Handle, Handle), Error> {
        let read_end = self.allocate()?;
        let write_end = match self.allocate() {
            Ok(handle) => handle,
            Err(err) => {
                self.close(read_end)?;
                return Err(err);
            }
        };

        let pipe = Arc::new(Pipe::new());
        self.install(read_end, FileKind::Pipe(pipe.clone()), true, false)?;
        self.install(write_end, FileKind::Pipe(pipe), false, true)?;

        Ok((read_end, write_end))
    }

    pub fn duplicate(&self, handle: Handle) -> Result<Handle, Error> {
        let mut slots = self.slots.lock();
        let slot = Self::live_slot(&mut slots, handle, "duplicate")?;
        slot.refs += 1;

        Ok(handle)
    }

    /// 引用计数减一；归零时清空表项，放锁后关闭管道或释放索引节点
    pub fn close(&self, handle: Handle) -> Result<(), Error> {
        let released = {
            let mut slots = self.slots.lock();
            let slot = Self::live_slot(&mut slots, handle, "close")?;
            slot.refs -= 1;
            if slot.refs > 0 {
                return Ok(());
            }
            core::mem::take(slot)
        };

        log::trace!("close: slot {} released {:?}", handle.0, released.kind);
        match released.kind {
            FileKind::None => {}
            FileKind::Pipe(pipe) => pipe.close(released.writable),
            // iput
            FileKind::Inode(inode) => drop(inode),
        }

        Ok(())
    }

    pub fn read(&self, handle: Handle, buf: &mut [u8]) -> Result<usize, Error> {
        let snapshot = self.snapshot(handle, "read")?;
        if !snapshot.readable {
            return Err(Error::PermissionDenied);
        }

        match snapshot.kind {
            FileKind::Pipe(pipe) => pipe.read(buf),
            FileKind::Inode(inode) => self.inode_io(handle, &inode, Io::Read(buf)),
            FileKind::None => Err(Self::violation(handle, "read")),
        }
    }

    pub fn write(&self, handle: Handle, buf: &[u8]) -> Result<usize, Error> {
        let snapshot = self.snapshot(handle, "write")?;
        if !snapshot.writable {
            return Err(Error::PermissionDenied);
        }

        match snapshot.kind {
            FileKind::Pipe(pipe) => pipe.write(buf),
            FileKind::Inode(inode) => self.inode_io(handle, &inode, Io::Write(buf)),
            FileKind::None => Err(Self::violation(handle, "write")),
        }
    }

    /// 查询元数据，校验文件的校验和在持有节点锁时计算
    pub fn stat(&self, handle: Handle) -> Result<Stat, Error> {
        let kind = self
            .slots
            .lock()
            .get(handle.0)
            .map(|slot| slot.kind.clone())
            .unwrap_or_default();
        let FileKind::Inode(inode) = kind else {
            return Err(Error::Unsupported);
        };

        let ip = inode.lock()?;
        let mut stat = ip.stat();
        if stat.kind == InodeKind::Checked {
            stat.checksum = checksum(ip.addrs(), |block_id| ip.read_indirect(block_id))?;
        }

        Ok(stat)
    }

    #[inline]
    pub fn ref_count(&self, handle: Handle) -> usize {
        self.slots.lock().get(handle.0).map_or(0, |slot| slot.refs)
    }

    /// 引用计数不为 0 的表项个数
    pub fn live(&self) -> usize {
        self.slots.lock().iter().filter(|slot| slot.refs > 0).count()
    }

    #[inline]
    pub fn offset(&self, handle: Handle) -> usize {
        self.offsets
            .get(handle.0)
            .map_or(0, |offset| offset.load(Ordering::Relaxed))
    }
}

impl<const N: usize> FileTable<N> {
    fn live_slot<'a>(
        slots: &'a mut [Slot; N],
        handle: Handle,
        op: &'static str,
    ) -> Result<&'a mut Slot, Error> {
        match slots.get_mut(handle.0) {
            Some(slot) if slot.refs >= 1 => Ok(slot),
            _ => Err(Self::violation(handle, op)),
        }
    }

    fn violation(handle: Handle, op: &'static str) -> Error {
        log::error!("{op}: slot {} is not a live file", handle.0);
        Error::InvariantViolation(op)
    }

    /// 在表锁内复制表项；读写已关闭的表项属于调用方的错误
    fn snapshot(&self, handle: Handle, op: &'static str) -> Result<Snapshot, Error> {
        match self.slots.lock().get(handle.0) {
            Some(slot) if slot.refs >= 1 => Ok(Snapshot {
                kind: slot.kind.clone(),
                readable: slot.readable,
                writable: slot.writable,
            }),
            _ => Err(Self::violation(handle, op)),
        }
    }

    /// 持节点锁读写索引节点，并按实际传输的字节数推进偏移量。
    /// 设备文件按主设备号转交设备表。
    fn inode_io(&self, handle: Handle, inode: &Inode, io: Io<'_>) -> Result<usize, Error> {
        let mut ip = inode.lock()?;
        let offset = &self.offsets[handle.0];

        let transferred = if ip.kind() == InodeKind::Device {
            let device = self.devices.get(ip.major())?;
            match io {
                Io::Read(buf) => device.read(buf)?,
                Io::Write(buf) => device.write(buf)?,
            }
        } else {
            let pos = offset.load(Ordering::Relaxed);
            match io {
                Io::Read(buf) => ip.read_at(pos, buf)?,
                Io::Write(buf) => ip.write_at(pos, buf)?,
            }
        };

        if transferred > 0 {
            offset.fetch_add(transferred, Ordering::Relaxed);
        }

        Ok(transferred)
    }
}

impl<const N: usize> Default for FileTable<N> {
    fn default() -> Self {
        Self::new()
    }
}
