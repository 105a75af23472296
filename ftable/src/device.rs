//! 设备表：主设备号到字符设备读写入口的映射。
//!
//! 类型为 [`InodeKind::Device`](vfs::InodeKind::Device) 的索引节点
//! 按其主设备号经此表转交驱动。

use alloc::sync::Arc;
use core::fmt::Debug;

use spin::Mutex;
use vfs::Error;

use crate::config::NDEV;

pub trait CharDevice: Debug + Send + Sync {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Error>;
    fn write(&self, buf: &[u8]) -> Result<usize, Error>;
}

#[derive(Debug)]
pub struct DeviceTable {
    devsw: Mutex<[Option<Arc<dyn CharDevice>>; NDEV]>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self {
            devsw: Mutex::new([const { None }; NDEV]),
        }
    }

    /// 登记驱动，覆盖同一主设备号上原有的驱动
    pub fn register(&self, major: u16, device: Arc<dyn CharDevice>) -> Result<(), Error> {
        let mut devsw = self.devsw.lock();
        let entry = devsw.get_mut(major as usize).ok_or(Error::NoDevice)?;
        if entry.replace(device).is_some() {
            log::debug!("device {major} re-registered");
        }
        Ok(())
    }

    pub fn unregister(&self, major: u16) -> Option<Arc<dyn CharDevice>> {
        self.devsw.lock().get_mut(major as usize)?.take()
    }

    pub fn get(&self, major: u16) -> Result<Arc<dyn CharDevice>, Error> {
        self.devsw
            .lock()
            .get(major as usize)
            .and_then(|device| device.clone())
            .ok_or(Error::NoDevice)
    }
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new()
    }
}
