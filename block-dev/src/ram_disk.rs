use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::{BlockDevice, Error};

/// 内存上的块设备
#[derive(Debug)]
pub struct RamDisk {
    block_size: usize,
    data: Mutex<Vec<u8>>,
}

impl RamDisk {
    pub fn new(block_size: usize, total_blocks: usize) -> Self {
        Self {
            block_size,
            data: Mutex::new(vec![0; block_size * total_blocks]),
        }
    }

    #[inline]
    pub fn total_blocks(&self) -> usize {
        self.data.lock().len() / self.block_size
    }

    fn range(&self, block_id: usize, len: usize) -> Result<core::ops::Range<usize>, Error> {
        if len != self.block_size {
            return Err(Error::Device(block_id));
        }
        if block_id >= self.total_blocks() {
            return Err(Error::OutOfRange(block_id));
        }
        let start = block_id * self.block_size;
        Ok(start..start + self.block_size)
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error> {
        let range = self.range(block_id, buf.len())?;
        buf.copy_from_slice(&self.data.lock()[range]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error> {
        let range = self.range(block_id, buf.len())?;
        self.data.lock()[range].copy_from_slice(buf);
        Ok(())
    }
}
