use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use block_dev::{BlockDevice, Error};
use mini_fs::BLOCK_SIZE;

/// 以宿主机上的镜像文件充当块设备
#[derive(Debug)]
pub struct BlockFile(Mutex<File>);

impl BlockFile {
    pub fn new(fd: File) -> Self {
        Self(Mutex::new(fd))
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error> {
        let mut file = self.0.lock().map_err(|_| Error::Device(block_id))?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .and_then(|_| file.read_exact(buf))
            .map_err(|err| io_error(block_id, err))
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error> {
        let mut file = self.0.lock().map_err(|_| Error::Device(block_id))?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .and_then(|_| file.write_all(buf))
            .map_err(|err| io_error(block_id, err))
    }
}

fn io_error(block_id: usize, err: io::Error) -> Error {
    log::error!("block {block_id}: {err}");
    match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::OutOfRange(block_id),
        _ => Error::Device(block_id),
    }
}
