//! 管道：定长环形缓冲区，一端读一端写。
//!
//! 读空、写满时原地自旋等待对端，直到对端取走/写入数据或关闭。

use core::hint;

use spin::Mutex;
use vfs::Error;

use crate::config::PIPE_SIZE;

#[derive(Debug)]
pub struct Pipe {
    inner: Mutex<PipeInner>,
}

#[derive(Debug)]
struct PipeInner {
    buffer: RingBuffer,
    read_open: bool,
    write_open: bool,
}

#[derive(Debug)]
struct RingBuffer {
    base: [u8; PIPE_SIZE],
    head: usize,
    tail: usize,
    status: RingBufferStatus,
}

#[derive(Debug, PartialEq, Eq)]
enum RingBufferStatus {
    Full,
    Empty,
    Normal,
}

impl Pipe {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PipeInner {
                buffer: RingBuffer::new(),
                read_open: true,
                write_open: true,
            }),
        }
    }

    /// 读出当前可读的数据，至多 `buf.len()` 字节；
    /// 缓冲区为空且写端已关闭时返回 0
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let mut inner = self.inner.lock();
            let readables = inner.buffer.readables();

            if readables == 0 {
                if !inner.write_open {
                    return Ok(0);
                }
                drop(inner);
                hint::spin_loop();
                continue;
            }

            let len = readables.min(buf.len());
            for byte in &mut buf[..len] {
                *byte = inner.buffer.pop();
            }
            return Ok(len);
        }
    }

    /// 写入全部数据；读端关闭后写入失败
    pub fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        let mut written = 0;

        while written < buf.len() {
            let mut inner = self.inner.lock();
            if !inner.read_open {
                return Err(Error::BrokenPipe);
            }

            let writables = inner.buffer.writables();
            if writables == 0 {
                // 已满，等读端取走数据
                drop(inner);
                hint::spin_loop();
                continue;
            }

            let len = writables.min(buf.len() - written);
            for &byte in &buf[written..written + len] {
                inner.buffer.push(byte);
            }
            written += len;
        }

        Ok(written)
    }

    /// 关闭一端
    pub fn close(&self, writable: bool) {
        let mut inner = self.inner.lock();
        if writable {
            inner.write_open = false;
        } else {
            inner.read_open = false;
        }
        log::trace!(
            "pipe close: read_open={} write_open={}",
            inner.read_open,
            inner.write_open
        );
    }

    #[inline]
    pub fn read_open(&self) -> bool {
        self.inner.lock().read_open
    }

    #[inline]
    pub fn write_open(&self) -> bool {
        self.inner.lock().write_open
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

impl RingBuffer {
    const CAP: usize = PIPE_SIZE;

    const fn new() -> Self {
        Self {
            base: [0; PIPE_SIZE],
            head: 0,
            tail: 0,
            status: RingBufferStatus::Empty,
        }
    }

    fn readables(&self) -> usize {
        if self.status == RingBufferStatus::Empty {
            0
        } else if self.tail > self.head {
            self.tail - self.head
        } else {
            self.tail + Self::CAP - self.head
        }
    }

    fn writables(&self) -> usize {
        if self.status == RingBufferStatus::Full {
            0
        } else {
            Self::CAP - self.readables()
        }
    }

    fn pop(&mut self) -> u8 {
        let byte = self.base[self.head];
        self.head = (self.head + 1) % Self::CAP;

        self.status = if self.head == self.tail {
            RingBufferStatus::Empty
        } else {
            RingBufferStatus::Normal
        };

        byte
    }

    fn push(&mut self, byte: u8) {
        self.base[self.tail] = byte;
        self.tail = (self.tail + 1) % Self::CAP;

        self.status = if self.tail == self.head {
            RingBufferStatus::Full
        } else {
            RingBufferStatus::Normal
        };
    }
}
