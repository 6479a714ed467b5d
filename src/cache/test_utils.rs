//! 测试用后端

use crate::error::{Error, ErrorKind, Result};
use crate::storage::{ByteSink, ByteSource, MemoryStorage, Storage, StorageCaps};
use alloc::vec::Vec;

/// 记录每次写入边界的内存后端
///
/// `size_lie` 让后端报告比实际数据更长的长度，用于构造不一致状态。
pub(crate) struct RecordingStorage {
    pub inner: MemoryStorage,
    /// 每次 write 的 (偏移, 长度)
    pub writes: Vec<(u64, usize)>,
    pub flushes: usize,
    pub caps: StorageCaps,
    /// 接下来这么多次 write 返回 `Io` 错误
    pub fail_writes: usize,
    /// 接下来这么多次 read 返回 `Io` 错误
    pub fail_reads: usize,
    size_lie: u64,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            inner: MemoryStorage::from_vec(data),
            writes: Vec::new(),
            flushes: 0,
            caps: StorageCaps::FLUSH,
            fail_writes: 0,
            fail_reads: 0,
            size_lie: 0,
        }
    }

    pub fn lying(data: Vec<u8>, extra: u64) -> Self {
        let mut storage = Self::from_vec(data);
        storage.size_lie = extra;
        storage
    }
}

impl Storage for RecordingStorage {
    fn size(&self) -> Result<u64> {
        Ok(self.inner.size()? + self.size_lie)
    }

    fn set_size(&mut self, size: u64) -> Result<()> {
        self.inner.set_size(size)
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn set_position(&mut self, pos: u64) -> Result<()> {
        self.inner.set_position(pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(Error::new(ErrorKind::Io, "Injected read failure"));
        }
        self.inner.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(Error::new(ErrorKind::Io, "Injected write failure"));
        }
        self.writes.push((self.inner.position(), buf.len()));
        self.inner.write(buf)
    }

    fn read_into(&mut self, sink: &mut dyn ByteSink) -> Result<u64> {
        self.inner.read_into(sink)
    }

    fn write_from(&mut self, source: &mut dyn ByteSource) -> Result<u64> {
        self.inner.write_from(source)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn capabilities(&self) -> StorageCaps {
        self.caps
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
