//! 内存后端

use super::{ByteSink, ByteSource, Storage};
use crate::consts::STREAM_CHUNK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;

/// 基于 `Vec<u8>` 的后端
///
/// 扩展长度时填零；位置可以超过当前长度，之后的写入会先填零到该位置。
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    data: Vec<u8>,
    pos: u64,
    closed: bool,
}

/// 将 64 位长度转换为内存下标
fn to_index(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::new(ErrorKind::NoSpace, "Size exceeds addressable memory"))
}

impl MemoryStorage {
    /// 创建空的内存后端
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用已有数据创建，位置为 0
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            closed: false,
        }
    }

    /// 当前内容
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// 取出全部内容
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// 是否已被关闭
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 调整数据长度，扩展部分填零；内存不足时返回 `NoSpace` 而不是中止
    fn resize_to(&mut self, size: usize) -> Result<()> {
        if size > self.data.len() {
            self.data
                .try_reserve(size - self.data.len())
                .map_err(|_| Error::new(ErrorKind::NoSpace, "Cannot grow memory storage"))?;
        }
        self.data.resize(size, 0);
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn set_size(&mut self, size: u64) -> Result<()> {
        let size = to_index(size)?;
        self.resize_to(size)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn set_position(&mut self, pos: u64) -> Result<()> {
        self.pos = pos;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let len = self.data.len() as u64;
        if self.pos >= len {
            return Ok(0);
        }
        let start = self.pos as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        let start = to_index(self.pos)?;
        let end = start
            .checked_add(buf.len())
            .ok_or(Error::new(ErrorKind::InvalidInput, "Write range overflows"))?;
        if end > self.data.len() {
            self.resize_to(end)?;
        }
        self.data[start..end].copy_from_slice(buf);
        self.pos = end as u64;
        Ok(())
    }

    fn read_into(&mut self, sink: &mut dyn ByteSink) -> Result<u64> {
        let len = self.data.len() as u64;
        if self.pos >= len {
            return Ok(0);
        }
        let start = self.pos as usize;
        sink.accept(&self.data[start..])?;
        let n = len - self.pos;
        self.pos = len;
        Ok(n)
    }

    fn write_from(&mut self, source: &mut dyn ByteSource) -> Result<u64> {
        let mut chunk = alloc::vec![0u8; STREAM_CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = source.supply(&mut chunk)?;
            if n == 0 {
                break;
            }
            self.write(&chunk[..n])?;
            total += n as u64;
        }
        Ok(total)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut storage = MemoryStorage::new();
        storage.write(b"hello").unwrap();
        assert_eq!(storage.position(), 5);
        assert_eq!(storage.size().unwrap(), 5);

        storage.set_position(1).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(storage.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"ell");
    }

    #[test]
    fn test_short_read_at_eof() {
        let mut storage = MemoryStorage::from_vec(b"abc".to_vec());
        storage.set_position(2).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(storage.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'c');
        assert_eq!(storage.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let mut storage = MemoryStorage::from_vec(b"ab".to_vec());
        storage.set_position(4).unwrap();
        storage.write(b"z").unwrap();
        assert_eq!(storage.as_slice(), b"ab\0\0z");
    }

    #[test]
    fn test_set_size_grow_and_shrink() {
        let mut storage = MemoryStorage::from_vec(b"abcdef".to_vec());
        storage.set_size(3).unwrap();
        assert_eq!(storage.as_slice(), b"abc");

        storage.set_size(5).unwrap();
        assert_eq!(storage.as_slice(), b"abc\0\0");
    }

    #[test]
    fn test_stream_passthrough() {
        let mut storage = MemoryStorage::new();
        let payload = alloc::vec![7u8; STREAM_CHUNK_SIZE * 2 + 10];
        let mut source: &[u8] = &payload;
        assert_eq!(storage.write_from(&mut source).unwrap(), payload.len() as u64);

        storage.set_position(10).unwrap();
        let mut sink = Vec::new();
        assert_eq!(storage.read_into(&mut sink).unwrap(), payload.len() as u64 - 10);
        assert_eq!(sink.len(), payload.len() - 10);
        assert_eq!(storage.position(), payload.len() as u64);
    }

    #[test]
    fn test_huge_growth_reports_no_space() {
        let mut storage = MemoryStorage::from_vec(b"abc".to_vec());

        let err = storage.set_size(1 << 62).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSpace);
        assert_eq!(storage.as_slice(), b"abc");

        storage.set_position(1 << 62).unwrap();
        let err = storage.write(b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSpace);
        assert_eq!(storage.as_slice(), b"abc");
    }

    #[test]
    fn test_close() {
        let mut storage = MemoryStorage::new();
        assert!(!storage.is_closed());
        storage.close().unwrap();
        assert!(storage.is_closed());
    }
}
