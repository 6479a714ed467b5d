//! 文件后端（需要 `std` feature）

use super::{ByteSink, ByteSource, Storage, StorageCaps};
use crate::consts::STREAM_CHUNK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// 基于 `std::fs::File` 的后端
///
/// 位置由本结构维护，每次读写前显式 seek，因此可以与其他持有者共享文件句柄。
/// `set_size` 使用 `File::set_len`，扩展区域由操作系统填零。
#[derive(Debug)]
pub struct FileStorage {
    file: Option<File>,
    pos: u64,
}

impl FileStorage {
    /// 以读写方式打开文件，不存在时创建
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self::from_file(file))
    }

    /// 包装已打开的文件，位置为 0
    pub fn from_file(file: File) -> Self {
        Self {
            file: Some(file),
            pos: 0,
        }
    }

    fn file(&self) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or(Error::new(ErrorKind::InvalidState, "File storage is closed"))
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or(Error::new(ErrorKind::InvalidState, "File storage is closed"))
    }

    /// seek 到当前位置并返回文件句柄
    fn seeked(&mut self) -> Result<&mut File> {
        let pos = self.pos;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(pos))?;
        Ok(file)
    }
}

impl Storage for FileStorage {
    fn size(&self) -> Result<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    fn set_size(&mut self, size: u64) -> Result<()> {
        self.file_mut()?.set_len(size)?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn set_position(&mut self, pos: u64) -> Result<()> {
        self.pos = pos;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self.seeked()?;
        // 操作系统可能短读，循环直到读满或到达结尾
        let mut done = 0;
        while done < buf.len() {
            match file.read(&mut buf[done..]) {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.pos += done as u64;
        Ok(done)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.seeked()?.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn read_into(&mut self, sink: &mut dyn ByteSink) -> Result<u64> {
        let mut chunk = alloc::vec![0u8; STREAM_CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            sink.accept(&chunk[..n])?;
            total += n as u64;
        }
        Ok(total)
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
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    fn capabilities(&self) -> StorageCaps {
        StorageCaps::FLUSH
    }

    fn flush(&mut self) -> Result<()> {
        let file = self.file_mut()?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}

/// 将任意 `std::io::Write` 适配为 [`ByteSink`]
pub struct IoSink<W: Write>(pub W);

impl<W: Write> ByteSink for IoSink<W> {
    fn accept(&mut self, data: &[u8]) -> Result<()> {
        self.0.write_all(data)?;
        Ok(())
    }
}

/// 将任意 `std::io::Read` 适配为 [`ByteSource`]
pub struct IoSource<R: Read>(pub R);

impl<R: Read> ByteSource for IoSource<R> {
    fn supply(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.0.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::vec::Vec;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(std::format!("bcache_core_{}_{}", std::process::id(), name));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn test_file_read_write() {
        let path = temp_path("rw");
        let mut storage = FileStorage::open(&path).unwrap();

        storage.write(b"0123456789").unwrap();
        assert_eq!(storage.size().unwrap(), 10);

        storage.set_position(3).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(storage.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"3456");
        assert_eq!(storage.position(), 7);

        storage.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_file_set_size_zero_extends() {
        let path = temp_path("grow");
        let mut storage = FileStorage::open(&path).unwrap();

        storage.write(b"ab").unwrap();
        storage.set_size(5).unwrap();
        storage.set_position(0).unwrap();

        let mut buf = [0xffu8; 8];
        assert_eq!(storage.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"ab\0\0\0");

        storage.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_file_closed_reports_state() {
        let path = temp_path("closed");
        let mut storage = FileStorage::open(&path).unwrap();
        storage.close().unwrap();

        let err = storage.size().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_io_adapters() {
        let path = temp_path("adapters");
        let mut storage = FileStorage::open(&path).unwrap();

        let mut source = IoSource(std::io::Cursor::new(b"streamed".to_vec()));
        assert_eq!(storage.write_from(&mut source).unwrap(), 8);

        storage.set_position(0).unwrap();
        let mut sink = IoSink(Vec::new());
        assert_eq!(storage.read_into(&mut sink).unwrap(), 8);
        assert_eq!(&sink.0[..], b"streamed");

        storage.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
