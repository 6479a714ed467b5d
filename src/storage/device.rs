//! 存储后端核心类型

use crate::error::Result;
use alloc::vec::Vec;
use bitflags::bitflags;

bitflags! {
    /// 后端可选能力
    ///
    /// 缓存通过 [`Storage::capabilities`] 检测后端是否提供这些能力，
    /// 只有声明了对应标志的能力才会被调用。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StorageCaps: u8 {
        /// 后端自身有需要刷新的缓冲（如 fsync）
        const FLUSH = 0x01;
    }
}

/// 流式数据接收端
///
/// [`Storage::read_into`] 将后端数据依次推送到这里。
pub trait ByteSink {
    /// 接收一段数据，必须全部消费
    fn accept(&mut self, data: &[u8]) -> Result<()>;
}

/// 流式数据来源
///
/// [`Storage::write_from`] 从这里拉取数据直到返回 0。
pub trait ByteSource {
    /// 填充 `buf`，返回写入的字节数；返回 0 表示数据已耗尽
    fn supply(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl ByteSink for Vec<u8> {
    fn accept(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}

impl ByteSource for &[u8] {
    fn supply(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.len());
        let (head, tail) = self.split_at(n);
        buf[..n].copy_from_slice(head);
        *self = tail;
        Ok(n)
    }
}

/// 随机访问字节存储接口
///
/// 实现此 trait 以作为块缓存的后端。语义类似带游标的文件：
/// `read`/`write` 从当前位置开始并推进位置。
///
/// # 示例
///
/// ```rust,ignore
/// use bcache_core::{Storage, StorageCaps, ByteSink, ByteSource, Result};
///
/// struct MyStorage {
///     // ...
/// }
///
/// impl Storage for MyStorage {
///     fn size(&self) -> Result<u64> {
///         // 返回当前长度
///         Ok(0)
///     }
///
///     fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
///         // 从当前位置读取，仅在文件结尾处允许短读
///         Ok(0)
///     }
///
///     // ...
/// }
/// ```
pub trait Storage {
    /// 当前长度（字节）
    fn size(&self) -> Result<u64>;

    /// 截断或扩展到 `size` 字节
    ///
    /// 扩展出来的区域应填零。
    fn set_size(&mut self, size: u64) -> Result<()>;

    /// 当前读写位置
    fn position(&self) -> u64;

    /// 设置读写位置（允许超过当前长度）
    fn set_position(&mut self, pos: u64) -> Result<()>;

    /// 从当前位置读取
    ///
    /// # 返回
    ///
    /// 实际读取的字节数。只有到达文件结尾时才允许少于 `buf.len()`，
    /// 位于结尾或之后时返回 0。
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// 在当前位置写入全部 `buf`，必要时扩展长度
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// 将当前位置到结尾的全部数据推送给 `sink`
    ///
    /// # 返回
    ///
    /// 传输的字节数，位置推进相同的量
    fn read_into(&mut self, sink: &mut dyn ByteSink) -> Result<u64>;

    /// 从 `source` 拉取数据写入当前位置，直到数据耗尽
    ///
    /// # 返回
    ///
    /// 传输的字节数，位置推进相同的量
    fn write_from(&mut self, source: &mut dyn ByteSource) -> Result<u64>;

    /// 关闭后端，释放资源
    fn close(&mut self) -> Result<()>;

    /// 后端声明的可选能力
    fn capabilities(&self) -> StorageCaps {
        StorageCaps::empty()
    }

    /// 刷新后端自身的缓冲
    ///
    /// 只有 [`StorageCaps::FLUSH`] 被声明时才会被缓存调用。
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn size(&self) -> Result<u64> {
        (**self).size()
    }

    fn set_size(&mut self, size: u64) -> Result<()> {
        (**self).set_size(size)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn set_position(&mut self, pos: u64) -> Result<()> {
        (**self).set_position(pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write(buf)
    }

    fn read_into(&mut self, sink: &mut dyn ByteSink) -> Result<u64> {
        (**self).read_into(sink)
    }

    fn write_from(&mut self, source: &mut dyn ByteSource) -> Result<u64> {
        (**self).write_from(source)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn capabilities(&self) -> StorageCaps {
        (**self).capabilities()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_source_drains() {
        let data = [1u8, 2, 3, 4, 5];
        let mut source: &[u8] = &data;
        let mut buf = [0u8; 3];

        assert_eq!(source.supply(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(source.supply(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        // 耗尽后返回 0
        assert_eq!(source.supply(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_vec_sink_appends() {
        let mut sink = Vec::new();
        sink.accept(b"abc").unwrap();
        sink.accept(b"de").unwrap();
        assert_eq!(&sink[..], b"abcde");
    }

    #[test]
    fn test_caps_default_empty() {
        assert!(StorageCaps::empty().is_empty());
        assert!(StorageCaps::FLUSH.contains(StorageCaps::FLUSH));
    }
}
