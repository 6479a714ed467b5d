//! 块缓存读写路径

use super::block_cache::{check_request, BlockCache};
use crate::error::{Error, ErrorKind, Result};
use crate::storage::{ByteSink, ByteSource, Storage};

impl<S: Storage> BlockCache<S> {
    /// 从当前位置读取
    ///
    /// 请求覆盖的块先装入缓存再复制；装不下的部分直接从后端读取（缓存旁路）。
    ///
    /// # 返回
    ///
    /// 实际读取的字节数，位置推进相同的量。`buf` 为空或位置不小于文件长度时返回 0。
    ///
    /// # 示例
    ///
    /// ```rust,ignore
    /// let mut buf = [0u8; 100];
    /// cache.set_file_pointer(1024);
    /// let n = cache.read(&mut buf[10..60])?;
    /// ```
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open();
        if buf.is_empty() {
            return Ok(0);
        }
        check_request(self.file_pointer, buf.len())?;
        if self.file_pointer >= self.length {
            return Ok(0);
        }

        let len = (self.length - self.file_pointer).min(buf.len() as u64) as usize;
        self.stats.reads += 1;

        let blocks = self.nodes_spanning(self.file_pointer, len);
        self.fill_cache(blocks.clone())?;

        let mut done = 0;
        for block in blocks {
            if done == len {
                break;
            }
            let Some(node) = self.nodes.get(&block).copied() else {
                break;
            };
            let Some(index) = node.cache_index else {
                // 之后的块都没有驻留，一次读完剩余部分
                done += self.read_direct(&mut buf[done..len])?;
                break;
            };
            // 空洞之后的块也都在文件结尾之后
            let Some(valid) = node.length.valid() else {
                break;
            };

            let within = (self.file_pointer - self.block_start(block)) as usize;
            if within >= valid {
                break;
            }
            let n = (valid - within).min(len - done);
            let from = index + within;
            buf[done..done + n].copy_from_slice(&self.buffer[from..from + n]);
            done += n;
            self.file_pointer += n as u64;
        }
        Ok(done)
    }

    /// 在当前位置写入全部 `buf`
    ///
    /// 超过文件长度时先扩展文件。数据只写入缓存并标记脏块，
    /// 直到 flush、close 或缓存空间不足时才写回后端。
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.ensure_open();
        if buf.is_empty() {
            return Ok(());
        }
        let end = check_request(self.file_pointer, buf.len())?;
        self.stats.writes += 1;

        if end > self.length {
            self.set_len(end)?;
        }

        let len = buf.len();
        let bs = self.block_size as u64;
        let blocks = self.nodes_spanning(self.file_pointer, len);
        self.fill_cache(blocks.clone())?;

        let mut done = 0;
        for block in blocks {
            if done == len {
                break;
            }
            let Some(node) = self.nodes.get_mut(&block) else {
                break;
            };
            let Some(index) = node.cache_index else {
                self.write_direct(&buf[done..])?;
                return Ok(());
            };

            let within = (self.file_pointer - block * bs) as usize;
            let valid = node.length.bytes();
            if within >= valid {
                log::error!(
                    "[BCACHE] block {} length {} does not cover write at {:#x}",
                    block,
                    valid,
                    self.file_pointer
                );
                return Err(Error::new(
                    ErrorKind::Corrupted,
                    "Block length does not cover write range",
                ));
            }
            let n = (valid - within).min(len - done);
            node.dirty = true;

            let to = index + within;
            self.buffer[to..to + n].copy_from_slice(&buf[done..done + n]);
            done += n;
            self.file_pointer += n as u64;
        }
        Ok(())
    }

    /// 在指定位置读取
    pub fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        self.set_file_pointer(pos);
        self.read(buf)
    }

    /// 在指定位置写入
    pub fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<()> {
        self.set_file_pointer(pos);
        self.write(buf)
    }

    /// 将当前位置到文件结尾的数据推送给 `sink`
    ///
    /// 先 flush，再由后端直接传输。
    pub fn read_into(&mut self, sink: &mut dyn ByteSink) -> Result<u64> {
        self.ensure_open();
        self.flush()?;
        self.storage.set_position(self.file_pointer)?;
        let n = self.storage.read_into(sink)?;
        self.file_pointer += n;
        Ok(n)
    }

    /// 从 `source` 拉取数据写入当前位置
    ///
    /// 先 flush，由后端直接写入，之后丢弃全部块元数据并重新读取后端长度。
    pub fn write_from(&mut self, source: &mut dyn ByteSource) -> Result<u64> {
        self.ensure_open();
        self.flush()?;
        self.storage.set_position(self.file_pointer)?;
        let n = self.storage.write_from(source)?;
        self.file_pointer += n;
        self.nodes.clear();
        self.length = self.storage.size()?;
        log::debug!("[BCACHE] streamed {} bytes, length now {}", n, self.length);
        Ok(n)
    }

    // ===== 缓存旁路 =====

    fn read_direct(&mut self, buf: &mut [u8]) -> Result<usize> {
        log::warn!(
            "[BCACHE] cache bypass: reading {} bytes at {:#x} directly",
            buf.len(),
            self.file_pointer
        );
        self.stats.bypasses += 1;

        self.storage.set_position(self.file_pointer)?;
        let mut got = 0;
        while got < buf.len() {
            let n = self.storage.read(&mut buf[got..])?;
            if n == 0 {
                break;
            }
            got += n;
        }
        self.file_pointer += got as u64;
        Ok(got)
    }

    fn write_direct(&mut self, buf: &[u8]) -> Result<()> {
        log::warn!(
            "[BCACHE] cache bypass: writing {} bytes at {:#x} directly",
            buf.len(),
            self.file_pointer
        );
        self.stats.bypasses += 1;

        self.storage.set_position(self.file_pointer)?;
        self.storage.write(buf)?;
        self.file_pointer += buf.len() as u64;
        Ok(())
    }
}
