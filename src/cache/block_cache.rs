//! 合并写回的块缓存实现
//!
//! 在随机访问后端前放置一块固定大小的内存，按块组织。
//!
//! # 内存布局
//!
//! ```text
//! buffer:  [ blk 7 | blk 2 | blk 3 | blk 0 | ...free... ]
//!           0       bs      2bs     3bs     next_cache_index
//!
//! flush 时整理（defragment）到 defrag 缓冲区后交换：
//!
//! buffer:  [ blk 0 | blk 2 | blk 3 | blk 7 | ...free... ]
//! ```
//!
//! 整理之后块号相邻即意味着缓存偏移相邻，连续的块只需一次后端写入。
//!
//! # 分配策略
//!
//! 缓冲区使用 bump 分配：`next_cache_index` 只增不减，flush 时一次性归零。
//! 不需要空闲链表，因为释放总是发生在 flush 时且释放全部块。

use super::config::CacheConfig;
use super::node::{Node, NodeLength};
use crate::consts::MAX_REQUEST_LEN;
use crate::error::{Error, ErrorKind, Result};
use crate::storage::{ByteSink, ByteSource, Storage, StorageCaps};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::ops::RangeInclusive;

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// read 调用次数（不含空请求和 EOF）
    pub reads: u64,
    /// write 调用次数（不含空请求）
    pub writes: u64,
    /// 访问时已驻留的块数
    pub hits: u64,
    /// 从后端装入（或作为空洞分配）的块数
    pub misses: u64,
    /// flush 次数（含隐式 flush）
    pub flushes: u64,
    /// 因缓冲区空间不足触发的 flush 次数
    pub implicit_flushes: u64,
    /// flush 时发出的后端写入次数
    pub backend_writes: u64,
    /// 绕过缓存直接访问后端的次数
    pub bypasses: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// flush 时一段块号连续、缓存偏移也连续的驻留块
struct Run {
    first_block: u64,
    next_block: u64,
    cache_index: usize,
    len: usize,
    dirty: bool,
}

/// 块缓存
///
/// 单线程、单所有者。持有后端直到实例销毁，但不会在 Drop 时自动刷新：
/// 调用者必须显式 [`flush`](Self::flush) 或 [`close`](Self::close)，
/// 在此之前通过 `write` 写入的数据都不保证持久。
///
/// # 示例
///
/// ```rust,ignore
/// use bcache_core::{BlockCache, CacheConfig, MemoryStorage};
///
/// let mut cache = BlockCache::new(MemoryStorage::new(), CacheConfig::new(4096, 64))?;
/// cache.write(b"hello")?;
/// cache.set_file_pointer(0);
///
/// let mut buf = [0u8; 5];
/// cache.read(&mut buf)?;
/// cache.close()?;
/// ```
pub struct BlockCache<S: Storage> {
    /// 后端
    pub(super) storage: S,

    /// 块大小（字节）
    pub(super) block_size: usize,

    /// 缓存缓冲区，大小为 block_size * cache_blocks
    pub(super) buffer: Vec<u8>,

    /// 整理用缓冲区，与 buffer 同大小，flush 后两者交换
    defrag: Vec<u8>,

    /// bump 分配游标
    pub(super) next_cache_index: usize,

    /// 块号到元数据的有序映射；flush 依赖其升序遍历
    pub(super) nodes: BTreeMap<u64, Node>,

    /// 逻辑文件长度
    pub(super) length: u64,

    /// 逻辑读写位置
    pub(super) file_pointer: u64,

    /// 最近一次计算的块号及其起始偏移
    last_block: u64,
    last_block_start: u64,

    closed: bool,

    pub(super) stats: CacheStats,
}

/// 分配缓冲区，失败时返回错误而不是中止
fn alloc_buffer(size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| Error::new(ErrorKind::NoSpace, "Cannot allocate cache buffer"))?;
    buf.resize(size, 0);
    Ok(buf)
}

/// 检查单次请求，返回请求结束位置
pub(crate) fn check_request(pos: u64, len: usize) -> Result<u64> {
    if len > MAX_REQUEST_LEN {
        return Err(Error::new(ErrorKind::InvalidInput, "Request exceeds MAX_REQUEST_LEN"));
    }
    pos.checked_add(len as u64)
        .ok_or(Error::new(ErrorKind::InvalidInput, "Request range overflows u64"))
}

/// 文件长度为 `file_len` 时块 `block` 的有效长度
fn length_for(block: u64, file_len: u64, block_size: u64) -> NodeLength {
    let start = block * block_size;
    if start >= file_len {
        NodeLength::Hole
    } else {
        NodeLength::Valid((file_len - start).min(block_size) as usize)
    }
}

/// 将一段连续驻留块写回后端，干净的段跳过
fn persist_run<S: Storage>(storage: &mut S, buffer: &[u8], run: &Run, block_size: u64) -> Result<usize> {
    if !run.dirty {
        return Ok(0);
    }
    let offset = run.first_block * block_size;
    log::trace!(
        "[BCACHE] write back blocks {}..{} ({} bytes at {:#x})",
        run.first_block,
        run.next_block,
        run.len,
        offset
    );
    storage.set_position(offset)?;
    storage.write(&buffer[run.cache_index..run.cache_index + run.len])?;
    Ok(1)
}

impl<S: Storage> BlockCache<S> {
    /// 创建块缓存
    ///
    /// 缓存缓冲区和整理缓冲区在这里一次性分配，之后不再有运行时分配失败。
    ///
    /// # 参数
    ///
    /// * `storage` - 后端
    /// * `config` - 块大小与块数量
    ///
    /// # 错误
    ///
    /// 配置无效返回 `InvalidInput`，内存不足返回 `NoSpace`
    pub fn new(storage: S, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let cache_bytes = config
            .cache_bytes()
            .ok_or(Error::new(ErrorKind::InvalidInput, "Cache size overflows usize"))?;

        let buffer = alloc_buffer(cache_bytes)?;
        let defrag = alloc_buffer(cache_bytes)?;
        let length = storage.size()?;
        let file_pointer = storage.position();

        log::debug!(
            "[BCACHE] new cache: {} blocks x {} bytes, backend length={}",
            config.cache_blocks,
            config.block_size,
            length
        );

        Ok(Self {
            storage,
            block_size: config.block_size,
            buffer,
            defrag,
            next_cache_index: 0,
            nodes: BTreeMap::new(),
            length,
            file_pointer,
            last_block: 0,
            last_block_start: 0,
            closed: false,
            stats: CacheStats::default(),
        })
    }

    /// 使用默认配置（10 MiB）创建块缓存
    pub fn with_default_config(storage: S) -> Result<Self> {
        Self::new(storage, CacheConfig::default())
    }

    // ===== 状态查询 =====

    /// 逻辑文件长度
    pub fn len(&self) -> u64 {
        self.ensure_open();
        self.length
    }

    /// 逻辑文件是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 当前读写位置
    pub fn file_pointer(&self) -> u64 {
        self.ensure_open();
        self.file_pointer
    }

    /// 设置读写位置，允许超过文件长度
    ///
    /// 之后的写入会把文件扩展到该位置，读取则返回 0。
    pub fn set_file_pointer(&mut self, pos: u64) {
        self.ensure_open();
        self.file_pointer = pos;
    }

    /// 块大小
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 缓存容量（块数）
    pub fn capacity_blocks(&self) -> usize {
        self.buffer.len() / self.block_size
    }

    /// 当前驻留在缓冲区中的块数
    pub fn resident_blocks(&self) -> usize {
        self.nodes.values().filter(|n| n.is_resident()).count()
    }

    /// 当前脏块数
    pub fn dirty_blocks(&self) -> usize {
        self.nodes.values().filter(|n| n.dirty).count()
    }

    /// 查询块的元数据
    pub fn node(&self, block: u64) -> Option<&Node> {
        self.nodes.get(&block)
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 后端的只读引用
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// 后端的可变引用
    ///
    /// 绕过缓存修改后端会让缓存内容过期，调用前应先 [`flush`](Self::flush)。
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// 关闭后的任何操作都是调用者的错误
    pub(super) fn ensure_open(&self) {
        assert!(!self.closed, "BlockCache used after close");
    }

    // ===== 寻址 =====

    /// 计算位置所在块号
    pub(super) fn block_number(&mut self, pos: u64) -> u64 {
        let bs = self.block_size as u64;
        if pos >= self.last_block_start && pos - self.last_block_start < bs {
            return self.last_block;
        }
        let block = pos / bs;
        self.last_block = block;
        self.last_block_start = block * bs;
        block
    }

    /// 块的起始字节偏移
    pub(super) fn block_start(&self, block: u64) -> u64 {
        block * self.block_size as u64
    }

    fn length_of(&self, block: u64) -> NodeLength {
        length_for(block, self.length, self.block_size as u64)
    }

    /// 覆盖 `[pos, pos + len)` 的块号范围，缺失的 Node 在这里创建
    ///
    /// `len` 必须大于 0。
    pub(super) fn nodes_spanning(&mut self, pos: u64, len: usize) -> RangeInclusive<u64> {
        debug_assert!(len > 0);
        let first = self.block_number(pos);
        let last = self.block_number(pos + len as u64 - 1);
        for block in first..=last {
            let length = self.length_of(block);
            self.nodes.entry(block).or_insert(Node::new(block, length));
        }
        first..=last
    }

    // ===== 缓存填充 =====

    /// 保证范围内的块都有缓存内存
    ///
    /// 空间不足时先 flush 腾出整个缓冲区。若范围本身超过缓冲区容量，
    /// 装不下的块保持未驻留，由调用者直接访问后端。
    pub(super) fn fill_cache(&mut self, blocks: RangeInclusive<u64>) -> Result<()> {
        let bs = self.block_size;
        let total = (blocks.end() - blocks.start() + 1) as usize;
        let missing = blocks
            .clone()
            .filter(|b| self.nodes.get(b).map_or(false, |n| !n.is_resident()))
            .count();
        self.stats.hits += (total - missing) as u64;
        if missing == 0 {
            return Ok(());
        }

        let needed = missing.saturating_mul(bs);
        let free = self.buffer.len() - self.next_cache_index;
        if needed > free {
            log::debug!(
                "[BCACHE] fill needs {} bytes, only {} free: flushing",
                needed,
                free
            );
            self.stats.implicit_flushes += 1;
            self.flush()?;
        }

        for block in blocks {
            let resident = match self.nodes.get(&block) {
                Some(node) => node.is_resident(),
                None => continue,
            };
            if resident {
                continue;
            }
            if self.buffer.len() - self.next_cache_index < bs {
                log::trace!("[BCACHE] no room for block {}, leaving it unbacked", block);
                break;
            }

            let index = self.next_cache_index;
            let length = self.length_of(block);
            match length {
                NodeLength::Valid(len) => self.load_block(block, index, len)?,
                NodeLength::Hole => self.buffer[index..index + bs].fill(0),
            }
            self.next_cache_index += bs;
            self.stats.misses += 1;

            if let Some(node) = self.nodes.get_mut(&block) {
                node.cache_index = Some(index);
                node.length = length;
            }
        }
        Ok(())
    }

    /// 从后端读取块数据到 `buffer[index..]`
    ///
    /// 块内有效长度之后的字节清零，扩展文件时无需再处理。
    fn load_block(&mut self, block: u64, index: usize, len: usize) -> Result<()> {
        let start = self.block_start(block);
        log::trace!("[BCACHE] load block {} ({} bytes at {:#x})", block, len, start);

        self.storage.set_position(start)?;
        let mut got = 0;
        while got < len {
            let n = self.storage.read(&mut self.buffer[index + got..index + len])?;
            if n == 0 {
                log::error!(
                    "[BCACHE] backend short read at block {}: {} of {} bytes",
                    block,
                    got,
                    len
                );
                return Err(Error::new(
                    ErrorKind::Corrupted,
                    "Backend returned fewer bytes than its reported length",
                ));
            }
            got += n;
        }
        self.buffer[index + len..index + self.block_size].fill(0);
        Ok(())
    }

    // ===== 刷新 =====

    /// 将脏块写回后端并清空缓冲区
    ///
    /// 1. 按块号升序整理驻留块
    /// 2. 块号连续的驻留块合并为一次后端写入（段内只要有一个脏块就写整段）
    /// 3. 所有块变为未驻留、干净，缓冲区整体释放
    /// 4. 后端声明了 [`StorageCaps::FLUSH`] 时继续刷新后端
    ///
    /// 写回失败时脏块保持原状，可以重试。
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open();
        self.stats.flushes += 1;

        self.defragment();
        let writes = self.write_back_runs()?;

        for node in self.nodes.values_mut() {
            node.cache_index = None;
            node.dirty = false;
        }
        self.next_cache_index = 0;
        log::debug!("[BCACHE] flush done: {} backend writes", writes);

        if self.storage.capabilities().contains(StorageCaps::FLUSH) {
            self.storage.flush()?;
        }
        Ok(())
    }

    /// 按块号升序重排驻留块，之后块号相邻即缓存偏移相邻
    fn defragment(&mut self) {
        let bs = self.block_size;
        let mut cursor = 0;
        for node in self.nodes.values_mut() {
            match (node.cache_index, node.length) {
                (Some(index), NodeLength::Valid(_)) => {
                    self.defrag[cursor..cursor + bs].copy_from_slice(&self.buffer[index..index + bs]);
                    node.cache_index = Some(cursor);
                    cursor += bs;
                }
                // 空洞没有数据，直接释放
                (Some(_), NodeLength::Hole) => node.cache_index = None,
                (None, _) => {}
            }
        }
        core::mem::swap(&mut self.buffer, &mut self.defrag);
        self.next_cache_index = cursor;
    }

    /// 合并写回，返回后端写入次数
    fn write_back_runs(&mut self) -> Result<usize> {
        let bs = self.block_size as u64;
        let mut writes = 0;
        let mut run: Option<Run> = None;

        for node in self.nodes.values() {
            let (index, len) = match (node.cache_index, node.length) {
                (Some(index), NodeLength::Valid(len)) => (index, len),
                _ => {
                    // 未驻留块和空洞打断合并
                    if let Some(done) = run.take() {
                        writes += persist_run(&mut self.storage, &self.buffer, &done, bs)?;
                    }
                    continue;
                }
            };

            if let Some(current) = run.as_mut().filter(|r| r.next_block == node.block) {
                debug_assert_eq!(current.cache_index + current.len, index);
                current.len += len;
                current.next_block += 1;
                current.dirty |= node.dirty;
                continue;
            }

            if let Some(done) = run.take() {
                writes += persist_run(&mut self.storage, &self.buffer, &done, bs)?;
            }
            run = Some(Run {
                first_block: node.block,
                next_block: node.block + 1,
                cache_index: index,
                len,
                dirty: node.dirty,
            });
        }
        if let Some(done) = run.take() {
            writes += persist_run(&mut self.storage, &self.buffer, &done, bs)?;
        }

        self.stats.backend_writes += writes as u64;
        Ok(writes)
    }

    // ===== 长度管理 =====

    /// 截断或扩展逻辑文件
    ///
    /// 扩展时更新受影响块的有效长度（新区域为零，与后端的填零语义一致）。
    /// 截断时起始偏移不小于新长度的块直接丢弃，无论是否脏；跨越新长度的块
    /// 缩短有效长度。两种情况都会转发给后端，读写位置超过新长度时被拉回。
    pub fn set_len(&mut self, new_len: u64) -> Result<()> {
        self.ensure_open();
        let old_len = self.length;
        let bs = self.block_size as u64;

        self.storage.set_size(new_len)?;

        if new_len > old_len {
            for node in self.nodes.range_mut(old_len / bs..).map(|(_, n)| n) {
                node.length = length_for(node.block, new_len, bs);
            }
        } else if new_len < old_len {
            let tail = (new_len % bs) as usize;
            let first_dropped = new_len / bs + u64::from(tail != 0);
            let dropped = self.nodes.split_off(&first_dropped);
            let dirty = dropped.values().filter(|n| n.dirty).count();
            if dirty > 0 {
                log::debug!(
                    "[BCACHE] truncate to {} discards {} dirty blocks",
                    new_len,
                    dirty
                );
            }

            if tail != 0 {
                if let Some(node) = self.nodes.get_mut(&(new_len / bs)) {
                    if let Some(index) = node.cache_index {
                        self.buffer[index + tail..index + self.block_size].fill(0);
                    }
                    node.length = NodeLength::Valid(tail);
                }
            }
        }

        self.length = new_len;
        if self.file_pointer > new_len {
            self.file_pointer = new_len;
        }
        Ok(())
    }

    // ===== 关闭 =====

    /// 刷新、关闭后端并标记实例已关闭
    ///
    /// 失败时实例保持打开，已写入的数据是否持久不确定。
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open();
        self.flush()?;
        self.storage.close()?;
        self.closed = true;
        log::debug!("[BCACHE] closed, stats={:?}", self.stats);
        Ok(())
    }
}

impl<S: Storage> Drop for BlockCache<S> {
    fn drop(&mut self) {
        if !self.closed {
            let dirty = self.dirty_blocks();
            if dirty > 0 {
                log::warn!("[BCACHE] dropped with {} unflushed dirty blocks", dirty);
            }
        }
    }
}

impl<S: Storage> Storage for BlockCache<S> {
    fn size(&self) -> Result<u64> {
        Ok(self.len())
    }

    fn set_size(&mut self, size: u64) -> Result<()> {
        self.set_len(size)
    }

    fn position(&self) -> u64 {
        self.file_pointer()
    }

    fn set_position(&mut self, pos: u64) -> Result<()> {
        self.set_file_pointer(pos);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        BlockCache::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        BlockCache::write(self, buf)
    }

    fn read_into(&mut self, sink: &mut dyn ByteSink) -> Result<u64> {
        BlockCache::read_into(self, sink)
    }

    fn write_from(&mut self, source: &mut dyn ByteSource) -> Result<u64> {
        BlockCache::write_from(self, source)
    }

    fn close(&mut self) -> Result<()> {
        BlockCache::close(self)
    }

    fn capabilities(&self) -> StorageCaps {
        StorageCaps::FLUSH
    }

    fn flush(&mut self) -> Result<()> {
        BlockCache::flush(self)
    }
}

impl<S: Storage> core::fmt::Debug for BlockCache<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockCache")
            .field("block_size", &self.block_size)
            .field("capacity_blocks", &self.capacity_blocks())
            .field("nodes", &self.nodes.len())
            .field("next_cache_index", &self.next_cache_index)
            .field("length", &self.length)
            .field("file_pointer", &self.file_pointer)
            .field("closed", &self.closed)
            .field("stats", &self.stats)
            .finish()
    }
}
