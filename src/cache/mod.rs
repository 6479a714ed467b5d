//! 块缓存模块
//!
//! 在随机访问后端前提供合并写回的块缓存。
//!
//! # 主要组件
//!
//! - [`BlockCache`] - 缓存本体，本身也实现 [`Storage`](crate::storage::Storage)，可以逐层叠加
//! - [`CacheConfig`] - 块大小与块数量，构造后固定
//! - [`Node`] / [`NodeLength`] - 单个块的驻留状态与有效长度
//! - [`CacheStats`] - 命中、装入、写回、旁路计数
//!
//! # 设计原理
//!
//! 1. **固定内存**：缓冲区和整理缓冲区在构造时一次性分配，运行时不再分配大块内存
//! 2. **bump 分配**：块按首次访问的顺序依次占用缓冲区，flush 时整体释放
//! 3. **有序元数据**：`BTreeMap<u64, Node>` 保证 flush 能按块号升序遍历
//! 4. **整理后合并**：flush 先按块号重排驻留块，块号连续的驻留块只发出一次后端写入
//! 5. **旁路而非失败**：单次请求超过整个缓冲区时，装不下的部分直接访问后端
//!
//! # 操作对照
//!
//! | 操作                | 方法                                  |
//! |---------------------|---------------------------------------|
//! | getLength/setLength | [`BlockCache::len`] / [`BlockCache::set_len`] |
//! | getFilePointer/seek | [`BlockCache::file_pointer`] / [`BlockCache::set_file_pointer`] |
//! | read/write          | [`BlockCache::read`] / [`BlockCache::write`] |
//! | readInto/writeFrom  | [`BlockCache::read_into`] / [`BlockCache::write_from`] |
//! | flush/close         | [`BlockCache::flush`] / [`BlockCache::close`] |
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use bcache_core::{BlockCache, CacheConfig, MemoryStorage};
//!
//! // 4 个块，每块 4096 字节
//! let mut cache = BlockCache::new(MemoryStorage::new(), CacheConfig::new(4096, 4))?;
//!
//! cache.write_at(10, b"hello")?;
//! let mut buf = [0u8; 5];
//! cache.read_at(10, &mut buf)?;
//!
//! // 脏块合并写回
//! cache.flush()?;
//!
//! let stats = cache.stats();
//! println!("hits={} misses={} backend writes={}",
//!          stats.hits, stats.misses, stats.backend_writes);
//! ```
//!
//! # 内存分配要求
//!
//! 本模块依赖 `alloc` crate，需要用户提供全局分配器。

mod block_cache;
mod config;
mod io;
mod node;
#[cfg(test)]
pub(crate) mod test_utils;

pub use block_cache::{BlockCache, CacheStats};
pub use config::CacheConfig;
pub use node::{Node, NodeLength};
