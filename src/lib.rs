//! bcache_core: 合并写回的块缓存
//!
//! 在随机访问字节存储前放置固定大小的块缓存，旨在提供：
//! - **固定内存**：缓存大小在构造时确定，运行时不会因分配失败而出错
//! - **合并写回**：flush 时将块号连续的脏块合并为尽量少的后端写入
//! - **透明叠加**：缓存本身实现后端接口，可以替换任何后端
//! - **no_std**：只依赖 `alloc`，`std` feature 提供文件后端
//!
//! # 示例
//!
//! ```rust,ignore
//! use bcache_core::{BlockCache, CacheConfig, MemoryStorage, Result};
//!
//! fn main() -> Result<()> {
//!     let mut cache = BlockCache::new(MemoryStorage::new(), CacheConfig::default())?;
//!
//!     cache.write(b"hello, cache")?;
//!     cache.set_file_pointer(0);
//!
//!     let mut buf = [0u8; 12];
//!     cache.read(&mut buf)?;
//!
//!     cache.close()?;
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`storage`] - 后端接口与内置后端
//! - [`cache`] - 块缓存

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 存储后端
pub mod storage;

/// 块缓存
pub mod cache;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 后端
pub use storage::{ByteSink, ByteSource, MemoryStorage, Storage, StorageCaps};
#[cfg(feature = "std")]
pub use storage::{FileStorage, IoSink, IoSource};

// 缓存
pub use cache::{BlockCache, CacheConfig, CacheStats, Node, NodeLength};

// 常量
pub use consts::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS, MAX_REQUEST_LEN};
