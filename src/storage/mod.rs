//! 存储后端抽象
//!
//! 块缓存所包装的随机访问字节存储。
//!
//! storage/device.rs 定义后端接口 [`Storage`]、能力标志和流式传输接口
//! storage/memory.rs 提供基于 `Vec<u8>` 的内存后端，适合测试与临时数据
//! storage/file.rs 提供基于 `std::fs::File` 的文件后端（需要 `std` feature）

mod device;
mod memory;
#[cfg(feature = "std")]
mod file;

pub use device::{ByteSink, ByteSource, Storage, StorageCaps};
pub use memory::MemoryStorage;
#[cfg(feature = "std")]
pub use file::{FileStorage, IoSink, IoSource};
