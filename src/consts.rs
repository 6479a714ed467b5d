//! 块缓存常量定义

//=============================================================================
// 缓存布局
//=============================================================================

/// 默认块大小（256 KiB）
pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;

/// 默认缓存块数量
///
/// 与 [`DEFAULT_BLOCK_SIZE`] 相乘得到 10 MiB 的默认缓存
pub const DEFAULT_CACHE_BLOCKS: usize = 40;

//=============================================================================
// 请求限制
//=============================================================================

/// 单次 read/write 请求的最大字节数
///
/// 超过该值的请求在修改任何状态之前以 `InvalidInput` 拒绝。
pub const MAX_REQUEST_LEN: usize = i32::MAX as usize;

/// `write_from` 在后端之间搬运数据时使用的分块大小
pub const STREAM_CHUNK_SIZE: usize = 8 * 1024;
