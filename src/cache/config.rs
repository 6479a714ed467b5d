//! 缓存配置

use crate::consts::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS};
use crate::error::{Error, ErrorKind, Result};

/// 块缓存配置
///
/// 构造后固定，不支持运行时调整。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 每块字节数
    pub block_size: usize,
    /// 缓存块数量
    pub cache_blocks: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_CACHE_BLOCKS, // 默认 10 MiB
        }
    }
}

impl CacheConfig {
    /// 创建配置
    pub const fn new(block_size: usize, cache_blocks: usize) -> Self {
        Self {
            block_size,
            cache_blocks,
        }
    }

    /// 设置块大小
    pub const fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// 设置缓存块数量
    pub const fn with_cache_blocks(mut self, cache_blocks: usize) -> Self {
        self.cache_blocks = cache_blocks;
        self
    }

    /// 缓存缓冲区总字节数，溢出时返回 None
    pub fn cache_bytes(&self) -> Option<usize> {
        self.block_size.checked_mul(self.cache_blocks)
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Block size must be non-zero"));
        }
        if self.cache_blocks == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Cache block count must be non-zero"));
        }
        if self.cache_bytes().is_none() {
            return Err(Error::new(ErrorKind::InvalidInput, "Cache size overflows usize"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.block_size, 256 * 1024);
        assert_eq!(config.cache_bytes(), Some(10 * 1024 * 1024));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::default().with_block_size(4).with_cache_blocks(2);
        assert_eq!(config, CacheConfig::new(4, 2));
        assert_eq!(config.cache_bytes(), Some(8));
    }

    #[test]
    fn test_validate_rejects_degenerate() {
        let err = CacheConfig::new(0, 8).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = CacheConfig::new(4096, 0).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert!(CacheConfig::new(usize::MAX, 2).validate().is_err());
    }
}
