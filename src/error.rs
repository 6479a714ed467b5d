//! 错误类型定义
//!
//! 提供块缓存及其后端操作的错误类型。

use core::fmt;

/// 块缓存操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误（后端报告的失败）
    Io,
    /// 无效参数
    InvalidInput,
    /// 缓存与后端状态不一致（例如后端报告的长度与实际可读字节不符）
    Corrupted,
    /// 空间不足（例如构造时无法分配缓存缓冲区）
    NoSpace,
    /// 不支持的操作
    Unsupported,
    /// 无效状态
    InvalidState,
    /// 在读满预期字节前遇到文件结尾
    UnexpectedEof,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as IoKind;

        // no_std 兼容的 Error 只携带静态消息，原始错误只记录到日志
        log::debug!("[BCACHE] backend std::io error: {}", err);
        match err.kind() {
            IoKind::UnexpectedEof => Error::new(ErrorKind::UnexpectedEof, "Unexpected end of file"),
            IoKind::InvalidInput => Error::new(ErrorKind::InvalidInput, "Invalid input to backend"),
            IoKind::Unsupported => Error::new(ErrorKind::Unsupported, "Operation not supported by backend"),
            IoKind::OutOfMemory => Error::new(ErrorKind::NoSpace, "Backend out of memory"),
            _ => Error::new(ErrorKind::Io, "Backend I/O error"),
        }
    }
}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
