//! 块元数据

/// 块内有效字节数
///
/// `Hole` 表示块整体位于文件结尾之后，不携带数据。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLength {
    /// 有效字节数（不超过块大小）
    Valid(usize),
    /// 位于文件结尾之后的空洞
    Hole,
}

impl NodeLength {
    /// 有效字节数，空洞返回 None
    pub fn valid(self) -> Option<usize> {
        match self {
            NodeLength::Valid(n) => Some(n),
            NodeLength::Hole => None,
        }
    }

    /// 是否是空洞
    pub fn is_hole(self) -> bool {
        matches!(self, NodeLength::Hole)
    }

    /// 按字节数计算，空洞视为 0
    pub(crate) fn bytes(self) -> usize {
        self.valid().unwrap_or(0)
    }
}

/// 单个块的缓存状态
///
/// 每个被访问过的块对应一个 Node，块号创建后不变。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub(crate) block: u64,
    pub(crate) cache_index: Option<usize>,
    pub(crate) length: NodeLength,
    pub(crate) dirty: bool,
}

impl Node {
    pub(crate) fn new(block: u64, length: NodeLength) -> Self {
        Self {
            block,
            cache_index: None,
            length,
            dirty: false,
        }
    }

    /// 块号
    pub fn block(&self) -> u64 {
        self.block
    }

    /// 数据在缓存缓冲区中的字节偏移，未驻留时为 None
    pub fn cache_index(&self) -> Option<usize> {
        self.cache_index
    }

    /// 块内有效长度
    pub fn length(&self) -> NodeLength {
        self.length
    }

    /// 自上次持久化后是否被写入
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 是否在缓存缓冲区中驻留
    pub fn is_resident(&self) -> bool {
        self.cache_index.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_is_unbacked() {
        let node = Node::new(7, NodeLength::Valid(4));
        assert_eq!(node.block(), 7);
        assert!(!node.is_resident());
        assert!(!node.is_dirty());
        assert_eq!(node.length().valid(), Some(4));
    }

    #[test]
    fn test_hole_length() {
        assert!(NodeLength::Hole.is_hole());
        assert_eq!(NodeLength::Hole.valid(), None);
        assert_eq!(NodeLength::Hole.bytes(), 0);
        assert_eq!(NodeLength::Valid(3).bytes(), 3);
    }
}
