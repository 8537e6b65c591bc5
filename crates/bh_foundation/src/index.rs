// crates/bh_foundation/src/index.rs

//! 强类型索引系统
//!
//! 使用泛型 `Idx<T>` 在编译期区分面、顶点和模块索引，避免误用。
//! 网格拓扑在构建后不再变化，因此不需要代际校验。
//!
//! # 示例
//!
//! ```
//! use bh_foundation::index::{FaceIndex, ModuleId};
//!
//! let face = FaceIndex::new(7);
//! assert_eq!(face.as_usize(), 7);
//!
//! let module = ModuleId::new(0);
//! assert!(module.is_valid());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// 无效索引标记
pub const INVALID_INDEX: u32 = u32::MAX;

// ============================================================================
// 标记类型 (Phantom Types)
// ============================================================================

/// 网格面（三角形单元）索引标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceTag;

/// 顶点索引标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexTag;

/// 模块实例索引标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleTag;

// ============================================================================
// 泛型索引类型
// ============================================================================

/// 泛型强类型索引
///
/// 内存布局与 `u32` 相同。
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Idx<T> {
    index: u32,
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

// PhantomData<T> 的 Copy 需要 T: Copy，因此手动实现
impl<T> Copy for Idx<T> {}

impl<T> Clone for Idx<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Idx<T> {
    /// 无效索引常量
    pub const INVALID: Self = Self::new(INVALID_INDEX);

    /// 创建新索引
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// 从 usize 创建
    #[inline]
    pub fn from_usize(index: usize) -> Self {
        debug_assert!(index < INVALID_INDEX as usize, "索引超出 u32 范围");
        Self::new(index as u32)
    }

    /// 获取索引值
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// 获取索引值（usize）
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.index as usize
    }

    /// 判断索引是否有效
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.index != INVALID_INDEX
    }

    /// 转换为 `Option<usize>`
    #[inline]
    pub fn to_option(self) -> Option<usize> {
        self.is_valid().then_some(self.as_usize())
    }
}

impl<T> Default for Idx<T> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<T> PartialEq for Idx<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Idx<T> {}

impl<T> PartialOrd for Idx<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Idx<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Idx<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Idx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Idx({})", self.index)
        } else {
            write!(f, "Idx(INVALID)")
        }
    }
}

impl<T> fmt::Display for Idx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.index)
        } else {
            write!(f, "INVALID")
        }
    }
}

impl<T> From<usize> for Idx<T> {
    #[inline]
    fn from(index: usize) -> Self {
        Self::from_usize(index)
    }
}

impl<T> From<Idx<T>> for usize {
    #[inline]
    fn from(idx: Idx<T>) -> usize {
        idx.as_usize()
    }
}

// ============================================================================
// 类型别名
// ============================================================================

/// 面索引
pub type FaceIndex = Idx<FaceTag>;

/// 顶点索引
pub type VertexIndex = Idx<VertexTag>;

/// 模块实例 ID（即注册顺序下标，用作数据槽键）
pub type ModuleId = Idx<ModuleTag>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_index() {
        let idx = FaceIndex::INVALID;
        assert!(!idx.is_valid());
        assert_eq!(idx.to_option(), None);
        assert_eq!(FaceIndex::default(), FaceIndex::INVALID);
    }

    #[test]
    fn test_usize_conversion() {
        let idx: VertexIndex = 42usize.into();
        assert_eq!(idx.as_usize(), 42);
        let back: usize = idx.into();
        assert_eq!(back, 42);
    }

    #[test]
    fn test_ordering() {
        let a = ModuleId::new(1);
        let b = ModuleId::new(2);
        assert!(a < b);
        assert_eq!(format!("{}", a), "1");
        assert_eq!(format!("{:?}", ModuleId::INVALID), "Idx(INVALID)");
    }
}
