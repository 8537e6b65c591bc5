// crates/bh_foundation/src/lib.rs

//! BasinHydro Foundation Layer
//!
//! 基础层，提供整个项目共用的错误类型和强类型索引。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `BhError` 和 `BhResult`
//! - [`index`]: 强类型索引（面、顶点、模块）
//!
//! # 示例
//!
//! ```
//! use bh_foundation::{BhError, BhResult, FaceIndex};
//!
//! fn lookup(face: FaceIndex, n_faces: usize) -> BhResult<usize> {
//!     BhError::check_index("Face", face.as_usize(), n_faces)?;
//!     Ok(face.as_usize())
//! }
//!
//! assert!(lookup(FaceIndex::new(3), 10).is_ok());
//! assert!(lookup(FaceIndex::new(10), 10).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod index;

// 重导出常用类型
pub use error::{BhError, BhResult};
pub use index::{FaceIndex, Idx, ModuleId, VertexIndex};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{BhError, BhResult};
    pub use crate::index::{FaceIndex, Idx, ModuleId, VertexIndex};
    pub use crate::{ensure, require};
}
