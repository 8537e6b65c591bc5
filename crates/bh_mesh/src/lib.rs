// crates/bh_mesh/src/lib.rs

//! BasinHydro 网格模块
//!
//! 提供拓扑不可变的非结构三角网格，以及挂在每个面上的两类可变存储：
//!
//! - [`VariableStore`]: 当前时间步的命名标量（模块间通信通道）
//! - [`SlotStore`]: 每个模块私有的类型化数据槽（跨时间步保留状态）
//!
//! # 核心类型
//!
//! - [`Mesh`]: 面和顶点集合，提供邻居与空间查询
//! - [`MeshBuilder`]: 从顶点和三角形构建网格
//! - [`Face`]: 网格单元，携带几何、变量存储和数据槽
//! - [`FaceSpatialIndex`]: 基于 R-Tree 的点定位和最近面查询
//!
//! # 示例
//!
//! ```rust
//! use bh_mesh::MeshBuilder;
//!
//! let mut builder = MeshBuilder::new();
//! let v0 = builder.add_vertex(0.0, 0.0, 100.0);
//! let v1 = builder.add_vertex(1.0, 0.0, 100.0);
//! let v2 = builder.add_vertex(0.0, 1.0, 100.0);
//! builder.add_triangle(v0, v1, v2);
//!
//! let mesh = builder.build().unwrap();
//! assert_eq!(mesh.n_faces(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod face;
pub mod mesh;
pub mod slots;
pub mod spatial_index;
pub mod store;

// 重新导出核心类型
pub use face::{Face, FaceGeometry};
pub use mesh::{Mesh, MeshBuilder, MeshStatistics, Vertex};
pub use slots::{SlotKey, SlotStore};
pub use spatial_index::{FaceEnvelope, FaceSpatialIndex, SpatialBounds};
pub use store::{VariableId, VariableStore, VariableTable, Writer};
