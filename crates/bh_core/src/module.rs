// crates/bh_core/src/module.rs

//! 模块契约
//!
//! 模块是可插拔的计算单元，声明它读取（depends）和写入（provides）的面变量名，
//! 每个时间步运行一次。按执行方式分为两类：
//!
//! - **逐面**（[`FaceModule`]）：`run` 每次只拿到一个 `&mut Face`，由核心按面并行分发
//! - **全网格**（[`MeshModule`]）：`run` 拿到整个 `&mut Mesh`，单线程调用一次，
//!   用于需要全局结构的过程（如地形遮蔽）
//!
//! 两类模块用 [`ModuleKind`] 枚举承载，由驱动器显式分发。
//!
//! # 示例
//!
//! ```
//! use bh_core::{GlobalState, Module, ParallelMode};
//! use bh_mesh::Face;
//!
//! let m = Module::per_face_fn("double_x", |face: &mut Face, _: &GlobalState| {
//!     let x = face.get("x")?;
//!     face.set("y", 2.0 * x)
//! })
//! .with_depends(["x"])
//! .with_provides(["y"]);
//!
//! assert_eq!(m.mode(), ParallelMode::PerFace);
//! assert_eq!(m.provides(), &["y".to_string()]);
//! ```

use crate::global::GlobalState;
use bh_foundation::{BhResult, ModuleId};
use bh_mesh::{Face, Mesh};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 逐面模块
///
/// `run` 只允许读写传入面自身的变量和数据槽，因此可以无锁并行。
pub trait FaceModule: Send + Sync {
    /// 初始化：创建数据槽、预计算派生量
    fn init(&mut self, _mesh: &mut Mesh, _global: &GlobalState, _id: ModuleId) -> BhResult<()> {
        Ok(())
    }

    /// 对单个面执行一个时间步
    fn run(&self, face: &mut Face, global: &GlobalState) -> BhResult<()>;
}

/// 全网格模块
pub trait MeshModule: Send {
    /// 初始化
    fn init(&mut self, _mesh: &mut Mesh, _global: &GlobalState, _id: ModuleId) -> BhResult<()> {
        Ok(())
    }

    /// 对整个网格执行一个时间步
    fn run(&mut self, mesh: &mut Mesh, global: &GlobalState) -> BhResult<()>;
}

/// 闭包形式的逐面模块
struct FaceFn<F>(F);

impl<F> FaceModule for FaceFn<F>
where
    F: Fn(&mut Face, &GlobalState) -> BhResult<()> + Send + Sync,
{
    fn run(&self, face: &mut Face, global: &GlobalState) -> BhResult<()> {
        (self.0)(face, global)
    }
}

/// 闭包形式的全网格模块
struct MeshFn<F>(F);

impl<F> MeshModule for MeshFn<F>
where
    F: FnMut(&mut Mesh, &GlobalState) -> BhResult<()> + Send,
{
    fn run(&mut self, mesh: &mut Mesh, global: &GlobalState) -> BhResult<()> {
        (self.0)(mesh, global)
    }
}

/// 并行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelMode {
    /// 逐面（数据并行）
    PerFace,
    /// 全网格（区域整体）
    WholeMesh,
}

impl fmt::Display for ParallelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerFace => write!(f, "per-face"),
            Self::WholeMesh => write!(f, "whole-mesh"),
        }
    }
}

/// 模块实现
pub enum ModuleKind {
    /// 逐面
    PerFace(Box<dyn FaceModule>),
    /// 全网格
    WholeMesh(Box<dyn MeshModule>),
}

impl ModuleKind {
    /// 并行模式
    pub fn mode(&self) -> ParallelMode {
        match self {
            Self::PerFace(_) => ParallelMode::PerFace,
            Self::WholeMesh(_) => ParallelMode::WholeMesh,
        }
    }
}

impl fmt::Debug for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleKind::{}", self.mode())
    }
}

/// 已实例化的模块
#[derive(Debug)]
pub struct Module {
    name: String,
    depends: Vec<String>,
    provides: Vec<String>,
    kind: ModuleKind,
}

impl Module {
    /// 创建逐面模块
    pub fn per_face(name: impl Into<String>, module: impl FaceModule + 'static) -> Self {
        Self::new(name, ModuleKind::PerFace(Box::new(module)))
    }

    /// 创建全网格模块
    pub fn whole_mesh(name: impl Into<String>, module: impl MeshModule + 'static) -> Self {
        Self::new(name, ModuleKind::WholeMesh(Box::new(module)))
    }

    /// 由闭包创建逐面模块（无初始化）
    pub fn per_face_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Face, &GlobalState) -> BhResult<()> + Send + Sync + 'static,
    {
        Self::per_face(name, FaceFn(f))
    }

    /// 由闭包创建全网格模块（无初始化）
    pub fn whole_mesh_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&mut Mesh, &GlobalState) -> BhResult<()> + Send + 'static,
    {
        Self::whole_mesh(name, MeshFn(f))
    }

    /// 由实现创建
    pub fn new(name: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            name: name.into(),
            depends: Vec::new(),
            provides: Vec::new(),
            kind,
        }
    }

    /// 重命名（同一实现启用多个实例时）
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 声明读取的变量
    pub fn with_depends<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        push_unique(&mut self.depends, names);
        self
    }

    /// 声明写入的变量
    pub fn with_provides<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        push_unique(&mut self.provides, names);
        self
    }

    /// 模块名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 读取的变量（声明顺序）
    #[inline]
    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    /// 写入的变量（声明顺序）
    #[inline]
    pub fn provides(&self) -> &[String] {
        &self.provides
    }

    /// 并行模式
    #[inline]
    pub fn mode(&self) -> ParallelMode {
        self.kind.mode()
    }

    /// 实现
    #[inline]
    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    /// 实现（可变）
    #[inline]
    pub fn kind_mut(&mut self) -> &mut ModuleKind {
        &mut self.kind
    }
}

fn push_unique<I, S>(list: &mut Vec<String>, names: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for name in names {
        let name = name.into();
        if !list.contains(&name) {
            list.push(name);
        }
    }
}
