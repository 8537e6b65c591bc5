// crates/bh_mesh/src/store.rs

//! 面变量存储
//!
//! 每个面持有一个 [`VariableStore`]，保存当前时间步的命名标量值。
//! 所有面共享同一张 [`VariableTable`]（名称 → 稠密下标），
//! 因此单面存储只是一个 `Vec<Option<f64>>`。
//!
//! # 约定
//!
//! 1. **未设置是显式状态**：使用 `None` 表示，不使用 -9999 等哨兵值
//! 2. **不保留历史**：每个时间步开始时整体清空
//! 3. **名称必须先声明**：变量表由依赖解析器根据 provides 集合和强迫变量构建，
//!    写入未声明的名称返回 `UnknownVariable`
//! 4. **单一写入者**：通过 [`VariableTable::declare`] 登记的变量只允许其提供者写入；
//!    存储的当前写入者由驱动器在调用模块前设置，越权写入返回 `UnauthorizedWrite`
//!
//! # 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use bh_mesh::store::{VariableStore, VariableTable};
//!
//! let table = Arc::new(VariableTable::from_names(["t", "rh"]).unwrap());
//! let mut store = VariableStore::new(table);
//!
//! store.set("t", -2.5).unwrap();
//! assert_eq!(store.value("t").unwrap(), Some(-2.5));
//! assert_eq!(store.value("rh").unwrap(), None);
//! ```

use bh_foundation::{BhError, BhResult, ModuleId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// 变量下标
///
/// 由 [`VariableTable`] 分配，可在模块初始化时缓存以跳过名称查找。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableId(u32);

impl VariableId {
    /// 获取下标（usize）
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// 变量写入者
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Writer {
    /// 不受限，驱动器之外直接使用存储时的默认值
    #[default]
    Unrestricted,
    /// 强迫分配引擎
    Forcing,
    /// 模块实例
    Module(ModuleId),
}

/// 验证变量名
///
/// # 规则
/// - 非空
/// - 仅允许 ASCII 字母、数字和下划线
/// - 不能以数字开头
///
/// 允许大写字母，因为物理变量常用 `U_R`、`Snow_load` 这样的名称。
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// 变量表（名称 → 下标）
///
/// 注册顺序即下标顺序，保证迭代一致性。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableTable {
    /// 注册顺序
    names: Vec<String>,
    /// 名称索引
    lookup: HashMap<String, VariableId>,
    /// 各变量的提供者
    #[serde(default)]
    owners: Vec<Writer>,
    /// 模块名（按 ModuleId），仅用于错误报告
    #[serde(default)]
    module_names: Vec<String>,
}

impl VariableTable {
    /// 创建空变量表
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 从名称列表创建，重复名称只登记一次
    pub fn from_names<I, S>(names: I) -> BhResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for name in names {
            table.register(name.as_ref())?;
        }
        Ok(table)
    }

    /// 注册变量，已存在时返回原下标
    pub fn register(&mut self, name: &str) -> BhResult<VariableId> {
        if let Some(&id) = self.lookup.get(name) {
            return Ok(id);
        }
        if !is_valid_variable_name(name) {
            return Err(BhError::InvalidVariableName {
                name: name.to_string(),
            });
        }
        let id = VariableId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), id);
        self.owners.push(Writer::Unrestricted);
        Ok(id)
    }

    /// 注册变量并登记唯一提供者
    ///
    /// 已由另一提供者登记时返回 `DuplicateProvider`。
    pub fn declare(&mut self, name: &str, owner: Writer) -> BhResult<VariableId> {
        let id = self.register(name)?;
        let existing = self.owner(id);
        if existing != Writer::Unrestricted && existing != owner {
            return Err(BhError::duplicate_provider(
                name,
                self.writer_name(existing),
                self.writer_name(owner),
            ));
        }
        self.owners[id.as_usize()] = owner;
        Ok(id)
    }

    /// 设置模块名（下标为 `ModuleId`）
    pub fn set_module_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.module_names = names.into_iter().map(Into::into).collect();
    }

    /// 变量的提供者
    #[inline]
    pub fn owner(&self, id: VariableId) -> Writer {
        self.owners.get(id.as_usize()).copied().unwrap_or_default()
    }

    /// 写入者的可读名称
    pub fn writer_name(&self, writer: Writer) -> String {
        match writer {
            Writer::Unrestricted => "unrestricted".to_string(),
            Writer::Forcing => "forcing".to_string(),
            Writer::Module(id) => self
                .module_names
                .get(id.as_usize())
                .cloned()
                .unwrap_or_else(|| format!("module #{}", id)),
        }
    }

    /// 检查写入权限
    ///
    /// 不受限的写入者或未登记提供者的变量总是允许。
    pub fn check_write(&self, id: VariableId, writer: Writer) -> BhResult<()> {
        let owner = self.owner(id);
        if writer == Writer::Unrestricted || owner == Writer::Unrestricted || owner == writer {
            return Ok(());
        }
        Err(BhError::unauthorized_write(
            self.writer_name(writer),
            self.name(id).unwrap_or("?"),
            self.writer_name(owner),
        ))
    }

    /// 查找变量下标
    #[inline]
    pub fn id(&self, name: &str) -> Option<VariableId> {
        self.lookup.get(name).copied()
    }

    /// 查找变量下标，不存在时返回 `UnknownVariable`
    #[inline]
    pub fn require(&self, name: &str) -> BhResult<VariableId> {
        self.id(name).ok_or_else(|| BhError::unknown_variable(name))
    }

    /// 下标对应的名称
    #[inline]
    pub fn name(&self, id: VariableId) -> Option<&str> {
        self.names.get(id.as_usize()).map(String::as_str)
    }

    /// 所有变量名（按注册顺序）
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 是否包含变量
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// 变量数量
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// 单面变量存储
///
/// 仅保存当前时间步的值。
#[derive(Debug, Clone)]
pub struct VariableStore {
    table: Arc<VariableTable>,
    values: Vec<Option<f64>>,
    writer: Writer,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new(Arc::new(VariableTable::new()))
    }
}

impl VariableStore {
    /// 基于共享变量表创建，所有值初始为未设置
    pub fn new(table: Arc<VariableTable>) -> Self {
        let values = vec![None; table.len()];
        Self {
            table,
            values,
            writer: Writer::Unrestricted,
        }
    }

    /// 共享变量表
    #[inline]
    pub fn table(&self) -> &Arc<VariableTable> {
        &self.table
    }

    /// 重新绑定变量表，清空所有值并解除写入者限制
    pub fn rebind(&mut self, table: Arc<VariableTable>) {
        self.values = vec![None; table.len()];
        self.table = table;
        self.writer = Writer::Unrestricted;
    }

    /// 当前写入者
    #[inline]
    pub fn writer(&self) -> Writer {
        self.writer
    }

    /// 设置当前写入者
    #[inline]
    pub fn set_writer(&mut self, writer: Writer) {
        self.writer = writer;
    }

    /// 清空当前时间步的所有值
    #[inline]
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = None);
    }

    /// 写入变量（覆盖本时间步的旧值）
    pub fn set(&mut self, name: &str, value: f64) -> BhResult<()> {
        let id = self.table.require(name)?;
        self.set_by_id(id, value)
    }

    /// 按下标写入
    #[inline]
    pub fn set_by_id(&mut self, id: VariableId, value: f64) -> BhResult<()> {
        self.table.check_write(id, self.writer)?;
        self.values[id.as_usize()] = Some(value);
        Ok(())
    }

    /// 读取变量，未设置时为 `None`
    ///
    /// 名称未声明时返回 `UnknownVariable`。
    pub fn value(&self, name: &str) -> BhResult<Option<f64>> {
        let id = self.table.require(name)?;
        Ok(self.values[id.as_usize()])
    }

    /// 按下标读取
    #[inline]
    pub fn value_by_id(&self, id: VariableId) -> Option<f64> {
        self.values.get(id.as_usize()).copied().flatten()
    }

    /// 变量在当前时间步是否已设置
    #[inline]
    pub fn is_set(&self, name: &str) -> bool {
        self.table
            .id(name)
            .map(|id| self.values[id.as_usize()].is_some())
            .unwrap_or(false)
    }

    /// 已设置变量的 (名称, 值) 迭代器
    pub fn iter_set(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.table
            .names()
            .iter()
            .zip(self.values.iter())
            .filter_map(|(name, v)| v.map(|v| (name.as_str(), v)))
    }

    /// 已设置变量数量
    pub fn n_set(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}
