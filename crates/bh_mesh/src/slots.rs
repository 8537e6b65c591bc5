// crates/bh_mesh/src/slots.rs

//! 模块数据槽
//!
//! 每个面为每个模块保存一份模块自定义的状态（如冠层积雪量），
//! 核心从不解释其内容。
//!
//! # 设计要点
//!
//! 1. **类型化句柄**：模块初始化时创建 [`SlotKey<T>`]，之后所有访问都经由该句柄，
//!    类型在句柄上固定，不存在未检查的向下转型
//! 2. **按模块 ID 分区**：槽位以 `ModuleId` 为下标，两个模块永不共享槽
//! 3. **不可重解释**：槽创建后不能以其他类型重新创建
//!
//! # 示例
//!
//! ```rust
//! use bh_foundation::ModuleId;
//! use bh_mesh::slots::{SlotKey, SlotStore};
//!
//! #[derive(Default)]
//! struct SnowLoad { load: f64 }
//!
//! let key: SlotKey<SnowLoad> = SlotKey::new(ModuleId::new(0));
//! let mut store = SlotStore::new();
//! store.insert(key, SnowLoad::default()).unwrap();
//!
//! store.get_mut(key).unwrap().load += 1.5;
//! assert_eq!(store.get(key).unwrap().load, 1.5);
//! ```

use bh_foundation::{BhError, BhResult, ModuleId};
use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;

/// 类型化数据槽句柄
///
/// 由模块在 `init` 中创建一次并缓存，`run` 时用它取回同一实例。
pub struct SlotKey<T> {
    module: ModuleId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Copy for SlotKey<T> {}

impl<T> Clone for SlotKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> fmt::Debug for SlotKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotKey<{}>({})", type_name::<T>(), self.module)
    }
}

impl<T: Any + Send + Sync> SlotKey<T> {
    /// 为模块创建句柄
    #[inline]
    pub const fn new(module: ModuleId) -> Self {
        Self {
            module,
            _marker: PhantomData,
        }
    }

    /// 所属模块
    #[inline]
    pub fn module(&self) -> ModuleId {
        self.module
    }
}

type BoxedSlot = Box<dyn Any + Send + Sync>;

/// 单面数据槽集合
///
/// 槽位下标为模块 ID，寿命与网格相同。
#[derive(Default)]
pub struct SlotStore {
    slots: Vec<Option<BoxedSlot>>,
}

impl fmt::Debug for SlotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotStore")
            .field("occupied", &self.n_occupied())
            .finish()
    }
}

impl SlotStore {
    /// 创建空集合
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建槽，同一模块重复创建返回 `SlotExists`
    ///
    /// 错误中的面索引由调用方补全，这里填 `usize::MAX`。
    pub fn insert<T: Any + Send + Sync>(&mut self, key: SlotKey<T>, value: T) -> BhResult<()> {
        let idx = key.module.as_usize();
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        if self.slots[idx].is_some() {
            return Err(BhError::SlotExists {
                module: key.module.index(),
                face: usize::MAX,
            });
        }
        self.slots[idx] = Some(Box::new(value));
        Ok(())
    }

    /// 获取槽引用
    pub fn get<T: Any + Send + Sync>(&self, key: SlotKey<T>) -> BhResult<&T> {
        let slot = self
            .slots
            .get(key.module.as_usize())
            .and_then(Option::as_ref)
            .ok_or(BhError::SlotMissing {
                module: key.module.index(),
                face: usize::MAX,
            })?;
        slot.downcast_ref::<T>().ok_or(BhError::SlotTypeMismatch {
            module: key.module.index(),
            expected: type_name::<T>(),
        })
    }

    /// 获取槽可变引用
    pub fn get_mut<T: Any + Send + Sync>(&mut self, key: SlotKey<T>) -> BhResult<&mut T> {
        let slot = self
            .slots
            .get_mut(key.module.as_usize())
            .and_then(Option::as_mut)
            .ok_or(BhError::SlotMissing {
                module: key.module.index(),
                face: usize::MAX,
            })?;
        slot.downcast_mut::<T>().ok_or(BhError::SlotTypeMismatch {
            module: key.module.index(),
            expected: type_name::<T>(),
        })
    }

    /// 模块是否已有槽
    #[inline]
    pub fn contains(&self, module: ModuleId) -> bool {
        matches!(self.slots.get(module.as_usize()), Some(Some(_)))
    }

    /// 已占用的槽数
    pub fn n_occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
