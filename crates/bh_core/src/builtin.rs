// crates/bh_core/src/builtin.rs

//! 内置通用模块
//!
//! 不含物理过程，只演示并检验模块契约：
//!
//! | 注册名 | 模式 | 作用 |
//! |--------|------|------|
//! | `linear_transform` | 逐面 | `output = scale * input + offset` |
//! | `accumulator` | 逐面 | 在模块数据槽中累加 `input * dt`（或 `input`），输出累计值 |
//! | `domain_mean` | 全网格 | 面积加权平均 `input`，写入所有面的 `output` |
//!
//! 参数通过模块配置（JSON）传入。

use crate::global::GlobalState;
use crate::module::{FaceModule, MeshModule, Module};
use crate::registry::ModuleRegistry;
use bh_foundation::{BhError, BhResult, ModuleId};
use bh_mesh::{Face, Mesh, SlotKey, VariableId};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// 解析模块参数
fn parse_params<T: DeserializeOwned>(module: &str, config: &serde_json::Value) -> BhResult<T> {
    serde_json::from_value(config.clone())
        .map_err(|e| BhError::config(format!("模块 '{}' 参数无效: {}", module, e)))
}

/// 注册全部内置模块
pub fn register_builtins(registry: &mut ModuleRegistry) -> BhResult<()> {
    registry.register("linear_transform", |cfg| LinearTransform::from_config(cfg).map(LinearTransform::into_module))?;
    registry.register("accumulator", |cfg| Accumulator::from_config(cfg).map(Accumulator::into_module))?;
    registry.register("domain_mean", |cfg| DomainMean::from_config(cfg).map(DomainMean::into_module))?;
    Ok(())
}

// ============================================================
// linear_transform
// ============================================================

fn default_scale() -> f64 { 1.0 }

/// 线性变换 `output = scale * input + offset`
#[derive(Debug, Clone, Deserialize)]
pub struct LinearTransform {
    /// 输入变量
    pub input: String,
    /// 输出变量
    pub output: String,
    /// 比例系数
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// 偏移
    #[serde(default)]
    pub offset: f64,
}

impl LinearTransform {
    /// 注册名
    pub const NAME: &'static str = "linear_transform";

    /// 从 JSON 参数创建
    pub fn from_config(config: &serde_json::Value) -> BhResult<Self> {
        parse_params(Self::NAME, config)
    }

    /// 包装为模块
    pub fn into_module(self) -> Module {
        let (input, output) = (self.input.clone(), self.output.clone());
        Module::per_face(Self::NAME, self)
            .with_depends([input])
            .with_provides([output])
    }
}

impl FaceModule for LinearTransform {
    fn run(&self, face: &mut Face, _global: &GlobalState) -> BhResult<()> {
        let x = face.get(&self.input)?;
        face.set(&self.output, self.scale * x + self.offset)
    }
}

// ============================================================
// accumulator
// ============================================================

/// 累加器
///
/// 每个面的累计值保存在模块数据槽中，跨时间步保留。
#[derive(Debug, Clone, Deserialize)]
pub struct Accumulator {
    /// 输入变量（速率或增量）
    pub input: String,
    /// 输出变量（累计值）
    pub output: String,
    /// 输入为速率时乘以时间步长
    #[serde(default)]
    pub per_second: bool,
    /// 初始值
    #[serde(default)]
    pub initial: f64,
    #[serde(skip)]
    slot: Option<SlotKey<f64>>,
    #[serde(skip)]
    ids: Option<(VariableId, VariableId)>,
}

impl Accumulator {
    /// 注册名
    pub const NAME: &'static str = "accumulator";

    /// 从 JSON 参数创建
    pub fn from_config(config: &serde_json::Value) -> BhResult<Self> {
        parse_params(Self::NAME, config)
    }

    /// 包装为模块
    pub fn into_module(self) -> Module {
        let (input, output) = (self.input.clone(), self.output.clone());
        Module::per_face(Self::NAME, self)
            .with_depends([input])
            .with_provides([output])
    }
}

impl FaceModule for Accumulator {
    fn init(&mut self, mesh: &mut Mesh, _global: &GlobalState, id: ModuleId) -> BhResult<()> {
        let key = SlotKey::<f64>::new(id);
        for face in mesh.faces_mut() {
            face.make_slot(key, self.initial)?;
        }
        let table = mesh.variable_table();
        self.ids = Some((table.require(&self.input)?, table.require(&self.output)?));
        self.slot = Some(key);
        Ok(())
    }

    fn run(&self, face: &mut Face, global: &GlobalState) -> BhResult<()> {
        let (key, (input, output)) = match (self.slot, self.ids) {
            (Some(key), Some(ids)) => (key, ids),
            _ => return Err(BhError::invalid_state("Initialized", "Uninitialized")),
        };
        let mut delta = face.get_by_id(input)?;
        if self.per_second {
            delta *= global.dt() as f64;
        }
        let total = face.slot_mut(key)?;
        *total += delta;
        let total = *total;
        face.set_by_id(output, total)
    }
}

// ============================================================
// domain_mean
// ============================================================

/// 全流域面积加权平均
#[derive(Debug, Clone, Deserialize)]
pub struct DomainMean {
    /// 输入变量
    pub input: String,
    /// 输出变量
    pub output: String,
}

impl DomainMean {
    /// 注册名
    pub const NAME: &'static str = "domain_mean";

    /// 从 JSON 参数创建
    pub fn from_config(config: &serde_json::Value) -> BhResult<Self> {
        parse_params(Self::NAME, config)
    }

    /// 包装为模块
    pub fn into_module(self) -> Module {
        let (input, output) = (self.input.clone(), self.output.clone());
        Module::whole_mesh(Self::NAME, self)
            .with_depends([input])
            .with_provides([output])
    }
}

impl MeshModule for DomainMean {
    fn run(&mut self, mesh: &mut Mesh, _global: &GlobalState) -> BhResult<()> {
        let mut weighted = 0.0;
        let mut area = 0.0;
        for face in mesh.faces() {
            weighted += face.get(&self.input)? * face.area();
            area += face.area();
        }
        let mean = if area > 0.0 { weighted / area } else { 0.0 };
        for face in mesh.faces_mut() {
            face.set(&self.output, mean)?;
        }
        Ok(())
    }
}
