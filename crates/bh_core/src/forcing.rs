// crates/bh_core/src/forcing.rs

//! 强迫分配引擎
//!
//! 每个时间步把站点观测插值到所有面，写入面变量存储。
//!
//! # 流程
//!
//! 1. 对每个强迫变量收集当前时刻报告的站点样本
//! 2. 构建插值器（方法在配置期确定，去趋势的高程拟合每步重做）；
//!    无站点报告时使用回退常数，否则返回 `NoStationData`
//! 3. 一次逐面遍历写入所有变量，写入者为 [`Writer::Forcing`]
//!
//! 引擎整体在任何模块运行前完成，构成时间步内的屏障。

use crate::global::GlobalState;
use crate::parallel::{ExecutionMetrics, FaceDispatcher};
use bh_config::ForcingConfig;
use bh_forcing::{collect_samples, InterpolationMethod, Interpolator};
use bh_foundation::{BhError, BhResult};
use bh_mesh::{Face, Mesh, VariableId, VariableTable, Writer};

/// 单个强迫变量的分配设置
#[derive(Debug, Clone)]
pub struct ForcingChannel {
    /// 变量名
    pub name: String,
    /// 插值方法
    pub method: InterpolationMethod,
    /// 是否去趋势
    pub detrend: bool,
    /// 无站点时的回退值
    pub fallback: Option<f64>,
    id: Option<VariableId>,
}

impl ForcingChannel {
    /// 创建通道
    pub fn new(name: impl Into<String>, method: InterpolationMethod) -> Self {
        Self {
            name: name.into(),
            method,
            detrend: false,
            fallback: None,
            id: None,
        }
    }
}

/// 单步内某变量的场
enum Field {
    Interpolated(Interpolator),
    Constant(f64),
}

impl Field {
    #[inline]
    fn at(&self, face: &Face) -> f64 {
        match self {
            Self::Interpolated(interp) => interp.interpolate(face.center(), face.elevation()),
            Self::Constant(v) => *v,
        }
    }
}

/// 强迫分配引擎
#[derive(Debug, Clone, Default)]
pub struct ForcingEngine {
    channels: Vec<ForcingChannel>,
    metrics: ExecutionMetrics,
}

impl ForcingEngine {
    /// 空引擎
    pub fn new() -> Self {
        Self::default()
    }

    /// 由配置创建
    pub fn from_config(config: &ForcingConfig) -> Self {
        let channels = config
            .variables
            .iter()
            .map(|v| ForcingChannel {
                name: v.name.clone(),
                method: config.method_for(v),
                detrend: v.detrend,
                fallback: v.fallback,
                id: None,
            })
            .collect();
        Self {
            channels,
            metrics: ExecutionMetrics::default(),
        }
    }

    /// 添加通道，同名通道被替换
    pub fn add_channel(&mut self, channel: ForcingChannel) {
        match self.channels.iter_mut().find(|c| c.name == channel.name) {
            Some(existing) => *existing = channel,
            None => self.channels.push(channel),
        }
    }

    /// 变量名（声明顺序）
    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    /// 通道
    #[inline]
    pub fn channels(&self) -> &[ForcingChannel] {
        &self.channels
    }

    /// 累计指标
    #[inline]
    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.metrics
    }

    /// 缓存各变量在变量表中的下标
    pub fn bind(&mut self, table: &VariableTable) -> BhResult<()> {
        for c in &mut self.channels {
            c.id = Some(table.require(&c.name)?);
        }
        Ok(())
    }

    /// 把当前时刻的观测分配到所有面
    pub fn distribute(
        &mut self,
        mesh: &mut Mesh,
        global: &GlobalState,
        dispatcher: &FaceDispatcher,
    ) -> BhResult<()> {
        if self.channels.is_empty() {
            return Ok(());
        }
        let time = global.posix_time();

        let mut fields = Vec::with_capacity(self.channels.len());
        for c in &self.channels {
            let id = c
                .id
                .ok_or_else(|| BhError::internal(format!("强迫变量 '{}' 未绑定变量表", c.name)))?;
            let samples = collect_samples(global.stations(), &c.name, time);
            let n = samples.len();
            let field = match Interpolator::new(c.method, samples, c.detrend) {
                Some(interp) => {
                    tracing::trace!("{} @ {}: {} 个站点, {}", c.name, time, n, c.method);
                    Field::Interpolated(interp)
                }
                None => match c.fallback {
                    Some(v) => {
                        tracing::warn!("{} @ {}: 无站点报告，使用回退值 {}", c.name, time, v);
                        Field::Constant(v)
                    }
                    None => return Err(BhError::no_station_data(&c.name, time)),
                },
            };
            fields.push((id, field));
        }

        let fields = &fields;
        dispatcher.for_each_face_timed(mesh.faces_mut(), &mut self.metrics, |face| {
            face.set_writer(Writer::Forcing);
            let result = write_fields(face, fields);
            face.set_writer(Writer::Unrestricted);
            result
        })
    }
}

fn write_fields(face: &mut Face, fields: &[(VariableId, Field)]) -> BhResult<()> {
    for (id, field) in fields {
        let v = field.at(face);
        face.set_by_id(*id, v)?;
    }
    Ok(())
}
