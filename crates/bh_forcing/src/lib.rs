// crates/bh_forcing/src/lib.rs

//! BasinHydro 气象强迫
//!
//! 提供站点观测数据结构、太阳几何，以及把点观测分配到任意位置的空间插值算法。
//! 本 crate 不依赖网格；逐面分配由 `bh_core` 的强迫引擎完成。
//!
//! # 模块
//!
//! - [`timeseries`]: 单变量观测序列（精确时刻匹配，NaN 为缺测）
//! - [`station`]: 气象站
//! - [`solar`]: 太阳高度角与方位角
//! - [`interpolation`]: IDW / 最近站点 / 高程回归，及去趋势

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod interpolation;
pub mod solar;
pub mod station;
pub mod timeseries;

pub use interpolation::{ElevationTrend, InterpolationMethod, Interpolator, Sample};
pub use solar::{solar_position, SolarPosition};
pub use station::{collect_samples, Station};
pub use timeseries::ObservationSeries;
