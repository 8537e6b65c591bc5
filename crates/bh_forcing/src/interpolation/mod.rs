// crates/bh_forcing/src/interpolation/mod.rs

//! 空间插值
//!
//! 把某一时刻各站点的观测分配到任意目标位置。
//!
//! # 插值方法
//!
//! - [`InterpolationMethod::Idw`]: 反距离加权
//! - [`InterpolationMethod::Nearest`]: 最近站点
//! - [`InterpolationMethod::ElevationRegression`]: 对高程做线性回归
//!
//! 任一空间方法都可以叠加高程去趋势（`detrend`）：先拟合高程趋势并扣除，
//! 对残差做空间插值，再在目标高程处加回趋势。趋势每个时刻用当前报告的站点重新拟合。
//!
//! # 示例
//!
//! ```
//! use bh_forcing::interpolation::{InterpolationMethod, Interpolator, Sample};
//! use glam::DVec2;
//!
//! let samples = vec![
//!     Sample { position: DVec2::new(0.0, 0.0), elevation: 1000.0, value: 10.0 },
//!     Sample { position: DVec2::new(5.0, 0.0), elevation: 2000.0, value: 4.0 },
//! ];
//! let interp = Interpolator::new(InterpolationMethod::Nearest, samples, true).unwrap();
//! // 最近站的残差为 0，结果即趋势在 1500 m 的值
//! assert!((interp.interpolate(DVec2::new(1.0, 0.0), 1500.0) - 7.0).abs() < 1e-9);
//! ```

pub mod idw;
pub mod nearest;
pub mod regression;

pub use regression::ElevationTrend;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 单站插值样本
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// 平面位置
    pub position: DVec2,
    /// 高程 [m]
    pub elevation: f64,
    /// 观测值
    pub value: f64,
}

fn default_power() -> f64 {
    idw::DEFAULT_POWER
}

/// 插值方法
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterpolationMethod {
    /// 反距离加权
    Idw {
        /// 距离指数
        #[serde(default = "default_power")]
        power: f64,
    },
    /// 最近站点
    Nearest,
    /// 高程线性回归
    ElevationRegression,
}

impl Default for InterpolationMethod {
    fn default() -> Self {
        Self::Idw {
            power: idw::DEFAULT_POWER,
        }
    }
}

impl InterpolationMethod {
    /// 方法名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idw { .. } => "idw",
            Self::Nearest => "nearest",
            Self::ElevationRegression => "elevation_regression",
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idw { power } => write!(f, "idw(p={})", power),
            other => f.write_str(other.name()),
        }
    }
}

/// 单时刻插值器
///
/// 持有该时刻报告的站点样本和（可选的）高程趋势，可对任意多个目标位置求值。
/// 构建一次、只读共享，可在多个线程中并发调用 [`Interpolator::interpolate`]。
#[derive(Debug, Clone)]
pub struct Interpolator {
    method: InterpolationMethod,
    samples: Vec<Sample>,
    /// 参与空间插值的值（去趋势时为残差）
    values: Vec<f64>,
    trend: Option<ElevationTrend>,
}

impl Interpolator {
    /// 构建插值器，没有样本时返回 `None`
    pub fn new(method: InterpolationMethod, samples: Vec<Sample>, detrend: bool) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let trend = match method {
            InterpolationMethod::ElevationRegression => Some(ElevationTrend::fit(&samples)),
            _ if detrend => Some(ElevationTrend::fit(&samples)),
            _ => None,
        };
        let values = match &trend {
            Some(t) => t.residuals(&samples),
            None => samples.iter().map(|s| s.value).collect(),
        };
        Some(Self {
            method,
            samples,
            values,
            trend,
        })
    }

    /// 插值方法
    #[inline]
    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// 样本
    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// 高程趋势（仅在回归或去趋势时存在）
    #[inline]
    pub fn trend(&self) -> Option<ElevationTrend> {
        self.trend
    }

    /// 在目标位置和高程处求值
    pub fn interpolate(&self, position: DVec2, elevation: f64) -> f64 {
        let spatial = match self.method {
            InterpolationMethod::Idw { power } => idw::idw(position, &self.samples, &self.values, power),
            InterpolationMethod::Nearest => nearest::nearest(position, &self.samples, &self.values),
            InterpolationMethod::ElevationRegression => Some(0.0),
        }
        .unwrap_or(0.0);

        match &self.trend {
            Some(t) => spatial + t.at(elevation),
            None => spatial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, z: f64, value: f64) -> Sample {
        Sample {
            position: DVec2::new(x, 0.0),
            elevation: z,
            value,
        }
    }

    #[test]
    fn test_no_samples() {
        assert!(Interpolator::new(InterpolationMethod::default(), vec![], false).is_none());
    }

    #[test]
    fn test_regression_ignores_position() {
        let samples = vec![sample(0.0, 1000.0, 10.0), sample(100.0, 2000.0, 4.0)];
        let interp = Interpolator::new(InterpolationMethod::ElevationRegression, samples, false).unwrap();
        let a = interp.interpolate(DVec2::new(-50.0, 9.0), 3000.0);
        let b = interp.interpolate(DVec2::new(75.0, 0.0), 3000.0);
        assert_eq!(a, b);
        assert!((a + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_detrended_idw_readds_trend_at_target_elevation() {
        // 站点完全落在 -6 °C/km 的直线上，残差为 0
        let samples = vec![sample(0.0, 1000.0, 10.0), sample(10.0, 2000.0, 4.0), sample(20.0, 1500.0, 7.0)];
        let interp = Interpolator::new(InterpolationMethod::Idw { power: 2.0 }, samples, true).unwrap();
        let v = interp.interpolate(DVec2::new(3.0, 0.0), 2500.0);
        assert!((v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_plain_idw_ignores_elevation() {
        let samples = vec![sample(0.0, 1000.0, 10.0), sample(10.0, 2000.0, 4.0)];
        let interp = Interpolator::new(InterpolationMethod::Idw { power: 2.0 }, samples, false).unwrap();
        assert!(interp.trend().is_none());
        let low = interp.interpolate(DVec2::new(5.0, 0.0), 0.0);
        let high = interp.interpolate(DVec2::new(5.0, 0.0), 5000.0);
        assert_eq!(low, high);
        assert!((low - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_method_serde_shape() {
        let m: InterpolationMethod = serde_json::from_str(r#"{"type":"idw"}"#).unwrap();
        assert_eq!(m, InterpolationMethod::Idw { power: 2.0 });
        let m: InterpolationMethod = serde_json::from_str(r#"{"type":"elevation_regression"}"#).unwrap();
        assert_eq!(m, InterpolationMethod::ElevationRegression);
        assert_eq!(InterpolationMethod::Nearest.to_string(), "nearest");
    }
}
