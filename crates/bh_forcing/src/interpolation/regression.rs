// crates/bh_forcing/src/interpolation/regression.rs

//! 高程线性回归
//!
//! 对站点值与高程做最小二乘拟合 `v = intercept + slope * z`。
//! 该趋势既可直接作为插值结果，也可用于去趋势：先减去趋势再做空间插值，
//! 最后在面高程处加回趋势。

use super::Sample;
use serde::{Deserialize, Serialize};

/// 高程线性趋势
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElevationTrend {
    /// 截距
    pub intercept: f64,
    /// 斜率 [单位/m]（即递减率的相反数）
    pub slope: f64,
}

impl ElevationTrend {
    /// 最小二乘拟合
    ///
    /// 少于两个站点或高程无差异时斜率为 0，截距取均值。
    pub fn fit(samples: &[Sample]) -> Self {
        let n = samples.len() as f64;
        if samples.is_empty() {
            return Self::default();
        }
        let mean_z = samples.iter().map(|s| s.elevation).sum::<f64>() / n;
        let mean_v = samples.iter().map(|s| s.value).sum::<f64>() / n;

        let (sxy, sxx) = samples.iter().fold((0.0, 0.0), |(sxy, sxx), s| {
            let dz = s.elevation - mean_z;
            (sxy + dz * (s.value - mean_v), sxx + dz * dz)
        });

        let slope = if samples.len() < 2 || sxx < 1e-12 { 0.0 } else { sxy / sxx };
        Self {
            intercept: mean_v - slope * mean_z,
            slope,
        }
    }

    /// 在高程处求值
    #[inline]
    pub fn at(&self, elevation: f64) -> f64 {
        self.intercept + self.slope * elevation
    }

    /// 站点残差
    pub fn residuals(&self, samples: &[Sample]) -> Vec<f64> {
        samples.iter().map(|s| s.value - self.at(s.elevation)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    fn sample(z: f64, value: f64) -> Sample {
        Sample {
            position: DVec2::ZERO,
            elevation: z,
            value,
        }
    }

    #[test]
    fn test_exact_linear_fit() {
        // 递减率 6.5 °C/km
        let samples = vec![sample(1000.0, 10.0), sample(2000.0, 3.5), sample(3000.0, -3.0)];
        let trend = ElevationTrend::fit(&samples);
        assert!((trend.slope + 0.0065).abs() < 1e-12);
        assert!((trend.at(1500.0) - 6.75).abs() < 1e-9);
        assert!(trend.residuals(&samples).iter().all(|r| r.abs() < 1e-9));
    }

    #[test]
    fn test_single_station_has_zero_slope() {
        let trend = ElevationTrend::fit(&[sample(1200.0, 4.0)]);
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.at(0.0), 4.0);
    }

    #[test]
    fn test_equal_elevations_have_zero_slope() {
        let trend = ElevationTrend::fit(&[sample(500.0, 2.0), sample(500.0, 4.0)]);
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.at(9000.0), 3.0);
    }
}
