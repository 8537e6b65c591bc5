// crates/bh_forcing/src/interpolation/idw.rs

//! IDW (Inverse Distance Weighting) 插值
//!
//! # 算法原理
//!
//! 权重 $w_i = 1 / d_i^p$，归一化后 $\sum w_i = 1$：
//!
//! $$
//! z(x) = \sum_{i=1}^{n} \hat{w}_i \cdot z_i
//! $$
//!
//! 目标点与某站点重合（距离小于容差）时直接返回该站的值，避免除零。

use super::Sample;
use glam::DVec2;

/// 距离容差（小于此值视为在采样点上）
pub const DISTANCE_TOLERANCE: f64 = 1e-10;

/// 默认距离指数
pub const DEFAULT_POWER: f64 = 2.0;

/// 归一化权重
///
/// 返回与 `samples` 等长的权重，和为 1。目标与某站重合时该站权重为 1，其余为 0。
/// `samples` 为空时返回空数组。
pub fn idw_weights(target: DVec2, samples: &[Sample], power: f64) -> Vec<f64> {
    let distances: Vec<f64> = samples.iter().map(|s| s.position.distance(target)).collect();

    if let Some(hit) = distances.iter().position(|&d| d < DISTANCE_TOLERANCE) {
        let mut w = vec![0.0; samples.len()];
        w[hit] = 1.0;
        return w;
    }

    let mut w: Vec<f64> = distances.iter().map(|d| 1.0 / d.powf(power)).collect();
    let sum: f64 = w.iter().sum();
    if sum > 0.0 {
        w.iter_mut().for_each(|wi| *wi /= sum);
    }
    w
}

/// IDW 插值
///
/// `values` 与 `samples` 一一对应，允许调用方传入去趋势后的残差。
pub fn idw(target: DVec2, samples: &[Sample], values: &[f64], power: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let w = idw_weights(target, samples, power);
    Some(w.iter().zip(values).map(|(w, v)| w * v).sum())
}
