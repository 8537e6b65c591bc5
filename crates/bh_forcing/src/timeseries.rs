// crates/bh_forcing/src/timeseries.rs

//! 观测时间序列
//!
//! 气象站对单个变量的观测记录。与连续强迫不同，观测只在整点时刻有效：
//! 查询时间必须与某条记录完全相等，否则视为该站在此刻未报告。
//!
//! # 缺测
//!
//! 缺测值以 NaN 存储；JSON 中写作 `null`。
//!
//! ```
//! use bh_forcing::ObservationSeries;
//! use chrono::NaiveDate;
//!
//! let t0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let t1 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(1, 0, 0).unwrap();
//!
//! let series = ObservationSeries::new(vec![t0, t1], vec![-3.0, f64::NAN]).unwrap();
//! assert_eq!(series.value_at(t0), Some(-3.0));
//! assert_eq!(series.value_at(t1), None);
//! ```

use bh_foundation::{BhError, BhResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 单变量观测序列
///
/// # 约束
///
/// - 时间严格单调递增
/// - 时间与值数组长度相等
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries", into = "RawSeries")]
pub struct ObservationSeries {
    times: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl ObservationSeries {
    /// 从时间和值数组创建
    pub fn new(times: Vec<NaiveDateTime>, values: Vec<f64>) -> BhResult<Self> {
        BhError::check_size("observation values", times.len(), values.len())?;
        if let Some(i) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(BhError::invalid_input(format!(
                "观测时间必须严格递增: times[{}]={} >= times[{}]={}",
                i,
                times[i],
                i + 1,
                times[i + 1]
            )));
        }
        Ok(Self { times, values })
    }

    /// 从 (时间, 值) 点对创建
    pub fn from_points(points: Vec<(NaiveDateTime, f64)>) -> BhResult<Self> {
        let (times, values) = points.into_iter().unzip();
        Self::new(times, values)
    }

    /// 指定时刻的观测，未记录或缺测时为 `None`
    pub fn value_at(&self, time: NaiveDateTime) -> Option<f64> {
        self.times
            .binary_search(&time)
            .ok()
            .map(|i| self.values[i])
            .filter(|v| !v.is_nan())
    }

    /// 时间范围
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((*self.times.first()?, *self.times.last()?))
    }

    /// 记录数量（含缺测）
    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// 时间数组
    #[inline]
    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    /// 值数组
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 有效观测数量
    pub fn n_valid(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }
}

/// 序列化形式：缺测以 `null` 表示
#[derive(Serialize, Deserialize)]
struct RawSeries {
    times: Vec<NaiveDateTime>,
    values: Vec<Option<f64>>,
}

impl TryFrom<RawSeries> for ObservationSeries {
    type Error = BhError;

    fn try_from(raw: RawSeries) -> Result<Self, Self::Error> {
        let values = raw.values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        Self::new(raw.times, values)
    }
}

impl From<ObservationSeries> for RawSeries {
    fn from(series: ObservationSeries) -> Self {
        Self {
            times: series.times,
            values: series
                .values
                .into_iter()
                .map(|v| (!v.is_nan()).then_some(v))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 6, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_exact_match_only() {
        let s = ObservationSeries::new(vec![t(0), t(2)], vec![1.0, 3.0]).unwrap();
        assert_eq!(s.value_at(t(0)), Some(1.0));
        assert_eq!(s.value_at(t(2)), Some(3.0));
        // 两条记录之间不做时间插值
        assert_eq!(s.value_at(t(1)), None);
        assert_eq!(s.value_at(t(0) + Duration::minutes(30)), None);
    }

    #[test]
    fn test_nan_is_missing() {
        let s = ObservationSeries::new(vec![t(0), t(1)], vec![f64::NAN, 2.0]).unwrap();
        assert_eq!(s.value_at(t(0)), None);
        assert_eq!(s.n_valid(), 1);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_rejects_unsorted_times() {
        let r = ObservationSeries::new(vec![t(2), t(1)], vec![0.0, 0.0]);
        assert!(matches!(r, Err(BhError::InvalidInput { .. })));
        let r = ObservationSeries::new(vec![t(1), t(1)], vec![0.0, 0.0]);
        assert!(r.is_err());
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let r = ObservationSeries::new(vec![t(0)], vec![0.0, 1.0]);
        assert!(matches!(r, Err(BhError::SizeMismatch { .. })));
    }

    #[test]
    fn test_time_range() {
        let s = ObservationSeries::from_points(vec![(t(3), 1.0), (t(5), 2.0)]).unwrap();
        assert_eq!(s.time_range(), Some((t(3), t(5))));
        let empty = ObservationSeries::new(vec![], vec![]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.time_range(), None);
    }
}
