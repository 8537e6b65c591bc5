// crates/bh_forcing/src/station.rs

//! 气象站
//!
//! 固定位置的观测来源。坐标与网格处于同一投影坐标系（x, y, 高程），
//! 站点在加载后不可变。

use crate::interpolation::Sample;
use crate::timeseries::ObservationSeries;
use bh_foundation::{BhError, BhResult};
use chrono::NaiveDateTime;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 气象站
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    id: String,
    x: f64,
    y: f64,
    elevation: f64,
    #[serde(default)]
    series: BTreeMap<String, ObservationSeries>,
}

impl Station {
    /// 创建无观测的站点
    pub fn new(id: impl Into<String>, x: f64, y: f64, elevation: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            elevation,
            series: BTreeMap::new(),
        }
    }

    /// 添加变量观测序列（构建器风格）
    pub fn with_series(mut self, variable: impl Into<String>, series: ObservationSeries) -> Self {
        self.insert_series(variable, series);
        self
    }

    /// 添加或替换变量观测序列
    pub fn insert_series(&mut self, variable: impl Into<String>, series: ObservationSeries) {
        self.series.insert(variable.into(), series);
    }

    /// 站点标识
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 平面位置
    #[inline]
    pub fn position(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    /// 高程 [m]
    #[inline]
    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    /// 站点是否记录该变量
    #[inline]
    pub fn has_variable(&self, variable: &str) -> bool {
        self.series.contains_key(variable)
    }

    /// 站点记录的变量名（字典序）
    pub fn variables(&self) -> impl Iterator<Item = &str> + '_ {
        self.series.keys().map(String::as_str)
    }

    /// 变量观测序列
    #[inline]
    pub fn series(&self, variable: &str) -> Option<&ObservationSeries> {
        self.series.get(variable)
    }

    /// 指定时刻的观测值，未报告时为 `None`
    pub fn observation(&self, variable: &str, time: NaiveDateTime) -> Option<f64> {
        self.series.get(variable)?.value_at(time)
    }

    /// 指定时刻的插值样本
    pub fn sample(&self, variable: &str, time: NaiveDateTime) -> Option<Sample> {
        self.observation(variable, time).map(|value| Sample {
            position: self.position(),
            elevation: self.elevation,
            value,
        })
    }

    /// 校验坐标为有限值
    pub fn validate(&self) -> BhResult<()> {
        if !(self.x.is_finite() && self.y.is_finite() && self.elevation.is_finite()) {
            return Err(BhError::invalid_input(format!(
                "站点 {} 坐标无效: ({}, {}, {})",
                self.id, self.x, self.y, self.elevation
            )));
        }
        Ok(())
    }
}

/// 收集所有站点在指定时刻报告的样本
pub fn collect_samples(stations: &[Station], variable: &str, time: NaiveDateTime) -> Vec<Sample> {
    stations.iter().filter_map(|s| s.sample(variable, time)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn station(id: &str, t: f64) -> Station {
        let series = ObservationSeries::new(vec![noon()], vec![t]).unwrap();
        Station::new(id, 1.0, 2.0, 1500.0).with_series("t", series)
    }

    #[test]
    fn test_variables() {
        let s = station("a", 4.0);
        assert!(s.has_variable("t"));
        assert!(!s.has_variable("rh"));
        assert_eq!(s.variables().collect::<Vec<_>>(), vec!["t"]);
    }

    #[test]
    fn test_sample_carries_location() {
        let s = station("a", 4.0);
        let sample = s.sample("t", noon()).unwrap();
        assert_eq!(sample.position, DVec2::new(1.0, 2.0));
        assert_eq!(sample.elevation, 1500.0);
        assert_eq!(sample.value, 4.0);
        assert!(s.sample("rh", noon()).is_none());
    }

    #[test]
    fn test_collect_skips_non_reporting() {
        let stations = vec![station("a", 1.0), station("b", f64::NAN), Station::new("c", 0.0, 0.0, 0.0)];
        let samples = collect_samples(&stations, "t", noon());
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 1.0);
    }

    #[test]
    fn test_validate() {
        assert!(station("a", 0.0).validate().is_ok());
        assert!(Station::new("bad", f64::NAN, 0.0, 0.0).validate().is_err());
    }
}
