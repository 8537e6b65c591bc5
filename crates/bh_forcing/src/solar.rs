// crates/bh_forcing/src/solar.rs

//! 太阳位置
//!
//! 按 NOAA 太阳位置算法计算太阳高度角和方位角，精度约 0.01°（1800–2100 年）。
//!
//! # 约定
//!
//! - 输入时间为流域当地标准时，`utc_offset` 为相对 UTC 的小时数（东正西负）
//! - 高度角为几何高度角（不含大气折射），地平线以下为负
//! - 方位角自正北顺时针，范围 [0, 2π)
//!
//! ```
//! use bh_forcing::solar::solar_position;
//! use chrono::NaiveDate;
//!
//! let noon = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap().and_hms_opt(12, 0, 0).unwrap();
//! let sun = solar_position(noon, 50.0, 0.0, 0.0);
//! assert!(sun.elevation.to_degrees() > 63.0);
//! ```

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// 太阳位置（弧度）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SolarPosition {
    /// 高度角 [rad]
    pub elevation: f64,
    /// 方位角 [rad]，自北顺时针
    pub azimuth: f64,
}

impl SolarPosition {
    /// 太阳是否在地平线以上
    #[inline]
    pub fn is_daytime(&self) -> bool {
        self.elevation > 0.0
    }
}

/// 计算太阳位置
///
/// # 参数
/// - `local`: 当地标准时
/// - `lat`, `lon`: 流域代表点纬度、经度 [°]
/// - `utc_offset`: 时区 [h]
pub fn solar_position(local: NaiveDateTime, lat: f64, lon: f64, utc_offset: f64) -> SolarPosition {
    let offset = Duration::milliseconds((utc_offset * 3_600_000.0).round() as i64);
    let utc = local - offset;

    let unix = utc.and_utc().timestamp() as f64 + f64::from(utc.nanosecond()) * 1e-9;
    let julian_day = unix / 86_400.0 + 2_440_587.5;
    let jc = (julian_day - 2_451_545.0) / 36_525.0;

    // 几何平黄经、平近点角、轨道偏心率 [°]
    let mean_long = (280.46646 + jc * (36000.76983 + jc * 0.0003032)).rem_euclid(360.0);
    let mean_anom = 357.52911 + jc * (35999.05029 - 0.0001537 * jc);
    let ecc = 0.016708634 - jc * (0.000042037 + 0.0000001267 * jc);

    let m = mean_anom.to_radians();
    let center = m.sin() * (1.914602 - jc * (0.004817 + 0.000014 * jc))
        + (2.0 * m).sin() * (0.019993 - 0.000101 * jc)
        + (3.0 * m).sin() * 0.000289;
    let true_long = mean_long + center;
    let omega = (125.04 - 1934.136 * jc).to_radians();
    let app_long = true_long - 0.00569 - 0.00478 * omega.sin();

    let mean_obliq = 23.0 + (26.0 + (21.448 - jc * (46.815 + jc * (0.00059 - jc * 0.001813))) / 60.0) / 60.0;
    let obliq = (mean_obliq + 0.00256 * omega.cos()).to_radians();

    let declination = (obliq.sin() * app_long.to_radians().sin()).asin();

    // 时差 [min]
    let y = (obliq / 2.0).tan().powi(2);
    let l0 = mean_long.to_radians();
    let eq_time = 4.0
        * (y * (2.0 * l0).sin() - 2.0 * ecc * m.sin() + 4.0 * ecc * y * m.sin() * (2.0 * l0).cos()
            - 0.5 * y * y * (4.0 * l0).sin()
            - 1.25 * ecc * ecc * (2.0 * m).sin())
        .to_degrees();

    let utc_minutes = f64::from(utc.num_seconds_from_midnight()) / 60.0;
    let true_solar_time = (utc_minutes + eq_time + 4.0 * lon).rem_euclid(1440.0);
    let hour_angle = (true_solar_time / 4.0 - 180.0).to_radians();

    let phi = lat.to_radians();
    let cos_zenith = (phi.sin() * declination.sin() + phi.cos() * declination.cos() * hour_angle.cos())
        .clamp(-1.0, 1.0);
    let zenith = cos_zenith.acos();

    let denom = phi.cos() * zenith.sin();
    let azimuth = if denom.abs() < 1e-12 {
        // 极点或天顶：方位角无定义，按时角取向
        if hour_angle > 0.0 {
            std::f64::consts::PI * 1.5
        } else {
            std::f64::consts::FRAC_PI_2
        }
    } else {
        let cos_az = ((phi.sin() * cos_zenith - declination.sin()) / denom).clamp(-1.0, 1.0);
        let a = cos_az.acos().to_degrees();
        let deg = if hour_angle > 0.0 {
            (a + 180.0).rem_euclid(360.0)
        } else {
            (540.0 - a).rem_euclid(360.0)
        };
        deg.to_radians()
    };

    SolarPosition {
        elevation: std::f64::consts::FRAC_PI_2 - zenith,
        azimuth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::f64::consts::PI;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_equinox_noon_on_equator_is_near_zenith() {
        let sun = solar_position(at(2024, 3, 20, 12), 0.0, 0.0, 0.0);
        assert!(sun.elevation.to_degrees() > 85.0);
    }

    #[test]
    fn test_midnight_is_below_horizon() {
        let sun = solar_position(at(2024, 6, 21, 0), 50.0, 0.0, 0.0);
        assert!(!sun.is_daytime());
    }

    #[test]
    fn test_summer_solstice_noon_mid_latitude() {
        // 90 - 50 + 23.44
        let sun = solar_position(at(2024, 6, 21, 12), 50.0, 0.0, 0.0);
        assert!((sun.elevation.to_degrees() - 63.44).abs() < 0.5);
        assert!((sun.azimuth - PI).abs() < 5f64.to_radians());
    }

    #[test]
    fn test_morning_sun_is_east() {
        let sun = solar_position(at(2024, 6, 21, 6), 50.0, 0.0, 0.0);
        assert!(sun.is_daytime());
        assert!(sun.azimuth > 0.0 && sun.azimuth < PI);
        let evening = solar_position(at(2024, 6, 21, 18), 50.0, 0.0, 0.0);
        assert!(evening.azimuth > PI && evening.azimuth < 2.0 * PI);
    }

    #[test]
    fn test_utc_offset_shifts_local_time() {
        let utc = solar_position(at(2024, 1, 15, 19), 51.0, -115.0, 0.0);
        let local = solar_position(at(2024, 1, 15, 12), 51.0, -115.0, -7.0);
        assert!((utc.elevation - local.elevation).abs() < 1e-12);
        assert!((utc.azimuth - local.azimuth).abs() < 1e-12);
    }
}
