// crates/bh_core/src/global.rs

//! 全局强迫状态
//!
//! 流域范围的时钟、太阳几何和站点登记表。
//!
//! # 所有权
//!
//! `GlobalState` 由驱动器独占；每个时间步开始时驱动器调用 [`GlobalState::advance`]，
//! 之后以 `&GlobalState` 传给插值引擎和所有模块。由于模块只拿到共享引用，
//! 时间步内不会出现对时钟的写入，并行读取无需同步。

use bh_config::{BasinConfig, SimulationConfig};
use bh_forcing::{solar_position, InterpolationMethod, SolarPosition, Station};
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};

/// 全局强迫状态
#[derive(Debug, Clone)]
pub struct GlobalState {
    current: NaiveDateTime,
    dt: Duration,
    basin: BasinConfig,
    solar: SolarPosition,
    stations: Vec<Station>,
    default_method: InterpolationMethod,
    first_time_step: bool,
    step_index: u64,
}

impl GlobalState {
    /// 创建全局状态
    ///
    /// 时钟预置在 `start - dt`，第一次 [`advance`](Self::advance) 后恰好落在 `start`。
    pub fn new(start: NaiveDateTime, dt: Duration, basin: BasinConfig, stations: Vec<Station>) -> Self {
        let current = start - dt;
        Self {
            current,
            dt,
            basin,
            solar: solar_position(current, basin.lat, basin.lon, basin.utc_offset),
            stations,
            default_method: InterpolationMethod::default(),
            first_time_step: false,
            step_index: 0,
        }
    }

    /// 从模拟配置创建
    pub fn from_config(config: &SimulationConfig, stations: Vec<Station>) -> Self {
        Self::new(config.start, config.dt(), config.basin, stations)
            .with_default_method(config.forcing.default_method)
    }

    /// 设置流域默认插值方法
    pub fn with_default_method(mut self, method: InterpolationMethod) -> Self {
        self.default_method = method;
        self
    }

    /// 推进一个时间步并重算太阳位置
    ///
    /// 只有驱动器持有 `&mut GlobalState`。
    pub fn advance(&mut self) {
        self.current += self.dt;
        self.first_time_step = self.step_index == 0;
        self.step_index += 1;
        self.solar = solar_position(
            self.current,
            self.basin.lat,
            self.basin.lon,
            self.basin.utc_offset,
        );
    }

    // =========================================================================
    // 时间
    // =========================================================================

    /// 当前时间（当地标准时）
    #[inline]
    pub fn posix_time(&self) -> NaiveDateTime {
        self.current
    }

    /// 当前时间的 Unix 秒数
    #[inline]
    pub fn posix_time_int(&self) -> i64 {
        self.current.and_utc().timestamp()
    }

    /// 年
    #[inline]
    pub fn year(&self) -> i32 {
        self.current.year()
    }

    /// 月 [1, 12]
    #[inline]
    pub fn month(&self) -> u32 {
        self.current.month()
    }

    /// 日 [1, 31]
    #[inline]
    pub fn day(&self) -> u32 {
        self.current.day()
    }

    /// 时
    #[inline]
    pub fn hour(&self) -> u32 {
        self.current.hour()
    }

    /// 分
    #[inline]
    pub fn minute(&self) -> u32 {
        self.current.minute()
    }

    /// 秒
    #[inline]
    pub fn second(&self) -> u32 {
        self.current.second()
    }

    /// 时间步长 [s]
    #[inline]
    pub fn dt(&self) -> i64 {
        self.dt.num_seconds()
    }

    /// 是否为初始化后的第一个时间步
    #[inline]
    pub fn first_time_step(&self) -> bool {
        self.first_time_step
    }

    /// 已推进的时间步数
    #[inline]
    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    // =========================================================================
    // 太阳几何
    // =========================================================================

    /// 太阳高度角 [rad]
    #[inline]
    pub fn solar_el(&self) -> f64 {
        self.solar.elevation
    }

    /// 太阳方位角 [rad]，自北顺时针
    #[inline]
    pub fn solar_az(&self) -> f64 {
        self.solar.azimuth
    }

    /// 太阳位置
    #[inline]
    pub fn solar(&self) -> SolarPosition {
        self.solar
    }

    // =========================================================================
    // 站点与流域
    // =========================================================================

    /// 站点登记表
    #[inline]
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// 流域位置
    #[inline]
    pub fn basin(&self) -> &BasinConfig {
        &self.basin
    }

    /// 流域默认插值方法
    #[inline]
    pub fn default_interp_method(&self) -> InterpolationMethod {
        self.default_method
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn state(dt_minutes: i64) -> GlobalState {
        let start = NaiveDate::from_ymd_opt(2018, 12, 31)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        let basin = BasinConfig {
            lat: 51.0,
            lon: -115.0,
            utc_offset: -7.0,
        };
        GlobalState::new(start, Duration::minutes(dt_minutes), basin, Vec::new())
    }

    #[test]
    fn test_first_advance_lands_on_start() {
        let mut g = state(60);
        assert!(!g.first_time_step());
        g.advance();
        assert!(g.first_time_step());
        assert_eq!((g.year(), g.month(), g.day(), g.hour()), (2018, 12, 31, 23));
        assert_eq!(g.step_index(), 1);
    }

    #[test]
    fn test_advance_adds_exactly_dt() {
        let mut g = state(15);
        g.advance();
        let mut prev = g.posix_time();
        for _ in 0..10 {
            g.advance();
            assert_eq!(g.posix_time() - prev, Duration::minutes(15));
            assert!(!g.first_time_step());
            prev = g.posix_time();
        }
        assert_eq!(g.dt(), 900);
    }

    #[test]
    fn test_calendar_rollover() {
        let mut g = state(60);
        g.advance();
        g.advance();
        assert_eq!((g.year(), g.month(), g.day(), g.hour(), g.minute(), g.second()), (2019, 1, 1, 0, 0, 0));
        assert_eq!(g.posix_time_int(), 1_546_300_800);
    }

    #[test]
    fn test_solar_recomputed_on_advance() {
        let mut g = state(60 * 12);
        g.advance();
        let night = g.solar_el();
        g.advance(); // 当地 11:00
        assert!(g.solar_el() > night);
        assert!(g.solar_el() > 0.0);
        assert!(g.solar_az() > 0.0 && g.solar_az() < 2.0 * std::f64::consts::PI);
    }
}
