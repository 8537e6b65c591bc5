// crates/bh_config/src/simulation_config.rs

//! SimulationConfig - 模拟配置
//!
//! 一次模拟运行的全部输入：时间范围、流域位置、启用的模块及其参数、
//! 各强迫变量的插值方法，以及并行策略。

use bh_forcing::{InterpolationMethod, Station};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// 模拟配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// 开始时间（当地标准时，ISO-8601）
    pub start: NaiveDateTime,

    /// 结束时间（含）
    pub end: NaiveDateTime,

    /// 时间步长 [s]
    #[serde(default = "default_dt_seconds")]
    pub dt_seconds: i64,

    /// 流域代表位置
    #[serde(default)]
    pub basin: BasinConfig,

    /// 启用的模块（声明顺序即依赖排序的平局顺序）
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,

    /// 强迫插值配置
    #[serde(default)]
    pub forcing: ForcingConfig,

    /// 并行配置
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// 站点文件（JSON 数组）
    #[serde(default)]
    pub stations_file: Option<PathBuf>,
}

fn default_dt_seconds() -> i64 { 3600 }

/// 流域位置，仅用于太阳几何
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasinConfig {
    /// 纬度 [°]
    #[serde(default)]
    pub lat: f64,
    /// 经度 [°]
    #[serde(default)]
    pub lon: f64,
    /// 相对 UTC 的时区偏移 [h]
    #[serde(default)]
    pub utc_offset: f64,
}

impl Default for BasinConfig {
    fn default() -> Self {
        Self {
            lat: 0.0,
            lon: 0.0,
            utc_offset: 0.0,
        }
    }
}

/// 单个模块的配置
///
/// 同一注册名可启用多次，此时各实例需用 `instance` 区分。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// 注册名
    pub name: String,
    /// 实例名，缺省时与注册名相同
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// 模块自定义参数，原样交给模块工厂
    #[serde(default)]
    pub config: serde_json::Value,
}

impl ModuleConfig {
    /// 创建无参数的模块配置
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: None,
            config: serde_json::Value::Null,
        }
    }

    /// 指定实例名
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// 运行时使用的模块名
    #[inline]
    pub fn instance_name(&self) -> &str {
        self.instance.as_deref().unwrap_or(&self.name)
    }

    /// 附带参数
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

/// 强迫插值配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForcingConfig {
    /// 未单独指定方法的变量使用的插值方法
    #[serde(default)]
    pub default_method: InterpolationMethod,
    /// 需要分配到网格面的强迫变量
    #[serde(default)]
    pub variables: Vec<ForcingVariable>,
}

impl ForcingConfig {
    /// 变量的实际插值方法
    pub fn method_for(&self, variable: &ForcingVariable) -> InterpolationMethod {
        variable.method.unwrap_or(self.default_method)
    }

    /// 所有强迫变量名（声明顺序）
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.variables.iter().map(|v| v.name.as_str())
    }
}

/// 单个强迫变量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcingVariable {
    /// 变量名（站点观测与面变量同名）
    pub name: String,
    /// 插值方法，缺省时使用 `default_method`
    #[serde(default)]
    pub method: Option<InterpolationMethod>,
    /// 是否做高程去趋势
    #[serde(default)]
    pub detrend: bool,
    /// 无站点报告时使用的常数
    #[serde(default)]
    pub fallback: Option<f64>,
}

impl ForcingVariable {
    /// 使用默认方法、无去趋势、无回退值
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: None,
            detrend: false,
            fallback: None,
        }
    }

    /// 指定插值方法
    pub fn with_method(mut self, method: InterpolationMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// 启用去趋势
    pub fn with_detrend(mut self) -> Self {
        self.detrend = true;
        self
    }

    /// 设置回退值
    pub fn with_fallback(mut self, value: f64) -> Self {
        self.fallback = Some(value);
        self
    }
}

/// 并行策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelStrategy {
    /// 串行执行
    Sequential,
    /// 总是按面并行
    Parallel,
    /// 面数达到阈值时并行
    #[default]
    Auto,
}

/// 并行配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// 策略
    #[serde(default)]
    pub strategy: ParallelStrategy,
    /// 最小并行面数（Auto 策略下低于此值串行）
    #[serde(default = "default_min_parallel_faces")]
    pub min_parallel_faces: usize,
    /// 线程数，缺省时使用 rayon 全局线程池
    #[serde(default)]
    pub threads: Option<usize>,
}

fn default_min_parallel_faces() -> usize { 1000 }

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            strategy: ParallelStrategy::default(),
            min_parallel_faces: default_min_parallel_faces(),
            threads: None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let start = NaiveDateTime::default();
        Self {
            start,
            end: start + Duration::days(1),
            dt_seconds: default_dt_seconds(),
            basin: BasinConfig::default(),
            modules: Vec::new(),
            forcing: ForcingConfig::default(),
            parallel: ParallelConfig::default(),
            stations_file: None,
        }
    }
}

impl SimulationConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串解析并校验
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 时间步长
    #[inline]
    pub fn dt(&self) -> Duration {
        Duration::seconds(self.dt_seconds)
    }

    /// 时间步数：`start, start+dt, …` 中不晚于 `end` 的时刻个数
    pub fn n_steps(&self) -> u64 {
        if self.dt_seconds <= 0 || self.end < self.start {
            return 0;
        }
        ((self.end - self.start).num_seconds() / self.dt_seconds) as u64 + 1
    }

    /// 读取站点文件，未配置时返回空列表
    pub fn load_stations(&self) -> Result<Vec<Station>, ConfigError> {
        match &self.stations_file {
            Some(path) => crate::stations::load_stations(path),
            None => Ok(Vec::new()),
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dt_seconds <= 0 {
            return Err(ConfigError::invalid("dt_seconds", self.dt_seconds, "时间步长必须为正"));
        }
        if self.end < self.start {
            return Err(ConfigError::invalid("end", self.end, "结束时间不能早于开始时间"));
        }

        // 流域位置
        if !(-90.0..=90.0).contains(&self.basin.lat) {
            return Err(ConfigError::invalid("basin.lat", self.basin.lat, "纬度必须在 [-90, 90] 范围内"));
        }
        if !(-180.0..=180.0).contains(&self.basin.lon) {
            return Err(ConfigError::invalid("basin.lon", self.basin.lon, "经度必须在 [-180, 180] 范围内"));
        }
        if !(-12.0..=14.0).contains(&self.basin.utc_offset) {
            return Err(ConfigError::invalid(
                "basin.utc_offset",
                self.basin.utc_offset,
                "时区偏移必须在 [-12, 14] 范围内",
            ));
        }

        // 模块
        let mut seen = HashSet::new();
        for (i, m) in self.modules.iter().enumerate() {
            if m.name.trim().is_empty() {
                return Err(ConfigError::invalid(format!("modules[{}].name", i), "\"\"", "模块名不能为空"));
            }
            if let Some(instance) = &m.instance {
                if instance.trim().is_empty() {
                    return Err(ConfigError::invalid(format!("modules[{}].instance", i), "\"\"", "实例名不能为空"));
                }
            }
            if !seen.insert(m.instance_name()) {
                let key = if m.instance.is_some() { "instance" } else { "name" };
                return Err(ConfigError::invalid(
                    format!("modules[{}].{}", i, key),
                    m.instance_name(),
                    "模块重复启用，请用 instance 区分",
                ));
            }
        }

        // 强迫变量
        validate_method("forcing.default_method", &self.forcing.default_method)?;
        let mut seen = HashSet::new();
        for (i, v) in self.forcing.variables.iter().enumerate() {
            let key = format!("forcing.variables[{}]", i);
            if v.name.trim().is_empty() {
                return Err(ConfigError::invalid(format!("{}.name", key), "\"\"", "变量名不能为空"));
            }
            if !seen.insert(v.name.as_str()) {
                return Err(ConfigError::invalid(format!("{}.name", key), &v.name, "强迫变量重复"));
            }
            if let Some(method) = &v.method {
                validate_method(&format!("{}.method", key), method)?;
            }
            if let Some(fallback) = v.fallback {
                if !fallback.is_finite() {
                    return Err(ConfigError::invalid(format!("{}.fallback", key), fallback, "回退值必须为有限数"));
                }
            }
        }

        // 并行
        if self.parallel.threads == Some(0) {
            return Err(ConfigError::invalid("parallel.threads", 0, "线程数必须为正"));
        }

        Ok(())
    }
}

fn validate_method(key: &str, method: &InterpolationMethod) -> Result<(), ConfigError> {
    if let InterpolationMethod::Idw { power } = method {
        if !(power.is_finite() && *power > 0.0) {
            return Err(ConfigError::invalid(format!("{}.power", key), power, "IDW 距离指数必须为正"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_steps(), 25);
    }

    #[test]
    fn test_invalid_dt() {
        let mut config = SimulationConfig::default();
        config.dt_seconds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { key, .. }) if key == "dt_seconds"));
    }

    #[test]
    fn test_end_before_start() {
        let mut config = SimulationConfig::default();
        config.end = config.start - Duration::hours(1);
        assert!(config.validate().is_err());
        assert_eq!(config.n_steps(), 0);
    }

    #[test]
    fn test_invalid_latitude() {
        let mut config = SimulationConfig::default();
        config.basin.lat = 91.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_module() {
        let mut config = SimulationConfig::default();
        config.modules = vec![ModuleConfig::new("a"), ModuleConfig::new("a")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_instances_of_one_module() {
        let mut config = SimulationConfig::default();
        config.modules = vec![
            ModuleConfig::new("accumulator").with_instance("rain_total"),
            ModuleConfig::new("accumulator").with_instance("snow_total"),
            ModuleConfig::new("accumulator"),
        ];
        assert!(config.validate().is_ok());
        assert_eq!(config.modules[2].instance_name(), "accumulator");

        config.modules.push(ModuleConfig::new("domain_mean").with_instance("rain_total"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_idw_power() {
        let mut config = SimulationConfig::default();
        config.forcing.variables = vec![ForcingVariable::new("t").with_method(InterpolationMethod::Idw { power: 0.0 })];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_method_for_uses_default() {
        let forcing = ForcingConfig {
            default_method: InterpolationMethod::Nearest,
            variables: vec![
                ForcingVariable::new("t"),
                ForcingVariable::new("rh").with_method(InterpolationMethod::ElevationRegression),
            ],
        };
        assert_eq!(forcing.method_for(&forcing.variables[0]), InterpolationMethod::Nearest);
        assert_eq!(forcing.method_for(&forcing.variables[1]), InterpolationMethod::ElevationRegression);
        assert_eq!(forcing.names().collect::<Vec<_>>(), vec!["t", "rh"]);
    }

    #[test]
    fn test_minimal_json() {
        let json = r#"{ "start": "2020-01-01T00:00:00", "end": "2020-01-01T06:00:00" }"#;
        let config = SimulationConfig::from_json_str(json).unwrap();
        assert_eq!(config.dt_seconds, 3600);
        assert_eq!(config.n_steps(), 7);
        assert_eq!(config.parallel.strategy, ParallelStrategy::Auto);
        assert!(config.modules.is_empty());
    }

    #[test]
    fn test_missing_start_is_parse_error() {
        let json = r#"{ "end": "2020-01-01T06:00:00" }"#;
        assert!(matches!(SimulationConfig::from_json_str(json), Err(ConfigError::Parse(_))));
    }
}
