// crates/bh_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `BhError` 枚举和 `BhResult` 类型别名，用于整个项目的错误处理。
//!
//! # 错误分类
//!
//! 1. **配置期错误**（致命，在任何时间步运行之前报告）：
//!    `DuplicateProvider`、`UnmetDependency`、`DependencyCycle`、`UnknownModule`
//! 2. **运行期错误**（致命，中止当前时间步和整个运行）：
//!    `UndefinedVariable`、`NoStationData`
//! 3. **模块局部错误**：`ExternalEngine`，仅当模块选择传播时才上升为核心错误
//!
//! # 示例
//!
//! ```
//! use bh_foundation::error::{BhError, BhResult};
//!
//! fn check_module() -> BhResult<()> {
//!     Err(BhError::unmet_dependency("canopy", "t"))
//! }
//!
//! let err = check_module().unwrap_err();
//! assert!(err.is_configuration_error());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type BhResult<T> = Result<T, BhError>;

/// BasinHydro 错误类型
#[derive(Error, Debug)]
pub enum BhError {
    // ========================================================================
    // 依赖解析错误（配置期）
    // ========================================================================
    /// 同一变量被多个提供者声明
    #[error("变量 '{variable}' 被重复提供: '{first}' 与 '{second}'")]
    DuplicateProvider {
        /// 变量名
        variable: String,
        /// 先声明的提供者
        first: String,
        /// 后声明的提供者
        second: String,
    },

    /// 依赖的变量没有任何提供者
    #[error("模块 '{module}' 依赖的变量 '{variable}' 没有提供者")]
    UnmetDependency {
        /// 请求方模块
        module: String,
        /// 缺失的变量名
        variable: String,
    },

    /// 依赖图存在环
    #[error("模块依赖存在环: {modules:?}")]
    DependencyCycle {
        /// 参与环的模块名
        modules: Vec<String>,
    },

    /// 模块工厂未注册
    #[error("未知模块: '{name}' (已注册: {available:?})")]
    UnknownModule {
        /// 请求的模块名
        name: String,
        /// 已注册的模块名
        available: Vec<String>,
    },

    /// 模块名重复
    #[error("模块名重复: '{name}'")]
    DuplicateModule {
        /// 模块名
        name: String,
    },

    // ========================================================================
    // 变量存储错误（运行期）
    // ========================================================================
    /// 当前时间步读取了未写入的变量
    #[error("面 {face} 上的变量 '{variable}' 在当前时间步未定义")]
    UndefinedVariable {
        /// 变量名
        variable: String,
        /// 面索引
        face: usize,
    },

    /// 变量名未在变量表中声明
    #[error("未声明的变量: '{variable}'")]
    UnknownVariable {
        /// 变量名
        variable: String,
    },

    /// 变量名非法
    #[error("无效的变量名: '{name}'")]
    InvalidVariableName {
        /// 变量名
        name: String,
    },

    /// 写入者不是该变量的提供者
    #[error("'{module}' 无权写入变量 '{variable}'（提供者: {owner}）")]
    UnauthorizedWrite {
        /// 写入者（模块名或 forcing）
        module: String,
        /// 变量名
        variable: String,
        /// 声明的提供者
        owner: String,
    },

    // ========================================================================
    // 模块数据槽错误
    // ========================================================================
    /// 面上不存在该模块的数据槽
    #[error("面 {face} 上没有模块 {module} 的数据槽")]
    SlotMissing {
        /// 模块 ID
        module: u32,
        /// 面索引
        face: usize,
    },

    /// 数据槽类型与请求类型不一致
    #[error("模块 {module} 的数据槽类型不匹配: 期望 {expected}")]
    SlotTypeMismatch {
        /// 模块 ID
        module: u32,
        /// 请求的类型名
        expected: &'static str,
    },

    /// 数据槽已存在（禁止重复创建）
    #[error("面 {face} 上模块 {module} 的数据槽已存在")]
    SlotExists {
        /// 模块 ID
        module: u32,
        /// 面索引
        face: usize,
    },

    // ========================================================================
    // 气象强迫错误
    // ========================================================================
    /// 当前时间步没有站点报告该变量且未配置回退值
    #[error("变量 '{variable}' 在 {time} 没有站点数据")]
    NoStationData {
        /// 变量名
        variable: String,
        /// 时间步时刻
        time: String,
    },

    /// 外部数值引擎失败
    #[error("外部数值引擎错误: {message}")]
    ExternalEngine {
        /// 引擎报告的错误
        message: String,
    },

    // ========================================================================
    // 驱动器错误
    // ========================================================================
    /// 驱动器状态不允许该操作
    #[error("驱动器状态错误: 期望 {expected}, 实际 {actual}")]
    InvalidState {
        /// 期望的状态
        expected: String,
        /// 实际的状态
        actual: String,
    },

    // ========================================================================
    // 通用错误
    // ========================================================================
    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        /// 可选的底层 IO 错误
        #[source]
        source: Option<std::io::Error>,
    },

    /// 文件不存在
    #[error("文件不存在: {path}")]
    FileNotFound {
        /// 未找到的路径
        path: PathBuf,
    },

    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 数据超出范围
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 无效网格拓扑
    #[error("无效的网格拓扑: {message}")]
    InvalidMesh {
        /// 具体错误信息
        message: String,
    },

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl BhError {
    /// 重复提供者
    pub fn duplicate_provider(
        variable: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::DuplicateProvider {
            variable: variable.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    /// 未满足的依赖
    pub fn unmet_dependency(module: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::UnmetDependency {
            module: module.into(),
            variable: variable.into(),
        }
    }

    /// 依赖环
    pub fn dependency_cycle(modules: Vec<String>) -> Self {
        Self::DependencyCycle { modules }
    }

    /// 未知模块
    pub fn unknown_module(name: impl Into<String>, available: Vec<String>) -> Self {
        Self::UnknownModule {
            name: name.into(),
            available,
        }
    }

    /// 模块名重复
    pub fn duplicate_module(name: impl Into<String>) -> Self {
        Self::DuplicateModule { name: name.into() }
    }

    /// 未定义变量
    pub fn undefined_variable(variable: impl Into<String>, face: usize) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
            face,
        }
    }

    /// 未声明变量
    pub fn unknown_variable(variable: impl Into<String>) -> Self {
        Self::UnknownVariable {
            variable: variable.into(),
        }
    }

    /// 越权写入
    pub fn unauthorized_write(
        module: impl Into<String>,
        variable: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self::UnauthorizedWrite {
            module: module.into(),
            variable: variable.into(),
            owner: owner.into(),
        }
    }

    /// 无站点数据
    pub fn no_station_data(variable: impl Into<String>, time: impl ToString) -> Self {
        Self::NoStationData {
            variable: variable.into(),
            time: time.to_string(),
        }
    }

    /// 外部引擎错误
    pub fn external_engine(message: impl Into<String>) -> Self {
        Self::ExternalEngine {
            message: message.into(),
        }
    }

    /// 状态错误
    pub fn invalid_state(expected: impl ToString, actual: impl ToString) -> Self {
        Self::InvalidState {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// 从IO错误创建
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 文件不存在
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 数据超出范围
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 无效网格
    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// ========================================================================
// 分类与验证辅助方法
// ========================================================================

impl BhError {
    /// 是否为配置期错误（在任何时间步之前报告）
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateProvider { .. }
                | Self::UnmetDependency { .. }
                | Self::DependencyCycle { .. }
                | Self::UnknownModule { .. }
                | Self::DuplicateModule { .. }
                | Self::Config { .. }
        )
    }

    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> BhResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查值是否在范围内
    #[inline]
    pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> BhResult<()> {
        if value < min || value > max || value.is_nan() {
            Err(Self::out_of_range(field, value, min, max))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> BhResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 标准库错误转换
// ========================================================================

impl From<std::io::Error> for BhError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

// ========================================================================
// 辅助宏
// ========================================================================

/// 条件不满足时提前返回错误
///
/// ```
/// use bh_foundation::{ensure, BhError, BhResult};
///
/// fn positive(v: f64) -> BhResult<f64> {
///     ensure!(v > 0.0, BhError::invalid_input("必须为正"));
///     Ok(v)
/// }
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

/// 解包 `Option`，为 `None` 时提前返回错误
#[macro_export]
macro_rules! require {
    ($opt:expr, $err:expr $(,)?) => {
        match $opt {
            Some(v) => v,
            None => return Err($err.into()),
        }
    };
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmet_dependency_names_module_and_variable() {
        let err = BhError::unmet_dependency("canopy", "iswr");
        let msg = err.to_string();
        assert!(msg.contains("canopy"));
        assert!(msg.contains("iswr"));
    }

    #[test]
    fn test_duplicate_provider_display() {
        let err = BhError::duplicate_provider("t", "lapse_a", "lapse_b");
        let msg = err.to_string();
        assert!(msg.contains("lapse_a"));
        assert!(msg.contains("lapse_b"));
    }

    #[test]
    fn test_cycle_lists_modules() {
        let err = BhError::dependency_cycle(vec!["a".into(), "b".into()]);
        assert!(err.to_string().contains("\"a\""));
    }

    #[test]
    fn test_unauthorized_write_names_writer_and_variable() {
        let err = BhError::unauthorized_write("rogue", "t", "forcing");
        let msg = err.to_string();
        assert!(msg.contains("rogue"));
        assert!(msg.contains("'t'"));
        assert!(msg.contains("forcing"));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(BhError::unmet_dependency("m", "x").is_configuration_error());
        assert!(BhError::dependency_cycle(vec![]).is_configuration_error());
        assert!(!BhError::undefined_variable("x", 0).is_configuration_error());
        assert!(!BhError::no_station_data("t", "2020-01-01").is_configuration_error());
    }

    #[test]
    fn test_check_size() {
        assert!(BhError::check_size("test", 10, 10).is_ok());
        assert!(BhError::check_size("test", 10, 5).is_err());
    }

    #[test]
    fn test_check_range_rejects_nan() {
        assert!(BhError::check_range("lat", 45.0, -90.0, 90.0).is_ok());
        assert!(BhError::check_range("lat", 91.0, -90.0, 90.0).is_err());
        assert!(BhError::check_range("lat", f64::NAN, -90.0, 90.0).is_err());
    }

    #[test]
    fn test_check_index() {
        assert!(BhError::check_index("Face", 5, 10).is_ok());
        assert!(BhError::check_index("Face", 10, 10).is_err());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: BhError = io_err.into();
        assert!(matches!(err, BhError::Io { .. }));
    }

    #[test]
    fn test_ensure_macro() {
        fn check(value: i32) -> BhResult<()> {
            ensure!(value > 0, BhError::invalid_input("value must be positive"));
            Ok(())
        }

        assert!(check(1).is_ok());
        assert!(check(-1).is_err());
    }

    #[test]
    fn test_require_macro() {
        fn get_value(opt: Option<i32>) -> BhResult<i32> {
            let v = require!(opt, BhError::unknown_variable("value"));
            Ok(v)
        }

        assert_eq!(get_value(Some(42)).unwrap(), 42);
        assert!(get_value(None).is_err());
    }
}
