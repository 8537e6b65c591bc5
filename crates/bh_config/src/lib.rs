// crates/bh_config/src/lib.rs

//! BasinHydro Config Layer
//!
//! 配置层，负责把 JSON 配置和站点文件读入为强类型结构并校验。
//!
//! # 模块概览
//!
//! - [`simulation_config`]: SimulationConfig 模拟配置
//! - [`stations`]: 站点文件读取
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 4: bh_core       ─> uses SimulationConfig
//! Layer 3: bh_config     ─> SimulationConfig, ConfigError (本层)
//! Layer 2: bh_mesh, bh_forcing
//! Layer 1: bh_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod simulation_config;
pub mod stations;

// 重导出核心类型
pub use error::ConfigError;
pub use simulation_config::{
    BasinConfig, ForcingConfig, ForcingVariable, ModuleConfig, ParallelConfig, ParallelStrategy,
    SimulationConfig,
};
pub use stations::{load_stations, parse_stations};
