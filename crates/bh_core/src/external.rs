// crates/bh_core/src/external.rs

//! 外部数值引擎
//!
//! 少数模块需要借助外部数值环境完成矩阵计算。核心只规定一个窄的请求/响应契约：
//! `start` / `stop` / `put` / `get` / `evaluate`，引擎内部实现不在核心范围内。
//!
//! 引擎错误是模块局部错误：模块可以自行处理，也可以通过 `?`
//! 转换为 [`BhError::ExternalEngine`] 向上传播。
//!
//! [`WorkspaceEngine`] 是一个进程内实现，只维护命名矩阵工作区，
//! 供测试和不需要真实外部环境的模块使用。

use bh_foundation::BhError;
use nalgebra::DMatrix;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// 引擎错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// 引擎未启动
    #[error("数值引擎未启动")]
    NotRunning,

    /// 引擎已在运行
    #[error("数值引擎已在运行")]
    AlreadyRunning,

    /// 工作区中没有该变量
    #[error("工作区中不存在变量 '{0}'")]
    UnknownVariable(String),

    /// 不支持的命令
    #[error("不支持的命令: {0}")]
    Unsupported(String),

    /// 引擎执行失败
    #[error("数值引擎执行失败: {0}")]
    Failed(String),
}

impl From<EngineError> for BhError {
    fn from(err: EngineError) -> Self {
        BhError::external_engine(err.to_string())
    }
}

/// 引擎结果类型
pub type EngineResult<T> = Result<T, EngineError>;

/// 外部数值引擎契约
///
/// 方法接收 `&self`，实现自行保证内部同步，引擎可在并行的逐面模块中共享。
pub trait NumericEngine: Send + Sync {
    /// 启动引擎
    fn start(&self) -> EngineResult<()>;

    /// 停止引擎
    fn stop(&self) -> EngineResult<()>;

    /// 是否在运行
    fn is_running(&self) -> bool;

    /// 写入命名矩阵
    fn put(&self, name: &str, value: DMatrix<f64>) -> EngineResult<()>;

    /// 读取命名矩阵
    fn get(&self, name: &str) -> EngineResult<DMatrix<f64>>;

    /// 执行命令
    fn evaluate(&self, command: &str) -> EngineResult<()>;

    /// 写入标量（1×1 矩阵）
    fn put_scalar(&self, name: &str, value: f64) -> EngineResult<()> {
        self.put(name, DMatrix::from_element(1, 1, value))
    }

    /// 读取标量（取矩阵首元素）
    fn get_scalar(&self, name: &str) -> EngineResult<f64> {
        let m = self.get(name)?;
        m.iter()
            .next()
            .copied()
            .ok_or_else(|| EngineError::Failed(format!("变量 '{}' 为空矩阵", name)))
    }
}

/// 进程内矩阵工作区引擎
///
/// `evaluate` 支持：
///
/// - `clear`：清空工作区
/// - `clear NAME`：删除变量
/// - `NAME = OTHER`：复制变量
#[derive(Debug, Default)]
pub struct WorkspaceEngine {
    running: AtomicBool,
    workspace: RwLock<HashMap<String, DMatrix<f64>>>,
}

impl WorkspaceEngine {
    /// 创建未启动的引擎
    pub fn new() -> Self {
        Self::default()
    }

    /// 工作区变量名（字典序）
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workspace.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(EngineError::NotRunning)
        }
    }
}

impl NumericEngine for WorkspaceEngine {
    fn start(&self) -> EngineResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyRunning);
        }
        tracing::debug!("数值引擎已启动");
        Ok(())
    }

    fn stop(&self) -> EngineResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(EngineError::NotRunning);
        }
        self.workspace.write().clear();
        tracing::debug!("数值引擎已停止");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn put(&self, name: &str, value: DMatrix<f64>) -> EngineResult<()> {
        self.ensure_running()?;
        self.workspace.write().insert(name.to_string(), value);
        Ok(())
    }

    fn get(&self, name: &str) -> EngineResult<DMatrix<f64>> {
        self.ensure_running()?;
        self.workspace
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownVariable(name.to_string()))
    }

    fn evaluate(&self, command: &str) -> EngineResult<()> {
        self.ensure_running()?;
        let command = command.trim().trim_end_matches(';').trim();
        let mut ws = self.workspace.write();

        if command == "clear" {
            ws.clear();
            return Ok(());
        }
        if let Some(name) = command.strip_prefix("clear ") {
            let name = name.trim();
            return ws
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| EngineError::UnknownVariable(name.to_string()));
        }
        if let Some((lhs, rhs)) = command.split_once('=') {
            let (lhs, rhs) = (lhs.trim(), rhs.trim());
            if is_identifier(lhs) && is_identifier(rhs) {
                let value = ws
                    .get(rhs)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownVariable(rhs.to_string()))?;
                ws.insert(lhs.to_string(), value);
                return Ok(());
            }
        }
        Err(EngineError::Unsupported(command.to_string()))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
