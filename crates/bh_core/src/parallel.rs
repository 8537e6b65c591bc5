// crates/bh_core/src/parallel.rs

//! 逐面并行分发
//!
//! 对网格所有面执行同一操作，按策略选择串行或 rayon 工作窃取并行。
//! 面之间相互独立（操作只拿到 `&mut Face`），并行无需任何同步。
//!
//! # 策略
//!
//! - `Sequential`: 完全串行，适用于小网格或调试
//! - `Parallel`: 总是并行
//! - `Auto`: 面数达到 `min_parallel_faces` 时并行
//!
//! # 错误
//!
//! 任意面出错时仍会完成其余面的调用，然后返回面索引最小的错误，
//! 因此串行与并行报告的错误一致。

use bh_config::{ParallelConfig, ParallelStrategy};
use bh_foundation::{BhError, BhResult, FaceIndex};
use bh_mesh::Face;
use rayon::prelude::*;
use std::time::{Duration, Instant};

// ============================================================
// 性能指标
// ============================================================

/// 执行指标
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    /// 总调用次数
    pub total_calls: usize,
    /// 并行调用次数
    pub parallel_calls: usize,
    /// 串行调用次数
    pub sequential_calls: usize,
    /// 总耗时
    pub total_duration: Duration,
    /// 处理的面总数
    pub total_faces: usize,
}

impl ExecutionMetrics {
    /// 记录一次执行
    pub fn record(&mut self, n_faces: usize, is_parallel: bool, duration: Duration) {
        self.total_calls += 1;
        self.total_faces += n_faces;
        self.total_duration += duration;
        if is_parallel {
            self.parallel_calls += 1;
        } else {
            self.sequential_calls += 1;
        }
    }

    /// 重置指标
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 平均每面耗时
    pub fn avg_time_per_face(&self) -> Duration {
        if self.total_faces > 0 {
            Duration::from_secs_f64(self.total_duration.as_secs_f64() / self.total_faces as f64)
        } else {
            Duration::ZERO
        }
    }

    /// 平均每次调用耗时
    pub fn avg_time_per_call(&self) -> Duration {
        if self.total_calls > 0 {
            Duration::from_secs_f64(self.total_duration.as_secs_f64() / self.total_calls as f64)
        } else {
            Duration::ZERO
        }
    }
}

// ============================================================
// 分发器
// ============================================================

/// 逐面分发器
pub struct FaceDispatcher {
    config: ParallelConfig,
    /// 指定线程数时的专用线程池
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for FaceDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceDispatcher")
            .field("config", &self.config)
            .field("threads", &self.n_threads())
            .finish()
    }
}

impl Default for FaceDispatcher {
    fn default() -> Self {
        Self {
            config: ParallelConfig::default(),
            pool: None,
        }
    }
}

impl FaceDispatcher {
    /// 创建分发器，指定线程数时建立专用线程池
    pub fn new(config: ParallelConfig) -> BhResult<Self> {
        let pool = match config.threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("bh-worker-{}", i))
                    .build()
                    .map_err(|e| BhError::internal(format!("线程池创建失败: {}", e)))?,
            ),
            None => None,
        };
        Ok(Self { config, pool })
    }

    /// 串行分发器
    pub fn sequential() -> Self {
        Self {
            config: ParallelConfig {
                strategy: ParallelStrategy::Sequential,
                ..ParallelConfig::default()
            },
            pool: None,
        }
    }

    /// 配置
    #[inline]
    pub fn config(&self) -> &ParallelConfig {
        &self.config
    }

    /// 工作线程数
    pub fn n_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// 该面数下是否并行
    pub fn should_parallelize(&self, n_faces: usize) -> bool {
        match self.config.strategy {
            ParallelStrategy::Sequential => false,
            ParallelStrategy::Parallel => n_faces > 1,
            ParallelStrategy::Auto => n_faces >= self.config.min_parallel_faces.max(2),
        }
    }

    /// 对每个面执行操作
    ///
    /// 返回是否以并行方式执行。
    pub fn for_each_face<F>(&self, faces: &mut [Face], op: F) -> BhResult<bool>
    where
        F: Fn(&mut Face) -> BhResult<()> + Send + Sync,
    {
        let call = |face: &mut Face| -> Option<(FaceIndex, BhError)> {
            let idx = face.index();
            op(face).err().map(|e| (idx, e))
        };

        if !self.should_parallelize(faces.len()) {
            let first = faces.iter_mut().filter_map(call).min_by_key(|(idx, _)| *idx);
            return first.map_or(Ok(false), |(_, e)| Err(e));
        }

        let mut run = || faces.par_iter_mut().filter_map(call).min_by_key(|(idx, _)| *idx);
        let first = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };
        first.map_or(Ok(true), |(_, e)| Err(e))
    }

    /// 带计时的 [`for_each_face`](Self::for_each_face)
    pub fn for_each_face_timed<F>(
        &self,
        faces: &mut [Face],
        metrics: &mut ExecutionMetrics,
        op: F,
    ) -> BhResult<()>
    where
        F: Fn(&mut Face) -> BhResult<()> + Send + Sync,
    {
        let n = faces.len();
        let start = Instant::now();
        let parallel = self.for_each_face(faces, op)?;
        metrics.record(n, parallel, start.elapsed());
        Ok(())
    }
}
