// crates/bh_core/src/driver.rs

//! 时间步驱动器
//!
//! [`Core`] 组合依赖解析、变量表、强迫分配与模块调度，按状态机推进：
//!
//! ```text
//! Unconfigured ──resolve──> Resolved ──initialize──> Initialized ──step──> Running ──> Finished
//!       │                      │                          │                  │
//!       └──────────────────────┴──────── 任意致命错误 ─────┴──────────────────┴──> Failed
//! ```
//!
//! 每个时间步：
//!
//! 1. 清空所有面的变量（数据槽保留）
//! 2. 推进全局时钟
//! 3. 强迫分配写入所有面（屏障）
//! 4. 按解析顺序运行模块；逐面模块完成全部面后才开始下一个模块
//!
//! 时间步内任何错误都会终止整个运行并进入 `Failed`，不存在跳过某个面的情况。
//!
//! 模块只能写入自己 `provides` 的变量，强迫变量只能由强迫分配写入。
//! 驱动器在调用模块前设置写入者 [`Writer`]，越权写入返回 `UnauthorizedWrite`。

use crate::forcing::ForcingEngine;
use crate::global::GlobalState;
use crate::module::{Module, ModuleKind};
use crate::parallel::{ExecutionMetrics, FaceDispatcher};
use crate::registry::ModuleRegistry;
use crate::resolver::{resolve, Declaration};
use bh_config::SimulationConfig;
use bh_forcing::Station;
use bh_foundation::{BhError, BhResult, ModuleId};
use bh_mesh::{Mesh, VariableTable, Writer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace};

// ============================================================
// 状态
// ============================================================

/// 驱动器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoreState {
    /// 已创建，模块可继续添加
    Unconfigured,
    /// 执行顺序已确定
    Resolved,
    /// 网格已绑定，模块已初始化
    Initialized,
    /// 运行中
    Running,
    /// 正常结束
    Finished,
    /// 因致命错误终止
    Failed,
}

impl CoreState {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// 是否可以推进时间步
    pub fn can_step(&self) -> bool {
        matches!(self, Self::Initialized | Self::Running)
    }
}

impl fmt::Display for CoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unconfigured => "Unconfigured",
            Self::Resolved => "Resolved",
            Self::Initialized => "Initialized",
            Self::Running => "Running",
            Self::Finished => "Finished",
            Self::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

// ============================================================
// 驱动器
// ============================================================

/// 模拟核心
pub struct Core {
    state: CoreState,
    /// 注册顺序，下标即 `ModuleId`
    modules: Vec<Module>,
    /// 解析后的执行顺序
    order: Vec<usize>,
    forcing: ForcingEngine,
    global: GlobalState,
    mesh: Option<Mesh>,
    dispatcher: FaceDispatcher,
    n_steps: u64,
    metrics: Vec<ExecutionMetrics>,
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("state", &self.state)
            .field("modules", &self.modules.iter().map(Module::name).collect::<Vec<_>>())
            .field("order", &self.order)
            .field("n_steps", &self.n_steps)
            .field("step_index", &self.global.step_index())
            .finish()
    }
}

impl Core {
    /// 由配置创建空驱动器（不含模块）
    pub fn new(config: &SimulationConfig, stations: Vec<Station>) -> BhResult<Self> {
        config.validate()?;
        for s in &stations {
            s.validate()?;
        }
        Ok(Self {
            state: CoreState::Unconfigured,
            modules: Vec::new(),
            order: Vec::new(),
            forcing: ForcingEngine::from_config(&config.forcing),
            global: GlobalState::from_config(config, stations),
            mesh: None,
            dispatcher: FaceDispatcher::new(config.parallel)?,
            n_steps: config.n_steps(),
            metrics: Vec::new(),
        })
    }

    /// 由配置创建，并从注册表实例化配置中启用的模块
    ///
    /// 模块名取配置中的实例名，缺省为注册名。
    pub fn from_config(
        config: &SimulationConfig,
        registry: &ModuleRegistry,
        stations: Vec<Station>,
    ) -> BhResult<Self> {
        let mut core = Self::new(config, stations)?;
        for m in &config.modules {
            let module = registry.create(&m.name, &m.config)?.with_name(m.instance_name());
            core.add_module(module)?;
        }
        Ok(core)
    }

    /// 添加模块
    pub fn add_module(&mut self, module: Module) -> BhResult<ModuleId> {
        self.expect_state(CoreState::Unconfigured)?;
        if self.modules.iter().any(|m| m.name() == module.name()) {
            return Err(BhError::duplicate_module(module.name()));
        }
        let id = ModuleId::from(self.modules.len());
        debug!("添加模块 '{}' ({}), id = {}", module.name(), module.mode(), id);
        self.modules.push(module);
        self.metrics.push(ExecutionMetrics::default());
        Ok(id)
    }

    /// 强迫分配引擎（仅在解析前可修改）
    pub fn forcing_mut(&mut self) -> BhResult<&mut ForcingEngine> {
        self.expect_state(CoreState::Unconfigured)?;
        Ok(&mut self.forcing)
    }

    // =========================================================================
    // 状态转换
    // =========================================================================

    /// `Unconfigured → Resolved`：解析模块执行顺序
    pub fn resolve(&mut self) -> BhResult<()> {
        self.expect_state(CoreState::Unconfigured)?;

        let decls: Vec<Declaration<'_>> = self
            .modules
            .iter()
            .map(|m| Declaration {
                name: m.name(),
                depends: m.depends(),
                provides: m.provides(),
            })
            .collect();
        let forcing = self.forcing.names();

        match resolve(&decls, &forcing) {
            Ok(order) => {
                self.order = order;
                self.state = CoreState::Resolved;
                info!("模块执行顺序: [{}]", self.order_names().join(", "));
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// `Resolved → Initialized`：绑定网格并按解析顺序初始化模块
    ///
    /// 变量表依次登记强迫变量和各模块（按执行顺序）提供的变量，
    /// 并记录每个变量的唯一写入者。
    pub fn initialize(&mut self, mut mesh: Mesh) -> BhResult<()> {
        self.expect_state(CoreState::Resolved)?;

        let table = match build_table(&self.forcing, &self.modules, &self.order) {
            Ok(t) => Arc::new(t),
            Err(e) => return Err(self.fail(e)),
        };
        mesh.bind_variables(Arc::clone(&table));
        if let Err(e) = self.forcing.bind(&table) {
            return Err(self.fail(e));
        }

        for &i in &self.order {
            let module = &mut self.modules[i];
            let id = ModuleId::from(i);
            mesh.set_writer(Writer::Module(id));
            let result = match module.kind_mut() {
                ModuleKind::PerFace(m) => m.init(&mut mesh, &self.global, id),
                ModuleKind::WholeMesh(m) => m.init(&mut mesh, &self.global, id),
            };
            mesh.set_writer(Writer::Unrestricted);
            if let Err(e) = result {
                error!("模块 '{}' 初始化失败: {}", module.name(), e);
                self.state = CoreState::Failed;
                return Err(e);
            }
        }

        info!(
            "初始化完成: {} 个面, {} 个变量, {} 个模块, {} 个时间步",
            mesh.n_faces(),
            table.len(),
            self.modules.len(),
            self.n_steps
        );
        self.mesh = Some(mesh);
        self.state = CoreState::Initialized;
        Ok(())
    }

    /// 推进一个时间步
    ///
    /// 最后一个时间步完成后进入 `Finished`。
    pub fn step(&mut self) -> BhResult<()> {
        if !self.state.can_step() {
            return Err(BhError::invalid_state("Initialized | Running", self.state));
        }
        if self.global.step_index() >= self.n_steps {
            self.state = CoreState::Finished;
            return Ok(());
        }
        self.state = CoreState::Running;

        match self.run_step() {
            Ok(()) => {
                if self.global.step_index() >= self.n_steps {
                    info!("模拟完成: {} 个时间步", self.n_steps);
                    self.state = CoreState::Finished;
                }
                Ok(())
            }
            Err(e) => {
                error!("时间步 {} ({}) 失败: {}", self.global.step_index(), self.global.posix_time(), e);
                Err(self.fail(e))
            }
        }
    }

    /// 运行到结束
    pub fn run(&mut self) -> BhResult<()> {
        self.run_with(|_, _| Ok(()))
    }

    /// 运行到结束，每个时间步完成后调用观察者
    pub fn run_with<F>(&mut self, mut observer: F) -> BhResult<()>
    where
        F: FnMut(&Mesh, &GlobalState) -> BhResult<()>,
    {
        if !self.state.can_step() {
            return Err(BhError::invalid_state("Initialized | Running", self.state));
        }
        while self.state != CoreState::Finished {
            let before = self.global.step_index();
            self.step()?;
            if self.global.step_index() == before {
                continue;
            }
            if let Some(mesh) = &self.mesh {
                if let Err(e) = observer(mesh, &self.global) {
                    return Err(self.fail(e));
                }
            }
        }
        Ok(())
    }

    fn run_step(&mut self) -> BhResult<()> {
        let mesh = self
            .mesh
            .as_mut()
            .ok_or_else(|| BhError::internal("网格未绑定"))?;

        mesh.clear_variables();
        self.global.advance();
        debug!(
            "时间步 {}/{}: {}",
            self.global.step_index(),
            self.n_steps,
            self.global.posix_time()
        );

        self.forcing.distribute(mesh, &self.global, &self.dispatcher)?;

        for &i in &self.order {
            let module = &mut self.modules[i];
            let metrics = &mut self.metrics[i];
            let start = Instant::now();
            run_module(ModuleId::from(i), module, mesh, &self.global, &self.dispatcher, metrics)?;
            trace!("模块 '{}' 耗时 {:?}", module.name(), start.elapsed());
        }
        Ok(())
    }

    fn expect_state(&self, expected: CoreState) -> BhResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BhError::invalid_state(expected, self.state))
        }
    }

    fn fail(&mut self, e: BhError) -> BhError {
        self.state = CoreState::Failed;
        e
    }

    // =========================================================================
    // 访问器
    // =========================================================================

    /// 当前状态
    #[inline]
    pub fn state(&self) -> CoreState {
        self.state
    }

    /// 已注册模块（注册顺序）
    #[inline]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// 执行顺序中的模块名
    pub fn order_names(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.modules[i].name()).collect()
    }

    /// 全局状态
    #[inline]
    pub fn global(&self) -> &GlobalState {
        &self.global
    }

    /// 网格（初始化后可用）
    #[inline]
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    /// 取回网格
    pub fn into_mesh(self) -> Option<Mesh> {
        self.mesh
    }

    /// 总时间步数
    #[inline]
    pub fn n_steps(&self) -> u64 {
        self.n_steps
    }

    /// 已完成的时间步数
    #[inline]
    pub fn steps_completed(&self) -> u64 {
        self.global.step_index()
    }

    /// 分发器
    #[inline]
    pub fn dispatcher(&self) -> &FaceDispatcher {
        &self.dispatcher
    }

    /// 强迫分配引擎
    #[inline]
    pub fn forcing(&self) -> &ForcingEngine {
        &self.forcing
    }

    /// 各模块累计指标（注册顺序）
    pub fn module_metrics(&self) -> impl Iterator<Item = (&str, &ExecutionMetrics)> + '_ {
        self.modules.iter().map(Module::name).zip(self.metrics.iter())
    }
}

/// 建立变量表：强迫变量归强迫分配，其余变量归其提供模块
fn build_table(forcing: &ForcingEngine, modules: &[Module], order: &[usize]) -> BhResult<VariableTable> {
    let mut table = VariableTable::new();
    table.set_module_names(modules.iter().map(Module::name));
    for name in forcing.names() {
        table.declare(name, Writer::Forcing)?;
    }
    for &i in order {
        let owner = Writer::Module(ModuleId::from(i));
        for name in modules[i].provides() {
            table.declare(name, owner)?;
        }
    }
    Ok(table)
}

/// 按并行模式分发模块的一个时间步
fn run_module(
    id: ModuleId,
    module: &mut Module,
    mesh: &mut Mesh,
    global: &GlobalState,
    dispatcher: &FaceDispatcher,
    metrics: &mut ExecutionMetrics,
) -> BhResult<()> {
    let writer = Writer::Module(id);
    match module.kind_mut() {
        ModuleKind::PerFace(m) => {
            let m = &**m;
            dispatcher.for_each_face_timed(mesh.faces_mut(), metrics, |face| {
                face.set_writer(writer);
                let result = m.run(face, global);
                face.set_writer(Writer::Unrestricted);
                result
            })
        }
        ModuleKind::WholeMesh(m) => {
            let start = Instant::now();
            mesh.set_writer(writer);
            let result = m.run(mesh, global);
            mesh.set_writer(Writer::Unrestricted);
            result?;
            metrics.record(mesh.n_faces(), false, start.elapsed());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bh_mesh::MeshBuilder;
    use chrono::{Duration, NaiveDate};

    fn config(hours: i64) -> SimulationConfig {
        let start = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        SimulationConfig {
            start,
            end: start + Duration::hours(hours),
            ..Default::default()
        }
    }

    fn mesh() -> Mesh {
        MeshBuilder::rectangular(2, 2, 1.0, 1.0, |_, _| 0.0).build().unwrap()
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CoreState::Initialized.to_string(), "Initialized");
        assert!(CoreState::Failed.is_terminal());
        assert!(!CoreState::Resolved.can_step());
    }

    #[test]
    fn test_lifecycle() {
        let mut core = Core::new(&config(2), vec![]).unwrap();
        core.add_module(Module::per_face_fn("one", |f: &mut bh_mesh::Face, _: &GlobalState| f.set("one", 1.0)).with_provides(["one"]))
            .unwrap();
        assert_eq!(core.state(), CoreState::Unconfigured);
        core.resolve().unwrap();
        assert_eq!(core.state(), CoreState::Resolved);
        core.initialize(mesh()).unwrap();
        assert_eq!(core.state(), CoreState::Initialized);
        core.step().unwrap();
        assert_eq!(core.state(), CoreState::Running);
        core.run().unwrap();
        assert_eq!(core.state(), CoreState::Finished);
        assert_eq!(core.steps_completed(), 3);
    }

    #[test]
    fn test_misuse_is_invalid_state() {
        let mut core = Core::new(&config(1), vec![]).unwrap();
        assert!(matches!(core.step(), Err(BhError::InvalidState { .. })));
        assert!(matches!(core.initialize(mesh()), Err(BhError::InvalidState { .. })));
        core.resolve().unwrap();
        let late = Module::per_face_fn("late", |_, _| Ok(()));
        assert!(matches!(core.add_module(late), Err(BhError::InvalidState { .. })));
        // 误用不改变状态
        assert_eq!(core.state(), CoreState::Resolved);
    }

    #[test]
    fn test_duplicate_module_name() {
        let mut core = Core::new(&config(1), vec![]).unwrap();
        core.add_module(Module::per_face_fn("m", |_, _| Ok(()))).unwrap();
        let err = core.add_module(Module::whole_mesh_fn("m", |_, _| Ok(())));
        assert!(matches!(err, Err(BhError::DuplicateModule { .. })));
    }
}
