// crates/bh_core/src/lib.rs

//! BasinHydro 核心
//!
//! 把可插拔的过程模块组织成每个时间步运行一次的计算流水线：
//!
//! - [`resolver`]: 根据 provides / depends 求确定性的执行顺序
//! - [`global`]: 流域时钟、太阳几何与站点登记表
//! - [`forcing`]: 把站点观测插值到所有面
//! - [`parallel`]: 逐面并行分发（rayon）
//! - [`driver`]: `Unconfigured → Resolved → Initialized → Running → Finished` 状态机
//! - [`registry`] / [`builtin`]: 名称到模块工厂的显式注册
//! - [`external`]: 外部数值引擎契约
//!
//! # 示例
//!
//! ```
//! use bh_config::SimulationConfig;
//! use bh_core::{Core, CoreState, GlobalState, Module};
//! use bh_mesh::{Face, MeshBuilder};
//!
//! let mut core = Core::new(&SimulationConfig::default(), vec![]).unwrap();
//! core.add_module(
//!     Module::per_face_fn("a", |f: &mut Face, _: &GlobalState| f.set("x", 5.0)).with_provides(["x"]),
//! )
//! .unwrap();
//! core.add_module(
//!     Module::per_face_fn("b", |f: &mut Face, _: &GlobalState| {
//!         let x = f.get("x")?;
//!         f.set("y", 2.0 * x)
//!     })
//!     .with_depends(["x"])
//!     .with_provides(["y"]),
//! )
//! .unwrap();
//!
//! core.resolve().unwrap();
//! core.initialize(MeshBuilder::rectangular(2, 2, 1.0, 1.0, |_, _| 0.0).build().unwrap()).unwrap();
//! core.run().unwrap();
//!
//! assert_eq!(core.state(), CoreState::Finished);
//! assert!(core.mesh().unwrap().faces().iter().all(|f| f.get("y").unwrap() == 10.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtin;
pub mod driver;
pub mod external;
pub mod forcing;
pub mod global;
pub mod module;
pub mod parallel;
pub mod registry;
pub mod resolver;

// 重新导出核心类型
pub use builtin::{register_builtins, Accumulator, DomainMean, LinearTransform};
pub use driver::{Core, CoreState};
pub use external::{EngineError, EngineResult, NumericEngine, WorkspaceEngine};
pub use forcing::{ForcingChannel, ForcingEngine};
pub use global::GlobalState;
pub use module::{FaceModule, MeshModule, Module, ModuleKind, ParallelMode};
pub use parallel::{ExecutionMetrics, FaceDispatcher};
pub use registry::{ModuleFactory, ModuleRegistry};
pub use resolver::{resolve, Declaration, FORCING_PROVIDER};
