// crates/bh_core/src/registry.rs

//! 模块注册表
//!
//! 名称到工厂函数的显式映射。配置文件中的模块名在这里查找，
//! 工厂用模块的 JSON 参数构造实例。

use crate::module::Module;
use bh_foundation::{BhError, BhResult};
use std::collections::BTreeMap;
use std::fmt;

/// 模块工厂
pub type ModuleFactory = Box<dyn Fn(&serde_json::Value) -> BhResult<Module> + Send + Sync>;

/// 模块注册表
#[derive(Default)]
pub struct ModuleRegistry {
    factories: BTreeMap<String, ModuleFactory>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

impl ModuleRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 含全部内置模块的注册表
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // 内置名称互不相同，注册不会失败
        if let Err(e) = crate::builtin::register_builtins(&mut registry) {
            tracing::error!("内置模块注册失败: {}", e);
        }
        registry
    }

    /// 注册工厂
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> BhResult<()>
    where
        F: Fn(&serde_json::Value) -> BhResult<Module> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(BhError::duplicate_module(name));
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// 按名称构造模块
    pub fn create(&self, name: &str, config: &serde_json::Value) -> BhResult<Module> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| BhError::unknown_module(name, self.names().into_iter().map(String::from).collect()))?;
        factory(config)
    }

    /// 已注册名称（字典序）
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// 是否已注册
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// 注册数量
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtins_registered() {
        let r = ModuleRegistry::with_builtins();
        assert_eq!(r.names(), vec!["accumulator", "domain_mean", "linear_transform"]);
        let m = r
            .create("linear_transform", &json!({ "input": "a", "output": "b" }))
            .unwrap();
        assert_eq!(m.name(), "linear_transform");
    }

    #[test]
    fn test_unknown_module_lists_available() {
        let r = ModuleRegistry::with_builtins();
        match r.create("snowpack", &json!({})) {
            Err(BhError::UnknownModule { name, available }) => {
                assert_eq!(name, "snowpack");
                assert_eq!(available.len(), 3);
            }
            other => panic!("unexpected: {:?}", other.map(|m| m.name().to_string())),
        }
    }

    #[test]
    fn test_duplicate_registration() {
        let mut r = ModuleRegistry::new();
        r.register("noop", |_| Ok(Module::per_face_fn("noop", |_, _| Ok(())))).unwrap();
        let err = r.register("noop", |_| Ok(Module::per_face_fn("noop", |_, _| Ok(()))));
        assert!(matches!(err, Err(BhError::DuplicateModule { .. })));
        assert!(r.contains("noop"));
        assert_eq!(r.len(), 1);
    }
}
