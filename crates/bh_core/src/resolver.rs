// crates/bh_core/src/resolver.rs

//! 依赖解析
//!
//! 根据模块声明的 provides / depends 集合建立有向图（提供者 → 使用者），
//! 用 Kahn 算法求拓扑序。入度为零的候选按声明顺序出队，
//! 相同配置的多次运行得到完全相同的执行顺序。
//!
//! # 错误
//!
//! - 同一变量被两个提供者声明：`DuplicateProvider`
//! - 依赖的变量无人提供：`UnmetDependency`
//! - 依赖成环：`DependencyCycle`
//!
//! 强迫变量作为叶子输入，由插值引擎提供，视为始终满足。

use bh_foundation::{BhError, BhResult};
use std::collections::{BTreeSet, HashMap};

/// 强迫变量的提供者名称（用于错误报告）
pub const FORCING_PROVIDER: &str = "forcing";

/// 参与解析的模块声明
#[derive(Debug, Clone, Copy)]
pub struct Declaration<'a> {
    /// 模块名
    pub name: &'a str,
    /// 读取的变量
    pub depends: &'a [String],
    /// 写入的变量
    pub provides: &'a [String],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Forcing,
    Module(usize),
}

/// 解析执行顺序
///
/// 返回模块在 `modules` 中的下标，按执行顺序排列。
pub fn resolve(modules: &[Declaration<'_>], forcing: &[&str]) -> BhResult<Vec<usize>> {
    let mut providers: HashMap<&str, Provider> = forcing.iter().map(|&n| (n, Provider::Forcing)).collect();

    for (i, m) in modules.iter().enumerate() {
        for var in m.provides {
            match providers.get(var.as_str()) {
                None => {
                    providers.insert(var.as_str(), Provider::Module(i));
                }
                Some(Provider::Module(j)) if *j == i => {}
                Some(first) => {
                    let first = match first {
                        Provider::Forcing => FORCING_PROVIDER,
                        Provider::Module(j) => modules[*j].name,
                    };
                    return Err(BhError::duplicate_provider(var.as_str(), first, m.name));
                }
            }
        }
    }

    // 邻接表：提供者 → 使用者
    let n = modules.len();
    let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    let mut in_degree = vec![0usize; n];
    for (i, m) in modules.iter().enumerate() {
        for var in m.depends {
            match providers.get(var.as_str()) {
                None => return Err(BhError::unmet_dependency(m.name, var.as_str())),
                Some(Provider::Forcing) => {}
                Some(Provider::Module(j)) => {
                    if *j == i {
                        return Err(BhError::dependency_cycle(vec![m.name.to_string()]));
                    }
                    if successors[*j].insert(i) {
                        in_degree[i] += 1;
                    }
                }
            }
        }
    }

    // Kahn，候选集按下标有序
    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &s in &successors[i] {
            in_degree[s] -= 1;
            if in_degree[s] == 0 {
                ready.insert(s);
            }
        }
    }

    if order.len() < n {
        let members = cycle_members(&successors, &in_degree);
        return Err(BhError::dependency_cycle(
            members.into_iter().map(|i| modules[i].name.to_string()).collect(),
        ));
    }

    Ok(order)
}

/// 剩余节点中反复剔除没有剩余后继的节点（环的下游），得到环上的模块
fn cycle_members(successors: &[BTreeSet<usize>], in_degree: &[usize]) -> Vec<usize> {
    let mut remaining: BTreeSet<usize> = (0..in_degree.len()).filter(|&i| in_degree[i] > 0).collect();
    loop {
        let sinks: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| !successors[i].iter().any(|s| remaining.contains(s)))
            .collect();
        if sinks.is_empty() {
            break;
        }
        for s in sinks {
            remaining.remove(&s);
        }
    }
    remaining.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decl {
        name: &'static str,
        depends: Vec<String>,
        provides: Vec<String>,
    }

    fn decl(name: &'static str, depends: &[&str], provides: &[&str]) -> Decl {
        Decl {
            name,
            depends: depends.iter().map(|s| s.to_string()).collect(),
            provides: provides.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn run(decls: &[Decl], forcing: &[&str]) -> BhResult<Vec<&'static str>> {
        let views: Vec<Declaration<'_>> = decls
            .iter()
            .map(|d| Declaration {
                name: d.name,
                depends: &d.depends,
                provides: &d.provides,
            })
            .collect();
        resolve(&views, forcing).map(|order| order.into_iter().map(|i| decls[i].name).collect())
    }

    #[test]
    fn test_producer_before_consumer() {
        let decls = vec![decl("B", &["x"], &["y"]), decl("A", &[], &["x"])];
        assert_eq!(run(&decls, &[]).unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn test_declaration_order_tie_break() {
        let decls = vec![
            decl("c", &["t"], &["c_out"]),
            decl("a", &["t"], &["a_out"]),
            decl("b", &["t"], &["b_out"]),
        ];
        assert_eq!(run(&decls, &["t"]).unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_diamond() {
        let decls = vec![
            decl("sink", &["l", "r"], &["out"]),
            decl("right", &["src"], &["r"]),
            decl("left", &["src"], &["l"]),
            decl("root", &["t"], &["src"]),
        ];
        assert_eq!(run(&decls, &["t"]).unwrap(), vec!["root", "right", "left", "sink"]);
    }

    #[test]
    fn test_duplicate_provider() {
        let decls = vec![decl("a", &[], &["t"]), decl("b", &[], &["t"])];
        match run(&decls, &[]) {
            Err(BhError::DuplicateProvider { variable, first, second }) => {
                assert_eq!(variable, "t");
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_module_cannot_provide_forcing_variable() {
        let decls = vec![decl("lapse", &[], &["t"])];
        assert!(matches!(
            run(&decls, &["t"]),
            Err(BhError::DuplicateProvider { ref first, .. }) if first == FORCING_PROVIDER
        ));
    }

    #[test]
    fn test_unmet_dependency_names_module_and_variable() {
        let decls = vec![decl("snow", &["t", "swe"], &["melt"])];
        match run(&decls, &["t"]) {
            Err(BhError::UnmetDependency { module, variable }) => {
                assert_eq!(module, "snow");
                assert_eq!(variable, "swe");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_cycle_reports_members_only() {
        let decls = vec![
            decl("A", &["b"], &["a"]),
            decl("B", &["a"], &["b"]),
            decl("downstream", &["a"], &["d"]),
        ];
        match run(&decls, &[]) {
            Err(BhError::DependencyCycle { modules }) => assert_eq!(modules, vec!["A", "B"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let decls = vec![decl("loop", &["x"], &["x"])];
        assert!(matches!(run(&decls, &[]), Err(BhError::DependencyCycle { .. })));
    }

    #[test]
    fn test_deterministic() {
        let decls = vec![
            decl("e", &["d"], &["e_"]),
            decl("d", &["a", "b"], &["d"]),
            decl("b", &["t"], &["b"]),
            decl("a", &["t"], &["a"]),
        ];
        let first = run(&decls, &["t"]).unwrap();
        for _ in 0..20 {
            assert_eq!(run(&decls, &["t"]).unwrap(), first);
        }
        assert_eq!(first, vec!["b", "a", "d", "e"]);
    }

    #[test]
    fn test_empty() {
        assert!(run(&[], &["t"]).unwrap().is_empty());
    }
}
