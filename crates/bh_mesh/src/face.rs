// crates/bh_mesh/src/face.rs

//! 网格面
//!
//! 面是空间计算的基本单元。几何在网格构建时确定且不再改变；
//! 变量存储和模块数据槽在每个时间步由模块和插值引擎修改。
//!
//! 模块在逐面并行模式下只会拿到 `&mut Face`，因此无法触及其他面的数据。

use crate::slots::{SlotKey, SlotStore};
use crate::store::{VariableId, VariableStore, VariableTable, Writer};
use bh_foundation::{BhError, BhResult, FaceIndex, VertexIndex};
use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// 面几何（构建后只读）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceGeometry {
    /// 三个顶点索引（逆时针）
    pub vertices: [VertexIndex; 3],
    /// 跨边邻居，依次对应边 (v0,v1)、(v1,v2)、(v2,v0)；边界边为 INVALID
    pub neighbors: [FaceIndex; 3],
    /// 形心 (x, y, z)，z 为三个顶点高程的平均值
    pub centroid: DVec3,
    /// 单位法向量（z 分量非负）
    pub normal: DVec3,
    /// 平面投影面积 [m²]
    pub area: f64,
    /// 坡度 [rad]
    pub slope: f64,
    /// 坡向 [rad]，自北顺时针，平坦面为 0
    pub aspect: f64,
}

/// 网格面
#[derive(Debug)]
pub struct Face {
    index: FaceIndex,
    geometry: FaceGeometry,
    variables: VariableStore,
    slots: SlotStore,
}

impl Face {
    /// 由几何创建面，变量表为空
    pub fn new(index: FaceIndex, geometry: FaceGeometry) -> Self {
        Self {
            index,
            geometry,
            variables: VariableStore::default(),
            slots: SlotStore::new(),
        }
    }

    // =========================================================================
    // 几何
    // =========================================================================

    /// 面索引
    #[inline]
    pub fn index(&self) -> FaceIndex {
        self.index
    }

    /// 几何信息
    #[inline]
    pub fn geometry(&self) -> &FaceGeometry {
        &self.geometry
    }

    /// 形心平面坐标
    #[inline]
    pub fn center(&self) -> DVec2 {
        self.geometry.centroid.truncate()
    }

    /// 形心高程 [m]
    #[inline]
    pub fn elevation(&self) -> f64 {
        self.geometry.centroid.z
    }

    /// 坡度 [rad]
    #[inline]
    pub fn slope(&self) -> f64 {
        self.geometry.slope
    }

    /// 坡向 [rad]
    #[inline]
    pub fn aspect(&self) -> f64 {
        self.geometry.aspect
    }

    /// 面积 [m²]
    #[inline]
    pub fn area(&self) -> f64 {
        self.geometry.area
    }

    /// 有效邻居
    pub fn neighbors(&self) -> impl Iterator<Item = FaceIndex> + '_ {
        self.geometry.neighbors.iter().copied().filter(|n| n.is_valid())
    }

    /// 是否为边界面
    pub fn is_boundary(&self) -> bool {
        self.geometry.neighbors.iter().any(|n| !n.is_valid())
    }

    // =========================================================================
    // 变量存储
    // =========================================================================

    /// 读取当前时间步的变量值
    ///
    /// 本时间步未写入时返回 `UndefinedVariable`，这说明执行顺序有误。
    pub fn get(&self, name: &str) -> BhResult<f64> {
        self.variables
            .value(name)?
            .ok_or_else(|| BhError::undefined_variable(name, self.index.as_usize()))
    }

    /// 读取变量，未设置时为 `None`
    #[inline]
    pub fn try_get(&self, name: &str) -> BhResult<Option<f64>> {
        self.variables.value(name)
    }

    /// 写入当前时间步的变量值
    ///
    /// 当前写入者不是该变量的提供者时返回 `UnauthorizedWrite`。
    #[inline]
    pub fn set(&mut self, name: &str, value: f64) -> BhResult<()> {
        self.variables.set(name, value)
    }

    /// 按缓存的下标读取
    pub fn get_by_id(&self, id: VariableId) -> BhResult<f64> {
        self.variables.value_by_id(id).ok_or_else(|| {
            let name = self.variables.table().name(id).unwrap_or("?");
            BhError::undefined_variable(name, self.index.as_usize())
        })
    }

    /// 按缓存的下标写入
    #[inline]
    pub fn set_by_id(&mut self, id: VariableId, value: f64) -> BhResult<()> {
        self.variables.set_by_id(id, value)
    }

    /// 当前写入者
    #[inline]
    pub fn writer(&self) -> Writer {
        self.variables.writer()
    }

    /// 设置当前写入者，由驱动器在调用模块前后设置
    #[inline]
    pub fn set_writer(&mut self, writer: Writer) {
        self.variables.set_writer(writer);
    }

    /// 变量在当前时间步是否已设置
    #[inline]
    pub fn is_set(&self, name: &str) -> bool {
        self.variables.is_set(name)
    }

    /// 变量存储只读视图
    #[inline]
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub(crate) fn bind_variables(&mut self, table: Arc<VariableTable>) {
        self.variables.rebind(table);
    }

    pub(crate) fn clear_variables(&mut self) {
        self.variables.clear();
    }

    // =========================================================================
    // 模块数据槽
    // =========================================================================

    /// 为模块创建数据槽（每面每模块一次）
    pub fn make_slot<T: Any + Send + Sync>(&mut self, key: SlotKey<T>, value: T) -> BhResult<()> {
        let face = self.index.as_usize();
        self.slots.insert(key, value).map_err(|e| with_face(e, face))
    }

    /// 获取模块数据槽
    pub fn slot<T: Any + Send + Sync>(&self, key: SlotKey<T>) -> BhResult<&T> {
        let face = self.index.as_usize();
        self.slots.get(key).map_err(|e| with_face(e, face))
    }

    /// 获取模块数据槽（可变）
    pub fn slot_mut<T: Any + Send + Sync>(&mut self, key: SlotKey<T>) -> BhResult<&mut T> {
        let face = self.index.as_usize();
        self.slots.get_mut(key).map_err(|e| with_face(e, face))
    }

    /// 槽集合只读视图
    #[inline]
    pub fn slots(&self) -> &SlotStore {
        &self.slots
    }
}

/// 为槽错误补全面索引
fn with_face(err: BhError, face: usize) -> BhError {
    match err {
        BhError::SlotMissing { module, .. } => BhError::SlotMissing { module, face },
        BhError::SlotExists { module, .. } => BhError::SlotExists { module, face },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bh_foundation::ModuleId;

    fn flat_face() -> Face {
        let geometry = FaceGeometry {
            vertices: [VertexIndex::new(0), VertexIndex::new(1), VertexIndex::new(2)],
            neighbors: [FaceIndex::new(1), FaceIndex::INVALID, FaceIndex::INVALID],
            centroid: DVec3::new(1.0, 2.0, 300.0),
            normal: DVec3::Z,
            area: 0.5,
            slope: 0.0,
            aspect: 0.0,
        };
        let mut face = Face::new(FaceIndex::new(4), geometry);
        face.bind_variables(Arc::new(VariableTable::from_names(["t", "rh"]).unwrap()));
        face
    }

    #[test]
    fn test_geometry_accessors() {
        let face = flat_face();
        assert_eq!(face.center(), DVec2::new(1.0, 2.0));
        assert_eq!(face.elevation(), 300.0);
        assert_eq!(face.neighbors().collect::<Vec<_>>(), vec![FaceIndex::new(1)]);
        assert!(face.is_boundary());
    }

    #[test]
    fn test_get_undefined_reports_face() {
        let face = flat_face();
        match face.get("t") {
            Err(BhError::UndefinedVariable { variable, face }) => {
                assert_eq!(variable, "t");
                assert_eq!(face, 4);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_set_then_get() {
        let mut face = flat_face();
        face.set("rh", 55.0).unwrap();
        assert_eq!(face.get("rh").unwrap(), 55.0);
        face.clear_variables();
        assert!(face.get("rh").is_err());
        assert_eq!(face.try_get("rh").unwrap(), None);
    }

    #[test]
    fn test_writer_scope_applies_to_id_writes() {
        let geometry = flat_face().geometry().clone();
        let mut table = VariableTable::new();
        let t = table.declare("t", Writer::Forcing).unwrap();
        let rh = table.declare("rh", Writer::Module(ModuleId::new(0))).unwrap();
        let mut face = Face::new(FaceIndex::new(2), geometry);
        face.bind_variables(Arc::new(table));

        face.set_writer(Writer::Module(ModuleId::new(0)));
        face.set_by_id(rh, 40.0).unwrap();
        assert!(matches!(face.set_by_id(t, 1.0), Err(BhError::UnauthorizedWrite { .. })));
        assert!(!face.is_set("t"));

        // 重新绑定解除限制
        face.bind_variables(face.variables().table().clone());
        assert_eq!(face.writer(), Writer::Unrestricted);
        face.set_by_id(t, 1.0).unwrap();
    }

    #[test]
    fn test_get_by_id_undefined_names_variable() {
        let face = flat_face();
        let id = face.variables().table().id("rh").unwrap();
        match face.get_by_id(id) {
            Err(BhError::UndefinedVariable { variable, .. }) => assert_eq!(variable, "rh"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_slot_errors_carry_face_index() {
        let mut face = flat_face();
        let key = SlotKey::<f64>::new(ModuleId::new(0));
        assert!(matches!(face.slot(key), Err(BhError::SlotMissing { face: 4, .. })));
        face.make_slot(key, 0.0).unwrap();
        assert!(matches!(face.make_slot(key, 1.0), Err(BhError::SlotExists { face: 4, .. })));
        *face.slot_mut(key).unwrap() = 9.0;
        assert_eq!(*face.slot(key).unwrap(), 9.0);
    }
}
