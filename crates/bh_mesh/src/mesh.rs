// crates/bh_mesh/src/mesh.rs

//! 非结构三角网格
//!
//! # 设计要点
//!
//! 1. **拓扑不可变**：构建后面数、顶点数和连接关系不再改变
//! 2. **面属性可变**：变量存储和模块数据槽随时间步更新
//! 3. **空间索引**：内置 R-tree 用于点定位与最近面查询
//!
//! # 示例
//!
//! ```rust
//! use bh_mesh::MeshBuilder;
//!
//! // 两个三角形组成的单位正方形
//! let mut b = MeshBuilder::new();
//! let v0 = b.add_vertex(0.0, 0.0, 10.0);
//! let v1 = b.add_vertex(1.0, 0.0, 10.0);
//! let v2 = b.add_vertex(1.0, 1.0, 12.0);
//! let v3 = b.add_vertex(0.0, 1.0, 12.0);
//! b.add_triangle(v0, v1, v2);
//! b.add_triangle(v0, v2, v3);
//!
//! let mesh = b.build().unwrap();
//! assert_eq!(mesh.n_faces(), 2);
//! assert_eq!(mesh.neighbors(0.into()).count(), 1);
//! ```

use crate::face::{Face, FaceGeometry};
use crate::spatial_index::{FaceSpatialIndex, SpatialBounds};
use crate::store::{VariableTable, Writer};
use bh_foundation::{BhError, BhResult, FaceIndex, VertexIndex};
use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// 退化三角形面积阈值
const DEGENERATE_AREA: f64 = 1e-12;

/// 网格顶点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// 坐标 (x, y, 高程)
    pub position: DVec3,
}

/// 网格统计
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MeshStatistics {
    /// 面数量
    pub n_faces: usize,
    /// 顶点数量
    pub n_vertices: usize,
    /// 边界面数量
    pub n_boundary_faces: usize,
    /// 最小面积
    pub min_area: f64,
    /// 最大面积
    pub max_area: f64,
    /// 总面积
    pub total_area: f64,
    /// 最低形心高程
    pub min_elevation: f64,
    /// 最高形心高程
    pub max_elevation: f64,
}

/// 非结构三角网格
#[derive(Debug)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    faces: Vec<Face>,
    spatial: FaceSpatialIndex,
    variables: Arc<VariableTable>,
}

impl Mesh {
    // =========================================================================
    // 基本访问
    // =========================================================================

    /// 面数量
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// 顶点数量
    #[inline]
    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// 获取面
    #[inline]
    pub fn face(&self, idx: FaceIndex) -> BhResult<&Face> {
        self.faces
            .get(idx.as_usize())
            .ok_or_else(|| BhError::index_out_of_bounds("Face", idx.as_usize(), self.faces.len()))
    }

    /// 获取面（可变）
    #[inline]
    pub fn face_mut(&mut self, idx: FaceIndex) -> BhResult<&mut Face> {
        let len = self.faces.len();
        self.faces
            .get_mut(idx.as_usize())
            .ok_or_else(|| BhError::index_out_of_bounds("Face", idx.as_usize(), len))
    }

    /// 所有面
    #[inline]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// 所有面（可变），供逐面并行分发使用
    #[inline]
    pub fn faces_mut(&mut self) -> &mut [Face] {
        &mut self.faces
    }

    /// 获取顶点
    #[inline]
    pub fn vertex(&self, idx: VertexIndex) -> Option<&Vertex> {
        self.vertices.get(idx.as_usize())
    }

    /// 所有顶点
    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// 面的有效邻居
    pub fn neighbors(&self, idx: FaceIndex) -> impl Iterator<Item = FaceIndex> + '_ {
        self.faces
            .get(idx.as_usize())
            .into_iter()
            .flat_map(|f| f.neighbors())
    }

    // =========================================================================
    // 空间查询
    // =========================================================================

    /// 包含点的面
    #[inline]
    pub fn locate(&self, x: f64, y: f64) -> Option<FaceIndex> {
        self.spatial.locate(x, y)
    }

    /// 形心最近的面
    #[inline]
    pub fn nearest_face(&self, x: f64, y: f64) -> Option<FaceIndex> {
        self.spatial.nearest(x, y)
    }

    /// 形心在半径内的面
    #[inline]
    pub fn faces_within(&self, x: f64, y: f64, radius: f64) -> Vec<FaceIndex> {
        self.spatial.within_radius(x, y, radius)
    }

    /// 网格平面边界
    #[inline]
    pub fn bounds(&self) -> Option<SpatialBounds> {
        self.spatial.bounds()
    }

    // =========================================================================
    // 变量表
    // =========================================================================

    /// 当前绑定的变量表
    #[inline]
    pub fn variable_table(&self) -> &Arc<VariableTable> {
        &self.variables
    }

    /// 为所有面绑定变量表，清空现有值
    pub fn bind_variables(&mut self, table: Arc<VariableTable>) {
        for face in &mut self.faces {
            face.bind_variables(Arc::clone(&table));
        }
        self.variables = table;
    }

    /// 清空所有面的当前时间步值
    pub fn clear_variables(&mut self) {
        for face in &mut self.faces {
            face.clear_variables();
        }
    }

    /// 为所有面设置当前写入者
    pub fn set_writer(&mut self, writer: Writer) {
        for face in &mut self.faces {
            face.set_writer(writer);
        }
    }

    // =========================================================================
    // 统计
    // =========================================================================

    /// 网格统计
    pub fn statistics(&self) -> MeshStatistics {
        if self.faces.is_empty() {
            return MeshStatistics {
                n_vertices: self.vertices.len(),
                ..Default::default()
            };
        }
        let mut stats = MeshStatistics {
            n_faces: self.faces.len(),
            n_vertices: self.vertices.len(),
            min_area: f64::MAX,
            max_area: f64::MIN,
            min_elevation: f64::MAX,
            max_elevation: f64::MIN,
            ..Default::default()
        };
        for face in &self.faces {
            stats.min_area = stats.min_area.min(face.area());
            stats.max_area = stats.max_area.max(face.area());
            stats.total_area += face.area();
            stats.min_elevation = stats.min_elevation.min(face.elevation());
            stats.max_elevation = stats.max_elevation.max(face.elevation());
            if face.is_boundary() {
                stats.n_boundary_faces += 1;
            }
        }
        stats
    }
}

/// 网格构建器
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    vertices: Vec<DVec3>,
    triangles: Vec<[VertexIndex; 3]>,
}

impl MeshBuilder {
    /// 创建空构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加顶点
    pub fn add_vertex(&mut self, x: f64, y: f64, z: f64) -> VertexIndex {
        let idx = VertexIndex::from_usize(self.vertices.len());
        self.vertices.push(DVec3::new(x, y, z));
        idx
    }

    /// 添加三角形
    pub fn add_triangle(&mut self, a: VertexIndex, b: VertexIndex, c: VertexIndex) -> FaceIndex {
        let idx = FaceIndex::from_usize(self.triangles.len());
        self.triangles.push([a, b, c]);
        idx
    }

    /// 构建规则三角化的矩形网格（每个格子两个三角形）
    ///
    /// `elevation` 给出顶点高程。
    pub fn rectangular<F>(nx: usize, ny: usize, dx: f64, dy: f64, elevation: F) -> Self
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut b = Self::new();
        for j in 0..=ny {
            for i in 0..=nx {
                let x = i as f64 * dx;
                let y = j as f64 * dy;
                b.add_vertex(x, y, elevation(x, y));
            }
        }
        let id = |i: usize, j: usize| VertexIndex::from_usize(j * (nx + 1) + i);
        for j in 0..ny {
            for i in 0..nx {
                b.add_triangle(id(i, j), id(i + 1, j), id(i + 1, j + 1));
                b.add_triangle(id(i, j), id(i + 1, j + 1), id(i, j + 1));
            }
        }
        b
    }

    /// 构建网格
    ///
    /// 校验顶点索引、退化三角形和非流形边，计算几何与邻接关系。
    pub fn build(self) -> BhResult<Mesh> {
        let n_vertices = self.vertices.len();
        let mut geometries = Vec::with_capacity(self.triangles.len());
        let mut planar = Vec::with_capacity(self.triangles.len());
        let mut edge_owner: HashMap<(u32, u32), Vec<(usize, usize)>> = HashMap::new();

        for (fi, tri) in self.triangles.iter().enumerate() {
            for v in tri {
                BhError::check_index("Vertex", v.as_usize(), n_vertices)?;
            }
            let [a, b, c] = tri.map(|v| self.vertices[v.as_usize()]);
            let geometry = triangle_geometry(*tri, a, b, c)
                .ok_or_else(|| BhError::invalid_mesh(format!("面 {} 退化（面积过小）", fi)))?;

            for k in 0..3 {
                let (p, q) = (tri[k].index(), tri[(k + 1) % 3].index());
                let key = if p < q { (p, q) } else { (q, p) };
                edge_owner.entry(key).or_default().push((fi, k));
            }

            planar.push([a.truncate(), b.truncate(), c.truncate()]);
            geometries.push(geometry);
        }

        for (edge, owners) in &edge_owner {
            if owners.len() > 2 {
                return Err(BhError::invalid_mesh(format!(
                    "边 ({}, {}) 被 {} 个面共享（非流形）",
                    edge.0,
                    edge.1,
                    owners.len()
                )));
            }
            if let [(f0, k0), (f1, k1)] = owners.as_slice() {
                geometries[*f0].neighbors[*k0] = FaceIndex::from_usize(*f1);
                geometries[*f1].neighbors[*k1] = FaceIndex::from_usize(*f0);
            }
        }

        let centroids: Vec<DVec2> = geometries.iter().map(|g| g.centroid.truncate()).collect();
        let spatial = FaceSpatialIndex::build(planar, &centroids);

        let faces: Vec<Face> = geometries
            .into_iter()
            .enumerate()
            .map(|(i, g)| Face::new(FaceIndex::from_usize(i), g))
            .collect();

        let vertices = self
            .vertices
            .into_iter()
            .map(|position| Vertex { position })
            .collect();

        tracing::debug!(
            "网格构建完成: {} 个面, {} 个顶点",
            faces.len(),
            n_vertices
        );

        Ok(Mesh {
            vertices,
            faces,
            spatial,
            variables: Arc::new(VariableTable::new()),
        })
    }
}

/// 计算三角形几何，退化时返回 `None`
fn triangle_geometry(vertices: [VertexIndex; 3], a: DVec3, b: DVec3, c: DVec3) -> Option<FaceGeometry> {
    let cross = (b - a).cross(c - a);
    let area = 0.5 * cross.z.abs();
    if area < DEGENERATE_AREA {
        return None;
    }
    let mut normal = cross.normalize();
    if normal.z < 0.0 {
        normal = -normal;
    }

    let slope = normal.z.clamp(-1.0, 1.0).acos();
    let aspect = if normal.x.abs() < 1e-15 && normal.y.abs() < 1e-15 {
        0.0
    } else {
        normal.x.atan2(normal.y).rem_euclid(std::f64::consts::TAU)
    };

    Some(FaceGeometry {
        vertices,
        neighbors: [FaceIndex::INVALID; 3],
        centroid: (a + b + c) / 3.0,
        normal,
        area,
        slope,
        aspect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn test_rectangular_counts() {
        let mesh = MeshBuilder::rectangular(3, 2, 10.0, 10.0, |_, _| 0.0).build().unwrap();
        assert_eq!(mesh.n_faces(), 12);
        assert_eq!(mesh.n_vertices(), 12);
        let stats = mesh.statistics();
        assert!((stats.total_area - 600.0).abs() < 1e-9);
        assert!((stats.min_area - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_neighbors_are_symmetric() {
        let mesh = MeshBuilder::rectangular(4, 4, 1.0, 1.0, |_, _| 0.0).build().unwrap();
        for face in mesh.faces() {
            for n in face.neighbors() {
                let back: Vec<_> = mesh.neighbors(n).collect();
                assert!(back.contains(&face.index()));
            }
        }
        // 内部三角形恰有三个邻居
        let interior = mesh.faces().iter().filter(|f| !f.is_boundary()).count();
        assert!(interior > 0);
    }

    #[test]
    fn test_slope_and_aspect() {
        // 向东下降的斜面: z = -x，坡度 45°，坡向朝东 (π/2)
        let mut b = MeshBuilder::new();
        let v0 = b.add_vertex(0.0, 0.0, 0.0);
        let v1 = b.add_vertex(1.0, 0.0, -1.0);
        let v2 = b.add_vertex(0.0, 1.0, 0.0);
        b.add_triangle(v0, v1, v2);
        let mesh = b.build().unwrap();
        let face = &mesh.faces()[0];
        assert!((face.slope() - FRAC_PI_4).abs() < 1e-12);
        assert!((face.aspect() - FRAC_PI_2).abs() < 1e-12);

        // 向南下降: z = y，坡向朝南 (π)
        let mut b = MeshBuilder::new();
        let v0 = b.add_vertex(0.0, 0.0, 0.0);
        let v1 = b.add_vertex(1.0, 0.0, 0.0);
        let v2 = b.add_vertex(0.0, 1.0, 1.0);
        b.add_triangle(v0, v1, v2);
        let mesh = b.build().unwrap();
        assert!((mesh.faces()[0].aspect() - PI).abs() < 1e-12);
    }

    #[test]
    fn test_clockwise_triangle_normal_points_up() {
        let mut b = MeshBuilder::new();
        let v0 = b.add_vertex(0.0, 0.0, 5.0);
        let v1 = b.add_vertex(0.0, 1.0, 5.0);
        let v2 = b.add_vertex(1.0, 0.0, 5.0);
        b.add_triangle(v0, v1, v2);
        let mesh = b.build().unwrap();
        let face = &mesh.faces()[0];
        assert!(face.geometry().normal.z > 0.0);
        assert_eq!(face.slope(), 0.0);
        assert_eq!(face.elevation(), 5.0);
    }

    #[test]
    fn test_degenerate_triangle_rejected() {
        let mut b = MeshBuilder::new();
        let v0 = b.add_vertex(0.0, 0.0, 0.0);
        let v1 = b.add_vertex(1.0, 0.0, 0.0);
        let v2 = b.add_vertex(2.0, 0.0, 0.0);
        b.add_triangle(v0, v1, v2);
        assert!(matches!(b.build(), Err(BhError::InvalidMesh { .. })));
    }

    #[test]
    fn test_bad_vertex_index_rejected() {
        let mut b = MeshBuilder::new();
        let v0 = b.add_vertex(0.0, 0.0, 0.0);
        let v1 = b.add_vertex(1.0, 0.0, 0.0);
        b.add_triangle(v0, v1, VertexIndex::new(9));
        assert!(matches!(b.build(), Err(BhError::IndexOutOfBounds { .. })));
    }

    #[test]
    fn test_non_manifold_edge_rejected() {
        let mut b = MeshBuilder::new();
        let v0 = b.add_vertex(0.0, 0.0, 0.0);
        let v1 = b.add_vertex(1.0, 0.0, 0.0);
        let v2 = b.add_vertex(0.0, 1.0, 0.0);
        let v3 = b.add_vertex(0.0, -1.0, 0.0);
        let v4 = b.add_vertex(1.0, 1.0, 0.0);
        b.add_triangle(v0, v1, v2);
        b.add_triangle(v0, v3, v1);
        b.add_triangle(v0, v1, v4);
        assert!(matches!(b.build(), Err(BhError::InvalidMesh { .. })));
    }

    #[test]
    fn test_spatial_queries() {
        let mesh = MeshBuilder::rectangular(2, 2, 1.0, 1.0, |_, _| 0.0).build().unwrap();
        let f = mesh.locate(0.9, 0.1).unwrap();
        assert!(mesh.face(f).is_ok());
        assert!(mesh.locate(-1.0, 0.5).is_none());
        assert!(mesh.nearest_face(100.0, 100.0).is_some());
        assert_eq!(mesh.faces_within(1.0, 1.0, 10.0).len(), mesh.n_faces());
        let b = mesh.bounds().unwrap();
        assert_eq!((b.max_x, b.max_y), (2.0, 2.0));
    }

    #[test]
    fn test_bind_and_clear_variables() {
        let mut mesh = MeshBuilder::rectangular(1, 1, 1.0, 1.0, |_, _| 0.0).build().unwrap();
        let table = Arc::new(VariableTable::from_names(["t"]).unwrap());
        mesh.bind_variables(table);
        assert_eq!(mesh.variable_table().len(), 1);
        for face in mesh.faces_mut() {
            face.set("t", 1.0).unwrap();
        }
        mesh.clear_variables();
        assert!(mesh.faces().iter().all(|f| !f.is_set("t")));
    }

    #[test]
    fn test_face_out_of_range() {
        let mesh = MeshBuilder::rectangular(1, 1, 1.0, 1.0, |_, _| 0.0).build().unwrap();
        assert!(mesh.face(FaceIndex::new(2)).is_err());
        assert_eq!(mesh.neighbors(FaceIndex::new(99)).count(), 0);
    }
}
