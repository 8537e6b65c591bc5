// crates/bh_mesh/src/spatial_index.rs

//! 网格空间索引
//!
//! 基于 R-Tree 的空间索引，用于点定位和最近面查询。
//! 使用 rstar crate 实现。
//!
//! # 功能
//!
//! - 点定位：查找包含给定点的三角形
//! - 最近面：按形心距离查找最近的面
//! - 半径查询：查找形心落在给定半径内的所有面

use bh_foundation::FaceIndex;
use glam::DVec2;
use rstar::primitives::GeomWithData;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// 面包围盒
///
/// 存储三角形顶点及其轴对齐包围盒（AABB），用于 R-Tree 索引。
#[derive(Debug, Clone)]
pub struct FaceEnvelope {
    /// 面索引
    pub face: FaceIndex,
    /// 三角形顶点（平面坐标）
    pub triangle: [DVec2; 3],
    min: [f64; 2],
    max: [f64; 2],
}

impl FaceEnvelope {
    /// 创建面包围盒
    pub fn new(face: FaceIndex, triangle: [DVec2; 3]) -> Self {
        let mut min = [f64::MAX; 2];
        let mut max = [f64::MIN; 2];
        for v in &triangle {
            min[0] = min[0].min(v.x);
            min[1] = min[1].min(v.y);
            max[0] = max[0].max(v.x);
            max[1] = max[1].max(v.y);
        }
        Self {
            face,
            triangle,
            min,
            max,
        }
    }

    /// 精确的点在三角形内测试（含边界）
    pub fn contains(&self, p: DVec2, tol: f64) -> bool {
        let [a, b, c] = self.triangle;
        let d1 = (p - b).perp_dot(a - b);
        let d2 = (p - c).perp_dot(b - c);
        let d3 = (p - a).perp_dot(c - a);
        let has_neg = d1 < -tol || d2 < -tol || d3 < -tol;
        let has_pos = d1 > tol || d2 > tol || d3 > tol;
        !(has_neg && has_pos)
    }
}

impl RTreeObject for FaceEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

impl PointDistance for FaceEnvelope {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        // 点到 AABB 的最短距离平方
        let dx = (self.min[0] - point[0]).max(0.0).max(point[0] - self.max[0]);
        let dy = (self.min[1] - point[1]).max(0.0).max(point[1] - self.max[1]);
        dx * dx + dy * dy
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        point[0] >= self.min[0]
            && point[0] <= self.max[0]
            && point[1] >= self.min[1]
            && point[1] <= self.max[1]
    }
}

/// 空间边界
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialBounds {
    /// 最小 X 坐标
    pub min_x: f64,
    /// 最小 Y 坐标
    pub min_y: f64,
    /// 最大 X 坐标
    pub max_x: f64,
    /// 最大 Y 坐标
    pub max_y: f64,
}

impl SpatialBounds {
    /// 边界面积
    #[inline]
    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    /// 点是否在边界内
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

type CentroidPoint = GeomWithData<[f64; 2], FaceIndex>;

/// 面空间索引
pub struct FaceSpatialIndex {
    /// 三角形包围盒树（点定位）
    envelopes: RTree<FaceEnvelope>,
    /// 形心点树（最近邻、半径查询）
    centroids: RTree<CentroidPoint>,
    bounds: Option<SpatialBounds>,
    tolerance: f64,
}

impl std::fmt::Debug for FaceSpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceSpatialIndex")
            .field("n_faces", &self.centroids.size())
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl FaceSpatialIndex {
    /// 从三角形和形心构建
    pub fn build(triangles: Vec<[DVec2; 3]>, centroids: &[DVec2]) -> Self {
        debug_assert_eq!(triangles.len(), centroids.len());

        let bounds = triangles
            .iter()
            .flat_map(|t| t.iter())
            .fold(None, |acc: Option<SpatialBounds>, v| {
                Some(match acc {
                    None => SpatialBounds {
                        min_x: v.x,
                        min_y: v.y,
                        max_x: v.x,
                        max_y: v.y,
                    },
                    Some(b) => SpatialBounds {
                        min_x: b.min_x.min(v.x),
                        min_y: b.min_y.min(v.y),
                        max_x: b.max_x.max(v.x),
                        max_y: b.max_y.max(v.y),
                    },
                })
            });

        let envelopes = triangles
            .into_iter()
            .enumerate()
            .map(|(i, t)| FaceEnvelope::new(FaceIndex::from_usize(i), t))
            .collect();
        let points = centroids
            .iter()
            .enumerate()
            .map(|(i, c)| CentroidPoint::new([c.x, c.y], FaceIndex::from_usize(i)))
            .collect();

        Self {
            envelopes: RTree::bulk_load(envelopes),
            centroids: RTree::bulk_load(points),
            bounds,
            tolerance: 1e-10,
        }
    }

    /// 网格边界
    #[inline]
    pub fn bounds(&self) -> Option<SpatialBounds> {
        self.bounds
    }

    /// 查找包含点的面
    pub fn locate(&self, x: f64, y: f64) -> Option<FaceIndex> {
        let p = DVec2::new(x, y);
        self.envelopes
            .locate_all_at_point(&[x, y])
            .filter(|env| env.contains(p, self.tolerance))
            .map(|env| env.face)
            .min()
    }

    /// 形心距离最近的面
    pub fn nearest(&self, x: f64, y: f64) -> Option<FaceIndex> {
        self.centroids.nearest_neighbor(&[x, y]).map(|p| p.data)
    }

    /// 形心落在半径内的所有面（按索引排序）
    pub fn within_radius(&self, x: f64, y: f64, radius: f64) -> Vec<FaceIndex> {
        let mut faces: Vec<FaceIndex> = self
            .centroids
            .locate_within_distance([x, y], radius * radius)
            .map(|p| p.data)
            .collect();
        faces.sort_unstable();
        faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> FaceSpatialIndex {
        let t0 = [DVec2::new(0.0, 0.0), DVec2::new(1.0, 0.0), DVec2::new(0.0, 1.0)];
        let t1 = [DVec2::new(1.0, 0.0), DVec2::new(1.0, 1.0), DVec2::new(0.0, 1.0)];
        let c0 = (t0[0] + t0[1] + t0[2]) / 3.0;
        let c1 = (t1[0] + t1[1] + t1[2]) / 3.0;
        FaceSpatialIndex::build(vec![t0, t1], &[c0, c1])
    }

    #[test]
    fn test_locate() {
        let index = two_triangles();
        assert_eq!(index.locate(0.2, 0.2), Some(FaceIndex::new(0)));
        assert_eq!(index.locate(0.8, 0.8), Some(FaceIndex::new(1)));
        assert_eq!(index.locate(2.0, 2.0), None);
    }

    #[test]
    fn test_locate_on_shared_edge_is_deterministic() {
        let index = two_triangles();
        assert_eq!(index.locate(0.5, 0.5), Some(FaceIndex::new(0)));
    }

    #[test]
    fn test_nearest() {
        let index = two_triangles();
        assert_eq!(index.nearest(-5.0, -5.0), Some(FaceIndex::new(0)));
        assert_eq!(index.nearest(5.0, 5.0), Some(FaceIndex::new(1)));
    }

    #[test]
    fn test_within_radius() {
        let index = two_triangles();
        assert_eq!(index.within_radius(0.5, 0.5, 0.3).len(), 2);
        assert!(index.within_radius(10.0, 10.0, 1.0).is_empty());
    }

    #[test]
    fn test_bounds() {
        let index = two_triangles();
        let b = index.bounds().unwrap();
        assert_eq!(b.area(), 1.0);
        assert!(b.contains(0.5, 0.5));
    }

    #[test]
    fn test_empty_index() {
        let index = FaceSpatialIndex::build(vec![], &[]);
        assert!(index.bounds().is_none());
        assert_eq!(index.nearest(0.0, 0.0), None);
    }
}
