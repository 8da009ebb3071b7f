//! 凸多边形与分离轴碰撞测试。

use nalgebra::Vector2;

/// 世界坐标下的凸多边形，顶点按环绕顺序排列。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub vertices: Vec<Vector2<f32>>,
}

/// [`Polygon::collision_test`] 的结果。
///
/// `collision` 为真时，`move_axis` 是最小平移向量：把第一个多边形沿它移动即可分开两者。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    pub collision: bool,
    pub move_axis: Vector2<f32>,
}

impl CollisionResult {
    fn miss() -> Self {
        Self {
            collision: false,
            move_axis: Vector2::zeros(),
        }
    }
}

impl Polygon {
    pub fn new(vertices: Vec<Vector2<f32>>) -> Self {
        Self { vertices }
    }

    /// 以原点为中心的轴对齐矩形。
    pub fn rectangle(width: f32, height: f32) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Self::new(vec![
            Vector2::new(-hw, -hh),
            Vector2::new(hw, -hh),
            Vector2::new(hw, hh),
            Vector2::new(-hw, hh),
        ])
    }

    /// 绕原点旋转，`angle` 为弧度。
    pub fn rotate(&mut self, angle: f32) {
        let (sin, cos) = angle.sin_cos();
        for v in &mut self.vertices {
            *v = Vector2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos);
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        let delta = Vector2::new(dx, dy);
        for v in &mut self.vertices {
            *v += delta;
        }
    }

    /// 顶点的算术平均。
    pub fn center(&self) -> Vector2<f32> {
        if self.vertices.is_empty() {
            return Vector2::zeros();
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector2::zeros(), |acc: Vector2<f32>, v| acc + v);
        sum / self.vertices.len() as f32
    }

    pub fn edges(&self) -> impl Iterator<Item = Vector2<f32>> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| self.vertices[(i + 1) % n] - self.vertices[i])
    }

    /// 相邻边的转向一致即为凸；少于 3 个顶点的退化多边形不算凸。
    pub fn is_convex(&self) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut sign = 0.0f32;
        for i in 0..n {
            let a = self.vertices[(i + 1) % n] - self.vertices[i];
            let b = self.vertices[(i + 2) % n] - self.vertices[(i + 1) % n];
            let cross = a.x * b.y - a.y * b.x;
            if cross != 0.0 {
                if sign != 0.0 && cross.signum() != sign {
                    return false;
                }
                sign = cross.signum();
            }
        }
        sign != 0.0
    }

    /// 把所有顶点投影到 `axis` 上，返回 `(min, max)`。
    pub fn project(&self, axis: &Vector2<f32>) -> (f32, f32) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for v in &self.vertices {
            let d = v.dot(axis);
            min = min.min(d);
            max = max.max(d);
        }
        (min, max)
    }

    /// 两个凸多边形之间的分离轴测试。
    ///
    /// 仅边界接触（重叠长度为 0）也算碰撞。最小平移向量从 `b` 指向 `a`。
    pub fn collision_test(a: &Polygon, b: &Polygon) -> CollisionResult {
        if a.vertices.len() < 2 || b.vertices.len() < 2 {
            return CollisionResult::miss();
        }

        let mut min_overlap = f32::INFINITY;
        let mut best_axis = Vector2::zeros();

        for edge in a.edges().chain(b.edges()) {
            let normal = Vector2::new(-edge.y, edge.x);
            let len = normal.norm();
            if len == 0.0 {
                continue;
            }
            let axis = normal / len;

            let (min_a, max_a) = a.project(&axis);
            let (min_b, max_b) = b.project(&axis);
            let gap = if min_a < min_b {
                min_b - max_a
            } else {
                min_a - max_b
            };
            if gap > 0.0 {
                return CollisionResult::miss();
            }

            let overlap = -gap;
            if overlap < min_overlap {
                min_overlap = overlap;
                best_axis = axis;
            }
        }

        if !min_overlap.is_finite() {
            return CollisionResult::miss();
        }
        if (a.center() - b.center()).dot(&best_axis) < 0.0 {
            best_axis = -best_axis;
        }
        CollisionResult {
            collision: true,
            move_axis: best_axis * min_overlap,
        }
    }
}
