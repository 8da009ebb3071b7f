use std::sync::Arc;

use nalgebra::Vector2;
use parking_lot::Mutex;

/// 作用在对象上的二维力。
///
/// 笛卡尔分量 `(x, y)` 是权威值；极坐标 `(angle, length)` 在分量改变后被标记为过期，读取时才重新计算。
/// 角度使用角度制。
///
/// [`set_angle`](Self::set_angle) / [`set_length`](Self::set_length) 会先刷新过期的极坐标，
/// 再用“新角度 + 当前长度”或“当前角度 + 新长度”重建分量。
#[derive(Debug, Clone, PartialEq)]
pub struct Force {
    x: f32,
    y: f32,
    angle: f32,
    length: f32,
    dirty: bool,
    temporary: bool,
}

impl Default for Force {
    fn default() -> Self {
        Self::new(0.0, 0.0, false)
    }
}

impl Force {
    /// `temporary` 为 `true` 的力只作用一帧。
    pub fn new(x: f32, y: f32, temporary: bool) -> Self {
        let mut force = Self {
            x,
            y,
            angle: 0.0,
            length: 0.0,
            dirty: true,
            temporary,
        };
        force.flush();
        force
    }

    /// 由极坐标构造。
    pub fn from_polar(angle: f32, length: f32, temporary: bool) -> Self {
        let rad = angle.to_radians();
        Self {
            x: rad.cos() * length,
            y: rad.sin() * length,
            angle,
            length,
            dirty: false,
            temporary,
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn vector(&self) -> Vector2<f32> {
        Vector2::new(self.x, self.y)
    }

    pub fn set_x(&mut self, x: f32) {
        self.x = x;
        self.dirty = true;
    }

    pub fn set_y(&mut self, y: f32) {
        self.y = y;
        self.dirty = true;
    }

    pub fn angle(&mut self) -> f32 {
        self.flush();
        self.angle
    }

    pub fn length(&mut self) -> f32 {
        self.flush();
        self.length
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.flush();
        self.angle = angle;
        let rad = angle.to_radians();
        self.x = rad.cos() * self.length;
        self.y = rad.sin() * self.length;
    }

    pub fn set_length(&mut self, length: f32) {
        self.flush();
        self.length = length;
        let rad = self.angle.to_radians();
        self.x = rad.cos() * length;
        self.y = rad.sin() * length;
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn set_temporary(&mut self, temporary: bool) {
        self.temporary = temporary;
    }

    pub(crate) fn reset(&mut self, x: f32, y: f32, temporary: bool) {
        self.x = x;
        self.y = y;
        self.temporary = temporary;
        self.dirty = true;
    }

    fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        self.angle = self.y.atan2(self.x).to_degrees();
        self.length = (self.x * self.x + self.y * self.y).sqrt();
        self.dirty = false;
    }
}

/// 可回收力的空闲表。
///
/// 场景持有一份，并把克隆的句柄交给其中每个对象：
/// 对象丢弃临时力或清空力时把它们放回池中，添加新力时优先从池中取出。
#[derive(Debug, Clone, Default)]
pub struct ForcePool {
    free: Arc<Mutex<Vec<Force>>>,
}

impl ForcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出一个力（优先复用空闲的）并设置为给定分量。
    pub fn take(&self, x: f32, y: f32, temporary: bool) -> Force {
        match self.free.lock().pop() {
            Some(mut force) => {
                force.reset(x, y, temporary);
                force
            }
            None => Force::new(x, y, temporary),
        }
    }

    pub fn recycle(&self, force: Force) {
        self.free.lock().push(force);
    }

    pub fn recycle_all(&self, forces: impl IntoIterator<Item = Force>) {
        self.free.lock().extend(forces);
    }

    /// 空闲力的数量。
    pub fn len(&self) -> usize {
        self.free.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1.0e-4;

    #[test]
    fn polar_values_are_derived_from_components() {
        let mut f = Force::new(3.0, 4.0, false);
        assert!((f.length() - 5.0).abs() < EPS);
        assert!((f.angle() - 53.130_1).abs() < 1.0e-3);
    }

    #[test]
    fn set_angle_keeps_length() {
        let mut f = Force::new(3.0, 4.0, false);
        f.set_angle(90.0);
        assert!(f.x().abs() < EPS);
        assert!((f.y() - 5.0).abs() < EPS);
    }

    #[test]
    fn set_length_after_component_change_uses_fresh_angle() {
        let mut f = Force::new(1.0, 0.0, false);
        f.set_y(1.0);
        f.set_x(0.0);
        f.set_length(2.0);
        assert!(f.x().abs() < EPS);
        assert!((f.y() - 2.0).abs() < EPS);
        assert!((f.angle() - 90.0).abs() < EPS);
    }

    #[test]
    fn pool_recycles_storage() {
        let pool = ForcePool::new();
        pool.recycle(Force::new(9.0, 9.0, false));
        assert_eq!(pool.len(), 1);

        let mut f = pool.take(1.0, 0.0, true);
        assert!(pool.is_empty());
        assert!(f.is_temporary());
        assert_eq!(f.x(), 1.0);
        assert!((f.length() - 1.0).abs() < EPS);
    }
}
