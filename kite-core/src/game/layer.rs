use nalgebra::Vector2;

use crate::config::ViewportConfig;

use super::object::ObjectId;

/// 场景中的一个图层：一台摄像机，加上一个按 z 序排列的绘制桶。
///
/// 摄像机坐标表示视口左上角在世界中的位置；缩放与旋转都以视口中心为基准。
/// 各方法上的 `camera` 参数保留了多摄像机的接口形状，但目前每个图层只有一台摄像机，该参数被忽略。
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    camera_x: f32,
    camera_y: f32,
    camera_rotation: f32,
    zoom: f32,
    hidden: bool,
    viewport: ViewportConfig,
    children: Vec<(ObjectId, i32)>,
}

impl Layer {
    pub fn new(name: impl Into<String>, visible: bool, viewport: ViewportConfig) -> Self {
        Self {
            name: name.into(),
            camera_x: 0.0,
            camera_y: 0.0,
            camera_rotation: 0.0,
            zoom: 1.0,
            hidden: !visible,
            viewport,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn camera_x(&self, _camera: usize) -> f32 {
        self.camera_x
    }

    pub fn camera_y(&self, _camera: usize) -> f32 {
        self.camera_y
    }

    pub fn set_camera_x(&mut self, x: f32, _camera: usize) {
        self.camera_x = x;
    }

    pub fn set_camera_y(&mut self, y: f32, _camera: usize) {
        self.camera_y = y;
    }

    pub fn camera_width(&self, _camera: usize) -> f32 {
        self.viewport.width as f32
    }

    pub fn camera_height(&self, _camera: usize) -> f32 {
        self.viewport.height as f32
    }

    /// 角度制。
    pub fn camera_rotation(&self, _camera: usize) -> f32 {
        self.camera_rotation
    }

    pub fn set_camera_rotation(&mut self, rotation: f32, _camera: usize) {
        self.camera_rotation = rotation;
    }

    pub fn zoom(&self, _camera: usize) -> f32 {
        self.zoom
    }

    /// 非正值被忽略。
    pub fn set_zoom(&mut self, zoom: f32, _camera: usize) {
        if zoom > 0.0 {
            self.zoom = zoom;
        }
    }

    pub fn show(&mut self, enable: bool) {
        self.hidden = !enable;
    }

    pub fn is_visible(&self) -> bool {
        !self.hidden
    }

    /// 把画布坐标换算成该图层的世界坐标。
    pub fn convert_coords(&self, x: f32, y: f32, camera: usize) -> Vector2<f32> {
        let half_w = self.camera_width(camera) / 2.0;
        let half_h = self.camera_height(camera) / 2.0;
        let zoom = self.zoom.abs();
        let local = Vector2::new((x - half_w) / zoom, (y - half_h) / zoom);

        let (sin, cos) = self.camera_rotation.to_radians().sin_cos();
        let rotated = Vector2::new(
            cos * local.x - sin * local.y,
            sin * local.x + cos * local.y,
        );
        Vector2::new(
            rotated.x + self.camera_x + half_w,
            rotated.y + self.camera_y + half_h,
        )
    }

    // 绘制桶

    /// 插入到第一个 z 序不小于 `z_order` 的子项之前；z 序相同的后加入者先绘制。
    pub fn add_child(&mut self, object: ObjectId, z_order: i32) {
        let at = self
            .children
            .iter()
            .position(|&(_, z)| z >= z_order)
            .unwrap_or(self.children.len());
        self.children.insert(at, (object, z_order));
    }

    pub fn change_child_z_order(&mut self, object: ObjectId, z_order: i32) {
        if self.remove_child(object) {
            self.add_child(object, z_order);
        }
    }

    /// 返回是否确实移除了子项。
    pub fn remove_child(&mut self, object: ObjectId) -> bool {
        match self.children.iter().position(|&(id, _)| id == object) {
            Some(at) => {
                self.children.remove(at);
                true
            }
            None => false,
        }
    }

    /// 按绘制顺序（z 序从小到大）排列的子项。
    pub fn children(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.children.iter().map(|&(id, _)| id)
    }

    pub(crate) fn clear_children(&mut self) {
        self.children.clear();
    }
}
