//! 每帧交给渲染后端的绘制快照。
//!
//! 场景在帧末尾把可见图层及其中按 z 序排好的可绘制对象拍成 [`RenderFrame`]，
//! 后端只读取快照，不持有任何运行时对象的引用。

use crate::game::object::ObjectId;

/// 外部渲染后端。
pub trait RenderBackend: Send {
    fn render(&mut self, frame: &RenderFrame);
}

/// 什么也不画的后端。
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn render(&mut self, _frame: &RenderFrame) {}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderFrame {
    /// 背景色（RGB）。
    pub background: [u8; 3],
    /// 可见图层，按场景中的图层顺序（先画的在前）。
    pub layers: Vec<LayerFrame>,
}

impl RenderFrame {
    /// 快照中的可绘制对象总数。
    pub fn drawable_count(&self) -> usize {
        self.layers.iter().map(|l| l.drawables.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerFrame {
    pub name: String,
    pub camera_x: f32,
    pub camera_y: f32,
    /// 摄像机旋转（角度制）。
    pub camera_rotation: f32,
    pub zoom: f32,
    /// 按 z 序从小到大排列。
    pub drawables: Vec<Drawable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Drawable {
    pub object: ObjectId,
    /// 绘制左上角（已扣除原点偏移）。
    pub x: f32,
    pub y: f32,
    /// 角度制。
    pub angle: f32,
    pub z_order: i32,
    pub visual: Visual,
}

/// 对象类型相关的外观参数。
#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Sprite {
        image: String,
        scale_x: f32,
        scale_y: f32,
        flipped_x: bool,
        flipped_y: bool,
        /// 0..=255。
        opacity: f32,
        blend_mode: u8,
    },
}
