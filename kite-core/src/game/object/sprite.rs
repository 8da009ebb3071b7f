use std::{any::Any, collections::HashMap};

use nalgebra::Vector2;

use crate::{
    data::{AnimationData, InstanceData, ObjectData},
    game::layer::Layer,
    render::Visual,
    resource::ImageCache,
};

use super::{ObjectContext, ObjectKind, ObjectState};

/// Sprite 的类型标签。
pub const SPRITE_KIND: &str = "Sprite";

#[derive(Debug, Clone, PartialEq)]
struct SpriteFrame {
    image: String,
    texture_size: Vector2<f32>,
    origin: Vector2<f32>,
    center: Vector2<f32>,
    points: HashMap<String, Vector2<f32>>,
}

impl SpriteFrame {
    fn point(&self, name: &str) -> Vector2<f32> {
        match name {
            "Centre" | "Center" => self.center,
            "Origin" => self.origin,
            other => self.points.get(other).copied().unwrap_or(self.origin),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SpriteDirection {
    time_between_frames: f32,
    looping: bool,
    frames: Vec<SpriteFrame>,
}

#[derive(Debug, Clone, PartialEq)]
struct SpriteAnimation {
    use_multiple_directions: bool,
    directions: Vec<SpriteDirection>,
}

fn load_animations(data: &[AnimationData], images: &dyn ImageCache) -> Vec<SpriteAnimation> {
    data.iter()
        .map(|anim| SpriteAnimation {
            use_multiple_directions: anim.use_multiple_directions,
            directions: anim
                .directions
                .iter()
                .map(|dir| SpriteDirection {
                    time_between_frames: dir.time_between_frames,
                    looping: dir.looping,
                    frames: dir
                        .frames
                        .iter()
                        .map(|frame| {
                            let texture_size = images.texture_size_or_invalid(&frame.image);
                            SpriteFrame {
                                image: frame.image.clone(),
                                texture_size,
                                origin: Vector2::from(frame.origin),
                                center: frame
                                    .center
                                    .map(Vector2::from)
                                    .unwrap_or(texture_size / 2.0),
                                points: frame
                                    .points
                                    .iter()
                                    .map(|(k, v)| (k.clone(), Vector2::from(*v)))
                                    .collect(),
                            }
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

/// 带动画的图像对象：动画 → 方向 → 帧。
///
/// 当前动画启用多方向时，角度被量化为 8 个方向之一（每 45° 一个），对象本身不再自由旋转。
/// 宽高、原点与旋转中心都取自当前帧并乘以缩放。
///
/// 修改外观的方法需要同时拿到 [`ObjectState`]（通过 [`RuntimeObject::kind_parts_mut`](super::RuntimeObject::kind_parts_mut)），
/// 以便把碰撞盒标记为过期。
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteObject {
    animations: Vec<SpriteAnimation>,
    current_animation: usize,
    current_direction: usize,
    current_frame: usize,
    frame_elapsed: f32,
    paused: bool,
    scale_x: f32,
    scale_y: f32,
    flipped_x: bool,
    flipped_y: bool,
    blend_mode: u8,
    opacity: f32,
}

impl SpriteObject {
    pub fn new(data: &ObjectData, images: &dyn ImageCache) -> Self {
        Self {
            animations: load_animations(&data.animations, images),
            current_animation: 0,
            current_direction: 0,
            current_frame: 0,
            frame_elapsed: 0.0,
            paused: false,
            scale_x: 1.0,
            scale_y: 1.0,
            flipped_x: false,
            flipped_y: false,
            blend_mode: 0,
            opacity: 255.0,
        }
    }

    fn direction(&self) -> Option<&SpriteDirection> {
        self.animations
            .get(self.current_animation)?
            .directions
            .get(self.current_direction)
    }

    fn frame(&self) -> Option<&SpriteFrame> {
        self.direction()?.frames.get(self.current_frame)
    }

    fn uses_directions(&self) -> bool {
        self.animations
            .get(self.current_animation)
            .is_some_and(|a| a.use_multiple_directions)
    }

    fn scale(&self) -> Vector2<f32> {
        Vector2::new(self.scale_x.abs(), self.scale_y.abs())
    }

    // 动画

    pub fn animation(&self) -> usize {
        self.current_animation
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    /// 切换动画；越界或与当前相同则忽略。切换后从第 0 帧开始。
    pub fn set_animation(&mut self, state: &mut ObjectState, animation: usize) {
        if animation >= self.animations.len() || animation == self.current_animation {
            return;
        }
        self.current_animation = animation;
        self.current_frame = 0;
        self.frame_elapsed = 0.0;
        state.invalidate_hit_boxes();
    }

    pub fn direction_index(&self) -> usize {
        self.current_direction
    }

    /// 多方向动画下返回方向编号，否则返回自由角度。
    pub fn direction_or_angle(&self, state: &ObjectState) -> f32 {
        if self.uses_directions() {
            self.current_direction as f32
        } else {
            state.raw_angle()
        }
    }

    /// 多方向动画下切换方向（缺失或没有帧的方向被忽略），否则设置自由角度。
    pub fn set_direction_or_angle(&mut self, state: &mut ObjectState, value: f32) {
        let Some(anim) = self.animations.get(self.current_animation) else {
            return;
        };
        if !anim.use_multiple_directions {
            state.set_raw_angle(value);
            return;
        }

        if value < 0.0 {
            return;
        }
        let direction = value as usize;
        let usable = anim
            .directions
            .get(direction)
            .is_some_and(|d| !d.frames.is_empty());
        if direction == self.current_direction || !usable {
            return;
        }

        self.current_direction = direction;
        self.current_frame = 0;
        self.frame_elapsed = 0.0;
        state.set_raw_angle(0.0);
        state.invalidate_hit_boxes();
    }

    pub fn frame_index(&self) -> usize {
        self.current_frame
    }

    /// 跳到指定帧；越界则忽略。
    pub fn set_animation_frame(&mut self, state: &mut ObjectState, frame: usize) {
        let Some(direction) = self.direction() else {
            return;
        };
        if frame >= direction.frames.len() || frame == self.current_frame {
            return;
        }
        self.current_frame = frame;
        state.invalidate_hit_boxes();
    }

    /// 非循环方向播放到最后一帧时为 `true`。
    pub fn has_animation_ended(&self) -> bool {
        match self.direction() {
            Some(direction) if !direction.looping => {
                self.current_frame + 1 >= direction.frames.len()
            }
            _ => false,
        }
    }

    pub fn animation_paused(&self) -> bool {
        self.paused
    }

    pub fn pause_animation(&mut self) {
        self.paused = true;
    }

    pub fn play_animation(&mut self) {
        self.paused = false;
    }

    /// 当前帧的图像名。
    pub fn image(&self) -> Option<&str> {
        self.frame().map(|f| f.image.as_str())
    }

    // 几何

    /// 当前帧上命名点的世界坐标（考虑翻转、缩放与旋转）。
    ///
    /// `"Centre"` 与 `"Origin"` 是内置点；未知点名回退到原点，空名返回对象位置。
    pub fn point(&self, state: &ObjectState, name: &str) -> Vector2<f32> {
        if name.is_empty() {
            return Vector2::new(state.x(), state.y());
        }
        let Some(frame) = self.frame() else {
            return Vector2::new(state.x(), state.y());
        };

        let mut p = frame.point(name);
        let mut c = frame.center;
        if self.flipped_x {
            p.x = frame.texture_size.x - p.x;
            c.x = frame.texture_size.x - c.x;
        }
        if self.flipped_y {
            p.y = frame.texture_size.y - p.y;
            c.y = frame.texture_size.y - c.y;
        }
        let scale = self.scale();
        let p = p.component_mul(&scale);
        let c = c.component_mul(&scale);

        let (sin, cos) = self.angle(state).to_radians().sin_cos();
        let rotated = Vector2::new(
            c.x + cos * (p.x - c.x) - sin * (p.y - c.y),
            c.y + sin * (p.x - c.x) + cos * (p.y - c.y),
        );
        rotated + Vector2::new(state.x(), state.y()) - self.origin_offset()
    }

    pub fn scale_x(&self) -> f32 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f32 {
        self.scale_y
    }

    /// 非正值被忽略。
    pub fn set_scale_x(&mut self, state: &mut ObjectState, scale: f32) {
        if scale > 0.0 && scale != self.scale_x {
            self.scale_x = scale;
            state.invalidate_hit_boxes();
        }
    }

    /// 非正值被忽略。
    pub fn set_scale_y(&mut self, state: &mut ObjectState, scale: f32) {
        if scale > 0.0 && scale != self.scale_y {
            self.scale_y = scale;
            state.invalidate_hit_boxes();
        }
    }

    pub fn flip_x(&mut self, enable: bool) {
        self.flipped_x = enable;
    }

    pub fn flip_y(&mut self, enable: bool) {
        self.flipped_y = enable;
    }

    pub fn is_flipped_x(&self) -> bool {
        self.flipped_x
    }

    pub fn is_flipped_y(&self) -> bool {
        self.flipped_y
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// 钳制到 0..=255。
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 255.0);
    }

    pub fn blend_mode(&self) -> u8 {
        self.blend_mode
    }

    pub fn set_blend_mode(&mut self, mode: u8) {
        self.blend_mode = mode;
    }

    /// 朝向世界坐标 `(x, y)`。
    pub fn turn_toward_position(&mut self, state: &mut ObjectState, x: f32, y: f32) {
        let center =
            Vector2::new(state.x(), state.y()) - self.origin_offset() + self.center();
        let angle = (y - center.y).atan2(x - center.x).to_degrees();
        self.set_angle(state, angle);
    }

    /// 画布上的鼠标位置是否落在对象的绘制矩形内。
    ///
    /// 鼠标坐标先经对象所在图层的摄像机（平移、缩放、旋转）换算到世界坐标。
    pub fn cursor_on_object(
        &self,
        state: &ObjectState,
        layer: &Layer,
        mouse_x: f32,
        mouse_y: f32,
    ) -> bool {
        let world = layer.convert_coords(mouse_x, mouse_y, 0);
        let min = Vector2::new(state.x(), state.y()) - self.origin_offset();
        world.x >= min.x
            && world.x <= min.x + self.width()
            && world.y >= min.y
            && world.y <= min.y + self.height()
    }
}

impl ObjectKind for SpriteObject {
    fn width(&self) -> f32 {
        self.frame()
            .map_or(0.0, |f| f.texture_size.x * self.scale_x.abs())
    }

    fn height(&self) -> f32 {
        self.frame()
            .map_or(0.0, |f| f.texture_size.y * self.scale_y.abs())
    }

    fn set_width(&mut self, state: &mut ObjectState, width: f32) {
        let texture_width = self.frame().map_or(0.0, |f| f.texture_size.x);
        if texture_width > 0.0 {
            self.set_scale_x(state, width / texture_width);
        }
    }

    fn set_height(&mut self, state: &mut ObjectState, height: f32) {
        let texture_height = self.frame().map_or(0.0, |f| f.texture_size.y);
        if texture_height > 0.0 {
            self.set_scale_y(state, height / texture_height);
        }
    }

    fn origin_offset(&self) -> Vector2<f32> {
        self.frame()
            .map_or_else(Vector2::zeros, |f| f.origin.component_mul(&self.scale()))
    }

    fn center(&self) -> Vector2<f32> {
        self.frame()
            .map_or_else(Vector2::zeros, |f| f.center.component_mul(&self.scale()))
    }

    fn angle(&self, state: &ObjectState) -> f32 {
        if self.uses_directions() {
            self.current_direction as f32 * 45.0
        } else {
            state.raw_angle()
        }
    }

    fn set_angle(&mut self, state: &mut ObjectState, angle: f32) {
        if self.current_animation >= self.animations.len() {
            return;
        }
        if !self.uses_directions() {
            state.set_raw_angle(angle);
            return;
        }
        let normalized = angle.rem_euclid(360.0);
        let direction = ((normalized / 45.0).round() as usize) % 8;
        self.set_direction_or_angle(state, direction as f32);
    }

    fn update_time(&mut self, state: &mut ObjectState, elapsed: f32) {
        if self.paused {
            return;
        }
        let old_frame = self.current_frame;
        self.frame_elapsed += elapsed;

        let Some(direction) = self.direction() else {
            return;
        };
        let (tbf, looping, frame_count) = (
            direction.time_between_frames,
            direction.looping,
            direction.frames.len(),
        );

        if tbf > 0.0 && self.frame_elapsed > tbf {
            let count = (self.frame_elapsed / tbf).floor();
            self.current_frame += count as usize;
            self.frame_elapsed = (self.frame_elapsed - count * tbf).max(0.0);
        }
        if frame_count > 0 && self.current_frame >= frame_count {
            self.current_frame = if looping {
                self.current_frame % frame_count
            } else {
                frame_count - 1
            };
        }

        if old_frame != self.current_frame {
            state.invalidate_hit_boxes();
        }
    }

    fn extra_initialization(&mut self, state: &mut ObjectState, instance: &InstanceData) {
        if let (Some(width), Some(height)) = (instance.width, instance.height) {
            self.set_width(state, width);
            self.set_height(state, height);
        }
        if let Some(&animation) = instance.properties.get("animation") {
            if animation >= 0.0 {
                self.set_animation(state, animation as usize);
            }
        }
    }

    fn reset(&mut self, data: &ObjectData, ctx: &ObjectContext<'_>) {
        *self = Self::new(data, ctx.images);
    }

    fn visual(&self, _state: &ObjectState) -> Option<Visual> {
        let frame = self.frame()?;
        Some(Visual::Sprite {
            image: frame.image.clone(),
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            flipped_x: self.flipped_x,
            flipped_y: self.flipped_y,
            opacity: self.opacity,
            blend_mode: self.blend_mode,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
