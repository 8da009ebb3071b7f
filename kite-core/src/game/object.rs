use std::any::Any;

use nalgebra::Vector2;

use crate::{
    Aabb2,
    data::{AutomatismData, InstanceData, ObjectData},
    render::{Drawable, Visual},
    resource::ImageCache,
};

use super::{
    automatism::{Automatism, RuntimeAutomatism},
    force::{Force, ForcePool},
    name_table::NameTable,
    polygon::Polygon,
    variables_container::VariablesContainer,
};

pub mod sprite;

/// 场景内唯一的对象标识，按创建顺序单调递增。
///
/// 回收复用的对象会拿到新的 id，因此持有旧 id 的代码不会误操作复用后的对象。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 对象的生命周期。
///
/// `Created → Living → MarkedForDeletion → Removed`，每一步只会发生一次；
/// 从回收池复用时重新回到 `Created`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectLifecycle {
    Created,
    Living,
    MarkedForDeletion,
    Removed,
}

/// 所有对象类型共享的几何与显示状态。
///
/// 位置或角度的任何变化都会把碰撞盒标记为过期；碰撞盒与 AABB 在下次读取时才重建。
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectState {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) angle: f32,
    pub(crate) z_order: i32,
    pub(crate) layer: String,
    pub(crate) hidden: bool,
    pub(crate) hit_boxes_dirty: bool,
}

impl Default for ObjectState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            z_order: 0,
            layer: String::new(),
            hidden: false,
            hit_boxes_dirty: true,
        }
    }
}

impl ObjectState {
    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    /// 存储的自由旋转角度（角度制）。
    pub fn raw_angle(&self) -> f32 {
        self.angle
    }

    /// 设置自由旋转角度；值不变时什么也不做。
    pub fn set_raw_angle(&mut self, angle: f32) {
        if self.angle == angle {
            return;
        }
        self.angle = angle;
        self.hit_boxes_dirty = true;
    }

    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// 尺寸或外观改变时调用，让碰撞盒在下次读取时重建。
    pub fn invalidate_hit_boxes(&mut self) {
        self.hit_boxes_dirty = true;
    }
}

/// 构造对象类型时可用的外部协作者。
pub struct ObjectContext<'a> {
    pub images: &'a dyn ImageCache,
}

/// 对象类型扩展点。
///
/// 基础对象只负责位置、力、变量、自动行为与碰撞；具体类型通过这些钩子提供尺寸、原点、外观与时间推进。
/// 所有钩子都有默认实现，对应一个没有外观、尺寸为 0 的对象。
pub trait ObjectKind: Send {
    fn width(&self) -> f32 {
        0.0
    }

    fn height(&self) -> f32 {
        0.0
    }

    fn set_width(&mut self, _state: &mut ObjectState, _width: f32) {}

    fn set_height(&mut self, _state: &mut ObjectState, _height: f32) {}

    /// 位置到绘制左上角的偏移：`drawable = position - origin_offset`。
    fn origin_offset(&self) -> Vector2<f32> {
        Vector2::zeros()
    }

    /// 旋转中心，相对绘制左上角。
    fn center(&self) -> Vector2<f32> {
        Vector2::new(self.width() / 2.0, self.height() / 2.0)
    }

    fn angle(&self, state: &ObjectState) -> f32 {
        state.raw_angle()
    }

    fn set_angle(&mut self, state: &mut ObjectState, angle: f32) {
        state.set_raw_angle(angle);
    }

    /// 每帧推进，`elapsed` 为秒。
    fn update_time(&mut self, _state: &mut ObjectState, _elapsed: f32) {}

    /// 由场景初始实例创建时，在通用属性设置完成后调用。
    fn extra_initialization(&mut self, _state: &mut ObjectState, _instance: &InstanceData) {}

    /// 从回收池复用时调用，用模板数据原地恢复初始状态。
    ///
    /// 复用后的实例必须与工厂新建的实例表现一致，因此每种对象都要自己实现。
    fn reset(&mut self, data: &ObjectData, ctx: &ObjectContext<'_>);

    fn on_deleted_from_scene(&mut self, _state: &mut ObjectState) {}

    /// 渲染快照中的外观；`None` 表示不可绘制。
    fn visual(&self, _state: &ObjectState) -> Option<Visual> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 没有外观的基础对象（类型标签 `""` 或 `"Base"`）。
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyObject;

impl ObjectKind for EmptyObject {
    fn reset(&mut self, _data: &ObjectData, _ctx: &ObjectContext<'_>) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 场景中的一个活动对象。
pub struct RuntimeObject {
    id: ObjectId,
    name: String,
    name_id: u32,
    kind_tag: String,
    lifecycle: ObjectLifecycle,
    state: ObjectState,
    variables: VariablesContainer,
    forces: Vec<Force>,
    force_pool: ForcePool,
    automatisms: Vec<Option<RuntimeAutomatism>>,
    hit_boxes: Vec<Polygon>,
    aabb: Aabb2,
    kind: Box<dyn ObjectKind>,
    /// 当前登记在哪个图层桶里，以及登记时的 z 序。
    pub(crate) registered_layer: Option<(String, i32)>,
}

impl std::fmt::Debug for RuntimeObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeObject")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind_tag)
            .field("lifecycle", &self.lifecycle)
            .field("state", &self.state)
            .field("forces", &self.forces.len())
            .field("automatisms", &self.automatisms)
            .finish_non_exhaustive()
    }
}

impl RuntimeObject {
    pub(crate) fn new(
        id: ObjectId,
        data: &ObjectData,
        name_id: u32,
        kind: Box<dyn ObjectKind>,
        force_pool: ForcePool,
    ) -> Self {
        Self {
            id,
            name: data.name.clone(),
            name_id,
            kind_tag: data.kind.clone(),
            lifecycle: ObjectLifecycle::Created,
            state: ObjectState::default(),
            variables: VariablesContainer::from_data(&data.variables),
            forces: Vec::new(),
            force_pool,
            automatisms: Vec::new(),
            hit_boxes: Vec::new(),
            aabb: Aabb2::default(),
            kind,
            registered_layer: None,
        }
    }

    /// 回收复用：恢复到刚从模板创建时的状态（新的 id，位置归零，变量重新初始化，力清空）。
    pub(crate) fn reset(
        &mut self,
        id: ObjectId,
        data: &ObjectData,
        name_id: u32,
        ctx: &ObjectContext<'_>,
    ) {
        self.id = id;
        self.name.clone_from(&data.name);
        self.name_id = name_id;
        self.kind_tag.clone_from(&data.kind);
        self.lifecycle = ObjectLifecycle::Created;
        self.state = ObjectState::default();
        self.variables.init_from(&data.variables, false);
        self.clear_forces();
        self.registered_layer = None;
        self.kind.reset(data, ctx);
    }

    /// 按模板声明安装自动行为。
    ///
    /// 已有的行为实例若类型与声明一致则原地重置复用，否则用 `build` 重新构造；
    /// `build` 返回 `None` 的声明被跳过，多余的旧实例被丢弃。
    pub(crate) fn install_automatisms<F>(
        &mut self,
        declared: &[AutomatismData],
        names: &NameTable,
        mut build: F,
    ) where
        F: FnMut(&AutomatismData) -> Option<Box<dyn Automatism>>,
    {
        let mut old = std::mem::take(&mut self.automatisms).into_iter();
        let mut installed = Vec::with_capacity(declared.len());
        for data in declared {
            let name_id = names.identifier(&data.name);
            match old.next().flatten() {
                Some(mut existing) if existing.kind() == data.kind => {
                    existing.reset(data, name_id);
                    installed.push(Some(existing));
                }
                _ => {
                    if let Some(behavior) = build(data) {
                        installed.push(Some(RuntimeAutomatism::new(data, name_id, behavior)));
                    }
                }
            }
        }
        self.automatisms = installed;
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_id(&self) -> u32 {
        self.name_id
    }

    /// 类型标签，例如 `"Sprite"`。
    pub fn kind_tag(&self) -> &str {
        &self.kind_tag
    }

    pub fn lifecycle(&self) -> ObjectLifecycle {
        self.lifecycle
    }

    pub fn is_living(&self) -> bool {
        matches!(
            self.lifecycle,
            ObjectLifecycle::Created | ObjectLifecycle::Living
        )
    }

    pub(crate) fn set_lifecycle(&mut self, lifecycle: ObjectLifecycle) {
        self.lifecycle = lifecycle;
    }

    pub fn state(&self) -> &ObjectState {
        &self.state
    }

    pub fn kind(&self) -> &dyn ObjectKind {
        self.kind.as_ref()
    }

    /// 按具体类型访问对象类型扩展。
    pub fn kind_as<K: ObjectKind + 'static>(&self) -> Option<&K> {
        self.kind.as_any().downcast_ref::<K>()
    }

    /// 同时借出具体类型扩展与共享状态，便于调用需要标记碰撞盒过期的类型方法。
    pub fn kind_parts_mut<K: ObjectKind + 'static>(
        &mut self,
    ) -> Option<(&mut K, &mut ObjectState)> {
        let kind = self.kind.as_any_mut().downcast_mut::<K>()?;
        Some((kind, &mut self.state))
    }

    // 位置与角度

    pub fn x(&self) -> f32 {
        self.state.x
    }

    pub fn y(&self) -> f32 {
        self.state.y
    }

    pub fn set_x(&mut self, x: f32) {
        if x == self.state.x {
            return;
        }
        self.state.x = x;
        self.state.hit_boxes_dirty = true;
    }

    pub fn set_y(&mut self, y: f32) {
        if y == self.state.y {
            return;
        }
        self.state.y = y;
        self.state.hit_boxes_dirty = true;
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.set_x(x);
        self.set_y(y);
    }

    pub fn angle(&self) -> f32 {
        self.kind.angle(&self.state)
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.kind.set_angle(&mut self.state, angle);
    }

    pub fn z_order(&self) -> i32 {
        self.state.z_order
    }

    pub fn set_z_order(&mut self, z: i32) {
        self.state.z_order = z;
    }

    pub fn layer(&self) -> &str {
        &self.state.layer
    }

    pub fn set_layer(&mut self, layer: &str) {
        if self.state.layer != layer {
            self.state.layer = layer.to_owned();
        }
    }

    pub fn is_on_layer(&self, layer: &str) -> bool {
        self.state.layer == layer
    }

    pub fn hide(&mut self, hidden: bool) {
        self.state.hidden = hidden;
    }

    pub fn is_visible(&self) -> bool {
        !self.state.hidden
    }

    pub fn is_hidden(&self) -> bool {
        self.state.hidden
    }

    pub fn width(&self) -> f32 {
        self.kind.width()
    }

    pub fn height(&self) -> f32 {
        self.kind.height()
    }

    pub fn set_width(&mut self, width: f32) {
        self.kind.set_width(&mut self.state, width);
    }

    pub fn set_height(&mut self, height: f32) {
        self.kind.set_height(&mut self.state, height);
    }

    pub fn drawable_x(&self) -> f32 {
        self.state.x - self.kind.origin_offset().x
    }

    pub fn drawable_y(&self) -> f32 {
        self.state.y - self.kind.origin_offset().y
    }

    /// 旋转中心相对绘制左上角的 x 偏移。
    pub fn center_x(&self) -> f32 {
        self.kind.center().x
    }

    pub fn center_y(&self) -> f32 {
        self.kind.center().y
    }

    /// 旋转中心的世界坐标。
    pub fn center_position(&self) -> Vector2<f32> {
        Vector2::new(
            self.drawable_x() + self.center_x(),
            self.drawable_y() + self.center_y(),
        )
    }

    /// 以 `speed`（度/秒）旋转 `elapsed` 秒。
    pub fn rotate(&mut self, speed: f32, elapsed: f32) {
        let angle = self.angle() + speed * elapsed;
        self.set_angle(angle);
    }

    /// 以 `speed`（度/秒）朝目标角度旋转，不会越过目标；`speed == 0` 时直接转到目标角度。
    pub fn rotate_toward_angle(&mut self, target: f32, speed: f32, elapsed: f32) {
        if speed == 0.0 {
            self.set_angle(target);
            return;
        }

        let current = self.angle();
        let diff_was_positive = angle_difference(current, target) >= 0.0;
        let direction = if diff_was_positive { -1.0 } else { 1.0 };
        let mut next = current + direction * speed * elapsed;
        if (angle_difference(next, target) > 0.0) ^ diff_was_positive {
            next = target;
        }
        self.set_angle(next);

        // 八方向等只接受离散角度的对象无法停在中间值上，直接转到目标角度。
        if self.angle() != next {
            self.set_angle(target);
        }
    }

    pub fn rotate_toward_position(&mut self, x: f32, y: f32, speed: f32, elapsed: f32) {
        let c = self.center_position();
        let target = (y - c.y).atan2(x - c.x).to_degrees();
        self.rotate_toward_angle(target, speed, elapsed);
    }

    /// 把对象的旋转中心放到以 `(x, y)` 为圆心、半径 `distance`、方向 `angle`（度）的位置上。
    pub fn put_around(&mut self, x: f32, y: f32, distance: f32, angle: f32) {
        let rad = angle.to_radians();
        let origin = self.kind.origin_offset();
        self.set_x(x + rad.cos() * distance - self.center_x() + origin.x);
        self.set_y(y + rad.sin() * distance - self.center_y() + origin.y);
    }

    pub fn put_around_object(&mut self, other: &RuntimeObject, distance: f32, angle: f32) {
        let c = other.center_position();
        self.put_around(c.x, c.y, distance, angle);
    }

    pub fn sq_distance_from(&self, other: &RuntimeObject) -> f32 {
        (self.center_position() - other.center_position()).norm_squared()
    }

    pub fn distance_from(&self, other: &RuntimeObject) -> f32 {
        self.sq_distance_from(other).sqrt()
    }

    /// 两个对象旋转中心之间的距离是否不超过 `distance`。
    pub fn distance_test(a: &RuntimeObject, b: &RuntimeObject, distance: f32) -> bool {
        a.sq_distance_from(b) <= distance * distance
    }

    // 变量

    pub fn variables(&self) -> &VariablesContainer {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariablesContainer {
        &mut self.variables
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.has(name)
    }

    // 力

    /// 添加一个力；`permanent == false` 的力只作用一帧。
    pub fn add_force(&mut self, x: f32, y: f32, permanent: bool) {
        let force = self.force_pool.take(x, y, !permanent);
        self.forces.push(force);
    }

    /// 按极坐标（角度制）添加力。
    pub fn add_polar_force(&mut self, angle: f32, length: f32, permanent: bool) {
        let rad = angle.to_radians();
        self.add_force(rad.cos() * length, rad.sin() * length, permanent);
    }

    /// 添加一个从旋转中心指向 `(x, y)`、长度为 `length` 的力。
    pub fn add_force_toward_position(&mut self, x: f32, y: f32, length: f32, permanent: bool) {
        let c = self.center_position();
        let rad = (y - c.y).atan2(x - c.x);
        self.add_force(rad.cos() * length, rad.sin() * length, permanent);
    }

    pub fn add_force_toward_object(&mut self, other: &RuntimeObject, length: f32, permanent: bool) {
        let c = other.center_position();
        self.add_force_toward_position(c.x, c.y, length, permanent);
    }

    pub fn forces(&self) -> &[Force] {
        &self.forces
    }

    pub fn clear_forces(&mut self) {
        self.force_pool.recycle_all(self.forces.drain(..));
    }

    pub fn has_no_forces(&self) -> bool {
        self.forces.is_empty()
    }

    /// 所有力的合力（分量相加，不做平均）。
    pub fn average_force(&self) -> Force {
        let sum = self
            .forces
            .iter()
            .fold(Vector2::zeros(), |acc: Vector2<f32>, f| acc + f.vector());
        Force::new(sum.x, sum.y, false)
    }

    /// 合力方向是否落在 `angle ± tolerance / 2` 内（角度制，合力角度取 0..360）。
    pub fn average_force_angle_is(&self, angle: f32, tolerance: f32) -> bool {
        let mut average = self.average_force().angle();
        if average < 0.0 {
            average += 360.0;
        }
        (angle - average).abs() < tolerance / 2.0
    }

    /// 移除只作用一帧的力，并把它们放回力池。
    pub fn update_forces(&mut self) {
        let mut i = 0;
        while i < self.forces.len() {
            if self.forces[i].is_temporary() {
                let force = self.forces.remove(i);
                self.force_pool.recycle(force);
            } else {
                i += 1;
            }
        }
    }

    // 碰撞

    /// 当前的碰撞盒（必要时重建）。
    pub fn hit_boxes(&mut self) -> &[Polygon] {
        self.refresh_hit_boxes();
        &self.hit_boxes
    }

    /// 当前的 AABB（必要时重建）。
    ///
    /// 包围的是旋转后的碰撞盒顶点，而不是未旋转的绘制矩形：对象旋转后 AABB 会随之变大，
    /// 自定义碰撞盒超出绘制区域时也会被包含进来。没有碰撞盒时退化为绘制位置上的零尺寸盒。
    pub fn aabb(&mut self) -> Aabb2 {
        self.refresh_hit_boxes();
        self.aabb
    }

    pub fn hit_boxes_dirty(&self) -> bool {
        self.state.hit_boxes_dirty
    }

    fn refresh_hit_boxes(&mut self) {
        if !self.state.hit_boxes_dirty {
            return;
        }
        self.update_hit_boxes();
        self.update_aabb();
        self.state.hit_boxes_dirty = false;
    }

    /// 默认碰撞盒：一个与对象同尺寸、绕旋转中心旋转后的矩形。
    fn update_hit_boxes(&mut self) {
        let (hw, hh) = (self.width() / 2.0, self.height() / 2.0);
        let center = self.center_position();
        let angle = self.angle().to_radians();

        if self.hit_boxes.len() != 1 {
            self.hit_boxes = vec![Polygon::default()];
        }
        let rect = &mut self.hit_boxes[0];
        rect.vertices.clear();
        rect.vertices.extend_from_slice(&[
            Vector2::new(-hw, -hh),
            Vector2::new(hw, -hh),
            Vector2::new(hw, hh),
            Vector2::new(-hw, hh),
        ]);
        rect.rotate(angle);
        rect.translate(center.x, center.y);
    }

    fn update_aabb(&mut self) {
        let fallback = Aabb2::from_rect(self.drawable_x(), self.drawable_y(), 0.0, 0.0);
        self.aabb = Aabb2::enclosing(
            self.hit_boxes
                .iter()
                .flat_map(|p| p.vertices.iter().copied()),
        )
        .unwrap_or(fallback);
    }

    /// 两阶段碰撞测试。
    ///
    /// 1. 外接圆（半对角线之和）不相交则立即判定不碰撞；
    /// 2. 内切圆（半最短边之和）相交则立即判定碰撞；
    /// 3. 否则对两边所有碰撞盒两两做分离轴测试，任意一对相交即为碰撞。
    pub fn collision_test(a: &mut RuntimeObject, b: &mut RuntimeObject) -> bool {
        let (aw, ah) = (a.width(), a.height());
        let (bw, bh) = (b.width(), b.height());
        let d = a.center_position() - b.center_position();
        let dist_sq = d.norm_squared();

        let a_radius = (aw * aw + ah * ah).sqrt() / 2.0;
        let b_radius = (bw * bw + bh * bh).sqrt() / 2.0;
        if dist_sq.sqrt() > a_radius + b_radius {
            return false;
        }

        let a_min_edge = aw.min(ah) / 2.0;
        let b_min_edge = bw.min(bh) / 2.0;
        let inner = a_min_edge + b_min_edge;
        if dist_sq < inner * inner {
            return true;
        }

        a.refresh_hit_boxes();
        b.refresh_hit_boxes();
        a.hit_boxes.iter().any(|pa| {
            b.hit_boxes
                .iter()
                .any(|pb| Polygon::collision_test(pa, pb).collision)
        })
    }

    /// 把对象推出与 `others` 的所有重叠。
    ///
    /// 每一对相交碰撞盒的最小平移向量被累加后一次性应用，不会在部分推出后重新检测，
    /// 因此同时与多个对象重叠时可能推得过远。返回是否发生了移动。
    pub fn separate_from_objects<'a, I>(&mut self, others: I) -> bool
    where
        I: IntoIterator<Item = &'a mut RuntimeObject>,
    {
        self.refresh_hit_boxes();
        let mut total = Vector2::zeros();
        let mut moved = false;

        for other in others {
            if other.id == self.id {
                continue;
            }
            other.refresh_hit_boxes();
            for mine in &self.hit_boxes {
                for theirs in &other.hit_boxes {
                    let result = Polygon::collision_test(mine, theirs);
                    if result.collision {
                        total += result.move_axis;
                        moved = true;
                    }
                }
            }
        }

        if moved {
            self.set_position(self.state.x + total.x, self.state.y + total.y);
        }
        moved
    }

    // 自动行为

    pub fn automatisms(&self) -> impl Iterator<Item = &RuntimeAutomatism> {
        self.automatisms.iter().flatten()
    }

    pub fn automatism(&self, name: &str) -> Option<&RuntimeAutomatism> {
        self.automatisms().find(|a| a.name() == name)
    }

    pub fn automatism_mut(&mut self, name: &str) -> Option<&mut RuntimeAutomatism> {
        self.automatisms
            .iter_mut()
            .flatten()
            .find(|a| a.name() == name)
    }

    pub fn has_automatism(&self, name: &str) -> bool {
        self.automatism(name).is_some()
    }

    pub fn activate_automatism(&mut self, name: &str, enable: bool) {
        if let Some(automatism) = self.automatism_mut(name) {
            automatism.activate(enable);
        }
    }

    pub fn automatism_activated(&self, name: &str) -> bool {
        self.automatism(name).is_some_and(RuntimeAutomatism::activated)
    }

    pub(crate) fn automatism_count(&self) -> usize {
        self.automatisms.len()
    }

    pub(crate) fn take_automatism(&mut self, index: usize) -> Option<RuntimeAutomatism> {
        self.automatisms.get_mut(index).and_then(Option::take)
    }

    pub(crate) fn restore_automatism(&mut self, index: usize, automatism: RuntimeAutomatism) {
        if let Some(slot) = self.automatisms.get_mut(index) {
            *slot = Some(automatism);
        }
    }

    // 生命周期钩子

    /// 推进 `elapsed` 秒。
    pub fn update_time(&mut self, elapsed: f32) {
        self.kind.update_time(&mut self.state, elapsed);
    }

    pub fn extra_initialization(&mut self, instance: &InstanceData) {
        self.kind.extra_initialization(&mut self.state, instance);
    }

    pub(crate) fn on_removed_from_scene(&mut self) {
        self.kind.on_deleted_from_scene(&mut self.state);
        for automatism in self.automatisms.iter_mut().flatten() {
            automatism.owner_removed();
        }
        self.clear_forces();
        self.lifecycle = ObjectLifecycle::Removed;
    }

    pub(crate) fn drawable(&self) -> Option<Drawable> {
        if self.state.hidden {
            return None;
        }
        let visual = self.kind.visual(&self.state)?;
        Some(Drawable {
            object: self.id,
            x: self.drawable_x(),
            y: self.drawable_y(),
            angle: self.angle(),
            z_order: self.state.z_order,
            visual,
        })
    }
}

/// `a - b` 归一化到 `[-180, 180)`（角度制）。
pub fn angle_difference(a: f32, b: f32) -> f32 {
    positive_mod(positive_mod(a - b, 360.0) + 180.0, 360.0) - 180.0
}

fn positive_mod(a: f32, b: f32) -> f32 {
    a - (a / b).floor() * b
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 固定尺寸的测试对象。
    struct Block {
        width: f32,
        height: f32,
    }

    impl ObjectKind for Block {
        fn width(&self) -> f32 {
            self.width
        }

        fn height(&self) -> f32 {
            self.height
        }

        fn reset(&mut self, _data: &ObjectData, _ctx: &ObjectContext<'_>) {}

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn block(id: u64, x: f32, y: f32, w: f32, h: f32) -> RuntimeObject {
        let data = ObjectData {
            name: "Block".into(),
            ..Default::default()
        };
        let mut obj = RuntimeObject::new(
            ObjectId::new(id),
            &data,
            0,
            Box::new(Block {
                width: w,
                height: h,
            }),
            ForcePool::new(),
        );
        obj.set_position(x, y);
        obj
    }

    #[test]
    fn overlapping_objects_collide() {
        let mut a = block(1, 0.0, 0.0, 10.0, 10.0);
        let mut b = block(2, 5.0, 5.0, 10.0, 10.0);
        let mut c = block(3, 20.0, 20.0, 10.0, 10.0);
        assert!(RuntimeObject::collision_test(&mut a, &mut b));
        assert!(!RuntimeObject::collision_test(&mut a, &mut c));
    }

    #[test]
    fn exact_test_runs_between_circles() {
        // 中心距离 ≈ 13.4：在外接圆内，又在内切圆外，需要精确测试。
        let mut a = block(1, 0.0, 0.0, 10.0, 10.0);
        let mut b = block(2, 9.5, 9.5, 10.0, 10.0);
        assert!(RuntimeObject::collision_test(&mut a, &mut b));

        a.set_angle(45.0);
        let mut c = block(3, 9.0, 9.0, 10.0, 10.0);
        assert!(!RuntimeObject::collision_test(&mut a, &mut c));
    }

    #[test]
    fn hit_boxes_follow_position_and_angle() {
        let mut a = block(1, 10.0, 20.0, 4.0, 2.0);
        assert_eq!(a.aabb(), Aabb2::from_rect(10.0, 20.0, 4.0, 2.0));
        assert!(!a.hit_boxes_dirty());

        a.set_x(10.0);
        assert!(!a.hit_boxes_dirty(), "值未变化时不应标记过期");

        a.set_angle(90.0);
        assert!(a.hit_boxes_dirty());
        let aabb = a.aabb();
        assert!((aabb.size().x - 2.0).abs() < 1.0e-4);
        assert!((aabb.size().y - 4.0).abs() < 1.0e-4);
    }

    #[test]
    fn temporary_forces_are_recycled() {
        let mut a = block(1, 0.0, 0.0, 1.0, 1.0);
        let pool = a.force_pool.clone();
        a.add_force(1.0, 0.0, false);
        a.add_force(0.0, 2.0, true);
        a.add_polar_force(90.0, 1.0, false);

        let avg = a.average_force();
        assert!((avg.x() - 1.0).abs() < 1.0e-4);
        assert!((avg.y() - 3.0).abs() < 1.0e-4);

        a.update_forces();
        assert_eq!(a.forces().len(), 1);
        assert_eq!(pool.len(), 2);

        a.clear_forces();
        assert!(a.has_no_forces());
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn average_force_angle_uses_positive_range() {
        let mut a = block(1, 0.0, 0.0, 1.0, 1.0);
        a.add_force(0.0, -1.0, false);
        assert!(a.average_force_angle_is(270.0, 10.0));
        assert!(!a.average_force_angle_is(90.0, 10.0));
    }

    #[test]
    fn force_toward_position_points_at_target() {
        let mut a = block(1, 0.0, 0.0, 2.0, 2.0);
        a.add_force_toward_position(1.0, 11.0, 5.0, false);
        let f = &a.forces()[0];
        assert!(f.x().abs() < 1.0e-4);
        assert!((f.y() - 5.0).abs() < 1.0e-4);
    }

    #[test]
    fn separation_sums_push_out_vectors() {
        let mut a = block(1, 0.0, 0.0, 10.0, 10.0);
        let mut b = block(2, 8.0, 0.0, 10.0, 10.0);
        let mut c = block(3, -8.0, 0.0, 10.0, 10.0);
        let moved = a.separate_from_objects([&mut b]);
        assert!(moved);
        assert!((a.x() + 2.0).abs() < 1.0e-4);

        // 左右同时重叠时两个推力相互抵消。
        let mut d = block(4, 0.0, 0.0, 10.0, 10.0);
        let mut e = block(5, 8.0, 0.0, 10.0, 10.0);
        d.separate_from_objects([&mut e, &mut c]);
        assert!(d.x().abs() < 1.0e-4);
    }

    #[test]
    fn rotate_toward_angle_never_overshoots() {
        let mut a = block(1, 0.0, 0.0, 1.0, 1.0);
        a.rotate_toward_angle(90.0, 60.0, 1.0);
        assert!((a.angle() - 60.0).abs() < 1.0e-4);
        a.rotate_toward_angle(90.0, 60.0, 1.0);
        assert!((a.angle() - 90.0).abs() < 1.0e-4);

        a.rotate_toward_angle(-90.0, 0.0, 1.0);
        assert_eq!(a.angle(), -90.0);
    }

    #[test]
    fn put_around_places_center_on_circle() {
        let mut a = block(1, 0.0, 0.0, 4.0, 4.0);
        let anchor = block(2, 10.0, 10.0, 2.0, 2.0);
        a.put_around_object(&anchor, 5.0, 0.0);
        let c = a.center_position();
        assert!((c.x - 16.0).abs() < 1.0e-4);
        assert!((c.y - 11.0).abs() < 1.0e-4);
        assert!((a.distance_from(&anchor) - 5.0).abs() < 1.0e-4);
        assert!(RuntimeObject::distance_test(&a, &anchor, 5.0));
        assert!(!RuntimeObject::distance_test(&a, &anchor, 4.9));
    }

    #[test]
    fn angle_difference_wraps() {
        assert_eq!(angle_difference(10.0, 350.0), 20.0);
        assert_eq!(angle_difference(350.0, 10.0), -20.0);
        assert_eq!(angle_difference(0.0, 180.0), -180.0);
    }
}
