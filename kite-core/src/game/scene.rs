use std::{collections::HashMap, sync::Arc, time::Instant};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::{
    data::ObjectData,
    render::{LayerFrame, RenderBackend, RenderFrame},
};

use super::{
    GameShared,
    automatism::AutomatismContext,
    force::ForcePool,
    layer::Layer,
    object::{ObjectContext, ObjectId, ObjectLifecycle, RuntimeObject},
    registry::{EventsFunction, ObjectFactory},
    spatial::{QuadtreeIndex, SpatialEntry},
    timer::Timer,
    variables_container::VariablesContainer,
};

mod deletion;
mod loader;
#[cfg(test)]
mod tests;

pub use deletion::DeletionScope;
pub use loader::SceneLoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepPhase {
    PreEvents,
    PostEvents,
}

/// 一个正在运行的场景：对象、图层、计时器与逐帧流水线。
///
/// 每帧由 [`render_and_step`](Self::render_and_step) 驱动，依次执行：
/// 1. 计算本帧流逝时间（按最低帧率钳制，再乘以时间缩放），推进计时器；
/// 2. 所有对象的自动行为 `step_pre_events`（删除延迟到阶段结束）；
/// 3. 场景事件函数；
/// 4. 力积分，然后每个对象 `update_time` 与自动行为 `step_post_events`（删除延迟到阶段结束）；
/// 5. 生成绘制快照交给渲染后端。
///
/// 对象删除是“标记 + 延迟”的：在 [`DeletionScope`] 内标记删除的对象在本阶段剩余时间里仍然可见，
/// 作用域结束时统一移除，并按对象名放回回收池供 [`create_object`](Self::create_object) 复用。
pub struct RuntimeScene {
    game: Arc<GameShared>,
    name: String,
    loaded: bool,
    background: [u8; 3],
    variables: VariablesContainer,
    bad_variables: VariablesContainer,

    templates: HashMap<String, ObjectData>,
    factories: HashMap<String, ObjectFactory>,
    objects: HashMap<ObjectId, Box<RuntimeObject>>,
    instances: IndexMap<String, Vec<ObjectId>>,
    pools: HashMap<String, Vec<Box<RuntimeObject>>>,
    last_id: u64,
    force_pool: ForcePool,

    deletion_depth: usize,
    pending_deletions: Vec<ObjectId>,

    layers: IndexMap<String, Layer>,
    timers: HashMap<String, Timer>,

    spatial: Option<QuadtreeIndex>,
    spatial_frame: u64,
    frame_index: u64,

    events: Option<EventsFunction>,
    renderer: Option<Box<dyn RenderBackend>>,

    last_frame_time: Option<Instant>,
    elapsed_ms: f64,
    time_from_start_ms: f64,
    time_scale: f64,
    first_frame: bool,
    requested_scene: Option<String>,
    game_stop_requested: bool,
}

impl std::fmt::Debug for RuntimeScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeScene")
            .field("name", &self.name)
            .field("loaded", &self.loaded)
            .field("objects", &self.objects.len())
            .field("layers", &self.layers.keys().collect::<Vec<_>>())
            .field("elapsed_ms", &self.elapsed_ms)
            .finish_non_exhaustive()
    }
}

impl RuntimeScene {
    /// 创建一个空场景（只有默认图层 `""`）；随后用 [`load_from_scene`](Self::load_from_scene) 载入内容。
    pub fn new(game: Arc<GameShared>) -> Self {
        let mut layers = IndexMap::new();
        layers.insert(
            String::new(),
            Layer::new("", true, game.config().viewport),
        );
        Self {
            game,
            name: String::new(),
            loaded: false,
            background: [0, 0, 0],
            variables: VariablesContainer::new(),
            bad_variables: VariablesContainer::bad(),
            templates: HashMap::new(),
            factories: HashMap::new(),
            objects: HashMap::new(),
            instances: IndexMap::new(),
            pools: HashMap::new(),
            last_id: 0,
            force_pool: ForcePool::new(),
            deletion_depth: 0,
            pending_deletions: Vec::new(),
            layers,
            timers: HashMap::new(),
            spatial: None,
            spatial_frame: 0,
            frame_index: 0,
            events: None,
            renderer: None,
            last_frame_time: None,
            elapsed_ms: 0.0,
            time_from_start_ms: 0.0,
            time_scale: 1.0,
            first_frame: true,
            requested_scene: None,
            game_stop_requested: false,
        }
    }

    pub fn game(&self) -> &Arc<GameShared> {
        &self.game
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn background_color(&self) -> [u8; 3] {
        self.background
    }

    pub fn set_background_color(&mut self, rgb: [u8; 3]) {
        self.background = rgb;
    }

    pub fn variables(&self) -> &VariablesContainer {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariablesContainer {
        &mut self.variables
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn RenderBackend>) {
        self.renderer = Some(renderer);
    }

    pub fn take_renderer(&mut self) -> Option<Box<dyn RenderBackend>> {
        self.renderer.take()
    }

    pub fn set_events_function<F>(&mut self, events: F)
    where
        F: FnMut(&mut RuntimeScene) + Send + 'static,
    {
        self.events = Some(Box::new(events));
    }

    // 帧流水线

    /// 以当前时刻推进一帧。返回 `false` 表示请求了切换场景或停止游戏。
    pub fn render_and_step(&mut self) -> bool {
        self.render_and_step_at(Instant::now())
    }

    /// 以给定时刻推进一帧（便于宿主程序或测试控制时钟）。
    pub fn render_and_step_at(&mut self, now: Instant) -> bool {
        self.update_time(now);
        self.update_objects_pre_events();
        self.run_events();
        self.update_objects();
        self.render();

        self.first_frame = false;
        self.frame_index += 1;

        self.requested_scene.is_none() && !self.game_stop_requested
    }

    fn update_time(&mut self, now: Instant) {
        let max_elapsed = 1000.0 / f64::from(self.game.min_fps().max(1));
        let raw = self
            .last_frame_time
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f64() * 1000.0);
        self.last_frame_time = Some(now);

        self.elapsed_ms = raw.clamp(0.0, max_elapsed) * self.time_scale;
        for timer in self.timers.values_mut() {
            timer.update_time(self.elapsed_ms);
        }
        self.time_from_start_ms += self.elapsed_ms;
    }

    fn update_objects_pre_events(&mut self) {
        let ids = self.all_object_ids();
        let mut scope = self.defer_deletions();
        for id in ids {
            scope.step_automatisms(id, StepPhase::PreEvents);
        }
    }

    fn run_events(&mut self) {
        let Some(mut events) = self.events.take() else {
            return;
        };
        events(self);
        // 事件函数可能在执行中替换了自己。
        if self.events.is_none() {
            self.events = Some(events);
        }
    }

    fn update_objects(&mut self) {
        let ids = self.all_object_ids();
        self.update_objects_forces(&ids);

        let elapsed = (self.elapsed_ms / 1000.0) as f32;
        let mut scope = self.defer_deletions();
        for id in ids {
            if let Some(obj) = scope.objects.get_mut(&id) {
                obj.update_time(elapsed);
            }
            scope.step_automatisms(id, StepPhase::PostEvents);
        }
    }

    /// 按合力移动对象，然后丢弃只作用一帧的力。
    fn update_objects_forces(&mut self, ids: &[ObjectId]) {
        let dt = (self.elapsed_ms / 1000.0) as f32;
        for id in ids {
            let Some(obj) = self.objects.get_mut(id) else {
                continue;
            };
            if obj.has_no_forces() {
                continue;
            }
            let average = obj.average_force();
            let (x, y) = (obj.x() + average.x() * dt, obj.y() + average.y() * dt);
            obj.set_position(x, y);
            obj.update_forces();
        }
    }

    fn step_automatisms(&mut self, id: ObjectId, phase: StepPhase) {
        let count = match self.objects.get(&id) {
            Some(obj) => obj.automatism_count(),
            None => return,
        };
        for index in 0..count {
            let Some(mut automatism) = self
                .objects
                .get_mut(&id)
                .and_then(|obj| obj.take_automatism(index))
            else {
                continue;
            };

            {
                let mut ctx = AutomatismContext {
                    scene: self,
                    owner: id,
                };
                match phase {
                    StepPhase::PreEvents => automatism.step_pre_events(&mut ctx),
                    StepPhase::PostEvents => automatism.step_post_events(&mut ctx),
                }
            }

            if let Some(obj) = self.objects.get_mut(&id) {
                obj.restore_automatism(index, automatism);
            }
        }
    }

    /// 生成本帧的绘制快照，并把对象的图层/z 序变化同步到图层桶中。
    pub fn build_render_frame(&mut self) -> RenderFrame {
        for id in self.all_object_ids() {
            self.sync_layer(id);
        }

        let layers = self
            .layers
            .values()
            .filter(|layer| layer.is_visible())
            .map(|layer| LayerFrame {
                name: layer.name().to_owned(),
                camera_x: layer.camera_x(0),
                camera_y: layer.camera_y(0),
                camera_rotation: layer.camera_rotation(0),
                zoom: layer.zoom(0),
                drawables: layer
                    .children()
                    .filter_map(|id| self.objects.get(&id)?.drawable())
                    .collect(),
            })
            .collect();

        RenderFrame {
            background: self.background,
            layers,
        }
    }

    pub fn render(&mut self) {
        let frame = self.build_render_frame();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.render(&frame);
        }
    }

    // 时间

    /// 本帧流逝时间（毫秒，已钳制并乘以时间缩放）。
    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_ms
    }

    /// 场景开始以来的累计时间（毫秒）。
    pub fn time_from_start(&self) -> f64 {
        self.time_from_start_ms
    }

    pub fn is_first_frame(&self) -> bool {
        self.first_frame
    }

    /// 负值被忽略。
    pub fn set_time_scale(&mut self, time_scale: f64) {
        if time_scale >= 0.0 {
            self.time_scale = time_scale;
        }
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn add_timer(&mut self, name: &str) {
        self.timers.insert(name.to_owned(), Timer::new(name));
    }

    pub fn has_timer(&self, name: &str) -> bool {
        self.timers.contains_key(name)
    }

    pub fn timer(&self, name: &str) -> Option<&Timer> {
        self.timers.get(name)
    }

    pub fn timer_mut(&mut self, name: &str) -> Option<&mut Timer> {
        self.timers.get_mut(name)
    }

    pub fn remove_timer(&mut self, name: &str) {
        self.timers.remove(name);
    }

    // 流程控制

    pub fn request_scene_change(&mut self, scene: &str) {
        self.requested_scene = Some(scene.to_owned());
    }

    pub fn requested_scene(&self) -> Option<&str> {
        self.requested_scene.as_deref()
    }

    pub fn request_game_stop(&mut self) {
        self.game_stop_requested = true;
    }

    pub fn game_stop_requested(&self) -> bool {
        self.game_stop_requested
    }

    // 图层

    /// 按名字取图层，不存在时回退到默认图层 `""`。
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name).or_else(|| self.layers.get(""))
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        if self.layers.contains_key(name) {
            self.layers.get_mut(name)
        } else {
            self.layers.get_mut("")
        }
    }

    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// 按绘制顺序排列的图层。
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    fn sync_layer(&mut self, id: ObjectId) {
        let Some(obj) = self.objects.get_mut(&id) else {
            return;
        };
        let layer_name = if self.layers.contains_key(obj.layer()) {
            obj.layer()
        } else {
            ""
        };
        let z_order = obj.z_order();
        let up_to_date = obj
            .registered_layer
            .as_ref()
            .is_some_and(|(registered, z)| registered == layer_name && *z == z_order);
        if up_to_date {
            return;
        }
        let layer_name = layer_name.to_owned();

        if let Some((old, _)) = obj.registered_layer.take() {
            if let Some(layer) = self.layers.get_mut(&old) {
                layer.remove_child(id);
            }
        }
        if let Some(layer) = self.layers.get_mut(&layer_name) {
            layer.add_child(id, z_order);
            obj.registered_layer = Some((layer_name, z_order));
        }
    }

    fn unregister_layer(&mut self, obj: &mut RuntimeObject) {
        if let Some((old, _)) = obj.registered_layer.take() {
            if let Some(layer) = self.layers.get_mut(&old) {
                layer.remove_child(obj.id());
            }
        }
    }

    // 对象

    /// 分配一个新的场景内唯一 id。
    pub fn create_new_unique_id(&mut self) -> ObjectId {
        self.last_id += 1;
        ObjectId::new(self.last_id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&RuntimeObject> {
        self.objects.get(&id).map(|obj| obj.as_ref())
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut RuntimeObject> {
        self.objects.get_mut(&id).map(|obj| obj.as_mut())
    }

    /// 对象的变量容器；对象不存在时返回吸收一切写入的“坏”容器。
    pub fn object_variables_mut(&mut self, id: ObjectId) -> &mut VariablesContainer {
        match self.objects.get_mut(&id) {
            Some(obj) => obj.variables_mut(),
            None => &mut self.bad_variables,
        }
    }

    /// 名为 `name` 的存活实例列表；该名字从未出现过时登记一个空列表并记录日志。
    pub fn objects(&mut self, name: &str) -> &[ObjectId] {
        if !self.instances.contains_key(name) {
            info!(target: "kite-core", object = %name, "No instances list for object, adding it");
            self.instances.insert(name.to_owned(), Vec::new());
        }
        self.instances.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 不登记新名字的只读版本。
    pub fn instances_of(&self, name: &str) -> &[ObjectId] {
        self.instances.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 已登记实例列表的对象名，按登记顺序排列。
    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    /// 场景中全部存活对象的 id，按对象名登记顺序、再按创建顺序排列。
    pub fn all_object_ids(&self) -> Vec<ObjectId> {
        self.instances.values().flatten().copied().collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// 回收池中名为 `name` 的闲置对象数量。
    pub fn pooled_count(&self, name: &str) -> usize {
        self.pools.get(name).map_or(0, Vec::len)
    }

    /// 按模板名创建对象：优先复用回收池中的实例（原地重置），否则用缓存的工厂新建。
    ///
    /// 新对象立即加入实例列表、图层桶与碰撞索引。模板不存在时记录日志、为该名字登记一个空的
    /// 实例列表，并返回 `None`。
    pub fn create_object(&mut self, name: &str) -> Option<ObjectId> {
        let Some(data) = self.templates.get(name) else {
            warn!(target: "kite-core", object = %name, "Unable to create object: no such object template");
            self.instances.entry(name.to_owned()).or_default();
            return None;
        };
        let id = ObjectId::new(self.last_id + 1);
        let name_id = self.game.names().identifier(name);
        let ctx = ObjectContext {
            images: self.game.images(),
        };

        let mut obj = match self.pools.get_mut(name).and_then(Vec::pop) {
            Some(mut recycled) => {
                recycled.reset(id, data, name_id, &ctx);
                recycled
            }
            None => {
                let Some(factory) = self.factories.get(name) else {
                    warn!(target: "kite-core", object = %name, kind = %data.kind, "Unable to create object: unknown object type");
                    return None;
                };
                Box::new(RuntimeObject::new(
                    id,
                    data,
                    name_id,
                    factory(data, &ctx),
                    self.force_pool.clone(),
                ))
            }
        };

        let registry = self.game.registry();
        obj.install_automatisms(&data.automatisms, self.game.names(), |declared| {
            match registry.automatism_factory(&declared.kind) {
                Some(factory) => Some(factory(declared)),
                None => {
                    warn!(
                        target: "kite-core",
                        object = %name,
                        automatism = %declared.name,
                        kind = %declared.kind,
                        "Unknown automatism type, skipped"
                    );
                    None
                }
            }
        });

        self.last_id += 1;
        self.add_object(obj);
        Some(id)
    }

    /// 把对象加入场景：实例列表、图层桶与（若本帧已建立的）碰撞索引。
    pub fn add_object(&mut self, mut obj: Box<RuntimeObject>) -> ObjectId {
        let id = obj.id();
        if !self.instances.contains_key(obj.name()) {
            info!(target: "kite-core", object = %obj.name(), "No instances list for object, adding it");
            self.instances.insert(obj.name().to_owned(), Vec::new());
        }
        if let Some(list) = self.instances.get_mut(obj.name()) {
            list.push(id);
        }
        if let Some(index) = self.spatial.as_mut() {
            index.insert(SpatialEntry {
                id,
                name_id: obj.name_id(),
                aabb: obj.aabb(),
            });
        }
        obj.set_lifecycle(ObjectLifecycle::Living);
        self.last_id = self.last_id.max(id.get());
        self.objects.insert(id, obj);
        self.sync_layer(id);
        id
    }

    /// 标记对象删除。
    ///
    /// 每个对象只会被标记一次（之后的调用返回 `false`）。处于 [`DeletionScope`] 内时对象在作用域结束前仍然可见；
    /// 否则立即移除。
    pub fn delete_object(&mut self, id: ObjectId) -> bool {
        let Some(obj) = self.objects.get_mut(&id) else {
            return false;
        };
        if !obj.is_living() {
            return false;
        }
        obj.set_lifecycle(ObjectLifecycle::MarkedForDeletion);
        self.mark_object_for_deletion(id);
        true
    }

    /// 把对象加入删除队列（延迟期间不重复入队），不在延迟期间则立即移除。
    pub fn mark_object_for_deletion(&mut self, id: ObjectId) {
        if self.deletion_depth > 0 {
            if !self.pending_deletions.contains(&id) {
                self.pending_deletions.push(id);
            }
            return;
        }
        self.remove_object(id);
    }

    /// 开启一个删除延迟作用域；作用域（含嵌套）全部结束时统一执行删除。
    pub fn defer_deletions(&mut self) -> DeletionScope<'_> {
        DeletionScope::new(self)
    }

    fn flush_pending_deletions(&mut self) {
        let pending = std::mem::take(&mut self.pending_deletions);
        for id in pending {
            self.remove_object(id);
        }
    }

    fn remove_object(&mut self, id: ObjectId) {
        let Some(mut obj) = self.objects.remove(&id) else {
            return;
        };
        if let Some(list) = self.instances.get_mut(obj.name()) {
            list.retain(|&other| other != id);
        }
        self.unregister_layer(&mut obj);
        obj.on_removed_from_scene();

        let capacity = self.game.config().object_pool_capacity;
        let pool = self.pools.entry(obj.name().to_owned()).or_default();
        if pool.len() < capacity {
            pool.push(obj);
        } else {
            debug!(target: "kite-core", object = %obj.name(), "Object pool full, dropping instance");
        }
    }

    // 碰撞

    /// 按所有对象当前的 AABB 重建碰撞候选索引。每帧在查询之前调用一次。
    pub fn update_potential_colliding_objects(&mut self) {
        let mut entries = Vec::with_capacity(self.objects.len());
        for id in self.all_object_ids() {
            if let Some(obj) = self.objects.get_mut(&id) {
                entries.push(SpatialEntry {
                    id,
                    name_id: obj.name_id(),
                    aabb: obj.aabb(),
                });
            }
        }
        let config = self.game.config();
        self.spatial = Some(QuadtreeIndex::build(
            entries,
            config.spatial_max_depth,
            config.spatial_max_items_per_node,
        ));
        self.spatial_frame = self.frame_index;
    }

    /// AABB 重叠的候选对象对（按名字标识筛选，不做精确测试）。
    ///
    /// 索引本帧未刷新时仍用上一次的结果回答，并记录调试日志；从未建立时返回空。
    pub fn potential_colliding_objects(
        &self,
        name_id_a: u32,
        name_id_b: u32,
    ) -> Vec<(ObjectId, ObjectId)> {
        let Some(index) = self.spatial.as_ref() else {
            debug!(target: "kite-core", "Collision index queried before it was built");
            return Vec::new();
        };
        if self.spatial_frame != self.frame_index {
            debug!(
                target: "kite-core",
                built = self.spatial_frame,
                frame = self.frame_index,
                "Collision index is stale, answering from last refresh"
            );
        }
        index
            .candidate_pairs(name_id_a, name_id_b)
            .into_iter()
            .filter(|(a, b)| self.objects.contains_key(a) && self.objects.contains_key(b))
            .collect()
    }

    /// 真正相撞的对象对：候选对再经过 [`RuntimeObject::collision_test`] 精确测试。
    ///
    /// 任一名字从未登记过时返回空。
    pub fn colliding_objects(&mut self, name_a: &str, name_b: &str) -> Vec<(ObjectId, ObjectId)> {
        let names = self.game.names();
        let (Some(a), Some(b)) = (names.lookup(name_a), names.lookup(name_b)) else {
            return Vec::new();
        };
        self.potential_colliding_objects(a, b)
            .into_iter()
            .filter(|&(a, b)| self.objects_collide(a, b))
            .collect()
    }

    /// 两个对象是否相撞。
    pub fn objects_collide(&mut self, a: ObjectId, b: ObjectId) -> bool {
        if a == b {
            return false;
        }
        let Some(mut first) = self.objects.remove(&a) else {
            return false;
        };
        let hit = self
            .objects
            .get_mut(&b)
            .is_some_and(|second| RuntimeObject::collision_test(&mut first, second));
        self.objects.insert(a, first);
        hit
    }

    /// 把对象推出与名为 `names` 的所有对象的重叠，返回是否移动。
    pub fn separate_object_from(&mut self, id: ObjectId, names: &[&str]) -> bool {
        let Some(mut obj) = self.objects.remove(&id) else {
            return false;
        };
        let candidates: Vec<ObjectId> = names
            .iter()
            .flat_map(|name| self.instances_of(name).iter().copied())
            .collect();
        let moved = obj.separate_from_objects(
            self.objects
                .iter_mut()
                .filter(|(other, _)| candidates.contains(other))
                .map(|(_, other)| other.as_mut()),
        );
        self.objects.insert(id, obj);
        moved
    }
}
