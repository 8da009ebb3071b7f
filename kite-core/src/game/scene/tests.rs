use super::*;
use crate::{
    config::GameConfig,
    data::{
        AnimationData, AutomatismData, DirectionData, FrameData, GameData, InstanceData,
        LayerData, SceneData, VariableData,
    },
    game::{
        RuntimeGame, automatism::Automatism, object::sprite::SpriteObject,
        registry::TypeRegistry,
    },
    resource::StaticImageCache,
};
use std::{
    any::Any,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

fn box_object(name: &str) -> ObjectData {
    ObjectData {
        name: name.into(),
        kind: "Sprite".into(),
        animations: vec![AnimationData {
            use_multiple_directions: false,
            directions: vec![DirectionData {
                frames: vec![FrameData {
                    image: "box.png".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }],
        ..Default::default()
    }
}

fn instance(object: &str, x: f32, y: f32) -> InstanceData {
    InstanceData {
        object: object.into(),
        x,
        y,
        ..Default::default()
    }
}

fn new_scene(registry: TypeRegistry, config: GameConfig) -> RuntimeScene {
    let game = RuntimeGame::new(
        GameData::default(),
        config,
        registry,
        Box::new(StaticImageCache::new().with_image("box.png", 10.0, 10.0)),
    );
    RuntimeScene::new(game.shared().clone())
}

fn loaded_scene(registry: TypeRegistry, data: SceneData) -> RuntimeScene {
    let mut scene = new_scene(registry, GameConfig::default());
    scene
        .load_from_scene(Some(&data))
        .expect("should load scene");
    scene
}

fn boxes_scene(instances: Vec<InstanceData>) -> SceneData {
    SceneData {
        name: "Level".into(),
        objects: vec![box_object("Box"), box_object("Wall")],
        instances,
        ..Default::default()
    }
}

struct SelfDestruct {
    seen: Arc<StdMutex<Vec<usize>>>,
    removed: Arc<StdMutex<usize>>,
}

impl Automatism for SelfDestruct {
    fn do_step_pre_events(&mut self, ctx: &mut AutomatismContext<'_>) -> anyhow::Result<()> {
        ctx.scene.delete_object(ctx.owner);
        let alive = ctx.scene.instances_of("Box").len();
        self.seen.lock().unwrap().push(alive);
        Ok(())
    }

    fn on_owner_removed(&mut self) {
        *self.removed.lock().unwrap() += 1;
    }

    fn reset(&mut self, _data: &AutomatismData) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
struct StepLog {
    built: usize,
    pre: usize,
    post: usize,
}

/// 统计步进次数，并在自身保存一个逐帧累加的计数。
struct Counter {
    log: Arc<StdMutex<StepLog>>,
    ticks: u32,
}

impl Automatism for Counter {
    fn do_step_pre_events(&mut self, _ctx: &mut AutomatismContext<'_>) -> anyhow::Result<()> {
        self.log.lock().unwrap().pre += 1;
        Ok(())
    }

    fn do_step_post_events(&mut self, _ctx: &mut AutomatismContext<'_>) -> anyhow::Result<()> {
        self.log.lock().unwrap().post += 1;
        self.ticks += 1;
        Ok(())
    }

    fn reset(&mut self, _data: &AutomatismData) {
        self.ticks = 0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn counter_registry(log: &Arc<StdMutex<StepLog>>) -> TypeRegistry {
    let log = log.clone();
    let mut registry = TypeRegistry::default();
    registry.register_automatism("Counter", move |_| {
        log.lock().unwrap().built += 1;
        Box::new(Counter {
            log: log.clone(),
            ticks: 0,
        })
    });
    registry
}

fn counter_ticks(obj: &RuntimeObject) -> Option<u32> {
    obj.automatism("Count")
        .and_then(|a| a.behavior().as_any().downcast_ref::<Counter>())
        .map(|counter| counter.ticks)
}

fn counted_boxes_scene(instances: Vec<InstanceData>) -> SceneData {
    let mut data = boxes_scene(instances);
    data.objects[0].automatisms = vec![AutomatismData {
        name: "Count".into(),
        kind: "Counter".into(),
        ..Default::default()
    }];
    data
}

/// 在事件之后删除宿主，并记录删除请求发出时仍在列表中的 Box 数量。
struct DeleteAfterEvents {
    seen: Arc<StdMutex<Vec<usize>>>,
}

impl Automatism for DeleteAfterEvents {
    fn do_step_post_events(&mut self, ctx: &mut AutomatismContext<'_>) -> anyhow::Result<()> {
        ctx.scene.delete_object(ctx.owner);
        let alive = ctx.scene.instances_of("Box").len();
        self.seen.lock().unwrap().push(alive);
        Ok(())
    }

    fn reset(&mut self, _data: &AutomatismData) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn loading_without_data_fails_softly() {
    let mut scene = new_scene(TypeRegistry::default(), GameConfig::default());
    assert_eq!(
        scene.load_from_scene(None),
        Err(SceneLoadError::MissingSceneData)
    );
    assert!(!scene.is_loaded());
}

#[test]
fn load_creates_instances_with_overrides() {
    let mut box_instance = instance("Box", 3.0, 4.0);
    box_instance.z_order = 7;
    box_instance.layer = "HUD".into();
    box_instance.variables = vec![VariableData::number("hp", 9.0)];

    let mut template = box_object("Box");
    template.variables = vec![VariableData::number("hp", 1.0), VariableData::text("tag", "x")];

    let data = SceneData {
        name: "Level".into(),
        title: String::new(),
        background: [10, 20, 30],
        layers: vec![
            LayerData {
                name: String::new(),
                visible: true,
            },
            LayerData {
                name: "HUD".into(),
                visible: true,
            },
        ],
        variables: vec![VariableData::number("lives", 3.0)],
        objects: vec![template, box_object("Ghost")],
        instances: vec![box_instance, instance("Missing", 0.0, 0.0)],
    };
    let mut scene = loaded_scene(TypeRegistry::default(), data);

    assert!(scene.is_loaded());
    assert_eq!(scene.name(), "Level");
    assert_eq!(scene.background_color(), [10, 20, 30]);
    assert_eq!(scene.variables_mut().get("lives").as_number(), 3.0);
    assert_eq!(scene.object_count(), 1);
    assert!(scene.instances_of("Ghost").is_empty());

    let id = scene.instances_of("Box")[0];
    let obj = scene.object_mut(id).expect("box should exist");
    assert_eq!((obj.x(), obj.y(), obj.z_order()), (3.0, 4.0, 7));
    assert_eq!(obj.layer(), "HUD");
    assert_eq!(obj.variables_mut().get("hp").as_number(), 9.0);
    assert_eq!(obj.variables_mut().get("tag").as_string(), "x");

    let hud = scene.layer("HUD").expect("HUD layer should exist");
    assert_eq!(hud.children().collect::<Vec<_>>(), vec![id]);
}

#[test]
fn unknown_object_names_are_registered_empty() {
    let mut scene = loaded_scene(TypeRegistry::default(), boxes_scene(Vec::new()));
    assert!(scene.create_object("Nope").is_none());
    assert!(scene.object_names().any(|name| name == "Nope"));
    assert!(scene.instances_of("Nope").is_empty());
    assert!(scene.objects("Nope").is_empty());
    assert!(scene.all_object_ids().is_empty());

    let missing = ObjectId::new(999);
    scene.object_variables_mut(missing).get("x").set_number(5.0);
    assert!(scene.object_variables_mut(missing).is_bad());
}

#[test]
fn deleted_objects_are_recycled() {
    let mut scene = loaded_scene(TypeRegistry::default(), boxes_scene(Vec::new()));

    let first = scene.create_object("Box").expect("should create box");
    let address = scene.object(first).map(|o| o as *const RuntimeObject);
    if let Some(obj) = scene.object_mut(first) {
        obj.set_position(50.0, 60.0);
        obj.add_force(1.0, 0.0, true);
    }

    assert!(scene.delete_object(first));
    assert!(!scene.delete_object(first));
    assert!(scene.object(first).is_none());
    assert_eq!(scene.pooled_count("Box"), 1);

    let second = scene.create_object("Box").expect("should create box");
    assert_ne!(first, second);
    assert_eq!(scene.pooled_count("Box"), 0);
    assert_eq!(scene.object(second).map(|o| o as *const RuntimeObject), address);

    let obj = scene.object(second).expect("recycled box should exist");
    assert_eq!((obj.x(), obj.y()), (0.0, 0.0));
    assert!(obj.has_no_forces());
    assert!(obj.is_living());
    assert_eq!(scene.instances_of("Box"), &[second]);
}

#[test]
fn recycled_objects_start_fresh() {
    let log = Arc::new(StdMutex::new(StepLog::default()));
    let start = Instant::now();
    let mut scene = loaded_scene(counter_registry(&log), counted_boxes_scene(Vec::new()));

    let first = scene.create_object("Box").expect("should create box");
    scene.render_and_step_at(start);
    scene.render_and_step_at(start + Duration::from_millis(16));

    let obj = scene.object_mut(first).expect("box should exist");
    if let Some((sprite, _)) = obj.kind_parts_mut::<SpriteObject>() {
        sprite.set_opacity(40.0);
    }
    obj.activate_automatism("Count", false);
    assert_eq!(
        obj.kind_as::<SpriteObject>().map(SpriteObject::opacity),
        Some(40.0)
    );
    assert_eq!(counter_ticks(obj), Some(2));

    assert!(scene.delete_object(first));
    let second = scene.create_object("Box").expect("should create box");

    let obj = scene.object(second).expect("recycled box should exist");
    assert_eq!(
        obj.kind_as::<SpriteObject>().map(SpriteObject::opacity),
        Some(255.0)
    );
    assert_eq!(obj.automatisms().count(), 1);
    assert!(obj.automatism_activated("Count"));
    assert_eq!(counter_ticks(obj), Some(0));
    assert_eq!(log.lock().unwrap().built, 1);
}

#[test]
fn pool_is_capped_by_config() {
    let config = GameConfig {
        object_pool_capacity: 1,
        ..GameConfig::default()
    };
    let mut scene = new_scene(TypeRegistry::default(), config);
    scene
        .load_from_scene(Some(&boxes_scene(vec![
            instance("Box", 0.0, 0.0),
            instance("Box", 1.0, 1.0),
        ])))
        .expect("should load scene");

    for id in scene.all_object_ids() {
        scene.delete_object(id);
    }
    assert_eq!(scene.object_count(), 0);
    assert_eq!(scene.pooled_count("Box"), 1);
}

#[test]
fn deletion_during_pre_events_is_deferred() {
    let seen = Arc::new(StdMutex::new(Vec::new()));
    let removed = Arc::new(StdMutex::new(0));
    let during_events = Arc::new(StdMutex::new(Vec::new()));

    let mut registry = TypeRegistry::default();
    {
        let seen = seen.clone();
        let removed = removed.clone();
        registry.register_automatism("SelfDestruct", move |_| {
            Box::new(SelfDestruct {
                seen: seen.clone(),
                removed: removed.clone(),
            })
        });
    }
    {
        let during_events = during_events.clone();
        registry.register_events("Level", move || {
            let during_events = during_events.clone();
            Box::new(move |scene: &mut RuntimeScene| {
                during_events
                    .lock()
                    .unwrap()
                    .push(scene.instances_of("Box").len());
            })
        });
    }

    let mut data = boxes_scene(vec![instance("Box", 0.0, 0.0), instance("Box", 20.0, 0.0)]);
    data.objects[0].automatisms = vec![AutomatismData {
        name: "Boom".into(),
        kind: "SelfDestruct".into(),
        ..Default::default()
    }];
    let mut scene = loaded_scene(registry, data);

    assert!(scene.render_and_step_at(Instant::now()));
    assert_eq!(*seen.lock().unwrap(), vec![2, 2]);
    assert_eq!(*during_events.lock().unwrap(), vec![0]);
    assert_eq!(*removed.lock().unwrap(), 2);
    assert_eq!(scene.pooled_count("Box"), 2);
}

#[test]
fn deletion_during_post_events_is_deferred() {
    let seen = Arc::new(StdMutex::new(Vec::new()));
    let during_events = Arc::new(StdMutex::new(Vec::new()));

    let mut registry = TypeRegistry::default();
    {
        let seen = seen.clone();
        registry.register_automatism("DeleteAfterEvents", move |_| {
            Box::new(DeleteAfterEvents { seen: seen.clone() })
        });
    }
    {
        let during_events = during_events.clone();
        registry.register_events("Level", move || {
            let during_events = during_events.clone();
            Box::new(move |scene: &mut RuntimeScene| {
                during_events
                    .lock()
                    .unwrap()
                    .push(scene.instances_of("Box").len());
            })
        });
    }

    let mut data = boxes_scene(vec![instance("Box", 0.0, 0.0), instance("Box", 20.0, 0.0)]);
    data.objects[0].automatisms = vec![AutomatismData {
        name: "Cleanup".into(),
        kind: "DeleteAfterEvents".into(),
        ..Default::default()
    }];
    let mut scene = loaded_scene(registry, data);
    let ids = scene.instances_of("Box").to_vec();

    assert!(scene.render_and_step_at(Instant::now()));
    assert_eq!(*during_events.lock().unwrap(), vec![2]);
    assert_eq!(*seen.lock().unwrap(), vec![2, 2]);
    assert!(scene.instances_of("Box").is_empty());
    assert!(ids.iter().all(|&id| scene.object(id).is_none()));
    assert_eq!(scene.pooled_count("Box"), 2);
}

#[test]
fn inactive_automatisms_are_not_stepped() {
    let log = Arc::new(StdMutex::new(StepLog::default()));
    let start = Instant::now();
    let mut scene = loaded_scene(
        counter_registry(&log),
        counted_boxes_scene(vec![instance("Box", 0.0, 0.0)]),
    );
    let id = scene.instances_of("Box")[0];

    if let Some(obj) = scene.object_mut(id) {
        obj.activate_automatism("Count", false);
    }
    scene.render_and_step_at(start);
    scene.render_and_step_at(start + Duration::from_millis(16));
    {
        let log = log.lock().unwrap();
        assert_eq!((log.pre, log.post), (0, 0));
    }

    if let Some(obj) = scene.object_mut(id) {
        obj.activate_automatism("Count", true);
    }
    scene.render_and_step_at(start + Duration::from_millis(32));
    let log = log.lock().unwrap();
    assert_eq!((log.pre, log.post), (1, 1));
}

#[test]
fn nested_scopes_flush_once_at_the_outermost() {
    let mut scene = loaded_scene(
        TypeRegistry::default(),
        boxes_scene(vec![instance("Box", 0.0, 0.0)]),
    );
    let id = scene.instances_of("Box")[0];
    {
        let mut outer = scene.defer_deletions();
        {
            let mut inner = outer.defer_deletions();
            inner.delete_object(id);
            inner.mark_object_for_deletion(id);
        }
        assert!(outer.object(id).is_some());
        assert_eq!(
            outer.object(id).map(RuntimeObject::lifecycle),
            Some(ObjectLifecycle::MarkedForDeletion)
        );
    }
    assert!(scene.object(id).is_none());
    assert_eq!(scene.pooled_count("Box"), 1);
}

#[test]
fn frame_time_is_clamped_by_min_fps() {
    let start = Instant::now();
    let mut scene = loaded_scene(TypeRegistry::default(), boxes_scene(Vec::new()));

    scene.render_and_step_at(start);
    assert_eq!(scene.elapsed_time(), 0.0);
    assert!(!scene.is_first_frame());

    scene.render_and_step_at(start + Duration::from_secs(5));
    assert!((scene.elapsed_time() - 1000.0 / 15.0).abs() < 1e-6);

    scene.set_time_scale(0.5);
    scene.set_time_scale(-1.0);
    assert_eq!(scene.time_scale(), 0.5);
    scene.render_and_step_at(start + Duration::from_millis(5040));
    assert!((scene.elapsed_time() - 20.0).abs() < 1e-6);
    assert!((scene.time_from_start() - (1000.0 / 15.0 + 20.0)).abs() < 1e-6);
}

#[test]
fn first_frame_is_measured_from_load() {
    let mut scene = loaded_scene(TypeRegistry::default(), boxes_scene(Vec::new()));
    let loaded_at = Instant::now();

    scene.render_and_step_at(loaded_at + Duration::from_millis(40));
    let elapsed = scene.elapsed_time();
    assert!((40.0..=1000.0 / 15.0).contains(&elapsed), "{}", elapsed);
}

#[test]
fn timers_follow_scaled_time() {
    let start = Instant::now();
    let mut scene = loaded_scene(TypeRegistry::default(), boxes_scene(Vec::new()));
    scene.add_timer("spawn");
    assert!(scene.has_timer("spawn"));

    scene.render_and_step_at(start);
    scene.render_and_step_at(start + Duration::from_millis(30));
    let time = scene.timer("spawn").map(Timer::time).unwrap_or_default();
    assert!((time - 30.0).abs() < 1e-6);

    scene.remove_timer("spawn");
    assert!(!scene.has_timer("spawn"));
}

#[test]
fn forces_move_objects_and_temporary_ones_expire() {
    let start = Instant::now();
    let mut scene = loaded_scene(
        TypeRegistry::default(),
        boxes_scene(vec![instance("Box", 0.0, 0.0)]),
    );
    let id = scene.instances_of("Box")[0];
    scene.render_and_step_at(start);

    if let Some(obj) = scene.object_mut(id) {
        obj.add_force(10.0, 0.0, true);
        obj.add_force(0.0, 20.0, false);
    }
    scene.render_and_step_at(start + Duration::from_millis(50));

    let obj = scene.object(id).expect("box should exist");
    assert!((obj.x() - 0.5).abs() < 1e-4);
    assert!((obj.y() - 1.0).abs() < 1e-4);
    assert_eq!(obj.forces().len(), 1);
}

#[test]
fn collision_queries_use_the_refreshed_index() {
    let mut scene = loaded_scene(
        TypeRegistry::default(),
        boxes_scene(vec![
            instance("Box", 0.0, 0.0),
            instance("Box", 100.0, 100.0),
            instance("Wall", 5.0, 5.0),
            instance("Wall", 9.0, 0.0),
        ]),
    );
    let boxes = scene.instances_of("Box").to_vec();
    let walls = scene.instances_of("Wall").to_vec();

    let names = scene.game().names().clone();
    let box_id = names.lookup("Box").expect("Box should be named");
    let wall_id = names.lookup("Wall").expect("Wall should be named");
    assert!(scene.potential_colliding_objects(box_id, wall_id).is_empty());

    scene.update_potential_colliding_objects();
    let mut potential = scene.potential_colliding_objects(box_id, wall_id);
    potential.sort();
    assert_eq!(
        potential,
        vec![(boxes[0], walls[0]), (boxes[0], walls[1])]
    );

    assert_eq!(
        scene.potential_colliding_objects(wall_id, wall_id),
        vec![(walls[0], walls[1])]
    );

    let mut colliding = scene.colliding_objects("Box", "Wall");
    colliding.sort();
    assert_eq!(colliding, vec![(boxes[0], walls[0]), (boxes[0], walls[1])]);
    assert!(scene.colliding_objects("Box", "Nothing").is_empty());

    // 同一帧内新建的对象直接进入索引。
    let late = scene.create_object("Wall").expect("should create wall");
    assert!(
        scene
            .potential_colliding_objects(box_id, wall_id)
            .contains(&(boxes[0], late))
    );
}

#[test]
fn separation_pushes_object_out() {
    let mut scene = loaded_scene(
        TypeRegistry::default(),
        boxes_scene(vec![instance("Box", 0.0, 0.0), instance("Wall", 8.0, 0.0)]),
    );
    let box_id = scene.instances_of("Box")[0];
    let wall_id = scene.instances_of("Wall")[0];

    assert!(scene.objects_collide(box_id, wall_id));
    assert!(scene.separate_object_from(box_id, &["Wall"]));
    let x = scene.object(box_id).map(RuntimeObject::x).unwrap_or_default();
    assert!((x + 2.0).abs() < 1e-4);
    assert!(!scene.separate_object_from(box_id, &["Box"]));
}

#[test]
fn layers_fall_back_and_feed_the_render_frame() {
    let mut data = boxes_scene(vec![
        instance("Box", 0.0, 0.0),
        instance("Box", 1.0, 0.0),
        instance("Wall", 2.0, 0.0),
    ]);
    data.layers = vec![
        LayerData {
            name: String::new(),
            visible: true,
        },
        LayerData {
            name: "Hidden".into(),
            visible: false,
        },
    ];
    data.instances[1].layer = "Nowhere".into();
    data.instances[1].z_order = -1;
    data.instances[2].layer = "Hidden".into();
    let mut scene = loaded_scene(TypeRegistry::default(), data);

    assert_eq!(scene.layer("Nowhere").map(Layer::name), Some(""));
    assert!(!scene.has_layer("Nowhere"));

    let frame = scene.build_render_frame();
    assert_eq!(frame.layers.len(), 1);
    let drawn: Vec<f32> = frame.layers[0].drawables.iter().map(|d| d.x).collect();
    assert_eq!(drawn, vec![1.0, 0.0]);

    let boxes = scene.instances_of("Box").to_vec();
    if let Some(obj) = scene.object_mut(boxes[0]) {
        obj.set_z_order(-5);
    }
    if let Some(obj) = scene.object_mut(boxes[1]) {
        obj.hide(true);
    }
    let frame = scene.build_render_frame();
    let drawn: Vec<ObjectId> = frame.layers[0].drawables.iter().map(|d| d.object).collect();
    assert_eq!(drawn, vec![boxes[0]]);
}

#[test]
fn scene_change_request_stops_stepping() {
    let mut registry = TypeRegistry::default();
    registry.register_events("Level", || {
        Box::new(|scene: &mut RuntimeScene| {
            if scene.time_from_start() > 0.0 {
                scene.request_scene_change("Menu");
            }
        })
    });
    let mut scene = loaded_scene(registry, boxes_scene(Vec::new()));
    let start = Instant::now();

    assert!(scene.render_and_step_at(start));
    assert!(!scene.render_and_step_at(start + Duration::from_millis(16)));
    assert_eq!(scene.requested_scene(), Some("Menu"));

    let mut scene = loaded_scene(TypeRegistry::default(), boxes_scene(Vec::new()));
    scene.request_game_stop();
    assert!(!scene.render_and_step_at(start));
}

#[test]
fn reloading_resets_the_scene() {
    let mut scene = loaded_scene(
        TypeRegistry::default(),
        boxes_scene(vec![instance("Box", 0.0, 0.0)]),
    );
    scene.add_timer("t");
    scene.render_and_step_at(Instant::now());

    scene
        .load_from_scene(Some(&boxes_scene(vec![instance("Wall", 0.0, 0.0)])))
        .expect("should reload scene");
    assert!(scene.is_first_frame());
    assert!(scene.instances_of("Box").is_empty());
    assert_eq!(scene.instances_of("Wall").len(), 1);
    assert!(!scene.has_timer("t"));
    assert_eq!(scene.pooled_count("Box"), 0);
}
