use std::{any::Any, time::Duration};

use anyhow::Context;
use tracing::{info, warn};

use kite_core::{
    RuntimeGame, RuntimeScene,
    config::GameConfig,
    data::{AutomatismData, GameData},
    game::{
        automatism::{Automatism, AutomatismContext},
        registry::TypeRegistry,
    },
    logger,
    render::{RenderBackend, RenderFrame},
    resource::StaticImageCache,
};

const GAME_JSON: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/game.json");

/// 在场景左右边界之间来回移动宿主对象。
struct Bouncer {
    speed: f32,
    min_x: f32,
    max_x: f32,
}

impl Bouncer {
    fn from_data(data: &AutomatismData) -> Self {
        let read = |key: &str, default: f32| {
            data.properties
                .get(key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        Self {
            speed: read("speed", 120.0),
            min_x: read("min_x", 0.0),
            max_x: read("max_x", 800.0),
        }
    }
}

impl Automatism for Bouncer {
    fn do_step_post_events(&mut self, ctx: &mut AutomatismContext<'_>) -> anyhow::Result<()> {
        let elapsed = ctx.elapsed_seconds();
        let owner = ctx
            .owner_mut()
            .context("Bouncer 的宿主对象已不在场景中")?;

        let x = owner.x() + self.speed * elapsed;
        if x < self.min_x || x + owner.width() > self.max_x {
            self.speed = -self.speed;
        } else {
            owner.set_x(x);
        }
        Ok(())
    }

    fn reset(&mut self, data: &AutomatismData) {
        *self = Self::from_data(data);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 主场景：定时发射子弹，子弹撞到墙就消失；跑满 `duration_ms` 后切到结算场景。
fn level_events(duration_ms: f64) -> impl FnMut(&mut RuntimeScene) + Send {
    move |scene: &mut RuntimeScene| {
        if scene.is_first_frame() {
            scene.add_timer("spawn");
        }

        let spawn_due = scene.timer("spawn").is_some_and(|t| t.time() >= 400.0);
        if spawn_due {
            if let Some(timer) = scene.timer_mut("spawn") {
                timer.reset();
            }
            let cannon = scene.objects("Cannon").first().copied();
            let origin = cannon
                .and_then(|id| scene.object(id))
                .map(|obj| (obj.center_position().x, obj.y()));
            if let (Some((x, y)), Some(bullet)) = (origin, scene.create_object("Bullet")) {
                if let Some(obj) = scene.object_mut(bullet) {
                    obj.set_position(x, y);
                    obj.add_force(0.0, -240.0, true);
                }
            }
        }

        scene.update_potential_colliding_objects();
        for (bullet, _) in scene.colliding_objects("Bullet", "Wall") {
            scene.delete_object(bullet);
            scene.variables_mut().get("hits").add(1.0);
        }
        let escaped: Vec<_> = scene
            .instances_of("Bullet")
            .iter()
            .copied()
            .filter(|&id| scene.object(id).is_some_and(|obj| obj.y() < -64.0))
            .collect();
        for id in escaped {
            scene.delete_object(id);
        }

        if scene.time_from_start() >= duration_ms {
            let hits = scene.variables_mut().get("hits").as_number();
            scene.game().variables().get("hits").set_number(hits);
            scene.request_scene_change("Results");
        }
    }
}

fn results_events() -> impl FnMut(&mut RuntimeScene) + Send {
    |scene: &mut RuntimeScene| {
        if scene.is_first_frame() {
            let hits = scene.game().variables().get("hits").as_number();
            info!(target: "kite-tpl", hits, "Demo finished");
        }
        if scene.time_from_start() >= 500.0 {
            scene.request_game_stop();
        }
    }
}

/// 把每帧快照概要写进日志的渲染后端。
#[derive(Default)]
struct LogRenderer {
    frames: u64,
}

impl RenderBackend for LogRenderer {
    fn render(&mut self, frame: &RenderFrame) {
        self.frames += 1;
        if self.frames % 60 == 1 {
            info!(
                target: "kite-tpl",
                frame = self.frames,
                layers = frame.layers.len(),
                drawables = frame.drawable_count(),
                "Rendered frame"
            );
        }
    }
}

fn build_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register_automatism("Bouncer", |data| Box::new(Bouncer::from_data(data)))
        .register_events("Level", || Box::new(level_events(5_000.0)))
        .register_events("Results", || Box::new(results_events()));
    registry
}

fn main() -> anyhow::Result<()> {
    logger::init()?;

    let text = std::fs::read_to_string(GAME_JSON)
        .with_context(|| format!("读取游戏数据失败: {}", GAME_JSON))?;
    let data: GameData = serde_json::from_str(&text).context("解析游戏数据失败")?;

    let images = StaticImageCache::new()
        .with_image("cannon.png", 32.0, 16.0)
        .with_image("bullet.png", 4.0, 8.0)
        .with_image("wall.png", 200.0, 16.0);

    let mut game = RuntimeGame::new(
        data,
        GameConfig::default(),
        build_registry(),
        Box::new(images),
    );
    game.start(None, Box::new(LogRenderer::default()))
        .context("启动首个场景失败")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("创建 tokio 运行时失败")?;

    runtime.block_on(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(16));
        loop {
            ticker.tick().await;
            if !game.step() {
                break;
            }
        }
        if game.current_scene().is_none() {
            warn!(target: "kite-tpl", "Game ended without a scene");
        }
    });

    info!(target: "kite-tpl", "Bye");
    Ok(())
}
