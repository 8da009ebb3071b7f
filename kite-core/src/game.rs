pub mod automatism;
pub mod force;
pub mod input;
pub mod layer;
pub mod name_table;
pub mod object;
pub mod polygon;
pub mod registry;
pub mod scene;
pub mod spatial;
pub mod timer;
pub mod variable;
pub mod variables_container;

use std::{fmt, sync::Arc, time::Instant};

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, warn};

use crate::{
    config::GameConfig,
    data::{GameData, SceneData},
    render::{NullRenderer, RenderBackend},
    resource::ImageCache,
};

use self::{
    input::InputState,
    name_table::NameTable,
    registry::TypeRegistry,
    scene::{RuntimeScene, SceneLoadError},
    variables_container::VariablesContainer,
};

/// 游戏会话期间不随场景切换而改变的状态，由所有场景共享。
pub struct GameShared {
    data: GameData,
    config: GameConfig,
    registry: TypeRegistry,
    images: Box<dyn ImageCache>,
    names: NameTable,
    variables: Mutex<VariablesContainer>,
    input: RwLock<InputState>,
}

impl fmt::Debug for GameShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameShared")
            .field("name", &self.data.name)
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl GameShared {
    pub fn data(&self) -> &GameData {
        &self.data
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn images(&self) -> &dyn ImageCache {
        self.images.as_ref()
    }

    /// 对象名 / 自动行为名 → 整数标识。
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// 最低帧率：游戏数据中的值优先，否则取配置默认值。
    pub fn min_fps(&self) -> u32 {
        self.data.min_fps.unwrap_or(self.config.min_fps)
    }

    /// 全局变量。
    pub fn variables(&self) -> MutexGuard<'_, VariablesContainer> {
        self.variables.lock()
    }

    pub fn input(&self) -> RwLockReadGuard<'_, InputState> {
        self.input.read()
    }

    pub fn input_mut(&self) -> RwLockWriteGuard<'_, InputState> {
        self.input.write()
    }
}

/// 游戏驱动过程中的错误。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// 游戏数据中没有任何场景。
    NoScene,
    /// 指定的场景不存在。
    UnknownScene(String),
    /// 场景载入失败。
    SceneLoad(SceneLoadError),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::NoScene => write!(f, "游戏数据中没有任何场景"),
            GameError::UnknownScene(name) => write!(f, "游戏中不存在场景 \"{}\"", name),
            GameError::SceneLoad(err) => write!(f, "场景载入失败: {}", err),
        }
    }
}

impl std::error::Error for GameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GameError::SceneLoad(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SceneLoadError> for GameError {
    fn from(err: SceneLoadError) -> Self {
        GameError::SceneLoad(err)
    }
}

/// 一次游戏会话：共享状态加上当前运行的场景。
///
/// 宿主程序负责时钟：以固定节奏调用 [`step`](Self::step)，直到它返回 `false`。
/// 场景请求切换时，`step` 会卸载当前场景并载入目标场景，渲染后端随之转移。
pub struct RuntimeGame {
    shared: Arc<GameShared>,
    scene: Option<RuntimeScene>,
}

impl fmt::Debug for RuntimeGame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeGame")
            .field("shared", &self.shared)
            .field("scene", &self.scene)
            .finish()
    }
}

impl RuntimeGame {
    pub fn new(
        data: GameData,
        config: GameConfig,
        registry: TypeRegistry,
        images: Box<dyn ImageCache>,
    ) -> Self {
        info!(target: "kite-core", "Kite Engine v{}", env!("CARGO_PKG_VERSION"));

        let variables = VariablesContainer::from_data(&data.variables);
        Self {
            shared: Arc::new(GameShared {
                data,
                config,
                registry,
                images,
                names: NameTable::new(),
                variables: Mutex::new(variables),
                input: RwLock::new(InputState::new()),
            }),
            scene: None,
        }
    }

    pub fn shared(&self) -> &Arc<GameShared> {
        &self.shared
    }

    pub fn variables(&self) -> MutexGuard<'_, VariablesContainer> {
        self.shared.variables()
    }

    pub fn min_fps(&self) -> u32 {
        self.shared.min_fps()
    }

    /// 按名字查找场景数据；`None` 表示第一个场景。找不到时记录警告。
    pub fn scene_data(&self, name: Option<&str>) -> Option<&SceneData> {
        let scenes = &self.shared.data.scenes;
        let found = match name {
            Some(name) => scenes.iter().find(|scene| scene.name == name),
            None => scenes.first(),
        };
        if found.is_none() {
            warn!(target: "kite-core", scene = ?name, "The game has no such scene");
        }
        found
    }

    /// `None` 时判断游戏是否至少有一个场景。
    pub fn has_scene(&self, name: Option<&str>) -> bool {
        let scenes = &self.shared.data.scenes;
        match name {
            Some(name) => scenes.iter().any(|scene| scene.name == name),
            None => !scenes.is_empty(),
        }
    }

    pub fn current_scene(&self) -> Option<&RuntimeScene> {
        self.scene.as_ref()
    }

    pub fn current_scene_mut(&mut self) -> Option<&mut RuntimeScene> {
        self.scene.as_mut()
    }

    // 输入

    pub fn on_key_pressed(&self, key_code: u32) {
        self.shared.input_mut().on_key_pressed(key_code);
    }

    pub fn on_key_released(&self, key_code: u32) {
        self.shared.input_mut().on_key_released(key_code);
    }

    pub fn is_key_pressed(&self, key_code: u32) -> bool {
        self.shared.input().is_key_pressed(key_code)
    }

    pub fn any_key_pressed(&self) -> bool {
        self.shared.input().any_key_pressed()
    }

    pub fn on_mouse_move(&self, x: f32, y: f32) {
        self.shared.input_mut().on_mouse_move(x, y);
    }

    pub fn mouse_x(&self) -> f32 {
        self.shared.input().mouse_x()
    }

    pub fn mouse_y(&self) -> f32 {
        self.shared.input().mouse_y()
    }

    pub fn on_mouse_button_pressed(&self, button: usize) {
        self.shared.input_mut().on_mouse_button_pressed(button);
    }

    pub fn on_mouse_button_released(&self, button: usize) {
        self.shared.input_mut().on_mouse_button_released(button);
    }

    pub fn is_mouse_button_pressed(&self, button: usize) -> bool {
        self.shared.input().is_mouse_button_pressed(button)
    }

    pub fn on_mouse_wheel(&self, delta: f32) {
        self.shared.input_mut().on_mouse_wheel(delta);
    }

    pub fn mouse_wheel_delta(&self) -> f32 {
        self.shared.input().mouse_wheel_delta()
    }

    // 场景切换

    /// 载入并启动场景（`None` 表示第一个场景）。
    pub fn start(
        &mut self,
        scene: Option<&str>,
        renderer: Box<dyn RenderBackend>,
    ) -> Result<(), GameError> {
        if !self.has_scene(None) {
            error!(target: "kite-core", "The game has no scene to start");
            return Err(GameError::NoScene);
        }
        let next = self.load_scene(scene, renderer)?;
        self.scene = Some(next);
        Ok(())
    }

    /// 以当前时刻推进一帧。
    pub fn step(&mut self) -> bool {
        self.step_at(Instant::now())
    }

    /// 推进当前场景一帧并处理场景切换。返回 `false` 表示游戏应当结束。
    pub fn step_at(&mut self, now: Instant) -> bool {
        let Some(scene) = self.scene.as_mut() else {
            return false;
        };
        let running = scene.render_and_step_at(now);
        self.shared.input_mut().end_frame();
        if running {
            return true;
        }

        if scene.game_stop_requested() {
            info!(target: "kite-core", scene = %scene.name(), "Game stop requested");
            return false;
        }
        let Some(target) = scene.requested_scene().map(str::to_owned) else {
            return false;
        };

        let renderer = scene.take_renderer();
        scene.unload_scene();
        let renderer: Box<dyn RenderBackend> = match renderer {
            Some(renderer) => renderer,
            None => Box::new(NullRenderer),
        };
        match self.load_scene(Some(&target), renderer) {
            Ok(next) => {
                info!(target: "kite-core", scene = %target, "Switched scene");
                self.scene = Some(next);
                true
            }
            Err(err) => {
                error!(target: "kite-core", scene = %target, error = %err, "Failed to switch scene");
                self.scene = None;
                false
            }
        }
    }

    fn load_scene(
        &self,
        name: Option<&str>,
        renderer: Box<dyn RenderBackend>,
    ) -> Result<RuntimeScene, GameError> {
        let data = self
            .scene_data(name)
            .ok_or_else(|| GameError::UnknownScene(name.unwrap_or_default().to_owned()))?;
        let mut scene = RuntimeScene::new(self.shared.clone());
        scene.set_renderer(renderer);
        scene.load_from_scene(Some(data))?;
        Ok(scene)
    }
}
