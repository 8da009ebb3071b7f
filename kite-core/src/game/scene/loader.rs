use std::{fmt, time::Instant};

use indexmap::IndexMap;
use tracing::{error, info, warn};

use crate::{
    data::{InstanceData, SceneData},
    game::{layer::Layer, variables_container::VariablesContainer},
};

use super::RuntimeScene;

/// 载入场景失败的原因。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneLoadError {
    /// 没有提供场景数据。
    MissingSceneData,
    /// 游戏中不存在该名字的场景。
    UnknownScene(String),
}

impl fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneLoadError::MissingSceneData => write!(f, "缺少场景数据，无法载入场景"),
            SceneLoadError::UnknownScene(name) => write!(f, "游戏中不存在场景 \"{}\"", name),
        }
    }
}

impl std::error::Error for SceneLoadError {}

impl RuntimeScene {
    /// 按声明载入场景：图层、变量、对象模板，再逐个创建初始实例。
    ///
    /// 已载入的场景会先被卸载。没有数据时记录错误并返回 [`SceneLoadError::MissingSceneData`]，
    /// 场景保持未载入状态。
    pub fn load_from_scene(&mut self, data: Option<&SceneData>) -> Result<(), SceneLoadError> {
        let Some(data) = data else {
            error!(target: "kite-core", "A scene was loaded without data");
            return Err(SceneLoadError::MissingSceneData);
        };

        if self.loaded {
            self.unload_scene();
        }

        self.name = data.name.clone();
        self.first_frame = true;
        // 首帧的流逝时间从载入时刻算起。
        self.last_frame_time = Some(Instant::now());
        self.background = data.background;
        self.load_layers(data);
        self.variables = VariablesContainer::from_data(&data.variables);
        self.load_templates(data);

        for instance in &data.instances {
            self.create_initial_instance(instance);
        }

        let game = self.game.clone();
        self.events = game
            .registry()
            .events_factory(&self.name)
            .map(|factory| factory());

        self.loaded = true;
        info!(
            target: "kite-core",
            scene = %self.name,
            objects = self.objects.len(),
            layers = self.layers.len(),
            "Scene loaded"
        );
        Ok(())
    }

    /// 卸载场景：移除全部对象（触发删除钩子）、清空模板、回收池、计时器与事件函数。
    pub fn unload_scene(&mut self) {
        if !self.loaded {
            return;
        }

        for id in self.all_object_ids() {
            self.remove_object(id);
        }
        self.pending_deletions.clear();
        self.pools.clear();
        self.templates.clear();
        self.factories.clear();
        self.instances.clear();
        self.timers.clear();
        self.spatial = None;
        self.events = None;
        for layer in self.layers.values_mut() {
            layer.clear_children();
        }

        self.last_frame_time = None;
        self.elapsed_ms = 0.0;
        self.time_from_start_ms = 0.0;
        self.requested_scene = None;
        self.game_stop_requested = false;
        self.loaded = false;
        info!(target: "kite-core", scene = %self.name, "Scene unloaded");
    }

    fn load_layers(&mut self, data: &SceneData) {
        let viewport = self.game.config().viewport;
        let mut layers = IndexMap::with_capacity(data.layers.len() + 1);
        for layer in &data.layers {
            layers.insert(
                layer.name.clone(),
                Layer::new(layer.name.as_str(), layer.visible, viewport),
            );
        }
        if !layers.contains_key("") {
            layers.shift_insert(0, String::new(), Layer::new("", true, viewport));
        }
        self.layers = layers;
    }

    /// 游戏级模板在前，场景模板同名时覆盖之；类型未注册的模板被跳过。
    fn load_templates(&mut self, data: &SceneData) {
        let game = self.game.clone();
        let templates = game.data().objects.iter().chain(&data.objects);
        for template in templates {
            let Some(factory) = game.registry().object_factory(&template.kind) else {
                warn!(
                    target: "kite-core",
                    object = %template.name,
                    kind = %template.kind,
                    "Unknown object type, template skipped"
                );
                continue;
            };
            game.names().identifier(&template.name);
            for automatism in &template.automatisms {
                game.names().identifier(&automatism.name);
            }
            self.factories.insert(template.name.clone(), factory);
            self.templates
                .insert(template.name.clone(), template.clone());
            self.instances.entry(template.name.clone()).or_default();
        }
    }

    fn create_initial_instance(&mut self, instance: &InstanceData) {
        let Some(id) = self.create_object(&instance.object) else {
            return;
        };
        let Some(obj) = self.objects.get_mut(&id) else {
            return;
        };
        obj.set_position(instance.x, instance.y);
        obj.set_z_order(instance.z_order);
        obj.set_angle(instance.angle);
        obj.set_layer(&instance.layer);
        obj.variables_mut().init_from(&instance.variables, true);
        obj.extra_initialization(instance);
        self.sync_layer(id);
    }
}
