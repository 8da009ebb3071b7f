use std::{collections::HashMap, sync::Arc};

use crate::data::{AutomatismData, ObjectData};

use super::{
    automatism::Automatism,
    object::{
        EmptyObject, ObjectContext, ObjectKind,
        sprite::{SPRITE_KIND, SpriteObject},
    },
    scene::RuntimeScene,
};

/// 根据模板构造对象类型扩展。
pub type ObjectFactory =
    Arc<dyn Fn(&ObjectData, &ObjectContext<'_>) -> Box<dyn ObjectKind> + Send + Sync>;

/// 根据声明构造自动行为。
pub type AutomatismFactory = Arc<dyn Fn(&AutomatismData) -> Box<dyn Automatism> + Send + Sync>;

/// 场景每帧执行一次的事件函数。
pub type EventsFunction = Box<dyn FnMut(&mut RuntimeScene) + Send>;

/// 为场景构造事件函数。
pub type EventsFactory = Arc<dyn Fn() -> EventsFunction + Send + Sync>;

/// 类型标签 → 工厂的注册表。
///
/// 编辑器导出的数据只携带类型字符串；运行时在载入场景时按名解析一次并缓存到每个对象名上。
/// 未注册的类型会被记录并跳过，不会中断载入。
///
/// 默认已注册：`""` 与 `"Base"`（[`EmptyObject`]）、`"Sprite"`（[`SpriteObject`]）。
#[derive(Clone)]
pub struct TypeRegistry {
    objects: HashMap<String, ObjectFactory>,
    automatisms: HashMap<String, AutomatismFactory>,
    events: HashMap<String, EventsFactory>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut registry = Self {
            objects: HashMap::new(),
            automatisms: HashMap::new(),
            events: HashMap::new(),
        };
        registry.register_object("", |_, _| Box::new(EmptyObject));
        registry.register_object("Base", |_, _| Box::new(EmptyObject));
        registry.register_object(SPRITE_KIND, |data, ctx| {
            Box::new(SpriteObject::new(data, ctx.images))
        });
        registry
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("objects", &self.objects.keys().collect::<Vec<_>>())
            .field("automatisms", &self.automatisms.keys().collect::<Vec<_>>())
            .field("events", &self.events.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_object<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ObjectData, &ObjectContext<'_>) -> Box<dyn ObjectKind> + Send + Sync + 'static,
    {
        self.objects.insert(kind.into(), Arc::new(factory));
        self
    }

    pub fn register_automatism<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&AutomatismData) -> Box<dyn Automatism> + Send + Sync + 'static,
    {
        self.automatisms.insert(kind.into(), Arc::new(factory));
        self
    }

    /// 为名为 `scene` 的场景注册事件函数；每次载入该场景都会重新构造一份。
    pub fn register_events<F>(&mut self, scene: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> EventsFunction + Send + Sync + 'static,
    {
        self.events.insert(scene.into(), Arc::new(factory));
        self
    }

    pub fn object_factory(&self, kind: &str) -> Option<ObjectFactory> {
        self.objects.get(kind).cloned()
    }

    pub fn automatism_factory(&self, kind: &str) -> Option<AutomatismFactory> {
        self.automatisms.get(kind).cloned()
    }

    pub fn events_factory(&self, scene: &str) -> Option<EventsFactory> {
        self.events.get(scene).cloned()
    }
}
