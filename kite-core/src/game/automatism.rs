use std::any::Any;

use anyhow::Result;
use tracing::warn;

use crate::data::AutomatismData;

use super::{
    object::{ObjectId, RuntimeObject},
    scene::RuntimeScene,
};

/// 自动行为：挂在对象上、每帧自动执行的可插拔逻辑。
///
/// - `on_activate` / `on_deactivate`：激活状态真正发生切换时调用。
/// - `do_step_pre_events`：每帧事件函数执行前调用（仅在激活时）。
/// - `do_step_post_events`：每帧事件函数执行后调用（仅在激活时）。
/// - `on_owner_removed`：宿主对象从场景中移除时调用。
/// - `reset`（必须实现）：宿主对象从回收池复用、且行为类型不变时调用，用新的声明数据原地重置，
///   之后的行为应与新建实例一致。
///
/// 步进钩子返回的错误只会被记录，不会中断当前帧。
pub trait Automatism: Send {
    fn on_activate(&mut self) {}

    fn on_deactivate(&mut self) {}

    fn do_step_pre_events(&mut self, _ctx: &mut AutomatismContext<'_>) -> Result<()> {
        Ok(())
    }

    fn do_step_post_events(&mut self, _ctx: &mut AutomatismContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_owner_removed(&mut self) {}

    fn reset(&mut self, data: &AutomatismData);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 自动行为步进时能看到的上下文：整个场景，以及宿主对象的 id。
///
/// 步进期间行为实例被临时从宿主对象上取下，因此可以安全地通过 `scene` 修改宿主对象；
/// 此时在宿主上查询这个行为本身会得到 `None`。
pub struct AutomatismContext<'a> {
    pub scene: &'a mut RuntimeScene,
    pub owner: ObjectId,
}

impl AutomatismContext<'_> {
    pub fn owner(&self) -> Option<&RuntimeObject> {
        self.scene.object(self.owner)
    }

    pub fn owner_mut(&mut self) -> Option<&mut RuntimeObject> {
        self.scene.object_mut(self.owner)
    }

    /// 本帧流逝时间（秒）。
    pub fn elapsed_seconds(&self) -> f32 {
        (self.scene.elapsed_time() / 1000.0) as f32
    }
}

/// 对象上挂载的一个自动行为实例及其激活状态。
pub struct RuntimeAutomatism {
    name: String,
    kind: String,
    name_id: u32,
    activated: bool,
    behavior: Box<dyn Automatism>,
}

impl std::fmt::Debug for RuntimeAutomatism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeAutomatism")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("name_id", &self.name_id)
            .field("activated", &self.activated)
            .finish_non_exhaustive()
    }
}

impl RuntimeAutomatism {
    pub fn new(data: &AutomatismData, name_id: u32, behavior: Box<dyn Automatism>) -> Self {
        Self {
            name: data.name.clone(),
            kind: data.kind.clone(),
            name_id,
            activated: true,
            behavior,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name_id(&self) -> u32 {
        self.name_id
    }

    pub fn activated(&self) -> bool {
        self.activated
    }

    /// 切换激活状态；只有状态真正改变时才触发对应钩子。
    pub fn activate(&mut self, enable: bool) {
        if enable && !self.activated {
            self.activated = true;
            self.behavior.on_activate();
        } else if !enable && self.activated {
            self.activated = false;
            self.behavior.on_deactivate();
        }
    }

    pub fn step_pre_events(&mut self, ctx: &mut AutomatismContext<'_>) {
        if !self.activated {
            return;
        }
        if let Err(err) = self.behavior.do_step_pre_events(ctx) {
            warn!(
                target: "kite-core",
                automatism = %self.name,
                owner = %ctx.owner,
                error = %err,
                "Automatism pre-events step failed"
            );
        }
    }

    pub fn step_post_events(&mut self, ctx: &mut AutomatismContext<'_>) {
        if !self.activated {
            return;
        }
        if let Err(err) = self.behavior.do_step_post_events(ctx) {
            warn!(
                target: "kite-core",
                automatism = %self.name,
                owner = %ctx.owner,
                error = %err,
                "Automatism post-events step failed"
            );
        }
    }

    /// 复用时重置：重新激活并交给具体行为重置内部状态。
    pub(crate) fn reset(&mut self, data: &AutomatismData, name_id: u32) {
        self.name = data.name.clone();
        self.name_id = name_id;
        self.activated = true;
        self.behavior.reset(data);
    }

    pub(crate) fn owner_removed(&mut self) {
        self.behavior.on_owner_removed();
    }

    pub fn behavior(&self) -> &dyn Automatism {
        self.behavior.as_ref()
    }

    pub fn behavior_mut(&mut self) -> &mut dyn Automatism {
        self.behavior.as_mut()
    }

    pub fn downcast_ref<T: Automatism + 'static>(&self) -> Option<&T> {
        self.behavior.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Automatism + 'static>(&mut self) -> Option<&mut T> {
        self.behavior.as_any_mut().downcast_mut::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    struct Tracking {
        events: Arc<StdMutex<Vec<&'static str>>>,
    }

    impl Automatism for Tracking {
        fn on_activate(&mut self) {
            self.events.lock().unwrap().push("activate");
        }

        fn on_deactivate(&mut self) {
            self.events.lock().unwrap().push("deactivate");
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
    fn hooks_fire_only_on_real_transitions() {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let data = AutomatismData {
            name: "Mover".into(),
            kind: "Tracking".into(),
            ..Default::default()
        };
        let mut aut = RuntimeAutomatism::new(
            &data,
            0,
            Box::new(Tracking {
                events: events.clone(),
            }),
        );

        assert!(aut.activated());
        aut.activate(true);
        aut.activate(false);
        aut.activate(false);
        aut.activate(true);

        assert_eq!(*events.lock().unwrap(), vec!["deactivate", "activate"]);
        assert!(aut.downcast_ref::<Tracking>().is_some());
    }
}
