use std::ops::{Deref, DerefMut};

use super::RuntimeScene;

/// 删除延迟作用域。
///
/// 存活期间 [`RuntimeScene::delete_object`] 只把对象放进待删队列；
/// 最外层作用域析构时统一移除。作用域可以嵌套。
pub struct DeletionScope<'a> {
    scene: &'a mut RuntimeScene,
}

impl<'a> DeletionScope<'a> {
    pub(super) fn new(scene: &'a mut RuntimeScene) -> Self {
        scene.deletion_depth += 1;
        Self { scene }
    }
}

impl Deref for DeletionScope<'_> {
    type Target = RuntimeScene;

    fn deref(&self) -> &Self::Target {
        self.scene
    }
}

impl DerefMut for DeletionScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.scene
    }
}

impl Drop for DeletionScope<'_> {
    fn drop(&mut self) {
        self.scene.deletion_depth -= 1;
        if self.scene.deletion_depth == 0 {
            self.scene.flush_pending_deletions();
        }
    }
}
