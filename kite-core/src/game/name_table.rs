use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

/// 名字 → 整数标识的驻留表。
///
/// 对象名与自动行为名在热路径上按整数比较。同一个游戏实例中的所有场景共享一张表（克隆句柄即可），
/// 因此同一名字在整个会话内得到同一个标识；不同游戏实例之间互不影响。
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    inner: Arc<RwLock<NameTableInner>>,
}

#[derive(Debug, Default)]
struct NameTableInner {
    ids: HashMap<String, u32>,
    names: Vec<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回名字的标识，首次出现时分配一个新的递增标识。
    pub fn identifier(&self, name: &str) -> u32 {
        if let Some(&id) = self.inner.read().ids.get(name) {
            return id;
        }

        let mut inner = self.inner.write();
        if let Some(&id) = inner.ids.get(name) {
            return id;
        }
        let id = inner.names.len() as u32;
        inner.names.push(name.to_owned());
        inner.ids.insert(name.to_owned(), id);
        id
    }

    /// 只查询、不分配。
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.inner.read().ids.get(name).copied()
    }

    pub fn name(&self, id: u32) -> Option<String> {
        self.inner.read().names.get(id as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
