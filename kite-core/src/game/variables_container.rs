use std::collections::HashMap;

use crate::data::VariableData;

use super::variable::Variable;

/// 按名字存放变量的容器（游戏、场景、对象三种作用域共用）。
///
/// 除了按名字查找，容器还维护一个按声明顺序排列的索引，
/// 使 [`get_from_index`](Self::get_from_index) 能直接访问最近一次 [`init_from`](Self::init_from) 声明的变量。
///
/// 删除不会真正移除槽位，而是把变量标记为“容器中未定义”（墓碑）：
/// - [`has`](Self::has) 对墓碑返回 `false`
/// - [`get`](Self::get) 遇到墓碑时把它重置为新的 0 值变量并复活
///
/// 这样对象回收时可以原地复用同一个容器，索引也保持稳定。
#[derive(Debug, Clone, Default)]
pub struct VariablesContainer {
    slots: Vec<Variable>,
    by_name: HashMap<String, usize>,
    indexed: Vec<usize>,
    scratch: Variable,
    bad: bool,
}

impl VariablesContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: &[VariableData]) -> Self {
        let mut container = Self::new();
        container.init_from(data, false);
        container
    }

    /// 构造一个“坏”容器：对无效对象的变量访问都会落到这里。
    ///
    /// 它不保存任何东西：`has` 恒为 `false`，写入被丢弃，`get` 每次都返回一个刚重置的临时变量。
    pub fn bad() -> Self {
        Self {
            bad: true,
            ..Self::default()
        }
    }

    pub fn is_bad(&self) -> bool {
        self.bad
    }

    /// 用声明式数据初始化容器。
    ///
    /// - `keep_old_variables == false` 时，先把现有变量全部标记为墓碑，再写入 `data` 中声明的变量；
    ///   因此未在 `data` 中出现的名字之后 `has` 为 `false`。
    /// - `keep_old_variables == true` 时，现有变量保持不变，`data` 中的声明覆盖同名变量。
    ///
    /// 两种情况下索引都会按 `data` 的顺序重建。
    pub fn init_from(&mut self, data: &[VariableData], keep_old_variables: bool) {
        if self.bad {
            return;
        }
        if !keep_old_variables {
            for slot in &mut self.slots {
                slot.set_undefined_in_container(true);
            }
        }

        self.indexed.clear();
        for declared in data {
            let slot = self.slot_for(&declared.name);
            let variable = &mut self.slots[slot];
            variable.assign_value(&declared.value);
            variable.set_undefined_in_container(false);
            self.indexed.push(slot);
        }
    }

    /// 添加（或替换）一个变量。
    pub fn add(&mut self, name: &str, mut variable: Variable) {
        if self.bad {
            return;
        }
        variable.set_undefined_in_container(false);
        let slot = self.slot_for(name);
        self.slots[slot] = variable;
    }

    /// 删除变量（标记为墓碑，槽位保留）。
    pub fn remove(&mut self, name: &str) {
        if self.bad {
            return;
        }
        if let Some(&slot) = self.by_name.get(name) {
            self.slots[slot].set_undefined_in_container(true);
        }
    }

    /// 获取变量；不存在（或是墓碑）时创建一个值为 0 的变量。
    pub fn get(&mut self, name: &str) -> &mut Variable {
        if self.bad {
            return self.reset_scratch();
        }
        let slot = self.slot_for(name);
        revive(&mut self.slots[slot])
    }

    /// 按声明顺序访问最近一次 `init_from` 写入的变量。
    ///
    /// 越界索引返回一个临时变量，对它的写入不会留下任何痕迹。
    pub fn get_from_index(&mut self, index: usize) -> &mut Variable {
        match self.indexed.get(index).copied() {
            Some(slot) if !self.bad => revive(&mut self.slots[slot]),
            _ => self.reset_scratch(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        !self.bad
            && self
                .by_name
                .get(name)
                .is_some_and(|&slot| !self.slots[slot].is_undefined_in_container())
    }

    /// 仍然定义着的变量名。
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name
            .iter()
            .filter(|(_, slot)| !self.slots[**slot].is_undefined_in_container())
            .map(|(name, _)| name.as_str())
    }

    fn slot_for(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.by_name.get(name) {
            return slot;
        }
        let slot = self.slots.len();
        self.slots.push(Variable::new());
        self.by_name.insert(name.to_owned(), slot);
        slot
    }

    fn reset_scratch(&mut self) -> &mut Variable {
        self.scratch = Variable::new();
        &mut self.scratch
    }
}

fn revive(variable: &mut Variable) -> &mut Variable {
    if variable.is_undefined_in_container() {
        *variable = Variable::new();
    }
    variable
}
