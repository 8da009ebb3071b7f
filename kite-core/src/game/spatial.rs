use crate::Aabb2;

use super::object::ObjectId;

/// 一个参与碰撞候选查询的对象。
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SpatialEntry {
    pub id: ObjectId,
    pub name_id: u32,
    pub aabb: Aabb2,
}

/// 基于对象 AABB 的四叉树。
///
/// 每帧由场景显式重建一次；帧内新建的对象通过 [`insert`](Self::insert) 追加。
/// 只回答“AABB 重叠”的粗筛问题，精确测试交给调用方。
#[derive(Debug, Clone)]
pub(crate) struct QuadtreeIndex {
    root: usize,
    nodes: Vec<QuadtreeNode>,
    entries: Vec<SpatialEntry>,
    /// 根节点之外（或不是有限值）的条目，每次查询都会线性检查。
    outliers: Vec<usize>,
    max_depth: u8,
    max_items: usize,
}

#[derive(Debug, Clone)]
struct QuadtreeNode {
    bounds: Aabb2,
    children: Option<[usize; 4]>,
    items: Vec<usize>,
    depth: u8,
}

impl QuadtreeIndex {
    pub(crate) fn build(entries: Vec<SpatialEntry>, max_depth: u8, max_items: usize) -> Self {
        let mut bounds: Option<Aabb2> = None;
        for e in entries.iter().filter(|e| e.aabb.is_finite()) {
            bounds = Some(bounds.map(|acc| acc.union(&e.aabb)).unwrap_or(e.aabb));
        }
        let root_bounds = make_square(bounds.unwrap_or_default()).expanded(1.0e-3);

        let mut index = Self {
            root: 0,
            nodes: vec![QuadtreeNode {
                bounds: root_bounds,
                children: None,
                items: Vec::new(),
                depth: 0,
            }],
            entries: Vec::with_capacity(entries.len()),
            outliers: Vec::new(),
            max_depth,
            max_items: max_items.max(1),
        };
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn insert(&mut self, entry: SpatialEntry) {
        let item = self.entries.len();
        self.entries.push(entry);

        let root_bounds = self.nodes[self.root].bounds;
        if !entry.aabb.is_finite() || !root_bounds.contains_aabb(&entry.aabb) {
            self.outliers.push(item);
            return;
        }
        self.insert_into(self.root, item);
    }

    /// 所有 AABB 与 `query` 重叠的条目。
    pub(crate) fn query_aabb(&self, query: &Aabb2) -> Vec<&SpatialEntry> {
        let mut out = Vec::new();
        self.query_aabb_into(self.root, query, &mut out);
        out.extend(self.outliers.iter().copied());
        out.sort_unstable();
        out.dedup();
        out.into_iter()
            .map(|i| &self.entries[i])
            .filter(|e| e.aabb.intersects(query))
            .collect()
    }

    /// 名字为 `name_a` 与 `name_b` 的对象中，AABB 重叠的候选对（不含自身配对）。
    ///
    /// 两个名字相同时每一对只出现一次（按 id 排序）。
    pub(crate) fn candidate_pairs(&self, name_a: u32, name_b: u32) -> Vec<(ObjectId, ObjectId)> {
        let mut pairs = Vec::new();
        for a in self.entries.iter().filter(|e| e.name_id == name_a) {
            for b in self.query_aabb(&a.aabb) {
                if b.name_id != name_b || b.id == a.id {
                    continue;
                }
                if name_a == name_b && b.id < a.id {
                    continue;
                }
                pairs.push((a.id, b.id));
            }
        }
        pairs
    }

    fn query_aabb_into(&self, node_index: usize, query: &Aabb2, out: &mut Vec<usize>) {
        let node = &self.nodes[node_index];
        if !node.bounds.intersects(query) {
            return;
        }

        out.extend_from_slice(&node.items);
        if let Some(children) = node.children {
            for child in children {
                self.query_aabb_into(child, query, out);
            }
        }
    }

    fn insert_into(&mut self, node_index: usize, item: usize) {
        let aabb = self.entries[item].aabb;

        // 若已有子节点，尽量下沉到完全包含它的那个子块。
        if let Some(children) = self.nodes[node_index].children {
            for child in children {
                if self.nodes[child].bounds.contains_aabb(&aabb) {
                    self.insert_into(child, item);
                    return;
                }
            }
            // 跨越子块边界，留在当前节点。
            self.nodes[node_index].items.push(item);
            return;
        }

        self.nodes[node_index].items.push(item);
        if self.nodes[node_index].items.len() > self.max_items
            && self.nodes[node_index].depth < self.max_depth
        {
            self.split(node_index);
        }
    }

    fn split(&mut self, node_index: usize) {
        let bounds = self.nodes[node_index].bounds;
        let depth = self.nodes[node_index].depth;

        let mut children = [0usize; 4];
        for (slot, quadrant) in children.iter_mut().zip(bounds.quadrants()) {
            *slot = self.nodes.len();
            self.nodes.push(QuadtreeNode {
                bounds: quadrant,
                children: None,
                items: Vec::new(),
                depth: depth + 1,
            });
        }
        self.nodes[node_index].children = Some(children);

        // 重新分配已有条目：能完整放进某个子块的下沉，其余留在本节点。
        let items = std::mem::take(&mut self.nodes[node_index].items);
        for item in items {
            self.insert_into(node_index, item);
        }
    }
}

fn make_square(bounds: Aabb2) -> Aabb2 {
    let center = bounds.center();
    let size = bounds.size();
    let half = (0.5 * size.x.max(size.y)).max(1.0e-3);
    Aabb2::new(
        center - nalgebra::Vector2::new(half, half),
        center + nalgebra::Vector2::new(half, half),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, name_id: u32, x: f32, y: f32) -> SpatialEntry {
        SpatialEntry {
            id: ObjectId::new(id),
            name_id,
            aabb: Aabb2::from_rect(x, y, 10.0, 10.0),
        }
    }

    #[test]
    fn pairs_match_brute_force() {
        let mut entries = Vec::new();
        let mut id = 0;
        for gx in 0..12 {
            for gy in 0..12 {
                id += 1;
                entries.push(entry(id, (gx + gy) % 2, gx as f32 * 7.0, gy as f32 * 13.0));
            }
        }

        let mut expected = Vec::new();
        for a in entries.iter().filter(|e| e.name_id == 0) {
            for b in entries.iter().filter(|e| e.name_id == 1) {
                if a.aabb.intersects(&b.aabb) {
                    expected.push((a.id, b.id));
                }
            }
        }

        let index = QuadtreeIndex::build(entries, 8, 4);
        let mut got = index.candidate_pairs(0, 1);
        got.sort();
        expected.sort();
        assert_eq!(got, expected);
        assert!(!got.is_empty());
    }

    #[test]
    fn same_name_pairs_are_reported_once() {
        let index = QuadtreeIndex::build(
            vec![entry(1, 0, 0.0, 0.0), entry(2, 0, 5.0, 5.0), entry(3, 0, 50.0, 50.0)],
            8,
            1,
        );
        assert_eq!(
            index.candidate_pairs(0, 0),
            vec![(ObjectId::new(1), ObjectId::new(2))]
        );
    }

    #[test]
    fn late_insert_outside_root_is_still_found() {
        let mut index = QuadtreeIndex::build(vec![entry(1, 0, 0.0, 0.0)], 8, 4);
        index.insert(entry(2, 1, 1000.0, 1000.0));
        index.insert(entry(3, 1, 995.0, 995.0));
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.candidate_pairs(1, 1),
            vec![(ObjectId::new(2), ObjectId::new(3))]
        );
    }
}
